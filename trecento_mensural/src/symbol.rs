// Mensural symbol model: notes and rests of Trecento notation.
//
// A `MensuralSymbol` records only what is written on the page: its
// mensural type, whether it is a note or a rest, the stems attached to it
// and the flags on those stems. Durations are never stored here; the
// resolver computes them per measure and hands back a parallel vector.
//
// Decoration rules enforced by the setters:
// - brevis, longa and maxima never carry stems
// - minima and semiminima notes carry an up stem by default, and no other
//   type may gain one
// - at most two stems per symbol (the default up stem counts)
// - a side stem only on a semibrevis or minima
// - flags only on a semiminima's up stem (default `Right`) or on a down stem,
//   never on a side stem
// - rests carry no decorations at all
//
// Color (black/red) is stored for collaborators and has no effect on
// duration.
//
// The JSON form goes through `SymbolSpec`, so documents loaded from disk
// pass the same validation as symbols built in code.

use crate::error::{MensuralError, Result};
use crate::pitch::Pitch;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MensuralType {
    #[serde(alias = "Mx")]
    Maxima,
    #[serde(alias = "L")]
    Longa,
    #[serde(alias = "B")]
    Brevis,
    #[serde(alias = "SB")]
    Semibrevis,
    #[serde(alias = "M")]
    Minima,
    #[serde(alias = "SM")]
    Semiminima,
}

impl MensuralType {
    pub const ALL: [MensuralType; 6] = [
        MensuralType::Maxima,
        MensuralType::Longa,
        MensuralType::Brevis,
        MensuralType::Semibrevis,
        MensuralType::Minima,
        MensuralType::Semiminima,
    ];

    pub fn abbreviation(self) -> &'static str {
        match self {
            MensuralType::Maxima => "Mx",
            MensuralType::Longa => "L",
            MensuralType::Brevis => "B",
            MensuralType::Semibrevis => "SB",
            MensuralType::Minima => "M",
            MensuralType::Semiminima => "SM",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MensuralType::Maxima => "maxima",
            MensuralType::Longa => "longa",
            MensuralType::Brevis => "brevis",
            MensuralType::Semibrevis => "semibrevis",
            MensuralType::Minima => "minima",
            MensuralType::Semiminima => "semiminima",
        }
    }

    /// Types whose length is a fixed multiple of the brevis.
    pub fn is_fixed(self) -> bool {
        matches!(
            self,
            MensuralType::Maxima | MensuralType::Longa | MensuralType::Brevis
        )
    }

    /// Whether notes of this type carry an up stem without being asked to.
    pub fn has_default_up_stem(self) -> bool {
        matches!(self, MensuralType::Minima | MensuralType::Semiminima)
    }
}

impl FromStr for MensuralType {
    type Err = MensuralError;

    /// Accepts the abbreviations (`Mx L B SB M SM`, exact case) and the full
    /// names in any case.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        for t in MensuralType::ALL {
            if s == t.abbreviation() || s.eq_ignore_ascii_case(t.name()) {
                return Ok(t);
            }
        }
        Err(MensuralError::UnknownMensuralType(s.to_string()))
    }
}

impl fmt::Display for MensuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Up,
    Down,
    Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagOrientation {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Black,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Note { pitch: Pitch, color: Color },
    Rest,
}

/// A single note or rest as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SymbolSpec", into = "SymbolSpec")]
pub struct MensuralSymbol {
    kind: SymbolKind,
    mensural_type: MensuralType,
    stems: SmallVec<[Stem; 2]>,
    up_flag: Option<FlagOrientation>,
    down_flag: Option<FlagOrientation>,
}

impl MensuralSymbol {
    /// A note with its type's default decorations.
    pub fn note(mensural_type: MensuralType, pitch: Pitch) -> Self {
        let mut symbol = MensuralSymbol {
            kind: SymbolKind::Note {
                pitch,
                color: Color::Black,
            },
            mensural_type,
            stems: SmallVec::new(),
            up_flag: None,
            down_flag: None,
        };
        symbol.clear_stems();
        symbol
    }

    pub fn rest(mensural_type: MensuralType) -> Self {
        MensuralSymbol {
            kind: SymbolKind::Rest,
            mensural_type,
            stems: SmallVec::new(),
            up_flag: None,
            down_flag: None,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn mensural_type(&self) -> MensuralType {
        self.mensural_type
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, SymbolKind::Rest)
    }

    pub fn pitch(&self) -> Option<Pitch> {
        match self.kind {
            SymbolKind::Note { pitch, .. } => Some(pitch),
            SymbolKind::Rest => None,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self.kind {
            SymbolKind::Note { color, .. } => Some(color),
            SymbolKind::Rest => None,
        }
    }

    pub fn set_color(&mut self, color: Color) -> Result<()> {
        if let SymbolKind::Note { color: c, .. } = &mut self.kind {
            *c = color;
            return Ok(());
        }
        Err(self.decoration_error("rests have no color"))
    }

    pub fn stems(&self) -> &[Stem] {
        &self.stems
    }

    pub fn has_stem(&self, stem: Stem) -> bool {
        self.stems.contains(&stem)
    }

    /// The flag on `stem`, if any. Side stems never have one.
    pub fn flag(&self, stem: Stem) -> Option<FlagOrientation> {
        match stem {
            Stem::Up => self.up_flag,
            Stem::Down => self.down_flag,
            Stem::Side => None,
        }
    }

    /// Attach a stem. Re-adding an existing stem is a no-op.
    pub fn set_stem(&mut self, stem: Stem) -> Result<()> {
        if self.is_rest() {
            return Err(self.decoration_error("rests cannot carry stems"));
        }
        if self.mensural_type.is_fixed() {
            return Err(self.decoration_error("brevis, longa and maxima cannot carry stems"));
        }
        if self.has_stem(stem) {
            return Ok(());
        }
        match stem {
            Stem::Up => {
                if !self.mensural_type.has_default_up_stem() {
                    return Err(self.decoration_error("only minima and semiminima have up stems"));
                }
            }
            Stem::Side => {
                if !matches!(
                    self.mensural_type,
                    MensuralType::Semibrevis | MensuralType::Minima
                ) {
                    return Err(self.decoration_error("side stems only on semibrevis or minima"));
                }
            }
            Stem::Down => {}
        }
        if self.stems.len() >= 2 {
            return Err(self.decoration_error("a symbol carries at most two stems"));
        }
        self.stems.push(stem);
        if stem == Stem::Up && self.mensural_type == MensuralType::Semiminima {
            self.up_flag = Some(FlagOrientation::Right);
        }
        Ok(())
    }

    /// Remove every stem and flag, then restore the type's default up stem.
    pub fn clear_stems(&mut self) {
        self.up_flag = None;
        self.down_flag = None;
        if self.is_rest() {
            self.stems.clear();
            return;
        }
        self.stems = default_stems(self.mensural_type);
        if self.mensural_type == MensuralType::Semiminima {
            self.up_flag = Some(FlagOrientation::Right);
        }
    }

    pub fn set_flag(&mut self, stem: Stem, orientation: FlagOrientation) -> Result<()> {
        if self.is_rest() {
            return Err(self.decoration_error("rests cannot carry flags"));
        }
        if !self.has_stem(stem) {
            return Err(self.decoration_error(&format!("no {stem:?} stem to flag")));
        }
        match stem {
            Stem::Up if self.mensural_type == MensuralType::Semiminima => {
                self.up_flag = Some(orientation);
            }
            Stem::Up => {
                return Err(self.decoration_error("only a semiminima's up stem takes a flag"));
            }
            Stem::Down => self.down_flag = Some(orientation),
            Stem::Side => return Err(self.decoration_error("side stems cannot carry flags")),
        }
        Ok(())
    }

    /// Remove a flag. A semiminima's up flag is mandatory and falls back to
    /// `Right`.
    pub fn clear_flag(&mut self, stem: Stem) {
        match stem {
            Stem::Up => {
                if self.up_flag.is_some() {
                    self.up_flag = Some(FlagOrientation::Right);
                }
            }
            Stem::Down => self.down_flag = None,
            Stem::Side => {}
        }
    }

    /// Builder form of `set_stem`.
    pub fn with_stem(mut self, stem: Stem) -> Result<Self> {
        self.set_stem(stem)?;
        Ok(self)
    }

    /// Builder form of `set_flag`.
    pub fn with_flag(mut self, stem: Stem, orientation: FlagOrientation) -> Result<Self> {
        self.set_flag(stem, orientation)?;
        Ok(self)
    }

    /// Short label for logs, e.g. `SB↓` or `SM(l)`.
    pub fn label(&self) -> String {
        let mut label = String::from(self.mensural_type.abbreviation());
        if self.is_rest() {
            label.push_str("-rest");
        }
        if self.has_stem(Stem::Down) {
            label.push('↓');
        }
        if self.has_stem(Stem::Side) {
            label.push('→');
        }
        if self.mensural_type == MensuralType::Semiminima {
            match self.up_flag {
                Some(FlagOrientation::Left) => label.push_str("(l)"),
                Some(FlagOrientation::Right) => label.push_str("(r)"),
                None => {}
            }
        }
        label
    }

    fn decoration_error(&self, reason: &str) -> MensuralError {
        MensuralError::InvalidDecoration(format!("{}: {reason}", self.mensural_type.name()))
    }
}

/// Serialized form of a symbol.
///
/// ```json
/// { "type": "SM", "pitch": "A4", "stems": ["up"], "up_flag": "left" }
/// { "type": "SB", "rest": true }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    #[serde(rename = "type")]
    pub mensural_type: MensuralType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<Pitch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Absent means the type's defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stems: Option<Vec<Stem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_flag: Option<FlagOrientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_flag: Option<FlagOrientation>,
}

impl TryFrom<SymbolSpec> for MensuralSymbol {
    type Error = MensuralError;

    fn try_from(spec: SymbolSpec) -> Result<Self> {
        if spec.rest {
            let symbol = MensuralSymbol::rest(spec.mensural_type);
            let decorated = spec.pitch.is_some()
                || spec.color.is_some()
                || spec.stems.as_ref().is_some_and(|s| !s.is_empty())
                || spec.up_flag.is_some()
                || spec.down_flag.is_some();
            if decorated {
                return Err(symbol.decoration_error("rests carry no pitch, color, stems or flags"));
            }
            return Ok(symbol);
        }

        let pitch = spec.pitch.ok_or_else(|| {
            MensuralError::InvalidPitch(format!("{} note without pitch", spec.mensural_type))
        })?;
        let mut symbol = MensuralSymbol::note(spec.mensural_type, pitch);
        if let Some(color) = spec.color {
            symbol.set_color(color)?;
        }
        if let Some(stems) = spec.stems {
            if spec.mensural_type.has_default_up_stem() && !stems.contains(&Stem::Up) {
                return Err(symbol.decoration_error("minima and semiminima keep their up stem"));
            }
            symbol.stems.clear();
            symbol.up_flag = None;
            for stem in stems {
                symbol.set_stem(stem)?;
            }
        }
        if let Some(flag) = spec.up_flag {
            symbol.set_flag(Stem::Up, flag)?;
        }
        if let Some(flag) = spec.down_flag {
            symbol.set_flag(Stem::Down, flag)?;
        }
        Ok(symbol)
    }
}

impl From<MensuralSymbol> for SymbolSpec {
    fn from(symbol: MensuralSymbol) -> Self {
        let default_stems = symbol.stems == default_stems(symbol.mensural_type);
        SymbolSpec {
            mensural_type: symbol.mensural_type,
            rest: symbol.is_rest(),
            pitch: symbol.pitch(),
            color: symbol.color().filter(|c| *c != Color::Black),
            stems: if symbol.is_rest() || default_stems {
                None
            } else {
                Some(symbol.stems.to_vec())
            },
            up_flag: symbol.up_flag.filter(|f| *f != FlagOrientation::Right),
            down_flag: symbol.down_flag,
        }
    }
}

fn default_stems(mensural_type: MensuralType) -> SmallVec<[Stem; 2]> {
    let mut stems = SmallVec::new();
    if mensural_type.has_default_up_stem() {
        stems.push(Stem::Up);
    }
    stems
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> Pitch {
        "A4".parse().unwrap()
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("SB".parse::<MensuralType>().unwrap(), MensuralType::Semibrevis);
        assert_eq!("Minima".parse::<MensuralType>().unwrap(), MensuralType::Minima);
        assert_eq!("LONGA".parse::<MensuralType>().unwrap(), MensuralType::Longa);
        assert!("sb".parse::<MensuralType>().is_err());
        assert!("crotchet".parse::<MensuralType>().is_err());
    }

    #[test]
    fn test_default_stems() {
        let m = MensuralSymbol::note(MensuralType::Minima, a4());
        assert_eq!(m.stems(), &[Stem::Up]);
        assert_eq!(m.flag(Stem::Up), None);

        let sm = MensuralSymbol::note(MensuralType::Semiminima, a4());
        assert_eq!(sm.stems(), &[Stem::Up]);
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Right));

        let sb = MensuralSymbol::note(MensuralType::Semibrevis, a4());
        assert!(sb.stems().is_empty());

        let rest = MensuralSymbol::rest(MensuralType::Minima);
        assert!(rest.stems().is_empty());
    }

    #[test]
    fn test_no_stems_on_fixed_types() {
        for t in [MensuralType::Brevis, MensuralType::Longa, MensuralType::Maxima] {
            let mut n = MensuralSymbol::note(t, a4());
            assert!(n.set_stem(Stem::Down).is_err());
            assert!(n.set_stem(Stem::Up).is_err());
            assert!(n.stems().is_empty());
        }
    }

    #[test]
    fn test_up_stem_only_on_minima_types() {
        let mut sb = MensuralSymbol::note(MensuralType::Semibrevis, a4());
        assert!(sb.set_stem(Stem::Up).is_err());
        // Re-adding the default is harmless.
        let mut m = MensuralSymbol::note(MensuralType::Minima, a4());
        assert!(m.set_stem(Stem::Up).is_ok());
        assert_eq!(m.stems().len(), 1);
    }

    #[test]
    fn test_two_stem_limit() {
        let mut m = MensuralSymbol::note(MensuralType::Minima, a4());
        m.set_stem(Stem::Down).unwrap();
        let err = m.set_stem(Stem::Side).unwrap_err();
        assert!(matches!(err, MensuralError::InvalidDecoration(_)));

        let mut sb = MensuralSymbol::note(MensuralType::Semibrevis, a4());
        sb.set_stem(Stem::Down).unwrap();
        sb.set_stem(Stem::Side).unwrap();
        assert_eq!(sb.stems().len(), 2);
    }

    #[test]
    fn test_side_stem_types() {
        let mut sm = MensuralSymbol::note(MensuralType::Semiminima, a4());
        assert!(sm.set_stem(Stem::Side).is_err());
        let mut m = MensuralSymbol::note(MensuralType::Minima, a4());
        assert!(m.set_stem(Stem::Side).is_ok());
    }

    #[test]
    fn test_flag_rules() {
        let mut m = MensuralSymbol::note(MensuralType::Minima, a4());
        // Minima's up stem takes no flag.
        assert!(m.set_flag(Stem::Up, FlagOrientation::Left).is_err());
        // No down stem yet.
        assert!(m.set_flag(Stem::Down, FlagOrientation::Left).is_err());
        m.set_stem(Stem::Down).unwrap();
        m.set_flag(Stem::Down, FlagOrientation::Left).unwrap();
        assert_eq!(m.flag(Stem::Down), Some(FlagOrientation::Left));

        let mut sb = MensuralSymbol::note(MensuralType::Semibrevis, a4())
            .with_stem(Stem::Side)
            .unwrap();
        assert!(sb.set_flag(Stem::Side, FlagOrientation::Right).is_err());

        let sm = MensuralSymbol::note(MensuralType::Semiminima, a4())
            .with_flag(Stem::Up, FlagOrientation::Left)
            .unwrap();
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Left));
    }

    #[test]
    fn test_clear_restores_defaults() {
        let mut sm = MensuralSymbol::note(MensuralType::Semiminima, a4());
        sm.set_flag(Stem::Up, FlagOrientation::Left).unwrap();
        sm.clear_flag(Stem::Up);
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Right));

        sm.set_stem(Stem::Down).unwrap();
        sm.set_flag(Stem::Down, FlagOrientation::Left).unwrap();
        sm.clear_flag(Stem::Down);
        assert_eq!(sm.flag(Stem::Down), None);

        sm.clear_stems();
        assert_eq!(sm.stems(), &[Stem::Up]);
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Right));
    }

    #[test]
    fn test_rests_refuse_decoration() {
        let mut r = MensuralSymbol::rest(MensuralType::Semibrevis);
        assert!(r.set_stem(Stem::Down).is_err());
        assert!(r.set_flag(Stem::Down, FlagOrientation::Left).is_err());
        assert!(r.set_color(Color::Red).is_err());
        assert_eq!(r.pitch(), None);
    }

    #[test]
    fn test_color_is_stored() {
        let mut n = MensuralSymbol::note(MensuralType::Brevis, a4());
        assert_eq!(n.color(), Some(Color::Black));
        n.set_color(Color::Red).unwrap();
        assert_eq!(n.color(), Some(Color::Red));
    }

    #[test]
    fn test_json_form() {
        let sm: MensuralSymbol =
            serde_json::from_str(r#"{ "type": "SM", "pitch": "A4", "up_flag": "left" }"#).unwrap();
        assert_eq!(sm.mensural_type(), MensuralType::Semiminima);
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Left));

        let sb: MensuralSymbol =
            serde_json::from_str(r#"{ "type": "Semibrevis", "pitch": "G4", "stems": ["down"] }"#)
                .unwrap();
        assert!(sb.has_stem(Stem::Down));

        let rest: MensuralSymbol = serde_json::from_str(r#"{ "type": "SB", "rest": true }"#).unwrap();
        assert!(rest.is_rest());

        let json = serde_json::to_string(&sm).unwrap();
        let back: MensuralSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sm);
    }

    #[test]
    fn test_json_validation() {
        let bad = serde_json::from_str::<MensuralSymbol>(r#"{ "type": "B", "pitch": "A4", "stems": ["down"] }"#);
        assert!(bad.is_err());
        let no_pitch = serde_json::from_str::<MensuralSymbol>(r#"{ "type": "SB" }"#);
        assert!(no_pitch.is_err());
        let stemmed_rest =
            serde_json::from_str::<MensuralSymbol>(r#"{ "type": "M", "rest": true, "stems": ["up"] }"#);
        assert!(stemmed_rest.is_err());
    }

    #[test]
    fn test_json_keeps_up_stem() {
        for json in [
            r#"{ "type": "SM", "pitch": "A4", "stems": [] }"#,
            r#"{ "type": "M", "pitch": "A4", "stems": ["side"] }"#,
        ] {
            let err = serde_json::from_str::<MensuralSymbol>(json).unwrap_err();
            assert!(err.to_string().contains("up stem"), "{err}");
        }

        let sm: MensuralSymbol =
            serde_json::from_str(r#"{ "type": "SM", "pitch": "A4", "stems": ["up"] }"#).unwrap();
        assert_eq!(sm.flag(Stem::Up), Some(FlagOrientation::Right));
        let side: MensuralSymbol =
            serde_json::from_str(r#"{ "type": "M", "pitch": "A4", "stems": ["up", "side"] }"#)
                .unwrap();
        assert!(side.has_stem(Stem::Side));
    }
}
