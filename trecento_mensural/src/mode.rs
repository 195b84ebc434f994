// Rhythmic mode descriptors for mensural notation.
//
// A rhythmic mode fixes how many minimae make up one brevis, which in
// Trecento notation is the span between two punctus marks. The six Italian
// divisiones are the engine's real subject; French mensurations (tempus ×
// prolation) are modelled so a document can declare them, but the resolver
// refuses to resolve under them.
//
// Besides the minima count each divisione carries two fixed
// classifications used by the resolver and the strength evaluator:
// - `Grouping`: how minimae cluster into beats (threes, fours or sixes)
// - `SemibrevisRule`: which family of semibrevis values applies
//
// The modern time-signature string and the quarter-length of one minima
// are exposed as descriptive metadata for collaborators converting to
// absolute durations. The engine itself never reads them.

use crate::error::{MensuralError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six Trecento divisiones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Divisione {
    /// `.q.`: 4 minimae per brevis.
    Quaternaria,
    /// `.i.`: 6 minimae, grouped in threes.
    SenariaImperfecta,
    /// `.p.`: 6 minimae, grouped in twos within a perfect brevis.
    SenariaPerfecta,
    /// `.n.`: 9 minimae.
    Novenaria,
    /// `.o.`: 8 minimae.
    Octonaria,
    /// `.d.`: 12 minimae.
    Duodenaria,
}

impl Divisione {
    pub const ALL: [Divisione; 6] = [
        Divisione::Quaternaria,
        Divisione::SenariaImperfecta,
        Divisione::SenariaPerfecta,
        Divisione::Novenaria,
        Divisione::Octonaria,
        Divisione::Duodenaria,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Divisione::Quaternaria => "quaternaria",
            Divisione::SenariaImperfecta => "senaria imperfecta",
            Divisione::SenariaPerfecta => "senaria perfecta",
            Divisione::Novenaria => "novenaria",
            Divisione::Octonaria => "octonaria",
            Divisione::Duodenaria => "duodenaria",
        }
    }

    /// The standard symbol, e.g. `.q.`.
    pub fn symbol(self) -> &'static str {
        match self {
            Divisione::Quaternaria => ".q.",
            Divisione::SenariaImperfecta => ".i.",
            Divisione::SenariaPerfecta => ".p.",
            Divisione::Novenaria => ".n.",
            Divisione::Octonaria => ".o.",
            Divisione::Duodenaria => ".d.",
        }
    }

    pub fn default_minima_per_brevis(self) -> u32 {
        match self {
            Divisione::Quaternaria => 4,
            Divisione::SenariaImperfecta | Divisione::SenariaPerfecta => 6,
            Divisione::Octonaria => 8,
            Divisione::Novenaria => 9,
            Divisione::Duodenaria => 12,
        }
    }

    pub fn grouping(self) -> Grouping {
        match self {
            Divisione::SenariaImperfecta | Divisione::Novenaria => Grouping::Three,
            Divisione::Quaternaria | Divisione::Octonaria | Divisione::Duodenaria => {
                Grouping::Four
            }
            Divisione::SenariaPerfecta => Grouping::Six,
        }
    }

    pub fn semibrevis_rule(self) -> SemibrevisRule {
        match self {
            Divisione::Quaternaria | Divisione::SenariaPerfecta => SemibrevisRule::Binary,
            Divisione::SenariaImperfecta | Divisione::Novenaria => SemibrevisRule::Ternary,
            Divisione::Octonaria | Divisione::Duodenaria => SemibrevisRule::Compound,
        }
    }

    /// Modern time-signature equivalent of one brevis.
    pub fn time_signature(self) -> &'static str {
        match self {
            Divisione::Quaternaria | Divisione::Octonaria => "2/4",
            Divisione::SenariaImperfecta => "6/8",
            Divisione::SenariaPerfecta | Divisione::Duodenaria => "3/4",
            Divisione::Novenaria => "9/8",
        }
    }

    /// Quarter notes per minima in modern transcription.
    pub fn quarter_length_per_minima(self) -> f64 {
        match self {
            Divisione::Octonaria | Divisione::Duodenaria => 0.25,
            _ => 0.5,
        }
    }
}

impl FromStr for Divisione {
    type Err = MensuralError;

    /// Accepts the name (`"novenaria"`), the symbol (`".n."`) or the bare
    /// letter (`"n"`).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let symbol = if trimmed.len() == 1 {
            format!(".{trimmed}.")
        } else {
            trimmed.to_string()
        };
        Divisione::ALL
            .into_iter()
            .find(|d| symbol == d.symbol() || trimmed.eq_ignore_ascii_case(d.name()))
            .ok_or_else(|| MensuralError::UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tempus {
    Perfect,
    Imperfect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prolation {
    Major,
    Minor,
}

/// A French mensuration sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mensuration {
    pub tempus: Tempus,
    pub prolation: Prolation,
}

impl Mensuration {
    pub fn symbol(self) -> &'static str {
        match (self.tempus, self.prolation) {
            (Tempus::Perfect, Prolation::Major) => "O-dot",
            (Tempus::Perfect, Prolation::Minor) => "C-dot",
            (Tempus::Imperfect, Prolation::Major) => "O",
            (Tempus::Imperfect, Prolation::Minor) => "C",
        }
    }

    pub fn default_minima_per_brevis(self) -> u32 {
        match (self.tempus, self.prolation) {
            (Tempus::Perfect, Prolation::Major) => 9,
            (Tempus::Imperfect, Prolation::Minor) => 4,
            _ => 6,
        }
    }

    pub fn time_signature(self) -> &'static str {
        match (self.tempus, self.prolation) {
            (Tempus::Perfect, Prolation::Major) => "9/8",
            (Tempus::Perfect, Prolation::Minor) => "6/8",
            (Tempus::Imperfect, Prolation::Major) => "3/4",
            (Tempus::Imperfect, Prolation::Minor) => "2/4",
        }
    }
}

/// How minimae cluster into beats, for metrical strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grouping {
    Three,
    Four,
    Six,
}

/// Which family of semibrevis readings a divisione uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemibrevisRule {
    /// `.q.`, `.p.`: semibreves are 2 minimae; a trailing or down-stemmed
    /// semibrevis absorbs the rest.
    Binary,
    /// `.i.`, `.n.`: semibreves are 3, or 2 before a minima.
    Ternary,
    /// `.o.`, `.d.`: semibreves are 2 or 4.
    Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Divisione(Divisione),
    Mensuration(Mensuration),
}

/// The rhythmic mode in force for a stretch of notation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmicMode {
    kind: ModeKind,
    minima_per_brevis: f64,
}

impl RhythmicMode {
    pub fn divisione(divisione: Divisione) -> Self {
        RhythmicMode {
            kind: ModeKind::Divisione(divisione),
            minima_per_brevis: divisione.default_minima_per_brevis() as f64,
        }
    }

    pub fn mensuration(tempus: Tempus, prolation: Prolation) -> Self {
        let m = Mensuration { tempus, prolation };
        RhythmicMode {
            kind: ModeKind::Mensuration(m),
            minima_per_brevis: m.default_minima_per_brevis() as f64,
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    /// The divisione, or `None` under a French mensuration.
    pub fn as_divisione(&self) -> Option<Divisione> {
        match self.kind {
            ModeKind::Divisione(d) => Some(d),
            ModeKind::Mensuration(_) => None,
        }
    }

    pub fn is_trecento(&self) -> bool {
        self.as_divisione().is_some()
    }

    pub fn minima_per_brevis(&self) -> f64 {
        self.minima_per_brevis
    }

    pub fn set_minima_per_brevis(&mut self, minima: f64) {
        self.minima_per_brevis = minima;
    }

    /// Beat grouping. French mensurations group by prolation: threes under
    /// major prolation, fours under minor.
    pub fn grouping(&self) -> Grouping {
        match self.kind {
            ModeKind::Divisione(d) => d.grouping(),
            ModeKind::Mensuration(m) => match m.prolation {
                Prolation::Major => Grouping::Three,
                Prolation::Minor => Grouping::Four,
            },
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self.kind {
            ModeKind::Divisione(d) => d.symbol(),
            ModeKind::Mensuration(m) => m.symbol(),
        }
    }

    pub fn time_signature(&self) -> &'static str {
        match self.kind {
            ModeKind::Divisione(d) => d.time_signature(),
            ModeKind::Mensuration(m) => m.time_signature(),
        }
    }

    /// Quarter notes per minima. French mensurations transcribe the minima
    /// as an eighth.
    pub fn quarter_length_per_minima(&self) -> f64 {
        match self.kind {
            ModeKind::Divisione(d) => d.quarter_length_per_minima(),
            ModeKind::Mensuration(_) => 0.5,
        }
    }
}

impl From<Divisione> for RhythmicMode {
    fn from(d: Divisione) -> Self {
        RhythmicMode::divisione(d)
    }
}

impl FromStr for RhythmicMode {
    type Err = MensuralError;

    /// Parses a divisione (name, symbol or letter) or a mensuration sign
    /// (`O-dot`, `C-dot`, `O`, `C`).
    fn from_str(s: &str) -> Result<Self> {
        let mensuration = match s.trim() {
            "O-dot" => Some((Tempus::Perfect, Prolation::Major)),
            "C-dot" => Some((Tempus::Perfect, Prolation::Minor)),
            "O" => Some((Tempus::Imperfect, Prolation::Major)),
            "C" => Some((Tempus::Imperfect, Prolation::Minor)),
            _ => None,
        };
        match mensuration {
            Some((tempus, prolation)) => Ok(RhythmicMode::mensuration(tempus, prolation)),
            None => s.parse::<Divisione>().map(RhythmicMode::divisione),
        }
    }
}

impl fmt::Display for RhythmicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} minimae)", self.symbol(), self.minima_per_brevis)
    }
}
