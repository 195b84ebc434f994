// Ligatures and their expansion into mensural symbols.
//
// A ligature is a single written figure binding two or more pitches. Its
// members have no written type of their own; each member's type follows
// from its position, its notehead shape, its stem and the direction of the
// melody around it:
//
//   first member   up stem        → semibrevis pair (with the next member)
//                  down stem      → brevis if oblique or descending, else longa
//                  maxima flag    → maxima
//                  otherwise      → longa if oblique or descending, else brevis
//   interior       up stem        → semibrevis pair
//                  down stem      → longa
//                  maxima flag    → maxima
//                  otherwise      → brevis
//   last member    down stem      → longa if oblique or ascending, else brevis
//                  maxima flag    → maxima
//                  otherwise      → brevis if oblique or ascending, else longa
//
// The editing methods (`make_oblique`, `set_stem`, `set_maxima`,
// `set_reversed`) refuse shapes that cannot be written, so expansion never
// sees an ill-formed ligature other than one that is too short.
//
// A ligature always forms its own measure in the locator; see locator.rs.

use crate::error::{MensuralError, Result};
use crate::pitch::Pitch;
use crate::symbol::{Color, FlagOrientation, MensuralSymbol, MensuralType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteheadShape {
    Square,
    /// First member of an oblique pair.
    ObliqueStart,
    /// Second member of an oblique pair.
    ObliqueEnd,
}

impl NoteheadShape {
    pub fn is_oblique(self) -> bool {
        !matches!(self, NoteheadShape::Square)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

/// A stem on a ligature member: which way it points and which side of the
/// notehead it hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LigatureStem {
    pub direction: StemDirection,
    pub orientation: FlagOrientation,
}

impl LigatureStem {
    pub fn new(direction: StemDirection, orientation: FlagOrientation) -> Self {
        LigatureStem {
            direction,
            orientation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LigatureColor {
    Black,
    Red,
    /// Members of more than one color.
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    pitch: Pitch,
    shape: NoteheadShape,
    stem: Option<LigatureStem>,
    maxima: bool,
    reversed: bool,
    color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LigatureSpec", into = "LigatureSpec")]
pub struct Ligature {
    members: Vec<Member>,
}

impl Ligature {
    /// A ligature of square, unstemmed black members.
    pub fn new(pitches: impl IntoIterator<Item = Pitch>) -> Self {
        Ligature {
            members: pitches
                .into_iter()
                .map(|pitch| Member {
                    pitch,
                    shape: NoteheadShape::Square,
                    stem: None,
                    maxima: false,
                    reversed: false,
                    color: Color::Black,
                })
                .collect(),
        }
    }

    /// Convenience constructor from pitch names such as `"B-4"`.
    pub fn from_names(names: &[&str]) -> Result<Self> {
        let pitches = names
            .iter()
            .map(|n| n.parse::<Pitch>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Ligature::new(pitches))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.members.iter().map(|m| m.pitch)
    }

    fn member(&self, index: usize) -> Result<&Member> {
        self.members
            .get(index)
            .ok_or_else(|| MensuralError::InvalidLigature(format!("no note exists at index {index}")))
    }

    pub fn shape(&self, index: usize) -> Result<NoteheadShape> {
        Ok(self.member(index)?.shape)
    }

    pub fn stem(&self, index: usize) -> Result<Option<LigatureStem>> {
        Ok(self.member(index)?.stem)
    }

    pub fn is_maxima(&self, index: usize) -> Result<bool> {
        Ok(self.member(index)?.maxima)
    }

    pub fn is_reversed(&self, index: usize) -> Result<bool> {
        Ok(self.member(index)?.reversed)
    }

    fn direction_at(&self, index: usize) -> Option<StemDirection> {
        self.members.get(index).and_then(|m| m.stem).map(|s| s.direction)
    }

    fn orientation_at(&self, index: usize) -> Option<FlagOrientation> {
        self.members.get(index).and_then(|m| m.stem).map(|s| s.orientation)
    }

    /// Join the members at `start` and `start + 1` into one oblique notehead.
    pub fn make_oblique(&mut self, start: usize) -> Result<()> {
        if start + 1 >= self.members.len() {
            return Err(MensuralError::InvalidLigature(format!(
                "no note exists at index {}",
                start + 1
            )));
        }
        let current = &self.members[start];
        let next = &self.members[start + 1];
        if current.shape == NoteheadShape::ObliqueEnd
            || next.shape == NoteheadShape::ObliqueStart
            || current.maxima
            || next.maxima
        {
            return Err(MensuralError::InvalidLigature(format!(
                "cannot start oblique notehead at index {start}"
            )));
        }
        self.members[start].shape = NoteheadShape::ObliqueStart;
        self.members[start + 1].shape = NoteheadShape::ObliqueEnd;
        Ok(())
    }

    /// Square off the notehead at `index`, and its oblique partner if any.
    pub fn make_square(&mut self, index: usize) -> Result<()> {
        let partner = match self.member(index)?.shape {
            NoteheadShape::Square => return Ok(()),
            NoteheadShape::ObliqueStart => index + 1,
            NoteheadShape::ObliqueEnd => index - 1,
        };
        self.members[index].shape = NoteheadShape::Square;
        self.members[partner].shape = NoteheadShape::Square;
        Ok(())
    }

    /// Mark or unmark a member as a maxima. Oblique members, stemmed members
    /// and members following an up stem cannot be maximae.
    pub fn set_maxima(&mut self, index: usize, maxima: bool) -> Result<()> {
        let member = self.member(index)?;
        if maxima {
            let after_up = index > 0 && self.direction_at(index - 1) == Some(StemDirection::Up);
            if member.shape.is_oblique() || member.stem.is_some() || after_up {
                return Err(MensuralError::InvalidLigature(format!(
                    "cannot make note at index {index} a maxima"
                )));
            }
        }
        self.members[index].maxima = maxima;
        Ok(())
    }

    /// Place (or with `None`, remove) a stem.
    ///
    /// Stems of adjacent members may not overlap (a right-hanging stem
    /// followed by a left-hanging one). A down stem may not follow an up
    /// stem. An up stem needs an unstemmed, non-maxima member after it and
    /// may not follow another up stem.
    pub fn set_stem(&mut self, index: usize, stem: Option<LigatureStem>) -> Result<()> {
        if self.member(index)?.maxima {
            return Err(MensuralError::InvalidLigature(format!(
                "cannot place stem at index {index}"
            )));
        }
        let Some(new_stem) = stem else {
            self.members[index].stem = None;
            return Ok(());
        };

        let prev = index.checked_sub(1);
        let next = index + 1;
        let last = self.members.len() - 1;

        let clashes = match new_stem.orientation {
            FlagOrientation::Left => {
                prev.and_then(|p| self.orientation_at(p)) == Some(FlagOrientation::Right)
            }
            FlagOrientation::Right => self.orientation_at(next) == Some(FlagOrientation::Left),
        };
        if clashes {
            return Err(MensuralError::InvalidLigature(format!(
                "a stem with orientation {:?} not permitted at index {index}",
                new_stem.orientation
            )));
        }

        let after_up = prev.and_then(|p| self.direction_at(p)) == Some(StemDirection::Up);
        let allowed = match new_stem.direction {
            StemDirection::Down => !after_up,
            StemDirection::Up => {
                index < last
                    && !after_up
                    && self.members[next].stem.is_none()
                    && !self.members[next].maxima
            }
        };
        if !allowed {
            return Err(MensuralError::InvalidLigature(format!(
                "a stem with direction {:?} not permitted at index {index}",
                new_stem.direction
            )));
        }
        self.members[index].stem = Some(new_stem);
        Ok(())
    }

    /// Stack a member on top of its predecessor. Requires a left-hanging
    /// down stem, a diatonically higher pitch than the predecessor, and a
    /// predecessor that is neither reversed nor up-stemmed.
    pub fn set_reversed(&mut self, index: usize, reversed: bool) -> Result<()> {
        let member = self.member(index)?;
        if !reversed {
            self.members[index].reversed = false;
            return Ok(());
        }
        let Some(prev_index) = index.checked_sub(1) else {
            return Err(MensuralError::InvalidLigature(
                "the first note cannot be reversed".to_string(),
            ));
        };
        let prev = &self.members[prev_index];
        let down_left = member.stem == Some(LigatureStem::new(StemDirection::Down, FlagOrientation::Left));
        let higher = member.pitch.diatonic_number() > prev.pitch.diatonic_number();
        let prev_up = prev.stem.map(|s| s.direction) == Some(StemDirection::Up);
        if !(down_left && higher && !prev.reversed && !prev_up) {
            return Err(MensuralError::InvalidLigature(format!(
                "the note at index {index} cannot be reversed"
            )));
        }
        self.members[index].reversed = true;
        Ok(())
    }

    /// Overall color: the members' shared color, or `Mixed`.
    pub fn color(&self) -> LigatureColor {
        let mut colors = self.members.iter().map(|m| m.color);
        let Some(first) = colors.next() else {
            return LigatureColor::Black;
        };
        if colors.any(|c| c != first) {
            return LigatureColor::Mixed;
        }
        match first {
            Color::Black => LigatureColor::Black,
            Color::Red => LigatureColor::Red,
        }
    }

    /// Color one member, or with `None` every member.
    pub fn set_color(&mut self, color: Color, index: Option<usize>) -> Result<()> {
        match index {
            Some(i) => {
                self.member(i)?;
                self.members[i].color = color;
            }
            None => self.members.iter_mut().for_each(|m| m.color = color),
        }
        Ok(())
    }

    /// Expand into mensural notes, one per member.
    pub fn expand(&self) -> Result<Vec<MensuralSymbol>> {
        let n = self.members.len();
        if n < 2 {
            return Err(MensuralError::InvalidLigature(
                "ligatures must contain at least two notes".to_string(),
            ));
        }
        let mut types: Vec<MensuralType> = Vec::with_capacity(n);
        let pitch = |i: usize| self.members[i].pitch;

        // First member.
        let first = &self.members[0];
        let mut ind = match first.stem.map(|s| s.direction) {
            Some(StemDirection::Up) => {
                types.extend([MensuralType::Semibrevis, MensuralType::Semibrevis]);
                2
            }
            Some(StemDirection::Down) => {
                let descending = pitch(1) < pitch(0);
                types.push(if first.shape.is_oblique() || descending {
                    MensuralType::Brevis
                } else {
                    MensuralType::Longa
                });
                1
            }
            None => {
                let descending = pitch(1) < pitch(0);
                types.push(if first.maxima {
                    MensuralType::Maxima
                } else if first.shape.is_oblique() || descending {
                    MensuralType::Longa
                } else {
                    MensuralType::Brevis
                });
                1
            }
        };

        // Interior members.
        while ind < n - 1 {
            let member = &self.members[ind];
            match member.stem.map(|s| s.direction) {
                Some(StemDirection::Up) => {
                    types.extend([MensuralType::Semibrevis, MensuralType::Semibrevis]);
                    ind += 2;
                }
                Some(StemDirection::Down) => {
                    types.push(MensuralType::Longa);
                    ind += 1;
                }
                None => {
                    types.push(if member.maxima {
                        MensuralType::Maxima
                    } else {
                        MensuralType::Brevis
                    });
                    ind += 1;
                }
            }
        }

        // Last member, unless an up stem already consumed it.
        if ind == n - 1 {
            let last = &self.members[ind];
            let ascending = pitch(ind - 1) < pitch(ind);
            types.push(match last.stem.map(|s| s.direction) {
                Some(StemDirection::Down) => {
                    if last.shape.is_oblique() || ascending {
                        MensuralType::Longa
                    } else {
                        MensuralType::Brevis
                    }
                }
                _ if last.maxima => MensuralType::Maxima,
                _ => {
                    if last.shape.is_oblique() || ascending {
                        MensuralType::Brevis
                    } else {
                        MensuralType::Longa
                    }
                }
            });
        }

        self.members
            .iter()
            .zip(types)
            .map(|(member, t)| -> Result<MensuralSymbol> {
                let mut note = MensuralSymbol::note(t, member.pitch);
                note.set_color(member.color)?;
                Ok(note)
            })
            .collect()
    }

    /// The first member expands to a brevis.
    pub fn is_cum_proprietate(&self) -> Result<bool> {
        Ok(self.expand()?[0].mensural_type() == MensuralType::Brevis)
    }

    /// The last member expands to a longa.
    pub fn is_cum_perfectione(&self) -> Result<bool> {
        let notes = self.expand()?;
        Ok(notes.last().map(|n| n.mensural_type()) == Some(MensuralType::Longa))
    }

    /// The first member expands to a semibrevis (cum opposita proprietate).
    pub fn is_cum_opposita_proprietate(&self) -> Result<bool> {
        Ok(self.expand()?[0].mensural_type() == MensuralType::Semibrevis)
    }
}

/// Serialized form of a ligature: pitches plus the edits applied to them,
/// replayed through the validating setters on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LigatureSpec {
    pub pitches: Vec<Pitch>,
    /// Start indices of oblique pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oblique: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maxima: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stems: Vec<StemSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reversed: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StemSpec {
    pub index: usize,
    pub direction: StemDirection,
    pub orientation: FlagOrientation,
}

impl TryFrom<LigatureSpec> for Ligature {
    type Error = MensuralError;

    fn try_from(spec: LigatureSpec) -> Result<Self> {
        let mut lig = Ligature::new(spec.pitches);
        for i in spec.oblique {
            lig.make_oblique(i)?;
        }
        for s in spec.stems {
            lig.set_stem(s.index, Some(LigatureStem::new(s.direction, s.orientation)))?;
        }
        for i in spec.maxima {
            lig.set_maxima(i, true)?;
        }
        for i in spec.reversed {
            lig.set_reversed(i, true)?;
        }
        for i in spec.red {
            lig.set_color(Color::Red, Some(i))?;
        }
        Ok(lig)
    }
}

impl From<Ligature> for LigatureSpec {
    fn from(lig: Ligature) -> Self {
        let mut spec = LigatureSpec::default();
        for (i, m) in lig.members.into_iter().enumerate() {
            spec.pitches.push(m.pitch);
            if m.shape == NoteheadShape::ObliqueStart {
                spec.oblique.push(i);
            }
            if m.maxima {
                spec.maxima.push(i);
            }
            if let Some(stem) = m.stem {
                spec.stems.push(StemSpec {
                    index: i,
                    direction: stem.direction,
                    orientation: stem.orientation,
                });
            }
            if m.reversed {
                spec.reversed.push(i);
            }
            if m.color == Color::Red {
                spec.red.push(i);
            }
        }
        spec
    }
}
