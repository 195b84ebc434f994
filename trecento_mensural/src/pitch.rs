// Pitch values carried by mensural notes and ligature members.
//
// Durations never depend on pitch. Pitch matters only to the ligature
// expander, which compares adjacent pitches to decide whether a member is
// a brevis or a longa, so this is a deliberately small type: a diatonic
// step, a chromatic alteration and an octave, ordered by sounding height.
//
// Pitches parse from strings such as "A4", "B-4" (B flat), "F#5" or "c3".

use crate::error::{MensuralError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Diatonic step names, C-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Semitones above C.
    pub fn semitones(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    fn from_char(c: char) -> Option<Step> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    pub step: Step,
    /// Chromatic alteration in semitones (-1 flat, +1 sharp).
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Pitch { step, alter, octave }
    }

    /// Steps above C0, ignoring alteration.
    pub fn diatonic_number(&self) -> i32 {
        let index = match self.step {
            Step::C => 0,
            Step::D => 1,
            Step::E => 2,
            Step::F => 3,
            Step::G => 4,
            Step::A => 5,
            Step::B => 6,
        };
        self.octave as i32 * 7 + index
    }

    /// MIDI-style key number (C4 = 60).
    pub fn key_number(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.step.semitones() + self.alter as i32
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_number()
            .cmp(&other.key_number())
            .then_with(|| self.alter.cmp(&other.alter))
    }
}

impl FromStr for Pitch {
    type Err = MensuralError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || MensuralError::InvalidPitch(s.to_string());
        let mut chars = s.trim().chars().peekable();
        let step = chars.next().and_then(Step::from_char).ok_or_else(bad)?;

        let mut alter: i8 = 0;
        while let Some(&c) = chars.peek() {
            match c {
                '#' => alter += 1,
                // "-" is the flat sign; a negative octave is not supported.
                '-' | 'b' => alter -= 1,
                _ => break,
            }
            chars.next();
        }

        let rest: String = chars.collect();
        let octave = if rest.is_empty() {
            4
        } else {
            rest.parse::<i8>().map_err(|_| bad())?
        };
        Ok(Pitch::new(step, alter, octave))
    }
}

impl TryFrom<String> for Pitch {
    type Error = MensuralError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Pitch> for String {
    fn from(p: Pitch) -> String {
        p.to_string()
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.step)?;
        let accidental = if self.alter >= 0 { "#" } else { "-" };
        for _ in 0..self.alter.unsigned_abs() {
            f.write_str(accidental)?;
        }
        write!(f, "{}", self.octave)
    }
}
