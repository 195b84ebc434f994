// Metrical strength evaluator.
//
// Scores one candidate assignment of lengths to a measure. The resolver
// enumerates the legal readings of a measure and keeps the one this
// function likes best, so the score only has to rank readings of the same
// symbols against each other; its absolute value means nothing.
//
// The score walks the measure keeping a running beat position (in
// minimae). Each symbol contributes `weight(type) × strength(beat)` at the
// beat where it starts, where `strength` depends on the mode's grouping:
//
//   threes: multiples of 3 → 1, other whole beats → 1/3, off-beat → 1/9
//   fours:  multiples of 4 → 1, ≡ 2 (mod 4) → 1/2, odd → 1/4, off-beat → 1/8
//   sixes:  multiples of 6 → 1, other even → 1/2, odd → 1/4, off-beat → 1/8
//
// Finally the distance between the measure's total and the mode's minima
// count is subtracted, so readings that overrun or underfill lose.
//
// Beat positions accumulate float error from the 2/3 and 1/2 semiminima
// values; a position within the tolerance of a whole number is snapped to
// it before being classified.

use crate::mode::{Grouping, RhythmicMode};
use crate::symbol::{MensuralSymbol, MensuralType};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// How much a well-placed note of each type is worth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthWeights {
    pub semibrevis: f64,
    pub minima: f64,
    pub semiminima: f64,
}

impl Default for StrengthWeights {
    fn default() -> Self {
        StrengthWeights {
            semibrevis: 1.0,
            minima: 0.5,
            semiminima: 0.25,
        }
    }
}

impl StrengthWeights {
    /// Fixed types never move, so they add nothing.
    pub fn weight(&self, mensural_type: MensuralType) -> f64 {
        match mensural_type {
            MensuralType::Semibrevis => self.semibrevis,
            MensuralType::Minima => self.minima,
            MensuralType::Semiminima => self.semiminima,
            MensuralType::Maxima | MensuralType::Longa | MensuralType::Brevis => 0.0,
        }
    }
}

/// Strength of a beat position under `grouping`. `beat` should already be
/// snapped.
pub fn beat_strength(grouping: Grouping, beat: f64) -> f64 {
    if beat.fract() != 0.0 {
        return match grouping {
            Grouping::Three => 1.0 / 9.0,
            Grouping::Four | Grouping::Six => 0.125,
        };
    }
    let b = beat as i64;
    match grouping {
        Grouping::Three => {
            if b.rem_euclid(3) == 0 {
                1.0
            } else {
                1.0 / 3.0
            }
        }
        Grouping::Four => match b.rem_euclid(4) {
            0 => 1.0,
            2 => 0.5,
            _ => 0.25,
        },
        Grouping::Six => {
            if b.rem_euclid(6) == 0 {
                1.0
            } else if b.rem_euclid(2) == 0 {
                0.5
            } else {
                0.25
            }
        }
    }
}

fn snap(beat: f64, tolerance: f64) -> f64 {
    let rounded = beat.round();
    if (beat - rounded).abs() < tolerance {
        rounded
    } else {
        beat
    }
}

/// Score with default weights and tolerance.
pub fn score(mode: &RhythmicMode, symbols: &[MensuralSymbol], lengths: &[f64]) -> f64 {
    score_with(
        mode,
        symbols,
        lengths,
        &StrengthWeights::default(),
        DEFAULT_TOLERANCE,
    )
}

pub fn score_with(
    mode: &RhythmicMode,
    symbols: &[MensuralSymbol],
    lengths: &[f64],
    weights: &StrengthWeights,
    tolerance: f64,
) -> f64 {
    let grouping = mode.grouping();
    let mut cur_beat = 0.0;
    let mut strength = 0.0;
    for (symbol, &length) in symbols.iter().zip(lengths) {
        cur_beat = snap(cur_beat, tolerance);
        strength += weights.weight(symbol.mensural_type()) * beat_strength(grouping, cur_beat);
        cur_beat += length;
    }
    strength - (mode.minima_per_brevis() - cur_beat).abs()
}
