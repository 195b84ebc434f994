// Trecento mensural duration engine
//
// Reads Italian Trecento divisione notation and works out how long each
// note and rest lasts, in minimae. The same written semibrevis can be worth
// two, three or four minimae depending on the rhythmic mode and on what
// surrounds it, so durations are resolved one measure at a time: every
// legal reading of the measure is enumerated and the one that fills the
// measure with the strongest metrical placement wins.
//
// Architecture:
// - pitch.rs: Diatonic pitches ("A4", "B-4") used by notes and ligatures
// - symbol.rs: Notes and rests with mensural type, stems, flags and color
// - mode.rs: The six divisiones and the four French mensuration signs
// - ligature.rs: Bound figures, their editing rules, and expansion to notes
// - document.rs: The ordered tree of symbols, punctus marks, mode
//   declarations, ligatures and containers, with a JSON form
// - strength.rs: Metrical strength score for one candidate reading
// - resolver.rs: Enumerates readings of one measure and picks the best
// - locator.rs: Finds the governing mode and measure of a position, caches
//   resolutions per measure, resolves whole documents in parallel
// - config.rs: Engine tunables loaded from JSON
// - error.rs: The engine's error type
//
// Resolution is deterministic: the same measure under the same mode and
// config always yields the same lengths.

pub mod config;
pub mod document;
pub mod error;
pub mod ligature;
pub mod locator;
pub mod mode;
pub mod pitch;
pub mod resolver;
pub mod strength;
pub mod symbol;

pub use config::EngineConfig;
pub use document::{Document, Node, NodeId};
pub use error::{MensuralError, Result};
pub use locator::{Locator, Measure, Position};
pub use mode::{Divisione, RhythmicMode};
pub use resolver::{Resolution, Resolver, resolve};
pub use symbol::{MensuralSymbol, MensuralType};
