// Error taxonomy for the mensural engine.
//
// Every failure the engine can report is a variant of `MensuralError`. The
// engine never substitutes a default when a measure cannot be resolved: a
// missing mode, an unsupported notation family or an impossible budget all
// surface here so callers can decide what to do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MensuralError {
    /// A stem, flag or side stem that the symbol's type does not allow.
    #[error("invalid decoration: {0}")]
    InvalidDecoration(String),
    /// A ligature edit (oblique, stem, maxima, reverse) that breaks the
    /// ligature rules, or a ligature too short to expand.
    #[error("invalid ligature: {0}")]
    InvalidLigature(String),
    #[error("invalid pitch: {0:?}")]
    InvalidPitch(String),
    #[error("unknown mensural type: {0:?}")]
    UnknownMensuralType(String),
    #[error("unknown rhythmic mode: {0:?}")]
    UnknownMode(String),
    /// No rhythmic mode precedes the symbol in any enclosing container.
    #[error("no rhythmic mode governs {0}")]
    UnresolvableContext(String),
    /// The governing mode belongs to a family the resolver does not handle.
    #[error("unsupported rhythmic mode: {0}")]
    UnsupportedMode(String),
    /// Down-stemmed minima or semiminima.
    #[error("dragma at measure index {0} is not supported")]
    UnsupportedDragma(usize),
    #[error("measure cannot be reconciled with {budget} minima: {reason}")]
    UnreconcilableMeasure { budget: f64, reason: String },
    #[error("node not found: {0}")]
    NodeNotFound(usize),
    #[error("position {index} out of range in container {parent}")]
    InvalidPosition { parent: usize, index: usize },
    #[error("node {0} is a container")]
    ContainerNode(usize),
    #[error("measure has no symbols")]
    EmptyMeasure,
    /// A thread panicked while holding the measure cache lock.
    #[error("measure cache lock poisoned")]
    CachePoisoned,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MensuralError>;
