//! Error taxonomy shared by the codec, the sequencer and the vehicle model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a design cannot be decoded or assembled.
///
/// Every variant aborts the evaluation with a `Failure` result carrying
/// sentinel metrics; none of them is retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DesignError {
    /// A node or edge token does not follow the grammar.
    #[error("invalid grammar in token `{token}`: {reason}")]
    InvalidGrammar { token: String, reason: &'static str },

    /// A position character lies outside the `A`..=`Y` alphabet.
    #[error("position symbol `{symbol}` is outside the [-12, 12] grid")]
    OutOfRange { symbol: char },

    /// More node ids were requested than the id alphabet can name.
    #[error("design needs more than {limit} node ids")]
    CapacityExceeded { limit: usize },

    /// The assembled vehicle has no structural component to fly from.
    #[error("design has no structure component")]
    NoStructure,

    /// A field of the numeric suffix could not be parsed.
    #[error("could not parse numeric field `{field}`")]
    NumericParseFailure { field: &'static str },
}

/// Loop that hit its iteration bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CutoffStage {
    /// Too many sequenced edges; the tail was not built.
    Sequencing,
    /// A component size needed more steps than allowed.
    Sizing,
    /// The greedy connection pass stopped with components still loose.
    Connectivity,
}

/// Non-fatal signal raised when a bounded loop stops early.
///
/// The evaluation carries on with the partial result; the signal is kept so
/// callers and tests can tell a truncated build from a complete one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSafetyCutoff {
    pub stage: CutoffStage,
    pub limit: usize,
}
