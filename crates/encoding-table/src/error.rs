//! Error types: fatal generator errors and per-shape skip reasons.
//!
//! Only [`Error`] aborts a run. An oracle rejection or a malformed
//! encoding is a [`SkipReason`] attached to the shape it concerns; the
//! generator records it and moves on.

use std::path::PathBuf;

use thiserror::Error;

use crate::operand::{Operation, Register};
use crate::oracle::{Architecture, Mode, Target};

/// Error that aborts a generation run.
#[derive(Debug, Error)]
pub enum Error {
    /// The oracle cannot assemble for the requested architecture and mode.
    #[error("unsupported target: {arch} in {mode} mode")]
    UnsupportedTarget {
        /// Requested architecture.
        arch: Architecture,
        /// Requested execution mode.
        mode: Mode,
    },

    /// The configured target and the oracle's target disagree.
    #[error("oracle assembles for {found}, but the configuration asks for {expected}")]
    TargetMismatch {
        /// Target named by the configuration.
        expected: Target,
        /// Target the oracle was built for.
        found: Target,
    },

    /// A vocabulary that drives enumeration is empty.
    #[error("empty {what} vocabulary")]
    EmptyVocabulary {
        /// Which vocabulary ("register" or "operation").
        what: &'static str,
    },

    /// A register appears twice in the vocabulary.
    #[error("register '{register}' listed more than once")]
    DuplicateRegister {
        /// The repeated register.
        register: Register,
    },

    /// An operation appears twice in the vocabulary.
    #[error("operation '{operation}' listed more than once")]
    DuplicateOperation {
        /// The repeated operation.
        operation: Operation,
    },

    /// A token is not part of the closed vocabulary.
    #[error("unknown {kind} '{token}'")]
    UnknownToken {
        /// Vocabulary the token was looked up in.
        kind: &'static str,
        /// The offending token.
        token: String,
    },

    /// A table record could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the record.
        message: String,
    },

    /// The configuration file is not valid TOML for [`GeneratorConfig`](crate::GeneratorConfig).
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Reading or writing a file failed.
    #[error("{}: {}", path.display(), source)]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Rejection reported by an [`Oracle`](crate::Oracle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{text}`: {reason}")]
pub struct OracleError {
    /// Instruction text that was submitted.
    pub text: String,
    /// The oracle's diagnostic.
    pub reason: String,
}

impl OracleError {
    /// Create a rejection for `text`.
    pub fn new(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// Why a shape was left out of the table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The oracle rejected the instruction text.
    #[error("rejected by oracle: {0}")]
    Rejected(#[from] OracleError),

    /// The oracle reported success but produced no bytes.
    #[error("oracle returned no bytes")]
    Empty,

    /// The encoding is too short to contain the immediate.
    #[error("encoding of {len} bytes cannot hold a {width}-byte immediate")]
    ImmediateTooShort {
        /// Length of the oracle output.
        len: usize,
        /// Declared width of the immediate class.
        width: usize,
    },

    /// The trailing bytes are not the immediate that was assembled.
    #[error("trailing bytes {found:02x?} do not encode immediate {expected:02x?}")]
    ImmediateMismatch {
        /// Little-endian immediate that was rendered.
        expected: Vec<u8>,
        /// Trailing bytes of the oracle output.
        found: Vec<u8>,
    },

    /// A probe value changed the bytes the table would store.
    #[error("probe {value:#x} encodes as {found:02x?}, not as fixed prefix {expected:02x?} plus immediate")]
    UnstablePrefix {
        /// Probe immediate value.
        value: u64,
        /// Prefix recorded from the placeholder encoding.
        expected: Vec<u8>,
        /// Full oracle output for the probe.
        found: Vec<u8>,
    },
}
