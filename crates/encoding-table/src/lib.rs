//! # encoding-table: x86-64 Encoding Table Generator
//!
//! `encoding-table` builds the static lookup table a template code emitter
//! uses to produce machine code without knowing x86-64 encoding rules.
//! Each record maps an instruction *shape* (operation + operand kinds) to
//! its canonical bytes. The bytes come from an assembler oracle, so the
//! generator only enumerates, normalizes, and serializes.
//!
//! ## Quick Start
//!
//! ```rust
//! use encoding_table::{Generator, GeneratorConfig, Register};
//!
//! let config = GeneratorConfig {
//!     registers: vec![Register::Rax, Register::Rbx],
//!     ..GeneratorConfig::default()
//! };
//! let table = Generator::from_config(config)?.build()?;
//!
//! // 2² register pairs + 2 imm64 moves
//! assert_eq!(table.entries.len(), 6);
//! assert_eq!(table.entries[1].bytes.as_slice(), &[0x48, 0x89, 0xd8]); // mov rax, rbx
//! assert_eq!(table.entries[4].bytes.as_slice(), &[0x48, 0xb8]); // mov rax, imm64
//! # Ok::<(), encoding_table::Error>(())
//! ```
//!
//! ## Pipeline
//!
//! - **Enumerate**: [`OperandSpace`] yields every register pair, then every
//!   register/immediate-class combination, in a fixed order.
//! - **Resolve**: an [`Oracle`] assembles the rendered text. Rejections are
//!   recorded as [`Skipped`] and the run continues.
//! - **Normalize**: immediate encodings are cut to the prefix that does not
//!   depend on the value, then re-checked with probe values.
//! - **Emit**: [`ArtifactFormat`] writes one initializer record per line,
//!   atomically.

#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Byte tables are written as dense hex literals, and the vocabulary
// types repeat the module name in their identifiers on purpose.
#![allow(
    clippy::unreadable_literal,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args,
    clippy::doc_markdown
)]

/// Table artifact syntax: render, parse, atomic write.
pub mod artifact;
/// Operand-space enumeration.
pub mod enumerate;
/// Error types and per-shape skip reasons.
pub mod error;
/// The generation pipeline and its configuration.
pub mod generator;
/// Normalization of oracle output into table entries.
pub mod normalize;
/// Registers, immediate classes, operations, and instruction shapes.
pub mod operand;
/// The assembler oracle boundary.
pub mod oracle;

// Re-exports
pub use artifact::ArtifactFormat;
pub use enumerate::{OperandSpace, Shapes};
pub use error::{Error, OracleError, SkipReason};
pub use generator::{generate, GenerationReport, Generator, GeneratorConfig, Skipped, Table};
pub use normalize::{check_fixed_prefix, normalize, ByteSequence, TableEntry};
pub use operand::{ImmediateClass, InstructionShape, OperandKind, Operation, Register};
pub use oracle::{resolve, Architecture, AsmRsOracle, Mode, Oracle, Target};
