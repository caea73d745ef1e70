//! Encoding oracle boundary: instruction text in, machine-code bytes out.
//!
//! The table generator never decides an encoding itself. It renders each
//! [`InstructionShape`] as assembly text and asks an [`Oracle`] for the
//! bytes. [`AsmRsOracle`] is the bundled oracle, backed by the pure-Rust
//! `asm-rs` assembler; any other assembler can be plugged in through the
//! trait.

use std::fmt;

use asm_rs::{Arch, Assembler, OptLevel};
use serde::{Deserialize, Serialize};

use crate::error::{Error, OracleError, SkipReason};
use crate::normalize::ByteSequence;
use crate::operand::InstructionShape;

/// Instruction-set architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// The x86 family.
    #[default]
    X86,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => f.write_str("x86"),
        }
    }
}

/// Execution mode within an architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// 16-bit real mode.
    Bits16,
    /// 32-bit protected mode.
    Bits32,
    /// 64-bit long mode.
    #[default]
    Bits64,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Bits16 => f.write_str("16-bit"),
            Mode::Bits32 => f.write_str("32-bit"),
            Mode::Bits64 => f.write_str("64-bit"),
        }
    }
}

/// Architecture and mode pair an oracle assembles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Instruction-set architecture.
    pub arch: Architecture,
    /// Execution mode.
    pub mode: Mode,
}

impl Target {
    /// x86 in 64-bit long mode.
    pub const X86_64: Target = Target {
        arch: Architecture::X86,
        mode: Mode::Bits64,
    };

    /// Create a target.
    #[must_use]
    pub fn new(arch: Architecture, mode: Mode) -> Self {
        Self { arch, mode }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.arch, self.mode)
    }
}

/// An authority that turns one instruction into machine code.
///
/// Implementations must be deterministic: the same text always yields
/// the same bytes. A rejection is an ordinary outcome, not a failure of
/// the run.
pub trait Oracle {
    /// Architecture and mode this oracle assembles for.
    fn target(&self) -> Target;

    /// Assemble a single instruction.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] with the oracle's diagnostic when the text is
    /// not a valid instruction for [`Oracle::target`].
    fn assemble(&self, text: &str) -> Result<Vec<u8>, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn target(&self) -> Target {
        (**self).target()
    }

    fn assemble(&self, text: &str) -> Result<Vec<u8>, OracleError> {
        (**self).assemble(text)
    }
}

/// Oracle backed by the `asm-rs` assembler.
///
/// Encoding optimizations are off by default so that the output matches
/// what a conventional assembler emits for the same text.
#[derive(Debug, Clone)]
pub struct AsmRsOracle {
    target: Target,
    arch: Arch,
    opt_level: OptLevel,
}

impl AsmRsOracle {
    /// Create an oracle for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTarget`] for modes `asm-rs` cannot
    /// select (16-bit).
    pub fn new(target: Target) -> Result<Self, Error> {
        let arch = match (target.arch, target.mode) {
            (Architecture::X86, Mode::Bits64) => Arch::X86_64,
            (Architecture::X86, Mode::Bits32) => Arch::X86,
            (arch, mode) => return Err(Error::UnsupportedTarget { arch, mode }),
        };
        Ok(Self {
            target,
            arch,
            opt_level: OptLevel::None,
        })
    }

    /// Let the assembler pick shorter encodings where it can.
    #[must_use]
    pub fn optimize(mut self, enabled: bool) -> Self {
        self.opt_level = if enabled {
            OptLevel::Size
        } else {
            OptLevel::None
        };
        self
    }
}

impl Oracle for AsmRsOracle {
    fn target(&self) -> Target {
        self.target
    }

    fn assemble(&self, text: &str) -> Result<Vec<u8>, OracleError> {
        let mut asm = Assembler::new(self.arch);
        asm.optimize(self.opt_level);
        asm.emit(text)
            .map_err(|e| OracleError::new(text, e.to_string()))?;
        let result = asm
            .finish()
            .map_err(|e| OracleError::new(text, e.to_string()))?;
        Ok(result.into_bytes())
    }
}

/// Resolve one shape to the oracle's full encoding.
///
/// `value` is substituted for the immediate operand, if the shape has one.
///
/// # Errors
///
/// Returns [`SkipReason::Rejected`] when the oracle rejects the text and
/// [`SkipReason::Empty`] when it succeeds without producing bytes.
pub fn resolve<O: Oracle + ?Sized>(
    oracle: &O,
    shape: &InstructionShape,
    value: u64,
) -> Result<ByteSequence, SkipReason> {
    let text = shape.render(value);
    let bytes = oracle.assemble(&text)?;
    ByteSequence::new(bytes).ok_or(SkipReason::Empty)
}
