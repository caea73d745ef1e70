//! Closed operand vocabularies and the instruction-shape table key.
//!
//! Every token that can appear in a generated table lives here: the
//! sixteen 64-bit general-purpose registers, the immediate classes, and
//! the operations. An [`InstructionShape`] combines them into the key of
//! one table entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 64-bit general-purpose register.
///
/// Variant order is the declared enumeration order of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    /// Accumulator.
    Rax,
    /// Base.
    Rbx,
    /// Counter.
    Rcx,
    /// Data.
    Rdx,
    /// Source index.
    Rsi,
    /// Destination index.
    Rdi,
    /// Frame pointer.
    Rbp,
    /// Stack pointer.
    Rsp,
    /// Extended register r8.
    R8,
    /// Extended register r9.
    R9,
    /// Extended register r10.
    R10,
    /// Extended register r11.
    R11,
    /// Extended register r12.
    R12,
    /// Extended register r13.
    R13,
    /// Extended register r14.
    R14,
    /// Extended register r15.
    R15,
}

impl Register {
    /// All registers in declared order.
    pub const ALL: [Register; 16] = [
        Register::Rax,
        Register::Rbx,
        Register::Rcx,
        Register::Rdx,
        Register::Rsi,
        Register::Rdi,
        Register::Rbp,
        Register::Rsp,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    /// Lowercase assembly name, also used as the table token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rsi => "rsi",
            Register::Rdi => "rdi",
            Register::Rbp => "rbp",
            Register::Rsp => "rsp",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Register {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .iter()
            .copied()
            .find(|r| r.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownToken {
                kind: "register",
                token: String::from(s),
            })
    }
}

/// Immediate operand class.
///
/// Each class declares how many trailing bytes its value occupies in an
/// encoding. Everything before those bytes is the fixed prefix that the
/// table stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImmediateClass {
    /// Sign-extended 8-bit immediate.
    Imm8,
    /// Sign-extended 32-bit immediate.
    Imm32,
    /// Full 64-bit immediate.
    Imm64,
}

impl ImmediateClass {
    /// All classes in declared order.
    pub const ALL: [ImmediateClass; 3] = [
        ImmediateClass::Imm8,
        ImmediateClass::Imm32,
        ImmediateClass::Imm64,
    ];

    /// Table token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            ImmediateClass::Imm8 => "imm8",
            ImmediateClass::Imm32 => "imm32",
            ImmediateClass::Imm64 => "imm64",
        }
    }

    /// Number of trailing encoding bytes taken by the immediate value.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            ImmediateClass::Imm8 => 1,
            ImmediateClass::Imm32 => 4,
            ImmediateClass::Imm64 => 8,
        }
    }

    /// Value substituted for the operand when rendering instruction text.
    ///
    /// Large enough that an assembler cannot pick a narrower form.
    #[must_use]
    pub fn placeholder(self) -> u64 {
        match self {
            ImmediateClass::Imm8 => 0x12,
            ImmediateClass::Imm32 => 0x1234_5678,
            ImmediateClass::Imm64 => 0x1234_5678_9abc_def0,
        }
    }

    /// Alternative values used to check that the fixed prefix does not
    /// depend on the immediate.
    #[must_use]
    pub fn probes(self) -> &'static [u64] {
        match self {
            ImmediateClass::Imm8 => &[0x5a, 0x7f],
            ImmediateClass::Imm32 => &[0x7edc_ba98, 0x4000_0001],
            ImmediateClass::Imm64 => &[0x0fed_cba9_8765_4321, 0x7fff_ffff_ffff_fffe],
        }
    }

    /// Little-endian bytes of `value` as they trail an encoding of this class.
    #[must_use]
    pub fn encode(self, value: u64) -> Vec<u8> {
        value.to_le_bytes()[..self.width()].to_vec()
    }
}

impl fmt::Display for ImmediateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ImmediateClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImmediateClass::ALL
            .iter()
            .copied()
            .find(|c| c.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownToken {
                kind: "immediate class",
                token: String::from(s),
            })
    }
}

/// Instruction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Data move.
    Mov,
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Compare (subtraction that only sets flags).
    Cmp,
}

impl Operation {
    /// All operations in declared order.
    pub const ALL: [Operation; 4] = [
        Operation::Mov,
        Operation::Add,
        Operation::Sub,
        Operation::Cmp,
    ];

    /// Lowercase mnemonic, also used as the table token.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Operation::Mov => "mov",
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Cmp => "cmp",
        }
    }

    /// Immediate classes accepted as source when the destination is a
    /// 64-bit register.
    #[must_use]
    pub fn immediate_classes(self) -> &'static [ImmediateClass] {
        match self {
            Operation::Mov => &[ImmediateClass::Imm64],
            Operation::Add | Operation::Sub | Operation::Cmp => {
                &[ImmediateClass::Imm8, ImmediateClass::Imm32]
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownToken {
                kind: "operation",
                token: String::from(s),
            })
    }
}

/// Architectural role of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperandKind {
    /// A specific register.
    Register(Register),
    /// Any value of an immediate class.
    Immediate(ImmediateClass),
}

impl OperandKind {
    /// Table token.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            OperandKind::Register(r) => r.token(),
            OperandKind::Immediate(c) => c.token(),
        }
    }
}

impl From<Register> for OperandKind {
    fn from(r: Register) -> Self {
        OperandKind::Register(r)
    }
}

impl From<ImmediateClass> for OperandKind {
    fn from(c: ImmediateClass) -> Self {
        OperandKind::Immediate(c)
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for OperandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(r) = s.parse::<Register>() {
            return Ok(OperandKind::Register(r));
        }
        s.parse::<ImmediateClass>()
            .map(OperandKind::Immediate)
            .map_err(|_| Error::UnknownToken {
                kind: "operand kind",
                token: String::from(s),
            })
    }
}

/// Operation plus its ordered operand-kind signature: the key of a table
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionShape {
    /// The operation.
    pub operation: Operation,
    /// Operand kinds, destination first.
    pub operands: Vec<OperandKind>,
}

impl InstructionShape {
    /// Create a shape from an arbitrary operand list.
    #[must_use]
    pub fn new(operation: Operation, operands: Vec<OperandKind>) -> Self {
        Self {
            operation,
            operands,
        }
    }

    /// `op dst, src` with two registers.
    #[must_use]
    pub fn register_pair(operation: Operation, dst: Register, src: Register) -> Self {
        Self::new(operation, vec![dst.into(), src.into()])
    }

    /// `op dst, imm` with a register destination.
    #[must_use]
    pub fn register_immediate(operation: Operation, dst: Register, class: ImmediateClass) -> Self {
        Self::new(operation, vec![dst.into(), class.into()])
    }

    /// The immediate class of this shape, if any operand is an immediate.
    #[must_use]
    pub fn immediate(&self) -> Option<ImmediateClass> {
        self.operands.iter().find_map(|op| match op {
            OperandKind::Immediate(c) => Some(*c),
            OperandKind::Register(_) => None,
        })
    }

    /// Render as Intel-syntax instruction text, substituting `value` for
    /// an immediate operand.
    ///
    /// # Examples
    ///
    /// ```
    /// use encoding_table::{ImmediateClass, InstructionShape, Operation, Register};
    ///
    /// let shape = InstructionShape::register_immediate(
    ///     Operation::Mov,
    ///     Register::Rax,
    ///     ImmediateClass::Imm64,
    /// );
    /// assert_eq!(shape.render(0x1234_5678_9abc_def0), "mov rax, 0x123456789abcdef0");
    /// ```
    #[must_use]
    pub fn render(&self, value: u64) -> String {
        let operands: Vec<String> = self
            .operands
            .iter()
            .map(|op| match op {
                OperandKind::Register(r) => String::from(r.token()),
                OperandKind::Immediate(_) => format!("{:#x}", value),
            })
            .collect();
        format!("{} {}", self.operation.mnemonic(), operands.join(", "))
    }
}

impl fmt::Display for InstructionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        Ok(())
    }
}
