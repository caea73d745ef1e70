//! Enumeration of the operand space of one operation.
//!
//! Order is part of the output contract: first every `dst, src` register
//! pair (destination-major, vocabulary order, `dst == src` included),
//! then for each register every immediate class in declared order.

use std::iter::FusedIterator;

use crate::operand::{ImmediateClass, InstructionShape, Operation, Register};

/// The shapes one operation is tried with.
#[derive(Debug, Clone, Copy)]
pub struct OperandSpace<'a> {
    operation: Operation,
    registers: &'a [Register],
    immediates: &'a [ImmediateClass],
}

impl<'a> OperandSpace<'a> {
    /// Operand space over `registers`, with the immediate classes the
    /// operation declares.
    #[must_use]
    pub fn new(operation: Operation, registers: &'a [Register]) -> Self {
        Self {
            operation,
            registers,
            immediates: operation.immediate_classes(),
        }
    }

    /// Replace the immediate classes.
    #[must_use]
    pub fn with_immediates(mut self, immediates: &'a [ImmediateClass]) -> Self {
        self.immediates = immediates;
        self
    }

    /// The operation being enumerated.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Total number of shapes: `N² + N·K`.
    #[must_use]
    pub fn len(&self) -> usize {
        let n = self.registers.len();
        n * n + n * self.immediates.len()
    }

    /// Whether there is nothing to enumerate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the shapes in table order. The iterator is cheap to clone,
    /// and calling this again restarts from the first shape.
    #[must_use]
    pub fn shapes(&self) -> Shapes<'a> {
        Shapes {
            space: *self,
            next: 0,
        }
    }

    fn shape_at(&self, index: usize) -> InstructionShape {
        let n = self.registers.len();
        let pairs = n * n;
        if index < pairs {
            let dst = self.registers[index / n];
            let src = self.registers[index % n];
            InstructionShape::register_pair(self.operation, dst, src)
        } else {
            let k = self.immediates.len();
            let offset = index - pairs;
            let dst = self.registers[offset / k];
            let class = self.immediates[offset % k];
            InstructionShape::register_immediate(self.operation, dst, class)
        }
    }
}

impl<'a> IntoIterator for OperandSpace<'a> {
    type Item = InstructionShape;
    type IntoIter = Shapes<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes()
    }
}

/// Iterator over an [`OperandSpace`].
#[derive(Debug, Clone)]
pub struct Shapes<'a> {
    space: OperandSpace<'a>,
    next: usize,
}

impl Iterator for Shapes<'_> {
    type Item = InstructionShape;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.space.len() {
            return None;
        }
        let shape = self.space.shape_at(self.next);
        self.next += 1;
        Some(shape)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.space.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Shapes<'_> {}

impl FusedIterator for Shapes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rendered(space: &OperandSpace<'_>) -> Vec<String> {
        space.shapes().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_registers_give_four_pairs_then_two_immediates() {
        let regs = [Register::Rax, Register::Rbx];
        let space = OperandSpace::new(Operation::Mov, &regs);
        assert_eq!(
            rendered(&space),
            vec![
                "mov rax, rax",
                "mov rax, rbx",
                "mov rbx, rax",
                "mov rbx, rbx",
                "mov rax, imm64",
                "mov rbx, imm64",
            ]
        );
        assert_eq!(space.len(), 6);
    }

    #[test]
    fn immediate_pass_is_register_major() {
        let regs = [Register::R8, Register::Rsp];
        let space = OperandSpace::new(Operation::Sub, &regs);
        let tail: Vec<String> = space.shapes().skip(4).map(|s| s.to_string()).collect();
        assert_eq!(
            tail,
            vec!["sub r8, imm8", "sub r8, imm32", "sub rsp, imm8", "sub rsp, imm32"]
        );
    }

    #[test]
    fn full_vocabulary_counts() {
        let space = OperandSpace::new(Operation::Mov, &Register::ALL);
        assert_eq!(space.shapes().count(), 16 * 16 + 16);
        let arith = OperandSpace::new(Operation::Add, &Register::ALL);
        assert_eq!(arith.shapes().len(), 16 * 16 + 16 * 2);
    }

    #[test]
    fn shapes_restart_and_clone() {
        let regs = [Register::Rcx, Register::Rdx, Register::Rsi];
        let space = OperandSpace::new(Operation::Cmp, &regs);
        let mut first = space.shapes();
        first.next();
        let resumed: Vec<_> = first.clone().collect();
        let again: Vec<_> = space.shapes().skip(1).collect();
        assert_eq!(resumed, again);
        assert_eq!(first.len(), space.len() - 1);
    }

    #[test]
    fn without_immediates_only_pairs_remain() {
        let regs = [Register::Rax, Register::R15];
        let space = OperandSpace::new(Operation::Mov, &regs).with_immediates(&[]);
        assert_eq!(space.len(), 4);
        assert!(space.shapes().all(|s| s.immediate().is_none()));
    }

    #[test]
    fn empty_vocabulary_is_empty() {
        let space = OperandSpace::new(Operation::Mov, &[]);
        assert!(space.is_empty());
        assert_eq!(space.shapes().next(), None);
    }
}
