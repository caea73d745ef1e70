//! Turns oracle output into table entries.
//!
//! Register-to-register encodings are stored verbatim. Encodings with an
//! immediate source are cut down to the bytes that stay the same for
//! every value of the immediate: the runtime emitter appends the value
//! itself.

use std::fmt;

use crate::error::SkipReason;
use crate::operand::InstructionShape;
use crate::oracle::{resolve, Oracle};

/// Non-empty machine-code fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteSequence(Vec<u8>);

impl ByteSequence {
    /// Wrap `bytes`, or `None` if it is empty.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    /// The bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes (never zero).
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Consume and return the bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for ByteSequence {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// One row of the generated table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableEntry {
    /// The key.
    pub shape: InstructionShape,
    /// The encoding, or its fixed prefix for immediate shapes.
    pub bytes: ByteSequence,
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.shape, self.bytes)
    }
}

/// Build the table entry for `shape` from the oracle's full `encoding`.
///
/// `value` is the immediate that was rendered into the instruction text;
/// it is ignored for shapes without an immediate.
///
/// # Errors
///
/// For immediate shapes, fails with [`SkipReason::ImmediateTooShort`] if
/// the encoding has no room for the immediate, and with
/// [`SkipReason::ImmediateMismatch`] if its trailing bytes are not the
/// rendered value.
pub fn normalize(
    shape: InstructionShape,
    encoding: ByteSequence,
    value: u64,
) -> Result<TableEntry, SkipReason> {
    let Some(class) = shape.immediate() else {
        return Ok(TableEntry {
            shape,
            bytes: encoding,
        });
    };

    let width = class.width();
    let len = encoding.len();
    if len <= width {
        return Err(SkipReason::ImmediateTooShort { len, width });
    }

    let (prefix, trailing) = encoding.as_slice().split_at(len - width);
    let expected = class.encode(value);
    if trailing != expected.as_slice() {
        return Err(SkipReason::ImmediateMismatch {
            expected,
            found: trailing.to_vec(),
        });
    }

    let bytes = ByteSequence::new(prefix.to_vec()).ok_or(SkipReason::Empty)?;
    Ok(TableEntry { shape, bytes })
}

/// Re-assemble an immediate entry with every probe value of its class and
/// check that each result is the stored prefix followed by the immediate.
///
/// Entries without an immediate pass trivially.
///
/// # Errors
///
/// Returns the oracle's rejection of a probe, or
/// [`SkipReason::UnstablePrefix`] when a probe encodes differently.
pub fn check_fixed_prefix<O: Oracle + ?Sized>(
    oracle: &O,
    entry: &TableEntry,
) -> Result<(), SkipReason> {
    let Some(class) = entry.shape.immediate() else {
        return Ok(());
    };
    let prefix = entry.bytes.as_slice();
    for &value in class.probes() {
        let probe = resolve(oracle, &entry.shape, value)?;
        let stable = probe.len() == prefix.len() + class.width()
            && probe.as_slice().starts_with(prefix)
            && probe.as_slice()[prefix.len()..] == class.encode(value)[..];
        if !stable {
            return Err(SkipReason::UnstablePrefix {
                value,
                expected: prefix.to_vec(),
                found: probe.into_vec(),
            });
        }
    }
    Ok(())
}
