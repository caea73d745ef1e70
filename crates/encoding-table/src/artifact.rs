//! The table artifact: one aggregate-initializer record per line.
//!
//! ```text
//! {{ x64_operation::mov, { x64_operand::rax, x64_operand::rbx } }, { 0x48, 0x89, 0xd8 } },
//! ```
//!
//! The file is a fragment meant to be pasted (or `#include`d) between the
//! braces of a static map initializer. Tokens may carry a scope prefix;
//! with no scopes the records are bare `{{ mov, { rax, rbx } }, { ... } },`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Error;
use crate::normalize::{ByteSequence, TableEntry};
use crate::operand::{InstructionShape, OperandKind, Operation};

/// Token syntax of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactFormat {
    /// Scope prefixed to operation tokens, joined with `::`. `None` or an
    /// empty string leaves tokens bare.
    pub operation_scope: Option<String>,
    /// Scope prefixed to operand-kind tokens, joined with `::`. `None` or
    /// an empty string leaves tokens bare.
    pub operand_scope: Option<String>,
}

impl Default for ArtifactFormat {
    fn default() -> Self {
        Self {
            operation_scope: Some(String::from("x64_operation")),
            operand_scope: Some(String::from("x64_operand")),
        }
    }
}

impl ArtifactFormat {
    /// Format with unqualified tokens.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            operation_scope: None,
            operand_scope: None,
        }
    }

    /// Render one record, including its trailing `,` but no newline.
    #[must_use]
    pub fn render_entry(&self, entry: &TableEntry) -> String {
        let operation = qualify(self.operation_scope.as_deref(), entry.shape.operation.mnemonic());
        let operands: Vec<String> = entry
            .shape
            .operands
            .iter()
            .map(|op| qualify(self.operand_scope.as_deref(), op.token()))
            .collect();
        let bytes: Vec<String> = entry
            .bytes
            .as_slice()
            .iter()
            .map(|b| format!("0x{:02x}", b))
            .collect();
        format!(
            "{{{{ {}, {{ {} }} }}, {{ {} }} }},",
            operation,
            operands.join(", "),
            bytes.join(", ")
        )
    }

    /// Render every entry, one newline-terminated record per line.
    #[must_use]
    pub fn render_table(&self, entries: &[TableEntry]) -> String {
        let mut out = String::new();
        for entry in entries {
            out.push_str(&self.render_entry(entry));
            out.push('\n');
        }
        out
    }

    /// Write the table to `path`.
    ///
    /// Records go to a temporary file next to `path`, which is renamed over
    /// `path` only after everything was written. On error `path` is left as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the temporary file cannot be created,
    /// written, or renamed.
    pub fn write_table(&self, path: &Path, entries: &[TableEntry]) -> Result<(), Error> {
        let io_err = |source: std::io::Error| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut out = BufWriter::new(&mut file);
            for entry in entries {
                writeln!(out, "{}", self.render_entry(entry)).map_err(io_err)?;
            }
            out.flush().map_err(io_err)?;
        }
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Parse one record.
    ///
    /// # Errors
    ///
    /// Returns a description of the first syntax or vocabulary problem.
    pub fn parse_record(&self, line: &str) -> Result<TableEntry, String> {
        let tokens = tokenize(line)?;
        let mut p = RecordParser {
            tokens: &tokens,
            pos: 0,
        };

        p.expect(Token::Open)?;
        p.expect(Token::Open)?;
        let operation = p.word()?;
        let operation = unqualify(self.operation_scope.as_deref(), operation)?
            .parse::<Operation>()
            .map_err(|e: Error| e.to_string())?;
        p.expect(Token::Comma)?;
        p.expect(Token::Open)?;
        let mut operands = Vec::new();
        for word in p.list()? {
            let kind = unqualify(self.operand_scope.as_deref(), word)?
                .parse::<OperandKind>()
                .map_err(|e: Error| e.to_string())?;
            operands.push(kind);
        }
        p.expect(Token::Close)?;
        p.expect(Token::Close)?;
        p.expect(Token::Comma)?;
        p.expect(Token::Open)?;
        let mut bytes = Vec::new();
        for word in p.list()? {
            bytes.push(parse_byte(word)?);
        }
        p.expect(Token::Close)?;
        p.expect(Token::Close)?;
        p.expect(Token::Comma)?;
        if p.pos != tokens.len() {
            return Err(String::from("trailing input after record"));
        }

        let bytes = ByteSequence::new(bytes).ok_or_else(|| String::from("empty byte list"))?;
        Ok(TableEntry {
            shape: InstructionShape::new(operation, operands),
            bytes,
        })
    }

    /// Parse a whole artifact. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] with the 1-based line of the first bad
    /// record.
    pub fn parse_table(&self, text: &str) -> Result<Vec<TableEntry>, Error> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                self.parse_record(line)
                    .map_err(|message| Error::Parse { line: i + 1, message })
            })
            .collect()
    }

    /// Read and parse the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Parse`] if a record is malformed.
    pub fn read_table(&self, path: &Path) -> Result<Vec<TableEntry>, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_table(&text)
    }
}

fn qualify(scope: Option<&str>, token: &str) -> String {
    match scope.filter(|s| !s.is_empty()) {
        Some(scope) => format!("{}::{}", scope, token),
        None => String::from(token),
    }
}

fn unqualify<'t>(scope: Option<&str>, word: &'t str) -> Result<&'t str, String> {
    match scope.filter(|s| !s.is_empty()) {
        Some(scope) => word
            .strip_prefix(scope)
            .and_then(|rest| rest.strip_prefix("::"))
            .ok_or_else(|| format!("expected '{}::' token, found '{}'", scope, word)),
        None => Ok(word),
    }
}

fn parse_byte(word: &str) -> Result<u8, String> {
    let digits = word
        .strip_prefix("0x")
        .filter(|d| d.len() == 2)
        .ok_or_else(|| format!("expected two-digit 0x byte, found '{}'", word))?;
    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid byte '{}'", word))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    Comma,
    Word(&'a str),
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Open => String::from("'{'"),
            Token::Close => String::from("'}'"),
            Token::Comma => String::from("','"),
            Token::Word(w) => format!("'{}'", w),
        }
    }
}

fn tokenize(line: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            '{' => {
                tokens.push(Token::Open);
                chars.next();
            }
            '}' => {
                tokens.push(Token::Close);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == ':' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(&line[start..end]));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct RecordParser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'a> RecordParser<'_, 'a> {
    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, want: Token<'static>) -> Result<(), String> {
        match self.next() {
            Some(found) if found == want => Ok(()),
            Some(found) => Err(format!(
                "expected {}, found {}",
                want.describe(),
                found.describe()
            )),
            None => Err(format!("expected {}, found end of line", want.describe())),
        }
    }

    fn word(&mut self) -> Result<&'a str, String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(found) => Err(format!("expected identifier, found {}", found.describe())),
            None => Err(String::from("expected identifier, found end of line")),
        }
    }

    /// Comma-separated words up to (not including) the closing brace.
    fn list(&mut self) -> Result<Vec<&'a str>, String> {
        let mut words = vec![self.word()?];
        while self.tokens.get(self.pos) == Some(&Token::Comma) {
            self.pos += 1;
            words.push(self.word()?);
        }
        Ok(words)
    }
}
