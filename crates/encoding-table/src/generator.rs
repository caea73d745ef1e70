//! The generation pipeline: enumerate, resolve, normalize, write.
//!
//! Every shape of every configured operation is resolved in enumeration
//! order. Shapes the oracle cannot encode are recorded as [`Skipped`] and
//! never abort the run; only configuration and I/O problems do.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactFormat;
use crate::enumerate::OperandSpace;
use crate::error::{Error, SkipReason};
use crate::normalize::{check_fixed_prefix, normalize, TableEntry};
use crate::operand::{InstructionShape, Operation, Register};
use crate::oracle::{resolve, AsmRsOracle, Oracle, Target};

/// Everything a generation run depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Artifact destination.
    pub output: PathBuf,
    /// Register vocabulary, in enumeration order.
    pub registers: Vec<Register>,
    /// Operations to enumerate, in output order.
    pub operations: Vec<Operation>,
    /// Architecture and mode handed to the oracle.
    pub target: Target,
    /// Allow the bundled oracle to pick shorter encodings.
    pub optimize: bool,
    /// Re-assemble immediate shapes with probe values before accepting
    /// their prefix.
    pub verify_immediates: bool,
    /// Record syntax.
    pub format: ArtifactFormat,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(Self::DEFAULT_OUTPUT),
            registers: Register::ALL.to_vec(),
            operations: vec![Operation::Mov],
            target: Target::X86_64,
            optimize: false,
            verify_immediates: true,
            format: ArtifactFormat::default(),
        }
    }
}

impl GeneratorConfig {
    /// Output file name used when none is configured.
    pub const DEFAULT_OUTPUT: &'static str = "x64_mov_combinations.txt";

    /// Parse a TOML configuration. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed TOML or unknown keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use encoding_table::{GeneratorConfig, Operation, Register};
    ///
    /// let config = GeneratorConfig::from_toml_str(
    ///     r#"
    ///     output = "mov_rax_rbx.inc"
    ///     registers = ["rax", "rbx"]
    ///     operations = ["mov"]
    ///     "#,
    /// )?;
    /// assert_eq!(config.registers, vec![Register::Rax, Register::Rbx]);
    /// assert_eq!(config.operations, vec![Operation::Mov]);
    /// assert!(config.verify_immediates);
    /// # Ok::<(), encoding_table::Error>(())
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it does not parse.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the vocabularies before any oracle call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyVocabulary`] for an empty register or
    /// operation list, and [`Error::DuplicateRegister`] /
    /// [`Error::DuplicateOperation`] when an entry repeats (repeats would
    /// produce duplicate table keys).
    pub fn validate(&self) -> Result<(), Error> {
        if self.registers.is_empty() {
            return Err(Error::EmptyVocabulary { what: "register" });
        }
        if self.operations.is_empty() {
            return Err(Error::EmptyVocabulary { what: "operation" });
        }
        let mut seen = HashSet::new();
        for &register in &self.registers {
            if !seen.insert(register) {
                return Err(Error::DuplicateRegister { register });
            }
        }
        let mut seen = HashSet::new();
        for &operation in &self.operations {
            if !seen.insert(operation) {
                return Err(Error::DuplicateOperation { operation });
            }
        }
        Ok(())
    }

    /// Number of shapes a run will attempt.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.operations
            .iter()
            .map(|&op| OperandSpace::new(op, &self.registers).len())
            .sum()
    }
}

/// A shape left out of the table, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// The shape.
    pub shape: InstructionShape,
    /// Why it was skipped.
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.shape, self.reason)
    }
}

/// Resolved table, before it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Entries in enumeration order.
    pub entries: Vec<TableEntry>,
    /// Skipped shapes in enumeration order.
    pub skipped: Vec<Skipped>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
#[must_use]
pub struct GenerationReport {
    /// Where the artifact was written.
    pub output: PathBuf,
    /// Number of records written.
    pub entries: usize,
    /// Shapes that were left out.
    pub skipped: Vec<Skipped>,
}

impl GenerationReport {
    /// Whether every enumerated shape made it into the table.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Number of shapes that were tried.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.entries + self.skipped.len()
    }
}

/// Drives one oracle through the configured operand space.
#[derive(Debug)]
pub struct Generator<O> {
    config: GeneratorConfig,
    oracle: O,
}

impl Generator<AsmRsOracle> {
    /// Generator backed by the bundled `asm-rs` oracle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTarget`] or a validation error from
    /// [`GeneratorConfig::validate`].
    pub fn from_config(config: GeneratorConfig) -> Result<Self, Error> {
        let oracle = AsmRsOracle::new(config.target)?.optimize(config.optimize);
        Self::new(config, oracle)
    }
}

impl<O: Oracle> Generator<O> {
    /// Pair a configuration with an oracle.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`GeneratorConfig::validate`], or
    /// [`Error::TargetMismatch`] when the oracle assembles for a different
    /// target than configured.
    pub fn new(config: GeneratorConfig, oracle: O) -> Result<Self, Error> {
        config.validate()?;
        if oracle.target() != config.target {
            return Err(Error::TargetMismatch {
                expected: config.target,
                found: oracle.target(),
            });
        }
        Ok(Self { config, oracle })
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The oracle.
    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Resolve every shape without writing anything.
    ///
    /// Keys are unique because [`GeneratorConfig::validate`] rejects
    /// repeated registers and operations.
    ///
    /// # Errors
    ///
    /// None at present. Per-shape failures land in [`Table::skipped`].
    pub fn build(&self) -> Result<Table, Error> {
        let mut table = Table::default();

        for &operation in &self.config.operations {
            let space = OperandSpace::new(operation, &self.config.registers);
            debug!("enumerating {} shapes for {}", space.len(), operation);

            for shape in space.shapes() {
                match self.resolve_shape(shape.clone()) {
                    Ok(entry) => {
                        debug!("{}", entry);
                        table.entries.push(entry);
                    }
                    Err(reason) => {
                        warn!("skipping `{}`: {}", shape, reason);
                        table.skipped.push(Skipped { shape, reason });
                    }
                }
            }
        }
        Ok(table)
    }

    /// Build the table and write it to the configured output.
    ///
    /// # Errors
    ///
    /// Returns any [`Generator::build`] error, or [`Error::Io`] if the
    /// artifact cannot be written. Nothing is written in either case.
    pub fn run(&self) -> Result<GenerationReport, Error> {
        let table = self.build()?;
        self.config
            .format
            .write_table(&self.config.output, &table.entries)?;
        info!(
            "wrote {} entries to {} ({} skipped)",
            table.entries.len(),
            self.config.output.display(),
            table.skipped.len()
        );
        Ok(GenerationReport {
            output: self.config.output.clone(),
            entries: table.entries.len(),
            skipped: table.skipped,
        })
    }

    fn resolve_shape(&self, shape: InstructionShape) -> Result<TableEntry, SkipReason> {
        let value = shape.immediate().map_or(0, |class| class.placeholder());
        let encoding = resolve(&self.oracle, &shape, value)?;
        let entry = normalize(shape, encoding, value)?;
        if self.config.verify_immediates {
            check_fixed_prefix(&self.oracle, &entry)?;
        }
        Ok(entry)
    }
}

/// Run the default pipeline for `config` with the bundled oracle.
///
/// # Errors
///
/// See [`Generator::from_config`] and [`Generator::run`].
pub fn generate(config: GeneratorConfig) -> Result<GenerationReport, Error> {
    Generator::from_config(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::operand::ImmediateClass;
    use crate::oracle::testing::ScriptedOracle;
    use crate::oracle::{Architecture, Mode};
    use pretty_assertions::assert_eq;

    fn movabs(rex: u8, opcode: u8, value: u64) -> Vec<u8> {
        let mut bytes = vec![rex, opcode];
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes
    }

    /// Answers for the two-register MOV table, plus every imm64 probe.
    fn rax_rbx_oracle() -> ScriptedOracle {
        let mut oracle = ScriptedOracle::new()
            .answer("mov rax, rax", &[0x48, 0x89, 0xc0])
            .answer("mov rax, rbx", &[0x48, 0x89, 0xd8])
            .answer("mov rbx, rax", &[0x48, 0x89, 0xc3])
            .answer("mov rbx, rbx", &[0x48, 0x89, 0xdb]);
        let class = ImmediateClass::Imm64;
        for value in std::iter::once(class.placeholder()).chain(class.probes().iter().copied()) {
            oracle = oracle
                .answer(&format!("mov rax, {:#x}", value), &movabs(0x48, 0xb8, value))
                .answer(&format!("mov rbx, {:#x}", value), &movabs(0x48, 0xbb, value));
        }
        oracle
    }

    fn rax_rbx_config(output: PathBuf) -> GeneratorConfig {
        GeneratorConfig {
            output,
            registers: vec![Register::Rax, Register::Rbx],
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn default_config_reproduces_reference_run() {
        let config = GeneratorConfig::default();
        assert_eq!(config.registers.len(), 16);
        assert_eq!(config.operations, vec![Operation::Mov]);
        assert_eq!(config.target, Target::X86_64);
        assert_eq!(config.output, PathBuf::from("x64_mov_combinations.txt"));
        assert_eq!(config.shape_count(), 16 * 16 + 16);
        config.validate().unwrap();
    }

    #[test]
    fn config_from_toml_overrides_defaults() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            registers = ["r8", "r9"]
            operations = ["add", "cmp"]
            verify_immediates = false

            [target]
            mode = "bits32"

            [format]
            operation_scope = ""
            operand_scope = "operand"
            "#,
        )
        .unwrap();
        assert_eq!(config.registers, vec![Register::R8, Register::R9]);
        assert_eq!(config.operations, vec![Operation::Add, Operation::Cmp]);
        assert!(!config.verify_immediates);
        assert_eq!(config.target, Target::new(Architecture::X86, Mode::Bits32));
        assert_eq!(config.format.operand_scope.as_deref(), Some("operand"));
        assert_eq!(config.format.operation_scope.as_deref(), Some(""));
        assert_eq!(config.output, PathBuf::from(GeneratorConfig::DEFAULT_OUTPUT));
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let err = GeneratorConfig::from_toml_str("registerz = []").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validation_rejects_empty_and_duplicate_vocabularies() {
        let mut config = GeneratorConfig {
            registers: vec![],
            ..GeneratorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::EmptyVocabulary { what: "register" })
        ));

        config.registers = vec![Register::Rax, Register::Rbx, Register::Rax];
        assert!(matches!(
            config.validate(),
            Err(Error::DuplicateRegister {
                register: Register::Rax
            })
        ));

        config.registers = vec![Register::Rax];
        config.operations = vec![Operation::Mov, Operation::Mov];
        assert!(matches!(
            config.validate(),
            Err(Error::DuplicateOperation { .. })
        ));
    }

    #[test]
    fn generator_rejects_mismatched_oracle_target() {
        let config = GeneratorConfig {
            target: Target::new(Architecture::X86, Mode::Bits32),
            ..GeneratorConfig::default()
        };
        let err = Generator::new(config, ScriptedOracle::new()).unwrap_err();
        assert!(matches!(err, Error::TargetMismatch { .. }));
    }

    #[test]
    fn two_register_table_has_four_pairs_and_two_prefixes() {
        let generator =
            Generator::new(rax_rbx_config(PathBuf::from("unused")), rax_rbx_oracle()).unwrap();
        let table = generator.build().unwrap();
        assert!(table.skipped.is_empty());

        let rendered = ArtifactFormat::bare().render_table(&table.entries);
        assert_eq!(
            rendered,
            "{{ mov, { rax, rax } }, { 0x48, 0x89, 0xc0 } },\n\
             {{ mov, { rax, rbx } }, { 0x48, 0x89, 0xd8 } },\n\
             {{ mov, { rbx, rax } }, { 0x48, 0x89, 0xc3 } },\n\
             {{ mov, { rbx, rbx } }, { 0x48, 0x89, 0xdb } },\n\
             {{ mov, { rax, imm64 } }, { 0x48, 0xb8 } },\n\
             {{ mov, { rbx, imm64 } }, { 0x48, 0xbb } },\n"
        );
    }

    #[test]
    fn rejected_and_empty_shapes_are_skipped_not_fatal() {
        let class = ImmediateClass::Imm64;
        let mut oracle = ScriptedOracle::new()
            .answer("mov rax, rax", &[])
            .answer("mov rax, rbx", &[0x48, 0x89, 0xd8])
            .answer("mov rbx, rbx", &[0x48, 0x89, 0xdb]);
        for value in std::iter::once(class.placeholder()).chain(class.probes().iter().copied()) {
            oracle = oracle.answer(&format!("mov rbx, {:#x}", value), &movabs(0x48, 0xbb, value));
        }
        let generator = Generator::new(rax_rbx_config(PathBuf::from("unused")), oracle).unwrap();
        let table = generator.build().unwrap();

        let kept: Vec<String> = table.entries.iter().map(|e| e.shape.to_string()).collect();
        assert_eq!(kept, vec!["mov rax, rbx", "mov rbx, rbx", "mov rbx, imm64"]);

        let skipped: Vec<String> = table.skipped.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            skipped,
            vec![
                "mov rax, rax: oracle returned no bytes".to_string(),
                "mov rbx, rax: rejected by oracle: `mov rbx, rax`: invalid operand combination"
                    .to_string(),
                format!(
                    "mov rax, imm64: rejected by oracle: {}",
                    OracleError::new("mov rax, 0x123456789abcdef0", "invalid operand combination")
                ),
            ]
        );
        assert!(table.entries.iter().all(|e| !e.bytes.as_slice().is_empty()));
    }

    #[test]
    fn verification_can_be_disabled() {
        let value = ImmediateClass::Imm64.placeholder();
        let oracle = ScriptedOracle::new()
            .answer(&format!("mov rax, {:#x}", value), &movabs(0x48, 0xb8, value));
        let config = GeneratorConfig {
            registers: vec![Register::Rax],
            verify_immediates: false,
            ..GeneratorConfig::default()
        };
        let generator = Generator::new(config, oracle).unwrap();
        let table = generator.build().unwrap();
        assert_eq!(table.entries.len(), 1);
        // One call per shape, none with a probe value.
        assert_eq!(
            generator.oracle().calls(),
            vec![String::from("mov rax, rax"), format!("mov rax, {:#x}", value)]
        );
    }

    #[test]
    fn validated_config_yields_unique_keys() {
        let config = GeneratorConfig {
            registers: vec![Register::Rax, Register::R8, Register::Rsp],
            operations: Operation::ALL.to_vec(),
            ..GeneratorConfig::default()
        };
        let generator = Generator::new(config, ScriptedOracle::new()).unwrap();
        let table = generator.build().unwrap();

        // Everything is rejected, so every key shows up in `skipped`.
        assert!(table.entries.is_empty());
        assert_eq!(table.skipped.len(), generator.config().shape_count());
        let keys: HashSet<&InstructionShape> = table.skipped.iter().map(|s| &s.shape).collect();
        assert_eq!(keys.len(), table.skipped.len());
    }

    #[test]
    fn run_writes_artifact_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.inc");
        let generator = Generator::new(rax_rbx_config(path.clone()), rax_rbx_oracle()).unwrap();

        let report = generator.run().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.entries, 6);
        assert_eq!(report.attempted(), 6);
        assert_eq!(report.output, path);

        let entries = ArtifactFormat::default().read_table(&path).unwrap();
        assert_eq!(entries, generator.build().unwrap().entries);
    }

    #[test]
    fn run_fails_before_touching_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("table.inc");
        let generator = Generator::new(rax_rbx_config(path.clone()), rax_rbx_oracle()).unwrap();
        assert!(matches!(generator.run(), Err(Error::Io { .. })));
        assert!(!path.exists());
    }
}
