//! TestEmission: full-pipeline test harness.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use weir_emitter::{
    parse_document, render, EmitError, EmitOutput, Emitter, EmitterConfig, OutputFormat,
};

/// Errors from TestEmission operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("program failed to load: {0}")]
    Source(#[from] weir_ast::SourceError),

    #[error("emission failed: {0}")]
    Emit(#[from] EmitError),

    #[error("document did not serialize: {0}")]
    Json(#[from] serde_json::Error),
}

/// Absolute path to the shared test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/weir-test
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
}

/// Path to one fixture file.
pub fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Runs the emitter over a program and keeps the serialized document
/// around for assertions.
pub struct TestEmission {
    output: EmitOutput,
    document: Value,
}

impl TestEmission {
    /// Emit a program file with the default configuration.
    pub async fn from_program(path: &Path) -> Result<Self, TestError> {
        Self::from_program_with_config(path, EmitterConfig::default()).await
    }

    /// Emit a program file with an explicit configuration.
    pub async fn from_program_with_config(
        path: &Path,
        config: EmitterConfig,
    ) -> Result<Self, TestError> {
        let program = weir_ast::parse_program_file(path)?;
        Self::run(&program, config).await
    }

    /// Emit an inline YAML program.
    pub async fn from_yaml(yaml: &str) -> Result<Self, TestError> {
        let program = weir_ast::parse_program(yaml)?;
        Self::run(&program, EmitterConfig::default()).await
    }

    async fn run(program: &weir_ast::Program, config: EmitterConfig) -> Result<Self, TestError> {
        let output = Emitter::new(config).emit(program).await?;
        let document = output.document.to_value()?;
        Ok(Self { output, document })
    }

    pub fn output(&self) -> &EmitOutput {
        &self.output
    }

    /// The document as untyped JSON.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Look up a value by JSON pointer.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }

    /// Panic with the validation errors when the document is invalid.
    pub fn assert_valid(&self) {
        assert!(
            self.output.validation.valid,
            "document is invalid: {:#?}",
            self.output.validation.errors
        );
    }

    /// Render to `format` and parse back.
    pub fn reparse(&self, format: OutputFormat) -> Result<Value, TestError> {
        let rendered = render(&self.output.document, format)?;
        Ok(parse_document(&rendered)?)
    }
}
