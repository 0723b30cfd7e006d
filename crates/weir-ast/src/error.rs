use thiserror::Error;

/// Errors produced while loading a host program (E1001–E1004).
#[derive(Debug, Error)]
pub enum SourceError {
    /// E1001: Document does not describe a program.
    #[error("E1001: not a valid program description: {0}")]
    NotAProgram(String),

    /// E1002: YAML/JSON parse error.
    #[error("E1002: parse error: {0}")]
    Parse(String),

    /// E1003: Invalid type reference.
    #[error("E1003: invalid type reference '{0}'")]
    InvalidTypeRef(String),

    /// E1004: Structural error in the program tree.
    #[error("E1004: schema error: {0}")]
    Schema(String),

    /// I/O error reading the program file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
