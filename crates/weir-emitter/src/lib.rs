//! Assembles AsyncAPI 3.0.0 documents from an annotated host program.
//!
//! The [`Emitter`] walks the program once ([`DiscoveryService`]), builds a
//! document skeleton ([`DocumentBuilder`]), fills it through the processing
//! services, and validates the result ([`ValidationService`]).
//!
//! ```ignore
//! use weir_emitter::{Emitter, EmitterConfig, OutputFormat};
//!
//! let program = weir_ast::parse_program_file(path)?;
//! let output = Emitter::new(EmitterConfig::default()).emit(&program).await?;
//! let yaml = weir_emitter::render(&output.document, OutputFormat::Yaml)?;
//! ```

pub mod builder;
pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod schema;
pub mod validation;

pub use builder::{
    initialize_components, initialize_document_structure, DocumentBuilder, ServerDeclaration,
};
pub use config::{EmitterConfig, InfoConfig, OutputConfig, SecuritySchemeKey};
pub use discovery::{
    DiscoveryResult, DiscoveryService, MessageModel, Operation, SecurityConfig, SecurityScheme,
    TypeIndex,
};
pub use error::{codes, EmitError, EmitWarning, ErrorCategory};
pub use output::{parse_document, read_document, render, write_document, OutputFormat};
pub use pipeline::{EmitOutput, Emitter};
pub use processing::{
    channel_key, synthesize_scheme, MessageProcessingService, OperationProcessingService,
    SecurityProcessingService, ServerBindingService, StageReport,
};
pub use schema::{JsonSchemaConverter, SchemaConverter};
pub use validation::{ValidationIssue, ValidationMetrics, ValidationResult, ValidationService};
