//! Host program model for the Weir emitter.
//!
//! Reads a YAML/JSON description of an annotated program (namespaces,
//! operations, models) together with its decorator state table, and exposes
//! it through the [`AstSource`] trait.

pub mod error;
pub mod model;
pub mod parser;
pub mod source;

pub use error::SourceError;
pub use model::{
    qualify, ModelNode, Namespace, OperationNode, ParameterNode, Program, PropertyNode, Scalar,
    StateMap, TypeRef,
};
pub use parser::{parse_program, parse_program_file};
pub use source::{
    list_annotated_models, list_models, list_namespaces, list_operations, AstSource, Located,
};
