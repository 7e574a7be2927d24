/// UnixFS materialization of descriptor ASTs into a block store.
pub mod builder;
/// Recursive-descent parser for the descriptor language.
pub mod dsl;
/// The descriptor AST: files and directories with multiplicity, naming,
/// sharding and content constraints.
pub mod entity;
/// This module contains declaration of `thiserror` error types.
pub mod error;
/// Byte-size parsing and human-readable formatting.
pub mod humanize;
/// Deterministic random sources feeding generation.
pub mod random;

pub use builder::DirEntry;
pub use dsl::parse;
pub use entity::{DirKind, Directory, Entity, File};
pub use error::{DslError, GenError};
pub use random::{EntropyReader, ZeroReader};
