//! # MDL Code Generation
//!
//! MaterialX node definitions to MDL library functions.

mod mdl_codegen;
pub mod node_handlers;
pub mod nodegraph;
pub mod shared;
pub mod signature;

pub use mdl_codegen::*;
pub use shared::generate_shared_module;
