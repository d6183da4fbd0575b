//! # MDL / MaterialX Translator (mdlmtlx)
//!
//! Translates MDL shading graphs authored in a host application into
//! MaterialX documents, and generates the MDL library modules that make
//! MaterialX node definitions available to that host.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdlmtlx::{translate_material, HostGraph, ModuleResolver, SearchPath, TranslateOptions};
//! use mdlmtlx::document::xml;
//!
//! let graph = HostGraph::load("material.json".as_ref())?;
//! let resolver = ModuleResolver::new(SearchPath::parse("/opt/materialx/libraries"));
//!
//! let doc = translate_material(&graph, "wood", &resolver, &TranslateOptions::default())?;
//! std::fs::write("wood.mtlx", xml::write_to_string(&doc))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Host graph to MaterialX:
//!
//! 1. **Classification** - Each host node gets a role (constant, proxy,
//!    constructor, swizzle, MaterialX node)
//! 2. **Traversal** - Nodes become node definition ports or graph nodes
//! 3. **Binding** - The root is bound into a material, subgraph outputs, or
//!    a dummy emissive material
//! 4. **Forwarding** - Material bindings are republished through a bind graph
//!
//! MaterialX to MDL:
//!
//! 1. **Module Loading** - Local documents plus every other module on the
//!    search path
//! 2. **Clash Detection** - Overloads differing only in return type
//! 3. **Function Generation** - Templates, uber-shaders and nodegraph bodies
//! 4. **Incremental Build** - Artifacts rewritten only when sources change

pub mod builder;
pub mod codegen;
pub mod config;
pub mod document;
pub mod error;
pub mod graph_utils;
pub mod hashing;
pub mod host;
pub mod modules;
pub mod postprocess;
pub mod translate;
pub mod types;

// Re-export the main translation and generation API
pub use builder::{BuildOutcome, IncrementalModuleBuilder};
pub use codegen::{generate_shared_module, GeneratedModule, MdlLibraryGenerator};
pub use translate::{
    forward_outputs,
    translate_custom_root,
    translate_material,
    translate_subgraph,
    TranslateOptions,
};

pub use config::{Config, GeneratorConfig, SearchPath};
pub use document::Document;
pub use error::{Error, Result};
pub use hashing::hash_graph;
pub use host::{HostGraph, HostNode, HostProperty, HostValue};
pub use modules::ModuleResolver;
pub use types::{HostType, PortableType};
