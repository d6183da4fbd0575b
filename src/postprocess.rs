//! # Post-Processing Passes
//!
//! Optional passes applied to a translated document before it is handed to
//! viewers or written next to its dependencies.

use crate::document::{module_of_uri, Document, Node};
use crate::error::{Error, Result};
use crate::modules::ModuleResolver;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const IMAGE_CATEGORIES: [&str; 3] = ["image", "tiledimage", "triplanarprojection"];
pub const SRGB_TO_LINEAR_CATEGORY: &str = "algsrgb_to_linear";
pub const CONVERSION_MODULE: &str = "alglib";

const SRGB_COLORSPACE: &str = "srgb_texture";
const LINEAR_COLORSPACE: &str = "linear";
const FILENAME_TYPE: &str = "filename";

/// An image node inside a node graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNodeRef {
    pub graph: String,
    pub node: String,
}

/// Image sampling nodes of every local node graph, in document order
pub fn find_image_nodes(doc: &Document) -> Vec<ImageNodeRef> {
    doc.node_graphs
        .iter()
        .filter(|graph| graph.is_local())
        .flat_map(|graph| {
            graph
                .nodes
                .iter()
                .filter(|node| IMAGE_CATEGORIES.contains(&node.category.as_str()))
                .map(move |node| ImageNodeRef {
                    graph: graph.name.clone(),
                    node: node.name.clone(),
                })
        })
        .collect()
}

enum Conversion {
    Needed,
    NotNeeded,
    Inconsistent,
}

fn conversion_for(node: &Node) -> Conversion {
    let mut srgb = false;
    let mut other = false;
    for param in node.parameters.iter().filter(|p| p.type_name == FILENAME_TYPE) {
        if param.colorspace() == SRGB_COLORSPACE {
            srgb = true;
        } else {
            other = true;
        }
    }
    match (srgb, other) {
        (true, true) => Conversion::Inconsistent,
        (true, false) => Conversion::Needed,
        _ => Conversion::NotNeeded,
    }
}

/// Insert an explicit sRGB to linear conversion after every local image
/// node whose textures are all sRGB, and mark those textures linear.
///
/// This rewrites the graph for viewers that ignore colorspace attributes;
/// the result no longer round-trips. Returns the number of converted
/// images.
pub fn convert_srgb_to_linear(doc: &mut Document, resolver: &ModuleResolver) -> Result<usize> {
    let mut converted = 0;
    for image in find_image_nodes(doc) {
        let Some(node) = doc.node_graph(&image.graph).and_then(|g| g.node(&image.node)) else {
            continue;
        };
        match conversion_for(node) {
            Conversion::NotNeeded => continue,
            Conversion::Inconsistent => {
                tracing::warn!(
                    "Inconsistent input color spaces on image node {}, no conversion applied",
                    image.node
                );
                continue;
            }
            Conversion::Needed => {}
        }
        let image_type = node.type_name.clone();

        if !doc.contains_module(CONVERSION_MODULE) {
            resolver.load_module(CONVERSION_MODULE, doc)?;
        }
        insert_conversion(doc, &image, &image_type)?;
        converted += 1;
    }
    Ok(converted)
}

fn insert_conversion(doc: &mut Document, image: &ImageNodeRef, image_type: &str) -> Result<()> {
    let graph = doc
        .node_graph_mut(&image.graph)
        .ok_or_else(|| Error::Document(format!("node graph '{}' disappeared", image.graph)))?;

    let correction_name = format!("correct_cs_{}", image.node);
    for node in graph.nodes.iter_mut() {
        for input in node.inputs.iter_mut() {
            if input.node_name.as_deref() == Some(image.node.as_str()) {
                input.node_name = Some(correction_name.clone());
            }
        }
    }
    for output in graph.outputs.iter_mut() {
        if output.node_name.as_deref() == Some(image.node.as_str()) {
            output.node_name = Some(correction_name.clone());
        }
    }

    let mut correction = Node::new(SRGB_TO_LINEAR_CATEGORY, correction_name.as_str(), image_type);
    correction.add_input("in", image_type).node_name = Some(image.node.clone());
    graph.add_node(correction)?;

    if let Some(node) = graph.node_mut(&image.node) {
        for param in node.parameters.iter_mut().filter(|p| p.type_name == FILENAME_TYPE) {
            if param.colorspace() == SRGB_COLORSPACE {
                param.set_colorspace(LINEAR_COLORSPACE);
            }
        }
    }
    tracing::debug!("Added {} after {}", correction_name, image.node);
    Ok(())
}

/// Modules that imported elements of `doc` came from
pub fn dependent_modules(doc: &Document) -> BTreeSet<String> {
    doc.source_uris()
        .iter()
        .map(|uri| module_of_uri(uri).to_string())
        .filter(|module| !module.is_empty())
        .collect()
}

/// Copy every document of every dependent module not in `ignore` below
/// `target`, keeping the include-relative layout.
///
/// # Returns
/// The written paths
pub fn export_dependent_files(
    target: &Path,
    doc: &Document,
    resolver: &ModuleResolver,
    ignore: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for module in dependent_modules(doc).difference(ignore) {
        for file in resolver.discover_module_files(module) {
            let dest = target.join(&file.relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            tracing::info!("Copying: {}, {}", file.absolute.display(), dest.display());
            std::fs::copy(&file.absolute, &dest).map_err(|e| Error::io(&file.absolute, e))?;
            written.push(dest);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPath;
    use crate::document::{NodeDef, NodeGraph, Output};
    use pretty_assertions::assert_eq;

    fn textured_doc(colorspaces: &[&str]) -> Document {
        let mut graph = NodeGraph::new("mat_graph");
        let mut image = Node::new("image", "img", "color3");
        for (idx, cs) in colorspaces.iter().enumerate() {
            let file = image.add_parameter(&format!("file{}", idx), "filename");
            file.value = Some("textures/albedo.png".into());
            file.set_colorspace(*cs);
        }
        graph.add_node(image).unwrap();
        let mut multiply = Node::new("multiply", "mul", "color3");
        multiply.add_input("in1", "color3").node_name = Some("img".into());
        graph.add_node(multiply).unwrap();
        let mut out = Output::new("base_color", "color3");
        out.node_name = Some("img".into());
        graph.add_output(out).unwrap();

        let mut doc = Document::new();
        doc.add_node_graph(graph).unwrap();
        doc
    }

    fn empty_resolver() -> ModuleResolver {
        ModuleResolver::new(SearchPath::default())
    }

    #[test]
    fn test_find_image_nodes_skips_imported_graphs() {
        let mut doc = textured_doc(&["srgb_texture"]);
        let mut imported = NodeGraph::new("IM_lib");
        imported.source_uri = "stdlib/stdlib_ng.mtlx".into();
        imported.add_node(Node::new("tiledimage", "t", "color3")).unwrap();
        doc.add_node_graph(imported).unwrap();

        assert_eq!(
            find_image_nodes(&doc),
            vec![ImageNodeRef {
                graph: "mat_graph".into(),
                node: "img".into()
            }]
        );
    }

    #[test]
    fn test_srgb_image_gets_conversion_node() {
        let mut doc = textured_doc(&["srgb_texture"]);
        let converted = convert_srgb_to_linear(&mut doc, &empty_resolver()).unwrap();
        assert_eq!(converted, 1);

        let graph = doc.node_graph("mat_graph").unwrap();
        let correction = graph.node("correct_cs_img").unwrap();
        assert_eq!(correction.category, "algsrgb_to_linear");
        assert_eq!(correction.input("in").unwrap().node_name.as_deref(), Some("img"));
        assert_eq!(
            graph.node("mul").unwrap().input("in1").unwrap().node_name.as_deref(),
            Some("correct_cs_img")
        );
        assert_eq!(
            graph.output("base_color").unwrap().node_name.as_deref(),
            Some("correct_cs_img")
        );
        assert_eq!(graph.node("img").unwrap().parameters[0].colorspace(), "linear");
    }

    #[test]
    fn test_mixed_colorspaces_are_left_alone() {
        let mut doc = textured_doc(&["srgb_texture", "linear"]);
        let converted = convert_srgb_to_linear(&mut doc, &empty_resolver()).unwrap();
        assert_eq!(converted, 0);
        assert!(doc.node_graph("mat_graph").unwrap().node("correct_cs_img").is_none());
    }

    #[test]
    fn test_linear_images_need_no_conversion() {
        let mut doc = textured_doc(&["linear"]);
        assert_eq!(convert_srgb_to_linear(&mut doc, &empty_resolver()).unwrap(), 0);
    }

    #[test]
    fn test_export_copies_module_documents() {
        let root = std::env::temp_dir().join(format!("mdlmtlx_export_{}", std::process::id()));
        let library = root.join("library");
        let target = root.join("target");
        std::fs::create_dir_all(library.join("stdlib")).unwrap();
        std::fs::create_dir_all(library.join("bxdf")).unwrap();
        std::fs::write(library.join("stdlib/stdlib_defs.mtlx"), "<materialx version=\"1.36\"/>").unwrap();
        std::fs::write(library.join("bxdf/bxdf_defs.mtlx"), "<materialx version=\"1.36\"/>").unwrap();

        let mut doc = Document::new();
        let mut add = NodeDef::new("ND_add_float", "add");
        add.source_uri = "stdlib/stdlib_defs.mtlx".into();
        doc.add_node_def(add).unwrap();
        let mut surface = NodeDef::new("ND_surface", "surface");
        surface.source_uri = "bxdf/bxdf_defs.mtlx".into();
        doc.add_node_def(surface).unwrap();

        let resolver = ModuleResolver::new(SearchPath::new([library.clone()]));
        let ignore: BTreeSet<String> = ["bxdf".to_string()].into_iter().collect();
        let written = export_dependent_files(&target, &doc, &resolver, &ignore).unwrap();

        assert_eq!(written, vec![target.join("stdlib/stdlib_defs.mtlx")]);
        assert!(target.join("stdlib/stdlib_defs.mtlx").is_file());
        assert!(!target.join("bxdf").exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
