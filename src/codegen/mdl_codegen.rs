//! # MDL Library Generator
//!
//! Turns the node definitions of a MaterialX module into an MDL module with
//! one exported function per definition.

use super::node_handlers::{ubershader_body, NodeTemplate, TemplateContext};
use super::nodegraph::{compile_nodegraph_body, function_name, ClashSet};
use super::shared::MDL_VERSION;
use super::signature::{
    function_signature, is_node_supported, mdl_parameters, overload_key, skipped_node_comment, MdlParameter,
};
use crate::config::GeneratorConfig;
use crate::document::{Document, NodeDef, NodeGraph};
use crate::error::{Error, Result};
use crate::modules::{hash_header_line, ModuleResolver};
use crate::types::{corrected_function_name, default_value_literal, host_type_of_name, HostType, FORCE_TYPE_DECORATION};
use std::collections::{BTreeSet, HashMap};

/// Modules every generated module imports
const FIXED_IMPORTS: [&str; 9] = [
    "mtlx::utilities",
    "math",
    "anno",
    "base",
    "tex",
    "state",
    "df",
    "alg::base::core",
    "alg::base::annotations",
];

/// Result of generating one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub module: String,
    /// MDL source without the hash header line
    pub text: String,
    /// Every warning and skip comment, in emission order
    pub warnings: Vec<String>,
    /// Modules imported because a generated function references them
    pub used_modules: BTreeSet<String>,
}

impl GeneratedModule {
    /// Artifact text: hash header line followed by the module source
    pub fn artifact(&self, digest: &str) -> String {
        format!("{}{}", hash_header_line(digest), self.text)
    }
}

/// A function body and the annotations to attach to it
struct FunctionBody {
    text: String,
    annotations: Vec<String>,
}

impl FunctionBody {
    fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: Vec::new(),
        }
    }
}

/// Generates MDL library modules from MaterialX modules on a search path
pub struct MdlLibraryGenerator<'a> {
    resolver: &'a ModuleResolver,
    config: &'a GeneratorConfig,
}

impl<'a> MdlLibraryGenerator<'a> {
    pub fn new(resolver: &'a ModuleResolver, config: &'a GeneratorConfig) -> Self {
        Self { resolver, config }
    }

    /// Generate the MDL source of `module`.
    ///
    /// The module's own documents are read as local content; every other
    /// module on the search path is imported so overload clashes are
    /// detected across namespaces.
    ///
    /// # Returns
    ///
    /// * `Ok(GeneratedModule)` - Module text, possibly containing commented-out functions
    /// * `Err(Error)` - Unreadable documents, broken local nodegraphs, or any
    ///   omission when `exception_on_omissions` is set
    pub fn generate_module(&self, module: &str) -> Result<GeneratedModule> {
        tracing::info!("[mtlx2mdl] Phase 1: Reading module '{}'", module);
        let mut doc = Document::new();
        let read = self.resolver.read_module(module, &mut doc)?;
        tracing::debug!("[mtlx2mdl] {} local elements", read);

        let others: Vec<String> = self
            .resolver
            .all_modules()
            .into_iter()
            .filter(|m| m != module)
            .collect();
        tracing::info!("[mtlx2mdl] Phase 2: Importing {} modules for clash detection", others.len());
        for other in &others {
            self.resolver.load_module(other, &mut doc)?;
        }

        self.generate_document(module, &doc)
    }

    /// Generate from an assembled document: local node definitions are
    /// emitted, imported ones only take part in clash detection
    pub fn generate_document(&self, module: &str, doc: &Document) -> Result<GeneratedModule> {
        tracing::info!("[mtlx2mdl] Phase 3: Detecting overload clashes");
        let clashing = detect_clashes(doc);
        tracing::debug!("[mtlx2mdl] {} clashing node definitions", clashing.len());

        tracing::info!("[mtlx2mdl] Phase 4: Emitting functions");
        let mut used_modules = BTreeSet::new();
        let mut all_warnings = Vec::new();
        let mut body = geomprop_helpers(doc)?;

        for def in doc.node_defs.iter().filter(|d| d.is_local()) {
            if !is_node_supported(def) {
                let comment = skipped_node_comment(def);
                if self.config.exception_on_omissions {
                    return Err(Error::MdlGeneration(comment));
                }
                tracing::warn!("[mtlx2mdl] {}", comment);
                body.push_str(&comment);
                body.push('\n');
                all_warnings.push(comment);
                continue;
            }

            let mut warnings = Vec::new();
            let function = self.generate_function(def, doc, &clashing, &mut used_modules, &mut warnings)?;
            let omit = warnings.iter().any(|w| w.to_lowercase().contains("error"));
            for warning in &warnings {
                tracing::warn!("[mtlx2mdl] {}: {}", def.name, warning);
                body.push_str(warning);
                body.push('\n');
            }
            if omit {
                if self.config.exception_on_omissions {
                    return Err(Error::MdlGeneration(warnings.join("\n")));
                }
                body.push_str(&format!("/*{}\n*/\n", function));
            } else {
                body.push_str(&function);
                body.push('\n');
            }
            all_warnings.extend(warnings);
        }

        let mut text = format!("{}\n", MDL_VERSION);
        text.push_str(&format!("using mtlx::{} import *;\n", self.config.shared_module));
        for import in FIXED_IMPORTS.iter().map(|m| m.to_string()).chain(used_modules.iter().cloned()) {
            text.push_str(&format!("import {}::*;\n", import));
        }
        text.push_str(&body);

        tracing::info!(
            "[mtlx2mdl] Generated module '{}' ({} warnings)",
            module,
            all_warnings.len()
        );
        Ok(GeneratedModule {
            module: module.to_string(),
            text,
            warnings: all_warnings,
            used_modules,
        })
    }

    fn generate_function(
        &self,
        def: &NodeDef,
        doc: &Document,
        clashing: &ClashSet,
        used_modules: &mut BTreeSet<String>,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let return_type = host_type_of_name(def.return_type())?;
        let name = function_name(def, clashing);
        let parameters = mdl_parameters(def, doc, warnings, used_modules)?;
        if return_type == HostType::Texture2d {
            warnings.push(format!("// skipping {}, cannot return texture_* types", name));
            return Ok(String::new());
        }

        let signature = function_signature(&name, &parameters);
        let body = self.function_body(def, return_type, &parameters, doc, clashing, used_modules, warnings)?;
        let annotations = if body.annotations.is_empty() {
            String::new()
        } else {
            format!("\n[[\n{}]]\n", body.annotations.concat())
        };

        Ok(if return_type == HostType::Material {
            format!("export material {}{}={}", signature, annotations, body.text)
        } else {
            format!("export {} {}{}{{{}}}", return_type, signature, annotations, body.text)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn function_body(
        &self,
        def: &NodeDef,
        return_type: HostType,
        parameters: &[MdlParameter],
        doc: &Document,
        clashing: &ClashSet,
        used_modules: &mut BTreeSet<String>,
        warnings: &mut Vec<String>,
    ) -> Result<FunctionBody> {
        let node = def.node.as_str();
        let mut description = "";
        let mut text = String::new();

        if return_type.is_unsupported() {
            // Falls through to the stub
        } else if let Some(uber) = ubershader_body(node) {
            return Ok(FunctionBody::bare(uber));
        } else if return_type == HostType::Material {
            warnings.push("// Error: material type nodes are dummy implemented".to_string());
            if node.contains("multiply") {
                warnings.push("// Error: material multiplication polymorphy not implemented".to_string());
            }
            return Ok(FunctionBody::bare("mtlx::utilities::dummyMaterial();"));
        } else if let Some(graph) = first_local_implementation(def, doc, warnings) {
            text = compile_nodegraph_body(graph, doc, clashing, used_modules)?;
        } else if let Some(template) = NodeTemplate::lookup(node) {
            let ctx = TemplateContext {
                return_type,
                parameters,
            };
            if let Some(rendered) = template.render(&ctx, warnings) {
                text = rendered.text;
                description = rendered.description;
            }
        }

        if text.is_empty() {
            warnings.push(format!(
                "// Error: Implementation for {} {} missing",
                return_type, node
            ));
            return Ok(FunctionBody::bare(format!(
                " return {}({}); ",
                return_type,
                default_value_literal(return_type)
            )));
        }

        Ok(FunctionBody {
            text,
            annotations: vec![
                format!("    anno::display_name(\"Matx {}\"),\n", node),
                format!("    anno::description(\"{}MaterialX compliant node\"),\n", description),
                format!("    anno::author(\"{}\")\n", self.config.author),
            ],
        })
    }
}

/// Node definitions whose function name must carry a type suffix: forced
/// names, and every pair sharing name and parameter types with a different
/// return type
pub fn detect_clashes(doc: &Document) -> ClashSet {
    let mut known: HashMap<String, &NodeDef> = HashMap::new();
    let mut clashing = ClashSet::new();
    for def in doc.node_defs.iter().filter(|d| is_node_supported(d)) {
        let parameters = match mdl_parameters(def, doc, &mut Vec::new(), &mut BTreeSet::new()) {
            Ok(parameters) => parameters,
            Err(e) => {
                tracing::debug!("[mtlx2mdl] Skipping {} in clash detection: {}", def.name, e);
                continue;
            }
        };
        let name = corrected_function_name(&def.node);
        if FORCE_TYPE_DECORATION.contains(&name.as_str()) {
            clashing.insert(def.name.clone());
            continue;
        }
        let key = overload_key(&name, &parameters);
        match known.get(&key) {
            Some(first) if first.return_type() != def.return_type() => {
                clashing.insert(def.name.clone());
                clashing.insert(first.name.clone());
            }
            Some(_) => {}
            None => {
                known.insert(key, def);
            }
        }
    }
    clashing
}

/// First local nodegraph implementing `def`
fn first_local_implementation<'d>(
    def: &NodeDef,
    doc: &'d Document,
    warnings: &mut Vec<String>,
) -> Option<&'d NodeGraph> {
    let local: Vec<&NodeGraph> = doc
        .matching_implementations(&def.name)
        .into_iter()
        .filter(|g| g.is_local())
        .collect();
    let first = local.first().copied()?;
    if local.len() > 1 {
        warnings.push(format!(
            "// Multiple local implementations found for function: {}. Using {}",
            def.node, first.name
        ));
    }
    Some(first)
}

/// `getGeomPropDef_<name>()` helper per local geometry property definition
fn geomprop_helpers(doc: &Document) -> Result<String> {
    let mut text = String::from("\n");
    for def in doc.geom_prop_defs.iter().filter(|g| g.source_uri.is_empty()) {
        if def.geomprop.is_empty() {
            return Err(Error::MdlGeneration(format!(
                "misidentified geometry property {}",
                def.name
            )));
        }
        let index = def.index.as_deref().filter(|i| !i.is_empty()).unwrap_or("0");
        let (type_name, data, transform) = match def.geomprop.as_str() {
            "position" => ("float3", "state::position()".to_string(), Some("state::transform_point")),
            "normal" => ("float3", "state::normal()".to_string(), Some("state::transform_normal")),
            "tangent" => (
                "float3",
                format!("state::texture_tangent_u({})", index),
                Some("state::transform_vector"),
            ),
            "texcoord" => (
                "float2",
                format!(
                    "float2(state::texture_coordinate({0}).x, state::texture_coordinate({0}).y)",
                    index
                ),
                None,
            ),
            other => {
                text.push_str(&format!("// Warning: No data map for geometry property {}\n", other));
                continue;
            }
        };
        let data = match (def.space.as_deref().filter(|s| !s.is_empty()), transform) {
            (Some(space), Some(transform)) => format!(
                "{}(state::coordinate_internal, state::coordinate_{}, {})",
                transform, space, data
            ),
            _ => data,
        };
        text.push_str(&format!(
            "export {} getGeomPropDef_{}() [[ anno::hidden() ]]\n{{\n    return {};\n}}\n",
            type_name, def.name, data
        ));
    }
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPath;
    use crate::document::{GeomPropDef, Node, Output};
    use pretty_assertions::assert_eq;

    fn def(name: &str, node: &str, type_name: &str, inputs: &[(&str, &str)]) -> NodeDef {
        let mut def = NodeDef::new(name, node);
        def.type_name = Some(type_name.to_string());
        for (input, input_type) in inputs {
            def.add_input(input, input_type);
        }
        def
    }

    fn generate(doc: &Document, config: &GeneratorConfig) -> Result<GeneratedModule> {
        let resolver = ModuleResolver::new(SearchPath::default());
        MdlLibraryGenerator::new(&resolver, config).generate_document("mylib", doc)
    }

    #[test]
    fn test_header_and_template_function() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_add_float", "add", "float", &[("in1", "float"), ("in2", "float")]))
            .unwrap();
        let generated = generate(&doc, &GeneratorConfig::default()).unwrap();

        assert!(generated.text.starts_with(
            "mdl 1.4;\nusing mtlx::shared import *;\nimport mtlx::utilities::*;\nimport math::*;\n"
        ));
        assert!(generated.text.contains("import alg::base::annotations::*;\n"));
        assert!(generated.text.contains(
            "export float add(\n    varying float in1=float(0.f),\n    varying float in2=float(0.f))\n[[\n    \
             anno::display_name(\"Matx add\"),\n    anno::description(\"MaterialX compliant node\"),\n    \
             anno::author(\"Allegorithmic\")\n]]\n{\n    return (in1 + float(in2));\n}\n"
        ));
        assert!(generated.warnings.is_empty());
        assert_eq!(
            generated.artifact("abc").lines().next(),
            Some("// SRC_DOC_HASH abc")
        );
    }

    #[test]
    fn test_clashing_return_types_are_decorated() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_foo_float", "foo", "float", &[("in", "float")])).unwrap();
        doc.add_node_def(def("ND_foo_vector3", "foo", "vector3", &[("in", "float")])).unwrap();
        let generated = generate(&doc, &GeneratorConfig::default()).unwrap();

        assert!(generated.text.contains("float foo_float(\n"));
        assert!(generated.text.contains("float3 foo_vector3(\n"));
        assert!(!generated.text.contains(" foo(\n"));
    }

    #[test]
    fn test_forced_decoration() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_image_float", "image", "float", &[("default", "float")]))
            .unwrap();
        let clashing = detect_clashes(&doc);
        assert!(clashing.contains("ND_image_float"));
    }

    #[test]
    fn test_unmapped_node_is_commented_out() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_blur_float", "blur", "float", &[("in", "float")])).unwrap();
        let generated = generate(&doc, &GeneratorConfig::default()).unwrap();

        assert_eq!(
            generated.warnings,
            vec!["// Error: Implementation for float blur missing".to_string()]
        );
        assert!(generated.text.contains(
            "// Error: Implementation for float blur missing\n/*export float blur(\n    varying float in_=float(0.f)){ return float(0.f); }\n*/\n"
        ));
    }

    #[test]
    fn test_strict_mode_aborts_on_omission() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_blur_float", "blur", "float", &[("in", "float")])).unwrap();
        let config = GeneratorConfig {
            exception_on_omissions: true,
            ..Default::default()
        };
        let err = generate(&doc, &config).unwrap_err();
        assert!(matches!(err, Error::MdlGeneration(_)));

        let mut unsupported = Document::new();
        unsupported
            .add_node_def(def("ND_mix_color4", "mix", "color4", &[("fg", "color4")]))
            .unwrap();
        let err = generate(&unsupported, &config).unwrap_err();
        assert!(err.to_string().contains("Unsupported MaterialX nodedef ND_mix_color4 skipped"));
    }

    #[test]
    fn test_material_nodes() {
        let mut doc = Document::new();
        doc.add_node_def(def("ND_standard_surface", "standard_surface", "surfaceshader", &[("base", "float")]))
            .unwrap();
        doc.add_node_def(def("ND_custom_surface", "custom_surface", "surfaceshader", &[]))
            .unwrap();
        let generated = generate(&doc, &GeneratorConfig::default()).unwrap();
        assert!(generated
            .text
            .contains("export material standard_surface(\n    varying float base=float(0.f))=\nlet{"));
        assert!(generated
            .text
            .contains("/*export material custom_surface(\n    )=mtlx::utilities::dummyMaterial();\n*/"));
    }

    #[test]
    fn test_local_nodegraph_body() {
        let mut doc = Document::new();
        let mut add = def("ND_add_float", "add", "float", &[("in1", "float"), ("in2", "float")]);
        add.source_uri = "stdlib/stdlib_defs.mtlx".into();
        doc.add_node_def(add).unwrap();
        doc.add_node_def(def("ND_double_float", "double", "float", &[("in", "float")]))
            .unwrap();
        let mut graph = NodeGraph::new("IM_double_float");
        graph.nodedef = Some("ND_double_float".into());
        let mut node = Node::new("add", "sum", "float");
        node.add_input("in1", "float").interface_name = Some("in".into());
        node.add_input("in2", "float").interface_name = Some("in".into());
        graph.add_node(node).unwrap();
        let mut out = Output::new("out", "float");
        out.node_name = Some("sum".into());
        graph.add_output(out).unwrap();
        doc.add_node_graph(graph).unwrap();

        let generated = generate(&doc, &GeneratorConfig::default()).unwrap();
        assert!(generated.text.contains(
            "{\n    float v_0 = mtlx::stdlib::add(in_, in_);\n    return v_0;\n}"
        ));
        assert!(generated.text.contains("import mtlx::stdlib::*;\n"));
        // imported definitions are not emitted
        assert!(!generated.text.contains("export float add("));
    }

    #[test]
    fn test_geomprop_helpers() {
        let mut doc = Document::new();
        doc.add_geom_prop_def(GeomPropDef {
            name: "Nworld".into(),
            type_name: "vector3".into(),
            geomprop: "normal".into(),
            space: Some("world".into()),
            ..Default::default()
        })
        .unwrap();
        doc.add_geom_prop_def(GeomPropDef {
            name: "UV1".into(),
            type_name: "vector2".into(),
            geomprop: "texcoord".into(),
            index: Some("1".into()),
            ..Default::default()
        })
        .unwrap();
        let text = geomprop_helpers(&doc).unwrap();
        assert!(text.contains(
            "export float3 getGeomPropDef_Nworld() [[ anno::hidden() ]]\n{\n    \
             return state::transform_normal(state::coordinate_internal, state::coordinate_world, state::normal());\n}\n"
        ));
        assert!(text.contains("return float2(state::texture_coordinate(1).x, state::texture_coordinate(1).y);"));
    }
}
