//! Classification of host nodes into the role they play in the MaterialX
//! graph, and overload resolution against the loaded node definitions.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::host::{HostNode, HostValue, TypeModifier};
use crate::modules::{module_path_from_qualified_name, ModuleResolver};
use crate::types::{portable_type_of_name, PortableType};
use std::collections::HashMap;

/// Definition prefix of the shared subgraph output proxy
pub const SUBGRAPH_OUTPUT_PREFIX: &str = "mdl::mtlx::shared::subgraph_output(";

const PORTABLE_NAMESPACE: &str = "mdl::mtlx::";
const TEXTURE_CONSTRUCTOR: &str = "mdl::texture_2d";
const DEPRECATED_NODE: &str = "input";

/// Role of a host node in the translated graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Instance of a MaterialX node definition
    Ordinary,
    /// Exposed varying constant, becomes a node definition input
    InputProxy,
    /// Exposed uniform constant, becomes a node definition parameter
    ParameterProxy,
    /// Exposed texture, forwarded onto the sampling node
    SamplerProxy,
    /// Exposed value with a sampler usage, becomes an image node
    TexturedInputProxy,
    SubgraphOutputProxy,
    /// Unexposed identity constructor
    ConstantProxy,
    /// Unexposed constructor widening a scalar
    SwizzleSubstitute,
}

impl Role {
    /// Whether connections from this node bind to the graph interface
    pub fn is_interface(&self) -> bool {
        matches!(self, Role::InputProxy | Role::ParameterProxy)
    }
}

/// Whether a node port is a MaterialX input or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub role: Role,
    /// Node string of the MaterialX node created for this host node
    pub category: String,
    /// MaterialX return type
    pub type_name: Option<String>,
    /// Kind of each non-attribute host input, in order
    pub ports: Vec<PortKind>,
}

impl Classification {
    fn proxy(role: Role, category: &str, type_name: PortableType, port: PortKind) -> Self {
        Self {
            role,
            category: category.to_string(),
            type_name: Some(type_name.as_str().to_string()),
            ports: vec![port],
        }
    }
}

/// Portable type of a host type id, tolerating namespace qualification
pub fn portable_type_name(type_id: &str) -> Result<PortableType> {
    portable_type_of_name(type_id).or_else(|_| {
        let short = type_id.rsplit("::").next().unwrap_or_default();
        portable_type_of_name(short)
    })
}

/// `mdl::<type>(...)` where `<type>` is a known host type
pub fn is_host_constructor(definition: &str) -> bool {
    let mut segments = definition.split("::");
    if segments.next() != Some("mdl") {
        return false;
    }
    let Some(name) = segments.next().and_then(|s| s.split('(').next()) else {
        return false;
    };
    portable_type_of_name(name).is_ok()
}

/// MaterialX node name encoded in a generated function name. A trailing
/// `_<type>` decoration, or the `_` of a corrected keyword, is removed.
pub fn node_name_from_definition(definition: &str) -> String {
    let function = definition.split('(').next().unwrap_or_default();
    let full = function.rsplit("::").next().unwrap_or_default();
    let parts: Vec<&str> = full.split('_').collect();
    match parts.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            if last.is_empty() || PortableType::from_name(last).is_some() {
                rest.join("_")
            } else {
                full.to_string()
            }
        }
        _ => full.to_string(),
    }
}

type OverloadKey = (Option<String>, Vec<String>);

fn overload_table(doc: &Document, name: &str) -> HashMap<OverloadKey, String> {
    let mut table = HashMap::new();
    for def in doc.matching_node_defs(name) {
        let types: Vec<String> = def.interface_types().into_iter().map(String::from).collect();
        table.insert((Some(def.return_type().to_string()), types.clone()), def.name.clone());
        table.insert((None, types), def.name.clone());
    }
    table
}

/// Per-translation memo of overload tables keyed by node name
#[derive(Debug, Default)]
pub struct NodeDefCache {
    tables: HashMap<String, HashMap<OverloadKey, String>>,
}

impl NodeDefCache {
    fn lookup(&mut self, doc: &Document, name: &str, key: &OverloadKey) -> Option<String> {
        if let Some(table) = self.tables.get(name) {
            return table.get(key).cloned();
        }
        let table = overload_table(doc, name);
        let found = table.get(key).cloned();
        if found.is_some() {
            self.tables.insert(name.to_string(), table);
        }
        found
    }

    fn invalidate(&mut self, name: &str) {
        self.tables.remove(name);
    }
}

/// Classify a host node, importing the module that owns its definition on
/// the first overload miss.
pub fn classify(
    node: &HostNode,
    doc: &mut Document,
    cache: &mut NodeDefCache,
    resolver: &ModuleResolver,
) -> Result<Classification> {
    let definition = node.definition.as_str();
    let output_type_id = match node.outputs.as_slice() {
        [output] => output.effective_type_id(),
        _ => {
            return Err(Error::unsupported(
                "Multiple output properties on MDL node not supported",
            ))
        }
    };

    if definition.contains(PORTABLE_NAMESPACE) {
        if definition.starts_with(SUBGRAPH_OUTPUT_PREFIX) {
            let type_name = portable_type_name(output_type_id)?;
            return Ok(Classification::proxy(
                Role::SubgraphOutputProxy,
                "subgraph_proxy",
                type_name,
                PortKind::Input,
            ));
        }
        let out_type = if output_type_id.is_empty() {
            None
        } else {
            let portable = portable_type_name(output_type_id).map_err(|_| {
                Error::MissingMaterialXType(format!(
                    "No type mapping for mdl type: {}",
                    output_type_id
                ))
            })?;
            Some(portable.as_str().to_string())
        };
        let name = node_name_from_definition(definition);
        if name == DEPRECATED_NODE {
            return Err(Error::unsupported("Input and parameter nodes are deprecated"));
        }
        return resolve_overload(node, &name, out_type, doc, cache, resolver);
    }

    if is_host_constructor(definition) {
        let type_name = portable_type_name(output_type_id)?;
        return classify_constructor(node, type_name);
    }

    Err(Error::unsupported_node(
        format!("Unsupported node found {}", definition),
        definition,
    ))
}

fn classify_constructor(node: &HostNode, type_name: PortableType) -> Result<Classification> {
    let definition = node.definition.as_str();
    if node.exposed {
        let usage = node.annotation_str("sampler_usage").unwrap_or("");
        if type_name == PortableType::Filename {
            return Ok(Classification::proxy(
                Role::SamplerProxy,
                "sampler_proxy",
                type_name,
                PortKind::Parameter,
            ));
        }
        if !usage.is_empty() {
            return Ok(Classification::proxy(
                Role::TexturedInputProxy,
                "textured_input_proxy",
                type_name,
                PortKind::Parameter,
            ));
        }
        return match node.type_modifier() {
            Some(TypeModifier::Uniform | TypeModifier::Auto) => Ok(Classification::proxy(
                Role::ParameterProxy,
                "parameter_proxy",
                type_name,
                PortKind::Parameter,
            )),
            Some(TypeModifier::Varying) => Ok(Classification::proxy(
                Role::InputProxy,
                "input_proxy",
                type_name,
                PortKind::Input,
            )),
            None => Err(Error::MdlToMaterialX(format!(
                "Unknown exposed input type for exposed node {}",
                definition
            ))),
        };
    }

    if definition.starts_with(TEXTURE_CONSTRUCTOR) {
        return Ok(Classification::proxy(
            Role::ConstantProxy,
            "constant",
            type_name,
            PortKind::Parameter,
        ));
    }
    let [input] = node.inputs.as_slice() else {
        return Err(Error::unsupported_node(
            format!(
                "Unsupported constructor found, non-identity mdl constructors are not supported. Node {}",
                definition
            ),
            definition,
        ));
    };
    if portable_type_name(input.effective_type_id())? != type_name {
        return Ok(Classification::proxy(
            Role::SwizzleSubstitute,
            "swizzle",
            type_name,
            PortKind::Input,
        ));
    }
    Ok(Classification::proxy(
        Role::ConstantProxy,
        "constant",
        type_name,
        PortKind::Parameter,
    ))
}

fn resolve_overload(
    node: &HostNode,
    name: &str,
    out_type: Option<String>,
    doc: &mut Document,
    cache: &mut NodeDefCache,
    resolver: &ModuleResolver,
) -> Result<Classification> {
    let mut parameter_types = Vec::new();
    for input in node.inputs.iter().filter(|p| !p.id.starts_with("attr_")) {
        parameter_types.push(portable_type_name(input.effective_type_id())?.as_str().to_string());
    }
    let key = (out_type, parameter_types);

    let found = match cache.lookup(doc, name, &key) {
        Some(found) => found,
        None => {
            let module = module_path_from_qualified_name(&node.definition)?;
            tracing::debug!("[mdl2mtlx] Importing module '{}' for {}", module, name);
            resolver.load_module(&module, doc)?;
            cache.invalidate(name);
            cache.lookup(doc, name, &key).ok_or_else(|| {
                Error::MissingMaterialXType(format!(
                    "No MaterialX type found for function {}",
                    name
                ))
            })?
        }
    };

    let def = doc.node_def(&found).ok_or_else(|| {
        Error::MissingMaterialXType(format!("No MaterialX type found for function {}", name))
    })?;
    let ports = std::iter::repeat(PortKind::Input)
        .take(def.inputs.len())
        .chain(std::iter::repeat(PortKind::Parameter).take(def.parameters.len()))
        .collect();
    Ok(Classification {
        role: Role::Ordinary,
        category: name.to_string(),
        type_name: Some(def.return_type().to_string()),
        ports,
    })
}

/// Interface name of an input or parameter proxy: its `name` input, else
/// its `identifier` annotation
pub fn interface_name(node: &HostNode) -> String {
    let name = match node.input("name") {
        Some(property) => property.value.as_ref().and_then(HostValue::as_str),
        None => node.annotation_str("identifier"),
    }
    .unwrap_or_default()
    .to_string();
    if name.is_empty() {
        tracing::error!("[mdl2mtlx] Unnamed interface detected on node {}", node.identifier);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPath;
    use crate::document::NodeDef;
    use crate::host::HostProperty;
    use pretty_assertions::assert_eq;

    fn resolver() -> ModuleResolver {
        ModuleResolver::new(SearchPath::new(Vec::<std::path::PathBuf>::new()))
    }

    fn library() -> Document {
        let mut doc = Document::new();
        let mut circle = NodeDef::new("ND_circle_float", "circle");
        circle.type_name = Some("float".into());
        circle.add_input("radius", "float");
        circle.add_parameter("center", "vector2");
        doc.add_node_def(circle).unwrap();
        doc
    }

    fn constructor(def: &str, out: &str, input_type: &str) -> HostNode {
        HostNode::new("7", def)
            .with_input(HostProperty::new("value", input_type))
            .with_output("output", out)
    }

    #[test]
    fn test_type_decoration_is_stripped_only_for_type_names() {
        assert_eq!(node_name_from_definition("mdl::mtlx::stdlib::add_float(float,float)"), "add");
        assert_eq!(node_name_from_definition("mdl::mtlx::stdlib::switch_(float)"), "switch");
        assert_eq!(node_name_from_definition("mdl::mtlx::stdlib::smooth_step(float)"), "smooth_step");
        assert_eq!(node_name_from_definition("mdl::mtlx::stdlib::circle(float)"), "circle");
        assert_eq!(node_name_from_definition("mdl::mtlx::stdlib::foo_color3(float)"), "foo");
    }

    #[test]
    fn test_constructor_detection() {
        assert!(is_host_constructor("mdl::float3(float)"));
        assert!(is_host_constructor("mdl::color(float)"));
        assert!(!is_host_constructor("mdl::mtlx::stdlib::add_float(float,float)"));
        assert!(!is_host_constructor("mdl::base::perlin_noise(float)"));
    }

    #[test]
    fn test_ordinary_node_resolves_overload() {
        let mut doc = library();
        let node = HostNode::new("1", "mdl::mtlx::stdlib::circle_float(float,float2)")
            .with_input(HostProperty::new("radius", "float"))
            .with_input(HostProperty::new("center", "float2"))
            .with_input(HostProperty::new("attr_uiname", "string"))
            .with_output("output", "float");
        let mut cache = NodeDefCache::default();
        let class = classify(&node, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::Ordinary);
        assert_eq!(class.category, "circle");
        assert_eq!(class.type_name.as_deref(), Some("float"));
        assert_eq!(class.ports, vec![PortKind::Input, PortKind::Parameter]);
    }

    #[test]
    fn test_missing_overload_after_reload_fails() {
        let mut doc = library();
        let node = HostNode::new("1", "mdl::mtlx::stdlib::circle_float(color3)")
            .with_input(HostProperty::new("radius", "color"))
            .with_output("output", "float");
        let mut cache = NodeDefCache::default();
        let result = classify(&node, &mut doc, &mut cache, &resolver());
        assert!(matches!(result, Err(Error::MissingMaterialXType(_))));
    }

    #[test]
    fn test_scalar_fed_constructor_is_swizzle_substitute() {
        let mut doc = Document::new();
        let mut cache = NodeDefCache::default();
        let node = constructor("mdl::color(float)", "color", "float");
        let class = classify(&node, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::SwizzleSubstitute);
        assert_eq!(class.category, "swizzle");
        assert_eq!(class.type_name.as_deref(), Some("color3"));

        let identity = constructor("mdl::float3(float3)", "float3", "float3");
        let class = classify(&identity, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::ConstantProxy);
    }

    #[test]
    fn test_exposed_constructor_roles() {
        let mut doc = Document::new();
        let mut cache = NodeDefCache::default();
        let base = constructor("mdl::float(float)", "float", "float").exposed();

        let varying = base.clone().with_annotation("type_modifier", HostValue::Int(2));
        let class = classify(&varying, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::InputProxy);

        let uniform = base.clone().with_annotation("type_modifier", HostValue::Int(1));
        let class = classify(&uniform, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::ParameterProxy);

        let textured = varying.with_annotation("sampler_usage", HostValue::String("roughness".into()));
        let class = classify(&textured, &mut doc, &mut cache, &resolver()).unwrap();
        assert_eq!(class.role, Role::TexturedInputProxy);

        assert!(matches!(
            classify(&base, &mut doc, &mut cache, &resolver()),
            Err(Error::MdlToMaterialX(_))
        ));
    }

    #[test]
    fn test_unknown_node_carries_its_id() {
        let mut doc = Document::new();
        let mut cache = NodeDefCache::default();
        let node = HostNode::new("9", "mdl::base::perlin_noise(float)").with_output("output", "float");
        match classify(&node, &mut doc, &mut cache, &resolver()) {
            Err(Error::UnsupportedMdlType { node_id, .. }) => {
                assert_eq!(node_id.as_deref(), Some("mdl::base::perlin_noise(float)"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multi_constructor_is_unsupported() {
        let mut doc = Document::new();
        let mut cache = NodeDefCache::default();
        let node = HostNode::new("3", "mdl::float2(float,float)")
            .with_input(HostProperty::new("x", "float"))
            .with_input(HostProperty::new("y", "float"))
            .with_output("output", "float2");
        assert!(matches!(
            classify(&node, &mut doc, &mut cache, &resolver()),
            Err(Error::UnsupportedMdlType { .. })
        ));
    }
}
