//! # MaterialX Document Model
//!
//! In-memory MaterialX 1.37 document: node definitions, node graphs,
//! materials and geometry property definitions. Every top-level element
//! records the module document it was imported from; an empty source uri
//! marks an element as local to the document.

pub mod xml;

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub type Attributes = BTreeMap<String, String>;

/// Typed input, parameter, bind input or bind param
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueElement {
    pub name: String,
    pub type_name: String,
    pub value: Option<String>,
    /// Upstream node in the same graph
    pub node_name: Option<String>,
    /// Enclosing node definition input or parameter
    pub interface_name: Option<String>,
    /// Graph output a bind input points at
    pub output: Option<String>,
    pub node_graph: Option<String>,
    pub attributes: Attributes,
}

impl ValueElement {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn value_string(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn colorspace(&self) -> &str {
        self.attribute("colorspace").unwrap_or("")
    }

    pub fn set_colorspace(&mut self, colorspace: impl Into<String>) {
        self.set_attribute("colorspace", colorspace);
    }

    pub fn is_connected(&self) -> bool {
        self.node_name.as_deref().map_or(false, |n| !n.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Output {
    pub name: String,
    pub type_name: String,
    pub node_name: Option<String>,
    pub attributes: Attributes,
}

impl Output {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }
}

/// A node instance inside a node graph; `category` is the node string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub name: String,
    pub category: String,
    pub type_name: String,
    pub inputs: Vec<ValueElement>,
    pub parameters: Vec<ValueElement>,
    pub attributes: Attributes,
}

impl Node {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn input(&self, name: &str) -> Option<&ValueElement> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ValueElement> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn add_input(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.inputs.retain(|i| i.name != name);
        self.inputs.push(ValueElement::new(name, type_name));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    pub fn add_parameter(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.parameters.retain(|p| p.name != name);
        self.parameters.push(ValueElement::new(name, type_name));
        let last = self.parameters.len() - 1;
        &mut self.parameters[last]
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Names of upstream nodes, in input declaration order
    pub fn upstream_node_names(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .chain(self.parameters.iter())
            .filter_map(|i| i.node_name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeGraph {
    pub name: String,
    /// Node definition this graph implements
    pub nodedef: Option<String>,
    pub nodes: Vec<Node>,
    pub outputs: Vec<Output>,
    pub attributes: Attributes,
    pub source_uri: String,
}

impl NodeGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn add_node(&mut self, node: Node) -> Result<&mut Node> {
        if self.node(&node.name).is_some() || self.output(&node.name).is_some() {
            return Err(Error::Document(format!(
                "element '{}' already exists in node graph '{}'",
                node.name, self.name
            )));
        }
        self.nodes.push(node);
        let last = self.nodes.len() - 1;
        Ok(&mut self.nodes[last])
    }

    pub fn add_output(&mut self, output: Output) -> Result<&mut Output> {
        if self.node(&output.name).is_some() || self.output(&output.name).is_some() {
            return Err(Error::Document(format!(
                "element '{}' already exists in node graph '{}'",
                output.name, self.name
            )));
        }
        self.outputs.push(output);
        let last = self.outputs.len() - 1;
        Ok(&mut self.outputs[last])
    }

    pub fn is_local(&self) -> bool {
        self.source_uri.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeDef {
    pub name: String,
    /// Node string (category) instances of this definition carry
    pub node: String,
    pub type_name: Option<String>,
    pub inputs: Vec<ValueElement>,
    pub parameters: Vec<ValueElement>,
    pub outputs: Vec<Output>,
    pub attributes: Attributes,
    pub source_uri: String,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            ..Default::default()
        }
    }

    /// Declared type, else the single output's type, else `multioutput`
    pub fn return_type(&self) -> &str {
        if let Some(t) = self.type_name.as_deref().filter(|t| !t.is_empty()) {
            return t;
        }
        match self.outputs.as_slice() {
            [single] => &single.type_name,
            [] => "",
            _ => "multioutput",
        }
    }

    pub fn input(&self, name: &str) -> Option<&ValueElement> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ValueElement> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn add_input(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.inputs.retain(|i| i.name != name);
        self.inputs.push(ValueElement::new(name, type_name));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    pub fn add_parameter(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.parameters.retain(|p| p.name != name);
        self.parameters.push(ValueElement::new(name, type_name));
        let last = self.parameters.len() - 1;
        &mut self.parameters[last]
    }

    pub fn add_output(&mut self, name: &str, type_name: &str) -> &mut Output {
        self.outputs.retain(|o| o.name != name);
        self.outputs.push(Output::new(name, type_name));
        let last = self.outputs.len() - 1;
        &mut self.outputs[last]
    }

    /// Ordered types of all inputs followed by all parameters
    pub fn interface_types(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .chain(self.parameters.iter())
            .map(|e| e.type_name.as_str())
            .collect()
    }

    pub fn is_local(&self) -> bool {
        self.source_uri.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderRef {
    pub name: String,
    pub node: String,
    pub bind_inputs: Vec<ValueElement>,
    pub bind_params: Vec<ValueElement>,
}

impl ShaderRef {
    pub fn add_bind_input(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.bind_inputs.retain(|b| b.name != name);
        self.bind_inputs.push(ValueElement::new(name, type_name));
        let last = self.bind_inputs.len() - 1;
        &mut self.bind_inputs[last]
    }

    pub fn add_bind_param(&mut self, name: &str, type_name: &str) -> &mut ValueElement {
        self.bind_params.retain(|b| b.name != name);
        self.bind_params.push(ValueElement::new(name, type_name));
        let last = self.bind_params.len() - 1;
        &mut self.bind_params[last]
    }

    /// At least one binding points at a graph output
    pub fn has_bound_input(&self) -> bool {
        self.bind_inputs
            .iter()
            .chain(self.bind_params.iter())
            .any(|b| b.output.as_deref().map_or(false, |o| !o.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Material {
    pub name: String,
    pub shader_refs: Vec<ShaderRef>,
    pub source_uri: String,
}

impl Material {
    pub fn add_shader_ref(&mut self, name: &str, node: &str) -> &mut ShaderRef {
        self.shader_refs.push(ShaderRef {
            name: name.to_string(),
            node: node.to_string(),
            ..Default::default()
        });
        let last = self.shader_refs.len() - 1;
        &mut self.shader_refs[last]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeomPropDef {
    pub name: String,
    pub type_name: String,
    pub geomprop: String,
    pub space: Option<String>,
    pub index: Option<String>,
    pub source_uri: String,
}

/// A MaterialX document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub node_defs: Vec<NodeDef>,
    pub node_graphs: Vec<NodeGraph>,
    pub materials: Vec<Material>,
    pub geom_prop_defs: Vec<GeomPropDef>,
    /// `xi:include` targets read from the serialized form
    pub includes: Vec<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.node_defs.iter().any(|e| e.name == name)
            || self.node_graphs.iter().any(|e| e.name == name)
            || self.materials.iter().any(|e| e.name == name)
            || self.geom_prop_defs.iter().any(|e| e.name == name)
    }

    fn check_free(&self, name: &str) -> Result<()> {
        if self.contains_name(name) {
            return Err(Error::Document(format!(
                "element '{}' already exists in document",
                name
            )));
        }
        Ok(())
    }

    pub fn add_node_def(&mut self, node_def: NodeDef) -> Result<&mut NodeDef> {
        self.check_free(&node_def.name)?;
        self.node_defs.push(node_def);
        let last = self.node_defs.len() - 1;
        Ok(&mut self.node_defs[last])
    }

    pub fn add_node_graph(&mut self, node_graph: NodeGraph) -> Result<&mut NodeGraph> {
        self.check_free(&node_graph.name)?;
        self.node_graphs.push(node_graph);
        let last = self.node_graphs.len() - 1;
        Ok(&mut self.node_graphs[last])
    }

    pub fn add_material(&mut self, name: &str) -> Result<&mut Material> {
        self.check_free(name)?;
        self.materials.push(Material {
            name: name.to_string(),
            ..Default::default()
        });
        let last = self.materials.len() - 1;
        Ok(&mut self.materials[last])
    }

    pub fn add_geom_prop_def(&mut self, def: GeomPropDef) -> Result<&mut GeomPropDef> {
        self.check_free(&def.name)?;
        self.geom_prop_defs.push(def);
        let last = self.geom_prop_defs.len() - 1;
        Ok(&mut self.geom_prop_defs[last])
    }

    pub fn node_def(&self, name: &str) -> Option<&NodeDef> {
        self.node_defs.iter().find(|d| d.name == name)
    }

    pub fn node_def_mut(&mut self, name: &str) -> Option<&mut NodeDef> {
        self.node_defs.iter_mut().find(|d| d.name == name)
    }

    pub fn node_graph(&self, name: &str) -> Option<&NodeGraph> {
        self.node_graphs.iter().find(|g| g.name == name)
    }

    pub fn node_graph_mut(&mut self, name: &str) -> Option<&mut NodeGraph> {
        self.node_graphs.iter_mut().find(|g| g.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.name == name)
    }

    pub fn geom_prop_def(&self, name: &str) -> Option<&GeomPropDef> {
        self.geom_prop_defs.iter().find(|g| g.name == name)
    }

    pub fn remove_node_def(&mut self, name: &str) -> Option<NodeDef> {
        let idx = self.node_defs.iter().position(|d| d.name == name)?;
        Some(self.node_defs.remove(idx))
    }

    pub fn remove_node_graph(&mut self, name: &str) -> Option<NodeGraph> {
        let idx = self.node_graphs.iter().position(|g| g.name == name)?;
        Some(self.node_graphs.remove(idx))
    }

    /// Node definitions whose node string is `node`, in document order
    pub fn matching_node_defs(&self, node: &str) -> Vec<&NodeDef> {
        self.node_defs.iter().filter(|d| d.node == node).collect()
    }

    /// Node graphs implementing the named node definition
    pub fn matching_implementations(&self, node_def_name: &str) -> Vec<&NodeGraph> {
        self.node_graphs
            .iter()
            .filter(|g| g.nodedef.as_deref() == Some(node_def_name))
            .collect()
    }

    /// First node definition compatible with a node instance: same category,
    /// same output type, and every bound input/parameter declared with the
    /// same type.
    pub fn node_def_for_node(&self, node: &Node) -> Option<&NodeDef> {
        self.node_defs.iter().find(|d| {
            if d.node != node.category {
                return false;
            }
            if !node.type_name.is_empty() && d.return_type() != node.type_name {
                return false;
            }
            let inputs_ok = node.inputs.iter().all(|i| {
                d.input(&i.name)
                    .map_or(false, |decl| decl.type_name == i.type_name)
            });
            let params_ok = node.parameters.iter().all(|p| {
                d.parameter(&p.name)
                    .map_or(false, |decl| decl.type_name == p.type_name)
            });
            inputs_ok && params_ok
        })
    }

    /// Merge every top-level element of `other` whose name is not taken yet;
    /// source uris are kept as they are.
    pub fn merge_skip_conflicting(&mut self, other: Document) -> usize {
        let mut merged = 0;
        for def in other.node_defs {
            if !self.contains_name(&def.name) {
                self.node_defs.push(def);
                merged += 1;
            }
        }
        for graph in other.node_graphs {
            if !self.contains_name(&graph.name) {
                self.node_graphs.push(graph);
                merged += 1;
            }
        }
        for material in other.materials {
            if !self.contains_name(&material.name) {
                self.materials.push(material);
                merged += 1;
            }
        }
        for geom in other.geom_prop_defs {
            if !self.contains_name(&geom.name) {
                self.geom_prop_defs.push(geom);
                merged += 1;
            }
        }
        merged
    }

    /// Merge `other` as a library: local elements of `other` are tagged as
    /// coming from `uri`.
    pub fn import_skip_conflicting(&mut self, mut other: Document, uri: &str) -> usize {
        other.node_defs.iter_mut().for_each(|e| tag_uri(&mut e.source_uri, uri));
        other.node_graphs.iter_mut().for_each(|e| tag_uri(&mut e.source_uri, uri));
        other.materials.iter_mut().for_each(|e| tag_uri(&mut e.source_uri, uri));
        other.geom_prop_defs.iter_mut().for_each(|e| tag_uri(&mut e.source_uri, uri));
        self.merge_skip_conflicting(other)
    }

    /// Distinct source uris of imported elements, sorted
    pub fn source_uris(&self) -> BTreeSet<String> {
        self.node_defs
            .iter()
            .map(|e| &e.source_uri)
            .chain(self.node_graphs.iter().map(|e| &e.source_uri))
            .chain(self.materials.iter().map(|e| &e.source_uri))
            .chain(self.geom_prop_defs.iter().map(|e| &e.source_uri))
            .filter(|uri| !uri.is_empty())
            .cloned()
            .collect()
    }

    /// Whether any element was imported from a document of `module`
    pub fn contains_module(&self, module: &str) -> bool {
        self.source_uris()
            .iter()
            .any(|uri| module_of_uri(uri) == module)
    }

    /// Structural validation. Returns the verdict and a newline-separated log.
    pub fn validate(&self) -> (bool, String) {
        let mut log = Vec::new();

        for def in &self.node_defs {
            let mut seen = HashSet::new();
            for output in &def.outputs {
                if !seen.insert(output.name.as_str()) {
                    log.push(format!(
                        "Duplicate output '{}' in nodedef '{}'",
                        output.name, def.name
                    ));
                }
            }
        }

        for graph in &self.node_graphs {
            validate_graph(self, graph, &mut log);
        }

        for material in &self.materials {
            for shader_ref in &material.shader_refs {
                if shader_ref.node.is_empty() {
                    log.push(format!(
                        "Shader reference '{}' has no node string",
                        shader_ref.name
                    ));
                }
                for bind in shader_ref.bind_inputs.iter().chain(shader_ref.bind_params.iter()) {
                    let Some(graph_name) = bind.node_graph.as_deref() else {
                        continue;
                    };
                    match self.node_graph(graph_name) {
                        None => log.push(format!(
                            "Binding '{}' references missing node graph '{}'",
                            bind.name, graph_name
                        )),
                        Some(graph) => {
                            if let Some(output) = bind.output.as_deref() {
                                if graph.output(output).is_none() {
                                    log.push(format!(
                                        "Binding '{}' references missing output '{}' of '{}'",
                                        bind.name, output, graph_name
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        (log.is_empty(), log.join("\n"))
    }
}

fn tag_uri(source_uri: &mut String, uri: &str) {
    if source_uri.is_empty() {
        *source_uri = uri.to_string();
    }
}

fn validate_graph(doc: &Document, graph: &NodeGraph, log: &mut Vec<String>) {
    let mut names = HashSet::new();
    for node in &graph.nodes {
        if !names.insert(node.name.as_str()) {
            log.push(format!(
                "Duplicate node '{}' in node graph '{}'",
                node.name, graph.name
            ));
        }
        if node.type_name.is_empty() {
            log.push(format!("Node '{}' has no type", node.name));
        }
        for upstream in node.upstream_node_names() {
            if graph.node(upstream).is_none() {
                log.push(format!(
                    "Node '{}' is connected to missing node '{}'",
                    node.name, upstream
                ));
            }
        }
    }
    for output in &graph.outputs {
        if let Some(upstream) = output.node_name.as_deref() {
            if graph.node(upstream).is_none() {
                log.push(format!(
                    "Output '{}' is connected to missing node '{}'",
                    output.name, upstream
                ));
            }
        }
    }

    let Some(def_name) = graph.nodedef.as_deref() else {
        return;
    };
    let Some(def) = doc.node_def(def_name) else {
        log.push(format!(
            "Node graph '{}' implements missing nodedef '{}'",
            graph.name, def_name
        ));
        return;
    };
    if !def.outputs.is_empty() {
        let declared: BTreeSet<&str> = def.outputs.iter().map(|o| o.name.as_str()).collect();
        let provided: BTreeSet<&str> = graph.outputs.iter().map(|o| o.name.as_str()).collect();
        if declared != provided {
            log.push(format!(
                "Outputs of node graph '{}' do not match nodedef '{}'",
                graph.name, def.name
            ));
        }
    }
    for node in &graph.nodes {
        for element in node.inputs.iter().chain(node.parameters.iter()) {
            if let Some(interface) = element.interface_name.as_deref() {
                if def.input(interface).is_none() && def.parameter(interface).is_none() {
                    log.push(format!(
                        "Node '{}' references missing interface '{}'",
                        node.name, interface
                    ));
                }
            }
        }
    }
}

/// Module path of a source uri (`stdlib/stdlib_defs.mtlx` -> `stdlib`)
pub fn module_of_uri(uri: &str) -> &str {
    let uri = uri.trim_end_matches('/');
    match uri.rfind(|c| c == '/' || c == '\\') {
        Some(idx) => &uri[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Document {
        let mut lib = Document::new();
        let mut add_f = NodeDef::new("ND_add_float", "add");
        add_f.type_name = Some("float".into());
        add_f.add_input("in1", "float");
        add_f.add_input("in2", "float");
        lib.add_node_def(add_f).unwrap();

        let mut add_c = NodeDef::new("ND_add_color3", "add");
        add_c.type_name = Some("color3".into());
        add_c.add_input("in1", "color3");
        add_c.add_input("in2", "color3");
        lib.add_node_def(add_c).unwrap();
        lib
    }

    #[test]
    fn test_import_tags_source_uri_and_skips_conflicts() {
        let mut doc = Document::new();
        doc.add_node_def(NodeDef::new("ND_add_float", "custom")).unwrap();

        let merged = doc.import_skip_conflicting(library(), "stdlib/stdlib_defs.mtlx");

        assert_eq!(merged, 1);
        assert_eq!(doc.node_def("ND_add_float").unwrap().node, "custom");
        assert_eq!(
            doc.node_def("ND_add_color3").unwrap().source_uri,
            "stdlib/stdlib_defs.mtlx"
        );
        assert!(doc.contains_module("stdlib"));
        assert!(!doc.contains_module("bxdf"));
    }

    #[test]
    fn test_node_def_for_node_matches_types() {
        let doc = library();
        let mut node = Node::new("add", "n0", "color3");
        node.add_input("in1", "color3");
        assert_eq!(doc.node_def_for_node(&node).unwrap().name, "ND_add_color3");

        node.add_input("in2", "float");
        assert!(doc.node_def_for_node(&node).is_none());
    }

    #[test]
    fn test_return_type_from_outputs() {
        let mut def = NodeDef::new("ND_multi", "multi");
        assert_eq!(def.return_type(), "");
        def.add_output("a", "float");
        assert_eq!(def.return_type(), "float");
        def.add_output("b", "color3");
        assert_eq!(def.return_type(), "multioutput");
    }

    #[test]
    fn test_validate_reports_dangling_connections() {
        let mut doc = Document::new();
        let mut graph = NodeGraph::new("g");
        let mut node = Node::new("add", "n0", "float");
        node.add_input("in1", "float").node_name = Some("missing".into());
        graph.add_node(node).unwrap();
        doc.add_node_graph(graph).unwrap();

        let (ok, log) = doc.validate();
        assert!(!ok);
        assert!(log.contains("missing node 'missing'"));
    }

    #[test]
    fn test_module_of_uri() {
        assert_eq!(module_of_uri("stdlib/stdlib_defs.mtlx"), "stdlib");
        assert_eq!(module_of_uri("a/b/c.mtlx"), "a/b");
        assert_eq!(module_of_uri("c.mtlx"), "");
    }
}
