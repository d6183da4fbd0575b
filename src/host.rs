//! # Host Graph Model
//!
//! Serializable snapshot of an MDL shading graph as exposed by the host
//! application: nodes with typed input, output and annotation properties,
//! upstream connections and the designated output node.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declared variability of an exposed constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeModifier {
    #[default]
    Auto,
    Uniform,
    Varying,
}

/// Property value. `Call` is a late-bound expression such as
/// `mtlx::stdlib::getGeomPropDef_UV0()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostValue {
    Int(i64),
    Bool(bool),
    Float(f64),
    Float2([f64; 2]),
    Float3([f64; 3]),
    Float4([f64; 4]),
    /// Color components in r, g, b, a order
    Color(Vec<f64>),
    /// Row-major matrix
    Matrix(Vec<Vec<f64>>),
    String(String),
    Texture(String),
    Call(String),
}

impl HostValue {
    /// Host type id implied by the value itself
    pub fn type_id(&self) -> &'static str {
        match self {
            HostValue::Int(_) => "int",
            HostValue::Bool(_) => "bool",
            HostValue::Float(_) => "float",
            HostValue::Float2(_) => "float2",
            HostValue::Float3(_) => "float3",
            HostValue::Float4(_) => "float4",
            HostValue::Color(c) if c.len() == 4 => "color4",
            HostValue::Color(c) if c.len() == 2 => "color2",
            HostValue::Color(_) => "color",
            HostValue::Matrix(rows) if rows.len() == 4 => "float4x4",
            HostValue::Matrix(_) => "float3x3",
            HostValue::String(_) => "string",
            HostValue::Texture(_) => "texture_2d",
            HostValue::Call(_) => "",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) | HostValue::Texture(s) | HostValue::Call(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            HostValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, HostValue::Call(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConnection {
    /// Identifier of the upstream node
    pub node: String,
    #[serde(default = "default_output_id")]
    pub output: String,
}

fn default_output_id() -> String {
    "output".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProperty {
    pub id: String,
    /// Host type id; may be empty on unconnected polymorphic pins
    #[serde(rename = "type", default)]
    pub type_id: String,
    #[serde(default)]
    pub modifier: TypeModifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<HostValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<HostConnection>,
}

impl HostProperty {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            modifier: TypeModifier::Auto,
            value: None,
            connection: None,
        }
    }

    pub fn with_value(mut self, value: HostValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn connected_to(mut self, node: impl Into<String>) -> Self {
        self.connection = Some(HostConnection {
            node: node.into(),
            output: default_output_id(),
        });
        self
    }

    pub fn uniform(mut self) -> Self {
        self.modifier = TypeModifier::Uniform;
        self
    }

    /// Declared type, falling back to the type of the held value
    pub fn effective_type_id(&self) -> &str {
        if self.type_id.is_empty() {
            self.value.as_ref().map_or("", HostValue::type_id)
        } else {
            &self.type_id
        }
    }

    /// Value-calls count as bound inputs
    pub fn is_bound(&self) -> bool {
        self.connection.is_some() || self.value.as_ref().map_or(false, HostValue::is_call)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostNode {
    /// Session-scoped identifier, not stable across sessions
    pub identifier: String,
    /// Definition id, e.g. `mdl::mtlx::stdlib::add_float(float,float)`
    pub definition: String,
    #[serde(default)]
    pub inputs: Vec<HostProperty>,
    #[serde(default)]
    pub outputs: Vec<HostProperty>,
    #[serde(default)]
    pub annotations: Vec<HostProperty>,
    /// Promoted to a graph interface parameter
    #[serde(default)]
    pub exposed: bool,
}

impl HostNode {
    pub fn new(identifier: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            definition: definition.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            annotations: Vec::new(),
            exposed: false,
        }
    }

    pub fn input(&self, id: &str) -> Option<&HostProperty> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn annotation(&self, id: &str) -> Option<&HostValue> {
        self.annotations
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.value.as_ref())
    }

    pub fn annotation_str(&self, id: &str) -> Option<&str> {
        self.annotation(id).and_then(HostValue::as_str)
    }

    /// Non-empty string annotation
    pub fn annotation_text(&self, id: &str) -> Option<&str> {
        self.annotation_str(id).filter(|s| !s.is_empty())
    }

    /// Variability declared through the `type_modifier` annotation, given
    /// either as its enum ordinal or by name
    pub fn type_modifier(&self) -> Option<TypeModifier> {
        match self.annotation("type_modifier")? {
            HostValue::Int(0) => Some(TypeModifier::Auto),
            HostValue::Int(1) => Some(TypeModifier::Uniform),
            HostValue::Int(2) => Some(TypeModifier::Varying),
            HostValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "auto" => Some(TypeModifier::Auto),
                "uniform" => Some(TypeModifier::Uniform),
                "varying" => Some(TypeModifier::Varying),
                _ => None,
            },
            _ => None,
        }
    }

    /// Value of an input property, if set
    pub fn input_value(&self, id: &str) -> Option<&HostValue> {
        self.input(id).and_then(|p| p.value.as_ref())
    }

    pub fn with_input(mut self, property: HostProperty) -> Self {
        self.inputs.push(property);
        self
    }

    pub fn with_output(mut self, id: &str, type_id: &str) -> Self {
        self.outputs.push(HostProperty::new(id, type_id));
        self
    }

    pub fn with_annotation(mut self, id: &str, value: HostValue) -> Self {
        self.annotations
            .push(HostProperty::new(id, value.type_id()).with_value(value));
        self
    }

    pub fn exposed(mut self) -> Self {
        self.exposed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGraph {
    pub identifier: String,
    #[serde(default)]
    pub nodes: Vec<HostNode>,
    /// Identifiers of the declared output nodes
    #[serde(default)]
    pub output_nodes: Vec<String>,
    /// Graph-level properties
    #[serde(default)]
    pub properties: Vec<HostProperty>,
}

impl HostGraph {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            nodes: Vec::new(),
            output_nodes: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn node(&self, identifier: &str) -> Option<&HostNode> {
        self.nodes.iter().find(|n| n.identifier == identifier)
    }

    /// Upstream node feeding a property, if connected
    pub fn upstream(&self, property: &HostProperty) -> Result<Option<&HostNode>> {
        match &property.connection {
            None => Ok(None),
            Some(connection) => self.node(&connection.node).map(Some).ok_or_else(|| {
                Error::MdlToMaterialX(format!(
                    "Property {} is connected to unknown node {}",
                    property.id, connection.node
                ))
            }),
        }
    }

    /// The single declared output node
    pub fn root_node(&self) -> Result<&HostNode> {
        match self.output_nodes.as_slice() {
            [] => Err(Error::MdlToMaterialX(
                "No output node defined in the graph".to_string(),
            )),
            [single] => self.node(single).ok_or_else(|| {
                Error::MdlToMaterialX(format!("Output node {} not found in graph", single))
            }),
            _ => Err(Error::MdlToMaterialX(
                "Multiple output nodes defined in the graph".to_string(),
            )),
        }
    }

    pub fn is_root(&self, node: &HostNode) -> Result<bool> {
        Ok(self.root_node()?.identifier == node.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_from_json() {
        let text = r#"{
            "identifier": "graph",
            "nodes": [
                {
                    "identifier": "1",
                    "definition": "mdl::float(float)",
                    "exposed": true,
                    "inputs": [{ "id": "value", "type": "float", "value": { "float": 0.5 } }],
                    "outputs": [{ "id": "output", "type": "float" }],
                    "annotations": [
                        { "id": "identifier", "type": "string", "value": { "string": "size" } }
                    ]
                },
                {
                    "identifier": "2",
                    "definition": "mdl::mtlx::stdlib::circle_float(float)",
                    "inputs": [{ "id": "radius", "type": "float", "connection": { "node": "1" } }],
                    "outputs": [{ "id": "output", "type": "float" }]
                }
            ],
            "output_nodes": ["2"]
        }"#;
        let graph = HostGraph::from_json_str(text).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.root_node().unwrap().identifier, "2");
        assert_eq!(graph.nodes[0].annotation_text("identifier"), Some("size"));

        let radius = graph.nodes[1].input("radius").unwrap();
        assert_eq!(radius.connection.as_ref().unwrap().output, "output");
        assert_eq!(graph.upstream(radius).unwrap().unwrap().identifier, "1");
    }

    #[test]
    fn test_root_node_requires_exactly_one_output() {
        let mut graph = HostGraph::new("g");
        assert!(matches!(graph.root_node(), Err(Error::MdlToMaterialX(_))));
        graph.output_nodes = vec!["a".into(), "b".into()];
        assert!(matches!(graph.root_node(), Err(Error::MdlToMaterialX(_))));
    }

    #[test]
    fn test_effective_type_falls_back_to_value() {
        let prop = HostProperty::new("in", "").with_value(HostValue::Float3([0.0, 1.0, 2.0]));
        assert_eq!(prop.effective_type_id(), "float3");
        let call = HostProperty::new("uv", "float2")
            .with_value(HostValue::Call("getGeomPropDef_UV0()".into()));
        assert!(call.is_bound());
    }

    #[test]
    fn test_type_modifier_annotation() {
        let node = HostNode::new("1", "mdl::float(float)")
            .with_annotation("type_modifier", HostValue::Int(2));
        assert_eq!(node.type_modifier(), Some(TypeModifier::Varying));
        let node = HostNode::new("2", "mdl::float(float)")
            .with_annotation("type_modifier", HostValue::String("uniform".into()));
        assert_eq!(node.type_modifier(), Some(TypeModifier::Uniform));
        assert_eq!(HostNode::new("3", "mdl::float(float)").type_modifier(), None);
    }
}
