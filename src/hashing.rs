//! Fingerprint of a host graph, used to tell whether a graph was edited
//! since it was last exported.

use crate::host::{HostGraph, HostNode, HostProperty, HostValue};
use sha2::{Digest, Sha256};

fn join(values: &[f64]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Texture references are left out: their resolved paths differ between
/// sessions
fn value_text(value: &HostValue) -> Option<String> {
    Some(match value {
        HostValue::Int(i) => i.to_string(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Float(f) => f.to_string(),
        HostValue::Float2(v) => join(v),
        HostValue::Float3(v) => join(v),
        HostValue::Float4(v) => join(v),
        HostValue::Color(v) => join(v),
        HostValue::Matrix(rows) => rows.iter().map(|r| join(r)).collect::<Vec<_>>().join(";"),
        HostValue::String(s) | HostValue::Call(s) => s.clone(),
        HostValue::Texture(_) => return None,
    })
}

fn update(hasher: &mut Sha256, text: &str) {
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
}

fn hash_property(hasher: &mut Sha256, property: &HostProperty) {
    update(hasher, &property.id);
    update(hasher, &property.type_id);
    match (&property.connection, &property.value) {
        (Some(connection), _) => update(hasher, &connection.node),
        (None, Some(value)) => {
            if let Some(text) = value_text(value) {
                update(hasher, &text);
            }
        }
        (None, None) => {}
    }
}

fn hash_node(hasher: &mut Sha256, node: &HostNode) {
    update(hasher, &node.identifier);
    for property in node.inputs.iter().chain(&node.outputs).chain(&node.annotations) {
        hash_property(hasher, property);
    }
}

/// SHA-256 hex digest over the graph identifier, every node with its
/// properties, the graph-level properties and the output node identifiers.
///
/// Nodes are visited in graph order, so reordering nodes changes the digest.
pub fn hash_graph(graph: &HostGraph) -> String {
    let mut hasher = Sha256::new();
    update(&mut hasher, &graph.identifier);
    for node in &graph.nodes {
        hash_node(&mut hasher, node);
    }
    for property in &graph.properties {
        hash_property(&mut hasher, property);
    }
    for output in &graph.output_nodes {
        update(&mut hasher, output);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(radius: f64, texture: &str) -> HostGraph {
        let mut graph = HostGraph::new("circle_graph");
        graph.nodes.push(
            HostNode::new("1", "mdl::float(float)")
                .with_input(HostProperty::new("value", "float").with_value(HostValue::Float(radius)))
                .with_output("output", "float"),
        );
        graph.nodes.push(
            HostNode::new("2", "mdl::mtlx::stdlib::circle_float(float)")
                .with_input(HostProperty::new("radius", "float").connected_to("1"))
                .with_input(HostProperty::new("tex", "texture_2d").with_value(HostValue::Texture(texture.into())))
                .with_output("output", "float"),
        );
        graph.output_nodes.push("2".into());
        graph
    }

    #[test]
    fn test_hash_is_stable() {
        let digest = hash_graph(&graph(0.5, "a.png"));
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_graph(&graph(0.5, "a.png")));
    }

    #[test]
    fn test_hash_tracks_values_and_connections() {
        let base = hash_graph(&graph(0.5, "a.png"));
        assert_ne!(base, hash_graph(&graph(0.25, "a.png")));

        let mut rewired = graph(0.5, "a.png");
        rewired.nodes[1].inputs[0] = HostProperty::new("radius", "float").with_value(HostValue::Float(0.5));
        assert_ne!(base, hash_graph(&rewired));
    }

    #[test]
    fn test_texture_paths_do_not_affect_hash() {
        assert_eq!(hash_graph(&graph(0.5, "a.png")), hash_graph(&graph(0.5, "b.png")));
    }
}
