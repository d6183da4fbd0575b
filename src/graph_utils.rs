//! # Graph Utilities
//!
//! Session-scoped deterministic naming, dependency ordering of node graphs
//! and swizzle body synthesis.

use crate::document::{Node, NodeGraph};
use crate::error::{Error, Result};
use crate::types::{swizzle_channel_names, vector_size, HostType};
use std::collections::{HashMap, HashSet};

/// Host identifiers change every session; this hands out names that only
/// depend on the order in which nodes are first seen.
#[derive(Debug, Default)]
pub struct UniqueNameMap {
    names: HashMap<String, String>,
}

impl UniqueNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `node_<basename>_<ordinal>`, stable for a given identifier
    pub fn node_name(&mut self, identifier: &str, definition: &str) -> String {
        if let Some(name) = self.names.get(identifier) {
            return name.clone();
        }
        let function = definition.split('(').next().unwrap_or_default();
        let base = function.rsplit("::").next().unwrap_or_default();
        let name = format!("node_{}_{}", base, self.names.len());
        self.names.insert(identifier.to_string(), name.clone());
        name
    }

    /// Fresh name for a node with no host counterpart
    pub fn on_the_fly(&mut self) -> String {
        let name = format!("onthefly_{}", self.names.len());
        self.names.insert(name.clone(), name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Nodes upstream of `output_name`, each after all of its dependencies.
/// Shared upstream nodes appear once.
pub fn ordered_nodes<'g>(graph: &'g NodeGraph, output_name: &str) -> Result<Vec<&'g Node>> {
    let output = graph.output(output_name).ok_or_else(|| {
        Error::Document(format!(
            "node graph '{}' has no output '{}'",
            graph.name, output_name
        ))
    })?;
    let Some(start) = output.node_name.as_deref().filter(|n| !n.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut ordered = Vec::new();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut in_progress: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, bool)> = vec![(start, false)];

    while let Some((name, expanded)) = stack.pop() {
        if placed.contains(name) {
            continue;
        }
        let node = graph.node(name).ok_or_else(|| {
            Error::Document(format!(
                "node graph '{}' references missing node '{}'",
                graph.name, name
            ))
        })?;
        if expanded {
            in_progress.remove(name);
            placed.insert(name);
            ordered.push(node);
            continue;
        }
        if !in_progress.insert(name) {
            return Err(Error::Document(format!(
                "cycle through node '{}' in node graph '{}'",
                name, graph.name
            )));
        }
        stack.push((name, true));
        let upstream: Vec<&str> = node.upstream_node_names().collect();
        for parent in upstream.into_iter().rev() {
            if !placed.contains(parent) {
                stack.push((parent, false));
            }
        }
    }
    Ok(ordered)
}

/// Channel index tuples of length `out_size` over `in_size` channels, in
/// lexicographic order
fn channel_permutations(out_size: usize, in_size: usize) -> Vec<Vec<usize>> {
    let mut result: Vec<Vec<usize>> = vec![Vec::new()];
    for _ in 0..out_size {
        result = result
            .into_iter()
            .flat_map(|prev| {
                (0..in_size).map(move |i| {
                    let mut next = prev.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    result
}

/// Body of a swizzle function selecting channels by the runtime string
/// `swizzle_var`. `None` when either type has no channel layout.
pub fn swizzle_body(
    out_type: HostType,
    in_type: HostType,
    src_var: &str,
    swizzle_var: &str,
) -> Option<String> {
    let out_size = vector_size(out_type)?;
    let swizzle_type = in_type;
    let mut source = src_var.to_string();
    let mut component_type = in_type;
    let mut body = String::from("\n");

    // MDL colors have no component access
    if in_type == HostType::Color3 {
        body.push_str(&format!("    float3 fColor({});\n", src_var));
        source = "fColor".to_string();
        component_type = HostType::Float3;
    }
    let in_size = vector_size(component_type)?;
    let component_names: Vec<char> = swizzle_channel_names(component_type)
        .first()?
        .chars()
        .collect();

    let permutations = channel_permutations(out_size, in_size);
    for (map_idx, channel_map) in swizzle_channel_names(swizzle_type).iter().enumerate() {
        let map: Vec<char> = channel_map.chars().collect();
        for (idx, channels) in permutations.iter().enumerate() {
            let keyword = if idx == 0 && map_idx == 0 { "if     " } else { "else if" };
            let swizzle: String = channels.iter().filter_map(|&c| map.get(c)).collect();
            let select = if component_type == HostType::Float {
                vec![source.as_str(); out_size].join(",")
            } else {
                channels
                    .iter()
                    .filter_map(|&c| component_names.get(c))
                    .map(|c| format!("{}.{}", source, c))
                    .collect::<Vec<_>>()
                    .join(",")
            };
            body.push_str(&format!(
                "    {}({} == \"{}\") return {}({});\n",
                keyword, swizzle_var, swizzle, out_type, select
            ));
        }
    }
    body.push_str(&format!("    else return {}(0.0);\n", out_type));
    Some(body)
}
