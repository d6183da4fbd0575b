//! # Nodegraph Bodies
//!
//! Compiles a local nodegraph implementation into a function body: one
//! typed local per node in dependency order, then a return of the variable
//! feeding the single output.

use crate::document::{Document, Node, NodeDef, NodeGraph, ValueElement};
use crate::error::{Error, Result};
use crate::graph_utils::ordered_nodes;
use crate::modules::mdl_namespace_for_uri;
use crate::types::{corrected_function_name, corrected_input_name, host_type_of_name, HostType, PortableType};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Node definitions whose function name carries a `_<type>` suffix, keyed
/// by node definition name
pub type ClashSet = HashSet<String>;

/// Function name of a node definition after reserved-word correction and
/// clash decoration, unqualified
pub fn function_name(def: &NodeDef, clashing: &ClashSet) -> String {
    let mut name = corrected_function_name(&def.node);
    if clashing.contains(&def.name) {
        name.push('_');
        name.push_str(def.return_type());
    }
    name
}

/// Function name qualified by the module the definition was imported from;
/// the module is recorded as used
pub fn qualified_function_name(
    def: &NodeDef,
    clashing: &ClashSet,
    used_modules: &mut BTreeSet<String>,
) -> String {
    let name = function_name(def, clashing);
    let namespace = mdl_namespace_for_uri(&def.source_uri);
    if namespace.is_empty() {
        return name;
    }
    let qualified = format!("{}::{}", namespace, name);
    used_modules.insert(namespace);
    qualified
}

/// Constructor call holding an element's value
fn value_expression(element: &ValueElement) -> Result<String> {
    let host_type = host_type_of_name(&element.type_name)?;
    Ok(match host_type {
        HostType::String | HostType::Texture2d => format!("{}(\"{}\")", host_type, element.value_string()),
        _ => format!("{}({})", host_type, element.value_string()),
    })
}

fn unresolved_argument(node: &Node, name: &str) -> Error {
    Error::MdlGeneration(format!(
        "Couldn't find input, constant or interface name on input {} of node {}",
        name, node.name
    ))
}

struct BodyCompiler<'a> {
    doc: &'a Document,
    graph: &'a NodeGraph,
    clashing: &'a ClashSet,
    variables: HashMap<&'a str, String>,
}

impl<'a> BodyCompiler<'a> {
    fn declaration(&mut self, node: &'a Node, used_modules: &mut BTreeSet<String>) -> Result<String> {
        let def = self.doc.node_def_for_node(node).ok_or_else(|| {
            Error::MdlGeneration(format!("No node def found for node {}", node.name))
        })?;
        let variable = format!("v_{}", self.variables.len());
        let host_type = host_type_of_name(&node.type_name)?;
        let callee = qualified_function_name(def, self.clashing, used_modules);

        let mut arguments = Vec::with_capacity(def.inputs.len() + def.parameters.len());
        for declared in &def.inputs {
            let argument = match node.input(&declared.name) {
                None => value_expression(declared)?,
                Some(input) if input.is_connected() => {
                    let upstream = input.node_name.as_deref().unwrap_or_default();
                    if let Some(upstream_node) = self.graph.node(upstream) {
                        let skipped = PortableType::from_name(&upstream_node.type_name)
                            .map_or(false, |t| t.is_skipped());
                        if skipped {
                            return Err(Error::MdlGeneration(format!(
                                "Type {} not supported in mdl conversion",
                                upstream_node.type_name
                            )));
                        }
                    }
                    self.variables
                        .get(upstream)
                        .cloned()
                        .ok_or_else(|| unresolved_argument(node, &declared.name))?
                }
                Some(input) => match input.interface_name.as_deref().filter(|i| !i.is_empty()) {
                    Some(interface) => corrected_input_name(interface),
                    None if !input.value_string().is_empty() => value_expression(input)?,
                    None => return Err(unresolved_argument(node, &declared.name)),
                },
            };
            arguments.push(argument);
        }
        for declared in &def.parameters {
            let argument = match node.parameter(&declared.name) {
                None => value_expression(declared)?,
                Some(param) => match param.interface_name.as_deref().filter(|i| !i.is_empty()) {
                    Some(interface) => corrected_input_name(interface),
                    None if param.value.is_some() => value_expression(param)?,
                    None => return Err(unresolved_argument(node, &declared.name)),
                },
            };
            arguments.push(argument);
        }

        let statement = format!("{} {} = {}({});", host_type, variable, callee, arguments.join(", "));
        self.variables.insert(node.name.as_str(), variable);
        Ok(statement)
    }
}

/// Body of a function implemented by `graph`.
///
/// Fails for graphs without exactly one output, for nodes without a
/// matching definition and for arguments with no connection, interface
/// or value.
pub fn compile_nodegraph_body(
    graph: &NodeGraph,
    doc: &Document,
    clashing: &ClashSet,
    used_modules: &mut BTreeSet<String>,
) -> Result<String> {
    let [output] = graph.outputs.as_slice() else {
        return Err(Error::MdlGeneration(format!(
            "Multioutput nodes not supported: {}",
            graph.name
        )));
    };

    let mut compiler = BodyCompiler {
        doc,
        graph,
        clashing,
        variables: HashMap::new(),
    };
    let mut body = String::from("\n");
    for node in ordered_nodes(graph, &output.name)? {
        let statement = compiler.declaration(node, used_modules)?;
        body.push_str("    ");
        body.push_str(&statement);
        body.push('\n');
    }

    let result = output
        .node_name
        .as_deref()
        .and_then(|n| compiler.variables.get(n))
        .ok_or_else(|| {
            Error::MdlGeneration(format!("Output {} of {} is not connected", output.name, graph.name))
        })?;
    body.push_str(&format!("    return {};\n", result));
    Ok(body)
}
