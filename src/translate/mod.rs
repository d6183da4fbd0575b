//! # MDL to MaterialX Translation
//!
//! Converts a host MDL shading graph into a MaterialX document.
//!
//! Every host node is classified once per translation (see [`classify`]):
//! exposed constants become node definition inputs or parameters,
//! MaterialX-backed nodes become node instances in the implementation graph,
//! and the designated output is turned into either a material, a subgraph
//! output, or a dummy emissive material around an arbitrary node.
//!
//! Three export modes are provided:
//!
//! - [`translate_material`] binds the root surface shader into a material
//!   and republishes the node definition through a `<name>_Bind` graph
//! - [`translate_subgraph`] exposes every subgraph output proxy as an output
//! - [`translate_custom_root`] treats a selected node as the output and
//!   routes it into the emission of a `standard_surface`

pub mod classify;
pub mod values;

pub use classify::{classify, Classification, NodeDefCache, PortKind, Role};

use crate::document::{Document, Node, NodeDef, NodeGraph, Output, ShaderRef, ValueElement};
use crate::error::{Error, Result};
use crate::graph_utils::UniqueNameMap;
use crate::host::{HostGraph, HostNode, HostValue, TypeModifier};
use crate::modules::ModuleResolver;
use crate::types::uncorrected_input_name;
use classify::{interface_name, portable_type_name, SUBGRAPH_OUTPUT_PREFIX};
use std::path::{Path, PathBuf};

/// Node attribute carrying the texture usage of a sampler
pub const GLSLFX_USAGE: &str = "GLSLFX_usage";

const STDLIB_MODULE: &str = "stdlib";
const SURFACE_MODULE: &str = "stdlib/bxdf";
const SURFACE_SHADER: &str = "surfaceshader";
const TEXTURE_CONSTRUCTOR: &str = "mdl::texture_2d";
const DEFAULT_COLOR_SPACE: &str = "srgb_texture";
const COLOR_SPACES_BY_GAMMA: [&str; 3] = ["srgb_texture", "linear", "srgb_texture"];

/// Options shared by all export modes
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Filename values are written relative to this directory
    pub resource_root: Option<PathBuf>,
}

/// Top-level element produced while walking the host graph
#[derive(Debug, Clone, PartialEq, Eq)]
enum Produced {
    Material(String),
    Output(String),
}

/// Channels routing a forced root of the given type into a color3
fn forced_root_channels(type_name: &str) -> Option<&'static str> {
    match type_name {
        "float" => Some("x"),
        "vector2" => Some("xyy"),
        "vector3" => Some("xyz"),
        "vector4" => Some("xyz"),
        "color4" => Some("rgb"),
        _ => None,
    }
}

fn swizzle_substitute_channels(type_name: &str) -> Option<String> {
    let (channel, count) = match type_name {
        "vector2" => ('x', 2),
        "vector3" => ('x', 3),
        "vector4" => ('x', 4),
        "color3" => ('r', 3),
        _ => return None,
    };
    Some(std::iter::repeat(channel).take(count).collect())
}

/// Apply the gamma annotation of a texture source as the colorspace of a
/// filename element; only color3 samplers carry a colorspace
fn apply_gamma(source: &HostNode, file: &mut ValueElement, return_type: &str) {
    if return_type != "color3" {
        return;
    }
    let space = source
        .annotation("gamma_type")
        .and_then(HostValue::as_int)
        .and_then(|gamma| usize::try_from(gamma).ok())
        .and_then(|gamma| COLOR_SPACES_BY_GAMMA.get(gamma).copied())
        .unwrap_or(DEFAULT_COLOR_SPACE);
    file.set_colorspace(space);
}

fn binding<'s>(
    shader_ref: &'s mut ShaderRef,
    varying: bool,
    name: &str,
    type_name: &str,
) -> &'s mut ValueElement {
    if varying {
        shader_ref.add_bind_input(name, type_name)
    } else {
        shader_ref.add_bind_param(name, type_name)
    }
}

/// State of one translation call. Nothing here outlives the call.
struct Translator<'a> {
    host: &'a HostGraph,
    resolver: &'a ModuleResolver,
    resource_root: Option<&'a Path>,
    name: String,
    doc: Document,
    node_def: NodeDef,
    graph: NodeGraph,
    names: UniqueNameMap,
    node_defs: NodeDefCache,
}

impl<'a> Translator<'a> {
    fn new(
        host: &'a HostGraph,
        name: &str,
        node_def_name: &str,
        resolver: &'a ModuleResolver,
        options: &'a TranslateOptions,
    ) -> Result<Self> {
        let node_def = NodeDef::new(node_def_name, name);
        let mut graph = NodeGraph::new(format!("{}_graph", name));
        graph.nodedef = Some(node_def.name.clone());

        // Reserve the local names before any library import
        let mut doc = Document::new();
        doc.add_node_def(NodeDef::new(node_def_name, name))?;
        let mut placeholder = NodeGraph::new(graph.name.clone());
        placeholder.nodedef = graph.nodedef.clone();
        doc.add_node_graph(placeholder)?;
        resolver.load_module(STDLIB_MODULE, &mut doc)?;

        Ok(Self {
            host,
            resolver,
            resource_root: options.resource_root.as_deref(),
            name: name.to_string(),
            doc,
            node_def,
            graph,
            names: UniqueNameMap::new(),
            node_defs: NodeDefCache::default(),
        })
    }

    fn finish(self) -> (Document, String, String) {
        let Translator {
            mut doc,
            node_def,
            graph,
            ..
        } = self;
        let def_name = node_def.name.clone();
        let graph_name = graph.name.clone();
        if let Some(slot) = doc.node_def_mut(&def_name) {
            *slot = node_def;
        }
        if let Some(slot) = doc.node_graph_mut(&graph_name) {
            *slot = graph;
        }
        (doc, def_name, graph_name)
    }

    fn classify_node(&mut self, node: &HostNode) -> Result<Classification> {
        classify(node, &mut self.doc, &mut self.node_defs, self.resolver)
    }

    /// Walk the host nodes in graph order
    fn run(&mut self, force_root: Option<&HostNode>) -> Result<Vec<Produced>> {
        let host = self.host;
        let mut produced = Vec::new();

        for node in &host.nodes {
            if node.definition.is_empty() {
                return Err(Error::unsupported(format!(
                    "Failed to find mdl definition for node {}",
                    node.identifier
                )));
            }
            let class = self.classify_node(node)?;
            let is_selected = force_root.map_or(false, |r| r.identifier == node.identifier);
            let is_surface = class.type_name.as_deref() == Some(SURFACE_SHADER);
            let mut created = None;

            if is_surface {
                let bind = match force_root {
                    Some(_) => is_selected,
                    None => host.is_root(node)?,
                };
                if bind {
                    produced.push(Produced::Material(self.bind_material(node, &class)?));
                }
            } else {
                match class.role {
                    Role::SubgraphOutputProxy => {
                        if force_root.is_none() {
                            produced.push(Produced::Output(self.add_subgraph_output(node, &class)?));
                        }
                    }
                    Role::InputProxy => {
                        created = self.add_interface_proxy(node, &class, PortKind::Input, force_root.is_some())?;
                    }
                    Role::ParameterProxy => {
                        created = self.add_interface_proxy(node, &class, PortKind::Parameter, force_root.is_some())?;
                    }
                    // Handled by the node consuming the sampler
                    Role::SamplerProxy => {}
                    Role::TexturedInputProxy => {
                        created = Some(self.add_textured_input_proxy(node, &class)?);
                    }
                    Role::Ordinary | Role::ConstantProxy | Role::SwizzleSubstitute => {
                        if class.type_name.is_none() {
                            return Err(Error::MissingMaterialXType(format!(
                                "Unknown return type in node {}",
                                class.category
                            )));
                        }
                        created = self.add_node(node, &class)?;
                    }
                }
            }

            if is_selected && !is_surface {
                let created = created.ok_or_else(|| {
                    Error::MdlToMaterialX(format!(
                        "Output node not converted to MaterialX {}",
                        node.definition
                    ))
                })?;
                produced.push(Produced::Material(self.bind_node_to_material(&created)?));
            }
        }
        Ok(produced)
    }

    /// Connect an element to an upstream host node: interface proxies bind
    /// by interface name, everything else by node name
    fn connect_element(&mut self, element: &mut ValueElement, upstream: &HostNode) -> Result<()> {
        let source = self.classify_node(upstream)?;
        if source.role.is_interface() {
            element.interface_name = Some(interface_name(upstream));
        } else {
            element.node_name = Some(self.names.node_name(&upstream.identifier, &upstream.definition));
        }
        Ok(())
    }

    /// Node a graph output should point at for an upstream host node.
    /// Outputs cannot reference the interface directly, so interface proxies
    /// get a `dot` node in between.
    fn graph_output_source(&mut self, upstream: &HostNode) -> Result<String> {
        let source = self.classify_node(upstream)?;
        if !source.role.is_interface() {
            return Ok(self.names.node_name(&upstream.identifier, &upstream.definition));
        }
        let interface = interface_name(upstream);
        let type_name = source.type_name.unwrap_or_default();
        let dot_name = format!("{}_constant", interface);
        let mut dot = Node::new("dot", &dot_name, &type_name);
        dot.add_input("in", &type_name).interface_name = Some(interface);
        self.graph.add_node(dot)?;
        Ok(dot_name)
    }

    fn bind_parameter_source(
        &mut self,
        mx_node: &mut Node,
        param: &mut ValueElement,
        upstream: &HostNode,
        definition: &str,
    ) -> Result<()> {
        let source = self.classify_node(upstream)?;
        match source.role {
            Role::InputProxy | Role::ParameterProxy => {
                param.interface_name = Some(interface_name(upstream));
            }
            Role::SamplerProxy => {
                let usage = upstream.annotation_str("sampler_usage").unwrap_or("");
                mx_node.set_attribute(GLSLFX_USAGE, usage);
                let return_type = mx_node.type_name.clone();
                apply_gamma(upstream, param, &return_type);
            }
            Role::ConstantProxy => {
                let [only] = upstream.inputs.as_slice() else {
                    return Err(Error::MdlToMaterialX(
                        "Expected strictly one input property on constant node".to_string(),
                    ));
                };
                values::set_element_value(param, only.value.as_ref(), self.resource_root);
                if mx_node.category == "image" && definition.contains("texture_2d") {
                    mx_node.set_attribute(GLSLFX_USAGE, "");
                }
            }
            _ => {
                tracing::debug!(
                    "[mdl2mtlx] Parameter {} of {} left unbound, its source cannot feed parameters",
                    param.name,
                    mx_node.name
                );
            }
        }
        Ok(())
    }

    /// Instantiate a node for an ordinary, constant or swizzle host node
    fn add_node(&mut self, node: &HostNode, class: &Classification) -> Result<Option<String>> {
        // Consumed by the node referencing it
        if node.definition.starts_with(TEXTURE_CONSTRUCTOR) {
            return Ok(None);
        }
        let host = self.host;
        let type_name = class.type_name.clone().unwrap_or_default();
        let name = self.names.node_name(&node.identifier, &node.definition);
        let mut mx_node = Node::new(&class.category, &name, &type_name);

        for (idx, input) in node.inputs.iter().enumerate() {
            let input_type = match portable_type_name(input.effective_type_id()) {
                Ok(t) => t.as_str(),
                Err(_) => {
                    tracing::warn!(
                        "[mdl2mtlx] Skipping unmapped input {} of type '{}'",
                        input.id,
                        input.effective_type_id()
                    );
                    continue;
                }
            };
            let port_name = match class.role {
                Role::ConstantProxy => "value",
                Role::SwizzleSubstitute if uncorrected_input_name(&input.id) == "value" => "in",
                _ => uncorrected_input_name(&input.id),
            };

            if port_name.contains("attr_") {
                let attribute = port_name.strip_prefix("attr_").ok_or_else(|| {
                    Error::MdlToMaterialX(format!("attr_ is not the leftmost part of {}", port_name))
                })?;
                mx_node.set_attribute(attribute, values::attribute_text(input.value.as_ref()));
                continue;
            }

            let kind = class.ports.get(idx).copied().ok_or_else(|| {
                Error::MdlToMaterialX(format!(
                    "Inconsistent parameter list length for MaterialX node {} expected length: {}, parameter list length {}",
                    class.category,
                    node.inputs.len(),
                    class.ports.len()
                ))
            })?;

            let mut element = ValueElement::new(port_name, input_type);
            let upstream = host.upstream(input)?;
            match (kind, upstream) {
                (PortKind::Parameter, Some(upstream)) => {
                    self.bind_parameter_source(&mut mx_node, &mut element, upstream, &node.definition)?;
                }
                (PortKind::Input, Some(upstream)) => {
                    self.connect_element(&mut element, upstream)?;
                }
                (_, None) => {
                    values::set_element_value(&mut element, input.value.as_ref(), self.resource_root);
                }
            }
            match kind {
                PortKind::Parameter => *mx_node.add_parameter(port_name, input_type) = element,
                PortKind::Input => *mx_node.add_input(port_name, input_type) = element,
            }
        }

        if class.role == Role::SwizzleSubstitute && mx_node.parameter("channels").is_none() {
            if let Some(channels) = swizzle_substitute_channels(&type_name) {
                mx_node.add_parameter("channels", "string").value = Some(channels);
            }
        }
        if node.definition.contains("image") {
            mx_node.set_attribute("expose", "true");
        }
        self.graph.add_node(mx_node)?;
        Ok(Some(name))
    }

    /// Publish an exposed constant on the node definition. In forced-root
    /// exports the proxy also gets a `dot` node so it can be selected.
    fn add_interface_proxy(
        &mut self,
        node: &HostNode,
        class: &Classification,
        kind: PortKind,
        force_root: bool,
    ) -> Result<Option<String>> {
        let interface = interface_name(node);
        let type_name = class.type_name.clone().unwrap_or_default();
        let value = node
            .input_value("v")
            .or_else(|| node.input_value(&interface))
            .or_else(|| {
                node.inputs
                    .iter()
                    .find(|p| p.id != "name")
                    .and_then(|p| p.value.as_ref())
            });
        let value_string = value.and_then(values::value_to_string).unwrap_or_default();

        let mut element = ValueElement::new(&interface, &type_name);
        values::set_element_value(&mut element, value, self.resource_root);
        values::apply_display_name_and_group(&mut element, node);
        values::apply_ui_ranges(&mut element, node, &value_string);
        match kind {
            PortKind::Input => *self.node_def.add_input(&interface, &type_name) = element,
            PortKind::Parameter => *self.node_def.add_parameter(&interface, &type_name) = element,
        }

        if !force_root {
            return Ok(None);
        }
        let mut dot = Node::new("dot", &interface, &type_name);
        dot.add_input("in", &type_name).interface_name = Some(interface.clone());
        self.graph.add_node(dot)?;
        Ok(Some(interface))
    }

    /// Exposed value with a sampler usage: sampled from a texture instead
    fn add_textured_input_proxy(&mut self, node: &HostNode, class: &Classification) -> Result<String> {
        let type_name = class.type_name.clone().unwrap_or_default();
        let name = self.names.node_name(&node.identifier, &node.definition);
        let mut image = Node::new("image", &name, &type_name);
        image.set_attribute(GLSLFX_USAGE, node.annotation_str("sampler_usage").unwrap_or(""));
        image.set_attribute("expose", "true");
        let file = image.add_parameter("file", "filename");
        apply_gamma(node, file, &type_name);
        self.graph.add_node(image)?;
        Ok(name)
    }

    fn add_subgraph_output(&mut self, node: &HostNode, class: &Classification) -> Result<String> {
        let host = self.host;
        let type_name = class.type_name.clone().unwrap_or_default();
        let output_name = format!("output_{}", self.graph.outputs.len());
        self.node_def.add_output(&output_name, &type_name);

        let mut output = Output::new(&output_name, &type_name);
        for input in &node.inputs {
            if let Some(upstream) = host.upstream(input)? {
                output.node_name = Some(self.graph_output_source(upstream)?);
            }
        }
        self.graph.add_output(output)?;
        Ok(output_name)
    }

    /// Publish a graph output `<input>_output` on both the graph and the
    /// node definition, and bind it to the shader reference
    fn bind_graph_output(
        &mut self,
        shader_ref: &mut ShaderRef,
        input_id: &str,
        varying: bool,
        type_name: &str,
        source: String,
    ) -> Result<()> {
        let output_name = format!("{}_output", input_id);
        self.node_def.add_output(&output_name, type_name);
        let mut output = Output::new(&output_name, type_name);
        output.node_name = Some(source);
        self.graph.add_output(output)?;

        let bind = binding(shader_ref, varying, input_id, type_name);
        bind.output = Some(output_name);
        bind.node_graph = Some(self.graph.name.clone());
        Ok(())
    }

    /// Bind the root surface shader into a material named after the export
    fn bind_material(&mut self, node: &HostNode, class: &Classification) -> Result<String> {
        let host = self.host;
        let material_name = self.name.clone();
        let mut shader_ref = ShaderRef {
            name: material_name.clone(),
            node: class.category.clone(),
            ..Default::default()
        };

        for input in &node.inputs {
            let varying = input.modifier != TypeModifier::Uniform;
            if let Some(upstream) = host.upstream(input)? {
                let source = self.classify_node(upstream)?;
                let source_type = source.type_name.unwrap_or_default();
                let source_name = self.graph_output_source(upstream)?;
                self.bind_graph_output(&mut shader_ref, &input.id, varying, &source_type, source_name)?;
            } else if let Some(HostValue::Call(call)) = &input.value {
                let Some(geomprop) = values::geomprop_for_call(call) else {
                    tracing::warn!(
                        "[mdl2mtlx] Unsupported value call {} on {}, input left unbound",
                        call,
                        input.id
                    );
                    continue;
                };
                let node_name = self.names.on_the_fly();
                let mut geom_node = Node::new(geomprop.category, &node_name, geomprop.type_name);
                let (param_name, param_type, param_value) = geomprop.parameter;
                geom_node.add_parameter(param_name, param_type).value = Some(param_value.to_string());
                self.graph.add_node(geom_node)?;
                self.bind_graph_output(&mut shader_ref, &input.id, varying, geomprop.type_name, node_name)?;
            } else if let Some(value) = &input.value {
                let type_name = portable_type_name(input.effective_type_id())?;
                let bind = binding(&mut shader_ref, varying, &input.id, type_name.as_str());
                values::set_element_value(bind, Some(value), self.resource_root);
            }
        }

        let material = self.doc.add_material(&material_name)?;
        material.shader_refs.push(shader_ref);
        tracing::debug!("[mdl2mtlx] Bound {} to material {}", node.definition, material_name);
        Ok(material_name)
    }

    /// Route a selected node into the emission of a dummy standard surface
    fn bind_node_to_material(&mut self, node_name: &str) -> Result<String> {
        if !self.graph.outputs.is_empty() {
            return Err(Error::MdlToMaterialX(
                "Multiple outputs specified in forced root export".to_string(),
            ));
        }
        let output_name = format!("output_{}", self.graph.outputs.len());
        let node_type = self
            .graph
            .node(node_name)
            .map(|n| n.type_name.clone())
            .ok_or_else(|| {
                Error::MdlToMaterialX(format!("Selected node {} is not part of the graph", node_name))
            })?;

        let mut source = node_name.to_string();
        let mut source_type = node_type.clone();
        if node_type != "color3" {
            let channels = forced_root_channels(&node_type).ok_or_else(|| {
                Error::MdlToMaterialX(format!(
                    "Unsupported output node type for selection export {}",
                    node_type
                ))
            })?;
            let swizzle_name = format!("{}_output_swizzle", self.name);
            let mut swizzle = Node::new("swizzle", &swizzle_name, "color3");
            swizzle.add_input("in", &node_type).node_name = Some(source);
            swizzle.add_parameter("channels", "string").value = Some(channels.to_string());
            self.graph.add_node(swizzle)?;
            source = swizzle_name;
            source_type = "color3".to_string();
        }

        let mut output = Output::new(&output_name, &source_type);
        output.node_name = Some(source);
        self.graph.add_output(output)?;
        self.node_def.add_output(&output_name, &source_type);

        self.resolver.load_module(SURFACE_MODULE, &mut self.doc)?;
        let material_name = self.name.clone();
        let graph_name = self.graph.name.clone();
        let material = self.doc.add_material(&material_name)?;
        let shader_ref = material.add_shader_ref(&material_name, "standard_surface");
        let emission_color = shader_ref.add_bind_input("emission_color", "color3");
        emission_color.output = Some(output_name);
        emission_color.node_graph = Some(graph_name);
        shader_ref.add_bind_input("emission", "float").value = Some("1.0".to_string());
        shader_ref.add_bind_input("base", "float").value = Some("0.0".to_string());
        shader_ref.add_bind_input("specular", "float").value = Some("0.0".to_string());
        Ok(material_name)
    }
}

/// Republish a node definition through a `<name>_Bind` graph holding a
/// single instance of it, and point the material bindings at that graph.
///
/// Consumers of the bind graph only see the inputs the definition exposes.
pub fn forward_outputs(doc: &mut Document, material_name: &str, node_def_name: &str) -> Result<()> {
    let def = doc
        .node_def(node_def_name)
        .cloned()
        .ok_or_else(|| Error::MdlToMaterialX(format!("Missing node definition {}", node_def_name)))?;
    let first = def.outputs.first().ok_or_else(|| {
        Error::MdlToMaterialX(format!("Node definition {} has no outputs to forward", def.name))
    })?;
    let multi_output = def.outputs.len() > 1;
    let instance_type = if multi_output { "multioutput" } else { first.type_name.as_str() };

    let instance_name = format!("{}_Graph", material_name);
    let mut instance = Node::new(&def.node, &instance_name, instance_type);
    for input in &def.inputs {
        instance.add_input(&input.name, &input.type_name);
    }
    for param in &def.parameters {
        instance.add_parameter(&param.name, &param.type_name);
    }

    let mut entry = NodeGraph::new(format!("{}_Bind", material_name));
    entry.add_node(instance)?;
    for def_output in &def.outputs {
        let mut output = Output::new(&def_output.name, &def_output.type_name);
        output.node_name = Some(instance_name.clone());
        if multi_output {
            output.attributes.insert("output".to_string(), def_output.name.clone());
        }
        entry.add_output(output)?;
    }
    let entry_name = entry.name.clone();
    doc.add_node_graph(entry)?;

    let material = doc
        .material_mut(material_name)
        .ok_or_else(|| Error::MdlToMaterialX(format!("Missing material {}", material_name)))?;
    if let Some(shader_ref) = material.shader_refs.first_mut() {
        for bind in shader_ref
            .bind_inputs
            .iter_mut()
            .chain(shader_ref.bind_params.iter_mut())
        {
            if bind.output.as_deref().map_or(false, |o| !o.is_empty()) {
                bind.node_graph = Some(entry_name.clone());
            }
        }
    }
    Ok(())
}

fn report_validation(doc: &Document) {
    let (valid, log) = doc.validate();
    if !valid {
        tracing::warn!("[mdl2mtlx] Document validation failed:\n{}", log);
    }
}

/// Keep the material graph only when something is bound through it
fn finish_material(
    doc: &mut Document,
    name: &str,
    def_name: &str,
    graph_name: &str,
    produced: &[Produced],
) -> Result<()> {
    let material = produced
        .iter()
        .find_map(|p| match p {
            Produced::Material(m) => Some(m.clone()),
            Produced::Output(_) => None,
        })
        .ok_or_else(|| Error::InvalidGraphType("No material output in graph".to_string()))?;
    if produced.len() > 1 {
        tracing::warn!("[mdl2mtlx] Multiple outputs found in graph, using {}", material);
    }
    let bound = doc
        .material(&material)
        .and_then(|m| m.shader_refs.first())
        .map_or(false, ShaderRef::has_bound_input);
    if bound {
        forward_outputs(doc, name, def_name)?;
    } else {
        tracing::info!("[mdl2mtlx] Material {} binds no graph output, dropping its graph", material);
        doc.remove_node_graph(graph_name);
        doc.remove_node_def(def_name);
    }
    Ok(())
}

/// Translate a host graph whose output is a surface shader into a material
///
/// # Arguments
///
/// * `host` - The host graph; its single output node must be a surface shader
/// * `material_name` - Name of the material, its node string and graphs
/// * `resolver` - Module resolver used to import node definitions
/// * `options` - Resource root for filename values
///
/// # Returns
///
/// * `Ok(Document)` - The document, even if it failed validation
/// * `Err(Error)` - Unsupported nodes, missing definitions, or no material
pub fn translate_material(
    host: &HostGraph,
    material_name: &str,
    resolver: &ModuleResolver,
    options: &TranslateOptions,
) -> Result<Document> {
    tracing::info!("[mdl2mtlx] Converting MDL graph {} to material {}", host.identifier, material_name);
    let node_def_name = format!("ND{}", material_name);
    let mut translator = Translator::new(host, material_name, &node_def_name, resolver, options)?;
    let produced = translator.run(None)?;
    let (mut doc, def_name, graph_name) = translator.finish();
    finish_material(&mut doc, material_name, &def_name, &graph_name, &produced)?;
    report_validation(&doc);
    Ok(doc)
}

/// Translate a host graph ending in subgraph output proxies into a node
/// definition `ND_<node_name>` with one output per proxy
pub fn translate_subgraph(
    host: &HostGraph,
    node_name: &str,
    resolver: &ModuleResolver,
    options: &TranslateOptions,
) -> Result<Document> {
    tracing::info!("[mdl2mtlx] Converting MDL graph {} to subgraph {}", host.identifier, node_name);
    let node_def_name = format!("ND_{}", node_name);
    let mut translator = Translator::new(host, node_name, &node_def_name, resolver, options)?;
    let produced = translator.run(None)?;
    if !produced.iter().any(|p| matches!(p, Produced::Output(_))) {
        return Err(Error::InvalidGraphType("No material output in graph".to_string()));
    }
    let (doc, _, _) = translator.finish();
    report_validation(&doc);
    Ok(doc)
}

/// Translate a host graph using an arbitrary node as its output
///
/// A selected subgraph output proxy is replaced by the node feeding it.
/// Non-surface nodes are swizzled into the emission color of a dummy
/// `standard_surface` material.
///
/// # Arguments
///
/// * `host` - The host graph
/// * `node_name` - Name of the exported node definition and material
/// * `root_identifier` - Identifier of the node to treat as the output
/// * `resolver` - Module resolver used to import node definitions
/// * `options` - Resource root for filename values
pub fn translate_custom_root(
    host: &HostGraph,
    node_name: &str,
    root_identifier: &str,
    resolver: &ModuleResolver,
    options: &TranslateOptions,
) -> Result<Document> {
    tracing::info!(
        "[mdl2mtlx] Converting MDL graph {} with custom root {}",
        host.identifier,
        root_identifier
    );
    let mut root = host.node(root_identifier).ok_or_else(|| {
        Error::MdlToMaterialX(format!("Custom root {} not found in graph", root_identifier))
    })?;
    if root
        .definition
        .starts_with(SUBGRAPH_OUTPUT_PREFIX.trim_end_matches('('))
    {
        let upstream = match root.input("p") {
            Some(p) => host.upstream(p)?,
            None => None,
        };
        root = upstream.ok_or_else(|| {
            Error::MdlToMaterialX("Nothing connected to subgraph output".to_string())
        })?;
    }

    let node_def_name = format!("ND_{}", node_name);
    let mut translator = Translator::new(host, node_name, &node_def_name, resolver, options)?;
    let produced = translator.run(Some(root))?;
    let (mut doc, def_name, graph_name) = translator.finish();
    finish_material(&mut doc, node_name, &def_name, &graph_name, &produced)?;
    report_validation(&doc);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forced_root_channel_table() {
        assert_eq!(forced_root_channels("float"), Some("x"));
        assert_eq!(forced_root_channels("vector2"), Some("xyy"));
        assert_eq!(forced_root_channels("vector4"), Some("xyz"));
        assert_eq!(forced_root_channels("color4"), Some("rgb"));
        assert_eq!(forced_root_channels("string"), None);
    }

    #[test]
    fn test_gamma_selects_colorspace() {
        let node = HostNode::new("1", "mdl::texture_2d()").with_annotation("gamma_type", HostValue::Int(1));
        let mut file = ValueElement::new("file", "filename");
        apply_gamma(&node, &mut file, "color3");
        assert_eq!(file.colorspace(), "linear");

        let mut plain = ValueElement::new("file", "filename");
        apply_gamma(&HostNode::new("2", "mdl::texture_2d()"), &mut plain, "color3");
        assert_eq!(plain.colorspace(), "srgb_texture");

        let mut scalar = ValueElement::new("file", "filename");
        apply_gamma(&node, &mut scalar, "float");
        assert_eq!(scalar.colorspace(), "");
    }

    #[test]
    fn test_forward_outputs_repoints_bindings() {
        let mut doc = Document::new();
        let mut def = NodeDef::new("NDmat", "mat");
        def.add_input("size", "float");
        def.add_output("base_color_output", "color3");
        doc.add_node_def(def).unwrap();
        let material = doc.add_material("mat").unwrap();
        let shader_ref = material.add_shader_ref("mat", "standard_surface");
        let bind = shader_ref.add_bind_input("base_color", "color3");
        bind.output = Some("base_color_output".into());
        bind.node_graph = Some("mat_graph".into());
        shader_ref.add_bind_input("metalness", "float").value = Some("0.0".into());

        forward_outputs(&mut doc, "mat", "NDmat").unwrap();

        let entry = doc.node_graph("mat_Bind").unwrap();
        let instance = entry.node("mat_Graph").unwrap();
        assert_eq!(instance.category, "mat");
        assert_eq!(instance.type_name, "color3");
        assert!(instance.input("size").is_some());
        assert_eq!(
            entry.output("base_color_output").unwrap().node_name.as_deref(),
            Some("mat_Graph")
        );
        let shader_ref = &doc.material("mat").unwrap().shader_refs[0];
        assert_eq!(shader_ref.bind_inputs[0].node_graph.as_deref(), Some("mat_Bind"));
        assert_eq!(shader_ref.bind_inputs[1].node_graph, None);
    }
}
