use mdlmtlx::document::xml;
use mdlmtlx::host::{HostGraph, HostNode, HostProperty, HostValue};
use mdlmtlx::{
    translate_custom_root, translate_material, translate_subgraph, Error, ModuleResolver, SearchPath,
    TranslateOptions,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

const STDLIB_DEFS: &str = r#"<?xml version="1.0"?>
<materialx version="1.37">
  <nodedef name="ND_circle_float" node="circle" type="float">
    <input name="radius" type="float" value="0.5" />
  </nodedef>
  <nodedef name="ND_offset_vector4" node="offset" type="vector4">
    <input name="in" type="vector4" value="0.0,0.0,0.0,0.0" />
  </nodedef>
  <nodedef name="ND_concat_string" node="concat" type="string">
    <input name="in" type="string" value="" />
  </nodedef>
  <nodedef name="ND_standard_surface_surfaceshader" node="standard_surface" type="surfaceshader">
    <input name="base" type="float" value="0.8" />
    <input name="base_color" type="color3" value="1.0,1.0,1.0" />
  </nodedef>
</materialx>
"#;

fn library(test: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("mdlmtlx_translate_{}_{}", test, std::process::id()));
    let stdlib = root.join("stdlib");
    std::fs::create_dir_all(&stdlib).unwrap();
    std::fs::write(stdlib.join("stdlib_defs.mtlx"), STDLIB_DEFS).unwrap();
    root
}

fn resolver(root: &PathBuf) -> ModuleResolver {
    ModuleResolver::new(SearchPath::new([root.clone()]))
}

fn size_proxy() -> HostNode {
    HostNode::new("1", "mdl::float(float)")
        .exposed()
        .with_input(HostProperty::new("value", "float").with_value(HostValue::Float(0.5)))
        .with_output("output", "float")
        .with_annotation("identifier", HostValue::String("size".into()))
        .with_annotation("type_modifier", HostValue::Int(2))
}

fn circle() -> HostNode {
    HostNode::new("2", "mdl::mtlx::stdlib::circle_float(float)")
        .with_input(HostProperty::new("radius", "float").connected_to("1"))
        .with_output("output", "float")
}

fn surface(base_color: HostProperty) -> HostNode {
    HostNode::new("3", "mdl::mtlx::stdlib::standard_surface(float,color)")
        .with_input(HostProperty::new("base", "float").connected_to("2"))
        .with_input(base_color)
        .with_output("output", "mdl::material")
}

fn material_graph() -> HostGraph {
    let mut graph = HostGraph::new("wood_graph_host");
    graph.nodes.push(size_proxy());
    graph.nodes.push(circle());
    graph.nodes.push(surface(
        HostProperty::new("base_color", "color").with_value(HostValue::Color(vec![1.0, 0.5, 0.25])),
    ));
    graph.output_nodes.push("3".into());
    graph
}

#[test]
fn test_material_export_binds_through_forwarding_graph() {
    let root = library("material");
    let doc = translate_material(&material_graph(), "wood", &resolver(&root), &TranslateOptions::default()).unwrap();

    let def = doc.node_def("NDwood").unwrap();
    assert_eq!(def.node, "wood");
    assert_eq!(def.input("size").unwrap().value.as_deref(), Some("0.5"));
    assert_eq!(def.outputs.len(), 1);
    assert_eq!(def.outputs[0].name, "base_output");

    let graph = doc.node_graph("wood_graph").unwrap();
    assert_eq!(graph.nodedef.as_deref(), Some("NDwood"));
    let circle = graph.node("node_circle_float_0").unwrap();
    assert_eq!(circle.category, "circle");
    assert_eq!(circle.input("radius").unwrap().interface_name.as_deref(), Some("size"));
    assert_eq!(
        graph.output("base_output").unwrap().node_name.as_deref(),
        Some("node_circle_float_0")
    );

    let bind_graph = doc.node_graph("wood_Bind").unwrap();
    let instance = bind_graph.node("wood_Graph").unwrap();
    assert_eq!(instance.category, "wood");
    assert!(instance.input("size").is_some());

    let shader_ref = &doc.material("wood").unwrap().shader_refs[0];
    assert_eq!(shader_ref.node, "standard_surface");
    let base = shader_ref.bind_inputs.iter().find(|b| b.name == "base").unwrap();
    assert_eq!(base.output.as_deref(), Some("base_output"));
    assert_eq!(base.node_graph.as_deref(), Some("wood_Bind"));
    let base_color = shader_ref.bind_inputs.iter().find(|b| b.name == "base_color").unwrap();
    assert_eq!(base_color.value.as_deref(), Some("1.0,0.5,0.25"));

    let (valid, log) = doc.validate();
    assert!(valid, "{}", log);

    let text = xml::write_to_string(&doc);
    let reread = xml::read_from_str(&text).unwrap();
    assert_eq!(reread.includes, vec!["stdlib/stdlib_defs.mtlx".to_string()]);
    assert!(reread.node_def("NDwood").is_some());
    assert!(reread.node_def("ND_circle_float").is_none());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_scalar_fed_constructor_becomes_swizzle() {
    let root = library("swizzle");
    let mut graph = HostGraph::new("tint_host");
    graph.nodes.push(size_proxy());
    graph.nodes.push(circle());
    graph.nodes.push(
        HostNode::new("4", "mdl::color(float)")
            .with_input(HostProperty::new("value", "float").connected_to("2"))
            .with_output("output", "color"),
    );
    graph.nodes.push(surface(HostProperty::new("base_color", "color").connected_to("4")));
    graph.output_nodes.push("3".into());

    let doc = translate_material(&graph, "tint", &resolver(&root), &TranslateOptions::default()).unwrap();
    let swizzle = doc.node_graph("tint_graph").unwrap().node("node_color_1").unwrap();
    assert_eq!(swizzle.category, "swizzle");
    assert_eq!(swizzle.type_name, "color3");
    assert_eq!(swizzle.input("in").unwrap().node_name.as_deref(), Some("node_circle_float_0"));
    assert_eq!(swizzle.parameter("channels").unwrap().value.as_deref(), Some("rrr"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_subgraph_export_publishes_outputs() {
    let root = library("subgraph");
    let mut graph = HostGraph::new("mask_host");
    graph.nodes.push(size_proxy());
    graph.nodes.push(circle());
    graph.nodes.push(
        HostNode::new("5", "mdl::mtlx::shared::subgraph_output(float)")
            .with_input(HostProperty::new("p", "float").connected_to("2"))
            .with_output("output", "float"),
    );

    let doc = translate_subgraph(&graph, "mask", &resolver(&root), &TranslateOptions::default()).unwrap();
    let def = doc.node_def("ND_mask").unwrap();
    assert_eq!(def.outputs.len(), 1);
    assert_eq!(def.outputs[0].name, "output_0");
    assert_eq!(def.outputs[0].type_name, "float");
    let output = doc.node_graph("mask_graph").unwrap().output("output_0").unwrap();
    assert_eq!(output.node_name.as_deref(), Some("node_circle_float_0"));
    assert!(doc.materials.is_empty());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_subgraph_export_without_outputs_fails() {
    let root = library("no_outputs");
    let mut graph = HostGraph::new("empty_host");
    graph.nodes.push(size_proxy());
    graph.nodes.push(circle());
    let err = translate_subgraph(&graph, "empty", &resolver(&root), &TranslateOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidGraphType(_)));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_custom_root_routes_into_emission() {
    let root = library("custom_root");
    let doc = translate_custom_root(&material_graph(), "glow", "2", &resolver(&root), &TranslateOptions::default())
        .unwrap();

    let graph = doc.node_graph("glow_graph").unwrap();
    let swizzle = graph.node("glow_output_swizzle").unwrap();
    assert_eq!(swizzle.type_name, "color3");
    assert_eq!(swizzle.parameter("channels").unwrap().value.as_deref(), Some("x"));
    assert_eq!(
        graph.output("output_0").unwrap().node_name.as_deref(),
        Some("glow_output_swizzle")
    );
    // exposed constants stay selectable through a dot node
    assert_eq!(graph.node("size").unwrap().category, "dot");

    let shader_ref = &doc.material("glow").unwrap().shader_refs[0];
    assert_eq!(shader_ref.node, "standard_surface");
    let value_of = |name: &str| {
        shader_ref
            .bind_inputs
            .iter()
            .find(|b| b.name == name)
            .and_then(|b| b.value.clone())
    };
    assert_eq!(value_of("emission").as_deref(), Some("1.0"));
    assert_eq!(value_of("base").as_deref(), Some("0.0"));
    assert_eq!(value_of("specular").as_deref(), Some("0.0"));
    let emission_color = shader_ref.bind_inputs.iter().find(|b| b.name == "emission_color").unwrap();
    assert_eq!(emission_color.node_graph.as_deref(), Some("glow_Bind"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_vector4_custom_root_drops_alpha() {
    let root = library("vector4_root");
    let mut graph = HostGraph::new("offset_host");
    graph.nodes.push(
        HostNode::new("7", "mdl::mtlx::stdlib::offset_vector4(float4)")
            .with_input(HostProperty::new("in", "float4").with_value(HostValue::Float4([0.1, 0.2, 0.3, 1.0])))
            .with_output("output", "float4"),
    );
    let doc = translate_custom_root(&graph, "offset", "7", &resolver(&root), &TranslateOptions::default())
        .unwrap();
    let swizzle = doc.node_graph("offset_graph").unwrap().node("offset_output_swizzle").unwrap();
    assert_eq!(swizzle.input("in").unwrap().type_name, "vector4");
    assert_eq!(swizzle.parameter("channels").unwrap().value.as_deref(), Some("xyz"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_custom_root_of_string_type_fails() {
    let root = library("string_root");
    let mut graph = HostGraph::new("label_host");
    graph.nodes.push(
        HostNode::new("6", "mdl::mtlx::stdlib::concat_string(string)")
            .with_input(HostProperty::new("in", "string").with_value(HostValue::String("a".into())))
            .with_output("output", "string"),
    );
    let err = translate_custom_root(&graph, "label", "6", &resolver(&root), &TranslateOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::MdlToMaterialX(_)));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_unknown_host_node_is_rejected() {
    let root = library("unknown");
    let mut graph = material_graph();
    graph.nodes.insert(
        0,
        HostNode::new("9", "mdl::base::perlin_noise(float)").with_output("output", "float"),
    );
    let err = translate_material(&graph, "wood", &resolver(&root), &TranslateOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMdlType { .. }));
    let _ = std::fs::remove_dir_all(&root);
}
