//! MaterialX XML serialization.
//!
//! Reading is backed by `roxmltree`. Writing emits only local elements and
//! one `xi:include` per imported module document.

use super::{
    Attributes, Document, GeomPropDef, Material, Node, NodeDef, NodeGraph, Output, ShaderRef,
    ValueElement,
};
use crate::error::{Error, Result};
use std::fmt::Write as _;

const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";
const MATERIALX_VERSION: &str = "1.37";

/// Parse a MaterialX document from XML text
pub fn read_from_str(text: &str) -> Result<Document> {
    let xml = roxmltree::Document::parse(text)
        .map_err(|e| Error::Document(format!("XML parse error: {}", e)))?;
    let root = xml.root_element();
    if root.tag_name().name() != "materialx" {
        return Err(Error::Document(format!(
            "unexpected root element '{}'",
            root.tag_name().name()
        )));
    }

    let mut doc = Document::new();
    for child in root.children().filter(|n| n.is_element()) {
        let tag = child.tag_name();
        if tag.name() == "include" && tag.namespace() == Some(XINCLUDE_NS) {
            if let Some(href) = child.attribute("href") {
                doc.includes.push(href.to_string());
            }
            continue;
        }
        match tag.name() {
            "nodedef" => {
                doc.add_node_def(read_node_def(child)?)?;
            }
            "nodegraph" => {
                doc.add_node_graph(read_node_graph(child)?)?;
            }
            "material" => {
                let material = read_material(child)?;
                let name = material.name.clone();
                let target = doc.add_material(&name)?;
                *target = material;
            }
            "geompropdef" => {
                doc.add_geom_prop_def(read_geom_prop_def(child)?)?;
            }
            other => {
                tracing::debug!("[xml] Ignoring top-level element <{}>", other);
            }
        }
    }
    Ok(doc)
}

/// Parse a MaterialX file; all elements become local to the returned document
pub fn read_from_file(path: &std::path::Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    read_from_str(&text).map_err(|e| match e {
        Error::Document(msg) => Error::Document(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

fn required<'a>(node: roxmltree::Node<'a, '_>, attr: &str) -> Result<&'a str> {
    node.attribute(attr).ok_or_else(|| {
        Error::Document(format!(
            "<{}> element is missing the '{}' attribute",
            node.tag_name().name(),
            attr
        ))
    })
}

fn extra_attributes(node: roxmltree::Node<'_, '_>, known: &[&str]) -> Attributes {
    node.attributes()
        .filter(|a| !known.contains(&a.name()))
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect()
}

fn read_value_element(node: roxmltree::Node<'_, '_>) -> Result<ValueElement> {
    const KNOWN: &[&str] = &[
        "name",
        "type",
        "value",
        "nodename",
        "interfacename",
        "output",
        "nodegraph",
    ];
    Ok(ValueElement {
        name: required(node, "name")?.to_string(),
        type_name: node.attribute("type").unwrap_or_default().to_string(),
        value: node.attribute("value").map(str::to_string),
        node_name: node.attribute("nodename").map(str::to_string),
        interface_name: node.attribute("interfacename").map(str::to_string),
        output: node.attribute("output").map(str::to_string),
        node_graph: node.attribute("nodegraph").map(str::to_string),
        attributes: extra_attributes(node, KNOWN),
    })
}

fn read_output(node: roxmltree::Node<'_, '_>) -> Result<Output> {
    Ok(Output {
        name: required(node, "name")?.to_string(),
        type_name: node.attribute("type").unwrap_or_default().to_string(),
        node_name: node.attribute("nodename").map(str::to_string),
        attributes: extra_attributes(node, &["name", "type", "nodename"]),
    })
}

fn read_node_def(node: roxmltree::Node<'_, '_>) -> Result<NodeDef> {
    let mut def = NodeDef {
        name: required(node, "name")?.to_string(),
        node: node.attribute("node").unwrap_or_default().to_string(),
        type_name: node.attribute("type").map(str::to_string),
        attributes: extra_attributes(node, &["name", "node", "type"]),
        ..Default::default()
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "input" => def.inputs.push(read_value_element(child)?),
            "parameter" => def.parameters.push(read_value_element(child)?),
            "output" => def.outputs.push(read_output(child)?),
            _ => {}
        }
    }
    Ok(def)
}

fn read_node(node: roxmltree::Node<'_, '_>) -> Result<Node> {
    let mut result = Node {
        name: required(node, "name")?.to_string(),
        category: node.tag_name().name().to_string(),
        type_name: node.attribute("type").unwrap_or_default().to_string(),
        attributes: extra_attributes(node, &["name", "type"]),
        ..Default::default()
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "input" => result.inputs.push(read_value_element(child)?),
            "parameter" => result.parameters.push(read_value_element(child)?),
            _ => {}
        }
    }
    Ok(result)
}

fn read_node_graph(node: roxmltree::Node<'_, '_>) -> Result<NodeGraph> {
    let mut graph = NodeGraph {
        name: required(node, "name")?.to_string(),
        nodedef: node.attribute("nodedef").map(str::to_string),
        attributes: extra_attributes(node, &["name", "nodedef"]),
        ..Default::default()
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "output" => graph.outputs.push(read_output(child)?),
            "input" | "parameter" => {}
            _ => graph.nodes.push(read_node(child)?),
        }
    }
    Ok(graph)
}

fn read_material(node: roxmltree::Node<'_, '_>) -> Result<Material> {
    let mut material = Material {
        name: required(node, "name")?.to_string(),
        ..Default::default()
    };
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "shaderref" {
            continue;
        }
        let mut shader_ref = ShaderRef {
            name: required(child, "name")?.to_string(),
            node: child.attribute("node").unwrap_or_default().to_string(),
            ..Default::default()
        };
        for bind in child.children().filter(|n| n.is_element()) {
            match bind.tag_name().name() {
                "bindinput" => shader_ref.bind_inputs.push(read_value_element(bind)?),
                "bindparam" => shader_ref.bind_params.push(read_value_element(bind)?),
                _ => {}
            }
        }
        material.shader_refs.push(shader_ref);
    }
    Ok(material)
}

fn read_geom_prop_def(node: roxmltree::Node<'_, '_>) -> Result<GeomPropDef> {
    Ok(GeomPropDef {
        name: required(node, "name")?.to_string(),
        type_name: node.attribute("type").unwrap_or_default().to_string(),
        geomprop: node.attribute("geomprop").unwrap_or_default().to_string(),
        space: node.attribute("space").map(str::to_string),
        index: node.attribute("index").map(str::to_string),
        source_uri: String::new(),
    })
}

/// Serialize the local part of a document
pub fn write_to_string(doc: &Document) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\"?>\n");
    let _ = writeln!(
        out,
        "<materialx version=\"{}\" xmlns:xi=\"{}\">",
        MATERIALX_VERSION, XINCLUDE_NS
    );

    for uri in doc.source_uris() {
        let _ = writeln!(out, "  <xi:include href=\"{}\" />", escape(&uri));
    }

    for def in doc.node_defs.iter().filter(|d| d.is_local()) {
        let mut attrs = vec![("name", def.name.as_str()), ("node", def.node.as_str())];
        if let Some(t) = def.type_name.as_deref() {
            attrs.push(("type", t));
        }
        open_tag(&mut out, 1, "nodedef", &attrs, &def.attributes, false);
        for input in &def.inputs {
            write_value_element(&mut out, 2, "input", input);
        }
        for param in &def.parameters {
            write_value_element(&mut out, 2, "parameter", param);
        }
        for output in &def.outputs {
            write_output(&mut out, 2, output);
        }
        close_tag(&mut out, 1, "nodedef");
    }

    for graph in doc.node_graphs.iter().filter(|g| g.is_local()) {
        let mut attrs = vec![("name", graph.name.as_str())];
        if let Some(nd) = graph.nodedef.as_deref() {
            attrs.push(("nodedef", nd));
        }
        open_tag(&mut out, 1, "nodegraph", &attrs, &graph.attributes, false);
        for node in &graph.nodes {
            let attrs = [("name", node.name.as_str()), ("type", node.type_name.as_str())];
            let empty = node.inputs.is_empty() && node.parameters.is_empty();
            open_tag(&mut out, 2, &node.category, &attrs, &node.attributes, empty);
            if !empty {
                for input in &node.inputs {
                    write_value_element(&mut out, 3, "input", input);
                }
                for param in &node.parameters {
                    write_value_element(&mut out, 3, "parameter", param);
                }
                close_tag(&mut out, 2, &node.category);
            }
        }
        for output in &graph.outputs {
            write_output(&mut out, 2, output);
        }
        close_tag(&mut out, 1, "nodegraph");
    }

    for material in doc.materials.iter().filter(|m| m.source_uri.is_empty()) {
        open_tag(
            &mut out,
            1,
            "material",
            &[("name", material.name.as_str())],
            &Attributes::new(),
            false,
        );
        for shader_ref in &material.shader_refs {
            let attrs = [("name", shader_ref.name.as_str()), ("node", shader_ref.node.as_str())];
            open_tag(&mut out, 2, "shaderref", &attrs, &Attributes::new(), false);
            for bind in &shader_ref.bind_inputs {
                write_value_element(&mut out, 3, "bindinput", bind);
            }
            for bind in &shader_ref.bind_params {
                write_value_element(&mut out, 3, "bindparam", bind);
            }
            close_tag(&mut out, 2, "shaderref");
        }
        close_tag(&mut out, 1, "material");
    }

    for geom in doc.geom_prop_defs.iter().filter(|g| g.source_uri.is_empty()) {
        let mut attrs = vec![
            ("name", geom.name.as_str()),
            ("type", geom.type_name.as_str()),
            ("geomprop", geom.geomprop.as_str()),
        ];
        if let Some(space) = geom.space.as_deref() {
            attrs.push(("space", space));
        }
        if let Some(index) = geom.index.as_deref() {
            attrs.push(("index", index));
        }
        open_tag(&mut out, 1, "geompropdef", &attrs, &Attributes::new(), true);
    }

    out.push_str("</materialx>\n");
    out
}

fn write_value_element(out: &mut String, depth: usize, tag: &str, element: &ValueElement) {
    let mut attrs = vec![("name", element.name.as_str()), ("type", element.type_name.as_str())];
    let optional = [
        ("value", &element.value),
        ("nodename", &element.node_name),
        ("interfacename", &element.interface_name),
        ("nodegraph", &element.node_graph),
        ("output", &element.output),
    ];
    for (key, value) in optional {
        if let Some(v) = value.as_deref() {
            attrs.push((key, v));
        }
    }
    open_tag(out, depth, tag, &attrs, &element.attributes, true);
}

fn write_output(out: &mut String, depth: usize, output: &Output) {
    let mut attrs = vec![("name", output.name.as_str()), ("type", output.type_name.as_str())];
    if let Some(n) = output.node_name.as_deref() {
        attrs.push(("nodename", n));
    }
    open_tag(out, depth, "output", &attrs, &output.attributes, true);
}

fn open_tag(
    out: &mut String,
    depth: usize,
    tag: &str,
    attrs: &[(&str, &str)],
    extra: &Attributes,
    self_closing: bool,
) {
    out.push_str(&"  ".repeat(depth));
    out.push('<');
    out.push_str(tag);
    for (key, value) in attrs {
        let _ = write!(out, " {}=\"{}\"", key, escape(value));
    }
    for (key, value) in extra {
        let _ = write!(out, " {}=\"{}\"", key, escape(value));
    }
    out.push_str(if self_closing { " />\n" } else { ">\n" });
}

fn close_tag(out: &mut String, depth: usize, tag: &str) {
    let _ = writeln!(out, "{}</{}>", "  ".repeat(depth), tag);
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIBRARY: &str = r#"<?xml version="1.0"?>
<materialx version="1.37" xmlns:xi="http://www.w3.org/2001/XInclude">
  <nodedef name="ND_circle" node="circle" type="float">
    <input name="radius" type="float" value="0.5" uifolder="Shape" />
    <parameter name="center" type="vector2" value="0.5, 0.5" />
  </nodedef>
  <nodegraph name="NG_circle" nodedef="ND_circle">
    <position name="p0" type="vector3">
      <parameter name="space" type="string" value="object" />
    </position>
    <output name="out" type="float" nodename="p0" />
  </nodegraph>
  <geompropdef name="UV0" type="vector2" geomprop="texcoord" index="0" />
</materialx>
"#;

    #[test]
    fn test_read_library() {
        let doc = read_from_str(LIBRARY).unwrap();
        let def = doc.node_def("ND_circle").unwrap();
        assert_eq!(def.node, "circle");
        assert_eq!(def.return_type(), "float");
        assert_eq!(def.inputs[0].attribute("uifolder"), Some("Shape"));
        assert_eq!(def.parameters[0].value.as_deref(), Some("0.5, 0.5"));

        let graph = doc.node_graph("NG_circle").unwrap();
        assert_eq!(graph.nodes[0].category, "position");
        assert_eq!(graph.outputs[0].node_name.as_deref(), Some("p0"));

        let geom = doc.geom_prop_def("UV0").unwrap();
        assert_eq!(geom.geomprop, "texcoord");
        assert_eq!(geom.index.as_deref(), Some("0"));
    }

    #[test]
    fn test_written_document_reads_back() {
        let mut doc = read_from_str(LIBRARY).unwrap();
        let mut lib = Document::new();
        lib.add_node_def(NodeDef::new("ND_add_float", "add")).unwrap();
        doc.import_skip_conflicting(lib, "stdlib/stdlib_defs.mtlx");

        let text = write_to_string(&doc);
        assert!(text.contains("<xi:include href=\"stdlib/stdlib_defs.mtlx\" />"));
        assert!(!text.contains("ND_add_float"));

        let reread = read_from_str(&text).unwrap();
        assert_eq!(reread.includes, vec!["stdlib/stdlib_defs.mtlx".to_string()]);
        assert_eq!(reread.node_def("ND_circle"), doc.node_def("ND_circle"));
        assert_eq!(reread.node_graph("NG_circle"), doc.node_graph("NG_circle"));
    }

    #[test]
    fn test_rejects_foreign_root() {
        assert!(matches!(
            read_from_str("<shader/>"),
            Err(Error::Document(_))
        ));
    }
}
