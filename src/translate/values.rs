//! Literal conversion of host values into MaterialX value strings, resource
//! path resolution, UI range attributes and geometry-property value calls.

use crate::document::ValueElement;
use crate::host::{HostNode, HostValue};
use crate::modules::consistent_path;
use std::path::{Component, Path, PathBuf};

const RANGED_TYPES: &[&str] = &["float", "vector2", "vector3", "vector4"];

/// Float text that always carries a decimal point
pub fn float_text(value: f64) -> String {
    let text = format!("{}", value);
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

fn join_floats(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(float_text)
        .collect::<Vec<_>>()
        .join(",")
}

/// MaterialX value string of a literal; `None` for value calls
pub fn value_to_string(value: &HostValue) -> Option<String> {
    let text = match value {
        HostValue::Int(i) => i.to_string(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Float(f) => float_text(*f),
        HostValue::Float2(v) => join_floats(v.iter().copied()),
        HostValue::Float3(v) => join_floats(v.iter().copied()),
        HostValue::Float4(v) => join_floats(v.iter().copied()),
        HostValue::Color(v) => join_floats(v.iter().copied()),
        HostValue::Matrix(rows) => join_floats(rows.iter().flatten().copied()),
        HostValue::String(s) | HostValue::Texture(s) => s.clone(),
        HostValue::Call(_) => return None,
    };
    Some(text)
}

/// Raw text of a value as used for node attributes
pub fn attribute_text(value: Option<&HostValue>) -> String {
    match value {
        Some(HostValue::Call(call)) => call.clone(),
        Some(v) => value_to_string(v).unwrap_or_default(),
        None => String::new(),
    }
}

/// Lexical relative path from `base` to `path`
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base.len() {
        result.push("..");
    }
    for component in &path[common..] {
        result.push(component.as_os_str());
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Resource path made relative to `resource_root`, with `/` separators
pub fn resolve_resource_path(path: &str, resource_root: Option<&Path>) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    match resource_root {
        Some(root) => {
            let relative = relative_path(Path::new(path), root);
            consistent_path(&relative.to_string_lossy())
        }
        None => consistent_path(path),
    }
}

/// Store a host value on a MaterialX element.
///
/// Geometry-property calls are left to the node definition default; any
/// other call is dropped with a warning.
pub fn set_element_value(
    element: &mut ValueElement,
    value: Option<&HostValue>,
    resource_root: Option<&Path>,
) {
    let Some(value) = value else {
        return;
    };
    if let HostValue::Call(call) = value {
        if !call.contains("getGeomPropDef") {
            tracing::warn!("[mdl2mtlx] Unsupported value call, setting empty value");
        }
        return;
    }
    let text = value_to_string(value).unwrap_or_default();
    if element.type_name == "filename" && resource_root.is_some() {
        element.value = Some(resolve_resource_path(&text, resource_root));
    } else {
        element.value = Some(text);
    }
}

/// Default UI range for a value that declares none: zero-anchored, wide
/// enough for the magnitude of the current value
pub fn legacy_range(type_name: &str, value_string: &str) -> Option<(f64, f64)> {
    if !RANGED_TYPES.contains(&type_name) {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for component in value_string.split(',') {
        let value: f64 = component.trim().parse().ok()?;
        min = min.min(value);
        max = max.max(value);
    }
    let largest = min.abs().max(max.abs());
    let largest = if largest <= 1.0 { 1.0 } else { (largest * 5.0).ceil() };
    let ui_min = 0.0f64.min(min.floor());
    let mut ui_max = largest;
    if ui_min == 0.0 && ui_max == 0.0 {
        ui_max = 1.0;
    }
    Some((ui_min, ui_max))
}

fn annotation_bound(node: &HostNode, id: &str) -> Option<f64> {
    node.annotation(id).and_then(HostValue::as_f64)
}

/// Set `uisoftmin`/`uisoftmax`/`uimin`/`uimax` from range annotations,
/// falling back to the legacy range per bound
pub fn apply_ui_ranges(element: &mut ValueElement, node: &HostNode, value_string: &str) {
    let width = value_string.split(',').count();
    let legacy = legacy_range(&element.type_name, value_string);
    let bounds = [
        ("uisoftmin", "soft_range_min", legacy.map(|r| r.0)),
        ("uisoftmax", "soft_range_max", legacy.map(|r| r.1)),
        ("uimin", "hard_range_min", legacy.map(|r| r.0)),
        ("uimax", "hard_range_max", legacy.map(|r| r.1)),
    ];
    for (attribute, annotation, fallback) in bounds {
        if let Some(bound) = annotation_bound(node, annotation).or(fallback) {
            let text = vec![float_text(bound); width].join(",");
            element.set_attribute(attribute, text);
        }
    }
}

/// `uifolder` and `uiname` from the group and display-name annotations
pub fn apply_display_name_and_group(element: &mut ValueElement, node: &HostNode) {
    if let Some(group) = node.annotation_text("in_group") {
        element.set_attribute("uifolder", group);
    }
    if let Some(display_name) = node.annotation_text("display_name") {
        element.set_attribute("uiname", display_name);
    }
}

/// Node synthesized for a geometry-property value call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeomPropNode {
    pub category: &'static str,
    pub type_name: &'static str,
    /// Parameter name, type and value
    pub parameter: (&'static str, &'static str, &'static str),
}

fn geomprop_mapping(property: &str) -> Option<GeomPropNode> {
    let (category, parameter, type_name) = match property {
        "getGeomPropDef_Pworld" => ("position", ("space", "string", "world"), "vector3"),
        "getGeomPropDef_Nworld" => ("normal", ("space", "string", "world"), "vector3"),
        "getGeomPropDef_Tworld" => ("tangent", ("space", "string", "world"), "vector3"),
        "getGeomPropDef_Pobject" => ("position", ("space", "string", "object"), "vector3"),
        "getGeomPropDef_Nobject" => ("normal", ("space", "string", "object"), "vector3"),
        "getGeomPropDef_Tobject" => ("tangent", ("space", "string", "object"), "vector3"),
        "getGeomPropDef_UV0" => ("texcoord", ("index", "integer", "0"), "vector2"),
        _ => return None,
    };
    Some(GeomPropNode {
        category,
        type_name,
        parameter,
    })
}

/// Geometry-property node for a value call such as
/// `mtlx::stdlib::getGeomPropDef_Nworld()`. Calls occasionally carry a
/// numeric suffix, which is ignored.
pub fn geomprop_for_call(call: &str) -> Option<GeomPropNode> {
    if !call.contains("getGeomPropDef") {
        return None;
    }
    let function = call.rsplit("::").next().unwrap_or_default();
    let property = function.split('(').next().unwrap_or_default();
    geomprop_mapping(property).or_else(|| {
        let (stem, _) = property.rsplit_once('_')?;
        geomprop_mapping(stem)
    })
}
