//! # Function Signatures
//!
//! Parameter lists, default values, UI hints and overload keys of generated
//! MDL functions.

use crate::document::{Document, NodeDef, ValueElement};
use crate::error::Result;
use crate::modules::mdl_namespace_for_uri;
use crate::types::{
    corrected_input_name, default_value_literal, host_type_of_name, HostType, PortableType,
    CONNECTABLE_PARAMETER_TYPES,
};
use std::collections::BTreeSet;
use std::fmt;

/// `varying` for node inputs, `uniform` for node parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variability {
    Varying,
    Uniform,
}

impl Variability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variability::Varying => "varying",
            Variability::Uniform => "uniform",
        }
    }
}

/// UI hints emitted as parameter annotations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetHints {
    pub connectable_by_default: bool,
    pub ui_folder: Option<String>,
}

impl WidgetHints {
    /// Annotation block, empty when no hint applies
    pub fn annotation(&self) -> String {
        let mut hints = Vec::new();
        if !self.connectable_by_default {
            hints.push("alg::base::annotations::visible_by_default(false)".to_string());
        }
        if let Some(folder) = &self.ui_folder {
            hints.push(format!("anno::in_group(\"{}\")", folder));
        }
        if hints.is_empty() {
            return String::new();
        }
        format!("[[\n        {}\n    ]]", hints.join(",\n        "))
    }
}

/// One parameter of a generated function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdlParameter {
    pub name: String,
    pub type_name: HostType,
    pub variability: Variability,
    pub default: String,
    pub hints: WidgetHints,
}

impl fmt::Display for MdlParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.variability.as_str(),
            self.type_name,
            self.name
        )?;
        if !self.default.is_empty() {
            write!(f, "={}", self.default)?;
        }
        f.write_str(&self.hints.annotation())
    }
}

/// Geometry properties with an inline MDL expression
fn inline_geomprop(name: &str) -> Option<&'static str> {
    match name {
        "position" => Some("state::position()"),
        "normal" => Some("state::normal()"),
        "texcoord" => Some("float2(state::texture_coordinate(0).x, state::texture_coordinate(0).y)"),
        _ => None,
    }
}

/// Default value expression of an interface element.
///
/// Defaults bound to a geometry property call the matching
/// `getGeomPropDef_<name>()` helper, qualified by the module that defines it.
pub fn parameter_default(
    element: &ValueElement,
    doc: &Document,
    used_modules: &mut BTreeSet<String>,
) -> Result<String> {
    let host_type = host_type_of_name(&element.type_name)?;
    if let Some(geomprop) = element.attribute("defaultgeomprop").filter(|g| !g.is_empty()) {
        if let Some(inline) = inline_geomprop(geomprop) {
            return Ok(inline.to_string());
        }
        let helper = format!("getGeomPropDef_{}()", geomprop);
        let namespace = doc
            .geom_prop_def(geomprop)
            .map(|def| mdl_namespace_for_uri(&def.source_uri))
            .unwrap_or_default();
        if namespace.is_empty() {
            return Ok(helper);
        }
        let qualified = format!("{}::{}", namespace, helper);
        used_modules.insert(namespace);
        return Ok(qualified);
    }
    Ok(format!("{}({})", host_type, literal(element, host_type)))
}

/// Constructor argument text of an element value
pub fn literal(element: &ValueElement, host_type: HostType) -> String {
    let value = element.value_string();
    if value.is_empty() {
        return default_value_literal(host_type).to_string();
    }
    match host_type {
        HostType::String | HostType::Texture2d => format!("\"{}\"", value),
        _ => value.to_string(),
    }
}

fn is_skipped_type(type_name: &str) -> bool {
    PortableType::from_name(type_name).map_or(false, |t| t.is_skipped())
}

/// Comment recorded for an interface element of an unsupported type
pub fn skipped_type_comment(def: &NodeDef, element: &ValueElement) -> String {
    format!(
        "// MaterialX parameter {} from node {} skipped because it is of type {}",
        element.name, def.name, element.type_name
    )
}

/// Comment emitted in place of an unsupported node definition
pub fn skipped_node_comment(def: &NodeDef) -> String {
    format!("// Unsupported MaterialX nodedef {} skipped", def.name)
}

/// Ordered parameter list: every input (varying), then every parameter
/// (uniform). Elements of skipped types are left out with a warning.
pub fn mdl_parameters(
    def: &NodeDef,
    doc: &Document,
    warnings: &mut Vec<String>,
    used_modules: &mut BTreeSet<String>,
) -> Result<Vec<MdlParameter>> {
    let mut parameters = Vec::with_capacity(def.inputs.len() + def.parameters.len());
    let groups = [
        (&def.inputs, Variability::Varying),
        (&def.parameters, Variability::Uniform),
    ];
    for (elements, variability) in groups {
        for element in elements {
            if is_skipped_type(&element.type_name) {
                warnings.push(skipped_type_comment(def, element));
                continue;
            }
            let connectable_by_default = match variability {
                Variability::Varying => element.attribute("uiadvanced") != Some("true"),
                Variability::Uniform => {
                    CONNECTABLE_PARAMETER_TYPES.contains(&element.type_name.as_str())
                }
            };
            let hints = WidgetHints {
                connectable_by_default,
                ui_folder: element
                    .attribute("uifolder")
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            };
            parameters.push(MdlParameter {
                name: corrected_input_name(&element.name),
                type_name: host_type_of_name(&element.type_name)?,
                variability,
                default: parameter_default(element, doc, used_modules)?,
                hints,
            });
        }
    }
    Ok(parameters)
}

/// Whether a node definition can be expressed in MDL at all.
///
/// Float-selected `switch` nodes are rejected so they do not overload the
/// integer variant.
pub fn is_node_supported(def: &NodeDef) -> bool {
    let return_supported = host_type_of_name(def.return_type()).is_ok();
    let interface_supported = def
        .inputs
        .iter()
        .chain(def.parameters.iter())
        .all(|e| PortableType::from_name(&e.type_name).map_or(false, |t| !t.is_skipped()));
    if def.node == "switch" && def.parameter("which").map_or(false, |p| p.type_name == "float") {
        return false;
    }
    return_supported && interface_supported
}

/// Overload key: function name followed by the parameter types
pub fn overload_key(function_name: &str, parameters: &[MdlParameter]) -> String {
    let types: Vec<&str> = parameters.iter().map(|p| p.type_name.as_str()).collect();
    format!("{}{}", function_name, types.join(","))
}

/// `name(\n    <parameters>)`
pub fn function_signature(function_name: &str, parameters: &[MdlParameter]) -> String {
    let formatted: Vec<String> = parameters.iter().map(MdlParameter::to_string).collect();
    format!("{}(\n    {})", function_name, formatted.join(",\n    "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GeomPropDef;
    use pretty_assertions::assert_eq;

    fn image_def() -> NodeDef {
        let mut def = NodeDef::new("ND_image_color3", "image");
        def.type_name = Some("color3".into());
        def.add_input("default", "color3").value = Some("0.5,0.5,0.5".into());
        def.add_input("texcoord", "vector2")
            .set_attribute("defaultgeomprop", "UV0");
        def.add_parameter("file", "filename").value = Some("wood.png".into());
        let layer = def.add_parameter("layer", "string");
        layer.set_attribute("uifolder", "Advanced");
        def
    }

    #[test]
    fn test_parameters_inputs_before_parameters() {
        let mut doc = Document::new();
        doc.add_geom_prop_def(GeomPropDef {
            name: "UV0".into(),
            type_name: "vector2".into(),
            geomprop: "texcoord".into(),
            source_uri: "stdlib/stdlib_defs.mtlx".into(),
            ..Default::default()
        })
        .unwrap();
        let mut warnings = Vec::new();
        let mut used = BTreeSet::new();
        let params = mdl_parameters(&image_def(), &doc, &mut warnings, &mut used).unwrap();

        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["default_", "texcoord", "file", "layer"]);
        assert_eq!(params[0].default, "color3(0.5,0.5,0.5)");
        assert_eq!(params[1].default, "mtlx::stdlib::getGeomPropDef_UV0()");
        assert_eq!(params[2].default, "texture_2d(\"wood.png\")");
        assert_eq!(params[3].default, "string(\"\")");
        assert!(params[2].hints.connectable_by_default);
        assert!(!params[3].hints.connectable_by_default);
        assert_eq!(used.into_iter().collect::<Vec<_>>(), vec!["mtlx::stdlib".to_string()]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_signature_text() {
        let params = vec![
            MdlParameter {
                name: "in1".into(),
                type_name: HostType::Float,
                variability: Variability::Varying,
                default: "float(0.f)".into(),
                hints: WidgetHints {
                    connectable_by_default: true,
                    ui_folder: None,
                },
            },
            MdlParameter {
                name: "space".into(),
                type_name: HostType::String,
                variability: Variability::Uniform,
                default: "string(\"object\")".into(),
                hints: WidgetHints {
                    connectable_by_default: false,
                    ui_folder: Some("Space".into()),
                },
            },
        ];
        assert_eq!(
            function_signature("f", &params),
            "f(\n    varying float in1=float(0.f),\n    uniform string space=string(\"object\")[[\n        \
             alg::base::annotations::visible_by_default(false),\n        anno::in_group(\"Space\")\n    ]])"
        );
        assert_eq!(overload_key("f", &params), "ffloat,string");
        assert_eq!(function_signature("g", &[]), "g(\n    )");
    }

    #[test]
    fn test_skipped_types_and_float_switch() {
        let mut def = NodeDef::new("ND_mix_color4", "mix");
        def.type_name = Some("color4".into());
        def.add_input("fg", "color4");
        assert!(!is_node_supported(&def));

        let mut switch = NodeDef::new("ND_switch_float", "switch");
        switch.type_name = Some("float".into());
        switch.add_parameter("which", "float");
        assert!(!is_node_supported(&switch));
        switch.parameters[0].type_name = "integer".into();
        assert!(is_node_supported(&switch));

        let mut warnings = Vec::new();
        let params = mdl_parameters(&def, &Document::new(), &mut warnings, &mut BTreeSet::new()).unwrap();
        assert!(params.is_empty());
        assert_eq!(
            warnings,
            vec!["// MaterialX parameter fg from node ND_mix_color4 skipped because it is of type color4".to_string()]
        );
    }
}
