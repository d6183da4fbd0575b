//! Shared proxy module imported by every generated library module.

use crate::types::HostType;

pub const MDL_VERSION: &str = "mdl 1.4;";

/// Types MaterialX has and MDL lacks
const CUSTOM_TYPES: [&str; 3] = [
    "export struct color2 { float r; float g; };",
    "export typedef color color3;",
    "export struct color4 { float r; float g; float b; float a; };",
];

fn subgraph_output_function(host_type: HostType) -> String {
    format!(
        "export {t} subgraph_output(varying {t} p)\n{{\n    return p;\n}}\n",
        t = host_type
    )
}

/// Text of the shared module: custom color types plus one
/// `subgraph_output` proxy per value type
pub fn generate_shared_module() -> String {
    let mut text = format!("{}\n", MDL_VERSION);
    text.push_str("\n// shared library for generated MaterialX modules\n");
    text.push_str("\n// types declarations\n");
    for typedef in CUSTOM_TYPES {
        text.push_str(typedef);
        text.push('\n');
    }
    for host_type in HostType::ALL {
        if matches!(host_type, HostType::Material | HostType::Texture2d) {
            continue;
        }
        text.push_str(&subgraph_output_function(host_type));
    }
    text
}
