//! # Type Table
//!
//! Bidirectional mapping between host MDL type names and MaterialX type
//! names, plus the literal, vector-size, swizzle and reserved-word tables
//! used by both translators.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MaterialX type names understood by the translators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortableType {
    Integer,
    Boolean,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Matrix33,
    Matrix44,
    String,
    Color2,
    Color3,
    Color4,
    Filename,
    SurfaceShader,
}

/// MDL type names emitted by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostType {
    Int,
    Bool,
    Float,
    Float2,
    Float3,
    Float4,
    Float3x3,
    Float4x4,
    String,
    Color2,
    Color3,
    Color4,
    Texture2d,
    Material,
}

impl PortableType {
    /// Every portable type, in declaration order of the type table
    pub const ALL: [PortableType; 14] = [
        PortableType::Integer,
        PortableType::Boolean,
        PortableType::Float,
        PortableType::Vector2,
        PortableType::Vector3,
        PortableType::Vector4,
        PortableType::Matrix33,
        PortableType::Matrix44,
        PortableType::String,
        PortableType::Color2,
        PortableType::Color3,
        PortableType::Color4,
        PortableType::Filename,
        PortableType::SurfaceShader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortableType::Integer => "integer",
            PortableType::Boolean => "boolean",
            PortableType::Float => "float",
            PortableType::Vector2 => "vector2",
            PortableType::Vector3 => "vector3",
            PortableType::Vector4 => "vector4",
            PortableType::Matrix33 => "matrix33",
            PortableType::Matrix44 => "matrix44",
            PortableType::String => "string",
            PortableType::Color2 => "color2",
            PortableType::Color3 => "color3",
            PortableType::Color4 => "color4",
            PortableType::Filename => "filename",
            PortableType::SurfaceShader => "surfaceshader",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Whether this type is one of the deliberately unsupported color depths
    pub fn is_skipped(&self) -> bool {
        matches!(self, PortableType::Color2 | PortableType::Color4)
    }
}

impl HostType {
    pub const ALL: [HostType; 14] = [
        HostType::Int,
        HostType::Bool,
        HostType::Float,
        HostType::Float2,
        HostType::Float3,
        HostType::Float4,
        HostType::Float3x3,
        HostType::Float4x4,
        HostType::String,
        HostType::Color2,
        HostType::Color3,
        HostType::Color4,
        HostType::Texture2d,
        HostType::Material,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostType::Int => "int",
            HostType::Bool => "bool",
            HostType::Float => "float",
            HostType::Float2 => "float2",
            HostType::Float3 => "float3",
            HostType::Float4 => "float4",
            HostType::Float3x3 => "float3x3",
            HostType::Float4x4 => "float4x4",
            HostType::String => "string",
            HostType::Color2 => "color2",
            HostType::Color3 => "color3",
            HostType::Color4 => "color4",
            HostType::Texture2d => "texture_2d",
            HostType::Material => "material",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, HostType::Color2 | HostType::Color4)
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, HostType::Float3x3 | HostType::Float4x4)
    }
}

impl fmt::Display for PortableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MDL type of a MaterialX type
pub fn host_type_of(portable: PortableType) -> HostType {
    match portable {
        PortableType::Integer => HostType::Int,
        PortableType::Boolean => HostType::Bool,
        PortableType::Float => HostType::Float,
        PortableType::Vector2 => HostType::Float2,
        PortableType::Vector3 => HostType::Float3,
        PortableType::Vector4 => HostType::Float4,
        PortableType::Matrix33 => HostType::Float3x3,
        PortableType::Matrix44 => HostType::Float4x4,
        PortableType::String => HostType::String,
        PortableType::Color2 => HostType::Color2,
        PortableType::Color3 => HostType::Color3,
        PortableType::Color4 => HostType::Color4,
        PortableType::Filename => HostType::Texture2d,
        PortableType::SurfaceShader => HostType::Material,
    }
}

/// MaterialX type of an MDL type
pub fn portable_type_of(host: HostType) -> PortableType {
    match host {
        HostType::Int => PortableType::Integer,
        HostType::Bool => PortableType::Boolean,
        HostType::Float => PortableType::Float,
        HostType::Float2 => PortableType::Vector2,
        HostType::Float3 => PortableType::Vector3,
        HostType::Float4 => PortableType::Vector4,
        HostType::Float3x3 => PortableType::Matrix33,
        HostType::Float4x4 => PortableType::Matrix44,
        HostType::String => PortableType::String,
        HostType::Color2 => PortableType::Color2,
        HostType::Color3 => PortableType::Color3,
        HostType::Color4 => PortableType::Color4,
        HostType::Texture2d => PortableType::Filename,
        HostType::Material => PortableType::SurfaceShader,
    }
}

/// Resolve a host type id, including the aliases the host graph reports
/// (`color`, `ColorRGB`, `mdl::material`, `matrix<float>[3][3]`, ...).
pub fn portable_type_of_name(host_type_id: &str) -> Result<PortableType> {
    let portable = match host_type_id {
        "color" | "ColorRGB" => Some(PortableType::Color3),
        "mdl::material" => Some(PortableType::SurfaceShader),
        "mdl::texture_2d" => Some(PortableType::Filename),
        "matrix<float>[3][3]" => Some(PortableType::Matrix33),
        "matrix<float>[4][4]" => Some(PortableType::Matrix44),
        other => HostType::from_name(other).map(portable_type_of),
    };
    portable.ok_or_else(|| Error::MissingTypeMapping(host_type_id.to_string()))
}

/// MDL type of a MaterialX type name
pub fn host_type_of_name(portable_type: &str) -> Result<HostType> {
    PortableType::from_name(portable_type)
        .map(host_type_of)
        .ok_or_else(|| Error::MissingTypeMapping(portable_type.to_string()))
}

/// Canonical zero-initializer text, wrapped by the caller as `T(literal)`
pub fn default_value_literal(host: HostType) -> &'static str {
    match host {
        HostType::Int => "0",
        HostType::Bool => "false",
        HostType::Float => "0.f",
        HostType::Float2 => "0.f,0.f",
        HostType::Float3 => "0.f,0.f,0.f",
        HostType::Float4 => "0.f,0.f,0.f,0.f",
        HostType::Float3x3 | HostType::Float4x4 => "0.f",
        HostType::String => "\"\"",
        HostType::Color2 => "0.f, 0.f",
        HostType::Color3 => "0.f, 0.f, 0.f",
        HostType::Color4 => "0.f, 0.f, 0.f, 0.f",
        HostType::Texture2d | HostType::Material => "",
    }
}

pub fn vector_size(host: HostType) -> Option<usize> {
    match host {
        HostType::Float => Some(1),
        HostType::Float2 => Some(2),
        HostType::Float3 | HostType::Color3 => Some(3),
        HostType::Float4 => Some(4),
        _ => None,
    }
}

/// Channel name strings; scalars list a short and a long alias
pub fn swizzle_channel_names(host: HostType) -> &'static [&'static str] {
    match host {
        HostType::Float => &["r", "x"],
        HostType::Float2 => &["xy"],
        HostType::Float3 => &["xyz"],
        HostType::Float4 => &["xyzw"],
        HostType::Color3 => &["rgb"],
        _ => &[],
    }
}

pub const INPUT_RESERVED_WORDS: &[&str] = &["in", "default", "rotate"];
pub const FUNCTION_RESERVED_WORDS: &[&str] = &["switch"];

/// Node names whose generated function always carries a `_<type>` suffix
pub const FORCE_TYPE_DECORATION: &[&str] = &["image", "tiledimage"];

/// Parameter types that stay connectable in the host UI
pub const CONNECTABLE_PARAMETER_TYPES: &[&str] = &["filename"];

pub fn corrected_identifier(name: &str, reserved: &[&str]) -> String {
    if reserved.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

pub fn corrected_input_name(name: &str) -> String {
    corrected_identifier(name, INPUT_RESERVED_WORDS)
}

pub fn corrected_function_name(name: &str) -> String {
    corrected_identifier(name, FUNCTION_RESERVED_WORDS)
}

/// Reverse of input-name correction, for host inputs named `in_`/`default_`
pub fn uncorrected_input_name(name: &str) -> &str {
    match name {
        "in_" | "default_" => &name[..name.len() - 1],
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_is_bijective() {
        for portable in PortableType::ALL {
            if portable.is_skipped() {
                continue;
            }
            assert_eq!(portable_type_of(host_type_of(portable)), portable);
            assert_eq!(
                PortableType::from_name(portable.as_str()),
                Some(portable)
            );
        }
        for host in HostType::ALL {
            if host.is_unsupported() {
                continue;
            }
            assert_eq!(host_type_of(portable_type_of(host)), host);
        }
    }

    #[test]
    fn test_host_aliases() {
        assert_eq!(portable_type_of_name("color").unwrap(), PortableType::Color3);
        assert_eq!(portable_type_of_name("ColorRGB").unwrap(), PortableType::Color3);
        assert_eq!(
            portable_type_of_name("matrix<float>[4][4]").unwrap(),
            PortableType::Matrix44
        );
        assert_eq!(
            portable_type_of_name("mdl::texture_2d").unwrap(),
            PortableType::Filename
        );
        assert!(matches!(
            portable_type_of_name("bsdf"),
            Err(Error::MissingTypeMapping(_))
        ));
    }

    #[test]
    fn test_reserved_word_correction() {
        assert_eq!(corrected_input_name("in"), "in_");
        assert_eq!(corrected_input_name("rotate"), "rotate_");
        assert_eq!(corrected_input_name("switch"), "switch");
        assert_eq!(corrected_function_name("switch"), "switch_");
        assert_eq!(corrected_function_name("in"), "in");
        assert_eq!(uncorrected_input_name("default_"), "default");
        assert_eq!(uncorrected_input_name("amount"), "amount");
    }

    #[test]
    fn test_swizzle_tables() {
        assert_eq!(swizzle_channel_names(HostType::Float), &["r", "x"]);
        assert_eq!(swizzle_channel_names(HostType::Color3), &["rgb"]);
        assert_eq!(vector_size(HostType::Color3), Some(3));
        assert_eq!(vector_size(HostType::String), None);
    }
}
