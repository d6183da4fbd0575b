//! # Node Category Templates
//!
//! Fixed MDL bodies for the MaterialX node categories the generator knows
//! how to express. Categories are resolved once through a static table into
//! a closed [`NodeTemplate`] enum; each variant renders one body template.
//!
//! Parameter names inside the templates are the corrected MDL names
//! (`in_`, `default_`), since bodies refer to the generated signature.

use super::signature::MdlParameter;
use crate::graph_utils::swizzle_body;
use crate::types::HostType;

/// Body template of a node category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTemplate {
    /// `op(in_)`, lifted through float3 for colors
    Unary(&'static str),
    /// `op(in1, T(in2))`
    BinaryCast(&'static str),
    /// `op(in1, in2)`
    Binary(&'static str),
    /// `(in1 <op> T(in2))`
    Arithmetic(&'static str),
    Divide,
    Modulo,
    Power,
    Clamp,
    Smoothstep,
    Remap,
    Invert,
    Texcoord,
    Position,
    Normal,
    /// Tangent frame query, `state::texture_tangent_u` or `_v`
    TangentFrame(&'static str),
    Time,
    GeomPropValue,
    Image,
    TiledImage,
    TriplanarProjection,
    RampLr,
    RampTb,
    Ramp4,
    SplitLr,
    SplitTb,
    /// Perlin noise sampled at the named position parameter
    Noise(&'static str),
    Fractal3d,
    /// Cell noise sampled at the named position parameter
    CellNoise(&'static str),
    /// Space or matrix transform through the named state function
    Transform(&'static str),
    Determinant,
    Rotate,
    NormalMap,
    Luminance,
    RgbToHsv,
    HsvToRgb,
    Contrast,
    Range,
    HsvAdjust,
    Saturate,
    Premult,
    Unpremult,
    /// `lerp(bg, <expr>, mix)`
    Blend(&'static str),
    Burn,
    Dodge,
    Overlay,
    Inside,
    Outside,
    Compare,
    Combine,
    Switch,
    Swizzle,
    Convert,
    Constant,
    /// `(value1 <op> value2) ? in1 : in2`
    Conditional(&'static str),
    Rotate2d,
    Rotate3d,
}

static TEMPLATES: &[(&str, NodeTemplate)] = &[
    // math
    ("absval", NodeTemplate::Unary("math::abs")),
    ("floor", NodeTemplate::Unary("math::floor")),
    ("ceil", NodeTemplate::Unary("math::ceil")),
    ("sin", NodeTemplate::Unary("math::sin")),
    ("cos", NodeTemplate::Unary("math::cos")),
    ("tan", NodeTemplate::Unary("math::tan")),
    ("asin", NodeTemplate::Unary("math::asin")),
    ("acos", NodeTemplate::Unary("math::acos")),
    ("sqrt", NodeTemplate::Unary("math::sqrt")),
    ("sign", NodeTemplate::Unary("math::sign")),
    ("ln", NodeTemplate::Unary("math::log")),
    ("exp", NodeTemplate::Unary("math::exp")),
    ("normalize", NodeTemplate::Unary("math::normalize")),
    ("magnitude", NodeTemplate::Unary("math::length")),
    ("transpose", NodeTemplate::Unary("math::transpose")),
    ("dot", NodeTemplate::Unary("")),
    ("min", NodeTemplate::BinaryCast("math::min")),
    ("max", NodeTemplate::BinaryCast("math::max")),
    ("dotproduct", NodeTemplate::Binary("math::dot")),
    ("crossproduct", NodeTemplate::Binary("math::cross")),
    ("atan2", NodeTemplate::Binary("math::atan2")),
    ("add", NodeTemplate::Arithmetic("+")),
    ("subtract", NodeTemplate::Arithmetic("-")),
    ("multiply", NodeTemplate::Arithmetic("*")),
    ("modulo", NodeTemplate::Modulo),
    ("power", NodeTemplate::Power),
    ("clamp", NodeTemplate::Clamp),
    ("smoothstep", NodeTemplate::Smoothstep),
    ("remap", NodeTemplate::Remap),
    ("divide", NodeTemplate::Divide),
    ("invert", NodeTemplate::Invert),
    // state
    ("texcoord", NodeTemplate::Texcoord),
    ("position", NodeTemplate::Position),
    ("normal", NodeTemplate::Normal),
    ("tangent", NodeTemplate::TangentFrame("state::texture_tangent_u")),
    ("bitangent", NodeTemplate::TangentFrame("state::texture_tangent_v")),
    ("time", NodeTemplate::Time),
    ("geompropvalue", NodeTemplate::GeomPropValue),
    ("geomattrvalue", NodeTemplate::GeomPropValue),
    // texturing
    ("image", NodeTemplate::Image),
    ("tiledimage", NodeTemplate::TiledImage),
    ("triplanarprojection", NodeTemplate::TriplanarProjection),
    // procedural
    ("ramplr", NodeTemplate::RampLr),
    ("ramptb", NodeTemplate::RampTb),
    ("ramp4", NodeTemplate::Ramp4),
    ("splitlr", NodeTemplate::SplitLr),
    ("splittb", NodeTemplate::SplitTb),
    ("noise2d", NodeTemplate::Noise("texcoord")),
    ("noise3d", NodeTemplate::Noise("position")),
    ("fractal3d", NodeTemplate::Fractal3d),
    ("cellnoise2d", NodeTemplate::CellNoise("texcoord")),
    ("cellnoise3d", NodeTemplate::CellNoise("position")),
    // transforms
    ("transformpoint", NodeTemplate::Transform("state::transform_point")),
    ("transformvector", NodeTemplate::Transform("state::transform_vector")),
    ("transformnormal", NodeTemplate::Transform("state::transform_normal")),
    ("determinant", NodeTemplate::Determinant),
    ("rotate", NodeTemplate::Rotate),
    ("normalmap", NodeTemplate::NormalMap),
    // color
    ("luminance", NodeTemplate::Luminance),
    ("rgbtohsv", NodeTemplate::RgbToHsv),
    ("hsvtorgb", NodeTemplate::HsvToRgb),
    ("contrast", NodeTemplate::Contrast),
    ("range", NodeTemplate::Range),
    ("hsvadjust", NodeTemplate::HsvAdjust),
    ("saturate", NodeTemplate::Saturate),
    ("premult", NodeTemplate::Premult),
    ("unpremult", NodeTemplate::Unpremult),
    // compositing
    ("mix", NodeTemplate::Blend("fg")),
    ("plus", NodeTemplate::Blend("bg+fg")),
    ("minus", NodeTemplate::Blend("bg-fg")),
    ("difference", NodeTemplate::Blend("math::abs(bg-fg)")),
    ("screen", NodeTemplate::Blend("bg+fg-bg*fg")),
    ("burn", NodeTemplate::Burn),
    ("dodge", NodeTemplate::Dodge),
    ("overlay", NodeTemplate::Overlay),
    ("inside", NodeTemplate::Inside),
    ("outside", NodeTemplate::Outside),
    ("compare", NodeTemplate::Compare),
    // channels
    ("combine", NodeTemplate::Combine),
    ("switch", NodeTemplate::Switch),
    ("swizzle", NodeTemplate::Swizzle),
    ("convert", NodeTemplate::Convert),
    // other
    ("constant", NodeTemplate::Constant),
    ("ifequal", NodeTemplate::Conditional("==")),
    ("ifgreater", NodeTemplate::Conditional(">")),
    ("ifgreatereq", NodeTemplate::Conditional(">=")),
    ("rotate2d", NodeTemplate::Rotate2d),
    ("rotate3d", NodeTemplate::Rotate3d),
];

/// Rendered body of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBody {
    pub text: String,
    /// Prefix of the `anno::description` annotation
    pub description: &'static str,
}

impl TemplateBody {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: "",
        }
    }
}

/// Inputs a template renders from
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'p> {
    pub return_type: HostType,
    pub parameters: &'p [MdlParameter],
}

impl NodeTemplate {
    /// Template of a node string; every `combine*` node shares one template
    pub fn lookup(node: &str) -> Option<NodeTemplate> {
        TEMPLATES
            .iter()
            .find(|(name, _)| *name == node)
            .map(|(_, template)| *template)
            .or_else(|| node.starts_with("combine").then_some(NodeTemplate::Combine))
    }

    /// Render the body. `None` when the template has no form for this
    /// signature; the caller then emits the missing-implementation stub.
    pub fn render(&self, ctx: &TemplateContext<'_>, warnings: &mut Vec<String>) -> Option<TemplateBody> {
        let t = ctx.return_type.as_str();
        let is_color = ctx.return_type == HostType::Color3;
        let is_matrix = ctx.return_type.is_matrix();
        let params = ctx.parameters;

        let text = match *self {
            NodeTemplate::Unary(op) if is_color => format!("\n    return color3({}(float3(in_)));\n", op),
            NodeTemplate::Unary(op) => format!("\n    return {}(in_);\n", op),
            NodeTemplate::BinaryCast(op) => format!("\n    return {}(in1, {}(in2));\n", op, t),
            NodeTemplate::Binary(op) => format!("\n    return {}(in1, in2);\n", op),
            NodeTemplate::Arithmetic(op) => format!("\n    return (in1 {} {}(in2));\n", op, t),
            NodeTemplate::Modulo => {
                let text = if is_color {
                    "\n    return color3(float3(in1) - float3(in2) * math::floor(float3(in1)/float3(in2)));\n"
                } else {
                    "\n    return in1 - in2 * math::floor(in1/in2);\n"
                };
                return Some(TemplateBody {
                    text: text.to_string(),
                    description: "The remaining fraction after dividing the incoming float/color/vector \
                                  by the constant amount and subtracting the integer portion. \
                                  The modulo amount cannot be 0. ",
                });
            }
            NodeTemplate::Power => format!("\n    return math::pow(in1, {}(in2));\n", t),
            NodeTemplate::Clamp => "\n    return math::clamp(in_, low, high);\n".to_string(),
            NodeTemplate::Smoothstep if is_color => {
                "\n    return color3(math::smoothstep(float3(low), float3(high), float3(in_)));\n".to_string()
            }
            NodeTemplate::Smoothstep => format!("\n    return math::smoothstep({t}(low), {t}(high), in_);\n"),
            NodeTemplate::Remap => {
                "\n    return outlow + (in_ - inlow) * (outhigh - outlow) / (inhigh - inlow);\n".to_string()
            }
            NodeTemplate::Divide if is_matrix => return None,
            NodeTemplate::Divide => format!("\n    return (in1 / {}(in2));\n", t),
            NodeTemplate::Invert if is_matrix => return None,
            NodeTemplate::Invert => format!("\n    return {}(amount) - in_;\n", t),

            NodeTemplate::Texcoord => match ctx.return_type {
                HostType::Float2 => "\n    float3 tmp = state::texture_coordinate(index);\n    \
                                     return float2(tmp[0],tmp[1]);\n"
                    .to_string(),
                HostType::Float3 => "\n    return (state::texture_coordinate(index));\n".to_string(),
                _ => return None,
            },
            NodeTemplate::Position => "\n    return state::transform_point(state::coordinate_internal, \
                                       mtlx::utilities::getSpaceByString(space), state::position());\n"
                .to_string(),
            NodeTemplate::Normal => "\n    return math::normalize(state::transform_normal(\
                                     state::coordinate_internal, mtlx::utilities::getSpaceByString(space), \
                                     state::normal()));\n"
                .to_string(),
            NodeTemplate::TangentFrame(query) => format!(
                "\n    return math::normalize(state::transform_vector(state::coordinate_internal, \
                 mtlx::utilities::getSpaceByString(space), {}(index)));\n",
                query
            ),
            NodeTemplate::Time => "\n    return state::animation_time();\n".to_string(),
            // Valid MaterialX, no MDL equivalent
            NodeTemplate::GeomPropValue => format!(
                "\n    return {}({});\n",
                t,
                crate::types::default_value_literal(ctx.return_type)
            ),

            NodeTemplate::Image => format!(
                "\n    if(tex::texture_isvalid(file)) {{\n        return tex::lookup_{}(\n            \
                 file, texcoord, mtlx::utilities::get_wrap_mode(uaddressmode),\
                 mtlx::utilities::get_wrap_mode(vaddressmode));\n    }} else {{\n        \
                 return default_;\n    }}\n",
                lookup_suffix(ctx.return_type)
            ),
            NodeTemplate::TiledImage => format!(
                "\n    if(tex::texture_isvalid(file)) {{\n        return tex::lookup_{}(\n            \
                 file, (texcoord*uvtiling)-uvoffset);\n    }} else {{\n        \
                 return default_;\n    }}\n",
                lookup_suffix(ctx.return_type)
            ),
            NodeTemplate::TriplanarProjection => triplanar_body(t, lookup_suffix(ctx.return_type)),

            NodeTemplate::RampLr => {
                "\n    return math::lerp(valuel, valuer, math::clamp(texcoord.x, 0.0, 1.0));\n".to_string()
            }
            NodeTemplate::RampTb => {
                "\n    return math::lerp(valuet, valueb, math::clamp(texcoord.y, 0.0, 1.0));\n".to_string()
            }
            NodeTemplate::Ramp4 => "\n    float ss = math::clamp(texcoord.x, 0, 1);\n    \
                                    float tt = math::clamp(texcoord.y, 0, 1);\n    \
                                    return math::lerp(\n        \
                                    math::lerp(valuetl, valuetr, ss),\n        \
                                    math::lerp(valuebl, valuebr, ss), tt);\n"
                .to_string(),
            NodeTemplate::SplitLr => "\n    return math::lerp(valuel, valuer,\n        \
                                      math::step(center, math::clamp(texcoord.x,0,1)));\n"
                .to_string(),
            NodeTemplate::SplitTb => "\n    return math::lerp(valuet, valueb,\n        \
                                      math::step(center, math::clamp(texcoord.y,0,1)));\n"
                .to_string(),
            NodeTemplate::Noise(position) => {
                let suffix = if ctx.return_type == HostType::Float { "float" } else { "float3" };
                format!(
                    "\n    {t} ns = mtlx::utilities::to_{t}(mtlx::utilities::perlin_noise_{suffix}({position}));\n    \
                     return mtlx::utilities::to_{t}(amplitude*(ns - {t}(pivot)) + {t}(pivot));\n"
                )
            }
            NodeTemplate::Fractal3d => format!(
                "\n    return mtlx::utilities::fBm_{}(position, octaves, lacunarity, diminish) * amplitude;\n",
                t
            ),
            NodeTemplate::CellNoise(position) => format!("\n    return mtlx::utilities::cellnoise({});\n", position),

            NodeTemplate::Transform(function) => transform_body(function, ctx, warnings)?,
            NodeTemplate::Determinant => "\n    return mtlx::utilities::determinant(in_);\n".to_string(),
            NodeTemplate::Rotate => {
                let axis = if ctx.return_type == HostType::Float3 { ", axis" } else { "" };
                format!("\n    return mtlx::utilities::rotate_{}(in_, amount{});\n", t, axis)
            }
            NodeTemplate::NormalMap => NORMALMAP_BODY.to_string(),

            NodeTemplate::Luminance => "\n    return color3(math::dot(float3(in_), float3(lumacoeffs)));\n".to_string(),
            NodeTemplate::RgbToHsv => "\n    return mtlx::utilities::rgb2hsv(in_);\n".to_string(),
            NodeTemplate::HsvToRgb => "\n    return mtlx::utilities::hsv2rgb(in_);\n".to_string(),
            NodeTemplate::Contrast => format!("\n    return (in_ - pivot)*{}(amount) + pivot;\n", t),
            NodeTemplate::Range => format!(
                "\n    {} retval = outlow + (in_ - inlow)*(outhigh - outlow)/(inhigh - inlow);\n    \
                 retval = math::pow(retval, 1.0/gamma);\n    \
                 if (doclamp) \n        retval = math::clamp(retval, outlow, outhigh);\n    \
                 return retval;\n",
                t
            ),
            NodeTemplate::HsvAdjust => "\n    float3 hsvval = float3(mtlx::utilities::rgb2hsv(in_));\n    \
                                        hsvval = float3(hsvval.x+amount.x, hsvval.y*amount.y, hsvval.z*amount.z);\n    \
                                        return mtlx::utilities::hsv2rgb(color3(hsvval));\n"
                .to_string(),
            NodeTemplate::Saturate => "\n    return math::lerp(\n       \
                                       color3(math::dot(float3(in_), float3(lumacoeffs))), in_, amount);\n"
                .to_string(),
            NodeTemplate::Premult => "\n    return in_*alpha;\n".to_string(),
            NodeTemplate::Unpremult => "\n    return in_/alpha;\n".to_string(),

            NodeTemplate::Blend(expression) => format!("\n    return math::lerp(bg, {}, mix);\n", expression),
            NodeTemplate::Burn => format!("\n    return math::lerp(bg, {t}(1.0)-({t}(1.0)-bg)/fg, mix);\n"),
            NodeTemplate::Dodge => format!("\n    return math::lerp(bg, bg/({}(1.0)-fg), mix);\n", t),
            NodeTemplate::Overlay => {
                let ct = if is_color { "float3" } else { "float" };
                format!(
                    "\n    {ct} upper, lower, mask, overlayval;\n    \
                     {ct} fg_ = {ct}(fg);\n    \
                     {ct} bg_ = {ct}(bg);\n    \
                     lower = 2.0*bg_*fg_;\n    \
                     upper = bg_+fg_-bg_*fg_;\n    \
                     mask = math::step({ct}(.5), fg_);\n    \
                     overlayval = math::lerp(lower, upper, mask);\n    \
                     return {t}(math::lerp(bg, overlayval, mix));\n"
                )
            }
            NodeTemplate::Inside => "\n    return in_*mask;\n".to_string(),
            NodeTemplate::Outside => "\n    return in_*(1.0-mask);\n".to_string(),
            NodeTemplate::Compare => {
                "\n    float mask = math::step(cutoff, intest);\n    return math::lerp(in1, in2, mask);\n".to_string()
            }

            NodeTemplate::Combine => combine_body(ctx)?,
            NodeTemplate::Switch => switch_body(params)?,
            NodeTemplate::Swizzle => swizzle_body(ctx.return_type, params.first()?.type_name, "in_", "channels")?,
            NodeTemplate::Convert => format!("    return mtlx::utilities::to_{}(in_);\n", t),

            NodeTemplate::Constant => "\n    return value;\n".to_string(),
            NodeTemplate::Conditional(op) => format!("\n    return (value1 {} value2) ? in1 : in2;\n", op),
            NodeTemplate::Rotate2d => "\n    float rotationRadians = math::radians(amount);\
                                       \n    float sa = math::sin(rotationRadians);\
                                       \n    float ca = math::cos(rotationRadians);\
                                       \n    return float2(ca*in_.x + sa*in_.y, -sa*in_.x + ca*in_.y);\n"
                .to_string(),
            NodeTemplate::Rotate3d => ROTATE3D_BODY.to_string(),
        };
        Some(TemplateBody::new(text))
    }
}

fn lookup_suffix(return_type: HostType) -> &'static str {
    match return_type {
        HostType::Color3 => "color",
        other => other.as_str(),
    }
}

fn triplanar_body(t: &str, lookup: &str) -> String {
    let mut body = String::from("\n");
    for (file, u, v) in [("filex", 1, 2), ("filey", 0, 2), ("filez", 0, 1)] {
        body.push_str(&format!(
            "    {t} {file}_val;\n    \
             if (tex::texture_isvalid({file})) {{\n        \
             {file}_val = tex::lookup_{lookup}(\n            \
             {file}, float2(position[{u}], position[{v}]));\n    \
             }} else {{\n        \
             {file}_val = default_;\n    \
             }}\n"
        ));
    }
    body.push_str(&format!(
        "\n    float3 blend = math::abs(math::normalize(normal));\n    \
         {t} accum =\n        filex_val*blend.x + filey_val*blend.y + filez_val*blend.z;\n    \
         return accum/(blend.x+blend.y+blend.z);\n"
    ));
    body
}

/// Matrix transforms when the second parameter is `mat`, space transforms
/// otherwise
fn transform_body(function: &str, ctx: &TemplateContext<'_>, warnings: &mut Vec<String>) -> Option<String> {
    let source = ctx.parameters.first()?;
    let second = ctx.parameters.get(1)?;
    if second.name == "mat" {
        let matrix_size = second.type_name.as_str().chars().last();
        let vector_size = source.type_name.as_str().chars().last();
        if matrix_size != vector_size {
            warnings.push("// Error: Ignoring incompatible vector sizes".to_string());
        }
        return Some("\n    return in_*mat;\n".to_string());
    }
    Some(format!(
        "\n    state::coordinate_space fromMdlSpace = mtlx::utilities::getSpaceByString(fromspace);\n    \
         state::coordinate_space toMdlSpace = mtlx::utilities::getSpaceByString(tospace);\n    \
         return mtlx::utilities::to_{}({}(fromMdlSpace, toMdlSpace, mtlx::utilities::to_float3(in_)));\n",
        ctx.return_type, function
    ))
}

fn combine_body(ctx: &TemplateContext<'_>) -> Option<String> {
    let first = ctx.parameters.first()?;
    if ctx.return_type == HostType::Float4 {
        match first.type_name {
            HostType::Float3 => return Some("\n    return float4(in1.x, in1.y, in1.z, in2);\n".to_string()),
            HostType::Float2 => return Some("\n    return float4(in1.x, in1.y, in2.x, in2.y);\n".to_string()),
            _ => {}
        }
    }
    let arguments = match ctx.parameters.len() {
        2 => "in1, in2",
        3 => "in1, in2, in3",
        4 => "in1, in2, in3, in4",
        _ => return None,
    };
    Some(format!("\n    return {}({});\n", ctx.return_type, arguments))
}

fn switch_body(params: &[MdlParameter]) -> Option<String> {
    let mut body = String::from("\n");
    if params.len() == 3 {
        body.push_str("    if (which) return in2;\n");
    } else {
        let selector = params.get(5)?;
        if selector.type_name == HostType::Float {
            body.push_str("    int which_ = math::floor(which);\n");
        } else {
            body.push_str("    int which_ = which;\n");
        }
        body.push_str("    if (which_ == 1) return in2;\n");
        body.push_str("    if (which_ == 2) return in3;\n");
        body.push_str("    if (which_ == 3) return in4;\n");
        body.push_str("    if (which_ >= 4) return in5;\n");
    }
    body.push_str("    return in1;\n");
    Some(body)
}

const NORMALMAP_BODY: &str = "
    float3 result;
    if (space == \"tangent\")
    {
        float3 v = in_ * 2.0 - 1.0;
        float3 B = normalize(math::cross(normal, tangent));
        result = normalize(tangent * v.x * scale + B * v.y * scale + normal * v.z);
    }
    // Object space
    else
    {
        float3 n = in_ * 2.0 - 1.0;
        result = normalize(n);
    }
    return result;
";

const ROTATE3D_BODY: &str = "
    float rotationRadians = math::radians(amount);
    axis = normalize(axis);
    float s = math::sin(rotationRadians);
    float c = math::cos(rotationRadians);
    float oc = 1.0 - c;
    float4x4 rot = float4x4(
         oc * axis.x * axis.x + c, oc * axis.x * axis.y - axis.z * s, oc * axis.z * axis.x + axis.y * s, 0.0,
         oc * axis.x * axis.y + axis.z * s, oc * axis.y * axis.y + c, oc * axis.y * axis.z - axis.x * s, 0.0,
         oc * axis.z * axis.x - axis.y * s, oc * axis.y * axis.z + axis.x * s, oc * axis.z * axis.z + c, 0.0,
         0.0, 0.0, 0.0, 1.0);
    float4 result = (rot * float4(in_.x, in_.y, in_.z, 1.0));
    return float3(result.x, result.y, result.z);
";

/// Fixed material bodies for the two uber-shader nodes
pub fn ubershader_body(node: &str) -> Option<&'static str> {
    match node {
        "physicallyMetallicRoughnessDk" => Some(PHYSICALLY_METALLIC_ROUGHNESS_BODY),
        "standard_surface" => Some(STANDARD_SURFACE_BODY),
        _ => None,
    }
}

const PHYSICALLY_METALLIC_ROUGHNESS_BODY: &str = "
let{
    //- Ambient occlusion mix
    color diffuse_color = baseColor*ambientOcclusion;

    //- Specular BTDF
    bsdf specular_btdf = df::microfacet_ggx_smith_bsdf(tint: diffuse_color,
        roughness_u: 0.0, mode: df::scatter_transmit);

    //- Diffuse BRDF
    bsdf diffuse_brdf = df::diffuse_reflection_bsdf(
        tint: diffuse_color, roughness: 0.0);

    //- Transparency mix
    bsdf transparent_opaque_mix = df::weighted_layer(
        weight: refraction, layer: specular_btdf , base: diffuse_brdf);

    //- Specular Anisotropy
    base::anisotropy_return specular_anisotropy = base::anisotropy_conversion(
        roughness: roughness*roughness,
        anisotropy: anisotropyLevel, anisotropy_rotation: anisotropyAngle,
        tangent_u: state::texture_tangent_u(0));

    //- Specular BRDF
    bsdf specular_brdf = df::microfacet_ggx_smith_bsdf(tint: color(1.0),
        roughness_u: specular_anisotropy.roughness_u,
        roughness_v: specular_anisotropy.roughness_v,
        tangent_u: specular_anisotropy.tangent_u);

    //- Dielectric Model
    float dielectric_reflectivity = specularLevel*0.08;

    //- Custom curve for specular/diffuse angular mix
    bsdf dielectric_model_ior_mixed = df::custom_curve_layer(
        normal_reflectivity: dielectric_reflectivity,
        grazing_reflectivity: 1.0, exponent: 5.0,
        weight: 1.0, layer: specular_brdf, base: transparent_opaque_mix);

    //- Metallic Model
    bsdf metallic_model = df::directional_factor(
        normal_tint: baseColor,
        grazing_tint: color(1.0),
        exponent: 3.0,
        base: specular_brdf);

    //- Metallic mix
    bsdf metallic_dielectric_mix = df::weighted_layer(
        weight: metallic,
        layer: metallic_model,
        base: dielectric_model_ior_mixed);

} in material(

    ior: color(refractionIOR),

    surface: material_surface(
        scattering: metallic_dielectric_mix,
        emission: material_emission(
            emission: df::diffuse_edf(),
            intensity: emissiveColor*2.86*emissiveIntensity,
            mode: intensity_radiant_exitance
        )
    ),

    volume: material_volume(
        absorption_coefficient: alg::base::core::volume_absorption(
            absorption: absorption, absorptionColor: absorptionColor),
        scattering_coefficient: alg::base::core::volume_scattering(
            scattering: scattering)
    ),

    geometry: material_geometry(
        normal: normal,
        displacement: alg::base::core::displacement(
            height: height, heightScale: heightScale),
        cutout_opacity: opacity
    )
);
";

const STANDARD_SURFACE_BODY: &str = "
let{
    //- SSS BRDF, diffuse placeholder
    bsdf sss_bsdf = df::diffuse_reflection_bsdf(
        tint: base_color*base);
    bsdf upToSSS_bsdf = df::weighted_layer(
        weight: 1,
        layer: sss_bsdf,
        normal: normal);

    //- Diffuse transmission BRDF
    bsdf diffuse_btdf = df::diffuse_transmission_bsdf(
        tint: subsurface_color);
    bsdf upToDiffuseBtdf_bsdf = df::weighted_layer(
        weight: thin_walled?1.0:0.0,
        layer: diffuse_btdf,
        base: upToSSS_bsdf,
        normal: -normal);

    //- Diffuse BRDF
    bsdf diffuse_brdf = df::diffuse_reflection_bsdf(
        tint: base_color*base,
        roughness: diffuse_roughness);
    bsdf upToDiffuse_bsdf = df::weighted_layer(
        weight: 1.0-subsurface,
        layer: diffuse_brdf,
        base: upToDiffuseBtdf_bsdf,
        normal: normal);

    //- Sheen BRDF, approximated with backscattering
    bsdf sheen_brdf = df::backscattering_glossy_reflection_bsdf(
        tint: sheen_color,
        roughness_u: sheen_roughness);
    bsdf upToSheen_bsdf = df::fresnel_layer(
        ior: 1.5,
        weight: sheen,
        layer: sheen_brdf,
        base: upToDiffuse_bsdf);

    //- Specular BTDF
    float transmission_roughness = specular_roughness+transmission_extra_roughness;
    base::anisotropy_return transmission_anisotropy2 = base::anisotropy_conversion(
        roughness: transmission_roughness*transmission_roughness,
        anisotropy: specular_anisotropy,
        anisotropy_rotation: specular_rotation*.5,
        tangent_u: state::texture_tangent_u(0));
    bsdf specular_btdf = df::simple_glossy_bsdf(
        roughness_u: transmission_anisotropy2.roughness_u,
        roughness_v: transmission_anisotropy2.roughness_v,
        tangent_u: transmission_anisotropy2.tangent_u,
        mode: df::scatter_transmit);
    bsdf upToTransmission_bsdf = df::weighted_layer(
        weight: transmission,
        layer: specular_btdf,
        base: upToSheen_bsdf,
        normal: normal);

    //- Specular
    base::anisotropy_return specular_anisotropy2 = base::anisotropy_conversion(
        roughness: specular_roughness*specular_roughness,
        anisotropy: specular_anisotropy,
        anisotropy_rotation: specular_rotation*.5,
        tangent_u: state::texture_tangent_u(0));
    // coat_color only affects the layers below the coat
    bsdf specular_base_layer_brdf = df::microfacet_ggx_smith_bsdf(
        roughness_u: specular_anisotropy2.roughness_u,
        roughness_v: specular_anisotropy2.roughness_v,
        tangent_u: specular_anisotropy2.tangent_u);

    bsdf upToSpec_bsdf = df::color_fresnel_layer(
        ior: color(specular_IOR),
        weight: specular*specular_color,
        layer: specular_base_layer_brdf,
        base: upToTransmission_bsdf,
        normal: normal);

    //- Metallic BRDF, Gulbrandsen parametrization
    mtlx::utilities::FresnelComplex fc =
        mtlx::utilities::artisticToConductorFresnel(
            base*base_color, specular*specular_color);
    bsdf metal_layer_brdf = df::fresnel_factor(
        ior: fc.real,
        extinction_coefficient: fc.imaginary,
        base: specular_base_layer_brdf
    );
    bsdf upToMetal_bsdf = df::weighted_layer(
        weight: metalness,
        layer: metal_layer_brdf,
        base: upToSpec_bsdf,
        normal: normal);

    //- Emission, dimmed by coat
    material_emission emission_layer = material_emission(
        emission: df::diffuse_edf(),
        intensity: emission_color*2.86*emission*
            math::lerp(color(1), coat_color, coat),
        mode: intensity_radiant_exitance);

    //- Coat BRDF
    base::anisotropy_return coat_anisotropy2 = base::anisotropy_conversion(
        roughness: coat_roughness*coat_roughness,
        anisotropy: coat_anisotropy,
        anisotropy_rotation: coat_rotation*.5,
        tangent_u: state::texture_tangent_u(0));
    bsdf coat_layer_brdf = df::microfacet_ggx_smith_bsdf(
            roughness_u: coat_anisotropy2.roughness_u,
            roughness_v: coat_anisotropy2.roughness_v,
            tangent_u: coat_anisotropy2.tangent_u);
    bsdf upToCoat_bsdf = df::weighted_layer(
        weight: coat,
        layer: df::fresnel_layer(
            ior: coat_IOR,
            layer: coat_layer_brdf,
            base: df::color_weighted_layer(
                coat_color,
                layer: upToMetal_bsdf
            ),
            normal: coat_normal
        ),
        base: upToMetal_bsdf);

    // coat_affect_roughness and coat_affect_color are not expressed

} in material(

    ior: color(1.52),

    surface: material_surface(
        scattering: upToCoat_bsdf,
        emission: emission_layer
    ),

    volume: material_volume(
        scattering: df::anisotropic_vdf(
            directional_bias: transmission_scatter_anisotropy
        ),
        absorption_coefficient: (
            color(1.0)-transmission_color)/transmission_depth,
        scattering_coefficient: transmission_scatter/transmission_depth
    ),

    geometry: material_geometry(
        displacement: alg::base::core::displacement(
            height: 0.0,
            heightScale: 0.0),
        cutout_opacity: math::luminance(opacity)
    )
);
";
