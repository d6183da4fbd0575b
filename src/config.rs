//! # Configuration
//!
//! JSON configuration for the module tooling and the command line driver.
//!
//! String values may contain `${NAME}` patterns that are substituted from a
//! caller supplied map before deserialization. Object keys starting with
//! `_comment` are dropped.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configured MaterialX search paths
pub const SEARCH_PATH_ENV: &str = "MATERIALX_SEARCH_PATH";

pub const SEARCH_PATH_SEPARATOR: char = ';';

/// Ordered list of MaterialX library roots, earliest wins on conflicts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    paths: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `;`-separated path list, ignoring empty entries
    pub fn parse(joined: &str) -> Self {
        Self::new(
            joined
                .split(SEARCH_PATH_SEPARATOR)
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        )
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(SEARCH_PATH_ENV)
            .ok()
            .map(|value| Self::parse(&value))
            .filter(|sp| !sp.is_empty())
    }

    pub fn join(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(&SEARCH_PATH_SEPARATOR.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialXConfig {
    #[serde(default)]
    pub search_paths: Vec<String>,
    #[serde(default = "default_std_modules")]
    pub std_modules: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_mdl_output")]
    pub mdl_output: String,
    /// Filename values are made relative to this directory when set
    #[serde(default)]
    pub resource_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_shared_module")]
    pub shared_module: String,
    /// Abort module generation on the first omitted node
    #[serde(default)]
    pub exception_on_omissions: bool,
    #[serde(default = "default_author")]
    pub author: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub materialx: MaterialXConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

fn default_std_modules() -> Vec<String> {
    vec!["stdlib".to_string(), "bxdf".to_string(), "alglib".to_string()]
}

fn default_mdl_output() -> String {
    "mdl".to_string()
}

fn default_shared_module() -> String {
    "shared".to_string()
}

fn default_author() -> String {
    "Allegorithmic".to_string()
}

impl Default for MaterialXConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            std_modules: default_std_modules(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            mdl_output: default_mdl_output(),
            resource_root: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shared_module: default_shared_module(),
            exception_on_omissions: false,
            author: default_author(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            materialx: MaterialXConfig::default(),
            paths: PathsConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration text, substituting `patterns` in every string value
    pub fn from_json_str(text: &str, patterns: &BTreeMap<String, String>) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        let resolved = resolve_patterns(raw, patterns);
        let config: Config = serde_json::from_value(resolved)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path, patterns: &BTreeMap<String, String>) -> Result<Self> {
        tracing::info!("[config] Loading {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text, patterns).map_err(|e| match e {
            Error::Json(json) => Error::Config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                json
            )),
            other => other,
        })
    }

    fn check(&self) -> Result<()> {
        if self.generator.shared_module.trim().is_empty() {
            return Err(Error::Config(
                "generator.shared_module must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Search paths from `MATERIALX_SEARCH_PATH` if set, else the configured ones
    pub fn search_path(&self) -> SearchPath {
        match SearchPath::from_env() {
            Some(from_env) => {
                tracing::debug!("[config] Using {} from environment", SEARCH_PATH_ENV);
                from_env
            }
            None => SearchPath::new(self.materialx.search_paths.iter()),
        }
    }

    pub fn mdl_output(&self) -> PathBuf {
        PathBuf::from(&self.paths.mdl_output)
    }

    pub fn resource_root(&self) -> Option<PathBuf> {
        self.paths.resource_root.as_ref().map(PathBuf::from)
    }
}

fn resolve_patterns(value: Value, patterns: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) => {
            let mut resolved = s;
            for (key, replacement) in patterns {
                resolved = resolved.replace(&format!("${{{}}}", key), replacement);
            }
            Value::String(resolved)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| resolve_patterns(v, patterns))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !k.starts_with("_comment"))
                .map(|(k, v)| (k, resolve_patterns(v, patterns)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_patterns() {
        let mut patterns = BTreeMap::new();
        patterns.insert("PLUGIN_ROOT".to_string(), "/opt/plugin".to_string());

        let text = r#"{
            "_comment": "ignored",
            "materialx": {
                "search_paths": ["${PLUGIN_ROOT}/mtlx", "/usr/share/mtlx"]
            },
            "generator": { "exception_on_omissions": true }
        }"#;
        let config = Config::from_json_str(text, &patterns).unwrap();

        assert_eq!(
            config.materialx.search_paths,
            vec!["/opt/plugin/mtlx".to_string(), "/usr/share/mtlx".to_string()]
        );
        assert_eq!(config.materialx.std_modules, vec!["stdlib", "bxdf", "alglib"]);
        assert_eq!(config.generator.shared_module, "shared");
        assert!(config.generator.exception_on_omissions);
        assert_eq!(config.paths.mdl_output, "mdl");
        assert!(config.resource_root().is_none());
    }

    #[test]
    fn test_empty_shared_module_rejected() {
        let text = r#"{ "generator": { "shared_module": "" } }"#;
        let result = Config::from_json_str(text, &BTreeMap::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_search_path_parse_and_join() {
        let sp = SearchPath::parse("a;;b ; c");
        assert_eq!(sp.len(), 3);
        assert_eq!(sp.join(), "a;b;c");
    }
}
