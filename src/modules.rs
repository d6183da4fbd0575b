//! # Module Resolution
//!
//! A MaterialX module is every `.mtlx` document directly inside a directory
//! below one of the search path roots; `fruit/apple/*.mtlx` is the module
//! `fruit/apple`. Its generated MDL counterpart lives in the namespace
//! `mtlx::fruit::apple`.

use crate::config::SearchPath;
use crate::document::{module_of_uri, xml, Document};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DOCUMENT_EXTENSION: &str = "mtlx";

const NAMESPACE_ROOT: &str = "mdl";
const NAMESPACE_MARKER: &str = "mtlx";
const HASH_TAG: &str = "SRC_DOC_HASH";

/// Module path of a qualified host node name.
///
/// `mdl::mtlx::stdlib::add_float(float,float)` resolves to `stdlib`.
pub fn module_path_from_qualified_name(name: &str) -> Result<String> {
    let function = name.split('(').next().unwrap_or_default();
    let segments: Vec<&str> = function.split("::").collect();
    if segments.len() < 4 || segments[0] != NAMESPACE_ROOT || segments[1] != NAMESPACE_MARKER {
        return Err(Error::Module(format!(
            "Type: {} is not in a supported namespace for materialx conversion",
            name
        )));
    }
    Ok(segments[2..segments.len() - 1].join("/"))
}

/// MDL namespace of a module path, empty for the empty module
pub fn mdl_namespace_for_module(module: &str) -> String {
    if module.is_empty() {
        return String::new();
    }
    format!("{}::{}", NAMESPACE_MARKER, module.split('/').collect::<Vec<_>>().join("::"))
}

/// MDL namespace of the module an element was imported from
pub fn mdl_namespace_for_uri(source_uri: &str) -> String {
    mdl_namespace_for_module(module_of_uri(&consistent_path(source_uri)))
}

/// Directory below an MDL root that holds the generated `mtlx` namespace
pub fn artifact_root(mdl_root: &Path) -> PathBuf {
    mdl_root.join(NAMESPACE_MARKER)
}

/// Forward-slash separated form of a path
pub fn consistent_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Header line embedding the source hash in a generated artifact
pub fn hash_header_line(digest: &str) -> String {
    format!("// {} {}\n", HASH_TAG, digest)
}

/// Recorded hash of a header line, if it has exactly the expected shape
pub fn parse_hash_header(line: &str) -> Option<String> {
    let components: Vec<&str> = line.split(' ').collect();
    match components.as_slice() {
        ["//", tag, digest] if *tag == HASH_TAG => {
            let digest = digest.trim_end_matches(|c| c == '\r' || c == '\n');
            (!digest.is_empty()).then(|| digest.to_string())
        }
        _ => None,
    }
}

/// Recorded hash of a previously generated artifact; `None` if the file
/// is missing or carries no hash header.
pub fn read_artifact_hash(path: &Path) -> Result<Option<String>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|e| Error::io(path, e))?;
    Ok(parse_hash_header(&first_line))
}

/// A module document found on the search path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleFile {
    /// Include-relative path, e.g. `stdlib/stdlib_defs.mtlx`
    pub relative: String,
    pub absolute: PathBuf,
}

/// Resolves modules against an ordered search path
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    search_path: SearchPath,
}

impl ModuleResolver {
    pub fn new(search_path: SearchPath) -> Self {
        Self { search_path }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Documents of `module`, first search path wins per relative path,
    /// sorted by relative path.
    pub fn discover_module_files(&self, module: &str) -> Vec<ModuleFile> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();
        for root in self.search_path.iter() {
            let dir = root.join(module);
            let entries = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file());
            for entry in entries {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy();
                let relative = if module.is_empty() {
                    file_name.to_string()
                } else {
                    format!("{}/{}", consistent_path(module), file_name)
                };
                if seen.insert(relative.clone()) {
                    files.push(ModuleFile {
                        relative,
                        absolute: path.to_path_buf(),
                    });
                }
            }
        }
        files.sort();
        files
    }

    /// Import every document of `module` into `doc` as library content.
    ///
    /// Elements whose names already exist are skipped. A module without
    /// documents contributes nothing.
    pub fn load_module(&self, module: &str, doc: &mut Document) -> Result<usize> {
        let files = self.discover_module_files(module);
        if files.is_empty() {
            tracing::debug!("[modules] Module '{}' not found on search path", module);
        }
        let mut merged = 0;
        for file in files {
            let library = xml::read_from_file(&file.absolute)?;
            merged += doc.import_skip_conflicting(library, &file.relative);
        }
        tracing::debug!("[modules] Imported {} elements from '{}'", merged, module);
        Ok(merged)
    }

    /// Read every document of `module` into `doc` as local content
    pub fn read_module(&self, module: &str, doc: &mut Document) -> Result<usize> {
        let mut merged = 0;
        for file in self.discover_module_files(module) {
            let source = xml::read_from_file(&file.absolute)?;
            merged += doc.merge_skip_conflicting(source);
        }
        Ok(merged)
    }

    /// SHA-256 over the raw bytes of the module documents in sorted order.
    ///
    /// Unlike loading, a module without documents is an error here.
    pub fn content_hash(&self, module: &str) -> Result<String> {
        let files = self.discover_module_files(module);
        if files.is_empty() {
            return Err(Error::Module(format!(
                "Can't find source documents for module '{}' when hashing contents",
                module
            )));
        }
        let mut hasher = Sha256::new();
        for file in &files {
            let bytes = std::fs::read(&file.absolute).map_err(|e| Error::io(&file.absolute, e))?;
            hasher.update(&bytes);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Every directory on the search path holding at least one document,
    /// sorted and de-duplicated.
    pub fn all_modules(&self) -> Vec<String> {
        let mut modules = BTreeSet::new();
        for root in self.search_path.iter() {
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file()
                    || entry.path().extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION)
                {
                    continue;
                }
                let Some(parent) = entry.path().parent() else {
                    continue;
                };
                let Ok(relative) = parent.strip_prefix(root) else {
                    continue;
                };
                let module = consistent_path(&relative.to_string_lossy());
                if !module.is_empty() {
                    modules.insert(module);
                }
            }
        }
        modules.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mdlmtlx_modules_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    const DEFS: &str = r#"<?xml version="1.0"?>
<materialx version="1.37">
  <nodedef name="ND_circle" node="circle" type="float" />
</materialx>
"#;

    #[test]
    fn test_module_path_from_qualified_name() {
        assert_eq!(
            module_path_from_qualified_name("mdl::mtlx::stdlib::add_float(float,float)").unwrap(),
            "stdlib"
        );
        assert_eq!(
            module_path_from_qualified_name("mdl::mtlx::fruit::apple::peel(float)").unwrap(),
            "fruit/apple"
        );
        assert!(matches!(
            module_path_from_qualified_name("mdl::mtlx::add(float)"),
            Err(Error::Module(_))
        ));
        assert!(matches!(
            module_path_from_qualified_name("mdl::base::x::y(float)"),
            Err(Error::Module(_))
        ));
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(mdl_namespace_for_module("fruit/apple"), "mtlx::fruit::apple");
        assert_eq!(mdl_namespace_for_module(""), "");
        assert_eq!(mdl_namespace_for_uri("stdlib/stdlib_defs.mtlx"), "mtlx::stdlib");
        assert_eq!(mdl_namespace_for_uri(""), "");
    }

    #[test]
    fn test_hash_header_parsing() {
        assert_eq!(parse_hash_header("// SRC_DOC_HASH abc123\n").as_deref(), Some("abc123"));
        assert_eq!(parse_hash_header(&hash_header_line("ff")).as_deref(), Some("ff"));
        assert_eq!(parse_hash_header("// SRC_DOC_HASH"), None);
        assert_eq!(parse_hash_header("mdl 1.4;"), None);
        assert_eq!(parse_hash_header("// OTHER abc"), None);
    }

    #[test]
    fn test_first_search_path_shadows_later_ones() {
        let dir = scratch("shadow");
        let first = dir.join("first");
        let second = dir.join("second");
        write(&first.join("shapes/defs.mtlx"), DEFS);
        write(&second.join("shapes/defs.mtlx"), "<materialx/>");
        write(&second.join("shapes/extra.mtlx"), DEFS.replace("ND_circle", "ND_square").as_str());
        write(&second.join("shapes/readme.txt"), "not a document");

        let resolver = ModuleResolver::new(SearchPath::new([&first, &second]));
        let files = resolver.discover_module_files("shapes");
        let relative: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(relative, vec!["shapes/defs.mtlx", "shapes/extra.mtlx"]);
        assert!(files[0].absolute.starts_with(&first));

        let mut doc = Document::new();
        assert_eq!(resolver.load_module("shapes", &mut doc).unwrap(), 2);
        assert_eq!(doc.node_def("ND_circle").unwrap().source_uri, "shapes/defs.mtlx");
        assert!(doc.contains_module("shapes"));

        assert_eq!(resolver.all_modules(), vec!["shapes".to_string()]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_content_hash_ignores_search_path_order() {
        let dir = scratch("order");
        let first = dir.join("first");
        let second = dir.join("second");
        write(&first.join("shapes/b.mtlx"), DEFS);
        write(&second.join("shapes/a.mtlx"), "<materialx/>");

        let forward = ModuleResolver::new(SearchPath::new([&first, &second]));
        let backward = ModuleResolver::new(SearchPath::new([&second, &first]));
        let digest = forward.content_hash("shapes").unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(backward.content_hash("shapes").unwrap(), digest);

        write(&second.join("shapes/a.mtlx"), "<materialx />");
        assert_ne!(forward.content_hash("shapes").unwrap(), digest);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_module_loads_empty_but_fails_to_hash() {
        let dir = scratch("missing");
        let resolver = ModuleResolver::new(SearchPath::new([&dir]));
        let mut doc = Document::new();
        assert_eq!(resolver.load_module("nothing", &mut doc).unwrap(), 0);
        assert!(matches!(resolver.content_hash("nothing"), Err(Error::Module(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
