//! # Incremental Module Builder
//!
//! Regenerates MDL library modules only when the MaterialX documents they
//! were generated from change. Every artifact starts with a
//! `// SRC_DOC_HASH <digest>` line recording the source hash it was built
//! from.

use crate::codegen::{generate_shared_module, MdlLibraryGenerator};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::modules::{read_artifact_hash, ModuleResolver};
use std::path::{Path, PathBuf};

pub const ARTIFACT_EXTENSION: &str = "mdl";

/// What a build request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The artifact already matches the sources and was left untouched
    Skipped {
        module: String,
        artifact: PathBuf,
        digest: String,
    },
    /// The artifact was (re)generated and written
    Rebuilt {
        module: String,
        artifact: PathBuf,
        digest: String,
        warnings: Vec<String>,
    },
}

impl BuildOutcome {
    pub fn module(&self) -> &str {
        match self {
            BuildOutcome::Skipped { module, .. } | BuildOutcome::Rebuilt { module, .. } => module,
        }
    }

    pub fn artifact(&self) -> &Path {
        match self {
            BuildOutcome::Skipped { artifact, .. } | BuildOutcome::Rebuilt { artifact, .. } => artifact,
        }
    }

    pub fn was_rebuilt(&self) -> bool {
        matches!(self, BuildOutcome::Rebuilt { .. })
    }
}

/// Writes generated modules below an output root laid out like the MDL
/// namespace: module `fruit/apple` lands in `<root>/fruit/apple.mdl`
pub struct IncrementalModuleBuilder<'a> {
    resolver: &'a ModuleResolver,
    config: &'a GeneratorConfig,
    output_root: PathBuf,
}

impl<'a> IncrementalModuleBuilder<'a> {
    pub fn new(resolver: &'a ModuleResolver, config: &'a GeneratorConfig, output_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            config,
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn artifact_path(&self, module: &str) -> PathBuf {
        self.output_root.join(format!("{}.{}", module, ARTIFACT_EXTENSION))
    }

    /// Regenerate `module` unless its artifact records the current source hash.
    ///
    /// Hashing requires the module to have source documents; a module
    /// missing from the search path fails here.
    pub fn build_if_changed(&self, module: &str) -> Result<BuildOutcome> {
        let artifact = self.artifact_path(module);
        let recorded = read_artifact_hash(&artifact)?;
        let digest = self.resolver.content_hash(module)?;

        match recorded {
            Some(previous) if previous == digest => {
                tracing::info!("[build] Hash matching for module {}, keeping", module);
                Ok(BuildOutcome::Skipped {
                    module: module.to_string(),
                    artifact,
                    digest,
                })
            }
            Some(previous) => {
                tracing::info!(
                    "[build] Hash mismatch for module {} old:{}, new:{}, rebuilding",
                    module,
                    previous,
                    digest
                );
                self.rebuild(module, digest)
            }
            None => {
                tracing::info!("[build] Module {} missing, building", module);
                self.rebuild(module, digest)
            }
        }
    }

    /// Regenerate `module` regardless of the recorded hash
    pub fn force_rebuild(&self, module: &str) -> Result<BuildOutcome> {
        let digest = self.resolver.content_hash(module)?;
        self.rebuild(module, digest)
    }

    fn rebuild(&self, module: &str, digest: String) -> Result<BuildOutcome> {
        let generated = MdlLibraryGenerator::new(self.resolver, self.config).generate_module(module)?;
        let artifact = self.artifact_path(module);
        write_file(&artifact, &generated.artifact(&digest))?;
        tracing::info!("[build] Wrote {}", artifact.display());
        Ok(BuildOutcome::Rebuilt {
            module: module.to_string(),
            artifact,
            digest,
            warnings: generated.warnings,
        })
    }

    /// Write the shared proxy module. It carries no hash and is always
    /// regenerated.
    pub fn write_shared_module(&self) -> Result<PathBuf> {
        let path = self.artifact_path(&self.config.shared_module);
        write_file(&path, &generate_shared_module())?;
        tracing::info!("[build] Wrote shared module {}", path.display());
        Ok(path)
    }

    /// Write the shared module, then bring every listed module up to date
    pub fn rebuild_modules<S: AsRef<str>>(&self, modules: &[S]) -> Result<Vec<BuildOutcome>> {
        self.write_shared_module()?;
        modules
            .iter()
            .map(|module| self.build_if_changed(module.as_ref()))
            .collect()
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchPath;

    #[test]
    fn test_artifact_paths_follow_module_layout() {
        let resolver = ModuleResolver::new(SearchPath::default());
        let config = GeneratorConfig::default();
        let builder = IncrementalModuleBuilder::new(&resolver, &config, "/out/mtlx");
        assert_eq!(builder.artifact_path("stdlib"), PathBuf::from("/out/mtlx/stdlib.mdl"));
        assert_eq!(
            builder.artifact_path("fruit/apple"),
            PathBuf::from("/out/mtlx/fruit/apple.mdl")
        );
    }

    #[test]
    fn test_missing_module_fails_to_build() {
        let resolver = ModuleResolver::new(SearchPath::new(["/nonexistent/mdlmtlx/search"]));
        let config = GeneratorConfig::default();
        let builder = IncrementalModuleBuilder::new(&resolver, &config, std::env::temp_dir().join("mdlmtlx_unused"));
        let err = builder.build_if_changed("stdlib").unwrap_err();
        assert!(matches!(err, Error::Module(_)));
    }
}
