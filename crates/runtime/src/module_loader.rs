//! Resolves dotted module names against a search path and decides, per
//! `load(dotted-name, origin)` (§4.6), whether to serve a compiled artifact
//! or force a recompile from source.

use crate::error::{RuntimeError, RuntimeResult};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Force recompilation from source, ignoring any compiled artifact.
    Source,
    /// Prefer a compiled artifact if it is fresher than the source file.
    Latest,
}

/// A module located on the search path, with both possible origins resolved
/// to concrete filesystem paths (the artifact path may not exist).
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub name: String,
    pub source_path: PathBuf,
    pub artifact_path: PathBuf,
}

pub struct ModuleLoader {
    search_paths: Vec<PathBuf>,
    source_extension: String,
    artifact_extension: String,
    /// Whether this target can JIT-compile at all. Constrained cross-compile
    /// targets set this false, which silently downgrades `Latest` to
    /// `Source` per §4.6.
    can_jit: bool,
}

/// Converts a dotted module name to a path per §6 "Module format": dots
/// become path separators, hyphens become underscores.
pub fn dotted_to_path(dotted_name: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in dotted_name.split('.') {
        path.push(segment.replace('-', "_"));
    }
    path
}

impl ModuleLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        ModuleLoader {
            search_paths,
            source_extension: "dlg".to_string(),
            artifact_extension: "o".to_string(),
            can_jit: true,
        }
    }

    pub fn with_extensions(mut self, source: impl Into<String>, artifact: impl Into<String>) -> Self {
        self.source_extension = source.into();
        self.artifact_extension = artifact.into();
        self
    }

    /// Mark this loader as running on a target that cannot JIT-compile
    /// (e.g. a constrained cross-compile target), forcing every `Latest`
    /// request down to `Source`.
    pub fn without_jit(mut self) -> Self {
        self.can_jit = false;
        self
    }

    /// Search the configured roots leaves-first (later entries shadow
    /// earlier ones) for `dotted_name`, returning the first root under which
    /// a source file exists.
    pub fn resolve(&self, dotted_name: &str) -> RuntimeResult<ResolvedModule> {
        let relative = dotted_to_path(dotted_name);
        for root in self.search_paths.iter().rev() {
            let source_path = root.join(&relative).with_extension(&self.source_extension);
            if source_path.exists() {
                let artifact_path = root.join(&relative).with_extension(&self.artifact_extension);
                return Ok(ResolvedModule {
                    name: dotted_name.to_string(),
                    source_path,
                    artifact_path,
                });
            }
        }
        Err(RuntimeError::ModuleNotFound {
            name: dotted_name.to_string(),
            searched: self.search_paths.clone(),
        })
    }

    /// Decide the effective origin for a load of `dotted_name`, applying
    /// the `latest`-prefers-artifact-if-fresher rule and the constrained-
    /// target downgrade.
    pub fn effective_origin(
        &self,
        module: &ResolvedModule,
        requested: LoadOrigin,
    ) -> LoadOrigin {
        match requested {
            LoadOrigin::Source => LoadOrigin::Source,
            LoadOrigin::Latest => {
                if !self.can_jit {
                    return LoadOrigin::Source;
                }
                if artifact_is_fresher(&module.source_path, &module.artifact_path) {
                    LoadOrigin::Latest
                } else {
                    LoadOrigin::Source
                }
            }
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

fn artifact_is_fresher(source_path: &Path, artifact_path: &Path) -> bool {
    match (mtime(source_path), mtime(artifact_path)) {
        (Some(src), Some(art)) => art >= src,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_name_maps_dots_to_separators_and_hyphens_to_underscores() {
        let path = dotted_to_path("a.b-c.d");
        assert_eq!(path, PathBuf::from("a").join("b_c").join("d"));
    }

    #[test]
    fn source_origin_is_never_upgraded() {
        let loader = ModuleLoader::new(vec![PathBuf::from("/tmp")]);
        let module = ResolvedModule {
            name: "a.b".into(),
            source_path: PathBuf::from("/tmp/a/b.dlg"),
            artifact_path: PathBuf::from("/tmp/a/b.o"),
        };
        assert_eq!(loader.effective_origin(&module, LoadOrigin::Source), LoadOrigin::Source);
    }

    #[test]
    fn latest_downgrades_to_source_without_jit_capability() {
        let loader = ModuleLoader::new(vec![PathBuf::from("/tmp")]).without_jit();
        let module = ResolvedModule {
            name: "a.b".into(),
            source_path: PathBuf::from("/tmp/a/b.dlg"),
            artifact_path: PathBuf::from("/tmp/a/b.o"),
        };
        assert_eq!(loader.effective_origin(&module, LoadOrigin::Latest), LoadOrigin::Source);
    }

    #[test]
    fn resolve_searches_roots_leaves_first() {
        let dir = tempfile::tempdir().unwrap();
        let shadowed_root = dir.path().join("base");
        let shadowing_root = dir.path().join("overlay");
        std::fs::create_dir_all(&shadowed_root).unwrap();
        std::fs::create_dir_all(&shadowing_root).unwrap();
        std::fs::write(shadowed_root.join("a.dlg"), "; base").unwrap();
        std::fs::write(shadowing_root.join("a.dlg"), "; overlay").unwrap();

        let loader = ModuleLoader::new(vec![shadowed_root.clone(), shadowing_root.clone()]);
        let resolved = loader.resolve("a").unwrap();
        assert_eq!(resolved.source_path, shadowing_root.join("a.dlg"));
    }

    #[test]
    fn unresolvable_module_reports_searched_roots() {
        let loader = ModuleLoader::new(vec![PathBuf::from("/does/not/exist")]);
        let err = loader.resolve("missing.module").unwrap_err();
        match err {
            RuntimeError::ModuleNotFound { name, searched } => {
                assert_eq!(name, "missing.module");
                assert_eq!(searched.len(), 1);
            }
            other => panic!("expected ModuleNotFound, got {other:?}"),
        }
    }
}
