/// Source locating and loading.
///
/// A bare source name maps to `<name>.hlml` under the configured include
/// directories, first match wins. In-memory entries take precedence over the
/// filesystem so the checker and the test suite can run without touching
/// disk. Reading is synchronous; this is the only I/O in the pipeline apart
/// from the artifact dumps.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Result};
use crate::source::Source;

pub const SOURCE_EXTENSION: &str = "hlml";

pub struct Loader {
    include_dirs: Vec<PathBuf>,
    overrides: HashMap<String, String>,
}

impl Loader {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Loader {
            include_dirs,
            overrides: HashMap::new(),
        }
    }

    /// Register an in-memory source; shadows any file of the same name.
    pub fn add_virtual(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.overrides.insert(name.into(), contents.into());
    }

    pub fn load(&self, name: &str) -> Result<Arc<Source>> {
        if let Some(contents) = self.overrides.get(name) {
            let path = PathBuf::from(format!("{}.{}", name, SOURCE_EXTENSION));
            return Ok(Source::new(name, path, contents.clone()));
        }
        for directory in &self.include_dirs {
            let path = directory.join(format!("{}.{}", name, SOURCE_EXTENSION));
            if path.is_file() {
                let contents = std::fs::read_to_string(&path).map_err(|cause| {
                    Diagnostic::named(
                        name,
                        DiagnosticKind::IoFailure {
                            operation: "read",
                            path: path.display().to_string(),
                            cause: cause.to_string(),
                        },
                    )
                })?;
                return Ok(Source::new(name, path, contents));
            }
        }
        Err(Diagnostic::named(
            name,
            DiagnosticKind::IoFailure {
                operation: "locate",
                path: format!("{}.{}", name, SOURCE_EXTENSION),
                cause: "not found under the include directories".to_string(),
            },
        ))
    }

    /// Every `.hlml` file under the include directories, as bare target
    /// names, in discovery order with duplicates dropped.
    pub fn discover_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        for directory in &self.include_dirs {
            for entry in WalkDir::new(directory)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
            {
                let path = entry.path();
                if path.extension().and_then(|extension| extension.to_str())
                    != Some(SOURCE_EXTENSION)
                {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    if !targets.iter().any(|known| known == stem) {
                        targets.push(stem.to_string());
                    }
                }
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_sources_shadow_the_filesystem() {
        let mut loader = Loader::new(vec![]);
        loader.add_virtual("t", "entrypoint { }");
        let source = loader.load("t").unwrap();
        assert_eq!(source.contents, "entrypoint { }");
        assert_eq!(source.name, "t");
    }

    #[test]
    fn missing_source_is_an_io_failure() {
        let loader = Loader::new(vec![]);
        let diagnostic = loader.load("nowhere").unwrap_err();
        assert!(matches!(diagnostic.kind, DiagnosticKind::IoFailure { .. }));
        assert_eq!(
            diagnostic.to_string(),
            "nowhere: error: could not locate 'nowhere.hlml': not found under the include directories"
        );
    }
}
