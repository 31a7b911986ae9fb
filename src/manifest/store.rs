use crate::diagnostics::{Diagnostics, Event};
use crate::error::ManifestError;
use crate::manifest::format::FormattingProfile;
use crate::manifest::{Dependencies, DependencySet, GroupSelector};
use crate::utils::path_validator::PathValidator;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Path(PathBuf),
    Document(String),
}

impl ManifestSource {
    /// Treats input starting with `{` as a JSON document and anything else as a path.
    pub fn detect(input: &str) -> Self {
        if input.trim_start().starts_with('{') {
            ManifestSource::Document(input.to_string())
        } else {
            ManifestSource::Path(PathBuf::from(input))
        }
    }
}

impl From<&Path> for ManifestSource {
    fn from(path: &Path) -> Self {
        ManifestSource::Path(path.to_path_buf())
    }
}

pub type CustomStepError = Box<dyn std::error::Error + Send + Sync>;

/// What `persist` should do with the retained manifest.
pub enum Persistence<'a> {
    /// Merge the present groups into the manifest and write it out.
    Merge(&'a DependencySet),
    /// Run a caller supplied step instead of the default merge and write.
    #[allow(dead_code)]
    Custom(Box<dyn FnOnce() -> Result<(), CustomStepError> + 'a>),
}

/// A loaded `package.json`, kept in memory together with its formatting.
pub struct ManifestStore {
    path: Option<PathBuf>,
    content: Map<String, Value>,
    profile: FormattingProfile,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestStore")
            .field("path", &self.path)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ManifestStore {
    #[cfg(test)]
    pub fn open(source: ManifestSource) -> Result<Self, ManifestError> {
        Self::open_with_diagnostics(source, crate::diagnostics::Silent::shared())
    }

    pub fn open_with_diagnostics(
        source: ManifestSource,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, ManifestError> {
        let (path, text) = match source {
            ManifestSource::Path(path) => {
                let canonical = PathValidator::validate_existing_manifest(&path)?;
                let text = fs::read_to_string(&canonical).map_err(|e| ManifestError::Read {
                    path: path.clone(),
                    source: e,
                })?;
                (Some(path), text)
            }
            ManifestSource::Document(text) => (None, text),
        };

        let content = match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => map,
            _ => return Err(ManifestError::NotAnObject),
        };

        Ok(Self {
            path,
            content,
            profile: FormattingProfile::detect(&text),
            diagnostics,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn profile(&self) -> &FormattingProfile {
        &self.profile
    }

    /// The groups chosen by `selector` that are present in the manifest.
    pub fn dependencies(&self, selector: GroupSelector) -> Result<DependencySet, ManifestError> {
        self.diagnostics.record(&Event::ReadingDependencies);

        let mut set = DependencySet::new();
        for &group in selector.groups() {
            let deps = match self.content.get(group.key()) {
                None | Some(Value::Null) => continue,
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(ManifestError::InvalidGroup {
                        group: group.key().to_string(),
                        reason: "expected an object".to_string(),
                    });
                }
            };

            let mut parsed = Dependencies::with_capacity(deps.len());
            for (name, spec) in deps {
                let Some(spec) = spec.as_str() else {
                    return Err(ManifestError::InvalidGroup {
                        group: group.key().to_string(),
                        reason: format!("specifier of '{name}' is not a string"),
                    });
                };
                parsed.insert(name.clone(), spec.to_string());
            }
            set.insert(group, parsed);
        }

        Ok(set)
    }

    /// Writes the manifest back, or runs the custom step in `persistence`.
    ///
    /// Groups missing from the merged set stay as they are. A set with no
    /// groups at all writes nothing.
    pub fn persist(
        &mut self,
        persistence: Persistence<'_>,
        path_override: Option<&Path>,
    ) -> Result<(), ManifestError> {
        self.diagnostics.record(&Event::PersistingManifest);

        let resolved = match persistence {
            Persistence::Custom(step) => {
                return step().map_err(|e| ManifestError::Custom(e.to_string()));
            }
            Persistence::Merge(resolved) => resolved,
        };

        if resolved.is_empty() {
            return Ok(());
        }

        let path = path_override
            .or(self.path.as_deref())
            .ok_or(ManifestError::PathRequired)?
            .to_path_buf();
        PathValidator::validate_write_target(&path)?;

        self.merge(resolved);
        let text = self.render()?;

        fs::write(&path, text).map_err(|e| ManifestError::Write { path, source: e })
    }

    /// The retained manifest rendered with the formatting it was loaded with.
    pub fn render(&self) -> Result<String, ManifestError> {
        Ok(self.profile.render(&self.content)?)
    }

    fn merge(&mut self, resolved: &DependencySet) {
        for (group, deps) in resolved.groups() {
            let map: Map<String, Value> = deps
                .iter()
                .map(|(name, spec)| (name.clone(), Value::String(spec.clone())))
                .collect();
            self.content.insert(group.key().to_string(), Value::Object(map));
        }
    }
}
