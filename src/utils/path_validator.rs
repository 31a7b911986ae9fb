use crate::error::ManifestError;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "package.json";

const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Path checks applied before a manifest is read or written.
pub struct PathValidator;

impl PathValidator {
    /// Only files literally named `package.json` are accepted.
    pub fn validate_manifest_name(path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        match path.file_name().and_then(|name| name.to_str()) {
            Some(MANIFEST_FILE_NAME) => Ok(()),
            _ => Err(ManifestError::Unsupported(path.to_path_buf())),
        }
    }

    /// Validates a manifest that is about to be read and returns its canonical path.
    pub fn validate_existing_manifest(path: impl AsRef<Path>) -> Result<PathBuf, ManifestError> {
        let path = path.as_ref();
        Self::validate_manifest_name(path)?;

        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }

        let canonical = path.canonicalize().map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        if !canonical.is_file() {
            return Err(ManifestError::Read {
                path: canonical.clone(),
                source: std::io::Error::other("not a regular file"),
            });
        }

        Ok(canonical)
    }

    /// Refuses to write into system directories.
    pub fn validate_write_target(path: impl AsRef<Path>) -> Result<(), ManifestError> {
        let path = path.as_ref();
        Self::validate_manifest_name(path)?;

        let resolved = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .and_then(|parent| parent.canonicalize().ok())
            .map(|parent| parent.join(MANIFEST_FILE_NAME));

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            let inside = path.starts_with(forbidden_path)
                || resolved
                    .as_ref()
                    .is_some_and(|resolved| resolved.starts_with(forbidden_path));

            if inside {
                return Err(ManifestError::Write {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("writing into system directory '{forbidden}' is not allowed"),
                    ),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn accepts_only_package_json_names() {
        assert!(PathValidator::validate_manifest_name("./package.json").is_ok());
        let err = PathValidator::validate_manifest_name("./package.test.json").unwrap_err();
        assert!(matches!(err, ManifestError::Unsupported(_)));
        assert!(err.to_string().contains("Only 'package.json' files are supported"));
    }

    #[test]
    fn existing_manifest_must_be_present() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("package.json");
        let err = PathValidator::validate_existing_manifest(&missing).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));

        fs::write(&missing, "{}").unwrap();
        assert!(PathValidator::validate_existing_manifest(&missing).is_ok());
    }

    #[test]
    fn directory_named_like_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        let fake = dir.path().join("package.json");
        fs::create_dir(&fake).unwrap();
        let err = PathValidator::validate_existing_manifest(&fake).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn refuses_system_directories() {
        assert!(PathValidator::validate_write_target("/etc/package.json").is_err());
        let dir = tempdir().unwrap();
        assert!(PathValidator::validate_write_target(dir.path().join("package.json")).is_ok());
    }
}
