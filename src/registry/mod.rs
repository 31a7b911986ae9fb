use crate::error::RegistryError;
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

pub mod npm;
pub use npm::NpmRegistry;

/// The registry's view of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: Option<String>,
    /// Every published version, in registry order.
    #[serde(default, deserialize_with = "deserialize_versions")]
    pub versions: Option<Vec<String>>,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PackageMetadata {
    /// The `latest` dist-tag, if the registry published one.
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags
            .as_ref()
            .and_then(|tags| tags.get("latest"))
            .map(String::as_str)
    }

    /// Registry-side failure reported inside an otherwise valid document.
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().or(self.reason.as_deref())
    }

    /// Known versions, empty when the registry did not list any.
    pub fn known_versions(&self) -> &[String] {
        self.versions.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionList {
    Keyed(IndexMap<String, IgnoredAny>),
    Plain(Vec<String>),
}

/// Registries key `versions` by version string; fixtures often use a plain array.
fn deserialize_versions<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Option::<VersionList>::deserialize(deserializer)?;
    Ok(list.map(|list| match list {
        VersionList::Keyed(map) => map.into_keys().collect(),
        VersionList::Plain(versions) => versions,
    }))
}

/// Source of package metadata. One call per package name, no caching.
pub trait RegistryClient: Send + Sync {
    fn fetch(&self, package_name: &str) -> Result<PackageMetadata, RegistryError>;
}

/// Percent-encodes a package name for use as a registry path.
///
/// For scoped names (`@scope/name`) only the part after the first `/` is
/// encoded so the `@scope/` prefix reaches the registry untouched.
pub fn encode_package_name(name: &str) -> String {
    if name.starts_with('@') {
        if let Some((scope, rest)) = name.split_once('/') {
            return format!("{scope}/{}", urlencoding::encode(rest));
        }
        return format!("@{}", urlencoding::encode(&name[1..]));
    }
    urlencoding::encode(name).into_owned()
}
