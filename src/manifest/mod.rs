use crate::error::ConfigError;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

pub mod format;
pub mod store;

pub use store::{ManifestSource, ManifestStore, Persistence};

/// Package name → version specifier, in manifest order.
pub type Dependencies = IndexMap<String, String>;

/// One of the dependency maps a `package.json` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyGroup {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyGroup {
    /// Fixed iteration order used everywhere groups are walked.
    pub const ALL: [DependencyGroup; 4] = [
        DependencyGroup::Dependencies,
        DependencyGroup::DevDependencies,
        DependencyGroup::PeerDependencies,
        DependencyGroup::OptionalDependencies,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DependencyGroup::Dependencies => "dependencies",
            DependencyGroup::DevDependencies => "devDependencies",
            DependencyGroup::PeerDependencies => "peerDependencies",
            DependencyGroup::OptionalDependencies => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which groups a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSelector {
    All,
    Prod,
    Dev,
    Peer,
    Optional,
}

impl GroupSelector {
    pub fn groups(self) -> &'static [DependencyGroup] {
        match self {
            GroupSelector::All => &DependencyGroup::ALL,
            GroupSelector::Prod => &[DependencyGroup::Dependencies],
            GroupSelector::Dev => &[DependencyGroup::DevDependencies],
            GroupSelector::Peer => &[DependencyGroup::PeerDependencies],
            GroupSelector::Optional => &[DependencyGroup::OptionalDependencies],
        }
    }
}

impl FromStr for GroupSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(GroupSelector::All),
            "prod" => Ok(GroupSelector::Prod),
            "dev" => Ok(GroupSelector::Dev),
            "peer" => Ok(GroupSelector::Peer),
            "optional" => Ok(GroupSelector::Optional),
            other => Err(ConfigError::UnknownGroup(other.to_string())),
        }
    }
}

/// The dependency groups of one manifest. Absent groups are simply not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    groups: Vec<(DependencyGroup, Dependencies)>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `group`, keeping the fixed group order regardless of insertion order.
    pub fn insert(&mut self, group: DependencyGroup, dependencies: Dependencies) {
        if let Some(slot) = self.get_mut(group) {
            *slot = dependencies;
            return;
        }
        self.groups.push((group, dependencies));
        self.groups
            .sort_by_key(|(g, _)| DependencyGroup::ALL.iter().position(|known| known == g));
    }

    pub fn get_mut(&mut self, group: DependencyGroup) -> Option<&mut Dependencies> {
        self.groups
            .iter_mut()
            .find(|(g, _)| *g == group)
            .map(|(_, deps)| deps)
    }

    pub fn groups(&self) -> impl Iterator<Item = (DependencyGroup, &Dependencies)> {
        self.groups.iter().map(|(g, deps)| (*g, deps))
    }

    /// True when no group is present at all. A present but empty group counts.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn package_count(&self) -> usize {
        self.groups.iter().map(|(_, deps)| deps.len()).sum()
    }

    /// Every package once, first occurrence wins for the specifier.
    pub fn aggregate(&self) -> Dependencies {
        let mut merged = Dependencies::new();
        for (_, deps) in &self.groups {
            for (name, spec) in deps {
                merged
                    .entry(name.clone())
                    .or_insert_with(|| spec.clone());
            }
        }
        merged
    }

    /// Writes `spec` for `name` into every group that lists the package.
    pub fn apply(&mut self, name: &str, spec: &str) {
        for (_, deps) in &mut self.groups {
            if let Some(current) = deps.get_mut(name) {
                *current = spec.to_string();
            }
        }
    }
}

#[cfg(test)]
impl DependencySet {
    pub fn with_group(mut self, group: DependencyGroup, dependencies: Dependencies) -> Self {
        self.insert(group, dependencies);
        self
    }

    pub fn get(&self, group: DependencyGroup) -> Option<&Dependencies> {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, deps)| deps)
    }

    /// The specifier `name` currently has, from the first group listing it.
    pub fn specifier(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find_map(|(_, deps)| deps.get(name))
            .map(String::as_str)
    }
}
