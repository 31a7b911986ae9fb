use crate::diagnostics::{Diagnostics, Event};
use crate::error::ConfigError;
use crate::manifest::DependencySet;
use crate::registry::{PackageMetadata, RegistryClient};
use node_semver::{Range, Version};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod range;

/// How a candidate version is chosen for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Highest published version admitted by the current specifier.
    Semver,
    /// Whatever the registry tags as `latest`.
    Latest,
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semver" => Ok(Strategy::Semver),
            "latest" => Ok(Strategy::Latest),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Semver => f.write_str("semver"),
            Strategy::Latest => f.write_str("latest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub strategy: Strategy,
    pub keep_range: bool,
}

impl ResolveOptions {
    /// Validates the raw strategy name before any resolver is built.
    pub fn parse(strategy: &str, keep_range: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            strategy: strategy.parse()?,
            keep_range,
        })
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Semver,
            keep_range: true,
        }
    }
}

/// What happened to one package during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated { from: String, to: String },
    UpToDate,
    /// Fetch failed or the registry reported an error for this package.
    NoMetadata,
    /// Metadata was usable but offered no candidate version.
    NoCandidate,
    /// A candidate exists but the current range could not be rewritten to it.
    Ambiguous { original: String, candidate: String },
    /// Left alone because the run was cancelled first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub name: String,
    pub outcome: Outcome,
}

/// Resolved dependencies plus a per-package account of how they got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolved: DependencySet,
    pub outcomes: Vec<PackageOutcome>,
    pub cancelled: bool,
}

impl ResolutionReport {
    pub fn updates(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Updated { from, to } => Some((o.name.as_str(), from.as_str(), to.as_str())),
            _ => None,
        })
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Ambiguous { .. }))
    }

    pub fn total_updates(&self) -> usize {
        self.updates().count()
    }

    pub fn is_empty(&self) -> bool {
        self.total_updates() == 0
    }

    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.outcome)).count()
    }

    /// Puts the original specifier back for every ambiguous package and
    /// returns how many were restored.
    pub fn restore_ambiguous(&mut self) -> usize {
        let mut restored = 0;
        for entry in &self.outcomes {
            if let Outcome::Ambiguous { original, .. } = &entry.outcome {
                self.resolved.apply(&entry.name, original);
                restored += 1;
            }
        }
        restored
    }
}

/// Resolves new specifiers for every package of a [`DependencySet`].
///
/// Packages are processed one at a time. A registry failure only ever affects
/// the package it happened for.
pub struct VersionResolver {
    registry: Arc<dyn RegistryClient>,
    options: ResolveOptions,
    diagnostics: Arc<dyn Diagnostics>,
}

impl VersionResolver {
    #[cfg(test)]
    pub fn new(registry: Arc<dyn RegistryClient>, options: ResolveOptions) -> Self {
        Self::with_diagnostics(registry, options, crate::diagnostics::Silent::shared())
    }

    pub fn with_diagnostics(
        registry: Arc<dyn RegistryClient>,
        options: ResolveOptions,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry,
            options,
            diagnostics,
        }
    }

    pub fn resolve(&self, set: &DependencySet) -> ResolutionReport {
        self.resolve_cancellable(set, &AtomicBool::new(false))
    }

    /// Like [`resolve`](Self::resolve), but stops between packages once
    /// `cancel` is set. Packages not reached keep their current specifier.
    pub fn resolve_cancellable(&self, set: &DependencySet, cancel: &AtomicBool) -> ResolutionReport {
        let aggregate = set.aggregate();
        let mut resolved = set.clone();
        let mut outcomes = Vec::with_capacity(aggregate.len());
        let mut cancelled = false;

        self.diagnostics.record(&Event::ResolvingVersions {
            packages: aggregate.len(),
        });

        for (index, (name, current)) in aggregate.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                if !cancelled {
                    cancelled = true;
                    self.diagnostics.record(&Event::Cancelled {
                        remaining: aggregate.len() - index,
                    });
                }
                outcomes.push(PackageOutcome {
                    name: name.clone(),
                    outcome: Outcome::Skipped,
                });
                continue;
            }

            self.diagnostics.record(&Event::ResolvingPackage { name: name.clone() });
            let (specifier, outcome) = self.resolve_package(name, current);
            resolved.apply(name, &specifier);
            outcomes.push(PackageOutcome {
                name: name.clone(),
                outcome,
            });
            self.diagnostics.record(&Event::PackageDone { name: name.clone() });
        }

        ResolutionReport {
            resolved,
            outcomes,
            cancelled,
        }
    }

    /// New specifier for one package, plus what happened.
    fn resolve_package(&self, name: &str, current: &str) -> (String, Outcome) {
        let unchanged = |outcome| (current.to_string(), outcome);

        let metadata = match self.registry.fetch(name) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.diagnostics.record(&Event::RegistryFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                self.diagnostics
                    .record(&Event::NoMetadata { name: name.to_string() });
                return unchanged(Outcome::NoMetadata);
            }
        };

        if let Some(reason) = metadata.failure() {
            self.diagnostics.record(&Event::RegistryFailed {
                name: name.to_string(),
                error: reason.to_string(),
            });
            self.diagnostics
                .record(&Event::NoMetadata { name: name.to_string() });
            return unchanged(Outcome::NoMetadata);
        }

        let Some(candidate) = self.candidate(&metadata, current) else {
            self.diagnostics.record(&Event::NoCandidate {
                name: name.to_string(),
                current: current.to_string(),
            });
            return unchanged(Outcome::NoCandidate);
        };

        let up_to_date = Event::UpToDate {
            name: name.to_string(),
            strategy: self.options.strategy,
        };

        if let (Some(pinned), Some(found)) =
            (range::normalize(current), range::parse_version(&candidate))
        {
            if pinned == found {
                self.diagnostics.record(&up_to_date);
                return unchanged(Outcome::UpToDate);
            }
        }

        let specifier = if self.options.keep_range {
            range::preserve_range(current, &candidate).unwrap_or_default()
        } else {
            candidate.clone()
        };

        if specifier == current {
            self.diagnostics.record(&up_to_date);
            return unchanged(Outcome::UpToDate);
        }

        if specifier.is_empty() {
            self.diagnostics.record(&Event::AmbiguousRewrite {
                name: name.to_string(),
                current: current.to_string(),
                candidate: candidate.clone(),
            });
            return (
                specifier,
                Outcome::Ambiguous {
                    original: current.to_string(),
                    candidate,
                },
            );
        }

        self.diagnostics.record(&Event::FoundVersion {
            name: name.to_string(),
            version: candidate,
        });
        (
            specifier.clone(),
            Outcome::Updated {
                from: current.to_string(),
                to: specifier,
            },
        )
    }

    fn candidate(&self, metadata: &PackageMetadata, current: &str) -> Option<String> {
        match self.options.strategy {
            Strategy::Latest => metadata.latest().map(str::to_string),
            Strategy::Semver => max_satisfying(metadata.known_versions(), current),
        }
    }
}

/// Highest of `versions` admitted by `specifier`, in its original spelling.
pub fn max_satisfying(versions: &[String], specifier: &str) -> Option<String> {
    let range = Range::parse(specifier.trim()).ok()?;
    versions
        .iter()
        .filter_map(|raw| Version::parse(raw).ok().map(|version| (version, raw)))
        .filter(|(version, _)| range.satisfies(version))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone())
}
