use crate::resolver::Strategy;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::Arc;

/// Something worth telling the user about while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EncodingName { name: String },
    FetchingPackage { name: String },
    RegistryFailed { name: String, error: String },
    ReadingDependencies,
    ResolvingVersions { packages: usize },
    ResolvingPackage { name: String },
    FoundVersion { name: String, version: String },
    UpToDate { name: String, strategy: Strategy },
    NoMetadata { name: String },
    NoCandidate { name: String, current: String },
    AmbiguousRewrite { name: String, current: String, candidate: String },
    Cancelled { remaining: usize },
    PackageDone { name: String },
    PersistingManifest,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::EncodingName { name } => write!(f, "URL encoding package name: '{name}'"),
            Event::FetchingPackage { name } => {
                write!(f, "Getting package info of '{name}' from registry")
            }
            Event::RegistryFailed { name, error } => {
                write!(f, "Registry request for '{name}' failed: {error}")
            }
            Event::ReadingDependencies => f.write_str("Getting dependencies of 'package.json'"),
            Event::ResolvingVersions { packages } => {
                write!(f, "Resolving versions ({packages} packages)")
            }
            Event::ResolvingPackage { name } => {
                write!(f, "Resolving version of package: '{name}'")
            }
            Event::FoundVersion { name, version } => {
                write!(f, "Found new version: '{version}' for package: '{name}'")
            }
            Event::UpToDate { name, strategy } => {
                write!(f, "Package: '{name}' is already up-to-date ({strategy})")
            }
            Event::NoMetadata { name } => {
                write!(f, "Unable to get package info of '{name}' from registry")
            }
            Event::NoCandidate { name, current } => {
                write!(f, "No published version of '{name}' matches '{current}'")
            }
            Event::AmbiguousRewrite {
                name,
                current,
                candidate,
            } => write!(
                f,
                "Cannot keep the range '{current}' of '{name}' for version '{candidate}'"
            ),
            Event::Cancelled { remaining } => {
                write!(f, "Resolution cancelled, {remaining} package(s) left untouched")
            }
            Event::PackageDone { name } => write!(f, "Done with '{name}'"),
            Event::PersistingManifest => f.write_str("Updating dependencies in 'package.json'"),
        }
    }
}

/// Sink for [`Event`]s, injected into every component that reports progress.
pub trait Diagnostics: Send + Sync {
    fn record(&self, event: &Event);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct Silent;

impl Diagnostics for Silent {
    fn record(&self, _event: &Event) {}
}

impl Silent {
    pub fn shared() -> Arc<dyn Diagnostics> {
        Arc::new(Self)
    }
}

/// Prints every event to stderr, prefixed like the rest of the verbose output.
#[derive(Debug, Default)]
pub struct Verbose;

impl Diagnostics for Verbose {
    fn record(&self, event: &Event) {
        if matches!(event, Event::PackageDone { .. }) {
            return;
        }
        eprintln!("{} {}", "[VERBOSE]".dimmed(), event);
    }
}

/// Advances a progress bar once per resolved package and forwards to `inner`.
pub struct ProgressReporter {
    bar: ProgressBar,
    inner: Arc<dyn Diagnostics>,
}

impl ProgressReporter {
    pub fn new(inner: Arc<dyn Diagnostics>) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar, inner }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Diagnostics for ProgressReporter {
    fn record(&self, event: &Event) {
        match event {
            Event::ResolvingVersions { packages } => self.bar.set_length(*packages as u64),
            Event::ResolvingPackage { name } => self.bar.set_message(format!("Checking {name}")),
            Event::PackageDone { .. } => self.bar.inc(1),
            _ => {}
        }
        // keep verbose lines from tearing the bar
        self.bar.suspend(|| self.inner.record(event));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Diagnostics, Event};
    use std::sync::Mutex;

    /// Collects events so tests can assert on what was reported.
    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn messages(&self) -> Vec<String> {
            self.events
                .lock()
                .map(|events| events.iter().map(|e| e.to_string()).collect())
                .unwrap_or_default()
        }
    }

    impl Diagnostics for Recorder {
        fn record(&self, event: &Event) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
        }
    }
}
