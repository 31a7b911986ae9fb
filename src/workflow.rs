use crate::diagnostics::{Diagnostics, ProgressReporter, Silent, Verbose};
use crate::error::{ConfigError, Result};
use crate::manifest::format::IndentStyle;
use crate::manifest::{GroupSelector, ManifestSource, ManifestStore, Persistence};
use crate::registry::NpmRegistry;
use crate::resolver::{Outcome, ResolutionReport, ResolveOptions, VersionResolver};
use colored::Colorize;
use std::sync::Arc;

/// Everything one `npdu` invocation needs, as given on the command line.
#[derive(Debug, Clone)]
pub struct UpdateRequest<'a> {
    pub file_path: &'a str,
    pub selector: GroupSelector,
    pub policy: &'a str,
    pub keep_range: bool,
    pub registry: &'a str,
    pub verbose: bool,
    pub dry_run: bool,
}

/// Execute the update workflow
pub fn execute_update(request: &UpdateRequest<'_>) -> Result<()> {
    println!("{}", "Starting dependency update process...".cyan().bold());

    // Step 1: Validate options before touching the manifest or the network
    println!("\n{}", "1. Validating options...".yellow());
    let options = ResolveOptions::parse(request.policy, request.keep_range)?;
    let diagnostics: Arc<dyn Diagnostics> = if request.verbose {
        Arc::new(Verbose)
    } else {
        Silent::shared()
    };
    let registry = NpmRegistry::with_diagnostics(request.registry, diagnostics.clone())
        .map_err(ConfigError::InvalidRegistry)?;

    println!(
        "   Strategy: {}, keep range: {}",
        options.strategy.to_string().bright_cyan(),
        options.keep_range
    );
    println!("   Registry: {}", registry.base_url().as_str().dimmed());
    println!("{}", "✓ Options are valid".green());

    // Step 2: Load package.json
    println!("\n{}", "2. Reading 'package.json'...".yellow());
    let mut store = ManifestStore::open_with_diagnostics(
        ManifestSource::detect(request.file_path),
        diagnostics.clone(),
    )?;
    let dependencies = store.dependencies(request.selector)?;

    let indent = store.profile().indent;
    if indent.width > 0 {
        println!(
            "   Indentation: {} {:?}",
            indent.width,
            indent.style.unwrap_or(IndentStyle::Space)
        );
    }
    println!(
        "   Found {} package(s) in {} group(s):",
        dependencies.package_count(),
        dependencies.groups().count()
    );
    for (group, deps) in dependencies.groups() {
        println!("   • {} ({})", group.to_string().bright_cyan(), deps.len());
    }

    if dependencies.package_count() == 0 {
        println!("\n{}", "No dependencies to update".yellow());
        return Ok(());
    }

    // Step 3: Resolve versions
    println!("\n{}", "3. Resolving versions...".yellow());
    let reporter = Arc::new(ProgressReporter::new(diagnostics));
    let resolver = VersionResolver::with_diagnostics(Arc::new(registry), options, reporter.clone());
    let mut report = resolver.resolve(&dependencies);
    reporter.finish();
    println!("{}", "✓ Resolution completed".green());

    print_update_report(&report);

    // Never write a guessed range
    let restored = report.restore_ambiguous();
    if restored > 0 {
        println!(
            "{}",
            format!("⚠ Kept the original specifier of {restored} package(s)").yellow()
        );
    }

    if request.dry_run {
        println!(
            "\n{}",
            "Dry run: 'package.json' was not modified".yellow()
        );
        return Ok(());
    }

    if report.is_empty() {
        println!("\n{}", "No updates were applied".yellow());
        return Ok(());
    }

    // Step 4: Persist
    println!("\n{}", "4. Updating 'package.json'...".yellow());
    if let Some(path) = store.path() {
        println!("   {}", path.display().to_string().dimmed());
    }
    store.persist(Persistence::Merge(&report.resolved), None)?;
    println!(
        "{}",
        format!("✓ {} package(s) updated", report.total_updates()).green()
    );

    println!(
        "\n{}",
        "✨ Update process completed successfully!".green().bold()
    );
    Ok(())
}

fn print_update_report(report: &ResolutionReport) {
    if report.cancelled {
        println!(
            "{}",
            "⚠ Resolution was cancelled, remaining packages were left untouched".red()
        );
    }

    for entry in report.ambiguous() {
        if let Outcome::Ambiguous {
            original,
            candidate,
        } = &entry.outcome
        {
            println!(
                "{}",
                format!(
                    "⚠ Cannot keep the range '{}' of '{}' for version '{}'",
                    original, entry.name, candidate
                )
                .yellow()
            );
        }
    }

    let unresolved = report.count(|o| matches!(o, Outcome::NoMetadata));
    if unresolved > 0 {
        println!(
            "{}",
            format!("   {unresolved} package(s) could not be fetched from the registry").dimmed()
        );
    }

    if report.is_empty() {
        println!("\n{}", "✨ All dependencies are up to date!".green().bold());
        return;
    }

    println!("\n{}", "📦 Updates:".cyan().bold());
    println!(
        "{}",
        format!("Found {} update(s)", report.total_updates()).yellow()
    );
    for (name, old, new) in report.updates() {
        println!(
            "  • {} {} → {}",
            name.white().bold(),
            old.red(),
            new.green().bold()
        );
    }

    let up_to_date = report.count(|o| matches!(o, Outcome::UpToDate));
    if up_to_date > 0 {
        println!(
            "{}",
            format!("   ({up_to_date} already up to date)").dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NpduError;
    use std::fs;
    use tempfile::tempdir;

    fn request<'a>(file_path: &'a str, policy: &'a str, registry: &'a str) -> UpdateRequest<'a> {
        UpdateRequest {
            file_path,
            selector: GroupSelector::All,
            policy,
            keep_range: true,
            registry,
            verbose: false,
            dry_run: false,
        }
    }

    #[test]
    fn unknown_policy_fails_before_reading_the_manifest() {
        let err = execute_update(&request(
            "/does/not/exist/package.json",
            "bogus",
            "https://registry.npmjs.org",
        ))
        .unwrap_err();

        assert!(matches!(
            err,
            NpduError::Config(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn malformed_registry_is_a_configuration_error() {
        let err = execute_update(&request(
            "/does/not/exist/package.json",
            "semver",
            "ftp://registry.example",
        ))
        .unwrap_err();

        assert!(matches!(
            err,
            NpduError::Config(ConfigError::InvalidRegistry(_))
        ));
        assert!(err.to_string().starts_with("Invalid argument: 'registry'"));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("package.json");
        let path = path.to_string_lossy();

        let err = execute_update(&request(&path, "semver", "https://registry.npmjs.org"))
            .unwrap_err();
        assert!(err.to_string().starts_with("File not found"));
    }

    #[test]
    fn manifest_without_dependencies_is_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("package.json");
        let original = "{\n  \"name\": \"demo\",\n  \"dependencies\": {}\n}\n";
        fs::write(&path, original).unwrap();
        let path_str = path.to_string_lossy();

        execute_update(&request(&path_str, "semver", "https://registry.npmjs.org")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }
}
