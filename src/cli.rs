use crate::manifest::GroupSelector;
use crate::registry::npm::DEFAULT_REGISTRY;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "npdu",
    about = "npm package dependency updater - bumps the version specifiers in package.json",
    version,
    author
)]
pub struct Cli {
    /// Path to the package.json file
    #[arg(short, long, default_value = "./package.json", global = true)]
    pub file_path: String,

    /// Keep the comparators of each specifier (^, ~, >=, ...) when rewriting it
    #[arg(short, long, default_value_t = true, action = ArgAction::Set, global = true)]
    pub keep_range: bool,

    /// Version policy: "semver" stays within the current range, "latest" follows the latest tag
    #[arg(short, long, default_value = "semver", global = true)]
    pub policy: String,

    /// Base URL of the npm registry
    #[arg(short, long, default_value = DEFAULT_REGISTRY, global = true)]
    pub registry: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Resolve and print updates without modifying package.json
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Update every dependency group
    All,
    /// Update "dependencies"
    Prod,
    /// Update "devDependencies"
    Dev,
    /// Update "peerDependencies"
    Peer,
    /// Update "optionalDependencies"
    Optional,
}

impl Commands {
    pub fn selector(self) -> GroupSelector {
        match self {
            Commands::All => GroupSelector::All,
            Commands::Prod => GroupSelector::Prod,
            Commands::Dev => GroupSelector::Dev,
            Commands::Peer => GroupSelector::Peer,
            Commands::Optional => GroupSelector::Optional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_npm_registry_and_semver() {
        let cli = Cli::try_parse_from(["npdu", "all"]).unwrap();
        assert_eq!(cli.file_path, "./package.json");
        assert!(cli.keep_range);
        assert_eq!(cli.policy, "semver");
        assert_eq!(cli.registry, "https://registry.npmjs.org");
        assert!(!cli.dry_run);
        assert_eq!(cli.command.selector(), GroupSelector::All);
    }

    #[test]
    fn parses_options_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "npdu", "dev", "-k", "false", "-p", "latest", "-f", "app/package.json", "--dry-run",
        ])
        .unwrap();
        assert!(!cli.keep_range);
        assert_eq!(cli.policy, "latest");
        assert_eq!(cli.file_path, "app/package.json");
        assert!(cli.dry_run);
        assert_eq!(cli.command.selector(), GroupSelector::Dev);
    }

    #[test]
    fn unknown_group_is_rejected() {
        assert!(Cli::try_parse_from(["npdu", "test"]).is_err());
    }
}
