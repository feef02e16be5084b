//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! Global flags available on every command:
//! - `--cwd <path>`: run as if started in that directory
//! - `--debug`: enable debug logging
//! - `--quiet` / `-q`: minimal output

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// gitweave - meta-repository checkout, reset and cherry-pick
#[derive(Parser, Debug)]
#[command(name = "gw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gw was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check out a commit across the meta repository and its open submodules
    Checkout {
        /// Branch, tag, remote branch or commit to check out
        committish: Option<String>,

        /// Create a new branch and switch to it
        #[arg(short = 'b', long = "branch", value_name = "NAME")]
        new_branch: Option<String>,

        /// Configure the branch to track its starting point
        #[arg(short = 't', long)]
        track: bool,

        /// Discard local changes instead of failing on them
        #[arg(short, long)]
        force: bool,
    },

    /// Reset the meta repository, propagating hard resets into open submodules
    Reset {
        /// Target committish
        committish: String,

        /// Move the ref only; index and working tree untouched
        #[arg(long, conflicts_with_all = ["mixed", "hard"])]
        soft: bool,

        /// Move the ref and reset the index (the default)
        #[arg(long, conflicts_with = "hard")]
        mixed: bool,

        /// Also reset working trees, discarding local changes in the meta
        /// repository and in moved open submodules
        #[arg(long)]
        hard: bool,

        /// Restrict the reset to these paths (index only; paths may reach
        /// into open submodules)
        #[arg(last = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Replay a commit onto HEAD, cherry-picking into changed submodules
    #[command(name = "cherry-pick")]
    CherryPick {
        /// The commit to replay (must have exactly one parent)
        committish: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_checkout_flags() {
        let cli = Cli::try_parse_from(["gw", "checkout", "origin/feature", "-t"]).unwrap();
        match cli.command {
            Command::Checkout {
                committish,
                new_branch,
                track,
                force,
            } => {
                assert_eq!(committish.as_deref(), Some("origin/feature"));
                assert!(new_branch.is_none());
                assert!(track);
                assert!(!force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn reset_flags_conflict() {
        assert!(Cli::try_parse_from(["gw", "reset", "--soft", "--hard", "HEAD~1"]).is_err());
    }

    #[test]
    fn reset_paths_after_separator() {
        let cli = Cli::try_parse_from(["gw", "reset", "HEAD", "--", "a.txt", "sub/b.txt"]).unwrap();
        match cli.command {
            Command::Reset { paths, .. } => assert_eq!(paths.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
