use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "review-portal",
    about = "Respond to reviewer comments on an agreement document"
)]
pub struct Cli {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Path to the config file. Defaults to $XDG_CONFIG_HOME/review-portal/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Document to review (e.g., "mydoc-1234").
    #[arg(short, long, global = true)]
    pub document_id: Option<String>,

    /// Portal link carrying a `documentId` query parameter. `--document-id` wins.
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Reviewer name. Overrides `reviewer_name` from the config.
    #[arg(short, long, global = true)]
    pub name: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Open the interactive review portal (default).
    Review,
    /// Print each comment and whether its passage resolves in the document.
    Status,
    /// List the reference keys found in the document.
    Anchors,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_command() {
        let cli = Cli::try_parse_from(["review-portal", "--document-id", "lease-1"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.target.document_id.as_deref(), Some("lease-1"));
    }

    #[test]
    fn flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "review-portal",
            "status",
            "--url",
            "https://portal.example.com/?documentId=lease-1",
            "--name",
            "Jane",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Status));
        assert!(cli.target.url.is_some());
        assert_eq!(cli.target.name.as_deref(), Some("Jane"));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Cli::try_parse_from(["review-portal", "approve"]).is_err());
    }
}
