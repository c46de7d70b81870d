pub mod toml_config;

pub use toml_config::SyncConfig;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "fund-sync")]
#[command(about = "Sync fund holdings into a Feishu table and tag them by name and type")]
#[command(version)]
pub struct CliConfig {
    /// Configuration file (default: fund-sync.toml when present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON logs")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log CPU and memory per phase")]
    pub monitor: bool,

    #[arg(short, long, global = true, help = "Skip the confirmation prompt")]
    pub yes: bool,

    #[arg(long, global = true, help = "Read everything, write nothing")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sync spreadsheet rows into the remote table
    Import {
        #[arg(long)]
        csv: String,
    },
    /// Tag remote records
    Tag,
    /// Tag a CSV file in place
    TagLocal {
        #[arg(long)]
        csv: String,
    },
    /// Fill fund types on remote records
    FillType,
    /// Fill fund types in a CSV file
    FillTypeLocal {
        #[arg(long)]
        csv: String,
    },
    /// Print the tags a fund name resolves to
    Match {
        #[arg(long)]
        name: String,
        #[arg(long)]
        type_code: Option<String>,
    },
}

#[cfg(feature = "cli")]
impl Command {
    pub fn csv_path(&self) -> Option<&str> {
        match self {
            Command::Import { csv }
            | Command::TagLocal { csv }
            | Command::FillTypeLocal { csv } => Some(csv),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Command::Import { .. } | Command::Tag | Command::FillType)
    }

    pub fn needs_taxonomy(&self) -> bool {
        matches!(self, Command::Tag | Command::TagLocal { .. } | Command::Match { .. })
    }

    pub fn writes(&self) -> bool {
        !matches!(self, Command::Match { .. })
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = CliConfig::try_parse_from([
            "fund-sync",
            "tag-local",
            "--csv",
            "funds.csv",
            "--yes",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.yes);
        assert!(cli.dry_run);
        assert_eq!(cli.command.csv_path(), Some("funds.csv"));
        assert!(!cli.command.is_remote());
        assert!(cli.command.needs_taxonomy());
    }

    #[test]
    fn test_parse_match() {
        let cli = CliConfig::try_parse_from([
            "fund-sync",
            "--config",
            "custom.toml",
            "match",
            "--name",
            "华夏沪深300ETF联接",
            "--type-code",
            "股票型-标准指数",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        assert!(!cli.command.writes());
        match cli.command {
            Command::Match { name, type_code } => {
                assert_eq!(name, "华夏沪深300ETF联接");
                assert_eq!(type_code.as_deref(), Some("股票型-标准指数"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_import_requires_csv() {
        assert!(CliConfig::try_parse_from(["fund-sync", "import"]).is_err());
        assert!(CliConfig::try_parse_from(["fund-sync", "fill-type"]).is_ok());
    }
}
