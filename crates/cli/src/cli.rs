use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pilot::TabPurpose;

#[derive(Parser, Debug)]
#[command(name = "pilot")]
#[command(about = "Drive a remote chat application over its debugging protocol")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Remote debugging port of the host process
    #[arg(short, long, global = true, default_value_t = 9222, env = "PILOT_PORT")]
    pub port: u16,

    /// URL fragment identifying the primary application (repeatable)
    #[arg(long = "app-url", global = true, value_name = "PATTERN")]
    pub app_urls: Vec<String>,

    /// Explicit host executable used for launch and recovery
    #[arg(long, global = true, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach to a target (best available when omitted)
    Connect {
        /// Target id from `pilot tabs list`
        target: Option<String>,
    },

    /// Submit a prompt and poll until the task completes
    Ask {
        /// Prompt text
        prompt: String,
        /// Ceiling on total polling time, in seconds
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,
    },

    /// Perform one status read
    Status,

    /// Keep polling an already-running task
    Wait {
        /// Ceiling on total polling time, in seconds
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,
    },

    /// Trigger the remote stop affordance (does not disconnect)
    Stop,

    /// Tab registry operations
    Tabs {
        #[command(subcommand)]
        action: TabsAction,
    },

    /// Navigate the attached tab
    #[command(alias = "nav")]
    Navigate {
        /// Target URL
        url: String,
    },

    /// Screenshot the attached tab
    #[command(alias = "ss")]
    Screenshot {
        /// Output file path
        #[arg(short, long, default_value = "screenshot.png")]
        output: PathBuf,
    },

    /// Inject local files into a file input
    Upload {
        /// CSS selector of the file input
        selector: String,
        /// Files to inject
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TabsAction {
    /// List external tabs
    List,
    /// Open a new tab
    Open {
        /// URL for the new tab
        url: String,
    },
    /// Close an external tab (rejected when it is the last one)
    Close {
        /// Target id
        id: String,
    },
    /// Annotate a tab's purpose
    Purpose {
        /// Target id
        id: String,
        /// New purpose
        #[arg(value_enum)]
        purpose: CliTabPurpose,
        /// Owning task id
        #[arg(long)]
        task: Option<String>,
    },
}

/// Tab purpose (clap-compatible enum)
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliTabPurpose {
    Primary,
    AutonomousBrowsing,
    Research,
    Unclassified,
}

impl From<CliTabPurpose> for TabPurpose {
    fn from(p: CliTabPurpose) -> Self {
        match p {
            CliTabPurpose::Primary => TabPurpose::Primary,
            CliTabPurpose::AutonomousBrowsing => TabPurpose::AutonomousBrowsing,
            CliTabPurpose::Research => TabPurpose::Research,
            CliTabPurpose::Unclassified => TabPurpose::Unclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ask_with_timeout() {
        let cli = Cli::try_parse_from(["pilot", "ask", "compare prices", "-t", "120"]).unwrap();
        match cli.command {
            Commands::Ask { prompt, timeout } => {
                assert_eq!(prompt, "compare prices");
                assert_eq!(timeout, 120);
            }
            _ => panic!("expected Ask command"),
        }
    }

    #[test]
    fn parse_ask_default_timeout() {
        let cli = Cli::try_parse_from(["pilot", "ask", "hello"]).unwrap();
        match cli.command {
            Commands::Ask { timeout, .. } => assert_eq!(timeout, 300),
            _ => panic!("expected Ask command"),
        }
    }

    #[test]
    fn parse_tabs_close() {
        let cli = Cli::try_parse_from(["pilot", "tabs", "close", "AB12"]).unwrap();
        match cli.command {
            Commands::Tabs {
                action: TabsAction::Close { id },
            } => assert_eq!(id, "AB12"),
            _ => panic!("expected Tabs Close command"),
        }
    }

    #[test]
    fn parse_tabs_purpose() {
        let cli = Cli::try_parse_from([
            "pilot", "tabs", "purpose", "AB12", "research", "--task", "t-7",
        ])
        .unwrap();
        match cli.command {
            Commands::Tabs {
                action: TabsAction::Purpose { id, purpose, task },
            } => {
                assert_eq!(id, "AB12");
                assert!(matches!(purpose, CliTabPurpose::Research));
                assert_eq!(task.as_deref(), Some("t-7"));
            }
            _ => panic!("expected Tabs Purpose command"),
        }
    }

    #[test]
    fn parse_global_port_and_app_url() {
        let cli = Cli::try_parse_from([
            "pilot",
            "--port",
            "9333",
            "--app-url",
            "chat.example",
            "status",
        ])
        .unwrap();
        assert_eq!(cli.port, 9333);
        assert_eq!(cli.app_urls, vec!["chat.example".to_string()]);
    }

    #[test]
    fn parse_upload_requires_files() {
        assert!(Cli::try_parse_from(["pilot", "upload", "input[type=file]"]).is_err());
        let cli =
            Cli::try_parse_from(["pilot", "upload", "input[type=file]", "a.pdf", "b.pdf"]).unwrap();
        match cli.command {
            Commands::Upload { files, .. } => assert_eq!(files.len(), 2),
            _ => panic!("expected Upload command"),
        }
    }

    #[test]
    fn invalid_command_fails() {
        assert!(Cli::try_parse_from(["pilot", "frobnicate"]).is_err());
    }
}
