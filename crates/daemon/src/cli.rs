//! Command-line interface for fanwatchd.
//!
//! Provides the `watch` and `guard` commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fanwatchd - fanotify file access monitor and guard
#[derive(Debug, Parser)]
#[command(name = "fanwatchd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "FANWATCHD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "FANWATCHD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Read buffer size in bytes
    #[arg(short, long, global = true)]
    pub buffer_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log files as they are accessed
    Watch {
        /// Paths to mark (in addition to those in the config file)
        paths: Vec<PathBuf>,

        /// Mark the whole mount containing each path
        #[arg(short, long)]
        mount: bool,

        /// Events to report, comma separated (open, access, modify, close, ...)
        #[arg(short, long, value_delimiter = ',')]
        events: Vec<String>,
    },

    /// Answer open permission requests on the given paths
    Guard {
        /// Paths to guard (in addition to those in the config file)
        paths: Vec<PathBuf>,

        /// Mark the whole mount containing each path
        #[arg(short, long)]
        mount: bool,

        /// Uids whose processes are allowed access (repeatable)
        #[arg(short = 'u', long = "allow-uid")]
        allow_uids: Vec<u32>,

        /// Verdict for everybody else (allow or deny)
        #[arg(long)]
        default_verdict: Option<String>,

        /// Ask the kernel to audit each decision
        #[arg(long)]
        audit: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_watch() {
        let cli = Cli::parse_from(["fanwatchd", "watch", "/srv"]);
        match cli.command {
            Command::Watch {
                paths,
                mount,
                events,
            } => {
                assert_eq!(paths, vec![PathBuf::from("/srv")]);
                assert!(!mount);
                assert!(events.is_empty());
            }
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn test_cli_parse_watch_with_events() {
        let cli = Cli::parse_from([
            "fanwatchd",
            "watch",
            "--mount",
            "--events",
            "open,close_write",
            "/",
        ]);
        match cli.command {
            Command::Watch { mount, events, .. } => {
                assert!(mount);
                assert_eq!(events, vec!["open".to_string(), "close_write".to_string()]);
            }
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn test_cli_parse_guard() {
        let cli = Cli::parse_from([
            "fanwatchd",
            "--log-level",
            "debug",
            "guard",
            "/etc/shadow",
            "-u",
            "0",
            "--allow-uid",
            "1000",
            "--audit",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Guard {
                paths,
                allow_uids,
                audit,
                default_verdict,
                ..
            } => {
                assert_eq!(paths, vec![PathBuf::from("/etc/shadow")]);
                assert_eq!(allow_uids, vec![0, 1000]);
                assert!(audit);
                assert!(default_verdict.is_none());
            }
            _ => panic!("expected Guard command"),
        }
    }
}
