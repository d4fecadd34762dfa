use clap::Parser;
use std::time::Duration;

use crate::io::{Credentials, HttpOptions};
use crate::zip::{ArchiveOptions, FetchStrategy};

#[derive(Parser, Debug)]
#[command(name = "pinch")]
#[command(version)]
#[command(about = "Fetch single entries from remote ZIP archives using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  pinch -l https://example.com/archive.zip             list entries of a remote ZIP\n  \
  pinch -p https://example.com/archive.zip data.json   stream data.json to stdout\n  \
  pinch --length https://example.com/archive.zip       print the archive size")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Entries to extract
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List entry names
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (sizes, ratio, dates)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Print the archive size in bytes
    #[arg(long)]
    pub length: bool,

    /// Stream entries to stdout, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// HTTP Basic authentication user
    #[arg(short = 'u', long = "user", value_name = "USER")]
    pub user: Option<String>,

    /// HTTP Basic authentication password
    #[arg(long, env = "PINCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Fetch header and payload in one padded request instead of two exact ones
    #[arg(long)]
    pub single_range: bool,

    /// Tail bytes searched for the end of central directory record
    #[arg(long, value_name = "BYTES", default_value_t = crate::zip::eocd::DEFAULT_EOCD_WINDOW)]
    pub eocd_window: u64,

    /// Widen the search when the record is not in the tail window
    #[arg(long)]
    pub widen_eocd: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Retries after a timeout or connection error (0 means one attempt)
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub max_retries: u32,

    /// Redirects followed per request
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub max_redirects: u32,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Log every range request to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.archive.starts_with("http://") || self.archive.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            eocd_window: self.eocd_window,
            widen_eocd_search: self.widen_eocd,
            fetch_strategy: if self.single_range {
                FetchStrategy::SingleRange
            } else {
                FetchStrategy::TwoPhase
            },
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            max_redirects: self.max_redirects,
            credentials: self.user.as_ref().map(|username| Credentials {
                username: username.clone(),
                password: self.password.clone(),
            }),
            ..Default::default()
        }
    }

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "pinch=debug"
        } else if self.is_very_quiet() {
            "error"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_flags_to_options() {
        let cli = Cli::parse_from([
            "pinch",
            "--single-range",
            "--widen-eocd",
            "--eocd-window",
            "8192",
            "-u",
            "pinch_test",
            "--password",
            "secret",
            "https://example.com/a.zip",
            "data.json",
        ]);
        assert!(cli.is_http_url());
        assert_eq!(cli.entries, vec!["data.json"]);

        let archive = cli.archive_options();
        assert_eq!(archive.fetch_strategy, FetchStrategy::SingleRange);
        assert_eq!(archive.eocd_window, 8192);
        assert!(archive.widen_eocd_search);

        let http = cli.http_options();
        assert_eq!(
            http.credentials,
            Some(Credentials {
                username: "pinch_test".into(),
                password: Some("secret".into()),
            })
        );
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["pinch", "archive.zip"]);
        assert!(!cli.is_http_url());
        assert_eq!(cli.archive_options(), ArchiveOptions::default());
        assert!(cli.http_options().credentials.is_none());
        assert_eq!(cli.log_filter(), "warn");
    }
}
