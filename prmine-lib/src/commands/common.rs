//! Setup shared by every command: logging, data directory, configuration, and store.

use super::config::Config;
use crate::Result;
use crate::hosting::{Crawler, RepoSpec};
use crate::store::JsonLinesStore;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (default is `prmine.toml` in the data directory)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the record store and configuration
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<Utf8PathBuf>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Resolved environment for a command run
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub store: JsonLinesStore,
    github_token: Option<String>,
}

impl Context {
    /// Initialize logging, then resolve the data directory, configuration, and store.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let data_dir = resolve_data_dir(args.data_dir.as_deref())?;
        let config = Config::load(&data_dir, args.config.as_ref())?;
        let store = JsonLinesStore::open(data_dir.as_std_path()).into_app_err_with(|| format!("opening record store in '{data_dir}'"))?;

        log::debug!("Using data directory '{data_dir}'");

        Ok(Self {
            config,
            store,
            github_token: args.github_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Build a crawler from the loaded configuration.
    pub fn crawler(&self) -> Result<Crawler> {
        Crawler::new(&self.config.crawler_config(), self.github_token.as_deref())
    }
}

/// Data directory: the explicit path, or `prmine` under the platform data directory
pub fn resolve_data_dir(explicit: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let base = BaseDirs::new().into_app_err("could not determine data directory")?;
    Utf8PathBuf::try_from(base.data_dir().join("prmine")).into_app_err("data directory path is not valid UTF-8")
}

/// Parse repository arguments, reporting every invalid one at once.
///
/// Repositories hosted anywhere but GitHub are rejected, since only the GitHub API is crawled.
pub fn parse_repos<'a>(inputs: impl IntoIterator<Item = &'a String>) -> Result<Vec<RepoSpec>> {
    let mut repos = Vec::new();
    let mut invalid = Vec::new();

    for input in inputs {
        match RepoSpec::parse(input) {
            Ok(repo) if repo.is_github() => repos.push(repo),
            Ok(repo) => invalid.push(format!("unsupported host '{}' in '{input}': only github.com repositories can be crawled", repo.host())),
            Err(e) => invalid.push(e.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(app_err!("{}", invalid.join("\n")));
    }

    Ok(repos)
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A logger may already be installed when commands run more than once in a process
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
