//! Command-line interface and orchestration for prmine
//!
//! Each command resolves a [`common::Context`] (logging, data directory, configuration
//! and record store) and then drives the library:
//!
//! - **crawl**: crawl repositories and append their merged pull requests to the store
//! - **qualify**: check candidate repositories against the admission bounds
//! - **aggregate**: recompute project aggregates from stored pull requests
//! - **show**: print a stored project aggregate
//! - **init**: write the default configuration file
//!
//! Configuration is a TOML file (`prmine.toml` in the data directory unless `--config` is
//! given); the GitHub token only ever comes from `--github-token` or `GITHUB_TOKEN`.

mod aggregate;
mod common;
mod config;
mod crawl;
mod host;
mod init;
mod qualify;
mod run;
mod show;

pub use aggregate::{AggregateArgs, process_aggregate};
pub use common::{CommonArgs, Context, LogLevel};
pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_CONFIG_TOML};
pub use crawl::{CrawlArgs, process_crawl};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use qualify::{QualifyArgs, process_qualify};
pub use run::run;
pub use show::{ShowArgs, process_show};
