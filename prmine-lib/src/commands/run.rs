//! Command dispatch logic for prmine

use super::{
    AggregateArgs, CommonArgs, CrawlArgs, InitArgs, QualifyArgs, ShowArgs, init_config, process_aggregate, process_crawl, process_qualify,
    process_show,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "prmine", version, author, long_about = None)]
#[command(about = "Mine merged pull-request history and derive contributor analytics")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl merged pull requests and store them
    Crawl(CrawlArgs),
    /// Check candidate repositories against the admission bounds
    Qualify(QualifyArgs),
    /// Recompute project aggregates from stored pull requests
    Aggregate(AggregateArgs),
    /// Print the stored aggregate of a project
    Show(ShowArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        Command::Crawl(crawl_args) => process_crawl(host, &cli.common, crawl_args).await,
        Command::Qualify(qualify_args) => process_qualify(host, &cli.common, qualify_args).await,
        Command::Aggregate(aggregate_args) => process_aggregate(host, &cli.common, aggregate_args),
        Command::Show(show_args) => process_show(host, &cli.common, show_args),
        Command::Init(init_args) => init_config(host, &cli.common, init_args),
    }
}
