use super::Host;
use super::common::{CommonArgs, Context, parse_repos};
use crate::Result;
use crate::analytics::tracked_repositories;
use crate::hosting::RepoSpec;
use crate::store::insert_pull_requests;
use clap::Parser;
use futures_util::{StreamExt, stream};
use ohno::{IntoAppError, bail};
use std::collections::HashSet;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    /// Repositories to crawl (format: `owner/repo` or a repository URL)
    #[arg(value_name = "REPO")]
    pub repos: Vec<String>,

    /// Also crawl every repository registered in the projects collection
    #[arg(long)]
    pub tracked: bool,

    /// Store the records of a crawl that failed part-way instead of discarding them
    #[arg(long)]
    pub keep_partial: bool,
}

pub async fn process_crawl<H: Host>(host: &mut H, common: &CommonArgs, args: &CrawlArgs) -> Result<()> {
    let ctx = Context::new(common)?;

    let mut repos = parse_repos(&args.repos)?;
    if args.tracked {
        repos.extend(tracked_repositories(&ctx.store)?);
    }

    let mut seen = HashSet::new();
    repos.retain(|repo: &RepoSpec| seen.insert(repo.clone()));

    if repos.is_empty() {
        bail!("no repositories to crawl: name at least one or pass --tracked");
    }

    let crawler = ctx.crawler()?;
    let outcomes = stream::iter(repos)
        .map(|repo| {
            let crawler = &crawler;
            async move {
                let outcome = crawler.collect(&repo).await;
                (repo, outcome)
            }
        })
        .buffered(ctx.config.max_concurrent_repos)
        .collect::<Vec<_>>()
        .await;

    let total = outcomes.len();
    let mut failed = 0;

    for (repo, outcome) in outcomes {
        let keep = outcome.is_complete() || args.keep_partial;
        let stored = if keep {
            insert_pull_requests(&ctx.store, &outcome.records).into_app_err_with(|| format!("storing pull requests of '{repo}'"))?
        } else {
            0
        };

        match &outcome.error {
            None => {
                let _ = writeln!(host.output(), "{repo}: stored {stored} merged pull request(s)");
            }
            Some(e) => {
                failed += 1;
                let partial = if keep { "kept" } else { "discarded" };
                let _ = writeln!(
                    host.error(),
                    "{repo}: crawl failed after {} record(s), {partial}: {e}",
                    outcome.records.len()
                );
            }
        }
    }

    if failed == total {
        let _ = writeln!(host.error(), "All {total} crawl(s) failed");
        host.exit(1);
    }

    Ok(())
}
