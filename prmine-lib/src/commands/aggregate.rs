use super::Host;
use super::common::{CommonArgs, Context, parse_repos};
use crate::Result;
use crate::analytics::{aggregate_project, distinct_projects};
use crate::hosting::RepoSpec;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Projects to aggregate (default is every project with stored pull requests)
    #[arg(value_name = "PROJECT")]
    pub projects: Vec<String>,
}

pub fn process_aggregate<H: Host>(host: &mut H, common: &CommonArgs, args: &AggregateArgs) -> Result<()> {
    let ctx = Context::new(common)?;

    let projects: Vec<RepoSpec> = if args.projects.is_empty() {
        let names = distinct_projects(&ctx.store).into_app_err("listing stored projects")?;
        parse_repos(&names)?
    } else {
        let mut projects = parse_repos(&args.projects)?;
        projects.sort();
        projects.dedup();
        projects
    };

    if projects.is_empty() {
        let _ = writeln!(host.error(), "No stored pull requests to aggregate");
        return Ok(());
    }

    let mut failed = 0;
    for repo in &projects {
        match aggregate_project(&ctx.store, repo, ctx.config.periods) {
            Ok(aggregate) => {
                let _ = writeln!(
                    host.output(),
                    "{repo}: {} pull request(s), {} submitter(s), average merge time {}s",
                    aggregate.amount_of_pull_requests,
                    aggregate.distinct_submitters(),
                    aggregate.average_pull_request_merge_time
                );
            }
            Err(e) => {
                failed += 1;
                let _ = writeln!(host.error(), "{repo}: aggregation failed: {e}");
            }
        }
    }

    if failed == projects.len() {
        let _ = writeln!(host.error(), "All {failed} aggregation(s) failed");
        host.exit(1);
    }

    Ok(())
}
