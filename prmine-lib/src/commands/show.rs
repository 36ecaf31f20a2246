use super::Host;
use super::common::{CommonArgs, Context};
use crate::Result;
use crate::analytics::find_project;
use crate::hosting::RepoSpec;
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Project whose stored aggregate to print (format: `owner/repo` or a repository URL)
    #[arg(value_name = "PROJECT")]
    pub project: RepoSpec,
}

pub fn process_show<H: Host>(host: &mut H, common: &CommonArgs, args: &ShowArgs) -> Result<()> {
    let ctx = Context::new(common)?;
    let repo = &args.project;

    let Some(doc) = find_project(&ctx.store, repo).into_app_err_with(|| format!("reading project '{repo}'"))? else {
        bail!("no project document stored for '{repo}'; run `prmine aggregate {repo}` first");
    };

    let text = serde_json::to_string_pretty(&doc).into_app_err("formatting project document")?;
    let _ = writeln!(host.output(), "{text}");
    Ok(())
}
