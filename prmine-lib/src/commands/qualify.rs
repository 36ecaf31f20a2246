use super::Host;
use super::common::{CommonArgs, Context, parse_repos};
use crate::Result;
use crate::analytics::register_project;
use crate::hosting::{AdmissionPolicy, Qualifier, Verdict};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::io::Write;

#[derive(Parser, Debug)]
pub struct QualifyArgs {
    /// Candidate repositories (format: `owner/repo` or a repository URL)
    #[arg(value_name = "REPO", required = true)]
    pub repos: Vec<String>,

    /// Lower bound on merged pull requests (overrides `admission_min`)
    #[arg(long, value_name = "N")]
    pub min: Option<u64>,

    /// Upper bound on merged pull requests (overrides `admission_max`)
    #[arg(long, value_name = "N", conflicts_with = "unbounded")]
    pub max: Option<u64>,

    /// Remove the upper bound
    #[arg(long)]
    pub unbounded: bool,

    /// Exclude repositories whose count equals the lower bound
    #[arg(long)]
    pub min_exclusive: bool,

    /// Exclude repositories whose count equals the upper bound
    #[arg(long)]
    pub max_exclusive: bool,

    /// Register admitted repositories in the projects collection
    #[arg(long)]
    pub track: bool,
}

impl QualifyArgs {
    fn policy(&self, base: AdmissionPolicy) -> AdmissionPolicy {
        AdmissionPolicy {
            min: self.min.unwrap_or(base.min),
            min_inclusive: base.min_inclusive && !self.min_exclusive,
            max: if self.unbounded { None } else { self.max.or(base.max) },
            max_inclusive: base.max_inclusive && !self.max_exclusive,
        }
    }
}

pub async fn process_qualify<H: Host>(host: &mut H, common: &CommonArgs, args: &QualifyArgs) -> Result<()> {
    let ctx = Context::new(common)?;
    let repos = parse_repos(&args.repos)?;

    let policy = args.policy(ctx.config.admission_policy());
    if !policy.is_satisfiable() {
        bail!("admission bounds {policy} do not admit any pull request count");
    }

    let qualifier = Qualifier::new(ctx.crawler()?, policy, ctx.config.max_concurrent_repos);
    let report = qualifier.qualify(repos).await;

    for (repo, verdict) in &report.verdicts {
        match verdict {
            Verdict::Admitted { merged } => {
                let _ = writeln!(host.output(), "{repo}\t{merged}");
                if args.track {
                    let _ = register_project(&ctx.store, repo).into_app_err_with(|| format!("registering project '{repo}'"))?;
                }
            }
            other => {
                let _ = writeln!(host.error(), "{repo}: {other}");
            }
        }
    }

    let _ = writeln!(
        host.error(),
        "{} of {} candidate(s) admitted with bounds {policy}",
        report.admitted().count(),
        report.verdicts.len()
    );

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> QualifyArgs {
        let mut argv = vec!["qualify", "a/b"];
        argv.extend_from_slice(extra);
        QualifyArgs::parse_from(argv)
    }

    #[test]
    fn test_policy_defaults_to_config() {
        assert_eq!(args(&[]).policy(AdmissionPolicy::default()), AdmissionPolicy::default());
    }

    #[test]
    fn test_policy_overrides() {
        let policy = args(&["--min", "5", "--max", "50", "--min-exclusive"]).policy(AdmissionPolicy::default());
        assert_eq!(
            policy,
            AdmissionPolicy {
                min: 5,
                min_inclusive: false,
                max: Some(50),
                max_inclusive: true,
            }
        );
    }

    #[test]
    fn test_policy_unbounded() {
        let policy = args(&["--unbounded", "--max-exclusive"]).policy(AdmissionPolicy::default());
        assert_eq!(policy.max, None);
        assert!(!policy.max_inclusive);
    }

    #[test]
    fn test_max_conflicts_with_unbounded() {
        assert!(QualifyArgs::try_parse_from(["qualify", "a/b", "--max", "5", "--unbounded"]).is_err());
    }
}
