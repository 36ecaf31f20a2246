use crate::Result;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::{IntoAppError, bail};
use regex::Regex;
use std::sync::Arc;
use url::Url;

const DEFAULT_HOST: &str = "github.com";

/// A normalized repository identifier.
///
/// Accepts `owner/repo` shorthand as well as source-control URLs in the forms found in
/// package metadata (`git+https://github.com/owner/repo.git`, `git@github.com:owner/repo.git`,
/// URLs with extra path segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoSpec {
    host: Arc<str>,
    owner: Arc<str>,
    repo: Arc<str>,
}

impl RepoSpec {
    /// Parse any supported repository reference.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_prefix = trimmed.strip_prefix("git+").unwrap_or(trimmed);

        if without_prefix.contains("://") {
            let url = Url::parse(without_prefix).into_app_err_with(|| format!("parsing repository URL '{input}'"))?;
            return Self::from_url(&url);
        }

        // scp-like syntax: git@github.com:owner/repo.git
        if let Some((user_host, path)) = without_prefix.split_once(':')
            && let Some((_, host)) = user_host.split_once('@')
        {
            return Self::from_parts(host, path.split('/'), input);
        }

        Self::from_parts(DEFAULT_HOST, without_prefix.split('/'), input)
    }

    /// Build from a URL, ignoring path segments past `owner/repo`.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url.host_str().unwrap_or_default();
        let segments = url.path_segments().into_iter().flatten();
        Self::from_parts(host, segments, url.as_str())
    }

    fn from_parts<'a>(host: &str, mut segments: impl Iterator<Item = &'a str>, input: &str) -> Result<Self> {
        let owner = segments.next().unwrap_or_default();
        let repo = segments.next().unwrap_or_default();
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if owner.is_empty() || repo.is_empty() {
            bail!("invalid repository reference '{input}': expected owner and repository name");
        }

        if host.is_empty() {
            bail!("invalid repository reference '{input}': missing host");
        }

        Ok(Self {
            host: Arc::from(host),
            owner: Arc::from(owner),
            repo: Arc::from(repo),
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the repository lives on GitHub, the only host that can be crawled.
    #[must_use]
    pub fn is_github(&self) -> bool {
        &*self.host == DEFAULT_HOST
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The project key used in stored records: `owner/repo`.
    #[must_use]
    pub fn project(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Canonical web URL, e.g. `https://github.com/owner/repo`.
    #[must_use]
    pub fn web_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.repo)
    }

    /// Pattern matching any source URL form that refers to this repository.
    ///
    /// The host must match, and trailing path segments, queries, or fragments are allowed.
    /// Bare `owner/repo` references only match repositories on the default host.
    #[must_use]
    pub fn source_pattern(&self) -> Regex {
        let host = format!(r"(.*[/@.])?{}[/:]", regex::escape(&self.host));
        let host = if self.is_github() { format!("({host})?") } else { host };
        let pattern = format!(r"^{host}{}/{}(\.git)?([/?#].*)?$", regex::escape(&self.owner), regex::escape(&self.repo));
        Regex::new(&pattern).expect("escaped repository pattern is always valid")
    }
}

impl FromStr for RepoSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        Self::parse(s).map_err(|e| e.to_string())
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
