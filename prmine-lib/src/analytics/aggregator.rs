use super::{contributor_periods, merge_latency};
use crate::hosting::RepoSpec;
use crate::records::{ProjectAggregate, PullRequestRecord};
use crate::store::{Collection, Document, Filter, RecordStore, UpsertOutcome};
use crate::{AggregationError, StoreError};
use core::num::NonZeroUsize;
use serde_json::Value;
use std::collections::BTreeSet;

const LOG_TARGET: &str = "aggregator";

/// Compute a project's aggregate from its records.
pub fn aggregate_records(project: &str, records: &[PullRequestRecord], periods: NonZeroUsize) -> Result<ProjectAggregate, AggregationError> {
    let latency = merge_latency(project, records)?;
    let activity = contributor_periods(records, periods).ok_or_else(|| AggregationError::empty(project))?;

    Ok(ProjectAggregate {
        project: project.to_string(),
        amount_of_pull_requests: latency.amount_of_pull_requests,
        average_pull_request_merge_time: latency.average_pull_request_merge_time,
        first_pull_request: activity.first_pull_request,
        last_pull_request: activity.last_pull_request,
        periods: activity.periods,
        submitters: activity.submitters,
    })
}

/// Load every stored record of `project`.
pub fn load_records<S: RecordStore + ?Sized>(store: &S, project: &str) -> Result<Vec<PullRequestRecord>, AggregationError> {
    store
        .find_all(Collection::PullRequests, &Filter::new().eq("project", project))?
        .map(|doc| {
            PullRequestRecord::from_document(doc?).map_err(|source| AggregationError::InvalidRecord {
                project: project.to_string(),
                source,
            })
        })
        .collect()
}

/// Recompute the aggregate of `repo` from stored records and write it to its project document.
pub fn aggregate_project<S: RecordStore + ?Sized>(store: &S, repo: &RepoSpec, periods: NonZeroUsize) -> Result<ProjectAggregate, AggregationError> {
    let project = repo.project();
    let records = load_records(store, &project)?;
    log::debug!(target: LOG_TARGET, "Aggregating {} record(s) of '{project}'", records.len());

    let aggregate = aggregate_records(&project, &records, periods)?;
    let outcome = persist_aggregate(store, repo, &aggregate)?;

    log::info!(
        target: LOG_TARGET,
        "Aggregated '{project}': {} pull request(s), {} submitter(s){}",
        aggregate.amount_of_pull_requests,
        aggregate.distinct_submitters(),
        if outcome.inserted { ", new project document" } else { "" }
    );

    Ok(aggregate)
}

/// Write `aggregate` onto every project document whose `github` field refers to `repo`.
pub fn persist_aggregate<S: RecordStore + ?Sized>(store: &S, repo: &RepoSpec, aggregate: &ProjectAggregate) -> Result<UpsertOutcome, StoreError> {
    let fields = aggregate.to_fields()?;
    let inserted = register_project(store, repo)?;
    let mut outcome = store.upsert_fields(Collection::Projects, &project_filter(repo), &fields)?;
    outcome.inserted |= inserted;
    Ok(outcome)
}

/// Make sure a project document exists for `repo`. Returns whether one was created.
pub fn register_project<S: RecordStore + ?Sized>(store: &S, repo: &RepoSpec) -> Result<bool, StoreError> {
    if store.find_all(Collection::Projects, &project_filter(repo))?.next().transpose()?.is_some() {
        return Ok(false);
    }

    let mut seed = Document::new();
    let _ = seed.insert("project".to_string(), Value::from(repo.project()));
    let _ = seed.insert("github".to_string(), Value::from(repo.web_url()));
    let _ = store.insert_many(Collection::Projects, vec![seed])?;

    log::debug!(target: LOG_TARGET, "Registered project '{repo}'");
    Ok(true)
}

/// Project keys present in the `pull_requests` collection, sorted.
pub fn distinct_projects<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<String>, StoreError> {
    let mut projects = BTreeSet::new();
    for doc in store.find_all(Collection::PullRequests, &Filter::new())? {
        if let Some(Value::String(project)) = doc?.remove("project") {
            let _ = projects.insert(project);
        }
    }

    Ok(projects.into_iter().collect())
}

/// Repositories listed in the `projects` collection, sorted and deduplicated.
///
/// Documents whose `github` field is missing, unparseable, or not on GitHub are skipped.
pub fn tracked_repositories<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<RepoSpec>, StoreError> {
    let mut repos = BTreeSet::new();
    for doc in store.find_all(Collection::Projects, &Filter::new())? {
        let doc = doc?;
        match doc.get("github").and_then(Value::as_str).map(RepoSpec::parse) {
            Some(Ok(repo)) if repo.is_github() => {
                let _ = repos.insert(repo);
            }
            Some(Ok(repo)) => log::warn!(target: LOG_TARGET, "Skipping tracked repository '{}' on unsupported host '{}'", repo.project(), repo.host()),
            Some(Err(e)) => log::debug!(target: LOG_TARGET, "Skipping project document: {e}"),
            None => log::debug!(target: LOG_TARGET, "Skipping project document without a 'github' field"),
        }
    }

    Ok(repos.into_iter().collect())
}

/// Find the stored project document of `repo`.
pub fn find_project<S: RecordStore + ?Sized>(store: &S, repo: &RepoSpec) -> Result<Option<Document>, StoreError> {
    store.find_all(Collection::Projects, &project_filter(repo))?.next().transpose()
}

fn project_filter(repo: &RepoSpec) -> Filter {
    Filter::new().matches("github", repo.source_pattern())
}
