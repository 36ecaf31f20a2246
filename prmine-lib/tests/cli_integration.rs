//! End-to-end tests driving the command-line entry point against a mock API

use camino::Utf8PathBuf;
use prmine_lib::commands::{CONFIG_FILE_NAME, DEFAULT_CONFIG_TOML};
use prmine_lib::{Host, run};
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Host that captures output and exit codes
#[derive(Debug, Default)]
struct TestHost {
    output: Vec<u8>,
    error: Vec<u8>,
    exit_code: Option<i32>,
}

impl TestHost {
    fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error).into_owned()
    }
}

impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output
    }

    fn error(&mut self) -> impl Write {
        &mut self.error
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

/// A data directory whose configuration points at `server`.
fn data_dir(server: &MockServer) -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

    let config = format!(
        "api_base_url = \"{}\"\nretry_base_delay = \"1ms\"\nmax_retry_attempts = 1\nperiods = 10\nadmission_min = 2\nadmission_max = 5\n",
        server.uri()
    );
    fs::write(dir.join(CONFIG_FILE_NAME), config).unwrap();

    (temp, dir)
}

fn pr(number: u64, login: &str, created_at: &str, merged_at: &str) -> Value {
    json!({
        "number": number,
        "title": format!("Change #{number}"),
        "created_at": created_at,
        "merged_at": merged_at,
        "user": { "login": login, "type": "User" },
        "requested_reviewers": [],
        "assignees": [],
    })
}

/// Three merged pull requests by two contributors, plus a bot and an unmerged one.
async fn mount_widgets(server: &MockServer) {
    let body = json!([
        pr(6, "xavier", "2023-01-10T00:00:00Z", "2023-01-10T01:00:00Z"),
        {
            "number": 5,
            "title": "Bump deps",
            "created_at": "2023-01-08T00:00:00Z",
            "merged_at": "2023-01-08T00:01:00Z",
            "user": { "login": "renovate[bot]", "type": "Bot" },
        },
        pr(4, "yasmin", "2023-01-06T00:00:00Z", "2023-01-06T01:00:00Z"),
        {
            "number": 3,
            "title": "Abandoned",
            "created_at": "2023-01-03T00:00:00Z",
            "merged_at": null,
            "user": { "login": "zed", "type": "User" },
        },
        pr(1, "xavier", "2023-01-01T00:00:00Z", "2023-01-01T01:00:00Z"),
    ]);

    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn run_cli(host: &mut TestHost, dir: &Utf8PathBuf, args: &[&str]) {
    let mut argv = vec!["prmine", "--data-dir", dir.as_str()];
    argv.extend_from_slice(args);
    run(host, argv).await.unwrap();
}

fn read_lines(path: &Utf8PathBuf) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_crawl_aggregate_show() {
    let server = MockServer::start().await;
    mount_widgets(&server).await;
    let (_temp, dir) = data_dir(&server);

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["crawl", "octo/widgets"]).await;
    assert!(host.output_text().contains("octo/widgets: stored 3 merged pull request(s)"), "{}", host.error_text());
    assert_eq!(host.exit_code, None);

    let stored = read_lines(&dir.join("pull_requests.jsonl"));
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|doc| doc["project"] == "octo/widgets"));

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["aggregate"]).await;
    assert!(
        host.output_text()
            .contains("octo/widgets: 3 pull request(s), 2 submitter(s), average merge time 3600s"),
        "{}",
        host.error_text()
    );

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["show", "https://github.com/octo/widgets"]).await;
    let doc: Value = serde_json::from_str(&host.output_text()).unwrap();

    assert_eq!(doc["project"], "octo/widgets");
    assert_eq!(doc["github"], "https://github.com/octo/widgets");
    assert_eq!(doc["amount_of_pull_requests"], 3);
    assert_eq!(doc["average_pull_request_merge_time"], 3600);

    let periods = doc["periods"].as_array().unwrap();
    assert_eq!(periods.len(), 10);
    let counts: Vec<u64> = periods.iter().map(|p| p["count"].as_u64().unwrap()).collect();
    assert_eq!(counts, vec![1, 0, 0, 0, 0, 1, 0, 0, 0, 0]);

    assert_eq!(doc["submitters"]["xavier"]["contributions"], 2);
    assert_eq!(doc["submitters"]["yasmin"]["contributions"], 1);
}

#[tokio::test]
async fn test_aggregate_is_idempotent() {
    let server = MockServer::start().await;
    mount_widgets(&server).await;
    let (_temp, dir) = data_dir(&server);

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["crawl", "octo/widgets"]).await;

    run_cli(&mut host, &dir, &["aggregate", "octo/widgets"]).await;
    let first = fs::read_to_string(dir.join("projects.jsonl")).unwrap();

    run_cli(&mut host, &dir, &["aggregate", "octo/widgets"]).await;
    let second = fs::read_to_string(dir.join("projects.jsonl")).unwrap();

    assert_eq!(first, second);
    assert_eq!(read_lines(&dir.join("projects.jsonl")).len(), 1);
}

#[tokio::test]
async fn test_failed_crawl_discards_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/missing/pulls"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;
    let (_temp, dir) = data_dir(&server);

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["crawl", "octo/missing"]).await;

    assert_eq!(host.exit_code, Some(1));
    assert!(host.error_text().contains("octo/missing: crawl failed"));
    assert!(host.error_text().contains("HTTP 404"));
    assert!(!dir.join("pull_requests.jsonl").exists());
}

#[tokio::test]
async fn test_qualify_and_track() {
    let server = MockServer::start().await;
    mount_widgets(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/tiny/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pr(1, "solo", "2023-01-01T00:00:00Z", "2023-01-02T00:00:00Z")])))
        .mount(&server)
        .await;
    let (_temp, dir) = data_dir(&server);

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["qualify", "octo/widgets", "octo/tiny", "--track"]).await;

    assert_eq!(host.output_text(), "octo/widgets\t3\n");
    assert!(host.error_text().contains("octo/tiny: too few"), "{}", host.error_text());
    assert!(host.error_text().contains("1 of 2 candidate(s) admitted with bounds [2, 5]"));

    let projects = read_lines(&dir.join("projects.jsonl"));
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["github"], "https://github.com/octo/widgets");

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["crawl", "--tracked"]).await;
    assert!(host.output_text().contains("octo/widgets: stored 3 merged pull request(s)"));
}

#[tokio::test]
async fn test_init_writes_default_config() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
    let output = dir.join("nested").join("custom.toml");

    let mut host = TestHost::default();
    run_cli(&mut host, &dir, &["init", "--output", output.as_str()]).await;

    assert_eq!(fs::read_to_string(&output).unwrap(), DEFAULT_CONFIG_TOML);
    assert!(host.output_text().contains("Generated default configuration file"));
}

#[tokio::test]
async fn test_show_unknown_project_fails() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

    let mut host = TestHost::default();
    let result = run(&mut host, ["prmine", "--data-dir", dir.as_str(), "show", "octo/nothing"]).await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("no project document stored for 'octo/nothing'"));
}
