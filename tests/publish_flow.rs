//! End-to-end publish and generator tests against a local HTTP stub.
//!
//! The GitHub API base and generator URL are both configurable, so the
//! whole publish state machine can run against a loopback server that
//! records every request it sees.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use base64::Engine;

use palisade::config::{Config, Credentials};
use palisade::error::PipelineError;
use palisade::generator;
use palisade::github::GithubClient;
use palisade::models::{GenerationResult, PrData};
use palisade::publish;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    headers: Vec<String>,
    body: String,
}

type RequestLog = Arc<Mutex<Vec<Recorded>>>;

/// Minimal HTTP/1.1 responder: one request per connection, canned JSON
/// answers chosen by `respond`, every request recorded.
fn spawn_stub(respond: fn(&str, &str) -> (u16, String)) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let thread_log = log.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() || request_line.trim().is_empty() {
                continue;
            }
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or("").to_string();
            let path = parts.next().unwrap_or("").to_string();

            let mut headers = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() {
                    break;
                }
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                headers.push(line);
            }

            let mut body = vec![0u8; content_length];
            if content_length > 0 && reader.read_exact(&mut body).is_err() {
                continue;
            }
            let body = String::from_utf8_lossy(&body).to_string();

            let (status, response_body) = respond(&method, &path);
            thread_log.lock().unwrap().push(Recorded {
                method,
                path,
                headers,
                body,
            });

            let reason = match status {
                200 => "OK",
                201 => "Created",
                401 => "Unauthorized",
                404 => "Not Found",
                _ => "Error",
            };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                response_body.len(),
                response_body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (format!("http://{}", addr), log)
}

fn creds_with_github() -> Credentials {
    Credentials {
        github_token: Some("gh-token".to_string()),
        embedding_api_key: None,
        generator_auth_token: Some("cf-token".to_string()),
    }
}

fn generated_change() -> GenerationResult {
    GenerationResult {
        file_content: "def f(x): return x.y if x else None".to_string(),
        file_path: "a.py".to_string(),
        pr_data: PrData {
            pr_title: "Fix null crash".to_string(),
            pr_body: "Adds null check".to_string(),
        },
    }
}

fn github_stub_routes(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/repos/o/r/git/ref/heads/main") => (
            200,
            r#"{"ref": "refs/heads/main", "object": {"sha": "base-sha", "type": "commit"}}"#.to_string(),
        ),
        ("POST", "/repos/o/r/git/refs") => (201, r#"{"ref": "refs/heads/x"}"#.to_string()),
        ("GET", "/repos/o/r/contents/a.py") => {
            (200, r#"{"name": "a.py", "sha": "blob-sha"}"#.to_string())
        }
        ("PUT", "/repos/o/r/contents/a.py") => (200, r#"{"content": {}}"#.to_string()),
        ("POST", "/repos/o/r/pulls") => (
            201,
            r#"{"number": 5, "html_url": "https://github.com/o/r/pull/5"}"#.to_string(),
        ),
        _ => (404, r#"{"message": "Not Found"}"#.to_string()),
    }
}

#[tokio::test]
async fn test_publish_flow_creates_branch_commit_and_pr() {
    let (base_url, log) = spawn_stub(github_stub_routes);

    let mut config = Config::default();
    config.github.api_base = base_url;
    let creds = creds_with_github();

    let github = GithubClient::new(&config, &creds).unwrap();
    let published = publish::publish_change(&github, &config, "o/r", &generated_change())
        .await
        .unwrap();

    assert!(published.branch.starts_with("test_branch_"));
    assert_eq!(published.pull_request.number, 5);
    assert_eq!(
        published.pull_request.html_url,
        "https://github.com/o/r/pull/5"
    );

    let log = log.lock().unwrap();
    let paths: Vec<String> = log.iter().map(|r| format!("{} {}", r.method, r.path)).collect();
    assert_eq!(
        paths,
        vec![
            "GET /repos/o/r/git/ref/heads/main",
            "POST /repos/o/r/git/refs",
            "GET /repos/o/r/contents/a.py",
            "PUT /repos/o/r/contents/a.py",
            "POST /repos/o/r/pulls",
        ]
    );

    // Branch is created at the default branch's head SHA
    let new_ref: serde_json::Value = serde_json::from_str(&log[1].body).unwrap();
    assert_eq!(new_ref["ref"], format!("refs/heads/{}", published.branch));
    assert_eq!(new_ref["sha"], "base-sha");

    // Commit carries the base64 content, the fixed message, the new
    // branch, and the prior blob SHA
    let update: serde_json::Value = serde_json::from_str(&log[3].body).unwrap();
    let expected_b64 =
        base64::engine::general_purpose::STANDARD.encode("def f(x): return x.y if x else None");
    assert_eq!(update["content"], expected_b64.as_str());
    assert_eq!(update["message"], "commit from palisade");
    assert_eq!(update["branch"], published.branch.as_str());
    assert_eq!(update["sha"], "blob-sha");

    // PR goes from the new branch into the default branch with the
    // generator's metadata
    let pull: serde_json::Value = serde_json::from_str(&log[4].body).unwrap();
    assert_eq!(pull["title"], "Fix null crash");
    assert_eq!(pull["body"], "Adds null check");
    assert_eq!(pull["head"], published.branch.as_str());
    assert_eq!(pull["base"], "main");

    // Every call authenticates with the token scheme
    for recorded in log.iter() {
        assert!(
            recorded
                .headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case("authorization: token gh-token")),
            "missing auth header on {} {}",
            recorded.method,
            recorded.path
        );
    }
}

fn github_stub_new_file(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/repos/o/r/contents/new.py") => (404, r#"{"message": "Not Found"}"#.to_string()),
        ("PUT", "/repos/o/r/contents/new.py") => (201, r#"{"content": {}}"#.to_string()),
        _ => github_stub_routes(method, path),
    }
}

#[tokio::test]
async fn test_publish_flow_handles_new_file_without_prior_sha() {
    let (base_url, log) = spawn_stub(github_stub_new_file);

    let mut config = Config::default();
    config.github.api_base = base_url;
    let creds = creds_with_github();

    let mut generated = generated_change();
    generated.file_path = "new.py".to_string();

    let github = GithubClient::new(&config, &creds).unwrap();
    publish::publish_change(&github, &config, "o/r", &generated)
        .await
        .unwrap();

    let log = log.lock().unwrap();
    let update = log
        .iter()
        .find(|r| r.method == "PUT")
        .expect("no contents PUT recorded");
    let body: serde_json::Value = serde_json::from_str(&update.body).unwrap();
    assert!(body.get("sha").is_none(), "new file must not send a prior SHA");
}

fn generator_stub_ok(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("POST", "/palisade-feature") => (
            200,
            r#"{
                "file_content": "def f(x): return x.y if x else None",
                "file_path": "a.py",
                "pr_data": {"pr_title": "Fix null crash", "pr_body": "Adds null check"}
            }"#
            .to_string(),
        ),
        _ => (404, "{}".to_string()),
    }
}

#[tokio::test]
async fn test_generator_roundtrip_sends_payload_and_token() {
    let (base_url, log) = spawn_stub(generator_stub_ok);

    let mut config = Config::default();
    config.generator.url = format!("{}/palisade-feature", base_url);
    let creds = creds_with_github();

    let result = generator::request_change(
        &config,
        &creds,
        "Title: Bug\n\nCrash on null",
        "From path a.py\ndef f(x): return x.y",
    )
    .await
    .unwrap();

    assert_eq!(result.file_path, "a.py");
    assert_eq!(result.pr_data.pr_title, "Fix null crash");

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&log[0].body).unwrap();
    assert_eq!(payload["issue"], "Title: Bug\n\nCrash on null");
    assert_eq!(payload["retrieved"], "From path a.py\ndef f(x): return x.y");
    // Token goes through as-is, no Bearer scheme
    assert!(log[0]
        .headers
        .iter()
        .any(|h| h.eq_ignore_ascii_case("authorization: cf-token")));
}

fn generator_stub_unauthorized(_method: &str, _path: &str) -> (u16, String) {
    (401, r#"{"error": "bad token"}"#.to_string())
}

#[tokio::test]
async fn test_generator_401_is_auth_error() {
    let (base_url, _log) = spawn_stub(generator_stub_unauthorized);

    let mut config = Config::default();
    config.generator.url = format!("{}/palisade-feature", base_url);
    let creds = creds_with_github();

    let err = generator::request_change(&config, &creds, "issue", "retrieved")
        .await
        .unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Auth(msg)) => {
            assert_eq!(msg, "authorization for the generator service failed");
        }
        other => panic!("expected Auth error, got {:?}", other),
    }
}
