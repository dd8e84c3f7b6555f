use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;

use maxfoot::api_sports::ApiSportsClient;
use maxfoot::config::ApiConfig;
use maxfoot::http_cache::ResponseCache;

const QUOTA_ERROR: &str =
    r#"{"errors":{"requests":"You have reached the request limit for the day"},"response":[]}"#;
const TEAMS: &str =
    r#"{"errors":[],"response":[{"team":{"name":"Lille"}},{"team":{"name":"Lens"}}]}"#;

struct Server {
    base_url: String,
    requests: Receiver<String>,
    handle: JoinHandle<()>,
}

impl Server {
    /// Serves `responses` in order, one connection each, then exits.
    fn start(responses: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, requests) = mpsc::channel();
        let handle = thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let _ = tx.send(read_request(&mut stream));
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle,
        }
    }

    /// Waits for every canned response to be served and returns the requests seen.
    fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        self.requests.try_iter().collect()
    }
}

fn read_request(stream: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).to_lowercase()
}

fn ok(body: &str, extra_headers: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
        body.len()
    )
}

fn not_modified() -> String {
    "HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
}

fn local_client() -> Client {
    Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn api_client(base_url: &str, cache: ResponseCache) -> ApiSportsClient {
    let config = ApiConfig {
        api_key: Some("test-key".to_string()),
        base_url: base_url.to_string(),
        ..ApiConfig::default()
    };
    ApiSportsClient::with_client(config, local_client(), cache).unwrap()
}

#[test]
fn api_error_body_is_not_cached() {
    let server = Server::start(vec![ok(QUOTA_ERROR, ""), ok(TEAMS, "")]);
    let client = api_client(
        &server.base_url,
        ResponseCache::in_memory(Duration::from_secs(3600)),
    );

    let err = client.teams(61, 2023).unwrap_err();
    assert!(format!("{err:#}").contains("request limit"));

    let teams = client.teams(61, 2023).unwrap();
    assert_eq!(teams, vec!["Lille".to_string(), "Lens".to_string()]);

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("x-apisports-key: test-key"));
}

#[test]
fn fresh_entry_is_served_without_a_request() {
    let server = Server::start(vec![ok(TEAMS, "")]);
    let cache = ResponseCache::in_memory(Duration::from_secs(60));
    let client = local_client();
    let url = format!("{}/teams?league=61&season=2023", server.base_url);

    let first = cache.fetch_json(&client, &url, &[]).unwrap();
    // The server is gone after one response; a second request would fail.
    let second = cache.fetch_json(&client, &url, &[]).unwrap();
    assert_eq!(first, TEAMS);
    assert_eq!(second, TEAMS);
    assert_eq!(cache.len(), 1);
    assert_eq!(server.finish().len(), 1);
}

#[test]
fn stale_entry_is_revalidated_with_etag() {
    let server = Server::start(vec![ok(TEAMS, "ETag: \"v1\"\r\n"), not_modified()]);
    let cache = ResponseCache::in_memory(Duration::ZERO);
    let client = local_client();
    let url = format!("{}/teams?league=61&season=2023", server.base_url);

    let first = cache.fetch_json(&client, &url, &[]).unwrap();
    let second = cache.fetch_json(&client, &url, &[]).unwrap();
    assert_eq!(first, TEAMS);
    assert_eq!(second, TEAMS);

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].contains("if-none-match"));
    assert!(requests[1].contains("if-none-match: \"v1\""));
}

#[test]
fn rejected_entry_on_disk_is_refetched() {
    let server = Server::start(vec![ok(TEAMS, "")]);
    let url = format!("{}/teams?league=61&season=2023", server.base_url);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let file = serde_json::json!({
        "version": 1,
        "entries": {
            url.clone(): {
                "body": QUOTA_ERROR,
                "etag": "\"old\"",
                "last_modified": null,
                "fetched_at": now
            }
        }
    });
    let dir = std::env::temp_dir().join(format!("maxfoot-http-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("http_cache.json");
    std::fs::write(&path, file.to_string()).unwrap();

    let cache = ResponseCache::open(Some(path.clone()), Duration::from_secs(3600));
    assert_eq!(cache.len(), 1);
    let client = api_client(&server.base_url, cache);
    assert_eq!(client.teams(61, 2023).unwrap().len(), 2);

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].contains("if-none-match"));

    let reopened = ResponseCache::open(Some(path), Duration::from_secs(3600));
    assert_eq!(reopened.len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}
