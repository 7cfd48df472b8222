//! Mock archive endpoints built on wiremock

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Respond to the metadata read of `identifier` with the given document
pub async fn mount_metadata(server: &MockServer, identifier: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/metadata/{identifier}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer the next `times` status queries with the given counters
///
/// `identifier` restricts the mock to one item; `None` matches any item
/// (for generated identifiers). Mount sequences in order: earlier mounts are
/// used up first.
pub async fn mount_summary(
    server: &MockServer,
    identifier: Option<&str>,
    (queued, running, error): (u32, u32, u32),
    times: u64,
) {
    let mut mock = Mock::given(method("GET")).and(path("/services/tasks.php"));
    if let Some(identifier) = identifier {
        mock = mock.and(query_param("identifier", identifier));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "value": {
                "summary": {"queued": queued, "running": running, "error": error, "paused": 0}
            }
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Accept task submissions, expecting exactly `expected` of them
pub async fn mount_task_submission(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/services/tasks.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "value": {"task_id": 1}
        })))
        .expect(expected)
        .mount(server)
        .await;
}

/// Accept uploads of `filename` into any bucket, expecting exactly `expected` of them
pub async fn mount_upload(server: &MockServer, filename: &str, status: u16, expected: u64) {
    Mock::given(method("PUT"))
        .and(wiremock::matchers::path_regex(format!(
            r"^/s3/[^/]+/{}$",
            regex::escape(filename)
        )))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

/// Metadata document of an item that already holds the test file
pub fn ready_item(filename: &str) -> serde_json::Value {
    json!({
        "is_dark": false,
        "files": [{"name": filename, "format": "Text"}],
        "metadata": {"collection": "test_collection"}
    })
}
