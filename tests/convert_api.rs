mod support;

use std::{collections::HashSet, time::Duration};

use axum::http::{StatusCode, header};
use futures::future::join_all;
use pagescribe::config::DeploymentMode;
use tower::ServiceExt;

use support::{Behaviour, Harness, body_bytes, body_json, get, header_str, post_json};

#[tokio::test]
async fn html_converts_to_inline_pdf() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<h1>Hi</h1>"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "inline; filename=\"generated.pdf\""
    );
    let body = body_bytes(response).await;
    assert!(body.starts_with(b"%PDF"));

    assert_eq!(harness.counters.launched(), 1);
    assert_eq!(harness.counters.closed(), 1);
    assert_eq!(harness.counters.terminated(), 0);
}

#[tokio::test]
async fn markdown_converts_to_docx_attachment_without_a_browser() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json(
            "/convert",
            r##"{"markdown":"# Hi","outputFormat":"docx"}"##,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    let disposition = header_str(&response, header::CONTENT_DISPOSITION).to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.trim_end_matches('"').ends_with(".docx"));

    let body = body_bytes(response).await;
    assert!(body.starts_with(b"PK\x03\x04"));
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn missing_content_is_rejected_before_launch() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", "{}"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("required"), "got: {error}");
    assert!(body.get("details").is_none());
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn conflicting_content_is_rejected_before_launch() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json(
            "/convert",
            r##"{"html":"<p>x</p>","markdown":"# x"}"##,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["error"]
            .as_str()
            .is_some_and(|error| error.contains("not both"))
    );
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn empty_strings_count_as_missing() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"","markdown":""}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let harness = Harness::new(Behaviour::Print);

    for body in ["{not json", "[1, 2]", r#"{"html": 5}"#] {
        let response = harness
            .router
            .clone()
            .oneshot(post_json("/convert", body))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn oversized_body_gets_a_json_error() {
    let harness = Harness::new(Behaviour::Print);
    let oversized = format!(r#"{{"html":"{}"}}"#, "a".repeat(1024 * 1024 + 1));

    for uri in ["/convert", "/preview"] {
        let response = harness
            .router
            .clone()
            .oneshot(post_json(uri, &oversized))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE, "uri: {uri}");
        assert!(header_str(&response, header::CONTENT_TYPE).starts_with("application/json"));
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn unrecognized_format_falls_back_to_pdf() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json(
            "/convert",
            r#"{"html":"<p>x</p>","outputFormat":"xlsx"}"#,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "application/pdf");
    assert!(body_bytes(response).await.starts_with(b"%PDF"));
}

#[tokio::test]
async fn legacy_path_serves_the_same_endpoint() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/api/generate-pdf", r#"{"html":"<p>x</p>"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.starts_with(b"%PDF"));
    harness.counters.assert_balanced();
}

#[tokio::test]
async fn launch_failure_reports_structured_error() {
    let harness = Harness::new(Behaviour::RefuseLaunch);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<p>x</p>"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to generate PDF");
    assert_eq!(body["details"]["name"], "LaunchError");
    assert!(
        body["details"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("executable not found"))
    );
    assert!(body["details"]["stack"].is_string());

    assert_eq!(harness.counters.launched(), 0);
    assert_eq!(harness.counters.closed(), 0);
}

#[tokio::test]
async fn render_failure_still_closes_the_browser() {
    let harness = Harness::new(Behaviour::Crash);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<p>x</p>"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"]["name"], "ConversionError");
    assert_eq!(
        body["details"]["message"],
        "BrowserProtocolError: target crashed"
    );

    assert_eq!(harness.counters.launched(), 1);
    assert_eq!(harness.counters.closed(), 1);
    assert_eq!(harness.counters.terminated(), 0);
}

#[tokio::test(start_paused = true)]
async fn render_timeout_still_closes_the_browser() {
    let harness = Harness::with(
        Behaviour::Hang,
        DeploymentMode::Development,
        Duration::from_secs(2),
    );

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<img src=\"http://10.255.255.1/x.png\">"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"]["name"], "RenderTimeoutError");

    assert_eq!(harness.counters.launched(), 1);
    assert_eq!(harness.counters.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_terminates_the_browser() {
    let harness = Harness::new(Behaviour::Hang);

    let in_flight = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<p>x</p>"}"#));
    let outcome = tokio::time::timeout(Duration::from_millis(100), in_flight).await;
    assert!(outcome.is_err(), "hung render must not complete");

    assert_eq!(harness.counters.launched(), 1);
    assert_eq!(harness.counters.closed(), 0);
    assert_eq!(harness.counters.terminated(), 1);
}

#[tokio::test]
async fn production_mode_hides_stack() {
    let harness = Harness::with(
        Behaviour::Crash,
        DeploymentMode::Production,
        Duration::from_secs(30),
    );

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/convert", r#"{"html":"<p>x</p>"}"#))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"]["name"], "ConversionError");
    assert!(body["details"].get("stack").is_none());
    harness.counters.assert_balanced();
}

#[tokio::test]
async fn sequential_requests_each_get_their_own_browser() {
    let harness = Harness::new(Behaviour::Print);

    for _ in 0..3 {
        let response = harness
            .router
            .clone()
            .oneshot(post_json("/convert", r#"{"markdown":"- a\n- b"}"#))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(harness.counters.launched(), 3);
    assert_eq!(harness.counters.closed(), 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_never_share_a_browser() {
    const REQUESTS: usize = 4;
    let harness = Harness::new(Behaviour::SlowPrint);

    let responses = join_all((0..REQUESTS).map(|index| {
        harness
            .router
            .clone()
            .oneshot(post_json("/convert", &format!(r#"{{"html":"<p>{index}</p>"}}"#)))
    }))
    .await;

    let mut processes = HashSet::new();
    for response in responses {
        let response = response.expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let pdf = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8 stub pdf");
        let process = pdf
            .split_whitespace()
            .skip_while(|word| *word != "process")
            .nth(1)
            .map(str::to_string)
            .expect("process id in stub pdf");
        processes.insert(process);
    }

    assert_eq!(processes.len(), REQUESTS);
    assert_eq!(harness.counters.launched(), REQUESTS);
    assert_eq!(harness.counters.closed(), REQUESTS);
    assert_eq!(harness.counters.terminated(), 0);
    assert_eq!(harness.counters.peak_active(), REQUESTS);
}

#[tokio::test]
async fn preview_returns_preprocessed_markdown() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/preview", "{\"markdown\":\"# Title\\n\\n- one\\n- two\"}"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, header::CONTENT_TYPE).starts_with("text/html"));
    let html = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8 html");
    assert!(html.contains("<h1>Title</h1>"));
    assert!(html.contains("<li>one</li>"));
    assert_eq!(harness.counters.launched(), 0);
}

#[tokio::test]
async fn test_endpoint_echoes_json() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/test", r#"{"hello":"world"}"#))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "API Test endpoint reached successfully!");
    assert_eq!(body["receivedData"]["hello"], "world");

    let response = harness
        .router
        .clone()
        .oneshot(post_json("/api/test", "nope"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].is_string());

    let response = harness
        .router
        .clone()
        .oneshot(get("/test"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "API Test endpoint is alive (GET request)!");
}

#[tokio::test]
async fn editor_page_and_assets_are_served() {
    let harness = Harness::new(Behaviour::Print);

    let response = harness
        .router
        .clone()
        .oneshot(get("/"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf8 page");
    assert!(page.contains("id=\"source\""));
    assert!(page.contains("id=\"preview\""));

    let response = harness
        .router
        .clone()
        .oneshot(get("/static/editor.js"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = harness
        .router
        .clone()
        .oneshot(get("/static/missing.js"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = harness
        .router
        .clone()
        .oneshot(get("/_health"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
