// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use web_watcher::metrics::Metrics;

#[tokio::test]
async fn metrics_endpoint_renders_recorded_series() {
    let (metrics, recorder) = Metrics::detached();
    metrics::with_local_recorder(&recorder, || {
        metrics::counter!("watch_invocations_total", "outcome" => "changed").increment(2);
        metrics::counter!("watch_triggers_skipped_total").increment(1);
        metrics::histogram!("watch_fetch_duration_ms").record(12.5);
    });

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        r#"watch_invocations_total{outcome="changed"} 2"#,
        "watch_triggers_skipped_total 1",
        "watch_fetch_duration_ms",
    ] {
        assert!(text.contains(needle), "missing `{needle}` in:\n{text}");
    }
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (metrics, _recorder) = Metrics::detached();
    let resp = metrics
        .router()
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
