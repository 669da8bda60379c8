// tests/file_store.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{dispatcher, ok, RecordingMailer, RecordingWebhook, ScriptedFetcher};
use web_watcher::shutdown::Shutdown;
use web_watcher::{
    FileStore, InvocationOutcome, Pipeline, RetryController, RetryPolicy, WatchDefinition,
};

fn pipeline(store: Arc<FileStore>, body: &str, mailer: Arc<RecordingMailer>) -> Pipeline {
    Pipeline::new(
        RetryController::new(
            ScriptedFetcher::new(vec![ok(200, body)]),
            RetryPolicy {
                count: 0,
                delay: Duration::from_millis(1),
            },
        ),
        store,
        dispatcher(mailer, 1, RecordingWebhook::new()),
    )
}

#[tokio::test]
async fn snapshots_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let w = WatchDefinition::simple("docs", "https://docs.example.com");
    let mailer = RecordingMailer::new();

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let report = pipeline(store, "v1", mailer.clone())
            .run(&w, &Shutdown::never())
            .await;
        assert_eq!(report.outcome, InvocationOutcome::FirstRun);
    }

    // fresh store over the same directory, as after a process restart
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let report = pipeline(store, "v2", mailer.clone())
        .run(&w, &Shutdown::never())
        .await;

    assert_eq!(report.outcome, InvocationOutcome::Changed);
    assert_eq!(mailer.sent().len(), 1);
    assert!(mailer.sent()[0].body.contains("v1"));

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files, vec![format!("{}.json", w.id.digest())]);
}
