use anyhow::Result;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use warden_core::{CommandOutput, MarkerChange, ModuleRoot, RootExecutor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RecordingExecutor {
    commands: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
        }
    }
}

impl RootExecutor for RecordingExecutor {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>> {
        self.commands.lock().unwrap().push(command.to_string());
        Box::pin(async move {
            Ok(CommandOutput {
                exit_code: 0,
                out: Vec::new(),
            })
        })
    }
}

async fn write_module(root: &Path, dir_name: &str, prop: &str) {
    let dir = root.join(dir_name);
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("module.prop"), prop).await.unwrap();
}

#[tokio::test]
async fn full_module_lifecycle_flow() {
    let tree = TempDir::new().unwrap();
    write_module(
        tree.path(),
        "sample",
        "id=sample\nname=Sample Mod\nversion=1.0\nversionCode=5\nauthor=dev\n",
    )
    .await;
    write_module(tree.path(), "other", "id=other\nname=An Other\nversionCode=2\n").await;

    let root = ModuleRoot::new(tree.path());
    assert!(root.loaded());

    let modules = root.installed().await;
    assert_eq!(modules.len(), 2);
    // Case-insensitive name sort puts "An Other" first.
    assert_eq!(modules[0].id, "other");
    assert_eq!(modules[1].id, "sample");

    let sample = &modules[1];
    assert_eq!(sample.name, "Sample Mod");
    assert_eq!(sample.version_code, 5);
    assert!(sample.enabled());

    let exec = RecordingExecutor::new();

    // Disable, re-scan, re-enable.
    assert_eq!(
        sample.set_enabled(&exec, false).await.unwrap(),
        MarkerChange::Applied
    );
    let rescanned = root.installed().await;
    let sample_again = rescanned.iter().find(|m| m.id == "sample").unwrap();
    assert!(!sample_again.enabled());

    assert_eq!(
        sample_again.set_enabled(&exec, true).await.unwrap(),
        MarkerChange::Applied
    );
    assert!(sample_again.enabled());

    // Mark for removal, then change our mind.
    assert_eq!(
        sample_again.set_remove(&exec, true).await.unwrap(),
        MarkerChange::Applied
    );
    assert!(sample_again.marked_for_removal());
    assert_eq!(
        sample_again.set_remove(&exec, false).await.unwrap(),
        MarkerChange::Applied
    );
    assert!(!sample_again.marked_for_removal());

    // Every applied mutation refreshed the preinit set.
    assert_eq!(exec.commands.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn removal_stays_rejected_until_update_lands() {
    let tree = TempDir::new().unwrap();
    write_module(tree.path(), "pending", "id=pending\nversionCode=1\n").await;
    tokio::fs::write(tree.path().join("pending").join("update"), "")
        .await
        .unwrap();

    let root = ModuleRoot::new(tree.path());
    let modules = root.installed().await;
    let pending = &modules[0];
    assert!(pending.updated());

    let exec = RecordingExecutor::new();
    assert_eq!(
        pending.set_remove(&exec, true).await.unwrap(),
        MarkerChange::Rejected
    );
    assert!(!pending.marked_for_removal());

    // Update marker cleared (the staged update landed): removal now goes
    // through.
    tokio::fs::remove_file(tree.path().join("pending").join("update"))
        .await
        .unwrap();
    assert_eq!(
        pending.set_remove(&exec, true).await.unwrap(),
        MarkerChange::Applied
    );
    assert!(pending.marked_for_removal());
}

#[tokio::test]
async fn update_check_round_trip_against_update_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sample/update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "2.0",
            "versionCode": 9,
            "zipUrl": format!("{}/sample/module.zip", server.uri()),
            "changelog": "big rewrite",
        })))
        .mount(&server)
        .await;

    let tree = TempDir::new().unwrap();
    write_module(
        tree.path(),
        "sample",
        &format!(
            "id=sample\nname=Sample\nversionCode=5\nupdateJson={}/sample/update.json\n",
            server.uri()
        ),
    )
    .await;

    let client =
        warden_core::CatalogClient::new(&format!("{}/modules.json", server.uri())).unwrap();
    let mut modules = ModuleRoot::new(tree.path()).installed().await;
    let sample = &mut modules[0];

    assert!(sample.fetch_update(&client).await);
    assert!(sample.outdated);
    let info = sample.update_info.as_ref().unwrap();
    assert_eq!(info.version_code, 9);
    assert_eq!(info.changelog, "big rewrite");
}

#[tokio::test]
async fn update_check_failure_reports_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sample/update.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tree = TempDir::new().unwrap();
    write_module(
        tree.path(),
        "sample",
        &format!(
            "id=sample\nversionCode=5\nupdateJson={}/sample/update.json\n",
            server.uri()
        ),
    )
    .await;

    let client =
        warden_core::CatalogClient::new(&format!("{}/modules.json", server.uri())).unwrap();
    let mut modules = ModuleRoot::new(tree.path()).installed().await;

    assert!(!modules[0].fetch_update(&client).await);
    assert!(!modules[0].outdated);
    assert!(modules[0].update_info.is_none());
}
