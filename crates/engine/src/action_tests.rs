// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use corral_coord::MemoryCoordinator;

use super::*;

#[derive(Default)]
struct RecordingHandler {
    runs: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait::async_trait]
impl ActionHandler for RecordingHandler {
    async fn run(&self, container_id: &str, command: &[String]) -> Result<Vec<u8>, HandlerError> {
        self.runs.lock().push((container_id.to_string(), command.to_vec()));
        Ok(b"done".to_vec())
    }
}

fn action(command: &[&str]) -> Action {
    Action {
        host_id: "h1".into(),
        container_id: "ctr-1".to_string(),
        command: command.iter().map(|s| s.to_string()).collect(),
        started: false,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn published_action_runs_once_and_is_deleted() {
    let coord = MemoryCoordinator::new();
    let handler = Arc::new(RecordingHandler::default());
    let listener = Arc::new(ActionListener::new("h1", handler.clone()));
    let shutdown = CancellationToken::new();
    let conn: Arc<dyn Coordinator> = Arc::new(coord.clone());
    let task = tokio::spawn(listener.clone().listen(shutdown.clone(), conn));

    let name = send_action(&coord, &action(&["ls", "-l"])).await.unwrap();

    let path = paths::host_action(&"h1".into(), &name);
    for _ in 0..100 {
        if coord.get(&path).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(coord.get(&path).await.is_err(), "finished action must be deleted");
    assert_eq!(
        *handler.runs.lock(),
        vec![("ctr-1".to_string(), vec!["ls".to_string(), "-l".to_string()])]
    );

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn claimed_action_is_not_run_again() {
    let coord = MemoryCoordinator::new();

    // an action already claimed by some other listen cycle
    let mut claimed = action(&["true"]);
    claimed.started = true;
    let path = paths::host_action(&claimed.host_id, "stale");
    client::create_json(&coord, &path, &claimed).await.unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let listener = Arc::new(ActionListener::new("h1", handler.clone()));
    let shutdown = CancellationToken::new();
    let conn: Arc<dyn Coordinator> = Arc::new(coord.clone());
    let task = tokio::spawn(listener.clone().listen(shutdown.clone(), conn));

    settle().await;
    assert!(handler.runs.lock().is_empty());
    assert!(coord.get(&path).await.is_ok(), "a claimed action is left for its owner");

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn malformed_action_is_skipped() {
    let coord = MemoryCoordinator::new();
    coord.create("/hosts/h1/actions/bogus", b"not json".to_vec()).await.unwrap();

    let handler = Arc::new(RecordingHandler::default());
    let listener = Arc::new(ActionListener::new("h1", handler.clone()));
    let shutdown = CancellationToken::new();
    let conn: Arc<dyn Coordinator> = Arc::new(coord.clone());
    let task = tokio::spawn(listener.clone().listen(shutdown.clone(), conn));

    settle().await;
    assert!(handler.runs.lock().is_empty());

    shutdown.cancel();
    task.await.unwrap();
}
