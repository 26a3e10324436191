use std::io::Write;

use peerlog_services::LineFollower;

use crate::*;

fn append(path: &Path, text: &str) {
    let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    f.flush().unwrap();
}

async fn wait_for<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn appended_lines_flow_through_to_records() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_peer("12D3KooWTest", &["/ip4/1.2.3.4/tcp/4001"]);
    let ws = Workspace::new(TABLE).unwrap();

    let log = ws.root.join("node.log");
    std::fs::write(&log, format!("{}\n", want_line("Qm123", "12D3KooWOld"))).unwrap();

    let follower = LineFollower::open(&log, false, Duration::from_millis(10))
        .await
        .unwrap();
    let pipeline = ws.pipeline(&endpoint, Duration::from_secs(15)).unwrap();

    let (shutdown_tx, _) = broadcast::channel(1);
    let (line_tx, line_rx) = mpsc::channel(8);
    let follow_task = tokio::spawn(follower.run(line_tx, shutdown_tx.subscribe()));
    let pipeline_task = tokio::spawn(pipeline.run(line_rx, shutdown_tx.subscribe()));

    append(&log, &format!("{}\n", want_line("Qm123", "12D3KooWTest")));

    let written = wait_for(|| ws.record("doc", "a.txt", "12D3KooWTest").is_some()).await;
    assert!(written, "record was not written");

    shutdown_tx.send(()).unwrap();
    follow_task.await.unwrap().unwrap();
    pipeline_task.await.unwrap().unwrap();

    // Lines present before attach are not processed.
    assert!(ws.record("doc", "a.txt", "12D3KooWOld").is_none());
    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("arg").map(String::as_str), Some("12D3KooWTest"));
}
