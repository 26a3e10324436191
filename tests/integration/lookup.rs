use crate::*;

#[tokio::test]
async fn request_carries_peer_and_verbose_flag() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_peer("12D3KooWTest", &["/ip4/1.2.3.4/tcp/4001"]);

    let resolver = HttpResolver::new(&endpoint, Duration::from_secs(15)).unwrap();
    let info = resolver.resolve("12D3KooWTest").await.unwrap().unwrap();
    assert_eq!(info.addrs, vec!["/ip4/1.2.3.4/tcp/4001"]);

    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("arg").map(String::as_str), Some("12D3KooWTest"));
    assert_eq!(calls[0].get("verbose").map(String::as_str), Some("false"));
    assert_eq!(node.content_types(), vec!["application/json"]);
}

#[tokio::test]
async fn mismatched_peer_is_not_accepted() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_behavior(Behavior::Mismatch);

    let resolver = HttpResolver::new(&endpoint, Duration::from_secs(15)).unwrap();
    assert!(resolver.resolve("12D3KooWTest").await.unwrap().is_none());
}

#[tokio::test]
async fn mismatched_peer_writes_no_record() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_behavior(Behavior::Mismatch);
    let ws = Workspace::new(TABLE).unwrap();

    let pipeline = ws.pipeline(&endpoint, Duration::from_secs(15)).unwrap();
    let stats = pipeline.stats();
    run_lines(pipeline, vec![want_line("Qm123", "12D3KooWTest")])
        .await
        .unwrap();

    assert_eq!(node.calls().len(), 1);
    assert_eq!(stats.snapshot().peer_not_found, 1);
    assert!(ws.record("doc", "a.txt", "12D3KooWTest").is_none());
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_behavior(Behavior::Fail);

    let resolver = HttpResolver::new(&endpoint, Duration::from_secs(15)).unwrap();
    match resolver.resolve("12D3KooWTest").await {
        Err(ResolveError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_node_times_out_and_loop_continues() {
    let (node, endpoint) = spawn_mock().await.unwrap();
    node.set_peer("12D3KooWTest", &["/ip4/1.2.3.4/tcp/4001"]);
    node.set_behavior(Behavior::Slow(Duration::from_secs(2)));
    let ws = Workspace::new(TABLE).unwrap();

    let pipeline = ws.pipeline(&endpoint, Duration::from_millis(200)).unwrap();
    let stats = pipeline.stats();
    run_lines(
        pipeline,
        vec![
            want_line("Qm123", "12D3KooWTest"),
            want_line("Qm123", "12D3KooWTest"),
        ],
    )
    .await
    .unwrap();

    let s = stats.snapshot();
    assert_eq!(s.resolve_failed, 2);
    assert_eq!(s.records_written, 0);
    assert!(ws.record("doc", "a.txt", "12D3KooWTest").is_none());
}

#[tokio::test]
async fn unreachable_node_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoint = format!("http://127.0.0.1:{port}/api/v0/dht/findpeer");

    let resolver = HttpResolver::new(&endpoint, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        resolver.resolve("12D3KooWTest").await,
        Err(ResolveError::Transport(_))
    ));
}
