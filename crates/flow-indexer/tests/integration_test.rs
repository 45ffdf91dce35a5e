// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use flow_indexer::{Config, HttpBulkSink, IndexRecord, Pipeline};
use mockito::{Matcher, Server, ServerOpts};
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn test_config(url: &str) -> Config {
    Config {
        url: url.to_string(),
        username: None,
        password: None,
        https_proxy: None,
        buffer_size: 64,
        bulk_size: 2,
        bulk_timeout: Duration::from_millis(50),
        empty_sleep: Duration::from_millis(10),
        sink_down_sleep: Duration::from_millis(50),
        flush_timeout: Duration::from_secs(1),
    }
}

fn record(i: usize) -> IndexRecord {
    IndexRecord::new("flowdata", json!({ "seq": i }))
}

#[tokio::test]
async fn pipeline_ships_submitted_records_as_bulk() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/_bulk")
        .match_header("Content-Type", "application/x-ndjson")
        .with_status(200)
        .with_body(r#"{"errors":false,"items":[]}"#)
        .create_async()
        .await;

    let config = test_config(&server.url());
    let pipeline = Pipeline::start(&config, HttpBulkSink::new(&config));

    pipeline.submit(record(0));
    pipeline.submit(record(1));

    let flushed = async {
        while !mock.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };
    match timeout(Duration::from_secs(5), flushed).await {
        Ok(_) => mock.assert_async().await,
        Err(_) => panic!("timed out before the sink received a bulk"),
    }

    pipeline.request_shutdown();
    pipeline.join().await;
}

#[tokio::test]
async fn sink_outage_discards_in_flight_batch_and_drains_backlog_on_recovery() {
    // Reserve an address the sink will come up on later.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}");

    let config = test_config(&url);
    let pipeline = Pipeline::start(&config, HttpBulkSink::new(&config));

    // This record is flushed into the outage and lost.
    pipeline.submit(record(0));
    sleep(Duration::from_millis(150)).await;

    // Backlog accumulated while the sink is down stays queued.
    pipeline.submit(record(1));
    pipeline.submit(record(2));
    assert_eq!(pipeline.queued(), 2);

    // Bring the sink up on the reserved address. The bulk matcher pins the
    // recovered flush to the backlog records; the lost batch is never
    // re-sent, so seq 0 must not appear.
    let mut server = Server::new_with_opts_async(ServerOpts {
        port,
        ..Default::default()
    })
    .await;
    let ping = server
        .mock("GET", "/")
        .with_status(200)
        .with_body(r#"{"name":"flowdata"}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let bulk = server
        .mock("POST", "/_bulk")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""seq":1"#.to_string()),
            Matcher::Regex(r#""seq":2"#.to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"errors":false,"items":[]}"#)
        .create_async()
        .await;

    let recovered = async {
        while !bulk.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };
    match timeout(Duration::from_secs(5), recovered).await {
        Ok(_) => {
            ping.assert_async().await;
            bulk.assert_async().await;
        }
        Err(_) => panic!("timed out before the pipeline recovered from the outage"),
    }

    pipeline.request_shutdown();
    pipeline.join().await;
}

#[tokio::test]
async fn shutdown_drains_backlog_before_terminating() {
    let mut server = Server::new_async().await;
    let bulk = server
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(r#"{"errors":false,"items":[]}"#)
        .expect(2)
        .create_async()
        .await;

    let config = test_config(&server.url());
    let pipeline = Pipeline::start(&config, HttpBulkSink::new(&config));

    // Current-thread runtime: the worker first runs inside join(), after the
    // shutdown request, so the whole backlog drains as part of termination.
    for i in 0..3 {
        pipeline.submit(record(i));
    }
    pipeline.request_shutdown();

    timeout(Duration::from_secs(5), pipeline.join())
        .await
        .expect("join did not return");

    bulk.assert_async().await;
    assert_eq!(pipeline.queued(), 0);
}
