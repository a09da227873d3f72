//! End-to-end tests over a real listener.

use std::collections::BTreeMap;

use http_interceptor::{Dispatcher, RequestContext, ResponseWriter};

mod common;
use common::{channel_sink, next_record, TEST_RESPONSE_BODY};

#[tokio::test]
async fn test_served_request_is_logged_with_peer_address() {
    let (sink, mut rx) = channel_sink();
    let dispatcher = Dispatcher::builder()
        .service(common::hello_app())
        .without_default_sink()
        .sink(sink)
        .build()
        .unwrap();
    let (addr, shutdown, handle) = common::start_server(dispatcher).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("http://{}/greet?name=ada", addr))
        .header("user-agent", "server-test")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(res.text().await.unwrap(), TEST_RESPONSE_BODY);

    let record = next_record(&mut rx).await;
    assert_eq!(record.request_id, request_id);
    assert_eq!(record.url, "/greet?name=ada");
    assert_eq!(record.status, 200);
    assert_eq!(record.useragent.as_deref(), Some("server-test"));
    assert!(
        record.ip_address.starts_with("127.0.0.1:"),
        "unexpected peer {:?}",
        record.ip_address
    );
    assert!(record.duration_ms >= 0.0);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_counters_endpoint_over_http() {
    let dispatcher = Dispatcher::builder()
        .service(common::hello_app())
        .without_default_sink()
        .build()
        .unwrap();
    let counters = dispatcher.counters().clone();
    let (addr, shutdown, handle) = common::start_server(dispatcher).await;

    let client = reqwest::Client::new();
    for path in ["/a", "/a", "/b"] {
        let res = client.get(format!("http://{}{}", addr, path)).send().await.unwrap();
        assert!(res.status().is_success());
    }
    common::wait_for_count(&counters, "/a", 2).await;
    common::wait_for_count(&counters, "/b", 1).await;

    let res = client
        .get(format!("http://{}/__/counters", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let snapshot: BTreeMap<String, u64> = res.json().await.unwrap();
    assert_eq!(snapshot, BTreeMap::from([("/a".to_string(), 2), ("/b".to_string(), 1)]));

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_context_handler_over_http() {
    let (sink, mut rx) = channel_sink();
    let dispatcher = Dispatcher::builder()
        .context_handler(|ctx: &mut RequestContext| {
            let echoed = ctx.body().clone();
            ctx.set_status(axum::http::StatusCode::ACCEPTED);
            ctx.write_body(&echoed);
        })
        .without_default_sink()
        .sink(sink)
        .build()
        .unwrap();
    let (addr, shutdown, handle) = common::start_server(dispatcher).await;

    let res = reqwest::Client::new()
        .post(format!("http://{}/echo", addr))
        .body("ping")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    assert_eq!(res.text().await.unwrap(), "ping");

    let record = next_record(&mut rx).await;
    assert_eq!(record.status, 202);
    assert_eq!(record.url, format!("http://{}/echo", addr));

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let dispatcher = Dispatcher::builder()
        .service(common::hello_app())
        .without_default_sink()
        .build()
        .unwrap();
    let (addr, shutdown, handle) = common::start_server(dispatcher).await;

    shutdown.trigger();
    handle.await.unwrap();

    let result = reqwest::Client::new()
        .get(format!("http://{}/", addr))
        .send()
        .await;
    assert!(result.is_err());
}
