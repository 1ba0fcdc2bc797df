//! Deferred completion and awaitable calls across tokio tasks.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use turul_json_rpc_peer::prelude::*;

/// Connection whose output is forwarded to a channel
fn channel_connection(engine: &Engine) -> (Connection, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = engine
        .connection()
        .output(move |text: String| {
            let _ = tx.send(text);
        })
        .build()
        .unwrap();
    (connection, rx)
}

/// Pump messages from `rx` into `to` until the channel closes
fn pump(mut rx: mpsc::UnboundedReceiver<String>, to: Connection) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            let _ = to.handle(&text);
        }
    });
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed");
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_deferred_response_from_another_task() {
    let engine = Engine::default();
    engine
        .register_deferred("slow", MethodOptions::new().positional(), |_cx, params, responder| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                responder.success(params.into_value());
            });
        })
        .unwrap();
    let (connection, mut rx) = channel_connection(&engine);

    connection
        .handle(r#"{"jsonrpc":"2.0","method":"slow","params":[1,2],"id":9}"#)
        .unwrap();
    assert!(rx.try_recv().is_err(), "nothing is written before the responder fires");

    let response = next_message(&mut rx).await;
    assert_eq!(response, json!({"jsonrpc": "2.0", "id": 9, "result": [1, 2]}));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err(), "exactly one response");
}

#[tokio::test]
async fn test_deferred_responses_in_completion_order() {
    let engine = Engine::default();
    engine
        .register_deferred("wait", MethodOptions::new(), |_cx, params, responder| {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                responder.success(json!(ms));
            });
        })
        .unwrap();
    let (connection, mut rx) = channel_connection(&engine);

    connection
        .handle(r#"{"jsonrpc":"2.0","method":"wait","params":{"ms":80},"id":"slow"}"#)
        .unwrap();
    connection
        .handle(r#"{"jsonrpc":"2.0","method":"wait","params":{"ms":5},"id":"fast"}"#)
        .unwrap();

    assert_eq!(next_message(&mut rx).await["id"], "fast");
    assert_eq!(next_message(&mut rx).await["id"], "slow");
}

#[tokio::test]
async fn test_request_resolves_over_linked_peers() {
    let client = Engine::default();
    let server = Engine::default();
    server
        .register_method("sum", MethodOptions::new().positional(), |_cx, params| {
            let numbers: Vec<i64> = params.parse()?;
            Ok(json!(numbers.iter().sum::<i64>()))
        })
        .unwrap();

    let (client_conn, client_out) = channel_connection(&client);
    let (server_conn, server_out) = channel_connection(&server);
    pump(client_out, server_conn.clone());
    pump(server_out, client_conn.clone());

    let total = client_conn.request("sum", json!([1, 2, 3])).unwrap().await.unwrap();
    assert_eq!(total, json!(6));

    let missing = client_conn.request("product", json!([2, 3])).unwrap().await;
    match missing {
        Err(PeerError::Remote(error)) => assert_eq!(error.code, METHOD_NOT_FOUND),
        other => panic!("expected a remote error, got {:?}", other),
    }
    assert_eq!(client_conn.pending_calls(), 0);
}

#[tokio::test]
async fn test_request_is_abandoned_on_close() {
    let engine = Engine::default();
    let (connection, _rx) = channel_connection(&engine);

    let pending = connection.request("never", json!({})).unwrap();
    assert!(connection.is_pending(pending.id()));
    connection.close();

    assert!(matches!(pending.await, Err(PeerError::Abandoned)));
}
