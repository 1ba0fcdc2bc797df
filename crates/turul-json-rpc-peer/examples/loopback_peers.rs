//! Loopback Peers Example
//!
//! Two connections wired back to back over in-process channels. The "server"
//! side registers calculator methods, a state-gated method, a deferred method
//! and a notification; it also calls back into the "client" while serving a
//! request, showing that both ends can issue calls.
//!
//! Run with `RUST_LOG=debug` to see the engine's logging.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use turul_json_rpc_peer::prelude::*;

#[derive(Deserialize)]
struct AddParams {
    a: f64,
    b: f64,
}

fn server_engine() -> Result<Engine, PeerError> {
    let engine = Engine::builder()
        .diagnostics(|d| info!(?d, "server diagnostic"))
        .build()?;

    engine.register_method("add", MethodOptions::new(), |_cx, params| {
        let AddParams { a, b } = params.parse()?;
        Ok(json!(a + b))
    })?;

    engine.register_method("subtract", MethodOptions::new().positional(), |_cx, params| {
        let (a, b): (f64, f64) = params.parse()?;
        Ok(json!(a - b))
    })?;

    engine.register_method("handshake", MethodOptions::new(), |cx, _params| {
        cx.connection().set_state("ready");
        // ask the client who it is; the answer arrives later on the same connection
        cx.connection()
            .call("client_info", json!({}), |result| {
                info!(?result, "client identified itself");
            })
            .map_err(HandlerError::failed)?;
        Ok(json!("welcome"))
    })?;

    engine.register_method(
        "secret",
        MethodOptions::new().state("ready"),
        |_cx, _params| Ok(json!(42)),
    )?;

    engine.register_deferred(
        "slow_echo",
        MethodOptions::new().positional(),
        |_cx, params, responder| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                responder.success(params.into_value());
            });
        },
    )?;

    engine.register_method("log", MethodOptions::new().notification(), |_cx, params| {
        info!(message = ?params.get("message"), "peer log");
        Ok(serde_json::Value::Null)
    })?;

    Ok(engine)
}

fn client_engine() -> Result<Engine, PeerError> {
    let engine = Engine::default();
    engine.register_method("client_info", MethodOptions::new(), |_cx, _params| {
        Ok(json!({"name": "loopback-client", "version": env!("CARGO_PKG_VERSION")}))
    })?;
    Ok(engine)
}

/// Forward everything one connection writes into the other's `handle`
fn pump(mut rx: mpsc::UnboundedReceiver<String>, to: Connection) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = to.handle(&text) {
                info!(error = %e, "inbound message rejected");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (to_server, server_rx) = mpsc::unbounded_channel::<String>();
    let (to_client, client_rx) = mpsc::unbounded_channel::<String>();

    let server = server_engine()?
        .connection()
        .initial_state("init")
        .output(move |text: String| {
            let _ = to_client.send(text);
        })
        .build()?;
    let client = client_engine()?
        .connection()
        .output(move |text: String| {
            let _ = to_server.send(text);
        })
        .build()?;

    pump(server_rx, server.clone());
    pump(client_rx, client.clone());

    println!("add      -> {}", client.request("add", json!({"a": 5, "b": 3}))?.await?);
    println!("subtract -> {}", client.request("subtract", json!([10, 4]))?.await?);

    match client.request("secret", json!({}))?.await {
        Err(PeerError::Remote(e)) => println!("secret   -> rejected ({})", e),
        other => println!("secret   -> {:?}", other),
    }
    println!("handshake-> {}", client.request("handshake", json!({}))?.await?);
    println!("secret   -> {}", client.request("secret", json!({}))?.await?);

    println!("slow_echo-> {}", client.request("slow_echo", json!(["later"]))?.await?);

    client.notify("log", json!({"message": "hello from the client"}))?;

    match client.request("multiply", json!({"a": 2, "b": 3}))?.await {
        Err(PeerError::Remote(e)) => println!("multiply -> {}", e),
        other => println!("multiply -> {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    client.close();
    server.close();
    Ok(())
}
