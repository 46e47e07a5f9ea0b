use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bigtwo_server::app::{AppState, Session};
use bigtwo_server::cli::ServerCli;
use bigtwo_server::config::Config;
use bigtwo_server::protocol::{ClientMessage, ServerMessage};
use bigtwo_server::rooms::RoomManager;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServerCli::parse();

    let log_filter = if cli.debug {
        "debug"
    } else {
        "bigtwo_server=info,bigtwo_core=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.debug)
        .init();

    let mut cfg = Config::load_or_create(&cli.config)
        .with_context(|| format!("loading or creating config '{}'", cli.config.display()))?;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if cli.persist {
        cfg.save(&cli.config)
            .with_context(|| format!("saving updated config '{}'", cli.config.display()))?;
    }
    info!(config = %cli.config.display(), ?cfg, "configuration loaded");

    let state = AppState::new(RoomManager::new().with_settings(cfg.room_settings()));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let session = Session::new(rand::thread_rng().gen::<u64>(), tx);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let _ = session.tx.send(ServerMessage::Connected {
        player_id: session.player_id.clone(),
        name: session.name.clone(),
    });
    info!(player = %session.player_id, "connected");

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(client) => state.handle_client_message(&session, client).await,
            Err(err) => {
                debug!(player = %session.player_id, %err, "malformed message");
                let _ = session.tx.send(ServerMessage::Error {
                    message: "invalid message".to_string(),
                });
                continue;
            }
        };
        if let Err(err) = reply {
            debug!(player = %session.player_id, %err, "rejected");
            let _ = session.tx.send(ServerMessage::Error {
                message: err.to_string(),
            });
        }
    }

    state.disconnect(&session.player_id).await;
    info!(player = %session.player_id, "disconnected");
}
