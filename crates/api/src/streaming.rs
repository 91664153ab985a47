//! WebSocket live channel.
//!
//! A client connects with `?i=<token>` and then sends
//! `{"type":"registerUser","body":{"userId":…}}` to join its private
//! channel. From then on every [`StreamEvent`] addressed to that user is
//! pushed as a text frame.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use janta_common::{AppError, AppResult};
use janta_core::{StreamEvent, Subscription, UserChannelHub};
use janta_db::entities::user;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::middleware::AppState;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    #[serde(rename = "i")]
    pub token: Option<String>,
}

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "type",
    content = "body",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Join the private channel of `user_id`.
    RegisterUser { user_id: String },
}

/// Server-to-client control message. Events are sent as [`StreamEvent`].
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    content = "body",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Registration accepted.
    Registered { user_id: String },
    /// The last client message was refused.
    Error { message: String },
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let token = query.token.ok_or(AppError::Unauthorized)?;
    let user = state
        .users
        .find_by_token(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    info!(user_id = %user.id, "New streaming connection");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, state)))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, user: user::Model, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription: Option<Subscription> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(client_msg, &user, &state.hub, &mut subscription)
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to parse client message");
                                ServerMessage::Error { message: format!("Invalid message: {e}") }
                            }
                        };
                        if send_json(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!(user_id = %user.id, "Client closed connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            Some(event) = next_event(&mut subscription) => {
                if send_json(&mut sender, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(user_id = %user.id, "Streaming connection closed");
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<StreamEvent> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_json<S, T>(sender: &mut S, value: &T) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(value).unwrap_or_default();
    sender.send(Message::Text(json.into())).await
}

/// Handle a client message.
///
/// Registration is only accepted for the authenticated user. Registering
/// again keeps the existing subscription.
fn handle_client_message(
    msg: ClientMessage,
    user: &user::Model,
    hub: &UserChannelHub,
    subscription: &mut Option<Subscription>,
) -> ServerMessage {
    match msg {
        ClientMessage::RegisterUser { user_id } => {
            if user_id != user.id {
                warn!(user_id = %user.id, requested = %user_id, "Refused registration for another user");
                return ServerMessage::Error {
                    message: "userId does not match the authenticated user".to_string(),
                };
            }
            if subscription.is_none() {
                *subscription = Some(hub.subscribe(&user.id));
                info!(user_id = %user.id, "User registered for live events");
            }
            ServerMessage::Registered { user_id }
        }
    }
}
