//! WebSocket session endpoint
//!
//! On upgrade the session attaches to the fan-out (auto-joining its
//! rooms), outbound envelopes stream as JSON text frames, and inbound
//! frames carry confirmation / negotiation responses forwarded to the
//! matching engine by opaque key.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use types::ids::UserId;

use crate::auth::AuthenticatedUser;
use crate::state::AppState;

/// Frames a session may send us.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
enum InboundFrame {
    #[serde(rename = "quantity:confirmation_response")]
    ConfirmationResponse {
        confirmation_key: String,
        accepted: bool,
        #[serde(default)]
        new_qty: Option<u32>,
    },
    /// Legacy alias for a confirmation response.
    #[serde(rename = "match:approval_response")]
    ApprovalResponse {
        confirmation_key: String,
        accepted: bool,
    },
    #[serde(rename = "negotiation:response")]
    NegotiationResponse { key: String, accepted: bool },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.user_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user: UserId) {
    let (session_id, mut outbound) = state.fanout.attach_session(user);

    loop {
        tokio::select! {
            envelope = outbound.recv() => {
                let Some(envelope) = envelope else { break };
                match serde_json::to_string(&envelope) {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "envelope failed to serialize"),
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_inbound(&state, user, &text).await;
                        if socket.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "session socket error");
                        break;
                    }
                }
            }
        }
    }

    state.fanout.detach_session(session_id);
}

async fn handle_inbound(state: &AppState, user: UserId, text: &str) -> String {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            return json!({"type": "error", "message": format!("unrecognized frame: {}", e)})
                .to_string()
        }
    };

    let result = match frame {
        InboundFrame::ConfirmationResponse {
            confirmation_key,
            accepted,
            new_qty,
        } => {
            state
                .engine
                .clone()
                .handle_session_response(user, &confirmation_key, accepted, new_qty)
                .await
        }
        InboundFrame::ApprovalResponse {
            confirmation_key,
            accepted,
        } => {
            state
                .engine
                .clone()
                .handle_session_response(user, &confirmation_key, accepted, None)
                .await
        }
        InboundFrame::NegotiationResponse { key, accepted } => {
            state.engine.handle_negotiation_response(user, &key, accepted)
        }
    };

    match result {
        Ok(()) => json!({"type": "ack"}).to_string(),
        Err(e) => json!({"type": "error", "message": e.to_string()}).to_string(),
    }
}
