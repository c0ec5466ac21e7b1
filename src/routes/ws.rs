//! WebSocket upgrade + message loop. Client messages are parsed as JSON and forwarded
//! to the session actor as events. Every published session snapshot is pushed back,
//! so replies are asynchronous: a command is answered by the snapshots it causes.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::Event;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "practice_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "practice_backend", "WebSocket connected");
  let mut snapshots = state.session.subscribe();

  let initial = ServerWsMessage::Session { session: snapshots.borrow_and_update().clone() };
  if send_json(&mut socket, &initial).await.is_err() {
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "practice_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state).await
              }
              Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
            };
            if let Some(reply) = reply {
              if send_json(&mut socket, &reply).await.is_err() {
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      changed = snapshots.changed() => {
        if changed.is_err() {
          error!(target: "practice_backend", "Session stopped; closing WebSocket");
          break;
        }
        let msg = ServerWsMessage::Session { session: snapshots.borrow_and_update().clone() };
        if send_json(&mut socket, &msg).await.is_err() {
          break;
        }
      }
    }
  }
  info!(target: "practice_backend", "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "practice_backend", error = %e, "WS send error");
    e
  })
}

/// Forward a client message to the session. Only protocol-level replies (pong, errors)
/// are returned directly; state changes arrive as snapshots.
#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> Option<ServerWsMessage> {
  let events = match msg {
    ClientWsMessage::Ping => return Some(ServerWsMessage::Pong),
    ClientWsMessage::GetSession => {
      return Some(ServerWsMessage::Session { session: state.session.snapshot() });
    }
    other => into_events(other),
  };

  for event in events {
    if let Err(e) = state.session.send(event).await {
      error!(target: "practice_backend", error = %e, "Failed to forward WS command");
      return Some(ServerWsMessage::Error { message: e.to_string() });
    }
  }
  None
}

/// Translate one client message into the session events it stands for, in order.
fn into_events(msg: ClientWsMessage) -> Vec<Event> {
  match msg {
    ClientWsMessage::Ping | ClientWsMessage::GetSession => Vec::new(),
    ClientWsMessage::SelectTopic { topic } => vec![Event::SelectTopic(topic)],
    ClientWsMessage::SelectDifficulty { difficulty } => vec![Event::SelectDifficulty(difficulty)],
    ClientWsMessage::SelectLanguage { language } => vec![Event::SelectLanguage(language)],
    ClientWsMessage::EditCode { code } => vec![Event::EditCode(code)],
    ClientWsMessage::EditTestcases { text } => vec![Event::EditTestcases(text)],
    ClientWsMessage::CommitTestcases => vec![Event::CommitTestcases],
    ClientWsMessage::NewProblem => vec![Event::RequestProblem],
    ClientWsMessage::ReviewProblem => vec![Event::RequestReview],
    ClientWsMessage::AlternateAnswer => vec![Event::RequestAlternateAnswer],
    ClientWsMessage::Submit { code, testcases, language } => {
      let mut events = Vec::new();
      if let Some(language) = language {
        events.push(Event::SelectLanguage(language));
      }
      if let Some(code) = code {
        events.push(Event::EditCode(code));
      }
      if let Some(text) = testcases {
        events.push(Event::EditTestcases(text));
      }
      events.push(Event::Submit);
      events
    }
    ClientWsMessage::RunFreeInput { stdin } => vec![Event::RunFreeInput { stdin }],
    ClientWsMessage::ResetStats => vec![Event::ResetStats],
  }
}
