//! A chat server, one room per websocket path.
//!
//! A client first names itself with `{"name": "..."}` and then talks with
//! `{"message": "..."}`. Everybody in the room hears about joins, leaves and messages.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use regex::Regex;
use serde_json::{Value, json};
use texa::middleware::{BoxError, Next, logger, middleware_fn};
use texa::ws::{CloseEvent, SocketError, SocketId, WebSocket};
use texa::{Application, ApplicationBuilder, Request, Response};
use tracing::{debug, error, info};

const MAX_MESSAGE_CHARS: usize = 2000;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[A-Za-z0-9_]{3,32}$").expect("valid name pattern"));

type Room = HashMap<String, WebSocket>;

#[derive(Debug, Default)]
struct Chat {
    rooms: Mutex<HashMap<String, Room>>,
    names: DashMap<SocketId, String>,
}

impl Chat {
    fn accept(self: &Arc<Self>, socket: &WebSocket) {
        let chat = Arc::clone(self);
        socket.on_message(move |socket, text| {
            let chat = Arc::clone(&chat);
            async move {
                if let Err(e) = chat.receive(&socket, &text).await {
                    debug!(socket_id = %socket.id(), cause = %e, "can't answer chat message");
                }
            }
        });

        let chat = Arc::clone(self);
        socket.on_close(move |socket, close| {
            let chat = Arc::clone(&chat);
            async move { chat.leave(&socket, close).await }
        });
    }

    async fn receive(&self, socket: &WebSocket, text: &str) -> Result<(), SocketError> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return socket.close(Some(1003), &e.to_string()).await,
        };
        let Some(object) = value.as_object() else {
            return socket.close(Some(1002), "The message should be a JSON object.").await;
        };

        let current = self.names.get(&socket.id()).map(|name| name.value().clone());
        match (object.get("name"), object.get("message"), current) {
            (Some(_), _, Some(_)) => socket.close(Some(1008), "Socket name is already set.").await,
            (Some(name), _, None) => self.join(socket, name).await,
            (None, Some(_), None) => {
                socket.close(Some(1002), "The socket should be welcomed before sending or receiving any messages.").await
            }
            (None, Some(message), Some(name)) => self.say(socket, &name, message).await,
            (None, None, _) => socket.close(Some(1002), "Not understood!").await,
        }
    }

    async fn join(&self, socket: &WebSocket, name: &Value) -> Result<(), SocketError> {
        let Some(name) = name.as_str() else {
            return socket.close(Some(1002), "The name should be a string.").await;
        };
        if !NAME_PATTERN.is_match(name) {
            return socket
                .close(Some(4002), "The name should be 3 to 32 characters of letters, digits and underscores.")
                .await;
        }

        let joined = {
            let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
            let room = rooms.entry(socket.path().to_string()).or_default();
            if room.contains_key(name) {
                None
            } else {
                room.insert(name.to_string(), socket.clone());
                let names: Vec<String> = room.keys().cloned().collect();
                let others: Vec<WebSocket> = room.values().filter(|other| other.id() != socket.id()).cloned().collect();
                Some((names, others))
            }
        };
        let Some((names, others)) = joined else {
            return socket.close(Some(4001), "The name is already in use.").await;
        };
        self.names.insert(socket.id(), name.to_string());
        info!(room = socket.path(), name, "joined");

        let welcome = json!({ "welcome": name, "connected": names.len(), "names": names });
        socket.send_text(welcome.to_string()).await?;
        broadcast(&others, &json!({ "type": "joined", "name": name, "ts": now() })).await;
        Ok(())
    }

    async fn say(&self, socket: &WebSocket, name: &str, message: &Value) -> Result<(), SocketError> {
        let Some(message) = message.as_str() else {
            return socket.close(Some(1002), "The message should be a string.").await;
        };
        if message.is_empty() {
            return Ok(());
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            let error = json!({ "error": format!("Message must be shorter than {MAX_MESSAGE_CHARS} characters.") });
            return socket.send_text(error.to_string()).await;
        }

        let members = self.members(socket.path());
        broadcast(&members, &json!({ "type": "message", "name": name, "ts": now(), "message": message })).await;
        Ok(())
    }

    async fn leave(&self, socket: &WebSocket, close: CloseEvent) {
        let Some((_, name)) = self.names.remove(&socket.id()) else {
            return;
        };
        info!(room = socket.path(), %name, code = ?close.code, "left");

        let remaining = {
            let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(room) = rooms.get_mut(socket.path()) else {
                return;
            };
            room.remove(&name);
            if room.is_empty() {
                rooms.remove(socket.path());
                return;
            }
            room.values().cloned().collect::<Vec<_>>()
        };
        broadcast(&remaining, &json!({ "type": "left", "name": name, "ts": now() })).await;
    }

    fn members(&self, room: &str) -> Vec<WebSocket> {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.get(room).map(|room| room.values().cloned().collect()).unwrap_or_default()
    }
}

async fn broadcast(sockets: &[WebSocket], value: &Value) {
    let text = value.to_string();
    for socket in sockets {
        if let Err(e) = socket.send_text(text.clone()).await {
            debug!(socket_id = %socket.id(), cause = %e, "skip broadcast");
        }
    }
}

fn now() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_millis()).unwrap_or_default()
}

async fn usage(_req: &mut Request, res: &mut Response, _next: Next<'_>) -> Result<(), BoxError> {
    res.send("texa chat: open a websocket on any path to enter that room").await?;
    Ok(())
}

fn application(chat: Arc<Chat>) -> ApplicationBuilder {
    Application::builder()
        .use_middleware(logger())
        .use_middleware(middleware_fn(usage))
        .on_connection(move |socket: WebSocket| {
            chat.accept(&socket);
            async {}
        })
        .on_error(|e| error!(cause = %e, "websocket handshake failed"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args().nth(1).unwrap_or_else(|| "0.0.0.0:4000".to_string());
    application(Arc::new(Chat::default())).address(address).log_level("info").build()?.listen().await?;
    Ok(())
}
