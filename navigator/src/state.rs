use std::sync::RwLock;

use navigator_lib::session::NavigationSnapshot;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::runtime::{Command, RuntimeHandle};

/// What display clients receive over the event stream, one JSON object per message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayMessage {
    Snapshot(NavigationSnapshot),
    Alert { message: String },
    Error { message: String },
}

pub struct DisplayState {
    // Channel used to send messages to all connected clients.
    pub tx: broadcast::Sender<String>,
    snapshot: RwLock<Option<NavigationSnapshot>>,
    handle: RuntimeHandle,
}

impl DisplayState {
    pub fn new(handle: RuntimeHandle) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            tx,
            snapshot: RwLock::new(None),
            handle,
        }
    }

    pub fn snapshot(&self) -> Option<NavigationSnapshot> {
        self.snapshot.read().ok().and_then(|snapshot| snapshot.clone())
    }

    /// Stores the snapshot and broadcasts it if it differs from the last one.
    pub fn set_snapshot(&self, snapshot: NavigationSnapshot) {
        let Ok(mut current) = self.snapshot.write() else {
            tracing::error!("Snapshot lock poisoned");
            return;
        };
        if current.as_ref() == Some(&snapshot) {
            return;
        }

        *current = Some(snapshot.clone());
        drop(current);
        self.publish(&DisplayMessage::Snapshot(snapshot));
    }

    pub fn publish(&self, message: &DisplayMessage) {
        match serde_json::to_string(message) {
            Ok(json) => {
                // No receivers is fine.
                let _ = self.tx.send(json);
            }
            Err(err) => tracing::error!("Failed to serialize display message: {err}"),
        }
    }

    pub fn send_command(&self, command: Command) -> bool {
        self.handle.send(command)
    }
}
