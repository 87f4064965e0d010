//! Activation handshake between a launching copy and a running one.
//!
//! Every participant binds a datagram socket in a shared rendezvous
//! directory. A launching copy broadcasts `activate-request`; the running
//! copy brings itself to the foreground and answers with
//! `already-running-reply`. Delivery is best effort.

use crate::instance::{InstanceError, InstanceResult};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UnixDatagram;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_MESSAGE_BYTES: usize = 1024;
const SOCKET_EXTENSION: &str = "sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ActivationMessage {
    ActivateRequest { sender: String },
    AlreadyRunningReply { sender: String },
}

impl ActivationMessage {
    fn sender(&self) -> &str {
        match self {
            Self::ActivateRequest { sender } | Self::AlreadyRunningReply { sender } => sender,
        }
    }
}

/// This process's endpoint on the activation channel.
pub struct ActivationBus {
    dir: PathBuf,
    socket_path: PathBuf,
    identity: String,
    socket: UnixDatagram,
}

impl ActivationBus {
    /// Bind a fresh endpoint in `dir`. Must be called inside a Tokio runtime.
    pub fn bind(dir: &Path, app_id: &str) -> InstanceResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| InstanceError::activation(dir.to_path_buf(), e))?;

        let pid = std::process::id();
        let nonce = Uuid::new_v4().simple().to_string();
        let identity = format!("{app_id}:{pid}:{nonce}");

        // Socket paths are length-limited; keep the file name short
        let socket_path = dir.join(format!("{pid}-{}.{SOCKET_EXTENSION}", &nonce[..8]));
        let socket = UnixDatagram::bind(&socket_path)
            .map_err(|e| InstanceError::activation(socket_path.clone(), e))?;

        debug!("Activation endpoint bound at {}", socket_path.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            socket_path,
            identity,
            socket,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Send `message` to every other endpoint in the rendezvous directory.
    ///
    /// Endpoints nobody listens on anymore are removed.
    pub async fn broadcast(&self, message: &ActivationMessage) {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode activation message: {e}");
                return;
            }
        };

        for peer in self.peers() {
            match self.socket.send_to(&payload, &peer).await {
                Ok(_) => debug!("Sent activation message to {}", peer.display()),
                Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                    debug!("Removing stale activation endpoint {}", peer.display());
                    let _ = std::fs::remove_file(&peer);
                }
                Err(e) => debug!("Failed to reach {}: {e}", peer.display()),
            }
        }
    }

    fn peers(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION))
            .filter(|path| *path != self.socket_path)
            .collect()
    }

    /// Next well-formed message from another participant.
    async fn recv(&self) -> std::io::Result<ActivationMessage> {
        let mut buf = [0u8; MAX_MESSAGE_BYTES];

        loop {
            let len = self.socket.recv(&mut buf).await?;
            match serde_json::from_slice::<ActivationMessage>(&buf[..len]) {
                Ok(message) if message.sender() != self.identity => return Ok(message),
                Ok(_) => {}
                Err(e) => warn!("Ignoring malformed activation message: {e}"),
            }
        }
    }

    /// Announce this launch and wait up to `window` for a running copy to
    /// answer. A timeout means no running copy was found.
    pub async fn check_existing_instance(&self, window: Duration) -> bool {
        self.broadcast(&ActivationMessage::ActivateRequest {
            sender: self.identity.clone(),
        })
        .await;

        let wait_for_reply = async {
            loop {
                match self.recv().await {
                    Ok(ActivationMessage::AlreadyRunningReply { sender }) => {
                        info!("Instance {sender} is already running");
                        return true;
                    }
                    Ok(ActivationMessage::ActivateRequest { .. }) => {}
                    Err(e) => {
                        warn!("Activation channel read failed: {e}");
                        return false;
                    }
                }
            }
        };

        tokio::time::timeout(window, wait_for_reply)
            .await
            .unwrap_or(false)
    }

    /// Answer activation requests for the rest of the process lifetime,
    /// running `on_activate` for each.
    pub fn listen<F>(self: Arc<Self>, on_activate: F) -> JoinHandle<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            loop {
                match self.recv().await {
                    Ok(ActivationMessage::ActivateRequest { sender }) => {
                        info!("Activation requested by {sender}");
                        on_activate();
                        self.broadcast(&ActivationMessage::AlreadyRunningReply {
                            sender: self.identity.clone(),
                        })
                        .await;
                    }
                    Ok(ActivationMessage::AlreadyRunningReply { .. }) => {}
                    Err(e) => {
                        warn!("Activation listener stopped: {e}");
                        return;
                    }
                }
            }
        })
    }
}

impl Drop for ActivationBus {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
