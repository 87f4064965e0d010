use serde::Serialize;

/// Externally visible status: whether the server runs and on which port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub port: u16,
}
