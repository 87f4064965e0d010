mod diagnosis;
mod error;
mod installation;
mod lifecycle;
mod output;
mod port;
mod process;
mod server_state;
mod server_status;
mod status_publisher;

pub use diagnosis::{DIAGNOSIS_LINES, Diagnosis, classify_line, diagnose_log, tail_lines};
pub use error::{Result as StartResult, StartError};
pub use installation::Installation;
pub use lifecycle::{ServerManager, StopOutcome};
pub use port::PortManager;
pub use process::{ExitReport, server_args, shutdown_args};
pub use server_state::ServerState;
pub use server_status::ServerStatus;
pub use status_publisher::{Notification, StatusPublisher};
