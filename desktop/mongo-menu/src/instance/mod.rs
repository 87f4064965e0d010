mod coordinator;
mod error;
#[cfg(unix)]
mod handshake;
mod lock;

pub use coordinator::{Arbitration, InstanceCoordinator, PrimaryInstance};
pub use error::{InstanceError, Result as InstanceResult};
#[cfg(unix)]
pub use handshake::{ActivationBus, ActivationMessage};
pub use lock::InstanceLock;
