//! Single-instance arbitration at launch.

use crate::instance::{InstanceError, InstanceLock, InstanceResult};

#[cfg(unix)]
use crate::instance::ActivationBus;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mm_config::InstanceConfig;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Outcome of the launch-time arbitration.
pub enum Arbitration {
    /// This process is the only supervisor
    Proceed(PrimaryInstance),
    /// Another supervisor exists; exit quietly
    Duplicate,
}

/// Capabilities held by the winning process.
pub struct PrimaryInstance {
    #[cfg(unix)]
    bus: Option<Arc<ActivationBus>>,
}

impl PrimaryInstance {
    /// Run `on_activate` whenever another copy of the application launches.
    pub fn listen<F>(self, on_activate: F) -> Option<JoinHandle<()>>
    where
        F: Fn() + Send + Sync + 'static,
    {
        #[cfg(unix)]
        {
            self.bus.map(|bus| bus.listen(on_activate))
        }
        #[cfg(not(unix))]
        {
            let _ = on_activate;
            None
        }
    }
}

/// Decides whether this process may supervise the server.
///
/// Two independent checks must both pass: the exclusive lock on the lock
/// file, and the absence of a reply to an activation broadcast.
pub struct InstanceCoordinator {
    app_id: String,
    lock_path: PathBuf,
    activation_dir: PathBuf,
    handshake_timeout: Duration,
    lock: Mutex<Option<InstanceLock>>,
}

impl InstanceCoordinator {
    pub fn new(
        app_id: impl Into<String>,
        lock_path: impl Into<PathBuf>,
        activation_dir: impl Into<PathBuf>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            lock_path: lock_path.into(),
            activation_dir: activation_dir.into(),
            handshake_timeout,
            lock: Mutex::new(None),
        }
    }

    pub fn from_config(config: &InstanceConfig) -> InstanceResult<Self> {
        Ok(Self::new(
            config.app_id.clone(),
            config.lock_path()?,
            config.activation_dir()?,
            config.handshake_timeout(),
        ))
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Take the instance lock. Returns immediately; `false` means another
    /// process holds it.
    pub fn acquire_lock(&self) -> bool {
        match self.try_lock() {
            Ok(acquired) => acquired,
            Err(e) => {
                error!("{e}");
                false
            }
        }
    }

    /// Like `acquire_lock`, but surfaces I/O failures.
    pub fn try_lock(&self) -> InstanceResult<bool> {
        let mut held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if held.as_ref().is_some_and(InstanceLock::is_held) {
            return Ok(true);
        }

        match InstanceLock::try_acquire(&self.lock_path)
            .map_err(|e| InstanceError::lock(self.lock_path.clone(), e))?
        {
            Some(lock) => {
                info!("Acquired instance lock {}", self.lock_path.display());
                *held = Some(lock);
                Ok(true)
            }
            None => {
                info!(
                    "Instance lock {} is held by another process",
                    self.lock_path.display()
                );
                Ok(false)
            }
        }
    }

    /// Release the instance lock. Safe to call more than once.
    pub fn release_lock(&self) {
        if let Some(mut lock) = self
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            lock.release();
        }
    }

    /// Run both checks concurrently and combine them.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn arbitrate(&self) -> Arbitration {
        #[cfg(unix)]
        let (locked, bus, existing) = {
            let bus = match ActivationBus::bind(&self.activation_dir, &self.app_id) {
                Ok(bus) => Some(bus),
                Err(e) => {
                    warn!("{e}; relying on the lock file alone");
                    None
                }
            };

            let handshake = async {
                match bus {
                    Some(ref bus) => bus.check_existing_instance(self.handshake_timeout).await,
                    None => false,
                }
            };
            let (locked, existing) = tokio::join!(async { self.acquire_lock() }, handshake);
            (locked, bus, existing)
        };

        #[cfg(not(unix))]
        let (locked, existing) = (self.acquire_lock(), false);

        if !locked || existing {
            info!(
                "Another instance is running (lock acquired: {locked}, reply received: {existing})"
            );
            self.release_lock();
            return Arbitration::Duplicate;
        }

        Arbitration::Proceed(PrimaryInstance {
            #[cfg(unix)]
            bus: bus.map(Arc::new),
        })
    }
}

impl Drop for InstanceCoordinator {
    fn drop(&mut self) {
        self.release_lock();
    }
}
