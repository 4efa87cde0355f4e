use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::backend::{AcceleratorIdentity, ComputeBackend};
use crate::error::GpuError;
use crate::response::DeviceInfo;
use crate::wgpu_backend::WgpuBackend;

/// Diagnostic reported when an unavailable manager was given no message.
pub const DEFAULT_DIAGNOSTIC: &str = "No compatible GPU accelerator was found";

/// Discovers and owns the compute device for the lifetime of the process.
///
/// Discovery runs once. An unavailable manager stays unavailable; there is no
/// retry and no re-discovery. Share the manager with `Arc`.
///
/// Every request takes the device lock for its whole
/// allocate/dispatch/synchronize/copy/release sequence, so buffer lifetimes of
/// overlapping requests never interleave on the device.
#[derive(Debug)]
pub struct AcceleratorManager<B: ComputeBackend = WgpuBackend> {
    backend: Option<Arc<B>>,
    diagnostic: Option<String>,
    device_lock: Mutex<()>,
}

impl AcceleratorManager<WgpuBackend> {
    /// Selects the first GPU-class adapter with 64-bit float support.
    ///
    /// Never fails: when no device can be opened the manager is returned in
    /// the unavailable state and [`diagnostic`](Self::diagnostic) explains why.
    #[must_use]
    pub fn discover() -> Self {
        info!("Discovering GPU accelerator...");
        Self::from_discovery(WgpuBackend::discover())
    }
}

impl<B: ComputeBackend> AcceleratorManager<B> {
    /// Builds a manager from the outcome of a discovery attempt.
    pub fn from_discovery(result: Result<B, GpuError>) -> Self {
        match result {
            Ok(backend) => Self::from_backend(backend),
            Err(e) => {
                warn!("GPU accelerator unavailable: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(backend: B) -> Self {
        let identity = backend.identity();
        info!(
            "Accelerator available: {} ({}, {})",
            identity.name, identity.class, identity.device_type
        );
        Self {
            backend: Some(Arc::new(backend)),
            diagnostic: None,
            device_lock: Mutex::new(()),
        }
    }

    /// A manager without a device. An empty diagnostic is replaced with
    /// [`DEFAULT_DIAGNOSTIC`].
    pub fn unavailable(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        Self {
            backend: None,
            diagnostic: (!diagnostic.trim().is_empty()).then_some(diagnostic),
            device_lock: Mutex::new(()),
        }
    }

    pub const fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn identity(&self) -> Option<&AcceleratorIdentity> {
        self.backend.as_deref().map(|backend| backend.identity())
    }

    pub const fn backend(&self) -> Option<&Arc<B>> {
        self.backend.as_ref()
    }

    /// Human-readable reason for unavailability. Always present; an available
    /// manager reports that the device is in use.
    pub fn diagnostic(&self) -> String {
        match (&self.diagnostic, self.identity()) {
            (Some(message), _) => message.clone(),
            (None, Some(identity)) => format!("Using {}", identity.name),
            (None, None) => DEFAULT_DIAGNOSTIC.to_string(),
        }
    }

    pub fn status_message(&self) -> String {
        self.identity().map_or_else(
            || format!("GPU accelerator unavailable: {}", self.diagnostic()),
            |identity| {
                format!(
                    "GPU accelerator ready: {} ({})",
                    identity.name, identity.class
                )
            },
        )
    }

    pub fn device_info(&self) -> DeviceInfo {
        let status_message = self.status_message();
        match self.identity() {
            Some(identity) => DeviceInfo {
                available: true,
                name: Some(identity.name.clone()),
                device_type: Some(identity.class.clone()),
                max_threads: identity.max_threads,
                max_group_size: identity.max_group_size,
                warp_size: identity.warp_size,
                multiprocessor_count: identity.multiprocessor_count,
                error: None,
                status_message,
            },
            None => DeviceInfo {
                available: false,
                name: None,
                device_type: None,
                max_threads: None,
                max_group_size: None,
                warp_size: None,
                multiprocessor_count: None,
                error: Some(self.diagnostic()),
                status_message,
            },
        }
    }

    /// Takes exclusive use of the device. A panic in a previous holder does
    /// not poison the device for later requests.
    pub fn lock_device(&self) -> MutexGuard<'_, ()> {
        self.device_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
