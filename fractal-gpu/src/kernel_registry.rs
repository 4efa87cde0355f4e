use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::backend::ComputeBackend;
use crate::error::CompilationError;
use crate::shader::KernelSpec;

/// Build state of the registry's single executable.
#[derive(Debug)]
enum KernelSlot<E> {
    Ready(Arc<E>),
    NotBuilt { last_error: Option<CompilationError> },
}

impl<E> KernelSlot<E> {
    const fn empty() -> Self {
        Self::NotBuilt { last_error: None }
    }
}

/// Owns the compiled per-pixel executable for one backend.
///
/// The executable is built once, either eagerly through [`warm_up`] or on
/// first use through [`compile_on_demand`], and then shared by every request.
/// Builds are serialized by the registry's lock.
///
/// [`warm_up`]: KernelRegistry::warm_up
/// [`compile_on_demand`]: KernelRegistry::compile_on_demand
#[derive(Debug)]
pub struct KernelRegistry<B: ComputeBackend> {
    spec: KernelSpec,
    slot: Mutex<KernelSlot<B::Executable>>,
}

impl<B: ComputeBackend> KernelRegistry<B> {
    #[must_use]
    pub const fn new(spec: KernelSpec) -> Self {
        Self {
            spec,
            slot: Mutex::new(KernelSlot::empty()),
        }
    }

    pub const fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    fn slot(&self) -> MutexGuard<'_, KernelSlot<B::Executable>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts the eager build. A failure is logged and remembered, and the
    /// next request retries through [`compile_on_demand`](Self::compile_on_demand).
    ///
    /// Returns true when an executable is ready afterwards.
    pub fn warm_up(&self, backend: &B) -> bool {
        let mut slot = self.slot();
        if matches!(*slot, KernelSlot::Ready(_)) {
            return true;
        }
        match backend.compile(&self.spec) {
            Ok(executable) => {
                info!(
                    "Kernel '{}' precompiled (fingerprint {:016x})",
                    self.spec.label(),
                    self.spec.fingerprint()
                );
                *slot = KernelSlot::Ready(Arc::new(executable));
                true
            }
            Err(e) => {
                warn!("Eager kernel build failed, deferring to first use: {}", e);
                *slot = KernelSlot::NotBuilt {
                    last_error: Some(e),
                };
                false
            }
        }
    }

    /// Returns the cached executable, if one has been built.
    pub fn try_get_precompiled(&self) -> Option<Arc<B::Executable>> {
        match &*self.slot() {
            KernelSlot::Ready(executable) => Some(Arc::clone(executable)),
            KernelSlot::NotBuilt { .. } => None,
        }
    }

    /// Returns the cached executable or builds it now.
    ///
    /// # Errors
    ///
    /// Returns the [`CompilationError`] raised by the backend. The slot stays
    /// unbuilt so a later call tries again.
    pub fn compile_on_demand(&self, backend: &B) -> Result<Arc<B::Executable>, CompilationError> {
        let mut slot = self.slot();
        if let KernelSlot::Ready(executable) = &*slot {
            return Ok(Arc::clone(executable));
        }
        debug!(
            "Building kernel '{}' on demand (fingerprint {:016x})",
            self.spec.label(),
            self.spec.fingerprint()
        );
        match backend.compile(&self.spec) {
            Ok(executable) => {
                let executable = Arc::new(executable);
                *slot = KernelSlot::Ready(Arc::clone(&executable));
                info!("Kernel '{}' built on demand", self.spec.label());
                Ok(executable)
            }
            Err(e) => {
                *slot = KernelSlot::NotBuilt {
                    last_error: Some(e.clone()),
                };
                Err(e)
            }
        }
    }

    /// Drops the cached executable. In-flight requests keep their `Arc`.
    pub fn invalidate(&self) {
        *self.slot() = KernelSlot::empty();
        debug!("Kernel '{}' invalidated", self.spec.label());
    }

    /// The error from the most recent failed build, if the slot is unbuilt.
    pub fn last_error(&self) -> Option<CompilationError> {
        match &*self.slot() {
            KernelSlot::NotBuilt { last_error } => last_error.clone(),
            KernelSlot::Ready(_) => None,
        }
    }
}
