//! Exactly-once teardown and native handle ownership.
//!
//! [`DisposeGuard`] runs a teardown body once no matter how many times or
//! from how many threads release is requested. [`Disposable`] splits that
//! body into the child cascade, the native destroy call, and the cleanup
//! that only an explicit `dispose()` performs. [`NativeHandle`] owns one
//! driver handle together with the driver it came from.

use std::fmt;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use tracing::{debug, warn};

use crate::error::{NcError, Result};
use crate::native::{NcApi, RawHandle};
use crate::property::OptionTarget;
use crate::status::check;

/// Kind of native object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Device,
    Graph,
    Fifo,
}

impl HandleKind {
    /// Lowercase name used in log and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Graph => "graph",
            Self::Fifo => "fifo",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a release was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The owner called `dispose()`.
    Explicit,
    /// The last reference was dropped without a `dispose()`.
    Reclaimed,
}

/// Runs a teardown body at most once.
///
/// Concurrent callers block until the first one has finished, so nobody
/// returns while teardown is still in flight.
#[derive(Debug)]
pub struct DisposeGuard {
    once: Once,
}

impl Default for DisposeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl DisposeGuard {
    /// A guard that has not released anything yet.
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Whether the teardown body has completed.
    pub fn is_released(&self) -> bool {
        self.once.is_completed()
    }

    /// Run `teardown` if no release has happened yet.
    ///
    /// Only the caller that actually ran the body sees its result; every
    /// other caller gets `Ok(())`.
    pub fn release<F>(&self, teardown: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut outcome = Ok(());
        self.once.call_once(|| outcome = teardown());
        outcome
    }
}

/// Two-phase teardown shared by devices, graphs and fifos.
pub(crate) trait Disposable {
    fn handle(&self) -> &NativeHandle;

    /// Release owned children. Runs on every release path, before the
    /// native destroy.
    fn release_children(&self, _how: Release) -> Result<()> {
        Ok(())
    }

    /// Issue the native destroy call. Runs on every release path.
    fn release_native(&self) -> Result<()>;

    /// Drop references to owned managed state. Runs on explicit release only.
    fn release_owned(&self) {}

    fn release(&self, how: Release) -> Result<()> {
        let handle = self.handle();
        handle.guard.release(|| {
            if how == Release::Reclaimed {
                warn!(
                    "{} {:#x} was not disposed explicitly; releasing it on drop",
                    handle.kind,
                    handle.raw().addr()
                );
            }
            let children = self.release_children(how);
            let native = self.release_native();
            if how == Release::Explicit {
                self.release_owned();
            }
            children.and(native)
        })
    }

    /// Safety net for `Drop`: release if nobody did, logging any failure.
    fn reclaim(&self) {
        if self.handle().is_released() {
            return;
        }
        if let Err(e) = self.release(Release::Reclaimed) {
            warn!("Failed to release {} on drop: {}", self.handle().kind, e);
        }
    }
}

/// One native handle, the driver that issued it, and its release guard.
pub struct NativeHandle {
    api: Arc<dyn NcApi>,
    raw: AtomicUsize,
    kind: HandleKind,
    guard: DisposeGuard,
}

impl NativeHandle {
    pub(crate) fn new(api: Arc<dyn NcApi>, raw: RawHandle, kind: HandleKind) -> Self {
        Self {
            api,
            raw: AtomicUsize::new(raw.addr()),
            kind,
            guard: DisposeGuard::new(),
        }
    }

    /// The raw handle value.
    ///
    /// After a successful destroy this is whatever the driver wrote back,
    /// normally null.
    pub fn raw(&self) -> RawHandle {
        RawHandle::from_addr(self.raw.load(Ordering::Acquire))
    }

    /// Which kind of native object this is.
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Whether the native object has been released.
    pub fn is_released(&self) -> bool {
        self.guard.is_released()
    }

    pub(crate) fn api(&self) -> &dyn NcApi {
        &*self.api
    }

    pub(crate) fn api_arc(&self) -> Arc<dyn NcApi> {
        Arc::clone(&self.api)
    }

    /// The raw handle, or an error if the object was released.
    pub(crate) fn live(&self) -> Result<RawHandle> {
        if self.is_released() {
            return Err(NcError::Disposed(self.kind.as_str()));
        }
        Ok(self.raw())
    }

    /// Run a native destroy call against this handle and store the value the
    /// driver wrote back.
    pub(crate) fn destroy_with<F>(&self, call: &'static str, destroy: F) -> Result<()>
    where
        F: FnOnce(&dyn NcApi, &mut RawHandle) -> c_int,
    {
        let mut raw = self.raw();
        debug!("{} {:#x}", call, raw.addr());
        let status = destroy(self.api(), &mut raw);
        self.raw.store(raw.addr(), Ordering::Release);
        check(call, status)
    }
}

impl OptionTarget for NativeHandle {
    fn raw_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> Result<c_int> {
        let raw = self.live()?;
        // SAFETY: `raw` was issued by `self.api` and has not been destroyed.
        let status = unsafe {
            match self.kind {
                HandleKind::Device => self.api.device_get_option(raw, option, data, len),
                HandleKind::Graph => self.api.graph_get_option(raw, option, data, len),
                HandleKind::Fifo => self.api.fifo_get_option(raw, option, data, len),
            }
        };
        Ok(status)
    }

    fn raw_set_option(&self, option: c_int, data: &[u8]) -> Result<c_int> {
        let raw = self.live()?;
        // SAFETY: as above.
        let status = unsafe {
            match self.kind {
                HandleKind::Device => self.api.device_set_option(raw, option, data),
                HandleKind::Graph => self.api.graph_set_option(raw, option, data),
                HandleKind::Fifo => self.api.fifo_set_option(raw, option, data),
            }
        };
        Ok(status)
    }

    fn get_call(&self) -> &'static str {
        match self.kind {
            HandleKind::Device => "ncDeviceGetOption",
            HandleKind::Graph => "ncGraphGetOption",
            HandleKind::Fifo => "ncFifoGetOption",
        }
    }

    fn set_call(&self) -> &'static str {
        match self.kind {
            HandleKind::Device => "ncDeviceSetOption",
            HandleKind::Graph => "ncGraphSetOption",
            HandleKind::Fifo => "ncFifoSetOption",
        }
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("raw", &format_args!("{:#x}", self.raw().addr()))
            .field("released", &self.is_released())
            .finish()
    }
}
