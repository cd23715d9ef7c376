//! Safe wrapper for accelerator devices.
//!
//! A device is the root of the ownership tree: it keeps every graph that was
//! allocated to it, and tears them down (with their fifos) before closing
//! and destroying itself.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::error::{NcError, Result};
use crate::graph::Graph;
use crate::native::{DeviceState, HwVersion, NcApi, RawHandle, ThermalThrottling};
use crate::option::device as opt;
use crate::property;
use crate::resource::{Disposable, HandleKind, NativeHandle, Release};
use crate::status::{check, Status};

/// Highest device index probed when no other bound is configured.
pub const DEFAULT_MAX_DEVICES: u32 = 65535;

/// An accelerator device.
///
/// Clones share the same native device.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

pub(crate) struct DeviceInner {
    handle: NativeHandle,
    index: i32,
    graphs: Mutex<Vec<Graph>>,
}

impl DeviceInner {
    fn graphs(&self) -> MutexGuard<'_, Vec<Graph>> {
        self.graphs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Disposable for DeviceInner {
    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn release_children(&self, how: Release) -> Result<()> {
        let graphs = self.graphs().clone();
        let mut outcome = Ok(());
        for graph in graphs {
            let result = graph.release(how);
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }

    fn release_native(&self) -> Result<()> {
        match property::get(&self.handle, &opt::STATE) {
            Ok(DeviceState::Opened) => {
                let raw = self.handle.raw();
                // SAFETY: the handle is live until the destroy below succeeds.
                let status = unsafe { self.handle.api().device_close(raw) };
                check("ncDeviceClose", status)?;
                debug!("Closed device {} before destroying it", self.index);
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read state of device {}: {}", self.index, e),
        }
        // SAFETY: the device is closed and no graph references it any more.
        self.handle
            .destroy_with("ncDeviceDestroy", |api, raw| unsafe { api.device_destroy(raw) })
    }

    fn release_owned(&self) {
        self.graphs().clear();
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        self.reclaim();
    }
}

impl Device {
    /// Create a handle for the device at `index`. The device is not opened.
    pub fn create(api: Arc<dyn NcApi>, index: i32) -> Result<Self> {
        let mut raw = RawHandle::NULL;
        // SAFETY: `raw` is a valid out slot.
        let status = unsafe { api.device_create(index, &mut raw) };
        check("ncDeviceCreate", status)?;
        debug!("Created device {} as {:#x}", index, raw.addr());

        Ok(Self {
            inner: Arc::new(DeviceInner {
                handle: NativeHandle::new(api, raw, HandleKind::Device),
                index,
                graphs: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Probe indices `0..max_devices` and create a handle for each device
    /// found.
    ///
    /// Probing stops at the first index the driver reports as not found.
    /// Any other failure is recorded for that index and probing continues.
    pub fn enumerate(api: &Arc<dyn NcApi>, max_devices: u32) -> DeviceEnumeration {
        let mut enumeration = DeviceEnumeration::default();
        let last = max_devices.min(i32::MAX as u32) as i32;

        for index in 0..last {
            match Self::create(Arc::clone(api), index) {
                Ok(device) => enumeration.devices.push(device),
                Err(e) if e.status() == Some(Status::DeviceNotFound) => break,
                Err(e) => {
                    warn!("Skipping device {}: {}", index, e);
                    enumeration.failures.push(SlotFailure { index, error: e });
                }
            }
        }

        info!(
            "Found {} device(s), {} failed slot(s)",
            enumeration.devices.len(),
            enumeration.failures.len()
        );
        enumeration
    }

    /// Open communication with the device.
    pub fn open(&self) -> Result<()> {
        let raw = self.inner.handle.live()?;
        // SAFETY: the handle is live.
        let status = unsafe { self.api().device_open(raw) };
        check("ncDeviceOpen", status)?;
        info!("Opened device {}", self.inner.index);
        Ok(())
    }

    /// Close communication with the device. Only valid on an opened device.
    pub fn close(&self) -> Result<()> {
        let raw = self.inner.handle.live()?;
        // SAFETY: the handle is live.
        let status = unsafe { self.api().device_close(raw) };
        check("ncDeviceClose", status)?;
        info!("Closed device {}", self.inner.index);
        Ok(())
    }

    /// Dispose every owned graph, close the device if it is open, then
    /// destroy it. Later calls are no-ops.
    pub fn dispose(&self) -> Result<()> {
        self.inner.release(Release::Explicit)
    }

    /// Whether the device has been released.
    pub fn is_disposed(&self) -> bool {
        self.inner.handle.is_released()
    }

    /// Index the device was created with.
    pub fn index(&self) -> i32 {
        self.inner.index
    }

    /// The raw native handle; null once destroyed.
    pub fn raw(&self) -> RawHandle {
        self.inner.handle.raw()
    }

    /// Graphs allocated to this device, in allocation order.
    pub fn graphs(&self) -> Vec<Graph> {
        self.inner.graphs().clone()
    }

    pub(crate) fn add_graph(&self, graph: Graph) {
        self.inner.graphs().push(graph);
    }

    pub(crate) fn remove_graph(&self, graph: &Graph) {
        self.inner.graphs().retain(|owned| owned != graph);
    }

    pub(crate) fn native(&self) -> &NativeHandle {
        &self.inner.handle
    }

    pub(crate) fn downgrade(&self) -> Weak<DeviceInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<DeviceInner>) -> Self {
        Self { inner }
    }

    fn api(&self) -> &dyn NcApi {
        self.inner.handle.api()
    }

    // Telemetry

    /// Current driver-side state of the device.
    pub fn state(&self) -> Result<DeviceState> {
        property::get(&self.inner.handle, &opt::STATE)
    }

    /// Device memory in use, in bytes.
    pub fn memory_used(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::CURRENT_MEMORY_USED)
    }

    /// Total device memory, in bytes.
    pub fn memory_size(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::MEMORY_SIZE)
    }

    /// Maximum number of fifos the device can hold.
    pub fn max_fifos(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::MAX_FIFO_NUM)
    }

    /// Number of fifos currently allocated on the device.
    pub fn allocated_fifos(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::ALLOCATED_FIFO_NUM)
    }

    /// Maximum number of graphs the device can hold.
    pub fn max_graphs(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::MAX_GRAPH_NUM)
    }

    /// Number of graphs currently allocated on the device.
    pub fn allocated_graphs(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::ALLOCATED_GRAPH_NUM)
    }

    /// Highest option class the device supports.
    pub fn class_limit(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::OPTION_CLASS_LIMIT)
    }

    /// Firmware version components, most significant first.
    pub fn firmware_version(&self) -> Result<Vec<u32>> {
        property::get_array(&self.inner.handle, &opt::FW_VERSION, opt::FW_VERSION.max_len)
    }

    /// MvTensor library version loaded on the device.
    pub fn mv_tensor_version(&self) -> Result<Vec<u32>> {
        property::get_array(
            &self.inner.handle,
            &opt::MVTENSOR_VERSION,
            opt::MVTENSOR_VERSION.max_len,
        )
    }

    /// Device name as reported by the driver.
    pub fn name(&self) -> Result<String> {
        property::get_string(&self.inner.handle, &opt::NAME)
    }

    /// Recent temperature samples, in degrees Celsius.
    pub fn thermal_stats(&self) -> Result<Vec<f32>> {
        property::get_array(
            &self.inner.handle,
            &opt::THERMAL_STATS,
            opt::THERMAL_STATS.max_len,
        )
    }

    /// Current thermal throttling level.
    pub fn thermal_throttling(&self) -> Result<ThermalThrottling> {
        property::get(&self.inner.handle, &opt::THERMAL_THROTTLING_LEVEL)
    }

    /// Chip generation of the device.
    pub fn hardware_version(&self) -> Result<HwVersion> {
        property::get(&self.inner.handle, &opt::HW_VERSION)
    }

    /// Maximum executors a graph may run on.
    pub fn max_executors(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::MAX_EXECUTORS_NUM)
    }

    /// Last error details recorded by the driver.
    pub fn debug_info(&self) -> Result<String> {
        property::get_string(&self.inner.handle, &opt::DEBUG_INFO)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.inner.index)
            .field("handle", &self.inner.handle)
            .field("graphs", &self.inner.graphs().len())
            .finish()
    }
}

/// Outcome of [`Device::enumerate`].
#[derive(Debug, Default)]
pub struct DeviceEnumeration {
    /// Devices found, in index order.
    pub devices: Vec<Device>,
    /// Indices that failed with something other than "not found".
    pub failures: Vec<SlotFailure>,
}

impl DeviceEnumeration {
    /// True when no device was found.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Dispose every enumerated device, returning the first failure.
    pub fn dispose_all(&self) -> Result<()> {
        let mut outcome = Ok(());
        for device in &self.devices {
            let result = device.dispose();
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

/// A device index that could not be created.
#[derive(Debug)]
pub struct SlotFailure {
    pub index: i32,
    pub error: NcError,
}
