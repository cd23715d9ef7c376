//! Safe wrapper for compiled network graphs.
//!
//! A graph is created by name, allocated once to an opened device together
//! with a compiled graph blob, and then fed through an input fifo while
//! results arrive on an output fifo. The graph owns both fifos and destroys
//! them before itself.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use ndarray::Array;
use tracing::{debug, warn};

use crate::device::{Device, DeviceInner};
use crate::error::{NcError, Result};
use crate::fifo::{f32_to_bytes, Fifo};
use crate::native::{
    c_name, FifoDataType, FifoSpec, FifoType, GraphState, NcApi, RawHandle, TensorDescriptor,
};
use crate::option::graph as opt;
use crate::property::{self, ArrayProperty};
use crate::resource::{Disposable, HandleKind, NativeHandle, Release};
use crate::status::check;

/// Element counts and data types for the fifos allocated with a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoOptions {
    pub input_elements: u32,
    pub input_data_type: FifoDataType,
    pub output_elements: u32,
    pub output_data_type: FifoDataType,
}

impl Default for FifoOptions {
    fn default() -> Self {
        Self {
            input_elements: 2,
            input_data_type: FifoDataType::Fp32,
            output_elements: 2,
            output_data_type: FifoDataType::Fp32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Input,
    Output,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    fn fifo_type(self) -> FifoType {
        match self {
            Self::Input => FifoType::HostWo,
            Self::Output => FifoType::HostRo,
        }
    }
}

/// A compiled network, optionally allocated to a device.
///
/// Clones share the same native graph. Once allocated, the owning
/// [`Device`] keeps the graph alive and disposes it with itself.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

pub(crate) struct GraphInner {
    handle: NativeHandle,
    name: String,
    device: OnceLock<Weak<DeviceInner>>,
    input: OnceLock<Fifo>,
    output: OnceLock<Fifo>,
    // (inputs, outputs); fixed once the graph is allocated.
    tensor_counts: OnceLock<(u32, u32)>,
}

impl Disposable for GraphInner {
    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn release_children(&self, how: Release) -> Result<()> {
        let input = self.input.get().map_or(Ok(()), |fifo| fifo.release(how));
        let output = self.output.get().map_or(Ok(()), |fifo| fifo.release(how));
        input.and(output)
    }

    fn release_native(&self) -> Result<()> {
        // SAFETY: the handle is live until this destroy succeeds.
        self.handle
            .destroy_with("ncGraphDestroy", |api, raw| unsafe { api.graph_destroy(raw) })
    }
}

impl Drop for GraphInner {
    fn drop(&mut self) {
        self.reclaim();
    }
}

impl Graph {
    /// Create a graph. The name is truncated to the driver's maximum name
    /// length.
    pub fn create(api: Arc<dyn NcApi>, name: &str) -> Result<Self> {
        let c_name = c_name(name);
        let mut raw = RawHandle::NULL;
        // SAFETY: `c_name` is NUL-terminated and `raw` is a valid out slot.
        let status = unsafe { api.graph_create(&c_name, &mut raw) };
        check("ncGraphCreate", status)?;
        debug!("Created graph {:?} as {:#x}", c_name, raw.addr());

        Ok(Self {
            inner: Arc::new(GraphInner {
                handle: NativeHandle::new(api, raw, HandleKind::Graph),
                name: c_name.to_string_lossy().into_owned(),
                device: OnceLock::new(),
                input: OnceLock::new(),
                output: OnceLock::new(),
                tensor_counts: OnceLock::new(),
            }),
        })
    }

    /// The (possibly truncated) name the graph was created with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Allocate the graph on `device` from a compiled graph blob.
    ///
    /// A graph can be allocated once; a second attempt fails without
    /// reaching the driver.
    pub fn allocate(&self, device: &Device, blob: &[u8]) -> Result<()> {
        self.expect_unallocated()?;
        let raw = self.inner.handle.live()?;
        let device_raw = device.native().live()?;
        // SAFETY: both handles are live; the driver copies `blob`.
        let status = unsafe { self.api().graph_allocate(device_raw, raw, blob) };
        check("ncGraphAllocate", status)?;
        debug!(
            "Allocated graph {:#x} on device {:#x} ({} bytes)",
            raw.addr(),
            device_raw.addr(),
            blob.len()
        );
        self.bind_device(device);
        Ok(())
    }

    /// Allocate the graph together with a host-writable input fifo and a
    /// host-readable output fifo, in a single driver call.
    pub fn allocate_with_fifos(
        &self,
        device: &Device,
        blob: &[u8],
        options: &FifoOptions,
    ) -> Result<()> {
        self.expect_unallocated()?;
        self.expect_no_fifos()?;
        let raw = self.inner.handle.live()?;
        let device_raw = device.native().live()?;

        let input_spec = FifoSpec {
            fifo_type: FifoType::HostWo,
            num_elements: element_count(options.input_elements)?,
            data_type: options.input_data_type,
        };
        let output_spec = FifoSpec {
            fifo_type: FifoType::HostRo,
            num_elements: element_count(options.output_elements)?,
            data_type: options.output_data_type,
        };
        let mut input_raw = RawHandle::NULL;
        let mut output_raw = RawHandle::NULL;
        // SAFETY: both handles are live and the out slots are valid.
        let status = unsafe {
            self.api().graph_allocate_with_fifos(
                device_raw,
                raw,
                blob,
                &mut input_raw,
                input_spec,
                &mut output_raw,
                output_spec,
            )
        };
        check("ncGraphAllocateWithFifosEx", status)?;
        debug!(
            "Allocated graph {:#x} on device {:#x} with fifos {:#x}/{:#x}",
            raw.addr(),
            device_raw.addr(),
            input_raw.addr(),
            output_raw.addr()
        );

        let api = self.inner.handle.api_arc();
        self.install(Endpoint::Input, Fifo::from_raw(Arc::clone(&api), input_raw))?;
        self.install(Endpoint::Output, Fifo::from_raw(api, output_raw))?;
        self.bind_device(device);
        Ok(())
    }

    /// Allocate the graph, then allocate caller-created fifos against its
    /// first input and output tensors and take ownership of them.
    pub fn allocate_with_existing_fifos(
        &self,
        device: &Device,
        blob: &[u8],
        input: Fifo,
        output: Fifo,
        input_elements: u32,
        output_elements: u32,
    ) -> Result<()> {
        self.expect_no_fifos()?;
        self.allocate(device, blob)?;

        let descriptor = self.first_descriptor(Endpoint::Input)?;
        input.allocate(device, &descriptor, input_elements)?;
        self.install(Endpoint::Input, input)?;

        let descriptor = self.first_descriptor(Endpoint::Output)?;
        output.allocate(device, &descriptor, output_elements)?;
        self.install(Endpoint::Output, output)?;
        Ok(())
    }

    /// Create and allocate the input fifo from the graph's first input
    /// tensor. Requires the graph to be allocated.
    pub fn create_input(&self, name: &str, max_elements: u32) -> Result<Fifo> {
        self.create_fifo(Endpoint::Input, name, max_elements)
    }

    /// Create and allocate the output fifo from the graph's first output
    /// tensor. Requires the graph to be allocated.
    pub fn create_output(&self, name: &str, max_elements: u32) -> Result<Fifo> {
        self.create_fifo(Endpoint::Output, name, max_elements)
    }

    fn create_fifo(&self, endpoint: Endpoint, name: &str, max_elements: u32) -> Result<Fifo> {
        if self.slot(endpoint).get().is_some() {
            return Err(NcError::precondition(format!(
                "graph {} already has an {} fifo",
                self.inner.name,
                endpoint.label()
            )));
        }
        let device = self.allocated_device()?;
        let descriptor = self.first_descriptor(endpoint)?;

        let fifo = Fifo::create(self.inner.handle.api_arc(), name, endpoint.fifo_type())?;
        if let Err(e) = fifo.allocate(&device, &descriptor, max_elements) {
            if let Err(dispose_err) = fifo.dispose() {
                warn!("Failed to destroy unallocated fifo: {}", dispose_err);
            }
            return Err(e);
        }
        self.install(endpoint, fifo.clone())?;
        Ok(fifo)
    }

    /// Queue one inference: `data` becomes the next input element and one
    /// output element is requested.
    ///
    /// Returns the input length the driver reports having sent.
    pub fn queue_inference(&self, data: &[u8]) -> Result<u32> {
        let (input, output) = self.fifos()?;
        let raw = self.inner.handle.live()?;
        let input_raw = input.native().live()?;
        let output_raw = output.native().live()?;
        let mut len = u32::try_from(data.len())
            .map_err(|_| NcError::precondition("input tensor exceeds 4 GiB"))?;

        // SAFETY: all three handles are live and `data` is valid for `len` bytes.
        let status = unsafe {
            self.api().graph_queue_inference_with_fifo_elem(
                raw, input_raw, output_raw, data, &mut len, 0,
            )
        };
        check("ncGraphQueueInferenceWithFifoElem", status)?;
        if len as usize != data.len() {
            debug!(
                "Driver reported {} bytes queued for a {} byte tensor",
                len,
                data.len()
            );
        }
        Ok(len)
    }

    /// Queue one inference from an FP32 array of any shape.
    pub fn queue_inference_array<D: ndarray::Dimension>(
        &self,
        input: &Array<f32, D>,
    ) -> Result<u32> {
        let contiguous = input.as_standard_layout();
        let data = f32_to_bytes(contiguous.as_slice().unwrap_or_default());
        self.queue_inference(&data)
    }

    /// Queue one inference over elements already written to the input fifo.
    pub fn queue_inference_from_fifos(&self) -> Result<()> {
        let (input, output) = self.fifos()?;
        let raw = self.inner.handle.live()?;
        let inputs = [input.native().live()?];
        let outputs = [output.native().live()?];
        // SAFETY: all handles are live.
        let status = unsafe { self.api().graph_queue_inference(raw, &inputs, &outputs) };
        check("ncGraphQueueInference", status)
    }

    /// Destroy the input fifo, the output fifo, then the graph, and drop it
    /// from its device's graph list.
    pub fn dispose(&self) -> Result<()> {
        let result = self.inner.release(Release::Explicit);
        if let Some(device) = self.device() {
            device.remove_graph(self);
        }
        result
    }

    pub(crate) fn release(&self, how: Release) -> Result<()> {
        self.inner.release(how)
    }

    /// Whether the graph has been released.
    pub fn is_disposed(&self) -> bool {
        self.inner.handle.is_released()
    }

    /// The raw native handle; null once destroyed.
    pub fn raw(&self) -> RawHandle {
        self.inner.handle.raw()
    }

    /// The device this graph was allocated to, while it is still alive.
    pub fn device(&self) -> Option<Device> {
        self.inner
            .device
            .get()
            .and_then(Weak::upgrade)
            .map(Device::from_inner)
    }

    /// Whether the graph has been allocated to a device.
    pub fn is_allocated(&self) -> bool {
        self.inner.device.get().is_some()
    }

    /// The input fifo, once created.
    pub fn input(&self) -> Option<Fifo> {
        self.inner.input.get().cloned()
    }

    /// The output fifo, once created.
    pub fn output(&self) -> Option<Fifo> {
        self.inner.output.get().cloned()
    }

    // Properties

    /// Current driver-side state of the graph.
    pub fn state(&self) -> Result<GraphState> {
        property::get(&self.inner.handle, &opt::STATE)
    }

    /// Number of input tensors the graph expects.
    pub fn input_count(&self) -> Result<u32> {
        self.tensor_counts().map(|(inputs, _)| inputs)
    }

    /// Number of output tensors the graph produces.
    pub fn output_count(&self) -> Result<u32> {
        self.tensor_counts().map(|(_, outputs)| outputs)
    }

    /// Descriptors of every input tensor.
    pub fn input_descriptors(&self) -> Result<Vec<TensorDescriptor>> {
        let count = self.input_count()?;
        self.descriptors(&opt::INPUT_TENSOR_DESCRIPTORS, count)
    }

    /// Descriptors of every output tensor.
    pub fn output_descriptors(&self) -> Result<Vec<TensorDescriptor>> {
        let count = self.output_count()?;
        self.descriptors(&opt::OUTPUT_TENSOR_DESCRIPTORS, count)
    }

    /// Highest option class the graph supports.
    pub fn class_limit(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::OPTION_CLASS_LIMIT)
    }

    /// Per-stage timings of the last inference, in milliseconds.
    pub fn time_taken(&self) -> Result<Vec<f32>> {
        let bytes = property::get(&self.inner.handle, &opt::TIME_TAKEN_ARRAY_SIZE)? as usize;
        property::get_array(
            &self.inner.handle,
            &opt::TIME_TAKEN,
            bytes / std::mem::size_of::<f32>(),
        )
    }

    /// Last error details recorded for the graph.
    pub fn debug_info(&self) -> Result<String> {
        property::get_string(&self.inner.handle, &opt::DEBUG_INFO)
    }

    /// Name as recorded by the driver.
    pub fn native_name(&self) -> Result<String> {
        property::get_string(&self.inner.handle, &opt::NAME)
    }

    /// Number of executors the graph runs on.
    pub fn executors(&self) -> Result<i32> {
        property::get(&self.inner.handle, &opt::EXECUTORS_NUM)
    }

    /// Set the number of executors. Only valid before allocation.
    pub fn set_executors(&self, executors: i32) -> Result<()> {
        property::set(&self.inner.handle, &opt::EXECUTORS_NUM, &executors)
    }

    // Internals

    fn api(&self) -> &dyn NcApi {
        self.inner.handle.api()
    }

    /// Tensor counts, read from the driver on first success and then cached.
    fn tensor_counts(&self) -> Result<(u32, u32)> {
        self.inner.handle.live()?;
        if let Some(counts) = self.inner.tensor_counts.get() {
            return Ok(*counts);
        }
        let counts = (
            property::get(&self.inner.handle, &opt::INPUT_COUNT)?,
            property::get(&self.inner.handle, &opt::OUTPUT_COUNT)?,
        );
        Ok(*self.inner.tensor_counts.get_or_init(|| counts))
    }

    fn descriptors(
        &self,
        prop: &ArrayProperty<TensorDescriptor>,
        count: u32,
    ) -> Result<Vec<TensorDescriptor>> {
        property::get_array(&self.inner.handle, prop, count.max(1) as usize)
    }

    fn first_descriptor(&self, endpoint: Endpoint) -> Result<TensorDescriptor> {
        let descriptors = match endpoint {
            Endpoint::Input => self.input_descriptors()?,
            Endpoint::Output => self.output_descriptors()?,
        };
        descriptors.into_iter().next().ok_or_else(|| {
            NcError::precondition(format!(
                "graph {} reports no {} tensors",
                self.inner.name,
                endpoint.label()
            ))
        })
    }

    fn slot(&self, endpoint: Endpoint) -> &OnceLock<Fifo> {
        match endpoint {
            Endpoint::Input => &self.inner.input,
            Endpoint::Output => &self.inner.output,
        }
    }

    fn install(&self, endpoint: Endpoint, fifo: Fifo) -> Result<()> {
        self.slot(endpoint).set(fifo).map_err(|rejected| {
            if let Err(e) = rejected.dispose() {
                warn!("Failed to destroy rejected {} fifo: {}", endpoint.label(), e);
            }
            NcError::precondition(format!(
                "graph {} already has an {} fifo",
                self.inner.name,
                endpoint.label()
            ))
        })
    }

    fn bind_device(&self, device: &Device) {
        if self.inner.device.set(device.downgrade()).is_ok() {
            device.add_graph(self.clone());
        }
    }

    fn allocated_device(&self) -> Result<Device> {
        let weak = self.inner.device.get().ok_or_else(|| {
            NcError::precondition(format!(
                "graph {} has not been allocated to a device",
                self.inner.name
            ))
        })?;
        weak.upgrade().map(Device::from_inner).ok_or_else(|| {
            NcError::precondition(format!(
                "the device owning graph {} has been released",
                self.inner.name
            ))
        })
    }

    fn fifos(&self) -> Result<(&Fifo, &Fifo)> {
        match (self.inner.input.get(), self.inner.output.get()) {
            (Some(input), Some(output)) => Ok((input, output)),
            _ => Err(NcError::precondition(format!(
                "graph {} needs both an input and an output fifo",
                self.inner.name
            ))),
        }
    }

    fn expect_unallocated(&self) -> Result<()> {
        if self.is_allocated() {
            return Err(NcError::precondition(format!(
                "graph {} is already allocated to a device",
                self.inner.name
            )));
        }
        Ok(())
    }

    fn expect_no_fifos(&self) -> Result<()> {
        if self.inner.input.get().is_some() {
            return Err(NcError::precondition("input fifo already allocated"));
        }
        if self.inner.output.get().is_some() {
            return Err(NcError::precondition("output fifo already allocated"));
        }
        Ok(())
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Graph {}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.inner.name)
            .field("handle", &self.inner.handle)
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

fn element_count(count: u32) -> Result<i32> {
    i32::try_from(count).map_err(|_| NcError::precondition("fifo element count is too large"))
}
