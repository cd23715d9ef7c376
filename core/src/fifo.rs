//! Safe wrapper for native fifo queues.
//!
//! A fifo streams fixed-size tensor elements between the host and a graph.
//! The element size is owned by the driver; every read and write buffer is
//! checked against it before the driver is called.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array, ArrayD, IxDyn};
use tracing::{debug, trace};

use crate::device::Device;
use crate::error::{NcError, Result};
use crate::native::{
    c_name, FifoDataType, FifoState, FifoType, NcApi, RawHandle, TensorDescriptor,
};
use crate::option::fifo as opt;
use crate::property;
use crate::resource::{Disposable, HandleKind, NativeHandle, Release};
use crate::status::check;

/// A bounded queue of tensor elements.
///
/// Clones share the same native fifo. The fifo is destroyed by
/// [`Fifo::dispose`], by the graph that owns it, or as a last resort when
/// the final clone is dropped.
#[derive(Clone)]
pub struct Fifo {
    inner: Arc<FifoInner>,
}

pub(crate) struct FifoInner {
    handle: NativeHandle,
}

impl Disposable for FifoInner {
    fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    fn release_native(&self) -> Result<()> {
        // SAFETY: the handle is live until this destroy succeeds.
        self.handle
            .destroy_with("ncFifoDestroy", |api, raw| unsafe { api.fifo_destroy(raw) })
    }
}

impl Drop for FifoInner {
    fn drop(&mut self) {
        self.reclaim();
    }
}

impl Fifo {
    /// Create an unallocated fifo.
    ///
    /// The name is truncated to the driver's maximum name length.
    pub fn create(api: Arc<dyn NcApi>, name: &str, fifo_type: FifoType) -> Result<Self> {
        let c_name = c_name(name);
        let mut raw = RawHandle::NULL;
        // SAFETY: `c_name` is NUL-terminated and `raw` is a valid out slot.
        let status = unsafe { api.fifo_create(&c_name, fifo_type, &mut raw) };
        check("ncFifoCreate", status)?;
        debug!("Created {:?} fifo {:?} as {:#x}", fifo_type, c_name, raw.addr());
        Ok(Self::from_raw(api, raw))
    }

    /// Wrap a handle the driver already allocated, e.g. by
    /// `ncGraphAllocateWithFifosEx`.
    pub(crate) fn from_raw(api: Arc<dyn NcApi>, raw: RawHandle) -> Self {
        Self {
            inner: Arc::new(FifoInner {
                handle: NativeHandle::new(api, raw, HandleKind::Fifo),
            }),
        }
    }

    /// Allocate the fifo on `device` for tensors shaped like `descriptor`,
    /// with room for `num_elements` elements.
    pub fn allocate(
        &self,
        device: &Device,
        descriptor: &TensorDescriptor,
        num_elements: u32,
    ) -> Result<()> {
        let raw = self.inner.handle.live()?;
        let device_raw = device.native().live()?;
        // SAFETY: both handles are live and come from the same driver.
        let status = unsafe {
            self.api()
                .fifo_allocate(raw, device_raw, descriptor, num_elements)
        };
        check("ncFifoAllocate", status)?;
        debug!(
            "Allocated fifo {:#x} on device {:#x} ({} x {} bytes)",
            raw.addr(),
            device_raw.addr(),
            num_elements,
            descriptor.total_size
        );
        Ok(())
    }

    /// Read one element into `buf`, which must be exactly
    /// [`element_size`](Self::element_size) bytes long.
    ///
    /// Returns the length the driver reports. Blocks while the fifo is empty
    /// unless [`set_dont_block`](Self::set_dont_block) was enabled.
    pub fn read(&self, buf: &mut [u8]) -> Result<u32> {
        self.expect_element_len(buf.len())?;
        let raw = self.inner.handle.live()?;
        let mut len = element_len(buf.len())?;
        let mut user_param = 0usize;
        // SAFETY: `buf` is valid for `len` bytes and the handle is live.
        let status = unsafe { self.api().fifo_read_elem(raw, buf, &mut len, &mut user_param) };
        check("ncFifoReadElem", status)?;
        trace!("Read {} bytes from fifo {:#x}", len, raw.addr());
        Ok(len)
    }

    /// Write one element. Only host-writable fifos accept writes, and `data`
    /// must be exactly [`element_size`](Self::element_size) bytes long.
    pub fn write(&self, data: &[u8]) -> Result<u32> {
        if self.fifo_type()? != FifoType::HostWo {
            return Err(NcError::precondition(
                "fifo is read-only for the host and cannot be written",
            ));
        }
        self.expect_element_len(data.len())?;
        let raw = self.inner.handle.live()?;
        let mut len = element_len(data.len())?;
        // SAFETY: `data` is valid for `len` bytes and the handle is live.
        let status = unsafe { self.api().fifo_write_elem(raw, data, &mut len, 0) };
        check("ncFifoWriteElem", status)?;
        trace!("Wrote {} bytes to fifo {:#x}", len, raw.addr());
        Ok(len)
    }

    /// Write one FP32 element from an array of any shape.
    pub fn write_array<D: ndarray::Dimension>(&self, values: &Array<f32, D>) -> Result<u32> {
        let contiguous = values.as_standard_layout();
        let data = f32_to_bytes(contiguous.as_slice().unwrap_or_default());
        self.write(&data)
    }

    /// Read one FP32 element, shaped `[n, c, h, w]` after the fifo's tensor
    /// descriptor when the sizes agree, otherwise flat.
    pub fn read_array(&self) -> Result<ArrayD<f32>> {
        if self.data_type()? != FifoDataType::Fp32 {
            return Err(NcError::precondition("fifo does not carry fp32 elements"));
        }
        let mut buf = vec![0u8; self.element_size()? as usize];
        let len = self.read(&mut buf)? as usize;
        let values = bytes_to_f32(&buf[..len.min(buf.len())]);

        let shape = element_shape(&self.descriptor()?, values.len());
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| NcError::tensor(format!("Array shape error: {}", e)))
    }

    /// Destroy the native fifo. Later calls are no-ops.
    pub fn dispose(&self) -> Result<()> {
        self.inner.release(Release::Explicit)
    }

    pub(crate) fn release(&self, how: Release) -> Result<()> {
        self.inner.release(how)
    }

    /// Whether the fifo has been released.
    pub fn is_disposed(&self) -> bool {
        self.inner.handle.is_released()
    }

    /// The raw native handle; null once destroyed.
    pub fn raw(&self) -> RawHandle {
        self.inner.handle.raw()
    }

    pub(crate) fn native(&self) -> &NativeHandle {
        &self.inner.handle
    }

    fn api(&self) -> &dyn NcApi {
        self.inner.handle.api()
    }

    fn expect_element_len(&self, len: usize) -> Result<()> {
        let element_size = self.element_size()? as usize;
        if len != element_size {
            return Err(NcError::precondition(format!(
                "buffer is not the correct size: expected {} bytes, given {}",
                element_size, len
            )));
        }
        Ok(())
    }

    // Properties

    /// Current driver-side state of the fifo.
    pub fn state(&self) -> Result<FifoState> {
        property::get(&self.inner.handle, &opt::STATE)
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::ELEMENT_DATA_SIZE)
    }

    /// Maximum number of elements the fifo can hold.
    pub fn capacity(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::CAPACITY)
    }

    /// Elements waiting to be read by the host.
    pub fn read_fill_level(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::READ_FILL_LEVEL)
    }

    /// Elements written by the host and not yet consumed.
    pub fn write_fill_level(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::WRITE_FILL_LEVEL)
    }

    /// Descriptor of the tensor carried by each element.
    pub fn descriptor(&self) -> Result<TensorDescriptor> {
        property::get(&self.inner.handle, &opt::TENSOR_DESCRIPTOR)
    }

    /// Name as recorded by the driver.
    pub fn native_name(&self) -> Result<String> {
        property::get_string(&self.inner.handle, &opt::NAME)
    }

    /// Whether reads and writes return instead of blocking.
    pub fn dont_block(&self) -> Result<bool> {
        property::get(&self.inner.handle, &opt::DONT_BLOCK)
    }

    /// Make writes to a full fifo fail instead of waiting.
    pub fn set_dont_block(&self, dont_block: bool) -> Result<()> {
        property::set(&self.inner.handle, &opt::DONT_BLOCK, &dont_block)
    }

    /// Host-side element data type.
    pub fn data_type(&self) -> Result<FifoDataType> {
        property::get(&self.inner.handle, &opt::DATA_TYPE)
    }

    /// Set the host-side element data type. Only valid before allocation.
    pub fn set_data_type(&self, data_type: FifoDataType) -> Result<()> {
        property::set(&self.inner.handle, &opt::DATA_TYPE, &data_type)
    }

    /// Which side may read and which may write.
    pub fn fifo_type(&self) -> Result<FifoType> {
        property::get(&self.inner.handle, &opt::TYPE)
    }

    /// Set the access direction. Only valid before allocation.
    pub fn set_fifo_type(&self, fifo_type: FifoType) -> Result<()> {
        property::set(&self.inner.handle, &opt::TYPE, &fifo_type)
    }

    /// Number of reads an element must see before it leaves the queue.
    pub fn consumer_count(&self) -> Result<u32> {
        property::get(&self.inner.handle, &opt::CONSUMER_COUNT)
    }

    /// Set how many reads consume an element. Only valid before allocation.
    pub fn set_consumer_count(&self, count: u32) -> Result<()> {
        property::set(&self.inner.handle, &opt::CONSUMER_COUNT, &count)
    }
}

impl PartialEq for Fifo {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Fifo {}

impl fmt::Debug for Fifo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fifo").field("handle", &self.inner.handle).finish()
    }
}

fn element_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| NcError::precondition("element exceeds 4 GiB"))
}

/// `[n, c, h, w]` when the descriptor accounts for exactly `len` values,
/// otherwise `[len]`.
fn element_shape(descriptor: &TensorDescriptor, len: usize) -> Vec<usize> {
    if descriptor.num_values() == Some(len) {
        descriptor.shape().to_vec()
    } else {
        vec![len]
    }
}

pub(crate) fn f32_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub(crate) fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
