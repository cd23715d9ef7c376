//! The native driver as seen by the wrappers.
//!
//! The driver is reached only through the [`NcApi`] capability, which is
//! injected into every [`Device`](crate::Device), [`Graph`](crate::Graph) and
//! [`Fifo`](crate::Fifo). [`LibMvnc`] implements it on top of the real
//! `libmvnc` shared library; tests substitute their own implementation.

mod ffi;
pub mod libmvnc;
pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_int;

pub use libmvnc::LibMvnc;
pub use types::{
    DeviceState, FifoDataType, FifoSpec, FifoState, FifoType, GraphState, HwVersion, LogLevel,
    TensorDescriptor, ThermalThrottling, DEBUG_BUFFER_SIZE, MAX_NAME_SIZE, THERMAL_BUFFER_SIZE,
    VERSION_MAX_SIZE,
};

/// Opaque native handle value.
///
/// This is the pointer the driver hands out, stored as an address so that it
/// can live in atomics and cross threads. It is compared by identity only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    /// The null handle; what the driver writes back after a destroy.
    pub const NULL: Self = Self(0);

    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// True for the null handle.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Entry points of the native neural compute driver.
///
/// Every method mirrors one C function and returns its raw status code.
/// Lengths travel as `u32` the way the C ABI passes `unsigned int`; for the
/// `*_get_option` calls `len` carries the buffer size in and the size the
/// driver actually used out.
///
/// # Safety
///
/// Callers must only pass handles that were produced by the same
/// implementation and have not been destroyed yet. The wrappers in this crate
/// uphold that; implementations may dereference handles without checking.
pub trait NcApi: Send + Sync {
    unsafe fn global_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> c_int;
    unsafe fn global_set_option(&self, option: c_int, data: &[u8]) -> c_int;

    unsafe fn device_create(&self, index: c_int, handle: &mut RawHandle) -> c_int;
    unsafe fn device_open(&self, device: RawHandle) -> c_int;
    unsafe fn device_close(&self, device: RawHandle) -> c_int;
    unsafe fn device_destroy(&self, device: &mut RawHandle) -> c_int;
    unsafe fn device_get_option(
        &self,
        device: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int;
    unsafe fn device_set_option(&self, device: RawHandle, option: c_int, data: &[u8]) -> c_int;

    unsafe fn graph_create(&self, name: &CStr, handle: &mut RawHandle) -> c_int;
    unsafe fn graph_allocate(&self, device: RawHandle, graph: RawHandle, blob: &[u8]) -> c_int;
    #[allow(clippy::too_many_arguments)]
    unsafe fn graph_allocate_with_fifos(
        &self,
        device: RawHandle,
        graph: RawHandle,
        blob: &[u8],
        input: &mut RawHandle,
        input_spec: FifoSpec,
        output: &mut RawHandle,
        output_spec: FifoSpec,
    ) -> c_int;
    unsafe fn graph_destroy(&self, graph: &mut RawHandle) -> c_int;
    unsafe fn graph_get_option(
        &self,
        graph: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int;
    unsafe fn graph_set_option(&self, graph: RawHandle, option: c_int, data: &[u8]) -> c_int;
    unsafe fn graph_queue_inference(
        &self,
        graph: RawHandle,
        inputs: &[RawHandle],
        outputs: &[RawHandle],
    ) -> c_int;
    unsafe fn graph_queue_inference_with_fifo_elem(
        &self,
        graph: RawHandle,
        input: RawHandle,
        output: RawHandle,
        data: &[u8],
        len: &mut u32,
        user_param: usize,
    ) -> c_int;

    unsafe fn fifo_create(&self, name: &CStr, fifo_type: FifoType, handle: &mut RawHandle)
        -> c_int;
    unsafe fn fifo_allocate(
        &self,
        fifo: RawHandle,
        device: RawHandle,
        descriptor: &TensorDescriptor,
        num_elements: u32,
    ) -> c_int;
    unsafe fn fifo_destroy(&self, fifo: &mut RawHandle) -> c_int;
    unsafe fn fifo_get_option(
        &self,
        fifo: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int;
    unsafe fn fifo_set_option(&self, fifo: RawHandle, option: c_int, data: &[u8]) -> c_int;
    unsafe fn fifo_write_elem(
        &self,
        fifo: RawHandle,
        data: &[u8],
        len: &mut u32,
        user_param: usize,
    ) -> c_int;
    unsafe fn fifo_read_elem(
        &self,
        fifo: RawHandle,
        data: &mut [u8],
        len: &mut u32,
        user_param: &mut usize,
    ) -> c_int;
}

/// Encode `name` the way the driver expects object names: at most
/// `MAX_NAME_SIZE - 1` bytes followed by a NUL.
///
/// Truncation happens on a character boundary and stops at any interior NUL.
pub fn c_name(name: &str) -> CString {
    let name = name.split('\0').next().unwrap_or_default();
    let mut end = name.len().min(MAX_NAME_SIZE - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    CString::new(&name[..end]).unwrap_or_default()
}
