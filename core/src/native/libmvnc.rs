//! Dynamic loading of the `libmvnc` driver library.
//!
//! Every entry point is resolved once at load time; a missing symbol fails
//! the load rather than the first call that needs it.

use std::ffi::{c_void, CStr};
use std::os::raw::{c_int, c_uint};
use std::path::Path;
use std::ptr;

use libloading::{Library, Symbol};
use tracing::{debug, info};

use super::ffi::*;
use super::types::{FifoSpec, FifoType, TensorDescriptor};
use super::{NcApi, RawHandle};
use crate::error::{NcError, Result};

#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["mvnc.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libmvnc.dylib", "libmvnc.0.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_NAMES: &[&str] = &["libmvnc.so.0", "libmvnc.so"];

/// The real driver, loaded from a shared library.
pub struct LibMvnc {
    _lib: Library,
    global_set_option: FnGlobalSetOption,
    global_get_option: FnGlobalGetOption,
    device_create: FnDeviceCreate,
    device_open: FnDeviceOpen,
    device_close: FnDeviceClose,
    device_destroy: FnDeviceDestroy,
    device_set_option: FnDeviceSetOption,
    device_get_option: FnDeviceGetOption,
    graph_create: FnGraphCreate,
    graph_allocate: FnGraphAllocate,
    graph_allocate_with_fifos_ex: FnGraphAllocateWithFifosEx,
    graph_destroy: FnGraphDestroy,
    graph_set_option: FnGraphSetOption,
    graph_get_option: FnGraphGetOption,
    graph_queue_inference: FnGraphQueueInference,
    graph_queue_inference_with_fifo_elem: FnGraphQueueInferenceWithFifoElem,
    fifo_create: FnFifoCreate,
    fifo_allocate: FnFifoAllocate,
    fifo_destroy: FnFifoDestroy,
    fifo_set_option: FnFifoSetOption,
    fifo_get_option: FnFifoGetOption,
    fifo_write_elem: FnFifoWriteElem,
    fifo_read_elem: FnFifoReadElem,
}

// SAFETY: the function pointers are plain code addresses and the driver
// serializes access to its own state.
unsafe impl Send for LibMvnc {}
unsafe impl Sync for LibMvnc {}

impl LibMvnc {
    /// Load the driver from the platform's default library names.
    pub fn load() -> Result<Self> {
        let mut last_err = String::new();
        for name in LIBRARY_NAMES {
            // SAFETY: loading libmvnc runs no initializers with preconditions.
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    info!("Loaded driver library from {}", name);
                    return Self::from_library(lib);
                }
                Err(e) => {
                    debug!("Failed to load {}: {}", name, e);
                    last_err = format!("{}: {}", name, e);
                }
            }
        }
        Err(NcError::library(format!(
            "failed to load the mvnc driver library: {}",
            last_err
        )))
    }

    /// Load the driver from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // SAFETY: as in `load`.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| NcError::library(format!("{}: {}", path.display(), e)))?;
        info!("Loaded driver library from {}", path.display());
        Self::from_library(lib)
    }

    fn from_library(lib: Library) -> Result<Self> {
        // SAFETY: each symbol is cast to the signature declared in mvnc.h.
        unsafe {
            Ok(Self {
                global_set_option: Self::load_fn(&lib, "ncGlobalSetOption")?,
                global_get_option: Self::load_fn(&lib, "ncGlobalGetOption")?,
                device_create: Self::load_fn(&lib, "ncDeviceCreate")?,
                device_open: Self::load_fn(&lib, "ncDeviceOpen")?,
                device_close: Self::load_fn(&lib, "ncDeviceClose")?,
                device_destroy: Self::load_fn(&lib, "ncDeviceDestroy")?,
                device_set_option: Self::load_fn(&lib, "ncDeviceSetOption")?,
                device_get_option: Self::load_fn(&lib, "ncDeviceGetOption")?,
                graph_create: Self::load_fn(&lib, "ncGraphCreate")?,
                graph_allocate: Self::load_fn(&lib, "ncGraphAllocate")?,
                graph_allocate_with_fifos_ex: Self::load_fn(&lib, "ncGraphAllocateWithFifosEx")?,
                graph_destroy: Self::load_fn(&lib, "ncGraphDestroy")?,
                graph_set_option: Self::load_fn(&lib, "ncGraphSetOption")?,
                graph_get_option: Self::load_fn(&lib, "ncGraphGetOption")?,
                graph_queue_inference: Self::load_fn(&lib, "ncGraphQueueInference")?,
                graph_queue_inference_with_fifo_elem: Self::load_fn(
                    &lib,
                    "ncGraphQueueInferenceWithFifoElem",
                )?,
                fifo_create: Self::load_fn(&lib, "ncFifoCreate")?,
                fifo_allocate: Self::load_fn(&lib, "ncFifoAllocate")?,
                fifo_destroy: Self::load_fn(&lib, "ncFifoDestroy")?,
                fifo_set_option: Self::load_fn(&lib, "ncFifoSetOption")?,
                fifo_get_option: Self::load_fn(&lib, "ncFifoGetOption")?,
                fifo_write_elem: Self::load_fn(&lib, "ncFifoWriteElem")?,
                fifo_read_elem: Self::load_fn(&lib, "ncFifoReadElem")?,
                _lib: lib,
            })
        }
    }

    unsafe fn load_fn<F: Copy>(lib: &Library, name: &str) -> Result<F> {
        let sym: Symbol<F> = lib
            .get(name.as_bytes())
            .map_err(|e| NcError::library(format!("failed to resolve {}: {}", name, e)))?;
        Ok(*sym)
    }
}

fn c_len(len: usize) -> c_uint {
    c_uint::try_from(len).unwrap_or(c_uint::MAX)
}

impl NcApi for LibMvnc {
    unsafe fn global_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> c_int {
        (self.global_get_option)(option, data.as_mut_ptr().cast(), len)
    }

    unsafe fn global_set_option(&self, option: c_int, data: &[u8]) -> c_int {
        (self.global_set_option)(option, data.as_ptr().cast(), c_len(data.len()))
    }

    unsafe fn device_create(&self, index: c_int, handle: &mut RawHandle) -> c_int {
        let mut raw: DeviceHandle = ptr::null_mut();
        let status = (self.device_create)(index, &mut raw);
        *handle = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn device_open(&self, device: RawHandle) -> c_int {
        (self.device_open)(device.as_ptr())
    }

    unsafe fn device_close(&self, device: RawHandle) -> c_int {
        (self.device_close)(device.as_ptr())
    }

    unsafe fn device_destroy(&self, device: &mut RawHandle) -> c_int {
        let mut raw = device.as_ptr();
        let status = (self.device_destroy)(&mut raw);
        *device = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn device_get_option(
        &self,
        device: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        (self.device_get_option)(device.as_ptr(), option, data.as_mut_ptr().cast(), len)
    }

    unsafe fn device_set_option(&self, device: RawHandle, option: c_int, data: &[u8]) -> c_int {
        (self.device_set_option)(device.as_ptr(), option, data.as_ptr().cast(), c_len(data.len()))
    }

    unsafe fn graph_create(&self, name: &CStr, handle: &mut RawHandle) -> c_int {
        let mut raw: GraphHandle = ptr::null_mut();
        let status = (self.graph_create)(name.as_ptr(), &mut raw);
        *handle = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn graph_allocate(&self, device: RawHandle, graph: RawHandle, blob: &[u8]) -> c_int {
        (self.graph_allocate)(
            device.as_ptr(),
            graph.as_ptr(),
            blob.as_ptr().cast(),
            c_len(blob.len()),
        )
    }

    unsafe fn graph_allocate_with_fifos(
        &self,
        device: RawHandle,
        graph: RawHandle,
        blob: &[u8],
        input: &mut RawHandle,
        input_spec: FifoSpec,
        output: &mut RawHandle,
        output_spec: FifoSpec,
    ) -> c_int {
        let mut in_raw: FifoHandle = ptr::null_mut();
        let mut out_raw: FifoHandle = ptr::null_mut();
        let status = (self.graph_allocate_with_fifos_ex)(
            device.as_ptr(),
            graph.as_ptr(),
            blob.as_ptr().cast(),
            c_len(blob.len()),
            &mut in_raw,
            input_spec.fifo_type.raw(),
            input_spec.num_elements,
            input_spec.data_type.raw(),
            &mut out_raw,
            output_spec.fifo_type.raw(),
            output_spec.num_elements,
            output_spec.data_type.raw(),
        );
        *input = RawHandle::from_ptr(in_raw);
        *output = RawHandle::from_ptr(out_raw);
        status
    }

    unsafe fn graph_destroy(&self, graph: &mut RawHandle) -> c_int {
        let mut raw = graph.as_ptr();
        let status = (self.graph_destroy)(&mut raw);
        *graph = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn graph_get_option(
        &self,
        graph: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        (self.graph_get_option)(graph.as_ptr(), option, data.as_mut_ptr().cast(), len)
    }

    unsafe fn graph_set_option(&self, graph: RawHandle, option: c_int, data: &[u8]) -> c_int {
        (self.graph_set_option)(graph.as_ptr(), option, data.as_ptr().cast(), c_len(data.len()))
    }

    unsafe fn graph_queue_inference(
        &self,
        graph: RawHandle,
        inputs: &[RawHandle],
        outputs: &[RawHandle],
    ) -> c_int {
        let mut inputs: Vec<FifoHandle> = inputs.iter().map(|h| h.as_ptr()).collect();
        let mut outputs: Vec<FifoHandle> = outputs.iter().map(|h| h.as_ptr()).collect();
        (self.graph_queue_inference)(
            graph.as_ptr(),
            inputs.as_mut_ptr(),
            c_len(inputs.len()),
            outputs.as_mut_ptr(),
            c_len(outputs.len()),
        )
    }

    unsafe fn graph_queue_inference_with_fifo_elem(
        &self,
        graph: RawHandle,
        input: RawHandle,
        output: RawHandle,
        data: &[u8],
        len: &mut u32,
        user_param: usize,
    ) -> c_int {
        (self.graph_queue_inference_with_fifo_elem)(
            graph.as_ptr(),
            input.as_ptr(),
            output.as_ptr(),
            data.as_ptr().cast(),
            len,
            user_param as *mut c_void,
        )
    }

    unsafe fn fifo_create(
        &self,
        name: &CStr,
        fifo_type: FifoType,
        handle: &mut RawHandle,
    ) -> c_int {
        let mut raw: FifoHandle = ptr::null_mut();
        let status = (self.fifo_create)(name.as_ptr(), fifo_type.raw(), &mut raw);
        *handle = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn fifo_allocate(
        &self,
        fifo: RawHandle,
        device: RawHandle,
        descriptor: &TensorDescriptor,
        num_elements: u32,
    ) -> c_int {
        let mut descriptor = *descriptor;
        (self.fifo_allocate)(fifo.as_ptr(), device.as_ptr(), &mut descriptor, num_elements)
    }

    unsafe fn fifo_destroy(&self, fifo: &mut RawHandle) -> c_int {
        let mut raw = fifo.as_ptr();
        let status = (self.fifo_destroy)(&mut raw);
        *fifo = RawHandle::from_ptr(raw);
        status
    }

    unsafe fn fifo_get_option(
        &self,
        fifo: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        (self.fifo_get_option)(fifo.as_ptr(), option, data.as_mut_ptr().cast(), len)
    }

    unsafe fn fifo_set_option(&self, fifo: RawHandle, option: c_int, data: &[u8]) -> c_int {
        (self.fifo_set_option)(fifo.as_ptr(), option, data.as_ptr().cast(), c_len(data.len()))
    }

    unsafe fn fifo_write_elem(
        &self,
        fifo: RawHandle,
        data: &[u8],
        len: &mut u32,
        user_param: usize,
    ) -> c_int {
        (self.fifo_write_elem)(
            fifo.as_ptr(),
            data.as_ptr().cast(),
            len,
            user_param as *mut c_void,
        )
    }

    unsafe fn fifo_read_elem(
        &self,
        fifo: RawHandle,
        data: &mut [u8],
        len: &mut u32,
        user_param: &mut usize,
    ) -> c_int {
        let mut param: *mut c_void = ptr::null_mut();
        let status = (self.fifo_read_elem)(fifo.as_ptr(), data.as_mut_ptr().cast(), len, &mut param);
        *user_param = param as usize;
        status
    }
}
