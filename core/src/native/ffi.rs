//! Raw signatures of the `libmvnc` entry points.
//!
//! Every handle is an opaque pointer owned by the driver. Use the safe
//! wrappers in [`crate::device`], [`crate::graph`] and [`crate::fifo`]
//! instead of calling these directly.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

use super::types::TensorDescriptor;

/// Opaque `struct ncDeviceHandle_t *`.
pub type DeviceHandle = *mut c_void;

/// Opaque `struct ncGraphHandle_t *`.
pub type GraphHandle = *mut c_void;

/// Opaque `struct ncFifoHandle_t *`.
pub type FifoHandle = *mut c_void;

/// `ncStatus_t`.
pub type NcStatus = c_int;

// Global options
pub type FnGlobalSetOption =
    unsafe extern "C" fn(option: c_int, data: *const c_void, len: c_uint) -> NcStatus;
pub type FnGlobalGetOption =
    unsafe extern "C" fn(option: c_int, data: *mut c_void, len: *mut c_uint) -> NcStatus;

// Device lifecycle
pub type FnDeviceCreate = unsafe extern "C" fn(index: c_int, handle: *mut DeviceHandle) -> NcStatus;
pub type FnDeviceOpen = unsafe extern "C" fn(handle: DeviceHandle) -> NcStatus;
pub type FnDeviceClose = unsafe extern "C" fn(handle: DeviceHandle) -> NcStatus;
pub type FnDeviceDestroy = unsafe extern "C" fn(handle: *mut DeviceHandle) -> NcStatus;
pub type FnDeviceSetOption = unsafe extern "C" fn(
    handle: DeviceHandle,
    option: c_int,
    data: *const c_void,
    len: c_uint,
) -> NcStatus;
pub type FnDeviceGetOption = unsafe extern "C" fn(
    handle: DeviceHandle,
    option: c_int,
    data: *mut c_void,
    len: *mut c_uint,
) -> NcStatus;

// Graph lifecycle
pub type FnGraphCreate =
    unsafe extern "C" fn(name: *const c_char, handle: *mut GraphHandle) -> NcStatus;
pub type FnGraphAllocate = unsafe extern "C" fn(
    device: DeviceHandle,
    graph: GraphHandle,
    buffer: *const c_void,
    len: c_uint,
) -> NcStatus;
#[allow(clippy::type_complexity)]
pub type FnGraphAllocateWithFifosEx = unsafe extern "C" fn(
    device: DeviceHandle,
    graph: GraphHandle,
    buffer: *const c_void,
    len: c_uint,
    in_fifo: *mut FifoHandle,
    in_type: c_int,
    in_num_elem: c_int,
    in_data_type: c_int,
    out_fifo: *mut FifoHandle,
    out_type: c_int,
    out_num_elem: c_int,
    out_data_type: c_int,
) -> NcStatus;
pub type FnGraphDestroy = unsafe extern "C" fn(handle: *mut GraphHandle) -> NcStatus;
pub type FnGraphSetOption = unsafe extern "C" fn(
    handle: GraphHandle,
    option: c_int,
    data: *const c_void,
    len: c_uint,
) -> NcStatus;
pub type FnGraphGetOption = unsafe extern "C" fn(
    handle: GraphHandle,
    option: c_int,
    data: *mut c_void,
    len: *mut c_uint,
) -> NcStatus;
pub type FnGraphQueueInference = unsafe extern "C" fn(
    graph: GraphHandle,
    fifo_in: *mut FifoHandle,
    in_count: c_uint,
    fifo_out: *mut FifoHandle,
    out_count: c_uint,
) -> NcStatus;
pub type FnGraphQueueInferenceWithFifoElem = unsafe extern "C" fn(
    graph: GraphHandle,
    fifo_in: FifoHandle,
    fifo_out: FifoHandle,
    input: *const c_void,
    input_len: *mut c_uint,
    user_param: *mut c_void,
) -> NcStatus;

// Fifo lifecycle
pub type FnFifoCreate =
    unsafe extern "C" fn(name: *const c_char, fifo_type: c_int, handle: *mut FifoHandle) -> NcStatus;
pub type FnFifoAllocate = unsafe extern "C" fn(
    fifo: FifoHandle,
    device: DeviceHandle,
    descriptor: *mut TensorDescriptor,
    num_elem: c_uint,
) -> NcStatus;
pub type FnFifoDestroy = unsafe extern "C" fn(handle: *mut FifoHandle) -> NcStatus;
pub type FnFifoSetOption = unsafe extern "C" fn(
    handle: FifoHandle,
    option: c_int,
    data: *const c_void,
    len: c_uint,
) -> NcStatus;
pub type FnFifoGetOption = unsafe extern "C" fn(
    handle: FifoHandle,
    option: c_int,
    data: *mut c_void,
    len: *mut c_uint,
) -> NcStatus;
pub type FnFifoWriteElem = unsafe extern "C" fn(
    fifo: FifoHandle,
    input: *const c_void,
    input_len: *mut c_uint,
    user_param: *mut c_void,
) -> NcStatus;
pub type FnFifoReadElem = unsafe extern "C" fn(
    fifo: FifoHandle,
    output: *mut c_void,
    output_len: *mut c_uint,
    user_param: *mut *mut c_void,
) -> NcStatus;
