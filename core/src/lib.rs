//! ncapi-rs: Safe Rust bindings for the Neural Compute SDK v2 driver.
//!
//! This crate wraps the native `libmvnc` API in owned [`Device`], [`Graph`]
//! and [`Fifo`] types. Every native status code is translated into an
//! [`NcError`], every property goes through a typed schema, and every native
//! handle is destroyed exactly once, children before parents.
//!
//! The driver is reached through the [`NcApi`] trait. [`LibMvnc`] implements
//! it by loading the shared library at runtime; tests substitute their own.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ncapi_rs::{Device, Graph, LibMvnc, NcApi};
//!
//! let api: Arc<dyn NcApi> = Arc::new(LibMvnc::load()?);
//! let device = Device::create(Arc::clone(&api), 0)?;
//! device.open()?;
//!
//! let graph = Graph::create(Arc::clone(&api), "squeezenet")?;
//! graph.allocate(&device, &std::fs::read("graph")?)?;
//! let input = graph.create_input("input", 2)?;
//! let output = graph.create_output("output", 2)?;
//!
//! let mut tensor = vec![0u8; input.element_size()? as usize];
//! graph.queue_inference(&tensor)?;
//! tensor.resize(output.element_size()? as usize, 0);
//! output.read(&mut tensor)?;
//!
//! // Destroys the fifos, the graph, closes the device, then destroys it.
//! device.dispose()?;
//! ```

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod fifo;
pub mod global;
pub mod graph;
pub mod native;
pub mod option;
mod property;
pub mod resource;
pub mod status;

// Re-export commonly used types
pub use device::{Device, DeviceEnumeration, SlotFailure, DEFAULT_MAX_DEVICES};
pub use error::{NcError, Result};
pub use fifo::Fifo;
pub use graph::{FifoOptions, Graph};
pub use native::{
    DeviceState, FifoDataType, FifoState, FifoType, GraphState, HwVersion, LibMvnc, LogLevel,
    NcApi, RawHandle, TensorDescriptor, ThermalThrottling,
};
pub use property::{Access, ArrayProperty, OptionValue, Property};
pub use status::Status;
