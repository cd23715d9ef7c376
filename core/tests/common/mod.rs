//! Common test utilities for the integration tests.
//!
//! [`FakeDriver`] implements [`NcApi`] in memory. It keeps the same
//! bookkeeping the real driver does (handles, device state, allocations,
//! fifo queues) and refuses teardown in the wrong order, so the tests can
//! check what the wrappers ask of it. Every entry point is recorded in a
//! call log.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::ffi::CStr;
use std::os::raw::c_int;
use std::sync::{Arc, Mutex, MutexGuard};

use ncapi_rs::native::FifoSpec;
use ncapi_rs::{
    Device, DeviceState, FifoDataType, FifoState, FifoType, Graph, GraphState, HwVersion, NcApi,
    RawHandle, Status, TensorDescriptor, ThermalThrottling,
};

/// One recorded entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeviceCreate(i32),
    DeviceOpen(usize),
    DeviceClose(usize),
    DeviceDestroy(usize),
    GraphCreate(String),
    GraphAllocate(usize),
    GraphDestroy(usize),
    FifoCreate(String),
    FifoAllocate(usize),
    FifoDestroy(usize),
    FifoWrite(usize),
    FifoRead(usize),
    QueueInference(usize),
    GetOption(c_int),
    SetOption(c_int),
}

impl Call {
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Self::DeviceDestroy(_) | Self::GraphDestroy(_) | Self::FifoDestroy(_)
        )
    }
}

/// Input tensor of every fake graph: 1x3x2x2 fp32.
pub const INPUT_DESCRIPTOR: TensorDescriptor = TensorDescriptor {
    n: 1,
    c: 3,
    w: 2,
    h: 2,
    total_size: 48,
};

/// Output tensor of every fake graph: 1x1x1x4 fp32.
pub const OUTPUT_DESCRIPTOR: TensorDescriptor = TensorDescriptor {
    n: 1,
    c: 1,
    w: 4,
    h: 1,
    total_size: 16,
};

/// Stand-in for a compiled graph file.
pub const GRAPH_BLOB: &[u8] = b"compiled graph blob";

/// Create and open the device at `index`.
pub fn opened_device(api: &Arc<dyn NcApi>, index: i32) -> ncapi_rs::Result<Device> {
    let device = Device::create(Arc::clone(api), index)?;
    device.open()?;
    Ok(device)
}

/// Create a graph, allocate it on `device` and give it two-element input
/// and output fifos.
pub fn graph_with_fifos(
    api: &Arc<dyn NcApi>,
    device: &Device,
    name: &str,
) -> ncapi_rs::Result<Graph> {
    let graph = Graph::create(Arc::clone(api), name)?;
    graph.allocate(device, GRAPH_BLOB)?;
    graph.create_input(&format!("{}-in", name), 2)?;
    graph.create_output(&format!("{}-out", name), 2)?;
    Ok(graph)
}

/// What every fake graph computes: the first four inputs, doubled.
pub fn expected_output(input: &[f32]) -> Vec<f32> {
    input.iter().take(4).map(|v| v * 2.0).collect()
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn bytes_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

struct FakeDevice {
    index: i32,
    state: DeviceState,
}

struct FakeGraph {
    name: String,
    device: Option<usize>,
    blob_len: usize,
    executors: i32,
}

struct FakeFifo {
    name: String,
    fifo_type: FifoType,
    data_type: FifoDataType,
    consumer_count: u32,
    dont_block: bool,
    device: Option<usize>,
    graph: Option<usize>,
    capacity: u32,
    queue: VecDeque<Vec<u8>>,
}

impl FakeFifo {
    fn new(name: String, fifo_type: FifoType) -> Self {
        Self {
            name,
            fifo_type,
            data_type: FifoDataType::Fp32,
            consumer_count: 1,
            dont_block: false,
            device: None,
            graph: None,
            capacity: 0,
            queue: VecDeque::new(),
        }
    }

    fn descriptor(&self) -> TensorDescriptor {
        match self.fifo_type {
            FifoType::HostWo => INPUT_DESCRIPTOR,
            FifoType::HostRo => OUTPUT_DESCRIPTOR,
        }
    }

    fn element_size(&self) -> u32 {
        match self.data_type {
            FifoDataType::Fp32 => self.descriptor().total_size,
            FifoDataType::Fp16 => self.descriptor().total_size / 2,
        }
    }

    fn is_allocated(&self) -> bool {
        self.device.is_some()
    }
}

#[derive(Default)]
struct State {
    next_handle: usize,
    device_count: i32,
    slot_errors: HashMap<i32, Status>,
    fail_next: HashMap<&'static str, Status>,
    devices: HashMap<usize, FakeDevice>,
    graphs: HashMap<usize, FakeGraph>,
    fifos: HashMap<usize, FakeFifo>,
    device_overrides: HashMap<c_int, Vec<u8>>,
    global: HashMap<c_int, Vec<u8>>,
    calls: Vec<Call>,
}

impl State {
    fn issue(&mut self) -> RawHandle {
        self.next_handle += 0x100;
        RawHandle::from_addr(0x1000 + self.next_handle)
    }

    fn injected(&mut self, call: &'static str) -> Option<c_int> {
        self.fail_next.remove(call).map(Status::code)
    }

    fn device_option(&self, handle: usize, option: c_int) -> Option<Vec<u8>> {
        if let Some(value) = self.device_overrides.get(&option) {
            return Some(value.clone());
        }
        let device = self.devices.get(&handle)?;
        let on_device = |d: Option<usize>| d == Some(handle);
        let value = match option {
            2000 => f32_bytes(&[41.5, 42.0, 42.5]),
            2001 => ThermalThrottling::NoLimit.raw().to_ne_bytes().to_vec(),
            2002 => device.state.raw().to_ne_bytes().to_vec(),
            2003 => {
                let used: usize = self
                    .graphs
                    .values()
                    .filter(|g| on_device(g.device))
                    .map(|g| g.blob_len)
                    .sum();
                (used as u32).to_ne_bytes().to_vec()
            }
            2004 => (512u32 << 20).to_ne_bytes().to_vec(),
            2005 => 8u32.to_ne_bytes().to_vec(),
            2006 => {
                let count = self.fifos.values().filter(|f| on_device(f.device)).count();
                (count as u32).to_ne_bytes().to_vec()
            }
            2007 => 4u32.to_ne_bytes().to_vec(),
            2008 => {
                let count = self.graphs.values().filter(|g| on_device(g.device)).count();
                (count as u32).to_ne_bytes().to_vec()
            }
            2009 => 2u32.to_ne_bytes().to_vec(),
            2010 => [2u32, 10, 1, 0].iter().flat_map(|v| v.to_ne_bytes()).collect(),
            2011 => b"fake device".to_vec(),
            2012 => [4u32, 2].iter().flat_map(|v| v.to_ne_bytes()).collect(),
            2013 => format!("ma2480-{}", device.index).into_bytes(),
            2014 => 2u32.to_ne_bytes().to_vec(),
            2015 => HwVersion::Ma2480.raw().to_ne_bytes().to_vec(),
            _ => return None,
        };
        Some(value)
    }

    fn graph_option(&self, handle: usize, option: c_int) -> Result<Vec<u8>, Status> {
        let graph = self.graphs.get(&handle).ok_or(Status::InvalidHandle)?;
        let allocated = graph.device.is_some();
        let require = |v: Vec<u8>| if allocated { Ok(v) } else { Err(Status::NotAllocated) };
        match option {
            1000 => {
                let state = if allocated {
                    GraphState::Allocated
                } else {
                    GraphState::Created
                };
                Ok(state.raw().to_ne_bytes().to_vec())
            }
            1001 => require(f32_bytes(&[0.25, 1.5, 0.75])),
            1002 | 1003 => require(1u32.to_ne_bytes().to_vec()),
            1004 => require(descriptor_bytes(&INPUT_DESCRIPTOR)),
            1005 => require(descriptor_bytes(&OUTPUT_DESCRIPTOR)),
            1006 => Ok(b"no errors".to_vec()),
            1007 => Ok(graph.name.clone().into_bytes()),
            1008 => Ok(1u32.to_ne_bytes().to_vec()),
            1011 => require(12u32.to_ne_bytes().to_vec()),
            1110 => Ok(graph.executors.to_ne_bytes().to_vec()),
            _ => Err(Status::InvalidParameters),
        }
    }

    fn fifo_option(&self, handle: usize, option: c_int) -> Result<Vec<u8>, Status> {
        let fifo = self.fifos.get(&handle).ok_or(Status::InvalidHandle)?;
        let allocated = fifo.is_allocated();
        let require = |v: Vec<u8>| if allocated { Ok(v) } else { Err(Status::NotAllocated) };
        let int = |v: i32| v.to_ne_bytes().to_vec();
        let uint = |v: u32| v.to_ne_bytes().to_vec();
        match option {
            0 => Ok(int(fifo.fifo_type.raw())),
            1 => Ok(uint(fifo.consumer_count)),
            2 => Ok(int(fifo.data_type.raw())),
            3 => Ok(int(i32::from(fifo.dont_block))),
            4 => require(uint(fifo.capacity)),
            5 => require(uint(match fifo.fifo_type {
                FifoType::HostRo => fifo.queue.len() as u32,
                FifoType::HostWo => 0,
            })),
            6 => require(uint(match fifo.fifo_type {
                FifoType::HostWo => fifo.queue.len() as u32,
                FifoType::HostRo => 0,
            })),
            7 => require(descriptor_bytes(&fifo.descriptor())),
            8 => {
                let state = if allocated {
                    FifoState::Allocated
                } else {
                    FifoState::Created
                };
                Ok(int(state.raw()))
            }
            9 => Ok(fifo.name.clone().into_bytes()),
            10 => require(uint(fifo.element_size())),
            _ => Err(Status::InvalidParameters),
        }
    }

    /// Run one inference for `graph` and queue the result on `output`.
    fn infer(&mut self, graph: usize, input: &[u8], output: usize) -> c_int {
        if !self.graphs.get(&graph).is_some_and(|g| g.device.is_some()) {
            return Status::NotAllocated.code();
        }
        let Some(out) = self.fifos.get_mut(&output) else {
            return Status::InvalidHandle.code();
        };
        if !out.is_allocated() {
            return Status::NotAllocated.code();
        }
        if out.queue.len() as u32 >= out.capacity {
            return Status::Busy.code();
        }
        let result = f32_bytes(&expected_output(&bytes_f32(input)));
        let mut element = vec![0u8; out.element_size() as usize];
        let n = element.len().min(result.len());
        element[..n].copy_from_slice(&result[..n]);
        out.queue.push_back(element);
        0
    }
}

fn descriptor_bytes(d: &TensorDescriptor) -> Vec<u8> {
    [d.n, d.c, d.w, d.h, d.total_size]
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect()
}

fn answer(value: Result<Vec<u8>, Status>, data: &mut [u8], len: &mut u32) -> c_int {
    let value = match value {
        Ok(value) => value,
        Err(status) => return status.code(),
    };
    if (*len as usize) < value.len() || data.len() < value.len() {
        *len = value.len() as u32;
        return Status::InvalidDataLength.code();
    }
    data[..value.len()].copy_from_slice(&value);
    *len = value.len() as u32;
    0
}

/// An in-memory driver.
pub struct FakeDriver {
    state: Mutex<State>,
}

impl FakeDriver {
    /// A driver with `device_count` devices at indices `0..device_count`.
    pub fn with_devices(device_count: i32) -> Arc<Self> {
        let mut state = State {
            device_count,
            ..State::default()
        };
        state.global.insert(0, 2i32.to_ne_bytes().to_vec());
        state.global.insert(
            1,
            [2u32, 10, 1, 11].iter().flat_map(|v| v.to_ne_bytes()).collect(),
        );
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn api(self: &Arc<Self>) -> Arc<dyn NcApi> {
        Arc::clone(self) as Arc<dyn NcApi>
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make creating the device at `index` fail with `status`.
    pub fn fail_slot(&self, index: i32, status: Status) {
        self.state().slot_errors.insert(index, status);
    }

    /// Make the next call to `entry_point` fail with `status`.
    pub fn fail_next(&self, entry_point: &'static str, status: Status) {
        self.state().fail_next.insert(entry_point, status);
    }

    /// Answer every device's `option` with `value`.
    pub fn override_device_option(&self, option: c_int, value: Vec<u8>) {
        self.state().device_overrides.insert(option, value);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn destroys(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_destroy).collect()
    }

    pub fn live_devices(&self) -> usize {
        self.state().devices.len()
    }

    pub fn live_graphs(&self) -> usize {
        self.state().graphs.len()
    }

    pub fn live_fifos(&self) -> usize {
        self.state().fifos.len()
    }

    pub fn is_opened(&self, device: RawHandle) -> bool {
        self.state()
            .devices
            .get(&device.addr())
            .is_some_and(|d| d.state == DeviceState::Opened)
    }

    /// Push an element straight onto a fifo's queue.
    pub fn enqueue(&self, fifo: RawHandle, element: Vec<u8>) {
        if let Some(fifo) = self.state().fifos.get_mut(&fifo.addr()) {
            fifo.queue.push_back(element);
        }
    }
}

impl NcApi for FakeDriver {
    unsafe fn global_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::GetOption(option));
        let value = state
            .global
            .get(&option)
            .cloned()
            .ok_or(Status::InvalidParameters);
        answer(value, data, len)
    }

    unsafe fn global_set_option(&self, option: c_int, data: &[u8]) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::SetOption(option));
        if option != 0 || data.len() != 4 {
            return Status::InvalidParameters.code();
        }
        state.global.insert(option, data.to_vec());
        0
    }

    unsafe fn device_create(&self, index: c_int, handle: &mut RawHandle) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::DeviceCreate(index));
        if let Some(status) = state.slot_errors.get(&index) {
            return status.code();
        }
        if index < 0 || index >= state.device_count {
            return Status::DeviceNotFound.code();
        }
        *handle = state.issue();
        state.devices.insert(
            handle.addr(),
            FakeDevice {
                index,
                state: DeviceState::Created,
            },
        );
        0
    }

    unsafe fn device_open(&self, device: RawHandle) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::DeviceOpen(device.addr()));
        if let Some(code) = state.injected("device_open") {
            return code;
        }
        match state.devices.get_mut(&device.addr()) {
            None => Status::InvalidHandle.code(),
            Some(d) if d.state == DeviceState::Opened => Status::Busy.code(),
            Some(d) => {
                d.state = DeviceState::Opened;
                0
            }
        }
    }

    unsafe fn device_close(&self, device: RawHandle) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::DeviceClose(device.addr()));
        if let Some(code) = state.injected("device_close") {
            return code;
        }
        match state.devices.get_mut(&device.addr()) {
            None => Status::InvalidHandle.code(),
            Some(d) if d.state != DeviceState::Opened => Status::Error.code(),
            Some(d) => {
                d.state = DeviceState::Closed;
                0
            }
        }
    }

    unsafe fn device_destroy(&self, device: &mut RawHandle) -> c_int {
        let mut state = self.state();
        let addr = device.addr();
        state.calls.push(Call::DeviceDestroy(addr));
        let Some(d) = state.devices.get(&addr) else {
            return Status::InvalidHandle.code();
        };
        if d.state == DeviceState::Opened {
            return Status::Error.code();
        }
        let in_use = state.graphs.values().any(|g| g.device == Some(addr))
            || state.fifos.values().any(|f| f.device == Some(addr));
        if in_use {
            return Status::Busy.code();
        }
        state.devices.remove(&addr);
        *device = RawHandle::NULL;
        0
    }

    unsafe fn device_get_option(
        &self,
        device: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::GetOption(option));
        if !state.devices.contains_key(&device.addr()) {
            return Status::InvalidHandle.code();
        }
        let value = state
            .device_option(device.addr(), option)
            .ok_or(Status::InvalidParameters);
        answer(value, data, len)
    }

    unsafe fn device_set_option(&self, device: RawHandle, option: c_int, _data: &[u8]) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::SetOption(option));
        if !state.devices.contains_key(&device.addr()) {
            return Status::InvalidHandle.code();
        }
        Status::Unauthorized.code()
    }

    unsafe fn graph_create(&self, name: &CStr, handle: &mut RawHandle) -> c_int {
        let mut state = self.state();
        let name = name.to_string_lossy().into_owned();
        state.calls.push(Call::GraphCreate(name.clone()));
        *handle = state.issue();
        state.graphs.insert(
            handle.addr(),
            FakeGraph {
                name,
                device: None,
                blob_len: 0,
                executors: 1,
            },
        );
        0
    }

    unsafe fn graph_allocate(&self, device: RawHandle, graph: RawHandle, blob: &[u8]) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::GraphAllocate(graph.addr()));
        if let Some(code) = state.injected("graph_allocate") {
            return code;
        }
        match state.devices.get(&device.addr()) {
            None => return Status::InvalidHandle.code(),
            Some(d) if d.state != DeviceState::Opened => return Status::Error.code(),
            Some(_) => {}
        }
        if blob.is_empty() {
            return Status::UnsupportedGraphFile.code();
        }
        match state.graphs.get_mut(&graph.addr()) {
            None => Status::InvalidHandle.code(),
            Some(g) if g.device.is_some() => Status::Error.code(),
            Some(g) => {
                g.device = Some(device.addr());
                g.blob_len = blob.len();
                0
            }
        }
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
        let status = self.graph_allocate(device, graph, blob);
        if status != 0 {
            return status;
        }
        let mut state = self.state();
        let name = state.graphs[&graph.addr()].name.clone();
        for (slot, spec, suffix) in [(input, input_spec, "in"), (output, output_spec, "out")] {
            let mut fifo = FakeFifo::new(format!("{}-{}", name, suffix), spec.fifo_type);
            fifo.data_type = spec.data_type;
            fifo.device = Some(device.addr());
            fifo.graph = Some(graph.addr());
            fifo.capacity = spec.num_elements.max(0) as u32;
            *slot = state.issue();
            state.fifos.insert(slot.addr(), fifo);
        }
        0
    }

    unsafe fn graph_destroy(&self, graph: &mut RawHandle) -> c_int {
        let mut state = self.state();
        let addr = graph.addr();
        state.calls.push(Call::GraphDestroy(addr));
        if let Some(code) = state.injected("graph_destroy") {
            return code;
        }
        if !state.graphs.contains_key(&addr) {
            return Status::InvalidHandle.code();
        }
        if state.fifos.values().any(|f| f.graph == Some(addr)) {
            return Status::Busy.code();
        }
        state.graphs.remove(&addr);
        *graph = RawHandle::NULL;
        0
    }

    unsafe fn graph_get_option(
        &self,
        graph: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::GetOption(option));
        let value = state.graph_option(graph.addr(), option);
        answer(value, data, len)
    }

    unsafe fn graph_set_option(&self, graph: RawHandle, option: c_int, data: &[u8]) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::SetOption(option));
        let Some(g) = state.graphs.get_mut(&graph.addr()) else {
            return Status::InvalidHandle.code();
        };
        match (option, <[u8; 4]>::try_from(data)) {
            (1110, Ok(raw)) => {
                g.executors = i32::from_ne_bytes(raw);
                0
            }
            (1110, Err(_)) => Status::InvalidDataLength.code(),
            _ => Status::Unauthorized.code(),
        }
    }

    unsafe fn graph_queue_inference(
        &self,
        graph: RawHandle,
        inputs: &[RawHandle],
        outputs: &[RawHandle],
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::QueueInference(graph.addr()));
        let ([input], [output]) = (inputs, outputs) else {
            return Status::InvalidParameters.code();
        };
        let Some(element) = state
            .fifos
            .get_mut(&input.addr())
            .and_then(|f| f.queue.pop_front())
        else {
            return Status::Error.code();
        };
        state.infer(graph.addr(), &element, output.addr())
    }

    unsafe fn graph_queue_inference_with_fifo_elem(
        &self,
        graph: RawHandle,
        input: RawHandle,
        output: RawHandle,
        data: &[u8],
        len: &mut u32,
        _user_param: usize,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::QueueInference(graph.addr()));
        if let Some(code) = state.injected("graph_queue_inference") {
            return code;
        }
        match state.fifos.get(&input.addr()) {
            None => return Status::InvalidHandle.code(),
            Some(f) if !f.is_allocated() => return Status::NotAllocated.code(),
            Some(f) if f.fifo_type != FifoType::HostWo => return Status::Unauthorized.code(),
            Some(f) if *len != f.element_size() => return Status::InvalidDataLength.code(),
            Some(_) => {}
        }
        *len = data.len() as u32;
        state.infer(graph.addr(), data, output.addr())
    }

    unsafe fn fifo_create(
        &self,
        name: &CStr,
        fifo_type: FifoType,
        handle: &mut RawHandle,
    ) -> c_int {
        let mut state = self.state();
        let name = name.to_string_lossy().into_owned();
        state.calls.push(Call::FifoCreate(name.clone()));
        *handle = state.issue();
        state.fifos.insert(handle.addr(), FakeFifo::new(name, fifo_type));
        0
    }

    unsafe fn fifo_allocate(
        &self,
        fifo: RawHandle,
        device: RawHandle,
        descriptor: &TensorDescriptor,
        num_elements: u32,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::FifoAllocate(fifo.addr()));
        if let Some(code) = state.injected("fifo_allocate") {
            return code;
        }
        if !state
            .devices
            .get(&device.addr())
            .is_some_and(|d| d.state == DeviceState::Opened)
        {
            return Status::Error.code();
        }
        let Some(f) = state.fifos.get_mut(&fifo.addr()) else {
            return Status::InvalidHandle.code();
        };
        if f.is_allocated() {
            return Status::Error.code();
        }
        if *descriptor != f.descriptor() {
            return Status::InvalidParameters.code();
        }
        f.device = Some(device.addr());
        f.capacity = num_elements;
        0
    }

    unsafe fn fifo_destroy(&self, fifo: &mut RawHandle) -> c_int {
        let mut state = self.state();
        let addr = fifo.addr();
        state.calls.push(Call::FifoDestroy(addr));
        if let Some(code) = state.injected("fifo_destroy") {
            return code;
        }
        if state.fifos.remove(&addr).is_none() {
            return Status::InvalidHandle.code();
        }
        *fifo = RawHandle::NULL;
        0
    }

    unsafe fn fifo_get_option(
        &self,
        fifo: RawHandle,
        option: c_int,
        data: &mut [u8],
        len: &mut u32,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::GetOption(option));
        let value = state.fifo_option(fifo.addr(), option);
        answer(value, data, len)
    }

    unsafe fn fifo_set_option(&self, fifo: RawHandle, option: c_int, data: &[u8]) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::SetOption(option));
        let Some(f) = state.fifos.get_mut(&fifo.addr()) else {
            return Status::InvalidHandle.code();
        };
        let Ok(raw) = <[u8; 4]>::try_from(data) else {
            return Status::InvalidDataLength.code();
        };
        let value = i32::from_ne_bytes(raw);
        // Only the blocking mode may change after allocation.
        if f.is_allocated() && option != 3 {
            return Status::Unauthorized.code();
        }
        match option {
            0 => match FifoType::from_raw(value) {
                Some(t) => f.fifo_type = t,
                None => return Status::InvalidParameters.code(),
            },
            1 => f.consumer_count = value as u32,
            2 => match FifoDataType::from_raw(value) {
                Some(t) => f.data_type = t,
                None => return Status::InvalidParameters.code(),
            },
            3 => f.dont_block = value != 0,
            _ => return Status::Unauthorized.code(),
        }
        0
    }

    unsafe fn fifo_write_elem(
        &self,
        fifo: RawHandle,
        data: &[u8],
        len: &mut u32,
        _user_param: usize,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::FifoWrite(fifo.addr()));
        let Some(f) = state.fifos.get_mut(&fifo.addr()) else {
            return Status::InvalidHandle.code();
        };
        if !f.is_allocated() {
            return Status::NotAllocated.code();
        }
        if f.fifo_type != FifoType::HostWo {
            return Status::Unauthorized.code();
        }
        if *len != f.element_size() {
            return Status::InvalidDataLength.code();
        }
        if f.queue.len() as u32 >= f.capacity {
            return Status::Busy.code();
        }
        f.queue.push_back(data.to_vec());
        0
    }

    unsafe fn fifo_read_elem(
        &self,
        fifo: RawHandle,
        data: &mut [u8],
        len: &mut u32,
        user_param: &mut usize,
    ) -> c_int {
        let mut state = self.state();
        state.calls.push(Call::FifoRead(fifo.addr()));
        let Some(f) = state.fifos.get_mut(&fifo.addr()) else {
            return Status::InvalidHandle.code();
        };
        if !f.is_allocated() {
            return Status::NotAllocated.code();
        }
        if f.fifo_type != FifoType::HostRo {
            return Status::Unauthorized.code();
        }
        if *len != f.element_size() {
            return Status::InvalidDataLength.code();
        }
        let Some(element) = f.queue.pop_front() else {
            return Status::Timeout.code();
        };
        let n = element.len().min(data.len());
        data[..n].copy_from_slice(&element[..n]);
        *len = n as u32;
        *user_param = 0;
        0
    }
}
