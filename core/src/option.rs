//! Option ids of the native API, grouped by the object they apply to.
//!
//! Ids and value types follow `mvnc.h`. `RO` options are read-only,
//! `RW` options can also be set.

/// Driver-wide options (`ncGlobalGetOption` / `ncGlobalSetOption`).
pub mod global {
    use crate::native::{LogLevel, VERSION_MAX_SIZE};
    use crate::property::{ArrayProperty, Property};

    pub const LOG_LEVEL: Property<LogLevel> = Property::read_write(0, "NC_RW_LOG_LEVEL");
    pub const API_VERSION: ArrayProperty<u32> =
        ArrayProperty::new(1, "NC_RO_API_VERSION", VERSION_MAX_SIZE);
}

/// Graph options (`ncGraphGetOption` / `ncGraphSetOption`).
pub mod graph {
    use crate::native::{GraphState, TensorDescriptor, DEBUG_BUFFER_SIZE, MAX_NAME_SIZE};
    use crate::property::{ArrayProperty, Property};

    pub const STATE: Property<GraphState> = Property::read_only(1000, "NC_RO_GRAPH_STATE");
    pub const TIME_TAKEN: ArrayProperty<f32> = ArrayProperty::new(1001, "NC_RO_GRAPH_TIME_TAKEN", 0);
    pub const INPUT_COUNT: Property<u32> = Property::read_only(1002, "NC_RO_GRAPH_INPUT_COUNT");
    pub const OUTPUT_COUNT: Property<u32> = Property::read_only(1003, "NC_RO_GRAPH_OUTPUT_COUNT");
    pub const INPUT_TENSOR_DESCRIPTORS: ArrayProperty<TensorDescriptor> =
        ArrayProperty::new(1004, "NC_RO_GRAPH_INPUT_TENSOR_DESCRIPTORS", 1);
    pub const OUTPUT_TENSOR_DESCRIPTORS: ArrayProperty<TensorDescriptor> =
        ArrayProperty::new(1005, "NC_RO_GRAPH_OUTPUT_TENSOR_DESCRIPTORS", 1);
    pub const DEBUG_INFO: ArrayProperty<u8> =
        ArrayProperty::new(1006, "NC_RO_GRAPH_DEBUG_INFO", DEBUG_BUFFER_SIZE);
    pub const NAME: ArrayProperty<u8> = ArrayProperty::new(1007, "NC_RO_GRAPH_NAME", MAX_NAME_SIZE);
    pub const OPTION_CLASS_LIMIT: Property<u32> =
        Property::read_only(1008, "NC_RO_GRAPH_OPTION_CLASS_LIMIT");
    pub const TIME_TAKEN_ARRAY_SIZE: Property<u32> =
        Property::read_only(1011, "NC_RO_GRAPH_TIME_TAKEN_ARRAY_SIZE");
    pub const EXECUTORS_NUM: Property<i32> = Property::read_write(1110, "NC_RW_GRAPH_EXECUTORS_NUM");
}

/// Device options (`ncDeviceGetOption` / `ncDeviceSetOption`).
pub mod device {
    use crate::native::{
        DeviceState, HwVersion, ThermalThrottling, DEBUG_BUFFER_SIZE, MAX_NAME_SIZE,
        THERMAL_BUFFER_SIZE, VERSION_MAX_SIZE,
    };
    use crate::property::{ArrayProperty, Property};

    pub const THERMAL_STATS: ArrayProperty<f32> =
        ArrayProperty::new(2000, "NC_RO_DEVICE_THERMAL_STATS", THERMAL_BUFFER_SIZE);
    pub const THERMAL_THROTTLING_LEVEL: Property<ThermalThrottling> =
        Property::read_only(2001, "NC_RO_DEVICE_THERMAL_THROTTLING_LEVEL");
    pub const STATE: Property<DeviceState> = Property::read_only(2002, "NC_RO_DEVICE_STATE");
    pub const CURRENT_MEMORY_USED: Property<u32> =
        Property::read_only(2003, "NC_RO_DEVICE_CURRENT_MEMORY_USED");
    pub const MEMORY_SIZE: Property<u32> = Property::read_only(2004, "NC_RO_DEVICE_MEMORY_SIZE");
    pub const MAX_FIFO_NUM: Property<u32> = Property::read_only(2005, "NC_RO_DEVICE_MAX_FIFO_NUM");
    pub const ALLOCATED_FIFO_NUM: Property<u32> =
        Property::read_only(2006, "NC_RO_DEVICE_ALLOCATED_FIFO_NUM");
    pub const MAX_GRAPH_NUM: Property<u32> = Property::read_only(2007, "NC_RO_DEVICE_MAX_GRAPH_NUM");
    pub const ALLOCATED_GRAPH_NUM: Property<u32> =
        Property::read_only(2008, "NC_RO_DEVICE_ALLOCATED_GRAPH_NUM");
    pub const OPTION_CLASS_LIMIT: Property<u32> =
        Property::read_only(2009, "NC_RO_DEVICE_OPTION_CLASS_LIMIT");
    pub const FW_VERSION: ArrayProperty<u32> =
        ArrayProperty::new(2010, "NC_RO_DEVICE_FW_VERSION", VERSION_MAX_SIZE);
    pub const DEBUG_INFO: ArrayProperty<u8> =
        ArrayProperty::new(2011, "NC_RO_DEVICE_DEBUG_INFO", DEBUG_BUFFER_SIZE);
    pub const MVTENSOR_VERSION: ArrayProperty<u32> =
        ArrayProperty::new(2012, "NC_RO_DEVICE_MVTENSOR_VERSION", 2);
    pub const NAME: ArrayProperty<u8> = ArrayProperty::new(2013, "NC_RO_DEVICE_NAME", MAX_NAME_SIZE);
    pub const MAX_EXECUTORS_NUM: Property<u32> =
        Property::read_only(2014, "NC_RO_DEVICE_MAX_EXECUTORS_NUM");
    pub const HW_VERSION: Property<HwVersion> = Property::read_only(2015, "NC_RO_DEVICE_HW_VERSION");
}

/// Fifo options (`ncFifoGetOption` / `ncFifoSetOption`).
pub mod fifo {
    use crate::native::{FifoDataType, FifoState, FifoType, TensorDescriptor, MAX_NAME_SIZE};
    use crate::property::{ArrayProperty, Property};

    pub const TYPE: Property<FifoType> = Property::read_write(0, "NC_RW_FIFO_TYPE");
    pub const CONSUMER_COUNT: Property<u32> = Property::read_write(1, "NC_RW_FIFO_CONSUMER_COUNT");
    pub const DATA_TYPE: Property<FifoDataType> = Property::read_write(2, "NC_RW_FIFO_DATA_TYPE");
    pub const DONT_BLOCK: Property<bool> = Property::read_write(3, "NC_RW_FIFO_DONT_BLOCK");
    pub const CAPACITY: Property<u32> = Property::read_only(4, "NC_RO_FIFO_CAPACITY");
    pub const READ_FILL_LEVEL: Property<u32> = Property::read_only(5, "NC_RO_FIFO_READ_FILL_LEVEL");
    pub const WRITE_FILL_LEVEL: Property<u32> =
        Property::read_only(6, "NC_RO_FIFO_WRITE_FILL_LEVEL");
    pub const TENSOR_DESCRIPTOR: Property<TensorDescriptor> =
        Property::read_only(7, "NC_RO_FIFO_TENSOR_DESCRIPTOR");
    pub const STATE: Property<FifoState> = Property::read_only(8, "NC_RO_FIFO_STATE");
    pub const NAME: ArrayProperty<u8> = ArrayProperty::new(9, "NC_RO_FIFO_NAME", MAX_NAME_SIZE);
    pub const ELEMENT_DATA_SIZE: Property<u32> =
        Property::read_only(10, "NC_RO_FIFO_ELEMENT_DATA_SIZE");
}
