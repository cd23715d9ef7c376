//! Value types shared with the driver: enumerations, the tensor descriptor
//! and the size constants from the native header.

use std::fmt;
use std::os::raw::c_int;

/// Maximum length of a device, graph or fifo name, including the NUL.
pub const MAX_NAME_SIZE: usize = 28;
/// Number of entries in the device thermal statistics buffer.
pub const THERMAL_BUFFER_SIZE: usize = 100;
/// Size of the debug info string buffers.
pub const DEBUG_BUFFER_SIZE: usize = 120;
/// Maximum number of components in a version array.
pub const VERSION_MAX_SIZE: usize = 4;

macro_rules! c_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Decode the raw integer the driver uses for this value.
            pub fn from_raw(raw: c_int) -> Option<Self> {
                match raw {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// The raw integer the driver uses for this value.
            pub fn raw(self) -> c_int {
                self as c_int
            }
        }
    };
}

c_enum! {
    /// Lifecycle state reported by a device.
    pub enum DeviceState {
        Created = 0,
        Opened = 1,
        Closed = 2,
    }
}

c_enum! {
    /// Lifecycle state reported by a graph.
    pub enum GraphState {
        Created = 0,
        Allocated = 1,
        WaitingForBuffers = 2,
        Running = 3,
    }
}

c_enum! {
    /// Lifecycle state reported by a fifo.
    pub enum FifoState {
        Created = 0,
        Allocated = 1,
    }
}

c_enum! {
    /// Vision processor generation.
    pub enum HwVersion {
        Ma2450 = 0,
        Ma2480 = 1,
    }
}

c_enum! {
    /// Direction of a fifo as seen from the host.
    pub enum FifoType {
        /// Readable by the host, written by graphs.
        HostRo = 0,
        /// Writable by the host, read by graphs.
        HostWo = 1,
    }
}

c_enum! {
    /// Element encoding of a fifo.
    pub enum FifoDataType {
        Fp16 = 0,
        Fp32 = 1,
    }
}

c_enum! {
    /// Throttling applied by the device because of its temperature.
    pub enum ThermalThrottling {
        /// No limit reached.
        NoLimit = 0,
        /// Lower guard temperature reached; short pauses between inferences.
        LowerGuard = 1,
        /// Upper guard temperature reached; long pauses between inferences.
        UpperGuard = 2,
    }
}

c_enum! {
    /// Verbosity of the driver's own logging.
    pub enum LogLevel {
        Debug = 0,
        Info = 1,
        Warn = 2,
        Error = 3,
        Fatal = 4,
    }
}

impl fmt::Display for FifoDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fp16 => write!(f, "fp16"),
            Self::Fp32 => write!(f, "fp32"),
        }
    }
}

/// Shape and byte size of one tensor, as produced by the driver.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TensorDescriptor {
    pub n: u32,
    pub c: u32,
    pub w: u32,
    pub h: u32,
    /// Total size of the tensor in bytes.
    pub total_size: u32,
}

impl TensorDescriptor {
    /// Byte size of the record as exchanged with the driver.
    pub const SIZE: usize = 5 * std::mem::size_of::<u32>();

    /// Dimensions in `[n, c, h, w]` order.
    pub fn shape(&self) -> [usize; 4] {
        [self.n as usize, self.c as usize, self.h as usize, self.w as usize]
    }

    /// Number of scalar values in the tensor, or `None` if the dimensions
    /// overflow `usize`.
    pub fn num_values(&self) -> Option<usize> {
        self.shape()
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }
}

/// Parameters of one fifo allocated together with a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoSpec {
    pub fifo_type: FifoType,
    pub num_elements: i32,
    pub data_type: FifoDataType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_enum_raw_values() {
        assert_eq!(FifoType::HostWo.raw(), 1);
        assert_eq!(FifoDataType::from_raw(1), Some(FifoDataType::Fp32));
        assert_eq!(DeviceState::from_raw(7), None);
        assert_eq!(ThermalThrottling::from_raw(2), Some(ThermalThrottling::UpperGuard));
    }

    #[test]
    fn test_descriptor_layout() {
        assert_eq!(std::mem::size_of::<TensorDescriptor>(), TensorDescriptor::SIZE);

        let desc = TensorDescriptor {
            n: 1,
            c: 3,
            w: 4,
            h: 2,
            total_size: 48,
        };
        assert_eq!(desc.shape(), [1, 3, 2, 4]);
        assert_eq!(desc.num_values(), Some(24));
    }

    #[test]
    fn test_descriptor_value_count_overflow() {
        let desc = TensorDescriptor {
            n: u32::MAX,
            c: u32::MAX,
            w: u32::MAX,
            h: u32::MAX,
            total_size: 16,
        };
        assert_eq!(desc.num_values(), None);
    }
}
