//! Native status codes and their translation into [`NcError`].
//!
//! Every call into the driver returns a `c_int` status. Zero is success and
//! each negative value names one failure kind. [`check`] is the single funnel
//! through which all of those codes pass on their way to the caller.

use std::fmt;
use std::os::raw::c_int;

use crate::error::{NcError, Result};

/// Result code reported by a native driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Busy,
    Error,
    OutOfMemory,
    DeviceNotFound,
    InvalidParameters,
    Timeout,
    MvcmdNotFound,
    NotAllocated,
    Unauthorized,
    UnsupportedGraphFile,
    UnsupportedConfigurationFile,
    UnsupportedFeature,
    MyriadError,
    InvalidDataLength,
    InvalidHandle,
    /// A code outside the documented set.
    Unknown(c_int),
}

impl Status {
    /// Map a raw driver code onto a status kind.
    pub fn from_code(code: c_int) -> Self {
        match code {
            0 => Self::Ok,
            -1 => Self::Busy,
            -2 => Self::Error,
            -3 => Self::OutOfMemory,
            -4 => Self::DeviceNotFound,
            -5 => Self::InvalidParameters,
            -6 => Self::Timeout,
            -7 => Self::MvcmdNotFound,
            -8 => Self::NotAllocated,
            -9 => Self::Unauthorized,
            -10 => Self::UnsupportedGraphFile,
            -11 => Self::UnsupportedConfigurationFile,
            -12 => Self::UnsupportedFeature,
            -13 => Self::MyriadError,
            -14 => Self::InvalidDataLength,
            -15 => Self::InvalidHandle,
            other => Self::Unknown(other),
        }
    }

    /// The raw driver code for this status.
    pub fn code(self) -> c_int {
        match self {
            Self::Ok => 0,
            Self::Busy => -1,
            Self::Error => -2,
            Self::OutOfMemory => -3,
            Self::DeviceNotFound => -4,
            Self::InvalidParameters => -5,
            Self::Timeout => -6,
            Self::MvcmdNotFound => -7,
            Self::NotAllocated => -8,
            Self::Unauthorized => -9,
            Self::UnsupportedGraphFile => -10,
            Self::UnsupportedConfigurationFile => -11,
            Self::UnsupportedFeature => -12,
            Self::MyriadError => -13,
            Self::InvalidDataLength => -14,
            Self::InvalidHandle => -15,
            Self::Unknown(code) => code,
        }
    }

    /// Symbolic name as spelled in the native header.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "NC_OK",
            Self::Busy => "NC_BUSY",
            Self::Error => "NC_ERROR",
            Self::OutOfMemory => "NC_OUT_OF_MEMORY",
            Self::DeviceNotFound => "NC_DEVICE_NOT_FOUND",
            Self::InvalidParameters => "NC_INVALID_PARAMETERS",
            Self::Timeout => "NC_TIMEOUT",
            Self::MvcmdNotFound => "NC_MVCMD_NOT_FOUND",
            Self::NotAllocated => "NC_NOT_ALLOCATED",
            Self::Unauthorized => "NC_UNAUTHORIZED",
            Self::UnsupportedGraphFile => "NC_UNSUPPORTED_GRAPH_FILE",
            Self::UnsupportedConfigurationFile => "NC_UNSUPPORTED_CONFIGURATION_FILE",
            Self::UnsupportedFeature => "NC_UNSUPPORTED_FEATURE",
            Self::MyriadError => "NC_MYRIAD_ERROR",
            Self::InvalidDataLength => "NC_INVALID_DATA_LENGTH",
            Self::InvalidHandle => "NC_INVALID_HANDLE",
            Self::Unknown(_) => "NC_UNKNOWN",
        }
    }

    /// Fixed human-readable description of the status kind.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Busy => "Device is busy, retry later",
            Self::Error => "Error communicating with the device",
            Self::OutOfMemory => "Out of memory",
            Self::DeviceNotFound => "No device at the given index or name",
            Self::InvalidParameters => "At least one of the given parameters is wrong",
            Self::Timeout => "Timeout in the communication with the device",
            Self::MvcmdNotFound => "The file to boot Myriad was not found",
            Self::NotAllocated => "The graph or device has been closed during the operation",
            Self::Unauthorized => "Unauthorized operation",
            Self::UnsupportedGraphFile => "The graph file version is not supported",
            Self::UnsupportedConfigurationFile => "The configuration file version is not supported",
            Self::UnsupportedFeature => "Not supported by this FW version",
            Self::MyriadError => "An error has been reported by the device",
            Self::InvalidDataLength => "Invalid data length has been passed when get/set option",
            Self::InvalidHandle => "Handle to object that is invalid",
            Self::Unknown(_) => "Unrecognized status code",
        }
    }

    /// True for `Status::Ok`.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "{} ({})", self.description(), code),
            _ => write!(f, "{} ({})", self.description(), self.name()),
        }
    }
}

/// Translate the status returned by native entry point `call`.
pub(crate) fn check(call: &'static str, code: c_int) -> Result<()> {
    match Status::from_code(code) {
        Status::Ok => Ok(()),
        status => Err(NcError::Native { call, status }),
    }
}
