//! Driver-wide options.

use std::os::raw::c_int;

use crate::error::Result;
use crate::native::{LogLevel, NcApi};
use crate::option::global as opt;
use crate::property::{self, OptionTarget};

/// Targets the driver's global option calls, which take no handle.
struct Global<'a>(&'a dyn NcApi);

impl OptionTarget for Global<'_> {
    fn raw_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> Result<c_int> {
        // SAFETY: `data` is valid for `len` bytes.
        Ok(unsafe { self.0.global_get_option(option, data, len) })
    }

    fn raw_set_option(&self, option: c_int, data: &[u8]) -> Result<c_int> {
        // SAFETY: `data` is valid for its length.
        Ok(unsafe { self.0.global_set_option(option, data) })
    }

    fn get_call(&self) -> &'static str {
        "ncGlobalGetOption"
    }

    fn set_call(&self) -> &'static str {
        "ncGlobalSetOption"
    }
}

/// Version of the native API, as `[major, minor, hotfix, rc]`.
pub fn api_version(api: &dyn NcApi) -> Result<Vec<u32>> {
    property::get_array(&Global(api), &opt::API_VERSION, opt::API_VERSION.max_len)
}

/// Verbosity of the driver's own logging.
pub fn log_level(api: &dyn NcApi) -> Result<LogLevel> {
    property::get(&Global(api), &opt::LOG_LEVEL)
}

/// Set the driver's log level.
pub fn set_log_level(api: &dyn NcApi, level: LogLevel) -> Result<()> {
    property::set(&Global(api), &opt::LOG_LEVEL, &level)
}
