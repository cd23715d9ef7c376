//! Typed access to native options.
//!
//! The driver exposes every property through one untyped call pair:
//! `get_option(handle, id, buffer, &mut len)` and
//! `set_option(handle, id, buffer, len)`. Here each property is described by
//! a schema ([`Property`] or [`ArrayProperty`]) naming its id, its value type
//! and whether it may be written. The value type fixes the byte layout
//! through [`OptionValue`].

use std::marker::PhantomData;
use std::os::raw::c_int;

use tracing::trace;

use crate::error::{NcError, Result};
use crate::native::{
    DeviceState, FifoDataType, FifoState, FifoType, GraphState, HwVersion, LogLevel,
    TensorDescriptor, ThermalThrottling,
};
use crate::status::Status;

/// A value with a fixed native byte layout.
pub trait OptionValue: Sized {
    /// Size of one value in bytes.
    const SIZE: usize;

    /// Decode from exactly `SIZE` native-endian bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Encode into exactly `SIZE` bytes.
    fn encode(&self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($($ty:ty),+) => {$(
        impl OptionValue for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn decode(bytes: &[u8]) -> Result<Self> {
                let raw = bytes
                    .try_into()
                    .map_err(|_| NcError::precondition("option value has the wrong width"))?;
                Ok(<$ty>::from_ne_bytes(raw))
            }

            fn encode(&self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }
        }
    )+};
}

impl_scalar!(u8, i32, u32, f32);

impl OptionValue for bool {
    const SIZE: usize = <i32 as OptionValue>::SIZE;

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(i32::decode(bytes)? != 0)
    }

    fn encode(&self, out: &mut [u8]) {
        i32::from(*self).encode(out)
    }
}

macro_rules! impl_enum {
    ($($ty:ident),+) => {$(
        impl OptionValue for $ty {
            const SIZE: usize = <i32 as OptionValue>::SIZE;

            fn decode(bytes: &[u8]) -> Result<Self> {
                let raw = i32::decode(bytes)?;
                $ty::from_raw(raw).ok_or_else(|| {
                    NcError::precondition(format!(
                        "driver reported unknown {} value {}",
                        stringify!($ty),
                        raw
                    ))
                })
            }

            fn encode(&self, out: &mut [u8]) {
                self.raw().encode(out)
            }
        }
    )+};
}

impl_enum!(
    DeviceState,
    GraphState,
    FifoState,
    FifoType,
    FifoDataType,
    HwVersion,
    ThermalThrottling,
    LogLevel
);

impl OptionValue for TensorDescriptor {
    const SIZE: usize = TensorDescriptor::SIZE;

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(NcError::precondition("tensor descriptor has the wrong width"));
        }
        let field = |i: usize| u32::decode(&bytes[i * 4..(i + 1) * 4]);
        Ok(Self {
            n: field(0)?,
            c: field(1)?,
            w: field(2)?,
            h: field(3)?,
            total_size: field(4)?,
        })
    }

    fn encode(&self, out: &mut [u8]) {
        let fields = [self.n, self.c, self.w, self.h, self.total_size];
        for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
            value.encode(chunk);
        }
    }
}

/// Whether a property may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Schema of a single-valued property.
#[derive(Debug)]
pub struct Property<T> {
    pub id: c_int,
    pub name: &'static str,
    pub access: Access,
    _value: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    pub const fn read_only(id: c_int, name: &'static str) -> Self {
        Self {
            id,
            name,
            access: Access::ReadOnly,
            _value: PhantomData,
        }
    }

    pub const fn read_write(id: c_int, name: &'static str) -> Self {
        Self {
            id,
            name,
            access: Access::ReadWrite,
            _value: PhantomData,
        }
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

/// Schema of a variable-length, read-only array property.
///
/// `max_len` is the element count requested when the caller has no better
/// bound; the driver reports how many it actually filled.
#[derive(Debug)]
pub struct ArrayProperty<T> {
    pub id: c_int,
    pub name: &'static str,
    pub max_len: usize,
    _value: PhantomData<fn() -> T>,
}

impl<T> ArrayProperty<T> {
    pub const fn new(id: c_int, name: &'static str, max_len: usize) -> Self {
        Self {
            id,
            name,
            max_len,
            _value: PhantomData,
        }
    }
}

impl<T> Clone for ArrayProperty<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArrayProperty<T> {}

/// Something the driver's get/set option calls can be aimed at.
pub(crate) trait OptionTarget {
    /// Native get-option; `len` carries the buffer size in and the used size
    /// out. The raw status is returned untranslated.
    fn raw_get_option(&self, option: c_int, data: &mut [u8], len: &mut u32) -> Result<c_int>;

    /// Native set-option, raw status untranslated.
    fn raw_set_option(&self, option: c_int, data: &[u8]) -> Result<c_int>;

    /// Name of the get-option entry point, for error reports.
    fn get_call(&self) -> &'static str;

    /// Name of the set-option entry point, for error reports.
    fn set_call(&self) -> &'static str;
}

fn buffer_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| NcError::precondition("option buffer exceeds 4 GiB"))
}

fn translate(call: &'static str, status: c_int) -> Result<()> {
    crate::status::check(call, status)
}

/// Read a single-valued property.
pub(crate) fn get<T: OptionValue>(target: &impl OptionTarget, prop: &Property<T>) -> Result<T> {
    let mut buf = vec![0u8; T::SIZE];
    let mut len = buffer_len(buf.len())?;
    let status = target.raw_get_option(prop.id, &mut buf, &mut len)?;
    translate(target.get_call(), status)?;
    if len as usize != T::SIZE {
        trace!(
            "option {} reported {} bytes, expected {}",
            prop.name,
            len,
            T::SIZE
        );
    }
    T::decode(&buf)
}

/// Read an array property, starting with room for `max_len` elements.
///
/// The result is cut to the length the driver reports, which is often
/// shorter than requested. If the driver rejects the buffer as too small and
/// says how much it needs, the buffer is grown once and the call repeated,
/// so the result can then hold more than `max_len` elements.
pub(crate) fn get_array<T: OptionValue>(
    target: &impl OptionTarget,
    prop: &ArrayProperty<T>,
    max_len: usize,
) -> Result<Vec<T>> {
    let mut buf = vec![0u8; max_len * T::SIZE];
    let mut len = buffer_len(buf.len())?;
    let mut status = target.raw_get_option(prop.id, &mut buf, &mut len)?;

    if Status::from_code(status) == Status::InvalidDataLength && len as usize > buf.len() {
        trace!("growing {} buffer from {} to {} bytes", prop.name, buf.len(), len);
        buf.resize(len as usize, 0);
        len = buffer_len(buf.len())?;
        status = target.raw_get_option(prop.id, &mut buf, &mut len)?;
    }
    translate(target.get_call(), status)?;

    let used = (len as usize).min(buf.len());
    buf[..used - used % T::SIZE]
        .chunks_exact(T::SIZE)
        .map(T::decode)
        .collect()
}

/// Read a string property of at most `prop.max_len` bytes.
pub(crate) fn get_string(target: &impl OptionTarget, prop: &ArrayProperty<u8>) -> Result<String> {
    let bytes = get_array(target, prop, prop.max_len)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Write a property. Read-only schemas are rejected without a native call.
pub(crate) fn set<T: OptionValue>(
    target: &impl OptionTarget,
    prop: &Property<T>,
    value: &T,
) -> Result<()> {
    if prop.access != Access::ReadWrite {
        return Err(NcError::precondition(format!(
            "option {} is read-only",
            prop.name
        )));
    }
    let mut buf = vec![0u8; T::SIZE];
    value.encode(&mut buf);
    let status = target.raw_set_option(prop.id, &buf)?;
    translate(target.set_call(), status)
}
