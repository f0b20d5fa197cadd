//! Access to the module's linear memory.
//!
//! The host never keeps a borrowed slice across a call into the module:
//! any such call may grow memory. Longer-lived references are [`View`]s,
//! which remember the epoch they were taken in and refuse access once the
//! region has grown.

use std::marker::PhantomData;
use std::ops::Range;

use bytemuck::Pod;
use hostlink_abi::records::StrRet;

use crate::error::BoundaryError;

pub const PAGE_SIZE: usize = 65536;

/// A contiguous, growable byte region.
pub trait LinearMemory {
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    fn byte_len(&self) -> usize {
        self.data().len()
    }

    /// Changes whenever the region grows. Memory only ever grows, so the
    /// byte length serves unless the implementation tracks its own.
    fn epoch(&self) -> u64 {
        self.byte_len() as u64
    }
}

/// The module's allocator, as exported.
pub trait Allocator {
    fn alloc(&mut self, size: u32, align: u32) -> Result<u32, BoundaryError>;

    fn realloc(
        &mut self,
        ptr: u32,
        old_size: u32,
        new_size: u32,
        align: u32,
    ) -> Result<u32, BoundaryError>;
}

impl LinearMemory for [u8] {
    fn data(&self) -> &[u8] {
        self
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl LinearMemory for Vec<u8> {
    fn data(&self) -> &[u8] {
        self
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// A `(ptr, len)` pair in module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub ptr: u32,
    pub len: u32,
}

impl Slice {
    pub fn to_str_ret(self) -> StrRet {
        StrRet {
            ptr: self.ptr,
            len: self.len,
        }
    }
}

fn checked_range(size: usize, ptr: u32, len: u32) -> Result<Range<usize>, BoundaryError> {
    let start = ptr as usize;
    match start.checked_add(len as usize) {
        Some(end) if end <= size => Ok(start..end),
        _ => Err(BoundaryError::OutOfBounds { ptr, len, size }),
    }
}

pub fn bytes_in<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<&[u8], BoundaryError> {
    let data = mem.data();
    let range = checked_range(data.len(), ptr, len)?;
    Ok(&data[range])
}

pub fn bytes_in_mut<M: LinearMemory + ?Sized>(
    mem: &mut M,
    ptr: u32,
    len: u32,
) -> Result<&mut [u8], BoundaryError> {
    let data = mem.data_mut();
    let range = checked_range(data.len(), ptr, len)?;
    Ok(&mut data[range])
}

pub fn write_bytes<M: LinearMemory + ?Sized>(
    mem: &mut M,
    ptr: u32,
    bytes: &[u8],
) -> Result<(), BoundaryError> {
    bytes_in_mut(mem, ptr, bytes.len() as u32)?.copy_from_slice(bytes);
    Ok(())
}

pub fn read_pod<T: Pod, M: LinearMemory + ?Sized>(mem: &M, ptr: u32) -> Result<T, BoundaryError> {
    let bytes = bytes_in(mem, ptr, std::mem::size_of::<T>() as u32)?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

pub fn write_pod<T: Pod, M: LinearMemory + ?Sized>(
    mem: &mut M,
    ptr: u32,
    value: &T,
) -> Result<(), BoundaryError> {
    write_bytes(mem, ptr, bytemuck::bytes_of(value))
}

/// Decodes `[ptr, ptr + len)` as strict UTF-8.
pub fn string_from_region<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<String, BoundaryError> {
    let bytes = bytes_in(mem, ptr, len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|source| BoundaryError::Decode { ptr, len, source })
}

/// Encodes `value` into a fresh module allocation.
///
/// The first allocation is sized to the string's length in UTF-16 code
/// units, which is exact for ASCII. At the first non-ASCII character the
/// allocation grows once to the worst case for the remainder (three bytes
/// per code unit) and is shrunk back to the encoded length afterwards.
pub fn string_to_region<M>(mem: &mut M, value: &str) -> Result<Slice, BoundaryError>
where
    M: LinearMemory + Allocator + ?Sized,
{
    let units = value.encode_utf16().count() as u32;
    let ptr = mem.alloc(units, 1)?;

    let bytes = value.as_bytes();
    let ascii = bytes.iter().take_while(|b| b.is_ascii()).count();
    write_bytes(mem, ptr, &bytes[..ascii])?;
    if ascii == bytes.len() {
        return Ok(Slice { ptr, len: units });
    }

    let rest = &value[ascii..];
    let offset = ascii as u32;
    let reserved = offset + rest.encode_utf16().count() as u32 * 3;
    let ptr = mem.realloc(ptr, units, reserved, 1)?;
    write_bytes(mem, ptr + offset, rest.as_bytes())?;

    let len = bytes.len() as u32;
    let ptr = if len == reserved {
        ptr
    } else {
        mem.realloc(ptr, reserved, len, 1)?
    };
    Ok(Slice { ptr, len })
}

/// A typed subrange of linear memory that survives across calls.
///
/// Reads copy out of memory; unaligned offsets are fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View<T> {
    ptr: u32,
    len: u32,
    epoch: u64,
    _ty: PhantomData<T>,
}

impl<T: Pod> View<T> {
    const ELEM: u32 = std::mem::size_of::<T>() as u32;

    pub fn acquire<M: LinearMemory + ?Sized>(
        mem: &M,
        ptr: u32,
        len: u32,
    ) -> Result<Self, BoundaryError> {
        let byte_len = len
            .checked_mul(Self::ELEM)
            .ok_or(BoundaryError::OutOfBounds {
                ptr,
                len,
                size: mem.byte_len(),
            })?;
        checked_range(mem.byte_len(), ptr, byte_len)?;
        Ok(Self {
            ptr,
            len,
            epoch: mem.epoch(),
            _ty: PhantomData,
        })
    }

    /// Number of elements.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn is_detached<M: LinearMemory + ?Sized>(&self, mem: &M) -> bool {
        self.epoch != mem.epoch()
    }

    /// Byte length as observed now: zero once the region has grown.
    pub fn byte_len<M: LinearMemory + ?Sized>(&self, mem: &M) -> usize {
        if self.is_detached(mem) {
            0
        } else {
            (self.len * Self::ELEM) as usize
        }
    }

    pub fn as_bytes<'m, M: LinearMemory + ?Sized>(
        &self,
        mem: &'m M,
    ) -> Result<&'m [u8], BoundaryError> {
        if self.is_detached(mem) {
            return Err(BoundaryError::StaleView);
        }
        bytes_in(mem, self.ptr, self.len * Self::ELEM)
    }

    pub fn get<M: LinearMemory + ?Sized>(&self, mem: &M, index: u32) -> Result<T, BoundaryError> {
        let bytes = self.as_bytes(mem)?;
        let start = index as usize * Self::ELEM as usize;
        let elem = bytes
            .get(start..start + Self::ELEM as usize)
            .ok_or(BoundaryError::OutOfBounds {
                ptr: self.ptr.saturating_add(index.saturating_mul(Self::ELEM)),
                len: Self::ELEM,
                size: bytes.len(),
            })?;
        Ok(bytemuck::pod_read_unaligned(elem))
    }

    pub fn to_vec<M: LinearMemory + ?Sized>(&self, mem: &M) -> Result<Vec<T>, BoundaryError> {
        let bytes = self.as_bytes(mem)?;
        Ok(bytes
            .chunks_exact(Self::ELEM as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Runs `f` over the elements, borrowing in place when the offset is
    /// aligned for `T` and copying otherwise.
    pub fn with_slice<M, R>(&self, mem: &M, f: impl FnOnce(&[T]) -> R) -> Result<R, BoundaryError>
    where
        M: LinearMemory + ?Sized,
    {
        let bytes = self.as_bytes(mem)?;
        match bytemuck::try_cast_slice(bytes) {
            Ok(slice) => Ok(f(slice)),
            Err(_) => Ok(f(&self.to_vec(mem)?)),
        }
    }

    /// Re-validates the view against the current region.
    pub fn reacquire<M: LinearMemory + ?Sized>(&mut self, mem: &M) -> Result<(), BoundaryError> {
        *self = Self::acquire(mem, self.ptr, self.len)?;
        Ok(())
    }
}

pub fn bytes_from_region<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<View<u8>, BoundaryError> {
    View::acquire(mem, ptr, len)
}

pub fn i32_from_region<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<View<i32>, BoundaryError> {
    View::acquire(mem, ptr, len)
}

pub fn f32_from_region<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<View<f32>, BoundaryError> {
    View::acquire(mem, ptr, len)
}

pub fn f64_from_region<M: LinearMemory + ?Sized>(
    mem: &M,
    ptr: u32,
    len: u32,
) -> Result<View<f64>, BoundaryError> {
    View::acquire(mem, ptr, len)
}

/// A growable region backed by a `Vec`. Growing moves the contents into a
/// new buffer and detaches the old one.
#[derive(Debug, Default)]
pub struct Region {
    bytes: Vec<u8>,
    epoch: u64,
}

impl Region {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
            epoch: 0,
        }
    }

    pub fn with_pages(pages: usize) -> Self {
        Self::new(pages * PAGE_SIZE)
    }

    /// Grows by `additional` zeroed bytes and returns the previous length.
    pub fn grow(&mut self, additional: usize) -> usize {
        let old_len = self.bytes.len();
        let mut next = Vec::with_capacity(old_len + additional);
        next.extend_from_slice(&self.bytes);
        next.resize(old_len + additional, 0);
        self.bytes = next;
        self.epoch += 1;
        log::trace!("region grew {old_len} -> {} bytes", self.bytes.len());
        old_len
    }
}

impl LinearMemory for Region {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// A cached reference to the whole region. Every access first checks the
/// cached buffer and re-acquires it when it has become zero-length.
#[derive(Debug, Default)]
pub struct RegionView {
    epoch: Option<u64>,
    reacquisitions: u64,
}

impl RegionView {
    /// Length of the cached buffer; zero when never acquired or detached.
    pub fn cached_len<M: LinearMemory + ?Sized>(&self, mem: &M) -> usize {
        match self.epoch {
            Some(epoch) if epoch == mem.epoch() => mem.byte_len(),
            _ => 0,
        }
    }

    /// Returns `true` when the cached buffer had to be (re-)acquired.
    pub fn refresh<M: LinearMemory + ?Sized>(&mut self, mem: &M) -> bool {
        self.observe(mem.epoch(), mem.byte_len())
    }

    /// [`refresh`](Self::refresh) for callers that only know the current
    /// epoch and length.
    pub fn observe(&mut self, epoch: u64, byte_len: usize) -> bool {
        let cached = match self.epoch {
            Some(cached) if cached == epoch => byte_len,
            _ => 0,
        };
        if cached != 0 {
            return false;
        }
        if self.epoch.is_some() {
            self.reacquisitions += 1;
        }
        self.epoch = Some(epoch);
        true
    }

    pub fn bytes<'m, M: LinearMemory + ?Sized>(&mut self, mem: &'m M) -> &'m [u8] {
        self.refresh(mem);
        mem.data()
    }

    /// How many times growth forced a re-acquire.
    pub fn reacquisitions(&self) -> u64 {
        self.reacquisitions
    }
}
