//! Return areas: where fallible and string-returning imports write their
//! records.

use bytemuck::Pod;
use hostlink_abi::records::{CallResult, NumberRet, StrRet};

/// Scratch space for one record. Large and aligned enough for any record
/// in [`hostlink_abi::records`].
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetArea([u8; 16]);

impl RetArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset to pass as an import's `ret` argument.
    pub fn offset(&mut self) -> u32 {
        self.0.as_mut_ptr() as usize as u32
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; 16] {
        &mut self.0
    }

    fn read<T: Pod>(&self) -> T {
        bytemuck::pod_read_unaligned(&self.0[..std::mem::size_of::<T>()])
    }

    /// `Ok(value)` or `Err(error_handle)`.
    pub fn call_result(&self) -> Result<u32, u32> {
        self.read::<CallResult>().into_result()
    }

    pub fn str_ret(&self) -> StrRet {
        self.read()
    }

    pub fn number(&self) -> Option<f64> {
        self.read::<NumberRet>().into_option()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_with<T: Pod>(record: &T) -> RetArea {
        let mut area = RetArea::new();
        let bytes = bytemuck::bytes_of(record);
        area.bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        area
    }

    #[test]
    fn test_decodes_call_result() {
        assert_eq!(area_with(&CallResult::ok(130)).call_result(), Ok(130));
        assert_eq!(area_with(&CallResult::err(131)).call_result(), Err(131));
        assert_eq!(RetArea::new().call_result(), Ok(0));
    }

    #[test]
    fn test_decodes_str_and_number() {
        let area = area_with(&StrRet { ptr: 4096, len: 5 });
        assert_eq!(area.str_ret(), StrRet { ptr: 4096, len: 5 });
        assert!(RetArea::new().str_ret().is_absent());

        assert_eq!(area_with(&NumberRet::from_option(Some(2.5))).number(), Some(2.5));
        assert_eq!(area_with(&NumberRet::from_option(None)).number(), None);
    }
}
