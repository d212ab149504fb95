use std::fmt;
use std::ptr;

use crate::header::{HEADER_SIZE, MethodHeader};
use crate::isa::InstructionSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    CodeTooLarge(usize),
    CodeInfoTooLarge(usize),
    Allocation(String),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::CodeTooLarge(len) => write!(f, "code too large for a method header: {len}"),
            RegionError::CodeInfoTooLarge(len) => {
                write!(f, "code info too large for a method header: {len}")
            }
            RegionError::Allocation(message) => write!(f, "code region allocation failed: {message}"),
        }
    }
}

impl std::error::Error for RegionError {}

/// One contiguous allocation holding a method's code info blob, header and
/// machine code, with the code start aligned for `isa`.
pub struct CodeRegion {
    base: *mut u8,
    len: usize,
    code_offset: usize,
    isa: InstructionSet,
}

// SAFETY: after construction the region is only mutated through `&mut self`
// or through the header's atomic deoptimize flag.
unsafe impl Send for CodeRegion {}
unsafe impl Sync for CodeRegion {}

impl CodeRegion {
    pub fn compiled(
        isa: InstructionSet,
        code_info: &[u8],
        code: &[u8],
    ) -> Result<Self, RegionError> {
        let code_size = checked_code_size(code.len())?;
        let info_offset = if code_info.is_empty() {
            0
        } else {
            let offset = code_info.len() + HEADER_SIZE;
            u32::try_from(offset).map_err(|_| RegionError::CodeInfoTooLarge(code_info.len()))?
        };
        Self::emit(isa, code_info, info_offset, code_size, code)
    }

    pub fn stub(isa: InstructionSet, code: &[u8]) -> Result<Self, RegionError> {
        checked_code_size(code.len())?;
        Self::emit(isa, &[], 0, MethodHeader::STUB_SENTINEL, code)
    }

    fn emit(
        isa: InstructionSet,
        code_info: &[u8],
        info_offset: u32,
        code_size: u32,
        code: &[u8],
    ) -> Result<Self, RegionError> {
        let code_offset = (code_info.len() + HEADER_SIZE).next_multiple_of(isa.code_alignment());
        let len = code_offset + code.len();
        let base = alloc_code_region(len)?;
        let _ = base.expose_provenance();

        let header_offset = code_offset - HEADER_SIZE;
        let info_start = header_offset - code_info.len();
        // SAFETY: `base` points to `len` writable bytes and every write below
        // stays inside `[0, len)`; the header offset is 8-byte aligned because
        // the code offset is aligned to at least 8.
        unsafe {
            ptr::copy_nonoverlapping(code_info.as_ptr(), base.add(info_start), code_info.len());
            ptr::write(
                base.add(header_offset).cast::<MethodHeader>(),
                MethodHeader::new(info_offset, code_size),
            );
            ptr::copy_nonoverlapping(code.as_ptr(), base.add(code_offset), code.len());
        }

        tracing::debug!(
            isa = %isa,
            base = format_args!("{:#x}", base.addr()),
            code_offset,
            code_len = code.len(),
            info_offset,
            "allocated code region"
        );
        Ok(Self {
            base,
            len,
            code_offset,
            isa,
        })
    }

    pub fn isa(&self) -> InstructionSet {
        self.isa
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn code_ptr(&self) -> *const u8 {
        self.base.wrapping_add(self.code_offset)
    }

    pub fn entry_point(&self) -> *const u8 {
        let isa = self.isa;
        self.code_ptr()
            .map_addr(|addr| isa.code_pointer_to_entry_point(addr))
    }

    pub fn header(&self) -> &MethodHeader {
        let header = MethodHeader::from_code_pointer_for(self.isa, self.code_ptr());
        // SAFETY: `emit` wrote a header directly in front of the code and the
        // mapping lives as long as `self`.
        unsafe { &*header }
    }

    pub fn header_mut(&mut self) -> &mut MethodHeader {
        let header = MethodHeader::from_code_pointer_for(self.isa, self.code_ptr());
        // SAFETY: as in `header`, with exclusivity from `&mut self`.
        unsafe { &mut *header }
    }
}

impl Drop for CodeRegion {
    fn drop(&mut self) {
        if let Err(err) = free_code_region(self.base, self.len) {
            tracing::warn!("failed to release code region: {err}");
        }
    }
}

impl fmt::Debug for CodeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeRegion")
            .field("isa", &self.isa)
            .field("base", &format_args!("{:#x}", self.base.addr()))
            .field("len", &self.len)
            .field("code_offset", &self.code_offset)
            .finish()
    }
}

fn checked_code_size(len: usize) -> Result<u32, RegionError> {
    match u32::try_from(len) {
        Ok(size) if size < MethodHeader::CODE_SIZE_MASK => Ok(size),
        _ => Err(RegionError::CodeTooLarge(len)),
    }
}

#[cfg(unix)]
fn alloc_code_region(len: usize) -> Result<*mut u8, RegionError> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_ANON | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(RegionError::Allocation(format!(
            "mmap failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(ptr as *mut u8)
}

#[cfg(unix)]
fn free_code_region(ptr: *mut u8, len: usize) -> Result<(), RegionError> {
    if ptr.is_null() {
        return Ok(());
    }
    let rc = unsafe { libc::munmap(ptr as *mut _, len) };
    if rc != 0 {
        return Err(RegionError::Allocation(format!(
            "munmap failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(windows)]
fn alloc_code_region(len: usize) -> Result<*mut u8, RegionError> {
    use windows_sys::Win32::System::Memory::{
        MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc,
    };

    let ptr = unsafe {
        VirtualAlloc(
            std::ptr::null_mut(),
            len,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        ) as *mut u8
    };
    if ptr.is_null() {
        return Err(RegionError::Allocation(format!(
            "VirtualAlloc failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(ptr)
}

#[cfg(windows)]
fn free_code_region(ptr: *mut u8, _len: usize) -> Result<(), RegionError> {
    use windows_sys::Win32::System::Memory::{MEM_RELEASE, VirtualFree};

    if ptr.is_null() {
        return Ok(());
    }
    let ok = unsafe { VirtualFree(ptr as *mut _, 0, MEM_RELEASE) };
    if ok == 0 {
        return Err(RegionError::Allocation(format!(
            "VirtualFree failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}
