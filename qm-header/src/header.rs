use std::fmt;
use std::mem::{offset_of, size_of};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::fatal::contract_violation;
use crate::isa::{InstructionSet, RUNTIME_ISA, STACK_ALIGNMENT};
use crate::logging;
use crate::stack_map::{FrameInfo, StackMapDecoder};
use crate::{check, debug_check};

pub const HEADER_SIZE: usize = size_of::<MethodHeader>();

/// Metadata record placed directly in front of the machine code of one
/// compiled method. The optional frame/stack-map blob sits in front of the
/// header, ending where the header begins:
///
/// ```text
/// [ code info blob ][ MethodHeader ][ code bytes ... ]
/// ^ code - info_offset             ^ code
/// ```
///
/// A `MethodHeader` is only meaningful in place. References to one are
/// obtained from [`MethodHeader::from_code_pointer`] or from a
/// [`CodeRegion`](crate::region::CodeRegion), never by moving the record.
#[repr(C)]
pub struct MethodHeader {
    info_offset: u32,
    code_size: AtomicU32,
}

const _: () = assert!(HEADER_SIZE == 8);

impl MethodHeader {
    pub const SHOULD_DEOPTIMIZE_MASK: u32 = 0x8000_0000;
    pub const CODE_SIZE_MASK: u32 = !Self::SHOULD_DEOPTIMIZE_MASK;
    // Stubs and trampolines are prefixed with an all-ones word instead of a
    // real header so that misuse of their addresses can be detected.
    pub const STUB_SENTINEL: u32 = 0xFFFF_FFFF;
    pub const INFO_OFFSET_FIELD: usize = offset_of!(MethodHeader, info_offset);
    pub const CODE_SIZE_FIELD: usize = offset_of!(MethodHeader, code_size);

    pub(crate) const fn new(info_offset: u32, code_size: u32) -> Self {
        Self {
            info_offset,
            code_size: AtomicU32::new(code_size),
        }
    }

    /// In-memory image of a header, for emitters that write headers into
    /// their own code buffers.
    pub fn encode(info_offset: u32, code_size: u32) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[Self::INFO_OFFSET_FIELD..Self::INFO_OFFSET_FIELD + 4]
            .copy_from_slice(&info_offset.to_ne_bytes());
        out[Self::CODE_SIZE_FIELD..Self::CODE_SIZE_FIELD + 4]
            .copy_from_slice(&code_size.to_ne_bytes());
        out
    }

    pub fn from_code_pointer(code: *const u8) -> *mut MethodHeader {
        Self::from_code_pointer_for(RUNTIME_ISA, code)
    }

    pub fn from_code_pointer_for(isa: InstructionSet, code: *const u8) -> *mut MethodHeader {
        let code_addr = code.addr();
        let header_addr = code_addr.wrapping_sub(HEADER_SIZE);
        check!(
            isa.is_code_aligned(code_addr) || isa.is_code_aligned(header_addr),
            "from_code_pointer",
            "code pointer {code_addr:#x} and header {header_addr:#x} are both misaligned for {isa}"
        );
        code.cast_mut().wrapping_sub(HEADER_SIZE).cast()
    }

    pub fn from_entry_point(entry_point: *const u8) -> *mut MethodHeader {
        Self::from_entry_point_for(RUNTIME_ISA, entry_point)
    }

    pub fn from_entry_point_for(isa: InstructionSet, entry_point: *const u8) -> *mut MethodHeader {
        let code = entry_point.map_addr(|addr| isa.entry_point_to_code_pointer(addr));
        Self::from_code_pointer_for(isa, code)
    }

    pub fn addr(&self) -> usize {
        ptr::from_ref(self).addr()
    }

    pub fn code_addr(&self) -> usize {
        self.addr() + HEADER_SIZE
    }

    pub fn code_ptr(&self) -> *const u8 {
        ptr::with_exposed_provenance(self.code_addr())
    }

    pub fn code_size(&self) -> u32 {
        let raw = self.code_size.load(Ordering::Relaxed);
        check!(
            raw & Self::CODE_SIZE_MASK != Self::CODE_SIZE_MASK,
            "code_size",
            "header at {:#x} belongs to a stub or trampoline (raw code size {raw:#010x})",
            self.addr()
        );
        raw & Self::CODE_SIZE_MASK
    }

    pub fn info_offset(&self) -> u32 {
        self.info_offset
    }

    /// Rewrites the distance from the code start back to the code info blob.
    ///
    /// # Safety
    ///
    /// `offset` must be 0, or at least `HEADER_SIZE` with `offset - HEADER_SIZE`
    /// initialized bytes directly in front of this header, inside the same
    /// allocation. The blob accessors build slices from this value without
    /// further checks.
    pub unsafe fn set_info_offset(&mut self, offset: u32) {
        self.info_offset = offset;
    }

    pub fn is_optimized(&self) -> bool {
        self.code_size() != 0 && self.info_offset != 0
    }

    pub fn code_info_ptr(&self) -> *const u8 {
        self.check_optimized("code_info_ptr");
        ptr::with_exposed_provenance(self.code_info_addr())
    }

    pub fn code_info_ptr_mut(&mut self) -> *mut u8 {
        self.check_optimized("code_info_ptr_mut");
        ptr::with_exposed_provenance_mut(self.code_info_addr())
    }

    pub fn code_info(&self) -> &[u8] {
        let data = self.code_info_ptr();
        let len = self.code_info_len();
        // SAFETY: a header with a nonzero info offset is only ever emitted
        // with `info_offset - HEADER_SIZE` readable bytes of encoded data
        // directly in front of it, inside the same allocation as the code.
        unsafe { std::slice::from_raw_parts(data, len) }
    }

    pub fn code_info_mut(&mut self) -> &mut [u8] {
        let data = self.code_info_ptr_mut();
        let len = self.code_info_len();
        // SAFETY: as in `code_info`; `&mut self` stands in for exclusive
        // access to the whole method region.
        unsafe { std::slice::from_raw_parts_mut(data, len) }
    }

    /// Table of methods compiled without stack maps. Such methods may still
    /// carry an info offset; optimized methods must use `code_info`.
    pub fn legacy_table(&self) -> Option<*const u8> {
        check!(
            !self.is_optimized(),
            "legacy_table",
            "method at {:#x} is optimized and has no legacy table",
            self.code_addr()
        );
        if self.info_offset == 0 {
            None
        } else {
            Some(ptr::with_exposed_provenance(self.code_info_addr()))
        }
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.contains_for(RUNTIME_ISA, pc)
    }

    pub fn contains_for(&self, isa: InstructionSet, pc: usize) -> bool {
        isa.bounds_contain(self.code_addr(), self.code_size(), pc)
    }

    pub fn entry_point(&self) -> *const u8 {
        self.entry_point_for(RUNTIME_ISA)
    }

    pub fn entry_point_for(&self, isa: InstructionSet) -> *const u8 {
        self.code_ptr()
            .map_addr(|addr| isa.code_pointer_to_entry_point(addr))
    }

    pub fn native_pc_offset(&self, pc: usize) -> usize {
        self.native_pc_offset_for(RUNTIME_ISA, pc)
    }

    pub fn native_pc_offset_for(&self, isa: InstructionSet, pc: usize) -> usize {
        pc.wrapping_sub(self.entry_point_for(isa).addr())
    }

    pub fn frame_info<D: StackMapDecoder + ?Sized>(&self, decoder: &D) -> FrameInfo {
        self.check_optimized("frame_info");
        match decoder.decode_frame_info(self.code_info()) {
            Ok(info) => info,
            Err(err) => contract_violation(
                "frame_info",
                format_args!(
                    "cannot decode frame info of method at {:#x}: {err}",
                    self.code_addr()
                ),
            ),
        }
    }

    pub fn frame_size_in_bytes<D: StackMapDecoder + ?Sized>(&self, decoder: &D) -> u32 {
        let size = self.frame_size_in_bytes_unaligned(decoder);
        debug_check!(
            size as usize % STACK_ALIGNMENT == 0,
            "frame_size_in_bytes",
            "frame size {size} of method at {:#x} is not {STACK_ALIGNMENT}-byte aligned",
            self.code_addr()
        );
        size
    }

    pub fn frame_size_in_bytes_unaligned<D: StackMapDecoder + ?Sized>(&self, decoder: &D) -> u32 {
        self.frame_info(decoder).frame_size_in_bytes
    }

    pub fn set_should_deoptimize(&self) {
        let previous = self
            .code_size
            .fetch_or(Self::SHOULD_DEOPTIMIZE_MASK, Ordering::Relaxed);
        check!(
            previous & Self::SHOULD_DEOPTIMIZE_MASK == 0,
            "set_should_deoptimize",
            "should-deoptimize flag already set on method at {:#x}",
            self.code_addr()
        );
        tracing::debug!(
            category = %logging::category_deopt(),
            code = format_args!("{:#x}", self.code_addr()),
            "should-deoptimize flag set"
        );
    }

    pub fn has_should_deoptimize(&self) -> bool {
        self.code_size.load(Ordering::Relaxed) & Self::SHOULD_DEOPTIMIZE_MASK != 0
    }

    fn check_optimized(&self, query: &'static str) {
        check!(
            self.is_optimized(),
            query,
            "method at {:#x} is not optimized (info offset {:#x})",
            self.code_addr(),
            self.info_offset
        );
    }

    fn code_info_addr(&self) -> usize {
        self.code_addr().wrapping_sub(self.info_offset as usize)
    }

    fn code_info_len(&self) -> usize {
        let offset = self.info_offset as usize;
        check!(
            offset >= HEADER_SIZE,
            "code_info",
            "info offset {offset:#x} of method at {:#x} overlaps its header",
            self.code_addr()
        );
        offset - HEADER_SIZE
    }
}

impl fmt::Debug for MethodHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.code_size.load(Ordering::Relaxed);
        f.debug_struct("MethodHeader")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("info_offset", &format_args!("{:#x}", self.info_offset))
            .field("code_size", &format_args!("{:#x}", raw & Self::CODE_SIZE_MASK))
            .field(
                "should_deoptimize",
                &(raw & Self::SHOULD_DEOPTIMIZE_MASK != 0),
            )
            .finish()
    }
}
