use std::fmt;

use header::{FrameInfo, StackMapDecoder};

pub(crate) const MAGIC: [u8; 4] = *b"QMSM";
pub(crate) const VERSION: u16 = 1;
pub(crate) const FLAGS: u16 = 0;
pub(crate) const PREFIX_LEN: usize = 24;
pub(crate) const ENTRY_LEN: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StackMapKind {
    Default = 0,
    Catch = 1,
}

impl StackMapKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(StackMapKind::Default),
            1 => Some(StackMapKind::Catch),
            _ => None,
        }
    }

    pub fn for_lookup(for_catch_handler: bool) -> Self {
        if for_catch_handler {
            StackMapKind::Catch
        } else {
            StackMapKind::Default
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StackMapKind::Default => "default",
            StackMapKind::Catch => "catch",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackMap {
    pub native_pc_offset: u32,
    pub guest_offset: u32,
    pub kind: StackMapKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeInfoError {
    UnexpectedEof,
    InvalidMagic([u8; 4]),
    UnsupportedVersion(u16),
    UnsupportedFlags(u16),
    InvalidKind { index: usize, kind: u8 },
    TrailingBytes,
}

impl fmt::Display for CodeInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeInfoError::UnexpectedEof => write!(f, "unexpected end of code info"),
            CodeInfoError::InvalidMagic(found) => write!(f, "invalid code info magic: {found:?}"),
            CodeInfoError::UnsupportedVersion(version) => {
                write!(f, "unsupported code info version: {version}")
            }
            CodeInfoError::UnsupportedFlags(flags) => {
                write!(f, "unsupported code info flags: {flags}")
            }
            CodeInfoError::InvalidKind { index, kind } => {
                write!(f, "invalid stack map kind {kind} at entry {index}")
            }
            CodeInfoError::TrailingBytes => write!(f, "trailing bytes after stack maps"),
        }
    }
}

impl std::error::Error for CodeInfoError {}

/// Read-only view over an encoded code info blob. Parsing validates the
/// whole blob up front; lookups afterwards never allocate.
#[derive(Clone, Copy)]
pub struct CodeInfo<'a> {
    frame: FrameInfo,
    entries: &'a [u8],
    count: usize,
}

impl<'a> CodeInfo<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, CodeInfoError> {
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.read_exact_array::<4>()?;
        if magic != MAGIC {
            return Err(CodeInfoError::InvalidMagic(magic));
        }
        let version = cursor.read_u16()?;
        if version != VERSION {
            return Err(CodeInfoError::UnsupportedVersion(version));
        }
        let flags = cursor.read_u16()?;
        if flags != FLAGS {
            return Err(CodeInfoError::UnsupportedFlags(flags));
        }

        let frame = FrameInfo::new(cursor.read_u32()?, cursor.read_u32()?, cursor.read_u32()?);
        let count = cursor.read_u32()? as usize;
        let entries_len = count
            .checked_mul(ENTRY_LEN)
            .ok_or(CodeInfoError::UnexpectedEof)?;
        let entries = cursor.read_exact(entries_len)?;
        if !cursor.is_eof() {
            return Err(CodeInfoError::TrailingBytes);
        }

        for index in 0..count {
            let kind = entries[index * ENTRY_LEN + 8];
            if StackMapKind::from_u8(kind).is_none() {
                return Err(CodeInfoError::InvalidKind { index, kind });
            }
        }

        Ok(Self {
            frame,
            entries,
            count,
        })
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stack_map(&self, index: usize) -> Option<StackMap> {
        if index >= self.count {
            return None;
        }
        let entry = &self.entries[index * ENTRY_LEN..(index + 1) * ENTRY_LEN];
        Some(StackMap {
            native_pc_offset: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
            guest_offset: u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]),
            kind: StackMapKind::from_u8(entry[8])?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = StackMap> + '_ {
        (0..self.count).filter_map(|index| self.stack_map(index))
    }

    pub fn for_native_offset(&self, native_pc_offset: u32, kind: StackMapKind) -> Option<StackMap> {
        self.iter()
            .find(|map| map.kind == kind && map.native_pc_offset == native_pc_offset)
    }

    pub fn for_guest_offset(&self, guest_offset: u32, kind: StackMapKind) -> Option<StackMap> {
        self.iter()
            .find(|map| map.kind == kind && map.guest_offset == guest_offset)
    }
}

impl fmt::Display for CodeInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frame {} bytes, core spills {:#010x}, fp spills {:#010x}, {} stack maps",
            self.frame.frame_size_in_bytes,
            self.frame.core_spill_mask,
            self.frame.fp_spill_mask,
            self.count
        )?;
        for map in self.iter() {
            writeln!(
                f,
                "  native {:#06x} -> guest {:#06x} ({})",
                map.native_pc_offset,
                map.guest_offset,
                map.kind.name()
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CodeInfoDecoder;

impl StackMapDecoder for CodeInfoDecoder {
    type Error = CodeInfoError;

    fn decode_frame_info(&self, blob: &[u8]) -> Result<FrameInfo, Self::Error> {
        Ok(CodeInfo::parse(blob)?.frame_info())
    }

    fn guest_offset_for_native_offset(
        &self,
        blob: &[u8],
        native_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error> {
        let info = CodeInfo::parse(blob)?;
        let kind = StackMapKind::for_lookup(for_catch_handler);
        Ok(info
            .for_native_offset(native_offset, kind)
            .map(|map| map.guest_offset))
    }

    fn native_offset_for_guest_offset(
        &self,
        blob: &[u8],
        guest_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error> {
        let info = CodeInfo::parse(blob)?;
        let kind = StackMapKind::for_lookup(for_catch_handler);
        Ok(info
            .for_guest_offset(guest_offset, kind)
            .map(|map| map.native_pc_offset))
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn read_u16(&mut self) -> Result<u16, CodeInfoError> {
        let bytes = self.read_exact_array::<2>()?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32, CodeInfoError> {
        let bytes = self.read_exact_array::<4>()?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], CodeInfoError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(CodeInfoError::UnexpectedEof)?;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(CodeInfoError::UnexpectedEof)?;
        self.offset = end;
        Ok(slice)
    }

    fn read_exact_array<const N: usize>(&mut self) -> Result<[u8; N], CodeInfoError> {
        let slice = self.read_exact(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn is_eof(&self) -> bool {
        self.offset == self.bytes.len()
    }
}
