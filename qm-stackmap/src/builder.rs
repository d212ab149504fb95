use std::collections::HashSet;
use std::fmt;

use header::FrameInfo;

use crate::code_info::{ENTRY_LEN, FLAGS, MAGIC, PREFIX_LEN, StackMap, StackMapKind, VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    DuplicateNativeOffset { offset: u32, kind: StackMapKind },
    DuplicateGuestOffset { offset: u32, kind: StackMapKind },
    TooManyStackMaps(usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::DuplicateNativeOffset { offset, kind } => write!(
                f,
                "duplicate {} stack map for native offset {offset:#x}",
                kind.name()
            ),
            EncodeError::DuplicateGuestOffset { offset, kind } => write!(
                f,
                "duplicate {} stack map for guest offset {offset:#x}",
                kind.name()
            ),
            EncodeError::TooManyStackMaps(count) => write!(f, "too many stack maps: {count}"),
        }
    }
}

impl std::error::Error for EncodeError {}

#[derive(Default)]
pub struct CodeInfoBuilder {
    frame: FrameInfo,
    maps: Vec<StackMap>,
}

impl CodeInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame_info(&mut self, frame: FrameInfo) {
        self.frame = frame;
    }

    pub fn add_stack_map(&mut self, native_pc_offset: u32, guest_offset: u32, kind: StackMapKind) {
        self.maps.push(StackMap {
            native_pc_offset,
            guest_offset,
            kind,
        });
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let count =
            u32::try_from(self.maps.len()).map_err(|_| EncodeError::TooManyStackMaps(self.maps.len()))?;

        let mut maps = self.maps.clone();
        maps.sort_by_key(|map| (map.native_pc_offset, map.kind));

        let mut native_seen = HashSet::new();
        let mut guest_seen = HashSet::new();
        for map in &maps {
            if !native_seen.insert((map.kind, map.native_pc_offset)) {
                return Err(EncodeError::DuplicateNativeOffset {
                    offset: map.native_pc_offset,
                    kind: map.kind,
                });
            }
            if !guest_seen.insert((map.kind, map.guest_offset)) {
                return Err(EncodeError::DuplicateGuestOffset {
                    offset: map.guest_offset,
                    kind: map.kind,
                });
            }
        }

        let mut out = Vec::with_capacity(PREFIX_LEN + maps.len() * ENTRY_LEN);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&FLAGS.to_le_bytes());
        out.extend_from_slice(&self.frame.frame_size_in_bytes.to_le_bytes());
        out.extend_from_slice(&self.frame.core_spill_mask.to_le_bytes());
        out.extend_from_slice(&self.frame.fp_spill_mask.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for map in &maps {
            out.extend_from_slice(&map.native_pc_offset.to_le_bytes());
            out.extend_from_slice(&map.guest_offset.to_le_bytes());
            out.push(map.kind as u8);
        }

        tracing::trace!(
            stack_maps = maps.len(),
            bytes = out.len(),
            "encoded code info"
        );
        Ok(out)
    }
}
