use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_size_in_bytes: u32,
    pub core_spill_mask: u32,
    pub fp_spill_mask: u32,
}

impl FrameInfo {
    pub const fn new(frame_size_in_bytes: u32, core_spill_mask: u32, fp_spill_mask: u32) -> Self {
        Self {
            frame_size_in_bytes,
            core_spill_mask,
            fp_spill_mask,
        }
    }

    pub const fn core_spill_count(&self) -> u32 {
        self.core_spill_mask.count_ones()
    }

    pub const fn fp_spill_count(&self) -> u32 {
        self.fp_spill_mask.count_ones()
    }
}

/// Decodes the frame/stack-map blob a compiler places in front of a method
/// header. `blob` spans from the start of the encoded data up to the header.
///
/// A lookup that finds nothing returns `Ok(None)`; `Err` is reserved for a
/// blob the decoder cannot read. Callers treat both as a miss.
pub trait StackMapDecoder {
    type Error: std::fmt::Display;

    fn decode_frame_info(&self, blob: &[u8]) -> Result<FrameInfo, Self::Error>;

    fn guest_offset_for_native_offset(
        &self,
        blob: &[u8],
        native_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error>;

    fn native_offset_for_guest_offset(
        &self,
        blob: &[u8],
        guest_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error>;
}
