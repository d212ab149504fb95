#![allow(dead_code, unused_imports)]

use std::fmt;

pub use header::{
    CatchFallback, CodeRegion, FrameInfo, InstructionSet, MethodHeader, OnMiss, PcTranslator,
    StackMapDecoder, TranslatorConfig,
};

#[derive(Debug)]
pub struct BlobMismatch;

impl fmt::Display for BlobMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoder was handed a foreign blob")
    }
}

// Stack maps kept in plain tables; the blob is only checked for identity so
// tests can tell whether the header handed over the right bytes.
pub struct TableDecoder {
    pub blob: Vec<u8>,
    pub frame: FrameInfo,
    pub normal: Vec<(u32, u32)>,
    pub catch: Vec<(u32, u32)>,
}

impl TableDecoder {
    pub fn new(blob: Vec<u8>, frame: FrameInfo) -> Self {
        Self {
            blob,
            frame,
            normal: Vec::new(),
            catch: Vec::new(),
        }
    }

    pub fn with_normal(mut self, native_offset: u32, guest_offset: u32) -> Self {
        self.normal.push((native_offset, guest_offset));
        self
    }

    pub fn with_catch(mut self, native_offset: u32, guest_offset: u32) -> Self {
        self.catch.push((native_offset, guest_offset));
        self
    }

    fn table(&self, for_catch_handler: bool) -> &[(u32, u32)] {
        if for_catch_handler {
            &self.catch
        } else {
            &self.normal
        }
    }

    fn verify(&self, blob: &[u8]) -> Result<(), BlobMismatch> {
        if blob == self.blob.as_slice() {
            Ok(())
        } else {
            Err(BlobMismatch)
        }
    }
}

impl StackMapDecoder for TableDecoder {
    type Error = BlobMismatch;

    fn decode_frame_info(&self, blob: &[u8]) -> Result<FrameInfo, Self::Error> {
        self.verify(blob)?;
        Ok(self.frame)
    }

    fn guest_offset_for_native_offset(
        &self,
        blob: &[u8],
        native_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error> {
        self.verify(blob)?;
        Ok(self
            .table(for_catch_handler)
            .iter()
            .find(|(native, _)| *native == native_offset)
            .map(|(_, guest)| *guest))
    }

    fn native_offset_for_guest_offset(
        &self,
        blob: &[u8],
        guest_offset: u32,
        for_catch_handler: bool,
    ) -> Result<Option<u32>, Self::Error> {
        self.verify(blob)?;
        Ok(self
            .table(for_catch_handler)
            .iter()
            .find(|(_, guest)| *guest == guest_offset)
            .map(|(native, _)| *native))
    }
}

pub fn blob(len: usize) -> Vec<u8> {
    (0..len).map(|idx| (idx as u8).wrapping_mul(31).wrapping_add(7)).collect()
}

pub fn code(len: usize) -> Vec<u8> {
    vec![0xCC; len]
}

pub fn compiled(isa: InstructionSet, blob_len: usize, code_len: usize) -> CodeRegion {
    CodeRegion::compiled(isa, &blob(blob_len), &code(code_len)).expect("region should allocate")
}
