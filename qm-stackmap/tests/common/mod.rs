#![allow(dead_code, unused_imports)]

pub use header::{
    CatchFallback, CodeRegion, FrameInfo, InstructionSet, MethodHeader, OnMiss, PcTranslator,
    TranslatorConfig,
};
pub use stackmap::{
    CodeInfo, CodeInfoBuilder, CodeInfoDecoder, CodeInfoError, EncodeError, StackMap,
    StackMapKind,
};

pub const METHOD: &str = "Lcom/example/Lexer;->scan(I)V";

pub fn encode(frame: FrameInfo, maps: &[(u32, u32, StackMapKind)]) -> Vec<u8> {
    let mut builder = CodeInfoBuilder::new();
    builder.set_frame_info(frame);
    for &(native, guest, kind) in maps {
        builder.add_stack_map(native, guest, kind);
    }
    builder.encode().expect("code info should encode")
}

pub fn compiled_method(
    isa: InstructionSet,
    frame: FrameInfo,
    maps: &[(u32, u32, StackMapKind)],
    code_len: usize,
) -> CodeRegion {
    let blob = encode(frame, maps);
    CodeRegion::compiled(isa, &blob, &vec![0x90; code_len]).expect("region should allocate")
}

pub fn translator_config(isa: InstructionSet) -> TranslatorConfig {
    TranslatorConfig {
        isa,
        ..TranslatorConfig::default()
    }
}
