pub mod builder;
pub mod code_info;

pub use builder::{CodeInfoBuilder, EncodeError};
pub use code_info::{CodeInfo, CodeInfoDecoder, CodeInfoError, StackMap, StackMapKind};
