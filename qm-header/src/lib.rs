pub mod config;
pub mod fatal;
pub mod header;
pub mod isa;
pub mod logging;
pub mod region;
pub mod stack_map;
pub mod translate;

pub use config::{CatchFallback, TranslatorConfig};
pub use fatal::{AbortHook, AbortHookError, ContractViolation, install_abort_hook};
pub use header::{HEADER_SIZE, MethodHeader};
pub use isa::{InstructionSet, RUNTIME_ISA, STACK_ALIGNMENT};
pub use region::{CodeRegion, RegionError};
pub use stack_map::{FrameInfo, StackMapDecoder};
pub use translate::{MethodIdentity, OnMiss, PcTranslator};
