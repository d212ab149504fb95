use serde::{Deserialize, Serialize};

pub const STACK_ALIGNMENT: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionSet {
    Arm,
    Thumb2,
    Arm64,
    X86,
    X86_64,
    Riscv64,
}

#[cfg(target_arch = "arm")]
pub const RUNTIME_ISA: InstructionSet = InstructionSet::Arm;
#[cfg(target_arch = "aarch64")]
pub const RUNTIME_ISA: InstructionSet = InstructionSet::Arm64;
#[cfg(target_arch = "x86")]
pub const RUNTIME_ISA: InstructionSet = InstructionSet::X86;
#[cfg(target_arch = "x86_64")]
pub const RUNTIME_ISA: InstructionSet = InstructionSet::X86_64;
#[cfg(target_arch = "riscv64")]
pub const RUNTIME_ISA: InstructionSet = InstructionSet::Riscv64;

#[cfg(not(any(
    target_arch = "arm",
    target_arch = "aarch64",
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "riscv64"
)))]
compile_error!("unsupported target architecture for compiled method headers");

// The ARM runtime always emits Thumb-2 code, but it is never the runtime ISA itself.
const _: () = assert!(!matches!(RUNTIME_ISA, InstructionSet::Thumb2));

impl InstructionSet {
    pub const fn name(self) -> &'static str {
        match self {
            InstructionSet::Arm => "arm",
            InstructionSet::Thumb2 => "thumb2",
            InstructionSet::Arm64 => "arm64",
            InstructionSet::X86 => "x86",
            InstructionSet::X86_64 => "x86_64",
            InstructionSet::Riscv64 => "riscv64",
        }
    }

    pub const fn code_alignment(self) -> usize {
        match self {
            InstructionSet::Arm | InstructionSet::Thumb2 => 8,
            InstructionSet::Arm64
            | InstructionSet::X86
            | InstructionSet::X86_64
            | InstructionSet::Riscv64 => 16,
        }
    }

    /// Low bit OR'd into published entry points to select the Thumb-2 decoder.
    pub const fn entry_point_tag(self) -> usize {
        match self {
            InstructionSet::Arm | InstructionSet::Thumb2 => 1,
            _ => 0,
        }
    }

    /// Offset applied to the code start before bounds checks; pcs observed
    /// while running Thumb-2 code carry the interworking bit.
    pub const fn bounds_adjustment(self) -> usize {
        match self {
            InstructionSet::Arm | InstructionSet::Thumb2 => 1,
            _ => 0,
        }
    }

    pub const fn code_pointer_to_entry_point(self, code: usize) -> usize {
        code | self.entry_point_tag()
    }

    pub const fn entry_point_to_code_pointer(self, entry_point: usize) -> usize {
        entry_point & !self.entry_point_tag()
    }

    pub const fn is_code_aligned(self, addr: usize) -> bool {
        addr % self.code_alignment() == 0
    }

    pub const fn bounds_contain(self, code_start: usize, code_size: u32, pc: usize) -> bool {
        let start = code_start.wrapping_add(self.bounds_adjustment());
        start <= pc && pc <= start.saturating_add(code_size as usize)
    }
}

impl std::fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
