use serde::{Deserialize, Serialize};

use crate::isa::{InstructionSet, RUNTIME_ISA};

/// What a catch-handler lookup does when the stack map only has a normal
/// mapping for the queried offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchFallback {
    #[default]
    Strict,
    FallBackToNormal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorConfig {
    pub isa: InstructionSet,
    pub catch_fallback: CatchFallback,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            isa: RUNTIME_ISA,
            catch_fallback: CatchFallback::Strict,
        }
    }
}

impl TranslatorConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
