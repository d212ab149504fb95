use std::borrow::Cow;
use std::fmt;

use crate::config::{CatchFallback, TranslatorConfig};
use crate::fatal::contract_violation;
use crate::header::MethodHeader;
use crate::logging;
use crate::stack_map::StackMapDecoder;

/// Opaque handle to the method that owns the compiled code. It is only
/// consulted to name the method in diagnostics.
pub trait MethodIdentity {
    fn pretty_name(&self) -> Cow<'_, str>;
}

impl MethodIdentity for str {
    fn pretty_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl MethodIdentity for String {
    fn pretty_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

struct PrettyMethod<'m, M: ?Sized>(&'m M);

impl<M: MethodIdentity + ?Sized> fmt::Display for PrettyMethod<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.pretty_name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnMiss {
    #[default]
    Abort,
    ReturnNone,
}

pub struct PcTranslator<'a, D: ?Sized> {
    header: &'a MethodHeader,
    decoder: &'a D,
    config: TranslatorConfig,
}

impl<'a, D: StackMapDecoder + ?Sized> PcTranslator<'a, D> {
    pub fn new(header: &'a MethodHeader, decoder: &'a D) -> Self {
        Self::with_config(header, decoder, TranslatorConfig::default())
    }

    pub fn with_config(header: &'a MethodHeader, decoder: &'a D, config: TranslatorConfig) -> Self {
        Self {
            header,
            decoder,
            config,
        }
    }

    pub fn header(&self) -> &'a MethodHeader {
        self.header
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn native_pc_offset(&self, pc: usize) -> usize {
        self.header.native_pc_offset_for(self.config.isa, pc)
    }

    pub fn to_guest_offset<M: MethodIdentity + ?Sized>(
        &self,
        method: &M,
        pc: usize,
        for_catch_handler: bool,
        on_miss: OnMiss,
    ) -> Option<u32> {
        let entry_point = self.header.entry_point_for(self.config.isa).addr();
        let sought = pc.wrapping_sub(entry_point);
        let outcome = match u32::try_from(sought) {
            Ok(native_offset) if self.header.is_optimized() => {
                self.lookup(for_catch_handler, |decoder, blob, catch| {
                    decoder.guest_offset_for_native_offset(blob, native_offset, catch)
                })
            }
            _ => Ok(None),
        };
        match outcome {
            Ok(Some(guest_offset)) => Some(guest_offset),
            Ok(None) => miss(
                on_miss,
                "to_guest_offset",
                format_args!(
                    "no guest offset for native pc offset {sought:#x} (pc {pc:#x}, entry point {entry_point:#x}, catch handler {for_catch_handler}) in {}",
                    PrettyMethod(method)
                ),
            ),
            Err(err) => miss(
                on_miss,
                "to_guest_offset",
                format_args!(
                    "cannot decode stack maps for pc {pc:#x} in {}: {err}",
                    PrettyMethod(method)
                ),
            ),
        }
    }

    pub fn to_native_pc<M: MethodIdentity + ?Sized>(
        &self,
        method: &M,
        guest_offset: u32,
        for_catch_handler: bool,
        on_miss: OnMiss,
    ) -> Option<usize> {
        let outcome = if self.header.is_optimized() {
            self.lookup(for_catch_handler, |decoder, blob, catch| {
                decoder.native_offset_for_guest_offset(blob, guest_offset, catch)
            })
        } else {
            Ok(None)
        };
        match outcome {
            Ok(Some(native_offset)) => {
                let entry_point = self.header.entry_point_for(self.config.isa).addr();
                Some(entry_point.wrapping_add(native_offset as usize))
            }
            Ok(None) => miss(
                on_miss,
                "to_native_pc",
                format_args!(
                    "no native offset for guest offset {guest_offset:#x} (catch handler {for_catch_handler}) in {}",
                    PrettyMethod(method)
                ),
            ),
            Err(err) => miss(
                on_miss,
                "to_native_pc",
                format_args!(
                    "cannot decode stack maps for guest offset {guest_offset:#x} in {}: {err}",
                    PrettyMethod(method)
                ),
            ),
        }
    }

    fn lookup<F>(&self, for_catch_handler: bool, query: F) -> Result<Option<u32>, D::Error>
    where
        F: Fn(&D, &[u8], bool) -> Result<Option<u32>, D::Error>,
    {
        let blob = self.header.code_info();
        let found = query(self.decoder, blob, for_catch_handler)?;
        if found.is_none()
            && for_catch_handler
            && self.config.catch_fallback == CatchFallback::FallBackToNormal
        {
            tracing::debug!(
                category = %logging::category_stack_map(),
                code = format_args!("{:#x}", self.header.code_addr()),
                "no catch-handler stack map, using the normal mapping"
            );
            return query(self.decoder, blob, false);
        }
        Ok(found)
    }
}

fn miss<T>(on_miss: OnMiss, query: &'static str, args: fmt::Arguments<'_>) -> Option<T> {
    match on_miss {
        OnMiss::Abort => contract_violation(query, args),
        OnMiss::ReturnNone => {
            tracing::trace!(category = %logging::category_stack_map(), query, "{args}");
            None
        }
    }
}
