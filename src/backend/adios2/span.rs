//! Span-based zero-copy puts (`GET_BUFFER_VIEW`), spec §4.4.8.
//!
//! ADIOS2 hands out a pointer into its own internal write buffer that the
//! frontend may fill in directly instead of staging a copy through a
//! `WriteBuffer`; the pointer is only valid until the next flush, since a
//! later `Put`/resize on the same engine may reallocate it (spec §5, §8
//! property 6 "span invalidation"). This module tracks which engines
//! support the feature and records live span ids so `mod.rs` can reset them
//! at every flush point.

use crate::backend::Adios2Engine;
use crate::error::{Error, Result};

/// Whether `engine` can hand out spans at all, per
/// `Adios2Engine::supports_span_based_put` (`backend/mod.rs`). A variable
/// with a compression operator attached never gets a span either, since the
/// operator needs to see the whole buffer at once to compress it (spec
/// §4.4.8 note).
pub fn engine_supports_spans(engine: Adios2Engine) -> bool {
    engine.supports_span_based_put()
}

/// Whether a dataset with `operator_count` attached operators may still use
/// a span-based put. Spec §4.4.8: "a variable with any operator attached
/// falls back to a regular buffered put".
pub fn dataset_supports_span(operator_count: usize) -> bool {
    operator_count == 0
}

/// Registry of span ids currently live for one open engine. The ids
/// themselves are minted and owned by the C++ shim (`sys::ffi::engine_get_span`
/// / `span_base_pointer`); this side only needs to remember that at least
/// one is outstanding so `mod.rs` knows to call `engine_reset_spans` at the
/// next flush boundary and invalidate any `BufferViewResult::Span` still
/// referenced by frontend code.
#[derive(Default)]
pub struct SpanRegistry {
    live_count: usize,
}

impl SpanRegistry {
    pub fn new() -> Self {
        SpanRegistry { live_count: 0 }
    }

    pub fn record_issued(&mut self) {
        self.live_count += 1;
    }

    pub fn has_live_spans(&self) -> bool {
        self.live_count > 0
    }

    /// Clears the registry. Must be paired with an `engine_reset_spans` FFI
    /// call so the C++ side actually drops its `Span<T>` handles; called
    /// from every flush point (`PerformPuts`, `EndStep`, `Close`).
    pub fn clear(&mut self) {
        self.live_count = 0;
    }
}

/// Validates a `GET_BUFFER_VIEW` request against the engine/dataset
/// constraints above before crossing the FFI boundary, returning the
/// `OperationUnsupportedInBackend` error spec §4.4.8 calls for when a span
/// cannot be produced.
pub fn validate_span_request(
    engine: Adios2Engine,
    operator_count: usize,
) -> Result<()> {
    if !engine_supports_spans(engine) {
        return Err(Error::unsupported(
            "adios2",
            "this engine does not support GET_BUFFER_VIEW; fall back to a regular WRITE_DATASET",
        ));
    }
    if !dataset_supports_span(operator_count) {
        return Err(Error::unsupported(
            "adios2",
            "a dataset with operators attached cannot be written through a zero-copy span",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_span_when_operators_present() {
        assert!(validate_span_request(Adios2Engine::Bp4, 0).is_ok());
        assert!(validate_span_request(Adios2Engine::Bp4, 1).is_err());
    }

    #[test]
    fn rejects_span_on_unsupported_engine() {
        assert!(validate_span_request(Adios2Engine::Sst, 0).is_err());
    }
}
