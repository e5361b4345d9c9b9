//! Per-frame result chunks and the final transaction output.

use bytes::Bytes;

use crate::account_store::OutputTransfer;
use crate::async_call::AsyncCallRecord;
use crate::error::ReturnCode;

/// Terminal error of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub code: ReturnCode,
    pub message: String,
}

impl FrameError {
    pub fn new(code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Ordered result chunks of one frame plus its error slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSegment {
    chunks: Vec<Bytes>,
    error: Option<FrameError>,
}

impl OutputSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&mut self, data: Bytes) {
        self.chunks.push(data);
    }

    /// Append chunks produced by an inlined child, keeping their order.
    pub fn append(&mut self, chunks: &[Bytes]) {
        self.chunks.extend_from_slice(chunks);
    }

    /// Record the error; the first one wins.
    pub fn set_error(&mut self, error: FrameError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn error(&self) -> Option<&FrameError> {
        self.error.as_ref()
    }

    pub fn into_chunks(self) -> Vec<Bytes> {
        self.chunks
    }
}

/// Observable result of a top-level call.
#[derive(Debug, Clone, PartialEq)]
pub struct VmOutput {
    pub return_code: ReturnCode,
    pub return_message: String,
    /// Chunks finished by the root frame; empty when it failed
    pub return_data: Vec<Bytes>,
    pub gas_used: u64,
    pub gas_remaining: u64,
    pub gas_refund: u64,
    pub transfers: Vec<OutputTransfer>,
    pub async_calls: Vec<AsyncCallRecord>,
}

impl VmOutput {
    /// Output of a call rejected before its root frame was created.
    pub fn rejected(code: ReturnCode, message: impl Into<String>, gas_limit: u64) -> Self {
        Self {
            return_code: code,
            return_message: message.into(),
            return_data: Vec::new(),
            gas_used: gas_limit,
            gas_remaining: 0,
            gas_refund: 0,
            transfers: Vec::new(),
            async_calls: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.return_code.is_ok()
    }

    /// Return data chunks as lossy UTF-8, for assertions and reports.
    pub fn return_data_strings(&self) -> Vec<String> {
        self.return_data
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }
}
