//! Async call scheduling.
//!
//! A frame calling `async_call` is suspended with everything it had left:
//! the destination receives that gas minus the callback lock, and the
//! caller's `callBack` entry point then runs exactly once with the lock
//! plus whatever the destination did not use.
//!
//! ```text
//! Dispatched -> Executing -> Succeeded | Failed -> CallbackInvoked -> Resumed
//! ```

use bytes::Bytes;
use tracing::{debug, warn};

use crosscall_types::{Address, U256};

use crate::call_data;
use crate::contract::CALLBACK_FUNCTION_NAME;
use crate::dispatcher::VmHost;
use crate::error::{ReturnCode, VmError};
use crate::frame::{FrameId, FrameSpec, FrameStatus, IsolationMode};
use crate::gas_metering::{GasRefundPolicy, GasTracker};
use crate::output::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncCallState {
    Dispatched,
    Executing,
    Succeeded,
    Failed,
    CallbackInvoked,
    Resumed,
}

/// Result of the destination side of an async call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncOutcome {
    Pending,
    Success(Vec<Bytes>),
    Error { code: ReturnCode, message: String },
}

impl AsyncOutcome {
    fn from_error(err: &VmError) -> Self {
        AsyncOutcome::Error {
            code: err.return_code(),
            message: err.to_string(),
        }
    }
}

/// Bookkeeping of one async call, from suspension of the caller until its
/// callback has run.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncCallRecord {
    pub origin_frame: FrameId,
    /// Account the caller acts as; pays the value and hosts the callback
    pub origin_address: Address,
    pub destination: Address,
    pub function: String,
    pub arguments: Vec<Bytes>,
    pub value: U256,
    pub gas_allotted: u64,
    pub callback_gas_lock: u64,
    /// Gas given to the callback: the lock plus the destination's leftover
    pub callback_gas: u64,
    state: AsyncCallState,
    outcome: AsyncOutcome,
    call_data_error: Option<String>,
}

impl AsyncCallRecord {
    pub(crate) fn new(
        origin_frame: FrameId,
        origin_address: Address,
        destination: Address,
        value: U256,
        data: &[u8],
        gas_allotted: u64,
        callback_gas_lock: u64,
    ) -> Self {
        let (function, arguments, call_data_error) = match call_data::parse(data) {
            Ok((function, arguments)) => (function, arguments, None),
            Err(err) => (String::new(), Vec::new(), Some(err.to_string())),
        };
        Self {
            origin_frame,
            origin_address,
            destination,
            function,
            arguments,
            value,
            gas_allotted,
            callback_gas_lock,
            callback_gas: 0,
            state: AsyncCallState::Dispatched,
            outcome: AsyncOutcome::Pending,
            call_data_error,
        }
    }

    pub fn state(&self) -> AsyncCallState {
        self.state
    }

    pub fn outcome(&self) -> &AsyncOutcome {
        &self.outcome
    }

    fn advance(&mut self, next: AsyncCallState) {
        debug!(
            origin = %self.origin_frame,
            dest = %self.destination.short(),
            from = ?self.state,
            to = ?next,
            "Async call state"
        );
        self.state = next;
    }

    fn resolve(&mut self, outcome: AsyncOutcome) {
        let next = match outcome {
            AsyncOutcome::Success(_) => AsyncCallState::Succeeded,
            _ => AsyncCallState::Failed,
        };
        self.outcome = outcome;
        self.advance(next);
    }

    /// Arguments passed to `callBack`: the status code followed by the
    /// destination's chunks, or by the error message.
    pub fn callback_arguments(&self) -> Vec<Bytes> {
        match &self.outcome {
            AsyncOutcome::Success(chunks) => {
                let mut arguments = Vec::with_capacity(chunks.len() + 1);
                arguments.push(Bytes::from(call_data::encode_i64(0)));
                arguments.extend(chunks.iter().cloned());
                arguments
            }
            AsyncOutcome::Error { code, message } => vec![
                Bytes::from(call_data::encode_i64(code.as_i32() as i64)),
                Bytes::copy_from_slice(message.as_bytes()),
            ],
            AsyncOutcome::Pending => Vec::new(),
        }
    }
}

impl VmHost {
    /// Drive the async call the top frame is suspended on, then resume the
    /// frame through its callback. The frame is terminal afterwards.
    pub(crate) fn run_async_call(&mut self) {
        let Some(frame) = self.frames.current_mut() else {
            return;
        };
        let callee = frame.callee;
        let Some(mut record) = frame.pending_async.take() else {
            warn!(frame = %frame.id, "Suspended frame has no pending async call");
            frame.fail(FrameError::new(
                ReturnCode::ExecutionFailed,
                "no pending async call",
            ));
            return;
        };

        record.advance(AsyncCallState::Executing);
        let (outcome, unused) = self.execute_async_destination(&record);
        record.resolve(outcome);

        record.callback_gas = record.callback_gas_lock.saturating_add(unused);
        record.advance(AsyncCallState::CallbackInvoked);
        let resumed = self.execute_callback(&record, callee);

        if let Some(frame) = self.frames.current_mut() {
            match resumed {
                Ok(()) => frame.finish(),
                Err(error) => frame.fail(error),
            }
        }
        record.advance(AsyncCallState::Resumed);
        self.async_calls.push(record);
    }

    /// Run the destination in its own dest-context frame. Returns the
    /// outcome and the gas it left unused.
    fn execute_async_destination(&mut self, record: &AsyncCallRecord) -> (AsyncOutcome, u64) {
        if let Some(message) = &record.call_data_error {
            let err = VmError::InvalidCallData(message.clone());
            return (AsyncOutcome::from_error(&err), record.gas_allotted);
        }

        let checkpoint = self.store.checkpoint();
        if let Err(err) = self.prepare_async_destination(record) {
            self.store.revert_to(checkpoint);
            debug!(dest = %record.destination.short(), error = %err, "Async destination rejected");
            return (AsyncOutcome::from_error(&err), record.gas_allotted);
        }

        let spec = FrameSpec {
            caller: record.origin_address,
            callee: record.destination,
            function: record.function.clone(),
            mode: IsolationMode::DestContext,
            gas: GasTracker::new(record.gas_allotted),
            value: record.value,
            arguments: record.arguments.clone(),
            read_only: false,
        };
        if let Err(err) = self.frames.push(spec, checkpoint) {
            self.store.revert_to(checkpoint);
            return (AsyncOutcome::from_error(&err), record.gas_allotted);
        }
        self.execute_current();

        let destination = match self.frames.pop() {
            Ok(frame) => frame,
            Err(err) => {
                self.store.revert_to(checkpoint);
                return (AsyncOutcome::from_error(&err), 0);
            }
        };
        let unused = destination.gas.remaining();
        if destination.status() == FrameStatus::Finished {
            self.store.commit_to(checkpoint);
            (AsyncOutcome::Success(destination.output.into_chunks()), unused)
        } else {
            self.store.revert_to(checkpoint);
            let error = destination.error().cloned().unwrap_or_else(|| {
                FrameError::new(ReturnCode::ExecutionFailed, "destination failed")
            });
            (
                AsyncOutcome::Error {
                    code: error.code,
                    message: error.message,
                },
                unused,
            )
        }
    }

    fn prepare_async_destination(&mut self, record: &AsyncCallRecord) -> Result<(), VmError> {
        if record.destination.is_zero() {
            return Err(VmError::InvalidAddress(record.destination));
        }
        self.resolve_entry_point(&record.destination, &record.function)?;
        self.store
            .move_balance(&record.origin_address, &record.destination, record.value)
    }

    /// Run `callBack` on the suspended frame's account. Its output lands in
    /// the suspended frame; its failure becomes the frame's error.
    fn execute_callback(
        &mut self,
        record: &AsyncCallRecord,
        callee: Address,
    ) -> Result<(), FrameError> {
        if let Err(err) = self.resolve_entry_point(&callee, CALLBACK_FUNCTION_NAME) {
            warn!(contract = %callee.short(), error = %err, "Cannot resume async caller");
            return Err(FrameError::new(err.return_code(), err.to_string()));
        }

        let checkpoint = self.store.checkpoint();
        let spec = FrameSpec {
            caller: record.destination,
            callee,
            function: CALLBACK_FUNCTION_NAME.to_string(),
            mode: IsolationMode::Callback,
            gas: GasTracker::new(record.callback_gas),
            value: U256::ZERO,
            arguments: record.callback_arguments(),
            read_only: false,
        };
        self.frames
            .push(spec, checkpoint)
            .map_err(|err| FrameError::new(err.return_code(), err.to_string()))?;
        self.execute_current();
        let callback = self
            .frames
            .pop()
            .map_err(|err| FrameError::new(err.return_code(), err.to_string()))?;

        if callback.status() == FrameStatus::Finished {
            let refund_unused = self.config.gas_refund == GasRefundPolicy::RefundUnused;
            if let Some(origin) = self.frames.current_mut() {
                origin.gas.refund(callback.gas.refunded());
                if refund_unused {
                    origin.gas.return_unused(callback.gas.remaining());
                }
            }
            Ok(())
        } else {
            self.store.revert_to(checkpoint);
            Err(callback.error().cloned().unwrap_or_else(|| {
                FrameError::new(ReturnCode::ExecutionFailed, "callback failed")
            }))
        }
    }
}
