//! Call frame stack.
//!
//! Frames live in a heap-allocated `Vec` with explicit parent ids, so the
//! nesting depth is limited by gas alone. Each frame binds its storage view
//! once, when it is pushed.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crosscall_types::{Address, U256};

use crate::account_store::Checkpoint;
use crate::async_call::AsyncCallRecord;
use crate::error::{Breakpoint, ReturnCode, VmError};
use crate::gas_metering::GasTracker;
use crate::output::{FrameError, OutputSegment};

/// Identifier of a frame, unique within one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a frame relates to its caller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationMode {
    /// The top-level call.
    Root,
    /// Runs on the caller's account and writes into its output.
    SameContext,
    /// Runs on the callee's own account with its own output.
    DestContext,
    /// Resumption of a caller suspended on an async call.
    Callback,
}

impl IsolationMode {
    /// Whether the frame's output is appended to its parent's on success.
    pub fn inlines_output(self) -> bool {
        matches!(self, IsolationMode::SameContext | IsolationMode::Callback)
    }

    /// Whether a successful frame commits its own effects.
    pub fn commits_on_success(self) -> bool {
        matches!(self, IsolationMode::Root | IsolationMode::DestContext)
    }
}

/// The account a frame reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageView {
    OwnAccount(Address),
    AliasOf(Address),
}

impl StorageView {
    pub fn address(&self) -> Address {
        match self {
            StorageView::OwnAccount(address) | StorageView::AliasOf(address) => *address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Running,
    AwaitingCallback,
    Finished,
    Errored,
}

impl FrameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FrameStatus::Finished | FrameStatus::Errored)
    }
}

/// Parameters of a frame about to be pushed.
#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub caller: Address,
    pub callee: Address,
    pub function: String,
    pub mode: IsolationMode,
    pub gas: GasTracker,
    pub value: U256,
    pub arguments: Vec<Bytes>,
    /// Forbid state writes in this frame and everything it calls.
    pub read_only: bool,
}

/// One nested execution.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    pub caller: Address,
    pub callee: Address,
    pub function: String,
    pub mode: IsolationMode,
    pub view: StorageView,
    pub gas: GasTracker,
    pub value: U256,
    pub arguments: Vec<Bytes>,
    pub output: OutputSegment,
    /// Chunks of the last dest-context child this frame called.
    pub return_data: Vec<Bytes>,
    pub read_only: bool,
    status: FrameStatus,
    pub(crate) pending_async: Option<AsyncCallRecord>,
    pub(crate) checkpoint: Checkpoint,
}

impl CallFrame {
    pub fn status(&self) -> FrameStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == FrameStatus::Running
    }

    pub fn error(&self) -> Option<&FrameError> {
        self.output.error()
    }

    /// Suspend on an async call.
    pub(crate) fn suspend(&mut self, record: AsyncCallRecord) {
        if self.status == FrameStatus::Running {
            self.pending_async = Some(record);
            self.status = FrameStatus::AwaitingCallback;
        }
    }

    /// Mark the frame finished. Terminal frames are left alone.
    pub(crate) fn finish(&mut self) {
        if !self.status.is_terminal() {
            self.status = FrameStatus::Finished;
        }
    }

    /// Mark the frame errored. Terminal frames are left alone.
    pub(crate) fn fail(&mut self, error: FrameError) {
        if !self.status.is_terminal() {
            debug!(frame = %self.id, code = %error.code, message = %error.message, "Frame errored");
            self.output.set_error(error);
            self.status = FrameStatus::Errored;
        }
    }

    /// What a host call made from this frame must return, `None` while it
    /// may still run.
    pub fn breakpoint(&self) -> Option<Breakpoint> {
        match self.status {
            FrameStatus::Running => None,
            FrameStatus::AwaitingCallback => Some(Breakpoint::AsyncCall),
            FrameStatus::Finished => Some(Breakpoint::ExecutionFailed),
            FrameStatus::Errored => Some(match self.error().map(|e| e.code) {
                Some(ReturnCode::OutOfGas) => Breakpoint::OutOfGas,
                Some(ReturnCode::UserError) => Breakpoint::SignalError,
                _ => Breakpoint::ExecutionFailed,
            }),
        }
    }

    /// Status code reported to the caller of this frame.
    pub fn return_code(&self) -> ReturnCode {
        match self.status {
            FrameStatus::Errored => self
                .error()
                .map(|e| e.code)
                .unwrap_or(ReturnCode::ExecutionFailed),
            _ => ReturnCode::Ok,
        }
    }
}

/// Stack of nested frames.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<CallFrame>,
    next_id: u64,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut CallFrame> {
        self.frames.last_mut()
    }

    pub fn get(&self, id: FrameId) -> Option<&CallFrame> {
        self.frames.iter().find(|frame| frame.id == id)
    }

    /// Frame ids from the root to the current frame.
    pub fn path(&self) -> Vec<FrameId> {
        self.frames.iter().map(|frame| frame.id).collect()
    }

    /// Drop all frames and restart ids for a new transaction.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.next_id = 0;
    }

    /// Push a frame on top of the current one, resolving its view.
    ///
    /// A Root frame may only be pushed on an empty stack; every other mode
    /// needs a non-terminal parent.
    pub fn push(&mut self, spec: FrameSpec, checkpoint: Checkpoint) -> Result<FrameId, VmError> {
        let inherited_read_only = self.frames.last().is_some_and(|parent| parent.read_only);
        let (parent, view) = match (spec.mode, self.frames.last()) {
            (IsolationMode::Root, None) => (None, StorageView::OwnAccount(spec.callee)),
            (IsolationMode::Root, Some(_)) | (_, None) => return Err(VmError::NoActiveFrame),
            (_, Some(parent)) if parent.status.is_terminal() => {
                return Err(VmError::NoActiveFrame)
            }
            (IsolationMode::DestContext, Some(parent)) => {
                (Some(parent.id), StorageView::OwnAccount(spec.callee))
            }
            (IsolationMode::SameContext, Some(parent)) => {
                (Some(parent.id), StorageView::AliasOf(parent.view.address()))
            }
            (IsolationMode::Callback, Some(parent)) => (Some(parent.id), parent.view),
        };

        let id = FrameId(self.next_id);
        self.next_id += 1;
        debug!(
            frame = %id,
            parent = ?parent.map(|p| p.0),
            mode = ?spec.mode,
            callee = %spec.callee.short(),
            function = %spec.function,
            gas = spec.gas.limit(),
            depth = self.frames.len(),
            "Push frame"
        );

        self.frames.push(CallFrame {
            id,
            parent,
            caller: spec.caller,
            callee: spec.callee,
            function: spec.function,
            mode: spec.mode,
            view,
            gas: spec.gas,
            value: spec.value,
            arguments: spec.arguments,
            output: OutputSegment::new(),
            return_data: Vec::new(),
            read_only: spec.read_only || inherited_read_only,
            status: FrameStatus::Running,
            pending_async: None,
            checkpoint,
        });
        Ok(id)
    }

    /// Pop the terminal top frame, appending its chunks to the parent when
    /// it finished in an inlining mode.
    pub fn pop(&mut self) -> Result<CallFrame, VmError> {
        let top = self.frames.last().ok_or(VmError::NoActiveFrame)?;
        if !top.status.is_terminal() {
            return Err(VmError::FrameNotTerminal(top.id.0));
        }
        let frame = self.frames.pop().ok_or(VmError::NoActiveFrame)?;

        if frame.status == FrameStatus::Finished && frame.mode.inlines_output() {
            if let Some(parent) = self.frames.last_mut() {
                parent.output.append(frame.output.chunks());
            }
        }
        debug!(
            frame = %frame.id,
            status = ?frame.status,
            gas_used = frame.gas.used(),
            depth = self.frames.len(),
            "Pop frame"
        );
        Ok(frame)
    }
}
