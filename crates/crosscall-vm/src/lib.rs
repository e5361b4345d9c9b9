//! Crosscall VM - cross-contract invocation and async callbacks.
//!
//! This crate provides:
//! - Per-account storage, big integer registry and balances with an undo journal
//! - Gas metering with per-frame budgets
//! - A heap-allocated call frame stack with isolation modes
//! - Same-context, destination-context and async call dispatch
//! - The host function API seen by contract code

pub mod account_store;
pub mod async_call;
pub mod call_data;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod gas_metering;
pub mod host;
pub mod output;

pub use account_store::{AccountStore, BigIntHandle, OutputTransfer, StorageStatus};
pub use async_call::{AsyncCallRecord, AsyncCallState, AsyncOutcome};
pub use config::VmConfig;
pub use contract::{
    Contract, ContractRegistry, NativeContract, CALLBACK_FUNCTION_NAME, INIT_FUNCTION_NAME,
};
pub use dispatcher::{CallInput, VmHost};
pub use error::{Breakpoint, HostResult, ReturnCode, VmError};
pub use frame::{FrameId, FrameStatus, IsolationMode, StorageView};
pub use gas_metering::{GasRefundPolicy, GasSchedule, GasTracker};
pub use host::{reverse_u32, HostContext};
pub use output::{FrameError, OutputSegment, VmOutput};

/// VM version constant
pub const VM_VERSION: u32 = 1;

/// Default cap on the gas limit of a top-level call
pub const DEFAULT_MAX_GAS_LIMIT: u64 = 30_000_000;
