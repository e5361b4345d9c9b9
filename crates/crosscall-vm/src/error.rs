use std::fmt;

use crosscall_types::{Address, TypesError, U256};
use thiserror::Error;

/// Errors that can occur while hosting contract execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Invalid address: {0:?}")]
    InvalidAddress(Address),

    #[error("Contract not found: {0:?}")]
    ContractNotFound(Address),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Argument index out of range: {0}")]
    ArgumentIndexOutOfRange(usize),

    #[error("Argument does not fit in int64")]
    ArgumentOutOfRange,

    #[error("Big integer under handle {0} does not fit in int64")]
    BigIntOutOfRange(i32),

    #[error("Storage key uses the reserved prefix")]
    ReservedStorageKey,

    #[error("State write in a read-only call")]
    ReadOnlyWrite,

    #[error("Invalid call data: {0}")]
    InvalidCallData(String),

    #[error("Gas limit {requested} exceeds maximum {max}")]
    GasLimitTooHigh { requested: u64, max: u64 },

    #[error("No frame is executing")]
    NoActiveFrame,

    #[error("Frame {0} is still running")]
    FrameNotTerminal(u64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Types error: {0}")]
    Types(#[from] TypesError),
}

impl VmError {
    /// Status code reported to contract code and in the final output.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            VmError::OutOfGas { .. } => ReturnCode::OutOfGas,
            VmError::InsufficientBalance { .. } => ReturnCode::InsufficientBalance,
            VmError::InvalidAddress(_) => ReturnCode::InvalidAddress,
            VmError::ContractNotFound(_) => ReturnCode::ContractNotFound,
            VmError::FunctionNotFound(_) => ReturnCode::FunctionNotFound,
            _ => ReturnCode::ExecutionFailed,
        }
    }
}

/// Outcome codes of a call, as seen by the calling contract and in
/// [`crate::VmOutput`]. `Ok` is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    FunctionNotFound = 1,
    ContractNotFound = 3,
    UserError = 4,
    OutOfGas = 5,
    InsufficientBalance = 7,
    InvalidAddress = 9,
    ExecutionFailed = 10,
}

impl ReturnCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ReturnCode::Ok
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnCode::Ok => "ok",
            ReturnCode::FunctionNotFound => "function not found",
            ReturnCode::ContractNotFound => "contract not found",
            ReturnCode::UserError => "user error",
            ReturnCode::OutOfGas => "out of gas",
            ReturnCode::InsufficientBalance => "insufficient balance",
            ReturnCode::InvalidAddress => "invalid address",
            ReturnCode::ExecutionFailed => "execution failed",
        };
        f.write_str(name)
    }
}

/// Signal from the host that the running contract must stop.
///
/// Every host function returns [`HostResult`], so contract code unwinds
/// with `?` the moment its frame stops being runnable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    #[error("out of gas")]
    OutOfGas,

    #[error("error signalled by contract")]
    SignalError,

    #[error("suspended on async call")]
    AsyncCall,

    #[error("execution failed")]
    ExecutionFailed,
}

impl Breakpoint {
    /// Code of a frame that stopped on this breakpoint without the host
    /// recording an error first.
    pub fn return_code(self) -> ReturnCode {
        match self {
            Breakpoint::OutOfGas => ReturnCode::OutOfGas,
            Breakpoint::SignalError => ReturnCode::UserError,
            Breakpoint::AsyncCall | Breakpoint::ExecutionFailed => ReturnCode::ExecutionFailed,
        }
    }
}

impl From<&VmError> for Breakpoint {
    fn from(err: &VmError) -> Self {
        match err {
            VmError::OutOfGas { .. } => Breakpoint::OutOfGas,
            _ => Breakpoint::ExecutionFailed,
        }
    }
}

/// Result type of every host function.
pub type HostResult<T> = Result<T, Breakpoint>;
