//! Contract fixtures.
//!
//! Small native contracts that drive every call primitive of the host:
//! - `init-correct`: constructor that succeeds, signals an error or loops
//! - `exec-same-ctx-*`: same-context calls sharing storage and output
//! - `exec-dest-ctx-*`: destination-context calls with isolated state
//! - `exec-dest-ctx-recursive-*`: gas-bounded recursive call chains
//! - `async-call-*`: async call with a callback and a compensating transfer

pub mod async_call;
pub mod exec_dest_ctx;
pub mod exec_dest_ctx_recursive;
pub mod exec_same_ctx;
pub mod init_correct;

use crosscall_types::{Address, U256};
use crosscall_vm::NativeContract;

/// Address made of `name` right-padded with `.` to 32 bytes.
pub const fn padded_address(name: &[u8]) -> Address {
    let mut bytes = [Address::NAME_PADDING; Address::LEN];
    let mut i = 0;
    while i < name.len() && i < Address::LEN {
        bytes[i] = name[i];
        i += 1;
    }
    Address::from_bytes(bytes)
}

/// Amount from a single low byte, as the fixtures spell out their values.
pub fn amount(value: u8) -> U256 {
    let mut bytes = [0u8; U256::BYTES];
    bytes[U256::BYTES - 1] = value;
    U256::from_be_bytes(bytes)
}

pub const PARENT_SC: Address = padded_address(b"parentSC");
pub const CHILD_SC: Address = padded_address(b"childSC");
pub const SECOND_SC: Address = padded_address(b"secondSC");
pub const WRONG_SC: Address = padded_address(b"wrongSC");
pub const USER: Address = padded_address(b"user");

/// Names accepted by [`fixture`].
pub const FIXTURE_NAMES: &[&str] = &[
    "init-correct",
    "exec-same-ctx-simple-parent",
    "exec-same-ctx-simple-child",
    "exec-dest-ctx-parent",
    "exec-dest-ctx-child",
    "exec-dest-ctx-recursive-parent",
    "exec-dest-ctx-recursive-child",
    "exec-dest-ctx-recursive-self",
    "async-call-parent",
    "async-call-child",
];

/// Build a fixture contract by name.
pub fn fixture(name: &str) -> Option<NativeContract> {
    let contract = match name {
        "init-correct" => init_correct::contract(),
        "exec-same-ctx-simple-parent" => exec_same_ctx::parent(),
        "exec-same-ctx-simple-child" => exec_same_ctx::child(),
        "exec-dest-ctx-parent" => exec_dest_ctx::parent(),
        "exec-dest-ctx-child" => exec_dest_ctx::child(),
        "exec-dest-ctx-recursive-parent" => exec_dest_ctx_recursive::parent(),
        "exec-dest-ctx-recursive-child" => exec_dest_ctx_recursive::child(),
        "exec-dest-ctx-recursive-self" => exec_dest_ctx_recursive::self_recursive(),
        "async-call-parent" => async_call::parent(),
        "async-call-child" => async_call::child(),
        _ => return None,
    };
    Some(contract)
}
