//! Async call fixtures.
//!
//! The parent pays a third party, then asks the child to do the same
//! asynchronously. Its callback pays the vault itself whenever the child's
//! output does not end with the vault confirmation.

use crosscall_vm::{HostContext, HostResult, NativeContract, CALLBACK_FUNCTION_NAME};

use crosscall_types::Address;

use crate::{amount, padded_address, CHILD_SC};

pub const PARENT_KEY_A: &[u8] = b"parentKeyA......................";
pub const PARENT_DATA_A: &[u8] = b"parentDataA";
pub const PARENT_KEY_B: &[u8] = b"parentKeyB......................";
pub const PARENT_DATA_B: &[u8] = b"parentDataB";
pub const PARENT_FINISH_A: &[u8] = b"parentFinishA";
pub const PARENT_FINISH_B: &[u8] = b"parentFinishB";

pub const VAULT: Address = padded_address(b"vaultAddress");
pub const THIRD_PARTY: Address = padded_address(b"thirdPartyAddress");

pub const PARENT_TRANSFER_VALUE: u8 = 3;
pub const PARENT_TRANSFER_DATA: &[u8] = b"hello";
pub const ASYNC_CALL_VALUE: u8 = 7;
pub const VAULT_TRANSFER_VALUE: u8 = 4;

/// Call data template; the last byte is replaced by the behavior digit.
pub const ASYNC_CALL_DATA: &[u8] = b"transferToThirdParty@03@207468657265@00";

/// Child behaviors selected through the parent's first argument.
pub mod behavior {
    pub const SUCCEED: i64 = 0;
    pub const CHILD_SIGNALS_ERROR: i64 = 1;
    pub const CHILD_LOOPS: i64 = 2;
    pub const CALLBACK_SIGNALS_ERROR: i64 = 3;
    pub const CALLBACK_LOOPS: i64 = 4;
}

pub fn parent() -> NativeContract {
    NativeContract::new("async-call-parent")
        .with_function("parentPerformAsyncCall", parent_perform_async_call)
        .with_function(CALLBACK_FUNCTION_NAME, call_back)
}

pub fn child() -> NativeContract {
    NativeContract::new("async-call-child")
        .with_function("transferToThirdParty", transfer_to_third_party)
}

fn parent_perform_async_call(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(PARENT_KEY_A, PARENT_DATA_A)?;
    host.storage_store(PARENT_KEY_B, PARENT_DATA_B)?;
    host.finish(PARENT_FINISH_A)?;
    host.finish(PARENT_FINISH_B)?;

    host.transfer_value(&THIRD_PARTY, amount(PARENT_TRANSFER_VALUE), PARENT_TRANSFER_DATA)?;

    let chosen = host.int64_get_argument(0)?;
    let mut call_data = ASYNC_CALL_DATA.to_vec();
    let last = call_data.len() - 1;
    call_data[last] = b'0'.wrapping_add(chosen as u8);

    host.async_call(&CHILD_SC, amount(ASYNC_CALL_VALUE), &call_data)
}

fn call_back(host: &mut HostContext<'_>) -> HostResult<()> {
    let num_args = host.get_num_arguments()?;
    if num_args < 2 {
        return host.signal_error(b"wrong num of arguments");
    }

    let loaded = host.storage_load(PARENT_KEY_B)?;
    let status = if loaded == PARENT_DATA_B { 0 } else { 1 };

    handle_behavior_argument(host, num_args)?;
    handle_transfer_to_vault(host, num_args)?;

    host.finish_result(status)
}

fn handle_behavior_argument(host: &mut HostContext<'_>, num_args: usize) -> HostResult<()> {
    if num_args < 4 {
        return Ok(());
    }
    let chosen = host.int64_get_argument(1)?;
    match chosen {
        behavior::CALLBACK_SIGNALS_ERROR => host.signal_error(b"callBack error"),
        behavior::CALLBACK_LOOPS => loop {
            host.finish(b"loop")?;
        },
        other => host.finish(&[other as u8]),
    }
}

fn handle_transfer_to_vault(host: &mut HostContext<'_>, num_args: usize) -> HostResult<()> {
    if must_transfer_to_vault(host, num_args)? {
        host.transfer_value(&VAULT, amount(VAULT_TRANSFER_VALUE), &[])?;
    }
    Ok(())
}

/// The child confirms its own vault payment as the last chunk.
fn must_transfer_to_vault(host: &mut HostContext<'_>, num_args: usize) -> HostResult<bool> {
    let confirmation = match num_args {
        3 => host.get_argument(2)?,
        4 => host.get_argument(3)?,
        _ => None,
    };
    Ok(!confirmation.is_some_and(|argument| argument.starts_with(b"vault")))
}

fn transfer_to_third_party(host: &mut HostContext<'_>) -> HostResult<()> {
    if host.get_num_arguments()? != 3 {
        return host.signal_error(b"wrong number of arguments");
    }
    let value = host.int64_get_argument(0)?;
    let data = host.get_argument(1)?.unwrap_or_default();
    let chosen = host.int64_get_argument(2)?;

    match chosen {
        behavior::CHILD_SIGNALS_ERROR => return host.signal_error(b"child error"),
        behavior::CHILD_LOOPS => loop {
            host.finish(b"loop")?;
        },
        behavior::CALLBACK_SIGNALS_ERROR | behavior::CALLBACK_LOOPS => {
            host.finish(&[chosen as u8])?
        }
        _ => {}
    }

    host.transfer_value(&THIRD_PARTY, amount(value as u8), &data)?;
    host.finish(b"thirdparty")?;
    host.transfer_value(&VAULT, amount(VAULT_TRANSFER_VALUE), &[])?;
    host.finish(b"vault")
}
