//! Recursive destination-context fixtures.
//!
//! Every hop records its iteration, bumps two counters on its own account
//! and calls the next hop with the iteration decremented. The hop reaching
//! iteration 0 stores the big integer counter instead.

use bytes::Bytes;

use crosscall_types::Address;
use crosscall_vm::call_data::{decode_i64, encode_i64};
use crosscall_vm::{BigIntHandle, HostContext, HostResult, NativeContract};

use crate::{amount, CHILD_SC, PARENT_SC};

pub const BIG_INT_COUNTER_KEY: &[u8] = b"recursiveIterationBigCounter....";
pub const BIG_INT_COUNTER_ID: BigIntHandle = BigIntHandle(88);
pub const SMALL_COUNTER_KEY: &[u8] = b"recursiveIterationCounter.......";
pub const EXECUTE_VALUE: u8 = 5;

/// Gas each hop keeps for itself when handing the rest to the next hop.
pub const GAS_RESERVE: u64 = 1_000;

pub fn parent() -> NativeContract {
    NativeContract::new("exec-dest-ctx-recursive-parent")
        .with_function("parentCallsChild", parent_calls_child)
}

pub fn child() -> NativeContract {
    NativeContract::new("exec-dest-ctx-recursive-child")
        .with_function("childCallsParent", child_calls_parent)
}

/// A contract calling itself.
pub fn self_recursive() -> NativeContract {
    NativeContract::new("exec-dest-ctx-recursive-self")
        .with_function("recursiveMethodCall", recursive_method_call)
}

fn parent_calls_child(host: &mut HostContext<'_>) -> HostResult<()> {
    recursive_hop(host, b'P', &CHILD_SC, "childCallsParent")
}

fn child_calls_parent(host: &mut HostContext<'_>) -> HostResult<()> {
    recursive_hop(host, b'C', &PARENT_SC, "parentCallsChild")
}

fn recursive_method_call(host: &mut HostContext<'_>) -> HostResult<()> {
    let own = host.get_sc_address()?;
    recursive_hop(host, b'S', &own, "recursiveMethodCall")
}

/// Storage key recording that `prefix` ran `iteration`.
pub fn iteration_key(prefix: u8, iteration: i64) -> Vec<u8> {
    format!("{}-iteration-{}", prefix as char, iteration).into_bytes()
}

pub fn iteration_value(iteration: i64) -> Vec<u8> {
    format!("Rec iteration {}", iteration).into_bytes()
}

pub fn iteration_finish(prefix: u8, iteration: i64) -> Vec<u8> {
    format!("{}: iteration {}", prefix as char, iteration).into_bytes()
}

fn recursive_hop(
    host: &mut HostContext<'_>,
    prefix: u8,
    next: &Address,
    next_function: &str,
) -> HostResult<()> {
    if host.get_num_arguments()? != 1 {
        return host.signal_error(b"wrong number of arguments");
    }
    let iteration = host.int64_get_argument(0)?;

    host.storage_store(&iteration_key(prefix, iteration), &iteration_value(iteration))?;
    host.finish(&iteration_finish(prefix, iteration))?;

    increment_iter_counter(host, SMALL_COUNTER_KEY)?;
    increment_big_int_counter(host, BIG_INT_COUNTER_ID)?;

    if iteration > 0 {
        let gas = host.get_gas_left()?.saturating_sub(GAS_RESERVE);
        let result = host.execute_on_dest_context(
            gas,
            next,
            amount(EXECUTE_VALUE),
            next_function,
            vec![Bytes::from(encode_i64(iteration - 1))],
        )?;
        host.finish_result(result)
    } else {
        host.big_int_storage_store_unsigned(BIG_INT_COUNTER_KEY, BIG_INT_COUNTER_ID)?;
        Ok(())
    }
}

fn increment_iter_counter(host: &mut HostContext<'_>, key: &[u8]) -> HostResult<()> {
    let current = decode_i64(&host.storage_load(key)?).unwrap_or(0);
    host.storage_store(key, &encode_i64(current + 1))?;
    Ok(())
}

fn increment_big_int_counter(host: &mut HostContext<'_>, handle: BigIntHandle) -> HostResult<()> {
    let current = host.big_int_get_int64(handle)?;
    host.big_int_set_int64(handle, current + 1)
}
