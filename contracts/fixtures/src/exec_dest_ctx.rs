//! Destination-context fixtures.

use bytes::Bytes;

use crosscall_types::Address;
use crosscall_vm::call_data::split_arguments;
use crosscall_vm::{reverse_u32, BigIntHandle, Breakpoint, HostContext, HostResult, NativeContract};

use crate::{amount, padded_address, CHILD_SC, WRONG_SC};

pub const PARENT_KEY_A: &[u8] = b"parentKeyA......................";
pub const PARENT_DATA_A: &[u8] = b"parentDataA";
pub const PARENT_KEY_B: &[u8] = b"parentKeyB......................";
pub const PARENT_DATA_B: &[u8] = b"parentDataB";
pub const PARENT_FINISH_A: &[u8] = b"parentFinishA";
pub const PARENT_FINISH_B: &[u8] = b"parentFinishB";

pub const CHILD_KEY: &[u8] = b"childKey........................";
pub const CHILD_DATA: &[u8] = b"childData";
pub const CHILD_FINISH: &[u8] = b"childFinish";

pub const PARENT_TRANSFER_RECEIVER: Address = padded_address(b"parentTransferReceiver");
pub const PARENT_TRANSFER_VALUE: u8 = 42;
pub const PARENT_TRANSFER_DATA: &[u8] = b"parentTransferData";

pub const EXECUTE_VALUE: u8 = 99;
pub const EXECUTE_ARGUMENT_LENGTHS: [usize; 3] = [15, 16, 10];
pub const EXECUTE_ARGUMENT_DATA: &[u8] = b"First sentence.Second sentence.Some text.";

pub const CHILD_GAS: u64 = 200_000;
pub const WRONG_CALL_GAS: u64 = 10_000;
pub const OUT_OF_GAS_CHILD_GAS: u64 = 3_500;

/// Handle the parent sets before the out-of-gas call.
pub const PARENT_BIG_INT: BigIntHandle = BigIntHandle(12);

/// Handle the parent probes after the child created its big integers.
pub const PROBED_BIG_INT: BigIntHandle = BigIntHandle(4);

pub fn parent() -> NativeContract {
    NativeContract::new("exec-dest-ctx-parent")
        .with_function("parentFunctionPrepare", parent_function_prepare)
        .with_function("parentFunctionWrongCall", parent_function_wrong_call)
        .with_function("parentFunctionChildCall", parent_function_child_call)
        .with_function("parentFunctionChildCall_BigInts", parent_function_child_call_big_ints)
        .with_function("parentFunctionChildCall_OutOfGas", parent_function_child_call_out_of_gas)
}

pub fn child() -> NativeContract {
    NativeContract::new("exec-dest-ctx-child")
        .with_function("childFunction", child_function)
        .with_function("childFunction_BigInts", child_function_big_ints)
        .with_function("childFunction_OutOfGas", child_function_out_of_gas)
}

fn execute_arguments() -> HostResult<Vec<Bytes>> {
    split_arguments(&EXECUTE_ARGUMENT_LENGTHS, EXECUTE_ARGUMENT_DATA)
        .map_err(|_| Breakpoint::ExecutionFailed)
}

fn parent_function_prepare(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(PARENT_KEY_A, PARENT_DATA_A)?;
    host.storage_store(PARENT_KEY_B, PARENT_DATA_B)?;
    host.finish(PARENT_FINISH_A)?;
    host.finish(PARENT_FINISH_B)?;
    let result = host.transfer_value(
        &PARENT_TRANSFER_RECEIVER,
        amount(PARENT_TRANSFER_VALUE),
        PARENT_TRANSFER_DATA,
    )?;
    host.finish_result(result)
}

fn parent_function_wrong_call(host: &mut HostContext<'_>) -> HostResult<()> {
    parent_function_prepare(host)?;
    let result = host.execute_on_dest_context(
        WRONG_CALL_GAS,
        &WRONG_SC,
        amount(EXECUTE_VALUE),
        "childFunction",
        execute_arguments()?,
    )?;
    host.finish_result(result)
}

fn parent_function_child_call(host: &mut HostContext<'_>) -> HostResult<()> {
    parent_function_prepare(host)?;
    let result = host.execute_on_dest_context(
        CHILD_GAS,
        &CHILD_SC,
        amount(EXECUTE_VALUE),
        "childFunction",
        execute_arguments()?,
    )?;
    host.finish_result(result)?;

    // The parent cannot see the child's storage
    let len = host.storage_load_length(CHILD_KEY)?;
    host.finish_result(if len == 0 { 0 } else { 1 })
}

fn parent_function_child_call_big_ints(host: &mut HostContext<'_>) -> HostResult<()> {
    let int_a = host.big_int_new(84)?;
    let int_b = host.big_int_new(96)?;
    let int_c = host.big_int_new(1024)?;

    // Handles travel as big-endian 32-bit integers
    let arguments = [int_a, int_b, int_c]
        .iter()
        .map(|handle| Bytes::copy_from_slice(&reverse_u32(*handle).0.to_le_bytes()))
        .collect();

    let result = host.execute_on_dest_context(
        CHILD_GAS,
        &CHILD_SC,
        amount(EXECUTE_VALUE),
        "childFunction_BigInts",
        arguments,
    )?;
    host.finish_result(result)?;

    // The parent cannot see the big integers created by the child
    let x = host.big_int_get_int64(PROBED_BIG_INT)?;
    if x != 0 {
        host.int64_finish(x)?;
        return host.finish_result(1);
    }
    host.finish_result(0)
}

fn parent_function_child_call_out_of_gas(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(PARENT_KEY_A, PARENT_DATA_A)?;
    host.big_int_set_int64(PARENT_BIG_INT, 42)?;
    host.finish(PARENT_FINISH_A)?;

    let result = host.execute_on_dest_context(
        OUT_OF_GAS_CHILD_GAS,
        &CHILD_SC,
        amount(EXECUTE_VALUE),
        "childFunction_OutOfGas",
        Vec::new(),
    )?;

    host.storage_store(PARENT_KEY_B, PARENT_DATA_B)?;
    host.finish_result(result)
}

fn child_function(host: &mut HostContext<'_>) -> HostResult<()> {
    if host.get_num_arguments()? != 3 {
        return host.signal_error(b"wrong number of arguments");
    }
    for index in 0..3 {
        if let Some(argument) = host.get_argument(index)? {
            host.finish(&argument)?;
        }
    }
    host.storage_store(CHILD_KEY, CHILD_DATA)?;
    host.finish(CHILD_FINISH)
}

/// Builds big integers from the parent's handle numbers plus two of its
/// own, filling handles 0 to 4 of the child's registry.
fn child_function_big_ints(host: &mut HostContext<'_>) -> HostResult<()> {
    if host.get_num_arguments()? != 3 {
        return host.signal_error(b"wrong number of arguments");
    }
    let mut sum = 0;
    for index in 0..3 {
        let value = host.int64_get_argument(index)?;
        host.big_int_new(value)?;
        sum += value;
    }
    host.big_int_new(sum)?;
    host.big_int_new(-sum)?;
    host.int64_finish(sum)?;
    host.finish(CHILD_FINISH)
}

fn child_function_out_of_gas(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(CHILD_KEY, CHILD_DATA)?;
    loop {
        host.finish(CHILD_FINISH)?;
    }
}
