//! Same-context fixtures.

use bytes::Bytes;

use crosscall_vm::{HostContext, HostResult, NativeContract};

use crate::{amount, SECOND_SC};

/// Number of integers the child finishes after its greeting.
pub const DATA_LEN: usize = 10_000;
pub const CHILD_GAS: u64 = 200_000;
pub const EXECUTE_VALUE: u8 = 99;

pub const CHILD_KEY: &[u8] = b"childKey........................";
pub const CHILD_DATA: &[u8] = b"childData";

pub fn parent() -> NativeContract {
    NativeContract::new("exec-same-ctx-simple-parent")
        .with_function("parentFunctionChildCall", parent_function_child_call)
        .with_function("parentFunctionChildWrites", parent_function_child_writes)
}

pub fn child() -> NativeContract {
    NativeContract::new("exec-same-ctx-simple-child")
        .with_function("childFunction", child_function)
        .with_function("childWriteStorage", child_write_storage)
}

/// Call the child twice on the same context, finishing each status, then
/// finish `parent`.
fn parent_function_child_call(host: &mut HostContext<'_>) -> HostResult<()> {
    for _ in 0..2 {
        let result = host.execute_on_same_context(
            CHILD_GAS,
            &SECOND_SC,
            amount(EXECUTE_VALUE),
            "childFunction",
            Vec::new(),
        )?;
        host.int64_finish(result as i64)?;
    }
    host.finish(b"parent")
}

/// Let the child write a key, then read it back from our own storage.
fn parent_function_child_writes(host: &mut HostContext<'_>) -> HostResult<()> {
    let result = host.execute_on_same_context(
        CHILD_GAS,
        &SECOND_SC,
        amount(0),
        "childWriteStorage",
        vec![Bytes::from_static(CHILD_DATA)],
    )?;
    host.finish_result(result)?;
    let loaded = host.storage_load(CHILD_KEY)?;
    host.finish(&loaded)
}

fn child_function(host: &mut HostContext<'_>) -> HostResult<()> {
    host.finish(b"child")?;
    for i in 0..DATA_LEN {
        host.int64_finish((i % 256) as i64)?;
    }
    Ok(())
}

fn child_write_storage(host: &mut HostContext<'_>) -> HostResult<()> {
    let Some(data) = host.get_argument(0)? else {
        return host.signal_error(b"wrong number of arguments");
    };
    host.storage_store(CHILD_KEY, &data)?;
    host.finish(b"child wrote")
}
