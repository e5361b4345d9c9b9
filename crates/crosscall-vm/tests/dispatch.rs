//! Dispatch tests with small inline contracts.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use crosscall_types::{Address, U256};
use crosscall_vm::call_data::{decode_i64, encode_i64};
use crosscall_vm::{
    AsyncCallState, AsyncOutcome, BigIntHandle, CallInput, GasRefundPolicy, HostContext,
    HostResult, NativeContract, ReturnCode, VmConfig, VmError, VmHost, CALLBACK_FUNCTION_NAME,
    DEFAULT_MAX_GAS_LIMIT,
};

fn addr(name: &str) -> Address {
    Address::from_padded_name(name).unwrap()
}

fn caller() -> Address {
    addr("user")
}

fn root() -> Address {
    addr("rootSC")
}

fn other() -> Address {
    addr("otherSC")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn host_with(contracts: Vec<(Address, NativeContract)>) -> VmHost {
    init_tracing();
    let mut host = VmHost::default();
    for (address, contract) in contracts {
        host.install_contract(address, contract.into_arc()).unwrap();
    }
    host
}

fn call(host: &mut VmHost, function: &str) -> crosscall_vm::VmOutput {
    host.run_call(CallInput::new(caller(), root(), function, 1_000_000))
        .unwrap()
}

// Other contract entry points

fn write_and_fail(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(b"shared", b"written")?;
    host.finish(b"never seen")?;
    host.signal_error(b"child refused")
}

fn write_and_finish(host: &mut HostContext<'_>) -> HostResult<()> {
    host.storage_store(b"shared", b"written")?;
    let handle = host.big_int_new(7)?;
    host.big_int_storage_store_unsigned(b"counter", handle)?;
    host.finish(b"child done")
}

fn spin(host: &mut HostContext<'_>) -> HostResult<()> {
    loop {
        host.use_gas(1)?;
    }
}

fn report_context(host: &mut HostContext<'_>) -> HostResult<()> {
    let caller = host.get_caller()?;
    host.finish(caller.as_bytes())?;
    let value = host.get_call_value()?;
    host.finish(&value.to_be_bytes_trimmed())?;
    let function = host.get_function()?;
    host.finish(function.as_bytes())
}

fn write_through_same_context(host: &mut HostContext<'_>) -> HostResult<()> {
    let result =
        host.execute_on_same_context(20_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
    host.int64_finish(result as i64)
}

fn other_contract() -> NativeContract {
    NativeContract::new("other")
        .with_function("writeAndFail", write_and_fail)
        .with_function("writeAndFinish", write_and_finish)
        .with_function("writeThroughSameContext", write_through_same_context)
        .with_function("spin", spin)
        .with_function("reportContext", report_context)
}

#[test]
fn test_failed_same_context_child_rolls_back() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let result =
            host.execute_on_same_context(50_000, &other(), U256::ZERO, "writeAndFail", Vec::new())?;
        host.int64_finish(result as i64)?;
        let shared = host.storage_load(b"shared")?;
        host.finish(&shared)
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    assert_eq!(
        output.return_data,
        vec![
            Bytes::from(encode_i64(ReturnCode::UserError.as_i32() as i64)),
            Bytes::new(),
        ]
    );
    assert!(host.storage(&root(), b"shared").is_empty());
    assert!(host.storage(&other(), b"shared").is_empty());
}

#[test]
fn test_same_context_child_writes_callers_account() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let result =
            host.execute_on_same_context(50_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
        host.finish_result(result)
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert_eq!(output.return_data_strings(), vec!["child done", "succ"]);
    assert_eq!(host.storage(&root(), b"shared"), b"written");
    assert_eq!(host.storage(&root(), b"counter"), &[7]);
    assert!(host.store().account(&other()).map_or(true, |a| a.storage().is_empty()));
}

#[test]
fn test_root_failure_keeps_committed_dest_context_effects() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.storage_store(b"mine", b"pending")?;
        let result =
            host.execute_on_dest_context(50_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
        host.finish_result(result)?;
        host.signal_error(b"root gives up")
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert_eq!(output.return_code, ReturnCode::UserError);
    assert_eq!(output.return_message, "root gives up");
    assert!(output.return_data.is_empty());
    assert!(host.storage(&root(), b"mine").is_empty());
    assert_eq!(host.storage(&other(), b"shared"), b"written");
    assert_eq!(host.bigint(&other(), BigIntHandle(0)).map(|v| v.to_string()), Some("7".to_string()));
}

#[test]
fn test_dest_context_child_out_of_gas_leaves_caller_running() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let result = host.execute_on_dest_context(2_000, &other(), U256::ZERO, "spin", Vec::new())?;
        host.int64_finish(result as i64)?;
        host.storage_store(b"after", b"stored")?;
        Ok(())
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    assert_eq!(decode_i64(&output.return_data[0]), Some(ReturnCode::OutOfGas.as_i32() as i64));
    assert_eq!(host.storage(&root(), b"after"), b"stored");
}

#[test]
fn test_sub_call_preconditions_return_codes() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let gas_left = host.get_gas_left()?;
        let codes = [
            host.execute_on_dest_context(gas_left * 2, &other(), U256::ZERO, "spin", Vec::new())?,
            host.execute_on_dest_context(1_000, &Address::ZERO, U256::ZERO, "spin", Vec::new())?,
            host.execute_on_dest_context(1_000, &addr("nobody"), U256::ZERO, "spin", Vec::new())?,
            host.execute_on_dest_context(1_000, &other(), U256::ZERO, "missing", Vec::new())?,
            host.execute_on_same_context(1_000, &other(), U256::from(5u64), "spin", Vec::new())?,
            host.transfer_value(&other(), U256::from(5u64), b"")?,
            host.transfer_value(&Address::ZERO, U256::ZERO, b"")?,
        ];
        for code in codes {
            host.int64_finish(code as i64)?;
        }
        Ok(())
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    let codes: Vec<i64> = output
        .return_data
        .iter()
        .map(|chunk| decode_i64(chunk).unwrap())
        .collect();
    let expected: Vec<i64> = [
        ReturnCode::OutOfGas,
        ReturnCode::InvalidAddress,
        ReturnCode::ContractNotFound,
        ReturnCode::FunctionNotFound,
        ReturnCode::InsufficientBalance,
        ReturnCode::InsufficientBalance,
        ReturnCode::InvalidAddress,
    ]
    .iter()
    .map(|code| code.as_i32() as i64)
    .collect();
    assert_eq!(codes, expected);
}

#[test]
fn test_call_context_of_dest_child() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let result = host.execute_on_dest_context(
            20_000,
            &other(),
            U256::from(3u64),
            "reportContext",
            Vec::new(),
        )?;
        host.finish_result(result)
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);
    host.set_balance(&root(), U256::from(10u64));

    let output = call(&mut host, "entry");
    assert_eq!(output.return_data_strings(), vec!["succ"]);
    assert_eq!(host.balance(&root()), U256::from(7u64));
    assert_eq!(host.balance(&other()), U256::from(3u64));
}

#[test]
fn test_reserved_storage_key_fails_frame() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.storage_store(b"ok", b"1")?;
        host.storage_store(b"CROSSCALLsecret", b"1")?;
        host.finish(b"unreachable")
    }
    let mut host = host_with(vec![(root(), NativeContract::new("root").with_function("entry", entry))]);

    let output = call(&mut host, "entry");
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert!(output.return_message.contains("reserved"));
    assert_eq!(output.gas_remaining, 0);
    assert!(host.storage(&root(), b"ok").is_empty());
}

#[test]
fn test_refund_policy_returns_unused_child_gas() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.execute_on_dest_context(100_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
        Ok(())
    }
    let contracts = || {
        vec![
            (root(), NativeContract::new("root").with_function("entry", entry)),
            (other(), other_contract()),
        ]
    };

    let mut kept = host_with(contracts());
    let without_refund = call(&mut kept, "entry");

    let config = VmConfig {
        gas_refund: GasRefundPolicy::RefundUnused,
        ..VmConfig::default()
    };
    let mut refunding = VmHost::new(config).unwrap();
    for (address, contract) in contracts() {
        refunding.install_contract(address, contract.into_arc()).unwrap();
    }
    let with_refund = call(&mut refunding, "entry");

    assert!(without_refund.gas_used > 100_000);
    assert!(with_refund.gas_used < 10_000);
    assert_eq!(
        with_refund.gas_used + with_refund.gas_remaining,
        without_refund.gas_used + without_refund.gas_remaining
    );
}

#[test]
fn test_storage_release_earns_refund() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.storage_store(b"key", b"")?;
        Ok(())
    }
    let mut host = host_with(vec![(root(), NativeContract::new("root").with_function("entry", entry))]);
    host.set_storage(&root(), b"key", b"0123456789");

    let output = call(&mut host, "entry");
    let schedule = host.config().gas_schedule;
    assert_eq!(output.gas_refund, 10 * schedule.release_per_byte);
    assert!(host.storage(&root(), b"key").is_empty());
}

#[test]
fn test_big_int_storage_round_trip() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let handle = host.big_int_new(0)?;
        host.big_int_set_int64(handle, 70_000)?;
        host.big_int_storage_store_unsigned(b"big", handle)?;
        let loaded = host.big_int_storage_load_unsigned(b"big")?;
        let value = host.big_int_get_int64(loaded)?;
        host.int64_finish(value)?;
        // Unknown handles read as zero
        let missing = host.big_int_get_int64(BigIntHandle(1_000))?;
        host.int64_finish(missing)
    }
    let mut host = host_with(vec![(root(), NativeContract::new("root").with_function("entry", entry))]);

    let output = call(&mut host, "entry");
    assert_eq!(decode_i64(&output.return_data[0]), Some(70_000));
    assert!(output.return_data[1].is_empty());
    assert_eq!(host.storage(&root(), b"big"), &[0x01, 0x11, 0x70]);
}

#[test]
fn test_async_call_without_callback_fails_caller() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.finish(b"before")?;
        host.async_call(&other(), U256::ZERO, b"writeAndFinish")
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert_eq!(output.return_code, ReturnCode::FunctionNotFound);
    assert!(output.return_data.is_empty());
    // The destination committed on its own
    assert_eq!(host.storage(&other(), b"shared"), b"written");
    assert_eq!(output.async_calls.len(), 1);
    assert_eq!(output.async_calls[0].state(), AsyncCallState::Resumed);
}

fn echo_callback(host: &mut HostContext<'_>) -> HostResult<()> {
    let count = host.get_num_arguments()?;
    for index in 0..count {
        if let Some(argument) = host.get_argument(index)? {
            host.finish(&argument)?;
        }
    }
    Ok(())
}

#[test]
fn test_async_call_malformed_call_data_still_calls_back() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.async_call(&other(), U256::ZERO, b"writeAndFinish@zz")
    }
    let mut host = host_with(vec![
        (
            root(),
            NativeContract::new("root")
                .with_function("entry", entry)
                .with_function(CALLBACK_FUNCTION_NAME, echo_callback),
        ),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    assert_eq!(
        decode_i64(&output.return_data[0]),
        Some(ReturnCode::ExecutionFailed.as_i32() as i64)
    );
    assert!(matches!(
        output.async_calls[0].outcome(),
        AsyncOutcome::Error { code: ReturnCode::ExecutionFailed, .. }
    ));
    assert_eq!(
        output.async_calls[0].callback_gas,
        output.async_calls[0].callback_gas_lock + output.async_calls[0].gas_allotted
    );
    assert!(host.storage(&other(), b"shared").is_empty());
}

#[test]
fn test_async_call_needs_gas_for_the_lock() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.async_call(&other(), U256::ZERO, b"writeAndFinish")
    }
    let mut host = host_with(vec![
        (
            root(),
            NativeContract::new("root")
                .with_function("entry", entry)
                .with_function(CALLBACK_FUNCTION_NAME, echo_callback),
        ),
        (other(), other_contract()),
    ]);

    let output = host
        .run_call(CallInput::new(caller(), root(), "entry", 3_000))
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::OutOfGas);
    assert!(output.async_calls.is_empty());
}

#[test]
fn test_host_calls_after_suspension_return_breakpoint() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        // Ignore the suspension and keep going
        let _ = host.async_call(&other(), U256::ZERO, b"writeAndFinish");
        let after = host.finish(b"after suspension");
        assert_eq!(after, Err(crosscall_vm::Breakpoint::AsyncCall));
        Ok(())
    }
    let mut host = host_with(vec![
        (
            root(),
            NativeContract::new("root")
                .with_function("entry", entry)
                .with_function(CALLBACK_FUNCTION_NAME, echo_callback),
        ),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    // Callback saw status 0 and the destination's chunk
    assert_eq!(output.return_data.len(), 2);
    assert!(output.return_data[0].is_empty());
    assert_eq!(output.return_data[1].as_ref(), b"child done");
}

#[test]
fn test_top_level_rejections() {
    let mut host = host_with(vec![(root(), other_contract())]);

    let err = host
        .run_call(CallInput::new(caller(), root(), "spin", u64::MAX))
        .unwrap_err();
    assert!(matches!(err, VmError::GasLimitTooHigh { .. }));

    let err = host
        .run_call(CallInput::new(caller(), Address::ZERO, "spin", 1_000))
        .unwrap_err();
    assert!(matches!(err, VmError::InvalidAddress(_)));

    let output = host
        .run_call(CallInput::new(caller(), other(), "spin", 1_000))
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::ContractNotFound);

    let output = host
        .run_call(CallInput::new(caller(), root(), "spin", 1_000).with_value(U256::ONE))
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::InsufficientBalance);

    let output = host
        .run_call(CallInput::new(caller(), root(), "spin", 1_000))
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::OutOfGas);
    assert_eq!(output.gas_used, 1_000);
}

#[test]
fn test_root_value_and_init_entry_point() {
    fn init(host: &mut HostContext<'_>) -> HostResult<()> {
        let value = host.get_call_value()?;
        let balance = host.get_external_balance(&root())?;
        host.finish(&value.to_be_bytes_trimmed())?;
        host.finish(&balance.to_be_bytes_trimmed())
    }
    let mut host = host_with(vec![(root(), NativeContract::new("root").with_function("init", init))]);
    host.set_balance(&caller(), U256::from(50u64));

    let output = host
        .run_init(CallInput::new(caller(), root(), "ignored", 10_000).with_value(U256::from(20u64)))
        .unwrap();
    assert_eq!(output.return_data, vec![Bytes::from_static(&[20]), Bytes::from_static(&[20])]);
    assert_eq!(host.balance(&caller()), U256::from(30u64));
}

#[test]
fn test_root_failure_keeps_committed_write_to_its_own_account() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        host.storage_store(b"k", b"root")?;
        host.big_int_set_int64(BigIntHandle(88), 1)?;
        let result = host.execute_on_dest_context(50_000, &root(), U256::ZERO, "inner", Vec::new())?;
        host.finish_result(result)?;
        host.signal_error(b"root gives up")
    }
    fn inner(host: &mut HostContext<'_>) -> HostResult<()> {
        host.storage_store(b"k", b"inner")?;
        host.storage_store(b"j", b"inner")?;
        host.big_int_set_int64(BigIntHandle(88), 2)?;
        host.finish(b"inner done")
    }
    let mut host = host_with(vec![(
        root(),
        NativeContract::new("root")
            .with_function("entry", entry)
            .with_function("inner", inner),
    )]);

    let output = call(&mut host, "entry");
    assert_eq!(output.return_code, ReturnCode::UserError);
    assert_eq!(host.storage(&root(), b"k"), b"inner");
    assert_eq!(host.storage(&root(), b"j"), b"inner");
    assert_eq!(host.bigint(&root(), BigIntHandle(88)).map(|v| v.to_string()), Some("2".to_string()));
}

/// Bumps the stored counter and big integer 88 of the account it runs on,
/// then descends `n` more levels, to itself or alternating with the
/// other contract.
fn descend(host: &mut HostContext<'_>) -> HostResult<()> {
    let n = host.int64_get_argument(0)?;
    let alternate = host.int64_get_argument(1)? != 0;

    let loaded = host.big_int_storage_load_unsigned(b"counter")?;
    let counter = host.big_int_get_int64(loaded)? + 1;
    host.big_int_set_int64(BigIntHandle(88), counter)?;
    host.big_int_storage_store_unsigned(b"counter", BigIntHandle(88))?;

    if n > 0 {
        let me = host.get_sc_address()?;
        let next = match (alternate, me == root()) {
            (false, _) => me,
            (true, true) => other(),
            (true, false) => root(),
        };
        let gas = host.get_gas_left()?.saturating_sub(5_000);
        let arguments = vec![Bytes::from(encode_i64(n - 1)), Bytes::from(encode_i64(alternate as i64))];
        let result = host.execute_on_dest_context(gas, &next, U256::ZERO, "descend", arguments)?;
        if result != ReturnCode::Ok.as_i32() {
            return host.signal_error(b"chain broken");
        }
    }
    Ok(())
}

fn recursive_host() -> VmHost {
    fn entry(host: &mut HostContext<'_>, first: Address, alternate: bool) -> HostResult<()> {
        host.storage_store(b"counter", &[1])?;
        host.big_int_set_int64(BigIntHandle(88), 1)?;
        let arguments = vec![Bytes::from(encode_i64(3)), Bytes::from(encode_i64(alternate as i64))];
        let result = host.execute_on_dest_context(500_000, &first, U256::ZERO, "descend", arguments)?;
        host.finish_result(result)?;
        host.signal_error(b"root gives up")
    }
    let contract = |name: &str| {
        NativeContract::new(name)
            .with_function("descend", descend)
            .with_function("entrySelf", |host: &mut HostContext<'_>| entry(host, root(), false))
            .with_function("entryAlternating", |host: &mut HostContext<'_>| {
                entry(host, other(), true)
            })
    };
    host_with(vec![(root(), contract("root")), (other(), contract("other"))])
}

fn counter_of(host: &VmHost, address: &Address) -> (Vec<u8>, Option<String>) {
    (
        host.storage(address, b"counter").to_vec(),
        host.bigint(address, BigIntHandle(88)).map(|v| v.to_string()),
    )
}

#[test]
fn test_root_failure_keeps_committed_self_recursion() {
    let mut host = recursive_host();

    let output = call(&mut host, "entrySelf");
    assert_eq!(output.return_code, ReturnCode::UserError);
    // Root wrote 1, then four committed levels on the same account
    assert_eq!(counter_of(&host, &root()), (vec![5], Some("5".to_string())));
}

#[test]
fn test_root_failure_keeps_committed_alternating_recursion() {
    let mut host = recursive_host();

    let output = call(&mut host, "entryAlternating");
    assert_eq!(output.return_code, ReturnCode::UserError);
    // Levels alternate other, root, other, root
    assert_eq!(counter_of(&host, &root()), (vec![3], Some("3".to_string())));
    assert_eq!(counter_of(&host, &other()), (vec![2], Some("2".to_string())));
}

static DIVE_DEPTH: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_recursion_depth_is_bounded_by_gas_only() {
    const RESERVE: u64 = 2_000;
    fn dive(host: &mut HostContext<'_>) -> HostResult<()> {
        DIVE_DEPTH.fetch_add(1, Ordering::Relaxed);
        let gas = host.get_gas_left()?.saturating_sub(RESERVE);
        let result = host.execute_on_dest_context(gas, &root(), U256::ZERO, "dive", Vec::new())?;
        host.int64_finish(result as i64)
    }
    let mut host = host_with(vec![(root(), NativeContract::new("root").with_function("dive", dive))]);

    let output = host
        .run_call(CallInput::new(caller(), root(), "dive", DEFAULT_MAX_GAS_LIMIT))
        .unwrap();
    assert!(output.is_success());
    assert_eq!(output.return_data, vec![Bytes::new()]);
    // Every level keeps its reserve, so the chain only ends when the
    // deepest frame runs out of gas.
    let depth = DIVE_DEPTH.load(Ordering::Relaxed);
    assert!(depth > 10_000, "depth {depth}");
    assert!(depth as u64 <= DEFAULT_MAX_GAS_LIMIT / RESERVE + 1);
}

#[test]
fn test_dest_context_return_data() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        assert_eq!(host.get_num_return_data()?, 0);

        let result =
            host.execute_on_dest_context(50_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
        host.finish_result(result)?;
        let count = host.get_num_return_data()?;
        host.int64_finish(count as i64)?;
        let size = host.get_return_data_size(0)?;
        host.int64_finish(size as i64)?;
        let chunk = host.get_return_data(0)?.unwrap_or_default();
        host.finish(&chunk)?;
        if host.get_return_data(1)?.is_some() || host.get_return_data_size(1)? != 0 {
            return host.signal_error(b"unexpected chunk");
        }

        // Same-context output goes to this frame instead
        host.execute_on_same_context(50_000, &other(), U256::ZERO, "writeAndFinish", Vec::new())?;
        let count = host.get_num_return_data()?;
        host.int64_finish(count as i64)?;

        host.execute_on_dest_context(50_000, &other(), U256::ZERO, "writeAndFail", Vec::new())?;
        let count = host.get_num_return_data()?;
        host.int64_finish(count as i64)
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    assert_eq!(
        output.return_data,
        vec![
            Bytes::from_static(b"succ"),
            Bytes::from(encode_i64(1)),
            Bytes::from(encode_i64(10)),
            Bytes::from_static(b"child done"),
            Bytes::from_static(b"child done"),
            Bytes::from(encode_i64(1)),
            Bytes::from(encode_i64(0)),
        ]
    );
}

#[test]
fn test_read_only_call_rejects_writes() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let denied = host.execute_read_only(50_000, &other(), "writeAndFinish", Vec::new())?;
        host.int64_finish(denied as i64)?;

        let nested = host.execute_read_only(50_000, &other(), "writeThroughSameContext", Vec::new())?;
        host.int64_finish(nested as i64)?;
        let inner = host.get_return_data(0)?.unwrap_or_default();
        host.finish(&inner)?;

        let allowed = host.execute_read_only(50_000, &other(), "reportContext", Vec::new())?;
        host.finish_result(allowed)?;

        // Writes of this frame are unaffected
        host.storage_store(b"after", b"stored")?;
        Ok(())
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);

    let output = call(&mut host, "entry");
    assert!(output.is_success());
    let failed = Bytes::from(encode_i64(ReturnCode::ExecutionFailed.as_i32() as i64));
    assert_eq!(
        output.return_data,
        vec![failed.clone(), Bytes::new(), failed, Bytes::from_static(b"succ")]
    );
    assert!(host.store().account(&other()).map_or(true, |a| a.storage().is_empty()));
    assert_eq!(host.storage(&root(), b"after"), b"stored");
}

#[test]
fn test_delegate_execution_acts_for_the_original_caller() {
    fn entry(host: &mut HostContext<'_>) -> HostResult<()> {
        let result = host.delegate_execution(50_000, &other(), "reportContext", Vec::new())?;
        host.finish_result(result)?;
        let result = host.delegate_execution(50_000, &other(), "writeAndFinish", Vec::new())?;
        host.finish_result(result)
    }
    let mut host = host_with(vec![
        (root(), NativeContract::new("root").with_function("entry", entry)),
        (other(), other_contract()),
    ]);
    host.set_balance(&caller(), U256::from(100u64));

    let output = host
        .run_call(CallInput::new(caller(), root(), "entry", 1_000_000).with_value(U256::from(5u64)))
        .unwrap();
    assert!(output.is_success());
    assert_eq!(
        output.return_data,
        vec![
            Bytes::copy_from_slice(caller().as_bytes()),
            Bytes::from_static(&[5]),
            Bytes::from_static(b"reportContext"),
            Bytes::from_static(b"succ"),
            Bytes::from_static(b"child done"),
            Bytes::from_static(b"succ"),
        ]
    );
    // The value was received once, by the delegating contract
    assert_eq!(host.balance(&caller()), U256::from(95u64));
    assert_eq!(host.balance(&root()), U256::from(5u64));
    assert_eq!(host.balance(&other()), U256::ZERO);
    assert_eq!(host.storage(&root(), b"shared"), b"written");
}
