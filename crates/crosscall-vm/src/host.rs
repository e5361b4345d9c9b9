//! Host functions available to contract code.
//!
//! A [`HostContext`] is handed to every entry point. All calls operate on
//! the currently executing frame and its storage view; contracts never name
//! the account they read or write. Each call pays its gas cost first, and
//! once the frame stops running every call returns the frame's
//! [`Breakpoint`].

use bytes::Bytes;
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use tracing::{debug, trace};

use crosscall_types::{Address, U256};

use crate::account_store::{BigIntHandle, StorageStatus};
use crate::async_call::AsyncCallRecord;
use crate::call_data;
use crate::dispatcher::{SyncCall, VmHost};
use crate::error::{Breakpoint, HostResult, ReturnCode, VmError};
use crate::frame::{CallFrame, IsolationMode};
use crate::gas_metering::GasSchedule;
use crate::output::FrameError;

/// Chunk written by [`HostContext::finish_result`] for a zero status.
pub const RESULT_SUCCESS: &[u8] = b"succ";
/// Chunk written by [`HostContext::finish_result`] for any other status.
pub const RESULT_FAILURE: &[u8] = b"fail";

/// Swap the byte order of a big integer handle, so that its little-endian
/// bytes are the handle in big-endian order, as call arguments carry it.
pub fn reverse_u32(handle: BigIntHandle) -> BigIntHandle {
    BigIntHandle(handle.0.swap_bytes())
}

/// The host as seen from a running contract.
pub struct HostContext<'a> {
    vm: &'a mut VmHost,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(vm: &'a mut VmHost) -> Self {
        Self { vm }
    }

    fn schedule(&self) -> &GasSchedule {
        &self.vm.config.gas_schedule
    }

    fn frame(&self) -> HostResult<&CallFrame> {
        let frame = self.vm.frames.current().ok_or(Breakpoint::ExecutionFailed)?;
        match frame.breakpoint() {
            Some(breakpoint) => Err(breakpoint),
            None => Ok(frame),
        }
    }

    fn frame_mut(&mut self) -> HostResult<&mut CallFrame> {
        let frame = self
            .vm
            .frames
            .current_mut()
            .ok_or(Breakpoint::ExecutionFailed)?;
        match frame.breakpoint() {
            Some(breakpoint) => Err(breakpoint),
            None => Ok(frame),
        }
    }

    /// Charge the running frame; running out of gas terminates it.
    fn charge(&mut self, amount: u64) -> HostResult<()> {
        let frame = self.frame_mut()?;
        if let Err(err) = frame.gas.charge(amount) {
            trace!(frame = %frame.id, amount, "Gas exhausted");
            frame.fail(FrameError::new(ReturnCode::OutOfGas, err.to_string()));
            return Err(Breakpoint::OutOfGas);
        }
        Ok(())
    }

    /// Fail the running frame with `err`, using up its gas.
    fn fail(&mut self, err: VmError) -> Breakpoint {
        let breakpoint = Breakpoint::from(&err);
        if let Some(frame) = self.vm.frames.current_mut() {
            frame.gas.consume_all();
            frame.fail(FrameError::new(err.return_code(), err.to_string()));
        }
        breakpoint
    }

    fn view_address(&self) -> HostResult<Address> {
        Ok(self.frame()?.view.address())
    }

    /// Fail the running frame if it may not write state.
    fn ensure_writable(&mut self) -> HostResult<()> {
        if self.frame()?.read_only {
            return Err(self.fail(VmError::ReadOnlyWrite));
        }
        Ok(())
    }

    // Arguments & context

    pub fn get_num_arguments(&mut self) -> HostResult<usize> {
        let cost = self.schedule().get_num_arguments;
        self.charge(cost)?;
        Ok(self.frame()?.arguments.len())
    }

    /// Argument at `index`, `None` past the last one.
    pub fn get_argument(&mut self, index: usize) -> HostResult<Option<Bytes>> {
        let cost = self.schedule().get_argument;
        self.charge(cost)?;
        let argument = self.frame()?.arguments.get(index).cloned();
        if let Some(argument) = &argument {
            let cost = self.schedule().data_copy(argument.len());
            self.charge(cost)?;
        }
        Ok(argument)
    }

    pub fn get_argument_length(&mut self, index: usize) -> HostResult<Option<usize>> {
        let cost = self.schedule().get_argument;
        self.charge(cost)?;
        Ok(self.frame()?.arguments.get(index).map(Bytes::len))
    }

    /// Argument at `index` decoded as a two's-complement int64. A missing or
    /// oversized argument fails the frame.
    pub fn int64_get_argument(&mut self, index: usize) -> HostResult<i64> {
        let cost = self.schedule().int64_get_argument;
        self.charge(cost)?;
        let argument = self.frame()?.arguments.get(index).cloned();
        match argument {
            None => Err(self.fail(VmError::ArgumentIndexOutOfRange(index))),
            Some(argument) => call_data::decode_i64(&argument)
                .ok_or_else(|| self.fail(VmError::ArgumentOutOfRange)),
        }
    }

    pub fn get_function(&mut self) -> HostResult<String> {
        let cost = self.schedule().get_function;
        self.charge(cost)?;
        Ok(self.frame()?.function.clone())
    }

    pub fn get_caller(&mut self) -> HostResult<Address> {
        let cost = self.schedule().get_caller;
        self.charge(cost)?;
        Ok(self.frame()?.caller)
    }

    /// Address of the account this frame acts as.
    pub fn get_sc_address(&mut self) -> HostResult<Address> {
        let cost = self.schedule().get_sc_address;
        self.charge(cost)?;
        self.view_address()
    }

    pub fn get_call_value(&mut self) -> HostResult<U256> {
        let cost = self.schedule().get_call_value;
        self.charge(cost)?;
        Ok(self.frame()?.value)
    }

    pub fn get_gas_left(&mut self) -> HostResult<u64> {
        let cost = self.schedule().get_gas_left;
        self.charge(cost)?;
        Ok(self.frame()?.gas.remaining())
    }

    pub fn get_external_balance(&mut self, address: &Address) -> HostResult<U256> {
        let cost = self.schedule().get_external_balance;
        self.charge(cost)?;
        Ok(self.vm.store.balance(address))
    }

    /// Pay `amount` gas explicitly, e.g. once per loop iteration.
    pub fn use_gas(&mut self, amount: u64) -> HostResult<()> {
        self.charge(amount)
    }

    // Output

    pub fn finish(&mut self, data: &[u8]) -> HostResult<()> {
        let schedule = self.schedule();
        let cost = schedule.finish.saturating_add(schedule.data_copy(data.len()));
        self.charge(cost)?;
        self.frame_mut()?.output.finish(Bytes::copy_from_slice(data));
        Ok(())
    }

    pub fn int64_finish(&mut self, value: i64) -> HostResult<()> {
        let cost = self.schedule().int64_finish;
        self.charge(cost)?;
        self.frame_mut()?
            .output
            .finish(Bytes::from(call_data::encode_i64(value)));
        Ok(())
    }

    /// Finish `succ` for a zero status and `fail` for anything else.
    pub fn finish_result(&mut self, status: i32) -> HostResult<()> {
        if status == ReturnCode::Ok.as_i32() {
            self.finish(RESULT_SUCCESS)
        } else {
            self.finish(RESULT_FAILURE)
        }
    }

    /// Fail the frame with a user error. Always returns `Err`.
    pub fn signal_error(&mut self, message: &[u8]) -> HostResult<()> {
        let schedule = self.schedule();
        let cost = schedule
            .signal_error
            .saturating_add(schedule.data_copy(message.len()));
        self.charge(cost)?;
        let frame = self.frame_mut()?;
        frame.fail(FrameError::new(
            ReturnCode::UserError,
            String::from_utf8_lossy(message),
        ));
        Err(Breakpoint::SignalError)
    }

    // Storage

    pub fn storage_store(&mut self, key: &[u8], value: &[u8]) -> HostResult<StorageStatus> {
        let cost = self.schedule().storage_store;
        self.charge(cost)?;
        self.write_storage(key, value)
    }

    pub fn storage_load(&mut self, key: &[u8]) -> HostResult<Vec<u8>> {
        let cost = self.schedule().storage_load;
        self.charge(cost)?;
        let address = self.view_address()?;
        let value = self.vm.store.get_storage(&address, key).to_vec();
        let cost = self.schedule().data_copy(value.len());
        self.charge(cost)?;
        Ok(value)
    }

    pub fn storage_load_length(&mut self, key: &[u8]) -> HostResult<usize> {
        let cost = self.schedule().storage_load;
        self.charge(cost)?;
        let address = self.view_address()?;
        Ok(self.vm.store.get_storage(&address, key).len())
    }

    fn write_storage(&mut self, key: &[u8], value: &[u8]) -> HostResult<StorageStatus> {
        self.ensure_writable()?;
        if self.vm.config.is_protected_key(key) {
            return Err(self.fail(VmError::ReservedStorageKey));
        }
        let address = self.view_address()?;
        let current = self.vm.store.get_storage(&address, key);
        let (cost, refund) = if current == value {
            (0, 0)
        } else {
            let schedule = self.schedule();
            (
                schedule.storage_write_cost(current.len(), value.len()),
                schedule.storage_release_refund(current.len(), value.len()),
            )
        };
        self.charge(cost)?;

        let status = self.vm.store.set_storage(&address, key, value);
        if refund > 0 {
            self.frame_mut()?.gas.refund(refund);
        }
        Ok(status)
    }

    // Transfers & calls

    /// Move `value` from this frame's account to `dest`. Returns a status
    /// code; no code runs at `dest`.
    pub fn transfer_value(&mut self, dest: &Address, value: U256, data: &[u8]) -> HostResult<i32> {
        let schedule = self.schedule();
        let cost = schedule
            .transfer_value
            .saturating_add((data.len() as u64).saturating_mul(schedule.persist_per_byte));
        self.charge(cost)?;
        self.ensure_writable()?;

        let from = self.view_address()?;
        match self
            .vm
            .store
            .transfer(&from, dest, value, Bytes::copy_from_slice(data))
        {
            Ok(()) => Ok(ReturnCode::Ok.as_i32()),
            Err(err) => {
                debug!(from = %from.short(), to = %dest.short(), error = %err, "Transfer rejected");
                Ok(err.return_code().as_i32())
            }
        }
    }

    /// Run `function` at `dest` on this frame's account. Output of a
    /// successful callee is appended to this frame's output.
    pub fn execute_on_same_context(
        &mut self,
        gas: u64,
        dest: &Address,
        value: U256,
        function: &str,
        arguments: Vec<Bytes>,
    ) -> HostResult<i32> {
        let cost = self.call_cost(self.schedule().execute_on_same_context, function, &arguments);
        self.charge(cost)?;
        Ok(self.vm.execute_sync_call(SyncCall::new(
            IsolationMode::SameContext,
            gas,
            *dest,
            value,
            function,
            arguments,
        )))
    }

    /// Run `function` at `dest` on `dest`'s own account. Output of a
    /// successful callee is readable through [`Self::get_return_data`].
    pub fn execute_on_dest_context(
        &mut self,
        gas: u64,
        dest: &Address,
        value: U256,
        function: &str,
        arguments: Vec<Bytes>,
    ) -> HostResult<i32> {
        let cost = self.call_cost(self.schedule().execute_on_dest_context, function, &arguments);
        self.charge(cost)?;
        Ok(self.vm.execute_sync_call(SyncCall::new(
            IsolationMode::DestContext,
            gas,
            *dest,
            value,
            function,
            arguments,
        )))
    }

    /// Like [`Self::execute_on_dest_context`] without a value, but the
    /// callee and everything it calls fail on any state write.
    pub fn execute_read_only(
        &mut self,
        gas: u64,
        dest: &Address,
        function: &str,
        arguments: Vec<Bytes>,
    ) -> HostResult<i32> {
        let cost = self.call_cost(self.schedule().execute_read_only, function, &arguments);
        self.charge(cost)?;
        let mut call = SyncCall::new(
            IsolationMode::DestContext,
            gas,
            *dest,
            U256::ZERO,
            function,
            arguments,
        );
        call.read_only = true;
        Ok(self.vm.execute_sync_call(call))
    }

    /// Run `function` at `dest` on this frame's account, on behalf of this
    /// frame's caller and with the value this frame received.
    pub fn delegate_execution(
        &mut self,
        gas: u64,
        dest: &Address,
        function: &str,
        arguments: Vec<Bytes>,
    ) -> HostResult<i32> {
        let cost = self.call_cost(self.schedule().delegate_execution, function, &arguments);
        self.charge(cost)?;
        let mut call = SyncCall::new(
            IsolationMode::SameContext,
            gas,
            *dest,
            U256::ZERO,
            function,
            arguments,
        );
        call.delegated = true;
        Ok(self.vm.execute_sync_call(call))
    }

    /// Number of chunks the last dest-context callee finished with.
    pub fn get_num_return_data(&mut self) -> HostResult<usize> {
        let cost = self.schedule().get_num_return_data;
        self.charge(cost)?;
        Ok(self.frame()?.return_data.len())
    }

    /// Length of returned chunk `index`, zero past the last one.
    pub fn get_return_data_size(&mut self, index: usize) -> HostResult<usize> {
        let cost = self.schedule().get_return_data;
        self.charge(cost)?;
        Ok(self
            .frame()?
            .return_data
            .get(index)
            .map(Bytes::len)
            .unwrap_or(0))
    }

    /// Returned chunk `index`, `None` past the last one.
    pub fn get_return_data(&mut self, index: usize) -> HostResult<Option<Bytes>> {
        let cost = self.schedule().get_return_data;
        self.charge(cost)?;
        let chunk = self.frame()?.return_data.get(index).cloned();
        if let Some(chunk) = &chunk {
            let cost = self.schedule().data_copy(chunk.len());
            self.charge(cost)?;
        }
        Ok(chunk)
    }

    fn call_cost(&self, base: u64, function: &str, arguments: &[Bytes]) -> u64 {
        let copied = function.len() + arguments.iter().map(Bytes::len).sum::<usize>();
        base.saturating_add(self.schedule().data_copy(copied))
    }

    /// Schedule `data` (`function@hex@hex…`) to run at `dest` and suspend
    /// this frame until its `callBack` has run. Always returns `Err`.
    pub fn async_call(&mut self, dest: &Address, value: U256, data: &[u8]) -> HostResult<()> {
        let schedule = *self.schedule();
        let cost = schedule
            .async_call_step
            .saturating_add(schedule.data_copy(data.len()));
        self.charge(cost)?;
        self.ensure_writable()?;

        let (id, origin, remaining, used, limit) = {
            let frame = self.frame()?;
            (
                frame.id,
                frame.view.address(),
                frame.gas.remaining(),
                frame.gas.used(),
                frame.gas.limit(),
            )
        };
        if remaining < schedule.async_call_minimum() {
            return Err(self.fail(VmError::OutOfGas {
                used: used.saturating_add(schedule.async_call_minimum()),
                limit,
            }));
        }

        let record = AsyncCallRecord::new(
            id,
            origin,
            *dest,
            value,
            data,
            remaining - schedule.async_callback_gas_lock,
            schedule.async_callback_gas_lock,
        );
        let frame = self.frame_mut()?;
        frame.gas.consume_all();
        frame.suspend(record);
        debug!(frame = %id, dest = %dest.short(), "Frame suspended on async call");
        Err(Breakpoint::AsyncCall)
    }

    // Big integers

    /// Create a big integer in this frame's registry.
    pub fn big_int_new(&mut self, value: i64) -> HostResult<BigIntHandle> {
        let cost = self.schedule().big_int_new;
        self.charge(cost)?;
        let address = self.view_address()?;
        let handle = self.vm.store.allocate_bigint_handle(&address);
        self.vm.store.set_bigint(&address, handle, BigInt::from(value));
        Ok(handle)
    }

    pub fn big_int_set_int64(&mut self, handle: BigIntHandle, value: i64) -> HostResult<()> {
        let cost = self.schedule().big_int_set_int64;
        self.charge(cost)?;
        let address = self.view_address()?;
        self.vm.store.set_bigint(&address, handle, BigInt::from(value));
        Ok(())
    }

    /// Value under `handle`; an unknown handle reads as zero.
    pub fn big_int_get_int64(&mut self, handle: BigIntHandle) -> HostResult<i64> {
        let cost = self.schedule().big_int_get_int64;
        self.charge(cost)?;
        let address = self.view_address()?;
        let value = match self.vm.store.get_bigint(&address, handle) {
            None => Some(0),
            Some(value) => value.to_i64(),
        };
        value.ok_or_else(|| self.fail(VmError::BigIntOutOfRange(handle.0)))
    }

    /// Store the magnitude of the big integer under `handle` as unsigned
    /// big-endian bytes.
    pub fn big_int_storage_store_unsigned(
        &mut self,
        key: &[u8],
        handle: BigIntHandle,
    ) -> HostResult<StorageStatus> {
        let cost = self.schedule().big_int_storage_store_unsigned;
        self.charge(cost)?;
        let address = self.view_address()?;
        let bytes = match self.vm.store.get_bigint(&address, handle) {
            Some(value) if !value.is_zero() => value.magnitude().to_bytes_be(),
            _ => Vec::new(),
        };
        self.write_storage(key, &bytes)
    }

    /// Load an unsigned big-endian value into a fresh big integer.
    pub fn big_int_storage_load_unsigned(&mut self, key: &[u8]) -> HostResult<BigIntHandle> {
        let cost = self.schedule().big_int_storage_load_unsigned;
        self.charge(cost)?;
        let address = self.view_address()?;
        let value = BigInt::from_bytes_be(Sign::Plus, self.vm.store.get_storage(&address, key));
        let handle = self.vm.store.allocate_bigint_handle(&address);
        self.vm.store.set_bigint(&address, handle, value);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_u32() {
        assert_eq!(reverse_u32(BigIntHandle(0x0102_0304)), BigIntHandle(0x0403_0201));
        assert_eq!(reverse_u32(BigIntHandle(2)).0.to_le_bytes(), 2i32.to_be_bytes());
        assert_eq!(reverse_u32(reverse_u32(BigIntHandle(-7))), BigIntHandle(-7));
    }
}
