//! Top-level entry points and the synchronous call primitives.

use std::sync::Arc;

use bytes::Bytes;
use num_bigint::BigInt;
use tracing::{debug, warn};

use crosscall_types::{Address, U256};

use crate::account_store::{AccountStore, BigIntHandle};
use crate::async_call::AsyncCallRecord;
use crate::config::VmConfig;
use crate::contract::{Contract, ContractRegistry, INIT_FUNCTION_NAME};
use crate::error::{Breakpoint, ReturnCode, VmError};
use crate::frame::{CallFrame, FrameSpec, FrameStack, FrameStatus, IsolationMode};
use crate::gas_metering::{GasRefundPolicy, GasTracker};
use crate::host::HostContext;
use crate::output::{FrameError, VmOutput};

/// Free native stack below which a nested call switches to a new segment.
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each stack segment allocated for deep call chains.
const STACK_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

/// A top-level call.
#[derive(Debug, Clone)]
pub struct CallInput {
    pub caller: Address,
    pub recipient: Address,
    pub function: String,
    pub arguments: Vec<Bytes>,
    pub value: U256,
    pub gas_limit: u64,
}

impl CallInput {
    pub fn new(
        caller: Address,
        recipient: Address,
        function: impl Into<String>,
        gas_limit: u64,
    ) -> Self {
        Self {
            caller,
            recipient,
            function: function.into(),
            arguments: Vec::new(),
            value: U256::ZERO,
            gas_limit,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Bytes>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_argument(mut self, argument: impl Into<Bytes>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A synchronous nested call requested by the running frame.
#[derive(Debug, Clone)]
pub(crate) struct SyncCall {
    pub mode: IsolationMode,
    pub gas: u64,
    pub dest: Address,
    pub value: U256,
    pub function: String,
    pub arguments: Vec<Bytes>,
    pub read_only: bool,
    pub delegated: bool,
}

impl SyncCall {
    pub(crate) fn new(
        mode: IsolationMode,
        gas: u64,
        dest: Address,
        value: U256,
        function: &str,
        arguments: Vec<Bytes>,
    ) -> Self {
        Self {
            mode,
            gas,
            dest,
            value,
            function: function.to_string(),
            arguments,
            read_only: false,
            delegated: false,
        }
    }
}

/// Owns all execution state: accounts, installed code and the frames of
/// the transaction in flight.
#[derive(Debug)]
pub struct VmHost {
    pub(crate) config: VmConfig,
    pub(crate) store: AccountStore,
    pub(crate) contracts: ContractRegistry,
    pub(crate) frames: FrameStack,
    pub(crate) async_calls: Vec<AsyncCallRecord>,
}

impl Default for VmHost {
    fn default() -> Self {
        Self {
            config: VmConfig::default(),
            store: AccountStore::new(),
            contracts: ContractRegistry::new(),
            frames: FrameStack::new(),
            async_calls: Vec::new(),
        }
    }
}

impl VmHost {
    /// Create a host with a validated configuration.
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    /// Install contract code at `address`.
    pub fn install_contract(
        &mut self,
        address: Address,
        contract: Arc<dyn Contract>,
    ) -> Result<(), VmError> {
        if address.is_zero() {
            return Err(VmError::InvalidAddress(address));
        }
        debug!(address = %address.short(), "Install contract");
        self.contracts.install(address, contract);
        Ok(())
    }

    pub fn set_balance(&mut self, address: &Address, balance: U256) {
        self.store.seed_balance(address, balance);
    }

    pub fn set_storage(&mut self, address: &Address, key: &[u8], value: &[u8]) {
        self.store.seed_storage(address, key, value);
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.store.balance(address)
    }

    pub fn storage(&self, address: &Address, key: &[u8]) -> &[u8] {
        self.store.get_storage(address, key)
    }

    pub fn bigint(&self, address: &Address, handle: BigIntHandle) -> Option<&BigInt> {
        self.store.get_bigint(address, handle)
    }

    /// Run the `init` entry point of `input.recipient`.
    pub fn run_init(&mut self, input: CallInput) -> Result<VmOutput, VmError> {
        self.run_call(CallInput {
            function: INIT_FUNCTION_NAME.to_string(),
            ..input
        })
    }

    /// Execute a top-level call as one transaction.
    ///
    /// Contract-level failures are reported in the returned [`VmOutput`];
    /// `Err` is reserved for calls the host refuses outright.
    pub fn run_call(&mut self, input: CallInput) -> Result<VmOutput, VmError> {
        if input.gas_limit > self.config.max_gas_limit {
            return Err(VmError::GasLimitTooHigh {
                requested: input.gas_limit,
                max: self.config.max_gas_limit,
            });
        }
        if input.recipient.is_zero() {
            return Err(VmError::InvalidAddress(input.recipient));
        }

        self.frames.clear();
        self.async_calls.clear();
        self.store.begin_transaction();
        debug!(
            caller = %input.caller.short(),
            recipient = %input.recipient.short(),
            function = %input.function,
            gas_limit = input.gas_limit,
            "Run call"
        );

        if let Err(err) = self.resolve_entry_point(&input.recipient, &input.function) {
            debug!(error = %err, "Call rejected");
            return Ok(VmOutput::rejected(err.return_code(), err.to_string(), input.gas_limit));
        }

        let checkpoint = self.store.checkpoint();
        if let Err(err) = self
            .store
            .move_balance(&input.caller, &input.recipient, input.value)
        {
            debug!(error = %err, "Call rejected");
            return Ok(VmOutput::rejected(err.return_code(), err.to_string(), input.gas_limit));
        }

        self.frames.push(
            FrameSpec {
                caller: input.caller,
                callee: input.recipient,
                function: input.function,
                mode: IsolationMode::Root,
                gas: GasTracker::new(input.gas_limit),
                value: input.value,
                arguments: input.arguments,
                read_only: false,
            },
            checkpoint,
        )?;
        self.execute_current();
        let root = self.frames.pop()?;

        if root.status() == FrameStatus::Finished {
            self.store.commit_to(checkpoint);
        } else {
            self.store.revert_to(checkpoint);
        }
        Ok(self.root_output(root))
    }

    fn root_output(&mut self, root: CallFrame) -> VmOutput {
        let return_code = root.return_code();
        let return_message = root
            .error()
            .map(|error| error.message.clone())
            .unwrap_or_default();
        debug!(
            code = %return_code,
            gas_used = root.gas.used(),
            async_calls = self.async_calls.len(),
            "Call finished"
        );

        VmOutput {
            return_code,
            return_message,
            gas_used: root.gas.used(),
            gas_remaining: root.gas.remaining(),
            gas_refund: root.gas.refunded(),
            return_data: if return_code.is_ok() {
                root.output.into_chunks()
            } else {
                Vec::new()
            },
            transfers: self.store.transfers().to_vec(),
            async_calls: std::mem::take(&mut self.async_calls),
        }
    }

    /// Code at `address` exporting `function`.
    pub(crate) fn resolve_entry_point(
        &self,
        address: &Address,
        function: &str,
    ) -> Result<Arc<dyn Contract>, VmError> {
        let contract = self
            .contracts
            .get(address)
            .ok_or(VmError::ContractNotFound(*address))?;
        if !contract.has_function(function) {
            return Err(VmError::FunctionNotFound(function.to_string()));
        }
        Ok(contract)
    }

    /// Run the contract code of the top frame until it stops, then settle
    /// its status. A frame suspended on an async call is driven through the
    /// scheduler before this returns.
    pub(crate) fn execute_current(&mut self) {
        let Some(frame) = self.frames.current() else {
            return;
        };
        let (callee, function) = (frame.callee, frame.function.clone());

        let result = match self.contracts.get(&callee) {
            // Every nested call re-enters here; grow the stack on the heap
            // so that only gas bounds the depth.
            Some(contract) => stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
                let mut host = HostContext::new(self);
                contract.call(&function, &mut host)
            }),
            None => {
                let err = VmError::ContractNotFound(callee);
                if let Some(frame) = self.frames.current_mut() {
                    frame.fail(FrameError::new(err.return_code(), err.to_string()));
                }
                Err(Breakpoint::ExecutionFailed)
            }
        };

        let Some(status) = self.frames.current().map(CallFrame::status) else {
            return;
        };
        match status {
            FrameStatus::Running => {
                if let Some(frame) = self.frames.current_mut() {
                    match result {
                        Ok(()) => frame.finish(),
                        Err(breakpoint) => frame.fail(FrameError::new(
                            breakpoint.return_code(),
                            breakpoint.to_string(),
                        )),
                    }
                }
            }
            FrameStatus::AwaitingCallback => self.run_async_call(),
            FrameStatus::Finished | FrameStatus::Errored => {}
        }
    }

    /// Shared body of the synchronous call host functions.
    ///
    /// Every precondition is checked before a frame exists; a failed check
    /// is returned as a status code and leaves the caller untouched.
    pub(crate) fn execute_sync_call(&mut self, call: SyncCall) -> i32 {
        let Some(parent) = self.frames.current() else {
            return ReturnCode::ExecutionFailed.as_i32();
        };
        let account = parent.view.address();
        let available = parent.gas.remaining();
        // A delegated call acts for this frame's caller with the value it
        // already received; nothing moves.
        let (caller, value, moved) = if call.delegated {
            (parent.caller, parent.value, U256::ZERO)
        } else {
            (account, call.value, call.value)
        };
        let read_only = parent.read_only || call.read_only;

        if let Err(err) = self.check_sync_call(&call, available, &account, moved, read_only) {
            debug!(dest = %call.dest.short(), function = %call.function, error = %err, "Sub-call rejected");
            return err.return_code().as_i32();
        }

        let checkpoint = self.store.checkpoint();
        if let Err(err) = self.store.move_balance(&account, &call.dest, moved) {
            self.store.revert_to(checkpoint);
            return err.return_code().as_i32();
        }
        let child_gas = match self
            .frames
            .current_mut()
            .map(|parent| parent.gas.allot(call.gas))
        {
            Some(Ok(child_gas)) => child_gas,
            Some(Err(err)) => {
                self.store.revert_to(checkpoint);
                return err.return_code().as_i32();
            }
            None => {
                self.store.revert_to(checkpoint);
                return ReturnCode::ExecutionFailed.as_i32();
            }
        };

        let spec = FrameSpec {
            caller,
            callee: call.dest,
            function: call.function,
            mode: call.mode,
            gas: child_gas,
            value,
            arguments: call.arguments,
            read_only: call.read_only,
        };
        if let Err(err) = self.frames.push(spec, checkpoint) {
            self.store.revert_to(checkpoint);
            return err.return_code().as_i32();
        }

        self.execute_current();
        match self.frames.pop() {
            Ok(child) => self.settle_child(child),
            Err(err) => {
                warn!(error = %err, "Sub-call left an unfinished frame");
                ReturnCode::ExecutionFailed.as_i32()
            }
        }
    }

    fn check_sync_call(
        &self,
        call: &SyncCall,
        available: u64,
        account: &Address,
        moved: U256,
        read_only: bool,
    ) -> Result<(), VmError> {
        if call.dest.is_zero() {
            return Err(VmError::InvalidAddress(call.dest));
        }
        self.resolve_entry_point(&call.dest, &call.function)?;
        if call.gas > available {
            return Err(VmError::OutOfGas {
                used: call.gas,
                limit: available,
            });
        }
        if read_only && !moved.is_zero() {
            return Err(VmError::ReadOnlyWrite);
        }
        let balance = self.store.balance(account);
        if moved > balance {
            return Err(VmError::InsufficientBalance {
                required: moved,
                available: balance,
            });
        }
        Ok(())
    }

    /// Commit or roll back a popped child and report its status code.
    fn settle_child(&mut self, child: CallFrame) -> i32 {
        let code = child.return_code();
        if code.is_ok() {
            if child.mode.commits_on_success() {
                self.store.commit_to(child.checkpoint);
            }
        } else {
            self.store.revert_to(child.checkpoint);
        }

        let refund_unused = self.config.gas_refund == GasRefundPolicy::RefundUnused;
        if let Some(parent) = self.frames.current_mut() {
            if code.is_ok() {
                parent.gas.refund(child.gas.refunded());
            }
            if refund_unused {
                parent.gas.return_unused(child.gas.remaining());
            }
            if !child.mode.inlines_output() {
                parent.return_data = if code.is_ok() {
                    child.output.into_chunks()
                } else {
                    Vec::new()
                };
            }
        }
        code.as_i32()
    }
}
