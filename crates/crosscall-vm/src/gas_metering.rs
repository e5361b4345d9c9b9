use serde::{Deserialize, Serialize};

use crate::error::VmError;

/// Gas costs of the host API.
///
/// Every host function pays a base cost when called; functions that move
/// data across the host boundary additionally pay per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    // Arguments & context
    pub get_num_arguments: u64,      // 10
    pub get_argument: u64,           // 10
    pub int64_get_argument: u64,     // 10
    pub get_function: u64,           // 10
    pub get_caller: u64,             // 10
    pub get_sc_address: u64,         // 10
    pub get_call_value: u64,         // 10
    pub get_gas_left: u64,           // 10
    pub get_external_balance: u64,   // 50

    // Output
    pub finish: u64,                 // 10
    pub int64_finish: u64,           // 10
    pub signal_error: u64,           // 10

    // Storage
    pub storage_store: u64,          // 75
    pub storage_load: u64,           // 50
    pub store_per_byte: u64,         // 5
    pub persist_per_byte: u64,       // 2
    pub release_per_byte: u64,       // 1
    pub data_copy_per_byte: u64,     // 1

    // Transfers & calls
    pub transfer_value: u64,         // 100
    pub execute_on_same_context: u64, // 100
    pub execute_on_dest_context: u64, // 100
    pub execute_read_only: u64,      // 100
    pub delegate_execution: u64,     // 100
    pub get_num_return_data: u64,    // 10
    pub get_return_data: u64,        // 10
    pub async_call_step: u64,        // 100
    pub async_callback_gas_lock: u64, // 5,000

    // Big integers
    pub big_int_new: u64,            // 10
    pub big_int_set_int64: u64,      // 10
    pub big_int_get_int64: u64,      // 10
    pub big_int_storage_store_unsigned: u64, // 75
    pub big_int_storage_load_unsigned: u64,  // 50
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            // Arguments & context
            get_num_arguments: 10,
            get_argument: 10,
            int64_get_argument: 10,
            get_function: 10,
            get_caller: 10,
            get_sc_address: 10,
            get_call_value: 10,
            get_gas_left: 10,
            get_external_balance: 50,

            // Output
            finish: 10,
            int64_finish: 10,
            signal_error: 10,

            // Storage
            storage_store: 75,
            storage_load: 50,
            store_per_byte: 5,
            persist_per_byte: 2,
            release_per_byte: 1,
            data_copy_per_byte: 1,

            // Transfers & calls
            transfer_value: 100,
            execute_on_same_context: 100,
            execute_on_dest_context: 100,
            execute_read_only: 100,
            delegate_execution: 100,
            get_num_return_data: 10,
            get_return_data: 10,
            async_call_step: 100,
            async_callback_gas_lock: 5_000,

            // Big integers
            big_int_new: 10,
            big_int_set_int64: 10,
            big_int_get_int64: 10,
            big_int_storage_store_unsigned: 75,
            big_int_storage_load_unsigned: 50,
        }
    }
}

impl GasSchedule {
    /// A schedule where every operation costs `cost`.
    pub fn uniform(cost: u64) -> Self {
        Self {
            get_num_arguments: cost,
            get_argument: cost,
            int64_get_argument: cost,
            get_function: cost,
            get_caller: cost,
            get_sc_address: cost,
            get_call_value: cost,
            get_gas_left: cost,
            get_external_balance: cost,
            finish: cost,
            int64_finish: cost,
            signal_error: cost,
            storage_store: cost,
            storage_load: cost,
            store_per_byte: cost,
            persist_per_byte: cost,
            release_per_byte: cost,
            data_copy_per_byte: cost,
            transfer_value: cost,
            execute_on_same_context: cost,
            execute_on_dest_context: cost,
            execute_read_only: cost,
            delegate_execution: cost,
            get_num_return_data: cost,
            get_return_data: cost,
            async_call_step: cost,
            async_callback_gas_lock: cost,
            big_int_new: cost,
            big_int_set_int64: cost,
            big_int_get_int64: cost,
            big_int_storage_store_unsigned: cost,
            big_int_storage_load_unsigned: cost,
        }
    }

    /// All costs with their names, in declaration order.
    pub fn entries(&self) -> [(&'static str, u64); 32] {
        [
            ("get_num_arguments", self.get_num_arguments),
            ("get_argument", self.get_argument),
            ("int64_get_argument", self.int64_get_argument),
            ("get_function", self.get_function),
            ("get_caller", self.get_caller),
            ("get_sc_address", self.get_sc_address),
            ("get_call_value", self.get_call_value),
            ("get_gas_left", self.get_gas_left),
            ("get_external_balance", self.get_external_balance),
            ("finish", self.finish),
            ("int64_finish", self.int64_finish),
            ("signal_error", self.signal_error),
            ("storage_store", self.storage_store),
            ("storage_load", self.storage_load),
            ("store_per_byte", self.store_per_byte),
            ("persist_per_byte", self.persist_per_byte),
            ("release_per_byte", self.release_per_byte),
            ("data_copy_per_byte", self.data_copy_per_byte),
            ("transfer_value", self.transfer_value),
            ("execute_on_same_context", self.execute_on_same_context),
            ("execute_on_dest_context", self.execute_on_dest_context),
            ("execute_read_only", self.execute_read_only),
            ("delegate_execution", self.delegate_execution),
            ("get_num_return_data", self.get_num_return_data),
            ("get_return_data", self.get_return_data),
            ("async_call_step", self.async_call_step),
            ("async_callback_gas_lock", self.async_callback_gas_lock),
            ("big_int_new", self.big_int_new),
            ("big_int_set_int64", self.big_int_set_int64),
            ("big_int_get_int64", self.big_int_get_int64),
            ("big_int_storage_store_unsigned", self.big_int_storage_store_unsigned),
            ("big_int_storage_load_unsigned", self.big_int_storage_load_unsigned),
        ]
    }

    /// Reject schedules with zero-cost operations.
    pub fn validate(&self) -> Result<(), VmError> {
        let zero: Vec<&str> = self
            .entries()
            .iter()
            .filter(|(_, cost)| *cost == 0)
            .map(|(name, _)| *name)
            .collect();
        if zero.is_empty() {
            Ok(())
        } else {
            Err(VmError::Config(format!(
                "gas schedule has zero-cost operations: {}",
                zero.join(", ")
            )))
        }
    }

    /// Minimum gas a frame must still hold after paying for `async_call`.
    pub fn async_call_minimum(&self) -> u64 {
        self.async_call_step
            .saturating_mul(2)
            .saturating_add(self.async_callback_gas_lock)
    }

    /// Per-byte cost of changing a stored value from `old_len` to `new_len`
    /// bytes: new bytes persist, rewritten bytes are stored again, dropped
    /// bytes are released.
    pub fn storage_write_cost(&self, old_len: usize, new_len: usize) -> u64 {
        let old_len = old_len as u64;
        let new_len = new_len as u64;
        let rewritten = old_len.min(new_len);
        let persisted = new_len.saturating_sub(old_len);
        rewritten
            .saturating_mul(self.store_per_byte)
            .saturating_add(persisted.saturating_mul(self.persist_per_byte))
    }

    /// Refund earned when a stored value shrinks from `old_len` to `new_len`.
    pub fn storage_release_refund(&self, old_len: usize, new_len: usize) -> u64 {
        (old_len.saturating_sub(new_len) as u64).saturating_mul(self.release_per_byte)
    }

    /// Cost of copying `len` bytes across the host boundary.
    pub fn data_copy(&self, len: usize) -> u64 {
        (len as u64).saturating_mul(self.data_copy_per_byte)
    }
}

/// Whether unused gas of a terminated synchronous child returns to its
/// parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasRefundPolicy {
    /// Gas carved for a child is spent whatever the child used.
    #[default]
    None,
    /// The child's remaining gas is credited back to the parent.
    RefundUnused,
}

/// Gas tracking for one call frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTracker {
    /// Gas limit for this frame
    limit: u64,
    /// Gas already used
    used: u64,
    /// Gas refunded
    refunded: u64,
}

impl GasTracker {
    /// Create a new gas tracker.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            refunded: 0,
        }
    }

    /// Get gas limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get gas used.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Get gas refunded.
    pub fn refunded(&self) -> u64 {
        self.refunded
    }

    /// Get remaining gas.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Get effective gas (used - refunded, never negative).
    pub fn effective_gas(&self) -> u64 {
        self.used.saturating_sub(self.refunded)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Charge gas. A charge that does not fit exhausts the tracker.
    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        match self.used.checked_add(amount) {
            Some(new_used) if new_used <= self.limit => {
                self.used = new_used;
                Ok(())
            }
            new_used => {
                let used = new_used.unwrap_or(u64::MAX);
                self.used = self.limit;
                Err(VmError::OutOfGas {
                    used,
                    limit: self.limit,
                })
            }
        }
    }

    /// Carve `amount` out of this tracker into a fresh child tracker.
    ///
    /// Fails without touching this tracker when `amount` exceeds what is
    /// left.
    pub fn allot(&mut self, amount: u64) -> Result<GasTracker, VmError> {
        if amount > self.remaining() {
            return Err(VmError::OutOfGas {
                used: self.used.saturating_add(amount),
                limit: self.limit,
            });
        }
        self.used += amount;
        Ok(GasTracker::new(amount))
    }

    /// Use up all remaining gas.
    pub fn consume_all(&mut self) {
        self.used = self.limit;
    }

    /// Give back previously charged gas (unused gas of a child frame).
    pub fn return_unused(&mut self, amount: u64) {
        self.used = self.used.saturating_sub(amount);
    }

    /// Refund gas (for storage release).
    pub fn refund(&mut self, amount: u64) {
        self.refunded = self.refunded.saturating_add(amount);
    }
}
