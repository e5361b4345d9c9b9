//! Contract code model.
//!
//! Contracts are native Rust values exposing named entry points. Each entry
//! point talks to the host exclusively through [`HostContext`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crosscall_types::Address;

use crate::error::{Breakpoint, HostResult};
use crate::host::HostContext;

/// Constructor entry point.
pub const INIT_FUNCTION_NAME: &str = "init";

/// Entry point invoked when an async call completes.
pub const CALLBACK_FUNCTION_NAME: &str = "callBack";

/// Executable contract code.
pub trait Contract: Send + Sync {
    /// Whether `function` is an exported entry point.
    fn has_function(&self, function: &str) -> bool;

    /// Run `function` against the host.
    fn call(&self, function: &str, host: &mut HostContext<'_>) -> HostResult<()>;
}

/// Signature of a native entry point.
pub type EntryPoint = dyn Fn(&mut HostContext<'_>) -> HostResult<()> + Send + Sync;

/// A contract assembled from Rust functions.
pub struct NativeContract {
    name: String,
    functions: HashMap<String, Box<EntryPoint>>,
}

impl NativeContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    /// Export `entry_point` under `function`.
    pub fn with_function<F>(mut self, function: impl Into<String>, entry_point: F) -> Self
    where
        F: Fn(&mut HostContext<'_>) -> HostResult<()> + Send + Sync + 'static,
    {
        self.functions.insert(function.into(), Box::new(entry_point));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn into_arc(self) -> Arc<dyn Contract> {
        Arc::new(self)
    }
}

impl fmt::Debug for NativeContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContract")
            .field("name", &self.name)
            .field("functions", &self.function_names())
            .finish()
    }
}

impl Contract for NativeContract {
    fn has_function(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    fn call(&self, function: &str, host: &mut HostContext<'_>) -> HostResult<()> {
        match self.functions.get(function) {
            Some(entry_point) => entry_point(host),
            None => Err(Breakpoint::ExecutionFailed),
        }
    }
}

/// Installed contract code by address.
#[derive(Clone, Default)]
pub struct ContractRegistry {
    contracts: HashMap<Address, Arc<dyn Contract>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the code at `address`.
    pub fn install(&mut self, address: Address, contract: Arc<dyn Contract>) {
        self.contracts.insert(address, contract);
    }

    pub fn get(&self, address: &Address) -> Option<Arc<dyn Contract>> {
        self.contracts.get(address).cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.contracts.keys().map(Address::short))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_host: &mut HostContext<'_>) -> HostResult<()> {
        Ok(())
    }

    #[test]
    fn test_native_contract_functions() {
        let contract = NativeContract::new("sample")
            .with_function("b", noop)
            .with_function("a", noop);
        assert!(contract.has_function("a"));
        assert!(!contract.has_function("c"));
        assert_eq!(contract.function_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_registry() {
        let mut registry = ContractRegistry::new();
        let address = Address::from_padded_name("sample").unwrap();
        assert!(registry.get(&address).is_none());
        registry.install(address, NativeContract::new("sample").into_arc());
        assert!(registry.contains(&address));
        assert_eq!(registry.len(), 1);
    }
}
