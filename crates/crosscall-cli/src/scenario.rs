//! Scenario files.
//!
//! A scenario seeds accounts, installs fixture contracts and describes one
//! top-level call:
//!
//! ```toml
//! [[accounts]]
//! address = "parentSC"
//! balance = "1000"
//! fixture = "async-call-parent"
//!
//! [call]
//! caller = "user"
//! recipient = "parentSC"
//! function = "parentPerformAsyncCall"
//! gas_limit = 200000
//! arguments = ["00"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use crosscall_fixtures::{fixture, FIXTURE_NAMES};
use crosscall_types::{Address, U256};
use crosscall_vm::{CallInput, VmConfig, VmHost};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    pub call: CallSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSpec {
    pub address: Address,
    #[serde(default)]
    pub balance: U256,
    /// Fixture contract installed at this address
    pub fixture: Option<String>,
    /// Initial storage, hex keys to hex values
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallSpec {
    pub caller: Address,
    pub recipient: Address,
    /// Defaults to `init` when the call is a deployment
    #[serde(default)]
    pub function: Option<String>,
    pub gas_limit: u64,
    #[serde(default)]
    pub value: U256,
    /// Hex encoded arguments
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub init: bool,
}

impl Scenario {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario '{}'", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse scenario '{}'", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for account in &self.accounts {
            if let Some(name) = &account.fixture {
                if !FIXTURE_NAMES.contains(&name.as_str()) {
                    anyhow::bail!(
                        "Unknown fixture '{}', expected one of: {}",
                        name,
                        FIXTURE_NAMES.join(", ")
                    );
                }
            }
        }
        if !self.call.init && self.call.function.is_none() {
            anyhow::bail!("call.function is required unless call.init is set");
        }
        Ok(())
    }

    /// Host seeded with the scenario's accounts and contracts.
    pub fn build_host(&self, config: VmConfig) -> anyhow::Result<VmHost> {
        let mut host = VmHost::new(config)?;
        for account in &self.accounts {
            host.set_balance(&account.address, account.balance);
            for (key, value) in &account.storage {
                let key = hex::decode(key).with_context(|| format!("Invalid storage key '{}'", key))?;
                let value =
                    hex::decode(value).with_context(|| format!("Invalid storage value '{}'", value))?;
                host.set_storage(&account.address, &key, &value);
            }
            if let Some(name) = &account.fixture {
                let contract = fixture(name)
                    .with_context(|| format!("Unknown fixture '{}'", name))?;
                host.install_contract(account.address, contract.into_arc())?;
                debug!(address = %account.address.short(), fixture = %name, "Installed fixture");
            }
        }
        Ok(host)
    }

    pub fn call_input(&self) -> anyhow::Result<CallInput> {
        let arguments = self
            .call
            .arguments
            .iter()
            .map(|argument| {
                hex::decode(argument)
                    .map(Bytes::from)
                    .with_context(|| format!("Invalid argument '{}'", argument))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let function = self.call.function.clone().unwrap_or_default();
        Ok(CallInput::new(self.call.caller, self.call.recipient, function, self.call.gas_limit)
            .with_arguments(arguments)
            .with_value(self.call.value))
    }

    /// Addresses whose balances go into the report.
    pub fn reported_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.accounts.iter().map(|a| a.address).collect();
        for address in [self.call.caller, self.call.recipient] {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        addresses
    }
}
