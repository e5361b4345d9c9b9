#![allow(dead_code)]

use crosscall_fixtures::fixture;
use crosscall_types::{Address, U256};
use crosscall_vm::VmHost;

pub const STARTING_BALANCE: u64 = 1_000;

/// Host with the named fixtures installed and funded.
pub fn host_with(installs: &[(Address, &str)]) -> VmHost {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut host = VmHost::default();
    for (address, name) in installs {
        let contract = fixture(name).unwrap_or_else(|| panic!("unknown fixture {name}"));
        host.install_contract(*address, contract.into_arc()).unwrap();
        host.set_balance(address, U256::from(STARTING_BALANCE));
    }
    host
}

pub fn balance(host: &VmHost, address: &Address) -> u64 {
    u64::try_from(host.balance(address)).unwrap()
}
