//! Constructor fixture.

use crosscall_vm::{HostContext, HostResult, NativeContract, INIT_FUNCTION_NAME};

pub fn contract() -> NativeContract {
    NativeContract::new("init-correct").with_function(INIT_FUNCTION_NAME, init)
}

/// Argument 0 picks the behavior: 0 succeeds, 1 signals an error, 2 loops
/// until the gas runs out.
fn init(host: &mut HostContext<'_>) -> HostResult<()> {
    match host.int64_get_argument(0)? {
        0 => host.finish(b"init successful"),
        1 => host.signal_error(b"don't do this"),
        2 => loop {
            host.finish(b"loop")?;
        },
        _ => Ok(()),
    }
}
