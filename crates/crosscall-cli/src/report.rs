//! JSON report of a finished call.

use crosscall_types::{Address, U256};
use crosscall_vm::{AsyncCallRecord, AsyncOutcome, OutputTransfer, VmHost, VmOutput};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Report {
    pub return_code: i32,
    pub return_status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub return_message: String,
    pub return_data: Vec<DataChunk>,
    pub gas_used: u64,
    pub gas_remaining: u64,
    pub gas_refund: u64,
    pub transfers: Vec<TransferReport>,
    pub async_calls: Vec<AsyncCallReport>,
    pub balances: Vec<BalanceReport>,
}

/// One output chunk, with its text form when it is printable.
#[derive(Debug, Serialize)]
pub struct DataChunk {
    pub hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl DataChunk {
    fn new(bytes: &[u8]) -> Self {
        let text = std::str::from_utf8(bytes)
            .ok()
            .filter(|s| !s.is_empty() && s.chars().all(|c| !c.is_control()))
            .map(str::to_string);
        Self {
            hex: hex::encode(bytes),
            text,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferReport {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: DataChunk,
}

impl From<&OutputTransfer> for TransferReport {
    fn from(transfer: &OutputTransfer) -> Self {
        Self {
            from: transfer.from,
            to: transfer.to,
            value: transfer.value,
            data: DataChunk::new(&transfer.data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AsyncCallReport {
    pub destination: Address,
    pub function: String,
    pub value: U256,
    pub state: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub gas_allotted: u64,
    pub callback_gas: u64,
}

impl From<&AsyncCallRecord> for AsyncCallReport {
    fn from(record: &AsyncCallRecord) -> Self {
        let (outcome, error) = match record.outcome() {
            AsyncOutcome::Pending => ("pending".to_string(), None),
            AsyncOutcome::Success(_) => ("success".to_string(), None),
            AsyncOutcome::Error { code, message } => (code.to_string(), Some(message.clone())),
        };
        Self {
            destination: record.destination,
            function: record.function.clone(),
            value: record.value,
            state: format!("{:?}", record.state()),
            outcome,
            error,
            gas_allotted: record.gas_allotted,
            callback_gas: record.callback_gas,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceReport {
    pub address: Address,
    pub name: String,
    pub balance: U256,
}

impl Report {
    pub fn new(output: &VmOutput, host: &VmHost, addresses: &[Address]) -> Self {
        Self {
            return_code: output.return_code.as_i32(),
            return_status: output.return_code.to_string(),
            return_message: output.return_message.clone(),
            return_data: output.return_data.iter().map(|c| DataChunk::new(c)).collect(),
            gas_used: output.gas_used,
            gas_remaining: output.gas_remaining,
            gas_refund: output.gas_refund,
            transfers: output.transfers.iter().map(TransferReport::from).collect(),
            async_calls: output.async_calls.iter().map(AsyncCallReport::from).collect(),
            balances: addresses
                .iter()
                .map(|address| BalanceReport {
                    address: *address,
                    name: address.short(),
                    balance: host.balance(address),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
