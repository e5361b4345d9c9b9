//! Call data codec.
//!
//! Async calls carry their target as `function@hex@hex…`; synchronous
//! calls may receive their arguments as a lengths array plus one
//! concatenated blob. Integers travel as minimal two's-complement
//! big-endian bytes, zero being the empty string.

use bytes::Bytes;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::error::VmError;

pub const ARGUMENT_SEPARATOR: u8 = b'@';

/// Split `function@hex@hex` into the function name and decoded arguments.
pub fn parse(data: &[u8]) -> Result<(String, Vec<Bytes>), VmError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| VmError::InvalidCallData("call data is not valid UTF-8".to_string()))?;
    let mut parts = text.split(ARGUMENT_SEPARATOR as char);

    let function = parts.next().unwrap_or_default();
    if function.is_empty() {
        return Err(VmError::InvalidCallData("missing function name".to_string()));
    }

    let arguments = parts
        .enumerate()
        .map(|(i, part)| {
            hex::decode(part)
                .map(Bytes::from)
                .map_err(|e| VmError::InvalidCallData(format!("argument {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((function.to_string(), arguments))
}

/// Build `function@hex@hex` call data.
pub fn build<A: AsRef<[u8]>>(function: &str, arguments: &[A]) -> Vec<u8> {
    let mut data = function.as_bytes().to_vec();
    for argument in arguments {
        data.push(ARGUMENT_SEPARATOR);
        data.extend_from_slice(hex::encode(argument.as_ref()).as_bytes());
    }
    data
}

/// Cut `blob` into consecutive arguments of the given lengths.
pub fn split_arguments(lengths: &[usize], blob: &[u8]) -> Result<Vec<Bytes>, VmError> {
    let total: usize = lengths.iter().sum();
    if total > blob.len() {
        return Err(VmError::InvalidCallData(format!(
            "argument lengths add up to {} but only {} bytes given",
            total,
            blob.len()
        )));
    }

    let blob = Bytes::copy_from_slice(blob);
    let mut offset = 0;
    Ok(lengths
        .iter()
        .map(|&len| {
            let argument = blob.slice(offset..offset + len);
            offset += len;
            argument
        })
        .collect())
}

/// Minimal two's-complement encoding, zero encodes as empty.
pub fn encode_i64(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    BigInt::from(value).to_signed_bytes_be()
}

/// Decode a two's-complement integer, `None` when it does not fit in i64.
pub fn decode_i64(bytes: &[u8]) -> Option<i64> {
    decode_bigint(bytes).to_i64()
}

/// Decode a two's-complement integer of any size.
pub fn decode_bigint(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_be(bytes)
}
