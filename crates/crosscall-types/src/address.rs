use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 32-byte opaque account/contract identifier.
/// Display format: Bech32m with "xcall" human-readable prefix.
///
/// Derivation of addresses for newly deployed contracts is not the concern
/// of this crate; addresses are supplied by whoever installs the account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const LEN: usize = 32;

    /// Bech32m human-readable prefix
    pub const BECH32_HRP: &'static str = "xcall";

    /// Byte used to right-pad short names in [`Address::from_padded_name`].
    pub const NAME_PADDING: u8 = b'.';

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Build a human-readable address such as `childSC.........................`:
    /// the name's bytes right-padded with `.` to 32 bytes.
    pub fn from_padded_name(name: &str) -> Result<Self, TypesError> {
        let raw = name.as_bytes();
        if raw.is_empty() || raw.len() > Self::LEN {
            return Err(TypesError::InvalidAddressLength(raw.len()));
        }
        let mut bytes = [Self::NAME_PADDING; 32];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for log lines: printable names are shown without their
    /// padding, anything else as a truncated hex string.
    pub fn short(&self) -> String {
        let trimmed: &[u8] = {
            let end = self
                .0
                .iter()
                .rposition(|&b| b != Self::NAME_PADDING)
                .map_or(0, |i| i + 1);
            &self.0[..end]
        };
        if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic()) {
            String::from_utf8_lossy(trimmed).into_owned()
        } else {
            format!("0x{}…", hex::encode(&self.0[..6]))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
        match bech32::encode::<bech32::Bech32m>(hrp, &self.0) {
            Ok(encoded) => write!(f, "{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Bech32m ("xcall1..."), hex ("0x...") or a padded fixture name
        if s.starts_with("xcall1") {
            let (hrp, data) = bech32::decode(s).map_err(|e| {
                TypesError::Bech32Error(e.to_string())
            })?;

            let expected_hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
            if hrp != expected_hrp {
                return Err(TypesError::InvalidAddressFormat(format!(
                    "Invalid HRP: expected '{}', got '{}'",
                    Self::BECH32_HRP,
                    hrp
                )));
            }

            Self::from_slice(&data)
        } else if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let bytes = hex::decode(stripped)?;
            Self::from_slice(&bytes)
        } else if !s.is_empty() && s.len() <= Self::LEN && s.bytes().all(|b| b.is_ascii_graphic()) {
            Self::from_padded_name(s)
        } else {
            Err(TypesError::InvalidAddressFormat(s.to_string()))
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
