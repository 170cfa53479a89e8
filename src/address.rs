use crate::error::AddressError;
use alloy_primitives::hex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_SIZE: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Mainnet,
    ShastaTestnet,
    NileTestnet,
}

impl Network {
    pub fn address_prefix(&self) -> u8 {
        0x41
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.trongrid.io",
            Network::ShastaTestnet => "https://api.shasta.trongrid.io",
            Network::NileTestnet => "https://nile.trongrid.io",
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "shasta" => Ok(Network::ShastaTestnet),
            "nile" => Ok(Network::NileTestnet),
            other => Err(anyhow::anyhow!("Unknown network: {}", other)),
        }
    }
}

/// Network-prefixed 21 byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, AddressError> {
        Self::from_bytes_for(raw, Network::default())
    }

    pub fn from_bytes_for(raw: &[u8], network: Network) -> Result<Self, AddressError> {
        if raw.len() != ADDRESS_SIZE {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_SIZE,
                actual: raw.len(),
            });
        }

        let prefix = network.address_prefix();
        if raw[0] != prefix {
            return Err(AddressError::InvalidPrefix {
                expected: prefix,
                actual: raw[0],
            });
        }

        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Address(bytes))
    }

    /// Builds an address from the 20 byte account hash used inside ABI payloads.
    pub fn from_raw_without_prefix(raw: &[u8], network: Network) -> Result<Self, AddressError> {
        let mut bytes = Vec::with_capacity(ADDRESS_SIZE);
        bytes.push(network.address_prefix());
        bytes.extend_from_slice(raw);
        Self::from_bytes_for(&bytes, network)
    }

    pub fn from_hex(value: &str) -> Result<Self, AddressError> {
        let raw = hex::decode(value).map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&raw)
    }

    pub fn from_base58(value: &str) -> Result<Self, AddressError> {
        let raw = bs58::decode(value)
            .with_check(None)
            .into_vec()
            .map_err(|e| match e {
                bs58::decode::Error::InvalidChecksum { .. } => AddressError::InvalidChecksum,
                bs58::decode::Error::NoChecksum => AddressError::InvalidChecksum,
                other => AddressError::InvalidEncoding(other.to_string()),
            })?;
        Self::from_bytes(&raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn raw_without_prefix(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn base58(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The 20 byte form understood by the gateway's JSON-RPC endpoints.
    pub fn evm(&self) -> alloy_primitives::Address {
        alloy_primitives::Address::from_slice(self.raw_without_prefix())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Accepts base58check or 42 character hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == ADDRESS_SIZE * 2 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Address::from_hex(s)
        } else {
            Address::from_base58(s)
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Address::from_str(&value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

    #[test]
    fn test_base58_roundtrip() {
        let address = Address::from_base58(USDT).unwrap();
        assert_eq!(address.hex(), USDT_HEX);
        assert_eq!(address.base58(), USDT);
        assert_eq!(Address::from_hex(USDT_HEX).unwrap(), address);
    }

    #[test]
    fn test_encode_decode_arbitrary_payload() {
        for seed in 0u8..16 {
            let mut raw = [seed; ADDRESS_SIZE];
            raw[0] = 0x41;
            let address = Address::from_bytes(&raw).unwrap();
            assert_eq!(Address::from_base58(&address.base58()).unwrap(), address);
        }
    }

    #[test]
    fn test_checksum_flip_is_rejected() {
        let address = Address::from_base58(USDT).unwrap();
        let mut payload = address.as_bytes().to_vec();
        let checksum = bs58::decode(USDT).into_vec().unwrap()[ADDRESS_SIZE..].to_vec();

        for i in 0..checksum.len() {
            let mut flipped = checksum.clone();
            flipped[i] ^= 0x01;
            let mut encoded = payload.clone();
            encoded.extend_from_slice(&flipped);
            let text = bs58::encode(encoded).into_string();
            assert_eq!(
                Address::from_base58(&text),
                Err(AddressError::InvalidChecksum)
            );
        }

        payload.push(0);
        assert!(Address::from_bytes(&payload).is_err());
    }

    #[test]
    fn test_invalid_length_and_prefix() {
        assert_eq!(
            Address::from_bytes(&[0x41; 20]),
            Err(AddressError::InvalidLength {
                expected: 21,
                actual: 20
            })
        );

        let mut raw = [0u8; ADDRESS_SIZE];
        raw[0] = 0xa0;
        assert_eq!(
            Address::from_bytes(&raw),
            Err(AddressError::InvalidPrefix {
                expected: 0x41,
                actual: 0xa0
            })
        );
    }

    #[test]
    fn test_from_str_accepts_both_encodings() {
        let a: Address = USDT.parse().unwrap();
        let b: Address = USDT_HEX.parse().unwrap();
        assert_eq!(a, b);
    }
}
