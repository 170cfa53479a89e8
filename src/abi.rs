use crate::address::{Address, Network};
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use alloy_primitives::U256;
use anyhow::Result;

sol! {
    function transfer(address to, uint256 value) external returns (bool);
    function approve(address spender, uint256 value) external returns (bool);
    function allowance(address owner, address spender) external view returns (uint256);
    function name() external view returns (string);
    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiArgument {
    Address(Address),
    Uint(U256),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint,
    Bytes,
}

impl AbiArgument {
    fn to_sol_value(&self) -> DynSolValue {
        match self {
            AbiArgument::Address(address) => DynSolValue::Address(address.evm()),
            AbiArgument::Uint(value) => DynSolValue::Uint(*value, 256),
            AbiArgument::Bytes(bytes) => DynSolValue::Bytes(bytes.clone()),
        }
    }
}

impl AbiType {
    fn to_sol_type(self) -> DynSolType {
        match self {
            AbiType::Address => DynSolType::Address,
            AbiType::Uint => DynSolType::Uint(256),
            AbiType::Bytes => DynSolType::Bytes,
        }
    }
}

/// Encodes call arguments into 32 byte aligned words, without a selector.
pub fn encode_arguments(arguments: &[AbiArgument]) -> Vec<u8> {
    let values = arguments.iter().map(AbiArgument::to_sol_value).collect();
    DynSolValue::Tuple(values).abi_encode_params()
}

/// Selector of `C` followed by the encoded arguments.
pub fn encode_call<C: SolCall>(arguments: &[AbiArgument]) -> Vec<u8> {
    let mut data = C::SELECTOR.to_vec();
    data.extend(encode_arguments(arguments));
    data
}

pub fn decode_arguments(
    data: &[u8],
    types: &[AbiType],
    network: Network,
) -> Result<Vec<AbiArgument>> {
    let tuple = DynSolType::Tuple(types.iter().map(|t| t.to_sol_type()).collect());
    let decoded = tuple.abi_decode_params(data)?;

    let values = match decoded {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };

    values
        .into_iter()
        .map(|value| match value {
            DynSolValue::Address(address) => Ok(AbiArgument::Address(
                Address::from_raw_without_prefix(address.as_slice(), network)?,
            )),
            DynSolValue::Uint(value, _) => Ok(AbiArgument::Uint(value)),
            DynSolValue::Bytes(bytes) => Ok(AbiArgument::Bytes(bytes)),
            other => Err(anyhow::anyhow!("Unsupported ABI value: {:?}", other)),
        })
        .collect()
}

/// A decoded TRC-20 call recognised by the token decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trc20Method {
    Transfer { to: Address, value: U256 },
    Approve { spender: Address, value: U256 },
}

impl Trc20Method {
    pub fn decode(input: &[u8], network: Network) -> Option<Self> {
        if input.len() < 4 {
            return None;
        }

        let (selector, arguments) = input.split_at(4);
        let is_transfer = selector == transferCall::SELECTOR;
        if !is_transfer && selector != approveCall::SELECTOR {
            return None;
        }

        let decoded =
            decode_arguments(arguments, &[AbiType::Address, AbiType::Uint], network).ok()?;
        let (address, value) = match decoded.as_slice() {
            [AbiArgument::Address(address), AbiArgument::Uint(value)] => (*address, *value),
            _ => return None,
        };

        if is_transfer {
            Some(Trc20Method::Transfer { to: address, value })
        } else {
            Some(Trc20Method::Approve {
                spender: address,
                value,
            })
        }
    }
}

pub fn decode_string(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    <String as SolValue>::abi_decode(data).ok()
}

pub fn decode_uint(data: &[u8]) -> Option<U256> {
    if data.len() < 32 {
        return None;
    }
    <U256 as SolValue>::abi_decode(&data[..32]).ok()
}

/// Some tokens return `decimals` as a full word, so decode as uint256 and range check.
pub fn decode_decimals(data: &[u8]) -> Option<u8> {
    let value = decode_uint(data)?;
    if value > U256::from(u8::MAX) {
        return None;
    }
    Some(value.as_limbs()[0] as u8)
}
