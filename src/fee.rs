use crate::address::Address;
use crate::chain_parameters::ChainParameterManager;
use crate::contract::Contract;
use crate::error::{GatewayError, TransactionError};
use crate::gateway::Gateway;
use crate::protocol::{RawData, Transaction};
use anyhow::Result;
use prost::Message;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Space the node reserves for the execution result of a transaction.
const MAX_RESULT_SIZE_IN_TX: i64 = 64;
const SIGNATURE_SIZE: usize = 65;

/// One component of the cost of a transaction, in sun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Fee {
    Bandwidth { points: i64, price: i64 },
    Energy { required: i64, price: i64 },
    AccountActivation { amount: i64 },
}

impl Fee {
    pub fn fee_in_sun(&self) -> i64 {
        match self {
            Fee::Bandwidth { points, price } => points.saturating_mul(*price),
            Fee::Energy { required, price } => required.saturating_mul(*price),
            Fee::AccountActivation { amount } => *amount,
        }
    }
}

pub fn total_fee(fees: &[Fee]) -> i64 {
    fees.iter().map(Fee::fee_in_sun).sum()
}

pub struct FeeProvider {
    gateway: Arc<dyn Gateway>,
    chain_parameters: Arc<ChainParameterManager>,
}

impl FeeProvider {
    pub fn new(gateway: Arc<dyn Gateway>, chain_parameters: Arc<ChainParameterManager>) -> Self {
        Self {
            gateway,
            chain_parameters,
        }
    }

    pub async fn is_account_active(&self, address: &Address) -> Result<bool, GatewayError> {
        match self.gateway.get_account_info(address).await {
            Ok(_) => Ok(true),
            Err(GatewayError::NoAccountInfo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn estimate_fee(&self, contract: &Contract) -> Result<Vec<Fee>> {
        let mut fees = Vec::new();
        let mut fee_limit = 0;

        match contract {
            Contract::Transfer(c) => {
                if !self.is_account_active(&c.to_address).await? {
                    return Ok(self.account_activation_fees());
                }
            }
            Contract::TransferAsset(c) => {
                if !self.is_account_active(&c.to_address).await? {
                    return Ok(self.account_activation_fees());
                }
            }
            Contract::TriggerSmartContract(c) => {
                let required = self
                    .gateway
                    .estimate_energy(
                        &c.owner_address,
                        &c.contract_address,
                        c.call_value.unwrap_or_default(),
                        &c.data,
                    )
                    .await?;

                let energy = Fee::Energy {
                    required: i64::try_from(required).unwrap_or(i64::MAX),
                    price: self.chain_parameters.energy_fee(),
                };
                fee_limit = energy.fee_in_sun();
                fees.push(energy);
            }
            other => {
                return Err(
                    TransactionError::NotSupportedContract(other.type_name().to_string()).into(),
                );
            }
        }

        let points = simulated_transaction_size(contract, fee_limit, now_millis())? as i64
            + MAX_RESULT_SIZE_IN_TX;
        debug!("Estimated {} bandwidth points for {}", points, contract.type_name());

        fees.push(Fee::Bandwidth {
            points,
            price: self.chain_parameters.transaction_fee(),
        });

        Ok(fees)
    }

    fn account_activation_fees(&self) -> Vec<Fee> {
        vec![
            Fee::Bandwidth {
                points: self.chain_parameters.create_account_fee(),
                price: self.chain_parameters.transaction_fee(),
            },
            Fee::AccountActivation {
                amount: self.chain_parameters.create_new_account_fee_in_system_contract(),
            },
        ]
    }
}

/// Serialized size of a signed transaction carrying `contract`, with zeroed
/// block reference and signature.
pub fn simulated_transaction_size(
    contract: &Contract,
    fee_limit: i64,
    timestamp: i64,
) -> Result<usize, TransactionError> {
    let transaction = Transaction {
        raw_data: Some(RawData {
            ref_block_bytes: vec![0u8; 2],
            ref_block_hash: vec![0u8; 8],
            expiration: timestamp,
            contract: vec![contract.to_simulation_message()?],
            timestamp,
            fee_limit,
        }),
        signature: vec![vec![0u8; SIGNATURE_SIZE]],
    };

    Ok(transaction.encoded_len())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
