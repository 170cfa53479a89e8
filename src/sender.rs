use crate::codec::{decode_hex, sha256};
use crate::contract::Contract;
use crate::error::TransactionError;
use crate::gateway::{BroadcastResponse, CreatedTransaction, Gateway, TriggerSmartContractRequest};
use crate::protocol::RawData;
use crate::signer::Signer;
use alloy_primitives::hex;
use anyhow::Result;
use prost::Message;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds transactions through the gateway, checks what came back and
/// broadcasts the signed result.
pub struct TransactionSender {
    gateway: Arc<dyn Gateway>,
}

impl TransactionSender {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn create_transaction(
        &self,
        contract: &Contract,
        fee_limit: Option<i64>,
    ) -> Result<CreatedTransaction> {
        let created = match contract {
            Contract::Transfer(transfer) => {
                self.gateway
                    .create_transaction(&transfer.owner_address, &transfer.to_address, transfer.amount)
                    .await?
            }
            Contract::TriggerSmartContract(trigger) => {
                let function_selector = trigger
                    .function_selector
                    .clone()
                    .ok_or(TransactionError::NoFunctionSelector)?;
                let parameter = trigger
                    .parameter
                    .clone()
                    .ok_or(TransactionError::NoParameter)?;
                let fee_limit = fee_limit.ok_or(TransactionError::NoFeeLimit)?;

                self.gateway
                    .trigger_smart_contract(&TriggerSmartContractRequest {
                        owner_address: trigger.owner_address,
                        contract_address: trigger.contract_address,
                        function_selector,
                        parameter,
                        fee_limit,
                        call_value: trigger.call_value.unwrap_or_default(),
                        visible: true,
                    })
                    .await?
            }
            other => {
                return Err(
                    TransactionError::NotSupportedContract(other.type_name().to_string()).into(),
                );
            }
        };

        validate(&created, contract)?;
        Ok(created)
    }

    pub async fn broadcast(
        &self,
        created: &CreatedTransaction,
        signer: &dyn Signer,
    ) -> Result<BroadcastResponse> {
        let raw_data = decode_hex(&created.raw_data_hex)
            .map_err(|e| TransactionError::InvalidCreatedTransaction(e.to_string()))?;
        let signature = signer.sign(&sha256(&raw_data))?;

        let response = self
            .gateway
            .broadcast_transaction(created, &signature)
            .await?;

        if !response.result {
            let code = response.code.clone().unwrap_or_default();
            let message = response.message.clone().unwrap_or_default();
            warn!("Broadcast of {} rejected: {} {}", created.tx_id, code, message);
            return Err(TransactionError::Rejected { code, message }.into());
        }

        info!("Broadcast transaction {}", created.tx_id);
        Ok(response)
    }
}

/// The gateway must have built exactly the requested contract, and the
/// transaction id must be the hash of what will be signed.
pub fn validate(created: &CreatedTransaction, contract: &Contract) -> Result<(), TransactionError> {
    let invalid = |reason: &str| TransactionError::InvalidCreatedTransaction(reason.to_string());

    let raw_data = decode_hex(&created.raw_data_hex).map_err(|_| invalid("raw_data_hex is not hex"))?;
    let decoded = RawData::decode(raw_data.as_slice())
        .map_err(|_| invalid("raw_data is not a transaction"))?;

    let expected = contract.to_wire_message()?;
    match decoded.contract.as_slice() {
        [only] if *only == expected => {}
        [_] => return Err(invalid("contract differs from the requested one")),
        _ => return Err(invalid("expected exactly one contract")),
    }

    let tx_id = hex::encode(sha256(&raw_data));
    if !tx_id.eq_ignore_ascii_case(created.tx_id.trim_start_matches("0x")) {
        return Err(invalid("txID does not match raw_data"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::contract::TransferContract;
    use serde_json::json;

    fn address(byte: u8) -> Address {
        let mut raw = [byte; 21];
        raw[0] = 0x41;
        Address::from_bytes(&raw).unwrap()
    }

    fn transfer(amount: i64) -> Contract {
        Contract::Transfer(TransferContract {
            amount,
            owner_address: address(0xaa),
            to_address: address(0xbb),
        })
    }

    fn created_for(contract: &Contract) -> CreatedTransaction {
        let raw_data = RawData {
            ref_block_bytes: vec![0x12, 0x34],
            ref_block_hash: vec![7u8; 8],
            expiration: 1_700_000_060_000,
            contract: vec![contract.to_wire_message().unwrap()],
            timestamp: 1_700_000_000_000,
            fee_limit: 0,
        }
        .encode_to_vec();

        CreatedTransaction {
            visible: true,
            tx_id: hex::encode(sha256(&raw_data)),
            raw_data: json!({"timestamp": 1_700_000_000_000i64}),
            raw_data_hex: hex::encode(&raw_data),
        }
    }

    #[test]
    fn test_valid_created_transaction() {
        let contract = transfer(100);
        assert!(validate(&created_for(&contract), &contract).is_ok());
    }

    #[test]
    fn test_contract_mismatch_is_rejected() {
        let created = created_for(&transfer(100));
        assert!(matches!(
            validate(&created, &transfer(101)),
            Err(TransactionError::InvalidCreatedTransaction(_))
        ));
    }

    #[test]
    fn test_tx_id_mismatch_is_rejected() {
        let contract = transfer(100);
        let mut created = created_for(&contract);
        created.tx_id = "00".repeat(32);
        assert!(matches!(
            validate(&created, &contract),
            Err(TransactionError::InvalidCreatedTransaction(_))
        ));
    }
}
