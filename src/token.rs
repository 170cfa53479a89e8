use crate::abi::{
    self, AbiArgument, allowanceCall, approveCall, decimalsCall, nameCall, symbolCall,
    transferCall,
};
use crate::address::Address;
use crate::contract::{Contract, TriggerSmartContract};
use crate::decoration::TokenInfo;
use crate::error::TokenError;
use crate::gateway::Gateway;
use alloy::sol_types::SolCall;
use alloy_primitives::{U256, hex};
use std::sync::Arc;

/// Builds a trigger call whose `data` and gateway-facing selector/parameter agree.
fn trigger_smart_contract<C: SolCall>(
    owner: Address,
    contract: Address,
    arguments: &[AbiArgument],
) -> Contract {
    let parameter = abi::encode_arguments(arguments);
    let mut data = C::SELECTOR.to_vec();
    data.extend_from_slice(&parameter);

    Contract::TriggerSmartContract(TriggerSmartContract {
        data,
        owner_address: owner,
        contract_address: contract,
        call_value: None,
        call_token_value: None,
        token_id: None,
        function_selector: Some(C::SIGNATURE.to_string()),
        parameter: Some(hex::encode(parameter)),
    })
}

pub fn transfer_trc20_trigger_smart_contract(
    owner: Address,
    token: Address,
    to: Address,
    amount: U256,
) -> Contract {
    trigger_smart_contract::<transferCall>(
        owner,
        token,
        &[AbiArgument::Address(to), AbiArgument::Uint(amount)],
    )
}

/// Reads TRC-20 metadata through read-only calls.
pub struct Trc20Provider {
    gateway: Arc<dyn Gateway>,
}

impl Trc20Provider {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    async fn call<C: SolCall>(&self, token: &Address) -> Result<Vec<u8>, TokenError> {
        let data = abi::encode_call::<C>(&[]);
        Ok(self.gateway.call_read_only(token, &data).await?)
    }

    pub async fn name(&self, token: &Address) -> Result<String, TokenError> {
        let response = self.call::<nameCall>(token).await?;
        abi::decode_string(&response).ok_or(TokenError::TokenNotFound)
    }

    pub async fn symbol(&self, token: &Address) -> Result<String, TokenError> {
        let response = self.call::<symbolCall>(token).await?;
        abi::decode_string(&response).ok_or(TokenError::TokenNotFound)
    }

    pub async fn decimals(&self, token: &Address) -> Result<u8, TokenError> {
        let response = self.call::<decimalsCall>(token).await?;
        abi::decode_decimals(&response).ok_or(TokenError::TokenNotFound)
    }

    pub async fn token_info(&self, token: &Address) -> Result<TokenInfo, TokenError> {
        let (token_name, token_symbol, token_decimals) =
            futures::try_join!(self.name(token), self.symbol(token), self.decimals(token))?;

        Ok(TokenInfo {
            token_name,
            token_symbol,
            token_decimals,
        })
    }
}

pub struct AllowanceManager {
    gateway: Arc<dyn Gateway>,
    user_address: Address,
}

impl AllowanceManager {
    pub fn new(gateway: Arc<dyn Gateway>, user_address: Address) -> Self {
        Self {
            gateway,
            user_address,
        }
    }

    pub async fn allowance(&self, token: &Address, spender: &Address) -> Result<U256, TokenError> {
        let data = abi::encode_call::<allowanceCall>(&[
            AbiArgument::Address(self.user_address),
            AbiArgument::Address(*spender),
        ]);
        let response = self.gateway.call_read_only(token, &data).await?;
        abi::decode_uint(&response).ok_or(TokenError::TokenNotFound)
    }

    pub fn approve_trc20_trigger_smart_contract(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Contract {
        trigger_smart_contract::<approveCall>(
            self.user_address,
            token,
            &[AbiArgument::Address(spender), AbiArgument::Uint(amount)],
        )
    }
}
