use super::types::{
    AccountInfo, AccountResponse, BroadcastResponse, ChainParametersResponse,
    ContractTransactionData, CreatedTransaction, ListResponse, Page, PageQuery, TransactionData,
    TriggerSmartContractRequest, TriggerSmartContractResponse,
};
use super::Gateway;
use crate::address::{Address, Network};
use crate::error::GatewayError;
use crate::repository::ChainParameter;
use alloy_primitives::hex;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";
const ORDER_BY: &str = "block_timestamp,asc";

/// Hands out API keys round-robin, one per request.
#[derive(Debug)]
pub struct ApiKeyProvider {
    keys: Vec<String>,
    index: AtomicUsize,
}

impl ApiKeyProvider {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            index: AtomicUsize::new(0),
        }
    }

    pub fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.index.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[index])
    }
}

#[derive(Clone)]
pub struct TronGridClient {
    http: reqwest::Client,
    base_url: String,
    network: Network,
    api_keys: Arc<ApiKeyProvider>,
    rpc_id: Arc<AtomicU64>,
    max_retries: usize,
}

impl TronGridClient {
    pub fn new(network: Network, api_keys: Vec<String>) -> anyhow::Result<Self> {
        Self::with_base_url(network.base_url(), network, api_keys)
    }

    pub fn with_base_url(
        base_url: &str,
        network: Network,
        api_keys: Vec<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(TronGridClient {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            network,
            api_keys: Arc::new(ApiKeyProvider::new(api_keys)),
            rpc_id: Arc::new(AtomicU64::new(0)),
            max_retries: 5,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    /// Runs `request` under a timeout with bounded retries. A missing account is
    /// an answer, not a failure, so it is returned without retrying.
    async fn execute<T, F, Fut>(&self, operation: &str, request: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let request = &request;
        Retry::spawn(self.get_retry_strategy(), move || async move {
            match timeout(REQUEST_TIMEOUT, request()).await {
                Ok(Ok(value)) => Ok(Ok(value)),
                // hack since we don't want to retry on this specific error
                Ok(Err(GatewayError::NoAccountInfo)) => Ok(Err(GatewayError::NoAccountInfo)),
                Ok(Err(e)) => {
                    warn!("TronGrid error on {}: {}, retrying", operation, e);
                    Err(e)
                }
                Err(_) => {
                    warn!(
                        "Request timeout after {} seconds on {}",
                        REQUEST_TIMEOUT.as_secs(),
                        operation
                    );
                    Err(GatewayError::Timeout(REQUEST_TIMEOUT.as_secs()))
                }
            }
        })
        .await
        .and_then(|r| r)
    }

    fn with_api_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_keys.next_key() {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .with_api_key(self.http.get(&url).query(query))
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .with_api_key(self.http.post(&url).json(body))
            .send()
            .await?
            .error_for_status()?;

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.rpc_id.fetch_add(1, Ordering::Relaxed) + 1,
            "method": method,
            "params": params,
        });

        let response: Value = self.post_json("jsonrpc", &body).await?;
        if let Some(error) = response.get("error") {
            return Err(GatewayError::UnexpectedResponse(format!(
                "{} failed: {}",
                method, error
            )));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| GatewayError::UnexpectedResponse(format!("{} returned no result", method)))
    }

    fn page_params(query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("min_timestamp", query.min_timestamp.to_string()),
            ("limit", query.limit.to_string()),
            ("order_by", ORDER_BY.to_string()),
            ("only_confirmed", query.only_confirmed.to_string()),
        ];
        if let Some(fingerprint) = &query.fingerprint {
            params.push(("fingerprint", fingerprint.clone()));
        }
        params
    }

    fn evm_hex(address: &Address) -> String {
        format!("0x{}", hex::encode(address.raw_without_prefix()))
    }
}

fn parse_hex_quantity(value: &Value) -> Result<u64, GatewayError> {
    let text = value
        .as_str()
        .ok_or_else(|| GatewayError::UnexpectedResponse(format!("expected hex quantity, got {}", value)))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))
}

/// Broadcast errors come back hex encoded.
fn decode_message(message: Option<String>) -> Option<String> {
    message.map(|m| {
        hex::decode(&m)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or(m)
    })
}

#[async_trait]
impl Gateway for TronGridClient {
    async fn get_block_height(&self) -> Result<u64, GatewayError> {
        self.execute("eth_blockNumber", move || async move {
            let result = self.rpc("eth_blockNumber", json!([])).await?;
            parse_hex_quantity(&result)
        })
        .await
    }

    async fn get_account_info(&self, address: &Address) -> Result<AccountInfo, GatewayError> {
        let path = format!("v1/accounts/{}", address.base58());
        let path = path.as_str();
        self.execute("account info", move || async move {
            let response: AccountResponse = self.get_json(path, &[]).await?;
            response
                .data
                .into_iter()
                .next()
                .map(AccountInfo::from)
                .ok_or(GatewayError::NoAccountInfo)
        })
        .await
    }

    async fn get_transactions(
        &self,
        address: &Address,
        query: &PageQuery,
    ) -> Result<Page<TransactionData>, GatewayError> {
        let path = format!("v1/accounts/{}/transactions", address.base58());
        let params = Self::page_params(query);
        let (path, params) = (path.as_str(), params.as_slice());

        let response: ListResponse<Value> = self
            .execute("transactions", move || self.get_json(path, params))
            .await?;
        if !response.success {
            return Err(GatewayError::UnexpectedResponse(
                "transactions response with success = false".to_string(),
            ));
        }

        let data = response
            .data
            .into_iter()
            .filter_map(|record| match TransactionData::from_json(record) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Skipping malformed transaction record: {}", e);
                    None
                }
            })
            .collect();

        Ok(Page {
            data,
            fingerprint: response.meta.and_then(|meta| meta.fingerprint),
        })
    }

    async fn get_contract_transactions(
        &self,
        address: &Address,
        query: &PageQuery,
    ) -> Result<Page<ContractTransactionData>, GatewayError> {
        let path = format!("v1/accounts/{}/transactions/trc20", address.base58());
        let params = Self::page_params(query);
        let (path, params) = (path.as_str(), params.as_slice());

        let response: ListResponse<Value> = self
            .execute("trc20 transactions", move || self.get_json(path, params))
            .await?;
        if !response.success {
            return Err(GatewayError::UnexpectedResponse(
                "trc20 transactions response with success = false".to_string(),
            ));
        }

        let data = response
            .data
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Skipping malformed trc20 record: {}", e);
                    None
                }
            })
            .collect();

        Ok(Page {
            data,
            fingerprint: response.meta.and_then(|meta| meta.fingerprint),
        })
    }

    async fn estimate_energy(
        &self,
        owner: &Address,
        contract: &Address,
        call_value: i64,
        data: &[u8],
    ) -> Result<u64, GatewayError> {
        let params = json!([{
            "from": Self::evm_hex(owner),
            "to": Self::evm_hex(contract),
            "value": format!("0x{:x}", call_value),
            "data": format!("0x{}", hex::encode(data)),
        }]);

        let params = &params;
        self.execute("eth_estimateGas", move || async move {
            let result = self.rpc("eth_estimateGas", params.clone()).await?;
            parse_hex_quantity(&result)
        })
        .await
    }

    async fn call_read_only(
        &self,
        contract: &Address,
        data: &[u8],
    ) -> Result<Vec<u8>, GatewayError> {
        let params = json!([{
            "to": Self::evm_hex(contract),
            "data": format!("0x{}", hex::encode(data)),
        }, "latest"]);

        let params = &params;
        self.execute("eth_call", move || async move {
            let result = self.rpc("eth_call", params.clone()).await?;
            let text = result.as_str().unwrap_or_default();
            hex::decode(text.trim_start_matches("0x"))
                .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))
        })
        .await
    }

    async fn create_transaction(
        &self,
        from: &Address,
        to: &Address,
        amount: i64,
    ) -> Result<CreatedTransaction, GatewayError> {
        let body = json!({
            "owner_address": from.base58(),
            "to_address": to.base58(),
            "amount": amount,
            "visible": true,
        });

        let body = &body;
        self.execute("createtransaction", move || {
            self.post_json("wallet/createtransaction", body)
        })
        .await
    }

    async fn trigger_smart_contract(
        &self,
        request: &TriggerSmartContractRequest,
    ) -> Result<CreatedTransaction, GatewayError> {
        let response: TriggerSmartContractResponse = self
            .execute("triggersmartcontract", move || {
                self.post_json("wallet/triggersmartcontract", request)
            })
            .await?;

        if !response.result.result {
            return Err(GatewayError::UnexpectedResponse(format!(
                "triggersmartcontract rejected: {}",
                decode_message(response.result.message).unwrap_or_default()
            )));
        }

        response.transaction.ok_or_else(|| {
            GatewayError::UnexpectedResponse("triggersmartcontract returned no transaction".into())
        })
    }

    async fn broadcast_transaction(
        &self,
        transaction: &CreatedTransaction,
        signature: &[u8],
    ) -> Result<BroadcastResponse, GatewayError> {
        let body = json!({
            "visible": transaction.visible,
            "txID": transaction.tx_id,
            "raw_data": transaction.raw_data,
            "raw_data_hex": transaction.raw_data_hex,
            "signature": [hex::encode(signature)],
        });

        let body = &body;
        // Broadcasting twice is harmless: the node rejects duplicates by txID.
        let mut response: BroadcastResponse = self
            .execute("broadcasttransaction", move || {
                self.post_json("wallet/broadcasttransaction", body)
            })
            .await?;
        response.message = decode_message(response.message);
        Ok(response)
    }

    async fn get_chain_parameters(&self) -> Result<Vec<ChainParameter>, GatewayError> {
        let response: ChainParametersResponse = self
            .execute("getchainparameters", move || {
                self.get_json("wallet/getchainparameters", &[])
            })
            .await?;

        Ok(response
            .chain_parameter
            .into_iter()
            .map(|entry| ChainParameter {
                key: entry.key,
                value: entry.value,
            })
            .collect())
    }
}
