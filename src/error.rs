use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid address prefix: expected {expected:#04x}, got {actual:#04x}")]
    InvalidPrefix { expected: u8, actual: u8 },

    #[error("invalid address checksum")]
    InvalidChecksum,

    #[error("invalid address encoding: {0}")]
    InvalidEncoding(String),
}

/// Why the wallet is not synced. Kept as a plain value so it can live inside
/// `SyncState` and be compared before publishing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("sync not started")]
    NotStarted,

    #[error("no network connection")]
    NoNetworkConnection,

    #[error("sync failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no account info")]
    NoAccountInfo,

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        GatewayError::RequestFailed(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("contract {0} is not supported")]
    NotSupportedContract(String),

    #[error("contract {0} cannot be serialized for submission")]
    UnsupportedContractForSubmission(String),

    #[error("created transaction does not match the requested contract: {0}")]
    InvalidCreatedTransaction(String),

    #[error("trigger smart contract has no function selector")]
    NoFunctionSelector,

    #[error("trigger smart contract has no parameter")]
    NoParameter,

    #[error("trigger smart contract requires a fee limit")]
    NoFeeLimit,

    #[error("broadcast rejected: {code} {message}")]
    Rejected { code: String, message: String },
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token not found")]
    TokenNotFound,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
