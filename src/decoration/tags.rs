use crate::address::Address;

pub const INCOMING: &str = "incoming";
pub const OUTGOING: &str = "outgoing";
pub const TRX_INCOMING: &str = "TRX_incoming";
pub const TRX_OUTGOING: &str = "TRX_outgoing";
pub const TRC20_TRANSFER: &str = "trc20Transfer";
pub const TRC20_APPROVE: &str = "trc20Approve";

pub fn trc20_incoming(contract: &Address) -> String {
    format!("trc20Incoming:{}", contract.base58())
}

pub fn trc20_outgoing(contract: &Address) -> String {
    format!("trc20Outgoing:{}", contract.base58())
}

pub fn trc10_incoming(asset: &str) -> String {
    format!("trc10Incoming:{asset}")
}

pub fn trc10_outgoing(asset: &str) -> String {
    format!("trc10Outgoing:{asset}")
}

/// Drops repeated tags, keeping first-seen order.
pub fn dedup(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}
