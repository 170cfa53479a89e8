use crate::address::Address;
use crate::contract::Contract;
use crate::decoration::{Decoration, FullTransaction};
use crate::repository::{Balance, ChainParameter, NATIVE_BALANCE_ID};
use alloy_primitives::U256;
use alloy_primitives::utils::format_units;
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

const TRX_DECIMALS: u8 = 6;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

/// Symbol and decimals of a token, as seen in its stored events.
#[derive(Debug, Clone)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub last_block_height: Option<u64>,
    pub native_cursor: Option<i64>,
    pub contract_cursor: Option<i64>,
    pub transactions: usize,
    pub chain_parameters: Vec<ChainParameter>,
}

/// One-line summary of a decoration: kind and human readable detail.
fn describe(decoration: &Decoration) -> (String, String) {
    match decoration {
        Decoration::Native(native) => {
            let detail = match &native.contract {
                Contract::Transfer(c) => format!(
                    "{} TRX {} -> {}",
                    format_sun(c.amount),
                    c.owner_address,
                    c.to_address
                ),
                Contract::TransferAsset(c) => format!(
                    "{} {} {} -> {}",
                    c.amount, c.asset_name, c.owner_address, c.to_address
                ),
                Contract::WithdrawBalance(c) => match c.amount {
                    Some(amount) => format!("withdraw {} TRX", format_sun(amount)),
                    None => "withdraw".to_string(),
                },
                Contract::FreezeBalanceV2(c) => {
                    format!("freeze {} TRX for {}", format_sun(c.frozen_balance), c.resource)
                }
                Contract::UnfreezeBalanceV2(c) => {
                    format!("unfreeze {} TRX for {}", format_sun(c.unfreeze_balance), c.resource)
                }
                Contract::VoteWitness(c) => format!("{} votes", c.total_votes()),
                Contract::AssetIssue(c) => format!("issue {} ({})", c.name, c.abbreviation),
                _ => String::new(),
            };
            (native.contract.type_name().to_string(), detail)
        }
        Decoration::OutgoingTrc20(d) => {
            let amount = match &d.token_info {
                Some(info) => format!(
                    "{} {}",
                    format_token(d.value, info.token_decimals),
                    info.token_symbol
                ),
                None => d.value.to_string(),
            };
            let detail = if d.sent_to_self {
                format!("{} to self", amount)
            } else {
                format!("{} to {}", amount, d.to)
            };
            ("OutgoingTrc20".to_string(), detail)
        }
        Decoration::ApproveTrc20(d) => (
            "ApproveTrc20".to_string(),
            format!("{} for {} on {}", d.value, d.spender, d.contract_address),
        ),
        Decoration::Unknown(d) => (
            "Unknown".to_string(),
            format!(
                "{} internal, {} events",
                d.internal_transactions.len(),
                d.events.len()
            ),
        ),
    }
}

pub fn format_transactions(
    transactions: &[FullTransaction],
    user_address: &Address,
    format: &OutputFormat,
) -> String {
    match format {
        OutputFormat::Table => format_transactions_table(transactions, user_address),
        OutputFormat::Json => format_transactions_json(transactions, user_address),
        OutputFormat::Csv => format_transactions_csv(transactions, user_address),
    }
}

fn format_transactions_table(transactions: &[FullTransaction], user_address: &Address) -> String {
    if transactions.is_empty() {
        return "No transactions found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Timestamp", "Block", "Tx Hash", "Kind", "Detail", "Tags", "Status",
        ]);

    for tx in transactions {
        let (kind, detail) = describe(&tx.decoration);
        table.add_row(vec![
            Cell::new(tx.transaction.timestamp),
            Cell::new(
                tx.transaction
                    .block_number
                    .map_or("-".to_string(), |b| b.to_string()),
            ),
            Cell::new(format_tx_hash(&format!("{:?}", tx.transaction.hash))),
            Cell::new(kind),
            Cell::new(detail),
            Cell::new(tx.decoration.tags(user_address).join(", ")),
            Cell::new(status(tx)),
        ]);
    }

    table.to_string()
}

fn format_transactions_json(transactions: &[FullTransaction], user_address: &Address) -> String {
    let json_transactions: Vec<_> = transactions
        .iter()
        .map(|tx| {
            json!({
                "hash": format!("{:?}", tx.transaction.hash),
                "timestamp": tx.transaction.timestamp,
                "block_number": tx.transaction.block_number,
                "fee": tx.transaction.fee,
                "status": status(tx),
                "tags": tx.decoration.tags(user_address),
                "decoration": tx.decoration,
            })
        })
        .collect();

    serde_json::to_string_pretty(&json_transactions).unwrap_or_else(|_| "[]".to_string())
}

fn format_transactions_csv(transactions: &[FullTransaction], user_address: &Address) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record([
        "timestamp",
        "block_number",
        "hash",
        "kind",
        "detail",
        "tags",
        "fee",
        "status",
    ]);

    for tx in transactions {
        let (kind, detail) = describe(&tx.decoration);
        let _ = wtr.write_record([
            &tx.transaction.timestamp.to_string(),
            &tx.transaction
                .block_number
                .map_or(String::new(), |b| b.to_string()),
            &format!("{:?}", tx.transaction.hash),
            &kind,
            &detail,
            &tx.decoration.tags(user_address).join(";"),
            &tx.transaction.fee.map_or(String::new(), |f| f.to_string()),
            &status(tx).to_string(),
        ]);
    }

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_balances(
    balances: &[Balance],
    tokens: &HashMap<String, TokenMeta>,
    format: &OutputFormat,
) -> String {
    let rows: Vec<(String, String, String, String)> = balances
        .iter()
        .map(|balance| {
            let (asset, symbol, decimals) = if balance.id == NATIVE_BALANCE_ID {
                (
                    NATIVE_BALANCE_ID.to_string(),
                    "TRX".to_string(),
                    Some(TRX_DECIMALS),
                )
            } else {
                let contract = balance
                    .id
                    .strip_prefix("TRC20|")
                    .unwrap_or(&balance.id)
                    .to_string();
                let meta = tokens.get(&contract);
                (
                    contract,
                    meta.map_or(String::new(), |m| m.symbol.clone()),
                    meta.map(|m| m.decimals),
                )
            };
            let formatted = decimals.map_or(balance.balance.to_string(), |d| {
                format_token(balance.balance, d)
            });
            (asset, symbol, formatted, balance.balance.to_string())
        })
        .collect();

    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                return "No balances found.".to_string();
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Asset", "Symbol", "Balance", "Balance (Raw)"]);
            for (asset, symbol, formatted, raw) in &rows {
                table.add_row(vec![
                    Cell::new(asset),
                    Cell::new(symbol),
                    Cell::new(formatted),
                    Cell::new(raw),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            let json_balances: Vec<_> = rows
                .iter()
                .map(|(asset, symbol, formatted, raw)| {
                    json!({
                        "asset": asset,
                        "symbol": symbol,
                        "balance": formatted,
                        "balance_raw": raw,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&json_balances).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["asset", "symbol", "balance", "balance_raw"]);
            for (asset, symbol, formatted, raw) in &rows {
                let _ = wtr.write_record([asset, symbol, formatted, raw]);
            }
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

pub fn format_status(status: &SyncStatus, format: &OutputFormat) -> String {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "N/A".to_string());
    let mut rows = vec![
        (
            "last_block_height".to_string(),
            optional(status.last_block_height.map(|h| h.to_string())),
        ),
        (
            "native_cursor".to_string(),
            optional(status.native_cursor.map(|t| t.to_string())),
        ),
        (
            "contract_cursor".to_string(),
            optional(status.contract_cursor.map(|t| t.to_string())),
        ),
        ("transactions".to_string(), status.transactions.to_string()),
    ];
    for parameter in &status.chain_parameters {
        rows.push((parameter.key.clone(), parameter.value.to_string()));
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Value"]);
            for (metric, value) in &rows {
                table.add_row(vec![Cell::new(metric), Cell::new(value)]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["metric", "value"]);
            for (metric, value) in &rows {
                let _ = wtr.write_record([metric, value]);
            }
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

fn status(tx: &FullTransaction) -> &'static str {
    if tx.transaction.is_failed {
        "failed"
    } else if tx.transaction.confirmed {
        "confirmed"
    } else {
        "pending"
    }
}

fn format_sun(amount: i64) -> String {
    let formatted = format_token(U256::from(amount.unsigned_abs()), TRX_DECIMALS);
    if amount < 0 {
        format!("-{formatted}")
    } else {
        formatted
    }
}

fn format_token(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

fn format_tx_hash(hash: &str) -> String {
    if hash.len() <= 10 {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
}
