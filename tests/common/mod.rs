#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use trade_event_monitor::utils::rpc::RpcProvider;
use trade_event_monitor::{MonitorError, Result, TradeEvent, TradeType};

pub const PROGRAM: &str = "EAJ7QiDXgXH31m57RhDFMHTkBrDzxrFpcN8xUkPUqHLi";
pub const BLOCK_TIME: i64 = 1_700_000_000;

/// Deterministic, valid base58 signature for index `i`.
pub fn sig(i: u8) -> String {
    Signature::from([i; 64]).to_string()
}

pub fn trade(id: &str, user: &str, trade_type: TradeType) -> TradeEvent {
    TradeEvent {
        id: id.to_string(),
        user_id: user.to_string(),
        fund_id: "fund".to_string(),
        trade_type,
        amount: 100,
        price: 150_000,
        // Deliberately not the block time.
        timestamp: 1_753_686_307_322,
    }
}

pub fn event_logs(events: &[TradeEvent]) -> Vec<String> {
    let mut logs = vec![format!("Program {PROGRAM} invoke [1]")];
    logs.push("Program log: Instruction: LogTrade".to_string());
    for event in events {
        logs.push(format!(
            "Program data: {}",
            STANDARD.encode(event.encode_with_discriminator().unwrap())
        ));
    }
    logs.push(format!("Program {PROGRAM} success"));
    logs
}

/// A `getTransaction` result in the JSON shape the RPC node returns.
pub fn transaction_json(signature: &str, slot: u64, logs: &[String]) -> serde_json::Value {
    json!({
        "slot": slot,
        "blockTime": BLOCK_TIME,
        "transaction": {
            "signatures": [signature],
            "message": {
                "accountKeys": [
                    { "pubkey": "11111111111111111111111111111111", "signer": true, "writable": true, "source": "transaction" }
                ],
                "instructions": [],
                "recentBlockhash": "11111111111111111111111111111111"
            }
        },
        "meta": {
            "err": null,
            "status": { "Ok": null },
            "fee": 5000,
            "preBalances": [100000],
            "postBalances": [95000],
            "innerInstructions": [],
            "logMessages": logs,
            "preTokenBalances": [],
            "postTokenBalances": [],
            "rewards": []
        }
    })
}

struct Listed {
    signature: String,
    slot: u64,
}

/// In-process chain: per-address signature lists (newest first) and
/// transactions by signature, with switches for injecting failures.
#[derive(Default)]
pub struct MockRpc {
    listings: Mutex<HashMap<Pubkey, Vec<Listed>>>,
    transactions: Mutex<HashMap<String, serde_json::Value>>,
    failing_transactions: Mutex<HashSet<String>>,
    pub fail_listing: AtomicBool,
    pub listing_calls: AtomicUsize,
    pub transaction_calls: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transaction as the newest one for `address`.
    pub fn push(&self, address: &str, signature: &str, slot: u64, events: &[TradeEvent]) {
        self.push_logs(address, signature, slot, event_logs(events));
    }

    pub fn push_logs(&self, address: &str, signature: &str, slot: u64, logs: Vec<String>) {
        let address: Pubkey = address.parse().unwrap();
        self.listings.lock().unwrap().entry(address).or_default().insert(
            0,
            Listed {
                signature: signature.to_string(),
                slot,
            },
        );
        self.transactions
            .lock()
            .unwrap()
            .insert(signature.to_string(), transaction_json(signature, slot, &logs));
    }

    pub fn fail_transaction(&self, signature: &str) {
        self.failing_transactions
            .lock()
            .unwrap()
            .insert(signature.to_string());
    }
}

#[async_trait]
impl RpcProvider for MockRpc {
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
        _commitment: Option<CommitmentConfig>,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(MonitorError::RpcError("listing unavailable".to_string()));
        }

        let listings = self.listings.lock().unwrap();
        let entries = listings.get(address).map(Vec::as_slice).unwrap_or(&[]);
        let start = match before {
            Some(before) => {
                let before = before.to_string();
                entries
                    .iter()
                    .position(|e| e.signature == before)
                    .map_or(entries.len(), |i| i + 1)
            }
            None => 0,
        };

        Ok(entries[start..]
            .iter()
            .take(limit)
            .map(|e| {
                serde_json::from_value(json!({
                    "signature": e.signature,
                    "slot": e.slot,
                    "err": null,
                    "memo": null,
                    "blockTime": BLOCK_TIME,
                    "confirmationStatus": "confirmed"
                }))
                .unwrap()
            })
            .collect())
    }

    async fn get_transaction(
        &self,
        signature: &Signature,
        _commitment: Option<CommitmentConfig>,
    ) -> Result<Option<EncodedConfirmedTransactionWithStatusMeta>> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        let signature = signature.to_string();
        if self.failing_transactions.lock().unwrap().contains(&signature) {
            return Err(MonitorError::RpcError("429 Too Many Requests".to_string()));
        }
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .get(&signature)
            .map(|value| serde_json::from_value(value.clone()).unwrap()))
    }
}
