//! Reconstructed operation view
//!
//! Operations are the host-facing projection of synchronized transactions:
//! each transaction becomes zero or more send/receive entries depending on
//! the keychain's address-ownership predicate. They are never primary truth
//! and are always recomputable from transactions plus keychain membership.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use super::block::BlockHeader;

/// Direction of an operation relative to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    /// Funds left the account
    Send,
    /// Funds entered the account
    Receive,
}

/// A single entry of the account's operation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Hash of the underlying transaction
    pub tx_hash: String,
    /// Send or receive, from the account's point of view
    pub operation_type: OperationType,
    /// Net amount moved, excluding fees
    pub amount: U256,
    /// Fees paid by the underlying transaction
    pub fees: U256,
    /// Addresses funds came from
    pub senders: Vec<String>,
    /// Addresses funds went to
    pub recipients: Vec<String>,
    /// Containing block, absent for unconfirmed transactions
    pub block: Option<BlockHeader>,
    /// Unix timestamp of the operation
    pub date: u64,
}

impl Operation {
    /// Number of confirmations relative to the given tip height.
    ///
    /// Unconfirmed operations report zero.
    pub fn confirmations(&self, tip_height: u32) -> u32 {
        match &self.block {
            Some(header) if header.height <= tip_height => tip_height - header.height + 1,
            _ => 0,
        }
    }
}
