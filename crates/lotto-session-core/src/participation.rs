//! Number selection rules for a participation.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::abi::participateCall;
use crate::domain::Session;

pub const MAX_SELECTIONS: usize = 4;
pub const TOTAL_NUMBERS: u8 = 50;

/// Selects `number` if absent, deselects it if present. The selection stays
/// sorted and never grows past [`MAX_SELECTIONS`]; out-of-range numbers are
/// ignored. Returns whether the selection changed.
pub fn toggle_number(selected: &mut Vec<u8>, number: u8) -> bool {
    if !(1..=TOTAL_NUMBERS).contains(&number) {
        return false;
    }
    if let Some(pos) = selected.iter().position(|n| *n == number) {
        selected.remove(pos);
        return true;
    }
    if selected.len() >= MAX_SELECTIONS {
        return false;
    }
    selected.push(number);
    selected.sort_unstable();
    true
}

pub fn is_complete(selected: &[u8]) -> bool {
    selected.len() == MAX_SELECTIONS
}

/// Everything a dry-run result depends on. A result computed for one key
/// says nothing about another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EligibilityKey {
    pub numbers: Vec<u8>,
    pub account: Address,
    pub chain: String,
    pub generation: u64,
}

impl EligibilityKey {
    pub fn call(&self) -> participateCall {
        participateCall {
            numbers: self.numbers.clone(),
        }
    }
}

/// `Some` only when a dry-run is worth issuing: exactly [`MAX_SELECTIONS`]
/// numbers, a connected account and a resolved chain.
pub fn eligibility_key(selected: &[u8], session: &Session) -> Option<EligibilityKey> {
    if !is_complete(selected) || !session.is_connected() {
        return None;
    }
    Some(EligibilityKey {
        numbers: selected.to_vec(),
        account: session.account?,
        chain: session.active_chain_name()?.to_owned(),
        generation: session.binding_generation,
    })
}
