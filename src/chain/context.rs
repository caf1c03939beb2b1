use alloy::primitives::Address;
use std::fmt;

/// The subject every core operation runs against: one chain, one market, and
/// the connected account if any. Passed explicitly, never read from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainContext {
    pub chain_id: u64,
    pub market: Address,
    pub account: Option<Address>,
}

impl ChainContext {
    pub fn new(chain_id: u64, market: Address) -> Self {
        Self {
            chain_id,
            market,
            account: None,
        }
    }

    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }
}

impl fmt::Display for ChainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain={} market={}", self.chain_id, self.market)
    }
}
