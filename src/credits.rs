/// Balance a fresh session starts with.
pub const DEFAULT_CREDITS: u64 = 100;

/// Soft usage counter. Reaching zero never blocks an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditLedger {
    balance: u64,
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CREDITS)
    }
}

impl CreditLedger {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Sets the balance to `max(0, balance - cost)` and returns it.
    pub fn charge(&mut self, cost: u64) -> u64 {
        self.balance = self.balance.saturating_sub(cost);
        self.balance
    }
}
