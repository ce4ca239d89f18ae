use std::collections::HashMap;

use spacetime_core::{AccountState, PublicKey};

use crate::account_reader::AccountStateReader;

/// An in-memory overlay over committed account state, tracking the
/// effect of transactions applied so far within the block currently
/// being validated. Lets the transaction validator catch a second
/// transaction in the same block that spends a balance the first one
/// already consumed, without touching committed storage.
pub struct StateOverlay<'a, R: AccountStateReader + ?Sized> {
    base: &'a R,
    overrides: HashMap<PublicKey, AccountState>,
}

impl<'a, R: AccountStateReader + ?Sized> StateOverlay<'a, R> {
    pub fn new(base: &'a R) -> Self {
        StateOverlay {
            base,
            overrides: HashMap::new(),
        }
    }

    pub fn get(&self, address: &PublicKey) -> AccountState {
        self.overrides
            .get(address)
            .copied()
            .or_else(|| self.base.get_account(address))
            .unwrap_or_default()
    }

    pub fn set(&mut self, address: PublicKey, state: AccountState) {
        self.overrides.insert(address, state);
    }

    /// Debits `amount + fee` from `sender` and increments its nonce,
    /// credits `amount` to `recipient`. Callers must have already
    /// validated the balance and nonce preconditions.
    pub fn apply_transfer(
        &mut self,
        sender: &PublicKey,
        recipient: &PublicKey,
        amount: i64,
        fee: i64,
    ) {
        let mut sender_state = self.get(sender);
        sender_state.balance -= amount + fee;
        sender_state.nonce += 1;
        self.set(*sender, sender_state);

        let mut recipient_state = self.get(recipient);
        recipient_state.balance += amount;
        self.set(*recipient, recipient_state);
    }
}
