use crate::codec::{Reader, Writer};
use crate::error::CoreError;

pub const ACCOUNT_STATE_LEN: usize = 8 + 8;

/// An account's balance and replay-protection nonce, as tracked by the
/// account column of the storage interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub balance: i64,
    pub nonce: i64,
}

impl AccountState {
    pub fn new(balance: i64, nonce: i64) -> Self {
        AccountState { balance, nonce }
    }

    pub fn encode(&self) -> [u8; ACCOUNT_STATE_LEN] {
        let mut w = Writer::with_capacity(ACCOUNT_STATE_LEN);
        w.put_i64(self.balance);
        w.put_i64(self.nonce);
        w.into_vec()
            .try_into()
            .expect("writer emits exactly ACCOUNT_STATE_LEN bytes")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != ACCOUNT_STATE_LEN {
            return Err(CoreError::InvalidSize {
                expected: ACCOUNT_STATE_LEN,
                actual: bytes.len(),
            });
        }
        let mut r = Reader::new(bytes);
        let balance = r.get_i64()?;
        let nonce = r.get_i64()?;
        r.expect_exhausted()?;
        Ok(AccountState { balance, nonce })
    }
}
