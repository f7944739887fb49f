use thiserror::Error;

use crate::store::{KvStore, StoreError};
use crate::types::TOKEN_KEY;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Token is required")]
    Missing,
}

/// Stored verbatim; it is never interpreted locally.
pub fn set_token(store: &dyn KvStore, value: &str) -> Result<(), TokenError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TokenError::Missing);
    }
    store.set(TOKEN_KEY, trimmed)?;
    Ok(())
}

pub fn get_token(store: &dyn KvStore) -> Result<Option<String>, TokenError> {
    Ok(store.get(TOKEN_KEY)?.filter(|token| !token.trim().is_empty()))
}

pub fn clear_token(store: &dyn KvStore) -> Result<bool, TokenError> {
    let had = get_token(store)?.is_some();
    store.remove(TOKEN_KEY)?;
    Ok(had)
}

/// `abcd…wxyz` for display; short tokens are fully masked.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
