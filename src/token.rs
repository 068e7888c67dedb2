use crate::{
    errors::{AppError, AppResult},
    store::{ShareStore, StoreError},
    utilities::{friendly_id, with_store_retry},
};

/// 62-symbol alphabet at 32 characters is ~190 bits of entropy from the OS
/// CSPRNG; enumeration is computationally infeasible.
pub const TOKEN_LENGTH: usize = 32;
const MAX_ATTEMPTS: u32 = 8;

/// Produces share tokens. Tokens are capabilities, so there is no counter or
/// sequential scheme anywhere; each one is independently random.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenGenerator;

impl TokenGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn mint(&self) -> String {
        friendly_id(TOKEN_LENGTH)
    }

    /// Mints a token, probing the store so an (astronomically unlikely)
    /// collision triggers regeneration. The store's insert-if-absent remains
    /// the authoritative uniqueness gate; this probe just keeps the upload
    /// path from wasting a create round-trip on a known-taken token.
    pub async fn generate(&self, store: &dyn ShareStore) -> AppResult<String> {
        for _ in 0..MAX_ATTEMPTS {
            let token = self.mint();
            match with_store_retry(|| store.get(&token)).await {
                Err(StoreError::NotFound) => return Ok(token),
                Ok(_) => {
                    tracing::warn!("share token collision, regenerating");
                }
                Err(StoreError::Unavailable(_)) => return Err(AppError::StorageUnavailable),
                Err(other) => return Err(other.into()),
            }
        }

        // Running out of attempts suggests store corruption or an entropy
        // failure, not bad luck. Operational alert.
        tracing::error!("token generation exhausted after {MAX_ATTEMPTS} attempts");
        Err(AppError::TokenGeneration)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tokens_are_unique() {
        let generator = TokenGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let token = generator.mint();
            assert_eq!(token.len(), TOKEN_LENGTH);
            assert!(seen.insert(token), "generated a duplicate token");
        }
    }
}
