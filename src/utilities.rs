use std::{future::Future, time::Duration};

use nanoid::nanoid;
use tokio::io::{self, AsyncRead, AsyncReadExt};

use crate::store::StoreError;

const NANOID_ALPHABET: &[char] = &[
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'A', 'b', 'B', 'c', 'C', 'd', 'D', 'e',
    'E', 'f', 'F', 'g', 'G', 'h', 'H', 'i', 'I', 'j', 'J', 'k', 'K', 'l', 'L', 'm', 'M', 'n', 'N',
    'o', 'O', 'p', 'P', 'q', 'Q', 'r', 'R', 's', 'S', 't', 'T', 'u', 'U', 'v', 'V', 'w', 'W', 'x',
    'X', 'y', 'Y', 'z', 'Z',
];
pub const CHUNK_SIZE: usize = 8192;

const MAX_STORE_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

pub async fn read_chunk<R>(reader: &mut R, size: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut chunk = Vec::with_capacity(size);
    let mut take = reader.take(size as u64);
    take.read_to_end(&mut chunk).await?;

    Ok(chunk)
}

pub fn friendly_id(len: usize) -> String {
    nanoid!(len, &NANOID_ALPHABET)
}

/// Retries a store operation on transient unavailability with doubling
/// backoff. Every other outcome (including policy-relevant errors such as
/// `LimitExceeded`) is returned to the caller unchanged on the first attempt.
pub async fn with_store_retry<T, F, Fut>(mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        match op().await {
            Err(StoreError::Unavailable(why)) if attempt < MAX_STORE_ATTEMPTS => {
                tracing::warn!("share store unavailable (attempt {attempt}): {why:?}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}
