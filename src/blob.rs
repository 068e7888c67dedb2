use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{
    fs::{self, File},
    io::{self, AsyncRead, AsyncWriteExt},
};

use crate::utilities::{read_chunk, CHUNK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob exceeds the configured size ceiling")]
    TooLarge,
    #[error("no blob with this reference")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Collaborator seam for the physical bytes. The engine only ever holds
/// opaque references; encryption at rest is this layer's problem.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams `body` into storage under `reference`, returning the byte
    /// count. With `max_bytes` set, writing stops at the ceiling, the
    /// partial blob is removed and `TooLarge` is returned.
    async fn put(
        &self,
        reference: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        max_bytes: Option<i64>,
    ) -> Result<i64, BlobError>;

    async fn open(&self, reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>, BlobError>;

    async fn delete(&self, reference: &str) -> Result<(), BlobError>;
}

/// Filesystem blob store: one file per reference under `dir`.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, reference: &str) -> PathBuf {
        self.dir.join(reference)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        reference: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
        max_bytes: Option<i64>,
    ) -> Result<i64, BlobError> {
        let path = self.path_for(reference);
        let mut file = File::create(&path).await?;
        let mut total_bytes: i64 = 0;

        loop {
            let chunk = read_chunk(body, CHUNK_SIZE).await?;
            total_bytes += chunk.len() as i64;

            if let Some(max) = max_bytes {
                if total_bytes > max {
                    drop(file);
                    if let Err(why) = fs::remove_file(&path).await {
                        tracing::warn!("failed to remove over-limit blob {reference}: {why:?}");
                    }
                    return Err(BlobError::TooLarge);
                }
            }

            file.write_all(&chunk).await?;
            if chunk.len() < CHUNK_SIZE {
                break;
            }
        }

        file.flush().await?;
        Ok(total_bytes)
    }

    async fn open(&self, reference: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>, BlobError> {
        match File::open(self.path_for(reference)).await {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, reference: &str) -> Result<(), BlobError> {
        match fs::remove_file(self.path_for(reference)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}
