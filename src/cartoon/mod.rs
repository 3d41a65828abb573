use anyhow::Result;
use async_trait::async_trait;

pub mod remote;

pub use remote::RemoteCartoonifier;

/// The external image model: image bytes in, image bytes out.
#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(&self, image: Vec<u8>) -> Result<Vec<u8>>;
}
