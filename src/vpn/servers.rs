use anyhow::Result;
use async_trait::async_trait;

/// Source of per-country server hostnames for the server lists
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    async fn servers(&self, country: &str, limit: usize) -> Result<Vec<String>>;
}

/// Directory used when no server source is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServers;

#[async_trait]
impl ServerDirectory for NoServers {
    async fn servers(&self, _country: &str, _limit: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
