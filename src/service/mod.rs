use crate::error::Result;
use serenity::async_trait;

/// Lifecycle of a long-lived upstream client.
///
/// `start` acquires whatever the client needs before serving calls and fails
/// if it cannot serve at all. `stop` releases the client's transport.
#[async_trait]
pub trait Service: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self);
}
