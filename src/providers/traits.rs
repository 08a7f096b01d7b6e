use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatRequest, ProviderError, StreamEvent};

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Issue a streamed request, forwarding events into `tx` until the reply
    /// ends. Failures before the body starts are returned; failures while
    /// reading the body are sent as `StreamEvent::Error`.
    async fn stream_message(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}
