//! Connector for platforms without a transport.

use async_trait::async_trait;

use crate::domain::conversation::{Message, PlatformKind};
use crate::ports::{PlatformConnector, PlatformError, SendReceipt};

#[derive(Debug, Clone, Copy)]
pub struct UnsupportedConnector {
    kind: PlatformKind,
}

impl UnsupportedConnector {
    pub fn new(kind: PlatformKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl PlatformConnector for UnsupportedConnector {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    async fn send(&self, _target: &str, _text: &str) -> Result<SendReceipt, PlatformError> {
        Err(PlatformError::Unsupported(self.kind))
    }

    async fn poll_new_messages(&self, _target: &str) -> Result<Vec<Message>, PlatformError> {
        Err(PlatformError::Unsupported(self.kind))
    }
}
