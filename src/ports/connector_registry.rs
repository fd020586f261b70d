//! Connector lookup by platform.
//!
//! The manager resolves the connector for a goal from its conversation's
//! `PlatformKind`; a missing kind is a `PlatformError::NotRegistered`.

use std::collections::HashMap;
use std::sync::Arc;

use super::{PlatformConnector, PlatformError};
use crate::domain::conversation::PlatformKind;

#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<PlatformKind, Arc<dyn PlatformConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector under its own `kind()`, replacing any previous one.
    pub fn register(&mut self, connector: Arc<dyn PlatformConnector>) {
        self.connectors.insert(connector.kind(), connector);
    }

    pub fn with(mut self, connector: Arc<dyn PlatformConnector>) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, kind: PlatformKind) -> Result<Arc<dyn PlatformConnector>, PlatformError> {
        self.connectors
            .get(&kind)
            .cloned()
            .ok_or(PlatformError::NotRegistered(kind))
    }

    pub fn kinds(&self) -> Vec<PlatformKind> {
        let mut kinds: Vec<PlatformKind> = self.connectors.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::platform::{InMemoryConnector, UnsupportedConnector};

    #[test]
    fn missing_kind_is_not_registered() {
        let registry = ConnectorRegistry::new()
            .with(Arc::new(InMemoryConnector::new(PlatformKind::Telegram)));

        assert!(registry.get(PlatformKind::Telegram).is_ok());
        assert!(matches!(
            registry.get(PlatformKind::Whatsapp),
            Err(PlatformError::NotRegistered(PlatformKind::Whatsapp))
        ));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry = ConnectorRegistry::new()
            .with(Arc::new(UnsupportedConnector::new(PlatformKind::Instagram)))
            .with(Arc::new(InMemoryConnector::new(PlatformKind::Instagram)));
        assert_eq!(registry.kinds(), vec![PlatformKind::Instagram]);
    }
}
