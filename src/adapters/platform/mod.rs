//! Platform connector adapters.
//!
//! Wire protocols for the real platforms live outside this crate; the manager only
//! sees the `PlatformConnector` trait through `ports::ConnectorRegistry`.
//!
//! - `InMemoryConnector` - scripted inbound queue and recorded sends
//! - `UnsupportedConnector` - placeholder that rejects every call

mod in_memory_connector;
mod unsupported_connector;

pub use in_memory_connector::{InMemoryConnector, SentMessage};
pub use unsupported_connector::UnsupportedConnector;
