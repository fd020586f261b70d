//! Humanizer that leaves text untouched.

use async_trait::async_trait;

use crate::ports::{Humanizer, HumanizerError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHumanizer;

impl PassthroughHumanizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Humanizer for PassthroughHumanizer {
    async fn humanize(&self, text: &str) -> Result<String, HumanizerError> {
        Ok(text.to_string())
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
