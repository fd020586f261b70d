//! Category registry source

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::categories::{CategoryRegistry, CategoryRegistryError};

/// Where category definitions come from. The built-in set when no path is given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoriesConfig {
    /// YAML file with a top-level `categories` list
    pub path: Option<PathBuf>,
}

impl CategoriesConfig {
    pub fn load_registry(&self) -> Result<CategoryRegistry, CategoryRegistryError> {
        match &self.path {
            Some(path) => CategoryRegistry::from_path(path),
            None => Ok(CategoryRegistry::built_in().clone()),
        }
    }
}
