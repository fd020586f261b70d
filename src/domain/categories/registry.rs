//! Category registry: the closed set of categories conversations are scored against.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::analysis::text::contains_term;

const BUILT_IN_YAML: &str = include_str!("../../../config/categories.yaml");
const PREFERRED_FALLBACK: &str = "other";
const LAST_RESORT_FALLBACK: &str = "general";

static BUILT_IN: Lazy<CategoryRegistry> = Lazy::new(|| {
    CategoryRegistry::from_yaml(BUILT_IN_YAML).unwrap_or_else(|e| {
        tracing::error!(error = %e, "built-in category registry is invalid, using fallback only");
        CategoryRegistry {
            categories: vec![CategoryDefinition::new(
                PREFERRED_FALLBACK,
                "Conversations that do not fit any other category.",
            )],
        }
    })
});

/// Errors raised while loading a registry.
#[derive(Debug, Error)]
pub enum CategoryRegistryError {
    #[error("Failed to read category file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse category definitions: {0}")]
    Parse(String),

    #[error("Category registry contains no categories")]
    Empty,

    #[error("Duplicate category name: {0}")]
    Duplicate(String),

    #[error("Category name cannot be empty")]
    BlankName,
}

/// One category with the text shown to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// The name as it would appear in prose (`first_date` -> `first date`).
    fn spoken_name(&self) -> String {
        self.name.replace('_', " ")
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    categories: Vec<CategoryDefinition>,
}

/// Ordered, deduplicated set of categories with lowercase names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRegistry {
    categories: Vec<CategoryDefinition>,
}

impl CategoryRegistry {
    /// The registry shipped with the crate.
    pub fn built_in() -> &'static CategoryRegistry {
        &BUILT_IN
    }

    pub fn new(definitions: Vec<CategoryDefinition>) -> Result<Self, CategoryRegistryError> {
        if definitions.is_empty() {
            return Err(CategoryRegistryError::Empty);
        }
        let mut categories: Vec<CategoryDefinition> = Vec::with_capacity(definitions.len());
        for mut definition in definitions {
            definition.name = normalize(&definition.name);
            if definition.name.is_empty() {
                return Err(CategoryRegistryError::BlankName);
            }
            if categories.iter().any(|c| c.name == definition.name) {
                return Err(CategoryRegistryError::Duplicate(definition.name));
            }
            definition.keywords = definition
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            categories.push(definition);
        }
        Ok(Self { categories })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CategoryRegistryError> {
        let file: RegistryFile =
            serde_yaml::from_str(yaml).map_err(|e| CategoryRegistryError::Parse(e.to_string()))?;
        Self::new(file.categories)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CategoryRegistryError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| CategoryRegistryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDefinition> {
        let name = normalize(name);
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Maps a free-form label onto a registered category name.
    ///
    /// Exact (normalized) names win over keyword matches. Keywords match as
    /// whole words, and the category with the longest matching keyword wins;
    /// ties go to registry order.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        if let Some(category) = self.get(label) {
            return Some(&category.name);
        }
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        let mut best: Option<(usize, &CategoryDefinition)> = None;
        for category in &self.categories {
            let longest = category
                .keywords
                .iter()
                .filter(|k| contains_term(label, k))
                .map(|k| k.chars().count())
                .max();
            if let Some(len) = longest {
                if best.map_or(true, |(current, _)| len > current) {
                    best = Some((len, category));
                }
            }
        }
        best.map(|(_, category)| category.name.as_str())
    }

    /// Every category whose name or a keyword appears in the text, in registry order.
    ///
    /// The fallback category never matches.
    pub fn scan_text(&self, text: &str) -> Vec<String> {
        let fallback = self.fallback_name();
        self.categories
            .iter()
            .filter(|c| c.name != fallback)
            .filter(|c| {
                contains_term(text, &c.spoken_name())
                    || contains_term(text, &c.name)
                    || c.keywords.iter().any(|k| contains_term(text, k))
            })
            .map(|c| c.name.clone())
            .collect()
    }

    /// Category used when nothing else applies: `other`, else the first
    /// registered category.
    pub fn fallback_name(&self) -> &str {
        if self.contains(PREFERRED_FALLBACK) {
            PREFERRED_FALLBACK
        } else {
            self.categories
                .first()
                .map(|c| c.name.as_str())
                .unwrap_or(LAST_RESORT_FALLBACK)
        }
    }

    /// `"name" - description` lines for completion prompts.
    pub fn prompt_listing(&self) -> String {
        let mut listing = String::new();
        for category in &self.categories {
            listing.push_str(&format!("\"{}\" - {}", category.name, category.description));
            if !category.keywords.is_empty() {
                listing.push_str(&format!(" (Keywords: {})", category.keywords.join(", ")));
            }
            listing.push('\n');
        }
        listing
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}
