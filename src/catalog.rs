use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::warn;

use crate::error::{LedgerError, Result};

/// Category assigned to sales carried over from a pre-customer database.
pub const FALLBACK_CATEGORY: &str = "misc";
pub const FALLBACK_SUB_CATEGORY: &str = "other";

/// Category -> allowed sub-categories, loaded once at startup and
/// read-only afterwards. Sale creation validates against this.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: BTreeMap<String, Vec<String>>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            FALLBACK_CATEGORY.to_string(),
            vec![FALLBACK_SUB_CATEGORY.to_string()],
        );
        Self { categories }
    }
}

impl CategoryCatalog {
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        Self { categories }
    }

    /// Reads the catalog from a JSON file of the shape
    /// `{"category": ["sub", ...], ...}`. A missing file falls back to the
    /// built-in default; a file that exists but cannot be parsed is a
    /// startup error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "category file missing, using default catalog");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let categories: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)
            .map_err(|err| LedgerError::Config(format!("invalid category file: {err}")))?;
        Ok(Self { categories })
    }

    pub fn categories(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    pub(crate) fn check(&self, category: &str, sub_category: &str) -> Result<()> {
        let subs = self.categories.get(category).ok_or_else(|| {
            LedgerError::InvalidCategory {
                category: category.to_string(),
                choices: self
                    .categories
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;
        if !subs.iter().any(|s| s == sub_category) {
            return Err(LedgerError::InvalidSubCategory {
                category: category.to_string(),
                sub_category: sub_category.to_string(),
                choices: subs.join(", "),
            });
        }
        Ok(())
    }
}
