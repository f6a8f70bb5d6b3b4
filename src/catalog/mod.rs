//! Product category catalog.
//!
//! The catalog is a read-only three-level taxonomy loaded once at startup and
//! flattened into [`Category`] leaves. Two on-disk layouts are accepted:
//!
//! ```json
//! {"个护健康": {"剃须用品": ["手动剃须刀", "电动剃须刀"]}}
//! ```
//!
//! and the flat list used by older exports:
//!
//! ```json
//! {"categories": [{"level1": "个护健康", "level2": "剃须用品", "level3": "手动剃须刀"}]}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::CatalogError;

/// One leaf of the product catalog. Identity is the full path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub level1: String,
    pub level2: String,
    #[serde(alias = "item", alias = "name")]
    pub level3: String,
}

impl Category {
    pub fn new(
        level1: impl Into<String>,
        level2: impl Into<String>,
        level3: impl Into<String>,
    ) -> Self {
        Self {
            level1: level1.into(),
            level2: level2.into(),
            level3: level3.into(),
        }
    }

    /// Storage key, `level1/level2/level3`.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.level1, self.level2, self.level3)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {} > {}", self.level1, self.level2, self.level3)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Flat { categories: Vec<Category> },
    Nested(BTreeMap<String, BTreeMap<String, Vec<String>>>),
}

/// Parse catalog JSON into a de-duplicated list of categories.
///
/// Nested catalogs come out in key order; flat catalogs keep file order.
pub fn parse_catalog(json: &str) -> Result<Vec<Category>, CatalogError> {
    let file: CatalogFile = serde_json::from_str(json)?;

    let raw: Vec<Category> = match file {
        CatalogFile::Flat { categories } => categories,
        CatalogFile::Nested(tree) => tree
            .into_iter()
            .flat_map(|(level1, level2s)| {
                level2s.into_iter().flat_map(move |(level2, leaves)| {
                    let level1 = level1.clone();
                    leaves
                        .into_iter()
                        .map(move |leaf| Category::new(level1.clone(), level2.clone(), leaf))
                })
            })
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut categories = Vec::with_capacity(raw.len());
    for category in raw {
        if [&category.level1, &category.level2, &category.level3]
            .iter()
            .any(|level| level.trim().is_empty())
        {
            return Err(CatalogError::InvalidEntry(category.path()));
        }
        if seen.insert(category.path()) {
            categories.push(category);
        }
    }

    if categories.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(categories)
}

/// Load and flatten a catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<Category>, CatalogError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let categories = parse_catalog(&content)?;
    tracing::info!(
        path = %path.as_ref().display(),
        categories = categories.len(),
        "Catalog loaded"
    );
    Ok(categories)
}
