//! Category seed file loading.
//!
//! `config/categories.yaml` holds the retailer's category tree as nested
//! YAML. Validation runs before any write: the whole file is rejected on
//! the first structural problem so a partial tree never reaches the
//! store.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::categories::{CategoryRecord, MAX_CATEGORY_LEVEL};
use crate::slug::slugify;
use crate::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub children: Vec<SeedCategory>,
}

#[derive(Debug, Deserialize)]
pub struct CategoriesFile {
    pub categories: Vec<SeedCategory>,
}

/// Load and validate the category seed tree from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_categories(path: &Path) -> Result<CategoriesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CategoriesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: CategoriesFile =
        serde_yaml::from_str(&content).map_err(ConfigError::CategoriesFileParse)?;

    validate_categories(&file)?;

    Ok(file)
}

/// Flattens the seed tree into import records, parents before children.
///
/// Sibling order in the file becomes `sort_order` unless a node sets its
/// own.
#[must_use]
pub fn flatten_categories(file: &CategoriesFile) -> Vec<CategoryRecord> {
    let mut records = Vec::new();
    flatten_level(&file.categories, None, &mut records);
    records
}

fn flatten_level(
    nodes: &[SeedCategory],
    parent_slug: Option<&str>,
    records: &mut Vec<CategoryRecord>,
) {
    for (position, node) in nodes.iter().enumerate() {
        let slug = slugify(&node.name);
        records.push(CategoryRecord {
            name: node.name.trim().to_string(),
            slug: Some(slug.clone()),
            description: node.description.clone(),
            parent_slug: parent_slug.map(str::to_string),
            sort_order: node
                .sort_order
                .unwrap_or_else(|| i32::try_from(position).unwrap_or(i32::MAX)),
            active: true,
        });
        flatten_level(&node.children, Some(&slug), records);
    }
}

fn validate_categories(file: &CategoriesFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();
    validate_level(&file.categories, 0, &mut seen_slugs)
}

fn validate_level(
    nodes: &[SeedCategory],
    level: i16,
    seen_slugs: &mut HashSet<String>,
) -> Result<(), ConfigError> {
    if level > MAX_CATEGORY_LEVEL {
        return Err(ConfigError::Validation(format!(
            "category tree is deeper than {} levels",
            MAX_CATEGORY_LEVEL + 1
        )));
    }

    for node in nodes {
        if node.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }

        let slug = slugify(&node.name);
        if slug.is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' produces an empty slug",
                node.name
            )));
        }
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category slug: '{}' (from category '{}')",
                slug, node.name
            )));
        }

        validate_level(&node.children, level + 1, seen_slugs)?;
    }

    Ok(())
}
