//! Turns parsed feed records into product drafts.
//!
//! Resolution is where category references are pinned to real categories
//! and where SKUs, variant SKUs, and measurement shapes are normalized.
//! Records that cannot be resolved are skipped rows, not import failures.

use std::fmt;

use uuid::Uuid;

use grifo_core::products::{normalize_measurements, ColorVariant, ProductDraft};
use grifo_core::sku::{color_variant_sku, normalize_sku};
use grifo_core::slug::slugify;
use grifo_core::tree::CategoryIndex;
use grifo_core::AttributePair;

use crate::feed::FeedRecord;

/// Why a feed record was skipped during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveSkip {
    MissingCategory,
    UnknownCategory(String),
    InactiveCategory(String),
}

impl fmt::Display for ResolveSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveSkip::MissingCategory => write!(f, "record has no category"),
            ResolveSkip::UnknownCategory(reference) => {
                write!(f, "category '{reference}' not found")
            }
            ResolveSkip::InactiveCategory(slug) => write!(f, "category '{slug}' is inactive"),
        }
    }
}

/// Resolves a feed record against the category tree and normalizes it
/// into a [`ProductDraft`].
///
/// The category reference may be a category id or a slug; free-form names
/// are slugified and retried, so `"Plomería y Gas"` finds `plomeria-y-gas`.
/// Variant SKUs missing from the feed are derived from the base SKU.
///
/// # Errors
///
/// Returns a [`ResolveSkip`] when the record names no category, an unknown
/// one, or an inactive one.
pub fn resolve_record(
    record: &FeedRecord,
    index: &CategoryIndex,
) -> Result<ProductDraft, ResolveSkip> {
    let reference = record
        .category
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(ResolveSkip::MissingCategory)?;

    let category = Uuid::parse_str(reference)
        .ok()
        .and_then(|id| index.get(id))
        .or_else(|| index.get_by_slug(reference))
        .or_else(|| index.get_by_slug(&slugify(reference)))
        .ok_or_else(|| ResolveSkip::UnknownCategory(reference.to_string()))?;
    if !category.active {
        return Err(ResolveSkip::InactiveCategory(category.slug.clone()));
    }

    let base_sku = normalize_sku(&record.sku);

    let color_variants: Vec<ColorVariant> = record
        .color_variants
        .iter()
        .map(|variant| {
            let color_name = variant.color_name.trim().to_string();
            let sku = match variant.sku.as_deref().map(str::trim) {
                Some(sku) if !sku.is_empty() => normalize_sku(sku),
                _ => color_variant_sku(&base_sku, &color_name),
            };
            ColorVariant {
                color_name,
                color_code: variant.color_code.trim().to_string(),
                image: trimmed_opt(variant.image.as_deref()),
                sku,
                active: variant.active,
            }
        })
        .collect();

    let measurements = record
        .measurements
        .clone()
        .map(|raw| normalize_measurements(raw, &base_sku));

    let attributes: Vec<AttributePair> = record
        .attributes
        .iter()
        .map(|pair| AttributePair {
            name: pair.name.trim().to_string(),
            value: pair.value.trim().to_string(),
        })
        .filter(|pair| !pair.name.is_empty())
        .collect();

    Ok(ProductDraft {
        name: record.name.trim().to_string(),
        sku: base_sku,
        description: trimmed_opt(record.description.as_deref()),
        brand: trimmed_opt(record.brand.as_deref()),
        category_id: Some(category.id),
        attributes,
        default_image: trimmed_opt(record.default_image.as_deref()),
        color_variants,
        measurements,
        active: record.active,
        featured: record.featured,
    })
}

fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
