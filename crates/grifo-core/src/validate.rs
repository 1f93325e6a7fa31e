//! Pure product validation.
//!
//! Validation returns the full list of problems as plain messages instead
//! of failing on the first, so the admin form and the import report can
//! show everything wrong with a row at once. No I/O happens here; checks
//! that need the persisted catalog (SKU and slug uniqueness) live in the
//! services.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::products::ProductDraft;
use crate::sku::{color_variant_sku, normalize_sku};

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("hex color regex is valid"));

/// `true` for a `#RRGGBB` swatch code.
#[must_use]
pub fn is_hex_color(code: &str) -> bool {
    HEX_COLOR_RE.is_match(code)
}

/// Validates a product draft, returning every problem found.
///
/// An empty result means the draft is acceptable; a draft with a name, a
/// SKU, a category, and no variants always passes.
#[must_use]
pub fn validate_product_draft(draft: &ProductDraft) -> Vec<String> {
    let mut errors = Vec::new();

    let name = draft.name.trim();
    let base_sku = draft.sku.trim();

    if name.is_empty() {
        errors.push("name is required".to_string());
    }
    if base_sku.is_empty() {
        errors.push("sku is required".to_string());
    }
    if draft.category_id.is_none() {
        errors.push("category is required".to_string());
    }

    for (i, attribute) in draft.attributes.iter().enumerate() {
        if attribute.name.trim().is_empty() {
            errors.push(format!("attribute {}: name is required", i + 1));
        }
    }

    // Variant SKUs share one namespace with the base SKU; collisions
    // inside a single draft are reported here, collisions against the
    // rest of the catalog by the service.
    let mut seen_skus: HashSet<String> = HashSet::new();
    if !base_sku.is_empty() {
        seen_skus.insert(normalize_sku(base_sku));
    }

    for (i, variant) in draft.color_variants.iter().enumerate() {
        let color_name = variant.color_name.trim();
        let label = if color_name.is_empty() {
            format!("color variant {}", i + 1)
        } else {
            format!("color variant '{color_name}'")
        };

        if color_name.is_empty() {
            errors.push(format!("{label}: color name is required"));
        }
        if !is_hex_color(variant.color_code.trim()) {
            errors.push(format!(
                "{label}: color code '{}' must be #RRGGBB",
                variant.color_code
            ));
        }
        if variant.image.is_none() && draft.default_image.is_none() {
            errors.push(format!(
                "{label}: needs an image or the product needs a default image"
            ));
        }

        if variant.sku.trim().is_empty() {
            errors.push(format!("{label}: sku is required"));
        } else {
            if !base_sku.is_empty() && !color_name.is_empty() {
                let expected = color_variant_sku(base_sku, color_name);
                if normalize_sku(&variant.sku) != normalize_sku(&expected) {
                    errors.push(format!(
                        "{label}: sku '{}' must be '{expected}'",
                        variant.sku
                    ));
                }
            }
            if !seen_skus.insert(normalize_sku(&variant.sku)) {
                errors.push(format!("duplicate variant sku '{}'", variant.sku.trim()));
            }
        }
    }

    if let Some(measurements) = &draft.measurements {
        if measurements.enabled && measurements.variants.is_empty() {
            errors.push("measurements are enabled but no size variants are defined".to_string());
        }
        for (i, variant) in measurements.variants.iter().enumerate() {
            let size = variant.size.trim();
            let label = if size.is_empty() {
                format!("measurement variant {}", i + 1)
            } else {
                format!("measurement variant '{size}'")
            };

            if size.is_empty() {
                errors.push(format!("{label}: size is required"));
            }
            if variant.sku.trim().is_empty() {
                errors.push(format!("{label}: sku is required"));
            } else if !seen_skus.insert(normalize_sku(&variant.sku)) {
                errors.push(format!("duplicate variant sku '{}'", variant.sku.trim()));
            }
        }
    }

    errors
}
