use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sku::measurement_variant_sku;

/// One ordered name/value pair of a product's technical sheet.
///
/// Attributes are a list, not a map: the admin controls display order
/// ("Material" before "Presión máxima") and reordering must round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePair {
    pub name: String,
    pub value: String,
}

/// A purchasable finish of a product, e.g. the chrome version of a tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    /// Display name of the finish, e.g. `"Cromo"`.
    pub color_name: String,
    /// Swatch color as `#RRGGBB`.
    pub color_code: String,
    /// Variant-specific image URL. May be absent when the product carries
    /// a default image.
    pub image: Option<String>,
    /// Variant SKU, `{base}-{abbreviation}` derived from the color name.
    pub sku: String,
    pub active: bool,
}

/// A purchasable size of a product, e.g. the 110mm version of a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementVariant {
    /// Display size, e.g. `"110mm"` or `"1 1/2\""`.
    pub size: String,
    /// Variant SKU, `{base}-{index}` when auto-generated.
    pub sku: String,
    pub active: bool,
}

/// Size variants of a product plus the flag that turns the size selector
/// on in the storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(default)]
    pub enabled: bool,
    /// Free text shown next to the selector, typically the unit.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variants: Vec<MeasurementVariant>,
}

/// Measurement data as it appears in feeds, before normalization.
///
/// `Legacy` must be tried first: it requires `available_sizes`, which the
/// canonical shape never carries, while the canonical shape's fields are
/// all defaulted and would swallow legacy objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMeasurements {
    Legacy(LegacySizes),
    Canonical(CanonicalMeasurements),
}

/// Pre-variant export shape: a bare size list plus an optional unit.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacySizes {
    #[serde(alias = "availableSizes")]
    pub available_sizes: Vec<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Canonical `{enabled, description, variants}` shape. Variant SKUs may be
/// absent in feeds and are filled in during normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalMeasurements {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variants: Vec<CanonicalMeasurementVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalMeasurementVariant {
    pub size: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Normalizes either feed shape into [`Measurements`].
///
/// Legacy size lists become enabled variant sets with `{base}-{index}`
/// SKUs (1-based) and the unit carried over as the description. Canonical
/// variants keep their SKUs; missing ones are derived from position.
#[must_use]
pub fn normalize_measurements(raw: RawMeasurements, base_sku: &str) -> Measurements {
    match raw {
        RawMeasurements::Legacy(legacy) => {
            let variants: Vec<MeasurementVariant> = legacy
                .available_sizes
                .iter()
                .map(|size| size.trim())
                .filter(|size| !size.is_empty())
                .enumerate()
                .map(|(i, size)| MeasurementVariant {
                    size: size.to_string(),
                    sku: measurement_variant_sku(base_sku, i + 1),
                    active: true,
                })
                .collect();
            Measurements {
                enabled: !variants.is_empty(),
                description: legacy.unit.filter(|u| !u.trim().is_empty()),
                variants,
            }
        }
        RawMeasurements::Canonical(canonical) => Measurements {
            enabled: canonical.enabled,
            description: canonical.description.filter(|d| !d.trim().is_empty()),
            variants: canonical
                .variants
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    let sku = match v.sku.as_deref().map(str::trim) {
                        Some(explicit) if !explicit.is_empty() => explicit.to_string(),
                        _ => measurement_variant_sku(base_sku, i + 1),
                    };
                    MeasurementVariant {
                        size: v.size.trim().to_string(),
                        sku,
                        active: v.active,
                    }
                })
                .collect(),
        },
    }
}

fn default_true() -> bool {
    true
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unique URL slug, derived from the name at creation and stable
    /// afterwards.
    pub slug: String,
    /// Human-meaningful base SKU, unique case-insensitively across the
    /// whole catalog including variant SKUs.
    pub sku: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Slug of `brand`, kept alongside it for filtering.
    pub brand_slug: Option<String>,
    /// The most specific category node the product lives under.
    pub category_id: Uuid,
    /// Denormalized `"Root > Child > Leaf"` path, refreshed whenever the
    /// category tree changes shape.
    pub category_breadcrumb: Option<String>,
    pub attributes: Vec<AttributePair>,
    pub default_image: Option<String>,
    pub color_variants: Vec<ColorVariant>,
    pub measurements: Option<Measurements>,
    pub active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Every SKU this product occupies in the global namespace: the base
    /// SKU plus all color and measurement variant SKUs.
    #[must_use]
    pub fn all_skus(&self) -> Vec<&str> {
        let mut skus = vec![self.sku.as_str()];
        skus.extend(self.color_variants.iter().map(|v| v.sku.as_str()));
        if let Some(measurements) = &self.measurements {
            skus.extend(measurements.variants.iter().map(|v| v.sku.as_str()));
        }
        skus
    }

    /// Image shown for the product as a whole: the default image, else the
    /// first active color variant's image.
    #[must_use]
    pub fn display_image(&self) -> Option<&str> {
        if let Some(image) = self.default_image.as_deref() {
            return Some(image);
        }
        self.color_variants
            .iter()
            .filter(|v| v.active)
            .find_map(|v| v.image.as_deref())
    }
}

/// Input for creating a product. Slug and breadcrumb are derived;
/// `category_id` is optional only so validation can report its absence as
/// a field error instead of a type error.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<Uuid>,
    pub attributes: Vec<AttributePair>,
    pub default_image: Option<String>,
    pub color_variants: Vec<ColorVariant>,
    pub measurements: Option<Measurements>,
    pub active: bool,
    pub featured: bool,
}

impl Default for ProductDraft {
    fn default() -> Self {
        ProductDraft {
            name: String::new(),
            sku: String::new(),
            description: None,
            brand: None,
            category_id: None,
            attributes: Vec::new(),
            default_image: None,
            color_variants: Vec::new(),
            measurements: None,
            active: true,
            featured: false,
        }
    }
}

impl ProductDraft {
    /// Every SKU the draft would occupy, in the same order as
    /// [`Product::all_skus`]. Values are as written in the draft, not yet
    /// normalized.
    #[must_use]
    pub fn all_skus(&self) -> Vec<&str> {
        let mut skus = vec![self.sku.as_str()];
        skus.extend(self.color_variants.iter().map(|v| v.sku.as_str()));
        if let Some(measurements) = &self.measurements {
            skus.extend(measurements.variants.iter().map(|v| v.sku.as_str()));
        }
        skus
    }
}

/// Partial product update with the same double-`Option` convention as
/// [`crate::categories::CategoryUpdate`].
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<Option<String>>,
    pub brand: Option<Option<String>>,
    pub category_id: Option<Uuid>,
    pub attributes: Option<Vec<AttributePair>>,
    pub default_image: Option<Option<String>>,
    pub color_variants: Option<Vec<ColorVariant>>,
    pub measurements: Option<Option<Measurements>>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductUpdate {
    /// Overlays the update onto an existing product, producing the full
    /// draft that revalidation and persistence run against.
    #[must_use]
    pub fn apply_to(&self, existing: &Product) -> ProductDraft {
        ProductDraft {
            name: self.name.clone().unwrap_or_else(|| existing.name.clone()),
            sku: self.sku.clone().unwrap_or_else(|| existing.sku.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            brand: self.brand.clone().unwrap_or_else(|| existing.brand.clone()),
            category_id: Some(self.category_id.unwrap_or(existing.category_id)),
            attributes: self
                .attributes
                .clone()
                .unwrap_or_else(|| existing.attributes.clone()),
            default_image: self
                .default_image
                .clone()
                .unwrap_or_else(|| existing.default_image.clone()),
            color_variants: self
                .color_variants
                .clone()
                .unwrap_or_else(|| existing.color_variants.clone()),
            measurements: self
                .measurements
                .clone()
                .unwrap_or_else(|| existing.measurements.clone()),
            active: self.active.unwrap_or(existing.active),
            featured: self.featured.unwrap_or(existing.featured),
        }
    }
}
