//! SKU derivation and normalization for product variants.
//!
//! Every variant, color or measurement, occupies the same global SKU
//! namespace as base product SKUs, so derivation has to be deterministic:
//! the same base SKU and color name always produce the same variant SKU.

/// Finish names that ship in supplier feeds mapped to their catalog
/// abbreviations. Multi-word finishes get explicit codes because the
/// two-letter fallback would collide (`"negro"` and `"negro mate"`).
const COLOR_ABBREVIATIONS: &[(&str, &str)] = &[
    ("cromo", "CR"),
    ("cromo mate", "CM"),
    ("cromo brillo", "CB"),
    ("blanco", "BL"),
    ("blanco mate", "BM"),
    ("negro", "NE"),
    ("negro mate", "NM"),
    ("dorado", "DO"),
    ("oro rosa", "RS"),
    ("bronce", "BR"),
    ("niquel", "NI"),
    ("niquel cepillado", "NC"),
    ("acero", "AC"),
    ("acero inoxidable", "AI"),
    ("gris", "GR"),
    ("beige", "BE"),
];

/// Uppercase-and-trim normalization used for every SKU comparison.
///
/// SKUs are stored exactly as supplied but compared case-insensitively, so
/// `"pvc-110"` and `"PVC-110"` are the same reservation.
#[must_use]
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_ascii_uppercase()
}

/// Abbreviation for a color or finish name: a table lookup for known
/// finishes, else the first two letters of the name uppercased.
#[must_use]
pub fn color_abbreviation(color_name: &str) -> String {
    let key = color_key(color_name);
    for (name, abbreviation) in COLOR_ABBREVIATIONS {
        if *name == key {
            return (*abbreviation).to_string();
        }
    }

    let fallback: String = key
        .chars()
        .filter(|c| c.is_alphabetic())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if fallback.is_empty() {
        "XX".to_string()
    } else {
        fallback
    }
}

/// Derives the SKU for a color variant: `{base}-{abbreviation}`.
///
/// `color_variant_sku("ABC-1", "Cromo")` is `"ABC-1-CR"`.
#[must_use]
pub fn color_variant_sku(base_sku: &str, color_name: &str) -> String {
    format!("{}-{}", base_sku.trim(), color_abbreviation(color_name))
}

/// Derives the SKU for a measurement variant from its 1-based position in
/// the size list: `{base}-{index}`.
#[must_use]
pub fn measurement_variant_sku(base_sku: &str, index: usize) -> String {
    format!("{}-{index}", base_sku.trim())
}

/// Lowercase key with interior whitespace collapsed, used for table lookup.
fn color_key(color_name: &str) -> String {
    color_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
