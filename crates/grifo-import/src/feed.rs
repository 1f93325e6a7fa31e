//! Feed file parsing for bulk product imports.
//!
//! Two physical formats share one logical record shape. JSON feeds carry
//! nested color variants and measurement objects; CSV feeds flatten
//! attributes and sizes into packed columns (`Material=PVC;Presión=6 bar`,
//! `110mm;160mm`). Field names from older catalog exports are accepted as
//! serde aliases so historical files keep importing.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use grifo_core::products::{LegacySizes, RawMeasurements};
use grifo_core::AttributePair;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read feed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot tell the feed format of '{path}'; expected a .csv or .json file")]
    UnknownFormat { path: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("invalid JSON feed {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Csv,
    Json,
}

impl FeedFormat {
    /// Detects the format from the file extension, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Some(FeedFormat::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(FeedFormat::Json),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("csv") {
            Some(FeedFormat::Csv)
        } else if name.eq_ignore_ascii_case("json") {
            Some(FeedFormat::Json)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FeedFormat::Csv => "csv",
            FeedFormat::Json => "json",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A color variant as it appears in JSON feeds. The SKU is optional; a
/// missing one is derived from the base SKU and the color name during
/// normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedColorVariant {
    #[serde(alias = "name", alias = "colorName")]
    pub color_name: String,
    #[serde(default, alias = "code", alias = "colorCode")]
    pub color_code: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// One product row from a feed, before category resolution and validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedRecord {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Category reference: a category id or a slug.
    #[serde(alias = "category_slug", alias = "categoryId")]
    pub category: Option<String>,
    pub attributes: Vec<AttributePair>,
    #[serde(alias = "image", alias = "imageUrl", alias = "image_url")]
    pub default_image: Option<String>,
    #[serde(alias = "colorVariants")]
    pub color_variants: Vec<FeedColorVariant>,
    #[serde(alias = "medidas")]
    pub measurements: Option<RawMeasurements>,
    #[serde(alias = "isActive")]
    pub active: bool,
    pub featured: bool,
}

impl Default for FeedRecord {
    fn default() -> Self {
        FeedRecord {
            name: String::new(),
            sku: String::new(),
            description: None,
            brand: None,
            category: None,
            attributes: Vec::new(),
            default_image: None,
            color_variants: Vec::new(),
            measurements: None,
            active: true,
            featured: false,
        }
    }
}

/// The flat CSV row shape. Nested structures are packed into single
/// columns; color variants are a JSON-feed-only feature.
#[derive(Debug, Clone, Deserialize)]
struct CsvRecord {
    name: String,
    sku: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default, alias = "category_slug")]
    category: Option<String>,
    /// Packed `Name=Value;Name=Value` pairs.
    #[serde(default)]
    attributes: Option<String>,
    #[serde(default, alias = "image", alias = "image_url")]
    default_image: Option<String>,
    /// Packed `110mm;160mm` size list.
    #[serde(default, alias = "available_sizes")]
    sizes: Option<String>,
    #[serde(default, alias = "size_unit", alias = "unit")]
    measurement_description: Option<String>,
    #[serde(default, alias = "is_active")]
    active: Option<String>,
    #[serde(default)]
    featured: Option<String>,
}

impl CsvRecord {
    fn into_record(self) -> FeedRecord {
        let CsvRecord {
            name,
            sku,
            description,
            brand,
            category,
            attributes,
            default_image,
            sizes,
            measurement_description,
            active,
            featured,
        } = self;

        let measurements = sizes.as_deref().and_then(|packed| {
            let available_sizes: Vec<String> = packed
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if available_sizes.is_empty() {
                None
            } else {
                Some(RawMeasurements::Legacy(LegacySizes {
                    available_sizes,
                    unit: measurement_description.clone(),
                }))
            }
        });

        FeedRecord {
            name,
            sku,
            description: none_if_blank(description),
            brand: none_if_blank(brand),
            category: none_if_blank(category),
            attributes: attributes.as_deref().map(split_attributes).unwrap_or_default(),
            default_image: none_if_blank(default_image),
            color_variants: Vec::new(),
            measurements,
            active: parse_flag(active.as_deref(), true),
            featured: parse_flag(featured.as_deref(), false),
        }
    }
}

/// Detects the feed format of a path by extension.
///
/// # Errors
///
/// Returns [`FeedError::UnknownFormat`] for anything but `.csv`/`.json`.
pub fn detect_format(path: &Path) -> Result<FeedFormat, FeedError> {
    FeedFormat::from_path(path).ok_or_else(|| FeedError::UnknownFormat {
        path: path.display().to_string(),
    })
}

/// Reads and parses a feed file. A UTF-8 BOM is tolerated in both formats.
///
/// # Errors
///
/// Returns [`FeedError::Io`] when the file cannot be read and
/// [`FeedError::Csv`]/[`FeedError::Json`] when it cannot be parsed.
pub fn read_feed(path: &Path, format: FeedFormat) -> Result<Vec<FeedRecord>, FeedError> {
    let text = fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let text = text.trim_start_matches('\u{feff}');
    match format {
        FeedFormat::Csv => parse_csv(text),
        FeedFormat::Json => parse_json(text, path),
    }
}

/// Parses CSV feed text. Fields are trimmed; quoted commas and embedded
/// newlines follow standard CSV quoting.
///
/// # Errors
///
/// Returns [`FeedError::Csv`] on malformed CSV or rows that do not match
/// the expected columns.
pub fn parse_csv(text: &str) -> Result<Vec<FeedRecord>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for row in reader.deserialize::<CsvRecord>() {
        records.push(row?.into_record());
    }
    Ok(records)
}

/// Parses a JSON feed: a top-level array of product objects.
///
/// # Errors
///
/// Returns [`FeedError::Json`] when the document is not valid JSON or does
/// not match the record shape.
pub fn parse_json(text: &str, path: &Path) -> Result<Vec<FeedRecord>, FeedError> {
    serde_json::from_str::<Vec<FeedRecord>>(text).map_err(|source| FeedError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Splits a packed `Name=Value;Name=Value` attribute column. A segment
/// without `=` becomes a name-only pair.
fn split_attributes(packed: &str) -> Vec<AttributePair> {
    packed
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => AttributePair {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => AttributePair {
                name: segment.to_string(),
                value: String::new(),
            },
        })
        .collect()
}

/// Lenient boolean column parsing: blank cells keep the default, anything
/// else is truthy only for the usual spellings (Spanish included).
fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim) {
        None | Some("") => default,
        Some(v) => matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "si" | "sí"
        ),
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
