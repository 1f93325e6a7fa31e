//! Domain types and pure logic for the grifo catalog: categories,
//! products, slugs, SKUs, validation, and query semantics. Everything
//! here is I/O free; persistence and transport live in the other crates.

use thiserror::Error;

pub mod app_config;
pub mod categories;
pub mod config;
pub mod filter;
pub mod products;
pub mod seed_file;
pub mod sku;
pub mod slug;
pub mod tree;
pub mod validate;

pub use app_config::{AppConfig, Environment};
pub use categories::{
    Category, CategoryDraft, CategoryKind, CategoryRecord, CategoryUpdate, MAX_CATEGORY_LEVEL,
};
pub use filter::{
    Page, PageRequest, ProductFilter, ProductQuery, SortBy, SortOrder, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use products::{
    AttributePair, ColorVariant, MeasurementVariant, Measurements, Product, ProductDraft,
    ProductUpdate,
};
pub use tree::{CategoryCounts, CategoryIndex, BREADCRUMB_SEPARATOR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read categories file at {path}: {source}")]
    CategoriesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse categories file: {0}")]
    CategoriesFileParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
