use chrono::Utc;
use uuid::Uuid;

use grifo_core::categories::{Category, CategoryKind};
use grifo_core::products::RawMeasurements;

use super::*;
use crate::feed::FeedColorVariant;

fn category(name: &str, slug: &str, active: bool) -> Category {
    let now = Utc::now();
    Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slug.to_string(),
        description: None,
        parent_id: None,
        level: 0,
        kind: CategoryKind::Main,
        sort_order: 0,
        active,
        product_count: 0,
        total_product_count: 0,
        created_at: now,
        updated_at: now,
    }
}

fn record(name: &str, sku: &str, category: &str) -> FeedRecord {
    FeedRecord {
        name: name.to_string(),
        sku: sku.to_string(),
        category: Some(category.to_string()),
        ..FeedRecord::default()
    }
}

#[test]
fn resolves_category_by_slug_id_and_name() {
    let tubos = category("Tubos", "tubos", true);
    let id = tubos.id;
    let index = CategoryIndex::new(&[tubos]);

    let by_slug = resolve_record(&record("Tubo", "T-1", "tubos"), &index).unwrap();
    assert_eq!(by_slug.category_id, Some(id));

    let by_id = resolve_record(&record("Tubo", "T-1", &id.to_string()), &index).unwrap();
    assert_eq!(by_id.category_id, Some(id));

    // Free-form names slugify down to the stored slug.
    let by_name = resolve_record(&record("Tubo", "T-1", "  Tubos  "), &index).unwrap();
    assert_eq!(by_name.category_id, Some(id));
}

#[test]
fn skips_missing_unknown_and_inactive_categories() {
    let index = CategoryIndex::new(&[category("Cerrada", "cerrada", false)]);

    let mut no_category = record("Tubo", "T-1", "x");
    no_category.category = None;
    assert_eq!(
        resolve_record(&no_category, &index).unwrap_err(),
        ResolveSkip::MissingCategory
    );
    assert_eq!(
        resolve_record(&record("Tubo", "T-1", "   "), &index).unwrap_err(),
        ResolveSkip::MissingCategory
    );
    assert_eq!(
        resolve_record(&record("Tubo", "T-1", "fantasma"), &index).unwrap_err(),
        ResolveSkip::UnknownCategory("fantasma".to_string())
    );
    assert_eq!(
        resolve_record(&record("Tubo", "T-1", "cerrada"), &index).unwrap_err(),
        ResolveSkip::InactiveCategory("cerrada".to_string())
    );
}

#[test]
fn normalizes_base_and_variant_skus() {
    let index = CategoryIndex::new(&[category("Grifería", "griferia", true)]);
    let mut rec = record("Grifo", "  grf-100 ", "griferia");
    rec.color_variants = vec![
        FeedColorVariant {
            color_name: " Cromo ".to_string(),
            color_code: " #C0C0C0 ".to_string(),
            image: Some("  ".to_string()),
            sku: None,
            active: true,
        },
        FeedColorVariant {
            color_name: "Negro mate".to_string(),
            color_code: String::new(),
            image: Some("https://cdn.example.com/nm.jpg".to_string()),
            sku: Some(" grf-100-nmx ".to_string()),
            active: false,
        },
    ];

    let draft = resolve_record(&rec, &index).unwrap();
    assert_eq!(draft.sku, "GRF-100");
    assert_eq!(draft.color_variants[0].color_name, "Cromo");
    assert_eq!(draft.color_variants[0].color_code, "#C0C0C0");
    assert_eq!(draft.color_variants[0].image, None);
    assert_eq!(draft.color_variants[0].sku, "GRF-100-CR");
    assert_eq!(draft.color_variants[1].sku, "GRF-100-NMX");
    assert!(!draft.color_variants[1].active);
}

#[test]
fn legacy_sizes_become_measurement_variants() {
    let index = CategoryIndex::new(&[category("Tubos", "tubos", true)]);
    let mut rec = record("Tubo PVC", "TUB-001", "tubos");
    rec.measurements = Some(RawMeasurements::Legacy(
        serde_json::from_str(r#"{"availableSizes": ["110mm", "160mm"], "unit": "mm"}"#).unwrap(),
    ));

    let draft = resolve_record(&rec, &index).unwrap();
    let measurements = draft.measurements.unwrap();
    assert!(measurements.enabled);
    assert_eq!(measurements.description.as_deref(), Some("mm"));
    assert_eq!(measurements.variants.len(), 2);
    assert_eq!(measurements.variants[0].size, "110mm");
    assert_eq!(measurements.variants[0].sku, "TUB-001-1");
    assert_eq!(measurements.variants[1].sku, "TUB-001-2");
}

#[test]
fn trims_fields_and_drops_empty_attributes() {
    let index = CategoryIndex::new(&[category("Tubos", "tubos", true)]);
    let mut rec = record("  Tubo PVC  ", "T-1", "tubos");
    rec.description = Some("   ".to_string());
    rec.brand = Some(" Tigre ".to_string());
    rec.attributes = vec![
        AttributePair {
            name: " Material ".to_string(),
            value: " PVC ".to_string(),
        },
        AttributePair {
            name: "  ".to_string(),
            value: "huérfano".to_string(),
        },
    ];

    let draft = resolve_record(&rec, &index).unwrap();
    assert_eq!(draft.name, "Tubo PVC");
    assert_eq!(draft.description, None);
    assert_eq!(draft.brand.as_deref(), Some("Tigre"));
    assert_eq!(draft.attributes.len(), 1);
    assert_eq!(draft.attributes[0].name, "Material");
    assert_eq!(draft.attributes[0].value, "PVC");
}
