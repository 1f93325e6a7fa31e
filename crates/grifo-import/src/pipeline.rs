//! The batch import pipeline.
//!
//! A run walks the feed in batches: resolve each row against the category
//! tree, classify it against the duplicate index, rehost its images with
//! bounded concurrency, then commit row by row. Rows fail independently;
//! only infrastructure errors abort the run. Cancellation is checked
//! between batches, so a batch that has started always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use grifo_core::products::{Measurements, Product, ProductDraft, ProductUpdate};
use grifo_core::sku::normalize_sku;
use grifo_core::tree::CategoryIndex;
use grifo_core::validate::validate_product_draft;
use grifo_db::{CatalogError, CategoryTree, ProductCatalog};

use crate::dedup::{DedupIndex, DuplicateMatch, DuplicateReason};
use crate::feed::FeedRecord;
use crate::normalize::resolve_record;
use crate::rehost::ImageRehoster;
use crate::report::{FieldChange, ImportReport, RowOutcome, RowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// New products only; SKU collisions are duplicates.
    #[default]
    Insert,
    /// A SKU collision updates the matched product in place.
    Update,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub dry_run: bool,
    /// Rows committed between cancellation checks.
    pub batch_size: usize,
    /// Concurrent image downloads within a batch.
    pub image_concurrency: usize,
    pub inter_batch_delay: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            mode: ImportMode::Insert,
            dry_run: false,
            batch_size: 100,
            image_concurrency: 3,
            inter_batch_delay: Duration::ZERO,
        }
    }
}

/// Cooperative cancellation handle shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a classified feed row should become.
enum Action {
    Insert,
    Update { existing: Product },
}

/// A row that survived resolution and classification, waiting for its
/// images and its write.
struct Work {
    row: usize,
    draft: ProductDraft,
    warnings: Vec<String>,
    action: Action,
}

/// Which image of a draft a rehost result lands in.
#[derive(Debug, Clone, Copy)]
enum ImageSlot {
    Default,
    Color(usize),
}

struct ImageJob {
    work_idx: usize,
    slot: ImageSlot,
    url: String,
    context: String,
    image_index: usize,
}

pub struct ImportPipeline {
    catalog: Arc<ProductCatalog>,
    tree: Arc<CategoryTree>,
    rehoster: Arc<dyn ImageRehoster>,
    options: ImportOptions,
}

impl ImportPipeline {
    #[must_use]
    pub fn new(
        catalog: Arc<ProductCatalog>,
        tree: Arc<CategoryTree>,
        rehoster: Arc<dyn ImageRehoster>,
        options: ImportOptions,
    ) -> Self {
        ImportPipeline {
            catalog,
            tree,
            rehoster,
            options,
        }
    }

    /// Runs the import over all records and returns the per-row report.
    ///
    /// Dry runs perform every read, resolution, and classification step
    /// but write nothing and upload nothing, so the report predicts what a
    /// real run would do. Row numbers in the report are 1-based feed
    /// positions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] only for infrastructure failures (store
    /// access, the final recount). Row-level problems land in the report.
    pub async fn run(
        &self,
        records: &[FeedRecord],
        cancel: &CancelFlag,
    ) -> Result<ImportReport, CatalogError> {
        let mut report = ImportReport::new(self.options.dry_run);
        let index = self.tree.index().await?;
        let mut dedup = DedupIndex::from_products(&self.catalog.list_all().await?);

        let batch_size = self.options.batch_size.max(1);
        let mut first_batch = true;
        for (batch_index, batch) in records.chunks(batch_size).enumerate() {
            let base_row = batch_index * batch_size;
            if cancel.is_cancelled() {
                for (offset, record) in batch.iter().enumerate() {
                    report.push(
                        RowOutcome::new(
                            base_row + offset + 1,
                            &record.sku,
                            &record.name,
                            RowStatus::Skipped,
                        )
                        .with_reason("import cancelled"),
                    );
                }
                continue;
            }
            if !first_batch && !self.options.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.options.inter_batch_delay).await;
            }
            first_batch = false;

            self.process_batch(batch, base_row, &index, &mut dedup, &mut report)
                .await?;
            tracing::debug!(
                batch = batch_index + 1,
                rows_so_far = report.total_rows,
                "import batch finished"
            );
        }

        if !self.options.dry_run && (report.inserted > 0 || report.updated > 0) {
            let refreshed = self.tree.recount().await?;
            tracing::debug!(categories = refreshed, "refreshed category product counts");
        }

        tracing::info!(summary = %report.summary_line(), "import run finished");
        Ok(report)
    }

    #[allow(clippy::too_many_lines)] // Orchestration function: resolve, classify, rehost, commit.
    async fn process_batch(
        &self,
        batch: &[FeedRecord],
        base_row: usize,
        index: &CategoryIndex,
        dedup: &mut DedupIndex,
        report: &mut ImportReport,
    ) -> Result<(), CatalogError> {
        let mut work_items: Vec<Work> = Vec::new();
        for (offset, record) in batch.iter().enumerate() {
            let row = base_row + offset + 1;
            let draft = match resolve_record(record, index) {
                Ok(draft) => draft,
                Err(skip) => {
                    report.push(
                        RowOutcome::new(row, &record.sku, &record.name, RowStatus::Skipped)
                            .with_reason(skip.to_string()),
                    );
                    continue;
                }
            };

            let action = match dedup.classify(&draft) {
                None => Action::Insert,
                Some(hit) => {
                    let updatable = self.options.mode == ImportMode::Update
                        && hit.reason == DuplicateReason::Sku;
                    match hit.existing_id {
                        Some(existing_id) if updatable => {
                            let existing = self.catalog.get(existing_id).await?;
                            Action::Update { existing }
                        }
                        _ => {
                            report.push(duplicate_outcome(row, &draft, hit));
                            continue;
                        }
                    }
                }
            };

            // The row claims its keys now, so later rows of the same batch
            // collide with it even though nothing is committed yet.
            dedup.insert_draft(&draft);
            work_items.push(Work {
                row,
                draft,
                warnings: Vec::new(),
                action,
            });
        }

        // Dry runs never touch the network; originals stay in place.
        if !self.options.dry_run {
            let jobs = image_jobs(&work_items);
            if !jobs.is_empty() {
                let results: Vec<_> = stream::iter(jobs)
                    .map(|job| {
                        let rehoster = Arc::clone(&self.rehoster);
                        async move {
                            let result =
                                rehoster.rehost(&job.url, &job.context, job.image_index).await;
                            (job.work_idx, job.slot, job.url, result)
                        }
                    })
                    .buffer_unordered(self.options.image_concurrency.max(1))
                    .collect()
                    .await;

                for (work_idx, slot, url, result) in results {
                    let work = &mut work_items[work_idx];
                    match result {
                        Ok(outcome) => apply_slot(&mut work.draft, slot, outcome.url),
                        Err(err) => {
                            tracing::warn!(row = work.row, url = %url, error = %err, "image rehost failed");
                            work.warnings.push(format!(
                                "image rehost failed for {url}: {err}; keeping the original URL"
                            ));
                        }
                    }
                }
            }
        }

        for work in work_items {
            let Work {
                row,
                draft,
                warnings,
                action,
            } = work;
            match action {
                Action::Insert if self.options.dry_run => {
                    let mut messages = validate_product_draft(&draft);
                    for sku in draft.all_skus() {
                        let normalized = normalize_sku(sku);
                        if normalized.is_empty() {
                            continue;
                        }
                        if !self.catalog.is_sku_available(&normalized, None).await? {
                            messages.push(format!("sku '{normalized}' is already in use"));
                        }
                    }
                    if messages.is_empty() {
                        report.push(finished(row, &draft, RowStatus::Inserted, warnings));
                    } else {
                        report.push(row_error(row, &draft, &messages, warnings));
                    }
                }
                Action::Insert => match self.catalog.create(draft.clone()).await {
                    Ok(_) => {
                        report.push(finished(row, &draft, RowStatus::Inserted, warnings));
                    }
                    Err(CatalogError::Validation(messages)) => {
                        report.push(row_error(row, &draft, &messages, warnings));
                    }
                    Err(other) => return Err(other),
                },
                Action::Update { existing } => {
                    let changes = diff_product(&existing, &draft);
                    if changes.is_empty() {
                        let mut outcome = finished(row, &draft, RowStatus::Unchanged, warnings);
                        outcome.existing_id = Some(existing.id);
                        report.push(outcome);
                        continue;
                    }
                    if self.options.dry_run {
                        let mut messages = validate_product_draft(&draft);
                        for sku in draft.all_skus() {
                            let normalized = normalize_sku(sku);
                            if normalized.is_empty() {
                                continue;
                            }
                            let available = self
                                .catalog
                                .is_sku_available(&normalized, Some(existing.id))
                                .await?;
                            if !available {
                                messages.push(format!("sku '{normalized}' is already in use"));
                            }
                        }
                        if messages.is_empty() {
                            let mut outcome = finished(row, &draft, RowStatus::Updated, warnings);
                            outcome.existing_id = Some(existing.id);
                            outcome.changes = changes;
                            report.push(outcome);
                        } else {
                            report.push(row_error(row, &draft, &messages, warnings));
                        }
                        continue;
                    }
                    match self.catalog.update(existing.id, full_overlay(&draft)).await {
                        Ok(product) => {
                            let mut outcome = finished(row, &draft, RowStatus::Updated, warnings);
                            outcome.existing_id = Some(product.id);
                            outcome.changes = changes;
                            report.push(outcome);
                        }
                        Err(CatalogError::Validation(messages)) => {
                            report.push(row_error(row, &draft, &messages, warnings));
                        }
                        Err(CatalogError::ProductNotFound(_)) => {
                            let mut outcome = finished(row, &draft, RowStatus::Error, warnings);
                            outcome.reason = Some("product disappeared during the run".to_string());
                            report.push(outcome);
                        }
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        Ok(())
    }
}

fn finished(
    row: usize,
    draft: &ProductDraft,
    status: RowStatus,
    warnings: Vec<String>,
) -> RowOutcome {
    let mut outcome = RowOutcome::new(row, &draft.sku, &draft.name, status);
    outcome.warnings = warnings;
    outcome
}

fn row_error(
    row: usize,
    draft: &ProductDraft,
    messages: &[String],
    warnings: Vec<String>,
) -> RowOutcome {
    let mut outcome = RowOutcome::new(row, &draft.sku, &draft.name, RowStatus::Error)
        .with_reason(messages.join("; "));
    outcome.warnings = warnings;
    outcome
}

fn duplicate_outcome(row: usize, draft: &ProductDraft, hit: DuplicateMatch) -> RowOutcome {
    let reason = match hit.existing_id {
        Some(id) => format!("{} with existing product {id}", hit.reason),
        None => format!("{} with an earlier row in this feed", hit.reason),
    };
    let mut outcome = RowOutcome::new(row, &draft.sku, &draft.name, RowStatus::DuplicateSkipped)
        .with_reason(reason);
    outcome.existing_id = hit.existing_id;
    outcome
}

/// Collects the images a batch needs rehosted. Update rows skip slots
/// whose URL already matches the stored product, so re-imports of an
/// already-rehosted feed stay offline.
fn image_jobs(work_items: &[Work]) -> Vec<ImageJob> {
    let mut jobs = Vec::new();
    for (work_idx, work) in work_items.iter().enumerate() {
        let existing = match &work.action {
            Action::Update { existing } => Some(existing),
            Action::Insert => None,
        };

        if let Some(url) = &work.draft.default_image {
            let already_stored =
                existing.is_some_and(|e| e.default_image.as_deref() == Some(url.as_str()));
            if !already_stored {
                jobs.push(ImageJob {
                    work_idx,
                    slot: ImageSlot::Default,
                    url: url.clone(),
                    context: work.draft.name.clone(),
                    image_index: 0,
                });
            }
        }

        for (i, variant) in work.draft.color_variants.iter().enumerate() {
            let Some(url) = &variant.image else {
                continue;
            };
            let already_stored = existing.is_some_and(|e| {
                e.color_variants.iter().any(|stored| {
                    stored.sku.eq_ignore_ascii_case(&variant.sku)
                        && stored.image.as_deref() == Some(url.as_str())
                })
            });
            if !already_stored {
                jobs.push(ImageJob {
                    work_idx,
                    slot: ImageSlot::Color(i),
                    url: url.clone(),
                    context: work.draft.name.clone(),
                    image_index: i + 1,
                });
            }
        }
    }
    jobs
}

fn apply_slot(draft: &mut ProductDraft, slot: ImageSlot, url: String) {
    match slot {
        ImageSlot::Default => draft.default_image = Some(url),
        ImageSlot::Color(i) => {
            if let Some(variant) = draft.color_variants.get_mut(i) {
                variant.image = Some(url);
            }
        }
    }
}

/// Field-level diff between a stored product and the draft that would
/// replace it. Derived fields (slug, brand slug, breadcrumb) are not
/// compared. List fields render as counts; content differences still
/// register through the equality check.
fn diff_product(existing: &Product, draft: &ProductDraft) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut scalar = |field: &'static str, from: String, to: String| {
        if from != to {
            changes.push(FieldChange { field, from, to });
        }
    };

    scalar("name", existing.name.clone(), draft.name.clone());
    scalar("sku", existing.sku.clone(), draft.sku.clone());
    scalar(
        "description",
        opt_display(existing.description.as_deref()),
        opt_display(draft.description.as_deref()),
    );
    scalar(
        "brand",
        opt_display(existing.brand.as_deref()),
        opt_display(draft.brand.as_deref()),
    );
    scalar(
        "category_id",
        existing.category_id.to_string(),
        draft
            .category_id
            .unwrap_or(existing.category_id)
            .to_string(),
    );
    scalar(
        "default_image",
        opt_display(existing.default_image.as_deref()),
        opt_display(draft.default_image.as_deref()),
    );
    scalar("active", existing.active.to_string(), draft.active.to_string());
    scalar(
        "featured",
        existing.featured.to_string(),
        draft.featured.to_string(),
    );

    if existing.attributes != draft.attributes {
        changes.push(FieldChange {
            field: "attributes",
            from: format!("{} attributes", existing.attributes.len()),
            to: format!("{} attributes", draft.attributes.len()),
        });
    }
    if existing.color_variants != draft.color_variants {
        changes.push(FieldChange {
            field: "color_variants",
            from: format!("{} variants", existing.color_variants.len()),
            to: format!("{} variants", draft.color_variants.len()),
        });
    }
    if existing.measurements != draft.measurements {
        changes.push(FieldChange {
            field: "measurements",
            from: measurements_summary(existing.measurements.as_ref()),
            to: measurements_summary(draft.measurements.as_ref()),
        });
    }

    changes
}

fn opt_display(value: Option<&str>) -> String {
    value.map_or_else(|| "(none)".to_string(), str::to_string)
}

fn measurements_summary(measurements: Option<&Measurements>) -> String {
    match measurements {
        None => "(none)".to_string(),
        Some(m) if m.enabled => format!("{} sizes", m.variants.len()),
        Some(m) => format!("{} sizes (disabled)", m.variants.len()),
    }
}

/// An update that replaces every field, built from a fully resolved
/// draft. Imports overwrite; partial overlays are an admin-API concern.
fn full_overlay(draft: &ProductDraft) -> ProductUpdate {
    ProductUpdate {
        name: Some(draft.name.clone()),
        sku: Some(draft.sku.clone()),
        description: Some(draft.description.clone()),
        brand: Some(draft.brand.clone()),
        category_id: draft.category_id,
        attributes: Some(draft.attributes.clone()),
        default_image: Some(draft.default_image.clone()),
        color_variants: Some(draft.color_variants.clone()),
        measurements: Some(draft.measurements.clone()),
        active: Some(draft.active),
        featured: Some(draft.featured),
    }
}
