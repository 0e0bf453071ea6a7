use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use procura_core::access::AccessGrant;
use procura_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use procura_core::domain::normalize_code;
use procura_core::domain::product::Product;
use procura_core::domain::quotation::{Quotation, QuotationId, QuoteItem, QuoteItemId};
use procura_core::flows::FlowEngine;
use procura_core::import::{
    check_target, missing_products, plan_reconciliation, validate_shape, FileOutcome, FileReport,
    ImportBatchResult, ImportError, ImportFile, ImportOptions, ImportTarget, ReconcilePlan,
    ValidatedLine,
};

use super::ServiceError;
use crate::repositories::{
    quotation, ProductRepository, RepositoryError, SqlProductRepository, SqlSupplierRepository,
    SupplierRepository,
};
use crate::DbPool;

/// Bulk quotation import. Files are reconciled one at a time, each in its own
/// transaction; a rejected file never rolls back the ones before it.
pub struct ImportService<S = TracingAuditSink> {
    pool: DbPool,
    products: SqlProductRepository,
    suppliers: SqlSupplierRepository,
    options: ImportOptions,
    audit: S,
}

impl ImportService<TracingAuditSink> {
    pub fn new(pool: DbPool, options: ImportOptions) -> Self {
        Self::with_audit_sink(pool, options, TracingAuditSink)
    }
}

impl<S> ImportService<S>
where
    S: AuditSink,
{
    pub fn with_audit_sink(pool: DbPool, options: ImportOptions, audit: S) -> Self {
        Self {
            products: SqlProductRepository::new(pool.clone()),
            suppliers: SqlSupplierRepository::new(pool.clone()),
            pool,
            options,
            audit,
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub async fn import_batch(
        &self,
        grant: &AccessGrant,
        target: &ImportTarget,
        files: &[ImportFile],
        correlation_id: &str,
    ) -> Result<ImportBatchResult, ServiceError> {
        grant.require_manage()?;
        if files.len() > self.options.max_files_per_batch {
            return Err(ImportError::TooManyFiles {
                count: files.len(),
                max: self.options.max_files_per_batch,
            }
            .into());
        }

        let context = AuditContext::new(None, correlation_id, &grant.actor);
        let mut result = ImportBatchResult::default();
        for file in files {
            let mut warnings = Vec::new();
            let report = match self.import_file(target, file, &mut warnings).await {
                Ok(outcome) => {
                    self.audit.emit(imported_event(&context, &file.source, &outcome));
                    FileReport { source: file.source.clone(), outcome, warnings }
                }
                Err(error) => {
                    self.audit.emit(
                        AuditEvent::new(
                            &context,
                            "import.file_rejected",
                            AuditCategory::Import,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("source", file.source.as_str())
                        .with_metadata("kind", error.kind())
                        .with_metadata("reason", error.to_string()),
                    );
                    FileReport::rejected(file.source.as_str(), &error, warnings)
                }
            };
            result.record(report);
        }

        tracing::info!(
            event_name = "import.batch_completed",
            correlation_id,
            period = %target.period,
            region = %target.region,
            files = result.files_total,
            created = result.created,
            updated = result.updated,
            rejected = result.rejected,
            items = result.items,
            "import batch completed"
        );
        Ok(result)
    }

    async fn import_file(
        &self,
        target: &ImportTarget,
        file: &ImportFile,
        warnings: &mut Vec<String>,
    ) -> Result<FileOutcome, ImportError> {
        check_target(&file.header, target)?;
        let validated = validate_shape(file, &self.options)?;
        warnings.extend(validated.warnings.iter().cloned());

        let supplier = self
            .suppliers
            .find_by_code(&validated.supplier_code)
            .await
            .map_err(storage)?
            .ok_or_else(|| ImportError::UnknownSupplier { code: validated.supplier_code.clone() })?;
        let catalog = self.resolve_products(&validated.product_codes()).await?;

        let region = target.region.trim().to_string();
        let category = validated
            .header
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_string);

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let existing = quotation::find_matching_in(
            &mut tx,
            &supplier.id,
            target.period,
            &region,
            category.as_deref(),
        )
        .await
        .map_err(storage)?;

        let now = Utc::now();
        let quote_date = validated.header.quote_date.unwrap_or_else(|| now.date_naive());
        let (quotation_id, code, replaced) =
            match plan_reconciliation(existing.as_ref(), self.options.overwrite)? {
                ReconcilePlan::Create => {
                    let mut code = Quotation::generate_code(&target.period, &region, &supplier.code);
                    if let Some(category) = &category {
                        code.push('-');
                        code.push_str(&normalize_code(category).replace(' ', "_"));
                    }
                    let created = Quotation {
                        id: QuotationId(Uuid::new_v4().to_string()),
                        code,
                        period: target.period,
                        region: region.clone(),
                        category: category.clone(),
                        supplier_id: supplier.id.clone(),
                        status: FlowEngine.initial_state(),
                        version: 1,
                        quote_date,
                        created_at: now,
                        updated_at: now,
                    };
                    quotation::insert_quotation(&mut tx, &created).await.map_err(|error| {
                        if error.is_unique_violation() {
                            ImportError::DuplicateQuotation { code: created.code.clone() }
                        } else {
                            storage(error)
                        }
                    })?;
                    (created.id, created.code, false)
                }
                ReconcilePlan::Replace(id) => {
                    let code = existing.map(|quotation| quotation.code).unwrap_or_default();
                    quotation::delete_items(&mut tx, &id).await.map_err(storage)?;
                    quotation::touch_quotation(&mut tx, &id, quote_date, now)
                        .await
                        .map_err(storage)?;
                    (id, code, true)
                }
            };

        for line in &validated.lines {
            let product = catalog.get(&line.product_code).ok_or_else(|| {
                ImportError::UnknownProducts { codes: vec![line.product_code.clone()] }
            })?;
            let item = quote_item(&quotation_id, line, product);
            quotation::insert_item(&mut tx, &item).await.map_err(storage)?;
        }
        tx.commit().await.map_err(storage)?;

        let items = validated.lines.len();
        Ok(if replaced {
            FileOutcome::Updated { quotation_code: code, items }
        } else {
            FileOutcome::Created { quotation_code: code, items }
        })
    }

    /// Live products keyed by normalized code; every unknown code is reported at once.
    async fn resolve_products(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<HashMap<String, Product>, ImportError> {
        let mut catalog = HashMap::with_capacity(codes.len());
        for code in codes {
            if let Some(product) = self.products.find_by_code(code).await.map_err(storage)? {
                catalog.insert(code.clone(), product);
            }
        }
        let known: HashSet<String> = catalog.keys().cloned().collect();
        missing_products(codes, &known)?;
        Ok(catalog)
    }
}

/// New pending line at the imported initial price. The sheet's specification is
/// kept ahead of the notes.
fn quote_item(quotation_id: &QuotationId, line: &ValidatedLine, product: &Product) -> QuoteItem {
    let notes = match (&line.specification, &line.notes) {
        (Some(specification), Some(notes)) => Some(format!("{specification} | {notes}")),
        (Some(text), None) | (None, Some(text)) => Some(text.clone()),
        (None, None) => None,
    };

    QuoteItem {
        id: QuoteItemId(Uuid::new_v4().to_string()),
        quotation_id: quotation_id.clone(),
        product_id: product.id.clone(),
        quantity: line.quantity,
        initial_price: Some(line.unit_price),
        negotiated_price: None,
        approved_price: None,
        vat_pct: line.vat_pct,
        negotiation_round: 0,
        approved_at: None,
        approved_by: None,
        notes,
    }
}

fn imported_event(context: &AuditContext, source: &str, outcome: &FileOutcome) -> AuditEvent {
    let (action, code, items) = match outcome {
        FileOutcome::Created { quotation_code, items } => ("created", quotation_code.as_str(), *items),
        FileOutcome::Updated { quotation_code, items } => ("updated", quotation_code.as_str(), *items),
        FileOutcome::Rejected { .. } => ("rejected", "", 0),
    };
    AuditEvent::new(context, "import.file_imported", AuditCategory::Import, AuditOutcome::Success)
        .with_metadata("source", source)
        .with_metadata("action", action)
        .with_metadata("quotation_code", code)
        .with_metadata("items", items.to_string())
}

fn storage(error: impl Into<RepositoryError>) -> ImportError {
    ImportError::Storage(error.into().to_string())
}
