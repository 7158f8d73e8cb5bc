//! Catalog import: tabular rows (spreadsheet or CSV upload, or JSON) upserted
//! into products.
//!
//! Each row is independent. A bad row becomes a [`RowError`] and the job
//! carries on; a good row's product and size links are written in one
//! transaction.

use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity},
        product_size::{self, Entity as ProductSizeEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::size_ids,
    sizes::{Size, SizeSet},
};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Logical catalog fields a source column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Sku,
    Name,
    Color,
    UnitPrice,
    PriceIncludesVat,
    SizeSet,
    Active,
}

impl CatalogField {
    pub const ALL: [CatalogField; 7] = [
        CatalogField::Sku,
        CatalogField::Name,
        CatalogField::Color,
        CatalogField::UnitPrice,
        CatalogField::PriceIncludesVat,
        CatalogField::SizeSet,
        CatalogField::Active,
    ];
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(v) => v,
    })
}

fn optional_one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer).map(Some)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Accepted header names for each catalog field, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
    #[serde(deserialize_with = "one_or_many")]
    pub sku: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub name: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub color: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub unit_price: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub price_includes_vat: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub size_set: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub active: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            sku: strings(&["sku", "דגם", "מק\"ט", "מקט", "item code", "code"]),
            name: strings(&["name", "product name", "שם", "שם מוצר", "תיאור"]),
            color: strings(&["color", "colour", "צבע"]),
            unit_price: strings(&["unit price", "unit_price", "unitPrice", "price", "מחיר", "מחיר יחידה"]),
            price_includes_vat: strings(&[
                "price includes vat",
                "price_includes_vat",
                "priceIncludesVat",
                "includes vat",
                "כולל מע\"מ",
                "כולל מעמ",
            ]),
            size_set: strings(&["size set", "size_set", "sizeSet", "sizes", "מידות", "טווח מידות"]),
            active: strings(&["active", "פעיל"]),
        }
    }
}

impl ColumnMapping {
    pub fn synonyms(&self, field: CatalogField) -> &[String] {
        match field {
            CatalogField::Sku => &self.sku,
            CatalogField::Name => &self.name,
            CatalogField::Color => &self.color,
            CatalogField::UnitPrice => &self.unit_price,
            CatalogField::PriceIncludesVat => &self.price_includes_vat,
            CatalogField::SizeSet => &self.size_set,
            CatalogField::Active => &self.active,
        }
    }

    fn synonyms_mut(&mut self, field: CatalogField) -> &mut Vec<String> {
        match field {
            CatalogField::Sku => &mut self.sku,
            CatalogField::Name => &mut self.name,
            CatalogField::Color => &mut self.color,
            CatalogField::UnitPrice => &mut self.unit_price,
            CatalogField::PriceIncludesVat => &mut self.price_includes_vat,
            CatalogField::SizeSet => &mut self.size_set,
            CatalogField::Active => &mut self.active,
        }
    }

    /// Puts the override's headers ahead of this mapping's for the fields it names.
    pub fn with_override(&self, ovr: &MappingOverride) -> ColumnMapping {
        let mut merged = self.clone();
        for field in CatalogField::ALL {
            if let Some(headers) = ovr.headers(field) {
                let existing = std::mem::take(merged.synonyms_mut(field));
                let mut combined = headers.to_vec();
                combined.extend(existing.into_iter().filter(|h| !headers.contains(h)));
                *merged.synonyms_mut(field) = combined;
            }
        }
        merged
    }

    /// Picks, for each field, the first synonym present among `headers`.
    /// Matching ignores case and surrounding whitespace.
    pub fn resolve<'a, I>(&self, headers: I) -> ResolvedColumns
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: Vec<&str> = headers.into_iter().collect();
        let mut columns = HashMap::new();

        for field in CatalogField::ALL {
            let found = self.synonyms(field).iter().find_map(|synonym| {
                let wanted = normalize_header(synonym);
                available
                    .iter()
                    .find(|h| normalize_header(h) == wanted)
                    .map(|h| h.to_string())
            });
            if let Some(header) = found {
                columns.insert(field, header);
            }
        }

        ResolvedColumns { columns }
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{FEFF}').trim().to_lowercase()
}

/// Per-job mapping override, e.g. `{"sku": "Model", "unitPrice": ["Price", "מחיר"]}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MappingOverride {
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub sku: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub name: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub color: Option<Vec<String>>,
    #[serde(default, alias = "unitPrice", deserialize_with = "optional_one_or_many")]
    pub unit_price: Option<Vec<String>>,
    #[serde(
        default,
        alias = "priceIncludesVat",
        deserialize_with = "optional_one_or_many"
    )]
    pub price_includes_vat: Option<Vec<String>>,
    #[serde(default, alias = "sizeSet", deserialize_with = "optional_one_or_many")]
    pub size_set: Option<Vec<String>>,
    #[serde(default, deserialize_with = "optional_one_or_many")]
    pub active: Option<Vec<String>>,
}

impl MappingOverride {
    fn headers(&self, field: CatalogField) -> Option<&[String]> {
        let headers = match field {
            CatalogField::Sku => &self.sku,
            CatalogField::Name => &self.name,
            CatalogField::Color => &self.color,
            CatalogField::UnitPrice => &self.unit_price,
            CatalogField::PriceIncludesVat => &self.price_includes_vat,
            CatalogField::SizeSet => &self.size_set,
            CatalogField::Active => &self.active,
        };
        headers.as_deref().filter(|h| !h.is_empty())
    }
}

/// Source header chosen for each field in one import job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: HashMap<CatalogField, String>,
}

impl ResolvedColumns {
    pub fn header(&self, field: CatalogField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    fn text(&self, row: &Map<String, Value>, field: CatalogField) -> Option<String> {
        self.header(field)
            .and_then(|h| row.get(h))
            .and_then(cell_text)
    }
}

/// Field-level parse failure, rendered into the row's error message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid unit price \"{0}\"")]
    InvalidPrice(String),
}

/// Text of a loosely typed cell; blank and structured values count as absent.
pub fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parses a price cell, ignoring currency symbols, separators and other noise.
pub fn parse_price(raw: &str) -> Result<Decimal, FieldError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match Decimal::from_str(&cleaned) {
        Ok(price) if price > Decimal::ZERO => Ok(price),
        _ => Err(FieldError::InvalidPrice(raw.to_string())),
    }
}

const TRUTHY: [&str; 6] = ["כן", "נכון", "yes", "y", "true", "1"];

/// Spreadsheet-style boolean: a small set of truthy tokens, everything else is false.
pub fn parse_flag(raw: &str) -> bool {
    let normalized = raw.trim().to_lowercase();
    TRUTHY.contains(&normalized.as_str())
}

/// Validated content of one source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub sku: String,
    pub name: String,
    pub color: String,
    pub unit_price: Decimal,
    pub price_includes_vat: bool,
    pub size_set: String,
    pub active: bool,
}

impl CatalogRow {
    pub fn extract(row: &Map<String, Value>, columns: &ResolvedColumns) -> Result<Self, FieldError> {
        let sku = columns
            .text(row, CatalogField::Sku)
            .ok_or(FieldError::Missing("SKU"))?;
        let name = columns
            .text(row, CatalogField::Name)
            .ok_or(FieldError::Missing("name"))?;
        let color = columns
            .text(row, CatalogField::Color)
            .ok_or(FieldError::Missing("color"))?;
        let raw_price = columns
            .text(row, CatalogField::UnitPrice)
            .ok_or(FieldError::Missing("unit price"))?;
        let unit_price = parse_price(&raw_price)?;

        let price_includes_vat = columns
            .text(row, CatalogField::PriceIncludesVat)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let size_set = columns
            .text(row, CatalogField::SizeSet)
            .unwrap_or_else(|| SizeSet::DEFAULT_DESCRIPTOR.to_string());
        let active = columns
            .text(row, CatalogField::Active)
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Ok(Self {
            sku,
            name,
            color,
            unit_price,
            price_includes_vat,
            size_set,
            active,
        })
    }
}

/// A source row with its 1-based position in the file (header is row 1).
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub row: usize,
    pub cells: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImportReport {
    /// Products created by this job
    pub inserted: usize,
    /// Existing products overwritten by this job
    pub updated: usize,
    pub errors: Vec<RowError>,
}

/// Body of the JSON import endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImportRowsRequest {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub mapping: Option<MappingOverride>,
}

/// Parses a CSV upload. The first record is the header row; fully blank
/// records are skipped.
pub fn parse_csv(bytes: &[u8]) -> Result<(Vec<SourceRow>, Vec<RowError>), ServiceError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ServiceError::ValidationError("file must be UTF-8 encoded CSV".into()))?;
    let text = text.trim_start_matches('\u{FEFF}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ServiceError::ValidationError(format!("failed to read CSV headers: {}", e)))?
        .clone();

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let fallback_row = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let row = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_row);
                warn!(row, error = %e, "Skipping malformed CSV record");
                errors.push(RowError {
                    row,
                    message: format!("malformed row: {}", e),
                });
                continue;
            }
        };

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_row);
        let cells = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(SourceRow { row, cells });
    }

    Ok((rows, errors))
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";

/// Whether an upload is a workbook (xlsx, xlsb, ods or legacy xls) rather than text.
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        // Spreadsheets store every number as a float; whole ones read back as integers.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Value::from(*f as i64),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::String(other.to_string()),
    }
}

/// Parses the first sheet of a workbook. The first row of the used range
/// holds the headers; columns without a header and fully blank rows are
/// ignored.
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<SourceRow>, ServiceError> {
    let unreadable =
        |e: calamine::Error| ServiceError::ValidationError(format!("failed to read workbook: {}", e));

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(unreadable)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(unreadable)?,
        None => return Ok(Vec::new()),
    };

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut records = range.rows();
    let Some(header_cells) = records.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<Option<String>> = header_cells
        .iter()
        .map(|cell| cell_text(&workbook_cell(cell)))
        .collect();

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let cells: Map<String, Value> = headers
            .iter()
            .zip(record)
            .filter_map(|(header, cell)| header.as_ref().map(|h| (h.clone(), workbook_cell(cell))))
            .collect();
        if cells.values().all(|v| cell_text(v).is_none()) {
            continue;
        }
        // Sheet rows are 1-based and the header occupies the first one.
        rows.push(SourceRow {
            row: first_row + index + 2,
            cells,
        });
    }

    Ok(rows)
}

/// Parses an upload as a workbook when it carries a workbook signature,
/// otherwise as CSV.
pub fn parse_upload(bytes: &[u8]) -> Result<(Vec<SourceRow>, Vec<RowError>), ServiceError> {
    if is_workbook(bytes) {
        Ok((parse_workbook(bytes)?, Vec::new()))
    } else {
        parse_csv(bytes)
    }
}

enum Upserted {
    Inserted,
    Updated,
}

#[derive(Clone)]
pub struct CatalogImportService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    default_mapping: ColumnMapping,
}

impl CatalogImportService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        default_mapping: ColumnMapping,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            default_mapping,
        }
    }

    /// Imports an uploaded spreadsheet (first sheet) or CSV file.
    #[instrument(skip(self, bytes, mapping), fields(bytes = bytes.len(), workbook = is_workbook(bytes)))]
    pub async fn import_file(
        &self,
        bytes: &[u8],
        mapping: Option<MappingOverride>,
    ) -> Result<ImportReport, ServiceError> {
        let (rows, errors) = parse_upload(bytes)?;
        self.run(rows, errors, mapping).await
    }

    /// Imports already-parsed rows keyed by header.
    #[instrument(skip(self, rows, mapping), fields(rows = rows.len()))]
    pub async fn import_rows(
        &self,
        rows: Vec<Map<String, Value>>,
        mapping: Option<MappingOverride>,
    ) -> Result<ImportReport, ServiceError> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, cells)| SourceRow {
                row: index + 2,
                cells,
            })
            .collect();
        self.run(rows, Vec::new(), mapping).await
    }

    async fn run(
        &self,
        rows: Vec<SourceRow>,
        parse_errors: Vec<RowError>,
        mapping: Option<MappingOverride>,
    ) -> Result<ImportReport, ServiceError> {
        if rows.is_empty() && parse_errors.is_empty() {
            return Err(ServiceError::ValidationError("file is empty".into()));
        }

        let mapping = match &mapping {
            Some(ovr) => self.default_mapping.with_override(ovr),
            None => self.default_mapping.clone(),
        };
        let headers: BTreeSet<&str> = rows
            .iter()
            .flat_map(|r| r.cells.keys().map(String::as_str))
            .collect();
        let columns = mapping.resolve(headers);

        let size_ids = size_ids(&*self.db_pool).await?;

        let mut report = ImportReport {
            errors: parse_errors,
            ..Default::default()
        };

        for source in &rows {
            let parsed = match CatalogRow::extract(&source.cells, &columns) {
                Ok(parsed) => parsed,
                Err(e) => {
                    report.errors.push(RowError {
                        row: source.row,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match self.upsert_row(&parsed, &size_ids).await {
                Ok(Upserted::Inserted) => report.inserted += 1,
                Ok(Upserted::Updated) => report.updated += 1,
                Err(e) => {
                    error!(row = source.row, sku = %parsed.sku, error = %e, "Failed to save catalog row");
                    report.errors.push(RowError {
                        row: source.row,
                        message: format!("failed to save product {}", parsed.sku),
                    });
                }
            }
        }

        report.errors.sort_by_key(|e| e.row);

        info!(
            inserted = report.inserted,
            updated = report.updated,
            failed = report.errors.len(),
            "Catalog import finished"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CatalogImported {
                    inserted: report.inserted,
                    updated: report.updated,
                    failed: report.errors.len(),
                })
                .await;
        }

        Ok(report)
    }

    async fn upsert_row(
        &self,
        row: &CatalogRow,
        size_ids: &HashMap<Size, i32>,
    ) -> Result<Upserted, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::DatabaseError)?;

        let outcome = Self::write_product(&txn, row, size_ids).await;
        match outcome {
            Ok(outcome) => {
                txn.commit().await.map_err(ServiceError::DatabaseError)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback of catalog row failed");
                }
                Err(e)
            }
        }
    }

    async fn write_product(
        txn: &DatabaseTransaction,
        row: &CatalogRow,
        size_ids: &HashMap<Size, i32>,
    ) -> Result<Upserted, ServiceError> {
        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(row.sku.as_str()))
            .one(txn)
            .await?;

        let (product_id, outcome) = match existing {
            Some(current) => {
                let id = current.id;
                let mut model = current.into_active_model();
                model.name = Set(row.name.clone());
                model.color = Set(row.color.clone());
                model.unit_price = Set(row.unit_price);
                model.price_includes_vat = Set(row.price_includes_vat);
                model.size_set = Set(row.size_set.clone());
                model.active = Set(row.active);
                model.update(txn).await?;
                (id, Upserted::Updated)
            }
            None => {
                let id = Uuid::new_v4();
                product::ActiveModel {
                    id: Set(id),
                    sku: Set(row.sku.clone()),
                    name: Set(row.name.clone()),
                    color: Set(row.color.clone()),
                    unit_price: Set(row.unit_price),
                    price_includes_vat: Set(row.price_includes_vat),
                    size_set: Set(row.size_set.clone()),
                    active: Set(row.active),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                (id, Upserted::Inserted)
            }
        };

        ProductSizeEntity::delete_many()
            .filter(product_size::Column::ProductId.eq(product_id))
            .exec(txn)
            .await?;

        let links: Vec<product_size::ActiveModel> = SizeSet::parse(Some(&row.size_set))
            .into_iter()
            .map(|size| {
                size_ids
                    .get(&size)
                    .map(|size_id| product_size::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product_id),
                        size_id: Set(*size_id),
                    })
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!("size {} is not seeded", size))
                    })
            })
            .collect::<Result<_, _>>()?;

        ProductSizeEntity::insert_many(links).exec(txn).await?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[rstest]
    #[case("117", dec!(117))]
    #[case("₪ 1,250.50", dec!(1250.50))]
    #[case(" 99.9 ", dec!(99.9))]
    fn parses_prices(#[case] raw: &str, #[case] expected: Decimal) {
        assert_eq!(parse_price(raw), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("free")]
    #[case("0")]
    #[case("-")]
    #[case("1.2.3")]
    fn rejects_prices(#[case] raw: &str) {
        assert_eq!(
            parse_price(raw),
            Err(FieldError::InvalidPrice(raw.to_string()))
        );
    }

    #[rstest]
    #[case("כן", true)]
    #[case("נכון", true)]
    #[case(" YES ", true)]
    #[case("y", true)]
    #[case("True", true)]
    #[case("1", true)]
    #[case("לא", false)]
    #[case("no", false)]
    #[case("0", false)]
    #[case("", false)]
    fn parses_flags(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_flag(raw), expected);
    }

    #[test]
    fn cell_text_handles_loose_types() {
        assert_eq!(cell_text(&json!("  A1 ")), Some("A1".to_string()));
        assert_eq!(cell_text(&json!(117)), Some("117".to_string()));
        assert_eq!(cell_text(&json!(true)), Some("true".to_string()));
        assert_eq!(cell_text(&json!("   ")), None);
        assert_eq!(cell_text(&Value::Null), None);
    }

    #[test]
    fn resolves_hebrew_and_english_headers() {
        let mapping = ColumnMapping::default();
        let columns = mapping.resolve(["דגם", "שם", "Color", "מחיר", "כולל מע\"מ", "מידות"]);
        assert_eq!(columns.header(CatalogField::Sku), Some("דגם"));
        assert_eq!(columns.header(CatalogField::Color), Some("Color"));
        assert_eq!(columns.header(CatalogField::PriceIncludesVat), Some("כולל מע\"מ"));
        assert_eq!(columns.header(CatalogField::Active), None);
    }

    #[test]
    fn override_takes_precedence() {
        let ovr: MappingOverride =
            serde_json::from_value(json!({"sku": "Model", "unitPrice": ["Wholesale"]})).unwrap();
        let mapping = ColumnMapping::default().with_override(&ovr);
        let columns = mapping.resolve(["sku", "Model", "Wholesale", "price"]);
        assert_eq!(columns.header(CatalogField::Sku), Some("Model"));
        assert_eq!(columns.header(CatalogField::UnitPrice), Some("Wholesale"));
    }

    #[test]
    fn extracts_row_with_defaults() {
        let columns = ColumnMapping::default().resolve(["sku", "name", "color", "price"]);
        let parsed = CatalogRow::extract(
            &row(json!({"sku": "A1", "name": "Dress", "color": "Black", "price": 117})),
            &columns,
        )
        .unwrap();
        assert_eq!(parsed.unit_price, dec!(117));
        assert!(!parsed.price_includes_vat);
        assert_eq!(parsed.size_set, "34-42");
        assert!(parsed.active);
    }

    #[rstest]
    #[case(json!({"name": "Dress", "color": "Black", "price": "10"}), "missing SKU")]
    #[case(json!({"sku": "A1", "color": "Black", "price": "10"}), "missing name")]
    #[case(json!({"sku": "A1", "name": "Dress", "price": "10"}), "missing color")]
    #[case(json!({"sku": "A1", "name": "Dress", "color": "Black"}), "missing unit price")]
    #[case(json!({"sku": "A1", "name": "Dress", "color": "Black", "price": "abc"}), "invalid unit price \"abc\"")]
    fn row_errors_name_the_field(#[case] cells: Value, #[case] message: &str) {
        let columns = ColumnMapping::default().resolve(["sku", "name", "color", "price"]);
        let err = CatalogRow::extract(&row(cells), &columns).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn csv_rows_keep_line_numbers() {
        let csv = "\u{FEFF}sku,name,color,price\nA1,Dress,Black,117\n,,,\nA2,Skirt,Red,80\n";
        let (rows, errors) = parse_csv(csv.as_bytes()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[1].row, 4);
        assert_eq!(rows[0].cells.get("sku"), Some(&json!("A1")));
    }

    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (r, cells) in rows.iter().enumerate() {
            for (c, cell) in cells.iter().enumerate() {
                match cell.parse::<f64>() {
                    Ok(n) => sheet.write_number(r as u32, c as u16, n),
                    Err(_) => sheet.write_string(r as u32, c as u16, *cell),
                }
                .unwrap();
            }
        }
        book.save_to_buffer().unwrap()
    }

    #[test]
    fn workbook_first_sheet_becomes_rows() {
        let bytes = workbook(&[
            &["sku", "name", "color", "price"],
            &["A1", "Dress", "Black", "117"],
            &["", "", "", ""],
            &["A2", "Skirt", "Red", "45.5"],
        ]);
        assert!(is_workbook(&bytes));

        let (rows, errors) = parse_upload(&bytes).unwrap();
        assert!(errors.is_empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].cells.get("price"), Some(&json!(117)));
        assert_eq!(rows[1].row, 4);
        assert_eq!(rows[1].cells.get("price"), Some(&json!(45.5)));

        let columns = ColumnMapping::default().resolve(["sku", "name", "color", "price"]);
        let parsed = CatalogRow::extract(&rows[1].cells, &columns).unwrap();
        assert_eq!(parsed.unit_price, dec!(45.5));
    }

    #[test]
    fn corrupt_workbook_is_rejected() {
        let err = parse_upload(b"PK\x03\x04 not really a zip").unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(msg) if msg.starts_with("failed to read workbook")));
    }

    #[test]
    fn config_mapping_accepts_comma_separated_string() {
        let mapping: ColumnMapping =
            serde_json::from_value(json!({"sku": "Item, Model"})).unwrap();
        assert_eq!(mapping.sku, vec!["Item".to_string(), "Model".to_string()]);
        assert_eq!(mapping.color, ColumnMapping::default().color);
    }
}
