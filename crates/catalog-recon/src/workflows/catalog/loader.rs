use super::{
    dangling_links, reconcile, validate_inputs, DanglingLink, ReconcileError, CATEGORIES,
    PRODUCTS, PRODUCT_CATEGORIES,
};
use crate::engine::EngineError;
use crate::relation::{DataType, Field, Relation, Schema, Value};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read CSV input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("duplicate column '{0}' in CSV header")]
    DuplicateHeader(String),
    #[error("could not build relation from CSV: {0}")]
    Relation(#[from] EngineError),
    #[error("{relation} ({}): {source}", path.display())]
    Source {
        relation: &'static str,
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
}

/// Order in which column types are tried; the first that fits every
/// non-empty value wins.
const INFERENCE_ORDER: [DataType; 4] = [
    DataType::Int64,
    DataType::Float64,
    DataType::Boolean,
    DataType::Date,
];

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn load_csv_path<P: AsRef<Path>>(path: P) -> Result<Relation, LoadError> {
    let file = std::fs::File::open(path)?;
    load_csv(file)
}

/// Reads a headed CSV document into a relation, inferring column types.
/// Fields are trimmed and empty fields become nulls.
pub fn load_csv<R: Read>(reader: R) -> Result<Relation, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let mut seen = HashSet::with_capacity(headers.len());
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(LoadError::DuplicateHeader(header.clone()));
        }
    }

    let mut raw: Vec<Vec<Option<String>>> = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        raw.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    let types: Vec<DataType> = (0..headers.len())
        .map(|column| infer_type(raw.iter().filter_map(|row| row[column].as_deref())))
        .collect();

    let fields = headers
        .into_iter()
        .zip(&types)
        .map(|(name, data_type)| Field::new(name, *data_type))
        .collect();
    let rows = raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(cell, data_type)| match cell {
                    Some(text) => parse_value(text, *data_type),
                    None => Value::Null,
                })
                .collect()
        })
        .collect();

    let relation = Relation::new(Schema::new(fields)?, rows)?;
    debug!(
        rows = relation.len(),
        columns = relation.schema().len(),
        "csv relation loaded"
    );
    Ok(relation)
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str> + Clone) -> DataType {
    INFERENCE_ORDER
        .into_iter()
        .find(|candidate| {
            let mut values = values.clone().peekable();
            values.peek().is_some() && values.all(|value| fits(value, *candidate))
        })
        .unwrap_or(DataType::Utf8)
}

fn fits(value: &str, data_type: DataType) -> bool {
    match data_type {
        DataType::Int64 => value.parse::<i64>().is_ok(),
        // Rust accepts "inf"/"NaN"; a real number has at least one digit.
        DataType::Float64 => {
            value.bytes().any(|byte| byte.is_ascii_digit()) && value.parse::<f64>().is_ok()
        }
        DataType::Boolean => parse_bool(value).is_some(),
        DataType::Date => NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok(),
        DataType::Utf8 => true,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_value(text: String, data_type: DataType) -> Value {
    let parsed = match data_type {
        DataType::Int64 => text.parse().ok().map(Value::Int),
        DataType::Float64 => text.parse().ok().map(Value::Float),
        DataType::Boolean => parse_bool(&text).map(Value::Bool),
        DataType::Date => NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .ok()
            .map(Value::Date),
        DataType::Utf8 => None,
    };
    parsed.unwrap_or(Value::Text(text))
}

/// Locations of the three reconciliation inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFiles {
    pub products: PathBuf,
    pub categories: PathBuf,
    pub product_categories: PathBuf,
}

impl CatalogFiles {
    pub fn in_dir(
        dir: impl AsRef<Path>,
        products: &str,
        categories: &str,
        product_categories: &str,
    ) -> Self {
        let dir = dir.as_ref();
        Self {
            products: dir.join(products),
            categories: dir.join(categories),
            product_categories: dir.join(product_categories),
        }
    }
}

impl Default for CatalogFiles {
    fn default() -> Self {
        Self::in_dir(".", "products.csv", "categories.csv", "product_categories.csv")
    }
}

/// The three input relations of a reconciliation, loaded together.
#[derive(Debug, Clone)]
pub struct CatalogSources {
    pub products: Relation,
    pub categories: Relation,
    pub product_categories: Relation,
}

impl CatalogSources {
    pub fn load(files: &CatalogFiles) -> Result<Self, LoadError> {
        let load = |relation: &'static str, path: &Path| {
            load_csv_path(path).map_err(|err| LoadError::Source {
                relation,
                path: path.to_path_buf(),
                source: Box::new(err),
            })
        };

        Ok(Self {
            products: load(PRODUCTS, &files.products)?,
            categories: load(CATEGORIES, &files.categories)?,
            product_categories: load(PRODUCT_CATEGORIES, &files.product_categories)?,
        })
    }

    pub fn from_csv_strings(
        products: &str,
        categories: &str,
        product_categories: &str,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            products: load_csv(products.as_bytes())?,
            categories: load_csv(categories.as_bytes())?,
            product_categories: load_csv(product_categories.as_bytes())?,
        })
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        validate_inputs(&self.products, &self.categories, &self.product_categories)
    }

    pub fn reconcile(&self) -> Result<Relation, ReconcileError> {
        reconcile(&self.products, &self.categories, &self.product_categories)
    }

    pub fn dangling_links(&self) -> Result<Vec<DanglingLink>, ReconcileError> {
        dangling_links(&self.products, &self.categories, &self.product_categories)
    }
}
