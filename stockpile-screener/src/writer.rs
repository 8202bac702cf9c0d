//! CSV export and resume state.
//!
//! The output file is both the result of a run and the memory of it:
//! on startup the pipeline reads the symbols already present and skips
//! them, so an interrupted run picks up where it stopped instead of
//! re-fetching everything.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use stockpile_core::{StockRecord, StockpileResult, StorageError, Timestamp};

/// One exported row. Insight columns are empty for records that did not
/// pass the screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenRow {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub total_equity: Option<f64>,
    pub price_target: Option<f64>,
    pub passes_screen: bool,
    pub sentiment_insight: String,
    pub earnings_insight: String,
    pub outlook_insight: String,
    pub value_insight: String,
    pub fetched_at: Timestamp,
}

impl ScreenRow {
    /// Build a row from a record; insight columns start empty.
    pub fn from_record(record: &StockRecord, passes_screen: bool) -> Self {
        Self {
            symbol: record.symbol.clone(),
            company_name: record.company_name.clone(),
            price: record.price,
            market_cap: record.market_cap,
            pe_ratio: record.pe_ratio,
            forward_pe: record.forward_pe,
            price_to_book: record.price_to_book,
            price_to_sales: record.price_to_sales,
            debt_to_equity: record.debt_to_equity,
            roe: record.roe,
            roa: record.roa,
            net_margin: record.net_margin,
            operating_margin: record.operating_margin,
            gross_margin: record.gross_margin,
            revenue: record.revenue,
            net_income: record.net_income,
            free_cash_flow: record.free_cash_flow,
            operating_cash_flow: record.operating_cash_flow,
            total_debt: record.total_debt,
            total_cash: record.total_cash,
            total_equity: record.total_equity,
            price_target: record.price_target,
            passes_screen,
            sentiment_insight: String::new(),
            earnings_insight: String::new(),
            outlook_insight: String::new(),
            value_insight: String::new(),
            fetched_at: record.fetched_at,
        }
    }
}

/// Appending CSV writer with periodic checkpoint flushes.
///
/// Opens the output in append mode; the header row is written only when
/// the file is new or empty, so repeated runs extend one well-formed
/// document.
pub struct ScreenWriter {
    writer: csv::Writer<std::fs::File>,
    path: PathBuf,
    checkpoint_interval: usize,
    appended: usize,
}

impl ScreenWriter {
    pub fn create(
        path: impl Into<PathBuf>,
        checkpoint_interval: usize,
    ) -> StockpileResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    path: parent.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }

        let has_content = std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!has_content)
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(file);

        Ok(Self {
            writer,
            path,
            checkpoint_interval: checkpoint_interval.max(1),
            appended: 0,
        })
    }

    pub fn append(&mut self, row: &ScreenRow) -> StockpileResult<()> {
        self.writer
            .serialize(row)
            .map_err(|e| StorageError::Serialize {
                reason: e.to_string(),
            })?;
        self.appended += 1;
        if self.appended % self.checkpoint_interval == 0 {
            self.flush()?;
            tracing::debug!(
                path = %self.path.display(),
                appended = self.appended,
                "Checkpoint flushed"
            );
        }
        Ok(())
    }

    pub fn flush(&mut self) -> StockpileResult<()> {
        self.writer.flush().map_err(|e| {
            StorageError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Rows appended by this writer instance.
    pub fn appended(&self) -> usize {
        self.appended
    }
}

/// Symbols already present in an output file from a previous run.
///
/// A missing file means a fresh start. An existing file that cannot be
/// read as CSV with a `symbol` column is an error: appending a second
/// schema to it would corrupt both runs.
pub fn resume_symbols(path: &Path) -> StockpileResult<HashSet<String>> {
    let is_empty = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if is_empty {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let headers = reader.headers().map_err(|e| StorageError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let symbol_idx = headers.iter().position(|h| h == "symbol").ok_or_else(|| {
        StorageError::Corrupt {
            path: path.display().to_string(),
            reason: "no symbol column in existing output".to_string(),
        }
    })?;

    let mut symbols = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if let Some(symbol) = record.get(symbol_idx) {
            symbols.insert(symbol.trim().to_uppercase());
        }
    }
    Ok(symbols)
}
