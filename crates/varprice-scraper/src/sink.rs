//! Output of recorded quotes.
//!
//! The column layout is fixed when the writer is created: `product_url`,
//! `product_name`, `variant`, one column per declared dimension key, `price`,
//! `available`. CSV writers emit the header immediately, so a run that records
//! nothing still produces a header-only file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use varprice_core::{OutputFormat, PriceQuote};

use crate::error::ScraperError;

/// Column layout for one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputLayout {
    dimension_keys: Vec<String>,
}

impl OutputLayout {
    #[must_use]
    pub fn new(dimension_keys: Vec<String>) -> Self {
        Self { dimension_keys }
    }

    #[must_use]
    pub fn dimension_keys(&self) -> &[String] {
        &self.dimension_keys
    }

    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header = vec![
            "product_url".to_string(),
            "product_name".to_string(),
            "variant".to_string(),
        ];
        header.extend(self.dimension_keys.iter().cloned());
        header.push("price".to_string());
        header.push("available".to_string());
        header
    }

    /// One row in [`Self::header`] order. Dimension columns hold the chosen
    /// option's display text, empty when the quote's combination does not
    /// cover that dimension.
    #[must_use]
    pub fn row(&self, quote: &PriceQuote) -> Vec<String> {
        let mut row = vec![
            quote.product_url.to_string(),
            quote.product_name.clone(),
            quote.variant_label(),
        ];
        row.extend(
            self.dimension_keys
                .iter()
                .map(|key| dimension_text(quote, key).to_string()),
        );
        row.push(quote.price.clone());
        row.push(quote.available.to_string());
        row
    }
}

fn dimension_text<'q>(quote: &'q PriceQuote, key: &str) -> &'q str {
    quote
        .combination
        .as_ref()
        .and_then(|c| c.text_for(key))
        .unwrap_or_default()
}

/// Destination for recorded quotes. Quotes arrive in discovery order from a
/// single flow; `finish` is called exactly once at the end of the run.
pub trait QuoteWriter: Send {
    /// # Errors
    ///
    /// Serialization or I/O failures.
    fn write_quote(&mut self, quote: &PriceQuote) -> Result<(), ScraperError>;

    /// Flushes buffered output. Calls after the first are no-ops.
    ///
    /// # Errors
    ///
    /// Serialization or I/O failures.
    fn finish(&mut self) -> Result<(), ScraperError>;
}

pub struct CsvQuoteWriter<W: Write> {
    writer: csv::Writer<W>,
    layout: OutputLayout,
    finished: bool,
}

impl CsvQuoteWriter<File> {
    /// Creates (truncating) the file at `path` and writes the header.
    ///
    /// # Errors
    ///
    /// I/O failure creating the file or writing the header.
    pub fn create(path: &Path, layout: OutputLayout) -> Result<Self, ScraperError> {
        Self::from_writer(File::create(path)?, layout)
    }
}

impl<W: Write + Send> CsvQuoteWriter<W> {
    /// # Errors
    ///
    /// Failure writing the header.
    pub fn from_writer(inner: W, layout: OutputLayout) -> Result<Self, ScraperError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(layout.header())?;
        Ok(Self {
            writer,
            layout,
            finished: false,
        })
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Failure flushing buffered rows.
    pub fn into_inner(self) -> Result<W, ScraperError> {
        self.writer
            .into_inner()
            .map_err(|e| ScraperError::Io(e.into_error()))
    }
}

impl<W: Write + Send> QuoteWriter for CsvQuoteWriter<W> {
    fn write_quote(&mut self, quote: &PriceQuote) -> Result<(), ScraperError> {
        self.writer.write_record(self.layout.row(quote))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ScraperError> {
        if !self.finished {
            self.finished = true;
            self.writer.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    product_url: &'a str,
    product_name: &'a str,
    variant: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    dimensions: BTreeMap<&'a str, &'a str>,
    price: &'a str,
    available: bool,
}

/// Writes a JSON array of quote objects. Records are streamed; the closing
/// bracket is written by `finish`.
pub struct JsonQuoteWriter<W: Write> {
    writer: W,
    layout: OutputLayout,
    written: usize,
    finished: bool,
}

impl JsonQuoteWriter<BufWriter<File>> {
    /// # Errors
    ///
    /// I/O failure creating the file.
    pub fn create(path: &Path, layout: OutputLayout) -> Result<Self, ScraperError> {
        Self::from_writer(BufWriter::new(File::create(path)?), layout)
    }
}

impl<W: Write + Send> JsonQuoteWriter<W> {
    /// # Errors
    ///
    /// Failure writing the opening bracket.
    pub fn from_writer(mut writer: W, layout: OutputLayout) -> Result<Self, ScraperError> {
        writer.write_all(b"[")?;
        Ok(Self {
            writer,
            layout,
            written: 0,
            finished: false,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> QuoteWriter for JsonQuoteWriter<W> {
    fn write_quote(&mut self, quote: &PriceQuote) -> Result<(), ScraperError> {
        let dimensions = self
            .layout
            .dimension_keys()
            .iter()
            .map(|key| (key.as_str(), dimension_text(quote, key)))
            .collect();
        let record = JsonRecord {
            product_url: quote.product_url.as_str(),
            product_name: &quote.product_name,
            variant: quote.variant_label(),
            dimensions,
            price: &quote.price,
            available: quote.available,
        };
        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        self.writer.write_all(b"\n  ")?;
        serde_json::to_writer(&mut self.writer, &record)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ScraperError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.written > 0 {
            self.writer.write_all(b"\n")?;
        }
        self.writer.write_all(b"]\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Opens the configured output file.
///
/// # Errors
///
/// I/O failure creating the file or writing its preamble.
pub fn open_writer(
    path: &Path,
    format: OutputFormat,
    layout: OutputLayout,
) -> Result<Box<dyn QuoteWriter>, ScraperError> {
    Ok(match format {
        OutputFormat::Csv => Box::new(CsvQuoteWriter::create(path, layout)?),
        OutputFormat::Json => Box::new(JsonQuoteWriter::create(path, layout)?),
    })
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
