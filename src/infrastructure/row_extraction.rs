//! HTML table → raw cell rows
//!
//! The browser hands back the markup of the transaction table; this module
//! turns it into one `Vec<String>` per `<tr>`, header row included. Cell
//! contents are the trimmed inner HTML, mirroring what the page shows.

use anyhow::{Result, anyhow};
use scraper::{Html, Selector};

/// Row and cell selectors, parsed once per fetcher.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    row: Selector,
    cell: Selector,
}

impl RowExtractor {
    pub fn new() -> Result<Self> {
        let row = Selector::parse("tr").map_err(|e| anyhow!("Invalid row selector: {}", e))?;
        let cell = Selector::parse("td, th").map_err(|e| anyhow!("Invalid cell selector: {}", e))?;
        Ok(Self { row, cell })
    }

    /// Every `<tr>` in document order, each as its `td`/`th` contents.
    pub fn extract_rows(&self, html: &str) -> Vec<Vec<String>> {
        if html.trim().is_empty() {
            return Vec::new();
        }

        let document = Html::parse_document(html);
        document
            .select(&self.row)
            .map(|row| {
                row.select(&self.cell)
                    .map(|cell| cell.inner_html().trim().to_string())
                    .collect()
            })
            .collect()
    }
}
