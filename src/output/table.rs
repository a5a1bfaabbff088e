//! Result table.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{open_append, reset, OutputError};
use crate::records::ResultRow;

/// CSV file with one row per processed document.
#[derive(Debug, Clone)]
pub struct ResultTable {
    path: PathBuf,
}

impl ResultTable {
    /// Open the table, creating it with a header when absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let path = path.into();
        open_append(&path, &ResultRow::HEADER)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it.
    pub fn append(&self, row: &ResultRow) -> Result<(), OutputError> {
        let file = open_append(&self.path, &ResultRow::HEADER)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .serialize(row)
            .map_err(|e| OutputError::csv(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| OutputError::io(&self.path, e))?;
        debug!("Appended row for {}", row.document);
        Ok(())
    }

    /// Replace the row of the same document in place, keeping row order.
    ///
    /// The table is rewritten through a temp file in the same directory.
    /// Falls back to appending when the document has no row yet.
    pub fn replace(&self, row: &ResultRow) -> Result<(), OutputError> {
        let mut rows = self.rows()?;
        let Some(slot) = rows.iter_mut().find(|r| r.document == row.document) else {
            return self.append(row);
        };
        *slot = row.clone();

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| OutputError::io(&self.path, e))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for row in &rows {
                writer
                    .serialize(row)
                    .map_err(|e| OutputError::csv(&self.path, e))?;
            }
            writer
                .flush()
                .map_err(|e| OutputError::io(&self.path, e))?;
        }
        tmp.as_file_mut()
            .flush()
            .map_err(|e| OutputError::io(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| OutputError::io(&self.path, e.error))?;

        debug!("Replaced row for {}", row.document);
        Ok(())
    }

    /// Documents that already have a row.
    pub fn documents(&self) -> Result<HashSet<String>, OutputError> {
        Ok(self.rows()?.into_iter().map(|r| r.document).collect())
    }

    /// Drop every row, keeping the header.
    pub fn truncate(&self) -> Result<(), OutputError> {
        reset(&self.path, &ResultRow::HEADER)
    }

    /// Read all rows back.
    pub fn rows(&self) -> Result<Vec<ResultRow>, OutputError> {
        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|e| OutputError::csv(&self.path, e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<ResultRow>, _>>()
            .map_err(|e| OutputError::csv(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(doc: &str, url: &str) -> ResultRow {
        ResultRow {
            document: doc.to_string(),
            product_name: "Orius, 200 EW".to_string(),
            latest_sds_url: url.to_string(),
            ..ResultRow::default()
        }
    }

    #[test]
    fn creates_header_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/output.csv");
        let table = ResultTable::open(&path).unwrap();

        table.append(&row("a.pdf", "https://x/a.pdf")).unwrap();
        table.append(&row("b.pdf", "")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "document,product_name,manufacturer_supplier,current_sds_version,current_sds_date,latest_sds_url,latest_sds_version,latest_sds_date"
        );
        assert_eq!(
            lines.next().unwrap(),
            "a.pdf,\"Orius, 200 EW\",,,,https://x/a.pdf,,"
        );

        let rows = table.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].document, "b.pdf");
    }

    #[test]
    fn reopen_does_not_repeat_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        ResultTable::open(&path).unwrap().append(&row("a.pdf", "")).unwrap();
        ResultTable::open(&path).unwrap().append(&row("b.pdf", "")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("document,").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn replace_rewrites_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.csv");
        let table = ResultTable::open(&path).unwrap();
        table.append(&row("a.pdf", "ERROR: stage 1 failed")).unwrap();
        table.append(&row("b.pdf", "")).unwrap();

        table.replace(&row("a.pdf", "https://x/a.pdf")).unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].document, "a.pdf");
        assert_eq!(rows[0].latest_sds_url, "https://x/a.pdf");
        assert_eq!(rows[1].document, "b.pdf");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("document,").count(), 1);
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            1,
            "temp file left behind"
        );
    }

    #[test]
    fn replace_appends_unknown_document() {
        let dir = TempDir::new().unwrap();
        let table = ResultTable::open(dir.path().join("output.csv")).unwrap();
        table.replace(&row("a.pdf", "")).unwrap();
        assert_eq!(
            table.documents().unwrap(),
            HashSet::from(["a.pdf".to_string()])
        );
    }

    #[test]
    fn truncate_keeps_header() {
        let dir = TempDir::new().unwrap();
        let table = ResultTable::open(dir.path().join("output.csv")).unwrap();
        table.append(&row("a.pdf", "")).unwrap();
        table.truncate().unwrap();
        assert!(table.rows().unwrap().is_empty());
    }
}
