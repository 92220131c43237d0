//! Manifest loading
//!
//! The manifest is a delimited table with a header row. Three columns matter:
//! the record id and the primary/secondary locations (names configurable via
//! [`ColumnConfig`]). Other columns are ignored.

use crate::config::{ColumnConfig, delimiter_byte};
use crate::error::{ManifestError, Result};
use crate::layout::is_safe_record_id;
use crate::types::RecordId;
use std::collections::HashSet;
use std::path::Path;

/// One usable manifest row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestRow {
    /// Record id
    pub id: RecordId,
    /// Preferred location
    pub primary: String,
    /// Fallback location
    pub secondary: String,
}

/// Load and validate a manifest
///
/// Rows with an empty id or an empty location cell are dropped. Fails when the
/// file is missing or unreadable, a required column is absent, an id repeats,
/// or an id cannot be used as a file name. A delimiter that is not a single
/// ASCII byte (or is a quote or newline) is a configuration error.
pub fn load_manifest(
    path: &Path,
    columns: &ColumnConfig,
    delimiter: char,
) -> Result<Vec<ManifestRow>> {
    let delimiter = delimiter_byte("manifest_delimiter", delimiter)?;
    if !path.is_file() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let unreadable = |e: csv::Error| ManifestError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(unreadable)?;

    let headers = reader.headers().map_err(unreadable)?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ManifestError::MissingColumn {
                column: name.to_string(),
            })
    };
    let id_idx = column_index(&columns.id)?;
    let primary_idx = column_index(&columns.primary)?;
    let secondary_idx = column_index(&columns.secondary)?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut dropped = 0usize;

    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = record.map_err(unreadable)?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

        let (id, primary, secondary) = (cell(id_idx), cell(primary_idx), cell(secondary_idx));
        if id.is_empty() || primary.is_empty() || secondary.is_empty() {
            tracing::debug!(row, id, "skipping manifest row with missing id or location");
            dropped += 1;
            continue;
        }
        if !is_safe_record_id(id) {
            return Err(ManifestError::InvalidId {
                id: id.to_string(),
                row,
            }
            .into());
        }
        if !seen.insert(id.to_string()) {
            return Err(ManifestError::DuplicateId {
                id: id.to_string(),
                row,
            }
            .into());
        }

        rows.push(ManifestRow {
            id: RecordId::new(id),
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        });
    }

    tracing::info!(
        ?path,
        rows = rows.len(),
        dropped,
        "loaded manifest"
    );
    Ok(rows)
}

/// Drop rows whose artifact already exists (re-run idempotence)
pub fn exclude_existing(rows: Vec<ManifestRow>, existing: &HashSet<RecordId>) -> Vec<ManifestRow> {
    let before = rows.len();
    let remaining: Vec<_> = rows
        .into_iter()
        .filter(|row| !existing.contains(&row.id))
        .collect();
    tracing::info!(
        skipped = before - remaining.len(),
        remaining = remaining.len(),
        "excluded records already downloaded"
    );
    remaining
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    fn columns() -> ColumnConfig {
        ColumnConfig {
            id: "id".into(),
            primary: "main".into(),
            secondary: "backup".into(),
        }
    }

    fn write_manifest(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("manifest.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_rows_in_file_order_and_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "id,company,main,backup\n\
             b,Acme,http://a/b.pdf,http://c/b\n\
             a,Beta,http://a/a.pdf,http://c/a\n",
        );

        let rows = load_manifest(&path, &columns(), ',').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "b");
        assert_eq!(rows[0].primary, "http://a/b.pdf");
        assert_eq!(rows[1].id, "a");
        assert_eq!(rows[1].secondary, "http://c/a");
    }

    #[test]
    fn rows_with_missing_locations_are_dropped() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "id;main;backup\n\
             ok;http://a;http://b\n\
             no-main;;http://b\n\
             no-backup;http://a;  \n\
             ;http://a;http://b\n",
        );

        let rows = load_manifest(&path, &columns(), ';').unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "ok");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();

        let err = load_manifest(&dir.path().join("nope.csv"), &columns(), ',').unwrap_err();

        assert!(matches!(
            err,
            Error::Manifest(ManifestError::NotFound { .. })
        ));
        assert!(err.is_precondition());
    }

    #[test]
    fn missing_column_is_named() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "id,main\nx,http://a\n");

        match load_manifest(&path, &columns(), ',') {
            Err(Error::Manifest(ManifestError::MissingColumn { column })) => {
                assert_eq!(column, "backup");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "id,main,backup\nx,http://a\n");

        assert!(matches!(
            load_manifest(&path, &columns(), ','),
            Err(Error::Manifest(ManifestError::Unreadable { .. }))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            "id,main,backup\nx,http://a,http://b\nx,http://c,http://d\n",
        );

        match load_manifest(&path, &columns(), ',') {
            Err(Error::Manifest(ManifestError::DuplicateId { id, row })) => {
                assert_eq!(id, "x");
                assert_eq!(row, 2);
            }
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "id,main,backup\n../x,http://a,http://b\n");

        assert!(matches!(
            load_manifest(&path, &columns(), ','),
            Err(Error::Manifest(ManifestError::InvalidId { .. }))
        ));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "id\u{a7}main\u{a7}backup\nx\u{a7}http://a\u{a7}http://b\n");

        match load_manifest(&path, &columns(), '\u{a7}') {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("manifest_delimiter"));
            }
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn exclude_existing_keeps_order() {
        let row = |id: &str| ManifestRow {
            id: RecordId::from(id),
            primary: "p".into(),
            secondary: "s".into(),
        };
        let existing: HashSet<_> = [RecordId::from("b")].into_iter().collect();

        let rows = exclude_existing(vec![row("a"), row("b"), row("c")], &existing);

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
