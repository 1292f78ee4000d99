//! Append-only CSV storage keyed by a unique column.
//!
//! The header is fixed by the first write. Later appends reuse it verbatim:
//! header columns missing from a row are written empty, row fields missing
//! from the header are not persisted.

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::record::Record;

/// Every non-empty value of `unique_field` already stored in `path`.
///
/// A missing or empty file yields an empty set, as does a header without
/// `unique_field` (with a warning). Only the unique column has to be valid
/// UTF-8; rows where it is not are skipped.
pub fn load_existing_keys(path: &Path, unique_field: &str) -> Result<HashSet<String>, StorageError> {
    let mut keys = HashSet::new();
    if !has_content(path)? {
        return Ok(keys);
    }

    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let Some(idx) = rdr
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h == unique_field.as_bytes())
    else {
        warn!("Unique key '{unique_field}' not found in {}", path.display());
        return Ok(keys);
    };

    let mut invalid = 0;
    for row in rdr.byte_records() {
        let row = row.map_err(csv_err)?;
        match row.get(idx).filter(|v| !v.is_empty()).map(std::str::from_utf8) {
            Some(Ok(v)) => {
                keys.insert(v.to_string());
            }
            Some(Err(_)) => invalid += 1,
            None => {}
        }
    }
    if invalid > 0 {
        warn!(
            "{}: skipped {invalid} row(s) with a non UTF-8 '{unique_field}'",
            path.display()
        );
    }
    debug!("{} existing key(s) in {}", keys.len(), path.display());
    Ok(keys)
}

/// Append `rows` to `path`, creating the file and its header when needed.
///
/// Returns the number of rows written. Nothing happens, and no file is
/// created, when `rows` is empty.
pub fn append(path: &Path, rows: &[Record]) -> Result<usize, StorageError> {
    if rows.is_empty() {
        return Ok(0);
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let existing = if has_content(path)? {
        read_header(path)?
    } else {
        None
    };

    let open_err = |source| StorageError::Open {
        path: path.to_path_buf(),
        source,
    };
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)
        .map_err(open_err)?;

    let (header, fresh) = match existing {
        Some(h) => {
            if !ends_with_newline(&mut file).map_err(write_err)? {
                file.write_all(b"\n").map_err(write_err)?;
            }
            (h, false)
        }
        None => (header_for(rows), true),
    };
    warn_dropped(path, &header, rows);

    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
    if fresh {
        wtr.write_record(&header).map_err(csv_err)?;
    }
    for row in rows {
        wtr.write_record(header.iter().map(|col| row.get(col).unwrap_or("")))
            .map_err(csv_err)?;
    }
    wtr.flush().map_err(write_err)?;

    info!("Appended {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Sorted union of every field name of `rows`.
fn header_for(rows: &[Record]) -> Vec<String> {
    rows.iter()
        .flat_map(|r| r.fields())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>, StorageError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| StorageError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let header: &ByteRecord = rdr.byte_headers().map_err(|source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    if header.iter().all(<[u8]>::is_empty) {
        return Ok(None);
    }
    Ok(Some(
        header
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect(),
    ))
}

fn warn_dropped(path: &Path, header: &[String], rows: &[Record]) {
    let dropped: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.fields())
        .filter(|f| !header.iter().any(|h| h == f))
        .collect();
    if !dropped.is_empty() {
        warn!(
            "{}: column(s) {:?} not in existing header, not stored",
            path.display(),
            dropped
        );
    }
}

/// File exists and is not zero-length.
fn has_content(path: &Path) -> Result<bool, StorageError> {
    match fs::metadata(path) {
        Ok(m) => Ok(m.len() > 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
