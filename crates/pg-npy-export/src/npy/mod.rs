//! NumPy `.npy` array files.
//!
//! Writes format version 1.0: the magic string `\x93NUMPY`, version bytes
//! `1 0`, a little-endian u16 header length, then an ASCII header dict
//! padded with spaces and terminated by `\n` so that the data starts on a
//! 64-byte boundary. Data follows in C order.
//!
//! | Storage | dtype    | Element                                 |
//! |---------|----------|-----------------------------------------|
//! | Int64   | `<i8`    | little-endian i64                       |
//! | Float64 | `<f8`    | little-endian f64                       |
//! | Bool    | `\|b1`   | one byte, 0 or 1                        |
//! | Text    | `<U{w}`  | `w` UTF-32LE code points, NUL padded    |

use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::pipeline::{ColumnArray, ColumnData};

const MAGIC: &[u8] = b"\x93NUMPY";
const VERSION: [u8; 2] = [1, 0];
const ALIGNMENT: usize = 64;

/// Consumer of finished column arrays.
pub trait ArrayWriter {
    /// Persist one column of `table`, returning where it was written.
    fn write_column(&self, table: &str, column: &ColumnArray) -> Result<PathBuf>;
}

/// Writes each column to `<output_dir>/<table>/<column>.npy`.
#[derive(Debug, Clone)]
pub struct NpyWriter {
    output_dir: PathBuf,
}

impl NpyWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path a column of `table` is written to.
    pub fn column_path(&self, table: &str, column: &str) -> PathBuf {
        self.output_dir
            .join(file_component(table))
            .join(format!("{}.npy", file_component(column)))
    }
}

impl ArrayWriter for NpyWriter {
    fn write_column(&self, table: &str, column: &ColumnArray) -> Result<PathBuf> {
        let path = self.column_path(table, &column.name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ExportError::write(dir, e))?;
        }

        let bytes = encode(column);
        std::fs::write(&path, &bytes).map_err(|e| ExportError::write(&path, e))?;

        debug!(
            "Wrote {} ({} values, {} bytes)",
            path.display(),
            column.len(),
            bytes.len()
        );
        Ok(path)
    }
}

/// NumPy dtype descriptor for a column.
pub fn descr(data: &ColumnData) -> String {
    match data {
        ColumnData::Int64(_) => "<i8".to_string(),
        ColumnData::Float64(_) => "<f8".to_string(),
        ColumnData::Bool(_) => "|b1".to_string(),
        ColumnData::Text(values) => format!("<U{}", text_width(values)),
    }
}

/// Encode a column as a complete `.npy` file.
pub fn encode(column: &ColumnArray) -> Bytes {
    let header = header(&descr(&column.data), column.len());
    let mut buf = BytesMut::with_capacity(header.len() + data_len(&column.data));
    buf.put_slice(&header);

    match &column.data {
        ColumnData::Int64(values) => values.iter().for_each(|v| buf.put_i64_le(*v)),
        ColumnData::Float64(values) => values.iter().for_each(|v| buf.put_f64_le(*v)),
        ColumnData::Bool(values) => values.iter().for_each(|v| buf.put_u8(u8::from(*v))),
        ColumnData::Text(values) => {
            let width = text_width(values);
            for value in values {
                let mut chars = 0;
                for c in value.chars() {
                    buf.put_u32_le(c as u32);
                    chars += 1;
                }
                buf.put_bytes(0, (width - chars) * 4);
            }
        }
    }

    buf.freeze()
}

/// Magic, version, header length and the padded header dict.
fn header(descr: &str, len: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({},), }}",
        descr, len
    );

    // magic + version + u16 length + dict + trailing newline
    let unpadded = MAGIC.len() + VERSION.len() + 2 + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out
}

/// Widest value in characters; NumPy needs at least one.
fn text_width(values: &[String]) -> usize {
    values
        .iter()
        .map(|v| v.chars().count())
        .max()
        .unwrap_or(0)
        .max(1)
}

fn data_len(data: &ColumnData) -> usize {
    match data {
        ColumnData::Int64(v) => v.len() * 8,
        ColumnData::Float64(v) => v.len() * 8,
        ColumnData::Bool(v) => v.len(),
        ColumnData::Text(v) => v.len() * text_width(v) * 4,
    }
}

/// Make a table or column name safe to use as one path component.
fn file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}
