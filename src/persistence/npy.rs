//! NPY codec for dense row-major `f32` matrices.
//!
//! Layout:
//! `[magic: "\x93NUMPY"][major: u8][minor: u8][header_len: u16 (v1) | u32 (v2, v3)]`
//! followed by an ASCII dict literal describing dtype, order, and shape,
//! space-padded and newline-terminated so the data starts on a 64-byte
//! boundary, then `rows * cols` little-endian f32 values.
//!
//! Only 2-d, C-ordered `<f4` arrays are accepted on read.

use crate::error::{NotesError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Data section alignment used by the writer.
const ALIGNMENT: usize = 64;

/// A decoded matrix: its shape plus row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

/// Encode a `rows x cols` row-major matrix as an NPY v1.0 document.
pub fn encode(rows: usize, cols: usize, data: &[f32]) -> Vec<u8> {
    debug_assert_eq!(rows * cols, data.len());

    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    let preamble = MAGIC.len() + 4;
    let unpadded = preamble + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut buf = Vec::with_capacity(preamble + header_len + data.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(header_len as u16).to_le_bytes());
    buf.extend_from_slice(dict.as_bytes());
    buf.resize(buf.len() + padding, b' ');
    buf.push(b'\n');
    for &val in data {
        buf.extend_from_slice(&val.to_le_bytes());
    }
    buf
}

/// Decode an NPY document holding a 2-d little-endian f32 matrix.
pub fn decode(bytes: &[u8]) -> Result<Matrix> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NotesError::corrupt("vector file is not an NPY array"));
    }

    let (header_len, header_start) = match bytes[6] {
        1 => {
            let raw = bytes
                .get(8..10)
                .ok_or_else(|| NotesError::corrupt("NPY preamble truncated"))?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = bytes
                .get(8..12)
                .ok_or_else(|| NotesError::corrupt("NPY preamble truncated"))?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                12,
            )
        }
        major => {
            return Err(NotesError::corrupt(format!(
                "unsupported NPY version {}",
                major
            )))
        }
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| NotesError::corrupt("NPY header truncated"))?;
    let header = std::str::from_utf8(header)
        .map_err(|_| NotesError::corrupt("NPY header is not valid text"))?;

    let descr = quoted_value(field(header, "descr")?)?;
    if descr != "<f4" {
        return Err(NotesError::corrupt(format!(
            "unsupported NPY dtype '{}', expected '<f4'",
            descr
        )));
    }
    if field(header, "fortran_order")?.starts_with("True") {
        return Err(NotesError::corrupt("Fortran-ordered NPY arrays are not supported"));
    }
    let (rows, cols) = shape_value(field(header, "shape")?)?;

    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| NotesError::corrupt("NPY shape overflows"))?;
    let payload = &bytes[data_start..];
    if payload.len() != expected {
        return Err(NotesError::corrupt(format!(
            "NPY data holds {} bytes, shape ({}, {}) needs {}",
            payload.len(),
            rows,
            cols,
            expected
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(Matrix { rows, cols, data })
}

/// The text following `'key':` in the header dict.
fn field<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let needle = format!("'{}'", key);
    let start = header
        .find(&needle)
        .ok_or_else(|| NotesError::corrupt(format!("NPY header has no '{}'", key)))?;
    let rest = header[start + needle.len()..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| NotesError::corrupt(format!("NPY header key '{}' has no value", key)))?;
    Ok(rest.trim_start())
}

fn quoted_value(s: &str) -> Result<&str> {
    let quote = s
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NotesError::corrupt("NPY dtype is not a string"))?;
    let body = &s[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| NotesError::corrupt("NPY dtype string is unterminated"))?;
    Ok(&body[..end])
}

fn shape_value(s: &str) -> Result<(usize, usize)> {
    let body = s
        .strip_prefix('(')
        .and_then(|rest| rest.find(')').map(|end| &rest[..end]))
        .ok_or_else(|| NotesError::corrupt("NPY shape is not a tuple"))?;

    let dims = body
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| NotesError::corrupt(format!("invalid NPY dimension '{}'", d)))
        })
        .collect::<Result<Vec<_>>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(NotesError::corrupt(format!(
            "expected a 2-d NPY array, found {} dimensions",
            dims.len()
        ))),
    }
}
