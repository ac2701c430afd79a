//! Reading and writing the TEXMEX `.fvecs` / `.ivecs` formats.
//!
//! Each record is a little-endian `i32` dimension followed by that many
//! little-endian 4-byte values (`f32` for fvecs, `i32` for ivecs). All
//! records in one file share a dimension.

use crate::constants::dataset::MAX_VECS_DIM;
use crate::error::{RecallError, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Read one record header, returning `None` at a clean end of file.
fn read_dim<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    let mut dim_buf = [0u8; 4];
    match reader.read_exact(&mut dim_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let dim = i32::from_le_bytes(dim_buf);
    if dim <= 0 || dim as usize > MAX_VECS_DIM {
        return Err(RecallError::invalid_format(format!(
            "record dimension {dim} outside 1..={MAX_VECS_DIM}"
        )));
    }
    Ok(Some(dim as usize))
}

/// Read all records, handing each record's raw payload to `push`.
fn read_records<P, F>(path: P, mut push: F) -> Result<(usize, usize)>
where
    P: AsRef<Path>,
    F: FnMut(&[u8]),
{
    let file = File::open(path.as_ref())?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut expected: Option<usize> = None;
    let mut rows = 0;
    let mut payload = Vec::new();

    while let Some(dim) = read_dim(&mut reader)? {
        match expected {
            None => expected = Some(dim),
            Some(d) if d != dim => {
                return Err(RecallError::invalid_format(format!(
                    "{}: record {} has dimension {}, expected {}",
                    path.as_ref().display(),
                    rows,
                    dim,
                    d
                )));
            }
            Some(_) => {}
        }
        if (dim as u64) * 4 > file_len {
            return Err(RecallError::invalid_format(format!(
                "{}: record {} claims {} values in a {} byte file",
                path.as_ref().display(),
                rows,
                dim,
                file_len
            )));
        }

        payload.resize(dim * 4, 0);
        reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                RecallError::invalid_format(format!(
                    "{}: truncated record {}",
                    path.as_ref().display(),
                    rows
                ))
            } else {
                e.into()
            }
        })?;
        push(&payload);
        rows += 1;
    }

    Ok((rows, expected.unwrap_or(0)))
}

/// Read an `.fvecs` file into a flattened buffer.
///
/// # Returns
/// `(vectors, n, d)`; an empty file yields `(vec![], 0, 0)`.
pub fn read_fvecs(path: impl AsRef<Path>) -> Result<(Vec<f32>, usize, usize)> {
    let mut vectors = Vec::new();
    let (n, d) = read_records(path, |payload| {
        vectors.extend(
            payload
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
    })?;
    Ok((vectors, n, d))
}

/// Read an `.ivecs` file as one id row per record.
pub fn read_ivecs(path: impl AsRef<Path>) -> Result<Vec<Vec<i64>>> {
    let mut rows = Vec::new();
    read_records(path, |payload| {
        rows.push(
            payload
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
                .collect(),
        );
    })?;
    Ok(rows)
}

/// Write a flattened buffer of `d`-wide rows as `.fvecs`.
pub fn write_fvecs(path: impl AsRef<Path>, vectors: &[f32], d: usize) -> Result<()> {
    if d == 0 || vectors.len() % d != 0 {
        return Err(RecallError::invalid_parameter(format!(
            "cannot write {} floats as rows of {}",
            vectors.len(),
            d
        )));
    }
    let dim = i32::try_from(d).map_err(|_| RecallError::invalid_parameter("dimension exceeds i32"))?;

    let mut writer = BufWriter::new(File::create(path)?);
    for row in vectors.chunks_exact(d) {
        writer.write_all(&dim.to_le_bytes())?;
        for x in row {
            writer.write_all(&x.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write id rows as `.ivecs`.
///
/// # Errors
/// Returns `InvalidParameter` for an id outside the `i32` range.
pub fn write_ivecs(path: impl AsRef<Path>, rows: &[Vec<i64>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        let k = i32::try_from(row.len())
            .map_err(|_| RecallError::invalid_parameter("row too long for ivecs"))?;
        writer.write_all(&k.to_le_bytes())?;
        for &id in row {
            let id = i32::try_from(id)
                .map_err(|_| RecallError::invalid_parameter(format!("id {id} does not fit in ivecs")))?;
            writer.write_all(&id.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}
