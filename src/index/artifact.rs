//! On-disk formats for a built index.
//!
//! Two files are written per build:
//!
//! - the index artifact: an 8-byte magic, format version, metric tag,
//!   dimension and vector count, followed by the row-major little-endian
//!   `f32` data. The header alone is enough to report `ntotal`.
//! - the embedding matrix as a NumPy `.npy` v1.0 file (`<f4`, C order,
//!   shape `(n, D)`), for inspection with standard tooling.

use super::FlatL2Index;
use crate::error::{Result, SpotterError};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"SPTRIDX1";
const FORMAT_VERSION: u32 = 1;
const METRIC_L2: u32 = 1;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

/// Header of an index artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub metric: u32,
    pub dimension: usize,
    pub ntotal: usize,
}

/// Serialize an index.
pub fn write_index<W: Write>(index: &FlatL2Index, mut writer: W) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&METRIC_L2.to_le_bytes())?;
    writer.write_all(&(index.dimension() as u64).to_le_bytes())?;
    writer.write_all(&(index.ntotal() as u64).to_le_bytes())?;
    writer.write_all(&floats_to_bytes(index.as_slice()))?;
    writer.flush()?;
    Ok(())
}

/// Read just the header of an index artifact.
pub fn read_header<R: Read>(mut reader: R) -> Result<IndexHeader> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SpotterError::IndexFormat("not a spotter index file".to_string()));
    }

    let version = read_u32(&mut reader)?;
    if version != FORMAT_VERSION {
        return Err(SpotterError::IndexFormat(format!(
            "unsupported index format version {}",
            version
        )));
    }

    let metric = read_u32(&mut reader)?;
    if metric != METRIC_L2 {
        return Err(SpotterError::IndexFormat(format!("unknown metric tag {}", metric)));
    }

    Ok(IndexHeader {
        version,
        metric,
        dimension: read_u64(&mut reader)? as usize,
        ntotal: read_u64(&mut reader)? as usize,
    })
}

/// Deserialize an index.
pub fn read_index<R: Read>(mut reader: R) -> Result<FlatL2Index> {
    let header = read_header(&mut reader)?;
    let values = header
        .dimension
        .checked_mul(header.ntotal)
        .ok_or_else(|| SpotterError::IndexFormat("index shape overflows".to_string()))?;
    let data = read_floats(&mut reader, values)?;

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(SpotterError::IndexFormat("trailing bytes after index data".to_string()));
    }

    FlatL2Index::from_parts(header.dimension, header.ntotal, data)
}

/// Write an index artifact to a file.
pub fn save_index(index: &FlatL2Index, path: &Path) -> Result<()> {
    write_index(index, BufWriter::new(File::create(path)?))
}

/// Load an index artifact from a file.
pub fn load_index(path: &Path) -> Result<FlatL2Index> {
    read_index(BufReader::new(File::open(path)?))
}

/// Read the header of an index artifact file.
pub fn load_header(path: &Path) -> Result<IndexHeader> {
    read_header(BufReader::new(File::open(path)?))
}

/// Write the embedding matrix in `.npy` format.
pub fn write_npy<W: Write>(index: &FlatL2Index, mut writer: W) -> Result<()> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        index.ntotal(),
        index.dimension()
    );
    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    let header = format!("{}{}\n", dict, " ".repeat(padding));
    let header_len = u16::try_from(header.len())
        .map_err(|_| SpotterError::IndexFormat("npy header too long".to_string()))?;

    writer.write_all(NPY_MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    writer.write_all(&floats_to_bytes(index.as_slice()))?;
    writer.flush()?;
    Ok(())
}

/// Read an `.npy` matrix written by [`write_npy`]. Returns `(rows, cols, data)`.
pub fn read_npy<R: Read>(mut reader: R) -> Result<(usize, usize, Vec<f32>)> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(SpotterError::IndexFormat("not an npy file".to_string()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    if version[0] != 1 {
        return Err(SpotterError::IndexFormat(format!(
            "unsupported npy version {}.{}",
            version[0], version[1]
        )));
    }

    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    let mut header = vec![0u8; u16::from_le_bytes(len) as usize];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|_| SpotterError::IndexFormat("npy header is not text".to_string()))?;

    if !header.contains("'descr': '<f4'") || !header.contains("'fortran_order': False") {
        return Err(SpotterError::IndexFormat(format!(
            "expected a C-ordered float32 matrix, header was {}",
            header.trim()
        )));
    }

    let shape_re = Regex::new(r"'shape':\s*\((\d+),\s*(\d+)\)")
        .map_err(|e| SpotterError::IndexFormat(format!("Invalid shape pattern: {}", e)))?;
    let caps = shape_re
        .captures(&header)
        .ok_or_else(|| SpotterError::IndexFormat("npy header has no 2-d shape".to_string()))?;
    let parse = |i: usize| {
        caps[i]
            .parse::<usize>()
            .map_err(|e| SpotterError::IndexFormat(format!("bad npy shape: {}", e)))
    };
    let (rows, cols) = (parse(1)?, parse(2)?);

    let values = rows
        .checked_mul(cols)
        .ok_or_else(|| SpotterError::IndexFormat("npy shape overflows".to_string()))?;
    let data = read_floats(&mut reader, values)?;
    Ok((rows, cols, data))
}

/// Write the embedding matrix to an `.npy` file.
pub fn save_npy(index: &FlatL2Index, path: &Path) -> Result<()> {
    write_npy(index, BufWriter::new(File::create(path)?))
}

/// Load an `.npy` matrix from a file.
pub fn load_npy(path: &Path) -> Result<(usize, usize, Vec<f32>)> {
    read_npy(BufReader::new(File::open(path)?))
}

fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn read_floats<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let byte_len = count
        .checked_mul(4)
        .ok_or_else(|| SpotterError::IndexFormat("vector data too large".to_string()))?;
    // The header is untrusted; grow the buffer only as data actually arrives
    let mut bytes = Vec::new();
    reader.take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != byte_len {
        return Err(SpotterError::IndexFormat(format!(
            "truncated vector data: expected {} bytes, found {}",
            byte_len,
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatL2Index {
        FlatL2Index::build(&[vec![0.5, -1.25, 3.0], vec![f32::MIN_POSITIVE, 0.1, 7.75]]).unwrap()
    }

    #[test]
    fn test_index_reload_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.index");
        let index = sample();
        save_index(&index, &path).unwrap();

        let header = load_header(&path).unwrap();
        assert_eq!(header.ntotal, 2);
        assert_eq!(header.dimension, 3);

        let loaded = load_index(&path).unwrap();
        let original: Vec<u32> = index.as_slice().iter().map(|f| f.to_bits()).collect();
        let reloaded: Vec<u32> = loaded.as_slice().iter().map(|f| f.to_bits()).collect();
        assert_eq!(original, reloaded);
        assert_eq!(
            index.search(&[0.0, 0.0, 0.0], 2).unwrap(),
            loaded.search(&[0.0, 0.0, 0.0], 2).unwrap()
        );
    }

    #[test]
    fn test_empty_index_round_trip() {
        let mut buf = Vec::new();
        write_index(&FlatL2Index::build(&[]).unwrap(), &mut buf).unwrap();
        let loaded = read_index(buf.as_slice()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_rejects_foreign_and_truncated_files() {
        assert!(matches!(
            read_index(&b"NOTANIDXxxxxxxxxxxxxxxxxxxxxxxxxxx"[..]),
            Err(SpotterError::IndexFormat(_))
        ));

        let mut buf = Vec::new();
        write_index(&sample(), &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(read_index(buf.as_slice()), Err(SpotterError::IndexFormat(_))));
    }

    #[test]
    fn test_oversized_header_is_a_format_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&METRIC_L2.to_le_bytes());
        buf.extend_from_slice(&(1u64 << 30).to_le_bytes());
        buf.extend_from_slice(&(1u64 << 28).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        assert!(matches!(read_index(buf.as_slice()), Err(SpotterError::IndexFormat(_))));

        let dict = "{'descr': '<f4', 'fortran_order': False, 'shape': (268435456, 1073741824), }\n";
        let mut npy = Vec::new();
        npy.extend_from_slice(NPY_MAGIC);
        npy.extend_from_slice(&[1, 0]);
        npy.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        npy.extend_from_slice(dict.as_bytes());
        npy.extend_from_slice(&[0u8; 16]);
        assert!(matches!(read_npy(npy.as_slice()), Err(SpotterError::IndexFormat(_))));
    }

    #[test]
    fn test_npy_layout() {
        let mut buf = Vec::new();
        write_npy(&sample(), &mut buf).unwrap();

        assert_eq!(&buf[..6], NPY_MAGIC);
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % NPY_ALIGN, 0);
        assert_eq!(buf[10 + header_len - 1], b'\n');
        assert_eq!(buf.len(), 10 + header_len + 2 * 3 * 4);

        let (rows, cols, data) = read_npy(buf.as_slice()).unwrap();
        assert_eq!((rows, cols), (2, 3));
        assert_eq!(data, sample().as_slice());
    }
}
