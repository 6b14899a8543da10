//! Typed payload access: whole-array, linear-block, and hyperslab I/O with
//! on-the-fly element coercion.
//!
//! Payload bytes live in the owning container's hidden data entry in
//! logical element order, first axis fastest. Reads coerce the stored
//! element type to the caller's type through [`Value`], and writes coerce
//! the other way, except linear-block writes which demand an exact type
//! match because they splice raw element bytes.

pub mod slab;

use crate::error::{Error, Result};
use crate::store::{Dataset, Layout};
use crate::types::{DataType, Scalar, Value, MAX_DIMENSIONS};

pub use slab::{Selection, Slab};

// =============================================================================
// Element codecs
// =============================================================================

/// Decode one stored element starting at `bytes`
pub fn decode_value(dtype: DataType, bytes: &[u8]) -> Value {
    match dtype {
        DataType::B1 => u8::read_le(&bytes[..1]).to_value(),
        DataType::C1 => i8::read_le(&bytes[..1]).to_value(),
        DataType::I4 => i32::read_le(&bytes[..4]).to_value(),
        DataType::I8 => i64::read_le(&bytes[..8]).to_value(),
        DataType::U4 => u32::read_le(&bytes[..4]).to_value(),
        DataType::U8 => u64::read_le(&bytes[..8]).to_value(),
        DataType::R4 => f32::read_le(&bytes[..4]).to_value(),
        DataType::R8 => f64::read_le(&bytes[..8]).to_value(),
        DataType::Empty | DataType::Link => Value::I(0),
    }
}

/// Append one element of `dtype` encoded from `value`
pub fn encode_value(dtype: DataType, value: Value, out: &mut Vec<u8>) {
    match dtype {
        DataType::B1 => u8::from_value(value).write_le(out),
        DataType::C1 => i8::from_value(value).write_le(out),
        DataType::I4 => i32::from_value(value).write_le(out),
        DataType::I8 => i64::from_value(value).write_le(out),
        DataType::U4 => u32::from_value(value).write_le(out),
        DataType::U8 => u64::from_value(value).write_le(out),
        DataType::R4 => f32::from_value(value).write_le(out),
        DataType::R8 => f64::from_value(value).write_le(out),
        DataType::Empty | DataType::Link => {}
    }
}

// =============================================================================
// Dimension setup
// =============================================================================

/// Validate a dimension list and return the payload size in bytes
pub fn check_dimensions(dtype: DataType, dims: &[u64]) -> Result<u64> {
    if dims.is_empty() || dims.len() > MAX_DIMENSIONS {
        return Err(Error::BadRank(dims.len()));
    }
    let mut npoints: u64 = 1;
    for &d in dims {
        if d < 1 {
            return Err(Error::BadDimensionValue);
        }
        npoints = npoints.checked_mul(d).ok_or(Error::DimensionsTooLarge)?;
    }
    npoints
        .checked_mul(dtype.element_size() as u64)
        .filter(|&bytes| bytes <= isize::MAX as u64)
        .ok_or(Error::DimensionsTooLarge)
}

/// Build a zero-filled dataset, choosing compact or block placement by the
/// payload size against `compact_threshold`
pub fn zeroed_dataset(dtype: DataType, dims: &[u64], compact_threshold: u64) -> Result<Dataset> {
    let bytes = check_dimensions(dtype, dims)?;
    let layout = if bytes > compact_threshold {
        Layout::Block
    } else {
        Layout::Compact
    };
    Ok(Dataset::new(
        dtype,
        dims.to_vec(),
        layout,
        vec![0u8; bytes as usize],
    ))
}

// =============================================================================
// Text datasets
// =============================================================================

/// Build a character dataset holding `text` plus a trailing NUL, as the
/// hidden bookkeeping entries store their literal strings
pub fn text_dataset(text: &str) -> Dataset {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    Dataset::new(
        DataType::C1,
        vec![bytes.len() as u64],
        Layout::Compact,
        bytes,
    )
}

/// Recover the string of a character dataset, dropping trailing NULs
pub fn dataset_text(ds: &Dataset) -> String {
    let end = ds
        .bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&ds.bytes[..end]).into_owned()
}

// =============================================================================
// Whole-array I/O
// =============================================================================

/// Read every element, coerced to `T`
pub fn read_all<T: Scalar>(ds: &Dataset) -> Vec<T> {
    let esize = ds.dtype.element_size();
    if esize == 0 {
        return Vec::new();
    }
    ds.bytes
        .chunks_exact(esize)
        .map(|chunk| T::from_value(decode_value(ds.dtype, chunk)))
        .collect()
}

/// Overwrite every element, coercing `data` into the stored type.
///
/// `data` must cover the payload exactly.
pub fn write_all<T: Scalar>(ds: &mut Dataset, data: &[T]) -> Result<()> {
    if data.len() as u64 != ds.npoints() {
        return Err(Error::UnequalMemoryAndDiskDims);
    }
    let mut bytes = Vec::with_capacity(ds.bytes.len());
    for &v in data {
        encode_value(ds.dtype, v.to_value(), &mut bytes);
    }
    ds.bytes = bytes;
    Ok(())
}

// =============================================================================
// Linear block I/O
// =============================================================================

/// Validate a 1-based inclusive linear range and return its 0-based bounds
fn check_block(ds: &Dataset, b_start: u64, b_end: u64) -> Result<(usize, usize)> {
    if b_start < 1 {
        return Err(Error::StartOutOfRange);
    }
    if b_end > ds.npoints() {
        return Err(Error::EndOutOfRange);
    }
    if b_start > b_end {
        return Err(Error::MinimumGreaterThanMaximum);
    }
    Ok((b_start as usize - 1, b_end as usize))
}

/// Read the linear element range `b_start..=b_end` (1-based), coerced to `T`
pub fn read_block<T: Scalar>(ds: &Dataset, b_start: u64, b_end: u64, out: &mut [T]) -> Result<()> {
    let (lo, hi) = check_block(ds, b_start, b_end)?;
    if out.len() != hi - lo {
        return Err(Error::UnequalMemoryAndDiskDims);
    }
    let esize = ds.dtype.element_size();
    for (slot, chunk) in out
        .iter_mut()
        .zip(ds.bytes[lo * esize..hi * esize].chunks_exact(esize))
    {
        *slot = T::from_value(decode_value(ds.dtype, chunk));
    }
    Ok(())
}

/// Overwrite the linear element range `b_start..=b_end` (1-based).
///
/// The element type must match the stored type exactly.
pub fn write_block<T: Scalar>(ds: &mut Dataset, b_start: u64, b_end: u64, data: &[T]) -> Result<()> {
    if T::DATA_TYPE != ds.dtype {
        return Err(Error::InvalidDataType(T::DATA_TYPE.code().to_string()));
    }
    let (lo, hi) = check_block(ds, b_start, b_end)?;
    if data.len() != hi - lo {
        return Err(Error::UnequalMemoryAndDiskDims);
    }
    let esize = ds.dtype.element_size();
    let mut bytes = Vec::with_capacity(data.len() * esize);
    for &v in data {
        v.write_le(&mut bytes);
    }
    ds.bytes[lo * esize..hi * esize].copy_from_slice(&bytes);
    Ok(())
}

// =============================================================================
// Hyperslab I/O
// =============================================================================

/// Scatter the disk selection of `ds` into the memory selection of `out`.
///
/// `out` covers the full memory array of `mem_dims`; only the selected
/// positions are written, the complement is untouched. Elements are
/// coerced to `T`.
pub fn read_slab<T: Scalar>(
    ds: &Dataset,
    disk: &Selection,
    mem_dims: &[u64],
    mem: &Selection,
    out: &mut [T],
) -> Result<()> {
    let mem_total: u64 = mem_dims.iter().product();
    if out.len() as u64 != mem_total || disk.npoints() != mem.npoints() {
        return Err(Error::UnequalMemoryAndDiskDims);
    }
    let esize = ds.dtype.element_size();
    for (disk_off, mem_off) in disk.linear_offsets().into_iter().zip(mem.linear_offsets()) {
        let at = disk_off as usize * esize;
        out[mem_off as usize] = T::from_value(decode_value(ds.dtype, &ds.bytes[at..at + esize]));
    }
    Ok(())
}

/// Gather the memory selection of `data` into the disk selection of `ds`,
/// coercing elements into the stored type. Unselected disk elements keep
/// their values.
pub fn write_slab<T: Scalar>(
    ds: &mut Dataset,
    disk: &Selection,
    mem_dims: &[u64],
    mem: &Selection,
    data: &[T],
) -> Result<()> {
    let mem_total: u64 = mem_dims.iter().product();
    if data.len() as u64 != mem_total || disk.npoints() != mem.npoints() {
        return Err(Error::UnequalMemoryAndDiskDims);
    }
    let esize = ds.dtype.element_size();
    let mut buf = Vec::with_capacity(esize);
    for (disk_off, mem_off) in disk.linear_offsets().into_iter().zip(mem.linear_offsets()) {
        buf.clear();
        encode_value(ds.dtype, data[mem_off as usize].to_value(), &mut buf);
        let at = disk_off as usize * esize;
        ds.bytes[at..at + esize].copy_from_slice(&buf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i4_dataset(dims: &[u64]) -> Dataset {
        let mut ds = zeroed_dataset(DataType::I4, dims, 64 * 1024).unwrap();
        let n = ds.npoints() as i32;
        write_all(&mut ds, &(0..n).collect::<Vec<i32>>()).unwrap();
        ds
    }

    #[test]
    fn layout_follows_threshold() {
        let small = zeroed_dataset(DataType::R8, &[100], 64 * 1024).unwrap();
        assert_eq!(small.layout, Layout::Compact);
        let big = zeroed_dataset(DataType::R8, &[10_000], 64 * 1024).unwrap();
        assert_eq!(big.layout, Layout::Block);
    }

    #[test]
    fn read_all_coerces() {
        let ds = i4_dataset(&[4]);
        let as_f64: Vec<f64> = read_all(&ds);
        assert_eq!(as_f64, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn block_round_trip() {
        let mut ds = i4_dataset(&[10]);
        write_block(&mut ds, 3, 5, &[30i32, 40, 50]).unwrap();
        let mut out = [0i32; 3];
        read_block(&ds, 3, 5, &mut out).unwrap();
        assert_eq!(out, [30, 40, 50]);
        // Neighbors untouched.
        let all: Vec<i32> = read_all(&ds);
        assert_eq!(all[1], 1);
        assert_eq!(all[5], 5);
    }

    #[test]
    fn block_write_requires_stored_type() {
        let mut ds = i4_dataset(&[10]);
        assert!(matches!(
            write_block(&mut ds, 1, 2, &[1.0f64, 2.0]),
            Err(Error::InvalidDataType(_))
        ));
    }

    #[test]
    fn slab_scatter_gather() {
        // 4x3 grid, overwrite column 2 then read it back strided.
        let mut ds = i4_dataset(&[4, 3]);
        let disk = Selection::validate(&[Slab::new(1, 4, 1), Slab::new(2, 2, 1)], &[4, 3]).unwrap();
        let mem = Selection::validate(&[Slab::all(4)], &[4]).unwrap();
        write_slab(&mut ds, &disk, &[4], &mem, &[100i32, 101, 102, 103]).unwrap();

        let all: Vec<i32> = read_all(&ds);
        assert_eq!(&all[4..8], &[100, 101, 102, 103]);
        assert_eq!(all[0], 0);
        assert_eq!(all[8], 8);

        let mut out = vec![-1i32; 4];
        read_slab(&ds, &disk, &[4], &mem, &mut out).unwrap();
        assert_eq!(out, vec![100, 101, 102, 103]);
    }

    #[test]
    fn slab_point_count_must_match() {
        let ds = i4_dataset(&[4, 3]);
        let disk = Selection::validate(&[Slab::all(4), Slab::all(3)], &[4, 3]).unwrap();
        let mem = Selection::validate(&[Slab::all(4)], &[4]).unwrap();
        let mut out = vec![0i32; 4];
        assert!(matches!(
            read_slab(&ds, &disk, &[4], &mem, &mut out),
            Err(Error::UnequalMemoryAndDiskDims)
        ));
    }

    #[test]
    fn text_round_trip() {
        let ds = text_dataset("/Base/Zone 1");
        assert_eq!(ds.dtype, DataType::C1);
        assert_eq!(ds.dims, vec![13]);
        assert_eq!(*ds.bytes.last().unwrap(), 0);
        assert_eq!(dataset_text(&ds), "/Base/Zone 1");
    }

    #[test]
    fn dimension_checks() {
        assert!(matches!(
            check_dimensions(DataType::I4, &[]),
            Err(Error::BadRank(0))
        ));
        assert!(matches!(
            check_dimensions(DataType::I4, &[1; 13]),
            Err(Error::BadRank(13))
        ));
        assert!(matches!(
            check_dimensions(DataType::I4, &[3, 0]),
            Err(Error::BadDimensionValue)
        ));
        assert!(matches!(
            check_dimensions(DataType::I8, &[u64::MAX, 2]),
            Err(Error::DimensionsTooLarge)
        ));
    }
}
