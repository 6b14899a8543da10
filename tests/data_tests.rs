//! Tests for typed payload I/O
//!
//! These tests verify:
//! - Dimension declaration and zero-fill
//! - Whole-array round-trips for every element type
//! - Element coercion on read
//! - Linear block reads and writes
//! - Hyperslab scatter/gather and its validation errors

use arbordb::{DataType, Environment, Error, File, Mode, NodeId, Slab};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_db() -> (TempDir, File, NodeId) {
    let temp_dir = TempDir::new().unwrap();
    let env = Environment::new();
    let db = env.open(temp_dir.path().join("db.adb"), Mode::Create).unwrap();
    let root = db.root().unwrap();
    (temp_dir, db, root)
}

fn data_node(db: &File, root: NodeId, dtype: DataType, dims: &[u64]) -> NodeId {
    let node = db.create(root, "data").unwrap();
    db.set_dimensions(node, dtype, dims).unwrap();
    node
}

// =============================================================================
// Dimension Tests
// =============================================================================

#[test]
fn test_set_dimensions_zero_fills() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[5]);
    assert_eq!(db.node_type(node).unwrap(), DataType::I4);
    assert_eq!(db.dimensions(node).unwrap(), vec![5]);
    assert_eq!(db.read_all::<i32>(node).unwrap(), vec![0; 5]);
}

#[test]
fn test_redeclare_replaces_payload() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3]);
    db.write_all(node, &[1i32, 2, 3]).unwrap();

    db.set_dimensions(node, DataType::R8, &[2, 2]).unwrap();
    assert_eq!(db.node_type(node).unwrap(), DataType::R8);
    assert_eq!(db.read_all::<f64>(node).unwrap(), vec![0.0; 4]);
}

#[test]
fn test_clear_to_empty() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3]);
    db.set_dimensions(node, DataType::Empty, &[]).unwrap();
    assert_eq!(db.node_type(node).unwrap(), DataType::Empty);
    assert_eq!(db.rank(node).unwrap(), 0);
    assert!(matches!(db.read_all::<i32>(node), Err(Error::NoData)));
}

#[test]
fn test_dimension_validation() {
    let (_temp, db, root) = setup_temp_db();
    let node = db.create(root, "n").unwrap();

    assert!(matches!(
        db.set_dimensions(node, DataType::I4, &[]),
        Err(Error::BadRank(0))
    ));
    assert!(matches!(
        db.set_dimensions(node, DataType::I4, &[1; 13]),
        Err(Error::BadRank(13))
    ));
    assert!(matches!(
        db.set_dimensions(node, DataType::I4, &[4, 0]),
        Err(Error::BadDimensionValue)
    ));
    assert!(matches!(
        db.set_dimensions(node, DataType::Link, &[1]),
        Err(Error::InvalidDataType(_))
    ));
}

// =============================================================================
// Whole-Array Tests
// =============================================================================

#[test]
fn test_round_trip_every_type() {
    let (_temp, db, root) = setup_temp_db();

    macro_rules! round_trip {
        ($name:expr, $dtype:expr, $t:ty, $values:expr) => {{
            let node = db.create(root, $name).unwrap();
            db.set_dimensions(node, $dtype, &[4]).unwrap();
            db.write_all(node, &$values).unwrap();
            assert_eq!(db.read_all::<$t>(node).unwrap(), $values.to_vec());
        }};
    }

    round_trip!("b1", DataType::B1, u8, [0u8, 1, 128, 255]);
    round_trip!("c1", DataType::C1, i8, [-128i8, -1, 0, 127]);
    round_trip!("i4", DataType::I4, i32, [i32::MIN, -1, 0, i32::MAX]);
    round_trip!("i8", DataType::I8, i64, [i64::MIN, -1, 0, i64::MAX]);
    round_trip!("u4", DataType::U4, u32, [0u32, 1, 2, u32::MAX]);
    round_trip!("u8", DataType::U8, u64, [0u64, 1, 2, u64::MAX]);
    round_trip!("r4", DataType::R4, f32, [-1.5f32, 0.0, 3.25, f32::MAX]);
    round_trip!("r8", DataType::R8, f64, [-1.5f64, 0.0, 3.25, f64::MAX]);
}

#[test]
fn test_read_coerces_element_type() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3]);
    db.write_all(node, &[1i32, 2, 3]).unwrap();

    assert_eq!(db.read_all::<f64>(node).unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(db.read_all::<i64>(node).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_write_all_coerces_into_stored_type() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3]);
    db.write_all(node, &[1.9f64, 2.1, -3.7]).unwrap();
    assert_eq!(db.read_all::<i32>(node).unwrap(), vec![1, 2, -3]);
}

#[test]
fn test_write_all_length_must_match() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3]);
    assert!(matches!(
        db.write_all(node, &[1i32, 2]),
        Err(Error::UnequalMemoryAndDiskDims)
    ));
}

#[test]
fn test_read_without_data() {
    let (_temp, db, root) = setup_temp_db();

    let node = db.create(root, "empty").unwrap();
    assert!(matches!(db.read_all::<i32>(node), Err(Error::NoData)));
    assert!(matches!(db.write_all(node, &[1i32]), Err(Error::NoData)));
}

// =============================================================================
// Block Tests
// =============================================================================

#[test]
fn test_block_splice_leaves_neighbors() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[10]);
    db.write_all(node, &(0..10).collect::<Vec<i32>>()).unwrap();

    db.write_block(node, 4, 6, &[40i32, 50, 60]).unwrap();
    assert_eq!(
        db.read_all::<i32>(node).unwrap(),
        vec![0, 1, 2, 40, 50, 60, 6, 7, 8, 9]
    );

    let mut out = [0i32; 3];
    db.read_block(node, 4, 6, &mut out).unwrap();
    assert_eq!(out, [40, 50, 60]);
}

#[test]
fn test_block_spans_row_boundaries() {
    // The block range is linear over the whole payload, not per-row.
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[3, 3]);
    db.write_all(node, &(0..9).collect::<Vec<i32>>()).unwrap();

    let mut out = [0i32; 4];
    db.read_block(node, 3, 6, &mut out).unwrap();
    assert_eq!(out, [2, 3, 4, 5]);
}

#[test]
fn test_block_bounds_and_type_errors() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[10]);
    let mut out = [0i32; 3];
    assert!(matches!(
        db.read_block(node, 0, 2, &mut out),
        Err(Error::StartOutOfRange)
    ));
    assert!(matches!(
        db.read_block(node, 9, 11, &mut out),
        Err(Error::EndOutOfRange)
    ));
    assert!(matches!(
        db.read_block(node, 6, 4, &mut out),
        Err(Error::MinimumGreaterThanMaximum)
    ));
    assert!(matches!(
        db.write_block(node, 1, 3, &[1.0f64, 2.0, 3.0]),
        Err(Error::InvalidDataType(_))
    ));
    // Reads coerce freely.
    let mut fout = [0f64; 3];
    db.read_block(node, 1, 3, &mut fout).unwrap();
}

// =============================================================================
// Hyperslab Tests
// =============================================================================

#[test]
fn test_slab_round_trip_leaves_complement() {
    let (_temp, db, root) = setup_temp_db();

    // 4x3 grid of i4, first axis fastest.
    let node = data_node(&db, root, DataType::I4, &[4, 3]);
    db.write_all(node, &(0..12).collect::<Vec<i32>>()).unwrap();

    // Overwrite the middle column.
    let disk = [Slab::new(1, 4, 1), Slab::new(2, 2, 1)];
    let mem = [Slab::new(1, 4, 1)];
    db.write_slab(node, &disk, &[4], &mem, &[100i32, 101, 102, 103])
        .unwrap();

    let all = db.read_all::<i32>(node).unwrap();
    assert_eq!(&all[0..4], &[0, 1, 2, 3]);
    assert_eq!(&all[4..8], &[100, 101, 102, 103]);
    assert_eq!(&all[8..12], &[8, 9, 10, 11]);

    // Gather it back into a larger memory array; the complement of the
    // memory selection keeps its prior contents.
    let mut buf = vec![-1i32; 8];
    let mem2 = [Slab::new(1, 4, 1), Slab::new(2, 2, 1)];
    db.read_slab(node, &disk, &[4, 2], &mem2, &mut buf).unwrap();
    assert_eq!(buf, vec![-1, -1, -1, -1, 100, 101, 102, 103]);
}

#[test]
fn test_slab_strided_read() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[10]);
    db.write_all(node, &(0..10).collect::<Vec<i32>>()).unwrap();

    let mut out = vec![0i32; 5];
    db.read_slab(
        node,
        &[Slab::new(1, 10, 2)],
        &[5],
        &[Slab::new(1, 5, 1)],
        &mut out,
    )
    .unwrap();
    assert_eq!(out, vec![0, 2, 4, 6, 8]);
}

#[test]
fn test_slab_validation_errors_in_order() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[10]);
    let mem = [Slab::new(1, 1, 1)];
    let mut out = [0i32; 1];

    let cases: [(Slab, Error); 4] = [
        (Slab::new(0, 5, 1), Error::StartOutOfRange),
        (Slab::new(1, 11, 1), Error::EndOutOfRange),
        (Slab::new(5, 3, 1), Error::MinimumGreaterThanMaximum),
        (Slab::new(1, 4, 9), Error::BadStride),
    ];
    for (slab, expected) in cases {
        let got = db
            .read_slab(node, &[slab], &[1], &mem, &mut out)
            .unwrap_err();
        assert_eq!(got.code(), expected.code(), "slab {slab:?}");
    }
}

#[test]
fn test_slab_point_count_mismatch() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[10]);
    let mut out = [0i32; 3];
    assert!(matches!(
        db.read_slab(
            node,
            &[Slab::new(1, 4, 1)],
            &[3],
            &[Slab::new(1, 3, 1)],
            &mut out,
        ),
        Err(Error::UnequalMemoryAndDiskDims)
    ));
}

#[test]
fn test_slab_write_coerces_into_stored_type() {
    let (_temp, db, root) = setup_temp_db();

    let node = data_node(&db, root, DataType::I4, &[4]);
    db.write_slab(
        node,
        &[Slab::new(1, 4, 1)],
        &[4],
        &[Slab::new(1, 4, 1)],
        &[1.9f64, -2.9, 3.5, 4.0],
    )
    .unwrap();

    // Values land as truncated i32 because the dataset stores I4.
    let out: Vec<i32> = db.read_all(node).unwrap();
    assert_eq!(out, vec![1, -2, 3, 4]);
}

// =============================================================================
// Storage Layout Tests
// =============================================================================

#[test]
fn test_large_payload_persists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("big.adb");
    let env = Environment::new();

    // 100k doubles is far past the compact threshold, so this payload
    // takes the block path through the codec.
    let values: Vec<f64> = (0..100_000).map(|i| i as f64 * 0.5).collect();
    {
        let db = env.open(&path, Mode::Create).unwrap();
        let root = db.root().unwrap();
        let node = db.create(root, "field").unwrap();
        db.set_dimensions(node, DataType::R8, &[100_000]).unwrap();
        db.write_all(node, &values).unwrap();
        db.close().unwrap();
    }
    {
        let db = env.open(&path, Mode::ReadOnly).unwrap();
        let root = db.root().unwrap();
        let node = db.node_id(root, "field").unwrap();
        assert_eq!(db.read_all::<f64>(node).unwrap(), values);
    }
}
