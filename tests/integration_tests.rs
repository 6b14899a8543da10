//! Integration tests for ArborDB
//!
//! End-to-end workflows across the whole stack: building a structured
//! mesh tree, partial updates through hyperslabs, persistence across
//! sessions, and a multi-file database stitched together with links.

use std::sync::Once;

use arbordb::{Config, DataType, Environment, FormatKind, Mode, Slab};
use tempfile::TempDir;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Install a subscriber once so `RUST_LOG` controls test output
fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

#[test]
fn test_mesh_database_lifecycle() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("flow.adb");
    let env = Environment::new();

    // Session 1: build the tree and write coordinates.
    {
        let db = env.open(&path, Mode::Create).unwrap();
        let root = db.root().unwrap();

        let base = db.create(root, "Base").unwrap();
        db.set_label(base, "MeshBase_t").unwrap();

        let zone = db.create(base, "Zone 1").unwrap();
        db.set_label(zone, "MeshZone_t").unwrap();
        let coords = db.create(zone, "GridCoordinates").unwrap();

        // 5x4 grid of x coordinates.
        let x = db.create(coords, "CoordinateX").unwrap();
        db.set_dimensions(x, DataType::R8, &[5, 4]).unwrap();
        let values: Vec<f64> = (0..20).map(|i| (i % 5) as f64).collect();
        db.write_all(x, &values).unwrap();

        db.close().unwrap();
    }

    // Session 2: patch one grid line through a hyperslab.
    {
        let db = env.open(&path, Mode::Modify).unwrap();
        let root = db.root().unwrap();
        let x = db
            .node_id(root, "Base/Zone 1/GridCoordinates/CoordinateX")
            .unwrap();
        assert_eq!(db.dimensions(x).unwrap(), vec![5, 4]);

        // Shift row 3 (all i, j = 3) by writing it wholesale.
        let disk = [Slab::new(1, 5, 1), Slab::new(3, 3, 1)];
        let mem = [Slab::new(1, 5, 1)];
        db.write_slab(x, &disk, &[5], &mem, &[10.0f64, 11.0, 12.0, 13.0, 14.0])
            .unwrap();
        db.close().unwrap();
    }

    // Session 3: read-only verification.
    {
        let db = env.open(&path, Mode::ReadOnly).unwrap();
        assert_eq!(db.format().unwrap(), FormatKind::Native);
        let root = db.root().unwrap();
        let x = db
            .node_id(root, "Base/Zone 1/GridCoordinates/CoordinateX")
            .unwrap();
        let all = db.read_all::<f64>(x).unwrap();
        assert_eq!(&all[10..15], &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(&all[0..5], &[0.0, 1.0, 2.0, 3.0, 4.0]);

        // Enumeration still walks in creation order after the reload.
        let names: Vec<String> = db
            .children(root, 0, usize::MAX)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Base"]);
    }
}

#[test]
fn test_multi_file_database_with_links() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let env = Environment::new();

    // A grid file holding the heavy coordinate arrays.
    {
        let db = env.open(temp_dir.path().join("grid.adb"), Mode::Create).unwrap();
        let root = db.root().unwrap();
        let coords = db.create(root, "GridCoordinates").unwrap();
        let x = db.create(coords, "CoordinateX").unwrap();
        db.set_dimensions(x, DataType::R8, &[100]).unwrap();
        db.write_all(x, &(0..100).map(|i| i as f64).collect::<Vec<_>>())
            .unwrap();
        db.close().unwrap();
    }

    // A solution file referencing the grid through a link.
    let db = env.open(temp_dir.path().join("soln.adb"), Mode::Create).unwrap();
    let root = db.root().unwrap();
    let zone = db.create(root, "Zone 1").unwrap();
    db.link(zone, "GridCoordinates", "grid.adb", "/GridCoordinates")
        .unwrap();

    // The path walk hops files transparently.
    let x = db
        .node_id(root, "Zone 1/GridCoordinates/CoordinateX")
        .unwrap();
    let mut out = [0f64; 10];
    db.read_block(x, 91, 100, &mut out).unwrap();
    assert_eq!(out[9], 99.0);

    db.close().unwrap();
    assert_eq!(env.open_count(), 0);
}

#[test]
fn test_compressed_environment_round_trip() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("packed.adb");
    let config = Config::builder().compression(6).build();
    let env = Environment::with_config(config);

    let values: Vec<i64> = vec![42; 200_000];
    {
        let db = env.open(&path, Mode::Create).unwrap();
        let root = db.root().unwrap();
        let n = db.create(root, "constant").unwrap();
        db.set_dimensions(n, DataType::I8, &[200_000]).unwrap();
        db.write_all(n, &values).unwrap();
        db.close().unwrap();
    }
    // 1.6 MB of identical values deflates to a sliver.
    assert!(std::fs::metadata(&path).unwrap().len() < 200_000);

    let db = env.open(&path, Mode::ReadOnly).unwrap();
    let root = db.root().unwrap();
    let n = db.node_id(root, "constant").unwrap();
    assert_eq!(db.read_all::<i64>(n).unwrap(), values);
}
