//! End-to-end queries against single-file catalogs: binary, ASCII, and tab-table.
//!
//! Every catalog is written to a temporary directory, resolved through the
//! registry, and queried through `CatalogQuery`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use skycat::accumulator::Eviction;
use skycat::config::{CatalogConfig, SurveyFamily};
use skycat::coords::Frame;
use skycat::driver::binary::{serialize_binary_catalog, BinaryHandle, BinaryHeader, IdEncoding};
use skycat::driver::tab::{write_tab_table, TabHandle, TabOptions};
use skycat::driver::CatalogHandle;
use skycat::planner::SearchRegion;
use skycat::query::{CatalogQuery, RegionQuery, SortOrder};
use skycat::registry::{describe_file, CatalogDescriptor, CatalogRegistry, Locator, StorageKind};
use skycat::transport::CatalogTransport;
use skycat::SourceEntry;

fn grid() -> Vec<SourceEntry> {
    let mut entries = Vec::new();
    let mut id = 1.0;
    for dec_step in 0..17 {
        let dec = -80.0 + dec_step as f64 * 10.0;
        for ra_step in 0..48 {
            let ra = ra_step as f64 * 7.5;
            let mut e = SourceEntry::new(id, ra, dec, Frame::j2000());
            e.mags = vec![5.0 + (id % 10.0)];
            entries.push(e);
            id += 1.0;
        }
    }
    entries
}

fn write_binary(dir: &Path, name: &str, entries: &[SourceEntry], swap: bool) -> CatalogDescriptor {
    let header = BinaryHeader::new(
        entries.len(),
        true,
        IdEncoding::Scaled { places: 0 },
        0,
        1,
    );
    let path = dir.join(name);
    std::fs::write(&path, serialize_binary_catalog(&header, entries, swap).unwrap()).unwrap();
    describe_file(name, &path).unwrap()
}

fn ids(entries: &[SourceEntry]) -> Vec<f64> {
    let mut ids: Vec<f64> = entries.iter().map(|e| e.id).collect();
    ids.sort_by(f64::total_cmp);
    ids
}

fn whole_sky() -> RegionQuery {
    RegionQuery::new(SearchRegion::boxed(180.0, 0.0, 180.0, 90.0), Frame::j2000(), 100_000)
}

// ---- binary ----

#[test]
fn swapped_binary_reads_like_native() {
    let dir = tempfile::tempdir().unwrap();
    let entries = grid();
    let native = write_binary(dir.path(), "native.bin", &entries, false);
    let swapped = write_binary(dir.path(), "swapped.bin", &entries, true);

    let StorageKind::Binary(native_path) = &native.kind else {
        panic!("expected a binary catalog, got {:?}", native.kind);
    };
    let StorageKind::Binary(swapped_path) = &swapped.kind else {
        panic!("expected a binary catalog, got {:?}", swapped.kind);
    };
    let mut a = BinaryHandle::open(native_path).unwrap();
    let mut b = BinaryHandle::open(swapped_path).unwrap();
    assert!(!a.is_swapped());
    assert!(b.is_swapped());
    assert_eq!(a.len(), entries.len() as u64);
    assert_eq!(a.len(), b.len());
    for num in 1..=a.len() {
        assert_eq!(a.read(num).unwrap(), b.read(num).unwrap());
    }

    let q = RegionQuery::new(SearchRegion::boxed(100.0, 20.0, 15.0, 12.0), Frame::j2000(), 1000);
    let engine = CatalogQuery::new();
    assert_eq!(
        ids(&engine.query_region(&native, &q).unwrap()),
        ids(&engine.query_region(&swapped, &q).unwrap())
    );
}

#[test]
fn box_query_returns_exactly_the_enclosed_entries() {
    let dir = tempfile::tempdir().unwrap();
    let entries = grid();
    let d = write_binary(dir.path(), "grid.bin", &entries, false);

    let (ra, dec, half_ra, half_dec) = (100.0, 20.0, 15.0, 12.0);
    let q = RegionQuery::new(SearchRegion::boxed(ra, dec, half_ra, half_dec), Frame::j2000(), 1000);
    let found = CatalogQuery::new().query_region(&d, &q).unwrap();

    let expected: Vec<f64> = entries
        .iter()
        .filter(|e| {
            e.ra >= ra - half_ra
                && e.ra <= ra + half_ra
                && e.dec >= dec - half_dec
                && e.dec <= dec + half_dec
        })
        .map(|e| e.id)
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(ids(&found), expected);
}

#[test]
fn sequential_id_matches_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let entries = grid();
    let d = write_binary(dir.path(), "grid.bin", &entries, false);
    let engine = CatalogQuery::new();

    let all = engine.query_region(&d, &whole_sky()).unwrap();
    assert_eq!(all.len(), entries.len());
    for k in [1usize, 2, 48, 49, 500, entries.len()] {
        let by_id = engine
            .query_by_id(&d, &[k as f64], &Frame::j2000(), false)
            .unwrap();
        assert_eq!(by_id[0].as_ref(), Some(&all[k - 1]));
    }
}

#[test]
fn magnitude_eviction_keeps_brightest() {
    let dir = tempfile::tempdir().unwrap();
    let d = write_binary(dir.path(), "grid.bin", &grid(), false);
    let q = whole_sky()
        .with_eviction(Eviction::Magnitude)
        .sorted(SortOrder::Magnitude);
    let q = RegionQuery { max_count: 20, ..q };
    let found = CatalogQuery::new().query_region(&d, &q).unwrap();
    assert_eq!(found.len(), 20);
    assert!(found.iter().all(|e| e.mags[0] <= 5.0 + 1e-9));
}

#[test]
fn swapped_binary_without_magnitudes_reads_like_native() {
    let dir = tempfile::tempdir().unwrap();
    let entries: Vec<SourceEntry> = grid()
        .into_iter()
        .map(|mut e| {
            e.mags.clear();
            e
        })
        .collect();
    let header = BinaryHeader::new(entries.len(), true, IdEncoding::Float, 0, 0);
    let mut handles = Vec::new();
    for (name, swap) in [("plain.bin", false), ("flipped.bin", true)] {
        let path = dir.path().join(name);
        std::fs::write(&path, serialize_binary_catalog(&header, &entries, swap).unwrap()).unwrap();
        let handle = BinaryHandle::open(&path).unwrap();
        assert_eq!(handle.is_swapped(), swap, "{name}");
        assert_eq!(handle.header().nmag, 0);
        handles.push(handle);
    }
    let (a, b) = handles.split_at_mut(1);
    assert_eq!(a[0].len(), entries.len() as u64);
    for num in [1, 2, 400, entries.len() as u64] {
        let (x, y) = (a[0].read(num).unwrap(), b[0].read(num).unwrap());
        assert_eq!(x, y);
        assert!((x.ra - entries[num as usize - 1].ra).abs() < 1e-9);
    }
}

/// One B1950 star every 5 degrees along the equator, ids 1..=72.
fn write_equator(dir: &Path, name: &str) -> CatalogDescriptor {
    let entries: Vec<SourceEntry> = (0..72)
        .map(|k| {
            let mut e = SourceEntry::new(k as f64 + 1.0, k as f64 * 5.0, 0.0, Frame::b1950());
            e.mags = vec![10.0];
            e
        })
        .collect();
    let header = BinaryHeader::new(entries.len(), false, IdEncoding::Scaled { places: 0 }, 0, 1);
    let path = dir.join(name);
    std::fs::write(&path, serialize_binary_catalog(&header, &entries, false).unwrap()).unwrap();
    describe_file(name, &path).unwrap()
}

#[test]
fn wide_box_in_another_frame_matches_sorted_and_unsorted() {
    let dir = tempfile::tempdir().unwrap();
    let sorted = write_equator(dir.path(), "equator.ra");
    let unsorted = write_equator(dir.path(), "equator.bin");
    assert!(sorted.ra_sorted);
    assert!(!unsorted.ra_sorted);
    assert_eq!(sorted.frame, Frame::b1950());

    // J2000 RA 10 to 210; precession moves each star well under a degree.
    let q = RegionQuery::new(SearchRegion::boxed(110.0, 0.0, 100.0, 10.0), Frame::j2000(), 1000);
    let engine = CatalogQuery::new();
    let from_sorted = ids(&engine.query_region(&sorted, &q).unwrap());
    let from_unsorted = ids(&engine.query_region(&unsorted, &q).unwrap());
    assert_eq!(from_sorted, from_unsorted);
    for id in 3..=42 {
        assert!(from_sorted.contains(&(id as f64)), "star {id} missing");
    }
    assert!(from_sorted.iter().all(|&id| (2.0..=43.0).contains(&id)));
}

// ---- ASCII ----

#[test]
fn ascii_proper_motion_catalog_across_ra_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pm.cat");
    std::fs::write(
        &path,
        "/j/p\n\
         Three stars with proper motion\n\
         1 10.0    0.0 11.0 0.010 0.10\n\
         2 10.0005 0.0 12.0 0.020 0.20\n\
         3 350.0   0.0 13.0 0.030 0.30\n",
    )
    .unwrap();
    let d = describe_file("pm.cat", &path).unwrap();
    assert!(d.proper_motion);
    let engine = CatalogQuery::new();

    let q = RegionQuery::new(SearchRegion::boxed(355.0, 0.0, 6.0, 1.0), Frame::j2000(), 10);
    let found = engine.query_region(&d, &q).unwrap();
    assert_eq!(ids(&found), vec![3.0]);
    let star = &found[0];
    assert!((star.ra - 350.0).abs() < 1e-9);
    assert!((star.pm_ra - 0.030 * 15.0 / 3600.0).abs() < 1e-12);
    assert!((star.pm_dec - 0.30 / 3600.0).abs() < 1e-12);

    let q = RegionQuery::new(SearchRegion::boxed(0.0, 0.0, 1.0, 1.0), Frame::j2000(), 10);
    assert!(engine.query_region(&d, &q).unwrap().is_empty());
}

#[test]
fn sorted_ascii_catalog_wraps_ra() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ring.cat");
    let ras = [0.5, 3.0, 5.0, 5.5, 100.0, 354.0, 355.0, 359.9];
    let mut text = String::from("/j/r\nStars along the equator\n");
    for (i, ra) in ras.iter().enumerate() {
        text.push_str(&format!("{} {ra} 0.0 10.0\n", i + 1));
    }
    std::fs::write(&path, text).unwrap();
    let d = describe_file("ring.cat", &path).unwrap();
    assert!(d.ra_sorted);

    let q = RegionQuery::new(SearchRegion::boxed(0.0, 0.0, 5.0, 1.0), Frame::j2000(), 10)
        .sorted(SortOrder::Ra);
    let found = CatalogQuery::new().query_region(&d, &q).unwrap();
    let found_ras: Vec<f64> = found.iter().map(|e| e.ra).collect();
    assert_eq!(found_ras, vec![0.5, 3.0, 5.0, 355.0, 359.9]);
}

#[test]
fn mixed_frame_ascii_records_are_converted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.cat");
    std::fs::write(
        &path,
        "/m1\nRecords in two frames\n\
         1 150.0 30.0 J2000 9.0\n\
         2 149.3 30.3 B1950 9.5\n",
    )
    .unwrap();
    let d = describe_file("mixed.cat", &path).unwrap();
    assert!(d.mixed_frames);

    let q = RegionQuery::new(SearchRegion::cone(150.0, 30.0, 1.0), Frame::j2000(), 10);
    let found = CatalogQuery::new().query_region(&d, &q).unwrap();
    assert_eq!(ids(&found), vec![1.0, 2.0]);
    assert!(found.iter().all(|e| e.frame == Frame::j2000()));
}

// ---- tab-table ----

const TABLE: &str = "Reordered\n\
radecsys\tfk5\n\
equinox\tJ2000\n\
id\tra\tdec\tmag\tura\tudec\n\
--\t--\t---\t---\t---\t----\n\
1\t10.0\t20.0\t5.5\t12.0\t-3.0\n\
2\t10.5\t20.5\t6.5\t0.0\t4.0\n\
3\t200.0\t-10.0\t7.5\t1.0\t1.0\n";

const TABLE_REORDERED: &str = "Reordered\n\
radecsys\tfk5\n\
equinox\tJ2000\n\
udec\tmag\tdec\tid\tura\tra\n\
----\t---\t---\t--\t---\t--\n\
-3.0\t5.5\t20.0\t1\t12.0\t10.0\n\
4.0\t6.5\t20.5\t2\t0.0\t10.5\n\
1.0\t7.5\t-10.0\t3\t1.0\t200.0\n";

#[test]
fn tab_column_order_does_not_matter() {
    let mut a = TabHandle::from_bytes(TABLE.as_bytes().to_vec()).unwrap();
    let mut b = TabHandle::from_bytes(TABLE_REORDERED.as_bytes().to_vec()).unwrap();
    assert_eq!(a.len(), 3);
    for num in 1..=3 {
        assert_eq!(a.read(num).unwrap(), b.read(num).unwrap());
    }
}

#[test]
fn tab_table_written_from_query_results_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.tab");
    std::fs::write(&source, TABLE).unwrap();
    let d = describe_file("source.tab", &source).unwrap();
    let engine = CatalogQuery::new();

    let q = RegionQuery::new(SearchRegion::boxed(10.0, 20.0, 2.0, 2.0), Frame::j2000(), 10)
        .sorted(SortOrder::Ra);
    let found = engine.query_region(&d, &q).unwrap();
    assert_eq!(ids(&found), vec![1.0, 2.0]);

    let options = TabOptions {
        title: "query results".to_string(),
        proper_motion: true,
        id_format: d.id_format,
        ..TabOptions::default()
    };
    let copy = dir.path().join("copy.tab");
    std::fs::write(&copy, write_tab_table(&found, &options)).unwrap();
    let d2 = describe_file("copy.tab", &copy).unwrap();
    let again = engine.query_region(&d2, &q).unwrap();
    assert_eq!(again.len(), 2);
    for (x, y) in found.iter().zip(&again) {
        assert_eq!(x.id, y.id);
        assert!((x.ra - y.ra).abs() < 1e-6);
        assert!((x.pm_ra - y.pm_ra).abs() < 1e-9);
        assert!((x.pm_dec - y.pm_dec).abs() < 1e-9);
        assert_eq!(x.mags[0], y.mags[0]);
    }
}

/// Serves one fixed table and remembers every request.
struct CannedTransport {
    body: &'static str,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl CatalogTransport for CannedTransport {
    fn fetch(&self, url: &str, params: &[(String, String)]) -> skycat::Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), params.to_vec()));
        Ok(self.body.as_bytes().to_vec())
    }
}

#[test]
fn remote_survey_is_queried_through_transport() {
    let config = CatalogConfig::from_lookup(|_| None)
        .with_root(SurveyFamily::UsnoB1, "http://archive.test/cgi-bin/scat");
    let d = CatalogRegistry::new(config).resolve("ub1").unwrap();
    assert!(d.is_remote());
    assert_eq!(
        d.kind,
        StorageKind::TabTable(Locator::Remote {
            url: "http://archive.test/cgi-bin/scat".to_string()
        })
    );

    let transport = Arc::new(CannedTransport {
        body: TABLE,
        requests: Mutex::new(Vec::new()),
    });
    let engine = CatalogQuery::new().with_transport(transport.clone());
    let q = RegionQuery::new(SearchRegion::boxed(10.0, 20.0, 2.0, 2.0), Frame::j2000(), 10)
        .sorted(SortOrder::Ra);
    let found = engine.query_region(&d, &q).unwrap();
    assert_eq!(ids(&found), vec![1.0, 2.0]);

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (url, params) = &requests[0];
    assert_eq!(url, "http://archive.test/cgi-bin/scat");
    assert!(params.contains(&("catalog".to_string(), "ub1".to_string())));
}

#[test]
fn failing_catalog_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_binary(dir.path(), "grid.bin", &grid(), false);
    let mut gone = good.clone();
    gone.name = "gone.bin".to_string();
    gone.kind = StorageKind::Binary(dir.path().join("gone.bin"));

    let q = RegionQuery::new(SearchRegion::cone(100.0, 20.0, 10.0), Frame::j2000(), 50);
    let results = CatalogQuery::new().query_catalogs(&[gone, good], &q);
    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap_err().is_not_found());
    assert!(!results[1].as_ref().unwrap().is_empty());
}
