//! Property tests for archive determinism and exclusion

use proptest::prelude::*;
use savesync_core::{archive_directory, hash_file, ExclusionFilter};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let name = "[a-z]{1,6}(\\.(txt|dat|bak))?";
    let path = prop::collection::vec(name, 1..4).prop_map(|parts| parts.join("/"));
    prop::collection::btree_map(path, prop::collection::vec(any::<u8>(), 0..64), 0..12)
}

/// Write a tree, skipping paths that collide with an existing file or
/// directory. Returns the paths actually written.
fn materialize<'a>(root: &Path, files: impl Iterator<Item = (&'a String, &'a Vec<u8>)>) -> Vec<String> {
    let mut written = Vec::new();
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                continue;
            }
        }
        if path.exists() {
            continue;
        }
        if fs::write(&path, content).is_ok() {
            written.push(rel.clone());
        }
    }
    written.sort();
    written
}

fn entry_names(archive: &Path) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_identical_trees_hash_equal(tree in tree_strategy()) {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        // Same tree, created in opposite orders.
        let written = materialize(a.path(), tree.iter());
        let mut b_tree: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for rel in &written {
            b_tree.insert(rel.clone(), tree[rel].clone());
        }
        materialize(b.path(), b_tree.iter().rev());

        let filter = ExclusionFilter::default();
        let first = out.path().join("first.zip");
        let second = out.path().join("second.zip");
        archive_directory(a.path(), &first, &filter).unwrap();
        archive_directory(b.path(), &second, &filter).unwrap();

        prop_assert_eq!(hash_file(&first).unwrap(), hash_file(&second).unwrap());
    }

    #[test]
    fn prop_excluded_files_never_archived(tree in tree_strategy()) {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let written = materialize(src.path(), tree.iter());

        let archive = out.path().join("out.zip");
        let summary = archive_directory(src.path(), &archive, &ExclusionFilter::default()).unwrap();

        let mut expected: Vec<String> = written
            .iter()
            .filter(|rel| !rel.ends_with(".bak"))
            .cloned()
            .collect();
        expected.sort_by(|x, y| x.as_bytes().cmp(y.as_bytes()));

        let names = entry_names(&archive);
        prop_assert!(names.iter().all(|n| !n.ends_with(".bak")));
        prop_assert_eq!(summary.skipped, written.len() - expected.len());
        prop_assert_eq!(names, expected);
    }
}
