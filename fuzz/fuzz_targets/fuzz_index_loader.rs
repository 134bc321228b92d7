//! Fuzz target for the index loader.
//!
//! Every component file is read from untrusted bytes. Counts, degrees and
//! bitmap lengths in those bytes drive allocations and indexing, so a
//! malformed directory must fail with `CorruptIndex` and never panic or
//! allocate without bound.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use proxima_core::{ErrorKind, Index};

#[derive(Debug, Arbitrary)]
struct IndexFiles {
    property: Option<Vec<u8>>,
    objects: Option<Vec<u8>>,
    graph: Option<Vec<u8>>,
    tree: Option<Vec<u8>>,
}

fuzz_target!(|files: IndexFiles| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let components = [
        ("property", &files.property),
        ("objects", &files.objects),
        ("graph", &files.graph),
        ("tree", &files.tree),
    ];
    for (name, bytes) in components {
        if let Some(bytes) = bytes {
            if std::fs::write(dir.path().join(name), bytes).is_err() {
                return;
            }
        }
    }

    match Index::open(dir.path()) {
        // A well-formed directory must also survive a search.
        Ok(index) => {
            if let Some(property) = index.property().ok().filter(|p| p.dimension() <= 4096) {
                let query = vec![0.0; property.dimension()];
                let _ = index.search(&query, 5, 0.1, None);
            }
        }
        Err(err) => assert_eq!(err.kind(), ErrorKind::CorruptIndex, "{err}"),
    }
});
