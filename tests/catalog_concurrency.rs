//! Overlapping publish/get/remove traffic on the output-tensor table, the
//! pattern pipelined execution threads produce at run time.

use std::sync::Arc;
use std::thread;

use encap_catalog::{Catalog, CatalogHandle, GraphId, NodeKey};

const THREADS: usize = 8;
const ROUNDS: u32 = 64;

#[test]
fn concurrent_publish_get_remove_keeps_entries_distinct() {
    let catalog: CatalogHandle = Arc::new(Catalog::new());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let catalog = Arc::clone(&catalog);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let key = NodeKey::new(GraphId(1), format!("encap_{worker}"), round);
                    catalog.publish_output_tensor(key.clone(), Arc::new((worker, round)));

                    let got = catalog.output_tensor(&key).expect("just published");
                    let value = got
                        .downcast_ref::<(usize, u32)>()
                        .expect("payload published by this test");
                    assert_eq!(*value, (worker, round), "got another worker's tensor");

                    catalog.remove_output_tensor(&key);
                    assert!(!catalog.has_output_tensor(&key));
                }
            });
        }
    });

    // Every worker removed its own entries.
    assert!(catalog.snapshot().output_tensor_keys.is_empty());
}

#[test]
fn concurrent_publishes_all_visible_after_join() {
    let catalog: CatalogHandle = Arc::new(Catalog::new());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let catalog = Arc::clone(&catalog);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let key = NodeKey::new(GraphId(2), format!("encap_{worker}"), round);
                    catalog.publish_output_tensor(key, Arc::new((worker, round)));
                }
            });
        }
    });

    for worker in 0..THREADS {
        for round in 0..ROUNDS {
            let key = NodeKey::new(GraphId(2), format!("encap_{worker}"), round);
            let got = catalog.output_tensor(&key).expect("published before join");
            assert_eq!(*got.downcast_ref::<(usize, u32)>().unwrap(), (worker, round));
        }
    }

    assert_eq!(
        catalog.evict_graph(GraphId(2)),
        THREADS * ROUNDS as usize,
        "eviction must reclaim every published entry"
    );
}
