use std::sync::Arc;

use pretty_assertions::assert_eq;

use errflow_ir::{FuncRef, TypeRef};

use crate::{
    Deferred, DeferredQueue, DispatchEntry, DispatchKey, DispatchStore, ErrorIdentity,
    FunctionSummary,
};

fn key() -> DispatchKey {
    DispatchKey::new(&TypeRef::new("api", "Store"), "Get")
}

fn summary(error: &str, checked: &str) -> FunctionSummary {
    let mut summary = FunctionSummary::default();
    summary.errors.insert(ErrorIdentity::new("impl", error), false);
    summary.checked.insert(0, ErrorIdentity::new("impl", checked));
    summary
}

#[test]
fn absent_until_first_implementation() {
    let store = DispatchStore::new();
    assert_eq!(store.get(&key()), None);
    assert!(store.merge(key(), FuncRef::method("impl", "Mem", "Get"), &summary("ErrA", "ErrC1")));
    assert!(store.contains(&key()));
}

#[test]
fn merging_same_implementation_twice_is_stable() {
    let store = DispatchStore::new();
    let imp = FuncRef::method("impl", "Mem", "Get");
    assert!(store.merge(key(), imp.clone(), &summary("ErrA", "ErrC1")));
    assert!(!store.merge(key(), imp, &summary("ErrA", "ErrC1")));
    assert_eq!(store.len(), 1);
}

#[test]
fn later_implementation_narrows_intersection_facts() {
    let store = DispatchStore::new();
    store.merge(key(), FuncRef::method("impl", "Mem", "Get"), &summary("ErrA", "ErrC1"));
    let first = store.get(&key()).unwrap_or_default();
    assert!(!first.checked.is_empty());

    store.merge(key(), FuncRef::method("other", "Disk", "Get"), &summary("ErrB", "ErrC2"));
    let both = store.get(&key()).unwrap_or_default();
    assert_eq!(both.errors.len(), 2);
    assert!(both.checked.is_empty());
}

#[test]
fn concurrent_merges_all_land() {
    let store = Arc::new(DispatchStore::new());
    std::thread::scope(|scope| {
        for i in 0..8 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                let imp = FuncRef::method("impl", format!("T{i}"), "Get");
                store.merge(key(), imp, &summary(&format!("Err{i}"), "ErrShared"));
            });
        }
    });
    let merged = store.get(&key()).unwrap_or_default();
    assert_eq!(merged.errors.len(), 8);
    assert_eq!(merged.checked.get(0).map(std::collections::BTreeSet::len), Some(1));
}

#[test]
fn deferred_queue_deduplicates_and_drains() {
    let queue = DeferredQueue::new();
    let item = Deferred {
        unit: "app".to_owned(),
        func: FuncRef::func("app", "Use"),
    };
    assert!(queue.push(item.clone()));
    assert!(!queue.push(item.clone()));
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.drain(), vec![item.clone()]);
    assert!(queue.is_empty());
    // drained items may be queued again
    assert!(queue.push(item));
}

#[test]
fn entries_filter_out_one_unit() {
    let mut entry = DispatchEntry::default();
    let own = FuncRef::method("app", "Mem", "Fetch");
    let theirs = FuncRef::method("impl", "Disk", "Fetch");
    entry.merge(own, &FunctionSummary::default());
    entry.merge(theirs.clone(), &FunctionSummary::default());

    let foreign = entry.excluding_unit("app");
    assert_eq!(foreign.implementations().collect::<Vec<_>>(), vec![&theirs]);
    assert!(foreign.excluding_unit("impl").is_empty());
}
