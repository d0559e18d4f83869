use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::runtime::Runtime;
use viewsync::data::memory::{CachedMemoryQuery, MemorySource};
use viewsync::data::source::{
    DataSource, DataSourceAdapter, FetchParams, FetchResult, PageInfo,
};

fn counted_source(counter: Arc<AtomicUsize>) -> DataSource {
    DataSource::callback(move |params: FetchParams| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResult {
                items: vec![json!({"page": params.page})],
                pagination: PageInfo::for_total(params.page, params.limit, 100),
            })
        }
    })
}

fn pump_until_settled(adapter: &mut DataSourceAdapter) {
    for _ in 0..200 {
        adapter.pump();
        let snapshot = adapter.snapshot();
        if !snapshot.is_loading && (snapshot.is_success || snapshot.is_error) {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("adapter never settled");
}

fn people(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| json!({"id": i, "name": format!("Person {}", i)}))
        .collect()
}

#[test]
fn test_identical_inputs_do_not_refetch() {
    let runtime = Runtime::new().unwrap();
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut adapter = DataSourceAdapter::new(
        counted_source(Arc::clone(&fetches)),
        runtime.handle().clone(),
    );

    let params = FetchParams {
        page: 1,
        limit: 10,
        ..FetchParams::default()
    };
    adapter.sync(params.clone());
    pump_until_settled(&mut adapter);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // The same inputs arrive every tick; none of them fetch.
    adapter.sync(params.clone());
    adapter.sync(params.clone());
    adapter.pump();
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    adapter.sync(FetchParams {
        page: 2,
        limit: 10,
        ..FetchParams::default()
    });
    pump_until_settled(&mut adapter);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert_eq!(adapter.items()[0]["page"], json!(2));
}

#[test]
fn test_invalidate_refetches_same_inputs() {
    let runtime = Runtime::new().unwrap();
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut adapter = DataSourceAdapter::new(
        counted_source(Arc::clone(&fetches)),
        runtime.handle().clone(),
    );

    let params = FetchParams {
        page: 1,
        limit: 10,
        ..FetchParams::default()
    };
    adapter.sync(params.clone());
    pump_until_settled(&mut adapter);

    adapter.invalidate();
    adapter.sync(params);
    pump_until_settled(&mut adapter);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn test_superseded_completion_is_dropped() {
    let runtime = Runtime::new().unwrap();
    let source = DataSource::callback(|params: FetchParams| async move {
        // Page 1 is slow; page 2 overtakes it.
        let delay = if params.page == 1 { 100 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(FetchResult {
            items: vec![json!({"page": params.page})],
            pagination: PageInfo::for_total(params.page, params.limit, 20),
        })
    });
    let mut adapter = DataSourceAdapter::new(source, runtime.handle().clone());

    adapter.sync(FetchParams {
        page: 1,
        limit: 10,
        ..FetchParams::default()
    });
    adapter.sync(FetchParams {
        page: 2,
        limit: 10,
        ..FetchParams::default()
    });
    pump_until_settled(&mut adapter);
    assert_eq!(adapter.items()[0]["page"], json!(2));

    // The slow page-1 result arrives later and must not win.
    std::thread::sleep(Duration::from_millis(150));
    adapter.pump();
    assert_eq!(adapter.items()[0]["page"], json!(2));
}

#[test]
fn test_managed_snapshots_mirror_immediately() {
    let runtime = Runtime::new().unwrap();
    let query = CachedMemoryQuery::new(MemorySource::new(people(3)));
    let mut adapter = DataSourceAdapter::new(DataSource::managed(query), runtime.handle().clone());

    adapter.sync(FetchParams {
        page: 1,
        limit: 2,
        ..FetchParams::default()
    });
    let snapshot = adapter.snapshot();
    assert!(snapshot.is_success, "cache-backed queries settle synchronously");
    assert_eq!(snapshot.items().len(), 2);
    assert_eq!(snapshot.page_info().unwrap().total_items, 3);

    adapter.sync(FetchParams {
        page: 2,
        limit: 2,
        ..FetchParams::default()
    });
    assert_eq!(adapter.items().len(), 1);
    assert_eq!(adapter.items()[0]["name"], json!("Person 3"));
}

#[test]
fn test_fetch_once_gathers_everything_for_both_styles() {
    let runtime = Runtime::new().unwrap();

    let source = MemorySource::new(people(35)).into_source();
    let mut adapter = DataSourceAdapter::new(source, runtime.handle().clone());
    let result = runtime
        .block_on(adapter.fetch_once(FetchParams {
            page: 1,
            limit: 35,
            ..FetchParams::default()
        }))
        .unwrap();
    assert_eq!(result.items.len(), 35);

    let query = CachedMemoryQuery::new(MemorySource::new(people(12)));
    let mut adapter = DataSourceAdapter::new(DataSource::managed(query), runtime.handle().clone());
    let result = runtime
        .block_on(adapter.fetch_once(FetchParams {
            page: 1,
            limit: 50,
            ..FetchParams::default()
        }))
        .unwrap();
    assert_eq!(result.items.len(), 12);
}

#[test]
fn test_failure_keeps_previous_items() {
    let runtime = Runtime::new().unwrap();
    let source = DataSource::callback(|params: FetchParams| async move {
        if params.page == 1 {
            Ok(FetchResult {
                items: people(3),
                pagination: PageInfo::for_total(1, params.limit, 3),
            })
        } else {
            Err(viewsync::error::FetchError::Network("down".to_string()))
        }
    });
    let mut adapter = DataSourceAdapter::new(source, runtime.handle().clone());

    adapter.sync(FetchParams {
        page: 1,
        limit: 10,
        ..FetchParams::default()
    });
    pump_until_settled(&mut adapter);
    assert_eq!(adapter.items().len(), 3);

    adapter.sync(FetchParams {
        page: 2,
        limit: 10,
        ..FetchParams::default()
    });
    pump_until_settled(&mut adapter);
    let snapshot = adapter.snapshot();
    assert!(snapshot.is_error);
    assert_eq!(snapshot.items().len(), 3, "stale rows beat an empty screen");
}
