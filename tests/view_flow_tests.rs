use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use viewsync::config::Config;
use viewsync::data::memory::MemorySource;
use viewsync::data::selection::BulkActionFn;
use viewsync::data::source::DataSource;
use viewsync::error::FetchError;
use viewsync::sync::keys::SortOrder;
use viewsync::ui::core::{BulkAction, Focus, ViewCore};
use viewsync::ui::table_view::{ColumnDef, TableView};

fn demo_rows() -> Vec<Value> {
    (1..=12)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Course {:02}", i),
                "status": if i % 2 == 0 { "active" } else { "draft" },
                "score": 40 + i,
            })
        })
        .collect()
}

fn columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("name", "Name", 20),
        ColumnDef::new("status", "Status", 10),
        ColumnDef::new("score", "Score", 7),
    ]
}

fn table_over(runtime: &Runtime, source: DataSource, config: &Config) -> TableView {
    let core = ViewCore::new(
        "courses",
        "",
        source,
        "id",
        runtime.handle().clone(),
        config,
    );
    TableView::new(core, columns())
}

fn tick_until_loaded(view: &mut TableView) {
    for _ in 0..200 {
        view.core.on_tick();
        let snapshot = view.core.adapter.snapshot();
        if snapshot.is_success && !snapshot.is_loading {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("view never loaded");
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[test]
fn test_sort_key_cycles_the_active_column() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let mut view = table_over(
        &runtime,
        MemorySource::new(demo_rows()).into_source(),
        &config,
    );
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char('s'))).unwrap();
    assert_eq!(
        view.core.state.sort(),
        Some(("name".to_string(), SortOrder::Desc))
    );
    view.handle_key(key(KeyCode::Char('s'))).unwrap();
    assert_eq!(
        view.core.state.sort(),
        Some(("name".to_string(), SortOrder::Asc))
    );
    view.handle_key(key(KeyCode::Char('s'))).unwrap();
    assert_eq!(view.core.state.sort(), None, "third press clears");
}

#[test]
fn test_selection_spans_pages_through_keys() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let mut view = table_over(
        &runtime,
        MemorySource::new(demo_rows()).into_source(),
        &config,
    );
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char(' '))).unwrap();
    assert_eq!(view.core.selection.len(), 1);

    view.handle_key(key(KeyCode::Char('n'))).unwrap();
    tick_until_loaded(&mut view);
    assert_eq!(view.core.state.page(), 2);
    view.handle_key(key(KeyCode::Char(' '))).unwrap();
    assert_eq!(view.core.selection.len(), 2, "page 1 pick still counted");

    view.handle_key(key(KeyCode::Char('p'))).unwrap();
    tick_until_loaded(&mut view);
    assert!(view.core.selection.is_selected_item(&json!({"id": 1})));
    assert!(view.core.selection.is_selected_item(&json!({"id": 11})));
}

#[test]
fn test_hide_and_filter_keys_shape_the_view() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let mut view = table_over(
        &runtime,
        MemorySource::new(demo_rows()).into_source(),
        &config,
    );
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char('H'))).unwrap();
    assert!(!view.core.state.is_column_visible("name"));

    // Active column slid onto "status"; filter it down to active courses.
    view.handle_key(key(KeyCode::Char('f'))).unwrap();
    assert_eq!(view.core.focus, Focus::Filter);
    for ch in "active".chars() {
        view.handle_key(key(KeyCode::Char(ch))).unwrap();
    }
    view.handle_key(key(KeyCode::Enter)).unwrap();
    assert_eq!(view.core.focus, Focus::Rows);
    assert_eq!(
        view.core.state.column_filter("status"),
        Some(json!("active"))
    );

    tick_until_loaded(&mut view);
    let items = view.core.adapter.items();
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item["status"] == json!("active")));

    view.handle_key(key(KeyCode::Char('F'))).unwrap();
    assert!(view.core.state.column_filters().is_empty());
}

#[test]
fn test_export_key_flow_writes_both_artifacts() {
    let runtime = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.behavior.export_dir = Some(dir.path().to_path_buf());
    let mut view = table_over(
        &runtime,
        MemorySource::new(demo_rows()).into_source(),
        &config,
    );
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char('e'))).unwrap();
    assert_eq!(view.core.focus, Focus::Export);
    // The default choice exports the current page.
    view.handle_key(key(KeyCode::Enter)).unwrap();
    assert!(
        view.core.status().starts_with("✓ Exported"),
        "status: {}",
        view.core.status()
    );

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 2, "csv and xlsx side by side: {:?}", entries);
    assert!(entries.iter().any(|name| name.ends_with(".csv")));
    assert!(entries.iter().any(|name| name.ends_with(".xlsx")));
}

#[test]
fn test_bulk_action_clears_selection_and_refetches() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let source = Arc::new(MemorySource::new(demo_rows()));
    let delete: BulkActionFn = {
        let source = Arc::clone(&source);
        Arc::new(move |ids| {
            let source = Arc::clone(&source);
            Box::pin(async move {
                source.remove_by_ids("id", &ids);
                Ok(())
            })
        })
    };
    let core = ViewCore::new(
        "courses",
        "",
        MemorySource::source(Arc::clone(&source)),
        "id",
        runtime.handle().clone(),
        &config,
    )
    .with_bulk_action(BulkAction::new('D', "Delete", delete));
    let mut view = TableView::new(core, columns());
    tick_until_loaded(&mut view);
    assert_eq!(
        view.core.adapter.snapshot().page_info().unwrap().total_items,
        12
    );

    view.handle_key(key(KeyCode::Char(' '))).unwrap();
    view.handle_key(key(KeyCode::Char('D'))).unwrap();
    for _ in 0..200 {
        view.core.on_tick();
        if view.core.status().starts_with("✓ Delete") {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(
        view.core.status().starts_with("✓ Delete"),
        "status: {}",
        view.core.status()
    );
    assert!(view.core.selection.is_empty());

    tick_until_loaded(&mut view);
    assert_eq!(
        view.core.adapter.snapshot().page_info().unwrap().total_items,
        11,
        "the deleted row is gone after the refetch"
    );
}

#[test]
fn test_failed_bulk_action_keeps_the_selection() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let delete: BulkActionFn = Arc::new(|_| {
        Box::pin(async { Err(FetchError::Network("connection refused".to_string())) })
    });
    let core = ViewCore::new(
        "courses",
        "",
        MemorySource::new(demo_rows()).into_source(),
        "id",
        runtime.handle().clone(),
        &config,
    )
    .with_bulk_action(BulkAction::new('D', "Delete", delete));
    let mut view = TableView::new(core, columns());
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char(' '))).unwrap();
    view.handle_key(key(KeyCode::Char('D'))).unwrap();
    for _ in 0..200 {
        view.core.on_tick();
        if view.core.status().contains("failed") {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(
        view.core.status(),
        "Delete failed: Could not reach the server. Check your connection."
    );
    assert_eq!(view.core.selection.len(), 1, "a failed action keeps the picks");
}

#[test]
fn test_bulk_action_with_nothing_selected_is_a_noop() {
    let runtime = Runtime::new().unwrap();
    let config = Config::default();
    let delete: BulkActionFn = Arc::new(|_| Box::pin(async { Ok(()) }));
    let core = ViewCore::new(
        "courses",
        "",
        MemorySource::new(demo_rows()).into_source(),
        "id",
        runtime.handle().clone(),
        &config,
    )
    .with_bulk_action(BulkAction::new('D', "Delete", delete));
    let mut view = TableView::new(core, columns());
    tick_until_loaded(&mut view);

    view.handle_key(key(KeyCode::Char('D'))).unwrap();
    assert_eq!(view.core.status(), "Delete: nothing selected");
}
