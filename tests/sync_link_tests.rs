use serde_json::json;
use viewsync::sync::address::SharedAddress;
use viewsync::sync::coordinator::UpdateCoordinator;
use viewsync::sync::keys::{DateRange, SortOrder};
use viewsync::sync::state::SyncedState;

fn bound_state(link: &str) -> (SyncedState, SharedAddress) {
    let bus = SharedAddress::with_link(link);
    let state = SyncedState::bind(UpdateCoordinator::new(bus.clone()), 10);
    (state, bus)
}

#[test]
fn test_one_action_lands_as_one_write() {
    let (state, bus) = bound_state("");

    state.set_page(3);
    assert_eq!(bus.write_count(), 0, "nothing leaves before the flush");
    assert!(state.flush());
    assert_eq!(bus.write_count(), 1);
    assert_eq!(bus.render(), "?page=3");

    // A search change also resets the page; both travel in one write.
    state.set_search("bio");
    assert!(state.flush());
    assert_eq!(bus.write_count(), 2);
    assert_eq!(bus.render(), "?search=bio");
}

#[test]
fn test_flush_without_changes_writes_nothing() {
    let (state, bus) = bound_state("");
    assert!(!state.flush());

    state.set_page(1); // already the default
    state.set_search(""); // already the default
    assert!(!state.flush());
    assert_eq!(bus.write_count(), 0);
    assert_eq!(bus.render(), "");
}

#[test]
fn test_page_size_change_resets_page_in_the_same_write() {
    let (state, bus) = bound_state("");
    state.set_page(5);
    state.flush();

    state.set_page_size(25);
    assert!(state.flush());
    assert_eq!(bus.write_count(), 2);
    assert_eq!(bus.render(), "?page_size=25", "page fell back to its default");
    assert_eq!(state.page(), 1);
}

#[test]
fn test_sort_pair_travels_together_on_the_wire() {
    let (state, bus) = bound_state("");

    // First toggle sorts descending; desc is the order default, so the
    // flush has to materialize it next to the field.
    state.toggle_sort("score");
    state.flush();
    assert_eq!(bus.render(), "?sort_by=score&sort_order=desc");

    state.toggle_sort("score");
    state.flush();
    assert_eq!(bus.render(), "?sort_by=score&sort_order=asc");

    // Third toggle clears the sort; both keys leave in one write.
    state.toggle_sort("score");
    state.flush();
    assert_eq!(bus.render(), "");
    assert_eq!(bus.write_count(), 3);
}

#[test]
fn test_share_link_restores_every_key() {
    let (state, _) = bound_state("");
    state.set_page_size(25);
    state.set_search("chem");
    state.set_date_range(DateRange::new("2024-01-01", "2024-06-30"));
    state.set_sort("score", SortOrder::Asc);
    state.set_column_hidden("status", true);
    state.set_column_filter("teacher.name", Some(json!("Ada Lovelace")));
    state.set_column_order(vec!["score".to_string(), "name".to_string()]);
    state.set_column_width("name", 30);
    state.set_page(3);
    assert!(state.flush());

    let link = state.share_link();
    assert!(
        link.starts_with("?page=3&page_size=25&search=chem&date_range="),
        "keys render in registry order: {}",
        link
    );

    let (restored, _) = bound_state(&link);
    assert_eq!(restored.page(), 3);
    assert_eq!(restored.page_size(), 25);
    assert_eq!(restored.search(), "chem");
    assert_eq!(
        restored.date_range(),
        DateRange::new("2024-01-01", "2024-06-30")
    );
    assert_eq!(restored.sort(), Some(("score".to_string(), SortOrder::Asc)));
    assert!(!restored.is_column_visible("status"));
    assert!(restored.is_column_visible("name"));
    assert_eq!(
        restored.column_filter("teacher.name"),
        Some(json!("Ada Lovelace"))
    );
    assert_eq!(
        restored.column_order(),
        vec!["score".to_string(), "name".to_string()]
    );
    assert_eq!(restored.column_width("name"), Some(30));
}

#[test]
fn test_restoring_a_link_does_not_rewrite_it() {
    let (state, bus) = bound_state("?page=2&search=bio");
    assert_eq!(state.page(), 2);
    assert_eq!(state.search(), "bio");

    // Re-applying what the link already says stages nothing.
    state.set_search("bio");
    state.set_page(2);
    assert!(!state.flush());
    assert_eq!(bus.write_count(), 0);
}

#[test]
fn test_malformed_link_values_degrade_to_defaults() {
    let (state, _) = bound_state(
        "?page=banana&page_size=25&date_range=not-json&column_filters=%5B%7B",
    );
    assert_eq!(state.page(), 1, "unparseable page falls back");
    assert_eq!(state.page_size(), 25, "good keys still decode");
    assert_eq!(state.date_range(), DateRange::default());
    assert!(state.column_filters().is_empty());

    // The view keeps working after a bad restore.
    state.set_search("usable");
    assert!(state.flush());
    assert_eq!(state.search(), "usable");
}

#[test]
fn test_zero_page_in_a_link_degrades_like_malformed_text() {
    // Pages are 1-based on the wire. A hand-edited "?page=0" has to seed
    // page 1, or every row-number computation downstream starts from -1.
    let (state, _) = bound_state("?page=0&page_size=0&search=bio");
    assert_eq!(state.page(), 1);
    assert_eq!(state.page_size(), 10, "zero page size falls back too");
    assert_eq!(state.search(), "bio", "good keys still decode");
}

#[test]
fn test_unknown_link_params_survive_a_flush() {
    let (state, bus) = bound_state("?theme=dark&page=4");
    state.set_search("bio");
    state.flush();

    let link = bus.render();
    assert!(link.contains("theme=dark"), "foreign keys pass through: {}", link);
    assert!(!link.contains("page="), "search reset dropped the page key");
}
