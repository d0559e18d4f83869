//! Terminal front end: the table and grid orchestrators, the shared view
//! core they are built on, and the column settings overlay.

pub mod column_panel;
pub mod core;
pub mod grid_view;
pub mod table_view;

pub use column_panel::ColumnSettingsPanel;
pub use core::{BulkAction, Focus, ViewCore};
pub use grid_view::{CardRenderer, GridView};
pub use table_view::{ColumnDef, TableView};

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Center a popup over `r`, sized as percentages of it.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
