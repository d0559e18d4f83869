//! The table orchestrator: sortable headers, per-column filters, column
//! show/hide, reordering and resizing, row selection, all mirrored into
//! the shared address through the view core.

use chrono::DateTime;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};
use ratatui::Frame;
use serde_json::Value;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::data::values::{resolve_path, stringify};
use crate::export::resolve::{resolve_cell, DerivedField};
use crate::export::ExportColumn;
use crate::ui::centered_rect;
use crate::ui::column_panel::ColumnSettingsPanel;
use crate::ui::core::{Focus, ViewCore};

const MIN_COL_WIDTH: u16 = 4;

/// One table column: what it shows, how wide it starts, and whether the
/// server can sort by it.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub id: String,
    pub header: String,
    pub width: u16,
    pub sortable: bool,
    pub derived: Option<DerivedField>,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, header: impl Into<String>, width: u16) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            width,
            sortable: true,
            derived: None,
        }
    }

    /// A column counting the collection at `path`.
    pub fn counting(
        id: impl Into<String>,
        header: impl Into<String>,
        path: impl Into<String>,
        width: u16,
    ) -> Self {
        Self {
            derived: Some(DerivedField::CollectionSize { path: path.into() }),
            ..Self::new(id, header, width)
        }
    }

    pub fn not_sortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub(crate) fn to_export(&self) -> ExportColumn {
        let mut column = ExportColumn::new(&self.id, &self.header).with_width(self.width);
        column.derived = self.derived.clone();
        column
    }
}

/// Column ids in display order: the synchronized order first (ids that
/// still exist), then any column the order does not mention, in
/// definition order.
pub(crate) fn ordered_ids(columns: &[ColumnDef], order: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = order
        .iter()
        .filter(|id| columns.iter().any(|c| &c.id == *id))
        .cloned()
        .collect();
    for column in columns {
        if !ids.contains(&column.id) {
            ids.push(column.id.clone());
        }
    }
    ids
}

pub struct TableView {
    pub core: ViewCore,
    columns: Vec<ColumnDef>,
    table_state: TableState,
    active_col: usize,
    filter_input: Input,
    panel: ColumnSettingsPanel,
}

impl TableView {
    pub fn new(mut core: ViewCore, columns: Vec<ColumnDef>) -> Self {
        core.set_export_columns(columns.iter().map(ColumnDef::to_export).collect());
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        Self {
            core,
            columns,
            table_state,
            active_col: 0,
            filter_input: Input::default(),
            panel: ColumnSettingsPanel::new(),
        }
    }

    fn visible_columns(&self) -> Vec<ColumnDef> {
        let order = self.core.state.column_order();
        ordered_ids(&self.columns, &order)
            .into_iter()
            .filter(|id| self.core.state.is_column_visible(id))
            .filter_map(|id| self.columns.iter().find(|c| c.id == id).cloned())
            .collect()
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let snapshot = self.core.adapter.snapshot();
        if let Some(error) = ViewCore::blocking_error(snapshot) {
            self.core.render_error(f, area, &error);
            return;
        }
        if snapshot.is_loading && snapshot.items().is_empty() {
            self.render_skeleton(f, area);
            return;
        }

        let items: Vec<Value> = self.core.adapter.items().to_vec();
        let total = snapshot
            .page_info()
            .map(|info| info.total_items)
            .unwrap_or(items.len() as u64);
        let visible = self.visible_columns();
        let sort = self.core.state.sort();
        let filters = self.core.state.column_filters();

        let mut header_cells = vec![Cell::from(" ")];
        if self.core.show_row_numbers {
            header_cells.push(Cell::from("#").style(Style::default().fg(Color::DarkGray)));
        }
        for (idx, column) in visible.iter().enumerate() {
            let mut text = column.header.clone();
            if let Some((field, order)) = &sort {
                if field == &column.id {
                    text.push(' ');
                    text.push_str(order.arrow());
                }
            }
            if filters.iter().any(|flt| flt.id == column.id) {
                text.push_str(" *");
            }
            let style = if idx == self.active_col {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Yellow)
            };
            header_cells.push(Cell::from(text).style(style));
        }
        let header = Row::new(header_cells).height(1).bottom_margin(1);

        let page = self.core.state.page();
        let page_size = self.core.state.page_size();
        let rows: Vec<Row> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let marker = if self.core.selection.is_selected_item(item) {
                    Cell::from("✓").style(Style::default().fg(Color::Green))
                } else {
                    Cell::from(" ")
                };
                let mut cells = vec![marker];
                if self.core.show_row_numbers {
                    let number = (page as u64 - 1) * page_size as u64 + idx as u64 + 1;
                    cells.push(
                        Cell::from(number.to_string())
                            .style(Style::default().fg(Color::DarkGray)),
                    );
                }
                for column in &visible {
                    cells.push(Cell::from(self.cell_text(item, column)));
                }
                Row::new(cells).height(1)
            })
            .collect();

        let mut widths = vec![Constraint::Length(2)];
        if self.core.show_row_numbers {
            widths.push(Constraint::Length(5));
        }
        for column in &visible {
            let width = self
                .core
                .state
                .column_width(&column.id)
                .unwrap_or(column.width);
            widths.push(Constraint::Length(width.max(MIN_COL_WIDTH)));
        }

        self.clamp_cursor(items.len());
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} ({} items)", self.core.name(), total)),
            )
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("► ");
        f.render_stateful_widget(table, area, &mut self.table_state);

        self.render_filter_editor(f, &visible);
        self.panel.render(f, &self.columns, &self.core.state);
    }

    fn cell_text(&self, item: &Value, column: &ColumnDef) -> String {
        if column.derived.is_some() {
            return stringify(Some(&resolve_cell(item, &column.to_export())));
        }
        match resolve_path(item, &column.id) {
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => ts.format(&self.core.date_format).to_string(),
                Err(_) => s.clone(),
            },
            value => stringify(value),
        }
    }

    fn render_filter_editor(&self, f: &mut Frame, visible: &[ColumnDef]) {
        if self.core.focus != Focus::Filter {
            return;
        }
        let Some(column) = visible.get(self.active_col) else {
            return;
        };
        let area = centered_rect(40, 20, f.area());
        f.render_widget(Clear, area);
        let editor = Paragraph::new(self.filter_input.value())
            .style(Style::default().fg(Color::Cyan))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Filter {} (blank clears)", column.header)),
            );
        f.render_widget(editor, area);
        f.set_cursor_position((
            area.x + self.filter_input.cursor() as u16 + 1,
            area.y + 1,
        ));
    }

    fn render_skeleton(&self, f: &mut Frame, area: Rect) {
        let width = area.width.saturating_sub(2).clamp(3, 24) as usize;
        let rows = self.core.state.page_size().min(12);
        let mut lines = vec![String::new()];
        for _ in 0..rows {
            lines.push("░".repeat(width));
        }
        let body = Paragraph::new(lines.join("\n"))
            .style(Style::default().fg(Color::DarkGray))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} (loading)", self.core.name())),
            );
        f.render_widget(body, area);
    }

    /// Returns `Ok(true)` to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
        if self.panel.is_open() {
            self.panel.handle_key(key, &self.columns, &self.core.state);
            if !self.panel.is_open() {
                self.core.focus = Focus::Rows;
            }
            return Ok(false);
        }
        if self.core.focus == Focus::Filter {
            self.handle_filter_key(key);
            return Ok(false);
        }
        if self.core.handle_focus_key(key) {
            return Ok(false);
        }

        let items: Vec<Value> = self.core.adapter.items().to_vec();
        let visible = self.visible_columns();
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Esc => self.core.set_status(""),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1, items.len()),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1, items.len()),
            KeyCode::Char('g') => self.table_state.select(Some(0)),
            KeyCode::Char('G') => {
                self.table_state
                    .select(Some(items.len().saturating_sub(1)));
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.active_col = self.active_col.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.active_col + 1 < visible.len() {
                    self.active_col += 1;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(item) = items.get(self.cursor()) {
                    self.core.selection.toggle_item(item);
                }
            }
            KeyCode::Char('s') => {
                if let Some(column) = visible.get(self.active_col) {
                    if column.sortable {
                        self.core.state.toggle_sort(&column.id);
                    } else {
                        self.core
                            .set_status(format!("{} is not sortable", column.header));
                    }
                }
            }
            KeyCode::Char('S') => self.core.state.clear_sort(),
            KeyCode::Char('<') => self.resize_active(-2, &visible),
            KeyCode::Char('>') => self.resize_active(2, &visible),
            KeyCode::Char('=') => self.core.state.reset_column_sizing(),
            KeyCode::Char('[') => self.move_active_column(-1, &visible),
            KeyCode::Char(']') => self.move_active_column(1, &visible),
            KeyCode::Char('H') => {
                if visible.len() > 1 {
                    if let Some(column) = visible.get(self.active_col) {
                        self.core.state.set_column_hidden(&column.id, true);
                        self.active_col = self.active_col.min(visible.len() - 2);
                    }
                }
            }
            KeyCode::Char('f') => self.open_filter(&visible),
            KeyCode::Char('F') => {
                self.core.state.clear_column_filters();
                self.core.set_status("Column filters cleared");
            }
            KeyCode::Char('C') => {
                self.panel.open();
                self.core.focus = Focus::Columns;
            }
            _ => {
                self.core.handle_shared_key(key, &items);
            }
        }
        Ok(false)
    }

    fn open_filter(&mut self, visible: &[ColumnDef]) {
        let Some(column) = visible.get(self.active_col) else {
            return;
        };
        let seed = match self.core.state.column_filter(&column.id) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        self.filter_input = Input::new(seed.clone()).with_cursor(seed.len());
        self.core.focus = Focus::Filter;
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.core.focus = Focus::Rows,
            KeyCode::Enter => {
                let visible = self.visible_columns();
                if let Some(column) = visible.get(self.active_col) {
                    let raw = self.filter_input.value().trim().to_string();
                    let value = if raw.is_empty() {
                        None
                    } else {
                        // bare text filters as a string, numbers and bools
                        // as themselves
                        Some(
                            serde_json::from_str::<Value>(&raw)
                                .unwrap_or_else(|_| Value::String(raw)),
                        )
                    };
                    self.core.state.set_column_filter(&column.id, value);
                }
                self.core.focus = Focus::Rows;
            }
            _ => {
                self.filter_input.handle_event(&Event::Key(key));
            }
        }
    }

    fn resize_active(&mut self, delta: i32, visible: &[ColumnDef]) {
        let Some(column) = visible.get(self.active_col) else {
            return;
        };
        let current = self
            .core
            .state
            .column_width(&column.id)
            .unwrap_or(column.width);
        let next = (current as i32 + delta).clamp(MIN_COL_WIDTH as i32, 80) as u16;
        self.core.state.set_column_width(&column.id, next);
    }

    /// Swap the active column with its neighbor in the full ordered id
    /// list, so hidden columns keep their place.
    fn move_active_column(&mut self, delta: i32, visible: &[ColumnDef]) {
        let Some(column) = visible.get(self.active_col) else {
            return;
        };
        let mut ids = ordered_ids(&self.columns, &self.core.state.column_order());
        let Some(pos) = ids.iter().position(|id| id == &column.id) else {
            return;
        };
        let target = pos as i32 + delta;
        if target < 0 || target as usize >= ids.len() {
            return;
        }
        ids.swap(pos, target as usize);
        self.core.state.set_column_order(ids);
        let moved = (self.active_col as i32 + delta).clamp(0, visible.len() as i32 - 1);
        self.active_col = moved as usize;
    }

    fn cursor(&self) -> usize {
        self.table_state.selected().unwrap_or(0)
    }

    fn move_cursor(&mut self, delta: i32, len: usize) {
        if len == 0 {
            return;
        }
        let next = (self.cursor() as i32 + delta).clamp(0, len as i32 - 1);
        self.table_state.select(Some(next as usize));
    }

    fn clamp_cursor(&mut self, len: usize) {
        if len == 0 {
            self.table_state.select(Some(0));
        } else if self.cursor() >= len {
            self.table_state.select(Some(len - 1));
        }
    }
}
