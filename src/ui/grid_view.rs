//! The grid orchestrator: the same synchronized state, selection and
//! sorting as the table, rendered as a responsive card grid. Column count
//! follows terminal width; cards have no headers to sort by, so the sort
//! keys walk a configured field list instead. Column-shaped controls
//! (per-column filters, visibility, sizing) stay with the table.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use serde_json::Value;

use crate::ui::core::ViewCore;

/// Renders one item into the lines of its card.
pub type CardRenderer = Box<dyn Fn(&Value) -> Vec<Line<'static>>>;

pub struct GridView {
    pub core: ViewCore,
    renderer: CardRenderer,
    sort_fields: Vec<(String, String)>,
    sort_cursor: usize,
    card_height: u16,
    cursor: usize,
    scroll_row: usize,
    last_columns: usize,
}

impl GridView {
    pub fn new(core: ViewCore, renderer: CardRenderer) -> Self {
        Self {
            core,
            renderer,
            sort_fields: Vec::new(),
            sort_cursor: 0,
            card_height: 6,
            cursor: 0,
            scroll_row: 0,
            last_columns: 1,
        }
    }

    pub fn with_card_height(mut self, height: u16) -> Self {
        self.card_height = height.max(3);
        self
    }

    /// Fields the sort keys cycle through, as `(field id, display label)`
    /// pairs. When the restored state already sorts by one of them, the
    /// cycle picks up from that field.
    pub fn with_sort_fields(mut self, fields: Vec<(String, String)>) -> Self {
        if let Some((active, _)) = self.core.state.sort() {
            if let Some(idx) = fields.iter().position(|(id, _)| *id == active) {
                self.sort_cursor = idx;
            }
        }
        self.sort_fields = fields;
        self
    }

    /// How many cards fit side by side at this width.
    fn columns_for(&self, width: u16) -> usize {
        (width / self.core.card_min_width.max(1)).max(1) as usize
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let snapshot = self.core.adapter.snapshot();
        if let Some(error) = ViewCore::blocking_error(snapshot) {
            self.core.render_error(f, area, &error);
            return;
        }
        let total = snapshot
            .page_info()
            .map(|info| info.total_items)
            .unwrap_or(0);
        let loading = snapshot.is_loading;

        let mut title = format!("{} ({} items)", self.core.name(), total);
        if let Some((field, order)) = self.core.state.sort() {
            let label = self
                .sort_fields
                .iter()
                .find(|(id, _)| *id == field)
                .map(|(_, label)| label.as_str())
                .unwrap_or(field.as_str());
            title.push_str(&format!(" [{} {}]", label, order.arrow()));
        }
        let outer = Block::default().borders(Borders::ALL).title(title);
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let items: Vec<Value> = self.core.adapter.items().to_vec();
        if loading && items.is_empty() {
            self.render_skeleton(f, inner);
            return;
        }
        if items.is_empty() {
            let empty = Paragraph::new("No items match the current filters")
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(empty, inner);
            return;
        }

        let columns = self.columns_for(inner.width);
        self.last_columns = columns;
        self.cursor = self.cursor.min(items.len() - 1);

        let visible_rows = (inner.height / self.card_height).max(1) as usize;
        let cursor_row = self.cursor / columns;
        if cursor_row < self.scroll_row {
            self.scroll_row = cursor_row;
        } else if cursor_row >= self.scroll_row + visible_rows {
            self.scroll_row = cursor_row + 1 - visible_rows;
        }

        let card_width = inner.width / columns as u16;
        let first = self.scroll_row * columns;
        for (offset, item) in items.iter().enumerate().skip(first) {
            let row = offset / columns - self.scroll_row;
            if row >= visible_rows {
                break;
            }
            let col = offset % columns;
            let card_area = Rect {
                x: inner.x + col as u16 * card_width,
                y: inner.y + row as u16 * self.card_height,
                width: card_width,
                height: self.card_height,
            };
            self.render_card(f, card_area, item, offset == self.cursor);
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, item: &Value, active: bool) {
        let border = if active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut block = Block::default().borders(Borders::ALL).border_style(border);
        if self.core.selection.is_selected_item(item) {
            block = block.title(Span::styled("✓", Style::default().fg(Color::Green)));
        }
        let mut lines = (self.renderer)(item);
        lines.truncate(area.height.saturating_sub(2) as usize);
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_skeleton(&self, f: &mut Frame, area: Rect) {
        let columns = self.columns_for(area.width);
        let card_width = area.width / columns as u16;
        let rows = ((area.height / self.card_height).max(1) as usize).min(3);
        for row in 0..rows {
            for col in 0..columns {
                let card_area = Rect {
                    x: area.x + col as u16 * card_width,
                    y: area.y + row as u16 * self.card_height,
                    width: card_width,
                    height: self.card_height,
                };
                let ghost = Paragraph::new("░░░░░░")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(Block::default().borders(Borders::ALL));
                f.render_widget(ghost, card_area);
            }
        }
    }

    /// Returns `Ok(true)` to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
        if self.core.handle_focus_key(key) {
            return Ok(false);
        }
        let items: Vec<Value> = self.core.adapter.items().to_vec();
        let columns = self.last_columns.max(1) as i32;
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Esc => self.core.set_status(""),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1, items.len()),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1, items.len()),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(columns, items.len()),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-columns, items.len()),
            KeyCode::Char('g') => self.cursor = 0,
            KeyCode::Char('G') => self.cursor = items.len().saturating_sub(1),
            KeyCode::Char(' ') => {
                if let Some(item) = items.get(self.cursor) {
                    self.core.selection.toggle_item(item);
                }
            }
            KeyCode::Char('s') => {
                if let Some((id, _)) = self.sort_fields.get(self.sort_cursor) {
                    self.core.state.toggle_sort(id);
                }
            }
            KeyCode::Char('o') => {
                if !self.sort_fields.is_empty() {
                    self.sort_cursor = (self.sort_cursor + 1) % self.sort_fields.len();
                    let (_, label) = &self.sort_fields[self.sort_cursor];
                    self.core.set_status(format!("sort field: {} (press s)", label));
                }
            }
            KeyCode::Char('S') => self.core.state.clear_sort(),
            _ => {
                self.core.handle_shared_key(key, &items);
            }
        }
        Ok(false)
    }

    fn move_cursor(&mut self, delta: i32, len: usize) {
        if len == 0 {
            return;
        }
        let next = (self.cursor as i32 + delta).clamp(0, len as i32 - 1);
        self.cursor = next as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::memory::MemorySource;
    use crate::sync::keys::SortOrder;
    use serde_json::json;
    use tokio::runtime::Runtime;

    fn grid_over(runtime: &Runtime, link: &str) -> GridView {
        let source = MemorySource::new(vec![json!({"id": 1})]).into_source();
        let core = ViewCore::new(
            "projects",
            link,
            source,
            "id",
            runtime.handle().clone(),
            &Config::default(),
        );
        GridView::new(core, Box::new(|_| vec![Line::from("x")])).with_sort_fields(vec![
            ("due_date".to_string(), "due".to_string()),
            ("title".to_string(), "title".to_string()),
        ])
    }

    fn press(grid: &mut GridView, c: char) {
        grid.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
            .unwrap();
    }

    #[test]
    fn test_columns_follow_width() {
        let runtime = Runtime::new().unwrap();
        let grid = grid_over(&runtime, "");
        assert_eq!(grid.columns_for(100), 3, "three 28-wide cards fit in 100");
        assert_eq!(grid.columns_for(27), 1, "never fewer than one column");
    }

    #[test]
    fn test_sort_keys_walk_the_field_list() {
        let runtime = Runtime::new().unwrap();
        let mut grid = grid_over(&runtime, "");

        press(&mut grid, 's');
        assert_eq!(
            grid.core.state.sort(),
            Some(("due_date".to_string(), SortOrder::Desc))
        );
        press(&mut grid, 's');
        assert_eq!(
            grid.core.state.sort(),
            Some(("due_date".to_string(), SortOrder::Asc))
        );

        // 'o' retargets, 's' starts the next field's cycle.
        press(&mut grid, 'o');
        press(&mut grid, 's');
        assert_eq!(
            grid.core.state.sort(),
            Some(("title".to_string(), SortOrder::Desc))
        );

        press(&mut grid, 'S');
        assert_eq!(grid.core.state.sort(), None);
    }

    #[test]
    fn test_sort_cycle_resumes_from_a_restored_link() {
        let runtime = Runtime::new().unwrap();
        let mut grid = grid_over(&runtime, "?sort_by=title&sort_order=asc");

        // "title asc" is the second step of the cycle; the next press
        // clears it instead of restarting on the first field.
        press(&mut grid, 's');
        assert_eq!(grid.core.state.sort(), None);
    }
}
