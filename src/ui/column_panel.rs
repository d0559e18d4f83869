//! Column settings overlay: fuzzy-find a column, toggle its visibility,
//! nudge it through the order, or reset everything column-shaped.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::sync::state::SyncedState;
use crate::ui::centered_rect;
use crate::ui::table_view::{ordered_ids, ColumnDef};

pub struct ColumnSettingsPanel {
    open: bool,
    input: Input,
    matcher: SkimMatcherV2,
    cursor: usize,
}

impl Default for ColumnSettingsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnSettingsPanel {
    pub fn new() -> Self {
        Self {
            open: false,
            input: Input::default(),
            matcher: SkimMatcherV2::default(),
            cursor: 0,
        }
    }

    pub fn open(&mut self) {
        self.open = true;
        self.input = Input::default();
        self.cursor = 0;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Column ids in display order, narrowed by the fuzzy query. Matches
    /// rank by score, best first.
    fn candidates(&self, columns: &[ColumnDef], state: &SyncedState) -> Vec<String> {
        let ids = ordered_ids(columns, &state.column_order());
        let query = self.input.value();
        if query.is_empty() {
            return ids;
        }
        let mut scored: Vec<(i64, String)> = ids
            .into_iter()
            .filter_map(|id| {
                let header = columns
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.header.as_str())
                    .unwrap_or("");
                let haystack = format!("{} {}", header, id);
                self.matcher
                    .fuzzy_match(&haystack, query)
                    .map(|score| (score, id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, id)| id).collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent, columns: &[ColumnDef], state: &SyncedState) {
        let candidates = self.candidates(columns, state);
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                if !candidates.is_empty() {
                    self.cursor = (self.cursor + 1).min(candidates.len() - 1);
                }
            }
            KeyCode::Enter => {
                if let Some(id) = candidates.get(self.cursor) {
                    let visible = state.is_column_visible(id);
                    state.set_column_hidden(id, visible);
                }
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.nudge(-1, &candidates, columns, state);
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.nudge(1, &candidates, columns, state);
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.reset_column_order();
                state.reset_column_sizing();
                for column in columns {
                    state.set_column_hidden(&column.id, false);
                }
                self.cursor = 0;
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                let len = self.candidates(columns, state).len();
                if len == 0 {
                    self.cursor = 0;
                } else {
                    self.cursor = self.cursor.min(len - 1);
                }
            }
        }
    }

    /// Move the highlighted column through the full order, hidden
    /// neighbors included.
    fn nudge(&mut self, delta: i32, candidates: &[String], columns: &[ColumnDef], state: &SyncedState) {
        let Some(id) = candidates.get(self.cursor) else {
            return;
        };
        let mut ids = ordered_ids(columns, &state.column_order());
        let Some(pos) = ids.iter().position(|other| other == id) else {
            return;
        };
        let target = pos as i32 + delta;
        if target < 0 || target as usize >= ids.len() {
            return;
        }
        ids.swap(pos, target as usize);
        state.set_column_order(ids);
        // with a live query the list stays score-ranked, so only follow
        // the row when the list mirrors the order
        if self.input.value().is_empty() {
            self.cursor = target as usize;
        }
    }

    pub fn render(&self, f: &mut Frame, columns: &[ColumnDef], state: &SyncedState) {
        if !self.open {
            return;
        }
        let area = centered_rect(46, 60, f.area());
        f.render_widget(Clear, area);
        let block = Block::default().borders(Borders::ALL).title("Columns");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(inner);

        let query = Paragraph::new(self.input.value())
            .style(Style::default().fg(Color::Green))
            .block(Block::default().borders(Borders::ALL).title("Find column"));
        f.render_widget(query, chunks[0]);
        f.set_cursor_position((
            chunks[0].x + self.input.cursor() as u16 + 1,
            chunks[0].y + 1,
        ));

        let candidates = self.candidates(columns, state);
        let visible_rows = chunks[1].height.max(1) as usize;
        let first = if self.cursor >= visible_rows {
            self.cursor + 1 - visible_rows
        } else {
            0
        };
        let lines: Vec<Line> = candidates
            .iter()
            .enumerate()
            .skip(first)
            .take(visible_rows)
            .map(|(idx, id)| {
                let check = if state.is_column_visible(id) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let header = columns
                    .iter()
                    .find(|c| &c.id == id)
                    .map(|c| c.header.as_str())
                    .unwrap_or(id.as_str());
                let text = format!("{} {} ({})", check, header, id);
                let style = if idx == self.cursor {
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(text, style))
            })
            .collect();
        f.render_widget(Paragraph::new(lines), chunks[1]);

        let hint = Paragraph::new("Enter=Show/Hide  Ctrl+U/D=Move  Ctrl+R=Reset  Esc=Close")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(hint, chunks[2]);
    }
}
