//! Shared machinery behind both orchestrators: synchronized state, the
//! data-source adapter, selection, debounced search, export and bulk
//! actions, plus the toolbar and footer chrome they render alike.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arboard::Clipboard;
use chrono::NaiveDate;
use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::config::Config;
use crate::data::selection::{BulkActionFn, IdentityFetchFn, ItemId, SelectionTracker};
use crate::data::source::{DataSource, DataSourceAdapter, FetchParams, QuerySnapshot};
use crate::error::{ExportError, FetchError};
use crate::export::{run_export, ExportColumn, ExportRequest, RowSource};
use crate::sync::address::SharedAddress;
use crate::sync::coordinator::UpdateCoordinator;
use crate::sync::debounce::SearchDebouncer;
use crate::sync::keys::DateRange;
use crate::sync::state::SyncedState;
use crate::ui::centered_rect;

/// Which surface owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Rows,
    Search,
    Dates,
    Filter,
    Export,
    Columns,
}

/// A mutation offered on the current selection, e.g. bulk delete.
pub struct BulkAction {
    pub key: char,
    pub label: String,
    run: BulkActionFn,
}

impl BulkAction {
    pub fn new(key: char, label: impl Into<String>, run: BulkActionFn) -> Self {
        Self {
            key,
            label: label.into(),
            run,
        }
    }
}

struct BulkOutcome {
    label: String,
    count: usize,
    result: Result<(), FetchError>,
}

const EXPORT_CHOICES: [RowSource; 3] = [
    RowSource::Selection,
    RowSource::CurrentPage,
    RowSource::AllPages,
];

pub struct ViewCore {
    name: String,
    pub state: SyncedState,
    pub adapter: DataSourceAdapter,
    pub selection: SelectionTracker,
    pub focus: Focus,
    debouncer: SearchDebouncer,
    search_input: Input,
    from_input: Input,
    to_input: Input,
    date_cursor: usize,
    export_choice: usize,
    status: String,
    runtime: Handle,
    export_dir: PathBuf,
    export_columns: Vec<ExportColumn>,
    identity_fetch: Option<IdentityFetchFn>,
    bulk_actions: Vec<BulkAction>,
    bulk_tx: mpsc::UnboundedSender<BulkOutcome>,
    bulk_rx: mpsc::UnboundedReceiver<BulkOutcome>,
    page_size_options: Vec<u32>,
    pub(crate) show_row_numbers: bool,
    pub(crate) card_min_width: u16,
    pub(crate) date_format: String,
}

impl ViewCore {
    /// Bind a view over `source`. `link` restores a previously shared
    /// address; pass an empty string for a fresh view.
    pub fn new(
        name: impl Into<String>,
        link: &str,
        source: DataSource,
        id_field: &str,
        runtime: Handle,
        config: &Config,
    ) -> Self {
        let bus = SharedAddress::with_link(link);
        let coordinator = UpdateCoordinator::new(bus);
        let state = SyncedState::bind(coordinator, config.behavior.default_page_size);
        let adapter = DataSourceAdapter::new(source, runtime.clone());

        let committed = state.search();
        let mut debouncer = SearchDebouncer::new(config.behavior.search_debounce_ms);
        debouncer.seed(committed.clone());
        let range = state.date_range();

        let (bulk_tx, bulk_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            adapter,
            selection: SelectionTracker::new(id_field),
            focus: Focus::Rows,
            debouncer,
            search_input: Input::new(committed.clone()).with_cursor(committed.len()),
            from_input: Input::new(range.from_date.clone()).with_cursor(range.from_date.len()),
            to_input: Input::new(range.to_date.clone()).with_cursor(range.to_date.len()),
            date_cursor: 0,
            export_choice: 1,
            status: String::new(),
            runtime,
            export_dir: config.export_dir(),
            export_columns: Vec::new(),
            identity_fetch: None,
            bulk_actions: Vec::new(),
            bulk_tx,
            bulk_rx,
            page_size_options: config.behavior.page_size_options.clone(),
            show_row_numbers: config.display.show_row_numbers,
            card_min_width: config.display.card_min_width,
            date_format: config.display.date_format.clone(),
            state,
        }
    }

    pub fn with_export_columns(mut self, columns: Vec<ExportColumn>) -> Self {
        self.export_columns = columns;
        self
    }

    pub fn with_identity_fetch(mut self, fetch: IdentityFetchFn) -> Self {
        self.identity_fetch = Some(fetch);
        self
    }

    pub fn with_bulk_action(mut self, action: BulkAction) -> Self {
        self.bulk_actions.push(action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub(crate) fn set_export_columns(&mut self, columns: Vec<ExportColumn>) {
        self.export_columns = columns;
    }

    /// One cooperative tick: commit a quiet search draft, flush staged
    /// state into at most one address write, refetch if the fetch inputs
    /// changed, apply completed work, then reconcile paging.
    pub fn on_tick(&mut self) {
        if let Some(term) = self.debouncer.take_ready() {
            self.state.set_search(term);
        }
        self.state.flush();
        self.adapter.sync(FetchParams::from_state(&self.state));
        self.adapter.pump();
        self.reconcile_page();
        self.drain_bulk_outcomes();
    }

    /// A narrowed result set can leave the requested page past the end;
    /// when the server says so, start over from page 1. An empty result
    /// reports zero pages and counts as past the end like any other.
    fn reconcile_page(&mut self) {
        let snapshot = self.adapter.snapshot();
        if snapshot.is_loading || !snapshot.is_success {
            return;
        }
        let Some(info) = snapshot.page_info() else {
            return;
        };
        if self.state.page() > info.total_pages.max(1) {
            self.state.set_page(1);
        }
    }

    fn drain_bulk_outcomes(&mut self) {
        while let Ok(outcome) = self.bulk_rx.try_recv() {
            match outcome.result {
                Ok(()) => {
                    self.status = format!("✓ {}: {} item(s)", outcome.label, outcome.count);
                    self.selection.clear();
                    self.adapter.invalidate();
                }
                Err(err) => {
                    self.status = format!("{} failed: {}", outcome.label, err.user_message());
                }
            }
        }
    }

    // ---- keyboard ----

    /// Dispatch when a toolbar overlay owns the keyboard. Returns whether
    /// the key went to an overlay.
    pub fn handle_focus_key(&mut self, key: KeyEvent) -> bool {
        match self.focus {
            Focus::Search => {
                self.handle_search_key(key);
                true
            }
            Focus::Dates => {
                self.handle_dates_key(key);
                true
            }
            Focus::Export => {
                self.handle_export_key(key);
                true
            }
            _ => false,
        }
    }

    /// Keys every view answers in rows mode. Returns whether the key was
    /// consumed.
    pub fn handle_shared_key(&mut self, key: KeyEvent, page_items: &[Value]) -> bool {
        match key.code {
            KeyCode::Char('/') => {
                self.focus = Focus::Search;
                true
            }
            KeyCode::Char('d') => {
                self.open_dates();
                true
            }
            KeyCode::Char('e') => {
                self.focus = Focus::Export;
                true
            }
            KeyCode::Char('y') => {
                self.copy_share_link();
                true
            }
            KeyCode::Char('r') => {
                self.adapter.invalidate();
                self.status = "Refreshing".to_string();
                true
            }
            KeyCode::Char('n') => {
                self.next_page();
                true
            }
            KeyCode::Char('p') => {
                self.prev_page();
                true
            }
            KeyCode::Char('+') => {
                self.cycle_page_size(true);
                true
            }
            KeyCode::Char('-') => {
                self.cycle_page_size(false);
                true
            }
            KeyCode::Char('a') => {
                self.selection.select_all(page_items);
                true
            }
            KeyCode::Char('c') => {
                self.selection.clear();
                true
            }
            KeyCode::Char(ch) => self.trigger_bulk_action(ch),
            _ => false,
        }
    }

    fn trigger_bulk_action(&mut self, key: char) -> bool {
        let Some(action) = self.bulk_actions.iter().find(|a| a.key == key) else {
            return false;
        };
        if self.selection.is_empty() {
            self.status = format!("{}: nothing selected", action.label);
            return true;
        }
        let ids: Vec<ItemId> = self.selection.ids().cloned().collect();
        let count = ids.len();
        let label = action.label.clone();
        let run = Arc::clone(&action.run);
        let tx = self.bulk_tx.clone();
        info!(target: "bulk", "{} over {} item(s)", label, count);
        self.runtime.spawn(async move {
            let result = (run)(ids).await;
            let _ = tx.send(BulkOutcome {
                label,
                count,
                result,
            });
        });
        self.status = format!("{}: {} item(s)...", action.label, count);
        true
    }

    pub fn next_page(&mut self) {
        let bound = self
            .adapter
            .snapshot()
            .page_info()
            .map(|info| info.total_pages)
            .unwrap_or(u32::MAX);
        if bound == 0 {
            return;
        }
        let page = self.state.page();
        if page < bound {
            self.state.set_page(page + 1);
        }
    }

    pub fn prev_page(&mut self) {
        let page = self.state.page();
        if page > 1 {
            self.state.set_page(page - 1);
        }
    }

    fn cycle_page_size(&mut self, forward: bool) {
        if self.page_size_options.is_empty() {
            return;
        }
        let current = self.state.page_size();
        let pos = self.page_size_options.iter().position(|&s| s == current);
        let next = match (pos, forward) {
            (Some(i), true) if i + 1 < self.page_size_options.len() => {
                self.page_size_options[i + 1]
            }
            (Some(i), false) if i > 0 => self.page_size_options[i - 1],
            (Some(_), _) => return,
            // current size came from a link and is off the menu; snap back
            (None, _) => self.page_size_options[0],
        };
        self.state.set_page_size(next);
    }

    pub fn copy_share_link(&mut self) {
        let link = self.state.share_link();
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(link)) {
            Ok(()) => self.status = "✓ Link copied to clipboard".to_string(),
            Err(err) => {
                warn!(target: "share", "clipboard unavailable: {}", err);
                self.status = format!("Clipboard unavailable: {}", err);
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let term = self.search_input.value().to_string();
                self.debouncer.cancel(term.clone());
                self.state.set_search(term);
                self.focus = Focus::Rows;
            }
            KeyCode::Esc => {
                let committed = self.state.search();
                self.search_input = Input::new(committed.clone()).with_cursor(committed.len());
                self.debouncer.cancel(committed);
                self.focus = Focus::Rows;
            }
            _ => {
                let before = self.search_input.value().to_string();
                self.search_input.handle_event(&Event::Key(key));
                let after = self.search_input.value().to_string();
                if before != after {
                    self.debouncer.type_term(after);
                }
            }
        }
    }

    fn open_dates(&mut self) {
        let range = self.state.date_range();
        self.from_input = Input::new(range.from_date.clone()).with_cursor(range.from_date.len());
        self.to_input = Input::new(range.to_date.clone()).with_cursor(range.to_date.len());
        self.date_cursor = 0;
        self.focus = Focus::Dates;
    }

    fn handle_dates_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => self.date_cursor ^= 1,
            KeyCode::Enter => {
                let from = self.from_input.value().trim().to_string();
                let to = self.to_input.value().trim().to_string();
                for value in [&from, &to] {
                    if !value.is_empty()
                        && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err()
                    {
                        self.status = format!("Invalid date '{}', expected YYYY-MM-DD", value);
                        return;
                    }
                }
                self.state.set_date_range(DateRange {
                    from_date: from,
                    to_date: to,
                });
                self.focus = Focus::Rows;
            }
            KeyCode::Esc => self.focus = Focus::Rows,
            _ => {
                let input = if self.date_cursor == 0 {
                    &mut self.from_input
                } else {
                    &mut self.to_input
                };
                input.handle_event(&Event::Key(key));
            }
        }
    }

    fn handle_export_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = Focus::Rows,
            KeyCode::Up | KeyCode::Char('k') => {
                self.export_choice = self
                    .export_choice
                    .checked_sub(1)
                    .unwrap_or(EXPORT_CHOICES.len() - 1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.export_choice = (self.export_choice + 1) % EXPORT_CHOICES.len();
            }
            KeyCode::Enter => {
                let choice = EXPORT_CHOICES[self.export_choice];
                self.focus = Focus::Rows;
                self.run_export_choice(choice);
            }
            _ => {}
        }
    }

    // ---- export ----

    fn run_export_choice(&mut self, choice: RowSource) {
        let rows = match self.gather_rows(choice) {
            Ok(rows) => rows,
            Err(err) => {
                self.status = format!("Export failed: {}", err.user_message());
                return;
            }
        };
        let sort = match choice {
            // the current page already arrived in server order
            RowSource::CurrentPage => None,
            _ => self.state.sort(),
        };
        let request = ExportRequest {
            name: self.name.clone(),
            columns: self.ordered_export_columns(),
            rows,
            sort,
        };
        match run_export(request, &self.export_dir) {
            Ok(outcome) => self.status = outcome.status_line(),
            Err(ExportError::NoRows) => {
                self.status = format!("Nothing to export ({})", choice.label());
            }
            Err(err) => self.status = format!("Export failed: {}", err),
        }
    }

    fn gather_rows(&mut self, choice: RowSource) -> Result<Vec<Value>, FetchError> {
        match choice {
            RowSource::CurrentPage => Ok(self.adapter.items().to_vec()),
            RowSource::Selection => {
                let page_items = self.adapter.items().to_vec();
                let selection = &self.selection;
                let fetch = self.identity_fetch.as_ref();
                self.runtime
                    .block_on(selection.resolve_selected_items(&page_items, fetch))
            }
            RowSource::AllPages => {
                let mut params = self
                    .adapter
                    .last_params()
                    .cloned()
                    .unwrap_or_else(|| FetchParams::from_state(&self.state));
                let total = self
                    .adapter
                    .snapshot()
                    .page_info()
                    .map(|info| info.total_items)
                    .unwrap_or(0);
                params.page = 1;
                params.limit = total.clamp(1, u32::MAX as u64) as u32;
                let result = self.runtime.block_on(self.adapter.fetch_once(params))?;
                Ok(result.items)
            }
        }
    }

    /// Export columns in the synchronized order, visible ones only, with
    /// live width overrides applied.
    fn ordered_export_columns(&self) -> Vec<ExportColumn> {
        let order = self.state.column_order();
        let mut columns: Vec<ExportColumn> = Vec::new();
        for id in &order {
            if let Some(column) = self.export_columns.iter().find(|c| &c.id == id) {
                columns.push(column.clone());
            }
        }
        for column in &self.export_columns {
            if !order.contains(&column.id) {
                columns.push(column.clone());
            }
        }
        columns.retain(|c| self.state.is_column_visible(&c.id));
        for column in &mut columns {
            if let Some(width) = self.state.column_width(&column.id) {
                column.width = Some(width);
            }
        }
        columns
    }

    // ---- chrome ----

    /// Toolbar: search box (with debounce countdown), date window summary,
    /// page size.
    pub fn render_toolbar(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(24),
                Constraint::Length(28),
                Constraint::Length(16),
            ])
            .split(area);

        let mut search_title = "Search [/]".to_string();
        if let Some(remaining) = self.debouncer.time_remaining() {
            let ms = remaining.as_millis();
            if ms > 0 {
                search_title.push_str(&format!(" ({}ms)", ms));
            }
        }
        let search_style = if self.focus == Focus::Search {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let search = Paragraph::new(self.search_input.value())
            .style(search_style)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(search_title)
                    .border_style(search_style),
            );
        f.render_widget(search, chunks[0]);
        if self.focus == Focus::Search {
            f.set_cursor_position((
                chunks[0].x + self.search_input.cursor() as u16 + 1,
                chunks[0].y + 1,
            ));
        }

        let range = self.state.date_range();
        let dates_text = if range.from_date.is_empty() && range.to_date.is_empty() {
            "all dates".to_string()
        } else {
            format!(
                "{}..{}",
                if range.from_date.is_empty() {
                    "*"
                } else {
                    range.from_date.as_str()
                },
                if range.to_date.is_empty() {
                    "*"
                } else {
                    range.to_date.as_str()
                },
            )
        };
        let dates = Paragraph::new(dates_text)
            .block(Block::default().borders(Borders::ALL).title("Dates [d]"));
        f.render_widget(dates, chunks[1]);

        let size = Paragraph::new(format!("{}/page", self.state.page_size()))
            .block(Block::default().borders(Borders::ALL).title("Size [+/-]"));
        f.render_widget(size, chunks[2]);
    }

    /// Paging summary, selection count, transient status.
    pub fn render_footer(&self, f: &mut Frame, area: Rect) {
        let paging = match self.adapter.snapshot().page_info() {
            Some(info) => format!(
                "Page {}/{} | {} items",
                self.state.page(),
                info.total_pages.max(1),
                info.total_items
            ),
            None => format!("Page {}", self.state.page()),
        };
        let mut spans = vec![
            Span::styled(paging, Style::default().fg(Color::Cyan)),
            Span::raw(" | "),
            Span::raw(format!("{} selected", self.selection.len())),
        ];
        if self.adapter.snapshot().is_loading {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                "loading...",
                Style::default().fg(Color::Yellow),
            ));
        }
        if !self.status.is_empty() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                self.status.as_str(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
        f.render_widget(footer, area);
    }

    /// The shareable address for the current state, always visible.
    pub fn render_share_line(&self, f: &mut Frame, area: Rect) {
        let link = self.state.share_link();
        let shown = if link.is_empty() {
            "(default view)".to_string()
        } else {
            link
        };
        let line = Line::from(vec![
            Span::styled("link ", Style::default().fg(Color::DarkGray)),
            Span::styled(shown, Style::default().fg(Color::Gray)),
            Span::styled("  [y to copy]", Style::default().fg(Color::DarkGray)),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    pub fn render_export_menu(&self, f: &mut Frame) {
        if self.focus != Focus::Export {
            return;
        }
        let area = centered_rect(34, 28, f.area());
        f.render_widget(Clear, area);
        let mut lines = vec![Line::from(Span::styled(
            "Export rows",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))];
        for (i, choice) in EXPORT_CHOICES.iter().enumerate() {
            let marker = if i == self.export_choice { "► " } else { "  " };
            let mut label = format!("{}{}", marker, choice.label());
            if *choice == RowSource::Selection {
                label.push_str(&format!(" ({})", self.selection.len()));
            }
            let style = if i == self.export_choice {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(label, style)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter=Export  Esc=Cancel",
            Style::default().fg(Color::DarkGray),
        )));
        let menu =
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Export"));
        f.render_widget(menu, area);
    }

    pub fn render_dates_editor(&self, f: &mut Frame) {
        if self.focus != Focus::Dates {
            return;
        }
        let area = centered_rect(40, 32, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Date range (YYYY-MM-DD, Tab to switch)");
        let inner = block.inner(area);
        f.render_widget(block, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(inner);

        for (idx, (title, input)) in [("From", &self.from_input), ("To", &self.to_input)]
            .into_iter()
            .enumerate()
        {
            let style = if self.date_cursor == idx {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            let widget = Paragraph::new(input.value()).style(style).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(style),
            );
            f.render_widget(widget, chunks[idx]);
            if self.date_cursor == idx {
                f.set_cursor_position((
                    chunks[idx].x + input.cursor() as u16 + 1,
                    chunks[idx].y + 1,
                ));
            }
        }
    }

    /// An error settle blanks the view until a retry succeeds, stale rows
    /// included. Both view shapes check this before drawing rows.
    pub(crate) fn blocking_error(snapshot: &QuerySnapshot) -> Option<FetchError> {
        if !snapshot.is_error {
            return None;
        }
        Some(
            snapshot
                .error
                .clone()
                .unwrap_or_else(|| FetchError::Network("request failed".to_string())),
        )
    }

    /// Full-area error body shown in place of the rows.
    pub(crate) fn render_error(&self, f: &mut Frame, area: Rect, error: &FetchError) {
        let hint = if error.is_retryable() {
            "Press r to retry"
        } else {
            "Press r to reload"
        };
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                error.user_message(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        ];
        let body = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .title(self.name.as_str())
                .border_style(Style::default().fg(Color::Red)),
        );
        f.render_widget(body, area);
    }
}
