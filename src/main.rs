use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Tabs;
use ratatui::{Frame, Terminal};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tracing::info;

use viewsync::api_client::ApiClient;
use viewsync::config::Config;
use viewsync::data::memory::{CachedMemoryQuery, MemorySource};
use viewsync::data::selection::{BulkActionFn, IdentityFetchFn};
use viewsync::data::source::DataSource;
use viewsync::ui::core::{BulkAction, Focus, ViewCore};
use viewsync::ui::grid_view::{CardRenderer, GridView};
use viewsync::ui::table_view::{ColumnDef, TableView};
use viewsync::utils::logging::init_tracing;

const TICK: Duration = Duration::from_millis(50);

struct App {
    tab: usize,
    courses: TableView,
    projects: GridView,
}

impl App {
    fn active_focus(&self) -> Focus {
        if self.tab == 0 {
            self.courses.core.focus
        } else {
            self.projects.core.focus
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.active_focus() == Focus::Rows {
            match key.code {
                KeyCode::Tab => {
                    self.tab = (self.tab + 1) % 2;
                    return Ok(false);
                }
                KeyCode::Char('1') => {
                    self.tab = 0;
                    return Ok(false);
                }
                KeyCode::Char('2') => {
                    self.tab = 1;
                    return Ok(false);
                }
                _ => {}
            }
        }
        if self.tab == 0 {
            self.courses.handle_key(key)
        } else {
            self.projects.handle_key(key)
        }
    }

    // Both views tick so completions land even on the inactive tab.
    fn on_tick(&mut self) {
        self.courses.core.on_tick();
        self.projects.core.on_tick();
    }
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;
        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key)? {
                    return Ok(());
                }
            }
        }
        app.on_tick();
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let titles: Vec<Line> = ["1:Courses", "2:Projects"]
        .iter()
        .map(|t| Line::from(*t))
        .collect();
    let tabs = Tabs::new(titles).select(app.tab).highlight_style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
            .bg(Color::DarkGray),
    );
    f.render_widget(tabs, chunks[0]);

    if app.tab == 0 {
        app.courses.core.render_toolbar(f, chunks[1]);
        app.courses.render(f, chunks[2]);
        app.courses.core.render_footer(f, chunks[3]);
        app.courses.core.render_share_line(f, chunks[4]);
        app.courses.core.render_dates_editor(f);
        app.courses.core.render_export_menu(f);
    } else {
        app.projects.core.render_toolbar(f, chunks[1]);
        app.projects.render(f, chunks[2]);
        app.projects.core.render_footer(f, chunks[3]);
        app.projects.core.render_share_line(f, chunks[4]);
        app.projects.core.render_dates_editor(f);
        app.projects.core.render_export_menu(f);
    }
}

fn demo_courses() -> Vec<Value> {
    const NAMES: [&str; 24] = [
        "Algebra II",
        "Biology",
        "Chemistry",
        "World History",
        "Literature",
        "Physics",
        "Geometry",
        "Computer Science",
        "Art History",
        "Music Theory",
        "Statistics",
        "Economics",
        "Psychology",
        "French",
        "Spanish",
        "Creative Writing",
        "Earth Science",
        "Philosophy",
        "Calculus",
        "Botany",
        "Astronomy",
        "Geography",
        "Drama",
        "Linguistics",
    ];
    const TEACHERS: [&str; 5] = [
        "Ada Lovelace",
        "Grace Hopper",
        "Alan Turing",
        "Katherine Johnson",
        "Edsger Dijkstra",
    ];
    const STATUSES: [&str; 3] = ["active", "draft", "archived"];
    NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let students: Vec<Value> = (0..(i % 7))
                .map(|s| json!({"id": format!("s{}-{}", i, s)}))
                .collect();
            json!({
                "id": i + 1,
                "name": name,
                "teacher": {"name": TEACHERS[i % TEACHERS.len()]},
                "students": students,
                "status": STATUSES[i % STATUSES.len()],
                "score": 40 + (i * 13) % 60,
                "created_at": format!("2024-{:02}-{:02}T09:00:00Z", (i % 12) + 1, (i % 27) + 1),
            })
        })
        .collect()
}

fn demo_projects() -> Vec<Value> {
    const TITLES: [&str; 15] = [
        "Library catalog refresh",
        "Science fair",
        "Robotics club",
        "Open day",
        "Yearbook",
        "Garden build",
        "Choir tour",
        "Chess tournament",
        "Coding bootcamp",
        "Theater production",
        "Debate league",
        "Art exhibition",
        "Sports day",
        "Newsletter relaunch",
        "Mentoring program",
    ];
    const STATUSES: [&str; 3] = ["planning", "active", "done"];
    TITLES
        .iter()
        .enumerate()
        .map(|(i, title)| {
            json!({
                "id": format!("p-{}", i + 1),
                "title": title,
                "status": STATUSES[i % STATUSES.len()],
                "team_members": 1 + i % 5,
                "due_date": format!("2024-{:02}-{:02}", (i % 12) + 1, ((i * 3) % 27) + 1),
            })
        })
        .collect()
}

fn course_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("name", "Name", 22),
        ColumnDef::new("teacher.name", "Teacher", 18),
        ColumnDef::counting("student_count", "Students", "students", 10).not_sortable(),
        ColumnDef::new("status", "Status", 10),
        ColumnDef::new("score", "Score", 7),
        ColumnDef::new("created_at", "Created", 12),
    ]
}

fn project_card() -> CardRenderer {
    Box::new(|item| {
        let title = item["title"].as_str().unwrap_or("(untitled)").to_string();
        let status = item["status"].as_str().unwrap_or("unknown").to_string();
        let members = item["team_members"].as_u64().unwrap_or(0);
        let due = item["due_date"].as_str().unwrap_or("-").to_string();
        vec![
            Line::from(Span::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("status: {}", status)),
            Line::from(format!("{} member(s), due {}", members, due)),
        ]
    })
}

fn project_sort_fields() -> Vec<(String, String)> {
    vec![
        ("due_date".to_string(), "due".to_string()),
        ("title".to_string(), "title".to_string()),
        ("status".to_string(), "status".to_string()),
    ]
}

fn build_memory_views(runtime: &Runtime, config: &Config, link: &str) -> (TableView, GridView) {
    let courses = Arc::new(
        MemorySource::new(demo_courses())
            .with_search_fields(&["name", "status"])
            .with_date_field("created_at")
            .with_latency(Duration::from_millis(150)),
    );

    let identity_fetch: IdentityFetchFn = {
        let source = Arc::clone(&courses);
        Arc::new(move |ids| {
            let source = Arc::clone(&source);
            Box::pin(async move { Ok(source.fetch_by_ids("id", &ids)) })
        })
    };
    let delete: BulkActionFn = {
        let source = Arc::clone(&courses);
        Arc::new(move |ids| {
            let source = Arc::clone(&source);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                source.remove_by_ids("id", &ids);
                Ok(())
            })
        })
    };
    let archive: BulkActionFn = {
        let source = Arc::clone(&courses);
        Arc::new(move |ids| {
            let source = Arc::clone(&source);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                source.update_by_ids("id", &ids, |item| {
                    item["status"] = json!("archived");
                });
                Ok(())
            })
        })
    };

    let courses_core = ViewCore::new(
        "courses",
        link,
        MemorySource::source(Arc::clone(&courses)),
        "id",
        runtime.handle().clone(),
        config,
    )
    .with_identity_fetch(identity_fetch)
    .with_bulk_action(BulkAction::new('D', "Delete", delete))
    .with_bulk_action(BulkAction::new('A', "Archive", archive));
    let courses_view = TableView::new(courses_core, course_columns());

    let projects = CachedMemoryQuery::new(
        MemorySource::new(demo_projects())
            .with_search_fields(&["title", "status"])
            .with_date_field("due_date"),
    );
    let projects_core = ViewCore::new(
        "projects",
        "",
        DataSource::managed(projects),
        "id",
        runtime.handle().clone(),
        config,
    );
    // Three card lines plus the border.
    let projects_view = GridView::new(projects_core, project_card())
        .with_card_height(5)
        .with_sort_fields(project_sort_fields());

    (courses_view, projects_view)
}

fn build_server_views(
    runtime: &Runtime,
    config: &Config,
    link: &str,
) -> Result<(TableView, GridView)> {
    let timeout = Duration::from_secs(config.server.timeout_secs);
    let courses_api = ApiClient::new(&config.server.base_url, "courses", timeout)
        .context("building the courses API client")?;
    let projects_api = ApiClient::new(&config.server.base_url, "projects", timeout)
        .context("building the projects API client")?;

    let courses_core = ViewCore::new(
        "courses",
        link,
        DataSource::Callback(courses_api.fetch_fn()),
        "id",
        runtime.handle().clone(),
        config,
    )
    .with_identity_fetch(courses_api.identity_fetch_fn())
    .with_bulk_action(BulkAction::new('D', "Delete", courses_api.delete_fn()))
    .with_bulk_action(BulkAction::new('A', "Assign", courses_api.assign_fn("staff-1")));
    let courses_view = TableView::new(courses_core, course_columns());

    let projects_core = ViewCore::new(
        "projects",
        "",
        DataSource::Callback(projects_api.fetch_fn()),
        "id",
        runtime.handle().clone(),
        config,
    )
    .with_identity_fetch(projects_api.identity_fetch_fn());
    let projects_view = GridView::new(projects_core, project_card())
        .with_card_height(5)
        .with_sort_fields(project_sort_fields());

    Ok((courses_view, projects_view))
}

fn print_help() {
    println!(
        "{}",
        "viewsync - synchronized list views for the terminal"
            .blue()
            .bold()
    );
    println!();
    println!("{}", "USAGE:".yellow());
    println!("  viewsync [OPTIONS]");
    println!();
    println!("{}", "OPTIONS:".yellow());
    println!("  {}   Restore a shared view address", "--link <ADDR>".green());
    println!("  {}        Fetch from the configured API server", "--server".green());
    println!("  {}          Print this help", "--help".green());
    println!();
    println!("{}", "KEYS:".yellow());
    println!("  /            search (debounced)");
    println!("  d            date range");
    println!("  s / S        sort active column or grid field / clear sort");
    println!("  o            next grid sort field");
    println!("  f / F        filter active column / clear filters");
    println!("  C            column settings");
    println!("  space a c    select row / select page / clear selection");
    println!("  e            export (CSV + XLSX)");
    println!("  y            copy share link");
    println!("  n p + -      page forward, back, grow, shrink");
    println!("  Tab 1 2      switch views");
    println!("  q            quit");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        return Ok(());
    }

    let config = Config::load().context("loading configuration")?;
    let log_path = init_tracing(None).context("initializing logging")?;
    eprintln!("Logs: {}", log_path.display());

    let link = args
        .iter()
        .position(|arg| arg == "--link")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default();
    let use_server = args.contains(&"--server".to_string());

    let runtime = Runtime::new().context("starting the async runtime")?;
    let (courses, projects) = if use_server {
        build_server_views(&runtime, &config, &link)?
    } else {
        build_memory_views(&runtime, &config, &link)
    };
    let mut app = App {
        tab: 0,
        courses,
        projects,
    };

    info!(target: "system", "starting ui (server mode: {})", use_server);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{:?}", err);
    }
    Ok(())
}
