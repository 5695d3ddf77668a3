//! Terminal dashboard for OpenClaw sessions, cron jobs and gateway health.
//! Retro terminal style - green/red on black like classic computers.

use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear as ClearWidget, Gauge, List, ListItem, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use tokio::sync::watch;

use crate::analytics::{
    active_count, cron_summary, describe_schedule, display_sessions, estimated_cost, format_age,
    format_duration, format_relative, format_tokens, jobs_by_next_run, main_session, model_name,
    session_label, session_name, status_items, token_totals, top_sessions, usage_by_type, Health,
    TOP_SESSIONS,
};
use crate::models::{CronSchedule, DashboardData, RunStatus};
use crate::poller::{DashboardSnapshot, Origin, PollState, PollerHandle};

// Retro Terminal Color Palette - Classic Green on Black
const TERM_GREEN: Color = Color::Rgb(0, 255, 65);        // Bright phosphor green
const TERM_GREEN_DIM: Color = Color::Rgb(0, 180, 45);    // Dimmer green
const TERM_GREEN_DARK: Color = Color::Rgb(0, 100, 25);   // Dark green for borders
const TERM_RED: Color = Color::Rgb(255, 50, 50);         // Alert red
const TERM_AMBER: Color = Color::Rgb(255, 176, 0);       // Amber for warnings
const TERM_BLACK: Color = Color::Rgb(0, 0, 0);           // Pure black background

const TAB_TITLES: [&str; 4] = ["[1] SESSIONS", "[2] CRON", "[3] SYSTEM", "[4] TOKENS"];

/// App state for the TUI
pub struct App {
    snapshot: DashboardSnapshot,
    mock_mode: bool,
    selected_index: usize,
    tab_index: usize,
    animation_frame: usize,
    should_quit: bool,
    refetch_requested: bool,
}

impl App {
    pub fn new(snapshot: DashboardSnapshot, mock_mode: bool) -> Self {
        Self {
            snapshot,
            mock_mode,
            selected_index: 0,
            tab_index: 0,
            animation_frame: 0,
            should_quit: false,
            refetch_requested: false,
        }
    }

    fn data(&self) -> Option<&DashboardData> {
        self.snapshot.data.as_ref()
    }

    fn visible_session_count(&self) -> usize {
        self.data()
            .map(|d| display_sessions(&d.sessions.sessions).len())
            .unwrap_or(0)
    }

    /// Swap in a new snapshot, keeping the selection in bounds.
    pub fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) {
        self.snapshot = snapshot;
        let count = self.visible_session_count();
        if self.selected_index >= count {
            self.selected_index = count.saturating_sub(1);
        }
    }

    pub fn next_session(&mut self) {
        if self.selected_index + 1 < self.visible_session_count() {
            self.selected_index += 1;
        }
    }

    pub fn previous_session(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn next_tab(&mut self) {
        self.tab_index = (self.tab_index + 1) % TAB_TITLES.len();
    }

    pub fn previous_tab(&mut self) {
        self.tab_index = if self.tab_index == 0 {
            TAB_TITLES.len() - 1
        } else {
            self.tab_index - 1
        };
    }

    pub fn tick(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 8;
    }

    /// Apply one key press.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => self.should_quit = true,
            KeyCode::Char('r') => self.refetch_requested = true,
            KeyCode::Down | KeyCode::Char('j') => self.next_session(),
            KeyCode::Up | KeyCode::Char('k') => self.previous_session(),
            KeyCode::Tab | KeyCode::Right => self.next_tab(),
            KeyCode::BackTab | KeyCode::Left => self.previous_tab(),
            KeyCode::Char(c @ '1'..='4') => self.tab_index = (c as usize) - ('1' as usize),
            _ => {}
        }
    }
}

/// Run the interactive dashboard until the user quits, then stop the poller.
pub async fn run_tui(handle: PollerHandle, mock_mode: bool) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Clear(ClearType::All))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(handle.current(), mock_mode);
    let mut updates = handle.subscribe();
    let result = event_loop(&mut terminal, &mut app, &handle, &mut updates);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    handle.shutdown().await;
    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    handle: &PollerHandle,
    updates: &mut watch::Receiver<DashboardSnapshot>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        if updates.has_changed().unwrap_or(false) {
            let snapshot = updates.borrow_and_update().clone();
            app.apply_snapshot(snapshot);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers);
            }
        }

        if app.refetch_requested {
            app.refetch_requested = false;
            handle.refetch();
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let size = f.area();

    f.render_widget(ClearWidget, size);
    f.render_widget(Block::default().style(Style::default().bg(TERM_BLACK)), size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer/help
        ])
        .split(size);

    render_header(f, chunks[0], app);
    render_tabs(f, chunks[1], app);

    match app.data() {
        None => render_waiting(f, chunks[2]),
        Some(data) => match app.tab_index {
            0 => render_sessions_tab(f, chunks[2], app, data),
            1 => render_cron_tab(f, chunks[2], data),
            2 => render_system_tab(f, chunks[2], data),
            _ => render_tokens_tab(f, chunks[2], data),
        },
    }

    render_footer(f, chunks[3], app);
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(TERM_GREEN_DIM))
        .style(Style::default().bg(TERM_BLACK))
        .title(format!(" {} ", title))
        .title_style(Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD))
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let cursor = if app.animation_frame % 2 == 0 { "█" } else { " " };

    let (state, state_color) = match app.snapshot.state {
        PollState::Loading => ("LOADING", TERM_GREEN_DIM),
        PollState::Ready => ("ONLINE", TERM_GREEN),
        PollState::ErrorWithStaleData => ("STALE", TERM_AMBER),
        PollState::ErrorNoData => ("OFFLINE", TERM_RED),
    };
    let updated = match app.snapshot.last_updated {
        Some(at) => format!("UPD {}", format_age(Utc::now().timestamp_millis() - at).to_uppercase()),
        None => "UPD ---".to_string(),
    };

    let mut spans = vec![
        Span::styled(
            format!(" OPENCLAW DASHBOARD {} ", cursor),
            Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("[{}] ", state), Style::default().fg(state_color).add_modifier(Modifier::BOLD)),
        Span::styled(updated, Style::default().fg(TERM_GREEN_DIM)),
    ];
    if app.mock_mode {
        spans.push(Span::styled(" [MOCK]", Style::default().fg(TERM_AMBER)));
    }

    let header = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(TERM_BLACK))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(TERM_GREEN_DIM))
                .style(Style::default().bg(TERM_BLACK)),
        );
    f.render_widget(header, area);
}

fn render_tabs(f: &mut Frame, area: Rect, app: &App) {
    let tabs = Tabs::new(TAB_TITLES.to_vec())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(TERM_GREEN_DIM))
                .style(Style::default().bg(TERM_BLACK)),
        )
        .select(app.tab_index)
        .style(Style::default().fg(TERM_GREEN_DIM).bg(TERM_BLACK))
        .highlight_style(
            Style::default()
                .fg(TERM_BLACK)
                .bg(TERM_GREEN)
                .add_modifier(Modifier::BOLD),
        )
        .divider(symbols::line::VERTICAL);
    f.render_widget(tabs, area);
}

fn render_waiting(f: &mut Frame, area: Rect) {
    let waiting = Paragraph::new("CONNECTING TO OPENCLAW...")
        .style(Style::default().fg(TERM_GREEN_DIM).bg(TERM_BLACK))
        .block(panel("DASHBOARD"));
    f.render_widget(waiting, area);
}

fn origin_tag(app: &App, pick: fn(&crate::poller::SliceOrigins) -> Origin) -> &'static str {
    match app.snapshot.origins.as_ref().map(pick) {
        Some(Origin::LastKnownGood) => " (cached)",
        Some(Origin::Mock) => " (sample)",
        _ => "",
    }
}

fn render_sessions_tab(f: &mut Frame, area: Rect, app: &App, data: &DashboardData) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(area);

    let header_cells = [" ", "SESSION", "MODEL", "CONTEXT", "TOKENS", "UPDATED"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1).style(Style::default().bg(TERM_BLACK));

    let sessions = display_sessions(&data.sessions.sessions);
    let rows: Vec<Row> = sessions
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let is_selected = i == app.selected_index;
            let (fg, bg, selector) = if is_selected {
                (TERM_BLACK, TERM_GREEN, "▶")
            } else {
                (TERM_GREEN, TERM_BLACK, " ")
            };

            let context = session
                .percent_used
                .map(|p| format!("{:>3.0}%", p))
                .unwrap_or_else(|| " ---".to_string());
            let context_style = match session.percent_used {
                Some(p) if p >= 90.0 && !is_selected => Style::default().fg(TERM_RED),
                Some(p) if p >= 70.0 && !is_selected => Style::default().fg(TERM_AMBER),
                _ => Style::default(),
            };

            Row::new(vec![
                Cell::from(selector),
                Cell::from(truncate_str(&session_name(&session.key), 22)),
                Cell::from(session.model.as_deref().map(model_name).unwrap_or_else(|| "---".to_string())),
                Cell::from(context).style(context_style),
                Cell::from(format!("{:>6}", format_tokens(session.total_tokens.unwrap_or(0)))),
                Cell::from(format_age(session.age_ms)),
            ])
            .style(Style::default().fg(fg).bg(bg))
        })
        .collect();

    let title = format!("SESSIONS ({}){}", data.sessions.count, origin_tag(app, |o| o.sessions));
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),  // Selector
            Constraint::Length(23), // Name
            Constraint::Length(10), // Model
            Constraint::Length(8),  // Context
            Constraint::Length(7),  // Tokens
            Constraint::Min(9),     // Age
        ],
    )
    .header(header)
    .block(panel(&title))
    .style(Style::default().bg(TERM_BLACK));
    f.render_widget(table, chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(4)])
        .split(chunks[1]);

    // Main session context window
    let main_used = main_session(&data.sessions.sessions)
        .and_then(|s| s.percent_used)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);
    let gauge_color = if main_used >= 90.0 {
        TERM_RED
    } else if main_used >= 70.0 {
        TERM_AMBER
    } else {
        TERM_GREEN
    };
    let gauge = Gauge::default()
        .block(panel("MAIN CONTEXT"))
        .gauge_style(Style::default().fg(gauge_color).bg(TERM_BLACK))
        .ratio(main_used / 100.0)
        .label(format!("{:.0}%", main_used));
    f.render_widget(gauge, right_chunks[0]);

    let mut summary = vec![
        Line::from(Span::styled(
            format!("TOTAL:  {}", data.sessions.count),
            Style::default().fg(TERM_GREEN),
        )),
        Line::from(Span::styled(
            format!("ACTIVE: {}", active_count(&data.sessions.sessions)),
            Style::default().fg(TERM_GREEN),
        )),
        Line::from(""),
    ];
    if let Some(selected) = sessions.get(app.selected_index) {
        summary.push(Line::from(Span::styled(
            selected.key.clone(),
            Style::default().fg(TERM_GREEN_DIM),
        )));
        if let Some(id) = &selected.session_id {
            summary.push(Line::from(Span::styled(
                format!("ID: {}", id),
                Style::default().fg(TERM_GREEN_DIM),
            )));
        }
        if let (Some(input), Some(output)) = (selected.input_tokens, selected.output_tokens) {
            summary.push(Line::from(Span::styled(
                format!("IN/OUT: {} / {}", format_tokens(input), format_tokens(output)),
                Style::default().fg(TERM_GREEN_DIM),
            )));
        }
    }

    let summary = Paragraph::new(summary)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("OVERVIEW"));
    f.render_widget(summary, right_chunks[1]);
}

fn schedule_text(schedule: &CronSchedule) -> String {
    match schedule {
        CronSchedule::Cron { tz: Some(tz), .. } => {
            let zone = tz.rsplit('/').next().unwrap_or(tz);
            format!("{} {}", describe_schedule(schedule), zone)
        }
        _ => describe_schedule(schedule),
    }
}

fn render_cron_tab(f: &mut Frame, area: Rect, data: &DashboardData) {
    let jobs = jobs_by_next_run(&data.cron.jobs);
    let summary = cron_summary(&data.cron.jobs);
    let now = Utc::now().timestamp_millis();

    let failing: Vec<_> = jobs.iter().filter(|j| j.has_errors()).collect();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(failing.len().min(4) as u16 + 2),
        ])
        .split(area);

    let header_cells = ["", "JOB", "SCHEDULE", "LAST", "TOOK", "NEXT"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = jobs
        .iter()
        .map(|job| {
            let (marker, color) = match (job.enabled, job.state.last_status) {
                (false, _) => ("○", TERM_GREEN_DARK),
                (true, Some(RunStatus::Error)) => ("✗", TERM_RED),
                (true, _) if job.has_errors() => ("✗", TERM_RED),
                (true, _) => ("●", TERM_GREEN),
            };
            let last = job
                .state
                .last_run_at_ms
                .map(|at| format_age(now.saturating_sub(at)))
                .unwrap_or_else(|| "never".to_string());
            let took = job
                .state
                .last_duration_ms
                .map(format_duration)
                .unwrap_or_else(|| "---".to_string());
            let next = job
                .state
                .next_run_at_ms
                .map(|at| format_relative(at.saturating_sub(now)))
                .unwrap_or_else(|| "---".to_string());

            Row::new(vec![
                Cell::from(marker).style(Style::default().fg(color)),
                Cell::from(truncate_str(&job.name, 32)),
                Cell::from(schedule_text(&job.schedule)),
                Cell::from(last),
                Cell::from(took),
                Cell::from(next),
            ])
            .style(Style::default().fg(TERM_GREEN).bg(TERM_BLACK))
        })
        .collect();

    let title = format!(
        "CRON JOBS ({}/{} ENABLED, {} FAILING)",
        summary.enabled, summary.total, summary.erroring
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(33),
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(panel(&title))
    .style(Style::default().bg(TERM_BLACK));
    f.render_widget(table, chunks[0]);

    let errors: Vec<ListItem> = failing
        .iter()
        .take(4)
        .map(|job| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}: ", truncate_str(&job.name, 24)), Style::default().fg(TERM_AMBER)),
                Span::styled(
                    job.state.last_error.clone().unwrap_or_else(|| "unknown error".to_string()),
                    Style::default().fg(TERM_RED),
                ),
            ]))
        })
        .collect();
    let errors = List::new(errors)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("ERRORS"));
    f.render_widget(errors, chunks[1]);
}

fn render_system_tab(f: &mut Frame, area: Rect, data: &DashboardData) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let items: Vec<ListItem> = status_items(&data.status)
        .into_iter()
        .map(|item| {
            let color = match item.health {
                Health::Online => TERM_GREEN,
                Health::Warning => TERM_AMBER,
                Health::Offline => TERM_RED,
            };
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled("● ", Style::default().fg(color)),
                    Span::styled(format!("{:10}", item.label.to_uppercase()), Style::default().fg(TERM_GREEN)),
                    Span::styled(item.value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                ]),
                Line::from(Span::styled(
                    format!("  {}", item.detail),
                    Style::default().fg(TERM_GREEN_DIM),
                )),
            ])
        })
        .collect();
    let status_list = List::new(items)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("SYSTEM STATUS"));
    f.render_widget(status_list, chunks[0]);

    let status = &data.status;
    let mut lines = Vec::new();
    if let Some(host) = &status.gateway.host {
        lines.push(Line::from(Span::styled(
            format!("HOST: {} ({})", host.host, host.platform),
            Style::default().fg(TERM_GREEN),
        )));
        lines.push(Line::from(Span::styled(
            format!("IP:   {}", host.ip),
            Style::default().fg(TERM_GREEN_DIM),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("MODEL: {}", status.sessions.defaults.model),
        Style::default().fg(TERM_GREEN),
    )));
    lines.push(Line::from(""));
    for heartbeat in &status.heartbeat.agents {
        let state = if heartbeat.enabled { "on" } else { "off" };
        lines.push(Line::from(Span::styled(
            format!("HEARTBEAT {}: every {} ({})", heartbeat.agent_id, heartbeat.every, state),
            Style::default().fg(TERM_GREEN_DIM),
        )));
    }
    for agent in &status.agents.agents {
        lines.push(Line::from(Span::styled(
            format!(
                "AGENT {}: {} sessions, active {}",
                agent.name,
                agent.sessions_count,
                format_age(agent.last_active_age_ms)
            ),
            Style::default().fg(TERM_GREEN),
        )));
    }
    for channel in &status.channel_summary {
        lines.push(Line::from(Span::styled(
            channel.clone(),
            Style::default().fg(TERM_GREEN_DIM),
        )));
    }

    let details = Paragraph::new(lines)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("GATEWAY"));
    f.render_widget(details, chunks[1]);
}

fn bar(value: i64, max: i64, width: usize) -> String {
    let filled = if max > 0 {
        ((value as f64 / max as f64) * width as f64).round() as usize
    } else {
        0
    };
    let filled = filled.min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

fn render_tokens_tab(f: &mut Frame, area: Rect, data: &DashboardData) {
    let sessions = &data.sessions.sessions;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(6)])
        .split(area);
    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    let totals = token_totals(sessions);
    let summary = vec![
        Line::from(Span::styled(
            format!("TOTAL:  {}", format_tokens(totals.total)),
            Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("INPUT:  {}", format_tokens(totals.input)),
            Style::default().fg(TERM_GREEN),
        )),
        Line::from(Span::styled(
            format!("OUTPUT: {}", format_tokens(totals.output)),
            Style::default().fg(TERM_GREEN),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("EST. COST: ${:.2}", estimated_cost(sessions)),
            Style::default().fg(TERM_AMBER),
        )),
    ];
    let summary = Paragraph::new(summary)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("TOKEN USAGE"));
    f.render_widget(summary, top_chunks[0]);

    let usage = usage_by_type(sessions);
    let max_usage = usage.iter().map(|u| u.tokens).max().unwrap_or(0);
    let type_items: Vec<ListItem> = usage
        .iter()
        .map(|u| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:10}", u.session_type.to_string().to_uppercase()),
                    Style::default().fg(TERM_GREEN),
                ),
                Span::styled(bar(u.tokens, max_usage, 20), Style::default().fg(TERM_GREEN)),
                Span::styled(
                    format!(" {} ({})", format_tokens(u.tokens), u.count),
                    Style::default().fg(TERM_GREEN).add_modifier(Modifier::BOLD),
                ),
            ]))
        })
        .collect();
    let type_list = List::new(type_items)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("BY SESSION TYPE"));
    f.render_widget(type_list, top_chunks[1]);

    let top = top_sessions(sessions, TOP_SESSIONS);
    let max_top = top.first().and_then(|s| s.total_tokens).unwrap_or(0);
    let top_items: Vec<ListItem> = top
        .iter()
        .map(|s| {
            let tokens = s.total_tokens.unwrap_or(0);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:14}", session_label(&s.key)), Style::default().fg(TERM_GREEN)),
                Span::styled(bar(tokens, max_top, 30), Style::default().fg(TERM_GREEN)),
                Span::styled(format!(" {}", format_tokens(tokens)), Style::default().fg(TERM_GREEN)),
            ]))
        })
        .collect();
    let top_list = List::new(top_items)
        .style(Style::default().bg(TERM_BLACK))
        .block(panel("TOP SESSIONS"));
    f.render_widget(top_list, chunks[1]);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let blink = if app.animation_frame % 4 < 2 { "█" } else { " " };

    let footer = match &app.snapshot.error {
        Some(error) => Paragraph::new(format!(" ERROR: {} | r:RETRY | q:QUIT ", error))
            .style(Style::default().fg(TERM_RED).bg(TERM_BLACK)),
        None => Paragraph::new(format!(
            " READY{} | ↑↓/jk:NAV | TAB/1-4:SWITCH | r:REFRESH | q:QUIT ",
            blink
        ))
        .style(Style::default().fg(TERM_GREEN).bg(TERM_BLACK)),
    };

    let footer = footer.block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(TERM_GREEN_DARK))
            .style(Style::default().bg(TERM_BLACK)),
    );
    f.render_widget(footer, area);
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_dashboard;
    use crate::poller::SliceOrigins;
    use ratatui::backend::TestBackend;

    fn ready_snapshot() -> DashboardSnapshot {
        let now = Utc::now().timestamp_millis();
        DashboardSnapshot {
            state: PollState::Ready,
            data: Some(mock_dashboard(now)),
            error: None,
            last_updated: Some(now),
            origins: Some(SliceOrigins {
                sessions: Origin::Mock,
                cron: Origin::Mock,
                status: Origin::Mock,
            }),
        }
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 32)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_keys_switch_tabs_and_quit() {
        let mut app = App::new(ready_snapshot(), true);

        app.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.tab_index, 1);
        app.handle_key(KeyCode::BackTab, KeyModifiers::NONE);
        app.handle_key(KeyCode::BackTab, KeyModifiers::NONE);
        assert_eq!(app.tab_index, 3);
        app.handle_key(KeyCode::Char('3'), KeyModifiers::NONE);
        assert_eq!(app.tab_index, 2);

        app.handle_key(KeyCode::Char('r'), KeyModifiers::NONE);
        assert!(app.refetch_requested);

        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[test]
    fn test_selection_stays_in_bounds_after_update() {
        let mut app = App::new(ready_snapshot(), false);
        for _ in 0..20 {
            app.next_session();
        }
        assert_eq!(app.selected_index, 4);

        let mut smaller = ready_snapshot();
        if let Some(data) = smaller.data.as_mut() {
            data.sessions.sessions.truncate(2);
        }
        app.apply_snapshot(smaller);
        assert_eq!(app.selected_index, 1);
    }

    #[test]
    fn test_every_tab_renders() {
        let mut app = App::new(ready_snapshot(), true);

        let sessions = render(&app);
        assert!(sessions.contains("Main Session"));
        assert!(sessions.contains("[MOCK]"));

        app.tab_index = 1;
        assert!(render(&app).contains("Weekly Fri"));

        app.tab_index = 2;
        assert!(render(&app).contains("Connected"));

        app.tab_index = 3;
        assert!(render(&app).contains("EST. COST"));
    }

    #[test]
    fn test_loading_and_error_states_render() {
        let app = App::new(DashboardSnapshot::loading(), false);
        assert!(render(&app).contains("CONNECTING"));

        let mut failed = ready_snapshot();
        failed.state = PollState::ErrorWithStaleData;
        failed.error = Some("malformed status payload".to_string());
        let app = App::new(failed, false);
        let screen = render(&app);
        assert!(screen.contains("STALE"));
        assert!(screen.contains("malformed status payload"));
    }

    #[test]
    fn test_bar_and_truncate() {
        assert_eq!(bar(5, 10, 4), "██░░");
        assert_eq!(bar(0, 0, 3), "░░░");
        assert_eq!(truncate_str("abcdef", 4), "abc…");
        assert_eq!(truncate_str("abc", 4), "abc");
    }
}
