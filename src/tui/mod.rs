mod state;

use crate::cli::Cli;
use crate::config::{self, Settings};
use crate::i18n::{Catalog, LANGUAGES};
use crate::model::{AppEvent, UiCommand};
use crate::orchestrator::{self, ControllerOptions};
use crate::runner::WslRunner;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState},
    Terminal,
};
use state::{Mode, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, settings: Settings, catalog: Catalog) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the
    // controller task.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let opts = ControllerOptions {
        runner: Arc::new(WslRunner::with_program(&args.tool)),
        start_refresh_delay: args.start_refresh_delay.into(),
        poll_interval: args.rename_poll_interval.into(),
    };

    // The TUI runs in a dedicated thread to keep all blocking terminal I/O
    // out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(settings, catalog, event_rx, cmd_tx));

    let res = orchestrator::run_controller(opts, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Runs the TUI loop on a dedicated thread.
fn run_threaded(
    settings: Settings,
    mut catalog: Catalog,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let mut settings = settings;

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev, &catalog);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state, &catalog)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(quit) = handle_key(
                    k.modifiers,
                    k.code,
                    &mut state,
                    &mut catalog,
                    &mut settings,
                    &cmd_tx,
                ) {
                    break quit;
                }
            }
        }
    };

    // Persist the language choice on the way out.
    settings.language = catalog.language().to_string();
    let _ = config::save(&settings);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Handles one key press; returns `Some(result)` when the loop should end.
fn handle_key(
    modifiers: KeyModifiers,
    code: KeyCode,
    state: &mut UiState,
    catalog: &mut Catalog,
    settings: &mut Settings,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> Option<Result<()>> {
    match state.mode.clone() {
        Mode::Normal => match (modifiers, code) {
            (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                return Some(Ok(()));
            }
            (_, KeyCode::Char('r')) => {
                let _ = cmd_tx.send(UiCommand::Refresh);
            }
            (_, KeyCode::Up) | (_, KeyCode::Char('k')) => state.select_prev(),
            (_, KeyCode::Down) | (_, KeyCode::Char('j')) => state.select_next(),
            (_, KeyCode::Enter) => {
                if let Some(inst) = state.selected_instance() {
                    if state.gates().open_shell {
                        let _ = cmd_tx.send(UiCommand::OpenShell(inst.name.clone()));
                    }
                }
            }
            (_, KeyCode::Char('s')) => {
                if let Some(inst) = state.selected_instance() {
                    if state.gates().start {
                        let _ = cmd_tx.send(UiCommand::Start(inst.name.clone()));
                    }
                }
            }
            (_, KeyCode::Char('t')) => {
                if let Some(inst) = state.selected_instance() {
                    if state.gates().terminate {
                        state.mode = Mode::ConfirmTerminate {
                            name: inst.name.clone(),
                        };
                    }
                }
            }
            (_, KeyCode::Char('S')) => {
                state.mode = Mode::ConfirmShutdown;
            }
            (_, KeyCode::Char('n')) => {
                if let Some(inst) = state.selected_instance() {
                    if state.gates().rename {
                        state.mode = Mode::RenameInput {
                            old_name: inst.name.clone(),
                            buffer: inst.name.clone(),
                        };
                    }
                }
            }
            (_, KeyCode::Char('l')) => {
                let next = next_language(catalog.language());
                *catalog = Catalog::new(next);
                settings.language = next.to_string();
            }
            _ => {}
        },
        Mode::ConfirmTerminate { name } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let _ = cmd_tx.send(UiCommand::Terminate(name));
                state.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => state.mode = Mode::Normal,
            _ => {}
        },
        Mode::ConfirmShutdown => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let _ = cmd_tx.send(UiCommand::ShutdownAll);
                state.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => state.mode = Mode::Normal,
            _ => {}
        },
        Mode::RenameInput { old_name, mut buffer } => match code {
            KeyCode::Esc => state.mode = Mode::Normal,
            KeyCode::Enter => {
                state.mode = Mode::ConfirmRename {
                    old_name,
                    new_name: buffer,
                };
            }
            KeyCode::Backspace => {
                buffer.pop();
                state.mode = Mode::RenameInput { old_name, buffer };
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                state.mode = Mode::RenameInput { old_name, buffer };
            }
            _ => {}
        },
        Mode::ConfirmRename { old_name, new_name } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                // Validation happens in the controller against the current
                // snapshot; a rejection arrives as an Info event.
                let _ = cmd_tx.send(UiCommand::Rename { old_name, new_name });
                state.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => state.mode = Mode::Normal,
            _ => {}
        },
        // No cancellation mid-flight; the tool operations are not safely
        // interruptible. Quit is still honored and the worker runs to
        // completion detached.
        Mode::Renaming => match (modifiers, code) {
            (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                return Some(Ok(()));
            }
            _ => {}
        },
    }
    None
}

fn next_language(current: &str) -> &'static str {
    let idx = LANGUAGES.iter().position(|l| *l == current).unwrap_or(0);
    LANGUAGES[(idx + 1) % LANGUAGES.len()]
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, catalog: &Catalog) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(4),    // instance table
            Constraint::Length(4), // shortcut command
            Constraint::Length(1), // info line
            Constraint::Length(1), // key help
        ])
        .split(area);

    let title = Line::from(vec![
        Span::styled(
            catalog.get("app_title"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  [{}]", catalog.language())),
    ]);
    f.render_widget(Paragraph::new(title), chunks[0]);

    draw_table(chunks[1], f, state, catalog);
    draw_shortcut(chunks[2], f, state, catalog);

    let info = Paragraph::new(state.info.as_str()).style(Style::default().fg(Color::Yellow));
    f.render_widget(info, chunks[3]);

    let help = match &state.mode {
        Mode::Normal => catalog.get("help_keys"),
        Mode::Renaming => catalog.get("rename_progress_message"),
        Mode::RenameInput { .. } => catalog.get("rename_input_keys"),
        _ => catalog.get("confirm_keys"),
    };
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::Gray)),
        chunks[4],
    );

    draw_modal(area, f, state, catalog);
}

fn draw_table(area: Rect, f: &mut ratatui::Frame, state: &UiState, catalog: &Catalog) {
    let header = Row::new(vec![
        String::new(),
        catalog.get("column_name"),
        catalog.get("column_state"),
        catalog.get("column_version"),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = state.instances.iter().map(|inst| {
        Row::new(vec![
            if inst.is_default { "*".to_string() } else { String::new() },
            inst.name.clone(),
            inst.state.to_string(),
            inst.version.clone(),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Min(20),
            Constraint::Length(14),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL))
    .row_highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("> ");

    let mut table_state = TableState::default();
    if !state.instances.is_empty() {
        table_state.select(Some(state.selected));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_shortcut(area: Rect, f: &mut ratatui::Frame, state: &UiState, catalog: &Catalog) {
    let text = vec![
        Line::from(state.shortcut_command()),
        Line::from(Span::styled(
            catalog.get("shortcut_howto"),
            Style::default().fg(Color::Gray),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .title(catalog.get("shortcut_title"));
    f.render_widget(Paragraph::new(text).block(block), area);
}

/// Confirmation and input dialogs, centered over the table.
fn draw_modal(area: Rect, f: &mut ratatui::Frame, state: &UiState, catalog: &Catalog) {
    let text = match &state.mode {
        Mode::Normal => return,
        Mode::ConfirmTerminate { name } => {
            catalog.format("confirm_stop_message", &[("distro_name", name)])
        }
        Mode::ConfirmShutdown => catalog.get("confirm_shutdown_message"),
        Mode::RenameInput { old_name, buffer } => format!(
            "{}\n{}_",
            catalog.format("rename_dialog_prompt", &[("old_name", old_name)]),
            buffer
        ),
        Mode::ConfirmRename { old_name, new_name } => catalog.format(
            "rename_confirm_message",
            &[("old_name", old_name), ("new_name", new_name)],
        ),
        Mode::Renaming => catalog.get("rename_progress_message"),
    };

    let popup = centered_rect(60, 20, area);
    let keys = match &state.mode {
        Mode::RenameInput { .. } => catalog.get("rename_input_keys"),
        Mode::Renaming => String::new(),
        _ => catalog.get("confirm_keys"),
    };
    let body = format!("{text}\n\n{keys}");
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(body)
            .wrap(ratatui::widgets::Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_context() -> (UiState, Catalog, Settings) {
        (UiState::default(), Catalog::new("en"), Settings::default())
    }

    #[test]
    fn quit_is_honored_while_a_rename_is_in_flight() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (mut state, mut catalog, mut settings) = key_context();
        state.mode = Mode::Renaming;

        let quit = handle_key(
            KeyModifiers::NONE,
            KeyCode::Char('q'),
            &mut state,
            &mut catalog,
            &mut settings,
            &cmd_tx,
        );

        assert!(quit.is_some());
        assert!(matches!(cmd_rx.try_recv(), Ok(UiCommand::Quit)));
    }

    #[test]
    fn other_input_stays_ignored_while_a_rename_is_in_flight() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let (mut state, mut catalog, mut settings) = key_context();
        state.mode = Mode::Renaming;

        for code in [KeyCode::Char('s'), KeyCode::Char('n'), KeyCode::Esc] {
            let quit = handle_key(
                KeyModifiers::NONE,
                code,
                &mut state,
                &mut catalog,
                &mut settings,
                &cmd_tx,
            );
            assert!(quit.is_none());
        }
        assert!(cmd_rx.try_recv().is_err());
        assert_eq!(state.mode, Mode::Renaming);
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
