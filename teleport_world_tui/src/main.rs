use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    sync::Mutex,
};
use teleport_world_core::{
    environment::{
        Action, ActionResult, Environment, Termination, load_environment_from_string,
        teleport_5x5,
    },
    render::Bitmap,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Manual control of the teleporter grid world", long_about = None)]
struct Args {
    /// Seed used for every reset
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Map file to load instead of the built-in 5x5 teleporter room
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Pixels per grid cell; each terminal row shows two pixel rows
    #[arg(short, long, default_value_t = 8)]
    tile_size: usize,

    /// Write logs to this file (the terminal is owned by the UI)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

struct App {
    environment: Environment,
    seed: u64,
    tile_size: usize,
    /// Result of the most recent action, shown in the status bar.
    last_result: Option<ActionResult>,
    should_quit: bool,
}

impl App {
    fn new(mut environment: Environment, seed: u64, tile_size: usize) -> Self {
        environment.reset(seed);
        App {
            environment,
            seed,
            tile_size,
            last_result: None,
            should_quit: false,
        }
    }

    fn game_over(&self) -> bool {
        matches!(self.last_result, Some(ActionResult::Terminated(_)))
    }

    fn act(&mut self, action: Action) {
        if self.game_over() {
            return;
        }
        self.last_result = Some(self.environment.step(action));
    }

    fn reset(&mut self) {
        info!(seed = self.seed, "reset");
        self.environment.reset(self.seed);
        self.last_result = None;
    }

    /// Flips the teleporter in front of the agent, if there is one.
    fn flip_teleporter(&mut self) {
        let Some(front) = self.environment.front_pos() else {
            return;
        };
        let Some(active) = self
            .environment
            .grid()
            .object_at(front)
            .and_then(|obj| obj.as_teleporter())
            .map(|t| t.is_active())
        else {
            return;
        };
        self.environment.set_teleporter_active(front, !active);
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Left => self.act(Action::Left),
            KeyCode::Right => self.act(Action::Right),
            KeyCode::Up => self.act(Action::Forward),
            KeyCode::Char(' ') => self.act(Action::Toggle),
            KeyCode::Char('p') | KeyCode::PageUp => self.act(Action::Pickup),
            KeyCode::Char('d') | KeyCode::PageDown => self.act(Action::Drop),
            KeyCode::Enter => self.act(Action::Done),
            KeyCode::Char('t') => self.flip_teleporter(),
            KeyCode::Char('r') | KeyCode::Backspace => self.reset(),
            _ => {}
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_environment(map: Option<&PathBuf>) -> Result<Environment> {
    match map {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read map file {}", path.display()))?;
            load_environment_from_string(&text)
                .with_context(|| format!("Failed to load map {}", path.display()))
        }
        None => Ok(teleport_5x5()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let environment = load_environment(args.map.as_ref())?;
    let mut app = App::new(environment, args.seed, args.tile_size.max(2));
    info!(seed = args.seed, "starting manual control");

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws, then blocks on the next key. Nothing moves without input.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|f| ui(f, app))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key.code);
            }
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let image = app.environment.render(app.tile_size);
    let world = Paragraph::new(half_block_lines(&image))
        .block(Block::default().title("Teleport World").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(world, main_layout[0]);

    frame.render_widget(status(app), main_layout[1]);

    let help_text = Paragraph::new(
        "←/→ turn  ↑ forward  space toggle  p pickup  d drop  t flip teleporter  r reset  q quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn status(app: &App) -> Paragraph<'static> {
    let env = &app.environment;
    let carrying = env
        .carrying()
        .map_or("nothing".to_string(), |obj| format!("{} {}", obj.color(), obj.object_type()));
    let outcome = match &app.last_result {
        None | Some(ActionResult::Success) => Span::raw(""),
        Some(ActionResult::Failure(reason)) => {
            Span::styled(reason.clone(), Style::default().fg(Color::Yellow))
        }
        Some(ActionResult::Terminated(Termination::ReachedGoal)) => Span::styled(
            "Goal reached! Press 'r' to reset.",
            Style::default().fg(Color::Green).bold(),
        ),
        Some(ActionResult::Terminated(Termination::EnteredLava)) => Span::styled(
            "Fell into lava. Press 'r' to reset.",
            Style::default().fg(Color::Red).bold(),
        ),
    };
    let pos = env.agent_pos();
    let line = Line::from(vec![
        Span::raw(format!(
            "Seed: {}  Step: {}  Pos: ({}, {})  Facing: {:?}  Carrying: {}  ",
            app.seed,
            env.step_count(),
            pos.x,
            pos.y,
            env.agent_dir(),
            carrying
        )),
        outcome,
    ]);
    Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Status"))
}

/// Packs two pixel rows into each terminal row using the upper half block glyph.
fn half_block_lines(image: &Bitmap) -> Vec<Line<'static>> {
    let rgb = |p: [u8; 3]| Color::Rgb(p[0], p[1], p[2]);
    (0..image.height())
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span> = (0..image.width())
                .map(|x| {
                    let top = image.pixel(x, y).unwrap_or_default();
                    let bottom = image.pixel(x, y + 1).unwrap_or_default();
                    Span::styled("▀", Style::default().fg(rgb(top)).bg(rgb(bottom)))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}
