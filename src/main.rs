mod app;
mod event;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wordpace::config::{Config, ConfigOverrides};
use wordpace::model::exercise::{Exercises, OrderType, Scope, TargetKind};
use wordpace::model::lesson::Lesson;
use wordpace::model::settings::Settings;
use wordpace::session::{PracticeSession, Tuning};

use app::{App, Backends, SETTLE_TIMEOUT};
use event::{AppEvent, EventHandler};
use ui::components::lesson_menu::LessonMenu;
use ui::components::typing_area::TypingArea;
use ui::components::word_table::{CurrentWord, WordTable};
use ui::layout::{AppLayout, pack_hint_lines};

#[derive(Parser)]
#[command(name = "wordpace", version, about = "Terminal word-speed trainer with adaptive scheduling")]
struct Cli {
    #[arg(short, long, help = "User id owning the stored data")]
    user: Option<String>,

    #[arg(short, long, help = "Directory for the local cache and document store")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Log level (error, warn, info, debug, trace)")]
    log_level: Option<String>,

    #[arg(short, long, help = "Config file to read instead of the default")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List practiced words with their best and latest speeds.
    Words,
    /// Save a custom lesson for the current user.
    AddLesson {
        #[arg(short, long)]
        title: String,
        #[arg(long, help = "Time whole words as single chords")]
        chorded: bool,
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Show or change how exercises are scheduled and scored.
    Configure(ConfigureArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    Slowest,
    Random,
}

#[derive(Args)]
struct ConfigureArgs {
    #[arg(long, help = "Distinct words per exercise")]
    combinations: Option<usize>,
    #[arg(long, help = "Times each exercise repeats its words")]
    repetitions: Option<usize>,
    #[arg(long, value_enum, help = "Weakest words first, or shuffled")]
    order: Option<Order>,
    #[arg(long, help = "Exercises per round when the cap is on")]
    max_exercises: Option<usize>,
    #[arg(long, value_name = "BOOL", help = "Cap the number of exercises per round")]
    limit_exercises: Option<bool>,
    #[arg(long, help = "Words to schedule: all, a count like 10, or a share like 25%")]
    scope: Option<Scope>,
    #[arg(long, conflicts_with = "target_relative", help = "Target as a percentage of the best speed")]
    target_percent: Option<f64>,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Target as WPM added to the best speed"
    )]
    target_relative: Option<f64>,
    #[arg(long, help = "Practice time limit in minutes")]
    max_time: Option<u32>,
    #[arg(long, value_name = "BOOL", help = "Announce when the time limit is reached")]
    time_limit: Option<bool>,
    #[arg(long, value_name = "M:SS", help = "Skip an unfinished exercise after this long")]
    auto_skip: Option<String>,
    #[arg(long, help = "WPM a word loses per day without practice when ordering")]
    decay: Option<f64>,
    #[arg(long, help = "Date format using DD, MM and YYYY")]
    date_format: Option<String>,
}

impl ConfigureArgs {
    fn into_tuning(self) -> Tuning {
        let target = match (self.target_percent, self.target_relative) {
            (Some(p), _) => Some(Tuning::percentage_target(p)),
            (None, Some(r)) => Some(Tuning::relative_target(r)),
            (None, None) => None,
        };
        Tuning {
            combinations: self.combinations,
            repetitions: self.repetitions,
            order: self.order.map(|o| match o {
                Order::Slowest => OrderType::Slowest,
                Order::Random => OrderType::Random,
            }),
            max_exercises: self.max_exercises,
            max_exercises_enabled: self.limit_exercises,
            scope: self.scope,
            target,
            max_time_minutes: self.max_time,
            max_time_enabled: self.time_limit,
            auto_skip_time: self.auto_skip,
            wpm_decay_per_day: self.decay,
            date_format: self.date_format,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply(ConfigOverrides {
        user_id: cli.user,
        data_dir: cli.data_dir,
        log_level: cli.log_level,
    });
    config.validate();

    let _guard = init_logging(&config)?;
    info!(user = ?config.user(), data_dir = %config.data_dir, "starting");

    match cli.command {
        Some(Command::Words) => list_words(&config),
        Some(Command::AddLesson {
            title,
            chorded,
            words,
        }) => add_lesson(&config, &title, chorded, words),
        Some(Command::Configure(args)) => configure(&config, args.into_tuning()),
        None => run_tui(&config),
    }
}

/// Log to a file under the data dir; the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(&log_dir, "wordpace.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();
    Ok(guard)
}

fn list_words(config: &Config) -> Result<()> {
    let backends = Backends::new(config)?;
    let settings = backends.settings_store();
    let locale = &settings.state().locale;
    let stats = backends.word_stats().all()?;
    if stats.is_empty() {
        println!("No words practiced yet.");
        return Ok(());
    }

    println!(
        "{:<20} {:>8} {:>8} {:>8}  {}",
        "word", "best", "last", "chord", "practiced"
    );
    for stat in stats {
        println!(
            "{:<20} {:>8.1} {:>8.1} {:>8.1}  {}",
            stat.word,
            stat.highest.wpm,
            stat.last_practice.wpm,
            stat.chord_highest.as_ref().map_or(0.0, |c| c.wpm),
            locale.format_date(stat.last_practice.date.date_naive()),
        );
    }
    Ok(())
}

fn add_lesson(config: &Config, title: &str, chorded: bool, words: Vec<String>) -> Result<()> {
    if config.user().is_none() {
        bail!("custom lessons need a user id, pass --user or set user_id in the config");
    }
    let backends = Backends::new(config)?;
    let mut lesson = Lesson::new_custom(title, words);
    lesson.settings.chorded = chorded;
    let saved = backends.lesson_store().upsert(&lesson)?;
    println!(
        "Saved lesson {:?} with {} words as {}",
        saved.title,
        saved.words.len(),
        saved.id.as_deref().unwrap_or("?")
    );
    Ok(())
}

fn configure(config: &Config, tuning: Tuning) -> Result<()> {
    let backends = Backends::new(config)?;
    let mut settings = backends.settings_store();
    let mut exercises = backends.exercise_store();

    if tuning != Tuning::default() {
        let stats = backends.word_stats();
        let mut session = PracticeSession::new(backends.clock());
        let regenerated = session.configure(
            &tuning,
            &mut exercises,
            &mut settings,
            &stats,
            &mut SmallRng::from_entropy(),
        )?;
        settings.settle(SETTLE_TIMEOUT);
        exercises.settle(SETTLE_TIMEOUT);
        if regenerated {
            println!(
                "Scheduled {} new exercises",
                exercises.state().all_exercises.len()
            );
        }
    }

    print_tuning(settings.state(), exercises.state());
    Ok(())
}

fn print_tuning(settings: &Settings, exercises: &Exercises) {
    let generation = &exercises.generation;
    let scope = match exercises.scope {
        Scope::All => "all".to_string(),
        Scope::Worst(n) => format!("{n} weakest"),
        Scope::WorstPercent(p) => format!("{p}% weakest"),
    };
    let target = &exercises.target;
    let target = match target.selected {
        TargetKind::Percentage => format!("{}% of best", target.percentage.unwrap_or(100.0)),
        TargetKind::Relative => format!("best {:+} WPM", target.relative.unwrap_or(0.0)),
    };
    let switch = |on: bool| if on { "on" } else { "off" };

    println!("lesson          {}", exercises.lesson.title);
    println!("combinations    {}", generation.combinations);
    println!("repetitions     {}", generation.repetitions);
    println!("order           {:?}", generation.order);
    println!(
        "max exercises   {} ({})",
        generation.max_exercises,
        switch(generation.max_exercises_enabled)
    );
    println!("scope           {scope}");
    println!("target          {target}");
    println!(
        "time limit      {} min ({})",
        exercises.max_time.minutes,
        switch(exercises.max_time.enabled)
    );
    println!("auto skip       {}", settings.exercise.auto_skip_time);
    println!("decay per day   {} WPM", settings.exercise.wpm_decay_per_day);
    println!("date format     {}", settings.locale.date_format);
}

fn run_tui(config: &Config) -> Result<()> {
    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut app = App::new(config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = EventHandler::new(tick_rate);

    let result = run_app(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    app.shutdown();

    if let Err(err) = &result {
        error!(error = ?err, "terminal loop failed");
        eprintln!("Error: {err:?}");
    }
    info!("exiting");
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Paste(text) => {
                if !app.menu_open() {
                    app.paste(&text);
                }
            }
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Repeat and Release would inflate or duplicate input
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::F(2) => {
            app.toggle_lesson_menu();
            return;
        }
        KeyCode::F(5) => {
            app.regenerate();
            app.status = Some("New exercises scheduled".to_string());
            return;
        }
        _ => {}
    }

    if app.menu_open() {
        handle_menu_key(app, key);
    } else {
        handle_practice_key(app, key);
    }
}

fn handle_menu_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.menu_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.menu_next(),
        KeyCode::Enter => app.select_lesson(),
        KeyCode::Esc => app.toggle_lesson_menu(),
        _ => {}
    }
}

fn handle_practice_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => app.reset_input(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.type_char(ch),
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    frame.render_widget(Block::default().style(Style::default().bg(colors.bg())), area);

    let layout = AppLayout::new(area, app.menu_open());
    let exercises = app.exercises.state();

    let batch = if exercises.all_exercises.is_empty() {
        "no words".to_string()
    } else {
        format!(
            "{}/{}",
            exercises.current_exercise_index + 1,
            exercises.all_exercises.len()
        )
    };
    let info = format!(
        " {} | batch {} | {:.1} WPM | {} | total {}",
        exercises.lesson.title,
        batch,
        app.session.wpm(),
        app.session.timer().elapsed_time(),
        app.session.timer().total_elapsed_time(),
    );
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " wordpace ",
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            info,
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg()),
        ),
    ]))
    .style(Style::default().bg(colors.header_bg()));
    frame.render_widget(header, layout.header);

    if let Some(sidebar) = layout.sidebar {
        let titles = app
            .lessons
            .iter()
            .map(|l| (l.title.as_str(), l.custom))
            .collect();
        frame.render_widget(
            LessonMenu::new(titles, &app.lesson_menu, app.active_lesson(), &app.theme),
            sidebar,
        );
    }

    let [typing, table] = Layout::vertical([Constraint::Length(8), Constraint::Min(0)])
        .areas(layout.main);

    frame.render_widget(
        TypingArea::new(
            app.session.text(),
            app.session.input(),
            app.session.is_wrong(),
            &app.theme,
        ),
        typing,
    );

    let targets = app.session.targets(&exercises.target);
    let current = app
        .session
        .words()
        .iter()
        .zip(targets)
        .map(|(word, target_wpm)| CurrentWord {
            word,
            wpm: app.session.word_wpm(word),
            target_wpm,
        })
        .collect();
    frame.render_widget(
        WordTable::new(&exercises.previous_exercise, current, &app.theme),
        table,
    );

    let hints = [
        "[F2] Lessons",
        "[F5] New words",
        "[Tab/Esc] Reset",
        "[Ctrl-C] Quit",
    ];
    let mut footer: Vec<Line> = Vec::new();
    if let Some(status) = &app.status {
        footer.push(Line::from(Span::styled(
            format!(" {status}"),
            Style::default().fg(colors.accent()),
        )));
    }
    footer.extend(
        pack_hint_lines(&hints, layout.footer.width as usize)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(colors.text_pending())))),
    );
    frame.render_widget(Paragraph::new(footer), layout.footer);
}
