use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::model;
use crate::storage::KvStore;
use crate::ui;

pub mod actions;
mod clock;
pub mod state;

pub use actions::{map_key, Action};
pub use clock::ClockTicker;
pub use state::{AppState, BlockField, BlockForm, OverlayState, Screen, TextInput};

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    should_quit: bool,
    tick_rate: Duration,
    clock: Option<ClockTicker>,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn KvStore>, screen: Screen) -> Self {
        let state = AppState::load(store, &config, model::today());
        let tick_rate = config.tick_rate();
        let mut app = Self {
            config,
            state,
            should_quit: false,
            tick_rate,
            clock: None,
        };
        app.enter_screen(screen);
        app
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn clock_running(&self) -> bool {
        self.clock.is_some()
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        self.clock = None;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let today = model::today();
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state, today))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw picks up the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if let Some(clock) = &self.clock {
            if clock.poll() {
                self.state.set_clock(model::now_local());
            }
        }
    }

    /// Mounts `screen`; the clock timer only lives while the task screen does.
    fn enter_screen(&mut self, screen: Screen) {
        self.state.switch_screen(screen);
        match screen {
            Screen::Tasks => {
                if self.clock.is_none() {
                    self.clock = Some(ClockTicker::start(self.config.clock_tick()));
                }
                self.state.set_clock(model::now_local());
            }
            Screen::Calendar => {
                self.clock = None;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.handle_overlay_key(key) {
            return;
        }
        if let Some(action) = map_key(self.state.screen, key) {
            self.handle_action(action);
        }
    }

    pub fn handle_action(&mut self, action: Action) {
        tracing::trace!(?action, "handling action");
        match action {
            Action::Quit => {
                self.should_quit = true;
                self.clock = None;
            }
            Action::SwitchScreen => self.enter_screen(self.state.screen.other()),
            Action::GoTo(screen) => self.enter_screen(screen),
            Action::NewTodo => {
                self.state.open_new_todo();
                self.state
                    .set_status_message(Some("Type a task and press Enter"));
            }
            Action::ToggleTodo => self.state.toggle_selected_todo(),
            Action::DeleteTodo => self.state.delete_selected_todo(),
            Action::CycleFilter => {
                self.state.cycle_filter();
                let filter = self.state.filter;
                self.state
                    .set_status_message(Some(format!("Showing {filter} tasks")));
            }
            Action::SelectNext => self.state.move_todo_selection(1),
            Action::SelectPrevious => self.state.move_todo_selection(-1),
            Action::Navigate(direction) => self.state.navigate(direction),
            Action::SetView(mode) => self.state.set_view_mode(mode),
            Action::Today => self.state.jump_to(model::today()),
            Action::DayLeft => self.state.move_cursor_days(-1),
            Action::DayRight => self.state.move_cursor_days(1),
            Action::HourUp => self.state.move_hour(-1),
            Action::HourDown => self.state.move_hour(1),
            Action::NewBlock => {
                self.state.open_new_block();
                self.state.set_status_message(Some(
                    "Tab to switch fields, Enter to create, Esc to cancel",
                ));
            }
            Action::DeleteBlock => self.state.delete_selected_block(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let typing = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        match self.state.overlay_mut() {
            Some(OverlayState::NewTodo(input)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled new task"));
                    }
                    KeyCode::Enter => self.state.submit_new_todo(model::now_millis()),
                    KeyCode::Backspace => input.pop(),
                    KeyCode::Char(ch) if typing => input.push(ch),
                    _ => {}
                }
                true
            }
            Some(OverlayState::NewBlock(form)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled new time block"));
                    }
                    KeyCode::Enter => self.state.submit_new_block(model::now_millis()),
                    KeyCode::Tab | KeyCode::Down => form.focus_next(),
                    KeyCode::BackTab | KeyCode::Up => form.focus_previous(),
                    KeyCode::Backspace => form.focused_mut().pop(),
                    KeyCode::Char(ch) if typing => {
                        form.error = None;
                        form.focused_mut().push(ch);
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
