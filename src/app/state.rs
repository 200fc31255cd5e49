use std::sync::Arc;

use strum::{Display, EnumIter, EnumString};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;

use crate::calendar::{CalendarBoard, CalendarViewModel, Direction, ViewMode, HOURS_PER_DAY};
use crate::config::AppConfig;
use crate::model::{self, TimeBlock, TimeBlockDraft, Todo};
use crate::storage::{self, KvStore, TIME_BLOCKS_KEY, TODOS_KEY};
use crate::todo::{Filter, TodoList};

const MAX_INPUT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Screen {
    Tasks,
    Calendar,
}

impl Screen {
    pub fn route(self) -> &'static str {
        match self {
            Screen::Tasks => "/",
            Screen::Calendar => "/calendar",
        }
    }

    pub fn from_route(route: &str) -> Option<Self> {
        match route {
            "/" => Some(Screen::Tasks),
            "/calendar" => Some(Screen::Calendar),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Screen::Tasks => "Tasks",
            Screen::Calendar => "Calendar",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Screen::Tasks => Screen::Calendar,
            Screen::Calendar => Screen::Tasks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn push(&mut self, ch: char) {
        if self.value.chars().count() < MAX_INPUT_LEN {
            self.value.push(ch);
        }
    }

    /// Removes the last grapheme cluster.
    pub fn pop(&mut self) {
        if let Some((idx, _)) = self.value.grapheme_indices(true).next_back() {
            self.value.truncate(idx);
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockField {
    Task,
    Date,
    Start,
    End,
}

impl BlockField {
    pub const ALL: [BlockField; 4] = [
        BlockField::Task,
        BlockField::Date,
        BlockField::Start,
        BlockField::End,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BlockField::Task => "Task",
            BlockField::Date => "Date",
            BlockField::Start => "Start Time",
            BlockField::End => "End Time",
        }
    }

    fn next(self) -> Self {
        match self {
            BlockField::Task => BlockField::Date,
            BlockField::Date => BlockField::Start,
            BlockField::Start => BlockField::End,
            BlockField::End => BlockField::Task,
        }
    }

    fn previous(self) -> Self {
        match self {
            BlockField::Task => BlockField::End,
            BlockField::Date => BlockField::Task,
            BlockField::Start => BlockField::Date,
            BlockField::End => BlockField::Start,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockForm {
    pub task: TextInput,
    pub date: TextInput,
    pub start: TextInput,
    pub end: TextInput,
    pub focus: BlockField,
    pub error: Option<String>,
}

impl BlockForm {
    fn new(date: Date, start: &str, end: &str) -> Self {
        Self {
            task: TextInput::default(),
            date: TextInput::with_value(model::format_date(date)),
            start: TextInput::with_value(start),
            end: TextInput::with_value(end),
            focus: BlockField::Task,
            error: None,
        }
    }

    pub fn field(&self, field: BlockField) -> &TextInput {
        match field {
            BlockField::Task => &self.task,
            BlockField::Date => &self.date,
            BlockField::Start => &self.start,
            BlockField::End => &self.end,
        }
    }

    pub fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            BlockField::Task => &mut self.task,
            BlockField::Date => &mut self.date,
            BlockField::Start => &mut self.start,
            BlockField::End => &mut self.end,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    fn to_draft(&self) -> Result<TimeBlockDraft, model::ValidationError> {
        let date = model::parse_date(self.date.value())?;
        Ok(TimeBlockDraft {
            date,
            start_time: self.start.value().to_string(),
            end_time: self.end.value().to_string(),
            task: self.task.value().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    NewTodo(TextInput),
    NewBlock(BlockForm),
}

/// Everything the screens render, plus the store the collections mirror into.
pub struct AppState {
    store: Arc<dyn KvStore>,
    pub screen: Screen,
    todos: TodoList,
    pub filter: Filter,
    todo_selected: usize,
    calendar: CalendarBoard,
    selected_hour: usize,
    overlay: Option<OverlayState>,
    status_message: Option<String>,
    clock_label: String,
    clock_24h: bool,
    default_start: String,
    default_end: String,
}

impl AppState {
    /// Mounts both screens: each collection is read from the store once.
    pub fn load(store: Arc<dyn KvStore>, config: &AppConfig, today: Date) -> Self {
        let todos: Vec<Todo> = storage::load_collection(store.as_ref(), TODOS_KEY);
        let blocks: Vec<TimeBlock> = storage::load_collection(store.as_ref(), TIME_BLOCKS_KEY);
        tracing::info!(
            todos = todos.len(),
            blocks = blocks.len(),
            "loaded persisted state"
        );
        let selected_hour = config
            .calendar
            .default_start
            .get(..2)
            .and_then(|hour| hour.parse::<usize>().ok())
            .unwrap_or(9)
            .min(HOURS_PER_DAY - 1);
        Self {
            store,
            screen: Screen::Tasks,
            todos: TodoList::new(todos),
            filter: Filter::All,
            todo_selected: 0,
            calendar: CalendarBoard::new(blocks, today, config.calendar.default_view),
            selected_hour,
            overlay: None,
            status_message: None,
            clock_label: String::new(),
            clock_24h: config.clock_24h,
            default_start: config.calendar.default_start.clone(),
            default_end: config.calendar.default_end.clone(),
        }
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn calendar(&self) -> &CalendarBoard {
        &self.calendar
    }

    pub fn visible_todos(&self) -> Vec<&Todo> {
        self.todos.filtered(self.filter)
    }

    pub fn todo_selected(&self) -> usize {
        self.todo_selected
    }

    pub fn selected_todo(&self) -> Option<&Todo> {
        self.visible_todos().get(self.todo_selected).copied()
    }

    pub fn selected_hour(&self) -> usize {
        self.selected_hour
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clock_label(&self) -> &str {
        &self.clock_label
    }

    pub fn set_clock(&mut self, now: OffsetDateTime) {
        self.clock_label = format_clock(now, self.clock_24h);
    }

    pub fn switch_screen(&mut self, screen: Screen) {
        if self.screen != screen {
            tracing::debug!(route = screen.route(), "switching screen");
            self.screen = screen;
            self.overlay = None;
        }
    }

    // Tasks screen

    pub fn open_new_todo(&mut self) {
        self.overlay = Some(OverlayState::NewTodo(TextInput::default()));
    }

    pub fn submit_new_todo(&mut self, now_ms: i64) {
        let Some(OverlayState::NewTodo(input)) = self.overlay.as_ref() else {
            return;
        };
        let text = input.value().to_string();
        match self.todos.add(&text, now_ms) {
            Ok(todo) => {
                tracing::debug!(id = %todo.id, "added todo");
                self.overlay = None;
                self.todo_selected = 0;
                self.set_status_message(Some("Task added"));
                self.persist_todos();
            }
            Err(err) => {
                // Blank input is ignored, matching an empty submit.
                tracing::trace!(%err, "ignored empty todo");
            }
        }
    }

    pub fn toggle_selected_todo(&mut self) {
        let Some(id) = self.selected_todo().map(|todo| todo.id.clone()) else {
            return;
        };
        if let Some(completed) = self.todos.toggle(&id) {
            self.clamp_todo_selection();
            let label = if completed { "Completed" } else { "Reopened" };
            self.set_status_message(Some(format!("{label} task")));
            self.persist_todos();
        }
    }

    pub fn delete_selected_todo(&mut self) {
        let Some(id) = self.selected_todo().map(|todo| todo.id.clone()) else {
            return;
        };
        if let Some(removed) = self.todos.delete(&id) {
            self.clamp_todo_selection();
            self.set_status_message(Some(format!("Deleted '{}'", removed.text)));
            self.persist_todos();
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.todo_selected = 0;
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.filter.next());
    }

    pub fn move_todo_selection(&mut self, delta: isize) {
        let len = self.visible_todos().len();
        if len == 0 {
            self.todo_selected = 0;
            return;
        }
        let current = self.todo_selected as isize;
        self.todo_selected = (current + delta).clamp(0, len as isize - 1) as usize;
    }

    fn clamp_todo_selection(&mut self) {
        let len = self.visible_todos().len();
        if self.todo_selected >= len {
            self.todo_selected = len.saturating_sub(1);
        }
    }

    fn persist_todos(&mut self) {
        if !storage::save_collection(self.store.as_ref(), TODOS_KEY, self.todos.items()) {
            self.set_status_message(Some("Could not save tasks; changes kept in memory"));
        }
    }

    // Calendar screen

    pub fn calendar_view(&self, today: Date) -> CalendarViewModel<'_> {
        self.calendar.view_model(today)
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.calendar.set_mode(mode);
    }

    pub fn navigate(&mut self, direction: Direction) {
        self.calendar.navigate(direction);
    }

    pub fn jump_to(&mut self, date: Date) {
        self.calendar.set_cursor(date);
    }

    /// Moves the cursor a single day regardless of the view mode.
    pub fn move_cursor_days(&mut self, delta: i64) {
        let cursor = self.calendar.cursor();
        if let Some(next) = cursor.checked_add(time::Duration::days(delta)) {
            self.calendar.set_cursor(next);
        }
    }

    pub fn move_hour(&mut self, delta: isize) {
        let hour = self.selected_hour as isize + delta;
        self.selected_hour = hour.clamp(0, HOURS_PER_DAY as isize - 1) as usize;
    }

    pub fn open_new_block(&mut self) {
        let form = BlockForm::new(
            self.calendar.cursor(),
            &self.default_start,
            &self.default_end,
        );
        self.overlay = Some(OverlayState::NewBlock(form));
    }

    pub fn submit_new_block(&mut self, now_ms: i64) {
        let Some(OverlayState::NewBlock(form)) = self.overlay.as_mut() else {
            return;
        };
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(err) => {
                form.error = Some(err.to_string());
                return;
            }
        };
        match self.calendar.add_block(&draft, now_ms) {
            Ok(block) => {
                tracing::debug!(id = %block.id, date = %block.date, "added time block");
                let message = format!("Scheduled '{}' {}", block.task, block.time_range_label());
                self.overlay = None;
                self.calendar.set_cursor(draft.date);
                self.set_status_message(Some(message));
                self.persist_blocks();
            }
            Err(err) => {
                if let Some(OverlayState::NewBlock(form)) = self.overlay.as_mut() {
                    form.error = Some(err.to_string());
                }
            }
        }
    }

    /// Blocks starting in the selected hour of the cursor day.
    pub fn selected_cell_blocks(&self) -> Vec<&TimeBlock> {
        let day = self.calendar.cursor();
        let slot = format!("{:02}:00", self.selected_hour);
        self.calendar
            .blocks()
            .iter()
            .filter(|block| crate::calendar::occupies_slot(block, day, &slot))
            .collect()
    }

    /// Deletes the first block in the selected cell.
    pub fn delete_selected_block(&mut self) {
        let Some(id) = self
            .selected_cell_blocks()
            .first()
            .map(|block| block.id.clone())
        else {
            self.set_status_message(Some("No time block in the selected slot"));
            return;
        };
        if let Some(removed) = self.calendar.delete_block(&id) {
            self.set_status_message(Some(format!("Removed '{}'", removed.task)));
            self.persist_blocks();
        }
    }

    fn persist_blocks(&mut self) {
        if !storage::save_collection(self.store.as_ref(), TIME_BLOCKS_KEY, self.calendar.blocks()) {
            self.set_status_message(Some("Could not save time blocks; changes kept in memory"));
        }
    }
}

pub fn format_clock(now: OffsetDateTime, clock_24h: bool) -> String {
    let formatted = if clock_24h {
        now.format(&format_description!("[hour]:[minute]:[second]"))
    } else {
        now.format(&format_description!(
            "[hour repr:12]:[minute]:[second] [period]"
        ))
    };
    formatted.unwrap_or_default()
}
