use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::Date;

use crate::app::{App, Screen};
use crate::calendar::{display_days, CalendarBoard, ViewMode};
use crate::config::AppConfig;
use crate::model::{self, TimeBlock, TimeBlockDraft, Todo};
use crate::storage::{self, KvStore, TIME_BLOCKS_KEY, TODOS_KEY};
use crate::todo::{Filter, TodoList};

#[derive(Args, Debug, Clone)]
pub struct TuiArgs {
    /// Screen to open first
    #[arg(long, default_value_t = Screen::Tasks)]
    pub screen: Screen,
}

impl Default for TuiArgs {
    fn default() -> Self {
        Self {
            screen: Screen::Tasks,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TodoArgs {
    #[command(subcommand)]
    pub command: TodoCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TodoCommand {
    /// Add a task to the top of the list
    Add(TodoAddArgs),
    /// Print tasks, newest first
    List(TodoListArgs),
    /// Flip a task between active and completed
    Toggle(TodoIdArgs),
    /// Delete a task
    Delete(TodoIdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TodoAddArgs {
    /// Task text (words are joined with spaces)
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TodoListArgs {
    /// Which tasks to show: all, active or completed
    #[arg(long, default_value_t = Filter::All)]
    pub filter: Filter,
}

#[derive(Args, Debug, Clone)]
pub struct TodoIdArgs {
    /// Task identifier as shown by `todo list`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct BlockArgs {
    #[command(subcommand)]
    pub command: BlockCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BlockCommand {
    /// Schedule a time block
    Add(BlockAddArgs),
    /// Remove a time block
    Delete(BlockIdArgs),
    /// List time blocks in the range shown by a calendar view
    List(RangeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BlockAddArgs {
    /// Task name (words are joined with spaces)
    #[arg(required = true)]
    pub task: Vec<String>,
    /// Day of the block, YYYY-MM-DD (defaults to today)
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Start time, HH:MM (defaults to the configured start)
    #[arg(long)]
    pub start: Option<String>,
    /// End time, HH:MM (defaults to the configured end)
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BlockIdArgs {
    /// Block identifier as shown by `block list`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Cursor date, YYYY-MM-DD (defaults to today)
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Range to cover: day, week or month
    #[arg(long, default_value_t = ViewMode::Week)]
    pub view: ViewMode,
}

#[derive(Args, Debug, Clone)]
pub struct AgendaArgs {
    #[command(flatten)]
    pub range: RangeArgs,
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    model::parse_date(raw).map_err(|err| err.to_string())
}

pub fn run_tui(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: TuiArgs) -> Result<()> {
    let mut app = App::new(config, store, args.screen);
    app.run()
}

pub fn handle_todo_command(store: &dyn KvStore, args: TodoArgs) -> Result<()> {
    let output = match args.command {
        TodoCommand::Add(args) => todo_add(store, args)?,
        TodoCommand::List(args) => todo_list(store, args)?,
        TodoCommand::Toggle(args) => todo_toggle(store, args)?,
        TodoCommand::Delete(args) => todo_delete(store, args)?,
    };
    print!("{output}");
    Ok(())
}

pub fn handle_block_command(config: &AppConfig, store: &dyn KvStore, args: BlockArgs) -> Result<()> {
    let output = match args.command {
        BlockCommand::Add(args) => block_add(config, store, args)?,
        BlockCommand::Delete(args) => block_delete(store, args)?,
        BlockCommand::List(args) => block_list(store, args)?,
    };
    print!("{output}");
    Ok(())
}

pub fn print_agenda(store: &dyn KvStore, args: AgendaArgs) -> Result<()> {
    let cursor = args.range.date.unwrap_or_else(model::today);
    let board = load_board(store, cursor, args.range.view)?;
    print!("{}", format_agenda(&board, model::today()));
    Ok(())
}

fn load_todos(store: &dyn KvStore) -> Result<TodoList> {
    let todos: Vec<Todo> =
        storage::read_collection_or_reset(store, TODOS_KEY).context("loading tasks")?;
    Ok(TodoList::new(todos))
}

fn save_todos(store: &dyn KvStore, todos: &TodoList) -> Result<()> {
    storage::write_collection(store, TODOS_KEY, todos.items()).context("saving tasks")
}

fn todo_add(store: &dyn KvStore, args: TodoAddArgs) -> Result<String> {
    let mut todos = load_todos(store)?;
    let text = args.text.join(" ");
    let todo = todos.add(&text, model::now_millis())?.clone();
    save_todos(store, &todos)?;
    tracing::info!(id = %todo.id, "task added");
    Ok(format!("Added task #{}: {}\n", todo.id, todo.text))
}

fn todo_list(store: &dyn KvStore, args: TodoListArgs) -> Result<String> {
    Ok(format_todo_list(&load_todos(store)?, args.filter))
}

fn todo_toggle(store: &dyn KvStore, args: TodoIdArgs) -> Result<String> {
    let mut todos = load_todos(store)?;
    let Some(completed) = todos.toggle(&args.id) else {
        bail!("task #{} not found", args.id);
    };
    save_todos(store, &todos)?;
    let state = if completed { "completed" } else { "active" };
    Ok(format!("Task #{} is now {state}\n", args.id))
}

fn todo_delete(store: &dyn KvStore, args: TodoIdArgs) -> Result<String> {
    let mut todos = load_todos(store)?;
    let Some(removed) = todos.delete(&args.id) else {
        bail!("task #{} not found", args.id);
    };
    save_todos(store, &todos)?;
    Ok(format!("Deleted task #{}: {}\n", removed.id, removed.text))
}

fn format_todo_list(todos: &TodoList, filter: Filter) -> String {
    let visible = todos.filtered(filter);
    let mut out = String::new();
    if visible.is_empty() {
        let _ = writeln!(&mut out, "{}", filter.empty_message());
    }
    for todo in visible {
        let _ = writeln!(&mut out, "{}", format_todo_line(todo));
    }
    let _ = writeln!(&mut out, "{}", todos.remaining_label());
    out
}

fn format_todo_line(todo: &Todo) -> String {
    let mark = if todo.completed { "x" } else { " " };
    format!("[{mark}] #{}  {}", todo.id, todo.text)
}

fn load_board(store: &dyn KvStore, cursor: Date, view: ViewMode) -> Result<CalendarBoard> {
    let blocks: Vec<TimeBlock> =
        storage::read_collection_or_reset(store, TIME_BLOCKS_KEY).context("loading time blocks")?;
    Ok(CalendarBoard::new(blocks, cursor, view))
}

fn save_board(store: &dyn KvStore, board: &CalendarBoard) -> Result<()> {
    storage::write_collection(store, TIME_BLOCKS_KEY, board.blocks()).context("saving time blocks")
}

fn block_add(config: &AppConfig, store: &dyn KvStore, args: BlockAddArgs) -> Result<String> {
    let date = args.date.unwrap_or_else(model::today);
    let mut board = load_board(store, date, config.calendar.default_view)?;
    let draft = TimeBlockDraft {
        date,
        start_time: args
            .start
            .unwrap_or_else(|| config.calendar.default_start.clone()),
        end_time: args
            .end
            .unwrap_or_else(|| config.calendar.default_end.clone()),
        task: args.task.join(" "),
    };
    let block = board.add_block(&draft, model::now_millis())?.clone();
    save_board(store, &board)?;
    tracing::info!(id = %block.id, date = %block.date, "time block added");
    Ok(format!(
        "Scheduled #{}: {} on {} {}\n",
        block.id,
        block.task,
        model::format_date(block.date),
        block.time_range_label()
    ))
}

fn block_delete(store: &dyn KvStore, args: BlockIdArgs) -> Result<String> {
    let mut board = load_board(store, model::today(), ViewMode::Day)?;
    let Some(removed) = board.delete_block(&args.id) else {
        bail!("time block #{} not found", args.id);
    };
    save_board(store, &board)?;
    Ok(format!("Removed #{}: {}\n", removed.id, removed.task))
}

fn block_list(store: &dyn KvStore, args: RangeArgs) -> Result<String> {
    let cursor = args.date.unwrap_or_else(model::today);
    let board = load_board(store, cursor, args.view)?;
    Ok(format_block_list(&board))
}

fn format_block_list(board: &CalendarBoard) -> String {
    let mut out = String::new();
    let mut any = false;
    for day in display_days(board.cursor(), board.mode()) {
        for block in board.blocks_on(day) {
            any = true;
            let _ = writeln!(
                &mut out,
                "{} {}  {}  {}  #{}",
                model::format_date(day),
                crate::calendar::short_weekday(day),
                block.time_range_label(),
                block.task,
                block.id
            );
        }
    }
    if !any {
        out.push_str("No time blocks in range.\n");
    }
    out
}

/// Header line followed by every occupied hour slot, in display order.
fn format_agenda(board: &CalendarBoard, today: Date) -> String {
    let model = board.view_model(today);
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", model.header);
    let mut any = false;
    for (day_index, day) in model.grid.days.iter().enumerate() {
        for (hour, row) in model.grid.rows.iter().enumerate() {
            let blocks = model.grid.cell(day_index, hour);
            for block in blocks {
                any = true;
                let marker = if model.is_today(*day) { "*" } else { " " };
                let _ = writeln!(
                    &mut out,
                    "{marker}{} {:>2}  {}  {} ({})",
                    crate::calendar::short_weekday(*day),
                    day.day(),
                    row.label,
                    block.task,
                    block.time_range_label()
                );
            }
        }
    }
    if !any {
        out.push_str("Nothing scheduled.\n");
    }
    out
}
