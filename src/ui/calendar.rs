use std::ops::Range;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;
use strum::IntoEnumIterator;
use time::Date;

use crate::app::state::AppState;
use crate::calendar::{short_weekday, ViewMode};

use super::truncate_to_width;

const TIME_COLUMN_WIDTH: u16 = 7;
const MIN_DAY_COLUMN_WIDTH: u16 = 12;
const HEADER_ROWS: u16 = 2;

pub(super) fn render_calendar(frame: &mut Frame, state: &AppState, today: Date, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(area);

    let model = state.calendar_view(today);
    let cursor = state.calendar().cursor();
    let cursor_index = model
        .grid
        .days
        .iter()
        .position(|day| *day == cursor)
        .unwrap_or(0);

    let mut mode_spans = vec![
        Span::styled(
            "Calendar  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            model.header.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("    "),
    ];
    for mode in ViewMode::iter() {
        let style = if mode == model.mode {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        mode_spans.push(Span::styled(format!(" {} ", mode.label()), style));
    }
    frame.render_widget(Paragraph::new(Line::from(mode_spans)), rows[0]);

    let grid_block = Block::default().borders(Borders::ALL);
    let inner = grid_block.inner(rows[1]);
    frame.render_widget(grid_block, rows[1]);

    let day_count = model.grid.days.len();
    let available = inner.width.saturating_sub(TIME_COLUMN_WIDTH);
    let column_width = if day_count == 0 {
        MIN_DAY_COLUMN_WIDTH
    } else {
        (available / day_count as u16).max(MIN_DAY_COLUMN_WIDTH)
    };
    let visible_days = visible_window(
        day_count,
        cursor_index,
        (available / column_width.max(1)) as usize,
    );
    let visible_hours = visible_window(
        model.grid.rows.len(),
        state.selected_hour(),
        inner.height.saturating_sub(HEADER_ROWS) as usize,
    );

    let mut header_cells = vec![Cell::from(Text::from(vec![
        Line::from(Span::styled("Time", Style::default().fg(Color::Gray))),
        Line::from(""),
    ]))];
    for idx in visible_days.clone() {
        let day = model.grid.days[idx];
        let mut style = Style::default().fg(Color::Gray);
        if model.is_today(day) {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if idx == cursor_index {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        header_cells.push(Cell::from(Text::from(vec![
            Line::from(Span::styled(short_weekday(day), style)),
            Line::from(Span::styled(day.day().to_string(), style)),
        ])));
    }

    let cell_width = column_width.saturating_sub(1) as usize;
    let table_rows: Vec<Row> = visible_hours
        .clone()
        .map(|hour| {
            let slot = &model.grid.rows[hour];
            let mut cells = vec![Cell::from(Span::styled(
                slot.label.clone(),
                Style::default().fg(Color::DarkGray),
            ))];
            for idx in visible_days.clone() {
                let blocks = &slot.cells[idx];
                let selected = idx == cursor_index && hour == state.selected_hour();
                let text = match blocks.split_first() {
                    Some((first, rest)) if rest.is_empty() => {
                        truncate_to_width(&first.task, cell_width)
                    }
                    Some((first, rest)) => {
                        let more = format!(" +{}", rest.len());
                        let room = cell_width.saturating_sub(more.len());
                        format!("{}{more}", truncate_to_width(&first.task, room))
                    }
                    None => String::new(),
                };
                let mut style = if blocks.is_empty() {
                    Style::default()
                } else {
                    Style::default().fg(Color::Black).bg(Color::Magenta)
                };
                if selected {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                cells.push(Cell::from(text).style(style));
            }
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![Constraint::Length(TIME_COLUMN_WIDTH)];
    widths.extend(visible_days.clone().map(|_| Constraint::Length(column_width)));
    let table = Table::new(table_rows, widths)
        .header(Row::new(header_cells).height(HEADER_ROWS))
        .column_spacing(0);
    frame.render_widget(table, inner);

    render_selection_detail(frame, state, rows[2]);
}

fn render_selection_detail(frame: &mut Frame, state: &AppState, area: Rect) {
    let cursor = state.calendar().cursor();
    let title = format!(
        "{} {} {:02}:00",
        short_weekday(cursor),
        crate::model::format_date(cursor),
        state.selected_hour()
    );
    let blocks = state.selected_cell_blocks();
    let lines: Vec<Line> = if blocks.is_empty() {
        vec![Line::from(Span::styled(
            "No time blocks. Press `a` to add one.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        blocks
            .iter()
            .map(|block| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<14}", block.time_range_label()),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled(
                        block.task.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ])
            })
            .collect()
    };
    let detail = Paragraph::new(lines).block(Block::default().borders(Borders::TOP).title(title));
    frame.render_widget(detail, area);
}

/// Slice of `0..total` at most `capacity` long that keeps `selected` visible,
/// centred where possible.
fn visible_window(total: usize, selected: usize, capacity: usize) -> Range<usize> {
    if total == 0 || capacity == 0 {
        return 0..0;
    }
    if total <= capacity {
        return 0..total;
    }
    let selected = selected.min(total - 1);
    let start = selected.saturating_sub(capacity / 2).min(total - capacity);
    start..start + capacity
}
