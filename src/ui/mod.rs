use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use strum::IntoEnumIterator;
use time::Date;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, BlockField, OverlayState, Screen};
use crate::todo::Filter;

mod calendar;

const APP_TITLE: &str = "TaskFlow";

pub fn draw_app(frame: &mut Frame, state: &AppState, today: Date) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    render_navbar(frame, state.screen, vertical[0]);
    match state.screen {
        Screen::Tasks => render_tasks(frame, state, vertical[1]),
        Screen::Calendar => calendar::render_calendar(frame, state, today, vertical[1]),
    }
    let status = Paragraph::new(build_status_line(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, state);
}

fn render_navbar(frame: &mut Frame, active: Screen, area: Rect) {
    let mut spans = vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
    ];
    for (idx, screen) in Screen::iter().enumerate() {
        let style = if screen == active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(
            format!(" {} {} ", idx + 1, screen.title()),
            style,
        ));
        spans.push(Span::raw(" "));
    }
    let navbar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(navbar, area);
}

fn render_tasks(frame: &mut Frame, state: &AppState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "My Tasks",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Stay organized, get things done",
            Style::default().fg(Color::Gray),
        )),
        Line::from(Span::styled(
            state.clock_label().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(header, rows[0]);

    let mut filter_spans = Vec::new();
    for filter in Filter::iter() {
        let style = if filter == state.filter {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        filter_spans.push(Span::styled(format!(" {} ", capitalize(&filter.to_string())), style));
        filter_spans.push(Span::raw(" "));
    }
    frame.render_widget(
        Paragraph::new(Line::from(filter_spans)).alignment(Alignment::Center),
        rows[1],
    );

    frame.render_widget(
        Paragraph::new(Span::styled(
            state.todos().remaining_label(),
            Style::default().fg(Color::Gray),
        ))
        .alignment(Alignment::Center),
        rows[2],
    );

    let visible = state.visible_todos();
    let block = Block::default().borders(Borders::ALL).title("Tasks");
    if visible.is_empty() {
        let empty = Paragraph::new(Span::styled(
            state.filter.empty_message(),
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(empty, rows[3]);
        return;
    }

    let items: Vec<ListItem> = visible
        .iter()
        .map(|todo| {
            let (marker, marker_style, text_style) = if todo.completed {
                (
                    "✔ ",
                    Style::default().fg(Color::Green),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT),
                )
            } else {
                ("○ ", Style::default().fg(Color::Gray), Style::default())
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, marker_style),
                Span::styled(todo.text.clone(), text_style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▸ ");
    let mut list_state = ListState::default();
    list_state.select(Some(state.todo_selected().min(visible.len() - 1)));
    frame.render_stateful_widget(list, rows[3], &mut list_state);
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let mut first = vec![Span::styled(
        format!("{} ", state.screen.route()),
        Style::default().fg(Color::DarkGray),
    )];
    if let Some(message) = state.status_message() {
        first.push(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = match state.screen {
        Screen::Tasks => "a add • Space toggle • x delete • f filter • j/k move • Tab calendar • q quit",
        Screen::Calendar => {
            "[/] prev/next • d/w/m view • t today • h/l day • j/k hour • a add • x delete • Tab tasks • q quit"
        }
    };
    Text::from(vec![
        Line::from(first),
        Line::from(Span::styled(keys, Style::default().fg(Color::DarkGray))),
    ])
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::NewTodo(input)) => {
            let area = centered_box(60, 7, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "What needs to be done?",
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(format!("{}▌", input.value())),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to add • Esc to cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("New Task")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::NewBlock(form)) => {
            let area = centered_box(60, 10, frame.size());
            frame.render_widget(Clear, area);
            let mut lines = Vec::with_capacity(8);
            for field in BlockField::ALL {
                let focused = field == form.focus;
                let label_style = if focused {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let mut value = form.field(field).value().to_string();
                if focused {
                    value.push('▌');
                }
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<11}", field.label()), label_style),
                    Span::raw(value),
                ]));
            }
            lines.push(Line::from(""));
            match &form.error {
                Some(error) => lines.push(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(Color::Red),
                ))),
                None => lines.push(Line::from("")),
            }
            lines.push(Line::from(Span::styled(
                "Tab next field • Enter create • Esc cancel",
                Style::default().fg(Color::Gray),
            )));
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Create Time Block")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

/// Fixed-size box centred in `area`, shrunk to fit.
fn centered_box(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cuts `text` to at most `width` terminal columns, ending in `…` when cut.
pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = UnicodeWidthStr::width(grapheme);
        if used + w + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_support::render;
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::MemoryStore;
    use time::macros::date;

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("Standup", 10), "Standup");
        assert_eq!(truncate_to_width("Standup meeting", 8), "Standup…");
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn centered_box_fits_small_areas() {
        let area = Rect::new(0, 0, 20, 5);
        let rect = centered_box(60, 10, area);
        assert_eq!(rect, area);
    }

    #[test]
    fn task_screen_shows_empty_state_and_counter() {
        let state = AppState::load(
            Arc::new(MemoryStore::new()),
            &AppConfig::default(),
            date!(2024 - 03 - 04),
        );
        let screen = render(&state, date!(2024 - 03 - 04), 90, 24);
        assert!(screen.contains("TaskFlow"));
        assert!(screen.contains("My Tasks"));
        assert!(screen.contains("0 tasks remaining"));
        assert!(screen.contains("No tasks yet. Add one above!"));
    }

    #[test]
    fn task_screen_lists_todos() {
        let mut state = AppState::load(
            Arc::new(MemoryStore::new()),
            &AppConfig::default(),
            date!(2024 - 03 - 04),
        );
        state.open_new_todo();
        if let Some(OverlayState::NewTodo(input)) = state.overlay_mut() {
            for ch in "water plants".chars() {
                input.push(ch);
            }
        }
        state.submit_new_todo(1);
        let screen = render(&state, date!(2024 - 03 - 04), 90, 24);
        assert!(screen.contains("water plants"));
        assert!(screen.contains("1 task remaining"));
    }
}
