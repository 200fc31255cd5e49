use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::state::Screen;
use crate::calendar::{Direction, ViewMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    SwitchScreen,
    GoTo(Screen),
    // tasks
    NewTodo,
    ToggleTodo,
    DeleteTodo,
    CycleFilter,
    SelectNext,
    SelectPrevious,
    // calendar
    Navigate(Direction),
    SetView(ViewMode),
    Today,
    DayLeft,
    DayRight,
    HourUp,
    HourDown,
    NewBlock,
    DeleteBlock,
}

fn plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

/// Maps a key press outside of any overlay to the action for `screen`.
pub fn map_key(screen: Screen, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(Action::Quit)
        }
        KeyCode::Char('q') if plain(&key) => return Some(Action::Quit),
        KeyCode::Tab | KeyCode::BackTab => return Some(Action::SwitchScreen),
        KeyCode::Char('1') if plain(&key) => return Some(Action::GoTo(Screen::Tasks)),
        KeyCode::Char('2') if plain(&key) => return Some(Action::GoTo(Screen::Calendar)),
        _ => {}
    }
    if !plain(&key) {
        return None;
    }
    match screen {
        Screen::Tasks => match key.code {
            KeyCode::Char('a') | KeyCode::Char('i') => Some(Action::NewTodo),
            KeyCode::Char(' ') | KeyCode::Enter => Some(Action::ToggleTodo),
            KeyCode::Char('x') | KeyCode::Char('d') | KeyCode::Delete => Some(Action::DeleteTodo),
            KeyCode::Char('f') => Some(Action::CycleFilter),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            _ => None,
        },
        Screen::Calendar => match key.code {
            KeyCode::Char('[') | KeyCode::Char('p') | KeyCode::PageUp => {
                Some(Action::Navigate(Direction::Previous))
            }
            KeyCode::Char(']') | KeyCode::Char('n') | KeyCode::PageDown => {
                Some(Action::Navigate(Direction::Next))
            }
            KeyCode::Char('d') => Some(Action::SetView(ViewMode::Day)),
            KeyCode::Char('w') => Some(Action::SetView(ViewMode::Week)),
            KeyCode::Char('m') => Some(Action::SetView(ViewMode::Month)),
            KeyCode::Char('t') => Some(Action::Today),
            KeyCode::Char('h') | KeyCode::Left => Some(Action::DayLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::DayRight),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::HourUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::HourDown),
            KeyCode::Char('a') => Some(Action::NewBlock),
            KeyCode::Char('x') | KeyCode::Delete => Some(Action::DeleteBlock),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn same_letter_means_different_things_per_screen() {
        assert_eq!(
            map_key(Screen::Tasks, press(KeyCode::Char('d'))),
            Some(Action::DeleteTodo)
        );
        assert_eq!(
            map_key(Screen::Calendar, press(KeyCode::Char('d'))),
            Some(Action::SetView(ViewMode::Day))
        );
    }

    #[test]
    fn global_keys_work_on_both_screens() {
        for screen in [Screen::Tasks, Screen::Calendar] {
            assert_eq!(map_key(screen, press(KeyCode::Tab)), Some(Action::SwitchScreen));
            assert_eq!(map_key(screen, press(KeyCode::Char('q'))), Some(Action::Quit));
            assert_eq!(
                map_key(screen, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
                Some(Action::Quit)
            );
        }
    }

    #[test]
    fn modified_letters_are_ignored() {
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT);
        assert_eq!(map_key(Screen::Tasks, key), None);
    }

    #[test]
    fn brackets_page_the_calendar() {
        assert_eq!(
            map_key(Screen::Calendar, press(KeyCode::Char(']'))),
            Some(Action::Navigate(Direction::Next))
        );
        assert_eq!(map_key(Screen::Tasks, press(KeyCode::Char(']'))), None);
    }
}
