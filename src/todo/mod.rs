use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::model::{sanitize_text, IdGenerator, Todo, ValidationError};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            Filter::All => "No tasks yet. Add one above!",
            Filter::Active => "No active tasks",
            Filter::Completed => "No completed tasks yet",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Filter::All => Filter::Active,
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
        }
    }
}

pub fn filter_todos(todos: &[Todo], filter: Filter) -> Vec<&Todo> {
    todos.iter().filter(|todo| filter.matches(todo)).collect()
}

pub fn remaining_label(active: usize) -> String {
    let noun = if active == 1 { "task" } else { "tasks" };
    format!("{active} {noun} remaining")
}

/// The task list, newest first.
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    todos: Vec<Todo>,
    ids: IdGenerator,
}

impl TodoList {
    pub fn new(todos: Vec<Todo>) -> Self {
        let ids = IdGenerator::seeded(todos.iter().map(|todo| todo.id.as_str()));
        Self { todos, ids }
    }

    pub fn items(&self) -> &[Todo] {
        &self.todos
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    pub fn add(&mut self, text: &str, now_ms: i64) -> Result<&Todo, ValidationError> {
        let text = sanitize_text(text, "task")?;
        let todo = Todo {
            id: self.ids.next_id(now_ms),
            text,
            completed: false,
            created_at: now_ms,
        };
        self.todos.insert(0, todo);
        Ok(&self.todos[0])
    }

    /// Flips completion; returns the new state, or `None` for an unknown id.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let todo = self.todos.iter_mut().find(|todo| todo.id == id)?;
        todo.completed = !todo.completed;
        Some(todo.completed)
    }

    pub fn delete(&mut self, id: &str) -> Option<Todo> {
        let index = self.todos.iter().position(|todo| todo.id == id)?;
        Some(self.todos.remove(index))
    }

    pub fn filtered(&self, filter: Filter) -> Vec<&Todo> {
        filter_todos(&self.todos, filter)
    }

    pub fn active_count(&self) -> usize {
        self.todos.iter().filter(|todo| !todo.completed).count()
    }

    pub fn remaining_label(&self) -> String {
        remaining_label(self.active_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> TodoList {
        let mut list = TodoList::default();
        list.add("write report", 1_000).unwrap();
        list.add("call bank", 2_000).unwrap();
        list.add("water plants", 3_000).unwrap();
        list
    }

    #[test]
    fn add_prepends_trimmed_text() {
        let list = sample();
        let texts: Vec<_> = list.items().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["water plants", "call bank", "write report"]);
        assert!(list.items().iter().all(|t| !t.completed));
    }

    #[test]
    fn add_rejects_blank_text() {
        let mut list = TodoList::default();
        assert_matches!(list.add("   ", 1), Err(ValidationError::Empty { .. }));
        assert!(list.is_empty());
    }

    #[test]
    fn toggling_twice_restores_original_state() {
        let mut list = sample();
        let id = list.items()[1].id.clone();
        let before = list.items().to_vec();
        assert_eq!(list.toggle(&id), Some(true));
        assert_eq!(list.toggle(&id), Some(false));
        assert_eq!(list.items(), before.as_slice());
        assert_eq!(list.toggle("nope"), None);
    }

    #[test]
    fn filters_partition_the_list() {
        let mut list = sample();
        let id = list.items()[1].id.clone();
        list.toggle(&id);

        let active = list.filtered(Filter::Active);
        let completed = list.filtered(Filter::Completed);
        let all = list.filtered(Filter::All);

        assert!(active.iter().all(|t| !t.completed));
        assert_eq!(active.len(), 2);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, id);
        let all_ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        let list_ids: Vec<_> = list.items().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(all_ids, list_ids);
    }

    #[test]
    fn delete_keeps_remaining_order() {
        let mut list = sample();
        let victim = list.items()[1].id.clone();
        let removed = list.delete(&victim).expect("deleted");
        assert_eq!(removed.text, "call bank");
        let texts: Vec<_> = list.items().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["water plants", "write report"]);
        assert!(list.delete(&victim).is_none());
    }

    #[test]
    fn remaining_label_pluralizes() {
        assert_eq!(remaining_label(0), "0 tasks remaining");
        assert_eq!(remaining_label(1), "1 task remaining");
        assert_eq!(remaining_label(3), "3 tasks remaining");
    }

    #[test]
    fn empty_messages_follow_filter() {
        assert_eq!(Filter::All.empty_message(), "No tasks yet. Add one above!");
        assert_eq!(Filter::Completed.empty_message(), "No completed tasks yet");
        assert_eq!(Filter::All.next().next().next(), Filter::All);
        assert_eq!(Filter::default(), Filter::All);
    }
}
