//! View-facing state owned by `TaskController`.

use crate::types::Task;

/// The single in-progress title edit, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingEdit {
    #[default]
    None,
    Editing { id: String, draft: String },
}

impl PendingEdit {
    pub fn is_editing(&self, task_id: &str) -> bool {
        matches!(self, PendingEdit::Editing { id, .. } if id == task_id)
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            PendingEdit::None => None,
            PendingEdit::Editing { draft, .. } => Some(draft),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

/// A user-facing notification, shown as a toast by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Failure(m) => m,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failure(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub active: usize,
    pub completed: usize,
    pub total: usize,
}

impl TaskCounts {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            active: tasks.len() - completed,
            completed,
            total: tasks.len(),
        }
    }
}
