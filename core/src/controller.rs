//! Task synchronization controller.
//!
//! # Design
//! `TaskController` owns the task collection shown to the user and keeps it
//! converging to the remote store with optimistic updates. Each mutating
//! operation has two halves:
//!
//! - `begin_*` applies the change locally, snapshots the collection and
//!   returns a `Mutation` describing the remote call to make;
//! - `finish` takes the outcome of that call and either commits (replacing a
//!   create's placeholder with the server task) or reverts.
//!
//! The async `create`/`toggle`/`save_edit`/`delete` methods chain both halves
//! through the adapter. Callers that want several operations in flight use
//! the halves directly.
//!
//! Overlapping operations are made safe two ways. A task with an operation in
//! flight refuses new operations (`SyncError::Busy`). A failed operation
//! restores its full snapshot only if nothing else touched the collection in
//! the meantime; otherwise it undoes just its own change so that unrelated
//! optimistic edits survive.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::adapter::RemoteAdapter;
use crate::error::{ApiError, ApiResult, ErrorKind, SyncError};
use crate::state::{LoadState, Notice, PendingEdit, TaskCounts};
use crate::transport::Transport;
use crate::types::{validate_title, Task, UpdateTask};

/// Ticket identifying one in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(u64);

/// The remote half of an optimistic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { title: String },
    Update { id: String, changes: UpdateTask },
    Delete { id: String },
}

impl RemoteCall {
    /// Run the call. Create and update yield the server's task; delete
    /// yields `None`.
    pub async fn execute<T: Transport>(&self, adapter: &RemoteAdapter<T>) -> ApiResult<Option<Task>> {
        match self {
            RemoteCall::Create { title } => adapter.create_task(title).await.map(Some),
            RemoteCall::Update { id, changes } => adapter.update_task(id, changes).await.map(Some),
            RemoteCall::Delete { id } => adapter.delete_task(id).await.map(|()| None),
        }
    }
}

/// An applied optimistic change awaiting its remote confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a mutation must be executed and passed to `finish`"]
pub struct Mutation {
    pub op: OpId,
    pub call: RemoteCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Create,
    Toggle,
    Edit,
    Delete,
}

impl OpKind {
    fn success_message(self) -> &'static str {
        match self {
            OpKind::Create => "Task added",
            OpKind::Toggle | OpKind::Edit => "Task updated",
            OpKind::Delete => "Task deleted",
        }
    }

    fn failure_message(self, err: &ApiError) -> String {
        match self {
            // Creation failures surface what the server (or the network) said.
            OpKind::Create => match err.kind() {
                ErrorKind::Remote | ErrorKind::Network => {
                    let message = err.user_message();
                    if message.trim().is_empty() {
                        "Failed to add task".to_string()
                    } else {
                        message
                    }
                }
                _ => "Failed to add task".to_string(),
            },
            OpKind::Toggle | OpKind::Edit => "Failed to update task".to_string(),
            OpKind::Delete => "Failed to delete task".to_string(),
        }
    }
}

/// Inverse of one operation's local effect.
#[derive(Debug, Clone)]
enum Undo {
    RemovePlaceholder { id: String },
    RestoreCompleted { id: String, completed: bool },
    RestoreTitle { id: String, title: String },
    Reinsert { task: Task },
}

#[derive(Debug)]
struct InFlight {
    kind: OpKind,
    task_id: String,
    snapshot: Vec<Task>,
    /// Collection revision right after this operation was applied.
    revision: u64,
    undo: Undo,
}

pub struct TaskController<T> {
    adapter: RemoteAdapter<T>,
    tasks: Vec<Task>,
    revision: u64,
    load_state: LoadState,
    edit: PendingEdit,
    input: String,
    owner: Option<String>,
    in_flight: HashMap<OpId, InFlight>,
    next_op: u64,
    notices: Vec<Notice>,
}

impl<T: Transport> TaskController<T> {
    pub fn new(adapter: RemoteAdapter<T>) -> Self {
        Self {
            adapter,
            tasks: Vec::new(),
            revision: 0,
            load_state: LoadState::Loading,
            edit: PendingEdit::None,
            input: String::new(),
            owner: None,
            in_flight: HashMap::new(),
            next_op: 0,
            notices: Vec::new(),
        }
    }

    pub fn adapter(&self) -> &RemoteAdapter<T> {
        &self.adapter
    }

    // ---- read side ----

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.completed)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.completed)
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::of(&self.tasks)
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    pub fn pending_edit(&self) -> &PendingEdit {
        &self.edit
    }

    /// Whether an operation on `id` is awaiting its remote result.
    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.values().any(|f| f.task_id == id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Notices emitted since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ---- session ----

    /// Owner stamped on placeholder tasks.
    pub fn set_owner(&mut self, owner: Option<String>) {
        self.owner = owner;
    }

    /// Forget everything tied to the current view. In-flight operations that
    /// resolve afterwards no longer touch the collection.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.bump();
        self.load_state = LoadState::Loading;
        self.edit = PendingEdit::None;
        self.input.clear();
        self.in_flight.clear();
        self.notices.clear();
    }

    /// Drop the credential and all view state.
    pub fn sign_out(&mut self) {
        self.adapter.sign_out();
        self.owner = None;
        self.reset();
    }

    // ---- load ----

    pub fn begin_load(&mut self) {
        self.load_state = LoadState::Loading;
    }

    /// Replace the collection with the fetched list. A failed fetch keeps
    /// whatever was already shown, which is nothing on the first load.
    pub fn finish_load(&mut self, result: ApiResult<Vec<Task>>) -> Result<(), SyncError> {
        match result {
            Ok(tasks) => {
                if !self.in_flight.is_empty() {
                    debug!(count = self.in_flight.len(), "load invalidates in-flight operations");
                    self.in_flight.clear();
                }
                self.bump();
                info!(count = tasks.len(), "tasks loaded");
                self.tasks = tasks;
                self.load_state = LoadState::Ready;
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "failed to load tasks");
                self.load_state = LoadState::Failed;
                let message = "Failed to fetch tasks".to_string();
                self.notices.push(Notice::Failure(message.clone()));
                Err(SyncError::Remote { message, source })
            }
        }
    }

    pub async fn load(&mut self) -> Result<(), SyncError> {
        self.begin_load();
        let result = self.adapter.list_tasks().await;
        self.finish_load(result)
    }

    pub async fn reload(&mut self) -> Result<(), SyncError> {
        self.load().await
    }

    // ---- input buffer ----

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Create a task from the input buffer. The buffer is cleared as soon as
    /// the title is accepted; a rejected title stays for the user to fix.
    pub async fn submit_input(&mut self) -> Result<(), SyncError> {
        let title = self.input.clone();
        let mutation = self.begin_create(&title)?;
        self.input.clear();
        self.run(mutation).await
    }

    // ---- create ----

    pub fn begin_create(&mut self, title: &str) -> Result<Mutation, SyncError> {
        let title = validate_title(title)?;
        let placeholder = Task::placeholder(title.clone(), self.owner.as_deref());
        let id = placeholder.id.clone();

        let snapshot = self.tasks.clone();
        self.tasks.insert(0, placeholder);
        let undo = Undo::RemovePlaceholder { id: id.clone() };
        let op = self.track(OpKind::Create, id, snapshot, undo);
        Ok(Mutation {
            op,
            call: RemoteCall::Create { title },
        })
    }

    pub async fn create(&mut self, title: &str) -> Result<(), SyncError> {
        let mutation = self.begin_create(title)?;
        self.run(mutation).await
    }

    // ---- toggle ----

    /// Flip the completion flag. `Ok(None)` when `id` is not in the collection.
    pub fn begin_toggle(&mut self, id: &str) -> Result<Option<Mutation>, SyncError> {
        self.ensure_idle(id)?;
        let Some(index) = self.position(id) else {
            debug!(id, "toggle on unknown task ignored");
            return Ok(None);
        };

        let snapshot = self.tasks.clone();
        let previous = self.tasks[index].completed;
        self.tasks[index].completed = !previous;
        let undo = Undo::RestoreCompleted {
            id: id.to_string(),
            completed: previous,
        };
        let op = self.track(OpKind::Toggle, id.to_string(), snapshot, undo);
        Ok(Some(Mutation {
            op,
            call: RemoteCall::Update {
                id: id.to_string(),
                changes: UpdateTask::completed(!previous),
            },
        }))
    }

    pub async fn toggle(&mut self, id: &str) -> Result<(), SyncError> {
        match self.begin_toggle(id)? {
            Some(mutation) => self.run(mutation).await,
            None => Ok(()),
        }
    }

    // ---- edit ----

    /// Open the edit slot for `id`, discarding any other open edit.
    pub fn begin_edit(&mut self, id: &str, current_title: &str) {
        if let PendingEdit::Editing { id: previous, .. } = &self.edit {
            if previous != id {
                debug!(previous = %previous, id, "discarding open edit");
            }
        }
        self.edit = PendingEdit::Editing {
            id: id.to_string(),
            draft: current_title.to_string(),
        };
    }

    /// Replace the draft text. Ignored when no edit is open.
    pub fn update_edit_draft(&mut self, text: impl Into<String>) {
        if let PendingEdit::Editing { draft, .. } = &mut self.edit {
            *draft = text.into();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.edit = PendingEdit::None;
    }

    /// Apply the open draft. A rejected draft leaves the edit open; `Ok(None)`
    /// when nothing was open or the task is gone.
    pub fn begin_save_edit(&mut self) -> Result<Option<Mutation>, SyncError> {
        let (id, title) = match &self.edit {
            PendingEdit::None => return Ok(None),
            PendingEdit::Editing { id, draft } => (id.clone(), validate_title(draft)?),
        };
        self.ensure_idle(&id)?;
        self.edit = PendingEdit::None;

        let Some(index) = self.position(&id) else {
            debug!(id = %id, "edited task no longer present");
            return Ok(None);
        };

        let snapshot = self.tasks.clone();
        let previous = std::mem::replace(&mut self.tasks[index].title, title.clone());
        let undo = Undo::RestoreTitle {
            id: id.clone(),
            title: previous,
        };
        let op = self.track(OpKind::Edit, id.clone(), snapshot, undo);
        Ok(Some(Mutation {
            op,
            call: RemoteCall::Update {
                id,
                changes: UpdateTask::title(title),
            },
        }))
    }

    pub async fn save_edit(&mut self) -> Result<(), SyncError> {
        match self.begin_save_edit()? {
            Some(mutation) => self.run(mutation).await,
            None => Ok(()),
        }
    }

    // ---- delete ----

    /// Remove the task locally. `Ok(None)` when `id` is not in the collection.
    pub fn begin_delete(&mut self, id: &str) -> Result<Option<Mutation>, SyncError> {
        self.ensure_idle(id)?;
        let Some(index) = self.position(id) else {
            debug!(id, "delete on unknown task ignored");
            return Ok(None);
        };

        let snapshot = self.tasks.clone();
        let task = self.tasks.remove(index);
        let undo = Undo::Reinsert { task };
        let op = self.track(OpKind::Delete, id.to_string(), snapshot, undo);
        Ok(Some(Mutation {
            op,
            call: RemoteCall::Delete { id: id.to_string() },
        }))
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), SyncError> {
        match self.begin_delete(id)? {
            Some(mutation) => self.run(mutation).await,
            None => Ok(()),
        }
    }

    // ---- resolution ----

    /// Execute `mutation` through the adapter and reconcile the result.
    pub async fn run(&mut self, mutation: Mutation) -> Result<(), SyncError> {
        let result = mutation.call.execute(&self.adapter).await;
        self.finish(mutation.op, result)
    }

    /// Reconcile the outcome of an operation started with `begin_*`.
    ///
    /// Tickets invalidated by a successful `finish_load` or by `reset` are ignored.
    pub fn finish(&mut self, op: OpId, result: ApiResult<Option<Task>>) -> Result<(), SyncError> {
        let Some(flight) = self.in_flight.remove(&op) else {
            debug!(?op, ok = result.is_ok(), "stale operation result ignored");
            return Ok(());
        };

        let result = match result {
            // The task is already gone on the server, which is what delete wanted.
            Err(e) if flight.kind == OpKind::Delete && e.is_not_found() => {
                debug!(id = %flight.task_id, "delete answered 404, treating as done");
                Ok(None)
            }
            other => other,
        };

        match result {
            Ok(confirmed) => {
                if flight.kind == OpKind::Create {
                    if let Some(task) = confirmed {
                        self.replace_placeholder(&flight.task_id, task);
                    }
                }
                self.notices
                    .push(Notice::Success(flight.kind.success_message().to_string()));
                Ok(())
            }
            Err(source) => {
                let message = flight.kind.failure_message(&source);
                warn!(id = %flight.task_id, error = %source, "remote call failed, reverting");
                self.revert(flight);
                self.notices.push(Notice::Failure(message.clone()));
                Err(SyncError::Remote { message, source })
            }
        }
    }

    // ---- internals ----

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn ensure_idle(&self, id: &str) -> Result<(), SyncError> {
        if self.is_busy(id) {
            debug!(id, "operation refused, task busy");
            return Err(SyncError::Busy(id.to_string()));
        }
        Ok(())
    }

    /// Record an operation whose local effect has just been applied.
    fn track(&mut self, kind: OpKind, task_id: String, snapshot: Vec<Task>, undo: Undo) -> OpId {
        self.bump();
        self.next_op += 1;
        let op = OpId(self.next_op);
        debug!(?op, ?kind, id = %task_id, "optimistic change applied");
        self.in_flight.insert(
            op,
            InFlight {
                kind,
                task_id,
                snapshot,
                revision: self.revision,
                undo,
            },
        );
        op
    }

    fn replace_placeholder(&mut self, placeholder_id: &str, task: Task) {
        let Some(index) = self.position(placeholder_id) else {
            debug!(placeholder_id, "placeholder gone before create resolved");
            return;
        };
        if self.position(&task.id).is_some() {
            self.tasks.remove(index);
        } else {
            self.tasks[index] = task;
        }
        self.bump();
    }

    fn revert(&mut self, flight: InFlight) {
        if flight.revision == self.revision {
            self.tasks = flight.snapshot;
            self.bump();
            return;
        }

        warn!(
            id = %flight.task_id,
            "collection changed while the call was in flight, undoing only this operation"
        );
        match flight.undo {
            Undo::RemovePlaceholder { id } => self.tasks.retain(|t| t.id != id),
            Undo::RestoreCompleted { id, completed } => {
                if let Some(index) = self.position(&id) {
                    self.tasks[index].completed = completed;
                }
            }
            Undo::RestoreTitle { id, title } => {
                if let Some(index) = self.position(&id) {
                    self.tasks[index].title = title;
                }
            }
            Undo::Reinsert { task } => self.reinsert(task, &flight.snapshot),
        }
        self.bump();
    }

    /// Put a deleted task back next to the neighbours it had in `snapshot`:
    /// after the nearest earlier one still present, else before the nearest
    /// later one, else last. Tasks created since stay in front of it.
    fn reinsert(&mut self, task: Task, snapshot: &[Task]) {
        if self.position(&task.id).is_some() {
            return;
        }
        let index = match snapshot.iter().position(|t| t.id == task.id) {
            Some(at) => snapshot[..at]
                .iter()
                .rev()
                .find_map(|t| self.position(&t.id))
                .map(|i| i + 1)
                .or_else(|| snapshot[at + 1..].iter().find_map(|t| self.position(&t.id)))
                .unwrap_or(self.tasks.len()),
            None => self.tasks.len(),
        };
        self.tasks.insert(index, task);
    }
}
