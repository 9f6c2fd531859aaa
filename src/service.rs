use crate::filter::{self, FilterConfig};
use crate::model::{Rejection, Task, TaskId, TaskInput, TaskPatch};
use crate::services::{Clock, ConfirmGate, IdGenerator, RandomIds, SystemClock};
use crate::stats::{self, Stats};
use crate::storage::{KeyValueStore, StorageError, TaskStore};
use std::sync::Arc;
use tracing::debug;

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";
pub const CLEAR_COMPLETED_PROMPT: &str = "Remove all completed tasks?";

/// What a mutation did. Anything other than `Created`, `Updated`, `Toggled`
/// or a non-zero `Removed` left the collection untouched and wrote nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(TaskId),
    Updated,
    Toggled { completed: bool },
    Removed(usize),
    NotFound,
    Declined,
    Rejected(Rejection),
}

/// Applies the task mutations to a [`TaskStore`].
pub struct TaskService<S, I = RandomIds, C = SystemClock> {
    store: TaskStore<S>,
    ids: I,
    clock: C,
}

impl<S: KeyValueStore> TaskService<S> {
    pub fn with_system(store: TaskStore<S>) -> Self {
        TaskService::new(store, RandomIds, SystemClock)
    }
}

impl<S, I, C> TaskService<S, I, C>
where
    S: KeyValueStore,
    I: IdGenerator,
    C: Clock,
{
    pub fn new(store: TaskStore<S>, ids: I, clock: C) -> Self {
        TaskService { store, ids, clock }
    }

    pub fn tasks(&self) -> Arc<[Task]> {
        self.store.tasks()
    }

    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.store.tasks().iter().find(|t| t.id == id).cloned()
    }

    /// The filtered, ordered view. Owned so it outlives the current snapshot.
    pub fn view(&self, filter: &FilterConfig) -> Vec<Task> {
        filter::view(&self.store.tasks(), filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Statistics against today's date, asked of the clock on every call.
    pub fn stats(&self) -> Stats {
        stats::compute(&self.store.tasks(), self.clock.today())
    }

    pub fn add(&mut self, input: TaskInput) -> Result<Outcome, StorageError> {
        if let Err(reason) = input.validate() {
            debug!(%reason, "add rejected");
            return Ok(Outcome::Rejected(reason));
        }
        let current = self.store.tasks();
        let id = loop {
            let candidate = self.ids.next_id();
            if !current.iter().any(|t| t.id == candidate) {
                break candidate;
            }
            debug!(%candidate, "generated id already taken; retrying");
        };
        let task = Task::new(id.clone(), input, self.clock.now());
        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(task);
        next.extend(current.iter().cloned());
        self.store.replace(next)?;
        debug!(%id, "task added");
        Ok(Outcome::Created(id))
    }

    pub fn edit(&mut self, id: &str, patch: &TaskPatch) -> Result<Outcome, StorageError> {
        if let Err(reason) = patch.validate() {
            debug!(%id, %reason, "edit rejected");
            return Ok(Outcome::Rejected(reason));
        }
        self.update(id, |task| {
            task.apply(patch);
            Outcome::Updated
        })
    }

    pub fn toggle(&mut self, id: &str) -> Result<Outcome, StorageError> {
        self.update(id, |task| {
            task.completed = !task.completed;
            Outcome::Toggled {
                completed: task.completed,
            }
        })
    }

    pub fn delete(&mut self, id: &str, gate: &mut dyn ConfirmGate) -> Result<Outcome, StorageError> {
        let current = self.store.tasks();
        if !current.iter().any(|t| t.id == id) {
            debug!(%id, "delete: no such task");
            return Ok(Outcome::NotFound);
        }
        if !gate.confirm(DELETE_PROMPT) {
            debug!(%id, "delete declined");
            return Ok(Outcome::Declined);
        }
        let next = current.iter().filter(|t| t.id != id).cloned().collect();
        self.store.replace(next)?;
        debug!(%id, "task deleted");
        Ok(Outcome::Removed(1))
    }

    pub fn clear_completed(&mut self, gate: &mut dyn ConfirmGate) -> Result<Outcome, StorageError> {
        let current = self.store.tasks();
        let done = current.iter().filter(|t| t.completed).count();
        if done == 0 {
            return Ok(Outcome::Removed(0));
        }
        if !gate.confirm(CLEAR_COMPLETED_PROMPT) {
            debug!("clear completed declined");
            return Ok(Outcome::Declined);
        }
        let next = current.iter().filter(|t| !t.completed).cloned().collect();
        self.store.replace(next)?;
        debug!(removed = done, "completed tasks cleared");
        Ok(Outcome::Removed(done))
    }

    // Rebuilds the collection with `f` applied to the task matching `id`.
    fn update<F>(&mut self, id: &str, f: F) -> Result<Outcome, StorageError>
    where
        F: FnOnce(&mut Task) -> Outcome,
    {
        let current = self.store.tasks();
        let Some(idx) = current.iter().position(|t| t.id == id) else {
            debug!(%id, "update: no such task");
            return Ok(Outcome::NotFound);
        };
        let mut next = current.to_vec();
        let outcome = f(&mut next[idx]);
        self.store.replace(next)?;
        debug!(%id, ?outcome, "task updated");
        Ok(outcome)
    }
}
