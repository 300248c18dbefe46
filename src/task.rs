//! Task entity model and display rules.
//!
//! A task owns an ordered list of subtasks. Completion rolls up from
//! subtasks to the parent (never the other way around), and the display
//! status is derived at read time, never persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// An independently completable item owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl Subtask {
    /// Build a new subtask with a fresh id. The text must be non-empty.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "subtask text cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            text,
            completed: false,
        })
    }
}

/// A user-owned unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// The id-less, owner-less shape produced by the create/edit form.
///
/// The store adapter assigns id, owner, and creation timestamp on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl TaskDraft {
    /// Build a draft with the given title and due date. The title must be
    /// non-empty.
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        Ok(Self {
            title,
            notes: None,
            due_date,
            completed: false,
            subtasks: Vec::new(),
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.is_empty() { None } else { Some(notes) };
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = subtasks;
        self
    }
}

/// Typed partial update for a task record.
///
/// `None` means "leave the field as is"; `notes: Some(None)` clears the
/// notes. Never an untyped field map, so the merge contract stays checkable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
            && self.subtasks.is_none()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn subtasks(mut self, subtasks: Vec<Subtask>) -> Self {
        self.subtasks = Some(subtasks);
        self
    }

    /// Validate field constraints before the patch crosses a store boundary.
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidArgument("title cannot be empty".to_string()));
            }
        }
        if let Some(subtasks) = &self.subtasks {
            if subtasks.iter().any(|st| st.text.trim().is_empty()) {
                return Err(Error::InvalidArgument(
                    "subtask text cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Merge this patch into a task, returning the updated record.
    pub fn apply(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            updated.notes = notes.clone();
        }
        if let Some(due_date) = self.due_date {
            updated.due_date = due_date;
        }
        if let Some(completed) = self.completed {
            updated.completed = completed;
        }
        if let Some(subtasks) = &self.subtasks {
            updated.subtasks = subtasks.clone();
        }
        updated
    }
}

/// Derived, read-only classification of a task for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Complete,
    #[serde(rename = "Not Complete")]
    NotComplete,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Complete => "Complete",
            TaskStatus::NotComplete => "Not Complete",
        };
        f.write_str(label)
    }
}

/// Classify a task for display given the current calendar day.
///
/// Recomputed on every read; the result is never stored on the entity.
pub fn display_status(task: &Task, today: NaiveDate) -> TaskStatus {
    if task.completed {
        return TaskStatus::Complete;
    }
    if task.due_date.date_naive() < today {
        return TaskStatus::NotComplete;
    }
    TaskStatus::Pending
}

/// Replace one subtask's completion flag and re-derive the parent flag.
///
/// When the subtask list is non-empty the parent `completed` becomes the
/// AND of all subtask flags. An empty list leaves the parent flag alone.
/// The input task is untouched; persistence is the caller's business.
pub fn apply_subtask_toggle(task: &Task, subtask_id: &str, completed: bool) -> Result<Task> {
    if !task.subtasks.iter().any(|st| st.id == subtask_id) {
        return Err(Error::SubtaskNotFound {
            task: task.id.clone(),
            subtask: subtask_id.to_string(),
        });
    }

    let mut updated = task.clone();
    for subtask in &mut updated.subtasks {
        if subtask.id == subtask_id {
            subtask.completed = completed;
        }
    }
    if !updated.subtasks.is_empty() {
        updated.completed = updated.subtasks.iter().all(|st| st.completed);
    }
    Ok(updated)
}

/// Overwrite the parent completion flag directly.
///
/// Subtasks keep their individual states. Child state rolls up to the
/// parent, but marking the parent done never cascades down.
pub fn apply_completion_toggle(task: &Task, completed: bool) -> Task {
    let mut updated = task.clone();
    updated.completed = completed;
    updated
}

/// Sort a task collection for presentation.
///
/// Incomplete tasks come first, then due date ascending within each group.
/// The sort is stable so equal keys keep their incoming relative order, and
/// the input is left untouched.
pub fn sort_for_display(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|left, right| {
        left.completed
            .cmp(&right.completed)
            .then_with(|| left.due_date.cmp(&right.due_date))
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        format!("{s}T12:00:00Z").parse().expect("timestamp")
    }

    fn task(id: &str, completed: bool, due: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            notes: None,
            due_date: ts(due),
            completed,
            subtasks: Vec::new(),
            owner_id: "u1".to_string(),
            created_at: ts("2024-01-01"),
        }
    }

    fn subtask(id: &str, completed: bool) -> Subtask {
        Subtask {
            id: id.to_string(),
            text: format!("step {id}"),
            completed,
        }
    }

    #[test]
    fn subtask_toggle_derives_parent_from_all_subtasks() {
        let mut t = task("t1", false, "2024-06-01");
        t.subtasks = vec![subtask("a", true), subtask("b", false)];

        let updated = apply_subtask_toggle(&t, "b", true).unwrap();
        assert!(updated.completed);
        assert!(updated.subtasks.iter().all(|st| st.completed));

        let reverted = apply_subtask_toggle(&updated, "a", false).unwrap();
        assert!(!reverted.completed);
    }

    #[test]
    fn subtask_toggle_partial_leaves_parent_incomplete() {
        let mut t = task("t1", false, "2024-06-01");
        t.subtasks = vec![subtask("a", false), subtask("b", false), subtask("c", false)];

        let updated = apply_subtask_toggle(&t, "b", true).unwrap();
        assert!(!updated.completed);
        assert!(updated.subtasks[1].completed);
        assert!(!updated.subtasks[0].completed);
    }

    #[test]
    fn subtask_toggle_unknown_id_is_an_error() {
        let mut t = task("t1", true, "2024-06-01");
        t.subtasks = vec![subtask("a", true)];
        let err = apply_subtask_toggle(&t, "missing", false).unwrap_err();
        assert!(matches!(err, Error::SubtaskNotFound { .. }));
    }

    #[test]
    fn subtask_toggle_without_subtasks_never_touches_parent() {
        let t = task("t1", true, "2024-06-01");
        let err = apply_subtask_toggle(&t, "anything", true).unwrap_err();
        assert!(matches!(err, Error::SubtaskNotFound { .. }));
        // Original flag survives since the rule only runs when subtasks exist.
        assert!(t.completed);
    }

    #[test]
    fn completion_toggle_does_not_cascade_to_subtasks() {
        let mut t = task("t1", false, "2024-06-01");
        t.subtasks = vec![subtask("a", false), subtask("b", true)];

        let updated = apply_completion_toggle(&t, true);
        assert!(updated.completed);
        assert!(!updated.subtasks[0].completed);
        assert!(updated.subtasks[1].completed);
    }

    #[test]
    fn status_complete_wins_over_due_date() {
        let t = task("t1", true, "2020-01-01");
        assert_eq!(
            display_status(&t, ts("2024-06-01").date_naive()),
            TaskStatus::Complete
        );
    }

    #[test]
    fn status_overdue_is_not_complete() {
        let t = task("t1", false, "2024-05-31");
        assert_eq!(
            display_status(&t, ts("2024-06-01").date_naive()),
            TaskStatus::NotComplete
        );
    }

    #[test]
    fn status_due_today_or_later_is_pending() {
        let today = ts("2024-06-01").date_naive();
        assert_eq!(
            display_status(&task("t1", false, "2024-06-01"), today),
            TaskStatus::Pending
        );
        assert_eq!(
            display_status(&task("t2", false, "2024-06-02"), today),
            TaskStatus::Pending
        );
    }

    #[test]
    fn status_label_matches_wire_format() {
        assert_eq!(TaskStatus::NotComplete.to_string(), "Not Complete");
        assert_eq!(
            serde_json::to_string(&TaskStatus::NotComplete).unwrap(),
            "\"Not Complete\""
        );
    }

    #[test]
    fn sort_puts_incomplete_before_complete() {
        let tasks = vec![
            task("done", true, "2024-01-01"),
            task("open", false, "2024-12-31"),
        ];
        let sorted = sort_for_display(&tasks);
        assert_eq!(sorted[0].id, "open");
        assert_eq!(sorted[1].id, "done");
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let tasks = vec![
            task("a", false, "2024-01-02"),
            task("b", false, "2024-01-02"),
            task("c", true, "2024-01-01"),
        ];
        let sorted = sort_for_display(&tasks);
        let ids: Vec<&str> = sorted.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn sort_is_idempotent_and_pure() {
        let tasks = vec![
            task("c", true, "2024-01-01"),
            task("a", false, "2024-01-03"),
            task("b", false, "2024-01-02"),
        ];
        let once = sort_for_display(&tasks);
        let twice = sort_for_display(&once);
        assert_eq!(once, twice);
        // Input order untouched.
        assert_eq!(tasks[0].id, "c");
    }

    #[test]
    fn draft_rejects_empty_title() {
        assert!(TaskDraft::new("  ", ts("2024-06-01")).is_err());
        assert!(Subtask::new("").is_err());
    }

    #[test]
    fn patch_merges_named_fields_only() {
        let t = task("t1", false, "2024-06-01");
        let patch = TaskPatch::default()
            .title("renamed")
            .notes(Some("details".to_string()))
            .completed(true);
        let updated = patch.apply(&t);
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.notes.as_deref(), Some("details"));
        assert!(updated.completed);
        assert_eq!(updated.due_date, t.due_date);

        let cleared = TaskPatch::default().notes(None).apply(&updated);
        assert_eq!(cleared.notes, None);
    }

    #[test]
    fn patch_validation_rejects_empty_strings() {
        assert!(TaskPatch::default().title("").validate().is_err());
        let bad_subtask = Subtask {
            id: "s1".to_string(),
            text: " ".to_string(),
            completed: false,
        };
        assert!(TaskPatch::default()
            .subtasks(vec![bad_subtask])
            .validate()
            .is_err());
        assert!(TaskPatch::default().is_empty());
    }
}
