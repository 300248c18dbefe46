//! tz task command implementations.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::cli::{open_context, AppContext};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::session::Identity;
use crate::store::{LocalStore, TaskStore};
use crate::task::{
    apply_subtask_toggle, display_status, sort_for_display, Subtask, Task, TaskDraft, TaskPatch,
    TaskStatus,
};

pub struct AddOptions {
    pub config: Option<PathBuf>,
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<String>,
    pub subtasks: Vec<String>,
}

pub struct EditOptions {
    pub config: Option<PathBuf>,
    pub id: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due: Option<String>,
    pub add_subtasks: Vec<String>,
    pub remove_subtasks: Vec<String>,
}

#[derive(Serialize)]
struct SubtaskView {
    id: String,
    text: String,
    completed: bool,
}

#[derive(Serialize)]
pub(crate) struct TaskView {
    id: String,
    title: String,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    due_date: DateTime<Utc>,
    completed: bool,
    subtasks: Vec<SubtaskView>,
    created_at: DateTime<Utc>,
}

fn view(task: &Task, today: NaiveDate) -> TaskView {
    TaskView {
        id: task.id.clone(),
        title: task.title.clone(),
        status: display_status(task, today),
        notes: task.notes.clone(),
        due_date: task.due_date,
        completed: task.completed,
        subtasks: task
            .subtasks
            .iter()
            .map(|st| SubtaskView {
                id: st.id.clone(),
                text: st.text.clone(),
                completed: st.completed,
            })
            .collect(),
        created_at: task.created_at,
    }
}

fn describe(task: &Task, today: NaiveDate) -> String {
    let mark = if task.completed { "x" } else { " " };
    let short_id: String = task.id.chars().take(8).collect();
    let mut line = format!(
        "[{mark}] {short_id}  {}  (due {}, {})",
        task.title,
        task.due_date.format("%Y-%m-%d"),
        display_status(task, today)
    );
    if !task.subtasks.is_empty() {
        let done = task.subtasks.iter().filter(|st| st.completed).count();
        line.push_str(&format!(" [{done}/{} subtasks]", task.subtasks.len()));
    }
    line
}

fn require_identity(ctx: &AppContext) -> Result<Identity> {
    ctx.gate.identity().cloned()
}

/// Resolve "today"/"tomorrow" or a YYYY-MM-DD date to midnight UTC.
fn parse_due(raw: &str) -> Result<DateTime<Utc>> {
    let date = match raw.trim() {
        "today" => Utc::now().date_naive(),
        "tomorrow" => Utc::now().date_naive() + Duration::days(1),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
            Error::InvalidArgument(format!(
                "invalid due date '{other}' (expected YYYY-MM-DD, today, or tomorrow)"
            ))
        })?,
    };
    midnight_utc(date)
}

fn midnight_utc(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::InvalidArgument(format!("invalid date {date}")))
}

fn default_due() -> Result<DateTime<Utc>> {
    midnight_utc(Utc::now().date_naive() + Duration::days(1))
}

/// Find a task by exact id or unique id prefix.
fn resolve_task<'a>(tasks: &'a [Task], selector: &str) -> Result<&'a Task> {
    if let Some(task) = tasks.iter().find(|task| task.id == selector) {
        return Ok(task);
    }
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.id.starts_with(selector))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task),
        [] => Err(Error::TaskNotFound(selector.to_string())),
        _ => Err(Error::InvalidArgument(format!(
            "task id '{selector}' is ambiguous ({} matches)",
            matches.len()
        ))),
    }
}

/// Find a subtask by id, id prefix, or 1-based position.
fn resolve_subtask(task: &Task, selector: &str) -> Result<String> {
    if let Some(st) = task.subtasks.iter().find(|st| st.id == selector) {
        return Ok(st.id.clone());
    }
    if let Ok(position) = selector.parse::<usize>() {
        if position >= 1 && position <= task.subtasks.len() {
            return Ok(task.subtasks[position - 1].id.clone());
        }
    }
    let matches: Vec<&Subtask> = task
        .subtasks
        .iter()
        .filter(|st| st.id.starts_with(selector))
        .collect();
    match matches.as_slice() {
        [st] => Ok(st.id.clone()),
        [] => Err(Error::SubtaskNotFound {
            task: task.id.clone(),
            subtask: selector.to_string(),
        }),
        _ => Err(Error::InvalidArgument(format!(
            "subtask id '{selector}' is ambiguous ({} matches)",
            matches.len()
        ))),
    }
}

fn base_human(ctx: &AppContext, header: impl Into<String>) -> HumanOutput {
    let mut human = HumanOutput::new(header);
    for warning in &ctx.warnings {
        human.push_warning(warning.clone());
    }
    human
}

pub async fn add(opts: AddOptions, options: OutputOptions) -> Result<()> {
    let ctx = open_context(opts.config.as_deref())?;
    let identity = require_identity(&ctx)?;

    let due = match opts.due.as_deref() {
        Some(raw) => parse_due(raw)?,
        None => default_due()?,
    };
    let mut draft = TaskDraft::new(opts.title, due)?;
    if let Some(notes) = opts.notes {
        draft = draft.with_notes(notes);
    }
    let subtasks = opts
        .subtasks
        .into_iter()
        .map(Subtask::new)
        .collect::<Result<Vec<_>>>()?;
    draft = draft.with_subtasks(subtasks);

    let task = ctx.store.create(&identity, draft).await?;

    let today = Utc::now().date_naive();
    let mut human = base_human(&ctx, format!("Created task {}", task.id));
    human.push_summary("title", task.title.clone());
    human.push_summary("due", task.due_date.format("%Y-%m-%d").to_string());
    if !task.subtasks.is_empty() {
        human.push_summary("subtasks", task.subtasks.len().to_string());
    }
    emit_success(options, "add", &view(&task, today), Some(&human))
}

pub async fn list(config: Option<&Path>, options: OutputOptions) -> Result<()> {
    let ctx = open_context(config)?;
    let identity = require_identity(&ctx)?;

    let tasks = sort_for_display(&ctx.store.load(&identity)?);
    let today = Utc::now().date_naive();
    let views: Vec<TaskView> = tasks.iter().map(|task| view(task, today)).collect();

    let mut human = base_human(
        &ctx,
        format!("{} task(s) for {}", tasks.len(), identity.uid),
    );
    for task in &tasks {
        human.push_detail(describe(task, today));
    }
    if tasks.is_empty() {
        human.push_next_step("tz add \"My first task\"".to_string());
    }
    emit_success(options, "list", &views, Some(&human))
}

pub async fn edit(opts: EditOptions, options: OutputOptions) -> Result<()> {
    let ctx = open_context(opts.config.as_deref())?;
    let identity = require_identity(&ctx)?;
    let tasks = ctx.store.load(&identity)?;
    let task = resolve_task(&tasks, &opts.id)?;

    let mut patch = TaskPatch::default();
    if let Some(title) = opts.title {
        patch = patch.title(title);
    }
    if let Some(notes) = opts.notes {
        patch = patch.notes(if notes.is_empty() { None } else { Some(notes) });
    }
    if let Some(due) = opts.due.as_deref() {
        patch = patch.due_date(parse_due(due)?);
    }
    if !opts.add_subtasks.is_empty() || !opts.remove_subtasks.is_empty() {
        let mut subtasks = task.subtasks.clone();
        for selector in &opts.remove_subtasks {
            let id = resolve_subtask(task, selector)?;
            subtasks.retain(|st| st.id != id);
        }
        for text in opts.add_subtasks {
            subtasks.push(Subtask::new(text)?);
        }
        patch = patch.subtasks(subtasks);
    }
    if patch.is_empty() {
        return Err(Error::InvalidArgument("nothing to change".to_string()));
    }

    let updated = ctx.store.update(&identity, &task.id, patch).await?;

    let today = Utc::now().date_naive();
    let mut human = base_human(&ctx, format!("Updated task {}", updated.id));
    human.push_detail(describe(&updated, today));
    emit_success(options, "edit", &view(&updated, today), Some(&human))
}

pub async fn set_completed(
    config: Option<&Path>,
    selector: &str,
    completed: bool,
    options: OutputOptions,
) -> Result<()> {
    let ctx = open_context(config)?;
    let identity = require_identity(&ctx)?;
    let tasks = ctx.store.load(&identity)?;
    let task = resolve_task(&tasks, selector)?;

    // Direct toggle: never cascades down to subtasks.
    let patch = TaskPatch::default().completed(completed);
    let updated = ctx.store.update(&identity, &task.id, patch).await?;

    let today = Utc::now().date_naive();
    let header = if completed {
        format!("Completed task {}", updated.id)
    } else {
        format!("Reopened task {}", updated.id)
    };
    let mut human = base_human(&ctx, header);
    human.push_detail(describe(&updated, today));
    let command = if completed { "done" } else { "undone" };
    emit_success(options, command, &view(&updated, today), Some(&human))
}

pub async fn set_subtask(
    config: Option<&Path>,
    selector: &str,
    subtask_selector: &str,
    completed: bool,
    options: OutputOptions,
) -> Result<()> {
    let ctx = open_context(config)?;
    let identity = require_identity(&ctx)?;
    let tasks = ctx.store.load(&identity)?;
    let task = resolve_task(&tasks, selector)?;
    let subtask_id = resolve_subtask(task, subtask_selector)?;

    // Roll the subtask state up into the parent, then persist both.
    let updated = apply_subtask_toggle(task, &subtask_id, completed)?;
    let patch = TaskPatch::default()
        .subtasks(updated.subtasks.clone())
        .completed(updated.completed);
    let stored = ctx.store.update(&identity, &task.id, patch).await?;

    let today = Utc::now().date_naive();
    let header = if completed { "Checked" } else { "Unchecked" };
    let mut human = base_human(&ctx, format!("{header} subtask on {}", stored.id));
    human.push_detail(describe(&stored, today));
    let command = if completed { "check" } else { "uncheck" };
    emit_success(options, command, &view(&stored, today), Some(&human))
}

#[derive(Serialize)]
struct DeleteResult<'a> {
    id: &'a str,
    deleted: bool,
}

pub async fn rm(
    config: Option<&Path>,
    selector: &str,
    yes: bool,
    options: OutputOptions,
) -> Result<()> {
    let ctx = open_context(config)?;
    let identity = require_identity(&ctx)?;
    let tasks = ctx.store.load(&identity)?;

    let task = match resolve_task(&tasks, selector) {
        Ok(task) => task.clone(),
        Err(Error::TaskNotFound(_)) => {
            // Already gone: deletion is idempotent.
            ctx.store.delete(&identity, selector).await?;
            let human = base_human(&ctx, format!("Task {selector} was already deleted"));
            return emit_success(
                options,
                "rm",
                &DeleteResult {
                    id: selector,
                    deleted: true,
                },
                Some(&human),
            );
        }
        Err(err) => return Err(err),
    };

    if !yes && !confirm_delete(&task)? {
        let human = base_human(&ctx, "Aborted");
        return emit_success(
            options,
            "rm",
            &DeleteResult {
                id: &task.id,
                deleted: false,
            },
            Some(&human),
        );
    }

    ctx.store.delete(&identity, &task.id).await?;

    let human = base_human(&ctx, format!("Deleted task {} ({})", task.id, task.title));
    emit_success(
        options,
        "rm",
        &DeleteResult {
            id: &task.id,
            deleted: true,
        },
        Some(&human),
    )
}

/// Interactive delete confirmation; deletion is irreversible.
fn confirm_delete(task: &Task) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(Error::InvalidArgument(
            "refusing to delete without confirmation; pass --yes".to_string(),
        ));
    }
    eprint!(
        "Permanently delete task '{}' and all of its data? [y/N] ",
        task.title
    );
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn watch(config: Option<&Path>) -> Result<()> {
    let ctx = open_context(config)?;
    let identity = require_identity(&ctx)?;
    let store: &LocalStore = &ctx.store;

    tokio::task::block_in_place(|| {
        crate::ui::task_list::run(tokio::runtime::Handle::current(), store, &identity)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task_with_id(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            notes: None,
            due_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("ts"),
            completed: false,
            subtasks: Vec::new(),
            owner_id: "u1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parse_due_accepts_iso_dates() {
        let due = parse_due("2026-03-15").expect("parse");
        assert_eq!(due.format("%Y-%m-%d %H:%M").to_string(), "2026-03-15 00:00");
    }

    #[test]
    fn parse_due_rejects_garbage() {
        assert!(matches!(
            parse_due("next tuesday"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_task_by_unique_prefix() {
        let tasks = vec![task_with_id("abc-1"), task_with_id("def-2")];
        assert_eq!(resolve_task(&tasks, "ab").expect("resolve").id, "abc-1");
    }

    #[test]
    fn resolve_task_ambiguous_prefix_is_an_error() {
        let tasks = vec![task_with_id("abc-1"), task_with_id("abd-2")];
        assert!(matches!(
            resolve_task(&tasks, "ab"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_task_unknown_id() {
        let tasks = vec![task_with_id("abc-1")];
        assert!(matches!(
            resolve_task(&tasks, "zzz"),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn resolve_subtask_by_position() {
        let mut task = task_with_id("abc-1");
        task.subtasks = vec![
            Subtask::new("first").expect("subtask"),
            Subtask::new("second").expect("subtask"),
        ];
        let id = resolve_subtask(&task, "2").expect("resolve");
        assert_eq!(id, task.subtasks[1].id);
    }

    #[test]
    fn resolve_subtask_ambiguous_prefix_is_an_error() {
        let mut task = task_with_id("abc-1");
        let mut first = Subtask::new("first").expect("subtask");
        first.id = "sub-aa1".to_string();
        let mut second = Subtask::new("second").expect("subtask");
        second.id = "sub-aa2".to_string();
        task.subtasks = vec![first, second];
        assert!(matches!(
            resolve_subtask(&task, "sub-aa"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_subtask_unknown_selector() {
        let task = task_with_id("abc-1");
        assert!(matches!(
            resolve_subtask(&task, "9"),
            Err(Error::SubtaskNotFound { .. })
        ));
    }
}
