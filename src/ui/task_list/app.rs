use std::io;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Handle;

use crate::error::Result;
use crate::session::Identity;
use crate::store::{LocalStore, TaskFeed, TaskStore};
use crate::task::{apply_subtask_toggle, sort_for_display, Task, TaskPatch};

use super::view;

const EVENT_POLL_MS: u64 = 120;

pub(crate) struct DeleteConfirmState {
    pub(crate) task_id: String,
    pub(crate) title: String,
}

#[derive(Clone, Copy)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

#[derive(Default, Clone, Copy)]
struct Viewport {
    width: u16,
    height: u16,
}

pub struct AppState {
    pub(crate) tasks: Vec<Task>,
    pub(crate) selected: Option<usize>,
    pub(crate) uid: String,
    pub(crate) today: NaiveDate,
    pub(crate) delete_confirm: Option<DeleteConfirmState>,
    status_message: Option<String>,
    info_message: Option<String>,
    viewport: Viewport,
}

impl AppState {
    fn new(uid: String) -> Self {
        Self {
            tasks: Vec::new(),
            selected: None,
            uid,
            today: Utc::now().date_naive(),
            delete_confirm: None,
            status_message: None,
            info_message: None,
            viewport: Viewport::default(),
        }
    }

    fn update_viewport(&mut self, width: u16, height: u16) {
        self.viewport = Viewport { width, height };
    }

    pub(crate) fn is_narrow(&self) -> bool {
        self.viewport.width > 0 && self.viewport.width < 90
    }

    pub(crate) fn selected_task(&self) -> Option<&Task> {
        self.selected.and_then(|idx| self.tasks.get(idx))
    }

    fn replace_tasks(&mut self, tasks: &[Task]) {
        let previous_id = self.selected_task().map(|task| task.id.clone());
        self.tasks = sort_for_display(tasks);
        self.today = Utc::now().date_naive();
        self.selected = match previous_id {
            Some(id) => self
                .tasks
                .iter()
                .position(|task| task.id == id)
                .or_else(|| (!self.tasks.is_empty()).then_some(0)),
            None => (!self.tasks.is_empty()).then_some(0),
        };
        if self.tasks.is_empty() {
            self.selected = None;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.tasks.is_empty() {
            self.selected = None;
            return;
        }
        let current = self.selected.unwrap_or(0) as isize;
        let max = self.tasks.len() as isize - 1;
        self.selected = Some(current.saturating_add(delta).clamp(0, max) as usize);
    }

    fn set_error(&mut self, message: String) {
        self.status_message = Some(message);
        self.info_message = None;
    }

    fn set_info(&mut self, message: String) {
        self.info_message = Some(message);
        self.status_message = None;
    }

    pub(crate) fn status_line(&self) -> Option<(String, StatusKind)> {
        if let Some(message) = self.status_message.as_ref() {
            return Some((message.clone(), StatusKind::Error));
        }
        if let Some(info) = self.info_message.as_ref() {
            return Some((info.clone(), StatusKind::Info));
        }
        None
    }

    pub(crate) fn footer_hint(&self) -> String {
        if self.delete_confirm.is_some() {
            return "y confirm delete  esc cancel".to_string();
        }
        "j/k move  space toggle  1-9 toggle subtask  d delete  esc/q quit".to_string()
    }

    pub(crate) fn task_count_summary(&self) -> String {
        let done = self.tasks.iter().filter(|task| task.completed).count();
        format!("open: {}  done: {done}", self.tasks.len() - done)
    }
}

struct Mutator<'a> {
    handle: Handle,
    store: &'a LocalStore,
    identity: &'a Identity,
}

impl Mutator<'_> {
    fn toggle_completed(&self, task: &Task) -> Result<Task> {
        let patch = TaskPatch::default().completed(!task.completed);
        self.handle
            .block_on(self.store.update(self.identity, &task.id, patch))
    }

    fn toggle_subtask(&self, task: &Task, position: usize) -> Result<Option<Task>> {
        let Some(subtask) = task.subtasks.get(position) else {
            return Ok(None);
        };
        let updated = apply_subtask_toggle(task, &subtask.id, !subtask.completed)?;
        let patch = TaskPatch::default()
            .subtasks(updated.subtasks.clone())
            .completed(updated.completed);
        self.handle
            .block_on(self.store.update(self.identity, &task.id, patch))
            .map(Some)
    }

    fn delete(&self, task_id: &str) -> Result<()> {
        self.handle
            .block_on(self.store.delete(self.identity, task_id))
    }
}

pub fn run(handle: Handle, store: &LocalStore, identity: &Identity) -> Result<()> {
    let feed = handle.block_on(store.subscribe(identity))?;
    let mutator = Mutator {
        handle,
        store,
        identity,
    };

    let mut app = AppState::new(identity.uid.clone());
    app.replace_tasks(&feed.snapshot().tasks);

    run_terminal(&mut app, feed, &mutator)
}

fn run_terminal(app: &mut AppState, feed: TaskFeed, mutator: &Mutator<'_>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let size = terminal.size()?;
    app.update_viewport(size.width, size.height);

    let result = run_loop(&mut terminal, app, feed, mutator);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    mut feed: TaskFeed,
    mutator: &Mutator<'_>,
) -> Result<()> {
    let mut dirty = true;
    loop {
        if feed.has_changed() {
            let snapshot = feed.latest();
            app.replace_tasks(&snapshot.tasks);
            dirty = true;
        }

        if dirty {
            terminal.draw(|frame| {
                app.update_viewport(frame.size().width, frame.size().height);
                view::render(frame, app);
            })?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_key(app, key, mutator) {
                        break;
                    }
                    dirty = true;
                }
                Event::Resize(width, height) => {
                    app.update_viewport(width, height);
                    dirty = true;
                }
                _ => {}
            }
        }
    }
    feed.cancel();
    Ok(())
}

fn handle_key(app: &mut AppState, key: KeyEvent, mutator: &Mutator<'_>) -> bool {
    if app.delete_confirm.is_some() {
        match key.code {
            KeyCode::Char('y') => {
                let confirm = app.delete_confirm.take();
                if let Some(state) = confirm {
                    match mutator.delete(&state.task_id) {
                        Ok(()) => app.set_info(format!("deleted '{}'", state.title)),
                        Err(err) => app.set_error(format!("delete failed: {err}")),
                    }
                }
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                app.delete_confirm = None;
            }
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::Char('g') | KeyCode::Home => {
            app.selected = (!app.tasks.is_empty()).then_some(0);
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.selected = app.tasks.len().checked_sub(1);
        }
        KeyCode::Char(' ') => {
            if let Some(task) = app.selected_task().cloned() {
                match mutator.toggle_completed(&task) {
                    Ok(updated) => {
                        let state = if updated.completed { "done" } else { "open" };
                        app.set_info(format!("'{}' marked {state}", updated.title));
                    }
                    Err(err) => app.set_error(format!("update failed: {err}")),
                }
            }
        }
        KeyCode::Char('d') => {
            if let Some(task) = app.selected_task() {
                app.delete_confirm = Some(DeleteConfirmState {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                });
            }
        }
        KeyCode::Char(digit @ '1'..='9') => {
            if let Some(task) = app.selected_task().cloned() {
                let position = digit as usize - '1' as usize;
                match mutator.toggle_subtask(&task, position) {
                    Ok(Some(_)) => {}
                    Ok(None) => app.set_info(format!("no subtask {digit}")),
                    Err(err) => app.set_error(format!("update failed: {err}")),
                }
            }
        }
        _ => {}
    }
    false
}
