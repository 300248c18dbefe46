use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::task::{display_status, Task, TaskStatus};

use super::app::{AppState, DeleteConfirmState, StatusKind};

const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_BG_SELECTED: Color = Color::Rgb(52, 56, 60);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_SUCCESS: Color = Color::Rgb(126, 210, 146);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_BORDER_LIST: Color = Color::Rgb(92, 126, 166);
const COLOR_BORDER_DETAIL: Color = Color::Rgb(180, 156, 92);

pub fn render(frame: &mut Frame, app: &mut AppState) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(area);
    let header = chunks[0];
    let main = chunks[1];
    let footer = chunks[2];

    render_header(frame, app, header);

    if app.is_narrow() {
        render_list(frame, app, main);
    } else {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
            .split(main);
        render_list(frame, app, chunks[0]);
        render_detail(frame, app, chunks[1]);
    }

    render_footer(frame, app, footer);

    if let Some(state) = app.delete_confirm.as_ref() {
        render_delete_confirm_modal(frame, area, state);
    }
}

fn render_header(frame: &mut Frame, app: &AppState, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            " taskzen ",
            Style::default()
                .fg(COLOR_INFO)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.uid.clone(), Style::default().fg(COLOR_MUTED)),
        Span::raw("   "),
        Span::styled(app.task_count_summary(), Style::default().fg(COLOR_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Pending => Style::default().fg(COLOR_WARNING),
        TaskStatus::Complete => Style::default().fg(COLOR_SUCCESS),
        TaskStatus::NotComplete => Style::default().fg(COLOR_ERROR),
    }
}

fn task_line(app: &AppState, task: &Task, selected: bool) -> Line<'static> {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let status = display_status(task, app.today);
    let mut spans = vec![
        Span::styled(format!(" {mark} "), Style::default().fg(COLOR_MUTED)),
        Span::styled(
            task.title.clone(),
            if task.completed {
                Style::default()
                    .fg(COLOR_MUTED)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(COLOR_TEXT)
            },
        ),
        Span::styled(
            format!("  due {}", task.due_date.format("%Y-%m-%d")),
            Style::default().fg(COLOR_MUTED),
        ),
        Span::raw("  "),
        Span::styled(status.to_string(), status_style(status)),
    ];
    if !task.subtasks.is_empty() {
        let done = task.subtasks.iter().filter(|st| st.completed).count();
        spans.push(Span::styled(
            format!("  [{done}/{}]", task.subtasks.len()),
            Style::default().fg(COLOR_MUTED),
        ));
    }
    let mut line = Line::from(spans);
    if selected {
        line = line.style(Style::default().bg(COLOR_BG_SELECTED));
    }
    line
}

fn render_list(frame: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default()
        .title("Tasks")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_BORDER_LIST));
    let inner_height = area.height.saturating_sub(2) as usize;

    if app.tasks.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            " no tasks yet",
            Style::default().fg(COLOR_MUTED),
        )))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    // Scroll to keep the selection on screen.
    let selected = app.selected.unwrap_or(0);
    let offset = selected.saturating_sub(inner_height.saturating_sub(1));
    let lines: Vec<Line> = app
        .tasks
        .iter()
        .enumerate()
        .skip(offset)
        .take(inner_height.max(1))
        .map(|(idx, task)| task_line(app, task, Some(idx) == app.selected))
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_detail(frame: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default()
        .title("Detail")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_BORDER_DETAIL));

    let Some(task) = app.selected_task() else {
        frame.render_widget(block, area);
        return;
    };

    let status = display_status(task, app.today);
    let mut lines = vec![
        Line::from(Span::styled(
            task.title.clone(),
            Style::default()
                .fg(COLOR_TEXT)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("status  ", Style::default().fg(COLOR_MUTED)),
            Span::styled(status.to_string(), status_style(status)),
        ]),
        Line::from(vec![
            Span::styled("due     ", Style::default().fg(COLOR_MUTED)),
            Span::styled(
                task.due_date.format("%Y-%m-%d").to_string(),
                Style::default().fg(COLOR_TEXT),
            ),
        ]),
        Line::from(vec![
            Span::styled("id      ", Style::default().fg(COLOR_MUTED)),
            Span::styled(task.id.clone(), Style::default().fg(COLOR_MUTED)),
        ]),
    ];

    if let Some(notes) = task.notes.as_ref() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            notes.clone(),
            Style::default().fg(COLOR_TEXT),
        )));
    }

    if !task.subtasks.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "subtasks",
            Style::default().fg(COLOR_MUTED),
        )));
        for (idx, subtask) in task.subtasks.iter().enumerate() {
            let mark = if subtask.completed { "[x]" } else { "[ ]" };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(" {mark} {}. ", idx + 1),
                    Style::default().fg(COLOR_MUTED),
                ),
                Span::styled(
                    subtask.text.clone(),
                    if subtask.completed {
                        Style::default()
                            .fg(COLOR_MUTED)
                            .add_modifier(Modifier::CROSSED_OUT)
                    } else {
                        Style::default().fg(COLOR_TEXT)
                    },
                ),
            ]));
        }
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_footer(frame: &mut Frame, app: &AppState, area: Rect) {
    let mut lines = Vec::new();
    if let Some((message, kind)) = app.status_line() {
        let style = match kind {
            StatusKind::Error => Style::default().fg(COLOR_ERROR),
            StatusKind::Info => Style::default().fg(COLOR_INFO),
        };
        lines.push(Line::from(Span::styled(format!(" {message}"), style)));
    } else {
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        format!(" {}", app.footer_hint()),
        Style::default().fg(COLOR_MUTED),
    )));
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_delete_confirm_modal(frame: &mut Frame, area: Rect, state: &DeleteConfirmState) {
    let modal = centered_rect(area, 50, 5);
    frame.render_widget(Clear, modal);
    let block = Block::default()
        .title("Delete Task")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(COLOR_ERROR));
    let text = vec![
        Line::from(Span::styled(
            format!("Permanently delete '{}'?", state.title),
            Style::default().fg(COLOR_TEXT),
        )),
        Line::default(),
        Line::from(Span::styled(
            "y confirm  esc cancel",
            Style::default().fg(COLOR_MUTED),
        )),
    ];
    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        modal,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
