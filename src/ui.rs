use crate::commands::{format_due, parse_due};
use crate::config::Config;
use crate::filter::{FilterConfig, FilterState, StatusFilter};
use crate::model::{normalize_tags, Task, TaskInput, Urgency};
use crate::service::{Outcome, TaskService, CLEAR_COMPLETED_PROMPT, DELETE_PROMPT};
use crate::services::Clock;
use crate::stats::Stats;
use crate::storage::{FileStore, StorageError};
use anyhow::Result;
use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

pub fn run(service: TaskService<FileStore>, config: Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(service, config);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    service: TaskService<FileStore>,
    config: Config,
    filter: FilterState,
    view: ViewCache,
    selected: usize,
    scroll_offset: usize,
    last_save: Option<Instant>,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Searching(FieldValue),
    Creating(TaskForm),
    Editing { task_id: String, form: TaskForm },
    ConfirmDelete { task_id: String },
    ConfirmClear,
}

/// The last computed view, valid while the collection snapshot and the
/// filter are unchanged.
struct ViewCache {
    source: Arc<[Task]>,
    filter: FilterConfig,
    tasks: Vec<Task>,
}

impl ViewCache {
    fn is_fresh(&self, source: &Arc<[Task]>, filter: &FilterConfig) -> bool {
        Arc::ptr_eq(&self.source, source) && &self.filter == filter
    }
}

struct TaskForm {
    title: FieldValue,
    description: FieldValue,
    due: FieldValue,
    urgency: Urgency,
    tags: Vec<String>,
    tag_cursor: usize,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Description,
    Due,
    Urgency,
    Tags,
}

enum FormAction {
    Create,
    Edit(String),
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        self.cursor = self.value[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
            .unwrap_or(0);
    }

    fn move_right(&mut self) {
        if let Some(ch) = self.value[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn move_up(&mut self) {
        let (starts, line, col) = line_state(&self.value, self.cursor);
        if line > 0 {
            self.cursor = index_at_col(&self.value, starts[line - 1], col);
        }
    }

    fn move_down(&mut self) {
        let (starts, line, col) = line_state(&self.value, self.cursor);
        if let Some(&next) = starts.get(line + 1) {
            self.cursor = index_at_col(&self.value, next, col);
        }
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let end = self.cursor;
        self.move_left();
        self.value.drain(self.cursor..end);
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(service: TaskService<FileStore>, config: Config) -> Self {
        let status = format!(
            "Loaded {} task(s) from {}",
            service.tasks().len(),
            service.store().backend().dir().display()
        );
        let source = service.tasks();
        let filter = FilterState::default();
        let tasks = service.view(filter.config());
        App {
            view: ViewCache {
                source,
                filter: filter.config().clone(),
                tasks,
            },
            service,
            config,
            filter,
            selected: 0,
            scroll_offset: 0,
            last_save: None,
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.refresh_view();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn refresh_view(&mut self) {
        let source = self.service.tasks();
        if !self.view.is_fresh(&source, self.filter.config()) {
            self.view = ViewCache {
                tasks: self.service.view(self.filter.config()),
                filter: self.filter.config().clone(),
                source,
            };
        }
        self.selected = self.selected.min(self.view.tasks.len().saturating_sub(1));
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::Normal => return self.handle_normal_key(key),
            Mode::Searching(_) => self.handle_search_key(key),
            Mode::Creating(_) | Mode::Editing { .. } => self.handle_form_key(key),
            Mode::ConfirmDelete { .. } | Mode::ConfirmClear => self.handle_confirm_key(key),
        }
        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.view.tasks.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
            KeyCode::Char('n') => {
                let today = self.service.clock().today();
                self.mode = Mode::Creating(TaskForm::new(today, self.config.default_urgency));
                self.status =
                    "Creating new task (Tab/Shift-Tab move, Ctrl+S save, Esc cancel)".into();
            }
            KeyCode::Char('e') | KeyCode::Enter => match self.current_task() {
                Some(task) => {
                    let task_id = task.id.clone();
                    let form = TaskForm::from_task(task);
                    self.status = format!("Editing {}", task_id);
                    self.mode = Mode::Editing { task_id, form };
                }
                None => self.status = "No task selected to edit".into(),
            },
            KeyCode::Char('d') => match self.current_task() {
                Some(task) => {
                    self.mode = Mode::ConfirmDelete {
                        task_id: task.id.clone(),
                    };
                }
                None => self.status = "No task selected to delete".into(),
            },
            KeyCode::Char('C') => {
                if self.service.stats().completed == 0 {
                    self.status = "No completed tasks to clear".into();
                } else {
                    self.mode = Mode::ConfirmClear;
                }
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Searching(FieldValue::new(&self.filter.config().search));
                self.status = "Search (Enter keep, Esc clear)".into();
            }
            KeyCode::Char('s') => {
                self.filter.cycle_status();
                self.selected = 0;
            }
            KeyCode::Char('u') => {
                self.filter.cycle_urgency();
                self.selected = 0;
            }
            KeyCode::Char('t') => {
                self.filter.cycle_tag(&self.config.tags);
                self.selected = 0;
            }
            KeyCode::Char('r') => {
                self.filter.reset();
                self.selected = 0;
                self.status = "Filters cleared".into();
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let Mode::Searching(field) = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.status = "Search applied".into();
                return;
            }
            KeyCode::Esc => {
                self.filter.set_search("");
                self.mode = Mode::Normal;
                self.status = "Search cleared".into();
                return;
            }
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char(c) if !has_command_modifier(&key) => field.insert_char(c),
            _ => return,
        }
        let search = field.value.clone();
        self.filter.set_search(search);
        self.selected = 0;
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close_form = match &mut mode {
            Mode::Creating(form) => self.process_form_key(FormAction::Create, form, key),
            Mode::Editing { task_id, form } => {
                let id = task_id.clone();
                self.process_form_key(FormAction::Edit(id), form, key)
            }
            _ => false,
        };
        self.mode = if close_form { Mode::Normal } else { mode };
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let mode = std::mem::replace(&mut self.mode, Mode::Normal);
                // The dialog already asked, so the gate only records the answer.
                let mut approved = |_: &str| true;
                match mode {
                    Mode::ConfirmDelete { task_id } => {
                        let result = self.service.delete(&task_id, &mut approved);
                        self.after_mutation(result, &task_id);
                    }
                    Mode::ConfirmClear => {
                        let result = self.service.clear_completed(&mut approved);
                        self.after_mutation(result, "");
                    }
                    other => self.mode = other,
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn process_form_key(&mut self, action: FormAction, form: &mut TaskForm, key: KeyEvent) -> bool {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return true;
            }
            KeyCode::Tab => form.next_field(),
            KeyCode::BackTab => form.prev_field(),
            KeyCode::Char('s') if control => return self.try_submit(action, form),
            KeyCode::Enter if control || form.field != FormField::Description => {
                return self.try_submit(action, form);
            }
            _ => match form.field {
                FormField::Urgency => match key.code {
                    KeyCode::Left | KeyCode::Char('h') => form.urgency = form.urgency.prev(),
                    KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
                        form.urgency = form.urgency.next()
                    }
                    _ => {}
                },
                FormField::Tags => {
                    let known = self.config.tags.len();
                    match key.code {
                        KeyCode::Left | KeyCode::Char('h') => {
                            form.tag_cursor = form.tag_cursor.saturating_sub(1)
                        }
                        KeyCode::Right | KeyCode::Char('l') => {
                            if form.tag_cursor + 1 < known {
                                form.tag_cursor += 1;
                            }
                        }
                        KeyCode::Char(' ') => {
                            if let Some(tag) = self.config.tags.get(form.tag_cursor) {
                                form.toggle_tag(tag);
                            }
                        }
                        _ => {}
                    }
                }
                _ => {
                    let field = form.active_text_mut();
                    match key.code {
                        KeyCode::Left => field.move_left(),
                        KeyCode::Right => field.move_right(),
                        KeyCode::Up => field.move_up(),
                        KeyCode::Down => field.move_down(),
                        KeyCode::Enter => field.insert_char('\n'),
                        KeyCode::Backspace => field.backspace(),
                        KeyCode::Char(c) if !has_command_modifier(&key) => field.insert_char(c),
                        _ => {}
                    }
                }
            },
        }
        false
    }

    fn try_submit(&mut self, action: FormAction, form: &TaskForm) -> bool {
        let input = match form.to_input() {
            Ok(input) => input,
            Err(err) => {
                self.status = format!("Could not save: {}", err);
                return false;
            }
        };
        let (result, id) = match action {
            FormAction::Create => (self.service.add(input), String::new()),
            FormAction::Edit(task_id) => {
                let patch = input.into();
                (self.service.edit(&task_id, &patch), task_id)
            }
        };
        if let Ok(Outcome::Rejected(reason)) = &result {
            self.status = format!("Could not save: {}", reason);
            return false;
        }
        self.after_mutation(result, &id);
        true
    }

    fn toggle_selected(&mut self) {
        let Some(id) = self.current_task().map(|t| t.id.clone()) else {
            self.status = "No task selected".into();
            return;
        };
        let result = self.service.toggle(&id);
        self.after_mutation(result, &id);
    }

    fn after_mutation(&mut self, result: Result<Outcome, StorageError>, id: &str) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%err, "saving tasks failed");
                self.status = format!("Save failed: {}", err);
                return;
            }
        };
        let wrote = match &outcome {
            Outcome::Created(_) | Outcome::Updated | Outcome::Toggled { .. } => true,
            Outcome::Removed(n) => *n > 0,
            Outcome::NotFound | Outcome::Declined | Outcome::Rejected(_) => false,
        };
        if wrote {
            self.last_save = Some(Instant::now());
        }
        self.status = match outcome {
            Outcome::Created(new_id) => {
                self.selected = 0;
                format!("Created task {}", new_id)
            }
            Outcome::Updated => format!("Updated {}", id),
            Outcome::Toggled { completed: true } => format!("Completed {}", id),
            Outcome::Toggled { completed: false } => format!("Reopened {}", id),
            Outcome::Removed(0) => "No completed tasks to clear".into(),
            Outcome::Removed(n) if id.is_empty() => format!("Removed {} completed task(s)", n),
            Outcome::Removed(_) => format!("Deleted {}", id),
            Outcome::NotFound => format!("Task {} no longer exists", id),
            Outcome::Declined => "Canceled".into(),
            Outcome::Rejected(reason) => format!("Could not save: {}", reason),
        };
    }

    fn current_task(&self) -> Option<&Task> {
        self.view.tasks.get(self.selected)
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(30)])
            .split(layout[1]);
        let stats = self.service.stats();
        self.draw_sidebar(f, body[0], &stats);
        self.draw_tasks(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(form) => self.draw_form(f, "Create New Task", form),
            Mode::Editing { form, .. } => self.draw_form(f, "Edit Task", form),
            Mode::ConfirmDelete { task_id } => {
                let title = self
                    .service
                    .get(task_id)
                    .map(|t| t.title)
                    .unwrap_or_else(|| task_id.clone());
                self.draw_confirm(f, "Confirm Delete", DELETE_PROMPT, &title);
            }
            Mode::ConfirmClear => {
                let detail = format!("{} completed task(s)", stats.completed);
                self.draw_confirm(f, "Clear Completed", CLEAR_COMPLETED_PROMPT, &detail);
            }
            Mode::Normal | Mode::Searching(_) => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let store = self.service.store();
        let saved = self
            .last_save
            .map(|at| format!("saved {}", format_elapsed(at)))
            .unwrap_or_else(|| "not modified".into());
        let title = Line::from(vec![
            Span::styled(
                "TaskFlow ",
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", store.backend().path_for(store.key()).display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(saved, Style::default().fg(Color::Gray)),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_sidebar(&self, f: &mut ratatui::Frame<'_>, area: Rect, stats: &Stats) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(6)])
            .split(area);

        let stat_lines = vec![
            stat_line("Active", stats.active, Color::LightBlue),
            stat_line("Done", stats.completed, Color::LightGreen),
            stat_line("Overdue", stats.overdue, Color::LightRed),
            stat_line("Total", stats.total, Color::Gray),
        ];
        let block = Block::default()
            .title(Span::styled(
                "Quick Stats",
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(Paragraph::new(stat_lines).block(block), chunks[0]);

        let filter = self.filter.config();
        let search = match &self.mode {
            Mode::Searching(field) => field.with_caret(),
            _ if filter.search.is_empty() => "-".into(),
            _ => filter.search.clone(),
        };
        let filter_lines = vec![
            filter_line("s", "Status", status_label(filter.status)),
            filter_line(
                "u",
                "Urgency",
                filter.urgency.map_or("All Levels", |u| u.label()).to_string(),
            ),
            filter_line(
                "t",
                "Tag",
                filter.tag.clone().unwrap_or_else(|| "All".into()),
            ),
            filter_line("/", "Search", search),
            Line::from(""),
            Line::from(Span::styled(
                "C clear completed",
                Style::default().fg(if stats.completed == 0 {
                    Color::DarkGray
                } else {
                    Color::LightRed
                }),
            )),
        ];
        let heading = if filter.is_default() {
            "Filters"
        } else {
            "Filters (r to reset)"
        };
        let block = Block::default()
            .title(Span::styled(
                heading,
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(
            Paragraph::new(filter_lines)
                .block(block)
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled("Tasks ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("{}", self.view.tasks.len()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled("  sorted by date", Style::default().fg(Color::DarkGray)),
        ]);
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue));

        if self.view.tasks.is_empty() {
            let msg = Paragraph::new(vec![
                Line::from(Span::styled(
                    "No tasks found",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from("Adjust the filters or press n to create a task."),
            ])
            .alignment(Alignment::Center)
            .block(block);
            f.render_widget(msg, area);
            return;
        }

        let today = self.service.clock().today();
        let width = area.width.saturating_sub(2) as usize;
        let items = self
            .view
            .tasks
            .iter()
            .map(|task| task_item(task, today, width))
            .collect::<Vec<_>>();
        let viewport = (area.height.saturating_sub(2) / TASK_ITEM_HEIGHT) as usize;
        self.scroll_offset = adjust_offset(self.selected, self.scroll_offset, viewport, items.len());
        let mut state = ListState::default();
        state.select(Some(self.selected));
        *state.offset_mut() = self.scroll_offset;
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Rgb(30, 41, 59)));
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);
        let status = Paragraph::new(self.status.clone()).wrap(Wrap { trim: true });
        f.render_widget(status, bottom[0]);

        let detail = match self.current_task() {
            Some(task) => selected_task_detail(task),
            None => Line::from("No task selected"),
        };
        f.render_widget(Paragraph::new(detail).wrap(Wrap { trim: true }), bottom[1]);
    }

    fn draw_form(&self, f: &mut ratatui::Frame<'_>, title: &str, form: &TaskForm) {
        let area = centered_rect(70, 70, f.size());
        let mut lines = Vec::new();
        lines.extend(field_lines(
            "Title",
            &form.title,
            form.field == FormField::Title,
        ));
        lines.extend(field_lines(
            "Description",
            &form.description,
            form.field == FormField::Description,
        ));
        lines.extend(field_lines(
            "Due (YYYY-MM-DD)",
            &form.due,
            form.field == FormField::Due,
        ));

        let urgency_active = form.field == FormField::Urgency;
        let mut urgency_spans = vec![Span::styled("Urgency: ", label_style())];
        for urgency in Urgency::ALL {
            let mut style = Style::default().fg(urgency_color(urgency));
            if urgency == form.urgency {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            } else {
                style = style.add_modifier(Modifier::DIM);
            }
            urgency_spans.push(Span::styled(format!(" {} ", urgency), style));
            urgency_spans.push(Span::raw(" "));
        }
        if urgency_active {
            urgency_spans.push(Span::styled("←/→", Style::default().fg(Color::Cyan)));
        }
        lines.push(Line::from(urgency_spans));

        let tags_active = form.field == FormField::Tags;
        let mut tag_spans = vec![Span::styled("Tags: ", label_style())];
        for (idx, tag) in self.config.tags.iter().enumerate() {
            let chosen = form.tags.iter().any(|t| t == tag);
            let mut style = if chosen {
                Style::default().fg(Color::Black).bg(Color::LightBlue)
            } else {
                Style::default().fg(Color::Gray)
            };
            if tags_active && idx == form.tag_cursor {
                style = style.add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
            }
            tag_spans.push(Span::styled(format!(" {} ", tag), style));
            tag_spans.push(Span::raw(" "));
        }
        lines.push(Line::from(tag_spans));
        let extra: Vec<&String> = form
            .tags
            .iter()
            .filter(|t| !self.config.is_known_tag(t))
            .collect();
        if !extra.is_empty() {
            lines.push(Line::from(Span::styled(
                format!(
                    "      also: {}",
                    extra.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
                ),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Ctrl+S or Enter to save • Esc to cancel • Tab/Shift-Tab to move • Space toggles a tag",
            Style::default().fg(Color::Gray),
        )));

        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, title: &str, prompt: &str, detail: &str) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from(Span::styled(
                prompt.to_string(),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("\"{}\"", detail)),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

impl TaskForm {
    fn new(today: NaiveDate, urgency: Urgency) -> Self {
        TaskForm {
            title: FieldValue::new(""),
            description: FieldValue::new(""),
            due: FieldValue::new(&today.format("%Y-%m-%d").to_string()),
            urgency,
            tags: Vec::new(),
            tag_cursor: 0,
            field: FormField::Title,
        }
    }

    fn from_task(task: &Task) -> Self {
        TaskForm {
            title: FieldValue::new(&task.title),
            description: FieldValue::new(&task.description),
            due: FieldValue::new(&task.due_date.format("%Y-%m-%d").to_string()),
            urgency: task.urgency,
            tags: task.tags.clone(),
            tag_cursor: 0,
            field: FormField::Title,
        }
    }

    fn to_input(&self) -> Result<TaskInput> {
        Ok(TaskInput {
            title: self.title.value.clone(),
            description: self.description.value.clone(),
            due_date: parse_due(&self.due.value)?,
            urgency: self.urgency,
            tags: normalize_tags(&self.tags),
        })
    }

    fn toggle_tag(&mut self, tag: &str) {
        if let Some(idx) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(idx);
        } else {
            self.tags.push(tag.to_string());
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Due,
            FormField::Due => FormField::Urgency,
            FormField::Urgency => FormField::Tags,
            FormField::Tags => FormField::Title,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Tags,
            FormField::Description => FormField::Title,
            FormField::Due => FormField::Description,
            FormField::Urgency => FormField::Due,
            FormField::Tags => FormField::Urgency,
        };
    }

    // Urgency and Tags are pickers; every other field is free text.
    fn active_text_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Description => &mut self.description,
            FormField::Due => &mut self.due,
            _ => &mut self.title,
        }
    }
}

const TASK_ITEM_HEIGHT: u16 = 3;

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn has_command_modifier(key: &KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

/// Keeps `selected` inside a window of `viewport` rows starting at the offset.
fn adjust_offset(selected: usize, current_offset: usize, viewport: usize, len: usize) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let mut offset = current_offset.min(max_offset);
    if selected < offset {
        offset = selected;
    } else if selected >= offset + viewport {
        offset = selected + 1 - viewport;
    }
    offset.min(max_offset)
}

// Returns (line start byte offsets, line index of cursor, column in chars).
fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    starts.extend(
        text.char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(idx, _)| idx + 1),
    );
    let line = starts.iter().rposition(|start| *start <= cursor).unwrap_or(0);
    let col = text[starts[line]..cursor].chars().count();
    (starts, line, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    slice[..limit]
        .char_indices()
        .nth(target_col)
        .map(|(idx, _)| start + idx)
        .unwrap_or(start + limit)
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&"...".chars().take(max - keep).collect::<String>());
    out
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

fn urgency_color(urgency: Urgency) -> Color {
    match urgency {
        Urgency::Low => Color::LightBlue,
        Urgency::Medium => Color::LightYellow,
        Urgency::High => Color::Rgb(251, 146, 60),
        Urgency::Critical => Color::LightRed,
    }
}

fn status_label(status: StatusFilter) -> String {
    match status {
        StatusFilter::All => "All",
        StatusFilter::Active => "Active",
        StatusFilter::Completed => "Completed",
    }
    .to_string()
}

fn label_style() -> Style {
    Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM)
}

fn stat_line(label: &str, count: usize, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{:>4} ", count),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(label.to_string(), Style::default().fg(color)),
    ])
}

fn filter_line(key: &str, label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{} ", key), Style::default().fg(Color::LightCyan)),
        Span::styled(format!("{:<8}", label), label_style()),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}

fn footer_help_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("↑↓ / j k", Style::default().fg(Color::LightCyan)),
        Span::raw(" move  "),
        Span::styled("space", Style::default().fg(Color::LightGreen)),
        Span::raw(" done  "),
        Span::styled("n", Style::default().fg(Color::LightMagenta)),
        Span::raw(" new  "),
        Span::styled("e", Style::default().fg(Color::LightYellow)),
        Span::raw(" edit  "),
        Span::styled("d", Style::default().fg(Color::LightRed)),
        Span::raw(" delete  "),
        Span::styled("s u t /", Style::default().fg(Color::LightCyan)),
        Span::raw(" filter  "),
        Span::styled("r", Style::default().fg(Color::LightCyan)),
        Span::raw(" reset  "),
        Span::styled("q", Style::default().fg(Color::LightRed)),
        Span::raw(" quit"),
    ])
}

fn task_item(task: &Task, today: NaiveDate, width: usize) -> ListItem<'static> {
    let overdue = task.is_overdue(today);
    let check = if task.completed { "[x] " } else { "[ ] " };
    let title_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let title = Line::from(vec![
        Span::styled(
            check,
            Style::default().fg(if task.completed {
                Color::LightGreen
            } else {
                Color::Gray
            }),
        ),
        Span::styled(truncate_text(&task.title, width.saturating_sub(4)), title_style),
    ]);
    let description = Line::from(Span::styled(
        format!(
            "    {}",
            truncate_text(
                task.description.lines().next().unwrap_or_default(),
                width.saturating_sub(4)
            )
        ),
        Style::default().fg(Color::Gray),
    ));
    let mut meta = vec![
        Span::raw("    "),
        Span::styled(
            format!(" {} ", task.urgency),
            Style::default()
                .fg(urgency_color(task.urgency))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format_due(task.due_date),
            Style::default().fg(if overdue { Color::LightRed } else { Color::Gray }),
        ),
    ];
    if overdue {
        meta.push(Span::styled(
            " (overdue)",
            Style::default().fg(Color::LightRed),
        ));
    }
    if !task.tags.is_empty() {
        meta.push(Span::raw("  "));
        meta.push(Span::styled(
            task.tags
                .iter()
                .map(|t| t.to_uppercase())
                .collect::<Vec<_>>()
                .join(" "),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    ListItem::new(vec![title, description, Line::from(meta)])
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style(),
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn selected_task_detail(task: &Task) -> Line<'static> {
    let mut spans = vec![Span::styled(
        task.title.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::styled(
        format!("  [{}]", task.id),
        Style::default().fg(Color::DarkGray),
    ));
    if !task.tags.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("#{}", task.tags.join(" #")),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if !task.description.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            task.description.replace('\n', " "),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_editing_respects_multibyte_chars() {
        let mut field = FieldValue::new("née");
        field.backspace();
        assert_eq!(field.value, "né");
        field.move_left();
        field.insert_char('a');
        assert_eq!(field.value, "naé");
        field.move_right();
        field.move_right();
        assert_eq!(field.cursor, field.value.len());
    }

    #[test]
    fn vertical_moves_keep_the_column() {
        let mut field = FieldValue::new("abcdef\nxy\nlonger line");
        field.move_up();
        assert_eq!(&field.value[..field.cursor], "abcdef\nxy");
        field.move_up();
        assert_eq!(&field.value[..field.cursor], "ab");
        field.move_down();
        field.move_down();
        assert_eq!(&field.value[..field.cursor], "abcdef\nxy\nlo");
    }

    #[test]
    fn offset_follows_the_selection() {
        assert_eq!(adjust_offset(0, 0, 5, 20), 0);
        assert_eq!(adjust_offset(7, 0, 5, 20), 3);
        assert_eq!(adjust_offset(2, 3, 5, 20), 2);
        assert_eq!(adjust_offset(19, 0, 5, 20), 15);
        assert_eq!(adjust_offset(3, 10, 5, 4), 0);
    }

    #[test]
    fn truncation_marks_cut_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a long title here", 8), "a lon...");
        assert_eq!(truncate_text("abc", 2), "..");
    }

    #[test]
    fn form_round_trips_a_task_and_toggles_tags() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let mut form = TaskForm::new(today, Urgency::Medium);
        assert_eq!(form.due.value, "2024-05-06");
        form.title = FieldValue::new("Plan trip");
        form.toggle_tag("Personal");
        form.toggle_tag("Ideas");
        form.toggle_tag("Personal");
        let input = form.to_input().unwrap();
        assert_eq!(input.due_date, today);
        assert_eq!(input.urgency, Urgency::Medium);
        assert_eq!(input.tags, vec!["Ideas"]);

        form.due = FieldValue::new("next week");
        assert!(form.to_input().is_err());
    }

    #[test]
    fn form_field_cycle_visits_every_field() {
        let mut form = TaskForm::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), Urgency::Low);
        let mut seen = Vec::new();
        for _ in 0..5 {
            form.next_field();
            seen.push(form.field);
        }
        assert!(seen[4] == FormField::Title);
        form.prev_field();
        assert!(form.field == FormField::Tags);
    }
}
