//! Status board interface.
//!
//! A kanban-style board where a property's tasks are organised into
//! columns by status, with the derived overdue classification getting its
//! own column. Cards advance through the status state machine with
//! keyboard shortcuts; transitions the machine rejects are refused with a
//! status-bar message.

use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::dates::format_due_relative;
use crate::fields::Status;
use crate::store::{format_category, format_priority, format_status, FileStore, TaskStore};
use crate::task::Task;
use crate::tui::colors::{DARK_GREEN, DARK_RED, GOLD, SLATE};

const COLUMN_COUNT: usize = 5;
const COLUMN_STATUSES: [Status; COLUMN_COUNT] = [
    Status::Pending,
    Status::InProgress,
    Status::Overdue,
    Status::Completed,
    Status::Cancelled,
];

/// Main board application state
pub struct BoardApp {
    store: TaskStore<FileStore>,
    property: String,
    today: NaiveDate,
    tasks: Vec<Task>,
    selected_column: usize, // Current status column (0-4)
    selected_card: usize,   // Selected card within the column
    column_scroll_offsets: [usize; COLUMN_COUNT],
    status_message: String,
    show_task_detail: bool,
    filter_active: bool,
    filter_text: String,

    // Task indices organised by status column
    columns: [Vec<usize>; COLUMN_COUNT],
}

impl BoardApp {
    /// Create a new BoardApp for one property
    pub fn new(db_path: &Path, property: &str) -> io::Result<Self> {
        let store = TaskStore::new(FileStore::load(db_path));
        let mut app = BoardApp {
            store,
            property: property.to_string(),
            today: Local::now().date_naive(),
            tasks: Vec::new(),
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; COLUMN_COUNT],
            status_message: String::new(),
            show_task_detail: false,
            filter_active: false,
            filter_text: String::new(),
            columns: Default::default(),
        };
        app.refresh();
        Ok(app)
    }

    /// Column accent color by status
    fn column_color(column: usize) -> Color {
        match COLUMN_STATUSES[column] {
            Status::Pending => Color::Blue,
            Status::InProgress => GOLD,
            Status::Overdue => DARK_RED,
            Status::Completed => DARK_GREEN,
            Status::Cancelled => SLATE,
        }
    }

    fn column_titles() -> [&'static str; COLUMN_COUNT] {
        ["Pending", "In Progress", "Overdue", "Completed", "Cancelled"]
    }

    /// Reload tasks from the store and rebuild the columns
    fn refresh(&mut self) {
        self.tasks = self.store.list_property_tasks(&self.property);
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.clear();
            self.column_scroll_offsets[i] = 0;
        }

        for (index, task) in self.tasks.iter().enumerate() {
            // Apply text filter if active
            if !self.filter_text.is_empty() {
                let filter_lower = self.filter_text.to_lowercase();
                let title_matches = task.title.to_lowercase().contains(&filter_lower);
                let assignee_matches = task
                    .assigned_to
                    .iter()
                    .any(|u| u.to_lowercase().contains(&filter_lower));
                let category_matches =
                    format_category(task.category).contains(&filter_lower);
                if !title_matches && !assignee_matches && !category_matches {
                    continue;
                }
            }

            let column_index = match task.effective_status(self.today) {
                Status::Pending => 0,
                Status::InProgress => 1,
                Status::Overdue => 2,
                Status::Completed => 3,
                Status::Cancelled => 4,
            };
            self.columns[column_index].push(index);
        }

        self.clamp_selection();
    }

    /// Ensure selected column and card indices are valid
    fn clamp_selection(&mut self) {
        if self.selected_column >= COLUMN_COUNT {
            self.selected_column = 0;
        }
        let column_len = self.columns[self.selected_column].len();
        if column_len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    fn selected_task(&self) -> Option<&Task> {
        self.columns[self.selected_column]
            .get(self.selected_card)
            .map(|&i| &self.tasks[i])
    }

    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Move the selected task to `target` through the state machine,
    /// persist, and keep the card selected in its new column.
    fn transition_selected(&mut self, target: Status) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let mut task = task.clone();
        if !task.status.can_transition(target) {
            self.set_status_message(format!(
                "Cannot move {} task to {}",
                format_status(task.status),
                format_status(target)
            ));
            return;
        }

        let task_id = task.id.clone();
        let now = Utc::now();
        task.status = target;
        if target == Status::Completed {
            task.completed_at = Some(now);
        }

        if let Err(e) = self.store.save_task(&mut task, now) {
            self.set_status_message(format!("Error saving: {}", e));
            return;
        }
        if let Err(e) = self.store.kv().save() {
            self.set_status_message(format!("Error saving: {}", e));
            return;
        }
        self.refresh();
        self.set_status_message(format!("Moved task to {}", format_status(target)));

        // Follow the card into its new column.
        if let Some(column) = COLUMN_STATUSES.iter().position(|&s| s == target) {
            if let Some(position) = self.columns[column]
                .iter()
                .position(|&i| self.tasks[i].id == task_id)
            {
                self.selected_column = column;
                self.selected_card = position;
            }
        }
        self.clamp_selection();
    }

    /// Advance the selected task one step: pending work starts, started
    /// work completes.
    fn advance_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let target = match task.status {
            Status::Pending | Status::Overdue => Status::InProgress,
            Status::InProgress => Status::Completed,
            Status::Completed | Status::Cancelled => {
                self.set_status_message("Task is already closed".to_string());
                return;
            }
        };
        self.transition_selected(target);
    }

    /// Handle keyboard input
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                // Handle filter mode input
                if self.filter_active {
                    match key.code {
                        KeyCode::Esc => {
                            self.filter_active = false;
                            self.filter_text.clear();
                            self.refresh();
                            self.clear_status_message();
                        }
                        KeyCode::Enter => {
                            self.filter_active = false;
                            if self.filter_text.is_empty() {
                                self.set_status_message("Filter cleared".to_string());
                            } else {
                                let total: usize =
                                    self.columns.iter().map(|col| col.len()).sum();
                                self.set_status_message(format!(
                                    "Filter: '{}' ({} tasks shown)",
                                    self.filter_text, total
                                ));
                            }
                        }
                        KeyCode::Backspace => {
                            if !self.filter_text.is_empty() {
                                self.filter_text.pop();
                                self.refresh();
                            }
                        }
                        KeyCode::Char(c) => {
                            self.filter_text.push(c);
                            self.refresh();
                        }
                        _ => {}
                    }
                    return Ok(false);
                }

                self.clear_status_message();

                match key.code {
                    KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(true)
                    }
                    KeyCode::Esc | KeyCode::Char('q') => return Ok(true),

                    // Task detail popup
                    KeyCode::Enter => {
                        self.show_task_detail = !self.show_task_detail;
                    }

                    // Advance the card through the state machine
                    KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.advance_selected();
                    }

                    // Column navigation
                    KeyCode::Left => {
                        if self.selected_column > 0 {
                            self.selected_column -= 1;
                            self.clamp_selection();
                        }
                    }
                    KeyCode::Right => {
                        if self.selected_column < COLUMN_COUNT - 1 {
                            self.selected_column += 1;
                            self.clamp_selection();
                        }
                    }

                    // Card navigation within column
                    KeyCode::Up => {
                        if self.selected_card > 0 {
                            self.selected_card -= 1;
                        }
                    }
                    KeyCode::Down => {
                        let column_len = self.columns[self.selected_column].len();
                        if column_len > 0 && self.selected_card < column_len - 1 {
                            self.selected_card += 1;
                        }
                    }

                    // Complete / cancel the selected task
                    KeyCode::Char('c') => {
                        self.transition_selected(Status::Completed);
                    }
                    KeyCode::Char('x') => {
                        self.transition_selected(Status::Cancelled);
                    }

                    // Reload from disk
                    KeyCode::Char('r') => {
                        self.today = Local::now().date_naive();
                        self.refresh();
                        self.set_status_message("Reloaded".to_string());
                    }

                    // Filter mode
                    KeyCode::Char('/') => {
                        self.filter_active = true;
                        self.set_status_message(
                            "Filter: type to search title/assignee/category, Enter to apply, Esc to cancel"
                                .to_string(),
                        );
                    }

                    // Help
                    KeyCode::Char('h') => {
                        self.set_status_message(
                            "Help: Enter: Details | Ctrl-Right: Advance | c: Complete | x: Cancel | /: Filter | r: Reload | q: Quit"
                                .to_string(),
                        );
                    }

                    _ => {}
                }
            }
        }
        Ok(false)
    }

    /// Render the board
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    /// Render the header
    fn render_header(&self, f: &mut Frame, area: Rect) {
        let open: usize = self.columns[..3].iter().map(|c| c.len()).sum();
        let overdue = self.columns[2].len();
        let header_text = vec![Line::from(vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!(
                    "Property: {}  Open: {}  Overdue: {}",
                    self.property, open, overdue
                ),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    /// Render the board columns
    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let constraints: Vec<Constraint> = (0..COLUMN_COUNT)
            .map(|_| Constraint::Percentage(100 / COLUMN_COUNT as u16))
            .collect();

        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let titles = Self::column_titles();
        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, i, titles[i]);
        }
    }

    /// Render a single column
    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize, title: &str) {
        let is_selected = column_index == self.selected_column;
        let accent = Self::column_color(column_index);

        let border_style = if is_selected {
            Style::default().fg(accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", title, self.columns[column_index].len()))
            .border_style(border_style);

        let inner = block.inner(area);
        f.render_widget(block, area);

        let cards = &self.columns[column_index];
        if cards.is_empty() {
            return;
        }

        let card_height = 5;
        let available_height = inner.height as usize;
        let visible_cards = available_height / card_height;

        // Keep the selected card inside the visible window.
        let scroll_offset = if is_selected {
            let start_visible = self.column_scroll_offsets[column_index];
            let end_visible = start_visible + visible_cards;
            if self.selected_card < start_visible {
                self.column_scroll_offsets[column_index] = self.selected_card;
                self.selected_card
            } else if self.selected_card >= end_visible && end_visible > 0 {
                let new_offset = self.selected_card - visible_cards + 1;
                self.column_scroll_offsets[column_index] = new_offset;
                new_offset
            } else {
                start_visible
            }
        } else {
            self.column_scroll_offsets[column_index]
        };

        let mut current_y = 0;
        let mut rendered_cards = 0;

        for (card_index, &task_index) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + card_height > available_height {
                break;
            }
            let task = &self.tasks[task_index];
            let is_this_card_selected = is_selected && card_index == self.selected_card;

            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: card_height as u16,
            };
            render_card(f, card_area, task, self.today, accent, is_this_card_selected);

            current_y += card_height;
            rendered_cards += 1;
        }

        // Scroll indicators
        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{} above", scroll_offset))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    x: inner.x,
                    y: inner.y,
                    width: inner.width,
                    height: 1,
                },
            );
        }
        let remaining = cards.len() - scroll_offset - rendered_cards;
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{} below", remaining))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    x: inner.x,
                    y: inner.y + inner.height - 1,
                    width: inner.width,
                    height: 1,
                },
            );
        }
    }

    /// Render the status bar
    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if self.filter_active {
            format!(
                "Filter: {} | Type to search, Enter to apply, Esc to cancel",
                self.filter_text
            )
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let total: usize = self.columns.iter().map(|col| col.len()).sum();
            let filter_indicator = if !self.filter_text.is_empty() {
                format!(" [Filter: {}]", self.filter_text)
            } else {
                String::new()
            };
            format!(
                "Tasks: {}{} | Ctrl-Right: Advance | c: Complete | x: Cancel | /: Filter | h: Help",
                total, filter_indicator
            )
        };

        let accent = Self::column_color(self.selected_column);
        let text_color = match accent {
            GOLD => Color::Rgb(20, 20, 20),
            _ => Color::White,
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(accent).fg(text_color))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Render the task detail popup
    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task() else {
            return;
        };

        // Centered popup, 80% of the screen.
        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 80) / 100;
            let popup_height = (area.height * 80) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };

        f.render_widget(Clear, popup_area);

        let assignees = if task.assigned_to.is_empty() {
            "-".to_string()
        } else {
            task.assigned_to.join(", ")
        };
        let mut detail_lines = vec![
            Line::from(vec![Span::styled(
                format!("Task {}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!(
                "Status:       {}",
                format_status(task.effective_status(self.today))
            )),
            Line::from(format!("Priority:     {}", format_priority(task.priority))),
            Line::from(format!("Category:     {}", format_category(task.category))),
            Line::from(format!(
                "Due:          {}",
                format_due_relative(task.due, self.today)
            )),
            Line::from(format!("Assignees:    {}", assignees)),
            Line::from(format!(
                "Estimate:     {}",
                task.estimated_minutes
                    .map(|m| format!("{} min", m))
                    .unwrap_or_else(|| "-".into())
            )),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.as_deref().unwrap_or("-").to_string()),
        ];

        if let Some(ref instructions) = task.instructions {
            detail_lines.extend(vec![
                Line::from(""),
                Line::from("Instructions:"),
                Line::from(instructions.clone()),
            ]);
        }
        if let Some(ref notes) = task.completion_notes {
            detail_lines.extend(vec![
                Line::from(""),
                Line::from("Completion notes:"),
                Line::from(notes.clone()),
            ]);
        }

        let accent = Self::column_color(self.selected_column);
        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Press Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(accent).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));

        f.render_widget(popup_paragraph, popup_area);
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

/// Render a single task card
fn render_card(
    f: &mut Frame,
    area: Rect,
    task: &Task,
    today: NaiveDate,
    accent: Color,
    is_selected: bool,
) {
    let style = if is_selected {
        Style::default()
            .bg(accent)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::DarkGray)
    };

    let mut card_text = vec![Line::from(format!(
        "{} {}",
        format_priority(task.priority),
        format_due_relative(task.due, today)
    ))];

    // Word-wrap the title to at most two lines.
    let available_width = area.width.saturating_sub(2) as usize;
    let mut current_line = String::new();
    let mut lines = Vec::new();
    for word in task.title.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= available_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line.clone());
            current_line = word.to_string();
            if lines.len() >= 2 {
                break;
            }
        }
    }
    if !current_line.is_empty() && lines.len() < 2 {
        lines.push(current_line);
    }
    for line in lines {
        card_text.push(Line::from(line));
    }

    card_text.push(Line::from(format!(
        "{} | {}",
        format_category(task.category),
        if task.assigned_to.is_empty() {
            "-".to_string()
        } else {
            task.assigned_to.join(",")
        }
    )));

    let card_block = Paragraph::new(card_text)
        .block(Block::default().borders(Borders::ALL))
        .style(style)
        .wrap(Wrap { trim: true });

    f.render_widget(card_block, area);
}
