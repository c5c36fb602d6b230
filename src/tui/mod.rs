use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::gate::AccessGate;
use crate::portal::{Portal, StatusKind};
use crate::progress::ProgressIndicator;
use crate::submission::SubmissionSink;
use crate::worker::{PortalEvent, spawn_submission};
use crate::{CommentState, StepCategory};

/// What keyboard input currently drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Access phrase prompt.
    Phrase,
    /// Moving between comments.
    Browse,
    /// Typing into the focused response editor.
    Editing,
    /// Typing the reviewer name.
    Name,
}

/// Application state for the TUI.
pub struct App {
    portal: Portal,
    gate: AccessGate,
    phrase_input: String,
    phrase_error: bool,
    mode: InputMode,
    should_quit: bool,
    show_help: bool,
    confirm_submit: bool,
    doc_scroll: u16,
    comment_scroll: u16,
    events: Receiver<PortalEvent>,
    event_tx: Sender<PortalEvent>,
    sink: Arc<dyn SubmissionSink>,
}

impl App {
    /// Create the app around a portal whose loads are already in flight.
    ///
    /// Worker results arrive on `events`; `event_tx` is used for submissions.
    pub fn new(
        portal: Portal,
        gate: AccessGate,
        sink: Arc<dyn SubmissionSink>,
        event_tx: Sender<PortalEvent>,
        events: Receiver<PortalEvent>,
    ) -> Self {
        let mode = if gate.is_locked() {
            InputMode::Phrase
        } else {
            InputMode::Browse
        };
        Self {
            portal,
            gate,
            phrase_input: String::new(),
            phrase_error: false,
            mode,
            should_quit: false,
            show_help: false,
            confirm_submit: false,
            doc_scroll: 0,
            comment_scroll: 0,
            events,
            event_tx,
            sink,
        }
    }

    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Apply every worker notification that has arrived.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: PortalEvent) {
        match event {
            PortalEvent::CommentsLoaded(result) => self.portal.on_comments_loaded(result),
            PortalEvent::DocumentLoaded(result) => self.portal.on_document_loaded(result),
            PortalEvent::Submitted(result) => self.portal.on_submission_result(result),
        }
    }

    /// Handle keyboard input, dispatching to the appropriate mode handler.
    pub fn handle_input(&mut self, key: event::KeyEvent) {
        if self.confirm_submit {
            self.confirm_submit = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.submit();
            }
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        if is_ctrl(&key) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.mode {
            InputMode::Phrase => self.handle_phrase_input(key),
            InputMode::Browse => self.handle_browse_input(key),
            InputMode::Editing => self.handle_editing_input(key),
            InputMode::Name => self.handle_name_input(key),
        }
    }

    fn handle_phrase_input(&mut self, key: event::KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                if self.gate.try_unlock(&self.phrase_input) {
                    self.mode = InputMode::Browse;
                } else {
                    self.phrase_error = true;
                }
                self.phrase_input.clear();
            }
            KeyCode::Backspace => {
                self.phrase_input.pop();
            }
            KeyCode::Char(c) if !is_ctrl(&key) => {
                self.phrase_error = false;
                self.phrase_input.push(c);
            }
            _ => {}
        }
    }

    fn handle_browse_input(&mut self, key: event::KeyEvent) {
        if is_ctrl(&key) {
            match key.code {
                KeyCode::Char('d') => self.doc_scroll = self.doc_scroll.saturating_add(10),
                KeyCode::Char('u') => self.doc_scroll = self.doc_scroll.saturating_sub(10),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('j') | KeyCode::Down => self.portal.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.portal.select_prev(),
            KeyCode::Enter | KeyCode::Char('i') => {
                if !self.portal.store().is_empty() {
                    self.portal.focus_selected();
                    self.mode = InputMode::Editing;
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => {
                self.portal.toggle_complete_current();
            }
            KeyCode::Char('n') => self.mode = InputMode::Name,
            KeyCode::Char('S') => {
                if !self.portal.is_submitting() {
                    self.confirm_submit = true;
                }
            }
            KeyCode::PageDown => self.doc_scroll = self.doc_scroll.saturating_add(20),
            KeyCode::PageUp => self.doc_scroll = self.doc_scroll.saturating_sub(20),
            _ => {}
        }
    }

    fn handle_editing_input(&mut self, key: event::KeyEvent) {
        if is_ctrl(&key) {
            if key.code == KeyCode::Char('d') {
                self.portal.toggle_complete_current();
            }
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.portal.blur();
                self.mode = InputMode::Browse;
            }
            KeyCode::Tab => {
                self.portal.blur();
                self.portal.select_next();
                self.portal.focus_selected();
            }
            KeyCode::BackTab => {
                self.portal.blur();
                self.portal.select_prev();
                self.portal.focus_selected();
            }
            KeyCode::Enter => self.portal.push_char('\n'),
            KeyCode::Backspace => self.portal.backspace(),
            KeyCode::Char(c) => self.portal.push_char(c),
            KeyCode::PageDown => self.doc_scroll = self.doc_scroll.saturating_add(20),
            KeyCode::PageUp => self.doc_scroll = self.doc_scroll.saturating_sub(20),
            _ => {}
        }
    }

    fn handle_name_input(&mut self, key: event::KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => self.mode = InputMode::Browse,
            KeyCode::Backspace => self.portal.name_backspace(),
            KeyCode::Char(c) if !is_ctrl(&key) => self.portal.push_name_char(c),
            _ => {}
        }
    }

    /// Validate, assemble and hand the payload to the submission worker.
    fn submit(&mut self) {
        if let Some(payload) = self.portal.prepare_submission(Utc::now()) {
            spawn_submission(Arc::clone(&self.sink), payload, self.event_tx.clone());
        }
    }

    /// Render the UI.
    fn render(&mut self, frame: &mut Frame) {
        self.portal.expire_status(Instant::now());

        if self.mode == InputMode::Phrase {
            self.render_phrase_prompt(frame);
            return;
        }

        if self.show_help {
            self.render_help(frame);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        self.render_progress_bar(frame, chunks[0]);
        self.render_document(frame, main_chunks[0]);
        self.render_comments(frame, main_chunks[1]);
        self.render_status_bar(frame, chunks[2]);

        if self.confirm_submit {
            self.render_confirm(frame);
        }
    }

    /// Render one step per comment joined by separators.
    fn render_progress_bar(&self, frame: &mut Frame, area: Rect) {
        let progress = self.portal.progress();
        let mut spans = Vec::with_capacity(progress.len() * 2);
        for (idx, step) in progress.steps().iter().enumerate() {
            if idx > 0 {
                spans.push(Span::styled("──", Style::default().fg(Color::DarkGray)));
            }
            let mut style = Style::default().fg(Color::Black).bg(step_color(*step));
            if idx == self.portal.selected() {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            spans.push(Span::styled(
                format!(" ◆{} ", ProgressIndicator::label(idx)),
                style,
            ));
        }

        let summary = progress.summary();
        let title = format!("Progress {}/{} complete", summary.done, summary.total);
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(paragraph, area);
    }

    /// Render the document pane with highlighted passages.
    fn render_document(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!("Document: {}", self.portal.document_id());
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2);

        let highlight = self.portal.highlight();
        let Some(document) = highlight.document() else {
            let paragraph = match self.portal.document_error() {
                Some(e) => Paragraph::new(format!("Document unavailable: {e}"))
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: false }),
                None => Paragraph::new("Loading document…"),
            }
            .block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let highlight_style = Style::default().fg(Color::Black).bg(Color::Yellow);
        let mut rows: Vec<Line<'static>> = Vec::new();
        let mut line_rows = Vec::with_capacity(document.lines.len());
        for (idx, line) in document.lines.iter().enumerate() {
            line_rows.push(rows.len());
            let whole_line = highlight.line_highlighted(idx);
            let spans: Vec<Span<'static>> = line
                .segments
                .iter()
                .map(|segment| {
                    if whole_line || highlight.segment_highlighted(segment) {
                        Span::styled(segment.text.clone(), highlight_style)
                    } else {
                        Span::raw(segment.text.clone())
                    }
                })
                .collect();
            rows.extend(wrap_spans(spans, inner_width));
        }

        if let Some(line) = self.portal.highlight_mut().take_scroll_request() {
            let row = line_rows.get(line).copied().unwrap_or(0);
            self.doc_scroll = u16::try_from(row)
                .unwrap_or(u16::MAX)
                .saturating_sub(inner_height / 2);
        }
        let max_scroll = u16::try_from(rows.len()).unwrap_or(u16::MAX);
        self.doc_scroll = self.doc_scroll.min(max_scroll);

        let paragraph = Paragraph::new(Text::from(rows))
            .block(block)
            .scroll((self.doc_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    /// Render the comment list with response editors.
    fn render_comments(&mut self, frame: &mut Frame, area: Rect) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2) as usize;
        let store = self.portal.store();
        let focused = self.portal.focused();
        let selected = self.portal.selected();

        let mut rows: Vec<Line<'static>> = Vec::new();
        let mut selected_range = (0, 0);
        for (idx, comment) in store.comments().iter().enumerate() {
            let start = rows.len();
            let (badge, badge_color) = match comment.state {
                CommentState::Untouched => ("TODO", Color::Gray),
                CommentState::InProgress => ("WORKING", Color::Yellow),
                CommentState::Complete => ("COMPLETE", Color::Blue),
            };
            let marker = if idx == selected { ">" } else { " " };
            let header_style = if idx == selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            rows.push(Line::from(vec![
                Span::styled(format!("{marker} {}. ", idx + 1), header_style),
                Span::styled(format!("[{badge}]"), Style::default().fg(badge_color)),
                Span::styled(
                    format!(
                        " ID: {} | Author: {} | Date: {}",
                        comment.id, comment.author, comment.created_at
                    ),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));

            for line in comment.text.lines() {
                rows.extend(wrap_spans(vec![Span::raw(line.to_string())], inner_width));
            }

            let is_focused = focused == Some(idx);
            let response_style = if is_focused {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::Green)
            };
            let mut response = comment.response_text.clone();
            if is_focused {
                response.push('▏');
            }
            if response.is_empty() {
                rows.push(Line::from(Span::styled(
                    "  Your response here...",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                for line in response.split('\n') {
                    rows.extend(wrap_spans(
                        vec![Span::styled(format!("  {line}"), response_style)],
                        inner_width,
                    ));
                }
            }
            rows.push(Line::from(""));

            if idx == selected {
                selected_range = (start, rows.len());
            }
        }

        // Keep the selected comment in view
        let (start, end) = selected_range;
        let mut scroll = self.comment_scroll as usize;
        if start < scroll {
            scroll = start;
        } else if end > scroll + inner_height {
            scroll = end.saturating_sub(inner_height).min(start);
        }
        self.comment_scroll = u16::try_from(scroll).unwrap_or(u16::MAX);

        let title = if store.is_empty() {
            "Comments".to_string()
        } else {
            format!("Comments ({})", store.len())
        };
        let text = if store.is_empty() {
            Text::from("No comments loaded")
        } else {
            Text::from(rows)
        };
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title))
            .scroll((self.comment_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    /// Render the reviewer name field and status line.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let name_style = if self.mode == InputMode::Name {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut name = self.portal.reviewer_name().to_string();
        if self.mode == InputMode::Name {
            name.push('▏');
        }

        let (status_text, status_style) = match self.portal.status() {
            Some(msg) => (
                msg.text.clone(),
                match msg.kind {
                    StatusKind::Info => Style::default().fg(Color::Green),
                    StatusKind::Error => Style::default().fg(Color::Red),
                },
            ),
            None => (
                match self.mode {
                    InputMode::Editing => {
                        "Esc=done Tab=next Ctrl+d=mark complete PgUp/PgDn=scroll doc".to_string()
                    }
                    InputMode::Name => "Enter=done".to_string(),
                    _ => "j/k=nav Enter=respond Space=complete n=name S=submit ?=help q=quit"
                        .to_string(),
                },
                Style::default(),
            ),
        };

        let line = Line::from(vec![
            Span::raw("Reviewer: "),
            Span::styled(name, name_style),
            Span::raw(" | "),
            Span::styled(status_text, status_style),
        ]);
        let paragraph = Paragraph::new(line)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_phrase_prompt(&self, frame: &mut Frame) {
        let masked = "*".repeat(self.phrase_input.chars().count());
        let mut lines = vec![
            Line::from("This review is protected by an access phrase."),
            Line::from(""),
            Line::from(format!("Phrase: {masked}")),
        ];
        if self.phrase_error {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Incorrect access phrase",
                Style::default().fg(Color::Red),
            )));
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title("Review Portal"))
            .wrap(Wrap { trim: false });
        let area = centered_rect(50, 30, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    /// Render the help overlay.
    fn render_help(&self, frame: &mut Frame) {
        let help_text = [
            "Review Portal - Keyboard Shortcuts",
            "",
            "Navigation:",
            "  j / Down      - Next comment",
            "  k / Up        - Previous comment",
            "  Ctrl+d/PgDn   - Scroll document down",
            "  Ctrl+u/PgUp   - Scroll document up",
            "",
            "Responding:",
            "  Enter / i     - Edit response to selected comment",
            "  Esc           - Stop editing",
            "  Tab/Shift+Tab - Move to next/previous comment while editing",
            "  Ctrl+d        - Mark complete while editing",
            "  Space / c     - Mark complete / reopen selected comment",
            "",
            "Submitting:",
            "  n             - Edit reviewer name",
            "  S (Shift+S)   - Submit all responses",
            "",
            "Other:",
            "  ?             - Show this help",
            "  q / Esc       - Quit",
            "",
            "Press any key to close this help",
        ];

        let text = Text::from(help_text.iter().map(|&s| Line::from(s)).collect::<Vec<_>>());
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(60, 80, frame.area());
        frame.render_widget(paragraph, area);
    }

    /// Render the submit confirmation modal.
    fn render_confirm(&self, frame: &mut Frame) {
        let summary = self.portal.progress().summary();
        let message = format!(
            "Submit responses for {} ({}/{} complete)?\n\n(y)es / (n)o",
            self.portal.document_id(),
            summary.done,
            summary.total
        );

        let paragraph = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Confirm"))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Yellow));

        let area = centered_rect(50, 30, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

/// Whether a key was pressed with Ctrl held.
fn is_ctrl(key: &event::KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Progress step colors: gray, yellow, blue.
fn step_color(step: StepCategory) -> Color {
    match step {
        StepCategory::Neutral => Color::Gray,
        StepCategory::Active => Color::Yellow,
        StepCategory::Done => Color::Blue,
    }
}

/// Break styled spans into lines of at most `width` characters.
///
/// Breaks at the last space when possible, otherwise mid-word.
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![Line::from(spans)];
    }

    let chars: Vec<(char, Style)> = spans
        .iter()
        .flat_map(|s| s.content.chars().map(move |c| (c, s.style)))
        .collect();
    if chars.is_empty() {
        return vec![Line::from("")];
    }

    let mut lines = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + width).min(chars.len());
        if end < chars.len()
            && let Some(space) = chars[start..end].iter().rposition(|(c, _)| *c == ' ')
            && space > 0
        {
            end = start + space + 1;
        }
        lines.push(styled_line(&chars[start..end]));
        start = end;
    }
    lines
}

/// Group consecutive characters with the same style back into spans.
fn styled_line(chars: &[(char, Style)]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut current_style = chars.first().map(|(_, s)| *s).unwrap_or_default();
    for (c, style) in chars {
        if *style != current_style && !current.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut current), current_style));
        }
        current_style = *style;
        current.push(*c);
    }
    if !current.is_empty() {
        spans.push(Span::styled(current, current_style));
    }
    Line::from(spans)
}

/// Create a centered rectangle.
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

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Launch the interactive review portal.
pub fn run_tui(mut app: App) -> Result<()> {
    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    let result = (|| -> Result<()> {
        loop {
            app.drain_events();

            terminal
                .draw(|f| app.render(f))
                .context("Failed to draw frame")?;

            if app.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(200)).context("Failed to poll events")?
                && let Event::Key(key) = event::read().context("Failed to read event")?
                && key.kind == event::KeyEventKind::Press
            {
                app.handle_input(key);
            }
        }
        Ok(())
    })();

    // Restore terminal in all cases
    restore_terminal(&mut terminal)?;

    result
}
