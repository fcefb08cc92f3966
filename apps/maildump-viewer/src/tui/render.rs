use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use crate::dispatch::PaneId;
use crate::notify::Toast;
use crate::store::{BodyState, DetailView, MessageFormat, MessageId, MessageSummary, StoreSnapshot};

const MIN_PANE_HEIGHT: u16 = 3;
const HINT: &str = "/ search  up/down select  del delete  tab format  ctrl+q quit server  ctrl+l clear  esc exit";

/// Everything the renderer reads from outside the UI thread.
#[derive(Debug, Clone)]
pub struct ViewModel {
    pub snapshot: StoreSnapshot,
    pub disconnected: bool,
    pub notifications_available: bool,
    pub toast: Option<Toast>,
}

/// Clickable regions recorded while drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Quit,
    Clear,
    ToggleNotifications,
    Search,
    Row(MessageId),
    ResizeHandle,
    FormatTab(MessageFormat),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Confirm(String),
    Alert(String),
}

/// UI-local state owned by the terminal thread.
#[derive(Debug, Default)]
pub struct ViewState {
    pub search: String,
    pub search_focused: bool,
    pub message_pane_visible: bool,
    pub notification_label: String,
    pub modal: Option<Modal>,
    pub list_height: Option<u16>,
    pub body_height: Option<u16>,
    format: MessageFormat,
    formats: Vec<MessageFormat>,
    list_top: u16,
    body_top: u16,
    list_offset: usize,
    hits: Vec<(Rect, Hit)>,
}

impl ViewState {
    pub fn hit(&self, x: u16, y: u16) -> Option<Hit> {
        self.hits
            .iter()
            .rev()
            .find(|(rect, _)| contains(rect, x, y))
            .map(|(_, hit)| *hit)
    }

    /// Format shown in the message pane at the last draw.
    pub fn format(&self) -> MessageFormat {
        self.format
    }

    /// Tab after the current one, wrapping around. None without a message pane.
    pub fn next_format(&self) -> Option<MessageFormat> {
        let position = self.formats.iter().position(|format| *format == self.format);
        match position {
            Some(index) => self.formats.get((index + 1) % self.formats.len()).copied(),
            None => self.formats.first().copied(),
        }
    }

    pub fn pane_top(&self, pane: PaneId) -> u16 {
        match pane {
            PaneId::MessageList => self.list_top,
            PaneId::MessageBody => self.body_top,
        }
    }

    fn record(&mut self, rect: Rect, hit: Hit) {
        if rect.width > 0 && rect.height > 0 {
            self.hits.push((rect, hit));
        }
    }
}

fn contains(rect: &Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x.saturating_add(rect.width) && y >= rect.y && y < rect.y.saturating_add(rect.height)
}

pub fn draw(frame: &mut Frame, view: &ViewModel, state: &mut ViewState) {
    state.hits.clear();
    state.formats.clear();
    state.format = view
        .snapshot
        .detail
        .as_ref()
        .map(|detail| detail.format)
        .unwrap_or(view.snapshot.format);

    let [nav, search, main, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_nav(frame, nav, view, state);
    draw_search(frame, search, state);

    if state.message_pane_visible {
        let (list_constraint, body_constraint) = match (state.list_height, state.body_height) {
            (Some(list), _) => (
                Constraint::Length(list.max(MIN_PANE_HEIGHT)),
                Constraint::Min(MIN_PANE_HEIGHT),
            ),
            (None, Some(body)) => (
                Constraint::Min(MIN_PANE_HEIGHT),
                Constraint::Length(body.max(MIN_PANE_HEIGHT)),
            ),
            (None, None) => (Constraint::Percentage(40), Constraint::Min(MIN_PANE_HEIGHT)),
        };
        let [list, handle, body] =
            Layout::vertical([list_constraint, Constraint::Length(1), body_constraint]).areas(main);
        draw_list(frame, list, &view.snapshot, state);
        draw_handle(frame, handle, state);
        draw_detail(frame, body, view.snapshot.detail.as_ref(), state);
    } else {
        draw_list(frame, main, &view.snapshot, state);
    }

    draw_status(frame, status, view.toast.as_ref());

    if let Some(modal) = state.modal.clone() {
        draw_modal(frame, &modal);
    }
}

fn draw_nav(frame: &mut Frame, area: Rect, view: &ViewModel, state: &mut ViewState) {
    let mut spans = vec![Span::styled(
        " maildump ",
        Style::new().add_modifier(Modifier::BOLD),
    )];
    let mut x = area.x + 10;
    let mut button = |spans: &mut Vec<Span<'static>>, label: String, hit: Hit, state: &mut ViewState| {
        let text = format!("[ {label} ]");
        let width = text.chars().count() as u16;
        state.record(Rect::new(x, area.y, width.min(area.right().saturating_sub(x)), 1), hit);
        spans.push(Span::styled(text, Style::new().fg(Color::Cyan)));
        spans.push(Span::raw(" "));
        x = x.saturating_add(width + 1);
    };
    button(&mut spans, "Quit".to_string(), Hit::Quit, state);
    button(&mut spans, "Clear".to_string(), Hit::Clear, state);
    if view.notifications_available {
        button(
            &mut spans,
            state.notification_label.clone(),
            Hit::ToggleNotifications,
            state,
        );
    }
    spans.push(Span::raw(format!(
        " {}/{} messages ",
        view.snapshot.rows.len(),
        view.snapshot.total
    )));
    if view.disconnected {
        spans.push(Span::styled(
            "● disconnected",
            Style::new().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_search(frame: &mut Frame, area: Rect, state: &mut ViewState) {
    let style = if state.search_focused {
        Style::new().add_modifier(Modifier::UNDERLINED)
    } else {
        Style::new().fg(Color::DarkGray)
    };
    let cursor = if state.search_focused { "_" } else { "" };
    let line = Line::from(vec![
        Span::raw(" Search: "),
        Span::styled(format!("{}{cursor}", state.search), style),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    state.record(area, Hit::Search);
}

fn draw_list(frame: &mut Frame, area: Rect, snapshot: &StoreSnapshot, state: &mut ViewState) {
    state.list_top = area.y;
    if area.height == 0 {
        return;
    }
    let capacity = usize::from(area.height.saturating_sub(1));
    let rows = &snapshot.rows;

    if rows.is_empty() {
        let text = if snapshot.filter.is_empty() {
            " No messages".to_string()
        } else {
            format!(" No messages match '{}'", snapshot.filter)
        };
        frame.render_widget(Paragraph::new(text).style(Style::new().fg(Color::DarkGray)), area);
        state.list_offset = 0;
        return;
    }

    if let Some(index) = snapshot
        .selected
        .and_then(|id| rows.iter().position(|row| row.id == id))
    {
        if index < state.list_offset {
            state.list_offset = index;
        } else if capacity > 0 && index >= state.list_offset + capacity {
            state.list_offset = index + 1 - capacity;
        }
    }
    state.list_offset = state.list_offset.min(rows.len().saturating_sub(capacity));

    let shown = rows.iter().skip(state.list_offset).take(capacity);
    let table_rows: Vec<Row> = shown
        .enumerate()
        .map(|(i, row)| {
            let y = area.y + 1 + i as u16;
            state.record(Rect::new(area.x, y, area.width, 1), Hit::Row(row.id));
            let style = if snapshot.selected == Some(row.id) {
                Style::new().add_modifier(Modifier::REVERSED)
            } else {
                Style::new()
            };
            message_row(row).style(style)
        })
        .collect();

    let header = Row::new(["Date", "Sender", "Recipients", "Subject", "Size"])
        .style(Style::new().add_modifier(Modifier::BOLD));
    let table = Table::new(
        table_rows,
        [
            Constraint::Length(19),
            Constraint::Percentage(22),
            Constraint::Percentage(22),
            Constraint::Min(10),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .column_spacing(1);
    frame.render_widget(table, area);
}

fn message_row(row: &MessageSummary) -> Row<'static> {
    let recipients: Vec<&str> = row.recipients.all().collect();
    Row::new([
        row.created_at.clone(),
        row.sender.clone(),
        recipients.join(", "),
        row.subject.clone(),
        human_size(row.size),
    ])
}

fn draw_handle(frame: &mut Frame, area: Rect, state: &mut ViewState) {
    let label = " ═ drag to resize ═ ";
    let fill = usize::from(area.width).saturating_sub(label.chars().count()) / 2;
    let line = format!("{}{label}{}", "─".repeat(fill), "─".repeat(fill));
    frame.render_widget(Paragraph::new(line).style(Style::new().fg(Color::DarkGray)), area);
    state.record(area, Hit::ResizeHandle);
}

fn draw_detail(frame: &mut Frame, area: Rect, detail: Option<&DetailView>, state: &mut ViewState) {
    state.body_top = area.y;
    let Some(view) = detail else {
        frame.render_widget(
            Paragraph::new(" Select a message to read it.").style(Style::new().fg(Color::DarkGray)),
            area,
        );
        return;
    };
    if area.height == 0 {
        return;
    }

    let [tabs, content] = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    let mut spans = Vec::new();
    let mut x = tabs.x;
    for format in MessageFormat::ALL {
        if let Some(detail) = &view.detail {
            if !detail.has_format(format) {
                continue;
            }
        }
        state.formats.push(format);
        let text = format!(" {} ", format.label());
        let width = text.chars().count() as u16;
        state.record(Rect::new(x, tabs.y, width.min(tabs.right().saturating_sub(x)), 1), Hit::FormatTab(format));
        let style = if format == view.format {
            Style::new().add_modifier(Modifier::REVERSED)
        } else {
            Style::new().fg(Color::Cyan)
        };
        spans.push(Span::styled(text, style));
        spans.push(Span::raw(" "));
        x = x.saturating_add(width + 1);
    }
    let delete = "[ Delete ]";
    let delete_x = x.saturating_add(1);
    if delete_x < tabs.right() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(delete, Style::new().fg(Color::Red)));
        let width = (delete.chars().count() as u16).min(tabs.right() - delete_x);
        state.record(Rect::new(delete_x, tabs.y, width, 1), Hit::Delete);
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), tabs);

    let block = Block::default().borders(Borders::TOP);
    frame.render_widget(
        Paragraph::new(detail_text(view))
            .block(block)
            .wrap(Wrap { trim: false }),
        content,
    );
}

fn detail_text(view: &DetailView) -> Text<'static> {
    let Some(detail) = &view.detail else {
        return Text::from(" Loading message...");
    };
    let summary = &detail.summary;
    let label = Style::new().add_modifier(Modifier::BOLD);
    let header = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{name:>8}: "), label), Span::raw(value)])
    };

    let mut lines = vec![
        header("From", summary.sender.clone()),
        header("To", summary.recipients.to.join(", ")),
    ];
    if !summary.recipients.cc.is_empty() {
        lines.push(header("Cc", summary.recipients.cc.join(", ")));
    }
    if !summary.recipients.bcc.is_empty() {
        lines.push(header("Bcc", summary.recipients.bcc.join(", ")));
    }
    lines.push(header("Subject", summary.subject.clone()));
    lines.push(header("Date", summary.created_at.clone()));
    if !detail.attachments.is_empty() {
        let names: Vec<String> = detail
            .attachments
            .iter()
            .map(|a| {
                let name = a.filename.as_deref().unwrap_or("unnamed");
                match a.size {
                    Some(size) => format!("{name} ({})", human_size(size)),
                    None => name.to_string(),
                }
            })
            .collect();
        lines.push(header("Files", names.join(", ")));
    }
    lines.push(Line::default());

    match &view.body {
        BodyState::Loading => lines.push(Line::from(" Loading body...")),
        BodyState::Failed(err) => lines.push(Line::styled(
            format!(" Failed to load message: {err}"),
            Style::new().fg(Color::Red),
        )),
        BodyState::Ready(body) => lines.extend(body.lines().map(|line| Line::from(line.to_string()))),
    }
    Text::from(lines)
}

fn draw_status(frame: &mut Frame, area: Rect, toast: Option<&Toast>) {
    let line = match toast {
        Some(toast) => Line::from(vec![
            Span::styled(" ✉ ", Style::new().fg(Color::Yellow)),
            Span::styled(toast.title.clone(), Style::new().add_modifier(Modifier::BOLD)),
            Span::raw(format!(": {}", toast.body)),
        ]),
        None => Line::styled(format!(" {HINT}"), Style::new().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_modal(frame: &mut Frame, modal: &Modal) {
    let (title, text, hint) = match modal {
        Modal::Confirm(text) => (" Confirm ", text.as_str(), "[y] yes   [n] no"),
        Modal::Alert(text) => (" Notice ", text.as_str(), "[enter] ok"),
    };
    let area = frame.area();
    let wanted = (text.chars().count() as u16).saturating_add(4).max(30);
    let width = wanted.min(area.width.saturating_sub(2)).max(1);
    let height = 5.min(area.height);
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );
    let body = Text::from(vec![
        Line::from(text.to_string()),
        Line::default(),
        Line::styled(hint, Style::new().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(body)
            .block(Block::default().title(title).borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        popup,
    );
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
