use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use vidya_core::SessionState;

use crate::app::{App, Tab};

pub fn draw(frame: &mut Frame, app: &App) {
    let [tabs_area, main_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]).areas(frame.area());

    draw_tabs(frame, app, tabs_area);

    match app.tab {
        Tab::Session => draw_session(frame, app, main_area),
        Tab::Logs => draw_logs(frame, app, main_area),
    }
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let selected = match app.tab {
        Tab::Session => 0,
        Tab::Logs => 1,
    };
    let tabs = Tabs::new(vec!["1:Session", "2:Logs"])
        .block(Block::default().borders(Borders::ALL).title("vidya"))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn state_style(state: SessionState) -> Style {
    let color = match state {
        SessionState::Disconnected => Color::DarkGray,
        SessionState::Connecting => Color::Yellow,
        SessionState::Connected => Color::Green,
        SessionState::Speaking => Color::Cyan,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn key_hint(state: SessionState) -> &'static str {
    if state.is_active() {
        "x=stop  q=quit"
    } else {
        "s=start  q=quit"
    }
}

fn draw_session(frame: &mut Frame, app: &App, area: Rect) {
    let [status_area, text_area] =
        Layout::vertical([Constraint::Length(7), Constraint::Fill(1)]).areas(area);

    let view = &app.view;
    let mut lines = vec![
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(view.state.to_string(), state_style(view.state)),
        ]),
        Line::from(format!(
            "Frames sent: {}   Chunks played: {}   Dropped: {}",
            view.frames_sent, view.chunks_played, view.chunks_dropped
        )),
        Line::from(format!(
            "Queued buffers: {}   Interruptions: {}",
            view.queued_buffers, view.interruptions
        )),
    ];
    if let Some(error) = &view.error {
        lines.push(Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    let status = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Session ({})", key_hint(view.state))),
    );
    frame.render_widget(status, status_area);

    let text = Paragraph::new(view.model_text.join("\n"))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Tutor"));
    frame.render_widget(text, text_area);
}

fn draw_logs(frame: &mut Frame, app: &App, area: Rect) {
    let Ok(logs) = app.logs.lock() else {
        return;
    };
    let total = logs.len();

    let visible_height = area.height.saturating_sub(2) as usize;
    let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
    let end = total.saturating_sub(scroll);
    let start = end.saturating_sub(visible_height);

    let items: Vec<ListItem> = logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|s| ListItem::new(s.as_str()))
        .collect();

    let title = if app.log_auto_scroll {
        "Logs (auto-scroll)"
    } else {
        "Logs (Up/Down=scroll, G=bottom)"
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}
