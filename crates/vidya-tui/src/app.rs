use crossterm::event::{KeyCode, KeyEvent};
use vidya_core::{SessionView, UiCommand};

use crate::log_layer::LogBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Session,
    Logs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    None,
    Quit,
    Command(UiCommand),
}

pub struct App {
    pub tab: Tab,
    pub view: SessionView,
    pub should_quit: bool,
    pub logs: LogBuffer,
    pub log_scroll: usize,
    pub log_auto_scroll: bool,
}

impl App {
    pub fn new(logs: LogBuffer) -> Self {
        Self {
            tab: Tab::Session,
            view: SessionView::default(),
            should_quit: false,
            logs,
            log_scroll: 0,
            log_auto_scroll: true,
        }
    }

    pub fn update_view(&mut self, view: SessionView) {
        self.view = view;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return AppAction::Quit;
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Session;
                return AppAction::None;
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Logs;
                return AppAction::None;
            }
            // Start/stop work from either tab.
            KeyCode::Char('s') if !self.view.state.is_active() => {
                return AppAction::Command(UiCommand::Start);
            }
            KeyCode::Char('x') if self.view.state.is_active() => {
                return AppAction::Command(UiCommand::Stop);
            }
            _ => {}
        }

        match self.tab {
            Tab::Logs => self.handle_logs_key(key),
            Tab::Session => AppAction::None,
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Up => {
                self.log_scroll = self.log_scroll.saturating_add(1);
                self.log_auto_scroll = false;
            }
            KeyCode::Down => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
            KeyCode::Char('G') => {
                self.log_scroll = 0;
                self.log_auto_scroll = true;
            }
            _ => {}
        }
        AppAction::None
    }
}
