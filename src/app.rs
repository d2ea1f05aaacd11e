//! Panel view state.
//!
//! [`App`] holds a snapshot of the shared store plus everything that only
//! matters to the terminal: selection, quit flag, pending refresh.  The main
//! loop copies the store into it once per tick with [`App::sync`]; nothing
//! here writes back to the store.

use ratatui::widgets::ListState;

use crate::pipeline::ConnectionStatus;
use crate::source::Notification;
use crate::state::{AuthState, AuthStatus, PanelState};

pub struct App {
    pub auth: AuthState,
    pub panel: PanelState,
    /// Last status reported by the pipeline, if it has answered yet.
    pub connection: Option<ConnectionStatus>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    refresh_requested: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            auth: AuthState::default(),
            panel: PanelState::default(),
            connection: None,
            list_state: ListState::default(),
            quit: false,
            refresh_requested: false,
        }
    }

    /// Take a fresh snapshot of the store, keeping the selection in range.
    pub fn sync(&mut self, auth: AuthState, panel: PanelState) {
        self.auth = auth;
        self.panel = panel;

        let len = self.notifications().len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.panel.notifications
    }

    pub fn selected(&self) -> Option<&Notification> {
        self.list_state
            .selected()
            .and_then(|i| self.notifications().get(i))
    }

    // -- refresh -------------------------------------------------------------

    /// Queue a manual refresh.  Ignored unless signed in.
    pub fn request_refresh(&mut self) {
        if self.auth.status == AuthStatus::Authenticated {
            self.refresh_requested = true;
        }
    }

    /// Consume a pending refresh request.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::take(&mut self.refresh_requested)
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.notifications().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.notifications().is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.notifications().is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let len = self.notifications().len();
        if len > 0 {
            self.list_state.select(Some(len - 1));
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
