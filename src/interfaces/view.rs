use crate::application::session::SessionState;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The closed set of views the client can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewId {
    Home,
    Profile,
}

impl ViewId {
    pub const ALL: [ViewId; 2] = [ViewId::Home, ViewId::Profile];

    /// Element id of the view's page, e.g. `page-home`.
    pub fn dom_id(self) -> &'static str {
        match self {
            Self::Home => "page-home",
            Self::Profile => "page-profile",
        }
    }

    pub fn from_dom_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.dom_id() == id)
    }
}

/// What a `show` call ended up displaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown(ViewId),
    /// The id matched no known view; every view is now hidden.
    NoMatch,
}

/// Tracks which single view is visible.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ViewRouter {
    active: Option<ViewId>,
}

pub type ViewHandle = Arc<RwLock<ViewRouter>>;

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates the view whose element id is `view_id` and hides the rest.
    ///
    /// An unknown id hides everything and reports [`ShowOutcome::NoMatch`].
    pub fn show(&mut self, view_id: &str) -> ShowOutcome {
        self.active = ViewId::from_dom_id(view_id);
        match self.active {
            Some(view) => {
                debug!(view = view.dom_id(), "view shown");
                ShowOutcome::Shown(view)
            }
            None => {
                warn!(view_id, "no view matched; all views hidden");
                ShowOutcome::NoMatch
            }
        }
    }

    pub fn show_view(&mut self, view: ViewId) -> ShowOutcome {
        self.show(view.dom_id())
    }

    /// Handles a navigation button whose target is e.g. `home`.
    pub fn navigate(&mut self, target: &str) -> ShowOutcome {
        self.show(&format!("page-{target}"))
    }

    pub fn active(&self) -> Option<ViewId> {
        self.active
    }
}

/// Presentation derived from the session: what the header and profile show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub login_button_visible: bool,
    pub welcome_message: Option<String>,
    pub profile_username: Option<String>,
}

impl SessionView {
    pub fn from_session(session: &SessionState) -> Self {
        match session.identity() {
            Some(user) => Self {
                login_button_visible: false,
                welcome_message: Some(format!("Welcome, {}!", user.handle())),
                profile_username: Some(user.handle()),
            },
            None => Self {
                login_button_visible: true,
                welcome_message: None,
                profile_username: None,
            },
        }
    }
}
