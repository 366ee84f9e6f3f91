use std::sync::Arc;
use std::time::Duration;

use super::session::SessionRegistry;
use crate::login::LoginOrchestrator;

/// Shared state for the HTTP handlers.
#[derive(Debug)]
pub struct ServerState {
    orchestrator: LoginOrchestrator,
    sessions: Arc<SessionRegistry>,
}

impl ServerState {
    #[must_use]
    pub fn new(orchestrator: LoginOrchestrator, session_ttl: Duration) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(SessionRegistry::new(session_ttl)),
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &LoginOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.orchestrator.config().session_cookie_secure()
    }
}
