use calc::{
    logging::TracingRenderLogWriter, metrics::LatencyPercentiles, Calculator, Page, RenderRequest,
    SessionId, SessionStore, StartSessionError,
};

#[derive(Clone)]
pub struct AppState {
    sessions: SessionStore,
    calculator: Calculator,
}

impl AppState {
    pub fn new(calculator: Calculator) -> Self {
        Self {
            sessions: SessionStore::new(),
            calculator,
        }
    }

    pub fn start_session(&self) -> Result<SessionId, StartSessionError> {
        let id = self.sessions.create()?;
        tracing::info!(session = %id, live = self.sessions.len(), "session started");
        Ok(id)
    }

    /// Runs one pass for `id`, waiting for any pass already running on the
    /// same session. `None` when the session does not exist.
    pub async fn render(&self, id: SessionId, request: RenderRequest) -> Option<Page> {
        let session = self.sessions.get(id)?;
        let mut state = session.lock().await;
        let mut log = TracingRenderLogWriter::new(id.0);
        Some(self.calculator.render(&mut state, request, &mut log).await)
    }

    pub fn end_session(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(id);
        if removed {
            tracing::info!(session = %id, "session ended");
        }
        removed
    }

    pub fn fetch_latency(&self) -> Option<LatencyPercentiles> {
        self.calculator.fetch_latency()
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
