#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderLogEventKind {
    PassStarted,
    TargetChanged,
    MarketCacheFetched,
    SubAccountSelected,
    UserSnapshotFetched,
    OverridesApplied,
    ResultsComputed,
    PassFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderLogEvent {
    pub pass: u64,
    pub kind: RenderLogEventKind,
    pub fetch_latency_micros: Option<u64>,
}

impl RenderLogEvent {
    pub fn new(pass: u64, kind: RenderLogEventKind, fetch_latency_micros: Option<u64>) -> Self {
        Self {
            pass,
            kind,
            fetch_latency_micros,
        }
    }
}

pub trait RenderLogWriter {
    fn write(&mut self, event: RenderLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemoryRenderLogWriter {
    events: Vec<RenderLogEvent>,
}

impl InMemoryRenderLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RenderLogEvent] {
        &self.events
    }

    pub fn kinds(&self) -> Vec<RenderLogEventKind> {
        self.events.iter().map(|event| event.kind).collect()
    }
}

impl RenderLogWriter for InMemoryRenderLogWriter {
    fn write(&mut self, event: RenderLogEvent) {
        self.events.push(event);
    }
}

/// Forwards pass stages to `tracing` at debug level, tagged with the session.
#[derive(Debug, Clone, Copy)]
pub struct TracingRenderLogWriter {
    session: u64,
}

impl TracingRenderLogWriter {
    pub fn new(session: u64) -> Self {
        Self { session }
    }
}

impl RenderLogWriter for TracingRenderLogWriter {
    fn write(&mut self, event: RenderLogEvent) {
        tracing::debug!(
            session = self.session,
            pass = event.pass,
            stage = ?event.kind,
            fetch_latency_micros = event.fetch_latency_micros,
            "render stage"
        );
    }
}
