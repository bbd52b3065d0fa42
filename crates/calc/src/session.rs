use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use snapshot::{MarketCache, OracleId, UserAccount};
use thiserror::Error;
use whatif::{Adjustment, AdjustmentMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartSessionError {
    #[error("session ids exhausted")]
    SessionIdOverflow,
}

/// Widget values are keyed by what they adjust. Oracle ids and market indexes
/// are only meaningful for one account, hence the invalidation on target change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WidgetKey {
    Price(OracleId),
    Balance(u16),
}

/// Everything one operator's page remembers between passes.
#[derive(Debug, Default)]
pub struct SessionState {
    authority: Option<String>,
    sub_account_id: Option<u16>,
    market_cache: Option<MarketCache>,
    user: Option<UserAccount>,
    mode: AdjustmentMode,
    widgets: BTreeMap<WidgetKey, Adjustment>,
    passes: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_pass(&mut self) -> u64 {
        self.passes = self.passes.wrapping_add(1);
        self.passes
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn sub_account_id(&self) -> Option<u16> {
        self.sub_account_id
    }

    pub fn mode(&self) -> AdjustmentMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AdjustmentMode) {
        self.mode = mode;
    }

    /// Points the session at `authority`. A different authority drops every
    /// cached snapshot, the subaccount choice and all widget values.
    pub fn select_authority(&mut self, authority: &str) -> bool {
        if self.authority.as_deref() == Some(authority) {
            return false;
        }

        self.authority = Some(authority.to_owned());
        self.market_cache = None;
        self.user = None;
        self.sub_account_id = None;
        self.widgets.clear();
        true
    }

    /// A different subaccount drops the user snapshot and all widget values;
    /// market data stays cached.
    pub fn select_sub_account(&mut self, sub_account_id: u16) -> bool {
        if self.sub_account_id == Some(sub_account_id) {
            return false;
        }

        self.sub_account_id = Some(sub_account_id);
        self.user = None;
        self.widgets.clear();
        true
    }

    pub fn market_cache(&self) -> Option<&MarketCache> {
        self.market_cache.as_ref()
    }

    pub fn cache_markets(&mut self, markets: MarketCache) {
        self.market_cache = Some(markets);
    }

    pub fn user(&self) -> Option<&UserAccount> {
        self.user.as_ref()
    }

    pub fn cache_user(&mut self, user: UserAccount) {
        self.user = Some(user);
    }

    pub fn widget(&self, key: &WidgetKey) -> Option<Adjustment> {
        self.widgets.get(key).copied()
    }

    pub fn set_widget(&mut self, key: WidgetKey, adjustment: Adjustment) {
        self.widgets.insert(key, adjustment);
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    /// Widget value for this pass: fresh input wins, then the stored value
    /// re-expressed in the current mode, then the untouched seed.
    pub fn resolve_widget(
        &mut self,
        key: WidgetKey,
        original: f64,
        input: Option<f64>,
    ) -> Result<Adjustment, whatif::AdjustError> {
        let adjustment = match input {
            Some(raw) => Adjustment::from_input(self.mode, raw)?,
            None => match self.widgets.get(&key) {
                Some(stored) => stored.in_mode(self.mode, original),
                None => Adjustment::seed(self.mode, original),
            },
        };
        self.widgets.insert(key, adjustment);
        Ok(adjustment)
    }
}

pub type SharedSession = Arc<tokio::sync::Mutex<SessionState>>;

/// Sessions untouched for this long are dropped on the next `create`.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct SessionEntry {
    session: SharedSession,
    last_touched: Instant,
}

/// All live sessions. Each session sits behind its own async mutex so a
/// session runs one pass at a time while different sessions proceed
/// independently. Idle sessions are swept whenever a new one is created.
#[derive(Clone, Debug)]
pub struct SessionStore {
    next_id: Arc<AtomicU64>,
    sessions: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            next_id: Arc::default(),
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn create(&self) -> Result<SessionId, StartSessionError> {
        let previous = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(1)
            })
            .map_err(|_| StartSessionError::SessionIdOverflow)?;
        let id = SessionId(previous + 1);

        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = sweep_idle(&mut sessions, now, self.idle_timeout);
        if evicted > 0 {
            tracing::info!(evicted, live = sessions.len(), "idle sessions dropped");
        }
        sessions.insert(
            id,
            SessionEntry {
                session: Arc::new(tokio::sync::Mutex::new(SessionState::new())),
                last_touched: now,
            },
        );
        Ok(id)
    }

    /// Looks up a session and marks it as used.
    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get_mut(&id)?;
        entry.last_touched = Instant::now();
        Some(entry.session.clone())
    }

    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Drops every session idle for at least the timeout as of `now`.
    /// A pass already running on a dropped session finishes on its own handle.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sweep_idle(&mut sessions, now, self.idle_timeout)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn with_next_id_for_test(next_id: u64) -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(next_id)),
            ..Self::default()
        }
    }
}

fn sweep_idle(
    sessions: &mut HashMap<SessionId, SessionEntry>,
    now: Instant,
    idle_timeout: Duration,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| now.saturating_duration_since(entry.last_touched) < idle_timeout);
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use snapshot::{MarketCache, OracleId, OracleSource};
    use whatif::{Adjustment, AdjustmentMode};

    use super::{SessionId, SessionState, SessionStore, StartSessionError, WidgetKey};

    fn price_key() -> WidgetKey {
        WidgetKey::Price(OracleId::new("sol-feed", OracleSource::PythPull))
    }

    #[test]
    fn store_issues_increasing_ids() {
        let store = SessionStore::new();

        assert_eq!(store.create().unwrap(), SessionId(1));
        assert_eq!(store.create().unwrap(), SessionId(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_reports_overflow_at_u64_max() {
        let store = SessionStore::with_next_id_for_test(u64::MAX);

        assert_eq!(store.create().unwrap_err(), StartSessionError::SessionIdOverflow);
    }

    #[test]
    fn removed_sessions_are_gone() {
        let store = SessionStore::new();
        let id = store.create().unwrap();

        assert!(store.remove(id));
        assert!(store.get(id).is_none());
        assert!(!store.remove(id));
    }

    #[test]
    fn idle_sessions_are_swept_on_create() {
        let store = SessionStore::with_idle_timeout(Duration::ZERO);
        let first = store.create().unwrap();

        let second = store.create().unwrap();

        assert!(store.get(first).is_none());
        assert!(store.get(second).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evict_idle_keeps_recently_used_sessions() {
        let store = SessionStore::with_idle_timeout(Duration::from_secs(60));
        let id = store.create().unwrap();
        let now = Instant::now();

        assert_eq!(store.evict_idle(now + Duration::from_secs(30)), 0);
        assert!(store.get(id).is_some());

        assert_eq!(store.evict_idle(Instant::now() + Duration::from_secs(61)), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn new_authority_clears_caches_and_widgets() {
        let mut state = SessionState::new();
        state.select_authority("first");
        state.select_sub_account(1);
        state.cache_markets(MarketCache::default());
        state.set_widget(price_key(), Adjustment::Value(80.0));
        state.set_widget(WidgetKey::Balance(0), Adjustment::Percentage(-10.0));

        assert!(state.select_authority("second"));

        assert!(state.market_cache().is_none());
        assert!(state.user().is_none());
        assert_eq!(state.sub_account_id(), None);
        assert_eq!(state.widget_count(), 0);
    }

    #[test]
    fn same_authority_keeps_everything() {
        let mut state = SessionState::new();
        state.select_authority("first");
        state.cache_markets(MarketCache::default());
        state.set_widget(price_key(), Adjustment::Value(80.0));

        assert!(!state.select_authority("first"));

        assert!(state.market_cache().is_some());
        assert_eq!(state.widget_count(), 1);
    }

    #[test]
    fn new_sub_account_clears_widgets_but_keeps_markets() {
        let mut state = SessionState::new();
        state.select_authority("first");
        state.select_sub_account(0);
        state.cache_markets(MarketCache::default());
        state.set_widget(price_key(), Adjustment::Value(80.0));

        assert!(state.select_sub_account(1));

        assert!(state.market_cache().is_some());
        assert_eq!(state.widget_count(), 0);
    }

    #[test]
    fn resolve_widget_prefers_fresh_input() {
        let mut state = SessionState::new();
        state.set_widget(price_key(), Adjustment::Value(90.0));

        let resolved = state.resolve_widget(price_key(), 100.0, Some(80.0)).unwrap();

        assert_eq!(resolved, Adjustment::Value(80.0));
        assert_eq!(state.widget(&price_key()), Some(Adjustment::Value(80.0)));
    }

    #[test]
    fn resolve_widget_converts_stored_value_after_mode_switch() {
        let mut state = SessionState::new();
        state.set_widget(price_key(), Adjustment::Value(80.0));
        state.set_mode(AdjustmentMode::Percentage);

        let resolved = state.resolve_widget(price_key(), 100.0, None).unwrap();

        assert_eq!(resolved.mode(), AdjustmentMode::Percentage);
        assert!((resolved.amount() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn resolve_widget_seeds_untouched_widget() {
        let mut state = SessionState::new();

        let resolved = state.resolve_widget(WidgetKey::Balance(3), 12.0, None).unwrap();

        assert_eq!(resolved, Adjustment::Value(12.0));
    }
}
