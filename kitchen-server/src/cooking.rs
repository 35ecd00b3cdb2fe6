//! Live cooking-mode sessions.
//!
//! Each session runs the [`CookingSession`] state machine from the core crate. While a step
//! timer is running, a background task ticks it once per tick interval and queues any
//! completion so the client can collect it with its next poll. Sessions nobody touches for
//! [`IDLE_TTL`] are swept away.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use kitchen::{
    cooking::{CookingEvent, CookingInput, CookingSession, CookingView},
    models::Recipe,
};
use rand::Rng;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

pub type CookingSessionID = String;

/// A session unused for this long is dropped by the sweeper.
pub const IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const SWEEP_EVERY: Duration = Duration::from_secs(5 * 60);

pub struct LiveSession {
    session: CookingSession,
    /// Timer completions not yet collected by the client.
    pending: Vec<CookingEvent>,
    ticker: Option<JoinHandle<()>>,
    /// The timer generation the current ticker was started for.
    ticker_generation: u64,
    last_used: Instant,
}

impl LiveSession {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

struct Entry {
    owner: String,
    live: Arc<Mutex<LiveSession>>,
}

#[derive(Debug, Serialize)]
pub struct Started {
    pub session_id: CookingSessionID,
    pub view: CookingView,
}

#[derive(Debug, Serialize)]
pub struct Handled {
    pub view: CookingView,
    pub events: Vec<CookingEvent>,
}

/// All live sessions, keyed by a random id and owned by the user who started them.
#[derive(Clone)]
pub struct CookingSessions {
    sessions: Arc<DashMap<CookingSessionID, Entry>>,
    tick: Duration,
}

impl Default for CookingSessions {
    fn default() -> Self {
        Self::with_tick(Duration::from_secs(1))
    }
}

impl CookingSessions {
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            sessions: Default::default(),
            tick,
        }
    }

    /// Enter cooking mode. `None` when the recipe has no steps.
    pub fn start(&self, owner: &str, recipe: Recipe) -> Option<Started> {
        let session = CookingSession::start(recipe)?;
        let view = session.view();
        let id: [u8; 16] = rand::thread_rng().gen();
        let session_id = hex::encode(id);
        let live = LiveSession {
            session,
            pending: vec![],
            ticker: None,
            ticker_generation: 0,
            last_used: Instant::now(),
        };
        self.sessions.insert(
            session_id.clone(),
            Entry {
                owner: owner.to_string(),
                live: Arc::new(Mutex::new(live)),
            },
        );
        tracing::info!(%session_id, owner, "Started cooking session");
        Some(Started { session_id, view })
    }

    /// Someone else's session looks exactly like a missing one.
    fn find(&self, owner: &str, id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        let entry = self.sessions.get(id)?;
        (entry.owner == owner).then(|| entry.live.clone())
    }

    pub async fn view(&self, owner: &str, id: &str) -> Option<CookingView> {
        let live = self.find(owner, id)?;
        let mut live = live.lock().await;
        live.last_used = Instant::now();
        Some(live.session.view())
    }

    /// Apply one input. A session that exits is removed.
    pub async fn handle(&self, owner: &str, id: &str, input: CookingInput) -> Option<Handled> {
        let shared = self.find(owner, id)?;
        let mut live = shared.lock().await;
        live.last_used = Instant::now();
        let mut events = std::mem::take(&mut live.pending);
        events.extend(live.session.handle(input));
        let view = live.session.view();
        if live.session.is_active() {
            self.sync_ticker(&shared, &mut live);
        } else {
            live.stop_ticker();
            drop(live);
            self.sessions.remove(id);
            tracing::info!(session_id = id, "Cooking session exited");
        }
        Some(Handled { view, events })
    }

    /// Collect the timer completions queued since the last call.
    pub async fn drain_events(&self, owner: &str, id: &str) -> Option<Vec<CookingEvent>> {
        let live = self.find(owner, id)?;
        let mut live = live.lock().await;
        live.last_used = Instant::now();
        Some(std::mem::take(&mut live.pending))
    }

    /// Leave cooking mode and forget the session.
    pub async fn end(&self, owner: &str, id: &str) -> bool {
        self.handle(owner, id, CookingInput::Exit).await.is_some()
    }

    /// Drop every session a user holds, e.g. when the account goes away.
    pub fn end_all_for(&self, owner: &str) {
        self.sessions.retain(|_, entry| entry.owner != owner);
    }

    /// Drop sessions unused for at least `ttl`. A session locked right now is in use.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| match entry.live.try_lock() {
            Ok(live) => now.duration_since(live.last_used) < ttl,
            Err(_) => true,
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Sweep idle sessions every [`SWEEP_EVERY`] for as long as the runtime lives.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let sessions = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + SWEEP_EVERY, SWEEP_EVERY);
            loop {
                interval.tick().await;
                let evicted = sessions.evict_idle(IDLE_TTL);
                if evicted > 0 {
                    tracing::info!(evicted, "Dropped idle cooking sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keep exactly one ticker alive while the timer runs, bound to the current generation.
    fn sync_ticker(&self, shared: &Arc<Mutex<LiveSession>>, live: &mut LiveSession) {
        let (running, generation) = {
            let timer = live.session.timer();
            (timer.is_running(), timer.generation())
        };
        if !running {
            live.stop_ticker();
            return;
        }
        let alive = live.ticker.as_ref().is_some_and(|t| !t.is_finished());
        if alive && live.ticker_generation == generation {
            return;
        }
        live.stop_ticker();
        live.ticker_generation = generation;
        live.ticker = Some(tokio::spawn(tick_until_done(
            Arc::downgrade(shared),
            generation,
            self.tick,
        )));
    }
}

async fn tick_until_done(
    live: std::sync::Weak<Mutex<LiveSession>>,
    generation: u64,
    tick: Duration,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    loop {
        interval.tick().await;
        let Some(shared) = live.upgrade() else {
            return;
        };
        let mut live = shared.lock().await;
        let timer = live.session.timer();
        if timer.generation() != generation || !timer.is_running() {
            return;
        }
        let events = live.session.handle(CookingInput::Tick);
        live.pending.extend(events);
        if !live.session.timer().is_running() {
            // Finished: the handle is dropped here instead of aborting ourselves.
            live.ticker.take();
            return;
        }
    }
}
