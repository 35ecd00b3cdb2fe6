//! Open recipe editors, one per create or edit page a user has open.
//!
//! Each editor wraps [`RecipeEditor`] over the user's draft table, so edits sent by the page
//! are autosaved after a quiet second and an unfinished draft comes back the next time the
//! same recipe is opened.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kitchen::{editor::RecipeEditor, form::RecipeForm};
use rand::Rng;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use crate::drafts::SqliteDraftStorage;

pub type EditorID = String;

/// An editor unused for this long is flushed and dropped by the sweeper.
pub const EDITOR_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const SWEEP_EVERY: Duration = Duration::from_secs(5 * 60);

pub struct LiveEditor {
    pub editor: RecipeEditor<SqliteDraftStorage>,
    last_used: Instant,
}

struct Entry {
    owner: String,
    live: Arc<Mutex<LiveEditor>>,
}

#[derive(Debug, Serialize)]
pub struct Opened {
    pub editor_id: EditorID,
    pub form: RecipeForm,
    /// Set when an unfinished draft replaced the starting values.
    pub restored_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct EditorSessions {
    editors: Arc<DashMap<EditorID, Entry>>,
}

impl EditorSessions {
    pub fn open(&self, owner: &str, editor: RecipeEditor<SqliteDraftStorage>) -> Opened {
        let id: [u8; 16] = rand::thread_rng().gen();
        let editor_id = hex::encode(id);
        let opened = Opened {
            editor_id: editor_id.clone(),
            form: editor.form().clone(),
            restored_at: editor.restored_at(),
        };
        self.editors.insert(
            editor_id,
            Entry {
                owner: owner.to_string(),
                live: Arc::new(Mutex::new(LiveEditor {
                    editor,
                    last_used: Instant::now(),
                })),
            },
        );
        tracing::debug!(editor_id = %opened.editor_id, owner, "Opened recipe editor");
        opened
    }

    /// Someone else's editor looks exactly like a missing one.
    /// Finding an editor counts as using it.
    pub async fn find(&self, owner: &str, id: &str) -> Option<Arc<Mutex<LiveEditor>>> {
        let live = {
            let entry = self.editors.get(id)?;
            if entry.owner != owner {
                return None;
            }
            entry.live.clone()
        };
        live.lock().await.last_used = Instant::now();
        Some(live)
    }

    /// Forget an editor. Unwritten edits, and `last` when given, go to the draft first.
    pub async fn close(&self, owner: &str, id: &str, last: Option<RecipeForm>) -> bool {
        let Some(live) = self.find(owner, id).await else {
            return false;
        };
        {
            let mut live = live.lock().await;
            if let Some(form) = last {
                live.editor.edit(|f| *f = form);
            }
            live.editor.flush();
        }
        self.editors.remove(id);
        true
    }

    pub fn close_all_for(&self, owner: &str) {
        self.editors.retain(|_, entry| entry.owner != owner);
    }

    /// Drop editors unused for at least `ttl`, flushing their pending edits.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.editors.len();
        self.editors
            .retain(|_, entry| match entry.live.try_lock() {
                Ok(mut live) if now.duration_since(live.last_used) >= ttl => {
                    live.editor.flush();
                    false
                }
                _ => true,
            });
        before.saturating_sub(self.editors.len())
    }

    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let editors = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + SWEEP_EVERY, SWEEP_EVERY);
            loop {
                interval.tick().await;
                let evicted = editors.evict_idle(EDITOR_IDLE_TTL);
                if evicted > 0 {
                    tracing::info!(evicted, "Dropped idle recipe editors");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}
