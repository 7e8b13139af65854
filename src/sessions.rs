use std::{collections::HashMap, sync::Arc, time::Duration};

use schemars::JsonSchema;
use serde::Serialize;
use tokio::{
	sync::{broadcast::error::RecvError, RwLock},
	task::JoinHandle,
	time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
	auth::{AuthError, AuthEvent, AuthProvider},
	profile,
	store::{Profile, Storage},
};

/// How long a cached session is trusted before the auth provider is asked again.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// What a handler knows about the signed-in account behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SessionState {
	pub account_id: Uuid,
	pub nickname: String,
	pub display_name: String,
}

impl From<Profile> for SessionState {
	fn from(profile: Profile) -> Self {
		Self {
			account_id: profile.id,
			nickname: profile.nickname,
			display_name: profile.display_name,
		}
	}
}

struct Entry {
	state: SessionState,
	cached_at: Instant,
}

impl Entry {
	fn new(state: SessionState) -> Self {
		Self {
			state,
			cached_at: Instant::now(),
		}
	}
}

/// Cache of open sessions, kept current by the auth provider's events.
///
/// Entries expire after `ttl`, so sessions closed by another process (whose
/// events never arrive here) stop authenticating, and abandoned ones are dropped.
pub struct SessionDirectory {
	sessions: RwLock<HashMap<Uuid, Entry>>,
	ttl: Duration,
}

impl Default for SessionDirectory {
	fn default() -> Self {
		Self::new(DEFAULT_TTL)
	}
}

impl SessionDirectory {
	pub fn new(ttl: Duration) -> Self {
		Self {
			sessions: RwLock::default(),
			ttl,
		}
	}

	fn is_fresh(&self, entry: &Entry) -> bool {
		entry.cached_at.elapsed() < self.ttl
	}

	pub async fn get(&self, session_id: Uuid) -> Option<SessionState> {
		self.sessions
			.read()
			.await
			.get(&session_id)
			.filter(|entry| self.is_fresh(entry))
			.map(|entry| entry.state.clone())
	}

	pub async fn insert(&self, session_id: Uuid, state: SessionState) {
		self.sessions
			.write()
			.await
			.insert(session_id, Entry::new(state));
	}

	pub async fn evict(&self, session_id: Uuid) {
		self.sessions.write().await.remove(&session_id);
	}

	/// Drops expired entries, returning how many were removed.
	pub async fn prune(&self) -> usize {
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();

		sessions.retain(|_, entry| self.is_fresh(entry));
		before - sessions.len()
	}

	/// Looks up a session, consulting the auth provider on a miss or once the
	/// cached entry has expired.
	///
	/// Returns `None` for sessions the provider does not know.
	pub async fn resolve(
		&self,
		session_id: Uuid,
		auth: &dyn AuthProvider,
		storage: &dyn Storage,
	) -> Result<Option<SessionState>, AuthError> {
		if let Some(state) = self.get(session_id).await {
			return Ok(Some(state));
		}

		let Some(account_id) = auth.account(session_id).await? else {
			self.evict(session_id).await;
			return Ok(None);
		};

		let state = SessionState::from(profile::ensure(storage, account_id).await?);

		// The session is checked again while holding the write lock: a logout
		// that finished during the profile lookup is seen here, and one still
		// in flight evicts only after this insert.
		let mut sessions = self.sessions.write().await;

		if auth.account(session_id).await? != Some(account_id) {
			sessions.remove(&session_id);
			return Ok(None);
		}

		sessions.insert(session_id, Entry::new(state.clone()));
		Ok(Some(state))
	}

	/// Applies auth events to the cache until the provider goes away, pruning
	/// expired entries along the way.
	pub fn watch(
		self: Arc<Self>,
		auth: &dyn AuthProvider,
		storage: Arc<dyn Storage>,
	) -> JoinHandle<()> {
		let mut events = auth.subscribe();
		let mut prune = tokio::time::interval(self.ttl.max(Duration::from_secs(1)));

		prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

		tokio::spawn(async move {
			loop {
				tokio::select! {
					event = events.recv() => match event {
						Ok(event) => self.apply(event, storage.as_ref()).await,
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "session directory lagged, flushing");
							self.sessions.write().await.clear();
						}
						Err(RecvError::Closed) => break,
					},
					_ = prune.tick() => {
						let removed = self.prune().await;

						if removed > 0 {
							tracing::debug!(removed, "expired cached sessions");
						}
					}
				}
			}
		})
	}

	async fn apply(&self, event: AuthEvent, storage: &dyn Storage) {
		match event {
			AuthEvent::Registered { account_id } => {
				tracing::info!(%account_id, "account registered");
			}
			AuthEvent::SignedIn {
				session_id,
				account_id,
			} => match profile::ensure(storage, account_id).await {
				Ok(profile) => self.insert(session_id, profile.into()).await,
				Err(error) => {
					tracing::warn!(%account_id, %error, "could not load profile for new session");
				}
			},
			AuthEvent::SignedOut {
				session_id,
				account_id,
			} => {
				tracing::debug!(%account_id, "session closed");
				self.evict(session_id).await;
			}
		}
	}
}
