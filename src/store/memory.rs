use std::collections::HashMap;

use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::{NewPost, NewProfile, Post, Profile, Storage, StoreError};
use crate::auth::{self, AuthError, AuthEvent, AuthProvider, SessionGrant};

struct Account {
	id: Uuid,
	password: [u8; auth::KEY_LENGTH],
}

#[derive(Default)]
struct Inner {
	posts: HashMap<Uuid, Post>,
	/// Post ids in creation order.
	order: Vec<Uuid>,
	profiles: HashMap<Uuid, Profile>,
	/// Accounts keyed by email.
	accounts: HashMap<String, Account>,
	/// Session id to account id.
	sessions: HashMap<Uuid, Uuid>,
}

/// A process-local store for development and tests.
///
/// Nothing survives a restart.
pub struct MemoryStore {
	inner: Mutex<Inner>,
	hasher: Argon2<'static>,
	events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::with_hasher(Argon2::default())
	}

	#[must_use]
	pub fn with_hasher(hasher: Argon2<'static>) -> Self {
		Self {
			inner: Mutex::default(),
			hasher,
			events: broadcast::channel(auth::EVENT_CAPACITY).0,
		}
	}

	fn open_session(inner: &mut Inner, account_id: Uuid) -> SessionGrant {
		let grant = SessionGrant {
			id: Uuid::new_v4(),
			account_id,
			created_at: Utc::now(),
		};

		inner.sessions.insert(grant.id, account_id);
		grant
	}
}

#[async_trait]
impl Storage for MemoryStore {
	async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
		let post = Post {
			id: Uuid::new_v4(),
			author_id: post.author_id,
			content: post.content,
			visibility: post.visibility,
			like_count: 0,
			reply_count: 0,
			created_at: Utc::now(),
		};

		let mut inner = self.inner.lock().await;

		inner.order.push(post.id);
		inner.posts.insert(post.id, post.clone());

		Ok(post)
	}

	async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
		Ok(self.inner.lock().await.posts.get(&id).cloned())
	}

	async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
		let inner = self.inner.lock().await;
		let limit = usize::try_from(limit).unwrap_or(0);
		let offset = usize::try_from(offset).unwrap_or(0);

		Ok(inner
			.order
			.iter()
			.rev()
			.skip(offset)
			.take(limit)
			.filter_map(|id| inner.posts.get(id).cloned())
			.collect())
	}

	async fn set_like_count(
		&self,
		id: Uuid,
		expected: i64,
		next: i64,
	) -> Result<Option<Post>, StoreError> {
		let mut inner = self.inner.lock().await;

		Ok(match inner.posts.get_mut(&id) {
			Some(post) if post.like_count == expected => {
				post.like_count = next;
				Some(post.clone())
			}
			_ => None,
		})
	}

	async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
		let mut inner = self.inner.lock().await;

		if let Some(existing) = inner.profiles.get(&profile.id) {
			return Ok(existing.clone());
		}

		if inner
			.profiles
			.values()
			.any(|existing| existing.nickname == profile.nickname)
		{
			return Err(StoreError::NicknameTaken(profile.nickname));
		}

		let stored = Profile {
			id: profile.id,
			nickname: profile.nickname,
			display_name: profile.display_name,
			created_at: Utc::now(),
		};

		inner.profiles.insert(stored.id, stored.clone());
		Ok(stored)
	}

	async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
		Ok(self.inner.lock().await.profiles.get(&id).cloned())
	}

	async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
		let inner = self.inner.lock().await;

		Ok(ids
			.iter()
			.filter_map(|id| inner.profiles.get(id).cloned())
			.collect())
	}
}

#[async_trait]
impl AuthProvider for MemoryStore {
	async fn register(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
		let account_id = Uuid::new_v4();
		let hashed = auth::hash_password(&self.hasher, password, &account_id)?;

		let grant = {
			let mut inner = self.inner.lock().await;

			if inner.accounts.contains_key(email) {
				return Err(AuthError::EmailTaken);
			}

			inner.accounts.insert(
				email.to_owned(),
				Account {
					id: account_id,
					password: hashed,
				},
			);

			Self::open_session(&mut inner, account_id)
		};

		auth::publish(&self.events, AuthEvent::Registered { account_id });
		auth::publish(
			&self.events,
			AuthEvent::SignedIn {
				session_id: grant.id,
				account_id,
			},
		);

		Ok(grant)
	}

	async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
		let account = self
			.inner
			.lock()
			.await
			.accounts
			.get(email)
			.map(|account| (account.id, account.password));

		let Some((account_id, stored)) = account else {
			return Err(AuthError::InvalidCredentials);
		};

		// Hashed with the lock released.
		if auth::hash_password(&self.hasher, password, &account_id)? != stored {
			return Err(AuthError::InvalidCredentials);
		}

		let grant = Self::open_session(&mut *self.inner.lock().await, account_id);

		auth::publish(
			&self.events,
			AuthEvent::SignedIn {
				session_id: grant.id,
				account_id,
			},
		);

		Ok(grant)
	}

	async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
		let removed = self.inner.lock().await.sessions.remove(&session_id);

		if let Some(account_id) = removed {
			auth::publish(
				&self.events,
				AuthEvent::SignedOut {
					session_id,
					account_id,
				},
			);
		}

		Ok(())
	}

	async fn account(&self, session_id: Uuid) -> Result<Option<Uuid>, AuthError> {
		Ok(self.inner.lock().await.sessions.get(&session_id).copied())
	}

	fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
		self.events.subscribe()
	}
}
