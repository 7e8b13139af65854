use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::broadcast, time::Instant};
use uuid::Uuid;

use super::{NewPost, NewProfile, Post, Profile, Storage, StoreError};
use crate::auth::{AuthError, AuthEvent, AuthProvider, SessionGrant};

/// Bounds every call into a collaborator by a fixed time limit.
///
/// An expired call becomes [`StoreError::Timeout`]. Dropping the inner future
/// on expiry is safe for every operation, including the conditional like update.
pub struct Deadline<T: ?Sized> {
	inner: Arc<T>,
	limit: Duration,
}

impl<T: ?Sized> Deadline<T> {
	pub fn new(inner: Arc<T>, limit: Duration) -> Self {
		Self { inner, limit }
	}

	async fn within<F, R, E>(&self, operation: &'static str, future: F) -> Result<R, E>
	where
		F: Future<Output = Result<R, E>> + Send,
		E: From<StoreError>,
	{
		let started = Instant::now();
		let result = tokio::time::timeout(self.limit, future).await;
		let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

		tracing::debug!(histogram.storage_latency_ms = elapsed, operation, "storage call");

		result.unwrap_or_else(|_| {
			tracing::warn!(operation, limit = ?self.limit, "storage call timed out");
			Err(StoreError::Timeout(self.limit).into())
		})
	}
}

#[async_trait]
impl Storage for Deadline<dyn Storage> {
	async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
		self.within("create_post", self.inner.create_post(post)).await
	}

	async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
		self.within("post", self.inner.post(id)).await
	}

	async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
		self.within("posts", self.inner.posts(limit, offset)).await
	}

	async fn set_like_count(
		&self,
		id: Uuid,
		expected: i64,
		next: i64,
	) -> Result<Option<Post>, StoreError> {
		self.within(
			"set_like_count",
			self.inner.set_like_count(id, expected, next),
		)
		.await
	}

	async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
		self.within("create_profile", self.inner.create_profile(profile))
			.await
	}

	async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
		self.within("profile", self.inner.profile(id)).await
	}

	async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
		self.within("profiles", self.inner.profiles(ids)).await
	}
}

#[async_trait]
impl AuthProvider for Deadline<dyn AuthProvider> {
	async fn register(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
		self.within("register", self.inner.register(email, password))
			.await
	}

	async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
		self.within("login", self.inner.login(email, password)).await
	}

	async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
		self.within("logout", self.inner.logout(session_id)).await
	}

	async fn account(&self, session_id: Uuid) -> Result<Option<Uuid>, AuthError> {
		self.within("account", self.inner.account(session_id)).await
	}

	fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
		self.inner.subscribe()
	}
}
