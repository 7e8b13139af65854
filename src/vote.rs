//! Race-free like counting.
//!
//! A vote reads the current count and writes `count + 1` conditionally on the
//! count being unchanged. A conflicting write from a concurrent vote makes the
//! condition fail, and the vote retries against the fresh value.

use std::{str::FromStr, sync::Arc};

use uuid::Uuid;

use crate::store::{Post, Storage, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
	Like,
}

impl FromStr for VoteKind {
	type Err = VoteError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"like" => Ok(Self::Like),
			other => Err(VoteError::UnsupportedVoteKind(other.to_owned())),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
	#[error("post {0} not found")]
	NotFound(Uuid),
	#[error("unsupported vote kind {0:?}")]
	UnsupportedVoteKind(String),
	#[error("storage unavailable: {0}")]
	StorageUnavailable(#[from] StoreError),
}

pub struct VoteCounter {
	storage: Arc<dyn Storage>,
	max_attempts: u32,
}

impl VoteCounter {
	pub fn new(storage: Arc<dyn Storage>, max_attempts: u32) -> Self {
		Self {
			storage,
			max_attempts: max_attempts.max(1),
		}
	}

	/// Applies one vote of `kind` to the post and returns its new state.
	///
	/// The kind is checked before anything is read, so a rejected vote never
	/// touches storage.
	pub async fn cast(&self, post_id: Uuid, kind: &str) -> Result<Post, VoteError> {
		match kind.parse::<VoteKind>()? {
			VoteKind::Like => self.increment_likes(post_id).await,
		}
	}

	async fn increment_likes(&self, post_id: Uuid) -> Result<Post, VoteError> {
		for attempt in 1..=self.max_attempts {
			let post = self
				.storage
				.post(post_id)
				.await?
				.ok_or(VoteError::NotFound(post_id))?;

			let next = post.like_count.checked_add(1).ok_or_else(|| {
				StoreError::Malformed(format!("like count of post {post_id} overflowed"))
			})?;

			if let Some(post) = self
				.storage
				.set_like_count(post_id, post.like_count, next)
				.await?
			{
				return Ok(post);
			}

			tracing::debug!(%post_id, attempt, "like count moved during vote, retrying");
		}

		tracing::warn!(%post_id, attempts = self.max_attempts, "giving up on contended vote");

		Err(StoreError::Contended {
			post: post_id,
			attempts: self.max_attempts,
		}
		.into())
	}
}

#[cfg(test)]
mod test {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use tokio::sync::Barrier;

	use super::*;
	use crate::store::{MemoryStore, NewPost, NewProfile, Profile, Visibility};

	/// Records calls and, for the first `gated` reads, holds each reader until
	/// all of them have read, forcing concurrent votes to see the same count.
	struct Interleaved {
		inner: MemoryStore,
		barrier: Barrier,
		gated: usize,
		reads: AtomicUsize,
		writes: AtomicUsize,
	}

	impl Interleaved {
		fn new(gated: usize) -> Self {
			Self {
				inner: MemoryStore::new(),
				barrier: Barrier::new(gated.max(1)),
				gated,
				reads: AtomicUsize::new(0),
				writes: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl Storage for Interleaved {
		async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
			self.inner.create_post(post).await
		}

		async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
			let post = self.inner.post(id).await;

			if self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
				self.barrier.wait().await;
			}

			post
		}

		async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
			self.inner.posts(limit, offset).await
		}

		async fn set_like_count(
			&self,
			id: Uuid,
			expected: i64,
			next: i64,
		) -> Result<Option<Post>, StoreError> {
			self.writes.fetch_add(1, Ordering::SeqCst);
			self.inner.set_like_count(id, expected, next).await
		}

		async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
			self.inner.create_profile(profile).await
		}

		async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
			self.inner.profile(id).await
		}

		async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
			self.inner.profiles(ids).await
		}
	}

	async fn seed(storage: &dyn Storage) -> Post {
		storage
			.create_post(NewPost {
				author_id: Uuid::new_v4(),
				content: "hello".into(),
				visibility: Visibility::Anonymous,
			})
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_concurrent_likes_are_not_lost() {
		let storage = Arc::new(Interleaved::new(2));
		let post = seed(storage.as_ref()).await;
		let counter = VoteCounter::new(storage.clone(), 5);

		let (a, b) = tokio::join!(counter.cast(post.id, "like"), counter.cast(post.id, "like"));

		let mut counts = [a.unwrap().like_count, b.unwrap().like_count];
		counts.sort_unstable();

		assert_eq!(counts, [1, 2]);
		assert_eq!(storage.post(post.id).await.unwrap().unwrap().like_count, 2);
		// the losing vote wrote once, failed, and wrote again
		assert_eq!(storage.writes.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_many_concurrent_likes() {
		let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
		let post = seed(storage.as_ref()).await;
		let counter = Arc::new(VoteCounter::new(storage.clone(), 64));

		let tasks = (0..32)
			.map(|_| {
				let counter = counter.clone();
				tokio::spawn(async move { counter.cast(post.id, "like").await })
			})
			.collect::<Vec<_>>();

		for task in tasks {
			task.await.unwrap().unwrap();
		}

		assert_eq!(storage.post(post.id).await.unwrap().unwrap().like_count, 32);
	}

	#[tokio::test]
	async fn test_missing_post_is_not_found_and_not_written() {
		let storage = Arc::new(Interleaved::new(0));
		let counter = VoteCounter::new(storage.clone(), 5);
		let id = Uuid::new_v4();

		let result = counter.cast(id, "like").await;

		assert!(matches!(result, Err(VoteError::NotFound(missing)) if missing == id));
		assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_unsupported_kind_touches_nothing() {
		let storage = Arc::new(Interleaved::new(0));
		let post = seed(storage.as_ref()).await;
		let counter = VoteCounter::new(storage.clone(), 5);

		let result = counter.cast(post.id, "dislike").await;

		assert!(matches!(result, Err(VoteError::UnsupportedVoteKind(kind)) if kind == "dislike"));
		assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
		assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_exhausted_retries_surface_as_contention() {
		/// The conditional write never applies.
		struct AlwaysMoving(MemoryStore);

		#[async_trait]
		impl Storage for AlwaysMoving {
			async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
				self.0.create_post(post).await
			}

			async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
				self.0.post(id).await
			}

			async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
				self.0.posts(limit, offset).await
			}

			async fn set_like_count(
				&self,
				_id: Uuid,
				_expected: i64,
				_next: i64,
			) -> Result<Option<Post>, StoreError> {
				Ok(None)
			}

			async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
				self.0.create_profile(profile).await
			}

			async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
				self.0.profile(id).await
			}

			async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
				self.0.profiles(ids).await
			}
		}

		let storage: Arc<dyn Storage> = Arc::new(AlwaysMoving(MemoryStore::new()));
		let post = seed(storage.as_ref()).await;
		let counter = VoteCounter::new(storage, 3);

		let result = counter.cast(post.id, "like").await;

		assert!(matches!(
			result,
			Err(VoteError::StorageUnavailable(StoreError::Contended { attempts: 3, .. }))
		));
	}
}
