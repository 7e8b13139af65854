mod deadline;
mod memory;
mod postgres;

pub use deadline::Deadline;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors raised by a storage backend.
///
/// Every variant is surfaced to clients as a retryable "storage unavailable" error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("nickname {0:?} is already taken")]
	NicknameTaken(String),
	#[error("malformed record: {0}")]
	Malformed(String),
	#[error("storage call timed out after {0:?}")]
	Timeout(Duration),
	#[error("like count of post {post} still contended after {attempts} attempts")]
	Contended { post: Uuid, attempts: u32 },
}

/// How the author of a post is presented to readers.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
	/// Shown under the author's derived anonymous name.
	#[default]
	Anonymous,
	/// Shown under the author's profile nickname.
	Nickname,
}

impl Visibility {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Anonymous => "anonymous",
			Self::Nickname => "nickname",
		}
	}
}

impl fmt::Display for Visibility {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Visibility {
	type Err = StoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"anonymous" => Ok(Self::Anonymous),
			"nickname" => Ok(Self::Nickname),
			other => Err(StoreError::Malformed(format!("unknown visibility {other:?}"))),
		}
	}
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
	pub id: Uuid,
	/// Account id, or the anonymous visitor id for posts made without an account.
	pub author_id: Uuid,
	pub content: String,
	pub visibility: Visibility,
	pub like_count: i64,
	/// Never written by this service.
	pub reply_count: i64,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
	pub author_id: Uuid,
	pub content: String,
	pub visibility: Visibility,
}

/// The display identity of a registered account. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
	pub id: Uuid,
	pub nickname: String,
	pub display_name: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
	pub id: Uuid,
	pub nickname: String,
	pub display_name: String,
}

/// Row storage for posts and profiles.
#[async_trait]
pub trait Storage: Send + Sync {
	async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

	async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

	/// Top-level posts, newest first.
	async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError>;

	/// Sets the like count to `next` only if it is still `expected`.
	///
	/// Returns `None` when the post is missing or the count has moved on.
	async fn set_like_count(
		&self,
		id: Uuid,
		expected: i64,
		next: i64,
	) -> Result<Option<Post>, StoreError>;

	/// Inserts the profile unless one already exists for the account,
	/// returning whichever profile is stored afterwards.
	///
	/// Fails with [`StoreError::NicknameTaken`] when another account holds the nickname.
	async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;

	async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

	async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError>;
}
