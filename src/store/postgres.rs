use std::time::Duration;

use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{NewPost, NewProfile, Post, Profile, Storage, StoreError};
use crate::auth::{self, AuthError, AuthEvent, AuthProvider, SessionGrant};

pub type Database = sqlx::Pool<sqlx::Postgres>;

const POST_COLUMNS: &str = "id, author_id, content, visibility, like_count, reply_count, created_at";

/// A post as it comes off the wire, before its enum columns are checked.
#[derive(sqlx::FromRow)]
struct PostRow {
	id: Uuid,
	author_id: Uuid,
	content: String,
	visibility: String,
	like_count: i64,
	reply_count: i64,
	created_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
	type Error = StoreError;

	fn try_from(row: PostRow) -> Result<Self, Self::Error> {
		if row.like_count < 0 || row.reply_count < 0 {
			return Err(StoreError::Malformed(format!(
				"post {} has a negative counter",
				row.id
			)));
		}

		Ok(Self {
			id: row.id,
			author_id: row.author_id,
			content: row.content,
			visibility: row.visibility.parse()?,
			like_count: row.like_count,
			reply_count: row.reply_count,
			created_at: row.created_at,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
	id: Uuid,
	nickname: String,
	display_name: String,
	created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
	fn from(row: ProfileRow) -> Self {
		Self {
			id: row.id,
			nickname: row.nickname,
			display_name: row.display_name,
			created_at: row.created_at,
		}
	}
}

#[derive(sqlx::FromRow)]
struct SessionRow {
	id: Uuid,
	account_id: Uuid,
	created_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionGrant {
	fn from(row: SessionRow) -> Self {
		Self {
			id: row.id,
			account_id: row.account_id,
			created_at: row.created_at,
		}
	}
}

/// PostgreSQL-backed storage and authentication.
pub struct PgStore {
	database: Database,
	hasher: Argon2<'static>,
	events: broadcast::Sender<AuthEvent>,
}

impl PgStore {
	/// Connects to the database and applies pending migrations.
	pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
		let database = PgPoolOptions::new()
			.acquire_timeout(acquire_timeout)
			.connect(url)
			.await?;

		sqlx::migrate!("./migrations").run(&database).await?;

		Ok(Self {
			database,
			hasher: Argon2::default(),
			events: broadcast::channel(auth::EVENT_CAPACITY).0,
		})
	}
}

#[async_trait]
impl Storage for PgStore {
	async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
		let row = sqlx::query_as::<_, PostRow>(&format!(
			r#"
				INSERT INTO post (author_id, content, visibility)
				VALUES ($1, $2, $3)
				RETURNING {POST_COLUMNS}
			"#
		))
		.bind(post.author_id)
		.bind(post.content)
		.bind(post.visibility.as_str())
		.fetch_one(&self.database)
		.await?;

		row.try_into()
	}

	async fn post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
		let row = sqlx::query_as::<_, PostRow>(&format!(
			"SELECT {POST_COLUMNS} FROM post WHERE id = $1"
		))
		.bind(id)
		.fetch_optional(&self.database)
		.await?;

		row.map(Post::try_from).transpose()
	}

	async fn posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, StoreError> {
		let rows = sqlx::query_as::<_, PostRow>(&format!(
			r#"
				SELECT {POST_COLUMNS} FROM post
				WHERE parent_id IS NULL
				ORDER BY created_at DESC
				LIMIT $1 OFFSET $2
			"#
		))
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.database)
		.await?;

		rows.into_iter().map(Post::try_from).collect()
	}

	async fn set_like_count(
		&self,
		id: Uuid,
		expected: i64,
		next: i64,
	) -> Result<Option<Post>, StoreError> {
		let row = sqlx::query_as::<_, PostRow>(&format!(
			r#"
				UPDATE post SET like_count = $3
				WHERE id = $1 AND like_count = $2
				RETURNING {POST_COLUMNS}
			"#
		))
		.bind(id)
		.bind(expected)
		.bind(next)
		.fetch_optional(&self.database)
		.await?;

		row.map(Post::try_from).transpose()
	}

	async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
		let inserted = sqlx::query_as::<_, ProfileRow>(
			r#"
				INSERT INTO profile (id, nickname, display_name)
				VALUES ($1, $2, $3)
				ON CONFLICT (id) DO NOTHING
				RETURNING id, nickname, display_name, created_at
			"#,
		)
		.bind(profile.id)
		.bind(&profile.nickname)
		.bind(&profile.display_name)
		.fetch_optional(&self.database)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref d) if d.constraint() == Some("profile_nickname_key") => {
				StoreError::NicknameTaken(profile.nickname.clone())
			}
			e => e.into(),
		})?;

		if let Some(row) = inserted {
			return Ok(row.into());
		}

		self.profile(profile.id).await?.ok_or_else(|| {
			StoreError::Malformed(format!("profile {} vanished after conflict", profile.id))
		})
	}

	async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
		let row = sqlx::query_as::<_, ProfileRow>(
			"SELECT id, nickname, display_name, created_at FROM profile WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.database)
		.await?;

		Ok(row.map(Profile::from))
	}

	async fn profiles(&self, ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
		let rows = sqlx::query_as::<_, ProfileRow>(
			"SELECT id, nickname, display_name, created_at FROM profile WHERE id = ANY($1)",
		)
		.bind(ids)
		.fetch_all(&self.database)
		.await?;

		Ok(rows.into_iter().map(Profile::from).collect())
	}
}

#[async_trait]
impl AuthProvider for PgStore {
	async fn register(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
		let account_id = Uuid::new_v4();
		let hashed = auth::hash_password(&self.hasher, password, &account_id)?;

		let mut tx = self.database.begin().await.map_err(StoreError::from)?;

		sqlx::query("INSERT INTO account (id, email, password) VALUES ($1, $2, $3)")
			.bind(account_id)
			.bind(email)
			.bind(&hashed[..])
			.execute(&mut *tx)
			.await
			.map_err(|e| match e {
				sqlx::Error::Database(ref d) if d.constraint() == Some("account_email_key") => {
					AuthError::EmailTaken
				}
				e => StoreError::from(e).into(),
			})?;

		let session = sqlx::query_as::<_, SessionRow>(
			"INSERT INTO session (account_id) VALUES ($1) RETURNING id, account_id, created_at",
		)
		.bind(account_id)
		.fetch_one(&mut *tx)
		.await
		.map_err(StoreError::from)?;

		tx.commit().await.map_err(StoreError::from)?;

		let grant = SessionGrant::from(session);

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
		let account: Option<(Uuid, Vec<u8>)> =
			sqlx::query_as("SELECT id, password FROM account WHERE email = $1")
				.bind(email)
				.fetch_optional(&self.database)
				.await
				.map_err(StoreError::from)?;

		let Some((account_id, stored)) = account else {
			return Err(AuthError::InvalidCredentials);
		};

		if auth::hash_password(&self.hasher, password, &account_id)?[..] != stored[..] {
			return Err(AuthError::InvalidCredentials);
		}

		let session = sqlx::query_as::<_, SessionRow>(
			"INSERT INTO session (account_id) VALUES ($1) RETURNING id, account_id, created_at",
		)
		.bind(account_id)
		.fetch_one(&self.database)
		.await
		.map_err(StoreError::from)?;

		let grant = SessionGrant::from(session);

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
		let account_id: Option<Uuid> =
			sqlx::query_scalar("DELETE FROM session WHERE id = $1 RETURNING account_id")
				.bind(session_id)
				.fetch_optional(&self.database)
				.await
				.map_err(StoreError::from)?;

		if let Some(account_id) = account_id {
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
		Ok(
			sqlx::query_scalar("SELECT account_id FROM session WHERE id = $1")
				.bind(session_id)
				.fetch_optional(&self.database)
				.await
				.map_err(StoreError::from)?,
		)
	}

	fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
		self.events.subscribe()
	}
}
