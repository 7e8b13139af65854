use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::store::StoreError;

pub const KEY_LENGTH: usize = 32;

/// Capacity of the auth event channel before slow observers start lagging.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("invalid email or password")]
	InvalidCredentials,
	#[error("email already registered")]
	EmailTaken,
	#[error("password hashing error: {0}")]
	Hash(#[from] argon2::Error),
	#[error(transparent)]
	Storage(#[from] StoreError),
}

/// A freshly opened session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGrant {
	pub id: Uuid,
	pub account_id: Uuid,
	pub created_at: DateTime<Utc>,
}

/// Published whenever the set of signed-in sessions changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
	Registered { account_id: Uuid },
	SignedIn { session_id: Uuid, account_id: Uuid },
	SignedOut { session_id: Uuid, account_id: Uuid },
}

/// Account registration and session issuance.
#[async_trait]
pub trait AuthProvider: Send + Sync {
	/// Creates an account and signs it in.
	async fn register(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError>;

	async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError>;

	/// Ends a session. Unknown sessions are ignored.
	async fn logout(&self, session_id: Uuid) -> Result<(), AuthError>;

	/// The account that owns the session, if it is still open.
	async fn account(&self, session_id: Uuid) -> Result<Option<Uuid>, AuthError>;

	fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Hashes a password with Argon2, using the account id as a salt.
pub fn hash_password(
	hasher: &Argon2,
	password: &str,
	account_id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), account_id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Publishes an event, ignoring the case where nobody is listening.
pub(crate) fn publish(events: &broadcast::Sender<AuthEvent>, event: AuthEvent) {
	if events.send(event).is_err() {
		tracing::trace!(?event, "no auth event subscribers");
	}
}
