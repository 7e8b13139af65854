use rand::{distributions::Uniform, Rng};
use uuid::Uuid;

use crate::{
	namer,
	store::{NewProfile, Profile, Storage, StoreError},
};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LENGTH: usize = 6;

pub const NICKNAME_ATTEMPTS: u32 = 5;

/// Builds the one-time profile for an account: a random `user_` nickname and
/// the display name derived from the account id.
#[must_use]
pub fn provision(account_id: Uuid) -> NewProfile {
	let suffix = rand::thread_rng()
		.sample_iter(Uniform::from(0..SUFFIX_ALPHABET.len()))
		.take(SUFFIX_LENGTH)
		.map(|i| char::from(SUFFIX_ALPHABET[i]))
		.collect::<String>();

	NewProfile {
		id: account_id,
		nickname: format!("user_{suffix}"),
		display_name: namer::derive_display_name(&account_id.to_string()),
	}
}

/// Returns the account's profile, creating it on first use.
///
/// A nickname that clashes with another account's is redrawn, up to
/// [`NICKNAME_ATTEMPTS`] times.
pub async fn ensure(storage: &dyn Storage, account_id: Uuid) -> Result<Profile, StoreError> {
	if let Some(profile) = storage.profile(account_id).await? {
		return Ok(profile);
	}

	let mut attempt = 1;
	let profile = loop {
		match storage.create_profile(provision(account_id)).await {
			Err(StoreError::NicknameTaken(nickname)) if attempt < NICKNAME_ATTEMPTS => {
				tracing::debug!(%account_id, %nickname, attempt, "nickname taken, redrawing");
				attempt += 1;
			}
			result => break result?,
		}
	};

	tracing::info!(
		%account_id,
		nickname = %profile.nickname,
		display_name = %profile.display_name,
		"profile created"
	);

	Ok(profile)
}
