use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{sessions::SessionState, store};

/// The public profile of an account.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Profile {
	/// The account the profile belongs to.
	pub account_id: Uuid,
	/// The randomly assigned nickname, shown on `nickname` posts.
	pub nickname: String,
	/// The anonymous name derived from the account id.
	pub display_name: String,
	/// The creation time of the profile.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<store::Profile> for Profile {
	fn from(profile: store::Profile) -> Self {
		Self {
			account_id: profile.id,
			nickname: profile.nickname,
			display_name: profile.display_name,
			created_at: profile.created_at,
		}
	}
}

/// Whether the request is signed in, and as whom.
#[derive(Debug, Serialize, JsonSchema)]
pub struct SessionView {
	pub authenticated: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub account_id: Option<Uuid>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nickname: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
}

impl From<Option<SessionState>> for SessionView {
	fn from(state: Option<SessionState>) -> Self {
		match state {
			Some(state) => Self {
				authenticated: true,
				account_id: Some(state.account_id),
				nickname: Some(state.nickname),
				display_name: Some(state.display_name),
			},
			None => Self {
				authenticated: false,
				account_id: None,
				nickname: None,
				display_name: None,
			},
		}
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email(message = "올바른 이메일 주소를 입력해주세요."))]
	pub email: String,
	#[validate(length(min = 6, max = 128, message = "비밀번호는 6자 이상 128자 이하입니다."))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	#[validate(email(message = "올바른 이메일 주소를 입력해주세요."))]
	pub email: String,
	#[validate(length(min = 6, max = 128, message = "비밀번호는 6자 이상 128자 이하입니다."))]
	pub password: String,
	/// Must repeat `password` exactly.
	#[validate(must_match(other = "password", message = "비밀번호가 일치하지 않습니다."))]
	pub password_confirmation: String,
}
