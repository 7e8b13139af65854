use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{auth::AuthError, error, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid_credentials")]
	InvalidCredentials,
	#[error("email_taken")]
	EmailTaken,
	#[error("no_session")]
	NoSession,
	#[error("invalid_session")]
	InvalidSession,
	#[error("no_identity")]
	NoIdentity,
	#[error("password_hash_failed")]
	Hash(#[source] argon2::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/register", post_with(register, register_docs))
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", post_with(logout, logout_docs))
		.api_route("/session", get_with(get_session, get_session_docs))
		.api_route("/me", get_with(get_me, get_me_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidCredentials | Self::NoSession | Self::InvalidSession | Self::NoIdentity => {
				StatusCode::UNAUTHORIZED
			}
			Self::EmailTaken => StatusCode::CONFLICT,
			Self::Hash(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		let message = match self {
			Self::InvalidCredentials => "이메일 또는 비밀번호가 올바르지 않습니다.",
			Self::EmailTaken => "이미 가입된 이메일입니다.",
			Self::NoSession => "로그인이 필요합니다.",
			Self::InvalidSession => "세션이 만료되었습니다. 다시 로그인해주세요.",
			Self::NoIdentity => "로그인하거나 익명 아이디를 발급받아주세요.",
			Self::Hash(..) => "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.",
		};

		let message = error::Message::new(self.to_string()).content(message);

		match self {
			Self::EmailTaken => message.field("email").into_vec(),
			_ => message.into_vec(),
		}
	}
}

impl From<AuthError> for RouteError {
	fn from(error: AuthError) -> Self {
		match error {
			AuthError::InvalidCredentials => Self::Route(Error::InvalidCredentials),
			AuthError::EmailTaken => Self::Route(Error::EmailTaken),
			AuthError::Hash(error) => Self::Route(Error::Hash(error)),
			AuthError::Storage(error) => error.into(),
		}
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_signup_flow() {
		let app = app(state());

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "john@smith.com",
				"password": "hunter2",
				"password_confirmation": "hunter2",
			}))
			.await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let session = response.json::<Value>();

		assert_eq!(session["authenticated"], true);

		let me = app.get("/auth/me").await;
		let profile = me.json::<Value>();

		assert_eq!(me.status_code(), StatusCode::OK);
		assert_eq!(profile["account_id"], session["account_id"]);
		assert!(profile["nickname"].as_str().unwrap().starts_with("user_"));
		assert_eq!(
			profile["display_name"],
			crate::namer::derive_display_name(session["account_id"].as_str().unwrap())
		);

		let response = app.post("/auth/logout").await;

		assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

		let response = app.get("/auth/session").await;

		assert_eq!(response.json::<Value>(), json!({ "authenticated": false }));
		assert_eq!(app.get("/auth/me").await.status_code(), StatusCode::UNAUTHORIZED);

		let response = app
			.post("/auth/login")
			.json(&json!({
				"email": "john@smith.com",
				"password": "hunter2",
			}))
			.await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let relogged = app.get("/auth/me").await.json::<Value>();

		assert_eq!(relogged, profile);
	}

	#[tokio::test]
	async fn test_password_mismatch_never_reaches_auth() {
		let state = state();
		let app = app(state.clone());

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "jane@smith.com",
				"password": "hunter2",
				"password_confirmation": "hunter3",
			}))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(
			response.json::<Value>()["errors"][0]["field"],
			"password_confirmation"
		);

		let response = app
			.post("/auth/login")
			.json(&json!({
				"email": "jane@smith.com",
				"password": "hunter2",
			}))
			.await;

		assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(
			response.json::<Value>()["errors"][0]["code"],
			"invalid_credentials"
		);
	}

	#[tokio::test]
	async fn test_register_rejects_bad_input_and_duplicates() {
		let app = app(state());

		for body in [
			json!({ "email": "not-an-email", "password": "hunter2", "password_confirmation": "hunter2" }),
			json!({ "email": "a@b.com", "password": "12345", "password_confirmation": "12345" }),
		] {
			let response = app.post("/auth/register").json(&body).await;

			assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		}

		register(&app, "dup@smith.com").await;

		let response = app
			.post("/auth/register")
			.json(&json!({
				"email": "DUP@smith.com",
				"password": "hunter2",
				"password_confirmation": "hunter2",
			}))
			.await;

		assert_eq!(response.status_code(), StatusCode::CONFLICT);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "email_taken");
	}

	#[tokio::test]
	async fn test_session_state_is_explicit() {
		let app = app(state());

		let response = app.get("/auth/session").await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert_eq!(response.json::<Value>(), json!({ "authenticated": false }));

		let session = register(&app, "state@smith.com").await;
		let response = app.get("/auth/session").await.json::<Value>();

		assert_eq!(response, session);
		assert_eq!(response["authenticated"], true);
		assert!(response["nickname"].is_string());
		assert!(response["display_name"].is_string());
	}

	#[tokio::test]
	async fn test_unknown_session_cookie_is_unauthorized() {
		let app = app(state());

		let response = app
			.get("/auth/me")
			.add_cookie(crate::session::create_cookie(uuid::Uuid::new_v4(), false))
			.await;

		assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(
			response.json::<Value>()["errors"][0]["code"],
			"invalid_session"
		);
	}
}
