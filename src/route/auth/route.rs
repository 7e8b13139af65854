use aide::axum::IntoApiResponse;
use axum::{
	extract::State,
	http::{header, StatusCode},
};
use macros::route;

use crate::{
	auth::SessionGrant,
	extract::{Json, MaybeSession, Session},
	openapi::tag,
	profile, session,
	sessions::SessionState,
	AppState,
};

use super::{model, RouteError};

/// Emails are compared case-insensitively.
fn normalize(email: &str) -> String {
	email.trim().to_lowercase()
}

/// Loads the profile behind a fresh session and primes the session directory with it.
async fn open(state: &AppState, grant: SessionGrant) -> Result<SessionState, RouteError> {
	let session = SessionState::from(profile::ensure(state.storage.as_ref(), grant.account_id).await?);

	state.sessions.insert(grant.id, session.clone()).await;
	Ok(session)
}

/// Log in
/// Logs in to an account, returning an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::SessionView>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let grant = state.auth.login(&normalize(&auth.email), &auth.password).await?;
	let session = open(&state, grant).await?;
	let cookie = session::create_cookie(grant.id, state.config.secure_cookies);

	Ok((
		[(header::SET_COOKIE, cookie.to_string())],
		Json(model::SessionView::from(Some(session))),
	))
}

/// Log out
/// Logs out of the authenticated account and clears the session cookie.
#[route(tag = tag::AUTH, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	state.auth.logout(session.id).await?;
	state.sessions.evict(session.id).await;

	Ok((
		[(
			header::SET_COOKIE,
			session::clear_cookie(state.config.secure_cookies).to_string(),
		)],
		StatusCode::NO_CONTENT,
	))
}

/// Register account
/// Registers a new account with a fresh profile, returning an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::SessionView>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let grant = state
		.auth
		.register(&normalize(&auth.email), &auth.password)
		.await?;
	let session = open(&state, grant).await?;
	let cookie = session::create_cookie(grant.id, state.config.secure_cookies);

	Ok((
		[(header::SET_COOKIE, cookie.to_string())],
		Json(model::SessionView::from(Some(session))),
	))
}

/// Get session
/// Returns whether the request is signed in and, if so, the account's names.
#[route(tag = tag::AUTH)]
pub async fn get_session(MaybeSession(session): MaybeSession) -> Json<model::SessionView> {
	Json(session.map(|session| session.state).into())
}

/// Get profile
/// Returns the profile of the authenticated account.
#[route(tag = tag::AUTH)]
pub async fn get_me(
	State(state): State<AppState>,
	session: Session,
) -> Result<Json<model::Profile>, RouteError> {
	let profile = profile::ensure(state.storage.as_ref(), session.state.account_id).await?;

	Ok(Json(profile.into()))
}
