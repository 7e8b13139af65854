use std::convert::Infallible;

use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::{SECURITY_SCHEME_SESSION, SECURITY_SCHEME_VISITOR},
	route::auth,
	session,
	sessions::SessionState,
	AppState,
};

/// Finds the value of the first cookie called `name`.
fn cookie_value(parts: &request::Parts, name: &str) -> Option<String> {
	parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == name)
		.map(|cookie| cookie.value().to_owned())
}

fn require(operation: &mut aide::openapi::Operation, scheme: &str) {
	operation
		.security
		.push([(scheme.to_string(), Vec::new())].into_iter().collect());
}

/// Extracts the session and the signed-in account's state from the request.
///
/// If there is no session cookie, a [`auth::Error::NoSession`] is returned.
/// If the session is unknown or closed, a [`auth::Error::InvalidSession`] is returned.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{}", session.state.display_name);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub state: SessionState,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	AppState: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session_id = cookie_value(parts, session::COOKIE_NAME).ok_or(auth::Error::NoSession)?;
		let session_id =
			Uuid::parse_str(&session_id).map_err(|_| auth::Error::InvalidSession)?;

		Self::resolve(session_id, &AppState::from_ref(state)).await
	}
}

impl Session {
	async fn resolve(id: Uuid, app: &AppState) -> Result<Self, RouteError<auth::Error>> {
		let state = app
			.sessions
			.resolve(id, app.auth.as_ref(), app.storage.as_ref())
			.await?
			.ok_or(auth::Error::InvalidSession)?;

		Ok(Self { id, state })
	}
}

impl OperationInput for Session {
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		require(operation, SECURITY_SCHEME_SESSION);
	}
}

/// A [`Session`] if the request carries a valid one.
///
/// Only storage failures are rejected; a missing or stale cookie yields `None`.
#[derive(Debug)]
pub struct MaybeSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
	AppState: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		match Session::from_request_parts(parts, state).await {
			Ok(session) => Ok(Self(Some(session))),
			Err(RouteError::Route(auth::Error::NoSession | auth::Error::InvalidSession)) => {
				Ok(Self(None))
			}
			Err(error) => Err(error),
		}
	}
}

impl OperationInput for MaybeSession {}

/// The anonymous visitor id carried in the visitor cookie.
///
/// A visitor without a (valid) cookie gets a fresh id, with `issued` set so the
/// handler knows to send the cookie back.
#[derive(Debug, Clone, Copy)]
pub struct Visitor {
	pub id: Uuid,
	pub issued: bool,
}

impl Visitor {
	fn from_parts(parts: &request::Parts) -> Option<Uuid> {
		cookie_value(parts, session::VISITOR_COOKIE_NAME).and_then(|id| Uuid::parse_str(&id).ok())
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Visitor
where
	S: Sync + Send,
{
	type Rejection = Infallible;

	async fn from_request_parts(
		parts: &mut request::Parts,
		_state: &S,
	) -> Result<Self, Self::Rejection> {
		Ok(match Self::from_parts(parts) {
			Some(id) => Self { id, issued: false },
			None => Self {
				id: Uuid::new_v4(),
				issued: true,
			},
		})
	}
}

impl OperationInput for Visitor {
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		require(operation, SECURITY_SCHEME_VISITOR);
	}
}

/// Whoever is creating content: a signed-in account, or else a known visitor.
#[derive(Debug)]
pub enum Author {
	Account(Session),
	Visitor(Uuid),
}

impl Author {
	pub fn id(&self) -> Uuid {
		match self {
			Self::Account(session) => session.state.account_id,
			Self::Visitor(id) => *id,
		}
	}
}

/// The identities a request claims through its cookies, unverified.
///
/// Extracting this never calls a collaborator, so handlers can validate their
/// body first and only then [`Claims::author`] the request.
#[derive(Debug, Clone, Copy)]
pub struct Claims {
	session: Option<Uuid>,
	visitor: Option<Uuid>,
}

impl Claims {
	/// Resolves the claims into an [`Author`].
	///
	/// A live session wins over the visitor cookie. Requests with neither are
	/// rejected with [`auth::Error::NoIdentity`].
	pub async fn author(self, app: &AppState) -> Result<Author, RouteError<auth::Error>> {
		if let Some(id) = self.session {
			match Session::resolve(id, app).await {
				Ok(session) => return Ok(Author::Account(session)),
				Err(RouteError::Route(auth::Error::InvalidSession)) => {}
				Err(error) => return Err(error),
			}
		}

		self.visitor
			.map(Author::Visitor)
			.ok_or_else(|| auth::Error::NoIdentity.into())
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
	S: Sync + Send,
{
	type Rejection = Infallible;

	async fn from_request_parts(
		parts: &mut request::Parts,
		_state: &S,
	) -> Result<Self, Self::Rejection> {
		Ok(Self {
			session: cookie_value(parts, session::COOKIE_NAME)
				.and_then(|id| Uuid::parse_str(&id).ok()),
			visitor: Visitor::from_parts(parts),
		})
	}
}

impl OperationInput for Claims {
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		require(operation, SECURITY_SCHEME_SESSION);
		require(operation, SECURITY_SCHEME_VISITOR);
	}
}
