use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection::{PathRejection, QueryRejection},
	http::{Response, StatusCode},
	response::IntoResponse,
};
use axum_jsonschema::JsonSchemaRejection;
use schemars::JsonSchema;
use serde::Serialize;
use tower_governor::GovernorError;

use crate::store::StoreError;

pub type Map = serde_json::Map<String, serde_json::Value>;

const UNAVAILABLE: &str = "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";
const INVALID_REQUEST: &str = "요청 형식이 올바르지 않습니다.";
const TOO_MANY_REQUESTS: &str = "요청이 너무 많습니다. 잠시 후 다시 시도해주세요.";

/// A single error, as presented to the client.
///
/// `code` is stable and machine-readable, `content` is the localized text
/// shown next to the control that failed.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message {
	pub code: Cow<'static, str>,
	pub content: Cow<'static, str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'static, str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Map>,
}

impl Message {
	pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
		let code = code.into();

		Self {
			content: code.clone(),
			code,
			field: None,
			details: None,
		}
	}

	#[must_use]
	pub fn content(mut self, content: impl Into<Cow<'static, str>>) -> Self {
		self.content = content.into();
		self
	}

	#[must_use]
	pub fn field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	#[must_use]
	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(Map::new)
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub success: bool,
	pub errors: Vec<Message>,
}

impl ErrorResponse {
	fn into_response(self, status: StatusCode) -> Response<Body> {
		(status, axum::Json(self)).into_response()
	}
}

/// Errors owned by a single route module.
///
/// The messages returned by [`ErrorShape::into_errors`] are sent to the client,
/// so they must not contain sensitive information.
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;

	fn into_errors(self) -> Vec<Message>;
}

/// Errors that any route can produce.
///
/// The Display implementation is only logged, never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0:?}")]
	Json(JsonSchemaRejection),
	#[error("query error: {0}")]
	Query(#[from] QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] PathRejection),
	#[error("storage error: {0}")]
	Storage(#[from] StoreError),
	#[error("rate limit error: {0}")]
	RateLimit(#[from] GovernorError),
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let (status, errors) = match self {
			Self::Validation(errors) => (
				StatusCode::BAD_REQUEST,
				errors
					.field_errors()
					.into_iter()
					.flat_map(|(field, errors)| {
						errors.iter().map(move |error| {
							let message = Message::new(error.code.clone()).field(field.clone());

							match &error.message {
								Some(content) => message.content(content.clone()),
								None => message,
							}
						})
					})
					.collect(),
			),
			Self::Json(error) => {
				tracing::debug!(?error, "rejected json body");
				(
					StatusCode::BAD_REQUEST,
					Message::new("invalid_body").content(INVALID_REQUEST).into_vec(),
				)
			}
			Self::Query(error) => (
				StatusCode::BAD_REQUEST,
				Message::new("invalid_query")
					.content(INVALID_REQUEST)
					.detail("reason", error.body_text())
					.into_vec(),
			),
			Self::Path(error) => (
				StatusCode::BAD_REQUEST,
				Message::new("invalid_path")
					.content(INVALID_REQUEST)
					.detail("reason", error.body_text())
					.into_vec(),
			),
			Self::Storage(error) => {
				tracing::error!(%error, "storage unavailable");
				(
					StatusCode::SERVICE_UNAVAILABLE,
					Message::new("storage_unavailable")
						.content(UNAVAILABLE)
						.into_vec(),
				)
			}
			Self::RateLimit(GovernorError::TooManyRequests { wait_time, headers }) => {
				let mut response = ErrorResponse {
					success: false,
					errors: Message::new("too_many_requests")
						.content(TOO_MANY_REQUESTS)
						.detail("wait_seconds", wait_time)
						.into_vec(),
				}
				.into_response(StatusCode::TOO_MANY_REQUESTS);

				if let Some(headers) = headers {
					response.headers_mut().extend(headers);
				}

				return response;
			}
			Self::RateLimit(error) => {
				tracing::warn!(%error, "rate limiter failed");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Message::new("internal").content(UNAVAILABLE).into_vec(),
				)
			}
		};

		ErrorResponse {
			success: false,
			errors,
		}
		.into_response(status)
	}
}

impl From<JsonSchemaRejection> for AppError {
	fn from(rejection: JsonSchemaRejection) -> Self {
		Self::Json(rejection)
	}
}

/// Either a route-specific error or a general application error.
#[derive(Debug, thiserror::Error)]
pub enum RouteError<T> {
	#[error(transparent)]
	App(AppError),
	#[error(transparent)]
	Route(T),
}

impl<T: ErrorShape> From<T> for RouteError<T> {
	fn from(error: T) -> Self {
		Self::Route(error)
	}
}

impl<T> From<AppError> for RouteError<T> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<T> From<StoreError> for RouteError<T> {
	fn from(error: StoreError) -> Self {
		Self::App(error.into())
	}
}

impl<T: ErrorShape> IntoResponse for RouteError<T> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => {
				let status = error.status();

				if status.is_server_error() {
					tracing::error!(%error, "route failed");
				}

				ErrorResponse {
					success: false,
					errors: error.into_errors(),
				}
				.into_response(status)
			}
		}
	}
}

impl OperationOutput for AppError {
	type Inner = ErrorResponse;
}

impl<T> OperationOutput for RouteError<T> {
	type Inner = ErrorResponse;
}

#[cfg(test)]
mod test {
	use validator::Validate;

	use super::*;

	#[derive(Validate)]
	struct Input {
		#[validate(length(min = 3, message = "too short"))]
		name: String,
	}

	#[test]
	fn test_message_builder() {
		let message = Message::new("unknown_post")
			.content("게시글을 찾을 수 없습니다.")
			.detail("post", "abc");

		let json = serde_json::to_value(&message).unwrap();

		assert_eq!(json["code"], "unknown_post");
		assert_eq!(json["content"], "게시글을 찾을 수 없습니다.");
		assert_eq!(json["details"]["post"], "abc");
		assert!(json.get("field").is_none());
	}

	#[test]
	fn test_validation_errors_are_bad_requests() {
		let errors = Input { name: "ab".into() }.validate().unwrap_err();
		let response = AppError::from(errors).into_response();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[test]
	fn test_storage_errors_are_unavailable() {
		let response =
			AppError::from(StoreError::Malformed("bad row".into())).into_response();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	}
}
