use aide::axum::IntoApiResponse;
use axum::{extract::State, http::header, response::AppendHeaders};
use macros::route;

use crate::{
	extract::{Json, Visitor},
	namer,
	openapi::tag,
	session, AppState,
};

use super::model;

/// Get anonymous identity
/// Returns the visitor's anonymous id and display name, issuing the visitor cookie on the first visit.
#[route(tag = tag::IDENTITY, response(status = 200, shape = "Json<model::Identity>"))]
pub async fn get_identity(State(state): State<AppState>, visitor: Visitor) -> impl IntoApiResponse {
	let cookie = visitor.issued.then(|| {
		tracing::debug!(visitor_id = %visitor.id, "issuing visitor id");

		(
			header::SET_COOKIE,
			session::visitor_cookie(visitor.id, state.config.secure_cookies).to_string(),
		)
	});

	(
		AppendHeaders(cookie),
		Json(model::Identity {
			anonymous_id: visitor.id,
			display_name: namer::derive_display_name(&visitor.id.to_string()),
		}),
	)
}
