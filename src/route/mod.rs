pub mod auth;
pub mod docs;
pub mod identity;
pub mod model;
pub mod post;

use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use crate::{openapi, ratelimit::Limits, AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

fn api(limits: Option<&Limits>) -> ApiRouter<AppState> {
	let auth = match limits {
		Some(limits) => auth::routes().layer(GovernorLayer {
			config: limits.strict.clone(),
		}),
		None => auth::routes(),
	};

	ApiRouter::new()
		.nest("/auth", auth)
		.nest("/posts", post::routes())
		.nest("/identity", identity::routes())
		.nest("/docs", docs::routes())
}

/// Builds the full application, with its OpenAPI document and middleware.
///
/// Without `limits`, requests are not rate limited. With them, the server must
/// be run with connect info so that peers can be told apart.
pub fn app(state: AppState, limits: Option<&Limits>) -> Router {
	let mut docs = OpenApi::default();
	let router = api(limits).finish_api_with(&mut docs, openapi::docs);

	let router = match limits {
		Some(limits) => router.layer(GovernorLayer {
			config: limits.standard.clone(),
		}),
		None => router,
	};

	let request_id = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);

	router
		.layer(Extension(Arc::new(docs)))
		.layer(
			ServiceBuilder::new()
				.layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
				.layer(TraceLayer::new_for_http())
				.layer(PropagateRequestIdLayer::new(request_id))
				.layer(CompressionLayer::new())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}
