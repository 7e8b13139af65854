use aide::axum::{routing::get_with, ApiRouter};

use crate::AppState;

pub mod model;
pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new().api_route("/", get_with(get_identity, get_identity_docs))
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_visitor_cookie_is_issued_once() {
		let app = app(state());

		let response = app.get("/identity").await;
		let identity = response.json::<Value>();

		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.starts_with("anonymous_id="));

		let id = identity["anonymous_id"].as_str().unwrap();

		assert_eq!(
			identity["display_name"],
			crate::namer::derive_display_name(id)
		);

		let response = app.get("/identity").await;

		assert!(response.headers().get("set-cookie").is_none());
		assert_eq!(response.json::<Value>(), identity);
	}

	#[tokio::test]
	async fn test_malformed_visitor_cookie_is_replaced() {
		let app = app(state());

		let response = app
			.get("/identity")
			.add_cookie(cookie::Cookie::new("anonymous_id", "not-a-uuid"))
			.await;

		assert!(response.headers().get("set-cookie").is_some());
		assert!(uuid::Uuid::parse_str(
			response.json::<Value>()["anonymous_id"].as_str().unwrap()
		)
		.is_ok());
	}
}
