use aide::axum::{
	routing::{get_with, patch_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, route::auth, vote::VoteError, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown_post")]
	UnknownPost(Uuid),
	#[error("unsupported_vote_kind")]
	UnsupportedVoteKind(String),
	#[error("nickname_requires_account")]
	NicknameRequiresAccount,
	#[error(transparent)]
	Auth(auth::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route("/:id", get_with(get_post, get_post_docs))
		.api_route("/:id/vote", patch_with(vote_post, vote_post_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::UnsupportedVoteKind(..) => StatusCode::BAD_REQUEST,
			Self::NicknameRequiresAccount => StatusCode::FORBIDDEN,
			Self::Auth(inner) => error::ErrorShape::status(inner),
		}
	}

	fn into_errors(self) -> Vec<error::Message> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::UnknownPost(post) => message
				.content("게시글을 찾을 수 없습니다.")
				.detail("post", post.to_string())
				.into_vec(),
			Self::UnsupportedVoteKind(kind) => message
				.content("지원하지 않는 투표 종류입니다.")
				.field("type")
				.detail("type", kind)
				.into_vec(),
			Self::NicknameRequiresAccount => message
				.content("닉네임으로 게시하려면 로그인이 필요합니다.")
				.field("visibility")
				.into_vec(),
			Self::Auth(inner) => error::ErrorShape::into_errors(inner),
		}
	}
}

impl From<VoteError> for RouteError {
	fn from(error: VoteError) -> Self {
		match error {
			VoteError::NotFound(post) => Self::Route(Error::UnknownPost(post)),
			VoteError::UnsupportedVoteKind(kind) => Self::Route(Error::UnsupportedVoteKind(kind)),
			VoteError::StorageUnavailable(error) => error.into(),
		}
	}
}

impl From<auth::RouteError> for RouteError {
	fn from(error: auth::RouteError) -> Self {
		match error {
			error::RouteError::App(error) => Self::App(error),
			error::RouteError::Route(error) => Self::Route(Error::Auth(error)),
		}
	}
}

#[cfg(test)]
mod test {
	use std::future::IntoFuture;

	use crate::test::*;

	async fn create(app: &TestServer, content: &str) -> Value {
		let response = app
			.post("/posts")
			.json(&json!({ "content": content }))
			.await;

		assert_eq!(response.status_code(), StatusCode::OK);
		response.json::<Value>()
	}

	#[tokio::test]
	async fn test_anonymous_post_flow() {
		let app = app(state());

		let response = app.get("/identity").await;
		let identity = response.json::<Value>();

		assert_eq!(response.status_code(), StatusCode::OK);

		let post = create(&app, "  첫 글입니다  ").await;

		assert_eq!(post["content"], "첫 글입니다");
		assert_eq!(post["visibility"], "anonymous");
		assert_eq!(post["like_count"], 0);
		assert_eq!(post["reply_count"], 0);
		assert_eq!(post["author_name"], identity["display_name"]);
		assert!(post.get("author_id").is_none());

		let id = post["id"].as_str().unwrap();
		let response = app.get(&format!("/posts/{id}")).await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert_eq!(response.json::<Value>()["content"], "첫 글입니다");
	}

	#[tokio::test]
	async fn test_post_requires_identity() {
		let app = app(state());

		let response = app
			.post("/posts")
			.json(&json!({ "content": "hello" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "no_identity");
	}

	#[tokio::test]
	async fn test_invalid_content_is_rejected() {
		let state = state();
		let app = app(state.clone());

		app.get("/identity").await;

		for content in [String::new(), " \n\t ".into(), "가".repeat(1001)] {
			let response = app
				.post("/posts")
				.json(&json!({ "content": content }))
				.await;

			assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
			assert_eq!(response.json::<Value>()["errors"][0]["field"], "content");
		}

		assert!(state.storage.posts(10, 0).await.unwrap().is_empty());

		// Exactly the limit is fine, counted in characters rather than bytes.
		create(&app, &"가".repeat(1000)).await;
	}

	#[tokio::test]
	async fn test_content_limit_applies_after_trimming() {
		let app = app(state());

		app.get("/identity").await;

		let padded = format!("  {}\n", "가".repeat(1000));
		let post = create(&app, &padded).await;

		assert_eq!(post["content"].as_str().unwrap().chars().count(), 1000);

		let response = app
			.post("/posts")
			.json(&json!({ "content": format!(" {} ", "가".repeat(1001)) }))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "content");
	}

	#[tokio::test]
	async fn test_nickname_visibility_requires_account() {
		let app = app(state());

		app.get("/identity").await;

		let response = app
			.post("/posts")
			.json(&json!({ "content": "hello", "visibility": "nickname" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
		assert_eq!(
			response.json::<Value>()["errors"][0]["code"],
			"nickname_requires_account"
		);
	}

	#[tokio::test]
	async fn test_nickname_posts_show_profile_nickname() {
		let app = app(state());

		register(&app, "nick@example.com").await;

		let me = app.get("/auth/me").await.json::<Value>();
		let post = create(&app, "anonymous by default").await;

		assert_eq!(post["author_name"], me["display_name"]);

		let response = app
			.post("/posts")
			.json(&json!({ "content": "signed", "visibility": "nickname" }))
			.await;
		let post = response.json::<Value>();

		assert_eq!(response.status_code(), StatusCode::OK);
		assert_eq!(post["visibility"], "nickname");
		assert_eq!(post["author_name"], me["nickname"]);
	}

	#[tokio::test]
	async fn test_feed_is_newest_first_and_paginated() {
		let app = app(state());

		app.get("/identity").await;

		for i in 0..3 {
			create(&app, &format!("post {i}")).await;
		}

		let feed = app.get("/posts").await.json::<Vec<Value>>();
		let contents = feed
			.iter()
			.map(|post| post["content"].as_str().unwrap())
			.collect::<Vec<_>>();

		assert_eq!(contents, ["post 2", "post 1", "post 0"]);

		let page = app
			.get("/posts")
			.add_query_param("page", 2)
			.add_query_param("size", 2)
			.await
			.json::<Vec<Value>>();

		assert_eq!(page.len(), 1);
		assert_eq!(page[0]["content"], "post 0");

		let response = app.get("/posts").add_query_param("size", 101).await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_concurrent_likes_are_all_counted() {
		let app = app(state());

		register(&app, "liker@example.com").await;

		let post = create(&app, "like me").await;
		let path = format!("/posts/{}/vote", post["id"].as_str().unwrap());
		let vote = json!({ "type": "like" });

		let (first, second) = tokio::join!(
			app.patch(&path).json(&vote).into_future(),
			app.patch(&path).json(&vote).into_future(),
		);

		assert_eq!(first.status_code(), StatusCode::OK);
		assert_eq!(second.status_code(), StatusCode::OK);

		let mut counts = [first, second].map(|response| response.json::<Value>()["like_count"].as_i64());
		counts.sort_unstable();

		assert_eq!(counts, [Some(1), Some(2)]);

		let post = app
			.get(&format!("/posts/{}", post["id"].as_str().unwrap()))
			.await
			.json::<Value>();

		assert_eq!(post["like_count"], 2);
	}

	#[tokio::test]
	async fn test_vote_errors() {
		let state = state();
		let app = app(state.clone());

		app.get("/identity").await;

		let post = create(&app, "vote target").await;
		let id = post["id"].as_str().unwrap();

		let response = app
			.patch(&format!("/posts/{id}/vote"))
			.json(&json!({ "type": "dislike" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(
			response.json::<Value>()["errors"][0]["code"],
			"unsupported_vote_kind"
		);

		let unknown = uuid::Uuid::new_v4();
		let response = app
			.patch(&format!("/posts/{unknown}/vote"))
			.json(&json!({ "type": "like" }))
			.await;

		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
		assert_eq!(response.json::<Value>()["errors"][0]["code"], "unknown_post");

		let stored = state.storage.posts(10, 0).await.unwrap();

		assert_eq!(stored[0].like_count, 0);
	}
}
