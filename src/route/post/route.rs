use std::collections::HashMap;

use axum::extract::State;
use macros::route;

use crate::{
	extract::{Author, Claims, Json, Path, Query},
	namer,
	openapi::tag,
	store::{self, NewPost, Storage, StoreError, Visibility},
	AppState,
};

use super::{model, Error, RouteError};

/// Attaches author names to stored posts.
///
/// Nicknames are fetched in one batch, and only for posts that show them.
async fn present(
	storage: &dyn Storage,
	posts: Vec<store::Post>,
) -> Result<Vec<model::Post>, StoreError> {
	let mut named = posts
		.iter()
		.filter(|post| post.visibility == Visibility::Nickname)
		.map(|post| post.author_id)
		.collect::<Vec<_>>();

	named.sort_unstable();
	named.dedup();

	let nicknames = if named.is_empty() {
		HashMap::new()
	} else {
		storage
			.profiles(&named)
			.await?
			.into_iter()
			.map(|profile| (profile.id, profile.nickname))
			.collect()
	};

	Ok(posts
		.into_iter()
		.map(|post| {
			let nickname = match post.visibility {
				Visibility::Nickname => nicknames.get(&post.author_id).cloned(),
				Visibility::Anonymous => None,
			};
			let author_name = nickname
				.unwrap_or_else(|| namer::derive_display_name(&post.author_id.to_string()));

			model::Post::new(post, author_name)
		})
		.collect())
}

async fn present_one(storage: &dyn Storage, post: store::Post) -> Result<model::Post, StoreError> {
	let mut posts = present(storage, vec![post]).await?;

	posts
		.pop()
		.ok_or_else(|| StoreError::Malformed("post vanished while presenting".into()))
}

/// Get all posts
/// Returns a paginated response of top-level posts, newest first.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(state): State<AppState>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let posts = state
		.storage
		.posts(paginate.limit(), paginate.offset())
		.await?;

	Ok(Json(present(state.storage.as_ref(), posts).await?))
}

/// Get single post
/// Returns a single post by its unique id.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(state): State<AppState>,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = state
		.storage
		.post(path.id)
		.await?
		.ok_or(Error::UnknownPost(path.id))?;

	Ok(Json(present_one(state.storage.as_ref(), post).await?))
}

/// Create post
/// Creates a new post as the signed-in account or, without one, as the anonymous visitor.
#[route(tag = tag::POST)]
pub async fn create_post(
	State(state): State<AppState>,
	claims: Claims,
	Json(input): Json<model::CreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let author = claims.author(&state).await?;

	if input.visibility == Visibility::Nickname && !matches!(author, Author::Account(..)) {
		return Err(Error::NicknameRequiresAccount.into());
	}

	let post = state
		.storage
		.create_post(NewPost {
			author_id: author.id(),
			content: input.content.trim().to_owned(),
			visibility: input.visibility,
		})
		.await?;

	tracing::info!(
		post_id = %post.id,
		visibility = %post.visibility,
		monotonic_counter.posts_created = 1_u64,
		"post created"
	);

	Ok(Json(present_one(state.storage.as_ref(), post).await?))
}

/// Vote on post
/// Applies a vote to a post and returns the updated post. Concurrent votes are never lost.
#[route(tag = tag::POST)]
pub async fn vote_post(
	State(state): State<AppState>,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::VoteInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = state.votes.cast(path.id, &input.kind).await?;

	tracing::info!(
		post_id = %post.id,
		like_count = post.like_count,
		monotonic_counter.votes_cast = 1_u64,
		"vote cast"
	);

	Ok(Json(present_one(state.storage.as_ref(), post).await?))
}
