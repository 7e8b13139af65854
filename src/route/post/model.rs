pub use crate::route::model::{IdInput, Paginate};

use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::store::{self, Visibility};

const MAX_CONTENT_CHARS: usize = 1000;

/// Content is stored trimmed, so the limits apply to the trimmed text.
fn validate_content(content: &str) -> Result<(), ValidationError> {
	let length = content.trim().chars().count();

	let (code, message) = if length == 0 {
		("blank", "내용을 입력해주세요.")
	} else if length > MAX_CONTENT_CHARS {
		("length", "내용은 1000자 이하로 입력해주세요.")
	} else {
		return Ok(());
	};

	let mut error = ValidationError::new(code);
	error.message = Some(message.into());
	Err(error)
}

/// A single post, as shown in the feed.
#[model]
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
pub struct Post {
	/// The unique identifier of the post.
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// The name the author is shown under: their nickname for `nickname` posts,
	/// otherwise the anonymous name derived from their id.
	#[serde(skip_deserializing)]
	pub author_name: String,
	/// The text of the post, 1 to 1000 characters once surrounding
	/// whitespace is trimmed.
	#[validate(custom(function = "validate_content"))]
	pub content: String,
	/// How the author is presented.
	#[serde(default)]
	pub visibility: Visibility,
	/// The number of likes.
	#[serde(skip_deserializing)]
	pub like_count: i64,
	/// The number of replies.
	#[serde(skip_deserializing)]
	pub reply_count: i64,
	/// The creation time of the post.
	#[serde(skip_deserializing)]
	pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Post {
	pub fn new(post: store::Post, author_name: String) -> Self {
		Self {
			id: post.id,
			author_name,
			content: post.content,
			visibility: post.visibility,
			like_count: post.like_count,
			reply_count: post.reply_count,
			created_at: post.created_at,
		}
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct VoteInput {
	/// The kind of vote. Only `like` is supported.
	#[serde(rename = "type")]
	pub kind: String,
}
