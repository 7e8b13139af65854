use schemars::JsonSchema;
use serde::Serialize;
use uuid::Uuid;

/// The anonymous identity of a visitor without an account.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Identity {
	/// The visitor id, also carried in the `anonymous_id` cookie.
	pub anonymous_id: Uuid,
	/// The name the visitor's posts are shown under.
	pub display_name: String,
}
