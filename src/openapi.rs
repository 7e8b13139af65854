use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";
pub const SECURITY_SCHEME_VISITOR: &str = "Visitor";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
	pub const IDENTITY: &str = "Identity";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Anonymous Board")
		.summary("Short anonymous threads with likes")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Accounts, sessions and profiles".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("The feed, posting and likes".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::IDENTITY.into(),
			description: Some("Anonymous visitor names".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A signed-in session".into()),
				extensions: Default::default(),
			},
		)
		.security_scheme(
			SECURITY_SCHEME_VISITOR,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::VISITOR_COOKIE_NAME.into(),
				description: Some("An anonymous visitor, issued by GET /identity".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse>, _>(|res| {
			res.example(error::ErrorResponse {
				success: false,
				errors: error::Message::new("unknown_post")
					.content("게시글을 찾을 수 없습니다.")
					.detail("post", "00000000-0000-0000-0000-000000000000")
					.into_vec(),
			})
		})
}
