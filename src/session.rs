use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";
pub const VISITOR_COOKIE_NAME: &str = "anonymous_id";

/// Creates a session cookie with no expiry
pub fn create_cookie(session_id: Uuid, secure: bool) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(secure)
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie(secure: bool) -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.secure(secure)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

/// Creates the long-lived cookie that identifies an anonymous visitor
pub fn visitor_cookie(visitor_id: Uuid, secure: bool) -> cookie::Cookie<'static> {
	cookie::Cookie::build((VISITOR_COOKIE_NAME, visitor_id.to_string()))
		.secure(secure)
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.permanent()
		.into()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_session_cookie_round_trip() {
		let id = Uuid::new_v4();
		let cookie = create_cookie(id, false);

		assert_eq!(cookie.name(), COOKIE_NAME);
		assert_eq!(cookie.value(), id.to_string());
		assert_eq!(cookie.http_only(), Some(true));
		assert!(cookie.secure().is_none() || cookie.secure() == Some(false));
	}

	#[test]
	fn test_clear_cookie_expires_immediately() {
		let cookie = clear_cookie(true);

		assert_eq!(cookie.value(), "");
		assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
		assert_eq!(cookie.secure(), Some(true));
	}

	#[test]
	fn test_visitor_cookie_is_permanent() {
		let cookie = visitor_cookie(Uuid::new_v4(), false);

		assert_eq!(cookie.name(), VISITOR_COOKIE_NAME);
		assert!(cookie.max_age().is_some());
	}
}
