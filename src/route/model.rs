use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

// serde has no literal defaults: <https://github.com/serde-rs/serde/issues/368>
fn first_page() -> i64 {
	1
}

fn default_page_size() -> i64 {
	DEFAULT_PAGE_SIZE
}

/// Page selection for list endpoints.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct Paginate {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100, message = "페이지 번호가 올바르지 않습니다."))]
	#[serde(default = "first_page")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100, message = "페이지 크기가 올바르지 않습니다."))]
	#[serde(default = "default_page_size")]
	pub size: i64,
}

impl Paginate {
	/// Rows to skip before the requested page.
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}

	pub fn limit(&self) -> i64 {
		self.size
	}
}

/// A path parameter naming a single resource.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	/// The unique identifier of the resource.
	pub id: Uuid,
}

#[cfg(test)]
mod test {
	#[test]
	fn test_paginate_offset() {
		let mut paginate = super::Paginate { page: 1, size: 10 };

		assert_eq!(paginate.offset(), 0);

		paginate.page = 2;

		assert_eq!(paginate.offset(), 10);

		paginate.size = 5;

		assert_eq!(paginate.offset(), 5);

		paginate.page = 3;

		assert_eq!(paginate.offset(), 10);
	}

	#[test]
	fn test_paginate_limit() {
		let paginate = super::Paginate { page: 1, size: 10 };

		assert_eq!(paginate.limit(), 10);
	}

	#[test]
	fn test_paginate_defaults_and_bounds() {
		use validator::Validate;

		let paginate: super::Paginate = serde_json::from_str("{}").unwrap();

		assert_eq!((paginate.page, paginate.size), (1, 10));
		assert!(paginate.validate().is_ok());

		let paginate = super::Paginate { page: 0, size: 101 };
		let errors = paginate.validate().unwrap_err();

		assert!(errors.field_errors().contains_key("page"));
		assert!(errors.field_errors().contains_key("size"));
	}
}
