//! Deterministic display names for anonymous identifiers.
//!
//! The same identifier always maps to the same `"<descriptor> <noun>"` pair,
//! so a visitor or account keeps a recognisable name without any stored mapping.

/// Colour and mood words, indexed by the low bits of the hash.
pub const DESCRIPTORS: [&str; 10] = [
	"빨간", "파란", "초록", "노란", "보라", "주황", "분홍", "검은", "하얀", "갈색",
];

/// Animal words, indexed by the hash shifted right by one byte.
pub const NOUNS: [&str; 10] = [
	"고양이", "강아지", "토끼", "여우", "늑대", "곰", "호랑이", "사자", "코끼리", "펭귄",
];

/// Folds the UTF-16 code units of `identifier` into a wrapping 32-bit hash
/// (`acc * 31 + unit`). The empty string hashes to 0.
#[must_use]
pub fn hash(identifier: &str) -> i32 {
	identifier.encode_utf16().fold(0i32, |acc, unit| {
		acc.wrapping_mul(31).wrapping_add(i32::from(unit))
	})
}

/// Derives the stable two-word display name for an identifier.
#[must_use]
pub fn derive_display_name(identifier: &str) -> String {
	let hash = hash(identifier);

	// `unsigned_abs` keeps i32::MIN in range
	let descriptor = DESCRIPTORS[hash.unsigned_abs() as usize % DESCRIPTORS.len()];
	let noun = NOUNS[(hash >> 8).unsigned_abs() as usize % NOUNS.len()];

	format!("{descriptor} {noun}")
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_pinned_names() {
		assert_eq!(derive_display_name("빨간고양이테스트"), "파란 호랑이");
		assert_eq!(derive_display_name("hello"), "초록 토끼");
		assert_eq!(derive_display_name("a"), "검은 고양이");
		assert_eq!(
			derive_display_name("550e8400-e29b-41d4-a716-446655440000"),
			"주황 곰"
		);
	}

	#[test]
	fn test_hash_wraps_like_32_bit_integers() {
		assert_eq!(hash("빨간고양이테스트"), 333_377_721);
		assert_eq!(hash("anonymous"), -2_095_811_475);
		assert_eq!(derive_display_name("anonymous"), "주황 늑대");
	}

	#[test]
	fn test_astral_characters_hash_as_surrogate_pairs() {
		assert_eq!(hash("😀"), 1_772_899);
		assert_eq!(derive_display_name("😀"), "갈색 곰");
	}

	#[test]
	fn test_empty_identifier_hashes_to_zero() {
		assert_eq!(hash(""), 0);
		assert_eq!(derive_display_name(""), "빨간 고양이");
	}

	#[test]
	fn test_colliding_identifiers_share_a_name() {
		assert_eq!(hash("Aa"), hash("BB"));
		assert_eq!(derive_display_name("Aa"), derive_display_name("BB"));
	}

	#[test]
	fn test_names_are_deterministic_and_from_the_palette() {
		for id in ["x", "user-1", "0b6a7e4c-5c1f-4a53-9b8e-35a1d8a9b0f2", "익명"] {
			let name = derive_display_name(id);

			assert_eq!(name, derive_display_name(&id.to_owned()));

			let (descriptor, noun) = name.split_once(' ').unwrap();

			assert!(DESCRIPTORS.contains(&descriptor));
			assert!(NOUNS.contains(&noun));
		}
	}
}
