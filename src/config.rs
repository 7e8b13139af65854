use std::{
	net::{IpAddr, Ipv4Addr},
	str::FromStr,
	time::Duration,
};

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
	key: &'static str,
	value: String,
}

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
	/// Postgres connection string. Without one, everything lives in memory.
	pub database_url: Option<String>,
	pub host: IpAddr,
	pub port: u16,
	/// Upper bound on any single storage or auth call.
	pub storage_timeout: Duration,
	/// How long a cached session is trusted before the auth provider is asked again.
	pub session_ttl: Duration,
	/// Compare-and-swap attempts per vote before giving up.
	pub vote_max_attempts: u32,
	pub rate_limit: bool,
	pub rate_limit_per_second: u64,
	pub rate_limit_burst: u32,
	pub secure_cookies: bool,
	pub otlp_endpoint: Option<String>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			database_url: None,
			host: IpAddr::V4(Ipv4Addr::LOCALHOST),
			port: 3000,
			storage_timeout: Duration::from_secs(5),
			session_ttl: crate::sessions::DEFAULT_TTL,
			vote_max_attempts: 5,
			rate_limit: true,
			rate_limit_per_second: 10,
			rate_limit_burst: 50,
			secure_cookies: !cfg!(debug_assertions),
			otlp_endpoint: None,
		}
	}
}

/// Reads and parses an environment variable, treating empty values as unset.
fn var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
	match std::env::var(key) {
		Ok(value) if !value.trim().is_empty() => value
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| ConfigError { key, value }),
		_ => Ok(None),
	}
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		let defaults = Self::default();

		Ok(Self {
			database_url: var("DATABASE_URL")?,
			host: var("HOST")?.unwrap_or(defaults.host),
			port: var("PORT")?.unwrap_or(defaults.port),
			storage_timeout: var("STORAGE_TIMEOUT_MS")?
				.map_or(defaults.storage_timeout, Duration::from_millis),
			session_ttl: var("SESSION_TTL_SECS")?.map_or(defaults.session_ttl, Duration::from_secs),
			vote_max_attempts: var("VOTE_MAX_ATTEMPTS")?.unwrap_or(defaults.vote_max_attempts),
			rate_limit: var("RATE_LIMIT")?.unwrap_or(defaults.rate_limit),
			rate_limit_per_second: var("RATE_LIMIT_PER_SECOND")?
				.unwrap_or(defaults.rate_limit_per_second),
			rate_limit_burst: var("RATE_LIMIT_BURST")?.unwrap_or(defaults.rate_limit_burst),
			secure_cookies: var("SECURE_COOKIES")?.unwrap_or(defaults.secure_cookies),
			otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")?,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_var_parsing() {
		std::env::set_var("ANON_BOARD_TEST_PORT", " 8080 ");
		std::env::set_var("ANON_BOARD_TEST_EMPTY", "");
		std::env::set_var("ANON_BOARD_TEST_BAD", "eighty");

		assert_eq!(var::<u16>("ANON_BOARD_TEST_PORT").unwrap(), Some(8080));
		assert_eq!(var::<u16>("ANON_BOARD_TEST_EMPTY").unwrap(), None);
		assert_eq!(var::<u16>("ANON_BOARD_TEST_MISSING").unwrap(), None);

		let error = var::<u16>("ANON_BOARD_TEST_BAD").unwrap_err();

		assert_eq!(
			error.to_string(),
			r#"invalid value "eighty" for ANON_BOARD_TEST_BAD"#
		);
	}
}
