use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::middleware::StateInformationMiddleware;
use tokio::task::JoinHandle;
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::PeerIpKeyExtractor,
	GovernorError,
};

use crate::{config::Config, error::AppError};

pub type LimitConfig = GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-peer request quotas: `standard` for every route, `strict` for account routes.
pub struct Limits {
	pub standard: Arc<LimitConfig>,
	pub strict: Arc<LimitConfig>,
}

#[derive(Debug, thiserror::Error)]
#[error("rate limit settings must be positive")]
pub struct InvalidLimits;

impl Limits {
	/// Builds the quotas, or `None` when rate limiting is switched off.
	pub fn from_config(config: &Config) -> Result<Option<Self>, InvalidLimits> {
		if !config.rate_limit {
			return Ok(None);
		}

		let replenish_ms = 1000 / config.rate_limit_per_second.max(1);

		let standard = GovernorConfigBuilder::default()
			.per_millisecond(replenish_ms.max(1))
			.burst_size(config.rate_limit_burst)
			.use_headers()
			.error_handler(error_handler)
			.finish()
			.ok_or(InvalidLimits)?;

		let strict = GovernorConfigBuilder::default()
			.per_second(1)
			.burst_size(5)
			.use_headers()
			.error_handler(error_handler)
			.finish()
			.ok_or(InvalidLimits)?;

		Ok(Some(Self {
			standard: Arc::new(standard),
			strict: Arc::new(strict),
		}))
	}

	/// Periodically forgets peers that have not been seen recently.
	pub fn spawn_cleanup(&self) -> JoinHandle<()> {
		let limiters = [&self.standard, &self.strict].map(|config| config.limiter().clone());

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

			loop {
				interval.tick().await;

				for limiter in &limiters {
					tracing::debug!(peers = limiter.len(), "pruning rate limiter state");

					limiter.retain_recent();
				}
			}
		})
	}
}

fn error_handler(error: GovernorError) -> Response<Body> {
	AppError::from(error).into_response()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_disabled_limits() {
		let config = Config {
			rate_limit: false,
			..Config::default()
		};

		assert!(Limits::from_config(&config).unwrap().is_none());
	}

	#[test]
	fn test_zero_burst_is_rejected() {
		let config = Config {
			rate_limit: true,
			rate_limit_burst: 0,
			..Config::default()
		};

		assert!(Limits::from_config(&config).is_err());
	}

	#[tokio::test]
	async fn test_limits_from_defaults() {
		let config = Config {
			rate_limit: true,
			..Config::default()
		};
		let limits = Limits::from_config(&config).unwrap().unwrap();

		assert_eq!(limits.standard.limiter().len(), 0);
		limits.spawn_cleanup().abort();
	}
}
