#![warn(clippy::pedantic)]

mod auth;
mod config;
mod error;
mod extract;
mod namer;
mod openapi;
mod profile;
mod ratelimit;
mod route;
mod session;
mod sessions;
mod store;
mod trace;
mod vote;


use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::extract::FromRef;

use crate::{
	auth::AuthProvider,
	config::Config,
	sessions::SessionDirectory,
	store::{Deadline, MemoryStore, PgStore, Storage},
	vote::VoteCounter,
};

/// The shared application state.
///
/// Collaborators sit behind trait objects so that the Postgres and in-memory
/// backends are interchangeable. Every call into them is bounded by
/// [`Config::storage_timeout`].
#[derive(Clone, FromRef)]
pub struct AppState {
	pub storage: Arc<dyn Storage>,
	pub auth: Arc<dyn AuthProvider>,
	pub sessions: Arc<SessionDirectory>,
	pub votes: Arc<VoteCounter>,
	pub config: Arc<Config>,
}

impl AppState {
	/// Wires the collaborators together and starts keeping the session
	/// directory in step with auth events. Must be called inside a runtime.
	pub fn new(storage: Arc<dyn Storage>, auth: Arc<dyn AuthProvider>, config: Config) -> Self {
		let storage: Arc<dyn Storage> = Arc::new(Deadline::new(storage, config.storage_timeout));
		let auth: Arc<dyn AuthProvider> = Arc::new(Deadline::new(auth, config.storage_timeout));

		let sessions = Arc::new(SessionDirectory::new(config.session_ttl));
		sessions.clone().watch(auth.as_ref(), storage.clone());

		Self {
			votes: Arc::new(VoteCounter::new(storage.clone(), config.vote_max_attempts)),
			storage,
			auth,
			sessions,
			config: Arc::new(config),
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenvy::dotenv().ok();

	let config = Config::from_env()?;
	let _guard = trace::init(&config)?;

	let state = match config.database_url.as_deref() {
		Some(url) => {
			let store = Arc::new(
				PgStore::connect(url, config.storage_timeout)
					.await
					.context("failed to connect to database")?,
			);

			AppState::new(store.clone(), store, config.clone())
		}
		None => {
			tracing::warn!("DATABASE_URL is not set, keeping everything in memory");

			let store = Arc::new(MemoryStore::new());

			AppState::new(store.clone(), store, config.clone())
		}
	};

	let limits = ratelimit::Limits::from_config(&config)?;

	if let Some(limits) = &limits {
		limits.spawn_cleanup();
	}

	let app = route::app(state, limits.as_ref());
	let listener = tokio::net::TcpListener::bind((config.host, config.port))
		.await
		.with_context(|| format!("failed to bind to {}:{}", config.host, config.port))?;

	tracing::info!(address = %listener.local_addr()?, "listening");

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.await?;

	Ok(())
}
