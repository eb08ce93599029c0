//! Test helpers for fixy integration tests.
//!
//! - `models` - fixture types deriving `Fixture`
//! - `documents` - temporary fixture directories and loader setup

#![allow(dead_code)]

#[path = "helpers/models.rs"]
pub mod models;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
	TRACING.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_test_writer()
			.try_init();
	});
}
