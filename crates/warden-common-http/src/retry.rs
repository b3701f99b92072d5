// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

const RETRYABLE_STATUSES: [StatusCode; 6] = [
	StatusCode::TOO_MANY_REQUESTS,
	StatusCode::REQUEST_TIMEOUT,
	StatusCode::INTERNAL_SERVER_ERROR,
	StatusCode::BAD_GATEWAY,
	StatusCode::SERVICE_UNAVAILABLE,
	StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Default backoff with a different attempt budget. Zero is treated as one.
	pub fn with_max_attempts(max_attempts: u32) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			..Self::default()
		}
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Whether an HTTP status indicates a transient upstream condition.
pub fn is_retryable_status(status: StatusCode) -> bool {
	RETRYABLE_STATUSES.contains(&status)
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		self.status().is_some_and(is_retryable_status)
	}
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponential = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped = exponential.min(cfg.max_delay.as_secs_f64());

	let delay = if cfg.jitter {
		capped * (0.5 + fastrand::f64())
	} else {
		capped
	};

	Duration::from_secs_f64(delay)
}

/// Run `f` until it succeeds, returns a non-retryable error, or
/// `cfg.max_attempts` is exhausted. The last error is returned.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Debug,
{
	let mut attempt = 0;

	loop {
		let err = match f().await {
			Ok(value) => return Ok(value),
			Err(err) => err,
		};
		attempt += 1;

		if !err.is_retryable() {
			warn!(error = ?err, attempt, "non-retryable error encountered");
			return Err(err);
		}

		if attempt >= cfg.max_attempts {
			warn!(
				error = ?err,
				attempt,
				max_attempts = cfg.max_attempts,
				"max retry attempts exhausted"
			);
			return Err(err);
		}

		let delay = calculate_delay(cfg, attempt - 1);
		warn!(
			error = ?err,
			attempt,
			max_attempts = cfg.max_attempts,
			delay_ms = delay.as_millis() as u64,
			"retrying after error"
		);
		tokio::time::sleep(delay).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	struct FakeError {
		retryable: bool,
	}

	impl RetryableError for FakeError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(10),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	#[tokio::test]
	async fn non_retryable_error_fails_immediately() {
		let attempts = Arc::new(AtomicU32::new(0));

		let result: Result<(), FakeError> = retry(&fast(3), || {
			let attempts = Arc::clone(&attempts);
			async move {
				attempts.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { retryable: false })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn stops_after_max_attempts() {
		let attempts = Arc::new(AtomicU32::new(0));

		let result: Result<(), FakeError> = retry(&fast(3), || {
			let attempts = Arc::clone(&attempts);
			async move {
				attempts.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { retryable: true })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn recovers_after_transient_failures() {
		let attempts = Arc::new(AtomicU32::new(0));

		let result: Result<&str, FakeError> = retry(&fast(5), || {
			let attempts = Arc::clone(&attempts);
			async move {
				if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(FakeError { retryable: true })
				} else {
					Ok("rules")
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), "rules");
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn zero_attempts_clamped_to_one() {
		assert_eq!(RetryConfig::with_max_attempts(0).max_attempts, 1);
	}

	#[test]
	fn jitter_varies_delay() {
		let with_jitter = RetryConfig {
			jitter: true,
			..fast(3)
		};
		let delays: Vec<Duration> = (0..16).map(|_| calculate_delay(&with_jitter, 3)).collect();
		assert!(delays.windows(2).any(|w| w[0] != w[1]));

		let without: Vec<Duration> = (0..4).map(|_| calculate_delay(&fast(3), 3)).collect();
		assert!(without.windows(2).all(|w| w[0] == w[1]));
	}

	#[test]
	fn delay_is_capped() {
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(5),
			backoff_factor: 10.0,
			jitter: false,
		};
		for attempt in 0..10 {
			assert!(calculate_delay(&cfg, attempt) <= Duration::from_secs(5));
		}
	}

	#[test]
	fn status_classification() {
		assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
		assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
	}
}
