// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timestamps are stored as fixed-width UTC RFC 3339 text, so SQL string
//! comparison orders them chronologically.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DbError;

pub(crate) fn encode(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn decode_opt(value: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|v| decode(&v, column)).transpose()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};

	#[test]
	fn text_order_matches_time_order() {
		let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
		let b = a + Duration::microseconds(1);
		let c = a + Duration::days(400);
		assert!(encode(a) < encode(b));
		assert!(encode(b) < encode(c));
	}

	#[test]
	fn round_trips_to_microseconds() {
		let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap() + Duration::microseconds(123_456);
		assert_eq!(decode(&encode(at), "at").unwrap(), at);
	}
}
