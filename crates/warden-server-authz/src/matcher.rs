// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource pattern matching.
//!
//! Two styles are tried in a fixed order: the REST path matcher
//! ([`path_match`]) first, then the plain glob ([`glob_match`]).

/// REST-style path match.
///
/// Patterns are compared segment by segment on `/`:
/// - `:id` and `{id}` match exactly one non-empty segment
/// - `*` in the final position matches every remaining segment (one or more)
/// - `*` elsewhere matches exactly one segment
/// - anything else must be equal
pub fn path_match(pattern: &str, path: &str) -> bool {
	let pattern_segments: Vec<&str> = pattern.split('/').collect();
	let path_segments: Vec<&str> = path.split('/').collect();

	let last = pattern_segments.len() - 1;
	let trailing_wildcard = pattern_segments[last] == "*";

	if trailing_wildcard {
		if path_segments.len() < pattern_segments.len() {
			return false;
		}
	} else if path_segments.len() != pattern_segments.len() {
		return false;
	}

	pattern_segments
		.iter()
		.zip(path_segments.iter())
		.enumerate()
		.all(|(i, (pattern_segment, path_segment))| {
			if i == last && trailing_wildcard {
				return true;
			}
			segment_match(pattern_segment, path_segment)
		})
}

fn segment_match(pattern: &str, segment: &str) -> bool {
	if pattern == "*" {
		return true;
	}
	if is_parameter(pattern) {
		return !segment.is_empty();
	}
	pattern == segment
}

fn is_parameter(segment: &str) -> bool {
	(segment.len() > 1 && segment.starts_with(':'))
		|| (segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}'))
}

/// Glob match where `*` matches any run of characters, including `/`.
pub fn glob_match(pattern: &str, value: &str) -> bool {
	if pattern == "*" {
		return true;
	}

	let pattern = pattern.as_bytes();
	let value = value.as_bytes();
	let (mut p, mut v) = (0usize, 0usize);
	let (mut star, mut resume) = (None, 0usize);

	while v < value.len() {
		if p < pattern.len() && pattern[p] == b'*' {
			star = Some(p);
			resume = v;
			p += 1;
		} else if p < pattern.len() && pattern[p] == value[v] {
			p += 1;
			v += 1;
		} else if let Some(star_at) = star {
			p = star_at + 1;
			resume += 1;
			v = resume;
		} else {
			return false;
		}
	}

	while p < pattern.len() && pattern[p] == b'*' {
		p += 1;
	}

	p == pattern.len()
}

/// Path matcher first, glob as fallback.
pub fn resource_match(pattern: &str, resource: &str) -> bool {
	path_match(pattern, resource) || glob_match(pattern, resource)
}

/// Exact (case-insensitive) match, or the universal `*` action.
pub fn action_match(pattern: &str, action: &str) -> bool {
	pattern == "*" || pattern.eq_ignore_ascii_case(action)
}
