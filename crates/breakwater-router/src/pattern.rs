//! Route pattern parsing and matching.

use breakwater_core::urlenc::split_and_decode_path;

/// A parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// A literal segment, compared case-sensitively against the decoded
    /// path segment.
    Literal(String),
    /// `:name` — matches any nonempty decoded segment and captures it.
    Param(String),
    /// `*` — matches the current and all remaining segments.
    Wildcard,
}

/// A registered route pattern.
///
/// The original registration string is kept verbatim and never rewritten;
/// the segment list is derived from it once at registration.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<PatternSegment>,
    is_static: bool,
}

impl RoutePattern {
    /// Parse a pattern string.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments: Vec<PatternSegment> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    PatternSegment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    PatternSegment::Param(name.to_string())
                } else {
                    PatternSegment::Literal(s.to_string())
                }
            })
            .collect();
        let is_static = segments
            .iter()
            .all(|s| matches!(s, PatternSegment::Literal(_)));

        Self {
            pattern: pattern.to_string(),
            segments,
            is_static,
        }
    }

    /// The original registration string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// The parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Number of `:name` captures in the pattern.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Param(_)))
            .count()
    }

    /// Match a raw (still percent-encoded) request path against the pattern.
    ///
    /// The fast path accepts a verbatim string match without decoding.
    /// A pattern without captures or wildcards can then be rejected outright;
    /// otherwise both sides are split into decoded segments and walked
    /// pairwise, with a trailing `*` absorbing any remaining segments.
    #[must_use]
    pub fn matches(&self, raw_path: &str) -> bool {
        if raw_path == self.pattern {
            return true;
        }
        if self.is_static {
            return false;
        }

        let path_segments = split_and_decode_path(raw_path);
        let mut idx = 0;

        for segment in &self.segments {
            match segment {
                PatternSegment::Literal(expected) => {
                    if idx >= path_segments.len() || path_segments[idx] != *expected {
                        return false;
                    }
                    idx += 1;
                }
                PatternSegment::Param(_) => {
                    if idx >= path_segments.len() || path_segments[idx].is_empty() {
                        return false;
                    }
                    idx += 1;
                }
                PatternSegment::Wildcard => return true,
            }
        }

        idx == path_segments.len()
    }

    /// Extract `:name` captures from a matching path.
    ///
    /// The path is re-decoded and walked against the pattern; each `:name`
    /// segment captures the decoded segment at its position. Call only after
    /// [`matches`](Self::matches) accepted the path.
    #[must_use]
    pub fn extract_params(&self, raw_path: &str) -> Vec<(String, String)> {
        let path_segments = split_and_decode_path(raw_path);
        let mut params = Vec::new();

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                PatternSegment::Param(name) => {
                    if let Some(value) = path_segments.get(idx) {
                        params.push((name.clone(), value.clone()));
                    }
                }
                PatternSegment::Wildcard => break,
                PatternSegment::Literal(_) => {}
            }
        }

        params
    }
}
