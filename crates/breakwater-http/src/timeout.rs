//! Timeout and validation engine.
//!
//! The engine is a pure function of per-connection timing facts, the
//! configuration, and the current monotonic time. The connection driver
//! polls it at every read-completion boundary; a verdict other than
//! [`Verdict::Allowed`] vetoes continuation. The body-progress rule is what
//! separates a legitimately slow network from a Slowloris-style drip: a
//! client may take its time, but it must have moved a configured fraction
//! of the declared body before the body deadline.

use std::fmt;

use breakwater_core::ServerConfig;

/// Per-connection timing facts.
///
/// All timestamps are monotonic milliseconds from the driver's clock.
/// Mutated only by the read path of the owning connection, so no locking
/// is involved.
#[derive(Debug, Clone)]
pub struct ConnectionTiming {
    /// When the connection was accepted.
    pub start_time: u64,
    /// When the last read completed.
    pub last_read_time: u64,
    /// Whether `\r\n\r\n` has been observed.
    pub headers_complete: bool,
    /// Declared body length, known once headers are complete.
    pub expected_body_length: Option<u64>,
    /// Body bytes received so far.
    pub received_body_length: u64,
}

impl ConnectionTiming {
    /// Start the clock for a connection accepted at `now`.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            start_time: now,
            last_read_time: now,
            headers_complete: false,
            expected_body_length: None,
            received_body_length: 0,
        }
    }

    /// Record a completed read at `now`.
    pub fn record_read(&mut self, now: u64) {
        self.last_read_time = now;
    }

    /// Record that the header section is complete and the declared body
    /// length is known (absent Content-Length declares zero).
    pub fn mark_headers_complete(&mut self, expected_body_length: u64) {
        self.headers_complete = true;
        self.expected_body_length = Some(expected_body_length);
    }

    /// Update the received body byte count.
    pub fn set_received_body_length(&mut self, received: u64) {
        self.received_body_length = received;
    }
}

/// Advisory verdict from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Continue serving the connection.
    Allowed,
    /// Total request size limit exceeded.
    RequestTooLarge,
    /// Header count limit exceeded.
    HeadersTooMany,
    /// Header section size limit exceeded.
    HeaderTooLarge,
    /// Request-target length limit exceeded.
    UriTooLong,
    /// Declared body size limit exceeded.
    BodyTooLarge,
    /// A phase deadline passed without the required progress.
    ProcessingTimeout,
    /// The connection outlived its total lifetime bound.
    ConnectionTimeout,
    /// Too long since the last read completed.
    IdleTimeout,
}

impl Verdict {
    /// True when the connection may continue.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allowed => "allowed",
            Self::RequestTooLarge => "request too large",
            Self::HeadersTooMany => "too many headers",
            Self::HeaderTooLarge => "header too large",
            Self::UriTooLong => "uri too long",
            Self::BodyTooLarge => "body too large",
            Self::ProcessingTimeout => "processing timeout",
            Self::ConnectionTimeout => "connection timeout",
            Self::IdleTimeout => "idle timeout",
        };
        f.write_str(s)
    }
}

/// Evaluate the timing rules, first non-allowed verdict wins.
///
/// Rule order:
///
/// 1. total connection lifetime over `connection_timeout_ms`
/// 2. read gap over `idle_timeout_ms`
/// 3. headers still incomplete past `header_timeout_ms`
/// 4. body progress below `body_read_threshold_percent` of the declared
///    length past `body_timeout_ms`
///
/// Disabled globally by `enable_timeout_protection = false`.
#[must_use]
pub fn evaluate(timing: &ConnectionTiming, config: &ServerConfig, now: u64) -> Verdict {
    if !config.enable_timeout_protection {
        return Verdict::Allowed;
    }

    let alive = now.saturating_sub(timing.start_time);
    if alive > config.connection_timeout_ms {
        return Verdict::ConnectionTimeout;
    }

    if now.saturating_sub(timing.last_read_time) > config.idle_timeout_ms {
        return Verdict::IdleTimeout;
    }

    if !timing.headers_complete && alive > config.header_timeout_ms {
        return Verdict::ProcessingTimeout;
    }

    if timing.headers_complete {
        if let Some(expected) = timing.expected_body_length {
            if alive > config.body_timeout_ms {
                let required = expected.saturating_mul(config.body_read_threshold_percent) / 100;
                if timing.received_body_length < required {
                    return Verdict::ProcessingTimeout;
                }
            }
        }
    }

    Verdict::Allowed
}

// ============================================================================
// Size validators
// ============================================================================
//
// Independent pure predicates over the configured limits, shared by the
// parser's error classification and the driver's pre-parse guards. Each
// returns true when the input is acceptable; all pass unconditionally when
// `enable_request_validation` is off.

/// Validate the accumulated request size.
#[must_use]
pub fn validate_request_size(size: usize, config: &ServerConfig) -> bool {
    !config.enable_request_validation || size <= config.max_request_size
}

/// Validate a header count.
#[must_use]
pub fn validate_header_count(count: usize, config: &ServerConfig) -> bool {
    !config.enable_request_validation || count <= config.max_header_count
}

/// Validate the header section size.
#[must_use]
pub fn validate_header_size(size: usize, config: &ServerConfig) -> bool {
    !config.enable_request_validation || size <= config.max_header_size
}

/// Validate a request-target length.
#[must_use]
pub fn validate_uri_length(length: usize, config: &ServerConfig) -> bool {
    !config.enable_request_validation || length <= config.max_uri_length
}

/// Validate a declared body size.
#[must_use]
pub fn validate_body_size(size: u64, config: &ServerConfig) -> bool {
    !config.enable_request_validation || size <= config.max_body_size as u64
}

/// Scan raw header bytes for a `Content-Length` value.
///
/// Walks lines up to the blank line, matches the `content-length:` prefix
/// case-insensitively, trims spaces and tabs, and parses a decimal
/// non-negative integer. Any malformed input yields `None`.
#[must_use]
pub fn parse_content_length(buffer: &[u8]) -> Option<u64> {
    let mut remaining = buffer;
    loop {
        let line_end = remaining.windows(2).position(|w| w == b"\r\n")?;
        if line_end == 0 {
            // Blank line: end of headers, no Content-Length seen.
            return None;
        }
        let line = &remaining[..line_end];
        remaining = &remaining[line_end + 2..];

        const PREFIX: &[u8] = b"content-length:";
        if line.len() >= PREFIX.len() && line[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
            let mut value = &line[PREFIX.len()..];
            while let [b' ' | b'\t', rest @ ..] = value {
                value = rest;
            }
            while let [rest @ .., b' ' | b'\t'] = value {
                value = rest;
            }
            if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
                return None;
            }
            return std::str::from_utf8(value).ok()?.parse().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::default()
    }

    fn timing(now: u64) -> ConnectionTiming {
        ConnectionTiming::new(now)
    }

    // ========================================================================
    // Rule ordering
    // ========================================================================

    #[test]
    fn fresh_connection_is_allowed() {
        let t = timing(1000);
        assert_eq!(evaluate(&t, &config(), 1000), Verdict::Allowed);
        assert_eq!(evaluate(&t, &config(), 1001), Verdict::Allowed);
    }

    #[test]
    fn rule1_connection_timeout() {
        let t = timing(0);
        let cfg = config();
        // Just inside the bound: rule 2 fires instead (idle), rule 1 not yet.
        assert_eq!(evaluate(&t, &cfg, cfg.connection_timeout_ms), Verdict::IdleTimeout);
        assert_eq!(
            evaluate(&t, &cfg, cfg.connection_timeout_ms + 1),
            Verdict::ConnectionTimeout
        );
    }

    #[test]
    fn rule1_wins_over_all_others() {
        let mut t = timing(0);
        t.mark_headers_complete(1000);
        let cfg = config();
        // Everything is overdue; connection timeout is reported first.
        assert_eq!(evaluate(&t, &cfg, 10_000_000), Verdict::ConnectionTimeout);
    }

    #[test]
    fn rule2_idle_timeout() {
        let cfg = config();
        let mut t = timing(0);
        // Keep the connection young but the last read stale.
        t.record_read(0);
        assert_eq!(evaluate(&t, &cfg, cfg.idle_timeout_ms), Verdict::Allowed);
        assert_eq!(
            evaluate(&t, &cfg, cfg.idle_timeout_ms + 1),
            Verdict::IdleTimeout
        );
    }

    #[test]
    fn recent_read_resets_idle_clock() {
        let cfg = config();
        let mut t = timing(0);
        t.record_read(6000);
        assert_eq!(evaluate(&t, &cfg, 7000), Verdict::Allowed);
    }

    #[test]
    fn rule3_header_phase_deadline() {
        let cfg = config();
        let mut t = timing(0);
        // Reads keep arriving (idle never fires) but headers never finish.
        t.record_read(cfg.header_timeout_ms + 1);
        assert_eq!(
            evaluate(&t, &cfg, cfg.header_timeout_ms + 1),
            Verdict::ProcessingTimeout
        );
    }

    #[test]
    fn rule3_does_not_fire_once_headers_complete() {
        let cfg = config();
        let mut t = timing(0);
        t.mark_headers_complete(0);
        t.record_read(cfg.header_timeout_ms + 1);
        assert_eq!(evaluate(&t, &cfg, cfg.header_timeout_ms + 1), Verdict::Allowed);
    }

    /// Body-phase config: the default connection deadline (30s) sits below
    /// the body deadline (60s), so stretch it to observe rule 4 alone.
    fn body_phase_config() -> ServerConfig {
        let mut cfg = config();
        cfg.connection_timeout_ms = 300_000;
        cfg
    }

    #[test]
    fn rule4_slowloris_drip_body_times_out() {
        let cfg = body_phase_config();
        let mut t = timing(0);
        t.mark_headers_complete(1000);
        // 10% threshold of 1000 bytes = 100 bytes required.
        t.set_received_body_length(99);
        t.record_read(cfg.body_timeout_ms + 1);
        assert_eq!(
            evaluate(&t, &cfg, cfg.body_timeout_ms + 1),
            Verdict::ProcessingTimeout
        );
    }

    #[test]
    fn rule4_passes_with_enough_progress() {
        let cfg = body_phase_config();
        let mut t = timing(0);
        t.mark_headers_complete(1000);
        t.set_received_body_length(100);
        t.record_read(cfg.body_timeout_ms + 1);
        assert_eq!(evaluate(&t, &cfg, cfg.body_timeout_ms + 1), Verdict::Allowed);
    }

    #[test]
    fn rule4_zero_expected_body_never_times_out() {
        let cfg = body_phase_config();
        let mut t = timing(0);
        t.mark_headers_complete(0);
        t.record_read(cfg.body_timeout_ms + 1);
        assert_eq!(evaluate(&t, &cfg, cfg.body_timeout_ms + 1), Verdict::Allowed);
    }

    #[test]
    fn kill_switch_disables_every_rule() {
        let cfg = config().with_timeout_protection(false);
        let t = timing(0);
        assert_eq!(evaluate(&t, &cfg, u64::MAX), Verdict::Allowed);
    }

    // ========================================================================
    // Size validators
    // ========================================================================

    #[test]
    fn validators_check_configured_bounds() {
        let cfg = config();
        assert!(validate_request_size(cfg.max_request_size, &cfg));
        assert!(!validate_request_size(cfg.max_request_size + 1, &cfg));
        assert!(validate_header_count(cfg.max_header_count, &cfg));
        assert!(!validate_header_count(cfg.max_header_count + 1, &cfg));
        assert!(validate_header_size(cfg.max_header_size, &cfg));
        assert!(!validate_header_size(cfg.max_header_size + 1, &cfg));
        assert!(validate_uri_length(cfg.max_uri_length, &cfg));
        assert!(!validate_uri_length(cfg.max_uri_length + 1, &cfg));
        assert!(validate_body_size(cfg.max_body_size as u64, &cfg));
        assert!(!validate_body_size(cfg.max_body_size as u64 + 1, &cfg));
    }

    #[test]
    fn validators_pass_when_validation_disabled() {
        let cfg = config().with_request_validation(false);
        assert!(validate_request_size(usize::MAX, &cfg));
        assert!(validate_header_count(usize::MAX, &cfg));
        assert!(validate_body_size(u64::MAX, &cfg));
    }

    // ========================================================================
    // parse_content_length
    // ========================================================================

    #[test]
    fn content_length_found_case_insensitively() {
        let buf = b"Host: x\r\nCONTENT-length: 42\r\n\r\n";
        assert_eq!(parse_content_length(buf), Some(42));
    }

    #[test]
    fn content_length_trims_spaces_and_tabs() {
        let buf = b"Content-Length: \t 7 \r\n\r\n";
        assert_eq!(parse_content_length(buf), Some(7));
    }

    #[test]
    fn content_length_absent_yields_none() {
        assert_eq!(parse_content_length(b"Host: x\r\n\r\n"), None);
        assert_eq!(parse_content_length(b""), None);
    }

    #[test]
    fn content_length_malformed_yields_none() {
        assert_eq!(parse_content_length(b"Content-Length: ten\r\n\r\n"), None);
        assert_eq!(parse_content_length(b"Content-Length: -5\r\n\r\n"), None);
        assert_eq!(parse_content_length(b"Content-Length:\r\n\r\n"), None);
        assert_eq!(parse_content_length(b"Content-Length: 1 2\r\n\r\n"), None);
    }

    #[test]
    fn scan_stops_at_blank_line() {
        let buf = b"Host: x\r\n\r\nContent-Length: 9\r\n\r\n";
        assert_eq!(parse_content_length(buf), None);
    }

    #[test]
    fn scan_without_terminator_yields_none() {
        assert_eq!(parse_content_length(b"Content-Length"), None);
    }
}
