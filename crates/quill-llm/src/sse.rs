//! # SSE Parser
//!
//! Line-level parsing for the upstream event stream. The provider sends
//! newline-delimited `data: <json>` frames terminated by a literal
//! `data: [DONE]` sentinel. This module handles:
//!
//! - Line buffering from chunked responses
//! - `data: ` prefix extraction
//! - `[DONE]` marker filtering
//! - Skipping comments, blank lines, and invalid UTF-8
//!
//! One malformed line never aborts the whole stream — bad lines are skipped
//! and parsing continues with the next.

use bytes::BytesMut;

/// Drain complete lines from the buffer, returning their `data:` payloads.
///
/// Leaves any trailing partial line in the buffer for the next chunk.
pub fn drain_data_lines(buffer: &mut BytesMut) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        // Split the line bytes out of the buffer (zero-copy split)
        let mut line_bytes = buffer.split_to(newline_pos + 1);
        line_bytes.truncate(line_bytes.len() - 1);
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.truncate(line_bytes.len() - 1);
        }

        let Ok(line) = std::str::from_utf8(&line_bytes) else {
            continue; // skip invalid UTF-8 lines
        };

        if let Some(data) = extract_sse_data(line) {
            payloads.push(data);
        }
    }

    payloads
}

/// Extract the data payload from an SSE line.
///
/// Returns `Some(data)` for valid data lines, `None` for comments, empty
/// lines, non-data fields, and the `[DONE]` sentinel.
pub fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    // Skip empty lines and comments
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?;

    let data = data.trim();

    // The sentinel means "no more deltas" — not forwarded
    if data == "[DONE]" || data.is_empty() {
        return None;
    }

    Some(data.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── extract_sse_data ─────────────────────────────────────────────────

    #[test]
    fn extract_data_line() {
        assert_eq!(
            extract_sse_data("data: {\"token\":\"hi\"}"),
            Some("{\"token\":\"hi\"}".into())
        );
    }

    #[test]
    fn extract_data_line_no_space() {
        assert_eq!(
            extract_sse_data("data:{\"token\":\"hi\"}"),
            Some("{\"token\":\"hi\"}".into())
        );
    }

    #[test]
    fn extract_skips_done_sentinel() {
        assert_eq!(extract_sse_data("data: [DONE]"), None);
    }

    #[test]
    fn extract_skips_empty_data() {
        assert_eq!(extract_sse_data("data: "), None);
        assert_eq!(extract_sse_data("data:"), None);
    }

    #[test]
    fn extract_skips_empty_line_and_comment() {
        assert_eq!(extract_sse_data(""), None);
        assert_eq!(extract_sse_data("   "), None);
        assert_eq!(extract_sse_data(": keep-alive"), None);
    }

    #[test]
    fn extract_skips_non_data_fields() {
        assert_eq!(extract_sse_data("event: message"), None);
        assert_eq!(extract_sse_data("id: 42"), None);
    }

    // ── drain_data_lines ─────────────────────────────────────────────────

    #[test]
    fn drains_complete_lines() {
        let mut buffer = BytesMut::from(&b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"[..]);
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn keeps_partial_line_in_buffer() {
        let mut buffer = BytesMut::from(&b"data: {\"a\":1}\n\ndata: {\"par"[..]);
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}"]);
        assert_eq!(&buffer[..], b"data: {\"par");

        buffer.extend_from_slice(b"tial\":true}\n");
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"partial\":true}"]);
    }

    #[test]
    fn handles_carriage_returns() {
        let mut buffer = BytesMut::from(&b"data: {\"cr\":true}\r\n\r\n"[..]);
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"cr\":true}"]);
    }

    #[test]
    fn filters_sentinel_and_noise() {
        let mut buffer =
            BytesMut::from(&b": comment\ndata: {\"v\":1}\nevent: ping\ndata: [DONE]\n"[..]);
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"v\":1}"]);
    }

    #[test]
    fn skips_invalid_utf8_line() {
        let mut buffer = BytesMut::from(&b"data: \xff\xfe\ndata: {\"ok\":1}\n"[..]);
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"ok\":1}"]);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buffer = BytesMut::new();
        assert!(drain_data_lines(&mut buffer).is_empty());
    }
}
