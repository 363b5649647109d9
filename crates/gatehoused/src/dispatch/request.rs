//! Request framing for the socket transport.
//!
//! A frame is one JSONL request line, optionally followed by exactly
//! `payload_length` raw bytes.

use std::io::{self, BufRead, Read};

use gatehouse_config::TransportLimits;
use gatehouse_protocol::Request;

use super::errors::DispatchError;

/// A decoded request and its raw body.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) request: Request,
    pub(crate) payload: Option<Vec<u8>>,
}

/// Reads one frame.
///
/// Returns `Ok(None)` if the client disconnects without sending data.
pub(crate) fn read_frame<R: BufRead>(
    reader: &mut R,
    limits: &TransportLimits,
) -> Result<Option<Frame>, DispatchError> {
    let Some(line) = read_request_line(reader, limits.max_request_bytes)? else {
        return Ok(None);
    };
    let request = Request::parse(&line)?;

    let Some(len) = request.payload_length else {
        return Ok(Some(Frame {
            request,
            payload: None,
        }));
    };
    let line_bytes = u64::try_from(line.len()).unwrap_or(u64::MAX);
    limits
        .check(line_bytes, len)
        .map_err(|limit| DispatchError::RequestTooLarge { limit })?;

    let payload = read_payload(reader, len)?;
    Ok(Some(Frame {
        request,
        payload: Some(payload),
    }))
}

/// Reads a bounded request line, including its newline if present.
fn read_request_line<R: BufRead>(
    reader: &mut R,
    limit: u64,
) -> Result<Option<Vec<u8>>, DispatchError> {
    let mut line = Vec::new();
    let read = retry_interrupted(|| {
        reader
            .by_ref()
            .take(limit.saturating_add(1))
            .read_until(b'\n', &mut line)
    })?;
    if read == 0 {
        return Ok(None);
    }

    let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
    if u64::try_from(content.len()).unwrap_or(u64::MAX) > limit {
        return Err(DispatchError::RequestTooLarge { limit });
    }
    Ok(Some(line))
}

fn read_payload<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, DispatchError> {
    let mut payload = Vec::new();
    let read = retry_interrupted(|| reader.by_ref().take(len).read_to_end(&mut payload))?;
    if u64::try_from(read).unwrap_or(u64::MAX) < len {
        return Err(DispatchError::malformed(format!(
            "payload truncated after {read} of {len} bytes"
        )));
    }
    Ok(payload)
}

fn retry_interrupted(mut operation: impl FnMut() -> io::Result<usize>) -> io::Result<usize> {
    loop {
        match operation() {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn limits(max_request_bytes: u64, bypass: bool) -> TransportLimits {
        TransportLimits {
            max_request_bytes,
            max_payload_bytes: 16,
            binary_bypasses_request_limit: bypass,
        }
    }

    #[test]
    fn reads_a_line_and_its_payload() {
        let mut input = Cursor::new(
            b"{\"module\":\"Archive\",\"command\":\"Upload\",\"payload_length\":5}\nhello".to_vec(),
        );
        let frame = read_frame(&mut input, &limits(1024, true))
            .expect("frame")
            .expect("some frame");
        assert_eq!(frame.request.module(), "Archive");
        assert_eq!(frame.payload.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn empty_input_is_a_disconnect() {
        let mut input = Cursor::new(Vec::new());
        assert!(read_frame(&mut input, &limits(1024, true)).expect("read").is_none());
    }

    #[test]
    fn long_lines_are_rejected() {
        let mut input = Cursor::new(format!("{}\n", "x".repeat(64)).into_bytes());
        let error = read_frame(&mut input, &limits(32, true)).expect_err("too large");
        assert!(matches!(error, DispatchError::RequestTooLarge { limit: 32 }));
    }

    #[rstest]
    #[case::payload_over_its_own_limit(1024, true, 17)]
    #[case::payload_counted_against_the_line(60, false, 16)]
    fn payload_limits_are_enforced(#[case] max: u64, #[case] bypass: bool, #[case] len: u64) {
        let line = format!("{{\"module\":\"A\",\"command\":\"U\",\"payload_length\":{len}}}\n");
        let mut input = Cursor::new(line.into_bytes());
        let error = read_frame(&mut input, &limits(max, bypass)).expect_err("too large");
        assert!(matches!(error, DispatchError::RequestTooLarge { .. }));
    }

    #[test]
    fn truncated_payloads_are_malformed() {
        let mut input =
            Cursor::new(b"{\"module\":\"A\",\"command\":\"U\",\"payload_length\":8}\nabc".to_vec());
        let error = read_frame(&mut input, &limits(1024, true)).expect_err("truncated");
        assert!(matches!(error, DispatchError::Malformed(_)));
    }
}
