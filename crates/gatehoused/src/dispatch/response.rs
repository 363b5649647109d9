//! Response serialization for the socket transport.

use std::io::Write;

use super::errors::DispatchError;
use super::pipeline::Outcome;

/// Writes an [`Outcome`] as a JSONL line followed by its raw payload.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a new response writer wrapping the given output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes the response line, any payload, and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_outcome(&mut self, outcome: &Outcome) -> Result<(), DispatchError> {
        outcome.response.write_jsonl(&mut self.writer)?;
        if let Some(payload) = &outcome.payload {
            self.writer.write_all(payload)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a failure response for `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        self.write_outcome(&Outcome::failure(error))
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_protocol::Response;
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_follows_the_line() {
        let mut buffer = Vec::new();
        let outcome = Outcome {
            response: Response::success(json!({})).with_payload_length(3),
            payload: Some(b"abc".to_vec()),
        };
        ResponseWriter::new(&mut buffer)
            .write_outcome(&outcome)
            .expect("write");
        assert_eq!(buffer, b"{\"status\":true,\"data\":{},\"payload_length\":3}\nabc");
    }

    #[test]
    fn errors_are_written_as_failures() {
        let mut buffer = Vec::new();
        ResponseWriter::new(&mut buffer)
            .write_error(&DispatchError::RequestTooLarge { limit: 10 })
            .expect("write");
        let response = Response::parse(&buffer).expect("response line");
        assert!(!response.status);
        assert_eq!(
            response.data,
            json!({ "error": "request_too_large", "limit": 10 })
        );
    }
}
