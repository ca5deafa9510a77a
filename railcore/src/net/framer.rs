//! Incremental request framing (`GameServerRequestHandler.parse_data`).
//!
//! [`FrameReader`] is tolerant of arbitrary chunking: feeding it one byte at a
//! time and feeding it the whole frame in one `read()` produce the same
//! sequence of [`Request`]s.

use std::io;

use serde_json::Value;

use crate::error::{GameError, GameResult};
use crate::net::buffer::Buffer;
use crate::protocol::{Action, Request};

#[derive(Default, Clone, Copy)]
enum ReadState {
    #[default]
    Action,
    MsgLen {
        action: u32,
    },
    Payload {
        action: u32,
        len: usize,
    },
}

/// Reads length-prefixed frames off of a blocking byte stream, one
/// [`Buffer::ingress`] call per underlying `read()`.
pub struct FrameReader {
    buffer: Buffer,
    state: ReadState,
    action_header: usize,
    msglen_header: usize,
}

impl FrameReader {
    pub fn new(action_header: usize, msglen_header: usize) -> FrameReader {
        FrameReader {
            buffer: Buffer::new(),
            state: ReadState::Action,
            action_header,
            msglen_header,
        }
    }

    /// Blocks on `reader` until either a complete request has been parsed or
    /// the connection reaches EOF (`Ok(None)`).
    pub fn next_request<R: io::Read>(&mut self, reader: &mut R) -> io::Result<Option<GameResult<Request>>> {
        loop {
            if let Some(request) = self.try_parse()? {
                return Ok(Some(request));
            }
            if self.buffer.ingress(reader)? == 0 {
                return Ok(None);
            }
        }
    }

    fn try_parse(&mut self) -> io::Result<Option<GameResult<Request>>> {
        loop {
            match self.state {
                ReadState::Action => {
                    let Some(bytes) = self.buffer.take(self.action_header) else {
                        return Ok(None);
                    };
                    let action = read_le_u32(&bytes);
                    self.state = ReadState::MsgLen { action };
                }
                ReadState::MsgLen { action } => {
                    let Some(bytes) = self.buffer.take(self.msglen_header) else {
                        return Ok(None);
                    };
                    let len = read_le_u32(&bytes) as usize;
                    self.state = ReadState::Payload { action, len };
                }
                ReadState::Payload { action, len } => {
                    let Some(bytes) = self.buffer.take(len) else {
                        return Ok(None);
                    };
                    self.state = ReadState::Action;
                    return Ok(Some(decode_payload(action, &bytes)));
                }
            }
        }
    }
}

fn read_le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
    u32::from_le_bytes(buf)
}

fn decode_payload(action: u32, bytes: &[u8]) -> GameResult<Request> {
    let action = Action::from_u32(action)?;
    let payload: Value = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(bytes).map_err(|e| GameError::bad_command(format!("Invalid JSON payload: {e}")))?
    };
    if !payload.is_object() {
        return Err(GameError::bad_command("The command's payload is not a dictionary"));
    }
    Ok(Request { action, payload })
}

/// Encodes a response frame: `result:u32-LE | msglen:u32-LE | payload`.
pub fn encode_response(result_header: usize, msglen_header: usize, result_code: u32, payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(result_header + msglen_header + payload.len());
    out.extend_from_slice(&result_code.to_le_bytes()[..result_header]);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..msglen_header]);
    out.extend_from_slice(payload.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_request(action: u32, payload: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&action.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    #[test]
    fn parses_whole_frame_in_one_read() {
        let bytes = encode_request(1, r#"{"name":"alice"}"#);
        let mut cursor = Cursor::new(bytes);
        let mut reader = FrameReader::new(4, 4);

        let request = reader.next_request(&mut cursor).unwrap().unwrap().unwrap();
        assert_eq!(request.action, Action::Login);
        assert_eq!(request.payload["name"], "alice");
    }

    #[test]
    fn parses_frame_fed_one_byte_at_a_time() {
        let bytes = encode_request(5, "{}");
        let mut reader = FrameReader::new(4, 4);

        for b in &bytes[..bytes.len() - 1] {
            let mut cursor = Cursor::new(vec![*b]);
            assert!(reader.next_request(&mut cursor).unwrap().is_none());
        }
        let mut cursor = Cursor::new(vec![*bytes.last().unwrap()]);
        let request = reader.next_request(&mut cursor).unwrap().unwrap().unwrap();
        assert_eq!(request.action, Action::Turn);
    }

    #[test]
    fn unknown_action_reports_bad_command_and_resyncs() {
        let mut bytes = encode_request(9999, "{}");
        bytes.extend(encode_request(1, r#"{"name":"bob"}"#));
        let mut cursor = Cursor::new(bytes);
        let mut reader = FrameReader::new(4, 4);

        let first = reader.next_request(&mut cursor).unwrap().unwrap();
        assert!(first.is_err());

        let second = reader.next_request(&mut cursor).unwrap().unwrap().unwrap();
        assert_eq!(second.action, Action::Login);
    }
}
