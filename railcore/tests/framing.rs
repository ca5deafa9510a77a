//! Integration-level check that the framer tolerates arbitrary chunking
//! regardless of how the underlying transport happens to split reads
//! (spec §8: "framer accepts arbitrarily-chunked input").

use std::io::{self, Read};

use railcore::net::FrameReader;
use railcore::protocol::Action;

/// Wraps a byte slice and parcels it out `chunk_size` bytes at a time,
/// standing in for a socket that never hands back a whole frame in one read.
struct DrippingReader<'a> {
    remaining: &'a [u8],
    chunk_size: usize,
}

impl Read for DrippingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk_size.min(self.remaining.len()).min(buf.len());
        buf[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        Ok(n)
    }
}

fn encode_request(action: u32, payload: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&action.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

#[test]
fn parses_a_run_of_frames_dripped_three_bytes_at_a_time() {
    let mut bytes = encode_request(1, r#"{"name":"alice"}"#);
    bytes.extend(encode_request(10, r#"{"layer":1}"#));
    bytes.extend(encode_request(5, "{}"));

    let mut reader_state = DrippingReader { remaining: &bytes, chunk_size: 3 };
    let mut framer = FrameReader::new(4, 4);

    let first = framer.next_request(&mut reader_state).unwrap().unwrap().unwrap();
    assert_eq!(first.action, Action::Login);
    assert_eq!(first.payload["name"], "alice");

    let second = framer.next_request(&mut reader_state).unwrap().unwrap().unwrap();
    assert_eq!(second.action, Action::Map);
    assert_eq!(second.payload["layer"], 1);

    let third = framer.next_request(&mut reader_state).unwrap().unwrap().unwrap();
    assert_eq!(third.action, Action::Turn);

    assert!(framer.next_request(&mut reader_state).unwrap().is_none());
}

#[test]
fn single_byte_chunks_still_resync_after_a_bad_action_code() {
    let mut bytes = encode_request(777, "{}");
    bytes.extend(encode_request(6, "{}"));

    let mut reader_state = DrippingReader { remaining: &bytes, chunk_size: 1 };
    let mut framer = FrameReader::new(4, 4);

    let bad = framer.next_request(&mut reader_state).unwrap().unwrap();
    assert!(bad.is_err());

    let good = framer.next_request(&mut reader_state).unwrap().unwrap().unwrap();
    assert_eq!(good.action, Action::Player);
}
