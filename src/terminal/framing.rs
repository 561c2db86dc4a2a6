//! Binary PTY frame framing: `[id_len: u8][id bytes][payload bytes]`.
//!
//! The control-plane (`open`/`resize`/`close`/`opened`/`exit`/`error`) goes
//! over WebSocket text frames as plain JSON; only stdin/stdout bytes use
//! this binary shape, since JSON-wrapping raw terminal bytes would mean
//! base64 overhead on every keystroke and screen repaint.

pub fn encode(session_id: &str, payload: &[u8]) -> Vec<u8> {
    let id_bytes = session_id.as_bytes();
    let mut frame = Vec::with_capacity(1 + id_bytes.len() + payload.len());
    frame.push(id_bytes.len() as u8);
    frame.extend_from_slice(id_bytes);
    frame.extend_from_slice(payload);
    frame
}

pub fn decode(frame: &[u8]) -> Option<(&str, &[u8])> {
    let id_len = *frame.first()? as usize;
    let id_bytes = frame.get(1..1 + id_len)?;
    let payload = frame.get(1 + id_len..)?;
    let id = std::str::from_utf8(id_bytes).ok()?;
    Some((id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_id_and_payload() {
        let frame = encode("s1", b"hello");
        let (id, payload) = decode(&frame).unwrap();
        assert_eq!(id, "s1");
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = encode("s1", b"");
        let (id, payload) = decode(&frame).unwrap();
        assert_eq!(id, "s1");
        assert!(payload.is_empty());
    }

    #[test]
    fn truncated_frame_fails_gracefully() {
        assert!(decode(&[5, b'a', b'b']).is_none());
    }
}
