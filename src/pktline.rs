//! Git pkt-line framing. Each record is a 4-hex-digit length prefix (length
//! including the prefix itself) followed by the payload; `0000` is the flush
//! packet.

/// Encode a single pkt-line record: `<4-hex length><payload>`.
pub fn encode(payload: &str) -> Vec<u8> {
    let len = payload.len() + 4;
    let mut out = format!("{len:04x}").into_bytes();
    out.extend_from_slice(payload.as_bytes());
    out
}

pub const FLUSH: &[u8] = b"0000";

/// The advertisement banner: `<pkt-line "# service=<name>\n">0000`.
pub fn service_banner(service_name: &str) -> Vec<u8> {
    let mut out = encode(&format!("# service=git-{service_name}\n"));
    out.extend_from_slice(FLUSH);
    out
}
