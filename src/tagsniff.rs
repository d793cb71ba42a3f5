//! Tag sniffer: scans the pre-pack command-list section of a `receive-pack`
//! request body for `<old> <new> refs/tags/<name>` lines and surfaces a `tag`
//! event for each non-zero-`new` match.
//!
//! A naive implementation that discards processed bytes after each chunk can
//! lose a match straddling a chunk boundary. This keeps a bounded sliding
//! window at least as wide as the longest plausible command line before
//! discarding, so a match split across two `feed` calls is still found.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::events::TagInfo;

/// 256 bytes comfortably covers two 40-hex-char SHA-1 ids, `refs/tags/<name>`,
/// and capability-separator padding.
pub const TAG_SCAN_WINDOW: usize = 256;

const ZERO_OID: &str = "0000000000000000000000000000000000000000";

static PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u)([0-9a-f]{40}) ([0-9a-f]{40}) refs/tags/([^\s\x00]+)[\s\x00]").unwrap()
});

/// Incremental scanner over the pre-pack section of a `receive-pack` body.
/// Stops scanning once packfile framing begins (`PACK` magic observed).
pub struct TagSniffer {
    repo: String,
    buffer: Vec<u8>,
    consumed_total: usize,
    pack_seen: bool,
}

impl TagSniffer {
    pub fn new(repo: impl Into<String>) -> Self {
        TagSniffer {
            repo: repo.into(),
            buffer: Vec::new(),
            consumed_total: 0,
            pack_seen: false,
        }
    }

    /// Feed the next chunk of request body bytes; returns any tag creations found
    /// in this call (matches already reported are never re-reported, since the
    /// matched region is dropped from the window once located).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<TagInfo> {
        if self.pack_seen {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        if let Some(pack_at) = find_pack_magic(&self.buffer) {
            self.buffer.truncate(pack_at);
            self.pack_seen = true;
        }

        let mut found = Vec::new();
        let mut scanned_to = 0;
        for cap in PATTERN.captures_iter(&self.buffer) {
            let whole = cap.get(0).unwrap();
            let old = std::str::from_utf8(&cap[1]).unwrap();
            let new = std::str::from_utf8(&cap[2]).unwrap();
            let name = String::from_utf8_lossy(&cap[3]).into_owned();
            if new != ZERO_OID {
                found.push(TagInfo {
                    repo: self.repo.clone(),
                    commit: new.to_string(),
                    version: name,
                });
            }
            let _ = old;
            scanned_to = whole.end();
        }

        // Keep a trailing window at least TAG_SCAN_WINDOW wide so a command line
        // split across this call and the next is still matched once complete.
        if self.buffer.len() > TAG_SCAN_WINDOW {
            let keep_from = scanned_to.max(self.buffer.len().saturating_sub(TAG_SCAN_WINDOW));
            self.consumed_total += keep_from;
            self.buffer.drain(..keep_from);
        }

        if self.pack_seen {
            self.buffer.clear();
        }

        found
    }
}

/// Git packfiles start with the 4-byte magic `PACK`.
fn find_pack_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"PACK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_single_tag_creation() {
        let mut sniffer = TagSniffer::new("r1");
        let old = "0".repeat(40);
        let new = "a".repeat(40);
        let line = format!("{old} {new} refs/tags/v1.0.0\0 report-status\n");
        let found = sniffer.feed(line.as_bytes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "v1.0.0");
        assert_eq!(found[0].commit, new);
    }

    #[test]
    fn ignores_zero_new_oid() {
        let mut sniffer = TagSniffer::new("r1");
        let old = "a".repeat(40);
        let new = "0".repeat(40);
        let line = format!("{old} {new} refs/tags/deleted\0\n");
        let found = sniffer.feed(line.as_bytes());
        assert!(found.is_empty());
    }

    #[test]
    fn ignores_branch_updates() {
        let mut sniffer = TagSniffer::new("r1");
        let old = "0".repeat(40);
        let new = "a".repeat(40);
        let line = format!("{old} {new} refs/heads/main\0 report-status\n");
        let found = sniffer.feed(line.as_bytes());
        assert!(found.is_empty());
    }

    #[test]
    fn detects_match_split_across_chunk_boundary() {
        let mut sniffer = TagSniffer::new("r1");
        let old = "0".repeat(40);
        let new = "b".repeat(40);
        let line = format!("{old} {new} refs/tags/v2.0.0\0 report-status\n");
        let bytes = line.as_bytes();
        let split_at = bytes.len() / 2;

        let first = sniffer.feed(&bytes[..split_at]);
        assert!(first.is_empty());
        let second = sniffer.feed(&bytes[split_at..]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].version, "v2.0.0");
    }

    #[test]
    fn stops_scanning_once_pack_magic_seen() {
        let mut sniffer = TagSniffer::new("r1");
        let old = "0".repeat(40);
        let new = "c".repeat(40);
        let mut body = format!("{old} {new} refs/tags/ignored\0\n").into_bytes();
        body.extend_from_slice(b"PACKtrailinggarbagethatwontmatchanything");
        let found = sniffer.feed(&body);
        // The tag line precedes PACK, so it is still found once...
        assert_eq!(found.len(), 1);

        // ...but nothing after PACK is ever scanned, even if it looks tag-shaped.
        let old2 = "0".repeat(40);
        let new2 = "d".repeat(40);
        let more = format!("{old2} {new2} refs/tags/afterpack\0\n");
        let found2 = sniffer.feed(more.as_bytes());
        assert!(found2.is_empty());
    }
}
