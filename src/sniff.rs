//! Content-type detection from file bytes.
//!
//! Only the leading bytes are inspected.  File names are never consulted.

/// Number of leading bytes looked at.
pub const SNIFF_LEN: usize = 512;

/// Fallback for text without a recognizable signature.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Fallback for anything else.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the media type of `data`.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    if head.iter().any(|&b| is_binary_byte(b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

/// Control bytes that never appear in text.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
