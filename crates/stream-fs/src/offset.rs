//! Codec between byte positions and opaque offset tokens.
//!
//! Tokens are fixed-width zero-padded decimal so that string comparison
//! order equals byte-position order.

use duralog_stream::Offset;

/// Encodes a byte position as an offset token.
pub(crate) fn encode(pos: u64) -> Offset {
    Offset::new(format!("{pos:020}"))
}

/// Decodes an offset token back to a byte position.
///
/// The beginning sentinel and its alias decode to 0. Decoding is lenient:
/// offsets are opaque continuation tokens rather than validated input, so a
/// malformed token decodes to 0 instead of failing.
pub(crate) fn decode(offset: &Offset) -> u64 {
    if offset.is_beginning() {
        return 0;
    }
    offset
        .as_str()
        .trim_start_matches('0')
        .parse()
        .unwrap_or(0)
}
