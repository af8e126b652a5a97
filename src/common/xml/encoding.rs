//! Character-set handling for XML parts.
//!
//! Package parts are almost always UTF-8, but producers occasionally emit
//! UTF-16 (with a byte order mark) or a legacy single/multi-byte charset
//! named in the XML declaration. Everything downstream of this module
//! assumes UTF-8, so parts are transcoded once before parsing.

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// How far into a part to look for the XML declaration.
const PROLOG_SCAN_LIMIT: usize = 256;

/// Return the part content as UTF-8 bytes.
///
/// A UTF-8 byte order mark is stripped. UTF-16 input (detected by BOM) and
/// any non-UTF-8 `encoding="..."` label known to `encoding_rs` are decoded.
/// Unknown labels are treated as UTF-8.
pub fn transcode_to_utf8(content: &[u8]) -> Cow<'_, [u8]> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(content) {
        if encoding == UTF_8 {
            return Cow::Borrowed(&content[bom_len..]);
        }
        let (decoded, _) = encoding.decode_without_bom_handling(&content[bom_len..]);
        return Cow::Owned(decoded.into_owned().into_bytes());
    }

    match declared_encoding(content) {
        Some(encoding) if encoding != UTF_8 => {
            log::debug!("transcoding XML part from {}", encoding.name());
            let (decoded, _) = encoding.decode_without_bom_handling(content);
            Cow::Owned(decoded.into_owned().into_bytes())
        },
        _ => Cow::Borrowed(content),
    }
}

/// Find the encoding named in the XML declaration, if any.
fn declared_encoding(content: &[u8]) -> Option<&'static Encoding> {
    if !content.starts_with(b"<?xml") {
        return None;
    }
    let head = &content[..content.len().min(PROLOG_SCAN_LIMIT)];
    let end = memchr::memmem::find(head, b"?>")?;
    let prolog = &head[..end];
    let start = memchr::memmem::find(prolog, b"encoding=")? + b"encoding=".len();
    let quote = *prolog.get(start)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = memchr::memchr(quote, &prolog[start + 1..])?;
    let label = &prolog[start + 1..start + 1 + len];
    let encoding = Encoding::for_label(label);
    if encoding.is_none() {
        log::warn!(
            "unknown XML encoding label {:?}, reading as UTF-8",
            String::from_utf8_lossy(label)
        );
    }
    encoding
}
