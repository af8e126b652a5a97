use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use std::borrow::Cow;

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

/// Escape XML special characters.
///
/// # Examples
///
/// ```
/// use longan::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Escape into a borrowed string when nothing needs replacing.
#[inline]
pub fn escape_xml_cow(s: &str) -> Cow<'_, str> {
    if XML_ESCAPER.is_match(s) {
        Cow::Owned(escape_xml(s))
    } else {
        Cow::Borrowed(s)
    }
}

/// Unescape XML entities and character references.
///
/// Handles the five predefined entities plus decimal (`&#10;`) and
/// hexadecimal (`&#x1F600;`) character references in a single pass, so
/// `&amp;#65;` becomes `&#65;` rather than `A`. Unknown or malformed
/// entities are left unchanged.
///
/// # Examples
///
/// ```
/// use longan::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&quot;hello&apos;"), "\"hello'");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("line&#10;break"), "line\nbreak");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// assert_eq!(unescape_xml("&amp"), "&amp");
/// ```
pub fn unescape_xml(s: &str) -> String {
    let bytes = s.as_bytes();
    let Some(first) = memchr::memchr(b'&', bytes) else {
        return s.to_string();
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut pos = first;

    while pos < bytes.len() {
        let Some(amp) = memchr::memchr(b'&', &bytes[pos..]) else {
            out.push_str(&s[pos..]);
            break;
        };
        let amp = pos + amp;
        out.push_str(&s[pos..amp]);

        let decoded = memchr::memchr(b';', &bytes[amp..])
            .filter(|&len| len <= 10)
            .and_then(|len| decode_entity(&s[amp + 1..amp + len]).map(|ch| (ch, len)));

        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                pos = amp + len + 1;
            },
            None => {
                out.push('&');
                pos = amp + 1;
            },
        }
    }

    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        },
    }
}
