use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").expect("static regex"));

/// Cells read as missing in every column, whatever its declared type.
/// Same set as the pandas `read_csv` defaults.
pub const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// UTF-8 when the bytes are valid UTF-8, otherwise Latin-1 (one char per byte).
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Strip byte-order-mark artifacts and surrounding whitespace from a header.
pub fn clean_header(raw: &str) -> String {
    raw.replace('\u{feff}', "")
        .replace("ï»¿", "")
        .trim()
        .to_string()
}

pub fn is_blank(s: &str) -> bool {
    BLANK.is_match(s)
}

/// Whitespace-only cells and the pandas default NA markers.
pub fn is_null_token(s: &str) -> bool {
    is_blank(s) || NULL_TOKENS.contains(&s.trim())
}
