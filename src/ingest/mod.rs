// src/ingest/mod.rs
pub mod providers;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

/// Normalize a post title: decode HTML entities, collapse whitespace, trim.
///
/// Reddit listings escape `&`, `<` and `>` in titles, so a raw title like
/// `"Tudor &amp; Rolex"` would otherwise never match the keyword `"&"`.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}
