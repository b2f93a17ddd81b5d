//! Vector markup normalization and optimization
//!
//! Hand-written scanners over the markup text. Nothing here parses XML in
//! full; the passes only need the root start tag, attribute values, and
//! numeric literals.

use crate::config::SvgOptions;
use glyphsmith_core::{GlyphsmithError, Result};

pub const DEFAULT_VIEW_BOX: &str = "0 0 24 24";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

const PATH_COMMANDS: &str = "MmLlHhVvCcSsQqTtAaZz";

/// Remove Markdown code fences a chat model wraps around its answer
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => "",
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// Byte range of the root start tag: index of `<svg` and of its closing `>`
pub fn root_tag_bounds(markup: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = markup[from..].find("<svg") {
        let start = from + offset;
        let next = markup[start + 4..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            let end = start + markup[start..].find('>')?;
            return Some((start, end));
        }
        from = start + 4;
    }
    None
}

/// Normalize vector markup.
///
/// 1. Collapse whitespace runs and trim.
/// 2. Require a root `<svg ...>` start tag and a `</svg>` close tag.
/// 3. Add a default `viewBox` and the SVG namespace to the root when absent.
/// 4. Round numeric literals with more than two decimals to two.
/// 5. Collapse repeated identical path commands inside `d` attributes.
///
/// Only a missing root element is an error. The pass is idempotent.
pub fn normalize(markup: &str) -> Result<String> {
    let collapsed = collapse_whitespace(markup);

    let (start, end) = root_tag_bounds(&collapsed).ok_or_else(|| {
        GlyphsmithError::InvalidMarkup("missing <svg> root element".to_string())
    })?;
    if !collapsed[end..].contains("</svg>") {
        return Err(GlyphsmithError::InvalidMarkup(
            "missing </svg> closing tag".to_string(),
        ));
    }

    let with_root = inject_root_attributes(&collapsed, start, end);
    let rounded = round_decimals(&with_root);
    Ok(collapse_path_commands(&rounded))
}

/// True when the markup has a root element carrying a `viewBox`
pub fn is_well_formed(markup: &str) -> bool {
    match root_tag_bounds(markup) {
        Some((start, end)) => {
            markup[start..end].contains("viewBox") && markup[end..].contains("</svg>")
        }
        None => false,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inject_root_attributes(markup: &str, start: usize, end: usize) -> String {
    let root = &markup[start..end];
    let mut injected = String::new();
    if !root.contains("xmlns=") {
        injected.push_str(&format!(" xmlns=\"{}\"", SVG_NAMESPACE));
    }
    if !root.contains("viewBox") {
        injected.push_str(&format!(" viewBox=\"{}\"", DEFAULT_VIEW_BOX));
    }
    if injected.is_empty() {
        return markup.to_string();
    }

    let insert_at = start + 4;
    let mut out = String::with_capacity(markup.len() + injected.len());
    out.push_str(&markup[..insert_at]);
    out.push_str(&injected);
    out.push_str(&markup[insert_at..]);
    out
}

/// Round every `digits.digits` literal with three or more decimals to two
pub fn round_decimals(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            // Copy one whole char so multi-byte text stays intact
            let ch_len = text[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            out.push_str(&text[i..i + ch_len]);
            i += ch_len;
            continue;
        }

        let int_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let mut frac_len = 0;
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            frac_len = j - i - 1;
            i = j;
        }

        let literal = &text[int_start..i];
        match literal.parse::<f64>() {
            Ok(value) if frac_len > 2 => out.push_str(&format!("{:.2}", value)),
            _ => out.push_str(literal),
        }
    }
    out
}

fn collapse_path_commands(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(pos) = rest.find(" d=\"") {
        let value_start = pos + 4;
        out.push_str(&rest[..value_start]);
        let Some(len) = rest[value_start..].find('"') else {
            rest = &rest[value_start..];
            break;
        };
        out.push_str(&dedupe_commands(&rest[value_start..value_start + len]));
        rest = &rest[value_start + len..];
    }
    out.push_str(rest);
    out
}

fn dedupe_commands(path_data: &str) -> String {
    let mut out = String::with_capacity(path_data.len());
    for ch in path_data.chars() {
        if PATH_COMMANDS.contains(ch) && out.trim_end().ends_with(ch) {
            let kept = out.trim_end().len();
            out.truncate(kept);
            continue;
        }
        out.push(ch);
    }
    out
}

/// Size-oriented post-processing pass.
///
/// `optimize` drops comments, empty attributes, redundant default paint
/// attributes, and excess decimals; `minify` removes whitespace between tags.
/// The root element and its `viewBox` are never touched.
pub fn optimize(markup: &str, options: SvgOptions) -> String {
    let mut text = markup.to_string();

    if options.optimize {
        text = remove_comments(&text);
        text = remove_empty_attributes(&text);
        text = text.replace(" fill=\"black\"", "").replace(" stroke=\"none\"", "");
        text = round_decimals(&text);
    }

    if options.minify || options.optimize {
        text = collapse_whitespace(&text);
    }
    if options.minify {
        text = remove_inter_tag_whitespace(&text);
    }
    text
}

fn remove_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn remove_empty_attributes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("=\"\"") {
        let before = &rest[..pos];
        let name_start = before
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .map(|i| i + 1)
            .unwrap_or(0);
        let name = &before[name_start..];
        let preceded_by_space = before[..name_start].ends_with(char::is_whitespace);

        if !name.is_empty() && preceded_by_space && name != "viewBox" {
            out.push_str(before[..name_start].trim_end());
        } else {
            out.push_str(&rest[..pos + 3]);
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    out
}

fn remove_inter_tag_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut after_tag = false;
    for ch in text.chars() {
        if after_tag && ch.is_whitespace() {
            pending.push(ch);
            continue;
        }
        if !(ch == '<' && after_tag) {
            out.push_str(&pending);
        }
        pending.clear();
        out.push(ch);
        after_tag = ch == '>';
    }
    out.push_str(&pending);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNTIDY: &str = "```svg\n<svg width=\"24\"  height=\"24\">\n  <circle cx=\"12\" cy=\"12\" r=\"6.1234\" fill=\"#007AFF\"/>\n  <path d=\"M M 4 20 L L 20 20\" stroke=\"#007AFF\"/>\n</svg>\n```";

    #[test]
    fn test_strip_code_fences() {
        let stripped = strip_code_fences(UNTIDY);
        assert!(stripped.starts_with("<svg"));
        assert!(stripped.ends_with("</svg>"));
        assert_eq!(strip_code_fences("<svg></svg>"), "<svg></svg>");
    }

    #[test]
    fn test_normalize_untidy_markup() {
        let out = normalize(strip_code_fences(UNTIDY)).unwrap();
        assert_eq!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 24 24\" width=\"24\" height=\"24\"> <circle cx=\"12\" cy=\"12\" r=\"6.12\" fill=\"#007AFF\"/> <path d=\"M 4 20 L 20 20\" stroke=\"#007AFF\"/> </svg>"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            strip_code_fences(UNTIDY),
            "<svg><path d=\"MM1.23456 2.5LL3 4zz\"/></svg>",
            "<svg viewBox=\"0 0 48 48\" xmlns=\"http://www.w3.org/2000/svg\"><g>\t<rect width=\"9.999\"/></g></svg>",
            "<svg>1.2345.678 and 0.0005</svg>",
        ];
        for sample in samples {
            let once = normalize(sample).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", sample);
            assert!(is_well_formed(&once));
        }
    }

    #[test]
    fn test_normalize_keeps_existing_view_box() {
        let out = normalize("<svg viewBox=\"0 0 48 48\"><rect/></svg>").unwrap();
        assert!(out.contains("viewBox=\"0 0 48 48\""));
        assert!(!out.contains(DEFAULT_VIEW_BOX));
        assert!(out.contains(SVG_NAMESPACE));
    }

    #[test]
    fn test_normalize_rejects_missing_root() {
        assert!(matches!(
            normalize("<div>not a vector</div>"),
            Err(GlyphsmithError::InvalidMarkup(_))
        ));
        assert!(normalize("<svg width=\"2\"><rect/>").is_err());
        assert!(normalize("<svgfoo></svg>").is_err());
    }

    #[test]
    fn test_round_decimals() {
        assert_eq!(round_decimals("r=\"6.1234\" x=\"1.5\" y=\"10.0067\""), "r=\"6.12\" x=\"1.5\" y=\"10.01\"");
        assert_eq!(round_decimals("#007AFF"), "#007AFF");
    }

    #[test]
    fn test_path_commands_collapse_only_inside_d() {
        let out = normalize("<svg><path id=\"LL\" d=\"M M 1 1 L L 2 2\"/></svg>").unwrap();
        assert!(out.contains("id=\"LL\""));
        assert!(out.contains("d=\"M 1 1 L 2 2\""));
    }

    #[test]
    fn test_optimize_pass() {
        let input = "<svg viewBox=\"0 0 24 24\"> <!-- generated --> <path class=\"\" d=\"M1 1\" fill=\"black\" stroke=\"none\" opacity=\"0.12345\"/> </svg>";
        let out = optimize(input, SvgOptions::default());
        assert_eq!(
            out,
            "<svg viewBox=\"0 0 24 24\"><path d=\"M1 1\" opacity=\"0.12\"/></svg>"
        );
        assert_eq!(
            optimize(input, SvgOptions { optimize: false, minify: false }),
            input
        );
    }

    #[test]
    fn test_optimize_never_drops_view_box() {
        let out = optimize("<svg viewBox=\"\"></svg>", SvgOptions::default());
        assert!(out.contains("viewBox"));
    }
}
