//! HTML to plain text normalization.

use scraper::{Html, Node};

/// Elements whose text never reaches the rendered page.
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "head", "title", "meta", "noscript", "template",
];

/// Marker that opens the first numbered result on DuckDuckGo Lite pages.
pub const DEFAULT_RESULT_MARKER: &str = "1.";

/// Flatten markup (or plain text) into clean line-oriented text.
///
/// Every visible text node becomes its own unit, each line is trimmed and
/// blank lines are dropped. The output never contains an empty line or a
/// line with leading/trailing whitespace.
pub fn normalize(raw: &str) -> String {
    let document = Html::parse_document(raw);

    let mut lines: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        lines.extend(text.lines().map(str::trim).filter(|line| !line.is_empty()));
    }

    lines.join("\n")
}

/// Return `text` starting at the first occurrence of `marker`.
///
/// Returns an empty string when the marker is absent: unanchored text is
/// treated as "not yet in the expected shape".
pub fn truncate_from_marker(text: &str, marker: &str) -> String {
    match text.find(marker) {
        Some(start) => text[start..].to_string(),
        None => String::new(),
    }
}

/// Normalize markup and optionally cut it at a content marker.
pub fn extract_text(raw: &str, marker: Option<&str>) -> String {
    let cleaned = normalize(raw);
    match marker {
        Some(marker) => {
            let truncated = truncate_from_marker(&cleaned, marker);
            if truncated.is_empty() {
                tracing::debug!("Marker '{}' not found in extracted text", marker);
            }
            truncated
        }
        None => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            normalize("<html><body>  Hello \n\n World  </body></html>"),
            "Hello\nWorld"
        );
    }

    #[test]
    fn normalize_drops_hidden_elements() {
        let html = r#"<html><head><title>Page</title><style>p { color: red; }</style></head>
            <body><script>var x = 1;</script><p>Visible</p><noscript>nojs</noscript></body></html>"#;
        assert_eq!(normalize(html), "Visible");
    }

    #[test]
    fn normalize_splits_elements_into_lines() {
        let html = "<div><p>One</p><p>  Two  </p><span>Three</span></div>";
        assert_eq!(normalize(html), "One\nTwo\nThree");
    }

    #[test]
    fn normalize_plain_text() {
        assert_eq!(normalize("  a  \n\n\tb\n"), "a\nb");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_decodes_entities() {
        assert_eq!(normalize("<p>Fish &amp; Chips</p>"), "Fish & Chips");
    }

    #[test]
    fn normalize_has_no_blank_or_padded_lines() {
        let inputs = [
            "<table><tr><td> a </td><td>\n</td></tr></table>",
            "<ul>\n  <li>x</li>\n  <li>  y\n z </li>\n</ul>",
            "\r\n  padded \r\n\r\n",
            "<pre>\n    code\n\n</pre>",
        ];
        for input in inputs {
            let out = normalize(input);
            for line in out.split('\n') {
                assert!(!line.is_empty(), "empty line in {:?}", out);
                assert_eq!(line, line.trim(), "padded line in {:?}", out);
            }
        }
    }

    #[test]
    fn truncate_finds_marker() {
        assert_eq!(truncate_from_marker("A\nB\n1.\nC", "1."), "1.\nC");
    }

    #[test]
    fn truncate_missing_marker_is_empty() {
        assert_eq!(truncate_from_marker("A\nB", "1."), "");
        assert_eq!(truncate_from_marker("", "1."), "");
    }

    #[test]
    fn truncate_is_idempotent() {
        let once = truncate_from_marker("intro 1. first 1. second", "1.");
        assert_eq!(once, "1. first 1. second");
        assert_eq!(truncate_from_marker(&once, "1."), once);
    }

    #[test]
    fn extract_text_with_marker() {
        let html = "<body><p>Header</p><p>1.</p><p>Result</p></body>";
        assert_eq!(extract_text(html, Some("1.")), "1.\nResult");
        assert_eq!(extract_text(html, None), "Header\n1.\nResult");
        assert_eq!(extract_text("<p>none</p>", Some("1.")), "");
    }
}
