//! Renders rich-text deltas (a list of `insert` operations with optional
//! formatting attributes) as HTML.

use itertools::Itertools;
use quick_xml::escape::escape;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    fn tag(&self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

#[derive(Debug, PartialEq)]
enum Block {
    Paragraph(String),
    Header(u64, String),
    Blockquote(String),
    CodeBlock(String),
    ListItem(ListKind, String),
}

/// Convert a delta document (an object with an `ops` array) to HTML. Unknown
/// operations and embeds are skipped.
pub(crate) fn to_html(delta: &Value) -> String {
    let ops = match delta.get("ops").and_then(Value::as_array) {
        Some(ops) => ops,
        None => return String::new(),
    };
    let no_attributes = Map::new();
    let mut blocks = Vec::new();
    let mut line = String::new();
    for op in ops {
        let attributes = op
            .get("attributes")
            .and_then(Value::as_object)
            .unwrap_or(&no_attributes);
        match op.get("insert") {
            Some(Value::String(text)) => {
                let mut segments = text.split('\n').peekable();
                while let Some(segment) = segments.next() {
                    if !segment.is_empty() {
                        line.push_str(&inline(segment, attributes));
                    }
                    if segments.peek().is_some() {
                        // the newline carries the block attributes of this line
                        blocks.push(block(std::mem::take(&mut line), attributes));
                    }
                }
            }
            Some(Value::Object(embed)) => {
                if let Some(src) = embed.get("image").and_then(Value::as_str) {
                    line.push_str(&format!("<img src=\"{}\"/>", escape(src)));
                }
            }
            _ => {}
        }
    }
    if !line.is_empty() {
        blocks.push(Block::Paragraph(line));
    }
    render(blocks)
}

fn inline(text: &str, attributes: &Map<String, Value>) -> String {
    let is_set = |key: &str| attributes.get(key).and_then(Value::as_bool) == Some(true);
    let mut html = escape(text).to_string();
    for (key, tag) in [
        ("code", "code"),
        ("strike", "s"),
        ("underline", "u"),
        ("italic", "em"),
        ("bold", "strong"),
    ] {
        if is_set(key) {
            html = format!("<{tag}>{html}</{tag}>");
        }
    }
    if let Some(href) = attributes.get("link").and_then(Value::as_str) {
        html = format!("<a href=\"{}\">{html}</a>", escape(href));
    }
    html
}

fn block(content: String, attributes: &Map<String, Value>) -> Block {
    if let Some(level) = attributes.get("header").and_then(Value::as_u64) {
        Block::Header(level.clamp(1, 6), content)
    } else if let Some(list) = attributes.get("list").and_then(Value::as_str) {
        let kind = if list == "ordered" {
            ListKind::Ordered
        } else {
            ListKind::Bullet
        };
        Block::ListItem(kind, content)
    } else if attributes.contains_key("blockquote") {
        Block::Blockquote(content)
    } else if attributes.contains_key("code-block") {
        Block::CodeBlock(content)
    } else {
        Block::Paragraph(content)
    }
}

fn render(blocks: Vec<Block>) -> String {
    let mut html = String::new();
    let chunks = blocks.into_iter().group_by(|b| match b {
        Block::ListItem(kind, _) => Some(*kind),
        _ => None,
    });
    for (list, group) in &chunks {
        match list {
            Some(kind) => {
                html.push_str(&format!("<{}>", kind.tag()));
                for b in group {
                    if let Block::ListItem(_, content) = b {
                        html.push_str(&format!("<li>{}</li>", or_break(content)));
                    }
                }
                html.push_str(&format!("</{}>", kind.tag()));
            }
            None => {
                for b in group {
                    html.push_str(&match b {
                        Block::Paragraph(c) => format!("<p>{}</p>", or_break(c)),
                        Block::Header(level, c) => format!("<h{level}>{c}</h{level}>"),
                        Block::Blockquote(c) => format!("<blockquote>{c}</blockquote>"),
                        Block::CodeBlock(c) => format!("<pre>{c}</pre>"),
                        Block::ListItem(_, c) => format!("<li>{c}</li>"),
                    });
                }
            }
        }
    }
    html
}

/// Empty lines are kept visible.
fn or_break(content: String) -> String {
    if content.is_empty() {
        "<br/>".to_string()
    } else {
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn paragraphs() {
        let delta = json!({"ops": [{"insert": "one\n\ntwo\n"}]});
        assert_eq!("<p>one</p><p><br/></p><p>two</p>", to_html(&delta));
    }

    #[test]
    fn trailing_text_without_newline() {
        let delta = json!({"ops": [{"insert": "no newline"}]});
        assert_eq!("<p>no newline</p>", to_html(&delta));
    }

    #[test]
    fn inline_formatting_and_escaping() {
        let delta = json!({"ops": [
            {"insert": "a < b", "attributes": {"italic": true, "bold": true}},
            {"insert": " see "},
            {"insert": "here", "attributes": {"link": "https://example.org/?a=1&b=2"}},
            {"insert": "\n"}
        ]});
        assert_eq!(
            "<p><strong><em>a &lt; b</em></strong> see <a href=\"https://example.org/?a=1&amp;b=2\">here</a></p>",
            to_html(&delta)
        );
    }

    #[test]
    fn lists_are_grouped() {
        let delta = json!({"ops": [
            {"insert": "Title"},
            {"insert": "\n", "attributes": {"header": 2}},
            {"insert": "first"},
            {"insert": "\n", "attributes": {"list": "bullet"}},
            {"insert": "second"},
            {"insert": "\n", "attributes": {"list": "bullet"}},
            {"insert": "step"},
            {"insert": "\n", "attributes": {"list": "ordered"}}
        ]});
        assert_snapshot!(
            to_html(&delta),
            @"<h2>Title</h2><ul><li>first</li><li>second</li></ul><ol><li>step</li></ol>"
        );
    }

    #[test]
    fn image_embeds() {
        let delta = json!({"ops": [{"insert": {"image": "https://example.org/a.png"}}, {"insert": "\n"}]});
        assert_eq!(
            "<p><img src=\"https://example.org/a.png\"/></p>",
            to_html(&delta)
        );
    }

    #[test]
    fn block_formats() {
        let delta = json!({"ops": [
            {"insert": "quoted"},
            {"insert": "\n", "attributes": {"blockquote": true}},
            {"insert": "let x = 1;"},
            {"insert": "\n", "attributes": {"code-block": true}},
            {"insert": "x", "attributes": {"code": true, "strike": true, "underline": true}},
            {"insert": "\n"}
        ]});
        assert_snapshot!(
            to_html(&delta),
            @"<blockquote>quoted</blockquote><pre>let x = 1;</pre><p><u><s><code>x</code></s></u></p>"
        );
    }

    #[test]
    fn missing_ops() {
        assert_eq!("", to_html(&json!({"insert": "x"})));
    }
}
