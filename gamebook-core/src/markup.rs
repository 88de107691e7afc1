//! Markup rendering for unit and reaction text.
//!
//! Raw story text carries a handful of single-character control markers:
//!
//! | Marker | Meaning |
//! |---|---|
//! | `{text}` | a reaction link; the raw text up to the first `}` is its key |
//! | `<text>` | emphasis |
//! | `^text\|` | positive debug annotation |
//! | `~text\|` | negative debug annotation |
//!
//! Before parsing, straight double quotes become curly quotes and `--`
//! becomes an em dash. Spans nest freely. A span that is never closed ends
//! at the end of the text, along with every span enclosing it; rendering never
//! fails.

use serde::Serialize;

pub const POSITIVE_DEBUG_START: char = '^';
pub const NEGATIVE_DEBUG_START: char = '~';
pub const DEBUG_STOP: char = '|';

/// End-of-text marker appended before parsing.
const SENTINEL: char = '\0';

/// Which kind of debug annotation a span is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

/// One node of parsed markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Text { text: String },
    Reaction { key: String, children: Vec<Node> },
    Emphasis { children: Vec<Node> },
    Debug { polarity: Polarity, children: Vec<Node> },
}

impl Node {
    fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }
}

/// Parsed markup for one piece of text.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Markup {
    pub nodes: Vec<Node>,
}

impl Markup {
    /// Wrap already parsed content in a single reaction span.
    pub fn reaction(key: impl Into<String>, content: Markup) -> Self {
        Self {
            nodes: vec![Node::Reaction {
                key: key.into(),
                children: content.nodes,
            }],
        }
    }

    /// Render as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(&self.nodes, &mut out);
        out
    }

    /// Render for a terminal: `[reaction]`, `*emphasis*`, `(+debug)`.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        write_plain(&self.nodes, &mut out);
        out
    }

    /// Keys of all reaction spans in document order.
    pub fn reaction_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        collect_keys(&self.nodes, &mut keys);
        keys
    }
}

/// Curl straight double quotes.
///
/// A quote preceded by whitespace, or at the very start, opens; any other
/// quote closes.
pub fn normalize_quotes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous = ' ';
    for c in text.chars() {
        if c == '"' {
            result.push(if previous.is_whitespace() { '\u{201C}' } else { '\u{201D}' });
        } else {
            result.push(c);
        }
        previous = c;
    }
    result
}

/// Replace every `--` with an em dash.
pub fn substitute_dashes(text: &str) -> String {
    text.replace("--", "\u{2014}")
}

/// Normalize and parse raw text into a span tree.
pub fn parse(raw: &str) -> Markup {
    let text = substitute_dashes(&normalize_quotes(raw));
    let mut parser = Parser::new(&text);
    Markup {
        nodes: parser.parse_until(SENTINEL),
    }
}

/// Render raw text as HTML.
pub fn render(raw: &str) -> String {
    parse(raw).to_html()
}

/// Render raw text for a terminal.
pub fn render_plain(raw: &str) -> String {
    parse(raw).to_plain_text()
}

/// Recursive-descent scanner over normalized text.
struct Parser {
    /// Input with the sentinel appended.
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        let chars = text
            .chars()
            .filter(|&c| c != SENTINEL)
            .chain(std::iter::once(SENTINEL))
            .collect();
        Self { chars, pos: 0 }
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or(SENTINEL)
    }

    /// Parse until `terminator` is consumed or the sentinel is reached.
    ///
    /// The sentinel is never consumed, so every enclosing call sees it too.
    fn parse_until(&mut self, terminator: char) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        loop {
            let c = self.peek();
            if c == SENTINEL {
                break;
            }
            self.pos += 1;

            let span = match c {
                '{' => {
                    let key = self.reaction_key();
                    let children = self.parse_until('}');
                    Node::Reaction { key, children }
                }
                '<' => Node::Emphasis {
                    children: self.parse_until('>'),
                },
                POSITIVE_DEBUG_START | NEGATIVE_DEBUG_START => {
                    let polarity = if c == POSITIVE_DEBUG_START {
                        Polarity::Positive
                    } else {
                        Polarity::Negative
                    };
                    Node::Debug {
                        polarity,
                        children: self.parse_until(DEBUG_STOP),
                    }
                }
                c if c == terminator => break,
                c => {
                    text.push(c);
                    continue;
                }
            };

            if !text.is_empty() {
                nodes.push(Node::text(std::mem::take(&mut text)));
            }
            nodes.push(span);
        }

        if !text.is_empty() {
            nodes.push(Node::text(text));
        }
        nodes
    }

    /// The raw text from the cursor up to the next `}` or the sentinel.
    fn reaction_key(&self) -> String {
        self.chars[self.pos..]
            .iter()
            .take_while(|&&c| c != '}' && c != SENTINEL)
            .collect()
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

fn write_html(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { text } => escape_html(text, out),
            Node::Reaction { key, children } => {
                out.push_str("<a href='ignore' class='reaction' data-reaction=\"");
                escape_html(key, out);
                out.push_str("\" onclick='return onReactionClick(this.dataset.reaction);'>");
                write_html(children, out);
                out.push_str("</a>");
            }
            Node::Emphasis { children } => {
                out.push_str("<i>");
                write_html(children, out);
                out.push_str("</i>");
            }
            Node::Debug { polarity, children } => {
                out.push_str(match polarity {
                    Polarity::Positive => "<b class='debug-positive'>",
                    Polarity::Negative => "<b class='debug-negative'>",
                });
                write_html(children, out);
                out.push_str("</b>");
            }
        }
    }
}

fn write_plain(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { text } => out.push_str(text),
            Node::Reaction { children, .. } => {
                out.push('[');
                write_plain(children, out);
                out.push(']');
            }
            Node::Emphasis { children } => {
                out.push('*');
                write_plain(children, out);
                out.push('*');
            }
            Node::Debug { polarity, children } => {
                out.push_str(match polarity {
                    Polarity::Positive => "(+",
                    Polarity::Negative => "(-",
                });
                write_plain(children, out);
                out.push(')');
            }
        }
    }
}

fn collect_keys<'a>(nodes: &'a [Node], keys: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            Node::Text { .. } => {}
            Node::Reaction { key, children } => {
                keys.push(key);
                collect_keys(children, keys);
            }
            Node::Emphasis { children } | Node::Debug { children, .. } => collect_keys(children, keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> Node {
        Node::text(t)
    }

    #[test]
    fn test_quotes_open_after_whitespace() {
        assert_eq!(
            normalize_quotes(r#"He said "hi" to "her""#),
            "He said \u{201C}hi\u{201D} to \u{201C}her\u{201D}"
        );
    }

    #[test]
    fn test_leading_quote_opens() {
        assert_eq!(normalize_quotes("\"Run!\" she said"), "\u{201C}Run!\u{201D} she said");
    }

    #[test]
    fn test_quote_after_newline_opens() {
        assert_eq!(normalize_quotes("end\n\"next"), "end\n\u{201C}next");
    }

    #[test]
    fn test_quote_after_punctuation_closes() {
        assert_eq!(normalize_quotes("(\"x"), "(\u{201D}x");
    }

    #[test]
    fn test_dashes() {
        assert_eq!(substitute_dashes("wait--really?"), "wait\u{2014}really?");
        assert_eq!(render("wait--really?"), "wait\u{2014}really?");
    }

    #[test]
    fn test_plain_text_single_node() {
        assert_eq!(parse("Just words.").nodes, vec![text("Just words.")]);
        assert!(parse("").nodes.is_empty());
    }

    #[test]
    fn test_reaction_wrapping_emphasis() {
        let markup = parse("{go<north>}");
        assert_eq!(
            markup.nodes,
            vec![Node::Reaction {
                key: "go<north>".to_string(),
                children: vec![
                    text("go"),
                    Node::Emphasis {
                        children: vec![text("north")]
                    }
                ],
            }]
        );
    }

    #[test]
    fn test_unterminated_reaction_closes_at_end() {
        let markup = parse("{go");
        assert_eq!(
            markup.nodes,
            vec![Node::Reaction {
                key: "go".to_string(),
                children: vec![text("go")],
            }]
        );
        assert_eq!(markup.reaction_keys(), vec!["go"]);
        assert!(markup.to_html().ends_with(">go</a>"));
    }

    #[test]
    fn test_unterminated_inner_span_closes_every_enclosing_span() {
        let markup = parse("<a {b");
        assert_eq!(
            markup.nodes,
            vec![Node::Emphasis {
                children: vec![
                    text("a "),
                    Node::Reaction {
                        key: "b".to_string(),
                        children: vec![text("b")],
                    }
                ]
            }]
        );
        assert_eq!(markup.to_html().matches("</").count(), 2);
    }

    #[test]
    fn test_debug_spans_carry_polarity() {
        let markup = parse("x^good|y~bad");
        assert_eq!(
            markup.nodes,
            vec![
                text("x"),
                Node::Debug {
                    polarity: Polarity::Positive,
                    children: vec![text("good")]
                },
                text("y"),
                Node::Debug {
                    polarity: Polarity::Negative,
                    children: vec![text("bad")]
                },
            ]
        );
    }

    #[test]
    fn test_stray_closers_are_text() {
        assert_eq!(parse("a}b>c|").nodes, vec![text("a}b>c|")]);
        assert_eq!(
            parse("<a}b>").nodes,
            vec![Node::Emphasis {
                children: vec![text("a}b")]
            }]
        );
    }

    #[test]
    fn test_reaction_key_stops_at_first_close() {
        let markup = parse("{a{b}c}");
        assert_eq!(markup.reaction_keys(), vec!["a{b", "b"]);
        assert_eq!(markup.to_plain_text(), "[a[b]c]");
    }

    #[test]
    fn test_reaction_key_is_normalized() {
        let markup = parse("{Say \"hi\"--now}");
        assert_eq!(markup.reaction_keys(), vec!["Say \u{201C}hi\u{201D}\u{2014}now"]);
    }

    #[test]
    fn test_embedded_nul_is_dropped() {
        assert_eq!(parse("a\0b").nodes, vec![text("ab")]);
    }

    #[test]
    fn test_html_output() {
        assert_eq!(
            render("Go <now> ^dbg| ~neg|"),
            "Go <i>now</i> <b class='debug-positive'>dbg</b> <b class='debug-negative'>neg</b>"
        );
        assert_eq!(
            render("{Open}"),
            "<a href='ignore' class='reaction' data-reaction=\"Open\" \
             onclick='return onReactionClick(this.dataset.reaction);'>Open</a>"
        );
    }

    #[test]
    fn test_html_escapes_text_and_keys() {
        assert_eq!(render("Tom & Jerry"), "Tom &amp; Jerry");
        assert!(render("{it's}").contains("data-reaction=\"it&#39;s\""));
    }

    #[test]
    fn test_plain_text_output() {
        assert_eq!(
            render_plain("A <b> {c} ^d| ~e|"),
            "A *b* [c] (+d) (-e)"
        );
    }

    #[test]
    fn test_markup_reaction_wrapper() {
        let markup = Markup::reaction("raw \"key\"", parse("label"));
        assert_eq!(markup.reaction_keys(), vec!["raw \"key\""]);
        assert_eq!(markup.to_plain_text(), "[label]");
    }

    #[test]
    fn test_serializes_as_tagged_tree() {
        let json = serde_json::to_value(parse("<x>")).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "emphasis");
        assert_eq!(json["nodes"][0]["children"][0]["text"], "x");
    }
}
