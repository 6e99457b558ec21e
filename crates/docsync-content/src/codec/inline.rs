//! Markdown inline spans: emphasis, code, wikilinks, and links
//!
//! Rendering nests marks as strike, bold, italic, code from the outside
//! in and backslash-escapes markdown punctuation in text, so parsing a
//! rendered sequence gives back the same spans.

use crate::codec::link_url;
use crate::tree::{LinkReference, LinkTarget, Marks, Span};

/// Escaped wherever they appear in text
const ALWAYS_ESCAPED: &[char] = &['\\', '*', '_', '~', '`', '[', ']'];
/// Escaped only as the first character of a line
const LINE_START_ESCAPED: &[char] = &['#', '>', '|', '<', '-', '+'];

pub fn render_spans(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        render_span(span, &mut out);
    }
    out
}

fn render_span(span: &Span, out: &mut String) {
    let marks = match span {
        Span::Text { marks, .. } => *marks,
        Span::Link(link) => link.marks,
    };
    let mut closers: Vec<&str> = Vec::new();
    for (on, delim) in [
        (marks.strikethrough, "~~"),
        (marks.bold, "**"),
        (marks.italic, "_"),
    ] {
        if on {
            out.push_str(delim);
            closers.push(delim);
        }
    }

    match span {
        Span::Text { text, marks } if marks.code => render_code(text, out),
        Span::Text { text, .. } => escape_into(text, out),
        Span::Link(link) => render_link(link, out),
    }

    for delim in closers.into_iter().rev() {
        out.push_str(delim);
    }
}

fn render_code(text: &str, out: &mut String) {
    let longest_run = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    let pad = text.starts_with('`') || text.ends_with('`');
    out.push_str(&fence);
    if pad {
        out.push(' ');
    }
    out.push_str(text);
    if pad {
        out.push(' ');
    }
    out.push_str(&fence);
}

/// Render a link without marks.
pub fn render_link(link: &LinkReference, out: &mut String) {
    if let LinkTarget::Local(name) = &link.target
        && is_wikilink_safe(name)
        && is_wikilink_safe(&link.display)
    {
        out.push_str("[[");
        out.push_str(name);
        if !link.display.is_empty() && link.display != *name {
            out.push('|');
            out.push_str(&link.display);
        }
        out.push_str("]]");
        return;
    }

    let url = link_url::target_to_url(&link.target);
    out.push('[');
    escape_text(&link.display, false, out);
    out.push_str("](");
    if url.contains([' ', '(', ')']) {
        out.push('<');
        out.push_str(&url);
        out.push('>');
    } else {
        out.push_str(&url);
    }
    out.push(')');
}

fn is_wikilink_safe(value: &str) -> bool {
    !value.contains(['|', '[', ']', '\n'])
}

fn escape_into(text: &str, out: &mut String) {
    let at_line_start = out.is_empty() || out.ends_with('\n');
    escape_text(text, at_line_start, out);
}

fn escape_text(text: &str, mut at_line_start: bool, out: &mut String) {
    let mut chars = text.char_indices();
    while let Some((idx, c)) = chars.next() {
        if at_line_start {
            if c.is_ascii_digit() {
                let digits: String = text[idx..].chars().take_while(char::is_ascii_digit).collect();
                let after = text[idx + digits.len()..].chars().next();
                if matches!(after, Some('.') | Some(')')) {
                    out.push_str(&digits);
                    out.push('\\');
                    for _ in 1..digits.len() {
                        chars.next();
                    }
                    at_line_start = false;
                    continue;
                }
            } else if LINE_START_ESCAPED.contains(&c) {
                out.push('\\');
                out.push(c);
                at_line_start = false;
                continue;
            }
        }
        if ALWAYS_ESCAPED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
        at_line_start = c == '\n';
    }
}

/// Parse inline markdown into spans. Never fails; anything that is not
/// recognized is kept as literal text.
pub fn parse_spans(src: &str) -> Vec<Span> {
    let mut out = Vec::new();
    parse_into(src, Marks::PLAIN, &mut out);
    out
}

fn parse_into(src: &str, marks: Marks, out: &mut Vec<Span>) {
    let mut buf = String::new();
    let mut i = 0;

    'scan: while i < src.len() {
        let rest = &src[i..];

        if let Some(after) = rest.strip_prefix('\\') {
            match after.chars().next() {
                Some(c) if c.is_ascii_punctuation() => {
                    buf.push(c);
                    i += 1 + c.len_utf8();
                }
                _ => {
                    buf.push('\\');
                    i += 1;
                }
            }
            continue;
        }

        if rest.starts_with('`') {
            if let Some((code, consumed)) = parse_code(rest) {
                flush(&mut buf, marks, out);
                out.push(Span::marked(
                    code,
                    Marks {
                        code: true,
                        ..marks
                    },
                ));
                i += consumed;
            } else {
                let run = rest.len() - rest.trim_start_matches('`').len();
                buf.push_str(&rest[..run]);
                i += run;
            }
            continue;
        }

        if rest.starts_with("[[")
            && let Some((link, consumed)) = parse_wikilink(rest)
        {
            flush(&mut buf, marks, out);
            out.push(Span::Link(LinkReference { marks, ..link }));
            i += consumed;
            continue;
        }

        if rest.starts_with('[')
            && let Some((link, consumed)) = parse_url_link(rest)
        {
            flush(&mut buf, marks, out);
            out.push(Span::Link(LinkReference { marks, ..link }));
            i += consumed;
            continue;
        }

        for delim in ["~~", "**", "__", "_", "*"] {
            if !rest.starts_with(delim) {
                continue;
            }
            let Some(close) = find_closing(rest, delim.len(), delim) else {
                continue;
            };
            let inner = &rest[delim.len()..close];
            if inner.is_empty() {
                continue;
            }
            let mut nested = marks;
            match delim {
                "~~" => nested.strikethrough = true,
                "**" | "__" => nested.bold = true,
                _ => nested.italic = true,
            }
            flush(&mut buf, marks, out);
            parse_into(inner, nested, out);
            i += close + delim.len();
            continue 'scan;
        }

        // Not a recognized construct: take one character literally
        let c = rest.chars().next().unwrap_or_default();
        buf.push(c);
        i += c.len_utf8().max(1);
    }

    flush(&mut buf, marks, out);
}

fn flush(buf: &mut String, marks: Marks, out: &mut Vec<Span>) {
    if !buf.is_empty() {
        out.push(Span::marked(std::mem::take(buf), marks));
    }
}

/// Byte offset in `src` of the delimiter closing an emphasis run opened at 0.
fn find_closing(src: &str, from: usize, delim: &str) -> Option<usize> {
    let mut i = from;
    while i < src.len() {
        let rest = &src[i..];
        if rest.starts_with('\\') {
            i += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
            continue;
        }
        if rest.starts_with('`')
            && let Some((_, consumed)) = parse_code(rest)
        {
            i += consumed;
            continue;
        }
        if rest.starts_with("[[")
            && let Some((_, consumed)) = parse_wikilink(rest)
        {
            i += consumed;
            continue;
        }
        if rest.starts_with('[')
            && let Some((_, consumed)) = parse_url_link(rest)
        {
            i += consumed;
            continue;
        }
        if rest.starts_with(delim) {
            // A single `*` or `_` must not close on half of a double run
            let doubled = delim.len() == 1 && rest[1..].starts_with(delim);
            if !doubled {
                return Some(i);
            }
            if let Some(inner) = find_closing(rest, 2, &rest[..2]) {
                i += inner + 2;
                continue;
            }
            return Some(i);
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Returns the code text and bytes consumed.
fn parse_code(src: &str) -> Option<(String, usize)> {
    let run = src.len() - src.trim_start_matches('`').len();
    let fence = &src[..run];
    let body = &src[run..];

    let mut search = 0;
    while let Some(found) = body[search..].find(fence) {
        let start = search + found;
        let end = start + run;
        let longer = body[end..].starts_with('`');
        if !longer {
            let mut text = &body[..start];
            if text.len() >= 2 && text.starts_with(' ') && text.ends_with(' ') && text.contains('`') {
                text = &text[1..text.len() - 1];
            }
            return Some((text.to_string(), run + end));
        }
        search = end + body[end..].len() - body[end..].trim_start_matches('`').len();
    }
    None
}

fn parse_wikilink(src: &str) -> Option<(LinkReference, usize)> {
    let body = src.strip_prefix("[[")?;
    let end = body.find("]]")?;
    let inner = &body[..end];
    if inner.is_empty() || inner.contains('\n') {
        return None;
    }
    let (name, display) = match inner.split_once('|') {
        Some((name, display)) => (name.trim(), display.trim()),
        None => (inner.trim(), inner.trim()),
    };
    if name.is_empty() {
        return None;
    }
    let link = LinkReference::new(display, LinkTarget::Local(name.to_string()));
    Some((link, end + 4))
}

fn parse_url_link(src: &str) -> Option<(LinkReference, usize)> {
    let body = src.strip_prefix('[')?;

    let mut close = None;
    let mut chars = body.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            ']' => {
                close = Some(idx);
                break;
            }
            '[' | '\n' => return None,
            _ => {}
        }
    }
    let close = close?;
    let display_raw = &body[..close];
    let after = body[close + 1..].strip_prefix('(')?;

    let (url, url_len) = if let Some(angle) = after.strip_prefix('<') {
        let end = angle.find('>')?;
        if !angle[end + 1..].starts_with(')') {
            return None;
        }
        (&angle[..end], end + 3)
    } else {
        let end = after.find(')')?;
        (&after[..end], end + 1)
    };
    let url = url.trim();
    if url.is_empty() || url.contains('\n') {
        return None;
    }

    let display = unescape(display_raw);
    let link = LinkReference::new(display, link_url::url_to_target(url));
    // '[' + display + ']' + '(' + url part
    Some((link, 1 + close + 1 + 1 + url_len))
}

/// Strip backslash escapes from plain text.
pub fn unescape(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && next.is_ascii_punctuation()
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StableId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn roundtrip(spans: Vec<Span>) {
        let rendered = render_spans(&spans);
        assert_eq!(parse_spans(&rendered), spans, "rendered as {rendered:?}");
    }

    #[test]
    fn parses_emphasis() {
        let spans = parse_spans("a **b** _c_ ~~d~~ `e`");
        assert_eq!(
            spans,
            vec![
                Span::plain("a "),
                Span::marked("b", Marks::bold()),
                Span::plain(" "),
                Span::marked("c", Marks::italic()),
                Span::plain(" "),
                Span::marked(
                    "d",
                    Marks {
                        strikethrough: true,
                        ..Marks::PLAIN
                    }
                ),
                Span::plain(" "),
                Span::marked(
                    "e",
                    Marks {
                        code: true,
                        ..Marks::PLAIN
                    }
                ),
            ]
        );
    }

    #[test]
    fn parses_wikilinks() {
        let spans = parse_spans("see [[Other Note|the other]] and [[Plain]]");
        assert_eq!(
            spans,
            vec![
                Span::plain("see "),
                Span::Link(LinkReference::new(
                    "the other",
                    LinkTarget::Local("Other Note".into())
                )),
                Span::plain(" and "),
                Span::Link(LinkReference::new("Plain", LinkTarget::Local("Plain".into()))),
            ]
        );
    }

    #[test]
    fn single_star_italic_and_double_underscore_bold() {
        assert_eq!(parse_spans("*x*"), vec![Span::marked("x", Marks::italic())]);
        assert_eq!(parse_spans("__x__"), vec![Span::marked("x", Marks::bold())]);
    }

    #[test]
    fn unmatched_delimiters_stay_literal() {
        assert_eq!(parse_spans("snake_case and 2 * 3"), vec![Span::plain("snake_case and 2 * 3")]);
    }

    #[rstest]
    #[case::specials("2 * 3 = [6] _maybe_ `x`")]
    #[case::line_start_list("- not a list")]
    #[case::line_start_number("1. not a list")]
    #[case::heading("# not a heading")]
    #[case::multiline("first\n> second\n+ third")]
    fn plain_text_with_markdown_punctuation_roundtrips(#[case] text: &str) {
        roundtrip(vec![Span::plain(text)]);
    }

    #[test]
    fn adjacent_mark_changes_roundtrip() {
        let bold_italic = Marks {
            bold: true,
            italic: true,
            ..Marks::PLAIN
        };
        roundtrip(vec![
            Span::marked("a", Marks::bold()),
            Span::marked("b", bold_italic),
            Span::marked("c", Marks::italic()),
            Span::plain("d"),
        ]);
    }

    #[test]
    fn code_with_backticks_roundtrips() {
        let code = Marks {
            code: true,
            ..Marks::PLAIN
        };
        roundtrip(vec![Span::plain("run "), Span::marked("`ls` -la", code)]);
    }

    #[test]
    fn non_local_targets_render_as_urls() {
        let id = StableId::generate();
        let links = vec![
            Span::Link(LinkReference::new("pending", LinkTarget::Resolved(id))),
            Span::plain(" "),
            Span::Link(LinkReference::new("gone", LinkTarget::Tombstone("Old Note".into()))),
            Span::plain(" "),
            Span::Link(LinkReference {
                marks: Marks::bold(),
                ..LinkReference::new("site", LinkTarget::Url("https://example.com/a_(b)".into()))
            }),
        ];
        roundtrip(links);
    }

    #[test]
    fn unescape_strips_backslashes() {
        assert_eq!(unescape(r"\*a\* \q"), r"*a* \q");
    }
}
