//! HTML input sanitization
//!
//! Input is tokenized into text, tags and comments, and the filter then decides per
//! token what survives. No rule here operates on the raw string, so tricks such as
//! mixed case, entity-encoded schemes or split tags cannot defeat a pattern.
//!
//! The output is always well-formed enough to be embedded in an HTML document:
//! every surviving tag is on the allow-list, every surviving attribute is quoted
//! and escaped, and stray `<`/`>` in text are escaped.

use serde::Serialize;

/// Formatting tags that survive sanitization.
const ALLOWED_TAGS: &[&str] = &[
    "a",
    "abbr",
    "b",
    "blockquote",
    "br",
    "caption",
    "cite",
    "code",
    "col",
    "colgroup",
    "dd",
    "del",
    "details",
    "div",
    "dl",
    "dt",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "img",
    "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "p",
    "pre",
    "q",
    "s",
    "samp",
    "small",
    "span",
    "strong",
    "sub",
    "summary",
    "sup",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "u",
    "ul",
    "var",
    "wbr",
];

/// Elements whose content is never rendered as text by the tokenizer.
const RAW_TEXT_TAGS: &[&str] = &[
    "script",
    "style",
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
    "textarea",
    "title",
    "xmp",
];

/// Elements removed together with everything they contain.
const CONTENT_DROPPED_TAGS: &[&str] = &[
    "applet", "audio", "base", "button", "canvas", "embed", "form", "frame", "frameset", "input",
    "link", "math", "meta", "object", "param", "select", "slot", "source", "svg", "template",
    "track", "video",
];

/// Elements that never have an end tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "frame", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Attributes that are safe on every allowed element.
const GLOBAL_ATTRS: &[&str] = &[
    "id",
    "class",
    "title",
    "alt",
    "width",
    "height",
    "align",
    "valign",
    "dir",
    "lang",
    "role",
    "aria-label",
    "aria-hidden",
    "aria-describedby",
];

/// Attributes allowed only on specific tags (tag, attr).
const TAG_SPECIFIC_ATTRS: &[(&str, &str)] = &[
    ("a", "href"),
    ("a", "target"),
    ("a", "rel"),
    ("blockquote", "cite"),
    ("del", "cite"),
    ("img", "src"),
    ("img", "loading"),
    ("ins", "cite"),
    ("q", "cite"),
    ("td", "colspan"),
    ("td", "rowspan"),
    ("th", "colspan"),
    ("th", "rowspan"),
    ("th", "scope"),
    ("ol", "start"),
    ("ol", "type"),
];

/// Attributes holding a URL; their scheme is checked after entity decoding.
const URL_ATTRS: &[&str] = &["href", "src", "cite"];

const BLOCKED_URL_SCHEMES: &[&str] = &["javascript:", "vbscript:", "livescript:"];

/// Inline images allowed in `img src`.
const ALLOWED_DATA_IMAGE_PREFIXES: &[&str] = &[
    "data:image/png",
    "data:image/jpeg",
    "data:image/jpg",
    "data:image/gif",
    "data:image/webp",
];

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("AMP", '&'),
    ("lt", '<'),
    ("LT", '<'),
    ("gt", '>'),
    ("GT", '>'),
    ("quot", '"'),
    ("QUOT", '"'),
    ("apos", '\''),
    ("colon", ':'),
    ("Tab", '\t'),
    ("NewLine", '\n'),
    ("nbsp", '\u{a0}'),
    ("lpar", '('),
    ("rpar", ')'),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    StartTag {
        name: String,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag(String),
    /// Comments, doctype and other declarations, processing instructions.
    Comment,
    /// A raw-text element (`<script>`, `<style>`, ...) including its body.
    RawElement,
}

fn is_tag_name_end(c: char) -> bool {
    c.is_ascii_whitespace() || c == '/' || c == '>'
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start_matches(|c: char| c.is_ascii_whitespace()).len()
}

fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Splits markup into tokens. An unterminated tag ends the stream.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn finish(&mut self) {
        self.pos = self.input.len();
    }

    /// Move past the first `terminator` found at or after `offset` bytes.
    fn skip_past(&mut self, offset: usize, terminator: &str) {
        let rest = self.rest();
        match rest.get(offset..).and_then(|tail| tail.find(terminator)) {
            Some(idx) => self.pos += offset + idx + terminator.len(),
            None => self.finish(),
        }
    }

    fn end_tag(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();
        let after = &rest[2..];
        match after.as_bytes().first() {
            Some(b) if b.is_ascii_alphabetic() => {
                let name_len = after.find(is_tag_name_end).unwrap_or(after.len());
                let name = after[..name_len].to_ascii_lowercase();
                match after[name_len..].find('>') {
                    Some(idx) => {
                        self.pos += 2 + name_len + idx + 1;
                        Some(Token::EndTag(name))
                    }
                    None => {
                        self.finish();
                        None
                    }
                }
            }
            Some(b'>') => {
                self.pos += 3;
                Some(Token::Comment)
            }
            Some(_) => {
                self.skip_past(2, ">");
                Some(Token::Comment)
            }
            None => {
                self.pos += 2;
                Some(Token::Text("</"))
            }
        }
    }

    fn start_tag(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();
        let after = &rest[1..];
        let name_len = after.find(is_tag_name_end).unwrap_or(after.len());
        let name = after[..name_len].to_ascii_lowercase();

        let mut cursor = 1 + name_len;
        let mut attrs: Vec<Attribute> = Vec::new();
        let mut self_closing = false;

        loop {
            cursor += leading_whitespace(&rest[cursor..]);
            let tail = &rest[cursor..];
            match tail.as_bytes().first() {
                None => {
                    self.finish();
                    return None;
                }
                Some(b'>') => {
                    cursor += 1;
                    break;
                }
                Some(b'/') => {
                    self_closing = tail.as_bytes().get(1) == Some(&b'>');
                    cursor += 1;
                }
                Some(_) => {
                    self_closing = false;
                    let Some((attr, consumed)) = parse_attribute(tail) else {
                        self.finish();
                        return None;
                    };
                    cursor += consumed;
                    // First occurrence wins, as in browsers.
                    if !attrs.iter().any(|a| a.name == attr.name) {
                        attrs.push(attr);
                    }
                }
            }
        }

        self.pos += cursor;

        if RAW_TEXT_TAGS.contains(&name.as_str()) {
            self.skip_raw_text(&name);
            return Some(Token::RawElement);
        }

        Some(Token::StartTag {
            name,
            attrs,
            self_closing,
        })
    }

    /// Skip the body of a raw-text element up to and including its end tag.
    fn skip_raw_text(&mut self, name: &str) {
        if name == "plaintext" {
            self.finish();
            return;
        }

        let haystack = self.rest().as_bytes();
        let needle = format!("</{}", name);
        let mut from = 0;

        loop {
            let Some(idx) = find_ignore_ascii_case(&haystack[from..], needle.as_bytes()) else {
                self.finish();
                return;
            };
            let after = from + idx + needle.len();
            match haystack.get(after) {
                Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {
                    match haystack[after..].iter().position(|b| *b == b'>') {
                        Some(gt) => self.pos += after + gt + 1,
                        None => self.finish(),
                    }
                    return;
                }
                Some(_) => from = after,
                None => {
                    self.finish();
                    return;
                }
            }
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = self.rest();
        if rest.is_empty() {
            return None;
        }

        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            self.pos += end;
            return Some(Token::Text(&rest[..end]));
        }

        match rest.as_bytes().get(1) {
            Some(b'!') => {
                if rest.starts_with("<!--") {
                    self.skip_past(4, "-->");
                } else {
                    self.skip_past(2, ">");
                }
                Some(Token::Comment)
            }
            Some(b'?') => {
                self.skip_past(2, ">");
                Some(Token::Comment)
            }
            Some(b'/') => self.end_tag(),
            Some(b) if b.is_ascii_alphabetic() => self.start_tag(),
            _ => {
                self.pos += 1;
                Some(Token::Text("<"))
            }
        }
    }
}

/// Parse one attribute at the start of `tail`. `None` means an unterminated quote.
fn parse_attribute(tail: &str) -> Option<(Attribute, usize)> {
    let first_len = tail.chars().next()?.len_utf8();
    let name_end = tail[first_len..]
        .find(|c: char| is_tag_name_end(c) || c == '=')
        .map(|idx| idx + first_len)
        .unwrap_or(tail.len());
    let name = tail[..name_end].to_ascii_lowercase();

    let mut cursor = name_end;
    let ws = leading_whitespace(&tail[cursor..]);
    if !tail[cursor + ws..].starts_with('=') {
        return Some((Attribute { name, value: None }, cursor));
    }

    cursor += ws + 1;
    cursor += leading_whitespace(&tail[cursor..]);
    let value_tail = &tail[cursor..];

    let value = match value_tail.as_bytes().first() {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let close = value_tail[1..].find(quote as char)?;
            cursor += close + 2;
            &value_tail[1..1 + close]
        }
        Some(b'>') | None => "",
        Some(_) => {
            let end = value_tail
                .find(|c: char| c.is_ascii_whitespace() || c == '>')
                .unwrap_or(value_tail.len());
            cursor += end;
            &value_tail[..end]
        }
    };

    Some((
        Attribute {
            name,
            value: Some(value.to_string()),
        },
        cursor,
    ))
}

fn parse_entity(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix('&')?;

    if let Some(numeric) = body.strip_prefix('#') {
        let (radix, prefix_len) = if numeric.starts_with(['x', 'X']) {
            (16, 1)
        } else {
            (10, 0)
        };
        let digits = &numeric[prefix_len..];
        let len = digits
            .bytes()
            .take_while(|b| {
                if radix == 16 {
                    b.is_ascii_hexdigit()
                } else {
                    b.is_ascii_digit()
                }
            })
            .count();
        if len == 0 {
            return None;
        }
        let decoded = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|c| *c != '\0')
            .unwrap_or('\u{fffd}');
        let semicolon = usize::from(digits[len..].starts_with(';'));
        return Some((decoded, 2 + prefix_len + len + semicolon));
    }

    NAMED_ENTITIES.iter().find_map(|(name, ch)| {
        body.strip_prefix(name)
            .filter(|rest| rest.starts_with(';'))
            .map(|_| (*ch, 1 + name.len() + 1))
    })
}

/// Decode character references the way a browser does inside an attribute value.
fn decode_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match parse_entity(rest) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_safe_url(tag: &str, attr: &str, value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if BLOCKED_URL_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(scheme))
    {
        return false;
    }

    if compact.starts_with("data:") {
        return tag == "img"
            && attr == "src"
            && ALLOWED_DATA_IMAGE_PREFIXES.iter().any(|prefix| {
                compact
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with([';', ',']))
            });
    }

    true
}

fn is_allowed_attribute(tag: &str, attr: &str) -> bool {
    GLOBAL_ATTRS.contains(&attr) || TAG_SPECIFIC_ATTRS.contains(&(tag, attr))
}

fn filter_attribute(tag: &str, attr: &Attribute) -> Option<Attribute> {
    if attr.name.starts_with("on") || !is_allowed_attribute(tag, &attr.name) {
        return None;
    }

    let value = attr.value.as_deref().map(decode_entities);

    if URL_ATTRS.contains(&attr.name.as_str()) {
        let url = value?;
        if !is_safe_url(tag, &attr.name, &url) {
            return None;
        }
        return Some(Attribute {
            name: attr.name.clone(),
            value: Some(url),
        });
    }

    Some(Attribute {
        name: attr.name.clone(),
        value,
    })
}

fn push_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_start_tag(out: &mut String, name: &str, attrs: &[Attribute], self_closing: bool) {
    out.push('<');
    out.push_str(name);
    for attr in attrs.iter().filter_map(|a| filter_attribute(name, a)) {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = attr.value {
            out.push_str("=\"");
            push_escaped_attr(out, &value);
            out.push('"');
        }
    }
    if self_closing {
        out.push_str(" /");
    }
    out.push('>');
}

/// Original and cleaned form of a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizationResult {
    pub original: String,
    pub cleaned: String,
}

impl SanitizationResult {
    pub fn was_modified(&self) -> bool {
        self.original != self.cleaned
    }
}

/// Allow-list HTML sanitizer. Stateless; share freely between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSanitizer;

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn sanitize(&self, input: Option<&str>) -> Option<String> {
        input.map(|s| self.sanitize_html(s))
    }

    pub fn sanitize_html(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        // Open content-dropped elements; nothing is emitted while non-empty.
        let mut dropping: Vec<String> = Vec::new();

        for token in Tokenizer::new(input) {
            match token {
                Token::Text(text) => {
                    if dropping.is_empty() {
                        push_escaped_text(&mut out, text);
                    }
                }
                Token::Comment | Token::RawElement => {}
                Token::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    if CONTENT_DROPPED_TAGS.contains(&name.as_str()) {
                        if !self_closing && !VOID_TAGS.contains(&name.as_str()) {
                            dropping.push(name);
                        }
                        continue;
                    }
                    if dropping.is_empty() && ALLOWED_TAGS.contains(&name.as_str()) {
                        push_start_tag(&mut out, &name, &attrs, self_closing);
                    }
                }
                Token::EndTag(name) => {
                    if let Some(idx) = dropping.iter().rposition(|open| *open == name) {
                        dropping.truncate(idx);
                        continue;
                    }
                    if dropping.is_empty()
                        && ALLOWED_TAGS.contains(&name.as_str())
                        && !VOID_TAGS.contains(&name.as_str())
                    {
                        out.push_str("</");
                        out.push_str(&name);
                        out.push('>');
                    }
                }
            }
        }

        out
    }

    pub fn sanitize_field(&self, original: &str) -> SanitizationResult {
        SanitizationResult {
            original: original.to_string(),
            cleaned: self.sanitize_html(original),
        }
    }
}

/// Sanitize an optional value; `None` stays `None`.
pub fn sanitize(input: Option<&str>) -> Option<String> {
    HtmlSanitizer.sanitize(input)
}

pub fn sanitize_html(input: &str) -> String {
    HtmlSanitizer.sanitize_html(input)
}

pub fn sanitize_field(original: &str) -> SanitizationResult {
    HtmlSanitizer.sanitize_field(original)
}
