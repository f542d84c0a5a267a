// 🧱 HTML scanning - just enough structure for directory pages
//
// Pages are flattened into elements in document order. Each element carries
// its tag, its own href and the whitespace-collapsed text of its subtree.

/// Tags that never have content or a closing tag
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Tags whose content is not page text
const RAW_TEXT_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Open {
        name: String,
        attrs: &'a str,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub href: Option<String>,
    pub text: String,
    /// Index of the last element inside this one (its own index when empty)
    pub end: usize,
}

// ============================================================================
// TOKENIZER
// ============================================================================

pub fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let Some(rel) = html[pos..].find('<') else {
            tokens.push(Token::Text(&html[pos..]));
            break;
        };
        let lt = pos + rel;
        if lt > pos {
            tokens.push(Token::Text(&html[pos..lt]));
        }

        let rest = &html[lt..];
        if rest.starts_with("<!--") {
            pos = match rest.find("-->") {
                Some(end) => lt + end + 3,
                None => html.len(),
            };
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = match rest.find('>') {
                Some(end) => lt + end + 1,
                None => html.len(),
            };
            continue;
        }

        let Some(gt) = find_tag_end(html, lt + 1) else {
            tokens.push(Token::Text(&html[lt..]));
            break;
        };
        let inner = &html[lt + 1..gt];
        pos = gt + 1;

        if let Some(closing) = inner.strip_prefix('/') {
            let name = tag_name(closing);
            if !name.is_empty() {
                tokens.push(Token::Close { name });
            }
            continue;
        }

        let name = tag_name(inner);
        if name.is_empty() {
            // a stray '<' in text
            tokens.push(Token::Text(&html[lt..=gt]));
            continue;
        }

        let attrs = inner[name.len()..].trim();
        let self_closing = attrs.ends_with('/');
        let attrs = attrs.trim_end_matches('/').trim_end();

        if RAW_TEXT_TAGS.contains(&name.as_str()) && !self_closing {
            let close = format!("</{}", name);
            pos = match to_lower(&html[pos..]).find(&close) {
                Some(end) => {
                    let close_start = pos + end;
                    match html[close_start..].find('>') {
                        Some(gt) => close_start + gt + 1,
                        None => html.len(),
                    }
                }
                None => html.len(),
            };
            continue;
        }

        tokens.push(Token::Open {
            name,
            attrs,
            self_closing,
        });
    }

    tokens
}

/// Index of the '>' closing a tag, skipping quoted attribute values
fn find_tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in html[from..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

fn tag_name(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

// ============================================================================
// ELEMENTS
// ============================================================================

/// Flatten a page into elements, in the order their start tags appear
pub fn elements(html: &str) -> Vec<Element> {
    let mut out: Vec<Element> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    for token in tokenize(html) {
        match token {
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                let href = attr(attrs, "href");
                let is_void = self_closing || VOID_TAGS.contains(&name.as_str());
                out.push(Element {
                    tag: name,
                    href,
                    text: String::new(),
                    end: out.len(),
                });
                if !is_void {
                    open.push(out.len() - 1);
                }
            }
            Token::Close { name } => {
                // Close the nearest matching element and anything left open inside it
                if let Some(depth) = open.iter().rposition(|&i| out[i].tag == name) {
                    let last = out.len() - 1;
                    for &i in &open[depth..] {
                        out[i].end = last;
                    }
                    open.truncate(depth);
                }
            }
            Token::Text(raw) => {
                let text = decode_entities(raw);
                if text.trim().is_empty() {
                    continue;
                }
                for &i in &open {
                    out[i].text.push(' ');
                    out[i].text.push_str(&text);
                }
            }
        }
    }

    if let Some(last) = out.len().checked_sub(1) {
        for &i in &open {
            out[i].end = last;
        }
    }
    for element in &mut out {
        element.text = normalize_ws(&element.text);
    }
    out
}

/// Elements nested inside `elements[index]`
pub fn descendants(elements: &[Element], index: usize) -> &[Element] {
    match elements.get(index) {
        Some(el) if el.end > index => &elements[index + 1..=el.end],
        _ => &[],
    }
}

/// Value of one attribute, entity-decoded; names compare case-insensitively
pub fn attr(attrs: &str, wanted: &str) -> Option<String> {
    let mut rest = attrs;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    match body.find(q) {
                        Some(end) => (&body[..end], &body[end + 1..]),
                        None => (body, ""),
                    }
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining;
            Some(value)
        } else {
            None
        };

        if name.eq_ignore_ascii_case(wanted) {
            return Some(decode_entities(value.unwrap_or("")).trim().to_string());
        }
        if name.is_empty() {
            // unparseable remainder
            return None;
        }
    }
}

// ============================================================================
// TEXT HELPERS
// ============================================================================

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Named entities seen on directory pages plus numeric references
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let decoded = after
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&after[..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "rarr" => '→',
        "ndash" => '–',
        "mdash" => '—',
        "rsquo" => '\u{2019}',
        "lsquo" => '\u{2018}',
        "auml" => 'ä',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "Auml" => 'Ä',
        "Ouml" => 'Ö',
        "Uuml" => 'Ü',
        "szlig" => 'ß',
        "eacute" => 'é',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_basic_tags() {
        let tokens = tokenize(r#"<p class="x">Hi <b>there</b></p>"#);
        assert_eq!(
            tokens,
            vec![
                Token::Open { name: "p".into(), attrs: r#"class="x""#, self_closing: false },
                Token::Text("Hi "),
                Token::Open { name: "b".into(), attrs: "", self_closing: false },
                Token::Text("there"),
                Token::Close { name: "b".into() },
                Token::Close { name: "p".into() },
            ]
        );
    }

    #[test]
    fn test_scripts_and_comments_are_skipped() {
        let els = elements("<div><!-- <p>hidden</p> --><script>var a = '<p>x</p>';</script>Shown</div>");
        assert_eq!(els.len(), 1);
        assert_eq!(els[0].text, "Shown");
    }

    #[test]
    fn test_element_text_includes_descendants() {
        let els = elements("<li><strong>Daniel\n Cremers</strong><br><a href='/g/'>Group</a></li>");
        let tags: Vec<&str> = els.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["li", "strong", "br", "a"]);
        assert_eq!(els[0].text, "Daniel Cremers Group");
        assert_eq!(els[1].text, "Daniel Cremers");
        assert_eq!(els[3].href.as_deref(), Some("/g/"));

        assert_eq!(els[0].end, 3);
        assert_eq!(descendants(&els, 0).len(), 3);
        assert!(descendants(&els, 1).is_empty());
    }

    #[test]
    fn test_unclosed_inner_tags_close_with_parent() {
        let els = elements("<div><p>One<p>Two</div><span>After</span>");
        let span = els.iter().find(|e| e.tag == "span").unwrap();
        assert_eq!(span.text, "After");
        assert_eq!(els[0].text, "One Two");
    }

    #[test]
    fn test_attr_parsing() {
        assert_eq!(attr(r#"class="a" HREF='/x?a=1&amp;b=2'"#, "href").as_deref(), Some("/x?a=1&b=2"));
        assert_eq!(attr("href=/plain data-x", "href").as_deref(), Some("/plain"));
        assert_eq!(attr("disabled href=\"a b\"", "href").as_deref(), Some("a b"));
        assert_eq!(attr("class=\"a\"", "href"), None);
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let els = elements(r#"<a title="a > b" href="/y">Link</a>"#);
        assert_eq!(els[0].href.as_deref(), Some("/y"));
        assert_eq!(els[0].text, "Link");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("M&uuml;ller &amp; Co &rarr; Group"), "Müller & Co → Group");
        assert_eq!(decode_entities("&#8594; &#x41;"), "→ A");
        assert_eq!(decode_entities("AT&T &unknown;"), "AT&T &unknown;");
    }
}
