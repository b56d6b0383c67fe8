//! Rich text rendering: structured text blocks → HTML and plain text.
//!
//! Rich text arrives as an ordered list of blocks. Each text block carries its
//! text and a list of `spans` (character ranges with formatting or links):
//!
//! ```json
//! [
//!   { "type": "heading1", "text": "Hello", "spans": [] },
//!   { "type": "paragraph", "text": "Read more here",
//!     "spans": [{ "start": 10, "end": 14, "type": "hyperlink",
//!                 "data": { "link_type": "Web", "url": "https://example.com" } }] }
//! ]
//! ```
//!
//! ## Rendering rules
//!
//! | Block | HTML |
//! |-------|------|
//! | `heading1`..`heading6` | `<h1>`..`<h6>` |
//! | `paragraph` | `<p>` |
//! | `preformatted` | `<pre>` |
//! | consecutive `list-item` | `<ul><li>..</li></ul>` |
//! | consecutive `o-list-item` | `<ol><li>..</li></ol>` |
//! | `image` | `<p class="block-img"><img></p>` (wrapped in `<a>` when linked) |
//! | `embed` | `<div data-oembed=..>` with the provider's HTML |
//!
//! Spans render as `<strong>`, `<em>`, `<a>` (via the [`LinkResolver`]) and
//! `<span class="label">`. Spans nest when one range contains another; a span
//! overlapping the end of its container is cut at the container's end.
//! Newlines inside text become `<br />`.
//!
//! Offsets count Unicode scalar values.
//!
//! An [`HtmlSerializer`] may override any element. It receives the element
//! and its already-rendered children and returns `Some(html)` to replace the
//! default markup, or `None` to keep it.
//!
//! HTML is built with maud, so all text is escaped.

use crate::link::{LinkResolver, link_url};
use maud::{Markup, PreEscaped, html};
use serde::Deserialize;
use serde_json::Value;

/// Kind of element handed to an [`HtmlSerializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Heading(u8),
    Paragraph,
    Preformatted,
    ListItem,
    OListItem,
    List,
    OList,
    Image,
    Embed,
    Strong,
    Em,
    Hyperlink,
    Label,
    Unknown,
}

impl ElementKind {
    fn of_block(block_type: &str) -> Self {
        match block_type {
            "heading1" => ElementKind::Heading(1),
            "heading2" => ElementKind::Heading(2),
            "heading3" => ElementKind::Heading(3),
            "heading4" => ElementKind::Heading(4),
            "heading5" => ElementKind::Heading(5),
            "heading6" => ElementKind::Heading(6),
            "paragraph" => ElementKind::Paragraph,
            "preformatted" => ElementKind::Preformatted,
            "list-item" => ElementKind::ListItem,
            "o-list-item" => ElementKind::OListItem,
            "image" => ElementKind::Image,
            "embed" => ElementKind::Embed,
            _ => ElementKind::Unknown,
        }
    }

    fn of_span(span_type: &str) -> Self {
        match span_type {
            "strong" => ElementKind::Strong,
            "em" => ElementKind::Em,
            "hyperlink" => ElementKind::Hyperlink,
            "label" => ElementKind::Label,
            _ => ElementKind::Unknown,
        }
    }
}

/// An element being rendered: its kind and the raw block or span JSON.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub kind: ElementKind,
    pub raw: &'a Value,
}

/// Per-element override of the default HTML.
pub trait HtmlSerializer: Send + Sync {
    fn serialize(&self, element: &Element<'_>, children: &str) -> Option<String>;
}

impl<F> HtmlSerializer for F
where
    F: Fn(&Element<'_>, &str) -> Option<String> + Send + Sync,
{
    fn serialize(&self, element: &Element<'_>, children: &str) -> Option<String> {
        self(element, children)
    }
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    spans: Vec<Span>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Span {
    start: usize,
    end: usize,
    #[serde(rename = "type")]
    span_type: String,
    #[serde(default)]
    data: Value,
    #[serde(skip)]
    index: usize,
}

struct Renderer<'a> {
    resolver: &'a dyn LinkResolver,
    serializer: Option<&'a dyn HtmlSerializer>,
}

impl Renderer<'_> {
    fn apply(&self, element: Element<'_>, children: &str, default: impl FnOnce() -> Markup) -> String {
        self.serializer
            .and_then(|s| s.serialize(&element, children))
            .unwrap_or_else(|| default().into_string())
    }

    fn block(&self, raw: &Value, block: &Block) -> String {
        let kind = ElementKind::of_block(&block.block_type);
        let element = Element { kind, raw };
        let children = match &block.text {
            Some(text) => self.spans(text, raw, &block.spans),
            None => String::new(),
        };
        let inner = PreEscaped(children.as_str());
        let label = block.label.as_deref();
        self.apply(element, &children, || match kind {
            ElementKind::Heading(1) => html! { h1 class=[label] { (inner) } },
            ElementKind::Heading(2) => html! { h2 class=[label] { (inner) } },
            ElementKind::Heading(3) => html! { h3 class=[label] { (inner) } },
            ElementKind::Heading(4) => html! { h4 class=[label] { (inner) } },
            ElementKind::Heading(5) => html! { h5 class=[label] { (inner) } },
            ElementKind::Heading(_) => html! { h6 class=[label] { (inner) } },
            ElementKind::Paragraph => html! { p class=[label] { (inner) } },
            ElementKind::Preformatted => html! { pre class=[label] { (inner) } },
            ElementKind::ListItem | ElementKind::OListItem => {
                html! { li class=[label] { (inner) } }
            }
            ElementKind::Image => self.image(raw),
            ElementKind::Embed => embed(raw),
            _ => html! { (inner) },
        })
    }

    fn image(&self, raw: &Value) -> Markup {
        let src = raw.get("url").and_then(Value::as_str).unwrap_or_default();
        let alt = raw.get("alt").and_then(Value::as_str).unwrap_or_default();
        let copyright = raw.get("copyright").and_then(Value::as_str);
        let href = raw.get("linkTo").and_then(|l| link_url(l, self.resolver));
        let img = html! { img src=(src) alt=(alt) copyright=[copyright]; };
        html! {
            p.block-img {
                @if let Some(href) = href {
                    a href=(href) { (img) }
                } @else {
                    (img)
                }
            }
        }
    }

    fn list(&self, kind: ElementKind, raw: &Value, items: &[String]) -> String {
        let children = items.concat();
        let inner = PreEscaped(children.as_str());
        self.apply(Element { kind, raw }, &children, || match kind {
            ElementKind::OList => html! { ol { (inner) } },
            _ => html! { ul { (inner) } },
        })
    }

    fn spans(&self, text: &str, raw: &Value, spans: &[Span]) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut sorted: Vec<Span> = spans
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, mut span)| {
                span.index = index;
                span
            })
            .filter(|s| s.start < s.end)
            .collect();
        sorted.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let raw_spans = raw.get("spans");
        self.range(&chars, 0, chars.len(), &sorted, raw_spans)
    }

    fn range(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        spans: &[Span],
        raw_spans: Option<&Value>,
    ) -> String {
        let mut out = String::new();
        let mut cursor = start;
        let mut i = 0;
        while i < spans.len() {
            let span = &spans[i];
            let span_start = span.start.max(cursor).min(end);
            let span_end = span.end.min(end);
            if span_start >= span_end {
                i += 1;
                continue;
            }
            out.push_str(&escape_text(&chars[cursor..span_start]));
            let mut j = i + 1;
            while j < spans.len() && spans[j].start < span_end {
                j += 1;
            }
            let inner = self.range(chars, span_start, span_end, &spans[i + 1..j], raw_spans);
            let span_raw = raw_spans
                .and_then(|s| s.get(span.index))
                .unwrap_or(&Value::Null);
            out.push_str(&self.span(span, span_raw, &inner));
            cursor = span_end;
            i = j;
        }
        if cursor < end {
            out.push_str(&escape_text(&chars[cursor..end]));
        }
        out
    }

    fn span(&self, span: &Span, raw: &Value, inner: &str) -> String {
        let kind = ElementKind::of_span(&span.span_type);
        let children = PreEscaped(inner);
        self.apply(Element { kind, raw }, inner, || match kind {
            ElementKind::Strong => html! { strong { (children) } },
            ElementKind::Em => html! { em { (children) } },
            ElementKind::Hyperlink => {
                let target = span.data.get("target").and_then(Value::as_str);
                match link_url(&span.data, self.resolver) {
                    Some(href) => html! {
                        a href=(href) target=[target] rel=[target.map(|_| "noopener noreferrer")] {
                            (children)
                        }
                    },
                    None => html! { (children) },
                }
            }
            ElementKind::Label => {
                let label = span.data.get("label").and_then(Value::as_str);
                html! { span class=[label] { (children) } }
            }
            _ => html! { (children) },
        })
    }
}

fn embed(raw: &Value) -> Markup {
    let oembed = raw.get("oembed").unwrap_or(&Value::Null);
    let field = |key: &str| oembed.get(key).and_then(Value::as_str);
    let embed_html = field("html").unwrap_or_default();
    html! {
        div data-oembed=[field("embed_url")]
            data-oembed-type=[field("type")]
            data-oembed-provider=[field("provider_name")] {
            (PreEscaped(embed_html))
        }
    }
}

fn escape_text(chars: &[char]) -> String {
    let text: String = chars.iter().collect();
    html! { (text) }.into_string().replace('\n', "<br />")
}

/// Render rich text blocks to HTML.
///
/// Anything that is not a list of blocks renders as an empty string;
/// individual malformed blocks are skipped.
pub fn as_html(
    value: &Value,
    resolver: &dyn LinkResolver,
    serializer: Option<&dyn HtmlSerializer>,
) -> String {
    let renderer = Renderer {
        resolver,
        serializer,
    };
    let Some(blocks) = value.as_array() else {
        return String::new();
    };

    let mut out = String::new();
    let mut pending: Option<(ElementKind, Vec<String>)> = None;
    for raw in blocks {
        let Ok(block) = Block::deserialize(raw) else {
            continue;
        };
        let list_kind = match ElementKind::of_block(&block.block_type) {
            ElementKind::ListItem => Some(ElementKind::List),
            ElementKind::OListItem => Some(ElementKind::OList),
            _ => None,
        };
        if let Some((kind, items)) = &pending
            && Some(*kind) != list_kind
        {
            out.push_str(&renderer.list(*kind, value, items));
            pending = None;
        }
        let rendered = renderer.block(raw, &block);
        match list_kind {
            Some(kind) => pending.get_or_insert_with(|| (kind, Vec::new())).1.push(rendered),
            None => out.push_str(&rendered),
        }
    }
    if let Some((kind, items)) = &pending {
        out.push_str(&renderer.list(*kind, value, items));
    }
    out
}

/// Plain text of rich text blocks, joined with a single space.
pub fn as_text(value: &Value) -> String {
    value
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}
