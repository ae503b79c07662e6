use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

pub(crate) static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));
pub(crate) static VIDEO: LazyLock<Selector> = LazyLock::new(|| selector("video"));
pub(crate) static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("source"));
pub(crate) static VIDEO_SOURCES: LazyLock<Selector> =
    LazyLock::new(|| selector("video, video source, source"));
pub(crate) static FRAME_OR_VIDEO: LazyLock<Selector> = LazyLock::new(|| selector("iframe, video"));
pub(crate) static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
pub(crate) static QUOTE: LazyLock<Selector> =
    LazyLock::new(|| selector("blockquote, .quote, .quoted-post, .quote-card"));
pub(crate) static CITE_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("cite a[href], a[href]"));

/// A parsed item body.
///
/// Parsing never fails; malformed markup is repaired the way a browser would.
pub(crate) struct Fragment {
    html: Html,
}

impl Fragment {
    pub(crate) fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_fragment(body),
        }
    }

    pub(crate) fn first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    pub(crate) fn select<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(selector)
    }

    /// Concatenated text content, trimmed.
    pub(crate) fn text(&self) -> String {
        self.html
            .root_element()
            .text()
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Non-empty attribute value.
pub(crate) fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).filter(|v| !v.is_empty())
}

/// `src`, falling back to the lazy-loading `data-src`.
pub(crate) fn src(el: ElementRef<'_>) -> Option<&str> {
    attr(el, "src").or_else(|| attr(el, "data-src"))
}

/// `data-src` first: lazy-loaded images keep a placeholder in `src`.
pub(crate) fn lazy_src(el: ElementRef<'_>) -> Option<&str> {
    attr(el, "data-src").or_else(|| attr(el, "src"))
}

/// Text of a quoted block with `<br>` turned into newlines.
///
/// Scripts, styles and media elements contribute nothing.
pub(crate) fn quote_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out.trim().to_string()
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => match element.name() {
                "br" => out.push('\n'),
                "script" | "style" | "img" | "video" | "source" => {}
                _ => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        collect_text(child_el, out);
                    }
                }
            },
            _ => {}
        }
    }
}

/// Plain text of an HTML string.
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    Fragment::parse(html).text()
}
