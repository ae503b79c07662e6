use scraper::ElementRef;
use std::collections::HashSet;

use super::html::{attr, lazy_src, quote_text, CITE_LINK, IMG, LINK, QUOTE, VIDEO_SOURCES};
use super::{guess_video_mime, is_likely_video_url, MediaContext};

const MAX_IMAGES: usize = 4;
const MAX_VIDEOS: usize = 2;
const AVATAR_MAX_WIDTH: i64 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialImage {
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub src: String,
    pub mime: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub href: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedPost {
    pub text: String,
    pub cite: Option<Citation>,
}

/// Attachments scraped from a social post body when no rich-post record is
/// available.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SocialExtras {
    pub images: Vec<SocialImage>,
    pub videos: Vec<VideoSource>,
    pub quote: Option<QuotedPost>,
}

impl SocialExtras {
    /// Images or videos were found; these replace the primary media block.
    pub fn has_rich_media(&self) -> bool {
        !self.images.is_empty() || !self.videos.is_empty()
    }
}

/// Scrape attachments and a quoted post from a Bluesky item body.
///
/// Returns `None` for other sources, and when nothing was found.
pub fn extract_social(ctx: &MediaContext<'_>) -> Option<SocialExtras> {
    if !ctx.is_bluesky_source() {
        return None;
    }
    let body = ctx.body()?;
    let mut seen: HashSet<&str> = HashSet::new();

    let mut images = Vec::new();
    for img in body.select(&IMG) {
        let Some(src) = lazy_src(img) else { continue };
        if seen.contains(src) || is_likely_avatar(src, img) {
            continue;
        }
        seen.insert(src);
        images.push(SocialImage {
            src: src.to_string(),
            alt: img.value().attr("alt").unwrap_or_default().to_string(),
        });
    }
    images.truncate(MAX_IMAGES);

    let mut videos = Vec::new();
    let video_srcs = body
        .select(&VIDEO_SOURCES)
        .filter_map(|el| attr(el, "src"))
        .chain(body.select(&LINK).filter_map(|el| attr(el, "href")));
    for src in video_srcs {
        if seen.contains(src) || !is_likely_video_url(src) {
            continue;
        }
        seen.insert(src);
        videos.push(VideoSource {
            src: src.to_string(),
            mime: guess_video_mime(src),
        });
    }
    videos.truncate(MAX_VIDEOS);

    let quote = body.first(&QUOTE).and_then(quoted_post);

    if images.is_empty() && videos.is_empty() && quote.is_none() {
        return None;
    }
    Some(SocialExtras {
        images,
        videos,
        quote,
    })
}

fn quoted_post(node: ElementRef<'_>) -> Option<QuotedPost> {
    let text = quote_text(node);
    if text.is_empty() {
        return None;
    }

    let cite = node.select(&CITE_LINK).next().and_then(|link| {
        let href = attr(link, "href");
        let label = link.text().collect::<String>().trim().to_string();
        let label = if label.is_empty() {
            href.unwrap_or_default().to_string()
        } else {
            label
        };
        if href.is_none() && label.is_empty() {
            return None;
        }
        Some(Citation {
            href: href.map(str::to_string),
            label,
        })
    });

    Some(QuotedPost { text, cite })
}

/// Profile pictures and emoji ride along in post markup; skip them.
fn is_likely_avatar(src: &str, img: ElementRef<'_>) -> bool {
    if src.starts_with("data:") {
        return true;
    }
    let lower = src.to_lowercase();
    if ["avatar", "profile", "icon", "emoji"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        return true;
    }

    let class = img.value().attr("class").unwrap_or_default().to_lowercase();
    if ["avatar", "emoji", "icon"].iter().any(|n| class.contains(n)) {
        return true;
    }
    let alt = img.value().attr("alt").unwrap_or_default().to_lowercase();
    if ["avatar", "emoji"].iter().any(|n| alt.contains(n)) {
        return true;
    }

    img.value()
        .attr("width")
        .and_then(leading_int)
        .is_some_and(|w| w <= AVATAR_MAX_WIDTH)
}

/// Integer prefix of an attribute like `"64px"`.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(raw.len(), |(i, _)| i);
    raw[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedItem;
    use pretty_assertions::assert_eq;

    fn social(body: &str) -> Option<SocialExtras> {
        let mut item = FeedItem::new(1);
        item.url = Some("https://bsky.app/profile/a/post/1".into());
        item.body = Some(body.to_string());
        extract_social(&MediaContext::new(&item, "Bluesky"))
    }

    #[test]
    fn test_non_social_source_is_ignored() {
        let mut item = FeedItem::new(1);
        item.url = Some("https://blog.example/p".into());
        item.body = Some(r#"<img src="a.png">"#.into());
        assert_eq!(extract_social(&MediaContext::new(&item, "Blog")), None);
    }

    #[test]
    fn test_images_skip_avatars_and_cap_at_four() {
        let body = r#"
            <img src="https://cdn/avatar/me.jpg">
            <img src="data:image/png;base64,AAA">
            <img src="https://cdn/x.jpg" class="Emoji">
            <img src="https://cdn/small.jpg" width="48px">
            <img src="https://cdn/1.jpg" alt="one">
            <img src="https://cdn/1.jpg">
            <img src="placeholder.gif" data-src="https://cdn/2.jpg">
            <img src="https://cdn/3.jpg" width="640">
            <img src="https://cdn/4.jpg">
            <img src="https://cdn/5.jpg">
        "#;
        let extras = social(body).unwrap();
        let srcs: Vec<_> = extras.images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(
            srcs,
            vec!["https://cdn/1.jpg", "https://cdn/2.jpg", "https://cdn/3.jpg", "https://cdn/4.jpg"]
        );
        assert_eq!(extras.images[0].alt, "one");
        assert!(extras.has_rich_media());
    }

    #[test]
    fn test_videos_capped_at_two() {
        let body = r#"
            <video src="https://v/a.mp4"></video>
            <video><source src="https://v/b.webm"></video>
            <a href="https://v/c.mov">c</a>
            <a href="https://v/page.html">not a video</a>
        "#;
        let extras = social(body).unwrap();
        assert_eq!(
            extras.videos,
            vec![
                VideoSource { src: "https://v/a.mp4".into(), mime: "video/mp4" },
                VideoSource { src: "https://v/b.webm".into(), mime: "video/webm" },
            ]
        );
    }

    #[test]
    fn test_quote_with_citation() {
        let body = r#"<p>my take</p>
            <blockquote>line one<br>line two
              <cite><a href="https://bsky.app/profile/q">@q</a></cite>
            </blockquote>"#;
        let extras = social(body).unwrap();
        assert!(!extras.has_rich_media());
        let quote = extras.quote.unwrap();
        assert!(quote.text.starts_with("line one\nline two"));
        assert_eq!(
            quote.cite,
            Some(Citation {
                href: Some("https://bsky.app/profile/q".into()),
                label: "@q".into(),
            })
        );
    }

    #[test]
    fn test_empty_quote_and_nothing_found() {
        assert_eq!(social("<blockquote><script>x()</script> </blockquote>"), None);
        assert_eq!(social("<p>text only</p>"), None);
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("64px"), Some(64));
        assert_eq!(leading_int(" 120"), Some(120));
        assert_eq!(leading_int("-1"), Some(-1));
        assert_eq!(leading_int("auto"), None);
    }
}
