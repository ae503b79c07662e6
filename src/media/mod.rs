//! Media extraction from item bodies.
//!
//! Item bodies are arbitrary HTML from arbitrary feeds. Extraction is a
//! best-effort, pure pass over the markup: no network calls, and any
//! malformed input simply falls through to the next rule (or to no media).
//!
//! - [`extract_media`] - the primary descriptor, chosen by an ordered rule table
//! - [`normalize_to_embed`] - video page URL to embeddable player URL
//! - [`extract_social`] - image/video/quote enrichment for social posts
//! - [`extract_metrics`] - reply/repost/like counts
//! - [`project_post`] - structured parts for a hydrated rich post

mod embed;
mod html;
mod metrics;
mod rich;
mod social;

use scraper::ElementRef;

pub use embed::{
    is_invidious_host, is_tiktok_cdn, normalize_to_embed, with_playback_speed, youtube_thumbnail,
    PLAYBACK_SPEED,
};
pub use html::strip_html;
pub use metrics::{extract_metrics, Metric, MetricKind, MetricValue};
pub use rich::{permalink, project_embed, project_post, QuoteCard, RichImage, RichPart};
pub use social::{extract_social, Citation, QuotedPost, SocialExtras, SocialImage, VideoSource};

use crate::feed::FeedItem;
use crate::util::hostname;
use html::{attr, src, Fragment, FRAME_OR_VIDEO, IMG, LINK, SOURCE, VIDEO};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "mkv"];

/// The primary media block for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaDescriptor {
    /// A directly playable file, with an optional poster frame.
    NativeVideo {
        src: String,
        mime: &'static str,
        poster: Option<String>,
    },
    /// A provider video: a poster linking to `watch_url`, with the player
    /// at `embed_url` materialised on demand.
    EmbeddedVideo {
        watch_url: String,
        embed_url: String,
        poster: Option<String>,
    },
    /// A short-form video thumbnail that links to the item page.
    ImageLink {
        href: String,
        src: String,
        alt: String,
    },
    Image {
        href: String,
        src: String,
        alt: String,
    },
    /// A generic "view media" link.
    MediaLink { href: String },
}

/// Everything the extraction rules look at for one item.
pub struct MediaContext<'a> {
    pub item_url: Option<&'a str>,
    pub enclosure_link: Option<&'a str>,
    pub enclosure_mime: Option<&'a str>,
    /// Lowercased hostname of the item URL, empty when it does not parse.
    pub domain: String,
    pub feed_name: &'a str,
    body: Option<Fragment>,
}

impl<'a> MediaContext<'a> {
    pub fn new(item: &'a FeedItem, feed_name: &'a str) -> Self {
        let item_url = item.url.as_deref().filter(|u| !u.is_empty());
        Self {
            item_url,
            enclosure_link: item.enclosure_link.as_deref().filter(|u| !u.is_empty()),
            enclosure_mime: item.enclosure_mime.as_deref(),
            domain: item_url.map(hostname).unwrap_or_default(),
            feed_name,
            body: item
                .body
                .as_deref()
                .filter(|b| !b.is_empty())
                .map(Fragment::parse),
        }
    }

    pub(crate) fn body(&self) -> Option<&Fragment> {
        self.body.as_ref()
    }

    fn signature(&self) -> String {
        format!(
            "{} {} {}",
            self.domain,
            self.feed_name,
            self.item_url.unwrap_or_default()
        )
        .to_lowercase()
    }

    /// Bluesky posts, by URL or feed-name substring.
    pub fn is_bluesky_source(&self) -> bool {
        let signature = self.signature();
        signature.contains("bluesky") || signature.contains("bsky")
    }

    /// Lemmy-style link aggregators.
    pub fn is_aggregator_source(&self) -> bool {
        self.signature().contains("lemmy")
    }

    pub fn is_tiktok_source(&self) -> bool {
        self.domain.contains("tiktok") || self.feed_name.to_lowercase().contains("tiktok")
    }

    fn first_image(&self) -> Option<ElementRef<'_>> {
        self.body()?.first(&IMG)
    }

    fn item_href(&self) -> String {
        self.item_url.unwrap_or_default().to_string()
    }
}

// ============================================================================
// Rule Table
// ============================================================================

type Rule = fn(&MediaContext<'_>) -> Option<MediaDescriptor>;

struct MediaRule {
    name: &'static str,
    apply: Rule,
}

/// Evaluated in order; the first rule that produces a descriptor wins.
const RULES: &[MediaRule] = &[
    MediaRule {
        name: "aggregator-video",
        apply: aggregator_video,
    },
    MediaRule {
        name: "embeddable-video",
        apply: embeddable_video,
    },
    MediaRule {
        name: "short-form-thumbnail",
        apply: short_form_thumbnail,
    },
    MediaRule {
        name: "image-enclosure",
        apply: image_enclosure,
    },
    MediaRule {
        name: "body-image",
        apply: body_image,
    },
    MediaRule {
        name: "bare-media",
        apply: bare_media,
    },
];

/// Pick the primary media block for an item, or `None`.
pub fn extract_media(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    RULES.iter().find_map(|rule| {
        let media = (rule.apply)(ctx)?;
        tracing::trace!(rule = rule.name, "Media rule matched");
        Some(media)
    })
}

/// A `<video>` (or a link to a video file) in a link-aggregator post.
fn aggregator_video(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    if !ctx.is_aggregator_source() {
        return None;
    }
    let body = ctx.body()?;

    let from_element = body.first(&VIDEO).and_then(|video| {
        attr(video, "src").or_else(|| video.select(&SOURCE).next().and_then(|s| attr(s, "src")))
    });
    let video_src = from_element
        .or_else(|| {
            body.select(&LINK)
                .filter_map(|a| attr(a, "href"))
                .find(|href| is_likely_video_url(href))
        })
        .filter(|s| is_likely_video_url(s))?;

    Some(MediaDescriptor::NativeVideo {
        src: video_src.to_string(),
        mime: guess_video_mime(video_src),
        poster: ctx.first_image().and_then(src).map(str::to_string),
    })
}

/// The first candidate URL that normalises to a non-TikTok player.
fn embeddable_video(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    let mut candidates: Vec<&str> = Vec::new();
    candidates.extend(ctx.item_url);
    candidates.extend(ctx.enclosure_link);
    if let Some(body) = ctx.body() {
        candidates.extend(body.select(&FRAME_OR_VIDEO).filter_map(|el| attr(el, "src")));
        candidates.extend(body.select(&LINK).filter_map(|el| attr(el, "href")));
    }

    let (original, embed_url) = candidates.into_iter().find_map(|candidate| {
        let embed_url = normalize_to_embed(candidate)?;
        if embed_url.contains("tiktok.com") {
            return None;
        }
        Some((candidate, embed_url))
    })?;

    let poster = youtube_thumbnail(&embed_url)
        .or_else(|| ctx.first_image().and_then(src).map(str::to_string));

    Some(MediaDescriptor::EmbeddedVideo {
        watch_url: with_playback_speed(original.trim()),
        embed_url,
        poster,
    })
}

/// TikTok CDN thumbnails are signed and expire; link them to the item
/// instead of presenting them as a plain image.
fn short_form_thumbnail(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    let image = ctx.first_image()?;
    let image_src = src(image).filter(|s| is_tiktok_cdn(s))?;
    Some(MediaDescriptor::ImageLink {
        href: ctx.item_href(),
        src: image_src.to_string(),
        alt: image.value().attr("alt").unwrap_or_default().to_string(),
    })
}

fn image_enclosure(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    let link = ctx.enclosure_link?;
    if !ctx.enclosure_mime?.starts_with("image/") {
        return None;
    }
    Some(MediaDescriptor::Image {
        href: ctx.item_href(),
        src: link.to_string(),
        alt: String::new(),
    })
}

fn body_image(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    let image = ctx.first_image()?;
    let image_src = src(image).filter(|s| !is_tiktok_cdn(s))?;
    Some(MediaDescriptor::Image {
        href: ctx.item_href(),
        src: image_src.to_string(),
        alt: image.value().attr("alt").unwrap_or_default().to_string(),
    })
}

fn bare_media(ctx: &MediaContext<'_>) -> Option<MediaDescriptor> {
    let element = ctx.body()?.first(&FRAME_OR_VIDEO)?;
    let href = attr(element, "src").filter(|s| !s.contains("tiktok.com"))?;
    Some(MediaDescriptor::MediaLink {
        href: href.to_string(),
    })
}

// ============================================================================
// Video Files
// ============================================================================

fn path_without_query(url: &str) -> String {
    url.split('?').next().unwrap_or_default().to_ascii_lowercase()
}

/// Whether `url` names a video file by extension (query string ignored).
pub fn is_likely_video_url(url: &str) -> bool {
    let path = path_without_query(url);
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| VIDEO_EXTENSIONS.contains(&ext))
}

/// MIME type for a direct video source, defaulting to MP4.
pub fn guess_video_mime(url: &str) -> &'static str {
    let path = path_without_query(url);
    if path.ends_with(".webm") {
        "video/webm"
    } else if path.ends_with(".mov") {
        "video/quicktime"
    } else if path.ends_with(".mkv") {
        "video/x-matroska"
    } else {
        "video/mp4"
    }
}
