//! Per-item presentation model.
//!
//! A [`FeedCard`] is everything a front end needs to draw one item: which
//! title and excerpt to show, where the item came from, which media block
//! wins, and the engagement counts. Cards are rebuilt on every render and
//! never cached.

use chrono::{DateTime, Utc};

use crate::feed::{FeedItem, Lookups};
use crate::media::{
    extract_media, extract_metrics, extract_social, strip_html, MediaContext, MediaDescriptor,
    Metric, QuotedPost, SocialExtras,
};
use crate::util::{collapse_whitespace, excerpt};

const UNKNOWN_FEED: &str = "Unknown Feed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardOptions {
    pub show_post_content: bool,
    /// Maximum excerpt length in characters, ellipsis included.
    pub post_content_limit: usize,
}

impl Default for CardOptions {
    fn default() -> Self {
        Self {
            show_post_content: true,
            post_content_limit: 280,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedCard {
    pub id: i64,
    pub url: Option<String>,
    /// Hostname of `url`, empty when it does not parse.
    pub domain: String,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub feed_name: String,
    pub folder_name: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub unread: bool,
    pub starred: bool,
    /// Set for posts that will be hydrated through the rich-post lookup.
    /// When present, `media` and `social` are always empty.
    pub rich_post_uri: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub social: Option<SocialExtras>,
    pub metrics: Vec<Metric>,
}

impl FeedCard {
    /// The quoted post scraped from the body, shown alongside any media.
    pub fn quote(&self) -> Option<&QuotedPost> {
        self.social.as_ref()?.quote.as_ref()
    }
}

/// Build the card for `item`. `unread` is the overlay-aware read state.
pub fn build_card(item: &FeedItem, lookups: &Lookups, unread: bool, options: CardOptions) -> FeedCard {
    let feed_name = lookups
        .feed(item.feed_id)
        .map(|feed| feed.title.clone())
        .or_else(|| item.feed_title.clone())
        .unwrap_or_else(|| UNKNOWN_FEED.to_string());
    let folder_name = lookups.folder(item.folder_id).map(|f| f.name.clone());

    let ctx = MediaContext::new(item, &feed_name);

    let title = item
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| should_display_title(t))
        .map(str::to_string);

    let excerpt = if options.show_post_content {
        item.body
            .as_deref()
            .map(|body| build_excerpt(body, options.post_content_limit))
            .filter(|text| !text.is_empty())
            .filter(|_| !ctx.is_tiktok_source())
            .filter(|text| {
                let raw_title = item.title.as_deref().unwrap_or_default().trim();
                raw_title.is_empty() || text.to_lowercase() != raw_title.to_lowercase()
            })
    } else {
        None
    };

    let rich_post_uri = item
        .guid
        .as_deref()
        .filter(|guid| guid.starts_with("at://") && ctx.is_bluesky_source())
        .map(str::to_string);

    let (media, social) = if rich_post_uri.is_some() {
        (None, None)
    } else {
        let social = extract_social(&ctx);
        let media = match &social {
            Some(extras) if extras.has_rich_media() => None,
            _ => extract_media(&ctx),
        };
        (media, social)
    };

    FeedCard {
        id: item.id,
        url: item.url.clone(),
        domain: ctx.domain.clone(),
        title,
        excerpt,
        feed_name: feed_name.clone(),
        folder_name,
        published: item.pub_date.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        unread,
        starred: item.starred,
        rich_post_uri,
        media,
        social,
        metrics: extract_metrics(item),
    }
}

fn should_display_title(title: &str) -> bool {
    !title.is_empty() && !title.eq_ignore_ascii_case("untitled")
}

fn build_excerpt(body: &str, limit: usize) -> String {
    excerpt(&collapse_whitespace(&strip_html(body)), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Feed, Folder};
    use pretty_assertions::assert_eq;

    fn lookups() -> Lookups {
        Lookups {
            folders: vec![Folder {
                id: 1,
                name: "Social".into(),
            }],
            feeds: vec![Feed {
                id: 10,
                title: "Bluesky - alice".into(),
                url: None,
                link: None,
                folder_id: Some(1),
            }],
        }
    }

    fn card(item: &FeedItem) -> FeedCard {
        build_card(item, &lookups(), true, CardOptions::default())
    }

    #[test]
    fn test_title_visibility() {
        let mut item = FeedItem::new(1);
        item.title = Some("  Untitled ".into());
        assert_eq!(card(&item).title, None);

        item.title = Some(" Headline ".into());
        assert_eq!(card(&item).title.as_deref(), Some("Headline"));
    }

    #[test]
    fn test_excerpt_collapses_and_truncates() {
        let mut item = FeedItem::new(1);
        item.body = Some("<p>one\n\n two</p>   <p>three four five</p>".into());
        let options = CardOptions {
            show_post_content: true,
            post_content_limit: 12,
        };
        let card = build_card(&item, &Lookups::default(), true, options);
        assert_eq!(card.excerpt.as_deref(), Some("one two thr…"));

        let hidden = build_card(
            &item,
            &Lookups::default(),
            true,
            CardOptions {
                show_post_content: false,
                ..options
            },
        );
        assert_eq!(hidden.excerpt, None);
    }

    #[test]
    fn test_excerpt_hidden_when_equal_to_title_or_tiktok() {
        let mut item = FeedItem::new(1);
        item.title = Some("Same Text".into());
        item.body = Some("<p>same text</p>".into());
        assert_eq!(card(&item).excerpt, None);

        item.title = Some("Über Straße".into());
        item.body = Some("<p>über straße</p>".into());
        assert_eq!(card(&item).excerpt, None);

        let mut tiktok = FeedItem::new(2);
        tiktok.feed_title = Some("TikTok @dancer".into());
        tiktok.body = Some("caption".into());
        assert_eq!(card(&tiktok).excerpt, None);
    }

    #[test]
    fn test_feed_and_folder_names() {
        let mut item = FeedItem::new(1);
        item.feed_id = Some(10);
        item.folder_id = Some(1);
        item.feed_title = Some("ignored".into());
        let joined = card(&item);
        assert_eq!(joined.feed_name, "Bluesky - alice");
        assert_eq!(joined.folder_name.as_deref(), Some("Social"));

        let mut orphan = FeedItem::new(2);
        orphan.feed_title = Some("Fallback".into());
        assert_eq!(card(&orphan).feed_name, "Fallback");
        assert_eq!(card(&FeedItem::new(3)).feed_name, UNKNOWN_FEED);
    }

    #[test]
    fn test_rich_post_suppresses_inline_media() {
        let mut item = FeedItem::new(1);
        item.feed_id = Some(10);
        item.guid = Some("at://did:plc:a/app.bsky.feed.post/1".into());
        item.body = Some(r#"<img src="https://cdn/photo.jpg">"#.into());
        let card = card(&item);
        assert_eq!(card.rich_post_uri.as_deref(), Some("at://did:plc:a/app.bsky.feed.post/1"));
        assert_eq!(card.media, None);
        assert_eq!(card.social, None);
    }

    #[test]
    fn test_social_images_replace_primary_media() {
        let mut item = FeedItem::new(1);
        item.feed_id = Some(10);
        item.guid = Some("https://bsky.app/profile/a/post/1".into());
        item.body = Some(r#"<img src="https://cdn/photo.jpg">"#.into());
        let card = card(&item);
        assert_eq!(card.rich_post_uri, None);
        assert_eq!(card.media, None);
        assert_eq!(card.social.map(|s| s.images.len()), Some(1));
    }

    #[test]
    fn test_quote_keeps_primary_media() {
        let mut item = FeedItem::new(1);
        item.feed_id = Some(10);
        item.body = Some(
            r#"<iframe src="https://player.example/1"></iframe><blockquote>quoted</blockquote>"#
                .into(),
        );
        let card = card(&item);
        assert_eq!(card.quote().map(|q| q.text.as_str()), Some("quoted"));
        assert!(matches!(card.media, Some(MediaDescriptor::MediaLink { .. })));
    }

    #[test]
    fn test_published_and_flags() {
        let mut item = FeedItem::new(1);
        item.pub_date = Some(1_700_000_000);
        item.starred = true;
        let card = build_card(&item, &Lookups::default(), false, CardOptions::default());
        assert_eq!(card.published.map(|d| d.timestamp()), Some(1_700_000_000));
        assert!(card.starred);
        assert!(!card.unread);
    }
}
