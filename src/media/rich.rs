use crate::remote::{EmbedView, ExternalView, ImageView, PostView, RecordTarget};
use crate::util::display_hostname;

const FALLBACK_AUTHOR: &str = "Bluesky user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichImage {
    /// Where a click goes: the full-size image.
    pub href: String,
    /// What is shown: the thumbnail.
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteCard {
    pub author_name: String,
    /// `@handle`, when known.
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub text: Option<String>,
    pub permalink: Option<String>,
    pub embeds: Vec<RichPart>,
}

/// One renderable block of a hydrated post embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichPart {
    LinkCard {
        uri: String,
        title: Option<String>,
        description: Option<String>,
        thumb: Option<String>,
        host: String,
    },
    Images(Vec<RichImage>),
    Quote(QuoteCard),
    Video {
        playlist: String,
        thumbnail: Option<String>,
    },
}

/// Parts for a hydrated post; empty when it has no (supported) embed.
pub fn project_post(post: &PostView) -> Vec<RichPart> {
    post.embed.as_ref().map(project_embed).unwrap_or_default()
}

pub fn project_embed(embed: &EmbedView) -> Vec<RichPart> {
    match embed {
        EmbedView::External { external } => link_card(external).into_iter().collect(),
        EmbedView::Images { images } => image_grid(images).into_iter().collect(),
        EmbedView::Record { record } => vec![RichPart::Quote(quote_card(record))],
        EmbedView::RecordWithMedia { media, record } => {
            let mut parts = project_embed(media);
            parts.push(RichPart::Quote(quote_card(record)));
            parts
        }
        EmbedView::Video {
            playlist,
            thumbnail,
        } => playlist
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|playlist| RichPart::Video {
                playlist: playlist.to_string(),
                thumbnail: thumbnail.clone(),
            })
            .into_iter()
            .collect(),
        EmbedView::Unsupported => Vec::new(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn link_card(external: &ExternalView) -> Option<RichPart> {
    let uri = external.link()?;
    Some(RichPart::LinkCard {
        uri: uri.to_string(),
        title: non_empty(&external.title),
        description: non_empty(&external.description),
        thumb: non_empty(&external.thumb),
        host: display_hostname(uri),
    })
}

fn image_grid(images: &[ImageView]) -> Option<RichPart> {
    if images.is_empty() {
        return None;
    }
    let images = images
        .iter()
        .map(|image| {
            let thumb = non_empty(&image.thumb);
            let fullsize = non_empty(&image.fullsize);
            RichImage {
                href: fullsize.clone().or_else(|| thumb.clone()).unwrap_or_default(),
                src: thumb.or(fullsize).unwrap_or_default(),
                alt: image.alt.clone().unwrap_or_default(),
            }
        })
        .collect();
    Some(RichPart::Images(images))
}

fn quote_card(record: &RecordTarget) -> QuoteCard {
    let author = record.author.as_ref();
    let handle = author.and_then(|a| non_empty(&a.handle));
    let author_name = author
        .and_then(|a| non_empty(&a.display_name))
        .or_else(|| handle.clone())
        .unwrap_or_else(|| FALLBACK_AUTHOR.to_string());

    QuoteCard {
        author_name,
        handle: handle.as_ref().map(|h| format!("@{h}")),
        avatar: author.and_then(|a| non_empty(&a.avatar)),
        text: record.value.as_ref().and_then(|v| non_empty(&v.text)),
        permalink: record
            .uri
            .as_deref()
            .and_then(|uri| permalink(uri, handle.as_deref())),
        embeds: record.embeds.iter().flat_map(project_embed).collect(),
    }
}

/// Web URL for an `at://{did}/app.bsky.feed.post/{rkey}` record.
///
/// Uses the handle when known, otherwise the DID from the URI.
///
/// ```
/// use newsdeck::media::permalink;
///
/// assert_eq!(
///     permalink("at://did:plc:abc/app.bsky.feed.post/3k", Some("me.bsky.social")).as_deref(),
///     Some("https://bsky.app/profile/me.bsky.social/post/3k")
/// );
/// ```
pub fn permalink(uri: &str, handle: Option<&str>) -> Option<String> {
    if uri.is_empty() {
        return None;
    }
    let segments: Vec<&str> = uri.split('/').collect();
    let post_id = segments.last().copied().unwrap_or_default();
    let profile = match handle.filter(|h| !h.is_empty()) {
        Some(handle) => handle,
        None => segments.get(2).copied().unwrap_or_default(),
    };
    Some(format!("https://bsky.app/profile/{profile}/post/{post_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn post(embed: serde_json::Value) -> PostView {
        serde_json::from_value(json!({"uri": "at://did:plc:me/app.bsky.feed.post/1", "embed": embed}))
            .unwrap()
    }

    #[test]
    fn test_link_card_strips_www() {
        let parts = project_post(&post(json!({
            "$type": "app.bsky.embed.external#view",
            "external": {"uri": "https://www.example.com/story", "title": "Story", "description": ""}
        })));
        assert_eq!(
            parts,
            vec![RichPart::LinkCard {
                uri: "https://www.example.com/story".into(),
                title: Some("Story".into()),
                description: None,
                thumb: None,
                host: "example.com".into(),
            }]
        );
    }

    #[test]
    fn test_images_fall_back_between_sizes() {
        let parts = project_post(&post(json!({
            "$type": "app.bsky.embed.images#view",
            "images": [{"thumb": "t.jpg", "alt": "cat"}, {"fullsize": "f.jpg"}]
        })));
        assert_eq!(
            parts,
            vec![RichPart::Images(vec![
                RichImage { href: "t.jpg".into(), src: "t.jpg".into(), alt: "cat".into() },
                RichImage { href: "f.jpg".into(), src: "f.jpg".into(), alt: String::new() },
            ])]
        );
    }

    #[test]
    fn test_record_with_media_orders_media_first() {
        let parts = project_post(&post(json!({
            "$type": "app.bsky.embed.recordWithMedia#view",
            "media": {"$type": "app.bsky.embed.video#view", "playlist": "https://v/p.m3u8"},
            "record": {"record": {
                "uri": "at://did:plc:q/app.bsky.feed.post/9",
                "value": {"text": "hello"},
                "embeds": [{"$type": "app.bsky.embed.images#view", "images": [{"thumb": "n.jpg"}]}]
            }}
        })));
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], RichPart::Video { playlist, thumbnail: None } if playlist == "https://v/p.m3u8"));
        let RichPart::Quote(card) = &parts[1] else {
            panic!("expected quote");
        };
        assert_eq!(card.author_name, FALLBACK_AUTHOR);
        assert_eq!(card.handle, None);
        assert_eq!(card.text.as_deref(), Some("hello"));
        assert_eq!(
            card.permalink.as_deref(),
            Some("https://bsky.app/profile/did:plc:q/post/9")
        );
        assert_eq!(card.embeds.len(), 1);
    }

    #[test]
    fn test_quote_author_and_handle() {
        let parts = project_post(&post(json!({
            "$type": "app.bsky.embed.record#view",
            "record": {
                "uri": "at://did:plc:q/app.bsky.feed.post/9",
                "author": {"handle": "q.bsky.social", "avatar": "a.jpg"}
            }
        })));
        let RichPart::Quote(card) = &parts[0] else {
            panic!("expected quote");
        };
        assert_eq!(card.author_name, "q.bsky.social");
        assert_eq!(card.handle.as_deref(), Some("@q.bsky.social"));
        assert_eq!(
            card.permalink.as_deref(),
            Some("https://bsky.app/profile/q.bsky.social/post/9")
        );
    }

    #[test]
    fn test_unsupported_and_empty_embeds() {
        assert!(project_post(&post(json!({"$type": "app.bsky.embed.other#view"}))).is_empty());
        assert!(project_post(&post(json!({"$type": "app.bsky.embed.images#view", "images": []}))).is_empty());
        assert!(project_post(&post(json!({"$type": "app.bsky.embed.video#view"}))).is_empty());
        assert_eq!(permalink("", None), None);
    }
}
