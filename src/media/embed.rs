use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Self-hosted YouTube frontends that accept `/embed/{id}`.
const INVIDIOUS_HOSTS: &[&str] = &["inv.nadeko.net", "yewtu.be", "invidious.f5.si"];

/// Playback speed forced on frontends and short-form players that honour it.
pub const PLAYBACK_SPEED: &str = "1.75";

static TIKTOK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]+$").unwrap_or_else(|e| panic!("{e}")));
static TIKTOK_CDN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tiktokcdn\.com|p\d+-sign").unwrap_or_else(|e| panic!("{e}")));
static EMBED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/embed/([^?]+)").unwrap_or_else(|e| panic!("{e}")));

pub fn is_invidious_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    INVIDIOUS_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
        || host.contains("invidious")
}

/// Whether `url` points at TikTok's image/video CDN.
pub fn is_tiktok_cdn(url: &str) -> bool {
    TIKTOK_CDN.is_match(url)
}

/// Maps a video page URL to a directly embeddable player URL.
///
/// Handles `youtu.be` short links, `youtube.com` watch/shorts/embed pages,
/// Invidious frontends and TikTok video pages. HTML entities are decoded
/// first, since candidates are often lifted from raw markup. Anything
/// unrecognised or unparseable yields `None`.
///
/// # Examples
///
/// ```
/// use newsdeck::media::normalize_to_embed;
///
/// assert_eq!(
///     normalize_to_embed("https://youtu.be/abc123").as_deref(),
///     Some("https://www.youtube.com/embed/abc123")
/// );
/// assert_eq!(normalize_to_embed("not a url"), None);
/// ```
pub fn normalize_to_embed(raw: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim());
    let decoded = decoded.trim();
    if decoded.is_empty() {
        return None;
    }

    let parsed = Url::parse(decoded).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        let id = path_segments(&parsed).next()?;
        return Some(format!("https://www.youtube.com/embed/{id}"));
    }

    if host.ends_with("youtube.com") {
        if parsed.path().starts_with("/embed/") {
            return Some(origin_path_query(&parsed));
        }
        let id = youtube_video_id(&parsed)?;
        return Some(format!("https://www.youtube.com/embed/{id}"));
    }

    if is_invidious_host(&host) {
        let embed = if parsed.path().starts_with("/embed/") {
            origin_path_query(&parsed)
        } else {
            let id = youtube_video_id(&parsed)?;
            format!("{}/embed/{id}", parsed.origin().ascii_serialization())
        };
        return Some(with_playback_speed(&embed));
    }

    if host.ends_with("tiktok.com") {
        let id = tiktok_video_id(parsed.path())?;
        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !pairs.iter().any(|(k, _)| k == "loop") {
            pairs.push(("loop".into(), "1".into()));
        }
        if !pairs.iter().any(|(k, _)| k == "controls") {
            pairs.push(("controls".into(), "1".into()));
        }
        set_pair(&mut pairs, "speed", PLAYBACK_SPEED);

        let mut embed = Url::parse(&format!("https://www.tiktok.com/embed/{id}")).ok()?;
        embed.query_pairs_mut().clear().extend_pairs(&pairs);
        return Some(embed.to_string());
    }

    None
}

/// Force the playback-speed parameter on Invidious URLs; other URLs (and
/// anything unparseable) come back unchanged.
pub fn with_playback_speed(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.host_str().is_some_and(is_invidious_host) {
        return url.to_string();
    }

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    set_pair(&mut pairs, "speed", PLAYBACK_SPEED);
    parsed.query_pairs_mut().clear().extend_pairs(&pairs);
    parsed.to_string()
}

/// YouTube poster frame for an `/embed/{id}` URL.
pub fn youtube_thumbnail(embed_url: &str) -> Option<String> {
    let id = EMBED_ID.captures(embed_url)?.get(1)?.as_str();
    Some(format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"))
}

/// Video id from a TikTok page path: the segment after `/video/`, or a
/// trailing identifier-looking segment.
pub(crate) fn tiktok_video_id(path: &str) -> Option<&str> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(pos) = parts.iter().position(|s| *s == "video") {
        if let Some(id) = parts.get(pos + 1) {
            return Some(id);
        }
    }
    parts.last().copied().filter(|s| TIKTOK_ID.is_match(s))
}

fn youtube_video_id(url: &Url) -> Option<String> {
    let from_query = url
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty());
    from_query.or_else(|| {
        if !url.path().starts_with("/shorts/") {
            return None;
        }
        path_segments(url).nth(1).map(str::to_string)
    })
}

fn path_segments(url: &Url) -> impl Iterator<Item = &str> {
    url.path().split('/').filter(|s| !s.is_empty())
}

fn origin_path_query(url: &Url) -> String {
    let mut out = format!("{}{}", url.origin().ascii_serialization(), url.path());
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Replace the first `key` pair in place and drop later duplicates, or
/// append it when absent.
fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    let mut seen = false;
    pairs.retain_mut(|(k, v)| {
        if k != key {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        *v = value.to_string();
        true
    });
    if !seen {
        pairs.push((key.to_string(), value.to_string()));
    }
}
