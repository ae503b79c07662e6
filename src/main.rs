use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use newsdeck::card::FeedCard;
use newsdeck::config::Config;
use newsdeck::feed::{FetchOptions, PageOutcome, ViewMode};
use newsdeck::media::{MediaDescriptor, RichPart};
use newsdeck::read_state::{ReadTracker, StarOutcome};
use newsdeck::remote::{build_http_client, NewsClient, PostLookup};
use newsdeck::session::Session;
use newsdeck::storage::{Database, DatabaseError};
use newsdeck::util::{display_width, strip_control_chars, truncate_to_width};

const FALLBACK_WIDTH: usize = 100;

/// Get the config directory path (~/.config/newsdeck/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsdeck"))
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(dir, perms) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "newsdeck",
    about = "Nextcloud News deck with a local read overlay and media extraction"
)]
struct Args {
    /// Which items to list: unread or all
    #[arg(long, default_value = "unread")]
    view: ViewMode,

    /// Only show items from this folder
    #[arg(long, value_name = "ID", conflicts_with = "starred")]
    folder: Option<i64>,

    /// Only show starred items (always includes read ones)
    #[arg(long)]
    starred: bool,

    /// Number of pages to load in the `all` view
    #[arg(long, default_value_t = 1, value_name = "N")]
    pages: usize,

    /// Mark an item read (repeatable)
    #[arg(long = "mark-read", value_name = "ID")]
    mark_read: Vec<i64>,

    /// Star an item (repeatable)
    #[arg(long, value_name = "ID")]
    star: Vec<i64>,

    /// Unstar an item (repeatable)
    #[arg(long, value_name = "ID")]
    unstar: Vec<i64>,

    /// Retry every queued read mark and exit
    #[arg(long)]
    flush: bool,

    /// Use this config file instead of ~/.config/newsdeck/config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_private_dir(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config_dir.join("newsdeck.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of newsdeck appears to be running. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let session = build_session(&config, db).await?;
    if !session.is_configured() {
        eprintln!(
            "No remote configured. Set server_url and username in {} to load items.",
            config_path.display()
        );
    }

    if args.flush {
        let report = session.process_queue().await;
        println!(
            "Sync queue: {} synced, {} failed, {} skipped, {} still queued",
            report.synced,
            report.failed,
            report.skipped,
            session.tracker().queued_ids().len()
        );
        return Ok(());
    }

    load_items(&session, &args).await;

    for &id in &args.mark_read {
        match session.mark_read(id).await {
            Some(result) => println!("Marked {id} read ({result:?})"),
            None => println!("Marked {id} read locally"),
        }
    }
    for (ids, starred) in [(&args.star, true), (&args.unstar, false)] {
        for &id in ids {
            match session.toggle_star(id, starred).await {
                StarOutcome::Applied => println!("{} {id}", if starred { "Starred" } else { "Unstarred" }),
                outcome => eprintln!("Star change for {id} not applied: {outcome:?}"),
            }
        }
    }

    let hydrated = session.hydrate_rich_embeds().await;
    tracing::debug!(hydrated, "Hydrated rich posts");

    print_cards(&session);

    if let Some(report) = session.settle_queue().await {
        tracing::debug!(?report, "Background read sync finished");
    }
    Ok(())
}

async fn build_session(config: &Config, db: Database) -> Result<Session> {
    let tracker = ReadTracker::load(db).await;
    let mut session =
        Session::new(config.page_sizes(), tracker).with_card_options(config.card_options());

    let http = build_http_client().context("Failed to create HTTP client")?;
    match PostLookup::new(http.clone(), &config.rich_embed_api_url) {
        Ok(posts) => session = session.with_post_lookup(posts),
        Err(e) => tracing::warn!(error = %e, "Rich embeds disabled"),
    }

    if config.is_remote_configured() {
        let client = NewsClient::new(
            http,
            config.server_url.as_deref().unwrap_or_default(),
            config.username.as_deref().unwrap_or_default(),
            config.resolve_password(),
        )
        .context("Invalid server_url in config")?;
        session = session.with_client(client);
        session.load_lookups().await;
    }
    Ok(session)
}

async fn load_items(session: &Session, args: &Args) {
    let first = if args.starred {
        match session.select_starred().await {
            Some(outcome) => outcome,
            None => session.fetch_page(FetchOptions::replace()).await,
        }
    } else {
        session.set_selection(args.folder, args.view);
        session.fetch_page(FetchOptions::replace()).await
    };
    report_page(session.feed().items().len(), first);

    for _ in 1..args.pages {
        match session.load_more().await {
            Some(outcome @ PageOutcome::Appended { .. }) => {
                tracing::debug!(?outcome, "Loaded next page");
            }
            Some(outcome) => {
                tracing::debug!(?outcome, "Stopped paging");
                break;
            }
            None => break,
        }
    }
}

fn report_page(count: usize, outcome: PageOutcome) {
    match outcome {
        PageOutcome::Failed => eprintln!("Failed to load items; see RUST_LOG=newsdeck=debug"),
        _ => tracing::debug!(count, "Items loaded"),
    }
}

fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .filter(|&w: &usize| w >= 20)
        .unwrap_or(FALLBACK_WIDTH)
}

fn print_cards(session: &Session) {
    let cards = session.cards();
    if cards.is_empty() {
        println!("No items.");
        return;
    }
    let width = terminal_width();
    for card in &cards {
        print_card(session, card, width);
    }
    let (view_mode, cursor) = {
        let feed = session.feed();
        (feed.view_mode(), feed.cursor())
    };
    if view_mode == ViewMode::All && cursor.has_more {
        println!("More items available (use --pages to load them).");
    }
}

fn clean(text: &str, width: usize) -> String {
    truncate_to_width(&strip_control_chars(text), width).into_owned()
}

fn print_card(session: &Session, card: &FeedCard, width: usize) {
    let marker = match (card.unread, card.starred) {
        (_, true) => '*',
        (true, false) => '•',
        (false, false) => ' ',
    };
    let prefix = format!("{marker} [{}] ", card.id);
    let title = card.title.as_deref().unwrap_or("(untitled)");
    let room = width.saturating_sub(display_width(&prefix));
    println!("{prefix}{}", clean(title, room));

    let mut source = card.feed_name.clone();
    if let Some(folder) = &card.folder_name {
        source = format!("{folder} / {source}");
    }
    if let Some(published) = card.published {
        source = format!("{source} · {}", published.format("%Y-%m-%d %H:%M"));
    }
    println!("    {}", clean(&source, width.saturating_sub(4)));

    if let Some(excerpt) = &card.excerpt {
        println!("    {}", clean(excerpt, width.saturating_sub(4)));
    }
    if let Some(media) = &card.media {
        println!("    {}", clean(&describe_media(media), width.saturating_sub(4)));
    }
    if let Some(social) = &card.social {
        for image in &social.images {
            println!("    [image] {}", clean(&image.src, width.saturating_sub(12)));
        }
        for video in &social.videos {
            println!("    [video] {}", clean(&video.src, width.saturating_sub(12)));
        }
    }
    if let Some(quote) = card.quote() {
        println!("    > {}", clean(&quote.text.replace('\n', " "), width.saturating_sub(6)));
    }
    if let Some(parts) = card.rich_post_uri.as_deref().and_then(|uri| session.rich_embed(uri)) {
        for part in &parts {
            println!("    {}", clean(&describe_rich(part), width.saturating_sub(4)));
        }
    }
    if !card.metrics.is_empty() {
        let line = card
            .metrics
            .iter()
            .map(|m| format!("{} {}", m.kind.icon(), m.value))
            .collect::<Vec<_>>()
            .join("  ");
        println!("    {line}");
    }
    if let Some(url) = &card.url {
        println!("    {}", clean(url, width.saturating_sub(4)));
    }
}

fn describe_media(media: &MediaDescriptor) -> String {
    match media {
        MediaDescriptor::NativeVideo { src, mime, .. } => format!("[video {mime}] {src}"),
        MediaDescriptor::EmbeddedVideo { embed_url, .. } => format!("[embed] {embed_url}"),
        MediaDescriptor::ImageLink { href, .. } => format!("[clip] {href}"),
        MediaDescriptor::Image { src, .. } => format!("[image] {src}"),
        MediaDescriptor::MediaLink { href } => format!("[media] {href}"),
    }
}

fn describe_rich(part: &RichPart) -> String {
    match part {
        RichPart::LinkCard { title, host, .. } => {
            format!("[link] {} ({host})", title.as_deref().unwrap_or(host))
        }
        RichPart::Images(images) => format!("[{} image(s)]", images.len()),
        RichPart::Quote(quote) => format!(
            "[quote] {}: {}",
            quote.author_name,
            quote.text.as_deref().unwrap_or_default().replace('\n', " ")
        ),
        RichPart::Video { playlist, .. } => format!("[video] {playlist}"),
    }
}
