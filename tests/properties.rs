//! Property tests for the invariants that must hold for any input.

use newsdeck::feed::{FeedItem, FeedState, FetchOptions, PageSizes, ViewMode};
use newsdeck::media::normalize_to_embed;
use newsdeck::read_state::{BoundedIdSet, ReadTracker, MAX_TRACKED_IDS};
use newsdeck::storage::{Database, IdListKey};
use proptest::prelude::*;
use std::collections::{HashSet, VecDeque};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn normalize_to_embed_is_total(raw in ".*") {
        if let Some(embed) = normalize_to_embed(&raw) {
            prop_assert!(url::Url::parse(&embed).is_ok(), "not a URL: {embed}");
        }
    }

    #[test]
    fn normalize_to_embed_handles_url_like_input(
        host in prop::sample::select(vec![
            "youtu.be", "www.youtube.com", "yewtu.be", "invidious.example", "www.tiktok.com", "example.com",
        ]),
        path in "[a-zA-Z0-9/_@.?=&-]{0,40}",
    ) {
        let raw = format!("https://{host}/{path}");
        if let Some(embed) = normalize_to_embed(&raw) {
            prop_assert!(url::Url::parse(&embed).is_ok(), "not a URL: {embed}");
        }
    }

    #[test]
    fn bounded_set_never_exceeds_cap_and_evicts_oldest(
        ids in prop::collection::vec(any::<i64>(), 0..1200),
    ) {
        let mut set = BoundedIdSet::default();
        let mut model: VecDeque<i64> = VecDeque::new();
        for id in ids {
            set.insert(id);
            if !model.contains(&id) {
                model.push_back(id);
                if model.len() > MAX_TRACKED_IDS {
                    model.pop_front();
                }
            }
            prop_assert!(set.len() <= MAX_TRACKED_IDS);
        }
        prop_assert_eq!(set.to_vec(), Vec::from(model));
    }

    #[test]
    fn append_has_more_tracks_full_pages(per_page in 1usize..20, returned in 0usize..25) {
        let mut state = FeedState::new(PageSizes { initial_batch: 5, per_page });
        state.set_view_mode(ViewMode::All);

        let request = state.begin_fetch(FetchOptions::append()).unwrap();
        let page: Vec<FeedItem> = (0..returned as i64).map(FeedItem::new).collect();
        state.apply_page(&request, page);

        prop_assert_eq!(state.cursor().has_more, returned > 0 && returned == per_page);
        prop_assert_eq!(state.items().len(), returned);
        prop_assert!(!state.is_loading());
    }

    #[test]
    fn overlay_always_wins(id in any::<i64>(), remote_unread in any::<bool>()) {
        let tracker = ReadTracker::in_memory();
        block_on(tracker.record_read(id));
        let mut item = FeedItem::new(id);
        item.unread = remote_unread;
        prop_assert!(!tracker.is_unread(&item));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn persisted_ids_round_trip(ids in prop::collection::hash_set(any::<i64>(), 0..MAX_TRACKED_IDS)) {
        let restored: HashSet<i64> = block_on(async {
            let db = Database::open(":memory:").await.unwrap();
            let list: Vec<i64> = ids.iter().copied().collect();
            db.save_id_list(IdListKey::ReadItems, &list).await.unwrap();
            ReadTracker::load(db).await.read_ids().into_iter().collect()
        });
        prop_assert_eq!(restored, ids);
    }
}
