//! Session-scoped cache of page-id lists and item details.
//!
//! Lists hold ids only; entities live once in the detail map, keyed by
//! `ItemKey`. The handle is cheap to clone and every clone sees the same state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use kinetic_types::models::FeedItem;
use kinetic_types::pagination::{Cursor, FeedScope, ItemKey, ItemKind};

/// How a page was fetched. Forward slots and backward pages share one
/// vector but never match each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParam {
    Forward(Cursor),
    Backward(Cursor),
}

/// Loaded pages of one collection, newest page first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedList {
    pub pages: Vec<Vec<i64>>,
    /// Param each page was fetched with, parallel to `pages`.
    pub page_params: Vec<PageParam>,
    /// Where the next forward fetch starts; `None` once exhausted.
    pub next_cursor: Option<Cursor>,
}

impl PagedList {
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.pages.iter().flatten().copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids().any(|i| i == id)
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot of the forward page fetched with `cursor`.
    pub fn forward_slot(&self, cursor: Cursor) -> Option<usize> {
        self.page_params
            .iter()
            .position(|p| *p == PageParam::Forward(cursor))
    }

    /// Cursor of the oldest forward page loaded so far.
    pub fn last_forward_cursor(&self) -> Option<Cursor> {
        self.page_params.iter().rev().find_map(|p| match p {
            PageParam::Forward(cursor) => Some(*cursor),
            PageParam::Backward(_) => None,
        })
    }

    /// Highest server-issued id. Synthetic (negative) ids are skipped.
    pub fn newest_server_id(&self) -> Option<i64> {
        self.ids().filter(|&id| id > 0).max()
    }

    fn replace_id(&mut self, from: i64, to: i64) -> bool {
        let already_present = self.contains(to);
        let mut touched = false;
        for page in &mut self.pages {
            if already_present {
                let before = page.len();
                page.retain(|&id| id != from);
                touched |= page.len() != before;
            } else if let Some(slot) = page.iter_mut().find(|id| **id == from) {
                *slot = to;
                touched = true;
            }
        }
        touched
    }

    fn remove_id(&mut self, id: i64) -> bool {
        let mut touched = false;
        for page in &mut self.pages {
            let before = page.len();
            page.retain(|&i| i != id);
            touched |= page.len() != before;
        }
        touched
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    pub lists: HashMap<FeedScope, PagedList>,
    pub details: HashMap<ItemKey, FeedItem>,
}

impl CacheState {
    /// Put `id` at the head of the first page of `scope`. Lists that were
    /// never loaded are left alone.
    pub(crate) fn insert_head(&mut self, scope: FeedScope, id: i64) -> bool {
        match self.lists.get_mut(&scope).and_then(|l| l.pages.first_mut()) {
            Some(first) => {
                first.insert(0, id);
                true
            }
            None => false,
        }
    }

    /// Swap `from` for `to` in place in every list of that item kind, and
    /// move the detail entry.
    pub(crate) fn replace_id(&mut self, kind: ItemKind, from: i64, to: i64, item: FeedItem) {
        for (scope, list) in self.lists.iter_mut() {
            if scope.item_kind() == kind {
                list.replace_id(from, to);
            }
        }
        // A cleared cache (logout) must stay empty.
        if self.details.remove(&ItemKey { kind, id: from }).is_some() {
            self.details.insert(ItemKey { kind, id: to }, item);
        }
    }

    /// Drop every trace of an item.
    pub(crate) fn remove_item(&mut self, key: ItemKey) {
        for (scope, list) in self.lists.iter_mut() {
            if scope.item_kind() == key.kind {
                list.remove_id(key.id);
            }
        }
        self.details.remove(&key);
    }

    pub(crate) fn store(&mut self, items: impl IntoIterator<Item = FeedItem>) {
        for item in items {
            self.details.insert(item.key(), item);
        }
    }
}

#[derive(Clone, Default)]
pub struct FeedCache {
    inner: Arc<Mutex<CacheState>>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of the whole cache, for comparisons and rendering.
    pub fn snapshot(&self) -> CacheState {
        self.read(|state| state.clone())
    }

    pub fn clear(&self) {
        self.update(|state| {
            state.lists.clear();
            state.details.clear();
        });
    }

    pub fn list(&self, scope: &FeedScope) -> Option<PagedList> {
        self.read(|state| state.lists.get(scope).cloned())
    }

    pub fn item(&self, key: ItemKey) -> Option<FeedItem> {
        self.read(|state| state.details.get(&key).cloned())
    }

    /// Entities of a list in display order. Ids without a detail entry are skipped.
    pub fn items(&self, scope: &FeedScope) -> Vec<FeedItem> {
        self.read(|state| {
            let Some(list) = state.lists.get(scope) else {
                return Vec::new();
            };
            let kind = scope.item_kind();
            list.ids()
                .filter_map(|id| state.details.get(&ItemKey { kind, id }).cloned())
                .collect()
        })
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&CacheState) -> R) -> R {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply `f` atomically. Never hold the lock across an await.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut CacheState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::post;

    fn loaded(cache: &FeedCache, pages: Vec<Vec<i64>>) {
        cache.update(|state| {
            let page_params = (0..pages.len()).map(|_| PageParam::Forward(Cursor::START)).collect();
            for id in pages.iter().flatten() {
                state.details.insert(ItemKey::post(*id), FeedItem::Post(post(*id)));
            }
            state.lists.insert(FeedScope::Global, PagedList { pages, page_params, next_cursor: None });
        });
    }

    #[test]
    fn replace_keeps_position() {
        let cache = FeedCache::new();
        loaded(&cache, vec![vec![-1, 10, 9], vec![8]]);

        cache.update(|s| s.replace_id(ItemKind::Post, -1, 11, FeedItem::Post(post(11))));
        let list = cache.list(&FeedScope::Global).unwrap();
        assert_eq!(list.pages, vec![vec![11, 10, 9], vec![8]]);
        assert!(cache.item(ItemKey::post(-1)).is_none());
        assert!(cache.item(ItemKey::post(11)).is_some());
    }

    #[test]
    fn replace_drops_synthetic_when_real_id_already_listed() {
        let cache = FeedCache::new();
        loaded(&cache, vec![vec![11, -1, 10]]);

        cache.update(|s| s.replace_id(ItemKind::Post, -1, 11, FeedItem::Post(post(11))));
        assert_eq!(cache.list(&FeedScope::Global).unwrap().pages, vec![vec![11, 10]]);
    }

    #[test]
    fn other_kinds_are_untouched() {
        let cache = FeedCache::new();
        loaded(&cache, vec![vec![3, 2]]);
        cache.update(|s| {
            s.lists.insert(
                FeedScope::Comments(2),
                PagedList { pages: vec![vec![3]], page_params: vec![PageParam::Forward(Cursor::START)], next_cursor: None },
            );
            s.remove_item(ItemKey::comment(3));
        });

        assert_eq!(cache.list(&FeedScope::Global).unwrap().pages, vec![vec![3, 2]]);
        assert!(cache.list(&FeedScope::Comments(2)).unwrap().is_empty());
    }

    #[test]
    fn insert_head_skips_unloaded_lists() {
        let cache = FeedCache::new();
        assert!(!cache.update(|s| s.insert_head(FeedScope::Global, -1)));
        assert!(cache.list(&FeedScope::Global).is_none());
    }

    #[test]
    fn newest_server_id_ignores_synthetic_entries() {
        let list = PagedList {
            pages: vec![vec![-2, -1, 7, 6]],
            page_params: vec![PageParam::Forward(Cursor::START)],
            next_cursor: None,
        };
        assert_eq!(list.newest_server_id(), Some(7));
        assert_eq!(PagedList::default().newest_server_id(), None);
    }

    #[test]
    fn clear_empties_every_clone() {
        let cache = FeedCache::new();
        loaded(&cache, vec![vec![1]]);
        let other = cache.clone();
        other.clear();
        assert_eq!(cache.snapshot(), CacheState::default());
    }
}
