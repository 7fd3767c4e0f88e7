//! Concurrency tests for the per-list write lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ranking::{
    EntryDraft, EntryId, InMemoryStore, ListId, RankError, RankStore, RankedList, Result,
};
use server::TopMoviesService;

fn draft(title: &str) -> EntryDraft {
    EntryDraft {
        tmdb_id: Some(title.to_string()),
        title: Some(title.to_string()),
        release_date: Some("1999-03-31".to_string()),
        poster_path: None,
    }
}

fn assert_contiguous(list: &RankedList) {
    let expected: Vec<u32> = (1..=list.count() as u32).collect();
    assert_eq!(list.ranks(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_get_distinct_ranks() {
    let service = TopMoviesService::new(Arc::new(InMemoryStore::new()), Duration::from_secs(5));
    let (list, _) = service.create_list(draft("seed"), None).await.unwrap();

    let mut handles = vec![];
    for n in 0..40 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.append(list.id, draft(&format!("movie {}", n))).await
        }));
    }

    let mut ranks = vec![];
    for handle in handles {
        ranks.push(handle.await.unwrap().unwrap().rank);
    }
    ranks.sort_unstable();
    assert_eq!(ranks, (2..=41).collect::<Vec<u32>>());

    let list = service.get_list(list.id).await.unwrap();
    assert_eq!(list.count(), 41);
    assert_contiguous(&list);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_and_removes_keep_ranks_contiguous() {
    let service = TopMoviesService::new(Arc::new(InMemoryStore::new()), Duration::from_secs(5));
    let (list, first) = service.create_list(draft("0"), None).await.unwrap();
    let mut ids = vec![first.id];
    for n in 1..30 {
        ids.push(service.append(list.id, draft(&n.to_string())).await.unwrap().id);
    }

    let mut handles = vec![];
    for (i, id) in ids.iter().copied().enumerate() {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            match i % 3 {
                0 => service.move_entry(id, (i as i64 * 7) % 35 - 2).await.map(|_| ()),
                1 => service.move_up(id).await.map(|_| ()),
                _ if i % 6 == 2 => service.remove(id).await.map(|_| ()),
                _ => service.move_down(id).await.map(|_| ()),
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let list = service.get_list(list.id).await.unwrap();
    assert_eq!(list.count(), 25);
    assert_contiguous(&list);
}

/// Store whose reads can be slowed down to hold a list lock open
struct SlowStore {
    inner: InMemoryStore,
    slow: AtomicBool,
}

#[async_trait]
impl RankStore for SlowStore {
    async fn create_list(&self, title: Option<String>) -> Result<RankedList> {
        self.inner.create_list(title).await
    }

    async fn get_list(&self, id: ListId) -> Result<RankedList> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        self.inner.get_list(id).await
    }

    async fn list_for_entry(&self, entry_id: EntryId) -> Result<ListId> {
        self.inner.list_for_entry(entry_id).await
    }

    async fn allocate_entry_id(&self) -> Result<EntryId> {
        self.inner.allocate_entry_id().await
    }

    async fn commit(&self, list: RankedList) -> Result<RankedList> {
        self.inner.commit(list).await
    }

    async fn delete_list(&self, id: ListId) -> Result<RankedList> {
        self.inner.delete_list(id).await
    }

    async fn list_ids(&self) -> Result<Vec<ListId>> {
        self.inner.list_ids().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_busy_list_reports_conflict_and_other_lists_proceed() {
    let store = Arc::new(SlowStore {
        inner: InMemoryStore::new(),
        slow: AtomicBool::new(false),
    });
    let service = TopMoviesService::new(store.clone(), Duration::from_millis(20));

    let (busy, a) = service.create_list(draft("A"), None).await.unwrap();
    let b = service.append(busy.id, draft("B")).await.unwrap();
    let (other, _) = service.create_list(draft("X"), None).await.unwrap();

    store.slow.store(true, Ordering::SeqCst);

    // Holds the busy list's lock while its read is slowed down
    let holder = {
        let service = service.clone();
        tokio::spawn(async move { service.move_entry(a.id, 2).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = service.move_entry(b.id, 1).await.unwrap_err();
    assert!(matches!(err, RankError::ConcurrencyConflict { .. }));
    assert!(err.is_retryable());

    // A different list has its own lock
    let appended = service.append(other.id, draft("Y")).await.unwrap();
    assert_eq!(appended.rank, 2);

    let moved = holder.await.unwrap().unwrap();
    assert_eq!(moved.rank, 2);

    store.slow.store(false, Ordering::SeqCst);
    let list = service.get_list(busy.id).await.unwrap();
    assert_eq!(list.entries()[0].id, b.id);
    assert_contiguous(&list);
}
