//! Benchmarks for rank shifting
//!
//! Run with: cargo bench --package ranking
//!
//! Measures the worst-case shifts on a full 100-entry list.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ranking::{EntryId, EntryPayload, MAX_RANK, RankedList};

fn full_list() -> RankedList {
    let mut list = RankedList::new(1, None);
    for id in 1..=MAX_RANK as EntryId {
        list.append(
            id,
            EntryPayload {
                tmdb_id: id.to_string(),
                title: format!("Movie {}", id),
                release_date: NaiveDate::from_ymd_opt(1999, 3, 31).unwrap(),
                poster_path: String::new(),
            },
        );
    }
    list
}

fn bench_move_last_to_first(c: &mut Criterion) {
    let list = full_list();

    c.bench_function("move_last_to_first", |b| {
        b.iter(|| {
            let mut list = list.clone();
            list.move_entry(black_box(MAX_RANK as EntryId), black_box(1)).unwrap();
            black_box(list)
        })
    });
}

fn bench_remove_first(c: &mut Criterion) {
    let list = full_list();

    c.bench_function("remove_first", |b| {
        b.iter(|| {
            let mut list = list.clone();
            list.remove(black_box(1)).unwrap();
            black_box(list)
        })
    });
}

fn bench_validate(c: &mut Criterion) {
    let list = full_list();

    c.bench_function("validate_full_list", |b| {
        b.iter(|| black_box(&list).validate().unwrap())
    });
}

criterion_group!(
    benches,
    bench_move_last_to_first,
    bench_remove_first,
    bench_validate
);
criterion_main!(benches);
