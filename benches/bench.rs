// Criterion benchmarks for Kindred Algo

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kindred_algo::core::{filters::queue_compatible, scoring::score_compatibility};
use kindred_algo::models::User;

fn create_user(id: usize) -> User {
    let communities = ["Tech", "Art", "Books", "Fitness"];
    let locations = ["NYC", "LA", "Berlin", "Tokyo"];
    let interests = [
        "music hiking cooking",
        "film music travel",
        "chess running yoga",
        "cooking travel photography",
    ];

    User {
        id: id.to_string(),
        display_name: format!("User {}", id),
        age: Some(20 + (id % 25) as i32),
        age_preference_min: Some(18),
        age_preference_max: Some(55),
        community: Some(communities[id % communities.len()].to_string()),
        location: Some(locations[id % locations.len()].to_string()),
        interests: Some(interests[id % interests.len()].to_string()),
        available_slots: 3,
        total_slots_used: 0,
        is_active: true,
        last_active_at: Utc::now(),
    }
}

fn bench_score_compatibility(c: &mut Criterion) {
    let a = create_user(1);
    let b = create_user(2);

    c.bench_function("score_compatibility", |bencher| {
        bencher.iter(|| score_compatibility(black_box(&a), black_box(&b), black_box(100)));
    });
}

fn bench_candidate_scoring(c: &mut Criterion) {
    let requester = create_user(0);

    let mut group = c.benchmark_group("candidate_scoring");

    for candidate_count in [10, 50, 100, 500].iter() {
        let candidates: Vec<User> = (1..=*candidate_count).map(create_user).collect();

        group.bench_with_input(
            BenchmarkId::new("score_pool", candidate_count),
            candidate_count,
            |bencher, _| {
                bencher.iter(|| {
                    let mut best = 0;
                    for candidate in &candidates {
                        let (score, _) =
                            score_compatibility(black_box(&requester), black_box(candidate), 100);
                        best = best.max(score);
                    }
                    black_box(best)
                });
            },
        );
    }

    group.finish();
}

fn bench_batch_scan(c: &mut Criterion) {
    // Worst case for one batch: every entry scans every later entry
    let batch: Vec<User> = (0..10).map(create_user).collect();

    c.bench_function("first_fit_batch_scan", |bencher| {
        bencher.iter(|| {
            let mut pairs = 0;
            for i in 0..batch.len() {
                for j in (i + 1)..batch.len() {
                    if queue_compatible(black_box(&batch[i]), None, black_box(&batch[j]), None) {
                        pairs += 1;
                        break;
                    }
                }
            }
            black_box(pairs)
        });
    });
}

criterion_group!(
    benches,
    bench_score_compatibility,
    bench_candidate_scoring,
    bench_batch_scan
);

criterion_main!(benches);
