use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use travel_auth::StaticCurrentUser;
use travel_core::ItineraryId;
use travel_events::SubscriberPublisher;
use travel_infra::{ChangeTracker, CommitPipeline, InMemoryStore};
use travel_itineraries::{Stop, SuggestStopsOnStopUpdated, UpdateStop};

type Pipeline = CommitPipeline<Arc<InMemoryStore>, Arc<SubscriberPublisher>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn pipeline() -> Pipeline {
    let publisher = SubscriberPublisher::new()
        .with_subscriber(Arc::new(SuggestStopsOnStopUpdated))
        .unwrap();
    CommitPipeline::new(Arc::new(InMemoryStore::new()), Arc::new(publisher))
}

fn updated_stop(itinerary_id: ItineraryId, updates: usize) -> Stop {
    let mut stop = Stop::new(itinerary_id, "The Eiffel Tower").unwrap();
    for i in 0..updates {
        stop.handle_update(&UpdateStop {
            name: format!("Eiffel Tower #{i}"),
            image_uri: None,
            suggested: Some(false),
            occurred_at: Utc::now(),
        })
        .unwrap();
    }
    stop
}

/// Commit cost by batch size: N new stops, no events.
fn bench_commit_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_batch");
    let rt = runtime();
    let user = StaticCurrentUser::new("bench");
    let cancel = CancellationToken::new();

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("added_stops", batch_size),
            batch_size,
            |b, &size| {
                let pipeline = pipeline();
                let itinerary_id = ItineraryId::new();

                b.iter(|| {
                    let mut tracker = ChangeTracker::new();
                    for _ in 0..size {
                        tracker.add(updated_stop(itinerary_id, 0)).unwrap();
                    }
                    black_box(
                        rt.block_on(pipeline.commit(&mut tracker, &user, &cancel))
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

/// Publish-phase cost: one stop carrying N pending events.
fn bench_commit_with_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_with_events");
    let rt = runtime();
    let user = StaticCurrentUser::new("bench");
    let cancel = CancellationToken::new();

    for event_count in [1, 10, 100].iter() {
        group.throughput(Throughput::Elements(*event_count as u64));
        group.bench_with_input(
            BenchmarkId::new("stop_updates", event_count),
            event_count,
            |b, &count| {
                let pipeline = pipeline();
                let itinerary_id = ItineraryId::new();

                b.iter(|| {
                    let mut tracker = ChangeTracker::new();
                    tracker.add(updated_stop(itinerary_id, count)).unwrap();
                    black_box(
                        rt.block_on(pipeline.commit(&mut tracker, &user, &cancel))
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_commit_batch, bench_commit_with_events);
criterion_main!(benches);
