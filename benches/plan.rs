use criterion::*;
use sticky_assignor::balance::{BalanceStrategy, BalanceStrategyPlan, Members, StrategyKind, Topics};
use sticky_assignor::protocol::messages::ConsumerGroupMemberMetadata;

const MEMBERS: usize = 30;
const TOPICS: usize = 10;
const PARTITIONS: i32 = 24;

fn topics() -> Topics {
    (0..TOPICS)
        .map(|topic| (format!("topic-{topic}"), (0..PARTITIONS).collect()))
        .collect()
}

/// Every member subscribes to every other topic, offset by its index, and
/// rejoins with what `previous` gave it.
fn members(
    count: usize,
    strategy: &dyn BalanceStrategy,
    previous: &BalanceStrategyPlan,
) -> Members {
    (0..count)
        .map(|member| {
            let member_id = format!("member-{member:03}");
            let subscribed = (0..TOPICS)
                .filter(|topic| (topic + member) % 2 == 0 || *topic == 0)
                .map(|topic| format!("topic-{topic}"));
            let user_data = previous
                .get(&member_id)
                .map(|owned| strategy.assignment_data(&member_id, owned, 1).unwrap())
                .unwrap_or_default();

            (
                member_id,
                ConsumerGroupMemberMetadata::new(subscribed, user_data),
            )
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let topics = topics();
    let empty = BalanceStrategyPlan::default();

    let mut group = c.benchmark_group("plan");
    for kind in [StrategyKind::Range, StrategyKind::RoundRobin, StrategyKind::Sticky] {
        let strategy = kind.strategy();
        let fresh = members(MEMBERS, strategy.as_ref(), &empty);
        group.bench_function(BenchmarkId::new("fresh", kind), |b| {
            b.iter(|| strategy.plan(black_box(&fresh), black_box(&topics)).unwrap())
        });
    }

    // a member leaves a group that already has a sticky assignment
    let strategy = StrategyKind::Sticky.strategy();
    let previous = strategy
        .plan(&members(MEMBERS, strategy.as_ref(), &empty), &topics)
        .unwrap();
    let rejoined = members(MEMBERS - 1, strategy.as_ref(), &previous);
    group.bench_function("sticky/member_left", |b| {
        b.iter(|| strategy.plan(black_box(&rejoined), black_box(&topics)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
