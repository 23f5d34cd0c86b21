use criterion::{Criterion, black_box, criterion_group, criterion_main};
use voyager_judge::report::accuracy_from_verdicts;
use voyager_judge::{Verdict, VerdictResult};

const SITES: [&str; 5] = ["Amazon", "Apple", "ArXiv", "BBC News", "Booking"];

fn benchmark_aggregate(c: &mut Criterion) {
    let verdicts: Vec<Verdict> = (0..10_000)
        .map(|i| {
            let result = match i % 4 {
                0 | 1 => VerdictResult::Success,
                2 => VerdictResult::Failed,
                _ => VerdictResult::Unknown,
            };
            Verdict::new(format!("task-{i}"), SITES[i % SITES.len()], result, "")
        })
        .collect();

    c.bench_function("accuracy_from_verdicts_10k", |b| {
        b.iter(|| {
            let report = accuracy_from_verdicts(black_box(&verdicts));
            assert!(report.is_ok());
        })
    });
}

criterion_group!(benches, benchmark_aggregate);
criterion_main!(benches);
