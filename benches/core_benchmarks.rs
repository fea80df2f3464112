//! Benchmarks for salesdesk-core dashboard derivations

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use salesdesk_core::lead::LeadRecord;
use salesdesk_core::metrics::{lead_quality_score, pipeline_stages};
use salesdesk_core::utils::{format_date, format_inr, projects_label};
use salesdesk_core::{DashboardMetrics, DashboardSummary, LeadScans, Project, Role, StatusTally};
use serde_json::{Value, json};
use std::hint::black_box;

/// Admin payload with `sources` lead sources and `stages` pipeline stages
fn admin_payload(sources: usize, stages: usize) -> Value {
    let by_source: serde_json::Map<String, Value> = (0..sources)
        .map(|i| (format!("Source {i}"), json!(i * 7 + 3)))
        .collect();
    let by_stage: serde_json::Map<String, Value> = (0..stages)
        .map(|i| (format!("Stage {i}"), json!(stages - i)))
        .collect();

    json!({
        "data": {
            "leads": {
                "new_leads": 40,
                "by_source": by_source,
                "by_stage": by_stage,
                "by_classification": {"Hot": 12, "Warm": 30, "Cold": 18}
            },
            "site_visits": {"upcoming": 6, "last_period": {"COMPLETED": 9}},
            "followups": {"today": 4, "overdue": 2},
            "bookings": {"count": 3, "total_agreement_value": "12500000.50"},
            "cost_sheets": {"count_by_status": {"DRAFT": 2, "SENT": 5}},
            "kyc": {"requests_by_status": {"PENDING": 1}}
        }
    })
}

/// Benchmark payload decoding
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [4, 16, 64] {
        let payload = admin_payload(size, size);
        group.bench_with_input(BenchmarkId::new("admin_metrics", size), &payload, |b, payload| {
            b.iter(|| DashboardMetrics::from_response(black_box(payload.clone())));
        });
    }

    let sales = json!({"summary": {"my_active_leads": 120, "my_new_leads": 4}, "followups": {"today": 3}});
    group.bench_function("sales_metrics", |b| {
        b.iter(|| DashboardMetrics::from_response(black_box(sales.clone())));
    });

    group.finish();
}

/// Benchmark the full summary derivation
fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    let scans = LeadScans {
        status: StatusTally { hot: 120, warm: 300, cold: 180 },
        partners: 17,
    };

    for size in [4, 16, 64] {
        let Ok(Some(metrics)) = DashboardMetrics::from_response(admin_payload(size, size)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("summary", size), &metrics, |b, metrics| {
            b.iter(|| DashboardSummary::assemble(black_box(metrics), &Role::Manager, &scans));
        });
    }

    let Ok(Some(metrics)) = DashboardMetrics::from_response(admin_payload(8, 32)) else {
        return;
    };
    let by_stage = metrics.sections().leads.by_stage.clone();
    group.bench_function("pipeline_stages", |b| {
        b.iter(|| pipeline_stages(black_box(0), &by_stage));
    });
    group.bench_function("lead_quality_score", |b| {
        b.iter(|| lead_quality_score(black_box(&scans.status)));
    });

    group.finish();
}

/// Benchmark classifying a page of lead records
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    let statuses = ["Hot", " warm ", "COLD", "Lost", "", "Hot"];
    let sources = ["Channel Partner", "Website", "Walk-in"];
    let records: Vec<LeadRecord> = (0..1000)
        .filter_map(|i| {
            serde_json::from_value(json!({
                "status_name": statuses[i % statuses.len()],
                "source_name": sources[i % sources.len()],
                "channel_partner": i % 37,
            }))
            .ok()
        })
        .collect();

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("status_tally", |b| {
        b.iter(|| {
            let mut tally = StatusTally::default();
            for record in &records {
                if let Some(status) = record.status() {
                    tally.increment(status);
                }
            }
            tally
        });
    });
    group.bench_function("partner_keys", |b| {
        b.iter(|| {
            records
                .iter()
                .filter_map(LeadRecord::partner_key)
                .collect::<std::collections::HashSet<_>>()
                .len()
        });
    });

    group.finish();
}

/// Benchmark display formatting
fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");

    let amounts = [0.0, 999.5, 123_456.78, 12_500_000.5, 987_654_321.0];
    group.throughput(Throughput::Elements(amounts.len() as u64));
    group.bench_function("format_inr", |b| {
        b.iter(|| amounts.iter().map(|&a| format_inr(black_box(a))).collect::<Vec<_>>());
    });

    let dates = ["2024-03-05", "2024-03-05T10:30:00Z", "", "not a date"];
    group.bench_function("format_date", |b| {
        b.iter(|| dates.iter().map(|d| format_date(black_box(d))).collect::<Vec<_>>());
    });

    let projects: Vec<Project> = (0..50)
        .map(|id| Project {
            id,
            name: format!("Project {id}"),
            extra: serde_json::Map::new(),
        })
        .collect();
    let selected: Vec<i64> = (0..25).collect();
    group.bench_function("projects_label", |b| {
        b.iter(|| projects_label(black_box(&projects), black_box(&selected)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_assemble,
    bench_classification,
    bench_formatting
);

criterion_main!(benches);
