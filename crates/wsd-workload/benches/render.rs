//! Criterion benchmarks for rendering the ws-daemon DaemonSet
//!
//! Measures a full render (init sequence, pod template, emission) for each
//! filesystem-isolation method, with and without tracing env.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use wsd_common::{FsShiftMethod, InstallationConfig, RenderContext, TracingConfig, VersionManifest};
use wsd_workload::{render, render_daemonset};

// =============================================================================
// Fixtures
// =============================================================================

fn versions() -> VersionManifest {
    VersionManifest::new()
        .with_component("ws-daemon", "commit-1")
        .with_component("seccomp-profile-installer", "commit-2")
        .with_component("shiftfs-module-loader", "commit-3")
}

fn make_context(method: FsShiftMethod, tracing: bool) -> RenderContext {
    let mut config = InstallationConfig {
        domain: "gitpod.example.com".to_string(),
        repository: "eu.gcr.io/gitpod-core-dev/build".to_string(),
        ..Default::default()
    };
    config.workspace.runtime.fs_shift_method = method;
    if tracing {
        config.observability.tracing = Some(TracingConfig {
            endpoint: Some("http://jaeger-collector:14268/api/traces".to_string()),
            agent_host: None,
        });
    }
    RenderContext::new(config, "gitpod", versions())
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for (label, method, tracing) in [
        ("fuse", FsShiftMethod::Fuse, false),
        ("shiftfs", FsShiftMethod::ShiftFs, false),
        ("shiftfs_traced", FsShiftMethod::ShiftFs, true),
    ] {
        let ctx = make_context(method, tracing);
        group.bench_with_input(BenchmarkId::new("typed", label), &ctx, |b, ctx| {
            b.iter(|| render_daemonset(black_box(ctx)))
        });
        group.bench_with_input(BenchmarkId::new("emitted", label), &ctx, |b, ctx| {
            b.iter(|| render(black_box(ctx)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
