#![allow(clippy::expect_used)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use dispatchkit::dispatcher::{DispatchResult, Handler, HandlerResponse, RequestContext};
use dispatchkit::router::RouteTable;
use dispatchkit::security::SecurityPolicy;
use http::Method;

async fn noop(_ctx: RequestContext) -> DispatchResult {
    Ok(HandlerResponse::no_content())
}

fn build_table(extra_routes: usize) -> RouteTable {
    let handler: Arc<dyn Handler> = Arc::new(noop);
    let mut builder = RouteTable::builder();
    for i in 0..extra_routes {
        builder
            .register(
                Method::GET,
                &format!("/resource{i}/:id/detail"),
                SecurityPolicy::PermitAll,
                Arc::clone(&handler),
            )
            .expect("register");
    }
    builder
        .register(Method::GET, "/health", SecurityPolicy::PermitAll, Arc::clone(&handler))
        .expect("register");
    builder
        .register(
            Method::GET,
            "/users/:user_id/orders/:order_id",
            SecurityPolicy::PermitAll,
            Arc::clone(&handler),
        )
        .expect("register");
    builder.build()
}

fn bench_resolve(c: &mut Criterion) {
    for size in [10usize, 100] {
        let table = build_table(size);
        let mut group = c.benchmark_group(format!("resolve_{size}_routes"));
        group.bench_function("static", |b| {
            b.iter(|| table.resolve(black_box(&Method::GET), black_box("/health")))
        });
        group.bench_function("two_params", |b| {
            b.iter(|| {
                table.resolve(
                    black_box(&Method::GET),
                    black_box("/users/123/orders/456?expand=items"),
                )
            })
        });
        group.bench_function("miss", |b| {
            b.iter(|| table.resolve(black_box(&Method::GET), black_box("/nothing/here")))
        });
        group.finish();
    }
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
