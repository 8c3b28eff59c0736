//! 구성 렌더링 벤치마크
//!
//! 문서 렌더링, 검증, 표현식 파싱의 처리량을 측정합니다.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tfacc_hcl::body::{Block, Document, Expr};
use tfacc_hcl::parser::parse_expression;
use tfacc_hcl::{render, validate};

const FLAVOR_EXPR: &str =
    "local.flavor.properties[0].min_broker * local.flavor.properties[0].min_storage_per_node";

const VERSION_EXPR: &str =
    "element(local.query_results.versions, length(local.query_results.versions)-1)";

/// 리소스 `n`개를 가진 문서를 만듭니다.
fn document(n: usize) -> Document {
    let mut doc = Document::new();
    let _ = doc.push(Block::data("flexibleengine_availability_zones", "test"));
    for i in 0..n {
        let _ = doc.push(
            Block::resource("flexibleengine_vpc_v1", format!("vpc_{i}"))
                .attr("name", format!("tf-test-vpc-{i}"))
                .attr("cidr", "192.168.0.0/16")
                .gap()
                .attr(
                    "availability_zones",
                    Expr::List(vec![Expr::raw(
                        "data.flexibleengine_availability_zones.test.names[0]",
                    )]),
                )
                .attr("tags", Expr::str_map([("key", "value"), ("owner", "terraform")])),
        );
    }
    doc
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for n in [1usize, 10, 100] {
        let doc = document(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("blocks", n), &doc, |b, doc| {
            b.iter(|| render(black_box(doc)))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for n in [1usize, 10, 100] {
        let doc = document(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("blocks", n), &doc, |b, doc| {
            b.iter(|| validate(black_box(doc)).unwrap())
        });
    }

    group.finish();
}

fn bench_parse_expression(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_expression");
    group.throughput(Throughput::Elements(1));

    group.bench_function("arithmetic", |b| {
        b.iter(|| parse_expression(black_box(FLAVOR_EXPR)).unwrap())
    });

    group.bench_function("nested_call", |b| {
        b.iter(|| parse_expression(black_box(VERSION_EXPR)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_render, bench_validate, bench_parse_expression);
criterion_main!(benches);
