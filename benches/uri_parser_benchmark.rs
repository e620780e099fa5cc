//! Request URI parsing benchmarks
//!
//! Covers the lexer, the syntactic filter parser, and the full pipeline of
//! path resolution plus semantic binding against the people fixture model.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use octofhir_odata_uri::config::DEFAULT_MAX_DEPTH;
use octofhir_odata_uri::parser::{parse_filter, tokenize};
use octofhir_odata_uri::{InMemoryModel, ModelDocument, ODataUriParser, ParserSettings};
use std::hint::black_box;

const SERVICE_ROOT: &str = "https://example.com/odata/";

const FILTERS: &[(&str, &str)] = &[
    ("comparison", "Age gt 30"),
    ("logical", "Age gt 30 and (Name eq 'Ann' or startswith(Name, 'B'))"),
    ("lambda", "Friends/any(f: f/Age gt 30 and f/Home/City eq 'Oslo')"),
    ("enum", "Colors has NS.ColorFlags'Red,Green'"),
    (
        "arithmetic",
        "Score mul 2 add Age sub 1 gt 10 and round(Salary) le 1000.5",
    ),
];

const REQUESTS: &[(&str, &str)] = &[
    ("entity_set", "People"),
    ("key_and_navigation", "People(1)/Friends(2)/Home/City"),
    ("composite_key", "Orders(7)/Items(OrderID=7,ItemNo=2)/Sku/$value"),
    (
        "query_options",
        "People?$filter=Age%20gt%2030&$orderby=Name%20desc&$top=10&$skip=20&$count=true",
    ),
    (
        "select_expand",
        "Dogs(1)/MyPeople?$select=Name,Home/City&$expand=Friends($filter=Age%20gt%203;$top=2)",
    ),
    ("bound_function", "People/NS.Adults()/$count"),
];

fn people_model() -> InMemoryModel {
    let document = include_str!("../tests/fixtures/people.json");
    ModelDocument::from_json(document)
        .and_then(ModelDocument::into_model)
        .expect("fixture model loads")
}

fn benchmark_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");
    for (name, expression) in FILTERS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expression, |b, expression| {
            b.iter(|| black_box(tokenize(black_box(expression), DEFAULT_MAX_DEPTH)))
        });
    }
    group.finish();
}

fn benchmark_filter_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_parser");
    for (name, expression) in FILTERS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expression, |b, expression| {
            b.iter(|| black_box(parse_filter(black_box(expression), DEFAULT_MAX_DEPTH)))
        });
    }
    group.finish();
}

fn benchmark_full_pipeline(c: &mut Criterion) {
    let model = people_model();
    let mut group = c.benchmark_group("parse_uri");
    for (name, request) in REQUESTS {
        group.bench_with_input(BenchmarkId::from_parameter(name), request, |b, request| {
            b.iter(|| {
                let parsed = ODataUriParser::new(
                    &model,
                    ParserSettings::default(),
                    Some(SERVICE_ROOT),
                    black_box(request),
                )
                .and_then(|mut parser| parser.parse_uri());
                black_box(parsed)
            })
        });
    }
    group.finish();
}

fn benchmark_deep_nesting(c: &mut Criterion) {
    let depth = DEFAULT_MAX_DEPTH - 1;
    let expression = format!("{}true{}", "not(".repeat(depth), ")".repeat(depth));

    c.bench_function("deeply_nested_filter", |b| {
        b.iter(|| black_box(parse_filter(black_box(&expression), DEFAULT_MAX_DEPTH)))
    });
}

criterion_group!(
    benches,
    benchmark_tokenizer,
    benchmark_filter_parser,
    benchmark_full_pipeline,
    benchmark_deep_nesting
);
criterion_main!(benches);
