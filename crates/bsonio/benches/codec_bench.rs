use bsonio::{
    bson_to_json, doc, from_bson_bytes, from_json, json_to_bson, to_bson_bytes, to_json, Bson,
    Document, JsonOutputMode, JsonWriterSettings,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn sample_document() -> Document {
    doc! {
        "name": "bsonio",
        "version": 3,
        "size": 16384i64,
        "active": true,
        "score": 99.5,
        "tags": ["bson", "json", "codec"],
        "owner": { "name": "Miku", "age": 16 },
    }
}

fn bench_document_creation(c: &mut Criterion) {
    c.bench_function("document_create", |b| b.iter(sample_document));
}

fn bench_binary_encode(c: &mut Criterion) {
    let document = sample_document();
    c.bench_function("binary_encode", |b| b.iter(|| to_bson_bytes(&document)));
}

fn bench_binary_decode(c: &mut Criterion) {
    let bytes = to_bson_bytes(&sample_document()).unwrap();
    c.bench_function("binary_decode", |b| b.iter(|| from_bson_bytes(&bytes)));
}

fn bench_json_write(c: &mut Criterion) {
    let value = Bson::Document(sample_document());
    let strict = JsonWriterSettings::new(JsonOutputMode::Strict);
    let indented = JsonWriterSettings::new(JsonOutputMode::Shell).indented(true);

    c.bench_function("json_write_strict", |b| b.iter(|| to_json(&value, &strict)));
    c.bench_function("json_write_shell_indented", |b| {
        b.iter(|| to_json(&value, &indented))
    });
}

fn bench_json_read(c: &mut Criterion) {
    let text = to_json(
        &Bson::Document(sample_document()),
        &JsonWriterSettings::new(JsonOutputMode::Strict),
    )
    .unwrap();
    c.bench_function("json_read", |b| b.iter(|| from_json(&text)));
}

fn bench_transcode(c: &mut Criterion) {
    let bytes: Vec<u8> = (0..100)
        .flat_map(|_| to_bson_bytes(&sample_document()).unwrap())
        .collect();
    let settings = JsonWriterSettings::default();
    let text = bson_to_json(&bytes, &settings).unwrap();

    c.bench_function("bson_to_json_100_docs", |b| {
        b.iter(|| bson_to_json(&bytes, &settings))
    });
    c.bench_function("json_to_bson_100_docs", |b| b.iter(|| json_to_bson(&text)));
}

criterion_group!(
    benches,
    bench_document_creation,
    bench_binary_encode,
    bench_binary_decode,
    bench_json_write,
    bench_json_read,
    bench_transcode,
);
criterion_main!(benches);
