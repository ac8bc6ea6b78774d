use criterion::{black_box, criterion_group, criterion_main, Criterion};
use statsview::tags::{Key, Tag, TagMap, TagMutator};

fn build_map(n: usize) -> (TagMap, Vec<Key>) {
    let mut mutators = Vec::with_capacity(n);
    let mut keys = Vec::with_capacity(n);
    for i in 0..n {
        let key = Key::new(format!("key{i}")).expect("valid key");
        mutators.push(TagMutator::Upsert(Tag::new(key.clone(), format!("value{i}"))));
        keys.push(key);
    }
    let map = TagMap::new(&TagMap::empty(), mutators).expect("valid tag map");
    (map, keys)
}

fn benchmark_encode(c: &mut Criterion) {
    let (map, keys) = build_map(8);
    c.bench_function("tag_signature_encode_8_keys", |b| {
        b.iter(|| black_box(map.encode(black_box(&keys))));
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let (map, keys) = build_map(8);
    let sig = map.encode(&keys);
    c.bench_function("tag_signature_decode_8_keys", |b| {
        b.iter(|| black_box(TagMap::decode(black_box(&sig), black_box(&keys))));
    });
}

criterion_group!(benches, benchmark_encode, benchmark_decode);
criterion_main!(benches);
