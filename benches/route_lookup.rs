use criterion::{black_box, criterion_group, criterion_main, Criterion};
use routex_dsa::RouteTrie;

fn route_lookup(c: &mut Criterion) {
    let mut trie = RouteTrie::new();
    for section in ["blog", "docs", "shop", "about"] {
        for page in 0..64 {
            trie.insert(&format!("/{}/page{}", section, page), page).unwrap();
            trie.insert(&format!("/{}/page{}.html", section, page), page).unwrap();
        }
        trie.insert(&format!("/{}/:slug/comments", section), 0).unwrap();
    }

    c.bench_function("route_trie_static_lookup", |b| {
        b.iter(|| trie.lookup(black_box("/docs/page42.html")).is_some())
    });
    c.bench_function("route_trie_param_lookup", |b| {
        b.iter(|| trie.lookup(black_box("/shop/blue-shoes/comments")).is_some())
    });
}

criterion_group!(benches, route_lookup);
criterion_main!(benches);
