use core_search::{Dir, Match, ScanEnv};
use core_text::TextCore;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn word_table() -> [bool; 256] {
    let mut table = [false; 256];
    for c in 0..=255u8 {
        if c.is_ascii_alphanumeric() || c == b'_' {
            table[c as usize] = true;
        }
    }
    table
}

fn setup_text() -> TextCore {
    let mut text = String::new();
    for i in 0..1000 {
        text.push_str(&format!("prefix target_{i} suffix\n"));
    }
    for _ in 0..1000 {
        text.push_str("filler line with nothing interesting on it at all\n");
    }
    TextCore::from_bytes(text.as_bytes())
}

fn scan_all(core: &TextCore, m: &mut Match, env: &ScanEnv<'_>) -> usize {
    let mut count = 0;
    let mut at = core.point();
    while let Ok(hit) = m.scan_buffer(core, at, Dir::Forward, 1, env, None) {
        count += 1;
        if hit.len == 0 {
            break;
        }
        at = hit.end;
    }
    count
}

fn bm_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm_scan");
    let core = setup_text();
    let words = word_table();
    let env = ScanEnv { exact_default: true, regex_default: false, words: &words, progress_after: u32::MAX };

    group.bench_function("literal_exact", |b| {
        let mut m = Match::new();
        m.set_pattern("target_500").unwrap();
        b.iter(|| black_box(scan_all(&core, &mut m, &env)));
    });

    group.bench_function("literal_fold", |b| {
        let mut m = Match::new();
        m.set_pattern("TARGET_500:i").unwrap();
        b.iter(|| black_box(scan_all(&core, &mut m, &env)));
    });

    group.finish();
}

fn regex_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_scan");
    let core = setup_text();
    let words = word_table();
    let env = ScanEnv { exact_default: true, regex_default: true, words: &words, progress_after: u32::MAX };

    group.bench_function("class_closure", |b| {
        let mut m = Match::new();
        m.set_pattern("target_[0-9]+").unwrap();
        b.iter(|| black_box(scan_all(&core, &mut m, &env)));
    });

    group.bench_function("grouped", |b| {
        let mut m = Match::new();
        m.set_pattern("(target)_([0-9]+)").unwrap();
        b.iter(|| black_box(scan_all(&core, &mut m, &env)));
    });

    group.bench_function("anchored", |b| {
        let mut m = Match::new();
        m.set_pattern("^prefix").unwrap();
        b.iter(|| black_box(scan_all(&core, &mut m, &env)));
    });

    group.finish();
}

criterion_group!(benches, bm_scan, regex_scan);
criterion_main!(benches);
