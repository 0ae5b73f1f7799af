mod common;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tempfile::TempDir;

use libbgformat::ngram::extract_ngrams;
use libbgindex::IndexOptions;
use libbgquery::pattern::pattern_from_hex;
use libbgquery::Index;

use common::{build_at, tri, write_corpus};

#[test]
fn two_file_minimal_three_gram_index() {
    let dir = TempDir::new().unwrap();
    let inputs = write_corpus(
        dir.path(),
        &[("a", &[0x41, 0x42, 0x43, 0x44]), ("b", &[0x42, 0x43, 0x44, 0x45])],
    );
    let path = build_at(dir.path(), "mini", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    assert_eq!(ix.header().n, 3);
    assert_eq!(ix.header().num_files, 2);

    assert_eq!(ix.posting(0x434241).unwrap(), vec![0]);
    assert_eq!(ix.posting(0x444342).unwrap(), vec![0, 1]);
    assert_eq!(ix.posting(0x454443).unwrap(), vec![1]);

    let found = ix.search(&[pattern_from_hex("424344").unwrap()]).unwrap();
    assert_eq!(found, vec![0, 1]);
    let found = ix.search(&[pattern_from_hex("414243").unwrap()]).unwrap();
    assert_eq!(found, vec![0]);

    let paths = ix.paths().unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].starts_with(dir.path().join("a").to_str().unwrap()));
    assert!(paths[1].starts_with(dir.path().join("b").to_str().unwrap()));
    // the builder records the per-file unique ngram count
    assert!(paths[0].contains(",unique_ngrams=2"));
}

#[test]
fn hint_miss_returns_empty_without_posting_reads() {
    let dir = TempDir::new().unwrap();
    let inputs = write_corpus(dir.path(), &[("a", b"hello world"), ("b", b"hello moon")]);
    let path = build_at(dir.path(), "hint", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    // nothing in an ascii corpus carries this hint prefix
    assert!(ix.posting(0xfffefd).unwrap().is_empty());
    let found = ix.search(&[pattern_from_hex("fdfeff").unwrap()]).unwrap();
    assert!(found.is_empty());
}

#[test]
fn missing_files_are_tolerated_and_ids_renumbered() {
    let dir = TempDir::new().unwrap();
    let mut inputs = write_corpus(
        dir.path(),
        &[("one", b"first file body"), ("two", b"second file body")],
    );
    inputs.insert(1, "/nonexistent/biggrep/input".to_string());

    let path = build_at(dir.path(), "miss", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    assert_eq!(ix.header().num_files, 2);
    let paths = ix.paths().unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].starts_with(dir.path().join("one").to_str().unwrap()));
    assert!(paths[1].starts_with(dir.path().join("two").to_str().unwrap()));

    // "second" only lives in the renumbered id 1
    let found = ix.search(&[b"second".to_vec()]).unwrap();
    assert_eq!(found, vec![1]);
}

#[test]
fn builds_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| {
            let name = format!("f{}", i);
            let body: Vec<u8> = (0..200u32).map(|j| ((i * 7 + j * 13) % 251) as u8).collect();
            (name, body)
        })
        .collect();
    let named: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    let inputs = write_corpus(dir.path(), &named);

    let p1 = build_at(dir.path(), "det1", inputs.clone(), IndexOptions::default());
    let p2 = build_at(dir.path(), "det2", inputs, IndexOptions::default());
    assert_eq!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
}

#[test]
fn every_substring_query_finds_its_file() {
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..6)
        .map(|i| {
            let name = format!("bin{}", i);
            let body: Vec<u8> = (0..64u32).map(|j| ((i * 43 + j * 17 + 5) % 256) as u8).collect();
            (name, body)
        })
        .collect();
    let named: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    let inputs = write_corpus(dir.path(), &named);
    let path = build_at(dir.path(), "sub", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    for (id, (_, body)) in files.iter().enumerate() {
        // any contiguous substring must surface its file as a candidate
        for (start, len) in [(0usize, 3usize), (5, 7), (30, 20), (0, 64)] {
            let slice = &body[start..start + len];
            let found = ix.search(&[slice.to_vec()]).unwrap();
            assert!(
                found.contains(&(id as u32)),
                "file {} missing from candidates for its own bytes",
                id
            );
        }
    }
}

#[test]
fn hint_skip_lands_on_every_posting() {
    // brute-force ground truth: build the ngram -> ids map in memory and
    // make sure the on-disk skip scan agrees everywhere
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..8)
        .map(|i| {
            let name = format!("g{}", i);
            let body: Vec<u8> = (0..150u32).map(|j| ((i * 31 + j * 11 + 3) % 256) as u8).collect();
            (name, body)
        })
        .collect();
    let named: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    let inputs = write_corpus(dir.path(), &named);
    let path = build_at(dir.path(), "all", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    let mut expected: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
    for (id, (_, body)) in files.iter().enumerate() {
        for g in extract_ngrams(body, 3) {
            expected.entry(g).or_default().insert(id as u32);
        }
    }
    assert_eq!(ix.header().num_ngrams as usize, expected.len());

    for (&g, ids) in &expected {
        let got = ix.posting(g).unwrap();
        let want: Vec<u32> = ids.iter().copied().collect();
        assert_eq!(got, want, "posting mismatch for ngram {:08x}", g);
    }
}

#[test]
fn shared_prefix_exercises_pfor_postings() {
    // forty files sharing one leading trigram: the posting's delta list
    // is a run of ones, exactly what PFOR's special blocks encode
    let dir = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..40)
        .map(|i| {
            let name = format!("p{}", i);
            let mut body = b"XYZ".to_vec();
            body.extend_from_slice(&[i as u8, (i + 100) as u8, (i + 200) as u8, i as u8]);
            (name, body)
        })
        .collect();
    let named: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    let inputs = write_corpus(dir.path(), &named);
    let path = build_at(dir.path(), "pfor", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    let got = ix.posting(tri(b'X', b'Y', b'Z')).unwrap();
    assert_eq!(got, (0..40).collect::<Vec<u32>>());

    let found = ix.search(&[b"XYZ".to_vec()]).unwrap();
    assert_eq!(found, (0..40).collect::<Vec<u32>>());
}

#[test]
fn multiple_patterns_all_have_to_match() {
    let dir = TempDir::new().unwrap();
    let inputs = write_corpus(
        dir.path(),
        &[
            ("both", b"needle one, needle two"),
            ("one", b"needle one only here"),
            ("two", b"needle two only here"),
        ],
    );
    let path = build_at(dir.path(), "multi", inputs, IndexOptions::default());
    let ix = Index::open(&path).unwrap();

    let p_one = b" one".to_vec();
    let p_two = b" two".to_vec();
    assert_eq!(ix.search(&[p_one.clone()]).unwrap(), vec![0, 1]);
    assert_eq!(ix.search(&[p_two.clone()]).unwrap(), vec![0, 2]);
    // every pattern's ngrams join one conjunction
    assert_eq!(ix.search(&[p_one, p_two]).unwrap(), vec![0]);

    // too-short patterns are rejected before any lookups
    assert!(matches!(
        ix.search(&[b"ab".to_vec()]),
        Err(libbgquery::QueryError::Pattern(_))
    ));
}

#[test]
fn four_gram_indexes_work_too() {
    let dir = TempDir::new().unwrap();
    let inputs = write_corpus(
        dir.path(),
        &[("a", &[0x41, 0x42, 0x43, 0x44, 0x45]), ("b", &[0x42, 0x43, 0x44, 0x45, 0x46])],
    );
    let opts = IndexOptions {
        ngram_size: 4,
        ..IndexOptions::default()
    };
    let path = build_at(dir.path(), "four", inputs, opts);
    let ix = Index::open(&path).unwrap();

    assert_eq!(ix.header().n, 4);
    assert_eq!(ix.header().hint_type, 0);
    assert_eq!(ix.posting(0x44434241).unwrap(), vec![0]);
    assert_eq!(ix.posting(0x45444342).unwrap(), vec![0, 1]);
    assert_eq!(ix.posting(0x46454443).unwrap(), vec![1]);

    let found = ix.search(&[pattern_from_hex("42434445").unwrap()]).unwrap();
    assert_eq!(found, vec![0, 1]);
}

#[test]
fn over_limit_files_are_rejected_not_fatal() {
    let dir = TempDir::new().unwrap();
    let big: Vec<u8> = (0..200u32).map(|j| (j % 256) as u8).collect();
    let inputs = write_corpus(
        dir.path(),
        &[("small1", b"aaaabbbb"), ("small2", b"bbbbcccc"), ("big", &big)],
    );
    let overflow = dir.path().join("overflow.txt");
    let mut opts = IndexOptions {
        max_unique_ngrams: 50,
        overflow_path: Some(overflow.clone()),
        ..IndexOptions::default()
    };
    let (path, stats) = common::build_stats_at(dir.path(), "lim", inputs, &mut opts);

    assert_eq!(stats.over_limit_files, 1);
    assert_eq!(stats.indexed_files, 2);
    let ix = Index::open(&path).unwrap();
    assert_eq!(ix.header().num_files, 2);

    let listed = std::fs::read_to_string(&overflow).unwrap();
    assert!(listed.contains("big"));
}
