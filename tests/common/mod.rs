#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use libbgindex::{build_index, BuildStats, IndexOptions};

/// Write named files into `dir`, returning their absolute paths as the
/// builder's input lines.
pub fn write_corpus(dir: &Path, files: &[(&str, &[u8])]) -> Vec<String> {
    files
        .iter()
        .map(|&(name, content)| {
            let p = dir.join(name);
            fs::write(&p, content).unwrap();
            p.to_str().unwrap().to_string()
        })
        .collect()
}

/// Build an index named `<name>.bgi` inside `dir` and return its path.
pub fn build_at(dir: &Path, name: &str, inputs: Vec<String>, mut opts: IndexOptions) -> PathBuf {
    build_stats_at(dir, name, inputs, &mut opts).0
}

pub fn build_stats_at(
    dir: &Path,
    name: &str,
    inputs: Vec<String>,
    opts: &mut IndexOptions,
) -> (PathBuf, BuildStats) {
    opts.prefix = dir.join(name).to_str().unwrap().to_string();
    let stats = build_index(opts, inputs).unwrap();
    (dir.join(format!("{}.bgi", name)), stats)
}

/// The ngram value of three bytes, as the index encodes it.
pub fn tri(b0: u8, b1: u8, b2: u8) -> u32 {
    u32::from(b0) | u32::from(b1) << 8 | u32::from(b2) << 16
}
