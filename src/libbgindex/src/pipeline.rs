// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The build pipeline.
//!
//! Shingler pool -> loser-tree merge (single threaded, on the calling
//! thread) -> compressor pool -> writer (single threaded). Stages are
//! joined by MPMC channels; posting order is carried by a sequence
//! number the merge assigns and the writer sorts on, so compressor
//! scheduling never shows up in the output file. Nothing holds a lock
//! across a channel wait.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, warn};

use libbgformat::BgiHeader;

use crate::compress::{CompressedPosting, Compressor, PostingList};
use crate::error::{IndexError, IndexErrorKind, IndexResult};
use crate::filedata::FileData;
use crate::losertree::LoserTree;
use crate::merge::PostingBatcher;
use crate::shingle::{shingle_file, ShingleOptions, Shingled};
use crate::stopwatch::Stopwatch;
use crate::write::{IndexWriter, WriterStats};

pub const DEFAULT_NGRAM_SIZE: u8 = 3;
pub const DEFAULT_SHINGLE_THREADS: usize = 4;
pub const DEFAULT_COMPRESS_THREADS: usize = 5;
pub const DEFAULT_PFOR_BLOCKSIZE: u32 = 32;
pub const DEFAULT_PFOR_MAX_EXCEPTIONS: u32 = 3;
pub const DEFAULT_PFOR_THRESHOLD: usize = 8;
/// Default unique-ngram cap: the whole 4-gram space.
pub const DEFAULT_MAX_UNIQUE_NGRAMS: u64 = 1 << 32;

/// Merge pauses when the writer falls this many postings behind the
/// compressor pool, and resumes once it has caught back up.
const WRITER_LAG_PAUSE: u64 = 50_000;
const WRITER_LAG_RESUME: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub ngram_size: u8,
    /// None picks the default for N: type 1 for 3-grams, type 0 for
    /// 4-grams.
    pub hint_type: Option<u8>,
    pub pfor_blocksize: u32,
    pub pfor_max_exceptions: u32,
    pub pfor_threshold: usize,
    pub max_unique_ngrams: u64,
    /// Where to list paths rejected for exceeding the ngram cap.
    pub overflow_path: Option<PathBuf>,
    /// Output name prefix; the index lands at `<prefix>.bgi`.
    pub prefix: String,
    pub shingle_threads: usize,
    pub compress_threads: usize,
    /// zlib the file-id map (format 2.2).
    pub compress_map: bool,
    /// Shingle, report, and stop without writing an index.
    pub shingle_only: bool,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions {
            ngram_size: DEFAULT_NGRAM_SIZE,
            hint_type: None,
            pfor_blocksize: DEFAULT_PFOR_BLOCKSIZE,
            pfor_max_exceptions: DEFAULT_PFOR_MAX_EXCEPTIONS,
            pfor_threshold: DEFAULT_PFOR_THRESHOLD,
            max_unique_ngrams: DEFAULT_MAX_UNIQUE_NGRAMS,
            overflow_path: None,
            prefix: "index".to_string(),
            shingle_threads: DEFAULT_SHINGLE_THREADS,
            compress_threads: DEFAULT_COMPRESS_THREADS,
            compress_map: false,
            shingle_only: false,
        }
    }
}

impl IndexOptions {
    pub fn effective_hint_type(&self) -> u8 {
        match self.hint_type {
            Some(t) => t,
            None if self.ngram_size == 3 => 1,
            None => 0,
        }
    }

    fn validate(&self) -> IndexResult<()> {
        let config = |msg: String| IndexError::new(IndexErrorKind::Config, msg);
        if self.ngram_size < 3 || self.ngram_size > 4 {
            return Err(config(format!(
                "invalid ngram size {}: only 3 or 4 grams are handled",
                self.ngram_size
            )));
        }
        if let Some(t) = self.hint_type {
            if t > 2 {
                return Err(config(format!("invalid hint type {}: only 0-2", t)));
            }
        }
        if self.pfor_blocksize == 0
            || self.pfor_blocksize % 8 != 0
            || self.pfor_blocksize > 255
        {
            return Err(config(format!(
                "invalid PFOR blocksize {}: must be a multiple of 8 that fits a byte",
                self.pfor_blocksize
            )));
        }
        if self.shingle_threads == 0 || self.compress_threads == 0 {
            return Err(config("thread counts must be nonzero".to_string()));
        }
        Ok(())
    }
}

/// Progress counters shared across the pipeline stages; also what the
/// merge loop's backpressure watches.
#[derive(Debug, Default)]
pub struct Counters {
    pub shingled: AtomicU64,
    pub compressed: AtomicU64,
    pub written: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    pub input_files: usize,
    pub indexed_files: usize,
    pub missing_files: usize,
    pub over_limit_files: usize,
    pub unique_ngrams: u64,
    pub writer: WriterStats,
}

/// Build an index over the given input lines (`path[,key=value]*`).
/// Blocks until the index is finalized or the pipeline fails.
pub fn build_index(opts: &IndexOptions, inputs: Vec<String>) -> IndexResult<BuildStats> {
    opts.validate()?;

    if inputs.len() < 2 {
        return Err(IndexError::new(
            IndexErrorKind::TooFewFiles,
            "please provide two or more files for indexing at a time",
        ));
    }

    let counters = Counters::default();
    let mut stats = BuildStats {
        input_files: inputs.len(),
        ..BuildStats::default()
    };

    let mut timer = Stopwatch::new();

    // metadata keeps the whole input line; only the path part goes to
    // the shinglers
    let mut metadata = inputs;
    let (mut fds, unique_counts) = run_shinglers(opts, &metadata, &counters)?;
    info!(
        "shingling done, {} files processed, took {:.3} sec",
        fds.len(),
        timer.seconds_from_last()
    );

    for (fd, &unique) in fds.iter().zip(unique_counts.iter()) {
        if !fd.rejected() {
            let line = &mut metadata[fd.id as usize];
            line.push_str(",unique_ngrams=");
            line.push_str(&unique.to_string());
        }
    }

    if let Some(ref overflow) = opts.overflow_path {
        let mut f = File::create(overflow)?;
        for fd in fds.iter().filter(|fd| fd.hit_limit) {
            let line = &metadata[fd.id as usize];
            let path = line.split(',').next().unwrap_or(line);
            writeln!(f, "{}", path)?;
        }
    }

    // drop rejected files and densely renumber the survivors
    let mut kept_meta = Vec::with_capacity(fds.len());
    let mut kept = Vec::with_capacity(fds.len());
    for fd in fds.drain(..) {
        if fd.missing {
            stats.missing_files += 1;
        } else if fd.hit_limit {
            stats.over_limit_files += 1;
        } else {
            let mut fd = fd;
            kept_meta.push(std::mem::take(&mut metadata[fd.id as usize]));
            fd.id = kept.len() as u32;
            kept.push(fd);
        }
    }
    let mut fds = kept;
    stats.indexed_files = fds.len();

    if fds.len() < 2 {
        warn!(
            "{} of {} files found. {} files missing, {} files over the {} unique-ngram limit",
            fds.len(),
            stats.input_files,
            stats.missing_files,
            stats.over_limit_files,
            opts.max_unique_ngrams
        );
        return Err(IndexError::new(
            IndexErrorKind::TooFewFiles,
            "fewer than two files valid after shingling",
        ));
    }
    info!("{} files valid after shingling", fds.len());

    if opts.shingle_only {
        return Ok(stats);
    }

    // open the output before spinning anything else up, so a bad path
    // fails the build immediately
    let mut header = BgiHeader::new(opts.ngram_size);
    header.hint_type = opts.effective_hint_type();
    header.pfor_blocksize = opts.pfor_blocksize as u8;
    let out_path = format!("{}.bgi", opts.prefix);
    let writer = IndexWriter::create(&out_path, header)?;

    let compressor = Compressor::new(
        opts.pfor_blocksize,
        opts.pfor_max_exceptions,
        opts.pfor_threshold,
    );

    let writer_stats = run_merge(opts, compressor, writer, &mut fds, &kept_meta, &counters)?;
    stats.unique_ngrams = writer_stats.total_ngrams;
    stats.writer = writer_stats;
    info!(
        "merge, compress and write done, took {:.3} sec",
        timer.seconds_from_last()
    );
    info!(
        "{} unique ngrams total, total runtime {:.3} sec",
        stats.unique_ngrams,
        timer.seconds_from_start()
    );
    Ok(stats)
}

/// Fan the input list out over the shingler pool, collecting the
/// FileData results back into input order.
fn run_shinglers(
    opts: &IndexOptions,
    metadata: &[String],
    counters: &Counters,
) -> IndexResult<(Vec<FileData>, Vec<usize>)> {
    let shingle_opts = ShingleOptions {
        ngram_size: opts.ngram_size,
        max_unique_ngrams: opts.max_unique_ngrams,
    };
    let (job_tx, job_rx) = unbounded::<(u32, String)>();
    let (done_tx, done_rx) = unbounded::<Shingled>();

    let mut slots: Vec<Option<FileData>> = Vec::with_capacity(metadata.len());
    slots.resize_with(metadata.len(), || None);
    let mut uniques = vec![0usize; metadata.len()];

    thread::scope(|s| {
        for _ in 0..opts.shingle_threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move || {
                for (id, path) in job_rx.iter() {
                    let shingled = shingle_file(&path, id, shingle_opts);
                    counters.shingled.fetch_add(1, Ordering::Relaxed);
                    if done_tx.send(shingled).is_err() {
                        break;
                    }
                }
                debug!(
                    "shingle worker exiting, shingle counter == {}",
                    counters.shingled.load(Ordering::Relaxed)
                );
            });
        }
        drop(done_tx);

        for (i, line) in metadata.iter().enumerate() {
            let path = line.split(',').next().unwrap_or(line);
            job_tx
                .send((i as u32, path.to_string()))
                .expect("shingle workers alive until job queue closes");
        }
        drop(job_tx);

        for shingled in done_rx.iter() {
            let id = shingled.fd.id as usize;
            uniques[id] = shingled.unique_ngrams;
            slots[id] = Some(shingled.fd);
        }
    });

    let fds = slots
        .into_iter()
        .map(|s| s.expect("every enqueued file shingles exactly once"))
        .collect();
    Ok((fds, uniques))
}

/// Drive the loser tree on this thread, feeding the compressor pool and
/// the writer thread, and wait for the index to finalize.
fn run_merge(
    opts: &IndexOptions,
    compressor: Compressor,
    writer: IndexWriter,
    fds: &mut [FileData],
    kept_meta: &[String],
    counters: &Counters,
) -> IndexResult<WriterStats> {
    let (post_tx, post_rx) = unbounded::<PostingList>();
    let (comp_tx, comp_rx) = unbounded::<IndexResult<CompressedPosting>>();
    let merge_failed = AtomicBool::new(false);
    let merge_failed = &merge_failed;
    let writer_done = AtomicBool::new(false);
    let writer_done = &writer_done;

    thread::scope(|s| {
        for _ in 0..opts.compress_threads {
            let post_rx = post_rx.clone();
            let comp_tx = comp_tx.clone();
            s.spawn(move || {
                for posting in post_rx.iter() {
                    let result = compressor.compress(posting);
                    let failed = result.is_err();
                    counters.compressed.fetch_add(1, Ordering::Relaxed);
                    if comp_tx.send(result).is_err() || failed {
                        break;
                    }
                }
            });
        }
        drop(comp_tx);

        let writer_thread = s.spawn(move || {
            let result = run_writer(
                writer,
                comp_rx,
                kept_meta,
                opts.compress_map,
                counters,
                merge_failed,
            );
            writer_done.store(true, Ordering::SeqCst);
            result
        });

        let mut tree = LoserTree::build(fds);
        info!("built loser tree, pulling data");

        let mut merge_result: IndexResult<()> = Ok(());
        let mut batcher = PostingBatcher::new();

        while let Some((ngram, id)) = tree.pop_root(fds) {
            match batcher.push(ngram, id) {
                Ok(None) => {}
                Ok(Some(group)) => {
                    if group.seq % 0xFFFFF == 0 {
                        info!(
                            "merge sending ngram {:08x} to compress ({} file ids)",
                            group.ngram,
                            group.ids.len()
                        );
                    }
                    wait_for_writer(counters, writer_done);
                    if post_tx.send(group).is_err() {
                        // pool is gone; its error comes back via the
                        // writer
                        break;
                    }
                }
                Err(e) => {
                    merge_failed.store(true, Ordering::SeqCst);
                    merge_result = Err(e);
                    break;
                }
            }
        }

        if merge_result.is_ok() {
            if let Some(group) = batcher.finish() {
                info!(
                    "merge sending FINAL ngram {:08x} to compress ({} file ids)",
                    group.ngram,
                    group.ids.len()
                );
                if post_tx.send(group).is_err() {
                    debug!("compressor pool gone before final posting");
                }
            }
        }
        drop(post_tx);

        let writer_result = writer_thread
            .join()
            .unwrap_or_else(|_| {
                Err(IndexError::new(
                    IndexErrorKind::Invariant,
                    "writer thread panicked",
                ))
            });
        merge_result.and(writer_result)
    })
}

/// The writer thread: drain postings in sequence order, then finalize,
/// unless the merge side reported failure first.
fn run_writer(
    mut writer: IndexWriter,
    comp_rx: Receiver<IndexResult<CompressedPosting>>,
    kept_meta: &[String],
    compress_map: bool,
    counters: &Counters,
    merge_failed: &AtomicBool,
) -> IndexResult<WriterStats> {
    for result in comp_rx.iter() {
        writer.add(result?)?;
        counters.written.fetch_add(1, Ordering::Relaxed);
    }
    if merge_failed.load(Ordering::SeqCst) {
        // leave the index unfinalized; the placeholder header's zero
        // fileid_map_offset keeps readers away from it
        return Err(IndexError::new(
            IndexErrorKind::Invariant,
            "merge failed, index not finalized",
        ));
    }
    writer.finalize(kept_meta, compress_map)
}

fn writer_lag(counters: &Counters) -> u64 {
    let compressed = counters.compressed.load(Ordering::Relaxed);
    let written = counters.written.load(Ordering::Relaxed);
    compressed.saturating_sub(written)
}

fn wait_for_writer(counters: &Counters, writer_done: &AtomicBool) {
    if writer_lag(counters) > WRITER_LAG_PAUSE {
        info!(
            "waiting for writer to catch up c:{} w:{}",
            counters.compressed.load(Ordering::Relaxed),
            counters.written.load(Ordering::Relaxed)
        );
        while writer_lag(counters) > WRITER_LAG_RESUME && !writer_done.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_micros(10));
        }
    }
}
