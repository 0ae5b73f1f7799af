// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! bgindex reads a list of files on stdin and produces an n-gram
//! inverted index.

use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use log::{error, info, warn, LevelFilter};

use libbgindex::pipeline::{
    DEFAULT_COMPRESS_THREADS, DEFAULT_MAX_UNIQUE_NGRAMS, DEFAULT_NGRAM_SIZE,
    DEFAULT_PFOR_BLOCKSIZE, DEFAULT_PFOR_MAX_EXCEPTIONS, DEFAULT_PFOR_THRESHOLD,
    DEFAULT_SHINGLE_THREADS,
};
use libbgindex::{build_index, IndexOptions};

fn main() -> ExitCode {
    let matches = Command::new("bgindex")
        .version(env!("CARGO_PKG_VERSION"))
        .about("bgindex reads a list of files on stdin to process, produces an N-gram inverted index")
        .arg(Arg::new("ngram")
             .short('n').long("ngram")
             .value_name("N")
             .value_parser(clap::value_parser!(u8))
             .default_value("3")
             .help("Define N for the N-gram (3 or 4, 3 is default)"))
        .arg(Arg::new("hint-type")
             .short('H').long("hint-type")
             .value_name("TYPE")
             .value_parser(clap::value_parser!(u8))
             .help("Specify hint type (0-2, default 0 for n==4, 1 for n==3)"))
        .arg(Arg::new("blocksize")
             .short('b').long("blocksize")
             .value_name("SIZE")
             .value_parser(clap::value_parser!(u32))
             .default_value("32")
             .help("PFOR encoding blocksize (multiple of 8, default 32)"))
        .arg(Arg::new("exceptions")
             .short('e').long("exceptions")
             .value_name("NUM")
             .value_parser(clap::value_parser!(u32))
             .default_value("3")
             .help("PFOR encoding max exceptions per block (default 3)"))
        .arg(Arg::new("minimum")
             .short('m').long("minimum")
             .value_name("NUM")
             .value_parser(clap::value_parser!(usize))
             .default_value("8")
             .help("PFOR encoding minimum number of entries to consider PFOR (default 8)"))
        .arg(Arg::new("max-unique-ngrams")
             .short('M').long("max-unique-ngrams")
             .value_name("NUM")
             .value_parser(clap::value_parser!(u64))
             .help("Maximum number of unique n-grams allowed per file"))
        .arg(Arg::new("overflow")
             .short('O').long("overflow")
             .value_name("FILE")
             .help("Write filenames that surpass max-unique-ngram limit to given filename"))
        .arg(Arg::new("prefix")
             .short('p').long("prefix")
             .value_name("STR")
             .default_value("index")
             .help("A prefix for the index file(s) (directory and/or partial filename)"))
        .arg(Arg::new("sthreads")
             .short('S').long("sthreads")
             .value_name("NUM")
             .value_parser(clap::value_parser!(usize))
             .default_value("4")
             .help("Number of threads to use for shingling (default 4)"))
        .arg(Arg::new("cthreads")
             .short('C').long("cthreads")
             .value_name("NUM")
             .value_parser(clap::value_parser!(usize))
             .default_value("5")
             .help("Number of threads to use for compression (default 5)"))
        .arg(Arg::new("compress")
             .short('z').long("compress")
             .action(ArgAction::SetTrue)
             .help("Compress file and metadata info"))
        .arg(Arg::new("count")
             .short('c').long("count")
             .action(ArgAction::SetTrue)
             .help("Shingle the input files, report counts, and exit without indexing"))
        .arg(Arg::new("verbose")
             .short('v').long("verbose")
             .action(ArgAction::SetTrue)
             .help("Show some additional info while working"))
        .arg(Arg::new("debug")
             .short('d').long("debug")
             .action(ArgAction::SetTrue)
             .help("Show more diagnostic information"))
        .arg(Arg::new("log")
             .short('l').long("log")
             .value_name("FILE")
             .help("Provide a log file for processing information"))
        .get_matches();

    let level = if matches.get_flag("debug") {
        LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    if let Some(logfile) = matches.get_one::<String>("log") {
        let f = match OpenOptions::new().create(true).append(true).open(logfile) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Can not open log file {}: {}", logfile, e);
                return ExitCode::FAILURE;
            }
        };
        libbglog::init_with_sink(level, Box::new(f)).expect("logger initialized twice");
    } else {
        libbglog::init(level).expect("logger initialized twice");
    }

    let opts = IndexOptions {
        ngram_size: *matches.get_one::<u8>("ngram").unwrap_or(&DEFAULT_NGRAM_SIZE),
        hint_type: matches.get_one::<u8>("hint-type").copied(),
        pfor_blocksize: *matches
            .get_one::<u32>("blocksize")
            .unwrap_or(&DEFAULT_PFOR_BLOCKSIZE),
        pfor_max_exceptions: *matches
            .get_one::<u32>("exceptions")
            .unwrap_or(&DEFAULT_PFOR_MAX_EXCEPTIONS),
        pfor_threshold: *matches
            .get_one::<usize>("minimum")
            .unwrap_or(&DEFAULT_PFOR_THRESHOLD),
        max_unique_ngrams: matches
            .get_one::<u64>("max-unique-ngrams")
            .copied()
            .unwrap_or(DEFAULT_MAX_UNIQUE_NGRAMS),
        overflow_path: matches.get_one::<String>("overflow").map(PathBuf::from),
        prefix: matches
            .get_one::<String>("prefix")
            .cloned()
            .unwrap_or_else(|| "index".to_string()),
        shingle_threads: *matches
            .get_one::<usize>("sthreads")
            .unwrap_or(&DEFAULT_SHINGLE_THREADS),
        compress_threads: *matches
            .get_one::<usize>("cthreads")
            .unwrap_or(&DEFAULT_COMPRESS_THREADS),
        compress_map: matches.get_flag("compress"),
        shingle_only: matches.get_flag("count"),
    };

    let mut inputs = Vec::new();
    for line in io::stdin().lock().lines() {
        match line {
            Ok(l) if !l.is_empty() => inputs.push(l),
            Ok(_) => {} // last line might be blank
            Err(e) => {
                error!("failed reading file list from stdin: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match build_index(&opts, inputs) {
        Ok(stats) => {
            if opts.shingle_only {
                info!("exiting due to --count switch");
            }
            warn!(
                "DONE! {} of {} files indexed ({} missing, {} over limit), {} unique ngrams",
                stats.indexed_files,
                stats.input_files,
                stats.missing_files,
                stats.over_limit_files,
                stats.unique_ngrams
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
