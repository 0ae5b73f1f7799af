// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! bgparse takes an index file and searches it for hex byte patterns,
//! printing the paths of candidate files.

use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use log::{error, LevelFilter};

use libbgformat::FormatError;
use libbgquery::pattern::pattern_from_hex;
use libbgquery::{Index, QueryError};

fn exit_code_for(e: &QueryError) -> u8 {
    match *e {
        QueryError::Stat(_) => 11,
        QueryError::Mmap(_) => 14,
        QueryError::Format(FormatError::NotFinalized) => 22,
        QueryError::Format(FormatError::Truncated) => 33,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let matches = Command::new("bgparse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("bgparse takes an index file and searches it for ascii encoded binary strings")
        .arg(Arg::new("search")
             .short('s').long("search")
             .value_name("HEXSTR")
             .action(ArgAction::Append)
             .help("search for the candidate file ids for this ascii encoded binary string (can have multiple -s options)"))
        .arg(Arg::new("stats")
             .short('S').long("stats")
             .action(ArgAction::SetTrue)
             .help("Dump the index header info after searching"))
        .arg(Arg::new("verbose")
             .short('v').long("verbose")
             .action(ArgAction::SetTrue)
             .help("show some additional info while working"))
        .arg(Arg::new("debug")
             .short('d').long("debug")
             .action(ArgAction::SetTrue)
             .help("show diagnostic information"))
        .arg(Arg::new("INDEX")
             .required(true)
             .help("the .bgi index file to search"))
        .get_matches();

    let level = if matches.get_flag("debug") {
        LevelFilter::Debug
    } else if matches.get_flag("verbose") {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    libbglog::init(level).expect("logger initialized twice");

    let index_path = matches.get_one::<String>("INDEX").expect("INDEX is required");

    let mut patterns = Vec::new();
    if let Some(strs) = matches.get_many::<String>("search") {
        for s in strs {
            match pattern_from_hex(s) {
                Ok(p) => patterns.push(p),
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::from(1);
                }
            }
        }
    }

    let index = match Index::open(index_path) {
        Ok(index) => index,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(exit_code_for(&e));
        }
    };

    if !patterns.is_empty() {
        let found = match index.search(&patterns) {
            Ok(found) => found,
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(exit_code_for(&e));
            }
        };
        let paths = match index.paths() {
            Ok(paths) => paths,
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(exit_code_for(&e));
            }
        };
        for id in found {
            match paths.get(id as usize) {
                Some(path) => println!("{}", path),
                None => error!("file id {} has no fileid map entry", id),
            }
        }
    }

    if matches.get_flag("stats") {
        print!("{}", index.header().dump());
        match index.stream_stats() {
            Ok(stats) => {
                println!("Posting stream:");
                println!("  present ngrams == {}", stats.present_ngrams);
                println!("  absent slots == {}", stats.absent_slots);
                println!("  PFOR postings == {}", stats.pfor_postings);
                println!("  VarByte postings == {}", stats.varbyte_postings);
                println!("  total file ids == {}", stats.total_ids);
                println!("  total posting bytes == {}", stats.total_posting_bytes);
                println!("  largest posting (ids) == {}", stats.largest_posting_ids);
            }
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(exit_code_for(&e));
            }
        }
    }

    ExitCode::SUCCESS
}
