// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! bgextractfile blanks or replaces entries in an index's file-id map,
//! in place, without touching posting data.

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use log::{error, warn, LevelFilter};

use libbgformat::FormatError;
use libbgquery::extract::extract_entries;
use libbgquery::QueryError;

fn main() -> ExitCode {
    let matches = Command::new("bgextractfile")
        .version(env!("CARGO_PKG_VERSION"))
        .about("bgextractfile removes or replaces file entries in an index's file id map")
        .arg(Arg::new("extract")
             .short('e').long("extract")
             .value_name("PATH")
             .action(ArgAction::Append)
             .help("a file path to blank out of the index (can have multiple -e options; otherwise paths are read from stdin)"))
        .arg(Arg::new("replace")
             .short('r').long("replace")
             .value_name("STR")
             .help("replace matched entries with this string instead of blanking them"))
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
             .help("the .bgi index file to modify"))
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
    let replacement = matches.get_one::<String>("replace").map(String::as_str);

    let mut targets: Vec<String> = matches
        .get_many::<String>("extract")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if targets.is_empty() {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) if !l.is_empty() => targets.push(l),
                Ok(_) => {}
                Err(e) => {
                    error!("failed reading path list from stdin: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    if targets.is_empty() {
        error!("no paths to extract");
        return ExitCode::FAILURE;
    }

    match extract_entries(index_path, &targets, replacement) {
        Ok(found) => {
            warn!("Extracted {} out of {} files requested.", found, targets.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(match e {
                QueryError::Stat(_) => 11,
                QueryError::Mmap(_) => 14,
                QueryError::Format(FormatError::NotFinalized) => 22,
                QueryError::Format(FormatError::Truncated) => 33,
                _ => 1,
            })
        }
    }
}
