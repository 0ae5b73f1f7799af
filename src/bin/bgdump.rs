// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! bgdump prints an index's header fields and, on request, its file-id
//! list.

use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use log::{error, LevelFilter};

use libbgformat::FormatError;
use libbgquery::{Index, QueryError};

fn main() -> ExitCode {
    let matches = Command::new("bgdump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("bgdump takes an index file and prints information about it")
        .arg(Arg::new("file-list")
             .short('f').long("file-list")
             .action(ArgAction::SetTrue)
             .help("Prints the file id index for this index file"))
        .arg(Arg::new("verbose")
             .short('v').long("verbose")
             .action(ArgAction::SetTrue)
             .help("verbose logging"))
        .arg(Arg::new("debug")
             .short('d').long("debug")
             .action(ArgAction::SetTrue)
             .help("debug logging"))
        .arg(Arg::new("INDEX")
             .required(true)
             .help("the .bgi index file to dump"))
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
    let index = match Index::open(index_path) {
        Ok(index) => index,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(match e {
                QueryError::Stat(_) => 11,
                QueryError::Mmap(_) => 14,
                QueryError::Format(FormatError::NotFinalized) => 22,
                QueryError::Format(FormatError::Truncated) => 33,
                _ => 1,
            });
        }
    };

    print!("{}", index.header().dump());

    if matches.get_flag("file-list") {
        match index.file_map() {
            Ok(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
