/// custom logger
use std::io::Write;
use std::sync::Mutex;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct Logger {
    max_level: LevelFilter,
    sink: Option<Mutex<Box<dyn Write + Send>>>,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now_time = Local::now().format("%Y/%m/%d %H:%M:%S");
        match self.sink {
            Some(ref sink) => {
                if let Ok(mut sink) = sink.lock() {
                    let _ = writeln!(sink, "{} {} {}", now_time, record.level(), record.args());
                }
            }
            None => {
                eprintln!("{} {} {}", now_time, record.level(), record.args());
            }
        }
    }
    fn flush(&self) {}
}

/// Log to stderr at the given level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(Logger {
        max_level: level,
        sink: None,
    }))?;
    log::set_max_level(level);
    Ok(())
}

/// Log to an already-opened sink instead (the builder's `--log FILE`).
pub fn init_with_sink(level: LevelFilter, sink: Box<dyn Write + Send>) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(Logger {
        max_level: level,
        sink: Some(Mutex::new(sink)),
    }))?;
    log::set_max_level(level);
    Ok(())
}
