// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::time::Instant;

/// Elapsed-time bookkeeping for the progress logs: seconds since the
/// build started, and since the last stage boundary.
pub struct Stopwatch {
    start: Instant,
    last: Instant,
}

impl Default for Stopwatch {
    fn default() -> Stopwatch {
        Stopwatch::new()
    }
}

impl Stopwatch {
    pub fn new() -> Stopwatch {
        let now = Instant::now();
        Stopwatch { start: now, last: now }
    }

    pub fn seconds_from_start(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Seconds since the previous call (or construction), advancing the
    /// marker.
    pub fn seconds_from_last(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_advance() {
        let mut sw = Stopwatch::new();
        let first = sw.seconds_from_last();
        assert!(first >= 0.0);
        assert!(sw.seconds_from_start() >= first);
    }
}
