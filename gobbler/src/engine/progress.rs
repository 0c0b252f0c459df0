// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The throttled progress line.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::stats::Totals;

/// Time between progress lines in interactive mode.
pub const INTERACTIVE_INTERVAL: Duration = Duration::from_secs(3);

/// Time between progress lines otherwise.
pub const DETACHED_INTERVAL: Duration = Duration::from_secs(60);

const DOODLES: [&str; 4] = ["^ . . .\r", ". ^ . .\r", ". . ^ .\r", ". . . ^\r"];

#[derive(Debug)]
pub struct Progress {
    interactive: bool,
    interval: Duration,
    next: Option<Instant>,
    doodle: usize,
}

impl Progress {
    #[must_use]
    pub fn new(interactive: bool) -> Progress {
        Progress {
            interactive,
            interval: if interactive {
                INTERACTIVE_INTERVAL
            } else {
                DETACHED_INTERVAL
            },
            next: None,
            doodle: 0,
        }
    }

    /// True if a line is due at `now`.  The first line is due at once; each due line
    /// schedules the next one an interval later.
    pub fn due(&mut self, now: Instant) -> bool {
        if self.next.is_some_and(|next| now <= next) {
            return false;
        }
        self.next = Some(now + self.interval);
        true
    }

    /// Write a progress line.  Interactive lines end in a rotating indicator and a carriage
    /// return so that they overwrite each other.
    ///
    /// # Errors
    ///
    /// Fails if `out` fails.
    pub fn write<W: Write>(&mut self, out: &mut W, totals: &Totals) -> io::Result<()> {
        let ending = if self.interactive {
            let doodle = DOODLES[self.doodle];
            self.doodle = (self.doodle + 1) % DOODLES.len();
            doodle
        } else {
            "\n"
        };
        write!(
            out,
            "Rx: {:<10}  Tx: {:<10}  Drops: {:<10}  {ending}",
            totals.rxed, totals.txed, totals.drops
        )?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn throttle() {
        let mut progress = Progress::new(true);
        let now = Instant::now();
        assert!(progress.due(now));
        assert!(!progress.due(now + Duration::from_secs(2)));
        assert!(!progress.due(now + INTERACTIVE_INTERVAL));
        assert!(progress.due(now + Duration::from_millis(3001)));

        let mut progress = Progress::new(false);
        assert!(progress.due(now));
        assert!(!progress.due(now + Duration::from_secs(59)));
        assert!(progress.due(now + Duration::from_secs(61)));
    }

    #[test]
    fn detached_lines_end_in_newline() {
        let mut out = Vec::new();
        let totals = Totals {
            rxed: 12,
            txed: 10,
            drops: 2,
        };
        Progress::new(false).write(&mut out, &totals).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Rx: 12          Tx: 10          Drops: 2           \n"
        );
    }

    #[test]
    fn interactive_indicator_rotates() {
        let mut progress = Progress::new(true);
        let mut endings = Vec::new();
        for _ in 0..5 {
            let mut out = Vec::new();
            progress.write(&mut out, &Totals::default()).unwrap();
            let line = String::from_utf8(out).unwrap();
            endings.push(line["Rx: 0           Tx: 0           Drops: 0           ".len()..].to_string());
        }
        assert_eq!(
            endings,
            vec!["^ . . .\r", ". ^ . .\r", ". . ^ .\r", ". . . ^\r", "^ . . .\r"]
        );
    }
}
