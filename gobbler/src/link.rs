// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Waiting for links to come up before forwarding starts.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::shutdown::Shutdown;
use crate::topology::RunContext;

const LINK_POLL_MS: u64 = 100;

/// Time between link polls.
pub const LINK_POLL_INTERVAL: Duration = Duration::from_millis(LINK_POLL_MS);

/// Outcome of waiting for links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkWait {
    AllUp,
    /// The wait ended with these interfaces still down.
    TimedOut { down: Vec<String> },
    /// Shutdown was requested while waiting.
    Aborted,
}

/// Wait up to `timeout_secs` seconds for the link of every interface to come up.
pub fn wait_for_links(ctx: &mut RunContext, timeout_secs: u32, shutdown: &Shutdown) -> LinkWait {
    let polls = u64::from(timeout_secs) * 1000 / LINK_POLL_MS;
    info!("Waiting up to {timeout_secs}s for links");
    poll_links(ctx, polls, LINK_POLL_INTERVAL, shutdown)
}

fn poll_links(
    ctx: &mut RunContext,
    polls: u64,
    interval: Duration,
    shutdown: &Shutdown,
) -> LinkWait {
    for iface in ctx.interfaces_mut() {
        iface.clear_link();
    }
    let mut poll = 0;
    loop {
        if shutdown.is_raised() {
            return LinkWait::Aborted;
        }
        let mut all_up = true;
        for iface in ctx.interfaces_mut() {
            // interfaces already seen up are not queried again
            all_up &= iface.poll_link();
        }
        if all_up {
            info!("All links are up");
            return LinkWait::AllUp;
        }
        if poll >= polls {
            break;
        }
        poll += 1;
        debug!("Links not up yet, poll {poll} of {polls}");
        std::thread::sleep(interval);
    }
    let down: Vec<String> = ctx
        .interfaces()
        .iter()
        .filter(|iface| !iface.link_up())
        .map(|iface| iface.address().to_string())
        .collect();
    warn!("Links still down: {}", down.join(", "));
    LinkWait::TimedOut { down }
}
