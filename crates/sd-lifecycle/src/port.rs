//! Free local port allocation for forwarded sessions
//!
//! Samples random ports in the configured range and probes each with a
//! short-lived bind. Random sampling reduces collisions with recently
//! released ports compared to a sequential scan.
//!
//! There is no reservation step: the probe socket is released before
//! the forwarding process binds the port, leaving a window in which
//! another process can grab it. This is a known, accepted limitation.

use rand::Rng;
use std::net::TcpListener;

use sd_core::error::LaunchError;
use sd_core::prefs::PortRange;

/// Find a free local port in `[range.start, range.end]`.
///
/// Fails only once the range looks exhausted after a bounded number of
/// probes; callers should treat that as a configuration error, not a
/// retryable condition.
pub fn alloc_port(range: PortRange) -> Result<u16, LaunchError> {
    let exhausted = |attempts| LaunchError::PortRangeExhausted {
        start: range.start,
        end: range.end,
        attempts,
    };

    if range.start > range.end {
        return Err(exhausted(0));
    }

    let size = u32::from(range.end - range.start) + 1;
    // Enough probes that a mostly-free range practically never fails
    let attempts = (size * 4).max(64);

    let mut rng = rand::thread_rng();
    for _ in 0..attempts {
        let port = rng.gen_range(range.start..=range.end);
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            // Probe socket dropped here; the forwarder binds it later
            return Ok(port);
        }
    }

    Err(exhausted(attempts))
}
