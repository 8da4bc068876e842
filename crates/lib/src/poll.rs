//! Delivery-state polling: fetch a message until a final state or a deadline.

use crate::client::{ClientError, GatewayClient, MessageRecord};
use std::time::{Duration, Instant};

/// Result of a polling run. Hitting the deadline is not an error: `timed_out`
/// is set and `record` holds the last observed, possibly non-final, state.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub record: MessageRecord,
    pub timed_out: bool,
}

/// Fetch `id` until its state is final or `max_wait` elapses, sleeping
/// `interval` between fetches. The first fetch always happens, even when
/// `max_wait` is shorter than one interval; the deadline is checked after each
/// sleep, so such a call performs exactly one fetch. `on_update` is called
/// with every fetched record. Fetch errors propagate.
pub async fn poll_message(
    client: &GatewayClient,
    id: &str,
    max_wait: Duration,
    interval: Duration,
    on_update: &mut (dyn FnMut(&MessageRecord) + Send),
) -> Result<PollOutcome, ClientError> {
    let deadline = Instant::now() + max_wait;
    let mut last = client.get_message(id).await?;
    on_update(&last);
    while !last.state.is_final() {
        tokio::time::sleep(interval).await;
        if Instant::now() >= deadline {
            break;
        }
        last = client.get_message(id).await?;
        on_update(&last);
    }
    let timed_out = !last.state.is_final();
    Ok(PollOutcome {
        record: last,
        timed_out,
    })
}
