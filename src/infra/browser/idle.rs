use std::{collections::HashSet, pin::pin, time::Duration};

use futures::{Stream, StreamExt};

/// Requests the page has started but not yet finished or failed.
#[derive(Debug, Default)]
struct InflightRequests {
    ids: HashSet<String>,
}

impl InflightRequests {
    fn begin(&mut self, id: String) {
        self.ids.insert(id);
    }

    fn end(&mut self, id: &str) {
        self.ids.remove(id);
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve once no request has been in flight for `quiet`.
///
/// Each stream yields request ids: `started` for every outgoing request, `finished` and
/// `failed` when one completes. Any event restarts the quiet window. If every stream ends
/// the page is gone and there is nothing left to wait for.
pub async fn wait_for_network_idle<S, F, E>(started: S, finished: F, failed: E, quiet: Duration)
where
    S: Stream<Item = String>,
    F: Stream<Item = String>,
    E: Stream<Item = String>,
{
    let mut started = pin!(started);
    let mut finished = pin!(finished);
    let mut failed = pin!(failed);
    let mut inflight = InflightRequests::default();

    loop {
        let settled = inflight.is_empty();
        tokio::select! {
            Some(id) = started.next() => inflight.begin(id),
            Some(id) = finished.next() => inflight.end(&id),
            Some(id) = failed.next() => inflight.end(&id),
            _ = tokio::time::sleep(quiet), if settled => return,
            else => return,
        }
    }
}
