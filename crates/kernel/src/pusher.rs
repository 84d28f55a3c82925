//! Periodic fan-out of the local sync graph to accepted peers.

use crate::config::SNAPSHOT_ROUND_GAP;
use crate::node::Node;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Push the sync graph to every accepted peer on a half-round-gap ticker;
/// run until shutdown. Skipped tick behavior means a slow push cycle simply
/// delays the next one, missed ticks never accumulate into bursts.
pub(crate) async fn run(node: Arc<Node>) {
    let period = Duration::from_nanos(SNAPSHOT_ROUND_GAP / 2);
    let mut graph_tick = tokio::time::interval(period);
    graph_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = node.shutdown_token();

    debug!(?period, "graph pusher started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = graph_tick.tick() => {
                let now = node.clock().now_ns();
                for cn in node.nodes_list_without_state(now, true) {
                    if let Err(err) = node.transport().send_graph_message(cn.id_for_network).await {
                        debug!(peer = %cn.id_for_network, %err, "graph push failed");
                    }
                }
            }
        }
    }
    debug!("graph pusher stopped");
}
