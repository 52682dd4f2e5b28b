use crate::failure::FailureMemory;
use crate::mesh::{AddressTable, NodeEntry};
use crate::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub node: NodeEntry,
    pub elapsed: Duration,
    pub outcome: ProbeOutcome,
}

/// Round-robin liveness checks, one node per interval.
pub struct Prober {
    cursor: usize,
    last_probe: Instant,
    interval: Duration,
}

impl Prober {
    pub fn new(start: Instant, interval: Duration) -> Self {
        Self {
            cursor: 0,
            last_probe: start,
            interval,
        }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Probes at most one node, if the interval has passed and there is anyone to probe.
    pub fn tick(
        &mut self,
        now: Instant,
        table: &AddressTable,
        transport: &mut impl Transport,
        failures: &mut FailureMemory,
    ) -> Option<ProbeReport> {
        // Keep the cursor inside the current table even on ticks that don't probe.
        if self.cursor >= table.len() {
            self.cursor = 0;
        }
        if table.is_empty() || now.saturating_duration_since(self.last_probe) <= self.interval {
            return None;
        }
        let node = *table.get(self.cursor)?;

        let report = probe(node, transport);
        match report.outcome {
            ProbeOutcome::Ok => {
                if failures.is_failed(node.node_id) {
                    info!("Node {} is reachable again", node.node_id);
                }
                failures.record_success(node.node_id);
            }
            ProbeOutcome::Failed => {
                warn!(
                    "Probe to node {} at 0{:o} failed after {:?}",
                    node.node_id, node.address, report.elapsed
                );
                failures.record_failure(node.node_id);
            }
        }

        self.cursor = (self.cursor + 1) % table.len();
        self.last_probe = now;
        Some(report)
    }
}

fn probe(node: NodeEntry, transport: &mut impl Transport) -> ProbeReport {
    let started = Instant::now();
    // Address 0 is the coordinator itself.
    let ok = node.address == 0 || transport.send_probe(node.address);
    let elapsed = started.elapsed();
    debug!("Probed node {} in {:?}: ok={}", node.node_id, elapsed, ok);

    ProbeReport {
        node,
        elapsed,
        outcome: if ok {
            ProbeOutcome::Ok
        } else {
            ProbeOutcome::Failed
        },
    }
}
