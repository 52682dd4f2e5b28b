use crate::config::MonitorConfig;
use crate::display::Display;
use crate::failure::FailureMemory;
use crate::mesh::{AddressTable, Mesh};
use crate::meter::ThroughputMeter;
use crate::prober::Prober;
use crate::transport::Transport;
use crate::view;
use std::io;
use std::time::{Duration, Instant};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

/// The coordinator's monitoring loop.
///
/// Each tick runs, in order: mesh housekeeping, the address service, frame
/// draining, the throughput window, one liveness probe, and a display flush.
/// Everything after the address service works off the table snapshot taken
/// in that same tick.
pub struct Monitor<M: Mesh, T: Transport, D: Display> {
    mesh: M,
    transport: T,
    display: D,
    meter: ThroughputMeter,
    prober: Prober,
    failures: FailureMemory,
    table: AddressTable,
    total_received: u64,
    last_origin: Option<u8>,
    listed: usize,
    tick_interval: Duration,
}

impl<M: Mesh, T: Transport, D: Display> Monitor<M, T, D> {
    pub fn new(mesh: M, transport: T, display: D, config: &MonitorConfig) -> Self {
        Self::starting_at(mesh, transport, display, config, Instant::now())
    }

    pub fn starting_at(
        mesh: M,
        transport: T,
        display: D,
        config: &MonitorConfig,
        start: Instant,
    ) -> Self {
        Self {
            mesh,
            transport,
            display,
            meter: ThroughputMeter::new(start, config.rate_window(), config.frame_bytes),
            prober: Prober::new(start, config.probe_interval()),
            failures: FailureMemory::default(),
            table: AddressTable::default(),
            total_received: 0,
            last_origin: None,
            listed: 0,
            tick_interval: config.tick(),
        }
    }

    pub fn failures(&self) -> &FailureMemory {
        &self.failures
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Runs until SIGINT, SIGTERM or a quit key, then releases the display.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.run_until_stopped().await;
        let restored = self.display.shutdown();
        if let Err(e) = &restored {
            error!("Failed to restore terminal: {}", e);
        }
        result?;
        restored?;
        Ok(())
    }

    async fn run_until_stopped(&mut self) -> anyhow::Result<()> {
        self.display.init()?;
        view::banner(&mut self.display);

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        info!("Monitoring mesh, tick every {:?}", self.tick_interval);

        loop {
            self.tick(Instant::now())?;

            if self.display.stop_requested()? {
                info!("Quit requested, shutting down...");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down...");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One pass of the loop. Only display I/O can fail.
    pub fn tick(&mut self, now: Instant) -> io::Result<()> {
        self.mesh.step();
        self.mesh.address_service_step();
        self.refresh_table();

        if !self.table.is_empty() {
            self.drain_frames();

            if let Some(kbps) = self.meter.tick(now) {
                debug!("Inbound rate {:.2} Kbps", kbps);
                view::data_rate(&mut self.display, kbps);
            }

            if let Some(report) =
                self.prober
                    .tick(now, &self.table, &mut self.transport, &mut self.failures)
            {
                view::probe_result(&mut self.display, &report);
            }
            self.draw_nodes();
        }

        self.display.flush()
    }

    fn refresh_table(&mut self) {
        let table = AddressTable::snapshot(&self.mesh);
        if table != self.table {
            for node in table.joined_since(&self.table) {
                info!("Node {} assigned 0{:o}", node.node_id, node.address);
            }
            for node in self.table.joined_since(&table) {
                info!("Node {} released 0{:o}", node.node_id, node.address);
            }
            if table.is_empty() && self.listed > 0 {
                self.listed = view::node_list(
                    &mut self.display,
                    &table,
                    None,
                    &self.failures,
                    self.listed,
                );
            }
        }
        self.table = table;
    }

    fn drain_frames(&mut self) {
        while self.transport.available() {
            let frame = match self.transport.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Dropping malformed frame: {}", e);
                    continue;
                }
            };
            self.meter.on_frame_received();
            self.total_received += 1;
            self.last_origin = self.table.lookup_by_source_address(frame.header.from_node);
            if self.last_origin.is_none() {
                debug!(
                    "Frame {} from unknown address 0{:o}",
                    frame.header.id, frame.header.from_node
                );
            }

            view::last_payload(&mut self.display, self.total_received, &frame.header);
            self.draw_nodes();
        }
    }

    fn draw_nodes(&mut self) {
        self.listed = view::node_list(
            &mut self.display,
            &self.table,
            self.last_origin,
            &self.failures,
            self.listed,
        );
    }
}
