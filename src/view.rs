//! Fixed screen layout of the monitor. Left column: last payload, data rate,
//! totals and ping results. Right column: address assignments.

use crate::display::{Display, Style};
use crate::failure::FailureMemory;
use crate::mesh::AddressTable;
use crate::prober::{ProbeOutcome, ProbeReport};
use crate::protocol::{octal, NetworkHeader};

pub const BANNER: &str = "meshwatch: coordinator node monitor (q to quit)";

pub const PAYLOAD_ROW: u16 = 2;
pub const RATE_ROW: u16 = 7;
pub const TOTAL_ROW: u16 = 9;
pub const PING_ROW: u16 = 11;

pub const NODES_ROW: u16 = 2;
const NODES_HEADING_COL: u16 = 27;
pub const NODES_COL: u16 = 28;
const NODE_WIDTH: usize = 24;

pub fn banner(d: &mut impl Display) {
    d.write_at(0, 0, BANNER, Style::Banner);
}

/// Header fields of the frame just read, plus the running total.
pub fn last_payload(d: &mut impl Display, total: u64, header: &NetworkHeader) {
    d.write_at(TOTAL_ROW, 0, &format!(" Total: {:<10}", total), Style::Normal);
    d.write_at(PAYLOAD_ROW, 0, "[Last Payload Info]", Style::Heading);
    d.write_at(
        PAYLOAD_ROW + 1,
        0,
        &format!(" HeaderID: {:<6}", header.id),
        Style::Normal,
    );
    d.write_at(
        PAYLOAD_ROW + 2,
        0,
        &format!(" Type: {:<4}", u8::from(header.msg_type)),
        Style::Normal,
    );
    d.write_at(
        PAYLOAD_ROW + 3,
        0,
        &format!(" From: {:<7}", octal(header.from_node)),
        Style::Normal,
    );
}

pub fn data_rate(d: &mut impl Display, kbps: f64) {
    d.write_at(RATE_ROW, 0, "[Data Rate (In)]", Style::Heading);
    d.write_at(RATE_ROW + 1, 0, &format!(" Kbps: {:<8.2}", kbps), Style::Normal);
}

pub fn probe_result(d: &mut impl Display, report: &ProbeReport) {
    d.write_at(PING_ROW, 0, "[Ping Test]", Style::Heading);
    d.write_at(
        PING_ROW + 1,
        0,
        &format!(" ID:{:<6}", report.node.node_id),
        Style::Normal,
    );
    d.write_at(
        PING_ROW + 2,
        0,
        &format!(" Net:{:<7}", octal(report.node.address)),
        Style::Normal,
    );
    d.write_at(
        PING_ROW + 3,
        0,
        &format!(" Time:{:<12}", format!("{}ms", report.elapsed.as_millis())),
        Style::Normal,
    );
    match report.outcome {
        ProbeOutcome::Ok => d.write_at(PING_ROW + 4, 0, " OK  ", Style::Normal),
        ProbeOutcome::Failed => d.write_at(PING_ROW + 4, 0, " FAIL", Style::Emphasis),
    }
}

/// Draws the address table and blanks rows left over from a longer one.
/// Returns the number of rows now listed.
pub fn node_list(
    d: &mut impl Display,
    table: &AddressTable,
    highlight: Option<u8>,
    failures: &FailureMemory,
    previously_listed: usize,
) -> usize {
    d.write_at(
        NODES_ROW,
        NODES_HEADING_COL,
        "[Address Assignments]",
        Style::Heading,
    );

    let mut row = NODES_ROW + 1;
    for node in table.current_nodes() {
        let style = if failures.is_failed(node.node_id) {
            Style::Failure
        } else if highlight == Some(node.node_id) {
            Style::Highlight
        } else {
            Style::Normal
        };
        let line = format!("ID: {}  Network: {}", node.node_id, octal(node.address));
        d.write_at(row, NODES_COL, &format!("{:<NODE_WIDTH$}", line), style);
        row += 1;
    }
    for _ in table.len()..previously_listed {
        d.write_at(row, NODES_COL, &" ".repeat(NODE_WIDTH), Style::Normal);
        row += 1;
    }
    table.len()
}
