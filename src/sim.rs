//! In-process stand-in for the radio mesh, so the monitor can run without hardware.
//!
//! Child nodes join one at a time, get tree addresses from the coordinator's
//! address service, send fixed-size frames at a jittered rate and answer
//! pings with a configurable loss rate.

use crate::config::SimConfig;
use crate::mesh::{Mesh, NodeEntry};
use crate::protocol::{Frame, MessageType, NetworkHeader, ProtocolError};
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Message type used for sensor payloads.
const SENSOR_MSG_TYPE: u8 = 65;

/// Deepest level of the address tree handed out.
const MAX_DEPTH: u32 = 4;

/// Children per parent in the address tree (octal digits 1..=5).
const CHILDREN_PER_NODE: u16 = 5;

#[derive(Debug, Clone, Copy)]
enum NodeState {
    Waiting,
    Assigned {
        address: u16,
        leased_at: Instant,
        next_frame: Instant,
    },
}

struct SimNode {
    node_id: u8,
    state: NodeState,
}

pub struct SimWorld {
    rng: StdRng,
    nodes: Vec<SimNode>,
    table: Vec<NodeEntry>,
    inbox: VecDeque<Bytes>,
    next_join: Instant,
    next_frame_id: u16,
    join_interval: Duration,
    lease: Option<Duration>,
    frame_interval: Duration,
    probe_loss: f64,
    probe_latency: Duration,
    payload_len: usize,
}

impl SimWorld {
    pub fn new(cfg: &SimConfig, frame_bytes: usize, start: Instant) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            nodes: (1..=cfg.nodes)
                .map(|node_id| SimNode {
                    node_id,
                    state: NodeState::Waiting,
                })
                .collect(),
            table: Vec::new(),
            inbox: VecDeque::new(),
            next_join: start,
            next_frame_id: 0,
            join_interval: Duration::from_millis(cfg.join_interval_ms),
            lease: cfg.lease_ms.map(Duration::from_millis),
            frame_interval: Duration::from_millis(cfg.frame_interval_ms),
            probe_loss: cfg.probe_loss,
            probe_latency: Duration::from_millis(cfg.probe_latency_ms),
            payload_len: frame_bytes.saturating_sub(NetworkHeader::SIZE),
        }
    }

    pub fn table(&self) -> &[NodeEntry] {
        &self.table
    }

    pub fn queued(&self) -> usize {
        self.inbox.len()
    }

    /// Queues a frame from every node whose send timer has fired.
    pub fn emit_frames(&mut self, now: Instant) {
        for i in 0..self.nodes.len() {
            let NodeState::Assigned {
                address,
                leased_at,
                next_frame,
            } = self.nodes[i].state
            else {
                continue;
            };
            if now < next_frame {
                continue;
            }
            let node_id = self.nodes[i].node_id;
            let packet = self.sensor_frame(node_id, address);
            self.inbox.push_back(packet);
            let next_frame = now + self.jittered(self.frame_interval);
            self.nodes[i].state = NodeState::Assigned {
                address,
                leased_at,
                next_frame,
            };
        }
    }

    /// Expires old leases, then admits at most one waiting node.
    pub fn serve_addresses(&mut self, now: Instant) {
        if let Some(lease) = self.lease {
            for node in &mut self.nodes {
                if let NodeState::Assigned {
                    address, leased_at, ..
                } = node.state
                {
                    if now.saturating_duration_since(leased_at) >= lease {
                        debug!("Lease for node {} at 0{:o} expired", node.node_id, address);
                        node.state = NodeState::Waiting;
                        self.table.retain(|e| e.node_id != node.node_id);
                    }
                }
            }
        }

        if now < self.next_join {
            return;
        }
        let Some(idx) = self
            .nodes
            .iter()
            .position(|n| matches!(n.state, NodeState::Waiting))
        else {
            return;
        };
        let Some(address) = self.free_address() else {
            return;
        };

        let node_id = self.nodes[idx].node_id;
        let next_frame = now + self.jittered(self.frame_interval);
        self.nodes[idx].state = NodeState::Assigned {
            address,
            leased_at: now,
            next_frame,
        };
        self.table.push(NodeEntry { node_id, address });
        self.next_join = now + self.join_interval;
        debug!("Assigned 0{:o} to node {}", address, node_id);
    }

    pub fn pop_frame(&mut self) -> Option<Bytes> {
        self.inbox.pop_front()
    }

    /// Whether a ping packet gets through. Unassigned addresses never answer.
    pub fn deliver_probe(&mut self, mut packet: Bytes) -> bool {
        let header = match NetworkHeader::decode(&mut packet) {
            Ok(header) if header.msg_type == MessageType::Ping => header,
            _ => return false,
        };
        let assigned = self.table.iter().any(|e| e.address == header.to_node);
        assigned && !self.rng.gen_bool(self.probe_loss)
    }

    fn next_frame_id(&mut self) -> u16 {
        let id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        id
    }

    pub fn probe_latency(&self) -> Duration {
        self.probe_latency
    }

    fn free_address(&self) -> Option<u16> {
        tree_addresses().find(|a| !self.table.iter().any(|e| e.address == *a))
    }

    fn jittered(&mut self, base: Duration) -> Duration {
        base.mul_f64(self.rng.gen_range(0.5..1.5))
    }

    fn sensor_frame(&mut self, node_id: u8, address: u16) -> Bytes {
        let id = self.next_frame_id();
        let mut payload = vec![0u8; self.payload_len];
        self.rng.fill(&mut payload[..]);
        if let Some(first) = payload.first_mut() {
            *first = node_id;
        }
        Frame {
            header: NetworkHeader {
                from_node: address,
                to_node: 0,
                id,
                msg_type: MessageType::Other(SENSOR_MSG_TYPE),
            },
            payload: Bytes::from(payload),
        }
        .encode()
    }
}

/// Mesh addresses in breadth-first order: 01..05, then 011, 021, .. 055, and so on.
///
/// Each level adds one octal digit above the parent's address.
pub fn tree_addresses() -> impl Iterator<Item = u16> {
    let mut levels: Vec<Vec<u16>> = vec![vec![0]];
    for depth in 0..MAX_DEPTH {
        let parents = &levels[depth as usize];
        let next: Vec<u16> = parents
            .iter()
            .flat_map(|&parent| {
                (1..=CHILDREN_PER_NODE).map(move |child| parent | (child << (3 * depth)))
            })
            .collect();
        levels.push(next);
    }
    levels.into_iter().skip(1).flatten()
}

pub type SharedWorld = Rc<RefCell<SimWorld>>;

/// Builds a mesh/transport pair backed by one simulated world.
pub fn simulated(cfg: &SimConfig, frame_bytes: usize) -> (SimMesh, SimTransport) {
    let world = Rc::new(RefCell::new(SimWorld::new(cfg, frame_bytes, Instant::now())));
    (
        SimMesh {
            world: world.clone(),
            table: Vec::new(),
        },
        SimTransport { world },
    )
}

pub struct SimMesh {
    world: SharedWorld,
    table: Vec<NodeEntry>,
}

impl Mesh for SimMesh {
    fn step(&mut self) {
        self.world.borrow_mut().emit_frames(Instant::now());
    }

    fn address_service_step(&mut self) {
        let mut world = self.world.borrow_mut();
        world.serve_addresses(Instant::now());
        if world.table() != self.table.as_slice() {
            self.table = world.table().to_vec();
        }
    }

    fn current_table(&self) -> &[NodeEntry] {
        &self.table
    }
}

pub struct SimTransport {
    world: SharedWorld,
}

impl Transport for SimTransport {
    fn available(&mut self) -> bool {
        self.world.borrow().queued() > 0
    }

    fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        let packet = self
            .world
            .borrow_mut()
            .pop_frame()
            .ok_or(ProtocolError::PacketTooShort(0))?;
        Frame::decode(packet)
    }

    fn send_probe(&mut self, address: u16) -> bool {
        let mut world = self.world.borrow_mut();
        let header = NetworkHeader::ping(0, address, world.next_frame_id());
        let mut packet = BytesMut::with_capacity(NetworkHeader::SIZE);
        header.encode(&mut packet);

        std::thread::sleep(world.probe_latency());
        world.deliver_probe(packet.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            nodes: 3,
            join_interval_ms: 100,
            lease_ms: None,
            frame_interval_ms: 50,
            probe_loss: 0.0,
            probe_latency_ms: 0,
            seed: Some(42),
        }
    }

    fn ping(address: u16) -> Bytes {
        let mut buf = BytesMut::new();
        NetworkHeader::ping(0, address, 0).encode(&mut buf);
        buf.freeze()
    }

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_tree_address_order() {
        let addrs: Vec<u16> = tree_addresses().take(8).collect();
        assert_eq!(addrs, vec![0o1, 0o2, 0o3, 0o4, 0o5, 0o11, 0o21, 0o31]);
        assert_eq!(tree_addresses().nth(29), Some(0o55));
        assert_eq!(tree_addresses().count(), 5 + 25 + 125 + 625);
    }

    #[test]
    fn test_nodes_join_one_per_interval() {
        let t0 = Instant::now();
        let mut world = SimWorld::new(&config(), 32, t0);

        world.serve_addresses(t0);
        world.serve_addresses(ms(t0, 50));
        assert_eq!(world.table(), &[NodeEntry { node_id: 1, address: 0o1 }]);

        world.serve_addresses(ms(t0, 100));
        world.serve_addresses(ms(t0, 200));
        world.serve_addresses(ms(t0, 300));
        let ids: Vec<u8> = world.table().iter().map(|e| e.node_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_leases_expire_and_addresses_are_reused() {
        let t0 = Instant::now();
        let mut cfg = config();
        cfg.nodes = 2;
        cfg.lease_ms = Some(150);
        let mut world = SimWorld::new(&cfg, 32, t0);

        world.serve_addresses(t0);
        world.serve_addresses(ms(t0, 100));
        assert_eq!(world.table().len(), 2);

        // Node 1's lease runs out; it rejoins and takes the lowest free address again.
        world.serve_addresses(ms(t0, 200));
        assert_eq!(
            world.table(),
            &[
                NodeEntry { node_id: 2, address: 0o2 },
                NodeEntry { node_id: 1, address: 0o1 },
            ]
        );
    }

    #[test]
    fn test_frames_decode_with_sender_address() {
        let t0 = Instant::now();
        let mut world = SimWorld::new(&config(), 32, t0);
        world.serve_addresses(t0);
        world.emit_frames(ms(t0, 100));

        let packet = world.pop_frame().expect("a frame");
        assert_eq!(packet.len(), 32);
        let frame = Frame::decode(packet).unwrap();
        assert_eq!(frame.header.from_node, 0o1);
        assert_eq!(frame.header.msg_type, MessageType::Other(SENSOR_MSG_TYPE));
        assert_eq!(frame.payload[0], 1);
        assert!(world.pop_frame().is_none());
    }

    #[test]
    fn test_probe_delivery() {
        let t0 = Instant::now();
        let mut world = SimWorld::new(&config(), 32, t0);
        world.serve_addresses(t0);
        assert!(world.deliver_probe(ping(0o1)));
        assert!(!world.deliver_probe(ping(0o2)));
        assert!(!world.deliver_probe(Bytes::from_static(&[0, 0])));

        let sensor = Frame {
            header: NetworkHeader {
                from_node: 0,
                to_node: 0o1,
                id: 1,
                msg_type: MessageType::Other(SENSOR_MSG_TYPE),
            },
            payload: Bytes::new(),
        };
        assert!(!world.deliver_probe(sensor.encode()));

        let mut lossy = config();
        lossy.probe_loss = 1.0;
        let mut world = SimWorld::new(&lossy, 32, t0);
        world.serve_addresses(t0);
        assert!(!world.deliver_probe(ping(0o1)));
    }

    #[test]
    fn test_shared_world_pair() {
        let mut cfg = config();
        cfg.join_interval_ms = 0;
        let (mut mesh, mut transport) = simulated(&cfg, 32);

        assert!(mesh.current_table().is_empty());
        mesh.address_service_step();
        assert_eq!(mesh.current_table().len(), 1);
        assert!(transport.send_probe(0o1));
        assert!(!transport.available());
        assert!(transport.read_frame().is_err());
    }
}
