/// One mesh participant known to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub node_id: u8,
    pub address: u16,
}

/// The address-assignment side of the mesh, as seen by the coordinator.
pub trait Mesh {
    /// Housekeeping: pull frames into internal queues, handle mesh control traffic.
    fn step(&mut self);
    /// Serve pending address requests and reclaim expired assignments.
    fn address_service_step(&mut self);
    /// Current assignments, in assignment order.
    fn current_table(&self) -> &[NodeEntry];
}

/// Read-only snapshot of the mesh address table, taken once per tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTable {
    nodes: Vec<NodeEntry>,
}

impl AddressTable {
    pub fn snapshot(mesh: &impl Mesh) -> Self {
        Self {
            nodes: mesh.current_table().to_vec(),
        }
    }

    pub fn current_nodes(&self) -> &[NodeEntry] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NodeEntry> {
        self.nodes.get(index)
    }

    /// Finds the node that currently owns `address`.
    pub fn lookup_by_source_address(&self, address: u16) -> Option<u8> {
        self.nodes
            .iter()
            .find(|n| n.address == address)
            .map(|n| n.node_id)
    }

    /// Entries present in `self` but not in `previous`, by node id and address.
    pub fn joined_since<'a>(&'a self, previous: &'a AddressTable) -> impl Iterator<Item = &'a NodeEntry> {
        self.nodes.iter().filter(move |n| !previous.nodes.contains(n))
    }
}

impl From<Vec<NodeEntry>> for AddressTable {
    fn from(nodes: Vec<NodeEntry>) -> Self {
        Self { nodes }
    }
}
