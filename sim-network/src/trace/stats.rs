#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStats {
    /// Packets created by applications running on the node
    pub sent: PacketStats,
    /// Packets delivered to applications running on the node
    pub received: PacketStats,
    /// Packets relayed on behalf of other nodes
    pub forwarded: PacketStats,
    pub lost: PacketStats,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PacketStats {
    pub packets: u64,
    pub bytes: u64,
}

impl PacketStats {
    pub fn track_one(&mut self, size_bytes: u32) {
        self.packets += 1;
        self.bytes += size_bytes as u64;
    }
}
