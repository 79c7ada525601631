//! Render packets: the triangle-strip batches geometry natives emit (§6
//! "Host API", glossary "render packet").
//!
//! Grounded on `original_source/app/c/seni_render_packet.c` for the
//! per-packet vertex cap (SPEC_FULL §B "Render packet batching
//! thresholds") — a single native call that would emit more vertices than
//! fit in one packet spills into a new one instead of growing a packet
//! without bound.

/// Matches the original's packet vertex cap so a long triangle strip from a
/// single native (e.g. a many-segment bezier) is split identically.
pub const MAX_VERTICES_PER_PACKET: usize = 4096;

/// One `{vbuf, cbuf, tbuf, num_vertices}` batch (§6).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPacket {
    pub vbuf: Vec<f32>,
    pub cbuf: Vec<f32>,
    pub tbuf: Vec<f32>,
}

impl RenderPacket {
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vbuf.len() / 2
    }

    fn is_full(&self) -> bool {
        self.num_vertices() >= MAX_VERTICES_PER_PACKET
    }
}

/// Sequence of render packets accumulated over one VM run. Natives append
/// vertices through [`RenderBuffer::push_vertex`]; a full packet is closed
/// and a fresh one opened transparently.
#[derive(Debug, Clone, Default)]
pub struct RenderBuffer {
    packets: Vec<RenderPacket>,
}

impl RenderBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.packets.clear();
    }

    #[must_use]
    pub fn packets(&self) -> &[RenderPacket] {
        &self.packets
    }

    #[must_use]
    pub fn total_vertices(&self) -> usize {
        self.packets.iter().map(RenderPacket::num_vertices).sum()
    }

    fn current_mut(&mut self) -> &mut RenderPacket {
        let needs_fresh = match self.packets.last() {
            Some(packet) => packet.is_full(),
            None => true,
        };
        if needs_fresh {
            self.packets.push(RenderPacket::default());
        }
        self.packets.last_mut().expect("just pushed if empty")
    }

    /// Appends one vertex with its colour and UV coordinate, opening a new
    /// packet if the current one is at capacity.
    pub fn push_vertex(&mut self, pos: (f32, f32), colour: [f32; 4], uv: (f32, f32)) {
        let packet = self.current_mut();
        packet.vbuf.push(pos.0);
        packet.vbuf.push(pos.1);
        packet.cbuf.extend_from_slice(&colour);
        packet.tbuf.push(uv.0);
        packet.tbuf.push(uv.1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_vertex_accumulates_into_one_packet() {
        let mut buf = RenderBuffer::new();
        buf.push_vertex((0.0, 0.0), [1.0, 1.0, 1.0, 1.0], (0.0, 0.0));
        buf.push_vertex((1.0, 1.0), [1.0, 1.0, 1.0, 1.0], (1.0, 1.0));
        assert_eq!(buf.packets().len(), 1);
        assert_eq!(buf.packets()[0].num_vertices(), 2);
        assert_eq!(buf.total_vertices(), 2);
    }

    #[test]
    fn packet_splits_once_full() {
        let mut buf = RenderBuffer::new();
        for _ in 0..(MAX_VERTICES_PER_PACKET + 1) {
            buf.push_vertex((0.0, 0.0), [0.0, 0.0, 0.0, 1.0], (0.0, 0.0));
        }
        assert_eq!(buf.packets().len(), 2);
        assert_eq!(buf.packets()[0].num_vertices(), MAX_VERTICES_PER_PACKET);
        assert_eq!(buf.packets()[1].num_vertices(), 1);
    }
}
