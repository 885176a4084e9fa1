//! Render graph: machines wired into a pullable signal chain.
//!
//! Construction hands back typed handles to the instrument and the sink, so
//! callers never have to scan nodes by type to find them again.

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use ms_ir::{AudioBuffer, EventKind};

use crate::error::{GraphConfigError, RenderError};
use crate::frame::Frame;
use crate::machine::{Machine, MachineType, Property};
use crate::machines::{OutputMachine, SynthMachine};

new_key_type! {
    /// Node identifier in the render graph.
    pub struct NodeKey;
}

/// Handle to the instrument node that receives MIDI events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SynthHandle(NodeKey);

/// Handle to the output node the renderer pulls from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkHandle(NodeKey);

impl SynthHandle {
    pub fn key(self) -> NodeKey {
        self.0
    }
}

impl SinkHandle {
    pub fn key(self) -> NodeKey {
        self.0
    }
}

/// Directed audio connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub from: NodeKey,
    pub to: NodeKey,
}

/// A graph of machines with per-node output buffers.
pub struct RenderGraph {
    nodes: SlotMap<NodeKey, Box<dyn Machine>>,
    connections: Vec<Connection>,
    /// Output buffer for each node from the last pull.
    outputs: SecondaryMap<NodeKey, AudioBuffer>,
    /// Interleaved result of the last pull.
    frames: Vec<Frame>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            connections: Vec::new(),
            outputs: SecondaryMap::new(),
            frames: Vec::new(),
        }
    }

    /// The default graph with the built-in oscillator synth.
    pub fn build() -> (Self, SynthHandle, SinkHandle) {
        Self::with_instrument(Box::new(SynthMachine::new()))
    }

    /// The default playback graph: `instrument → hardware output`.
    pub fn with_instrument(instrument: Box<dyn Machine>) -> (Self, SynthHandle, SinkHandle) {
        let mut graph = Self::new();
        let synth = graph.add_node(instrument);
        let sink = graph.add_node(Box::new(OutputMachine::hardware()));
        graph.connect(synth, sink);
        (graph, SynthHandle(synth), SinkHandle(sink))
    }

    pub fn add_node(&mut self, machine: Box<dyn Machine>) -> NodeKey {
        self.nodes.insert(machine)
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<Box<dyn Machine>> {
        self.connections.retain(|c| c.from != key && c.to != key);
        self.outputs.remove(key);
        self.nodes.remove(key)
    }

    pub fn connect(&mut self, from: NodeKey, to: NodeKey) {
        self.connections.push(Connection { from, to });
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn machine_type(&self, key: NodeKey) -> Option<MachineType> {
        self.nodes.get(key).map(|m| m.info().machine_type)
    }

    pub fn node_name(&self, key: NodeKey) -> Option<&'static str> {
        self.nodes.get(key).map(|m| m.info().name)
    }

    /// Find the single node of `kind`.
    pub fn find_unique(&self, kind: MachineType) -> Result<NodeKey, GraphConfigError> {
        let mut found = self
            .nodes
            .iter()
            .filter(|(_, m)| m.info().machine_type == kind)
            .map(|(key, _)| key);
        let first = found.next().ok_or(GraphConfigError::Missing(kind))?;
        let extra = found.count();
        if extra > 0 {
            return Err(GraphConfigError::Ambiguous { kind, count: extra + 1 });
        }
        Ok(first)
    }

    fn expect_type(&self, key: NodeKey, kind: MachineType) -> Result<NodeKey, GraphConfigError> {
        match self.machine_type(key) {
            Some(t) if t == kind => Ok(key),
            _ => Err(GraphConfigError::StaleHandle(kind)),
        }
    }

    /// Swap the sink for a generic (non-hardware) output, keeping its inputs.
    ///
    /// Returns the handle of the replacement node; the old handle is dead.
    /// The graph must hold exactly one output, and `sink` must be it.
    pub fn use_generic_output(&mut self, sink: SinkHandle) -> Result<SinkHandle, GraphConfigError> {
        let old = self.find_unique(MachineType::Output)?;
        if old != sink.0 {
            return Err(GraphConfigError::StaleHandle(MachineType::Output));
        }
        let inputs: Vec<NodeKey> = self
            .connections
            .iter()
            .filter(|c| c.to == old)
            .map(|c| c.from)
            .collect();
        self.remove_node(old);
        let new = self.add_node(Box::new(OutputMachine::generic()));
        for from in inputs {
            self.connect(from, new);
        }
        Ok(SinkHandle(new))
    }

    /// Set a property on the instrument.
    pub fn set_synth_property(&mut self, synth: SynthHandle, property: Property) -> Result<(), RenderError> {
        let key = self.expect_type(synth.0, MachineType::Instrument)?;
        match self.nodes.get_mut(key) {
            Some(machine) => machine.set_property(property),
            None => Err(GraphConfigError::StaleHandle(MachineType::Instrument).into()),
        }
    }

    /// Set a property on every node in the graph.
    pub fn set_property_all(&mut self, property: Property) -> Result<(), RenderError> {
        for machine in self.nodes.values_mut() {
            machine.set_property(property)?;
        }
        Ok(())
    }

    /// Queue a MIDI event for the instrument, `offset` frames into the next pull.
    pub fn send_event(&mut self, synth: SynthHandle, offset: usize, event: &EventKind) -> Result<(), GraphConfigError> {
        let key = self.expect_type(synth.0, MachineType::Instrument)?;
        if let Some(machine) = self.nodes.get_mut(key) {
            machine.handle_event(offset, event);
        }
        Ok(())
    }

    /// Silence every machine.
    pub fn stop(&mut self) {
        for machine in self.nodes.values_mut() {
            machine.stop();
        }
    }

    /// Render `frames` frames through the graph and return the sink's output.
    pub fn pull(&mut self, sink: SinkHandle, frames: usize) -> Result<&[Frame], RenderError> {
        let sink = self.expect_type(sink.0, MachineType::Output)?;

        for key in topological_sort(&self.nodes, &self.connections) {
            let mut buf = self
                .outputs
                .remove(key)
                .unwrap_or_else(|| AudioBuffer::stereo(frames));
            buf.resize(frames);
            gather_inputs(&self.connections, &self.outputs, key, &mut buf);
            if let Some(machine) = self.nodes.get_mut(key) {
                machine.work(&mut buf)?;
            }
            self.outputs.insert(key, buf);
        }

        self.frames.clear();
        match self.outputs.get(sink) {
            Some(out) if out.channels() >= 2 => {
                let (left, right) = (out.channel(0), out.channel(1));
                self.frames
                    .extend(left.iter().zip(right).map(|(&l, &r)| Frame::from_f32(l, r)));
            }
            Some(out) => {
                self.frames
                    .extend(out.channel(0).iter().map(|&s| Frame::from_f32(s, s)));
            }
            None => self.frames.resize(frames, Frame::silence()),
        }
        Ok(&self.frames)
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Topological sort via Kahn's algorithm.
///
/// Returns nodes ordered so that every source appears before its consumers.
/// Nodes on a cycle are left out.
pub fn topological_sort(
    nodes: &SlotMap<NodeKey, Box<dyn Machine>>,
    connections: &[Connection],
) -> Vec<NodeKey> {
    let mut in_degree: SecondaryMap<NodeKey, u32> = nodes.keys().map(|k| (k, 0)).collect();
    for conn in connections {
        if let Some(d) = in_degree.get_mut(conn.to) {
            *d += 1;
        }
    }

    let mut queue: Vec<NodeKey> = nodes.keys().filter(|&k| in_degree[k] == 0).collect();
    queue.reverse();
    let mut result = Vec::with_capacity(nodes.len());

    while let Some(key) = queue.pop() {
        result.push(key);
        for conn in connections.iter().filter(|c| c.from == key) {
            if let Some(d) = in_degree.get_mut(conn.to) {
                *d -= 1;
                if *d == 0 {
                    queue.push(conn.to);
                }
            }
        }
    }
    result
}

/// Sum the outputs of every node feeding `key` into `scratch`.
fn gather_inputs(
    connections: &[Connection],
    outputs: &SecondaryMap<NodeKey, AudioBuffer>,
    key: NodeKey,
    scratch: &mut AudioBuffer,
) {
    for conn in connections.iter().filter(|c| c.to == key) {
        if let Some(src) = outputs.get(conn.from) {
            scratch.mix_from(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_graph(rate: u32) -> (RenderGraph, SynthHandle, SinkHandle) {
        let (mut graph, synth, sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        let sink = graph.use_generic_output(sink).unwrap();
        graph.set_property_all(Property::SampleRate(rate)).unwrap();
        graph.set_property_all(Property::MaxFramesPerSlice(512)).unwrap();
        graph.set_synth_property(synth, Property::OfflineRender(true)).unwrap();
        (graph, synth, sink)
    }

    #[test]
    fn default_graph_has_one_of_each() {
        let (graph, synth, sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.find_unique(MachineType::Instrument), Ok(synth.key()));
        assert_eq!(graph.find_unique(MachineType::Output), Ok(sink.key()));
    }

    #[test]
    fn find_unique_reports_missing_and_ambiguous() {
        let mut graph = RenderGraph::new();
        assert_eq!(
            graph.find_unique(MachineType::Output),
            Err(GraphConfigError::Missing(MachineType::Output))
        );
        graph.add_node(Box::new(OutputMachine::generic()));
        graph.add_node(Box::new(OutputMachine::generic()));
        assert_eq!(
            graph.find_unique(MachineType::Output),
            Err(GraphConfigError::Ambiguous { kind: MachineType::Output, count: 2 })
        );
    }

    #[test]
    fn generic_output_needs_a_single_sink() {
        let (mut graph, _synth, sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        graph.add_node(Box::new(OutputMachine::hardware()));
        assert_eq!(
            graph.use_generic_output(sink),
            Err(GraphConfigError::Ambiguous { kind: MachineType::Output, count: 2 })
        );

        let mut graph = RenderGraph::new();
        let synth = graph.add_node(Box::new(SynthMachine::new()));
        let sink = graph.add_node(Box::new(OutputMachine::hardware()));
        graph.remove_node(sink);
        assert_eq!(
            graph.use_generic_output(SinkHandle(sink)),
            Err(GraphConfigError::Missing(MachineType::Output))
        );
        assert_eq!(graph.machine_type(synth), Some(MachineType::Instrument));
    }

    #[test]
    fn hardware_sink_cannot_be_pulled() {
        let (mut graph, synth, sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        graph.set_property_all(Property::SampleRate(16000)).unwrap();
        graph.set_synth_property(synth, Property::OfflineRender(true)).unwrap();
        assert!(matches!(graph.pull(sink, 64), Err(RenderError::HardwareOutput)));
    }

    #[test]
    fn generic_output_keeps_connections_and_kills_old_handle() {
        let (mut graph, synth, old_sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        let sink = graph.use_generic_output(old_sink).unwrap();
        assert_ne!(sink, old_sink);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connections(), &[Connection { from: synth.key(), to: sink.key() }]);
        assert_eq!(graph.node_name(sink.key()), Some("Generic Output"));
        assert!(graph.use_generic_output(old_sink).is_err());
    }

    #[test]
    fn pull_renders_synth_through_sink() {
        let (mut graph, synth, sink) = offline_graph(16000);
        graph
            .send_event(synth, 0, &EventKind::NoteOn { channel: 0, note: 69, velocity: 127 })
            .unwrap();
        let frames = graph.pull(sink, 512).unwrap();
        assert_eq!(frames.len(), 512);
        assert!(frames.iter().any(|f| !f.is_silent()));
    }

    #[test]
    fn pull_without_events_is_silent() {
        let (mut graph, _synth, sink) = offline_graph(16000);
        let frames = graph.pull(sink, 256).unwrap();
        assert_eq!(frames.len(), 256);
        assert!(frames.iter().all(Frame::is_silent));
    }

    #[test]
    fn sources_sort_before_sink() {
        let (graph, synth, sink) = RenderGraph::with_instrument(Box::new(SynthMachine::new()));
        let order = topological_sort(&graph.nodes, &graph.connections);
        assert_eq!(order, vec![synth.key(), sink.key()]);
    }
}
