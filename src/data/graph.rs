//! Graph records and batch collation
//!
//! A collision event is a graph whose nodes are particles carrying
//! `[px, py, pz, E]`. Batches concatenate events into one disconnected
//! graph so the model sees them in a single forward pass.

use anyhow::Result;
use candle_core::{Device, Tensor};

/// Node feature width: px, py, pz, E
pub const NUM_FEATURES: usize = 4;

/// One collision event
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEvent {
    /// Node features, row-major (num_nodes, NUM_FEATURES)
    x: Vec<f32>,
    num_nodes: usize,
    /// Directed edges as (source, target)
    edge_index: Vec<(u32, u32)>,
}

impl GraphEvent {
    /// Create an event, checking feature and edge bounds
    pub fn new(x: Vec<f32>, num_nodes: usize, edge_index: Vec<(u32, u32)>) -> Result<Self> {
        if x.len() != num_nodes * NUM_FEATURES {
            anyhow::bail!(
                "Node features have {} values, expected {} nodes x {} features",
                x.len(),
                num_nodes,
                NUM_FEATURES
            );
        }
        if let Some(&(s, t)) = edge_index
            .iter()
            .find(|(s, t)| *s as usize >= num_nodes || *t as usize >= num_nodes)
        {
            anyhow::bail!("Edge ({}, {}) out of range for {} nodes", s, t, num_nodes);
        }
        Ok(Self {
            x,
            num_nodes,
            edge_index,
        })
    }

    /// Fully connected event without self loops
    pub fn fully_connected(x: Vec<f32>, num_nodes: usize) -> Result<Self> {
        let mut edges = Vec::with_capacity(num_nodes * num_nodes.saturating_sub(1));
        for s in 0..num_nodes as u32 {
            for t in 0..num_nodes as u32 {
                if s != t {
                    edges.push((s, t));
                }
            }
        }
        Self::new(x, num_nodes, edges)
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    pub fn x(&self) -> &[f32] {
        &self.x
    }

    pub fn edge_index(&self) -> &[(u32, u32)] {
        &self.edge_index
    }
}

/// Several events merged into one graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBatch {
    /// Stacked node features, row-major (num_nodes, NUM_FEATURES)
    pub x: Vec<f32>,
    pub num_nodes: usize,
    /// Edge sources, offset into the batch node range
    pub sources: Vec<u32>,
    /// Edge targets, offset into the batch node range
    pub targets: Vec<u32>,
    /// Event index of each node
    pub batch: Vec<u32>,
    pub num_graphs: usize,
}

impl GraphBatch {
    /// Concatenate events, shifting each event's edges by the nodes before it
    pub fn collate(events: &[&GraphEvent]) -> Self {
        let num_nodes: usize = events.iter().map(|e| e.num_nodes).sum();
        let num_edges: usize = events.iter().map(|e| e.edge_index.len()).sum();

        let mut x = Vec::with_capacity(num_nodes * NUM_FEATURES);
        let mut sources = Vec::with_capacity(num_edges);
        let mut targets = Vec::with_capacity(num_edges);
        let mut batch = Vec::with_capacity(num_nodes);

        let mut offset = 0u32;
        for (graph_idx, event) in events.iter().enumerate() {
            x.extend_from_slice(&event.x);
            for &(s, t) in &event.edge_index {
                sources.push(s + offset);
                targets.push(t + offset);
            }
            batch.extend(std::iter::repeat(graph_idx as u32).take(event.num_nodes));
            offset += event.num_nodes as u32;
        }

        Self {
            x,
            num_nodes,
            sources,
            targets,
            batch,
            num_graphs: events.len(),
        }
    }

    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }

    /// Node features as a (num_nodes, NUM_FEATURES) tensor
    pub fn features(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.x, (self.num_nodes, NUM_FEATURES), device)?)
    }

    /// Edge sources and targets as u32 tensors
    pub fn edge_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let sources = Tensor::from_slice(&self.sources, self.sources.len(), device)?;
        let targets = Tensor::from_slice(&self.targets, self.targets.len(), device)?;
        Ok((sources, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(num_nodes: usize, value: f32) -> GraphEvent {
        GraphEvent::fully_connected(vec![value; num_nodes * NUM_FEATURES], num_nodes).unwrap()
    }

    #[test]
    fn test_event_rejects_bad_shapes() {
        assert!(GraphEvent::new(vec![0.0; 7], 2, vec![]).is_err());
        assert!(GraphEvent::new(vec![0.0; 8], 2, vec![(0, 2)]).is_err());
        assert!(GraphEvent::new(vec![0.0; 8], 2, vec![(0, 1)]).is_ok());
    }

    #[test]
    fn test_fully_connected_edges() {
        let e = event(3, 1.0);
        assert_eq!(e.num_edges(), 6);
        assert!(e.edge_index().iter().all(|(s, t)| s != t));
    }

    #[test]
    fn test_collate_offsets_edges() {
        let a = event(2, 1.0);
        let b = event(3, 2.0);
        let batch = GraphBatch::collate(&[&a, &b]);

        assert_eq!(batch.num_nodes, 5);
        assert_eq!(batch.num_graphs, 2);
        assert_eq!(batch.num_edges(), 2 + 6);
        assert_eq!(batch.batch, vec![0, 0, 1, 1, 1]);
        // Second event's edges land in 2..5
        assert!(batch.sources[2..].iter().all(|&s| (2..5).contains(&s)));
        assert!(batch.targets[2..].iter().all(|&t| (2..5).contains(&t)));
        assert_eq!(&batch.x[..8], &[1.0; 8]);
        assert_eq!(&batch.x[8..], &[2.0; 12]);
    }

    #[test]
    fn test_batch_tensors() {
        let batch = GraphBatch::collate(&[&event(2, 0.5)]);
        let x = batch.features(&Device::Cpu).unwrap();
        assert_eq!(x.dims(), &[2, NUM_FEATURES]);
        let (s, t) = batch.edge_tensors(&Device::Cpu).unwrap();
        assert_eq!(s.to_vec1::<u32>().unwrap(), vec![0, 1]);
        assert_eq!(t.to_vec1::<u32>().unwrap(), vec![1, 0]);
    }
}
