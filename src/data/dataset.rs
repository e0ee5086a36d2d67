//! Graph dataset stored as safetensors chunks
//!
//! Layout under the dataset root:
//!
//! ```text
//! <root>/processed/data_0.safetensors
//! <root>/processed/data_1.safetensors
//! ...
//! ```
//!
//! Each chunk holds events keyed by a per-chunk integer `k`:
//! `<k>.x` (f32, shape (n, 4)) and `<k>.edge_index` (i64, shape (2, E)).
//! Chunks are read in file-name order, events in numeric key order.

use anyhow::{Context, Result};
use candle_core::{safetensors, DType, Device, Tensor};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::graph::{GraphEvent, NUM_FEATURES};

/// Subdirectory of the dataset root holding chunk files
pub const PROCESSED_DIR: &str = "processed";

/// In-memory collection of collision events
#[derive(Debug, Clone, Default)]
pub struct GraphDataset {
    events: Vec<GraphEvent>,
}

impl GraphDataset {
    /// Build from already loaded events
    pub fn from_events(events: Vec<GraphEvent>) -> Self {
        Self { events }
    }

    /// Read every chunk under `<root>/processed`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let dir = root.as_ref().join(PROCESSED_DIR);
        let mut chunks: Vec<PathBuf> = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read dataset directory: {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |e| e == "safetensors"))
            .collect();
        chunks.sort();

        let mut events = Vec::new();
        for chunk in &chunks {
            let loaded = Self::read_chunk(chunk)?;
            debug!("Read {} events from {:?}", loaded.len(), chunk);
            events.extend(loaded);
        }

        info!(
            "Loaded {} events from {} chunk(s) in {:?}",
            events.len(),
            chunks.len(),
            dir
        );
        Ok(Self { events })
    }

    /// Read the events of a single chunk file
    pub fn read_chunk<P: AsRef<Path>>(path: P) -> Result<Vec<GraphEvent>> {
        let path = path.as_ref();
        let tensors = safetensors::load(path, &Device::Cpu)
            .with_context(|| format!("Failed to load chunk: {:?}", path))?;

        // Group "<k>.x" / "<k>.edge_index" by numeric key
        let mut keyed: BTreeMap<usize, (Option<&Tensor>, Option<&Tensor>)> = BTreeMap::new();
        for (name, tensor) in &tensors {
            let (key, field) = name
                .split_once('.')
                .ok_or_else(|| anyhow::anyhow!("Malformed tensor name {:?} in {:?}", name, path))?;
            let key: usize = key
                .parse()
                .with_context(|| format!("Malformed event key {:?} in {:?}", name, path))?;
            let slot = keyed.entry(key).or_default();
            match field {
                "x" => slot.0 = Some(tensor),
                "edge_index" => slot.1 = Some(tensor),
                _ => anyhow::bail!("Unexpected tensor {:?} in {:?}", name, path),
            }
        }

        keyed
            .into_iter()
            .map(|(key, slot)| match slot {
                (Some(x), Some(edge_index)) => decode_event(x, edge_index)
                    .with_context(|| format!("Malformed event {} in {:?}", key, path)),
                _ => anyhow::bail!("Event {} in {:?} is missing x or edge_index", key, path),
            })
            .collect()
    }

    /// Write events as a single chunk file
    pub fn write_chunk<P: AsRef<Path>>(path: P, events: &[GraphEvent]) -> Result<()> {
        let path = path.as_ref();
        let device = Device::Cpu;
        let mut tensors: HashMap<String, Tensor> = HashMap::with_capacity(events.len() * 2);

        for (k, event) in events.iter().enumerate() {
            let x = Tensor::from_slice(event.x(), (event.num_nodes(), NUM_FEATURES), &device)?;
            let mut rows: Vec<i64> = event.edge_index().iter().map(|&(s, _)| s as i64).collect();
            rows.extend(event.edge_index().iter().map(|&(_, t)| t as i64));
            let edge_index = Tensor::from_vec(rows, (2, event.num_edges()), &device)?;
            tensors.insert(format!("{}.x", k), x);
            tensors.insert(format!("{}.edge_index", k), edge_index);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        safetensors::save(&tensors, path)
            .with_context(|| format!("Failed to write chunk: {:?}", path))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&GraphEvent> {
        self.events.get(idx)
    }

    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }
}

fn decode_event(x: &Tensor, edge_index: &Tensor) -> Result<GraphEvent> {
    let (num_nodes, width) = x.dims2()?;
    if width != NUM_FEATURES {
        anyhow::bail!("Expected {} node features, got {}", NUM_FEATURES, width);
    }
    let x: Vec<f32> = x.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;

    let rows: Vec<Vec<i64>> = edge_index.to_dtype(DType::I64)?.to_vec2()?;
    if rows.len() != 2 {
        anyhow::bail!("edge_index must have 2 rows, got {}", rows.len());
    }
    let edges = rows[0]
        .iter()
        .zip(rows[1].iter())
        .map(|(&s, &t)| {
            let s = u32::try_from(s).context("Negative edge source")?;
            let t = u32::try_from(t).context("Negative edge target")?;
            Ok((s, t))
        })
        .collect::<Result<Vec<_>>>()?;

    GraphEvent::new(x, num_nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<GraphEvent> {
        vec![
            GraphEvent::fully_connected(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 2).unwrap(),
            GraphEvent::new(vec![0.5; 12], 3, vec![(0, 1), (2, 0)]).unwrap(),
            GraphEvent::new(vec![9.0; 4], 1, vec![]).unwrap(),
        ]
    }

    #[test]
    fn test_chunk_preserves_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.safetensors");
        let events = sample_events();

        GraphDataset::write_chunk(&path, &events).unwrap();
        let read = GraphDataset::read_chunk(&path).unwrap();
        assert_eq!(read, events);
    }

    #[test]
    fn test_open_reads_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().join(PROCESSED_DIR);
        let events = sample_events();

        GraphDataset::write_chunk(processed.join("data_1.safetensors"), &events[2..]).unwrap();
        GraphDataset::write_chunk(processed.join("data_0.safetensors"), &events[..2]).unwrap();

        let dataset = GraphDataset::open(dir.path()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.events(), &events[..]);
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GraphDataset::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_event_keys_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.safetensors");
        let events: Vec<GraphEvent> = (0..12)
            .map(|i| GraphEvent::new(vec![i as f32; 4], 1, vec![]).unwrap())
            .collect();

        GraphDataset::write_chunk(&path, &events).unwrap();
        let read = GraphDataset::read_chunk(&path).unwrap();
        assert_eq!(read[10].x(), &[10.0; 4]);
    }
}
