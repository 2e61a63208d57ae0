//! In-process vector similarity indexes
//!
//! The store ranks by cosine similarity over L2-normalized vectors. Two
//! implementations sit behind the [`VectorIndex`] trait: an exact linear
//! scan and a small-world graph with configurable `m` / `ef` parameters.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::cmp::Reverse;

use crate::config::{IndexConfig, IndexKind};

/// Filter predicate applied to candidate keys during search
pub type KeyFilter<'a> = &'a dyn Fn(&str) -> bool;

/// A vector index keyed by chunk position strings
pub trait VectorIndex: Send + Sync {
    /// Insert a vector under `key`, replacing any previous entry
    fn insert(&mut self, key: String, vector: &[f32]);

    /// Remove the given keys
    fn remove(&mut self, keys: &[String]);

    /// Top-k keys by cosine similarity, descending; ties broken by key order
    fn search(&self, query: &[f32], k: usize, filter: Option<KeyFilter<'_>>) -> Vec<(String, f32)>;

    /// Number of live entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the index configured for the store
pub fn build_index(config: &IndexConfig) -> Box<dyn VectorIndex> {
    match config.kind {
        IndexKind::Flat => Box::new(FlatIndex::new()),
        IndexKind::Hnsw => Box::new(HnswIndex::new(
            config.hnsw_m,
            config.hnsw_ef_construction,
            config.hnsw_ef_search,
        )),
    }
}

/// L2-normalize a vector; the zero vector is returned unchanged
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine distance between normalized vectors
fn distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

fn sort_hits(hits: &mut Vec<(String, f32)>, k: usize) {
    hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    hits.truncate(k);
}

/// Exact linear-scan index
#[derive(Default)]
pub struct FlatIndex {
    entries: HashMap<String, Vec<f32>>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&mut self, key: String, vector: &[f32]) {
        self.entries.insert(key, normalize(vector));
    }

    fn remove(&mut self, keys: &[String]) {
        for key in keys {
            self.entries.remove(key);
        }
    }

    fn search(&self, query: &[f32], k: usize, filter: Option<KeyFilter<'_>>) -> Vec<(String, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let query = normalize(query);
        let mut hits: Vec<(String, f32)> = self
            .entries
            .iter()
            .filter(|(key, _)| filter.map_or(true, |accept| accept(key)))
            .map(|(key, vector)| (key.clone(), dot(&query, vector)))
            .collect();
        sort_hits(&mut hits, k);
        hits
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Candidate scored by cosine distance; orders by distance, then id
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    dist: f32,
    id: usize,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct Node {
    key: String,
    vector: Vec<f32>,
    /// Adjacency lists, one per layer the node participates in
    layers: Vec<Vec<usize>>,
    deleted: bool,
}

/// Small-world graph index.
///
/// Deletions are tombstoned; removed entries stay in the graph as routing
/// nodes until the index is rebuilt from the store.
pub struct HnswIndex {
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    /// Level sampling factor, 1/ln(m)
    ml: f64,
    nodes: Vec<Node>,
    by_key: HashMap<String, usize>,
    entry: Option<usize>,
    top_layer: usize,
    live: usize,
    rng_state: u64,
}

const MAX_LAYER: usize = 16;

impl HnswIndex {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        let m = m.max(2);
        Self {
            m,
            ef_construction: ef_construction.max(m),
            ef_search: ef_search.max(1),
            ml: 1.0 / (m as f64).ln(),
            nodes: Vec::new(),
            by_key: HashMap::new(),
            entry: None,
            top_layer: 0,
            live: 0,
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    fn next_unit(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        ((x >> 11) as f64) / ((1u64 << 53) as f64)
    }

    fn random_level(&mut self) -> usize {
        let unit = self.next_unit().max(f64::MIN_POSITIVE);
        ((-unit.ln() * self.ml) as usize).min(MAX_LAYER)
    }

    /// Greedy descent to the closest node within one layer
    fn greedy_search(&self, query: &[f32], mut current: usize, layer: usize) -> usize {
        let mut best = distance(query, &self.nodes[current].vector);
        loop {
            let mut next = current;
            for &neighbor in &self.nodes[current].layers[layer] {
                let d = distance(query, &self.nodes[neighbor].vector);
                if d < best {
                    best = d;
                    next = neighbor;
                }
            }
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Beam search within one layer, returning candidates by ascending distance
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Scored> {
        let mut visited = HashSet::new();
        visited.insert(entry);

        let seed = Scored {
            dist: distance(query, &self.nodes[entry].vector),
            id: entry,
        };
        let mut candidates = BinaryHeap::new();
        candidates.push(Reverse(seed));
        let mut results = BinaryHeap::new();
        results.push(seed);

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = results.peek().map(|s| s.dist).unwrap_or(f32::INFINITY);
            if current.dist > worst && results.len() >= ef {
                break;
            }
            for &neighbor in &self.nodes[current.id].layers[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let scored = Scored {
                    dist: distance(query, &self.nodes[neighbor].vector),
                    id: neighbor,
                };
                let worst = results.peek().map(|s| s.dist).unwrap_or(f32::INFINITY);
                if results.len() < ef || scored.dist < worst {
                    candidates.push(Reverse(scored));
                    results.push(scored);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    fn max_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Trim a node's adjacency to the closest `m_max` neighbors
    fn prune(&mut self, node: usize, layer: usize) {
        let m_max = self.max_degree(layer);
        if self.nodes[node].layers[layer].len() <= m_max {
            return;
        }
        let anchor = self.nodes[node].vector.clone();
        let mut scored: Vec<Scored> = self.nodes[node].layers[layer]
            .iter()
            .map(|&neighbor| Scored {
                dist: distance(&anchor, &self.nodes[neighbor].vector),
                id: neighbor,
            })
            .collect();
        scored.sort();
        scored.truncate(m_max);
        self.nodes[node].layers[layer] = scored.into_iter().map(|s| s.id).collect();
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&mut self, key: String, vector: &[f32]) {
        if let Some(&existing) = self.by_key.get(&key) {
            // Replacement: tombstone the old node, the new one is re-linked
            if !self.nodes[existing].deleted {
                self.nodes[existing].deleted = true;
                self.live -= 1;
            }
        }

        let vector = normalize(vector);
        let level = self.random_level();
        let id = self.nodes.len();
        self.nodes.push(Node {
            key: key.clone(),
            vector,
            layers: vec![Vec::new(); level + 1],
            deleted: false,
        });
        self.by_key.insert(key, id);
        self.live += 1;

        let Some(mut ep) = self.entry else {
            self.entry = Some(id);
            self.top_layer = level;
            return;
        };

        let query = self.nodes[id].vector.clone();

        if self.top_layer > level {
            for layer in (level + 1..=self.top_layer).rev() {
                ep = self.greedy_search(&query, ep, layer);
            }
        }

        for layer in (0..=level.min(self.top_layer)).rev() {
            let found = self.search_layer(&query, ep, self.ef_construction, layer);
            let selected: Vec<usize> = found.iter().take(self.m).map(|s| s.id).collect();
            for &neighbor in &selected {
                self.nodes[id].layers[layer].push(neighbor);
                self.nodes[neighbor].layers[layer].push(id);
                self.prune(neighbor, layer);
            }
            if let Some(best) = found.first() {
                ep = best.id;
            }
        }

        if level > self.top_layer {
            self.top_layer = level;
            self.entry = Some(id);
        }
    }

    fn remove(&mut self, keys: &[String]) {
        for key in keys {
            if let Some(id) = self.by_key.remove(key) {
                if !self.nodes[id].deleted {
                    self.nodes[id].deleted = true;
                    self.live -= 1;
                }
            }
        }
    }

    fn search(&self, query: &[f32], k: usize, filter: Option<KeyFilter<'_>>) -> Vec<(String, f32)> {
        let Some(mut ep) = self.entry else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let query = normalize(query);
        for layer in (1..=self.top_layer).rev() {
            ep = self.greedy_search(&query, ep, layer);
        }

        // Widen the beam when a filter or tombstones may discard candidates
        let mut ef = self.ef_search.max(k);
        if filter.is_some() || self.live < self.nodes.len() {
            ef = ef.saturating_mul(4);
        }

        let found = self.search_layer(&query, ep, ef, 0);
        let mut hits: Vec<(String, f32)> = found
            .into_iter()
            .filter(|s| !self.nodes[s.id].deleted)
            .filter(|s| {
                filter.map_or(true, |accept| accept(&self.nodes[s.id].key))
            })
            .map(|s| (self.nodes[s.id].key.clone(), 1.0 - s.dist))
            .collect();
        sort_hits(&mut hits, k);
        hits
    }

    fn len(&self) -> usize {
        self.live
    }
}
