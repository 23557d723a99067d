//! Local stemma of readings at a single variation unit.
//!
//! A local stemma is a small directed graph whose vertices are reading IDs
//! and whose edges assert derivation of the posterior reading from the
//! prior one, weighted by how substantial the change is. Zero-weight edges
//! mark trivial derivation and are treated as equivalence. Cycles are
//! permitted: an editor may assert that two readings are mutually
//! derivable.
//!
//! Because each graph holds at most a handful of readings, all pairwise
//! shortest paths are computed once at construction (Dijkstra per source,
//! minimizing weight and breaking ties by edge count) and every later
//! query is a table lookup. Common-ancestor queries run on the condensation
//! of the graph into strongly connected components, so they remain
//! well-defined in the presence of cycles.

use hashbrown::HashMap;
use roaring::RoaringBitmap;

use crate::error::Error;

/// A directed derivation edge between two readings.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalStemmaEdge {
    pub prior: String,
    pub posterior: String,
    pub weight: f64,
}

impl LocalStemmaEdge {
    #[must_use]
    pub fn new(prior: impl Into<String>, posterior: impl Into<String>, weight: f64) -> Self {
        Self {
            prior: prior.into(),
            posterior: posterior.into(),
            weight,
        }
    }
}

/// A minimum-weight path between two readings.
///
/// `cardinality` is the number of edges on the path; `weight` is the sum of
/// their weights. The path from a reading to itself is `(0, 0.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Path {
    pub cardinality: u32,
    pub weight: f64,
}

impl Path {
    /// A trivial path carries only zero-weight edges.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.weight == 0.0
    }
}

/// Directed graph of reading derivation at one variation unit.
#[derive(Debug, Clone)]
pub struct LocalStemma {
    id: String,
    label: String,
    readings: Vec<String>,
    edges: Vec<LocalStemmaEdge>,
    index_by_reading: HashMap<String, usize>,
    paths: Vec<Vec<Option<Path>>>,
    ancestor_components: Vec<RoaringBitmap>,
}

impl LocalStemma {
    /// Builds a local stemma from vertex and edge lists.
    ///
    /// The optional collapse map sends readings to a canonical reading; the
    /// mapped vertices are merged, their edges redirected, self-loops
    /// removed, and parallel edges deduplicated keeping the minimum weight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLocalStemma`] if an edge references an
    /// undeclared reading, if the collapse map targets an undeclared
    /// reading, or if the collapse map contains a cycle.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        readings: Vec<String>,
        edges: Vec<LocalStemmaEdge>,
        collapse: &HashMap<String, String>,
    ) -> Result<Self, Error> {
        let id = id.into();
        let label = label.into();

        let canonical = |reading: &str| -> Result<String, Error> {
            let mut current = reading.to_owned();
            let mut hops = 0usize;
            while let Some(next) = collapse.get(&current) {
                current = next.clone();
                hops += 1;
                if hops > collapse.len() {
                    return Err(Error::MalformedLocalStemma {
                        unit: id.clone(),
                        detail: format!("collapse cycle through reading {reading}"),
                    });
                }
            }
            Ok(current)
        };

        // Merge collapsed vertices, preserving first-occurrence order.
        // Collapsed reading IDs stay resolvable as aliases of their
        // canonical reading, so support maps may keep referencing them.
        let mut merged_readings: Vec<String> = Vec::new();
        let mut index_by_reading: HashMap<String, usize> = HashMap::new();
        for reading in &readings {
            let target = canonical(reading)?;
            let index = match index_by_reading.get(&target) {
                Some(&index) => index,
                None => {
                    let index = merged_readings.len();
                    index_by_reading.insert(target.clone(), index);
                    merged_readings.push(target.clone());
                    index
                }
            };
            if *reading != target {
                index_by_reading.entry(reading.clone()).or_insert(index);
            }
        }
        for target in collapse.values() {
            let target = canonical(target)?;
            if !index_by_reading.contains_key(&target) {
                return Err(Error::MalformedLocalStemma {
                    unit: id,
                    detail: format!("collapse target {target} is not a declared reading"),
                });
            }
        }

        // Redirect edges, drop self-loops, deduplicate keeping minimum weight.
        let mut merged_edges: Vec<LocalStemmaEdge> = Vec::new();
        let mut edge_slot: HashMap<(usize, usize), usize> = HashMap::new();
        for edge in &edges {
            let prior = canonical(&edge.prior)?;
            let posterior = canonical(&edge.posterior)?;
            let from = *index_by_reading.get(&prior).ok_or_else(|| {
                Error::MalformedLocalStemma {
                    unit: id.clone(),
                    detail: format!("edge references undeclared reading {prior}"),
                }
            })?;
            let to = *index_by_reading.get(&posterior).ok_or_else(|| {
                Error::MalformedLocalStemma {
                    unit: id.clone(),
                    detail: format!("edge references undeclared reading {posterior}"),
                }
            })?;
            if from == to {
                continue;
            }
            match edge_slot.get(&(from, to)) {
                Some(&slot) => {
                    if edge.weight < merged_edges[slot].weight {
                        merged_edges[slot].weight = edge.weight;
                    }
                }
                None => {
                    edge_slot.insert((from, to), merged_edges.len());
                    merged_edges.push(LocalStemmaEdge::new(prior, posterior, edge.weight));
                }
            }
        }

        let n = merged_readings.len();
        let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for edge in &merged_edges {
            let from = index_by_reading[&edge.prior];
            let to = index_by_reading[&edge.posterior];
            adjacency[from].push((to, edge.weight));
        }

        let paths = (0..n).map(|src| dijkstra(&adjacency, src)).collect();
        let ancestor_components = ancestor_components(&adjacency);

        Ok(Self {
            id,
            label,
            readings: merged_readings,
            edges: merged_edges,
            index_by_reading,
            paths,
            ancestor_components,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reading IDs in declaration order (after collapsing).
    #[must_use]
    pub fn readings(&self) -> &[String] {
        &self.readings
    }

    /// Derivation edges after collapsing and deduplication.
    #[must_use]
    pub fn edges(&self) -> &[LocalStemmaEdge] {
        &self.edges
    }

    #[must_use]
    pub fn contains(&self, reading: &str) -> bool {
        self.index_by_reading.contains_key(reading)
    }

    fn index_of(&self, reading: &str) -> Result<usize, Error> {
        self.index_by_reading
            .get(reading)
            .copied()
            .ok_or_else(|| Error::UnknownReading {
                unit: self.id.clone(),
                reading: reading.to_owned(),
            })
    }

    /// Minimum-weight path from `from` to `to`, ties broken by edge count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReading`] if either ID is not in the stemma.
    pub fn path(&self, from: &str, to: &str) -> Result<Option<Path>, Error> {
        let from = self.index_of(from)?;
        let to = self.index_of(to)?;
        Ok(self.paths[from][to])
    }

    /// Whether a directed path from `from` to `to` exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReading`] if either ID is not in the stemma.
    pub fn path_exists(&self, from: &str, to: &str) -> Result<bool, Error> {
        Ok(self.path(from, to)?.is_some())
    }

    /// Whether the two readings are equivalent under trivial derivation,
    /// i.e. a zero-weight path connects them in at least one direction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReading`] if either ID is not in the stemma.
    pub fn trivially_equal(&self, r1: &str, r2: &str) -> Result<bool, Error> {
        let forward = self.path(r1, r2)?;
        let backward = self.path(r2, r1)?;
        Ok(forward.is_some_and(|p| p.is_trivial()) || backward.is_some_and(|p| p.is_trivial()))
    }

    /// Whether some reading reaches both `r1` and `r2`.
    ///
    /// Strongly connected components are condensed first, so mutually
    /// derivable readings count as a single prospective ancestor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownReading`] if either ID is not in the stemma.
    pub fn common_ancestor_exists(&self, r1: &str, r2: &str) -> Result<bool, Error> {
        let a = self.index_of(r1)?;
        let b = self.index_of(r2)?;
        let shared = &self.ancestor_components[a] & &self.ancestor_components[b];
        Ok(!shared.is_empty())
    }
}

/// Single-source shortest paths minimizing `(weight, cardinality)`.
///
/// Weights are non-negative, so a linear-scan Dijkstra suffices for graphs
/// of this size.
fn dijkstra(adjacency: &[Vec<(usize, f64)>], source: usize) -> Vec<Option<Path>> {
    let n = adjacency.len();
    let mut best: Vec<Option<Path>> = vec![None; n];
    let mut visited = vec![false; n];
    best[source] = Some(Path {
        cardinality: 0,
        weight: 0.0,
    });

    loop {
        let mut current: Option<usize> = None;
        for v in 0..n {
            if visited[v] {
                continue;
            }
            let Some(candidate) = best[v] else { continue };
            let better = match current {
                None => true,
                Some(u) => {
                    let incumbent = best[u].expect("selected vertex has a path");
                    (candidate.weight, candidate.cardinality)
                        < (incumbent.weight, incumbent.cardinality)
                }
            };
            if better {
                current = Some(v);
            }
        }
        let Some(u) = current else { break };
        visited[u] = true;
        let via = best[u].expect("visited vertex has a path");
        for &(v, weight) in &adjacency[u] {
            let relaxed = Path {
                cardinality: via.cardinality + 1,
                weight: via.weight + weight,
            };
            let improves = match best[v] {
                None => true,
                Some(existing) => {
                    (relaxed.weight, relaxed.cardinality) < (existing.weight, existing.cardinality)
                }
            };
            if improves {
                best[v] = Some(relaxed);
            }
        }
    }
    best
}

/// For each vertex, the set of condensed components that reach its own
/// component (itself included).
fn ancestor_components(adjacency: &[Vec<(usize, f64)>]) -> Vec<RoaringBitmap> {
    let n = adjacency.len();
    let component = tarjan_components(adjacency);
    let component_count = component.iter().copied().max().map_or(0, |c| c + 1);

    // Tarjan emits components in reverse topological order, so every edge in
    // the condensation goes from a higher component index to a lower one.
    // Processing components in ascending order therefore completes each
    // reachability set before it is merged into any predecessor's.
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); component_count];
    for (v, &c) in component.iter().enumerate() {
        members[c].push(v);
    }
    let mut reach: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); component_count];
    for c in 0..component_count {
        reach[c].insert(u32::try_from(c).expect("component index fits in u32"));
        for &v in &members[c] {
            for &(w, _) in &adjacency[v] {
                if component[w] != c {
                    let merged = &reach[c] | &reach[component[w]];
                    reach[c] = merged;
                }
            }
        }
    }

    let mut ancestors: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); n];
    for (v, set) in ancestors.iter_mut().enumerate() {
        let own = u32::try_from(component[v]).expect("component index fits in u32");
        for (c, reachable) in reach.iter().enumerate() {
            if reachable.contains(own) {
                set.insert(u32::try_from(c).expect("component index fits in u32"));
            }
        }
    }
    ancestors
}

/// Iterative Tarjan strongly-connected-components labeling.
fn tarjan_components(adjacency: &[Vec<(usize, f64)>]) -> Vec<usize> {
    let n = adjacency.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut component = vec![usize::MAX; n];
    let mut next_index = 0usize;
    let mut component_count = 0usize;

    // Explicit DFS frames: (vertex, next child position).
    let mut frames: Vec<(usize, usize)> = Vec::new();
    for root in 0..n {
        if index[root] != usize::MAX {
            continue;
        }
        frames.push((root, 0));
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(&mut (v, ref mut child)) = frames.last_mut() {
            if *child < adjacency[v].len() {
                let (w, _) = adjacency[v][*child];
                *child += 1;
                if index[w] == usize::MAX {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component[w] = component_count;
                        if w == v {
                            break;
                        }
                    }
                    component_count += 1;
                }
            }
        }
    }
    component
}
