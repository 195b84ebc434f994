// Measure and context locator.
//
// Given a position in a `Document`, the locator answers the two questions
// the resolver cannot answer by itself:
// - which rhythmic mode governs the position, and
// - which measure the position belongs to, and at what index.
//
// Mode lookup walks backwards through the position's earlier siblings, then
// through the earlier siblings of each enclosing container, out to the
// root. The nearest `Mode` node wins. Running off the root is an error; the
// engine never assumes a default mode.
//
// A measure is a maximal run of symbols in one container bounded by
// punctus marks, mode declarations, ligatures, nested containers and the
// container's edges. Under a divisione a brevis, longa or maxima also ends
// the run and forms a one-symbol measure of its own. A ligature always
// forms its own measure of expanded notes; within it, each fixed-type note
// and each run of flexible notes is resolved separately and the results
// are concatenated.
//
// Resolutions are memoised in a side table keyed by each measure's first
// node. The table remembers the document (id and revision) it was filled
// for and is emptied when asked about any other document or revision. The
// table itself sits behind a `RwLock` and only hands out per-measure slots;
// each slot has its own `Mutex`, so requests for the same measure wait for
// one search while requests for disjoint measures never wait on each
// other's search.
//
// `resolve_document` segments every container and resolves all measures in
// parallel with rayon.

use crate::config::EngineConfig;
use crate::document::{Document, Node, NodeId};
use crate::error::{MensuralError, Result};
use crate::mode::RhythmicMode;
use crate::resolver::{Resolution, Resolver};
use crate::symbol::MensuralSymbol;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace};

/// One measure of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    /// Consecutive symbol nodes of one container.
    Run(Vec<NodeId>),
    /// A ligature node, measured as its expanded notes.
    Ligature(NodeId),
}

impl Measure {
    /// The first node, used as the cache key. `None` for an empty run.
    pub fn start(&self) -> Option<NodeId> {
        match self {
            Measure::Run(nodes) => nodes.first().copied(),
            Measure::Ligature(id) => Some(*id),
        }
    }

    /// The symbols to resolve, with ligatures expanded.
    pub fn symbols(&self, doc: &Document) -> Result<Vec<MensuralSymbol>> {
        match self {
            Measure::Run(nodes) => nodes
                .iter()
                .map(|&id| match doc.get(id)? {
                    Node::Symbol(s) => Ok(s.clone()),
                    _ => Err(MensuralError::NodeNotFound(id.0)),
                })
                .collect(),
            Measure::Ligature(id) => match doc.get(*id)? {
                Node::Ligature(lig) => lig.expand(),
                _ => Err(MensuralError::NodeNotFound(id.0)),
            },
        }
    }
}

/// A resolvable position: a symbol node, or one expanded note of a
/// ligature node (`member` is 0 for plain symbols).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub node: NodeId,
    pub member: usize,
}

impl Position {
    pub fn symbol(node: NodeId) -> Self {
        Position { node, member: 0 }
    }
}

/// One measure's cached resolution, filled by whichever request gets the
/// lock first.
type Slot = Arc<Mutex<Option<Arc<Resolution>>>>;

#[derive(Debug, Default)]
struct MeasureCache {
    /// (document id, revision) the entries belong to.
    stamp: (u64, u64),
    entries: FxHashMap<NodeId, Slot>,
}

#[derive(Debug, Default)]
pub struct Locator {
    resolver: Resolver,
    cache: RwLock<MeasureCache>,
    searches: AtomicUsize,
}

impl Locator {
    pub fn new(config: EngineConfig) -> Self {
        Locator {
            resolver: Resolver::new(config),
            cache: RwLock::new(MeasureCache::default()),
            searches: AtomicUsize::new(0),
        }
    }

    /// How many measures this locator has actually resolved, as opposed to
    /// served from the cache.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The mode governing `node`: the nearest earlier `Mode` sibling, or
    /// failing that the nearest one before an enclosing container.
    pub fn governing_mode(&self, doc: &Document, node: NodeId) -> Result<RhythmicMode> {
        self.find_mode(doc, node)?
            .ok_or_else(|| MensuralError::UnresolvableContext(node.to_string()))
    }

    fn find_mode(&self, doc: &Document, node: NodeId) -> Result<Option<RhythmicMode>> {
        doc.get(node)?;
        let mut current = node;
        while let Some(parent) = doc.parent(current) {
            let siblings = doc.children(parent);
            let index = siblings.iter().position(|&c| c == current).unwrap_or(0);
            for &sibling in siblings[..index].iter().rev() {
                if let Node::Mode(mode) = doc.get(sibling)? {
                    return Ok(Some(*mode));
                }
            }
            current = parent;
        }
        Ok(None)
    }

    /// The measure containing `node` and the node's index within it. For a
    /// ligature node the index is 0 and the measure covers all its notes.
    /// Returns `None` for punctus, mode and container nodes.
    pub fn measure_of(&self, doc: &Document, node: NodeId) -> Result<Option<(Measure, usize)>> {
        let mode = self.governing_mode(doc, node)?;
        let trecento = mode.is_trecento();
        match doc.get(node)? {
            Node::Symbol(_) => {}
            Node::Ligature(_) => return Ok(Some((Measure::Ligature(node), 0))),
            Node::Punctus | Node::Mode(_) | Node::Container(_) => return Ok(None),
        }
        if is_standalone(doc.get(node)?, trecento) {
            return Ok(Some((Measure::Run(vec![node]), 0)));
        }

        let parent = doc
            .parent(node)
            .ok_or(MensuralError::NodeNotFound(node.0))?;
        let siblings = doc.children(parent);
        let index = doc
            .index_in_parent(node)
            .ok_or(MensuralError::NodeNotFound(node.0))?;

        let mut start = index;
        while start > 0 && joins_run(doc.get(siblings[start - 1])?, trecento) {
            start -= 1;
        }
        let mut end = index + 1;
        while end < siblings.len() && joins_run(doc.get(siblings[end])?, trecento) {
            end += 1;
        }
        trace!(%node, start, end, "located measure");
        Ok(Some((Measure::Run(siblings[start..end].to_vec()), index - start)))
    }

    /// Every measure among the direct children of `container`, in order.
    /// Nested containers are not descended into.
    pub fn segment(&self, doc: &Document, container: NodeId) -> Result<Vec<Measure>> {
        let mut mode = self.find_mode(doc, container)?;
        let mut measures = Vec::new();
        let mut run: Vec<NodeId> = Vec::new();

        for &child in doc.children(container) {
            let node = doc.get(child)?;
            let trecento = mode.is_none_or(|m| m.is_trecento());
            if joins_run(node, trecento) {
                run.push(child);
                continue;
            }
            if !run.is_empty() {
                measures.push(Measure::Run(std::mem::take(&mut run)));
            }
            match node {
                Node::Symbol(_) => measures.push(Measure::Run(vec![child])),
                Node::Ligature(_) => measures.push(Measure::Ligature(child)),
                Node::Mode(m) => mode = Some(*m),
                Node::Punctus | Node::Container(_) => {}
            }
        }
        if !run.is_empty() {
            measures.push(Measure::Run(run));
        }
        Ok(measures)
    }

    /// Resolve one measure, consulting and filling the cache.
    pub fn resolve_measure(&self, doc: &Document, measure: &Measure) -> Result<Arc<Resolution>> {
        let key = measure.start().ok_or(MensuralError::EmptyMeasure)?;
        let slot = self.slot(doc, key)?;
        let mut entry = slot.lock().map_err(|_| MensuralError::CachePoisoned)?;
        if let Some(hit) = entry.as_ref() {
            trace!(%key, "measure cache hit");
            return Ok(Arc::clone(hit));
        }

        let mode = self.governing_mode(doc, key)?;
        let symbols = measure.symbols(doc)?;
        let resolution = Arc::new(match measure {
            Measure::Run(_) => self.resolver.resolve_detailed(&mode, &symbols)?,
            Measure::Ligature(_) => self.resolve_ligature(&mode, &symbols)?,
        });
        self.searches.fetch_add(1, Ordering::Relaxed);
        *entry = Some(Arc::clone(&resolution));
        Ok(resolution)
    }

    /// The cache slot for `key` in `doc`, clearing the table first if it
    /// was filled for another document or revision.
    fn slot(&self, doc: &Document, key: NodeId) -> Result<Slot> {
        let stamp = (doc.id(), doc.revision());
        {
            let cache = self.cache.read().map_err(|_| MensuralError::CachePoisoned)?;
            let hit = (cache.stamp == stamp).then(|| cache.entries.get(&key)).flatten();
            if let Some(slot) = hit {
                return Ok(Arc::clone(slot));
            }
        }

        let mut cache = self.cache.write().map_err(|_| MensuralError::CachePoisoned)?;
        if cache.stamp != stamp {
            debug!(
                old = ?cache.stamp,
                new = ?stamp,
                "document changed; clearing measure cache"
            );
            cache.entries.clear();
            cache.stamp = stamp;
        }
        Ok(Arc::clone(cache.entries.entry(key).or_default()))
    }

    fn resolve_ligature(
        &self,
        mode: &RhythmicMode,
        symbols: &[MensuralSymbol],
    ) -> Result<Resolution> {
        let mut combined = Resolution {
            lengths: Vec::with_capacity(symbols.len()),
            minima_per_brevis: mode.minima_per_brevis(),
            doublings: 0,
            exact: true,
            score: 0.0,
        };
        let flexible = |s: &MensuralSymbol| !s.mensural_type().is_fixed();
        for part in symbols.chunk_by(|a, b| flexible(a) && flexible(b)) {
            let r = self.resolver.resolve_detailed(mode, part)?;
            combined.lengths.extend(r.lengths);
            combined.doublings = combined.doublings.max(r.doublings);
            combined.exact &= r.exact;
            combined.score += r.score;
        }
        Ok(combined)
    }

    /// Number of resolved measures cached for the current state of `doc`.
    pub fn cached_measures(&self, doc: &Document) -> usize {
        match self.cache.read() {
            Ok(cache) if cache.stamp == (doc.id(), doc.revision()) => cache
                .entries
                .values()
                .filter(|slot| slot.lock().is_ok_and(|e| e.is_some()))
                .count(),
            _ => 0,
        }
    }

    /// The resolved length of one position, in minimae.
    pub fn duration_of(&self, doc: &Document, position: Position) -> Result<f64> {
        let Some((measure, index)) = self.measure_of(doc, position.node)? else {
            return Err(MensuralError::NodeNotFound(position.node.0));
        };
        let resolution = self.resolve_measure(doc, &measure)?;
        resolution
            .lengths
            .get(index + position.member)
            .copied()
            .ok_or(MensuralError::NodeNotFound(position.node.0))
    }

    /// Every measure of every container, in document order.
    pub fn measures(&self, doc: &Document) -> Result<Vec<Measure>> {
        let mut all = Vec::new();
        for container in doc.containers() {
            all.extend(self.segment(doc, container)?);
        }
        Ok(all)
    }

    /// Resolve the whole document. Measures are disjoint, so they resolve in
    /// parallel; the first failing measure's error is returned.
    pub fn resolve_document(&self, doc: &Document) -> Result<FxHashMap<Position, f64>> {
        let measures = self.measures(doc)?;
        let resolved: Vec<(Measure, Arc<Resolution>)> = measures
            .into_par_iter()
            .map(|m| {
                let r = self.resolve_measure(doc, &m)?;
                Ok((m, r))
            })
            .collect::<Result<_>>()?;

        let mut lengths = FxHashMap::default();
        for (measure, resolution) in resolved {
            match measure {
                Measure::Run(nodes) => {
                    for (node, &length) in nodes.into_iter().zip(&resolution.lengths) {
                        lengths.insert(Position::symbol(node), length);
                    }
                }
                Measure::Ligature(node) => {
                    for (member, &length) in resolution.lengths.iter().enumerate() {
                        lengths.insert(Position { node, member }, length);
                    }
                }
            }
        }
        debug!(positions = lengths.len(), "resolved document");
        Ok(lengths)
    }
}

/// Whether `node` extends a run of symbols.
fn joins_run(node: &Node, trecento: bool) -> bool {
    matches!(node, Node::Symbol(_)) && !is_standalone(node, trecento)
}

/// Fixed-type symbols stand alone under a divisione.
fn is_standalone(node: &Node, trecento: bool) -> bool {
    match node {
        Node::Symbol(s) => trecento && s.mensural_type().is_fixed(),
        _ => false,
    }
}
