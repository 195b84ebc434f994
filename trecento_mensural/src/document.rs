// The mensural document: an ordered tree of notation events.
//
// Nodes live in a flat arena (`Vec<Entry>`) and refer to each other by
// `NodeId`. A container node owns an ordered list of children; every other
// node is a leaf:
// - `Symbol`: a note or rest (symbol.rs)
// - `Punctus`: the zero-width measure delimiter
// - `Mode`: a rhythmic mode declaration, governing what follows it
// - `Ligature`: a bound figure that expands to several notes (ligature.rs)
//
// The root is always a container. Typical documents hold one container per
// voice, each opening with a mode declaration.
//
// Every mutation bumps `revision`, and every document (including each
// clone and each deserialized copy) gets its own process-wide `id`. The
// locator keys its measure cache on the (id, revision) pair it was filled
// at and discards the cache when it no longer matches, so nothing else
// needs to know which edits invalidate what.
//
// The JSON form is the nested tree (`NodeSpec`), not the arena:
//
//   [ { "mode": ".n." },
//     { "symbol": { "type": "SB", "pitch": "A4" } },
//     "punctus",
//     { "ligature": { "pitches": ["A4", "B4"] } },
//     { "container": [ ... ] } ]

use crate::error::{MensuralError, Result};
use crate::ligature::Ligature;
use crate::mode::RhythmicMode;
use crate::symbol::MensuralSymbol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> u64 {
    NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Symbol(MensuralSymbol),
    Punctus,
    Mode(RhythmicMode),
    Ligature(Ligature),
    Container(Vec<NodeId>),
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    parent: Option<NodeId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<NodeSpec>", into = "Vec<NodeSpec>")]
pub struct Document {
    id: u64,
    entries: Vec<Entry>,
    revision: u64,
}

/// A clone is a new document: it may diverge from the original, so it
/// never shares the original's id.
impl Clone for Document {
    fn clone(&self) -> Self {
        Document {
            id: next_document_id(),
            entries: self.entries.clone(),
            revision: self.revision,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// An empty document with a root container.
    pub fn new() -> Self {
        Document {
            id: next_document_id(),
            entries: vec![Entry {
                node: Node::Container(Vec::new()),
                parent: None,
            }],
            revision: 0,
        }
    }

    /// Unique among all documents created in this process.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.entries
            .get(id.0)
            .map(|e| &e.node)
            .ok_or(MensuralError::NodeNotFound(id.0))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(id.0).and_then(|e| e.parent)
    }

    /// Children of a container, or an empty slice for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.entries.get(id.0).map(|e| &e.node) {
            Some(Node::Container(children)) => children,
            _ => &[],
        }
    }

    /// Index of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Append `node` to the container `parent`.
    pub fn push(&mut self, parent: NodeId, node: Node) -> Result<NodeId> {
        let at = self.children(parent).len();
        self.insert(parent, at, node)
    }

    /// Insert `node` into `parent` before child position `index`.
    pub fn insert(&mut self, parent: NodeId, index: usize, node: Node) -> Result<NodeId> {
        let id = NodeId(self.entries.len());
        match self.entries.get_mut(parent.0).map(|e| &mut e.node) {
            Some(Node::Container(children)) if index <= children.len() => {
                children.insert(index, id);
            }
            Some(Node::Container(_)) => {
                return Err(MensuralError::InvalidPosition {
                    parent: parent.0,
                    index,
                });
            }
            _ => return Err(MensuralError::NodeNotFound(parent.0)),
        }
        // Nested containers are attached empty; their children come later.
        let node = match node {
            Node::Container(_) => Node::Container(Vec::new()),
            other => other,
        };
        self.entries.push(Entry {
            node,
            parent: Some(parent),
        });
        self.revision += 1;
        Ok(id)
    }

    /// Append a new empty container to `parent`.
    pub fn push_container(&mut self, parent: NodeId) -> Result<NodeId> {
        self.push(parent, Node::Container(Vec::new()))
    }

    /// Detach `id` from its parent. The arena slot stays allocated so other
    /// ids remain valid.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let parent = self.parent(id).ok_or(MensuralError::NodeNotFound(id.0))?;
        if let Some(Node::Container(children)) = self.entries.get_mut(parent.0).map(|e| &mut e.node) {
            children.retain(|&c| c != id);
        }
        self.entries[id.0].parent = None;
        self.revision += 1;
        Ok(())
    }

    /// Replace a leaf node in place. Containers cannot be replaced.
    pub fn replace(&mut self, id: NodeId, node: Node) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.0)
            .ok_or(MensuralError::NodeNotFound(id.0))?;
        if matches!(entry.node, Node::Container(_)) || matches!(node, Node::Container(_)) {
            return Err(MensuralError::ContainerNode(id.0));
        }
        entry.node = node;
        self.revision += 1;
        Ok(())
    }

    /// Mutable access to a symbol. Bumps the revision whether or not the
    /// caller ends up changing it.
    pub fn symbol_mut(&mut self, id: NodeId) -> Result<&mut MensuralSymbol> {
        self.revision += 1;
        match self.entries.get_mut(id.0).map(|e| &mut e.node) {
            Some(Node::Symbol(symbol)) => Ok(symbol),
            _ => Err(MensuralError::NodeNotFound(id.0)),
        }
    }

    /// Depth-first list of every container reachable from the root,
    /// root first.
    pub fn containers(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.children(id).iter().rev() {
                if matches!(self.get(child), Ok(Node::Container(_))) {
                    stack.push(child);
                }
            }
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let doc: Document = serde_json::from_str(&data)?;
        Ok(doc)
    }

    fn build(&mut self, parent: NodeId, specs: Vec<NodeSpec>) -> Result<()> {
        for spec in specs {
            let node = match spec {
                NodeSpec::Container(children) => {
                    let id = self.push_container(parent)?;
                    self.build(id, children)?;
                    continue;
                }
                NodeSpec::Symbol(symbol) => Node::Symbol(symbol),
                NodeSpec::Punctus => Node::Punctus,
                NodeSpec::Mode(mode) => Node::Mode(mode.into_mode()?),
                NodeSpec::Ligature(lig) => Node::Ligature(lig),
            };
            self.push(parent, node)?;
        }
        Ok(())
    }

    fn spec_of(&self, id: NodeId) -> Vec<NodeSpec> {
        self.children(id)
            .iter()
            .filter_map(|&child| {
                let spec = match self.get(child).ok()? {
                    Node::Symbol(s) => NodeSpec::Symbol(s.clone()),
                    Node::Punctus => NodeSpec::Punctus,
                    Node::Mode(m) => NodeSpec::Mode(ModeSpec::from_mode(m)),
                    Node::Ligature(l) => NodeSpec::Ligature(l.clone()),
                    Node::Container(_) => NodeSpec::Container(self.spec_of(child)),
                };
                Some(spec)
            })
            .collect()
    }
}

/// One node of the nested JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSpec {
    Symbol(MensuralSymbol),
    Punctus,
    Mode(ModeSpec),
    Ligature(Ligature),
    Container(Vec<NodeSpec>),
}

/// A mode declaration: either a bare sign (`".n."`, `"octonaria"`, `"C"`)
/// or a sign with an overridden minima count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeSpec {
    Sign(String),
    WithMinima { sign: String, minima_per_brevis: f64 },
}

impl ModeSpec {
    fn into_mode(self) -> Result<RhythmicMode> {
        match self {
            ModeSpec::Sign(sign) => sign.parse(),
            ModeSpec::WithMinima {
                sign,
                minima_per_brevis,
            } => {
                let mut mode: RhythmicMode = sign.parse()?;
                mode.set_minima_per_brevis(minima_per_brevis);
                Ok(mode)
            }
        }
    }

    fn from_mode(mode: &RhythmicMode) -> Self {
        let default = mode
            .symbol()
            .parse::<RhythmicMode>()
            .map(|m| m.minima_per_brevis())
            .ok();
        let sign = mode.symbol().to_string();
        if default == Some(mode.minima_per_brevis()) {
            ModeSpec::Sign(sign)
        } else {
            ModeSpec::WithMinima {
                sign,
                minima_per_brevis: mode.minima_per_brevis(),
            }
        }
    }
}

impl TryFrom<Vec<NodeSpec>> for Document {
    type Error = MensuralError;

    fn try_from(specs: Vec<NodeSpec>) -> Result<Self> {
        let mut doc = Document::new();
        let root = doc.root();
        doc.build(root, specs)?;
        Ok(doc)
    }
}

impl From<Document> for Vec<NodeSpec> {
    fn from(doc: Document) -> Self {
        doc.spec_of(doc.root())
    }
}
