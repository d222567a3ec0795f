use alloc::borrow::Cow;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use percent_encoding::percent_decode_str;

/// Parameter captures of a matched path, in pattern order.
pub type Captures = Vec<(String, String)>;

const NULL_NODE: u32 = u32::MAX;

/// A node in the linearized segment trie.
///
/// Children live in the shared `nodes` pool and are referenced by 32-bit
/// offsets, so cloning a trie is a flat copy of two vectors.
#[derive(Clone, Debug)]
struct RouteNode {
    /// Static segment transitions, kept sorted for binary search.
    statics: Vec<(String, u32)>,
    /// The single `:param` transition of this level (names live on the leaf).
    param: u32,
    /// Index into `leaves` (NULL_NODE = no pattern terminates here).
    leaf: u32,
}

impl RouteNode {
    fn empty() -> Self {
        Self {
            statics: Vec::new(),
            param: NULL_NODE,
            leaf: NULL_NODE,
        }
    }
}

#[derive(Clone, Debug)]
struct Leaf<T> {
    pattern: String,
    params: Vec<String>,
    value: T,
}

/// Rejected registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// Another pattern with the same shape is already bound.
    Collision { pattern: String, existing: String },
    /// A `:` segment without a name.
    EmptyParam { pattern: String },
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::Collision { pattern, existing } => {
                write!(f, "route pattern {} collides with {}", pattern, existing)
            }
            InsertError::EmptyParam { pattern } => {
                write!(f, "route pattern {} has an unnamed parameter", pattern)
            }
        }
    }
}

/// URL pattern table.
///
/// Patterns are `/`-separated; a segment starting with `:` captures one path
/// segment. Two patterns collide when they have the same static segments and
/// parameters at the same positions, whatever the parameter names are.
/// Lookups prefer static segments and fall back to parameters.
#[derive(Clone)]
pub struct RouteTrie<T> {
    nodes: Vec<RouteNode>,
    leaves: Vec<Leaf<T>>,
}

impl<T> fmt::Debug for RouteTrie<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTrie")
            .field("nodes_len", &self.nodes.len())
            .field("patterns", &self.leaves.len())
            .finish()
    }
}

impl<T> Default for RouteTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl<T> RouteTrie<T> {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(16);
        // Root node ("/")
        nodes.push(RouteNode::empty());
        Self {
            nodes,
            leaves: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Bound patterns, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.leaves.iter().map(|leaf| leaf.pattern.as_str())
    }

    fn push_node(&mut self) -> u32 {
        let idx = self.nodes.len() as u32;
        self.nodes.push(RouteNode::empty());
        idx
    }

    /// Binds `value` to `pattern`.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<(), InsertError> {
        let mut curr = 0usize;
        let mut params = Vec::new();

        for segment in segments(pattern) {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(InsertError::EmptyParam {
                        pattern: pattern.to_string(),
                    });
                }
                params.push(name.to_string());
                let next = self.nodes[curr].param;
                curr = if next == NULL_NODE {
                    let idx = self.push_node();
                    self.nodes[curr].param = idx;
                    idx as usize
                } else {
                    next as usize
                };
            } else {
                let found = self.nodes[curr]
                    .statics
                    .binary_search_by(|(s, _)| s.as_str().cmp(segment));
                curr = match found {
                    Ok(pos) => self.nodes[curr].statics[pos].1 as usize,
                    Err(pos) => {
                        let idx = self.push_node();
                        self.nodes[curr].statics.insert(pos, (segment.to_string(), idx));
                        idx as usize
                    }
                };
            }
        }

        let leaf = self.nodes[curr].leaf;
        if leaf != NULL_NODE {
            return Err(InsertError::Collision {
                pattern: pattern.to_string(),
                existing: self.leaves[leaf as usize].pattern.clone(),
            });
        }

        self.nodes[curr].leaf = self.leaves.len() as u32;
        self.leaves.push(Leaf {
            pattern: pattern.to_string(),
            params,
            value,
        });
        tracing::trace!("RouteTrie: bound {}", pattern);
        Ok(())
    }

    /// Resolves a request path to its bound value and parameter captures.
    ///
    /// Segments are percent-decoded one by one before matching, so an
    /// encoded `/` stays inside its segment. A segment that does not decode
    /// to UTF-8 matches nothing.
    pub fn lookup(&self, path: &str) -> Option<(&T, Captures)> {
        let decoded = segments(path)
            .map(|s| percent_decode_str(s).decode_utf8().ok())
            .collect::<Option<Vec<Cow<'_, str>>>>()?;
        let parts: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();
        let mut values = Vec::new();
        let leaf = self.walk(0, &parts, &mut values)?;
        let leaf = &self.leaves[leaf as usize];

        let captures = leaf
            .params
            .iter()
            .cloned()
            .zip(values.into_iter().map(|v: &str| v.to_string()))
            .collect();
        Some((&leaf.value, captures))
    }

    fn walk<'p>(&self, curr: usize, rest: &[&'p str], values: &mut Vec<&'p str>) -> Option<u32> {
        let node = &self.nodes[curr];
        let Some((&head, tail)) = rest.split_first() else {
            return (node.leaf != NULL_NODE).then_some(node.leaf);
        };

        if let Ok(pos) = node.statics.binary_search_by(|(s, _)| s.as_str().cmp(head)) {
            if let Some(leaf) = self.walk(node.statics[pos].1 as usize, tail, values) {
                return Some(leaf);
            }
        }

        if node.param != NULL_NODE {
            values.push(head);
            if let Some(leaf) = self.walk(node.param as usize, tail, values) {
                return Some(leaf);
            }
            values.pop();
        }
        None
    }
}

static_assertions::assert_impl_all!(RouteTrie<alloc::sync::Arc<()>>: Send, Sync, Clone);
