//! Graph analysis over type descriptors
//!
//! Depth-first from the aggregate root, following reference and
//! collection-of-type fields. Output is post-order (a type's dependencies
//! come before it) and independent of descriptor field order.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{MappingError, Result};
use crate::model::{DescriptorProvider, TypeDescriptor};

/// A field of an owner type, used to name graph edges
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeRef {
    pub owner: String,
    pub field: String,
}

impl EdgeRef {
    pub fn new(owner: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            field: field.into(),
        }
    }
}

/// Result of walking one aggregate's descriptor graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphAnalysis {
    pub root: String,
    /// Types inside the aggregate boundary, dependencies first, root last
    pub types: Vec<TypeDescriptor>,
    /// Other designated roots referenced from inside the aggregate
    pub external_roots: BTreeMap<String, TypeDescriptor>,
    /// Edges that close a cycle; mapped as id-only references
    pub back_edges: BTreeSet<EdgeRef>,
}

impl GraphAnalysis {
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|t| t.name == type_name)
            .or_else(|| self.external_roots.get(type_name))
    }

    /// Position of a type in dependency order
    pub fn index_of(&self, type_name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name == type_name)
    }

    pub fn is_back_edge(&self, owner: &str, field: &str) -> bool {
        self.back_edges.contains(&EdgeRef::new(owner, field))
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

struct Walker<'a> {
    provider: &'a dyn DescriptorProvider,
    root: &'a str,
    designated_roots: &'a BTreeSet<String>,
    state: BTreeMap<String, VisitState>,
    analysis: GraphAnalysis,
}

impl Walker<'_> {
    fn resolve(&self, type_name: &str, referenced_by: Option<&str>) -> Result<TypeDescriptor> {
        self.provider
            .resolve(type_name)
            .cloned()
            .ok_or_else(|| MappingError::UnresolvedType {
                type_name: type_name.to_string(),
                referenced_by: referenced_by.map(str::to_string),
            })
    }

    fn visit(&mut self, type_name: &str, referenced_by: Option<&str>) -> Result<()> {
        self.state.insert(type_name.to_string(), VisitState::Visiting);
        let descriptor = self.resolve(type_name, referenced_by)?;

        let mut edges: Vec<(&str, &str)> = descriptor
            .fields
            .iter()
            .filter_map(|f| f.target_type().map(|t| (t, f.name.as_str())))
            .collect();
        edges.sort();

        for (target, field) in edges {
            match self.state.get(target).copied() {
                Some(VisitState::Visiting) => {
                    self.analysis
                        .back_edges
                        .insert(EdgeRef::new(type_name, field));
                }
                Some(VisitState::Visited) => {}
                None if target != self.root && self.designated_roots.contains(target) => {
                    if !self.analysis.external_roots.contains_key(target) {
                        let external = self.resolve(target, Some(type_name))?;
                        self.analysis
                            .external_roots
                            .insert(target.to_string(), external);
                    }
                }
                None => self.visit(target, Some(type_name))?,
            }
        }

        self.state.insert(type_name.to_string(), VisitState::Visited);
        self.analysis.types.push(descriptor);
        Ok(())
    }
}

/// Discover every type reachable from `root` inside its aggregate boundary
///
/// Other members of `designated_roots` are recorded as external roots and
/// not traversed.
///
/// # Errors
///
/// `UnresolvedType` when a reachable type name has no descriptor.
pub fn analyze(
    root: &str,
    provider: &dyn DescriptorProvider,
    designated_roots: &BTreeSet<String>,
) -> Result<GraphAnalysis> {
    let mut walker = Walker {
        provider,
        root,
        designated_roots,
        state: BTreeMap::new(),
        analysis: GraphAnalysis {
            root: root.to_string(),
            types: Vec::new(),
            external_roots: BTreeMap::new(),
            back_edges: BTreeSet::new(),
        },
    };
    walker.visit(root, None)?;
    Ok(walker.analysis)
}
