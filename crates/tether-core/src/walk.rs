//! # Random Relationship Selection
//!
//! Single-pass uniform selection of a relationship of a node, for modules
//! that walk the graph.
//!
//! ## Reservoir sampling
//!
//! [`ReservoirSampler`] keeps `capacity` items out of a stream of unknown
//! length such that every item seen is retained with equal probability
//! (Algorithm R). With capacity 1 it picks one element uniformly in O(n)
//! time and O(1) extra space.

use crate::config::RuntimeConfig;
use crate::storage::Transaction;
use crate::{NodeId, Relationship, TetherError};
use rand::Rng;
use std::collections::BTreeSet;

// =============================================================================
// RESERVOIR SAMPLER
// =============================================================================

/// Uniform sample of fixed size over a stream.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    seen: u64,
    samples: Vec<T>,
}

impl<T> ReservoirSampler<T> {
    /// Create a sampler retaining up to `capacity` items (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: 0,
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Offer one item of the stream.
    pub fn sample<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(item);
            return;
        }
        let slot = rng.gen_range(0..self.seen);
        if let Some(kept) = usize::try_from(slot)
            .ok()
            .and_then(|slot| self.samples.get_mut(slot))
        {
            *kept = item;
        }
    }

    /// Number of items offered so far.
    #[must_use]
    pub fn seen(&self) -> u64 {
        self.seen
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Items currently retained.
    #[must_use]
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<T> {
        self.samples
    }
}

// =============================================================================
// INCLUSION POLICIES
// =============================================================================

/// Decides whether a relationship, seen from one of its nodes, qualifies.
pub trait RelationshipInclusion {
    fn include(
        &self,
        tx: &Transaction<'_>,
        relationship: &Relationship,
        pov: NodeId,
    ) -> Result<bool, TetherError>;
}

/// Every relationship that is not runtime-internal and does not lead to a
/// runtime-internal node.
#[derive(Debug, Clone)]
pub struct IncludeAllBusinessRelationships {
    config: RuntimeConfig,
}

impl IncludeAllBusinessRelationships {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

impl Default for IncludeAllBusinessRelationships {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl RelationshipInclusion for IncludeAllBusinessRelationships {
    fn include(
        &self,
        tx: &Transaction<'_>,
        relationship: &Relationship,
        pov: NodeId,
    ) -> Result<bool, TetherError> {
        if self.config.is_internal(&relationship.rel_type) {
            return Ok(false);
        }
        let Some(other) = relationship.other_node(pov) else {
            return Ok(false);
        };
        let node = tx.node(other)?.ok_or(TetherError::NodeNotFound(other))?;
        Ok(!node.labels.iter().any(|label| self.config.is_internal(label)))
    }
}

/// Relationships of the named types only.
#[derive(Debug, Clone, Default)]
pub struct IncludeRelationshipTypes {
    types: BTreeSet<String>,
}

impl IncludeRelationshipTypes {
    #[must_use]
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl RelationshipInclusion for IncludeRelationshipTypes {
    fn include(
        &self,
        _tx: &Transaction<'_>,
        relationship: &Relationship,
        _pov: NodeId,
    ) -> Result<bool, TetherError> {
        Ok(self.types.contains(&relationship.rel_type))
    }
}

// =============================================================================
// SELECTORS
// =============================================================================

/// Picks a relationship of a node.
pub trait RelationshipSelector {
    /// A qualifying relationship of `node`, or `None` if there is none.
    fn select_relationship(
        &self,
        tx: &Transaction<'_>,
        node: NodeId,
    ) -> Result<Option<Relationship>, TetherError>;

    /// Follow up to `steps` selected relationships from `start`.
    ///
    /// The returned path starts with `start` and ends early at a node with
    /// no qualifying relationship.
    fn walk(
        &self,
        tx: &Transaction<'_>,
        start: NodeId,
        steps: usize,
    ) -> Result<Vec<NodeId>, TetherError> {
        let mut path = vec![start];
        let mut current = start;
        for _ in 0..steps {
            let Some(rel) = self.select_relationship(tx, current)? else {
                break;
            };
            let Some(next) = rel.other_node(current) else {
                break;
            };
            path.push(next);
            current = next;
        }
        Ok(path)
    }
}

/// Uniformly random choice among the qualifying relationships of a node.
#[derive(Debug, Clone, Default)]
pub struct RandomRelationshipSelector<P = IncludeAllBusinessRelationships> {
    inclusion: P,
}

impl<P: RelationshipInclusion> RandomRelationshipSelector<P> {
    #[must_use]
    pub fn new(inclusion: P) -> Self {
        Self { inclusion }
    }

    /// Select with the given random source.
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        tx: &Transaction<'_>,
        node: NodeId,
        rng: &mut R,
    ) -> Result<Option<Relationship>, TetherError> {
        let mut sampler = ReservoirSampler::new(1);
        for rel in tx.relationships(node)? {
            if self.inclusion.include(tx, &rel, node)? {
                sampler.sample(rel, rng);
            }
        }
        Ok(sampler.into_samples().pop())
    }
}

impl<P: RelationshipInclusion> RelationshipSelector for RandomRelationshipSelector<P> {
    fn select_relationship(
        &self,
        tx: &Transaction<'_>,
        node: NodeId,
    ) -> Result<Option<Relationship>, TetherError> {
        self.select_with_rng(tx, node, &mut rand::thread_rng())
    }
}

// =============================================================================
// TESTS
// =============================================================================
