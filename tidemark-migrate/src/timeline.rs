//! The revision timeline: a validated, strictly linear revision chain.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::operation::Operation;
use crate::revision::Revision;

/// Which way a walk moves through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward the head, applying forward operations.
    Upgrade,
    /// Toward the root, applying reverse operations.
    Downgrade,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// How an operator addresses a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDescriptor {
    /// The latest revision.
    Head,
    /// The root revision.
    Root,
    /// `n` steps behind the head.
    StepsBack(usize),
    /// An explicit revision id.
    Id(String),
}

impl FromStr for TargetDescriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed {
            "head" => Self::Head,
            "root" => Self::Root,
            _ => match trimmed.strip_prefix('-').and_then(|n| n.parse().ok()) {
                Some(n) => Self::StepsBack(n),
                None => Self::Id(trimmed.to_string()),
            },
        })
    }
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Root => write!(f, "root"),
            Self::StepsBack(n) => write!(f, "-{n}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// One revision's worth of work inside a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStep {
    /// The revision being applied or undone.
    pub revision_id: String,
    /// Its description, for reporting.
    pub description: String,
    /// The operations to execute, already in execution order.
    pub operations: Vec<Operation>,
    /// Pointer value once the step is fully applied: the revision itself
    /// when upgrading, its parent when downgrading.
    pub pointer_after: String,
}

/// An ordered path through the chain, ready for the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionWalk {
    /// Orientation of the walk.
    pub direction: Direction,
    /// Revision the tenant pointer must sit at before anything runs.
    pub expected_start: String,
    /// Steps in execution order.
    pub steps: Vec<WalkStep>,
}

impl RevisionWalk {
    /// Total operation count across all steps.
    pub fn operation_count(&self) -> usize {
        self.steps.iter().map(|s| s.operations.len()).sum()
    }

    /// Pointer value after the final step.
    pub fn final_pointer(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.pointer_after.as_str())
            .unwrap_or(self.expected_start.as_str())
    }
}

/// The validated revision chain, root first.
///
/// Construction checks the linearity invariants: every id unique, exactly
/// one root, every revision the parent of at most one other, and every
/// revision reachable from the root. Appending requires the new revision's
/// parent to be the current head.
#[derive(Debug, Clone)]
pub struct RevisionTimeline {
    /// Revisions in chain order, index 0 = root.
    order: Vec<Revision>,
    /// Id -> index into `order`.
    index: HashMap<String, usize>,
}

impl RevisionTimeline {
    /// Validate a set of revisions into a timeline.
    pub fn from_revisions(revisions: Vec<Revision>) -> MigrateResult<Self> {
        if revisions.is_empty() {
            return Err(MigrationError::EmptyTimeline);
        }

        let mut seen = HashSet::new();
        for revision in &revisions {
            if !seen.insert(revision.id.as_str()) {
                return Err(MigrationError::DuplicateRevision(revision.id.clone()));
            }
        }

        let roots: Vec<&Revision> = revisions.iter().filter(|r| r.is_root()).collect();
        let root = match roots.as_slice() {
            [] => return Err(MigrationError::MissingRoot),
            [root] => (*root).clone(),
            many => {
                return Err(MigrationError::MultipleRoots(
                    many.iter().map(|r| r.id.clone()).collect(),
                ));
            }
        };

        // Parent id -> children. A linear chain has exactly one child per
        // parent except the head.
        let mut children: HashMap<&str, Vec<&Revision>> = HashMap::new();
        for revision in &revisions {
            if let Some(parent) = &revision.parent_id {
                children.entry(parent.as_str()).or_default().push(revision);
            }
        }

        let mut order = Vec::with_capacity(revisions.len());
        let mut index = HashMap::with_capacity(revisions.len());
        index.insert(root.id.clone(), 0);
        order.push(root);

        loop {
            let current = order.last().expect("order is non-empty");
            match children.get(current.id.as_str()).map(Vec::as_slice) {
                None | Some([]) => break,
                Some([child]) => {
                    let child = (*child).clone();
                    index.insert(child.id.clone(), order.len());
                    order.push(child);
                }
                Some(many) => {
                    return Err(MigrationError::ForkedHistory {
                        parent: current.id.clone(),
                        children: many.iter().map(|r| r.id.clone()).collect(),
                    });
                }
            }
        }

        if order.len() != revisions.len() {
            let disconnected = revisions
                .iter()
                .find(|r| !index.contains_key(&r.id))
                .expect("some revision is unreachable");
            return Err(MigrationError::DisconnectedRevision(disconnected.id.clone()));
        }

        Ok(Self { order, index })
    }

    /// The root revision.
    pub fn root(&self) -> &Revision {
        &self.order[0]
    }

    /// The head revision.
    pub fn head(&self) -> &Revision {
        self.order.last().expect("timeline is non-empty")
    }

    /// Number of revisions in the chain.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the chain holds only the root.
    pub fn is_empty(&self) -> bool {
        self.order.len() == 1
    }

    /// Iterate root -> head.
    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.order.iter()
    }

    /// Get a revision by id.
    pub fn get(&self, id: &str) -> MigrateResult<&Revision> {
        self.index
            .get(id)
            .map(|i| &self.order[*i])
            .ok_or_else(|| MigrationError::UnknownRevision(id.to_string()))
    }

    /// Chain position of a revision (root = 0).
    pub fn position(&self, id: &str) -> MigrateResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| MigrationError::UnknownRevision(id.to_string()))
    }

    /// Resolve a descriptor to a revision.
    pub fn resolve(&self, descriptor: &TargetDescriptor) -> MigrateResult<&Revision> {
        match descriptor {
            TargetDescriptor::Head => Ok(self.head()),
            TargetDescriptor::Root => Ok(self.root()),
            TargetDescriptor::StepsBack(n) => {
                let head_pos = self.order.len() - 1;
                if *n > head_pos {
                    return Err(MigrationError::OffsetOutOfRange {
                        offset: *n,
                        depth: head_pos,
                    });
                }
                Ok(&self.order[head_pos - n])
            }
            TargetDescriptor::Id(id) => self.get(id),
        }
    }

    /// Append a newly authored revision. Linear history: the parent must be
    /// the current head.
    pub fn append(&mut self, revision: Revision) -> MigrateResult<()> {
        let head_id = self.head().id.clone();
        if revision.parent_id.as_deref() != Some(head_id.as_str()) {
            return Err(MigrationError::NotAtHead {
                parent: revision.parent_id.clone(),
                head: head_id,
            });
        }
        if self.index.contains_key(&revision.id) {
            return Err(MigrationError::DuplicateRevision(revision.id.clone()));
        }
        self.index.insert(revision.id.clone(), self.order.len());
        self.order.push(revision);
        Ok(())
    }

    /// Compute the walk from one revision to another.
    ///
    /// The chain is linear, so one of the two is always an ancestor of the
    /// other and the path is unique. Upgrades replay forward operations of
    /// the revisions after `from` up to and including `to`; downgrades
    /// replay reverse operations of the revisions after `to` up to and
    /// including `from`, visited head-first.
    pub fn walk(&self, from: &str, to: &str) -> MigrateResult<RevisionWalk> {
        let from_pos = self.position(from)?;
        let to_pos = self.position(to)?;

        if from_pos == to_pos {
            return Err(MigrationError::NothingToApply(from.to_string()));
        }

        let (direction, steps) = if from_pos < to_pos {
            let steps = self.order[from_pos + 1..=to_pos]
                .iter()
                .map(|r| WalkStep {
                    revision_id: r.id.clone(),
                    description: r.description.clone(),
                    operations: r.forward.clone(),
                    pointer_after: r.id.clone(),
                })
                .collect();
            (Direction::Upgrade, steps)
        } else {
            let steps = self.order[to_pos + 1..=from_pos]
                .iter()
                .rev()
                .map(|r| WalkStep {
                    revision_id: r.id.clone(),
                    description: r.description.clone(),
                    operations: r.reverse.clone(),
                    pointer_after: r
                        .parent_id
                        .clone()
                        .expect("non-root revisions have a parent"),
                })
                .collect();
            (Direction::Downgrade, steps)
        };

        Ok(RevisionWalk {
            direction,
            expected_start: from.to_string(),
            steps,
        })
    }
}
