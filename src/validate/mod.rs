//! Validation of a converted or reconciled topology.
//!
//! - `duplicates`: incoming resources vs. an existing topology
//! - `boundary`: containment hierarchy, missing boundaries, auto-create
//! - `connection`: edge endpoint semantics and repairs
//!
//! Validators never fail. They report what they find and leave every
//! decision to the caller.

pub mod boundary;
pub mod connection;
pub mod duplicates;

pub use boundary::{
    AutoCreateSuggestion, BoundaryValidationResult, BoundaryValidator, HierarchyViolation, MissingBoundary,
    ViolationKind,
};
pub use connection::{
    apply_repairs, ConnectionIssue, ConnectionValidationResult, EdgeClass, RepairAction, RepairOutcome,
};
pub use duplicates::{Collision, CollisionResolution, DuplicateDetection, MatchStrategy, MergePlan};
