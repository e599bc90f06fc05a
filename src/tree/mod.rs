//! The in-memory tree model.
//!
//! This module defines the `Arena` that owns every node, scope and
//! binding of a translation, the closed `NodeKind` inventory, and the
//! node bodies the streaming engine transports.

/// Defines the `Arena`, its handle accessors and the builtin seed set.
pub mod arena;
/// Defines the `NodeId`, `ScopeId` and `BindingId` index types.
pub mod id;
/// Defines the `NodeKind` inventory and its categories.
pub mod kind;
/// Defines `Node`, its `Body` variants and the binding structures.
pub mod node;

pub use arena::{Arena, Builtins, ChainIter};
pub use id::{BindingId, NodeId, ScopeId};
pub use kind::{Category, NodeKind};
pub use node::{Binding, Body, Node, NodeFlags, Scope, SourceLocation};
