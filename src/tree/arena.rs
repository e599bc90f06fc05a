//! Arena storage for nodes, scopes and bindings.
//!
//! The arena is the single owner of every record the engine moves. All
//! cross-record links are ids into it, which is what makes cyclic graphs
//! representable and lets the decoder materialize a record before its
//! fields are known.

use crate::tree::id::{BindingId, NodeId, ScopeId};
use crate::tree::kind::NodeKind;
use crate::tree::node::{Binding, Body, Node, Scope};

/// The well-known singleton nodes every arena starts with.
///
/// The front end constructs these itself on both sides of a stream, so
/// they are never pickled; references to them travel as preloaded-cache
/// slots. Because [`Arena::with_builtins`] creates them in a fixed order,
/// their ids are identical in every arena.
#[derive(Debug, Clone)]
pub struct Builtins {
    /// The standard integer type nodes, narrowest first:
    /// char, signed char, unsigned char, short, unsigned short, int,
    /// unsigned int, long, unsigned long, long long, unsigned long long.
    pub integer_types: [NodeId; 11],
    /// The size types: size, ssize, bitsize, sbitsize.
    pub size_types: [NodeId; 4],
    /// `void`.
    pub void_type: NodeId,
    /// `bool`.
    pub bool_type: NodeId,
    /// `float`.
    pub float_type: NodeId,
    /// `double`.
    pub double_type: NodeId,
    /// `long double`.
    pub long_double_type: NodeId,
    /// `void *`.
    pub ptr_type: NodeId,
    /// `const void *`.
    pub const_ptr_type: NodeId,
    /// The type of `sizeof` expressions.
    pub size_type: NodeId,
    /// The null pointer constant.
    pub null_pointer: NodeId,
    /// Integer constant zero.
    pub integer_zero: NodeId,
    /// Integer constant one.
    pub integer_one: NodeId,
    /// The empty identifier.
    pub empty_identifier: NodeId,
    /// The global namespace.
    pub global_namespace: NodeId,
    /// The translation unit that is the global namespace's context.
    pub translation_unit: NodeId,
}

impl Builtins {
    /// The catalog in preload order.
    ///
    /// This order assigns preloaded-cache slots; it must never change
    /// between writer and reader processes.
    pub fn preload_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(31);
        order.extend_from_slice(&self.integer_types);
        order.extend_from_slice(&self.size_types);
        order.extend_from_slice(&[
            self.void_type,
            self.bool_type,
            self.float_type,
            self.double_type,
            self.long_double_type,
            self.ptr_type,
            self.const_ptr_type,
            self.size_type,
            self.null_pointer,
            self.integer_zero,
            self.integer_one,
            self.empty_identifier,
            self.global_namespace,
            self.translation_unit,
        ]);
        order
    }
}

/// The container for all records of one front-end process.
///
/// Acts as an arena allocator: records are pushed once and addressed by
/// dense ids thereafter. Records are never removed.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
}

impl Arena {
    /// Creates an empty arena with no builtin nodes.
    ///
    /// Most callers want [`Arena::with_builtins`]; an empty arena cannot
    /// resolve preloaded references.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena preconstructed with the builtin singletons,
    /// returning it together with the catalog of their ids.
    pub fn with_builtins() -> (Self, Builtins) {
        let mut arena = Self::new();

        let mut builtin = |kind: NodeKind| {
            let mut node = Node::new(kind);
            node.flags.set_builtin(true);
            arena.push_node(node)
        };

        let translation_unit = builtin(NodeKind::TranslationUnitDecl);
        let global_namespace = builtin(NodeKind::NamespaceDecl);
        let integer_types = [(); 11].map(|()| builtin(NodeKind::IntegerType));
        let size_types = [(); 4].map(|()| builtin(NodeKind::IntegerType));
        let void_type = builtin(NodeKind::VoidType);
        let bool_type = builtin(NodeKind::BooleanType);
        let float_type = builtin(NodeKind::RealType);
        let double_type = builtin(NodeKind::RealType);
        let long_double_type = builtin(NodeKind::RealType);
        let ptr_type = builtin(NodeKind::PointerType);
        let const_ptr_type = builtin(NodeKind::PointerType);
        let size_type = builtin(NodeKind::IntegerType);
        let null_pointer = builtin(NodeKind::IntegerCst);
        let integer_zero = builtin(NodeKind::IntegerCst);
        let integer_one = builtin(NodeKind::IntegerCst);
        let empty_identifier = builtin(NodeKind::IdentifierNode);

        if let Body::Decl(decl) = &mut arena.node_mut(global_namespace).body {
            decl.context = Some(translation_unit);
        }
        if let Body::IntCst { value } = &mut arena.node_mut(integer_one).body {
            *value = 1;
        }

        let builtins = Builtins {
            integer_types,
            size_types,
            void_type,
            bool_type,
            float_type,
            double_type,
            long_double_type,
            ptr_type,
            const_ptr_type,
            size_type,
            null_pointer,
            integer_zero,
            integer_one,
            empty_identifier,
            global_namespace,
            translation_unit,
        };
        (arena, builtins)
    }

    /// Adds a node, returning its id.
    pub fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Adds a scope, returning its id.
    pub fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId::new(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        self.scopes.push(scope);
        id
    }

    /// Adds a binding, returning its id.
    pub fn push_binding(&mut self, binding: Binding) -> BindingId {
        let id = BindingId::new(u32::try_from(self.bindings.len()).unwrap_or(u32::MAX));
        self.bindings.push(binding);
        id
    }

    /// Retrieves a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.as_u32() as usize)
            .expect("Arena invariant violated: node id out of bounds")
    }

    /// Retrieves a node mutably by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.as_u32() as usize)
            .expect("Arena invariant violated: node id out of bounds")
    }

    /// Retrieves a scope by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        self.scopes
            .get(id.as_u32() as usize)
            .expect("Arena invariant violated: scope id out of bounds")
    }

    /// Retrieves a scope mutably by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.scopes
            .get_mut(id.as_u32() as usize)
            .expect("Arena invariant violated: scope id out of bounds")
    }

    /// Retrieves a binding by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn binding(&self, id: BindingId) -> &Binding {
        self.bindings
            .get(id.as_u32() as usize)
            .expect("Arena invariant violated: binding id out of bounds")
    }

    /// Retrieves a binding mutably by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this arena.
    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        self.bindings
            .get_mut(id.as_u32() as usize)
            .expect("Arena invariant violated: binding id out of bounds")
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Number of bindings.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// True if the arena holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.scopes.is_empty() && self.bindings.is_empty()
    }

    /// Walks a chain from `head`, yielding each node id.
    pub fn chain_iter(&self, head: Option<NodeId>) -> ChainIter<'_> {
        ChainIter {
            arena: self,
            next: head,
        }
    }
}

/// Iterator over a `chain`-linked node list.
pub struct ChainIter<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
}

impl Iterator for ChainIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.node(current).chain;
        Some(current)
    }
}
