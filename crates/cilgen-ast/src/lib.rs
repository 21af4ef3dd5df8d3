//! The abstract syntax tree handed to the code generator. Front ends build it, the
//! backend only reads it: nodes are never reshaped after construction, the backend just
//! attaches metadata bindings to them from the outside (see the `codegen` binder).
//!
//! Nodes live in an arena ([`Ast`]) and are referred to by [`NodeId`]. This keeps the
//! tree trivially shareable between the front end (which owns it for the whole
//! compilation unit) and the backend (which borrows it read-only), and lets bindings
//! refer to nodes without lifetimes.
use lang::Type;
use span::Location;

/// A handle to a node of an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Get the index of the node in its arena.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Get the handle of the node that will be stored after `len` others.
    ///
    /// # Panics
    /// Panics if `len` does not fit in 32 bits.
    fn from_len(len: usize) -> Self {
        NodeId(u32::try_from(len).expect("node handle space exhausted"))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque handle to a lexical scope. Scopes are created and owned by the code
/// generator; the AST only records which scope a scope-change node switches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// The closed set of node kinds, without their payload. Backends dispatch on it with
/// exhaustive matches, so adding a kind is a compile error everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Namespace,
    ClassDefn,
    ScopeChange,
    TypeFormals,
    MethodFormals,
    FieldDeclarator,
    MethodDeclaration,
    EventDeclarator,
    PropertyDeclaration,
    EnumMemberDeclaration,
    Block,
    Statement,
    Expression,
}

/// A class definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefn {
    /// The simple name of the class.
    pub name: String,

    /// The scope-change node recording the lexical position of the class body: the
    /// scope its members are resolved in and the namespace it was declared in. Classes
    /// declared at the top of a file without any namespace may not have one.
    pub scope_change: Option<NodeId>,

    /// The generic type parameters of the class, if any.
    pub type_formals: Option<NodeId>,

    /// The member declarations of the class, in source order.
    pub members: Vec<NodeId>,
}

/// Different kinds of nodes supported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A namespace declaration.
    Namespace { name: String },

    /// A class definition.
    ClassDefn(ClassDefn),

    /// A change of lexical scope. The namespace element refers to the enclosing
    /// namespace node, if the scope lives inside one.
    ScopeChange {
        scope: ScopeId,
        namespace: Option<NodeId>,
    },

    /// The generic parameters of a class.
    TypeFormals(Vec<String>),

    /// The generic parameters of a method.
    MethodFormals(Vec<String>),

    /// A field declarator.
    FieldDeclarator { name: String, ty: Type },

    /// A method declaration. The body is absent for abstract and external methods.
    MethodDeclaration {
        name: String,
        formals: Option<NodeId>,
        body: Option<NodeId>,
    },

    /// An event declarator.
    EventDeclarator { name: String },

    /// A property declaration.
    PropertyDeclaration { name: String },

    /// An enumeration member.
    EnumMemberDeclaration { name: String, value: i64 },

    /// A sequence of statements.
    Block(Vec<NodeId>),

    /// A statement. Statements are opaque to the backend: the driver knows how to
    /// lower them, the backend only needs their location for diagnostics.
    Statement { description: String },

    /// An already type-checked expression.
    Expression { description: String, ty: Type },
}

impl NodeKind {
    /// Get the tag of this kind of node.
    #[must_use]
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Namespace { .. } => NodeTag::Namespace,
            NodeKind::ClassDefn(_) => NodeTag::ClassDefn,
            NodeKind::ScopeChange { .. } => NodeTag::ScopeChange,
            NodeKind::TypeFormals(_) => NodeTag::TypeFormals,
            NodeKind::MethodFormals(_) => NodeTag::MethodFormals,
            NodeKind::FieldDeclarator { .. } => NodeTag::FieldDeclarator,
            NodeKind::MethodDeclaration { .. } => NodeTag::MethodDeclaration,
            NodeKind::EventDeclarator { .. } => NodeTag::EventDeclarator,
            NodeKind::PropertyDeclaration { .. } => NodeTag::PropertyDeclaration,
            NodeKind::EnumMemberDeclaration { .. } => NodeTag::EnumMemberDeclaration,
            NodeKind::Block(_) => NodeTag::Block,
            NodeKind::Statement { .. } => NodeTag::Statement,
            NodeKind::Expression { .. } => NodeTag::Expression,
        }
    }
}

/// A node of the tree: its kind and where it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
}

/// The capabilities the backend needs from a node. Anything that can say what kind of
/// node it is and where it was written can be the subject of a diagnostic.
pub trait NodeInfo {
    /// Get the tag of the node.
    fn tag(&self) -> NodeTag;

    /// Get the name of the file the node was parsed from.
    fn source_file(&self) -> &str;

    /// Get the line the node starts on.
    fn source_line(&self) -> u64;

    /// Check if the node is of the given kind.
    fn is_kind(&self, tag: NodeTag) -> bool {
        self.tag() == tag
    }
}

impl NodeInfo for Node {
    fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    fn source_file(&self) -> &str {
        &self.location.file
    }

    fn source_line(&self) -> u64 {
        self.location.line
    }
}

/// The arena holding every node of a compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the tree and return its handle.
    ///
    /// # Panics
    /// Panics if the tree holds more than `u32::MAX` nodes. Each node owns its kind and
    /// its location, so memory runs out long before that.
    pub fn push(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let id = NodeId::from_len(self.nodes.len());
        self.nodes.push(Node { kind, location });
        id
    }

    /// Get a node by its handle.
    ///
    /// # Panics
    /// Panics if the handle does not come from this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Get a node by its handle, or `None` if the handle does not come from this tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get the class definition behind a node, if the node is one.
    #[must_use]
    pub fn class_defn(&self, id: NodeId) -> Option<&ClassDefn> {
        match &self.get(id)?.kind {
            NodeKind::ClassDefn(class) => Some(class),
            _ => None,
        }
    }

    /// Get the number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no node at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every node of the tree along with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx as u32), node))
    }
}

impl std::ops::Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        self.node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn node_capabilities() {
        let mut ast = Ast::new();
        let file: Rc<str> = Rc::from("Program.cs");
        let id = ast.push(
            NodeKind::FieldDeclarator {
                name: "count".into(),
                ty: Type::Int32,
            },
            Location::new(file, 12),
        );

        let node = &ast[id];
        assert_eq!(node.tag(), NodeTag::FieldDeclarator);
        assert!(node.is_kind(NodeTag::FieldDeclarator));
        assert!(!node.is_kind(NodeTag::ClassDefn));
        assert_eq!(node.source_file(), "Program.cs");
        assert_eq!(node.source_line(), 12);
    }

    #[test]
    fn node_handles_follow_the_arena_length() {
        assert_eq!(NodeId::from_len(3).index(), 3);
        assert_eq!(NodeId::from_len(u32::MAX as usize).index(), u32::MAX as usize);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "node handle space exhausted")]
    fn node_handles_past_u32_panic() {
        let _ = NodeId::from_len(u32::MAX as usize + 1);
    }

    #[test]
    fn class_defn_lookup() {
        let mut ast = Ast::new();
        let class = ast.push(
            NodeKind::ClassDefn(ClassDefn {
                name: "Program".into(),
                scope_change: None,
                type_formals: None,
                members: Vec::new(),
            }),
            Location::unknown(),
        );
        let block = ast.push(NodeKind::Block(Vec::new()), Location::unknown());

        assert_eq!(ast.class_defn(class).map(|c| c.name.as_str()), Some("Program"));
        assert!(ast.class_defn(block).is_none());
        assert_eq!(ast.len(), 2);
    }
}
