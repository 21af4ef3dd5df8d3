//! Bindings between program items and the AST nodes that declared them, and the context
//! switch built on top of them.
//!
//! Analysis sometimes needs to look at another declaration before continuing with the
//! current one: a forward reference, a base class declared further down, a nested class.
//! [`CompilationContext::enter_item_context`] puts the lexical context (scope, class,
//! namespace, generic formals and overflow mode) in the state it was in at the
//! declaration of an item, and the returned guard puts it back when dropped. Guards
//! borrow the context mutably, so nested switches are always undone in reverse order.
use crate::{context::CompilationContext, image::ItemId};
use ast::{Ast, NodeId, NodeKind, ScopeId};
use std::{
    collections::HashMap,
    hash::{BuildHasherDefault, Hasher},
    ops::{Deref, DerefMut},
};

/// Hashes item handles by XOR-folding their bits. Handles are small dense integers, so
/// anything more elaborate would only cost time.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ItemHasher(u64);

impl Hasher for ItemHasher {
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_u64(u64::from(*byte));
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.0 = self.0.rotate_left(5) ^ value;
    }

    fn write_u32(&mut self, value: u32) {
        self.write_u64(u64::from(value));
    }

    fn write_usize(&mut self, value: usize) {
        self.write_u64(value as u64);
    }

    fn finish(&self) -> u64 {
        self.0 ^ (self.0 >> 32)
    }
}

/// The bindings of the items that do not carry their node themselves.
pub(crate) type ItemTable = HashMap<ItemId, NodeId, BuildHasherDefault<ItemHasher>>;

/// A snapshot of the lexical context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedContext {
    pub scope: ScopeId,
    pub class: Option<NodeId>,
    pub namespace: Option<NodeId>,
    pub type_formals: Option<NodeId>,
    pub method_formals: Option<NodeId>,
    pub overflow_insns: bool,
    pub overflow_changed: bool,
}

impl SavedContext {
    pub(crate) fn capture(ctx: &CompilationContext) -> Self {
        Self {
            scope: ctx.current_scope,
            class: ctx.current_class,
            namespace: ctx.current_namespace,
            type_formals: ctx.type_formals,
            method_formals: ctx.method_formals,
            overflow_insns: ctx.overflow_insns,
            overflow_changed: ctx.overflow_changed,
        }
    }

    fn restore(self, ctx: &mut CompilationContext) {
        ctx.current_scope = self.scope;
        ctx.current_class = self.class;
        ctx.current_namespace = self.namespace;
        ctx.type_formals = self.type_formals;
        ctx.method_formals = self.method_formals;
        ctx.overflow_insns = self.overflow_insns;
        ctx.overflow_changed = self.overflow_changed;
    }
}

/// The context of another item, entered with [`CompilationContext::enter_item_context`].
/// The previous context comes back when the guard is dropped.
#[must_use = "the item context is left as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ItemContextGuard<'a> {
    ctx: &'a mut CompilationContext,
    saved: Option<SavedContext>,
}

impl ItemContextGuard<'_> {
    /// Leave the item context explicitly. Same as dropping the guard.
    pub fn leave(self) {}
}

impl Deref for ItemContextGuard<'_> {
    type Target = CompilationContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ItemContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ItemContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            saved.restore(self.ctx);
        }
    }
}

/// Leave an item context, restoring the context that was current when it was entered.
pub fn leave_item_context(guard: ItemContextGuard<'_>) {
    guard.leave();
}

impl CompilationContext {
    /// Record that `node` declares `item`. Classes and methods keep the node themselves,
    /// the other items go through the binding table.
    pub fn bind_item_to_node(&mut self, item: impl Into<ItemId>, node: NodeId) {
        match item.into() {
            ItemId::Class(id) => self.image.class_mut(id).node = Some(node),
            ItemId::Method(id) => self.image.method_mut(id).node = Some(node),
            item => {
                self.bindings.insert(item, node);
            }
        }
    }

    /// Get the node that declared an item, if it was bound to one.
    #[must_use]
    pub fn node_for_item(&self, item: impl Into<ItemId>) -> Option<NodeId> {
        match item.into() {
            ItemId::Class(id) => self.image.class(id).node,
            ItemId::Method(id) => self.image.method(id).node,
            item => self.bindings.get(&item).copied(),
        }
    }

    /// Switch to the lexical context of an item's declaration. Returns `None`, without
    /// touching anything, if the item is not bound to a node.
    ///
    /// For a class member, the owning class becomes the current class. For a class, its
    /// enclosing class does (none for a top-level class). Scope, namespace and type
    /// formals then come from the current class definition, or are reset to the global
    /// scope when there is no class or the class records no scope change. Method formals
    /// are those of the item when it is a method declaring some. The overflow mode goes
    /// back to the unit default.
    pub fn enter_item_context(
        &mut self,
        ast: &Ast,
        item: impl Into<ItemId>,
    ) -> Option<ItemContextGuard<'_>> {
        let item = item.into();
        let node = self.node_for_item(item)?;
        let saved = self.snapshot();

        let class = match item {
            ItemId::Class(id) => self.image.class(id).nested_parent,
            other => self.image.owner_of(other),
        };
        self.current_class = class.and_then(|class| self.node_for_item(class));

        let defn = self.current_class.and_then(|node| ast.class_defn(node));
        let scope_change = defn
            .and_then(|defn| defn.scope_change)
            .map(|node| &ast[node].kind);
        match scope_change {
            Some(NodeKind::ScopeChange { scope, namespace }) => {
                self.current_scope = *scope;
                self.current_namespace = *namespace;
            }
            _ => {
                self.current_scope = self.scopes.global();
                self.current_namespace = None;
            }
        }
        self.type_formals = defn.and_then(|defn| defn.type_formals);

        self.method_formals = match (item, &ast[node].kind) {
            (ItemId::Method(_), NodeKind::MethodDeclaration { formals, .. }) => *formals,
            _ => None,
        };

        self.overflow_insns = self.overflow_global;
        self.overflow_changed = false;

        tracing::debug!(?item, %node, class = ?self.current_class, "enter item context");
        Some(ItemContextGuard {
            ctx: self,
            saved: Some(saved),
        })
    }
}
