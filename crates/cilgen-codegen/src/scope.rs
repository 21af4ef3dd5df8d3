//! Lexical scopes. Each scope maps names to the program items declared in it and points
//! to the scope it is nested in, so a lookup walks outwards until the global scope.
use crate::image::{next_index, ItemId};
use ast::ScopeId;
use std::collections::HashMap;

/// The kind of a lexical scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace(String),
    Class,
    Local,
}

/// A lexical scope: the names declared in it and the scope it is nested in.
#[derive(Debug, Clone)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    names: HashMap<String, ItemId>,
}

impl Scope {
    #[must_use]
    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    #[must_use]
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }
}

/// Every scope of a compilation unit. Scopes are never discarded: the binder must be able
/// to come back to the scope of any declaration at any time, long after the walk that
/// created it has left it.
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Create an arena holding only the global scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                parent: None,
                names: HashMap::new(),
            }],
        }
    }

    /// Get the global scope, the root of every scope chain.
    #[must_use]
    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Create a new scope nested in `parent`.
    ///
    /// # Panics
    /// Panics if the arena holds more than `u32::MAX` scopes, which memory runs out
    /// long before (see [`next_index`]).
    pub fn create(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(next_index(self.scopes.len()));
        self.scopes.push(Scope {
            kind,
            parent: Some(parent),
            names: HashMap::new(),
        });
        id
    }

    /// Get a scope.
    ///
    /// # Panics
    /// Panics if the identifier does not come from this arena.
    #[must_use]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Declare a name in a scope, returning the item it previously named in that same
    /// scope, if any.
    pub fn declare(&mut self, scope: ScopeId, name: &str, item: ItemId) -> Option<ItemId> {
        self.scopes[scope.0 as usize]
            .names
            .insert(name.to_owned(), item)
    }

    /// Look a name up from a scope, walking its parents up to the global scope.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<ItemId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if let Some(item) = scope.names.get(name) {
                return Some(*item);
            }
            current = scope.parent;
        }
        None
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;

    #[test]
    fn lookup_walks_parents() {
        let mut image = Image::new();
        let program = image.add_class(Some("Demo"), "Program");
        let helper = image.add_class(Some("Demo"), "Helper");

        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        let demo = scopes.create(global, ScopeKind::Namespace("Demo".into()));
        let body = scopes.create(demo, ScopeKind::Class);

        assert_eq!(scopes.declare(demo, "Program", program.into()), None);
        assert_eq!(scopes.lookup(body, "Program"), Some(program.into()));
        assert_eq!(scopes.lookup(global, "Program"), None);

        // Shadowing in an inner scope leaves the outer declaration alone.
        scopes.declare(body, "Program", helper.into());
        assert_eq!(scopes.lookup(body, "Program"), Some(helper.into()));
        assert_eq!(scopes.lookup(demo, "Program"), Some(program.into()));
        assert_eq!(scopes.get(body).parent(), Some(demo));
    }
}
