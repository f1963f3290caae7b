//! Lexical scopes
//!
//! Scopes live in an arena and are referenced by [`ScopeId`]. A unit records the
//! chain of scope ids visible where it was defined; resolution walks that chain
//! innermost first. Every binding owns one slot for the whole compilation, so a
//! closure and its defining code always read and write the same location.

use super::ir::SlotId;
use crate::value::FxIndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Let,
    Const,
    Var,
    Param,
    Function,
    Class,
}

impl BindingKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, BindingKind::Const)
    }

    /// Whether a second declaration of the same name in one scope is allowed
    fn allows_redeclaration(self) -> bool {
        matches!(self, BindingKind::Var | BindingKind::Function)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub slot: SlotId,
    pub kind: BindingKind,
}

#[derive(Debug, Default)]
pub struct ScopeRecord {
    pub variables: FxIndexMap<String, Binding>,
}

/// Outcome of a declaration that could not be added
#[derive(Debug, Clone, PartialEq)]
pub enum DeclareError {
    AlreadyDeclared(String),
    UnknownScope(ScopeId),
}

/// Arena of every scope created during a compilation
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<ScopeRecord>,
}

/// Arena length and global variable count, for rolling back a failed statement
#[derive(Debug, Clone, Copy)]
pub struct ScopeCheckpoint {
    scopes: usize,
    globals: usize,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeRecord::default());
        id
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.scopes.get(id.0 as usize)
    }

    /// Add `name` to `scope`. Redeclaring a `var`/function over a `var`/function
    /// reuses the existing binding.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        binding: Binding,
    ) -> Result<Binding, DeclareError> {
        let record = self
            .scopes
            .get_mut(scope.0 as usize)
            .ok_or(DeclareError::UnknownScope(scope))?;

        if let Some(existing) = record.variables.get(name) {
            if existing.kind.allows_redeclaration() && binding.kind.allows_redeclaration() {
                return Ok(*existing);
            }
            return Err(DeclareError::AlreadyDeclared(name.to_string()));
        }

        record.variables.insert(name.to_string(), binding);
        Ok(binding)
    }

    /// Resolve `name` through `chain` (outermost first), innermost scope winning
    pub fn resolve(&self, chain: &[ScopeId], name: &str) -> Option<Binding> {
        chain
            .iter()
            .rev()
            .filter_map(|id| self.get(*id))
            .find_map(|scope| scope.variables.get(name).copied())
    }

    /// Position of the scope in `chain` that binds `name`
    pub fn resolve_depth(&self, chain: &[ScopeId], name: &str) -> Option<usize> {
        chain.iter().rposition(|id| {
            self.get(*id)
                .is_some_and(|scope| scope.variables.contains_key(name))
        })
    }

    pub fn checkpoint(&self, global: ScopeId) -> ScopeCheckpoint {
        ScopeCheckpoint {
            scopes: self.scopes.len(),
            globals: self.get(global).map_or(0, |s| s.variables.len()),
        }
    }

    pub fn rollback(&mut self, global: ScopeId, checkpoint: ScopeCheckpoint) {
        self.scopes.truncate(checkpoint.scopes);
        if let Some(record) = self.scopes.get_mut(global.0 as usize) {
            record.variables.truncate(checkpoint.globals);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(n: u32, kind: BindingKind) -> Binding {
        Binding {
            slot: SlotId(n),
            kind,
        }
    }

    #[test]
    fn test_inner_scope_wins() {
        let mut arena = ScopeArena::new();
        let outer = arena.create();
        let inner = arena.create();
        arena
            .declare(outer, "x", binding(1, BindingKind::Let))
            .ok();
        arena
            .declare(inner, "x", binding(2, BindingKind::Let))
            .ok();

        let found = arena.resolve(&[outer, inner], "x");
        assert_eq!(found.map(|b| b.slot), Some(SlotId(2)));
        assert_eq!(
            arena.resolve(&[outer], "x").map(|b| b.slot),
            Some(SlotId(1))
        );
        assert_eq!(arena.resolve_depth(&[outer, inner], "x"), Some(1));
    }

    #[test]
    fn test_redeclaration() {
        let mut arena = ScopeArena::new();
        let scope = arena.create();
        assert!(arena.declare(scope, "a", binding(1, BindingKind::Let)).is_ok());
        assert_eq!(
            arena.declare(scope, "a", binding(2, BindingKind::Let)),
            Err(DeclareError::AlreadyDeclared("a".to_string()))
        );

        assert!(arena.declare(scope, "v", binding(3, BindingKind::Var)).is_ok());
        let again = arena.declare(scope, "v", binding(4, BindingKind::Var));
        assert_eq!(again.map(|b| b.slot), Ok(SlotId(3)));
    }

    #[test]
    fn test_rollback_drops_new_globals() {
        let mut arena = ScopeArena::new();
        let global = arena.create();
        arena
            .declare(global, "kept", binding(1, BindingKind::Const))
            .ok();
        let checkpoint = arena.checkpoint(global);
        arena
            .declare(global, "dropped", binding(2, BindingKind::Const))
            .ok();
        arena.create();

        arena.rollback(global, checkpoint);
        assert!(arena.resolve(&[global], "kept").is_some());
        assert!(arena.resolve(&[global], "dropped").is_none());
    }
}
