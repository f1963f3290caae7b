//! UnitBuilder - helper for emitting unit instructions
//!
//! Provides fresh-name allocation and a convenient API for appending
//! instructions to the unit being compiled.

use super::ir::{
    ChannelId, Guard, HeapId, Instr, Operand, Place, SlotId, Target, Unit, UnitKind, UnitMeta,
};
use super::scope::ScopeId;

/// Collision-free counters for slots, heap records, channels and units
#[derive(Debug, Default)]
pub struct NameAllocator {
    slots: u32,
    heap: u32,
    channels: u32,
    units: u32,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&mut self) -> SlotId {
        let id = SlotId(self.slots);
        self.slots += 1;
        id
    }

    pub fn heap(&mut self) -> HeapId {
        let id = HeapId(self.heap);
        self.heap += 1;
        id
    }

    pub fn channel(&mut self) -> ChannelId {
        let id = ChannelId(self.channels);
        self.channels += 1;
        id
    }

    /// Name for a generated unit
    pub fn unit(&mut self) -> String {
        let name = format!("__gen/u{}", self.units);
        self.units += 1;
        name
    }

    /// Number of heap records handed out so far
    pub fn heap_count(&self) -> u32 {
        self.heap
    }
}

/// A unit under construction
#[derive(Debug)]
pub struct UnitBuilder {
    pub name: String,
    pub meta: UnitMeta,
    pub instrs: Vec<Instr>,

    /// Nesting below the enclosing function body; 0 for bodies and continuations
    pub depth: u32,

    /// Scopes visible to code emitted here, outermost first
    pub scopes: Vec<ScopeId>,
}

impl UnitBuilder {
    pub fn new(name: String, kind: UnitKind, depth: u32, scopes: Vec<ScopeId>) -> Self {
        let meta = UnitMeta {
            kind,
            is_async: false,
            that: None,
            super_class: None,
            scope_chain: scopes.iter().map(|s| s.0).collect(),
        };
        Self {
            name,
            meta,
            instrs: Vec::new(),
            depth,
            scopes,
        }
    }

    /// Create a builder nested in this one, one level deeper, optionally opening a scope
    pub fn child(&self, name: String, kind: UnitKind, scope: Option<ScopeId>) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.extend(scope);
        let mut child = UnitBuilder::new(name, kind, self.depth + 1, scopes);
        child.meta.is_async = self.meta.is_async;
        child.meta.that = self.meta.that.clone();
        child.meta.super_class = self.meta.super_class.clone();
        child
    }

    pub fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn set(&mut self, dst: Place, src: Operand) {
        self.set_guarded(Guard::always(), dst, src);
    }

    pub fn set_guarded(&mut self, guard: Guard, dst: Place, src: Operand) {
        self.emit(Instr::Set { guard, dst, src });
    }

    pub fn invoke(
        &mut self,
        guard: Guard,
        target: Target,
        channel: Option<ChannelId>,
        store: Option<Place>,
    ) {
        self.emit(Instr::Invoke {
            guard,
            target,
            channel,
            store,
        });
    }

    pub fn return_if(&mut self, guard: Guard, code: i32) {
        self.emit(Instr::ReturnIf { guard, code });
    }

    pub fn emit_return(&mut self, code: i32) {
        self.emit(Instr::Return(code));
    }

    pub fn raw(&mut self, command: impl Into<String>) {
        self.emit(Instr::Raw(command.into()));
    }

    pub fn innermost_scope(&self) -> Option<ScopeId> {
        self.scopes.last().copied()
    }

    pub fn push_scope(&mut self, scope: ScopeId) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<ScopeId> {
        self.scopes.pop()
    }

    /// Finish building and produce the unit
    pub fn finish(self) -> Unit {
        Unit {
            name: self.name,
            meta: self.meta,
            instrs: self.instrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_never_repeat() {
        let mut names = NameAllocator::new();
        assert_eq!(names.slot(), SlotId(0));
        assert_eq!(names.slot(), SlotId(1));
        assert_eq!(names.heap(), HeapId(0));
        assert_eq!(names.unit(), "__gen/u0");
        assert_eq!(names.unit(), "__gen/u1");
        assert_eq!(names.heap_count(), 1);
    }

    #[test]
    fn test_child_inherits_scope_chain() {
        let parent = UnitBuilder::new(
            "__gen/init".to_string(),
            UnitKind::Script,
            0,
            vec![ScopeId(0), ScopeId(4)],
        );
        let child = parent.child("__gen/u9".to_string(), UnitKind::Block, Some(ScopeId(7)));
        assert_eq!(child.depth, 1);
        assert_eq!(child.meta.scope_chain, vec![0, 4, 7]);
        assert_eq!(child.innermost_scope(), Some(ScopeId(7)));
    }
}
