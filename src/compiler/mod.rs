//! Compiler from the AST to units
//!
//! The target environment can only read and write storage, invoke another unit
//! with a parameter channel, and return an integer code. Everything else
//! (variables, closures, objects, control flow, async) is lowered onto those
//! three operations here.
//!
//! Lowering is a single recursive pass. Statements and expressions are compiled
//! into the unit on top of the builder stack; compound statements, closures and
//! await continuations allocate child units. Child units signal `break` and
//! `return` to their caller through their return code, which every wrapped call
//! site captures and relays (see [`Compiler::invoke_wrapped`]).

mod builder;
mod compile_async;
mod compile_expr;
mod compile_function;
mod compile_object;
mod compile_stmt;
mod hoist;
mod intrinsics;
pub mod ir;
mod scope;

pub use builder::{NameAllocator, UnitBuilder};
pub use ir::{
    Addr, BREAK, ChannelId, FunctionSig, Guard, HeapId, Instr, MAX_ARGS, NORMAL, Operand, Place,
    Primitive, Program, RETURN, SlotId, Storage, Target, Test, Unit, UnitKind, UnitMeta,
};
pub use scope::{Binding, BindingKind, ScopeArena, ScopeId};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::ast::{self, Statement};
use crate::config::Options;
use crate::error::{CompileError, Diagnostics};
use crate::lexer::Span;
use crate::parser;
use crate::stdlib;
use crate::value::{Constant, FxIndexMap, Kind, Nbt};
use scope::{DeclareError, ScopeCheckpoint};

/// Unit holding the prelude and the top-level statements
pub const ENTRY_UNIT: &str = "__gen/init";

/// Output of [`compile`]: the program built from every statement that
/// compiled, and one diagnostic per statement that did not
#[derive(Debug, Clone)]
pub struct Compilation {
    pub program: Program,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The program, or the diagnostics when any statement failed
    pub fn into_result(self) -> Result<Program, Diagnostics> {
        if self.diagnostics.is_empty() {
            Ok(self.program)
        } else {
            Err(self.diagnostics)
        }
    }
}

/// Compile source text (after the prelude, when enabled)
#[tracing::instrument(skip_all, fields(namespace = %options.namespace))]
pub fn compile(source: &str, options: &Options) -> Compilation {
    let mut compiler = Compiler::new(&options.namespace);
    let mut diagnostics = Diagnostics::default();

    if options.prelude {
        compiler.compile_source(stdlib::PRELUDE, &mut diagnostics);
    }
    compiler.compile_source(source, &mut diagnostics);

    compiler.into_compilation(diagnostics)
}

/// Compile an already parsed program (after the prelude, when enabled)
#[tracing::instrument(skip_all, fields(namespace = %options.namespace))]
pub fn compile_program(program: &ast::Program, options: &Options) -> Compilation {
    let mut compiler = Compiler::new(&options.namespace);
    let mut diagnostics = Diagnostics::default();

    if options.prelude {
        compiler.compile_source(stdlib::PRELUDE, &mut diagnostics);
    }
    compiler.compile_top_level(&program.body, &mut diagnostics);

    compiler.into_compilation(diagnostics)
}

/// Result of lowering an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Known at compile time, no instructions emitted
    Constant(Constant),
    /// Lives in a slot at run time
    Slot(SlotId),
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        Value::Constant(constant)
    }
}

/// Truthiness of a lowered value
#[derive(Debug, Clone, Copy)]
enum Truth {
    Known(bool),
    /// Slot holding a boolean slot compound
    Runtime(SlotId),
}

/// State shared by a function body and every unit nested inside it
#[derive(Debug, Clone)]
struct FunctionContext {
    kind: UnitKind,
    is_async: bool,
    /// Slot holding `this`
    that: Option<SlotId>,
    new_target: Option<SlotId>,
    /// Slot holding the caller's result address
    return_address: Option<SlotId>,
    /// Promise returned by an async function
    promise: Option<SlotId>,
    /// Slot holding the superclass constructor
    super_class: Option<SlotId>,
    /// Slot whose `value` is the superclass prototype record
    super_proto: Option<SlotId>,
    /// Instance fields initialized after `super(...)`
    fields: Vec<ast::ClassProperty>,
    /// Enclosing loops and switches
    breakables: u32,
    /// Enclosing loops; their lexical bindings have one slot for every iteration
    loops: u32,
    /// Top-level declaration whose body this is
    declaration: Option<String>,
}

impl FunctionContext {
    fn script() -> Self {
        FunctionContext {
            kind: UnitKind::Script,
            is_async: false,
            that: None,
            new_target: None,
            return_address: None,
            promise: None,
            super_class: None,
            super_proto: None,
            fields: Vec::new(),
            breakables: 0,
            loops: 0,
            declaration: None,
        }
    }
}

/// Snapshot taken before each top-level statement
struct Checkpoint {
    units: usize,
    functions: usize,
    instrs: usize,
    parents: usize,
    outer: usize,
    current_scopes: Vec<ScopeId>,
    ctx: FunctionContext,
    scopes: ScopeCheckpoint,
}

/// Compiler state for converting the AST to units
pub struct Compiler {
    namespace: String,
    names: NameAllocator,
    scopes: ScopeArena,
    global: ScopeId,

    /// Finished units, in completion order
    units: FxIndexMap<String, Unit>,

    /// Top-level function declarations, called directly
    functions: FxIndexMap<String, FunctionSig>,

    /// Top-level functions each declaration calls by name
    calls: FxHashMap<String, FxHashSet<String>>,

    /// Lexical bindings declared in a loop, with the function depth declaring them
    loop_bindings: FxHashMap<SlotId, usize>,

    /// Prototype records of classes, by the slot of their binding
    class_protos: FxHashMap<SlotId, HeapId>,

    /// Lexical bindings declared ahead of their declaration statement
    hoisted: FxHashSet<(ScopeId, String)>,

    /// Unit being built and the units it is nested in
    current: UnitBuilder,
    parents: Vec<UnitBuilder>,

    /// Function being compiled and the functions it is nested in
    ctx: FunctionContext,
    outer: Vec<FunctionContext>,
}

impl Compiler {
    pub fn new(namespace: &str) -> Self {
        let mut scopes = ScopeArena::new();
        let global = scopes.create();
        Self {
            namespace: namespace.to_string(),
            names: NameAllocator::new(),
            scopes,
            global,
            units: FxIndexMap::default(),
            functions: FxIndexMap::default(),
            calls: FxHashMap::default(),
            loop_bindings: FxHashMap::default(),
            class_protos: FxHashMap::default(),
            hoisted: FxHashSet::default(),
            current: UnitBuilder::new(ENTRY_UNIT.to_string(), UnitKind::Script, 0, vec![global]),
            parents: Vec::new(),
            ctx: FunctionContext::script(),
            outer: Vec::new(),
        }
    }

    /// Parse and compile source text into the entry unit
    pub fn compile_source(&mut self, source: &str, diagnostics: &mut Diagnostics) {
        match parser::parse(source) {
            Ok(program) => self.compile_top_level(&program.body, diagnostics),
            Err(error) => {
                warn!(%error, "source rejected");
                diagnostics.push(error);
            }
        }
    }

    /// Compile top-level statements; a failing statement leaves no trace besides its diagnostic
    pub fn compile_top_level(&mut self, statements: &[Statement], diagnostics: &mut Diagnostics) {
        self.hoist_function_scope(statements);
        for stmt in hoist::hoisted_order(statements) {
            let checkpoint = self.checkpoint();
            if let Err(error) = self.compile_statement(stmt) {
                warn!(%error, "statement rejected");
                self.rollback(checkpoint);
                diagnostics.push(error);
            }
        }
    }

    /// Finish the entry unit and produce the program
    pub fn finish(mut self) -> Program {
        let entry = std::mem::replace(
            &mut self.current,
            UnitBuilder::new(String::new(), UnitKind::Script, 0, Vec::new()),
        );
        self.units.insert(ENTRY_UNIT.to_string(), entry.finish());

        let globals = self
            .scopes
            .get(self.global)
            .map(|scope| {
                scope
                    .variables
                    .iter()
                    .map(|(name, binding)| (name.clone(), binding.slot))
                    .collect()
            })
            .unwrap_or_default();

        Program {
            namespace: self.namespace,
            entry: ENTRY_UNIT.to_string(),
            units: self.units,
            functions: self.functions,
            globals,
            heap_base: self.names.heap_count(),
        }
    }

    fn into_compilation(self, diagnostics: Diagnostics) -> Compilation {
        let program = self.finish();
        debug!(
            units = program.units.len(),
            errors = diagnostics.len(),
            "compilation finished"
        );
        Compilation {
            program,
            diagnostics,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            units: self.units.len(),
            functions: self.functions.len(),
            instrs: self.current.instrs.len(),
            parents: self.parents.len(),
            outer: self.outer.len(),
            current_scopes: self.current.scopes.clone(),
            ctx: self.ctx.clone(),
            scopes: self.scopes.checkpoint(self.global),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        if self.parents.len() > checkpoint.parents {
            let dropped = self.parents.split_off(checkpoint.parents);
            if let Some(statement_unit) = dropped.into_iter().next() {
                self.current = statement_unit;
            }
        }
        self.outer.truncate(checkpoint.outer);
        self.ctx = checkpoint.ctx;

        self.current.instrs.truncate(checkpoint.instrs);
        self.current.scopes = checkpoint.current_scopes;
        self.units.truncate(checkpoint.units);
        self.functions.truncate(checkpoint.functions);
        let functions = &self.functions;
        self.calls.retain(|caller, _| functions.contains_key(caller));
        self.scopes.rollback(self.global, checkpoint.scopes);
    }

    // ============ UNITS ============

    fn add_unit(&mut self, unit: Unit) {
        trace!(unit = %unit.name, kind = ?unit.meta.kind, instrs = unit.instrs.len(), "unit emitted");
        self.units.insert(unit.name.clone(), unit);
    }

    /// Fully qualified function id of a unit
    fn function_id(&self, unit: &str) -> String {
        format!("{}:{}", self.namespace, unit)
    }

    /// Slot compound of a function value
    fn function_literal(&self, record: HeapId, unit: &str) -> Nbt {
        Nbt::slot(
            Kind::Function,
            Nbt::String(record.key()),
            Some(&self.function_id(unit)),
        )
    }

    /// Open a child unit nested in the current one
    fn begin_child(&mut self, kind: UnitKind, open_scope: bool) -> String {
        let name = self.names.unit();
        let scope = open_scope.then(|| self.scopes.create());
        let child = self.current.child(name.clone(), kind, scope);
        let parent = std::mem::replace(&mut self.current, child);
        self.parents.push(parent);
        name
    }

    /// Close the current child unit, returning its name
    fn end_child(&mut self) -> Result<String, CompileError> {
        let parent = self
            .parents
            .pop()
            .ok_or_else(|| CompileError::invariant("no enclosing unit", Span::default()))?;
        let child = std::mem::replace(&mut self.current, parent);
        let name = child.name.clone();
        self.add_unit(child.finish());
        Ok(name)
    }

    /// Compile `body` into a fresh child unit
    fn in_child(
        &mut self,
        kind: UnitKind,
        open_scope: bool,
        body: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<String, CompileError> {
        self.begin_child(kind, open_scope);
        let result = body(self);
        let name = self.end_child()?;
        result.map(|()| name)
    }

    /// Compile `body` with a block scope opened in the current unit
    fn with_block_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        let scope = self.scopes.create();
        self.current.push_scope(scope);
        let result = body(self);
        self.current.pop_scope();
        result
    }

    /// Code `return` uses in the current unit: normal at a function body, relayed below it
    fn return_code(&self) -> i32 {
        if self.current.depth == 0 { NORMAL } else { RETURN }
    }

    /// Invoke a unit that may complete abruptly, relaying its return code.
    ///
    /// The code is stored in a fresh cell; `BREAK` is re-emitted unless this call
    /// site is the loop or switch that consumes it, and `RETURN` is re-emitted as
    /// this unit's own return code.
    fn invoke_wrapped(
        &mut self,
        guard: Guard,
        target: Target,
        channel: Option<ChannelId>,
        consume_break: bool,
    ) {
        let cell = self.names.slot();
        self.current
            .set(Place::slot(cell), Operand::Literal(Nbt::Int(NORMAL)));
        self.current
            .invoke(guard, target, channel, Some(Place::slot(cell)));

        if !consume_break && self.ctx.breakables > 0 {
            self.current
                .return_if(Guard::when(Place::slot(cell), Nbt::Int(BREAK)), BREAK);
        }
        if self.ctx.kind != UnitKind::Script {
            let code = self.return_code();
            self.current
                .return_if(Guard::when(Place::slot(cell), Nbt::Int(RETURN)), code);
        }
    }

    /// Reset a channel and write its entries
    fn fill_channel(&mut self, entries: Vec<(&str, Operand)>) -> ChannelId {
        let channel = self.names.channel();
        let mut header = FxIndexMap::default();
        header.insert("frame".to_string(), Nbt::String(channel.key()));
        self.current.set(
            Place::channel(channel, None),
            Operand::Literal(Nbt::Compound(header)),
        );
        for (entry, operand) in entries {
            self.current
                .set(Place::channel(channel, Some(entry)), operand);
        }
        channel
    }

    /// Call a library primitive with the given channel entries
    fn call_library(&mut self, primitive: Primitive, entries: Vec<(&str, Operand)>) {
        let channel = self.fill_channel(entries);
        self.current.invoke(
            Guard::always(),
            Target::Library(primitive),
            Some(channel),
            None,
        );
    }

    // ============ VALUES ============

    /// Write operand for a lowered value
    fn operand(value: &Value) -> Operand {
        match value {
            Value::Constant(constant) => Operand::Literal(constant.to_slot()),
            Value::Slot(slot) => Operand::Copy(Place::slot(*slot)),
        }
    }

    fn assign(&mut self, dst: SlotId, value: &Value) {
        if *value == Value::Slot(dst) {
            return;
        }
        self.current.set(Place::slot(dst), Self::operand(value));
    }

    /// A slot holding `value`, writing constants into a fresh one
    fn materialize(&mut self, value: Value) -> SlotId {
        match value {
            Value::Slot(slot) => slot,
            Value::Constant(constant) => {
                let slot = self.names.slot();
                self.current
                    .set(Place::slot(slot), Operand::Literal(constant.to_slot()));
                slot
            }
        }
    }

    /// A fresh slot holding `constant`
    fn fresh_slot(&mut self, constant: Constant) -> SlotId {
        self.materialize(Value::Constant(constant))
    }

    /// Compute the truthiness of a value, as a boolean slot when not known
    fn truthiness(&mut self, value: &Value) -> Truth {
        match value {
            Value::Constant(constant) => Truth::Known(constant.is_truthy()),
            Value::Slot(slot) => Truth::Runtime(self.truth_flag(*slot)),
        }
    }

    /// Boolean slot set to the truthiness of the value in `slot`
    fn truth_flag(&mut self, slot: SlotId) -> SlotId {
        let flag = self.fresh_slot(Constant::Boolean(false));
        let ty = Place::slot_field(slot, "type");
        let payload = Place::slot_field(slot, "value");
        let tag = |kind: Kind| Nbt::String(kind.as_str().to_string());

        let truthy_when = [
            Guard::when(ty.clone(), tag(Kind::Boolean)).and(payload.clone(), Nbt::Bool(true)),
            Guard::when(ty.clone(), tag(Kind::Number))
                .and_not(payload.clone(), Nbt::Double(0.0))
                .and_not(payload.clone(), Nbt::Double(f64::NAN)),
            Guard::when(ty.clone(), tag(Kind::String)).and_not(payload, Nbt::String(String::new())),
            Guard::when(ty.clone(), tag(Kind::Object)),
            Guard::when(ty.clone(), tag(Kind::Array)),
            Guard::when(ty, tag(Kind::Function)),
        ];
        for guard in truthy_when {
            self.current.set_guarded(
                guard,
                Place::slot_field(flag, "value"),
                Operand::Literal(Nbt::Bool(true)),
            );
        }
        flag
    }

    // ============ SCOPES ============

    fn resolve(&self, name: &str) -> Option<Binding> {
        self.scopes.resolve(&self.current.scopes, name)
    }

    /// Declare `name` in the innermost scope of the current unit, claiming a
    /// hoisted binding when there is one. `var` reuses the function's binding.
    fn declare(&mut self, name: &str, kind: BindingKind, span: Span) -> Result<SlotId, CompileError> {
        let scope = self
            .current
            .innermost_scope()
            .ok_or_else(|| CompileError::invariant("declaration outside any scope", span))?;

        if self.hoisted.remove(&(scope, name.to_string())) {
            if let Some(binding) = self.scopes.resolve(&[scope], name) {
                return Ok(binding.slot);
            }
        }
        if kind == BindingKind::Var {
            if let Some(binding) = self.resolve(name).filter(|b| b.kind == BindingKind::Var) {
                return Ok(binding.slot);
            }
        }
        self.declare_in(scope, name, kind, span)
    }

    fn declare_in(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: BindingKind,
        span: Span,
    ) -> Result<SlotId, CompileError> {
        let binding = Binding {
            slot: self.names.slot(),
            kind,
        };
        match self.scopes.declare(scope, name, binding) {
            Ok(binding) => {
                if self.ctx.loops > 0 && matches!(kind, BindingKind::Let | BindingKind::Const) {
                    self.loop_bindings.insert(binding.slot, self.outer.len());
                }
                Ok(binding.slot)
            }
            Err(DeclareError::AlreadyDeclared(name)) => Err(CompileError::syntax(
                format!("Identifier '{}' has already been declared", name),
                span,
            )),
            Err(DeclareError::UnknownScope(_)) => {
                Err(CompileError::invariant("declaration in an unknown scope", span))
            }
        }
    }

    /// Binding of a global, declaring it when missing (`globalThis.x = ...`)
    fn global_binding(&mut self, name: &str, span: Span) -> Result<SlotId, CompileError> {
        if let Some(binding) = self.scopes.resolve(&[self.global], name) {
            return Ok(binding.slot);
        }
        self.declare_in(self.global, name, BindingKind::Var, span)
    }

    /// Whether `globalThis` refers to the global object here
    fn is_global_this(&self, expr: &ast::Expression) -> bool {
        matches!(expr, ast::Expression::Identifier(id)
            if id.name == "globalThis" && self.resolve("globalThis").is_none())
    }
}

/// Guard holding when a boolean slot is true
fn is_true(flag: SlotId) -> Guard {
    Guard::when(Place::slot_field(flag, "value"), Nbt::Bool(true))
}

/// Guard holding when a boolean slot is false
fn is_false(flag: SlotId) -> Guard {
    Guard::when(Place::slot_field(flag, "value"), Nbt::Bool(false))
}

/// Unit name of a top-level function: uppercase letters become `-` + lowercase
/// and `$` becomes `.`, so distinct identifiers never share a unit
pub fn unit_name_for(identifier: &str) -> String {
    let mut name = String::with_capacity(identifier.len());
    for ch in identifier.chars() {
        match ch {
            'a'..='z' | '0'..='9' | '_' => name.push(ch),
            'A'..='Z' => {
                name.push('-');
                name.push(ch.to_ascii_lowercase());
            }
            '$' => name.push('.'),
            other => name.push_str(&format!("-.{:x}", other as u32)),
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_names() {
        assert_eq!(unit_name_for("main"), "main");
        assert_eq!(unit_name_for("getValue"), "get-value");
        assert_eq!(unit_name_for("$el"), ".el");
        assert_ne!(unit_name_for("aB"), unit_name_for("a_b"));
    }
}
