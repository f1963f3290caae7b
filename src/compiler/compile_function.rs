//! Functions and calls
//!
//! Every function is a unit plus a static heap record. A function value is a
//! slot `{type:"function", value:"h<record>", function:"<ns>:<unit>"}`; calling
//! it fills a channel with `arg0..arg7`, `this`, `newtarget` and the address the
//! result is written to, then invokes the unit with that channel.
//!
//! Frames are static: every binding and temporary has one slot for the whole
//! compilation, shared by all activations of its function. Recursion between
//! top-level declarations is therefore rejected.

use rustc_hash::FxHashSet;

use super::compile_expr::{is_binding, may_assign};
use super::compile_object::{MemberKey, empty_record};
use super::{
    BindingKind, Compiler, FunctionContext, FunctionSig, Guard, HeapId, MAX_ARGS, Operand, Place,
    Primitive, SlotId, Target, UnitBuilder, UnitKind, Value, unit_name_for,
};
use crate::ast::{
    ArrowFunctionBody, ArrowFunctionExpression, CallExpression, ClassProperty, Expression,
    FunctionDeclaration, FunctionExpression, FunctionParam, Identifier, NewExpression, Pattern,
    Statement,
};
use crate::error::CompileError;
use crate::lexer::Span;
use crate::value::{Constant, Kind, Nbt};

/// What a function unit runs after its prologue
pub(super) enum FunctionBody<'a> {
    Block(&'a [Statement]),
    /// Concise arrow body, returned
    Expression(&'a Expression),
    /// Implicit constructor of a class without one
    DefaultConstructor,
}

/// Class a constructor or method belongs to
#[derive(Debug, Clone)]
pub(super) struct ClassScope {
    pub super_class: Option<SlotId>,
    pub super_proto: Option<SlotId>,
    /// Instance fields, initialized by the constructor
    pub fields: Vec<ClassProperty>,
}

pub(super) struct FunctionSpec<'a> {
    pub kind: UnitKind,
    /// Unit name; generated when absent
    pub unit: Option<String>,
    /// Heap record already written by the caller
    pub record: Option<HeapId>,
    pub params: &'a [FunctionParam],
    pub body: FunctionBody<'a>,
    pub is_async: bool,
    pub generator: bool,
    pub class: Option<ClassScope>,
    pub span: Span,
}

pub(super) struct FunctionValue {
    pub literal: Nbt,
}

/// Arguments of a call, as channel entries
pub(super) struct CallArguments {
    entries: Vec<(String, Operand)>,
}

impl Compiler {
    // ============ DEFINITION ============

    pub(super) fn compile_function_declaration(
        &mut self,
        func: &FunctionDeclaration,
    ) -> Result<(), CompileError> {
        let top_level = self.ctx.kind == UnitKind::Script
            && self.parents.is_empty()
            && self.current.scopes.len() == 1;

        let binding = self.declare(&func.id.name, BindingKind::Function, func.id.span)?;

        let unit = if top_level {
            if self.functions.contains_key(&func.id.name) {
                return Err(CompileError::syntax(
                    format!("Identifier '{}' has already been declared", func.id.name),
                    func.id.span,
                ));
            }
            let unit = unit_name_for(&func.id.name);
            self.functions.insert(
                func.id.name.clone(),
                FunctionSig {
                    unit: unit.clone(),
                    params: param_names(&func.params),
                    is_async: func.async_,
                    binding,
                },
            );
            Some(unit)
        } else {
            None
        };

        let function = self.create_function(FunctionSpec {
            kind: UnitKind::Function,
            unit,
            record: None,
            params: &func.params,
            body: FunctionBody::Block(&func.body.body),
            is_async: func.async_,
            generator: func.generator,
            class: None,
            span: func.span,
        })?;
        self.current
            .set(Place::slot(binding), Operand::Literal(function.literal));
        Ok(())
    }

    pub(super) fn compile_function_expression(
        &mut self,
        func: &FunctionExpression,
    ) -> Result<Value, CompileError> {
        // A named function expression sees its own name
        let Some(id) = &func.id else {
            return self.function_expression_value(func);
        };
        self.with_block_scope(|c| {
            let binding = c.declare(&id.name, BindingKind::Const, id.span)?;
            let value = c.function_expression_value(func)?;
            c.assign(binding, &value);
            Ok(value)
        })
    }

    fn function_expression_value(&mut self, func: &FunctionExpression) -> Result<Value, CompileError> {
        let function = self.create_function(FunctionSpec {
            kind: UnitKind::Function,
            unit: None,
            record: None,
            params: &func.params,
            body: FunctionBody::Block(&func.body.body),
            is_async: func.async_,
            generator: func.generator,
            class: None,
            span: func.span,
        })?;
        Ok(self.function_value(function.literal))
    }

    pub(super) fn compile_arrow_function(
        &mut self,
        arrow: &ArrowFunctionExpression,
    ) -> Result<Value, CompileError> {
        let body = match &arrow.body {
            ArrowFunctionBody::Block(block) => FunctionBody::Block(&block.body),
            ArrowFunctionBody::Expression(expr) => FunctionBody::Expression(expr),
        };
        let function = self.create_function(FunctionSpec {
            kind: UnitKind::Arrow,
            unit: None,
            record: None,
            params: &arrow.params,
            body,
            is_async: arrow.async_,
            generator: false,
            class: None,
            span: arrow.span,
        })?;
        Ok(self.function_value(function.literal))
    }

    /// A fresh slot holding a function value
    pub(super) fn function_slot(&mut self, literal: Nbt) -> SlotId {
        let slot = self.names.slot();
        self.current.set(Place::slot(slot), Operand::Literal(literal));
        slot
    }

    pub(super) fn function_value(&mut self, literal: Nbt) -> Value {
        Value::Slot(self.function_slot(literal))
    }

    /// Compile a function into its own unit and write its heap record in the current one
    pub(super) fn create_function(
        &mut self,
        spec: FunctionSpec<'_>,
    ) -> Result<FunctionValue, CompileError> {
        if spec.generator {
            return Err(CompileError::unsupported("generator function", spec.span));
        }
        if spec.params.len() > MAX_ARGS {
            return Err(CompileError::unsupported(
                format!("function with more than {} parameters", MAX_ARGS),
                spec.span,
            ));
        }

        let unit = match &spec.unit {
            Some(unit) => unit.clone(),
            None => self.names.unit(),
        };
        let record = match spec.record {
            Some(record) => record,
            None => self.function_record(spec.kind),
        };
        let literal = self.function_literal(record, &unit);

        let scope = self.scopes.create();
        let mut chain = self.current.scopes.clone();
        chain.push(scope);
        let mut builder = UnitBuilder::new(unit, spec.kind, 0, chain);
        builder.meta.is_async = spec.is_async;

        let ctx = self.function_context(&spec);
        self.enter_function(builder, ctx);
        let result = self.compile_function_body(&spec);
        self.leave_function()?;
        result?;

        Ok(FunctionValue { literal })
    }

    /// Write the heap record of a new function; plain functions get a prototype object
    fn function_record(&mut self, kind: UnitKind) -> HeapId {
        let record = self.names.heap();
        let prototype = (kind == UnitKind::Function).then(|| {
            let proto = self.names.heap();
            self.current
                .set(Place::heap(proto, &[]), Operand::Literal(empty_record(None)));
            Nbt::slot(Kind::Object, Nbt::String(proto.key()), None)
        });
        self.current.set(
            Place::heap(record, &[]),
            Operand::Literal(empty_record(prototype)),
        );
        record
    }

    fn function_context(&self, spec: &FunctionSpec<'_>) -> FunctionContext {
        let arrow = spec.kind == UnitKind::Arrow;
        let class = spec.class.clone();
        let (super_class, super_proto) = match &class {
            _ if arrow => (self.ctx.super_class, self.ctx.super_proto),
            Some(class) => (class.super_class, class.super_proto),
            None => (None, None),
        };
        FunctionContext {
            kind: spec.kind,
            is_async: spec.is_async,
            that: if arrow { self.ctx.that } else { None },
            new_target: if arrow { self.ctx.new_target } else { None },
            return_address: None,
            promise: None,
            super_class,
            super_proto,
            fields: class.map(|c| c.fields).unwrap_or_default(),
            breakables: 0,
            loops: 0,
            declaration: spec.unit.as_ref().and_then(|unit| {
                self.functions
                    .iter()
                    .find(|(_, sig)| &sig.unit == unit)
                    .map(|(name, _)| name.clone())
            }),
        }
    }

    fn enter_function(&mut self, builder: UnitBuilder, ctx: FunctionContext) {
        let parent = std::mem::replace(&mut self.current, builder);
        self.parents.push(parent);
        let outer = std::mem::replace(&mut self.ctx, ctx);
        self.outer.push(outer);
    }

    /// Finish the function's last unit (the body or its final continuation)
    fn leave_function(&mut self) -> Result<(), CompileError> {
        self.ctx = self
            .outer
            .pop()
            .ok_or_else(|| CompileError::invariant("no enclosing function", Span::default()))?;
        self.end_child()?;
        Ok(())
    }

    fn compile_function_body(&mut self, spec: &FunctionSpec<'_>) -> Result<(), CompileError> {
        if spec.kind == UnitKind::Arrow {
            self.current.meta.that = self.ctx.that.map(SlotId::key);
        } else {
            let that = self.bind_channel_entry("this");
            self.ctx.that = Some(that);
            self.current.meta.that = Some(that.key());
            self.ctx.new_target = Some(self.bind_channel_entry("newtarget"));
        }
        self.current.meta.super_class = self.ctx.super_proto.map(SlotId::key);

        // Result address: a bare slot key, empty when the caller ignores the result
        let return_address = self.names.slot();
        self.current.set(
            Place::slot(return_address),
            Operand::Literal(Nbt::String(String::new())),
        );
        self.current.set(
            Place::slot(return_address),
            Operand::Param("return".to_string()),
        );
        self.ctx.return_address = Some(return_address);

        if spec.is_async {
            self.async_prologue();
        }

        self.bind_params(spec.params)?;

        let base_constructor = spec.kind == UnitKind::Constructor && self.ctx.super_class.is_none();
        if base_constructor {
            let fields = self.ctx.fields.clone();
            self.initialize_fields(&fields)?;
        }

        match spec.body {
            FunctionBody::Block(statements) => {
                self.hoist_function_scope(statements);
                for stmt in super::hoist::hoisted_order(statements) {
                    self.compile_statement(stmt)?;
                }
            }
            FunctionBody::Expression(expr) => {
                let value = self.compile_expression(expr)?;
                self.emit_return(value);
            }
            FunctionBody::DefaultConstructor => {
                if let Some(parent) = self.ctx.super_class {
                    let forwarded = (0..MAX_ARGS)
                        .map(|index| {
                            let name = format!("arg{}", index);
                            (name.clone(), Operand::Param(name))
                        })
                        .collect();
                    self.call_super(parent, CallArguments { entries: forwarded });
                    let fields = self.ctx.fields.clone();
                    self.initialize_fields(&fields)?;
                }
            }
        }

        if spec.is_async {
            self.resolve_async_result(Value::Constant(Constant::Undefined));
        }
        Ok(())
    }

    /// Slot initialized to undefined, then to the channel entry when present
    fn bind_channel_entry(&mut self, entry: &str) -> SlotId {
        let slot = self.fresh_slot(Constant::Undefined);
        self.current
            .set(Place::slot(slot), Operand::Param(entry.to_string()));
        slot
    }

    fn bind_params(&mut self, params: &[FunctionParam]) -> Result<(), CompileError> {
        for (index, param) in params.iter().enumerate() {
            let (id, default) = match &param.pattern {
                Pattern::Identifier(id) => (id, None),
                Pattern::Assignment(assign) => match &*assign.left {
                    Pattern::Identifier(id) => (id, Some(&*assign.right)),
                    _ => {
                        return Err(CompileError::unsupported(
                            "destructuring parameter",
                            param.span,
                        ));
                    }
                },
                Pattern::Rest(_) => {
                    return Err(CompileError::unsupported("rest parameter", param.span));
                }
                Pattern::Object(_) | Pattern::Array(_) => {
                    return Err(CompileError::unsupported(
                        "destructuring parameter",
                        param.span,
                    ));
                }
            };

            let slot = self.declare(&id.name, BindingKind::Param, id.span)?;
            self.assign(slot, &Value::Constant(Constant::Undefined));
            self.current
                .set(Place::slot(slot), Operand::Param(format!("arg{}", index)));

            if let Some(default) = default {
                let unit = self.in_child(UnitKind::Expression, false, |c| {
                    let value = c.compile_expression(default)?;
                    c.assign(slot, &value);
                    Ok(())
                })?;
                let missing = Guard::when(
                    Place::slot_field(slot, "type"),
                    Nbt::String(Kind::Undefined.as_str().to_string()),
                );
                self.current
                    .invoke(missing, Target::Unit(unit), None, None);
            }
        }
        Ok(())
    }

    /// Hand `value` to the caller and leave the function
    pub(super) fn emit_return(&mut self, value: Value) {
        if self.ctx.promise.is_some() {
            self.resolve_async_result(value);
        } else if let Some(return_address) = self.ctx.return_address {
            let source = self.materialize(value);
            self.call_library(
                Primitive::SetVariable,
                vec![
                    ("target", Operand::Copy(Place::slot(return_address))),
                    ("source", Operand::slot_address(source)),
                ],
            );
        }
        let code = self.return_code();
        self.current.emit_return(code);
    }

    // ============ CALLS ============

    pub(super) fn compile_call(&mut self, call: &CallExpression) -> Result<Value, CompileError> {
        if call.optional {
            return Err(CompileError::unsupported("optional call", call.span));
        }

        match &*call.callee {
            Expression::Identifier(id) => {
                if let Some(value) = self.compile_intrinsic(id, &call.arguments)? {
                    return Ok(value);
                }
                self.record_call(id)?;
                if let Some(sig) = self.direct_target(&id.name) {
                    let args = self.compile_arguments(&call.arguments, call.span)?;
                    return Ok(Value::Slot(self.call_direct(&sig.unit, args)));
                }
                let callee = self.compile_identifier(id)?;
                let callee = self.materialize(callee);
                let args = self.compile_arguments(&call.arguments, call.span)?;
                Ok(Value::Slot(self.call_function(callee, None, args)))
            }

            Expression::Super(span) => self.compile_super_call(&call.arguments, *span),

            Expression::Member(member) if !member.optional => {
                if let Expression::Super(span) = &*member.object {
                    let Some(that) = self.ctx.that else {
                        return Err(CompileError::syntax("'super' keyword unexpected here", *span));
                    };
                    let method = match &member.property {
                        crate::ast::MemberProperty::Identifier(id) => id.name.clone(),
                        crate::ast::MemberProperty::Expression(_) => {
                            return Err(CompileError::unsupported("computed super call", *span));
                        }
                    };
                    let callee = self.super_member(&method, *span)?;
                    let args = self.compile_arguments(&call.arguments, call.span)?;
                    return Ok(Value::Slot(self.call_function(callee, Some(that), args)));
                }

                if self.is_global_this(&member.object) {
                    if let crate::ast::MemberProperty::Identifier(id) = &member.property {
                        let callee = self.global_binding(&id.name, id.span)?;
                        let args = self.compile_arguments(&call.arguments, call.span)?;
                        return Ok(Value::Slot(self.call_function(callee, None, args)));
                    }
                }

                let object = self.compile_expression(&member.object)?;
                let object = self.materialize(object);
                let key = self.member_key(&member.property)?;
                let callee = self.get_member(object, key);
                let args = self.compile_arguments(&call.arguments, call.span)?;
                Ok(Value::Slot(self.call_function(callee, Some(object), args)))
            }

            other => {
                let callee = self.compile_expression(other)?;
                let callee = self.materialize(callee);
                let args = self.compile_arguments(&call.arguments, call.span)?;
                Ok(Value::Slot(self.call_function(callee, None, args)))
            }
        }
    }

    /// The top-level declaration `name` resolves to, when it was not shadowed or reassigned away
    /// Track calls between top-level declarations. A frame is shared by
    /// every activation of its function, so a cycle is rejected.
    fn record_call(&mut self, callee: &Identifier) -> Result<(), CompileError> {
        let Some(caller) = self.ctx.declaration.clone() else {
            return Ok(());
        };
        let global = self.scopes.resolve(&[self.global], &callee.name);
        let declared = self
            .resolve(&callee.name)
            .filter(|binding| binding.kind == BindingKind::Function)
            .is_some_and(|binding| Some(binding) == global);
        if !declared {
            return Ok(());
        }
        if callee.name == caller || self.calls_reach(&callee.name, &caller) {
            return Err(CompileError::unsupported(
                format!("recursive call to '{}'", callee.name),
                callee.span,
            ));
        }
        self.calls
            .entry(caller)
            .or_default()
            .insert(callee.name.clone());
        Ok(())
    }

    fn calls_reach(&self, from: &str, to: &str) -> bool {
        let mut seen = FxHashSet::default();
        let mut pending = vec![from];
        while let Some(name) = pending.pop() {
            if name == to {
                return true;
            }
            if seen.insert(name) {
                if let Some(callees) = self.calls.get(name) {
                    pending.extend(callees.iter().map(String::as_str));
                }
            }
        }
        false
    }

    fn direct_target(&self, name: &str) -> Option<FunctionSig> {
        let binding = self.resolve(name)?;
        let sig = self.functions.get(name)?;
        (binding.slot == sig.binding).then(|| sig.clone())
    }

    fn compile_arguments(
        &mut self,
        arguments: &[Expression],
        span: Span,
    ) -> Result<CallArguments, CompileError> {
        if arguments.len() > MAX_ARGS {
            return Err(CompileError::unsupported(
                format!("call with more than {} arguments", MAX_ARGS),
                span,
            ));
        }
        let mut entries = Vec::with_capacity(arguments.len());
        for (index, argument) in arguments.iter().enumerate() {
            if let Expression::Spread(spread) = argument {
                return Err(CompileError::unsupported("spread argument", spread.span));
            }
            let value = self.compile_expression(argument)?;
            let rest = arguments.get(index + 1..).unwrap_or_default();
            let value = if is_binding(argument) && rest.iter().any(may_assign) {
                self.snapshot(value)
            } else {
                value
            };
            entries.push((format!("arg{}", index), Self::operand(&value)));
        }
        Ok(CallArguments { entries })
    }

    /// Fresh result slot plus the channel entries every call carries
    fn call_entries(&mut self, args: CallArguments) -> (SlotId, Vec<(String, Operand)>) {
        let result = self.fresh_slot(Constant::Undefined);
        let mut entries = args.entries;
        entries.push(("return".to_string(), Operand::slot_address(result)));
        (result, entries)
    }

    /// Invoke a top-level function's unit by name
    fn call_direct(&mut self, unit: &str, args: CallArguments) -> SlotId {
        let (result, entries) = self.call_entries(args);
        let channel = self.fill_channel(borrow_entries(&entries));
        self.current.invoke(
            Guard::always(),
            Target::Unit(unit.to_string()),
            Some(channel),
            None,
        );
        result
    }

    /// Call the function value in `callee` through `callfunction`
    pub(super) fn call_function(
        &mut self,
        callee: SlotId,
        this: Option<SlotId>,
        args: CallArguments,
    ) -> SlotId {
        let (result, mut entries) = self.call_entries(args);
        if let Some(this) = this {
            entries.push(("this".to_string(), Operand::Copy(Place::slot(this))));
        }
        self.call_through(callee, entries);
        result
    }

    /// Fill the callee channel and invoke the function value in `callee`
    fn call_through(&mut self, callee: SlotId, entries: Vec<(String, Operand)>) {
        let callee_channel = self.fill_channel(borrow_entries(&entries));
        self.call_library(
            Primitive::CallFunction,
            vec![
                ("function", Operand::slot_address(callee)),
                ("channel", Operand::string(callee_channel.key())),
            ],
        );
    }

    /// `new C(args)`: allocate the instance with C's prototype, run C on it
    pub(super) fn compile_new(&mut self, new: &NewExpression) -> Result<Value, CompileError> {
        let constructor = self.compile_expression(&new.callee)?;
        let constructor = self.materialize(constructor);
        let args = self.compile_arguments(&new.arguments, new.span)?;

        let prototype = self.get_member(constructor, MemberKey::Static("prototype".to_string()));
        let instance = self.names.slot();
        self.call_library(
            Primitive::Allocate,
            vec![
                ("result", Operand::slot_address(instance)),
                ("kind", Operand::string(Kind::Object.as_str())),
                ("prototype", Operand::Copy(Place::slot_field(prototype, "value"))),
            ],
        );

        let (result, mut entries) = self.call_entries(args);
        entries.push(("this".to_string(), Operand::Copy(Place::slot(instance))));
        entries.push((
            "newtarget".to_string(),
            Operand::Copy(Place::slot(constructor)),
        ));
        self.call_through(constructor, entries);

        // A constructor returning an object replaces the allocated instance
        for kind in [Kind::Object, Kind::Array, Kind::Function] {
            self.current.set_guarded(
                Guard::when(
                    Place::slot_field(result, "type"),
                    Nbt::String(kind.as_str().to_string()),
                ),
                Place::slot(instance),
                Operand::Copy(Place::slot(result)),
            );
        }
        Ok(Value::Slot(instance))
    }

    /// `super(args)` inside a derived constructor
    fn compile_super_call(
        &mut self,
        arguments: &[Expression],
        span: Span,
    ) -> Result<Value, CompileError> {
        let parent = self
            .ctx
            .super_class
            .filter(|_| self.ctx.kind == UnitKind::Constructor || self.ctx.kind == UnitKind::Arrow)
            .ok_or_else(|| CompileError::syntax("'super' keyword unexpected here", span))?;
        let args = self.compile_arguments(arguments, span)?;
        self.call_super(parent, args);

        let fields = self.ctx.fields.clone();
        self.initialize_fields(&fields)?;
        Ok(Value::Constant(Constant::Undefined))
    }

    fn call_super(&mut self, parent: SlotId, args: CallArguments) {
        let (_, mut entries) = self.call_entries(args);
        if let Some(that) = self.ctx.that {
            entries.push(("this".to_string(), Operand::Copy(Place::slot(that))));
        }
        if let Some(new_target) = self.ctx.new_target {
            entries.push((
                "newtarget".to_string(),
                Operand::Copy(Place::slot(new_target)),
            ));
        }
        self.call_through(parent, entries);
    }
}

fn borrow_entries(entries: &[(String, Operand)]) -> Vec<(&str, Operand)> {
    entries
        .iter()
        .map(|(name, operand)| (name.as_str(), operand.clone()))
        .collect()
}

fn param_names(params: &[FunctionParam]) -> Vec<String> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| match &param.pattern {
            Pattern::Identifier(id) => id.name.clone(),
            _ => format!("arg{}", index),
        })
        .collect()
}
