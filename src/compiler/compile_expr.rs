//! Expression compilation
//!
//! Lowers AST expressions to a [`Value`]: a constant when the result is known at
//! compile time, or a slot written by the emitted instructions.

use super::compile_object::MemberKey;
use super::{Compiler, Guard, Operand, Place, Primitive, SlotId, Target, Truth, UnitKind};
use super::{Value, is_false, is_true};
use crate::ast::{
    AssignmentExpression, AssignmentTarget, BinaryExpression, BinaryOp, ConditionalExpression,
    Expression, Identifier, LiteralValue, LogicalExpression, LogicalOp, MemberExpression,
    MemberProperty, TemplateLiteral, UnaryExpression, UnaryOp, UpdateExpression, UpdateOp,
};
use crate::error::CompileError;
use crate::lexer::Span;
use crate::value::{self, Constant, Kind, Nbt};

/// Where an assignment or update writes its result
enum Reference {
    Binding(SlotId),
    Member(SlotId, MemberKey),
}

impl Compiler {
    /// Compile an expression
    pub(super) fn compile_expression(&mut self, expr: &Expression) -> Result<Value, CompileError> {
        match expr {
            Expression::Literal(lit) => Ok(Value::Constant(literal_constant(&lit.value))),

            Expression::Identifier(id) => self.compile_identifier(id),

            Expression::This(_) => Ok(self
                .ctx
                .that
                .map(Value::Slot)
                .unwrap_or(Value::Constant(Constant::Undefined))),

            Expression::NewTarget(_) => Ok(self
                .ctx
                .new_target
                .map(Value::Slot)
                .unwrap_or(Value::Constant(Constant::Undefined))),

            Expression::Super(span) => Err(CompileError::syntax(
                "'super' keyword unexpected here",
                *span,
            )),

            Expression::Array(arr) => self.compile_array(arr),

            Expression::Object(obj) => self.compile_object(obj),

            Expression::Function(func) => self.compile_function_expression(func),

            Expression::ArrowFunction(arrow) => self.compile_arrow_function(arrow),

            Expression::Class(class) => self.compile_class(
                class.id.as_ref(),
                class.super_class.as_deref(),
                &class.body,
                false,
                class.span,
            ),

            Expression::Template(template) => self.compile_template(template),

            Expression::Unary(unary) => self.compile_unary(unary),

            Expression::Binary(binary) => self.compile_binary(binary),

            Expression::Logical(logical) => self.compile_logical(logical),

            Expression::Conditional(cond) => self.compile_conditional(cond),

            Expression::Assignment(assign) => self.compile_assignment(assign),

            Expression::Update(update) => self.compile_update(update),

            Expression::Sequence(seq) => {
                let mut last = Value::Constant(Constant::Undefined);
                for expr in &seq.expressions {
                    last = self.compile_expression(expr)?;
                }
                Ok(last)
            }

            Expression::Member(member) => self.compile_member(member),

            Expression::Call(call) => self.compile_call(call),

            Expression::New(new) => self.compile_new(new),

            Expression::Await(await_expr) => self.compile_await(await_expr),

            Expression::Spread(spread) => {
                Err(CompileError::unsupported("spread element", spread.span))
            }
            Expression::Yield(yield_expr) => {
                Err(CompileError::unsupported("yield expression", yield_expr.span))
            }
        }
    }

    pub(super) fn compile_identifier(&mut self, id: &Identifier) -> Result<Value, CompileError> {
        if let Some(binding) = self.resolve(&id.name) {
            self.check_loop_capture(binding.slot, id)?;
            return Ok(Value::Slot(binding.slot));
        }
        match id.name.as_str() {
            "undefined" => Ok(Value::Constant(Constant::Undefined)),
            "NaN" => Ok(Value::Constant(Constant::Number(f64::NAN))),
            "Infinity" => Ok(Value::Constant(Constant::Number(f64::INFINITY))),
            "globalThis" => Err(CompileError::unsupported(
                "globalThis as a value",
                id.span,
            )),
            _ => Err(CompileError::unresolved(&id.name, id.span)),
        }
    }

    /// Binding an assignment may write to
    pub(super) fn assignable_binding(&mut self, id: &Identifier) -> Result<SlotId, CompileError> {
        let binding = self
            .resolve(&id.name)
            .ok_or_else(|| CompileError::unresolved(&id.name, id.span))?;
        if !binding.kind.is_mutable() {
            return Err(CompileError::syntax(
                "Assignment to constant variable.",
                id.span,
            ));
        }
        self.check_loop_capture(binding.slot, id)?;
        Ok(binding.slot)
    }

    /// A closure would see the last iteration's value of a loop binding, not its own
    fn check_loop_capture(&self, slot: SlotId, id: &Identifier) -> Result<(), CompileError> {
        match self.loop_bindings.get(&slot) {
            Some(depth) if self.outer.len() > *depth => Err(CompileError::unsupported(
                format!("closure capturing loop binding '{}'", id.name),
                id.span,
            )),
            _ => Ok(()),
        }
    }

    // ============ OPERATORS ============

    fn compile_binary(&mut self, binary: &BinaryExpression) -> Result<Value, CompileError> {
        let left = self.compile_expression(&binary.left)?;
        let left = if is_binding(&binary.left) && may_assign(&binary.right) {
            self.snapshot(left)
        } else {
            left
        };
        let right = self.compile_expression(&binary.right)?;
        self.apply_binary(binary.operator, left, right, binary.span)
    }

    /// Apply a binary operator, folding constants and calling the matching primitive otherwise
    pub(super) fn apply_binary(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        span: Span,
    ) -> Result<Value, CompileError> {
        if let (Value::Constant(l), Value::Constant(r)) = (&left, &right) {
            if let Some(folded) = value::binary(op, l, r) {
                return Ok(Value::Constant(folded));
            }
        }

        let (primitive, operation) = match op {
            BinaryOp::Add => (Primitive::Add, None),
            BinaryOp::Sub => (Primitive::Subtract, None),
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Exp => {
                (Primitive::MathOperation, Some(op.as_str()))
            }
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => {
                (Primitive::Equals, Some(op.as_str()))
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                (Primitive::NumberCompare, Some(op.as_str()))
            }
            BinaryOp::In | BinaryOp::Instanceof => {
                return Err(CompileError::unsupported(
                    format!("'{}' operator", op.as_str()),
                    span,
                ));
            }
            _ => {
                return Err(CompileError::unsupported(
                    format!("bitwise operator '{}' on runtime values", op.as_str()),
                    span,
                ));
            }
        };

        let left = self.materialize(left);
        let right = self.materialize(right);
        let result = self.names.slot();
        let mut entries = vec![
            ("left", Operand::slot_address(left)),
            ("right", Operand::slot_address(right)),
            ("result", Operand::slot_address(result)),
        ];
        if let Some(operation) = operation {
            entries.push(("operation", Operand::string(operation)));
        }
        self.call_library(primitive, entries);
        Ok(Value::Slot(result))
    }

    /// Numeric value of a slot (unary `+`)
    fn to_number(&mut self, slot: SlotId) -> SlotId {
        let result = self.names.slot();
        self.call_library(
            Primitive::ToNumber,
            vec![
                ("value", Operand::slot_address(slot)),
                ("result", Operand::slot_address(result)),
            ],
        );
        result
    }

    fn compile_unary(&mut self, unary: &UnaryExpression) -> Result<Value, CompileError> {
        match unary.operator {
            UnaryOp::Delete => {
                return Err(CompileError::unsupported("delete operator", unary.span));
            }
            UnaryOp::Typeof => {
                if let Expression::Identifier(id) = &*unary.argument {
                    if self.resolve(&id.name).is_none()
                        && !matches!(id.name.as_str(), "NaN" | "Infinity")
                    {
                        return Ok(Value::Constant(Constant::from("undefined")));
                    }
                }
            }
            _ => {}
        }

        let argument = self.compile_expression(&unary.argument)?;
        let slot = match argument {
            Value::Constant(constant) => return fold_unary(unary, &constant),
            Value::Slot(slot) => slot,
        };

        match unary.operator {
            UnaryOp::Minus => self.apply_binary(
                BinaryOp::Sub,
                Value::Constant(Constant::Number(0.0)),
                Value::Slot(slot),
                unary.span,
            ),
            UnaryOp::Plus => Ok(Value::Slot(self.to_number(slot))),
            UnaryOp::Not => {
                let flag = self.truth_flag(slot);
                let result = self.fresh_slot(Constant::Boolean(false));
                self.current.set_guarded(
                    is_false(flag),
                    Place::slot_field(result, "value"),
                    Operand::Literal(Nbt::Bool(true)),
                );
                Ok(Value::Slot(result))
            }
            UnaryOp::Typeof => Ok(Value::Slot(self.type_of(slot))),
            UnaryOp::Void => Ok(Value::Constant(Constant::Undefined)),
            UnaryOp::BitNot => Err(CompileError::unsupported(
                "bitwise operator '~' on runtime values",
                unary.span,
            )),
            UnaryOp::Delete => Err(CompileError::unsupported("delete operator", unary.span)),
        }
    }

    /// String slot holding `typeof` of the value in `slot`
    fn type_of(&mut self, slot: SlotId) -> SlotId {
        let result = self.fresh_slot(Constant::from("undefined"));
        for kind in Kind::ALL {
            if kind == Kind::Undefined {
                continue;
            }
            self.current.set_guarded(
                Guard::when(
                    Place::slot_field(slot, "type"),
                    Nbt::String(kind.as_str().to_string()),
                ),
                Place::slot_field(result, "value"),
                Operand::string(value::type_of(kind)),
            );
        }
        result
    }

    /// `&&`, `||` and `??`: the right side runs in its own unit, only when needed
    fn compile_logical(&mut self, logical: &LogicalExpression) -> Result<Value, CompileError> {
        let left = self.compile_expression(&logical.left)?;

        let left_slot = match &left {
            Value::Constant(constant) => {
                let short_circuits = match logical.operator {
                    LogicalOp::And => !constant.is_truthy(),
                    LogicalOp::Or => constant.is_truthy(),
                    LogicalOp::NullishCoalescing => {
                        !matches!(constant, Constant::Undefined | Constant::Null)
                    }
                };
                return if short_circuits {
                    Ok(left)
                } else {
                    self.compile_expression(&logical.right)
                };
            }
            Value::Slot(slot) => *slot,
        };

        let result = self.names.slot();
        self.current
            .set(Place::slot(result), Operand::Copy(Place::slot(left_slot)));

        let guard = match logical.operator {
            LogicalOp::And => is_true(self.truth_flag(left_slot)),
            LogicalOp::Or => is_false(self.truth_flag(left_slot)),
            LogicalOp::NullishCoalescing => {
                let nullish = self.fresh_slot(Constant::Boolean(false));
                for kind in [Kind::Undefined, Kind::Null] {
                    self.current.set_guarded(
                        Guard::when(
                            Place::slot_field(left_slot, "type"),
                            Nbt::String(kind.as_str().to_string()),
                        ),
                        Place::slot_field(nullish, "value"),
                        Operand::Literal(Nbt::Bool(true)),
                    );
                }
                is_true(nullish)
            }
        };

        let unit = self.in_child(UnitKind::Expression, false, |c| {
            let right = c.compile_expression(&logical.right)?;
            c.assign(result, &right);
            Ok(())
        })?;
        self.current
            .invoke(guard, Target::Unit(unit), None, None);
        Ok(Value::Slot(result))
    }

    fn compile_conditional(&mut self, cond: &ConditionalExpression) -> Result<Value, CompileError> {
        let test = self.compile_expression(&cond.test)?;

        let flag = match self.truthiness(&test) {
            Truth::Known(true) => return self.compile_expression(&cond.consequent),
            Truth::Known(false) => return self.compile_expression(&cond.alternate),
            Truth::Runtime(flag) => flag,
        };

        let result = self.names.slot();
        for (branch, guard) in [
            (&cond.consequent, is_true(flag)),
            (&cond.alternate, is_false(flag)),
        ] {
            let unit = self.in_child(UnitKind::Expression, false, |c| {
                let value = c.compile_expression(branch)?;
                c.assign(result, &value);
                Ok(())
            })?;
            self.current
                .invoke(guard, Target::Unit(unit), None, None);
        }
        Ok(Value::Slot(result))
    }

    fn compile_template(&mut self, template: &TemplateLiteral) -> Result<Value, CompileError> {
        let mut quasis = template.quasis.iter();
        let head = quasis.next().cloned().unwrap_or_default();
        let mut acc = Value::Constant(Constant::String(head));

        for expr in &template.expressions {
            let part = self.compile_expression(expr)?;
            acc = self.apply_binary(BinaryOp::Add, acc, part, template.span)?;
            if let Some(quasi) = quasis.next().filter(|q| !q.is_empty()) {
                acc = self.apply_binary(
                    BinaryOp::Add,
                    acc,
                    Value::Constant(Constant::String(quasi.clone())),
                    template.span,
                )?;
            }
        }
        Ok(acc)
    }

    // ============ ASSIGNMENT ============

    fn compile_assignment(&mut self, assign: &AssignmentExpression) -> Result<Value, CompileError> {
        let reference = match &assign.left {
            AssignmentTarget::Identifier(id) => Reference::Binding(self.assignable_binding(id)?),
            AssignmentTarget::Member(member) => self.member_reference(member)?,
            AssignmentTarget::Pattern(pattern) => {
                return Err(CompileError::unsupported(
                    "destructuring assignment",
                    pattern.span(),
                ));
            }
        };

        let value = match assign.operator.binary_op() {
            Some(op) => {
                let current = self.read_reference(&reference);
                let current = match &reference {
                    Reference::Binding(_) if may_assign(&assign.right) => self.snapshot(current),
                    _ => current,
                };
                let right = self.compile_expression(&assign.right)?;
                self.apply_binary(op, current, right, assign.span)?
            }
            None => self.compile_expression(&assign.right)?,
        };

        Ok(self.write_reference(reference, value))
    }

    /// Copy of a slot value, taken before a later operand can overwrite the slot
    pub(super) fn snapshot(&mut self, value: Value) -> Value {
        match value {
            Value::Slot(slot) => {
                let copy = self.names.slot();
                self.current
                    .set(Place::slot(copy), Operand::Copy(Place::slot(slot)));
                Value::Slot(copy)
            }
            constant => constant,
        }
    }

    fn compile_update(&mut self, update: &UpdateExpression) -> Result<Value, CompileError> {
        let reference = match &*update.argument {
            Expression::Identifier(id) => Reference::Binding(self.assignable_binding(id)?),
            Expression::Member(member) => self.member_reference(member)?,
            _ => {
                return Err(CompileError::syntax(
                    "Invalid left-hand side expression in update operation",
                    update.span,
                ));
            }
        };

        let current = self.read_reference(&reference);
        let current = self.materialize(current);
        let old = self.to_number(current);
        let op = match update.operator {
            UpdateOp::Increment => BinaryOp::Add,
            UpdateOp::Decrement => BinaryOp::Sub,
        };
        let new = self.apply_binary(
            op,
            Value::Slot(old),
            Value::Constant(Constant::Number(1.0)),
            update.span,
        )?;
        let new = self.write_reference(reference, new);

        Ok(if update.prefix { new } else { Value::Slot(old) })
    }

    fn member_reference(&mut self, member: &MemberExpression) -> Result<Reference, CompileError> {
        if member.optional {
            return Err(CompileError::unsupported(
                "optional chaining in assignment",
                member.span,
            ));
        }
        if let Expression::Super(span) = &*member.object {
            return Err(CompileError::unsupported(
                "assignment to super property",
                *span,
            ));
        }
        if self.is_global_this(&member.object) {
            if let MemberProperty::Identifier(id) = &member.property {
                return Ok(Reference::Binding(self.global_binding(&id.name, id.span)?));
            }
        }

        let object = self.compile_expression(&member.object)?;
        let object = self.materialize(object);
        let key = self.member_key(&member.property)?;
        Ok(Reference::Member(object, key))
    }

    fn read_reference(&mut self, reference: &Reference) -> Value {
        match reference {
            Reference::Binding(slot) => Value::Slot(*slot),
            Reference::Member(object, key) => Value::Slot(self.get_member(*object, key.clone())),
        }
    }

    fn write_reference(&mut self, reference: Reference, value: Value) -> Value {
        match reference {
            Reference::Binding(slot) => {
                self.assign(slot, &value);
                Value::Slot(slot)
            }
            Reference::Member(object, key) => {
                let value = self.materialize(value);
                self.set_member(object, key, value);
                Value::Slot(value)
            }
        }
    }
}

fn literal_constant(literal: &LiteralValue) -> Constant {
    match literal {
        LiteralValue::Null => Constant::Null,
        LiteralValue::Undefined => Constant::Undefined,
        LiteralValue::Boolean(b) => Constant::Boolean(*b),
        LiteralValue::Number(n) => Constant::Number(*n),
        LiteralValue::String(s) => Constant::String(s.clone()),
    }
}

fn fold_unary(unary: &UnaryExpression, constant: &Constant) -> Result<Value, CompileError> {
    let folded = match unary.operator {
        UnaryOp::Minus => Constant::Number(-constant.to_number()),
        UnaryOp::Plus => Constant::Number(constant.to_number()),
        UnaryOp::Not => Constant::Boolean(!constant.is_truthy()),
        UnaryOp::BitNot => Constant::Number(f64::from(!value::to_int32(constant.to_number()))),
        UnaryOp::Typeof => Constant::from(value::type_of(constant.kind())),
        UnaryOp::Void => Constant::Undefined,
        UnaryOp::Delete => {
            return Err(CompileError::unsupported("delete operator", unary.span));
        }
    };
    Ok(Value::Constant(folded))
}

/// A bare identifier, read straight from its binding slot
pub(super) fn is_binding(expr: &Expression) -> bool {
    matches!(expr, Expression::Identifier(_))
}

/// Whether evaluating `expr` can write a binding the surrounding expression already read
pub(super) fn may_assign(expr: &Expression) -> bool {
    match expr {
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This(_)
        | Expression::NewTarget(_)
        | Expression::Function(_)
        | Expression::ArrowFunction(_) => false,
        Expression::Binary(binary) => may_assign(&binary.left) || may_assign(&binary.right),
        Expression::Logical(logical) => may_assign(&logical.left) || may_assign(&logical.right),
        Expression::Unary(unary) => may_assign(&unary.argument),
        Expression::Conditional(cond) => {
            may_assign(&cond.test) || may_assign(&cond.consequent) || may_assign(&cond.alternate)
        }
        Expression::Member(member) => {
            may_assign(&member.object)
                || matches!(&member.property, MemberProperty::Expression(key) if may_assign(key))
        }
        Expression::Template(template) => template.expressions.iter().any(may_assign),
        _ => true,
    }
}
