//! Compiler intrinsics
//!
//! Calls to these names compile inline instead of resolving a binding. The
//! prelude is written against them; user code may call them too, unless it
//! declares a binding with the same name.

use super::{Compiler, Operand, Place, Primitive, SlotId, Value};
use crate::ast::{Expression, Identifier};
use crate::error::CompileError;
use crate::value::Constant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intrinsic {
    /// Emit a command
    Run,
    /// Concatenate two strings without escaping
    SingleQuoteConcat,
    /// Storage address of an object's record
    ResolveObject,
    /// Storage address of a variable's slot
    ResolveVariable,
    /// Function id of a function value
    CallableFunction,
    ResolvePromise,
    InitPromise,
    ThenPromise,
    /// Run a function after a number of ticks
    Schedule,
    /// Function value whose `this` is fixed
    Bind,
}

impl Intrinsic {
    const ALL: [Intrinsic; 10] = [
        Intrinsic::Run,
        Intrinsic::SingleQuoteConcat,
        Intrinsic::ResolveObject,
        Intrinsic::ResolveVariable,
        Intrinsic::CallableFunction,
        Intrinsic::ResolvePromise,
        Intrinsic::InitPromise,
        Intrinsic::ThenPromise,
        Intrinsic::Schedule,
        Intrinsic::Bind,
    ];

    fn name(self) -> &'static str {
        match self {
            Intrinsic::Run => "__run",
            Intrinsic::SingleQuoteConcat => "__singleQuoteConcat",
            Intrinsic::ResolveObject => "__resolveObject",
            Intrinsic::ResolveVariable => "__resolveVariable",
            Intrinsic::CallableFunction => "__callableFunction",
            Intrinsic::ResolvePromise => "__resolvePromise",
            Intrinsic::InitPromise => "__initPromise",
            Intrinsic::ThenPromise => "__thenPromise",
            Intrinsic::Schedule => "__schedule",
            Intrinsic::Bind => "__bind",
        }
    }

    fn arity(self) -> usize {
        match self {
            Intrinsic::Run
            | Intrinsic::ResolveObject
            | Intrinsic::ResolveVariable
            | Intrinsic::CallableFunction
            | Intrinsic::InitPromise => 1,
            Intrinsic::SingleQuoteConcat
            | Intrinsic::ResolvePromise
            | Intrinsic::ThenPromise
            | Intrinsic::Schedule
            | Intrinsic::Bind => 2,
        }
    }

    fn parse(name: &str) -> Option<Intrinsic> {
        Intrinsic::ALL.into_iter().find(|i| i.name() == name)
    }
}

impl Compiler {
    /// Compile a call to an intrinsic; `None` when `callee` is not one
    pub(super) fn compile_intrinsic(
        &mut self,
        callee: &Identifier,
        arguments: &[Expression],
    ) -> Result<Option<Value>, CompileError> {
        if self.resolve(&callee.name).is_some() {
            return Ok(None);
        }
        let Some(intrinsic) = Intrinsic::parse(&callee.name) else {
            return Ok(None);
        };
        if arguments.len() != intrinsic.arity() {
            return Err(CompileError::syntax(
                format!(
                    "{} expects {} argument(s), got {}",
                    intrinsic.name(),
                    intrinsic.arity(),
                    arguments.len()
                ),
                callee.span,
            ));
        }

        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.compile_expression(argument)?);
        }
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or(Value::Constant(Constant::Undefined));

        let result = match intrinsic {
            Intrinsic::Run => {
                match next() {
                    Value::Constant(command) => self.current.raw(command.to_js_string()),
                    Value::Slot(command) => self.call_library(
                        Primitive::Run,
                        vec![("command", Operand::slot_address(command))],
                    ),
                }
                Value::Constant(Constant::Undefined)
            }

            Intrinsic::SingleQuoteConcat => {
                let (left, right) = (next(), next());
                self.single_quote_concat(left, right)
            }

            Intrinsic::ResolveObject => {
                let object = self.expect_slot(next(), callee)?;
                let key = self.string_from_field(object, "value");
                let prefix = Value::Constant(Constant::String(format!("{}:heap ", self.namespace)));
                self.single_quote_concat(prefix, Value::Slot(key))
            }

            Intrinsic::ResolveVariable => {
                let variable = self.expect_slot(next(), callee)?;
                Value::Constant(Constant::String(format!(
                    "{}:slots {}",
                    self.namespace,
                    variable.key()
                )))
            }

            Intrinsic::CallableFunction => {
                let function = self.expect_slot(next(), callee)?;
                Value::Slot(self.string_from_field(function, "function"))
            }

            Intrinsic::ResolvePromise => {
                let promise = self.expect_slot(next(), callee)?;
                let value = next();
                self.resolve_promise(promise, value);
                Value::Constant(Constant::Undefined)
            }

            Intrinsic::InitPromise => {
                let promise = self.expect_slot(next(), callee)?;
                self.call_library(
                    Primitive::InitPromise,
                    vec![("promise", Operand::slot_address(promise))],
                );
                Value::Constant(Constant::Undefined)
            }

            Intrinsic::ThenPromise => {
                let promise = self.expect_slot(next(), callee)?;
                let listener = next();
                let listener = self.materialize(listener);
                self.await_promise(promise, listener);
                Value::Constant(Constant::Undefined)
            }

            Intrinsic::Schedule => {
                let (function, ticks) = (next(), next());
                let function = self.materialize(function);
                let ticks = self.materialize(ticks);
                self.call_library(
                    Primitive::Schedule,
                    vec![
                        ("function", Operand::slot_address(function)),
                        ("ticks", Operand::slot_address(ticks)),
                    ],
                );
                Value::Constant(Constant::Undefined)
            }

            Intrinsic::Bind => {
                let (function, that) = (next(), next());
                let function = self.materialize(function);
                let that = self.materialize(that);
                let result = self.names.slot();
                self.call_library(
                    Primitive::BindFunction,
                    vec![
                        ("function", Operand::slot_address(function)),
                        ("that", Operand::slot_address(that)),
                        ("result", Operand::slot_address(result)),
                    ],
                );
                Value::Slot(result)
            }
        };
        Ok(Some(result))
    }

    fn single_quote_concat(&mut self, left: Value, right: Value) -> Value {
        if let (Value::Constant(l), Value::Constant(r)) = (&left, &right) {
            return Value::Constant(Constant::String(format!(
                "{}{}",
                l.to_js_string(),
                r.to_js_string()
            )));
        }
        let left = self.materialize(left);
        let right = self.materialize(right);
        let result = self.names.slot();
        self.call_library(
            Primitive::SingleQuoteConcat,
            vec![
                ("left", Operand::slot_address(left)),
                ("right", Operand::slot_address(right)),
                ("result", Operand::slot_address(result)),
            ],
        );
        Value::Slot(result)
    }

    /// String slot holding one field of another slot
    fn string_from_field(&mut self, slot: SlotId, field: &str) -> SlotId {
        let result = self.fresh_slot(Constant::String(String::new()));
        self.current.set(
            Place::slot_field(result, "value"),
            Operand::Copy(Place::slot_field(slot, field)),
        );
        result
    }

    fn expect_slot(&self, value: Value, callee: &Identifier) -> Result<SlotId, CompileError> {
        match value {
            Value::Slot(slot) => Ok(slot),
            Value::Constant(_) => Err(CompileError::unsupported(
                format!("{} on a constant", callee.name),
                callee.span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_names() {
        for intrinsic in Intrinsic::ALL {
            assert_eq!(Intrinsic::parse(intrinsic.name()), Some(intrinsic));
        }
        assert_eq!(Intrinsic::parse("__nope"), None);
        assert_eq!(Intrinsic::Schedule.arity(), 2);
        assert_eq!(Intrinsic::parse("__bind"), Some(Intrinsic::Bind));
    }
}
