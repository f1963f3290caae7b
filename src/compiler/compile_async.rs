//! Async functions and `await`
//!
//! An async function allocates its promise in the prologue and hands it to the
//! caller as the call result. `return` and the end of the body resolve it.
//!
//! `await p` splits the function: the code after it moves to a continuation
//! unit, registered on `p` through `awaitpromise`, and the current unit ends.
//! The continuation receives the settled value as `arg0`. Only the function
//! body level can be split, so `await` inside a branch, loop or expression
//! unit is rejected.

use super::{Compiler, NORMAL, Operand, Place, Primitive, SlotId, UnitBuilder, UnitKind, Value};
use crate::ast::AwaitExpression;
use crate::error::CompileError;
use crate::value::{Constant, Kind, Nbt};

impl Compiler {
    /// Allocate the function's promise and return it to the caller
    pub(super) fn async_prologue(&mut self) {
        let promise = self.allocate_instance_of("Promise");
        self.ctx.promise = Some(promise);
        self.call_library(
            Primitive::InitPromise,
            vec![("promise", Operand::slot_address(promise))],
        );
        if let Some(return_address) = self.ctx.return_address {
            self.call_library(
                Primitive::SetVariable,
                vec![
                    ("target", Operand::Copy(Place::slot(return_address))),
                    ("source", Operand::slot_address(promise)),
                ],
            );
        }
    }

    /// Resolve the current async function's promise with `value`
    pub(super) fn resolve_async_result(&mut self, value: Value) {
        if let Some(promise) = self.ctx.promise {
            self.resolve_promise(promise, value);
        }
    }

    /// Settle `promise` and run its listeners
    pub(super) fn resolve_promise(&mut self, promise: SlotId, value: Value) {
        let value = self.materialize(value);
        let listener_channel = self.names.channel();
        self.call_library(
            Primitive::ResolvePromise,
            vec![
                ("promise", Operand::slot_address(promise)),
                ("value", Operand::slot_address(value)),
                ("channel", Operand::string(listener_channel.key())),
            ],
        );
    }

    /// Register `listener` on `promise`; runs it at once when already settled
    pub(super) fn await_promise(&mut self, promise: SlotId, listener: SlotId) {
        let listener_channel = self.names.channel();
        self.call_library(
            Primitive::AwaitPromise,
            vec![
                ("promise", Operand::slot_address(promise)),
                ("listener", Operand::slot_address(listener)),
                ("channel", Operand::string(listener_channel.key())),
            ],
        );
    }

    pub(super) fn compile_await(
        &mut self,
        await_expr: &AwaitExpression,
    ) -> Result<Value, CompileError> {
        if !self.ctx.is_async {
            return Err(CompileError::syntax(
                "await is only valid in async functions",
                await_expr.span,
            ));
        }
        if self.current.depth > 0 {
            return Err(CompileError::unsupported(
                "await inside a nested block or expression",
                await_expr.span,
            ));
        }

        let awaited = self.compile_expression(&await_expr.argument)?;
        let awaited = self.materialize(awaited);

        let continuation = self.names.unit();
        let listener = Nbt::slot(
            Kind::Function,
            Nbt::String(String::new()),
            Some(&self.function_id(&continuation)),
        );
        let listener = self.function_slot(listener);
        self.await_promise(awaited, listener);
        self.current.emit_return(NORMAL);

        let mut next = UnitBuilder::new(
            continuation,
            UnitKind::Continuation,
            0,
            self.current.scopes.clone(),
        );
        next.meta.is_async = true;
        next.meta.that = self.current.meta.that.clone();
        next.meta.super_class = self.current.meta.super_class.clone();

        let finished = std::mem::replace(&mut self.current, next);
        self.add_unit(finished.finish());

        let result = self.fresh_slot(Constant::Undefined);
        self.current
            .set(Place::slot(result), Operand::Param("arg0".to_string()));
        Ok(Value::Slot(result))
    }
}
