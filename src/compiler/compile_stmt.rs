//! Statement compilation
//!
//! Compiles AST statements into the current unit. Branches, loop iterations and
//! switch cases become child units invoked through [`Compiler::invoke_wrapped`].

use tracing::warn;

use super::{BREAK, Compiler, Guard, NORMAL, Operand, Place, Primitive, Target, Truth, UnitKind};
use super::hoist::hoisted_order;
use super::{BindingKind, Value, is_false, is_true};
use crate::ast::{
    BreakStatement, DoWhileStatement, ForInOfLeft, ForInit, ForOfStatement, ForStatement,
    IfStatement, Pattern, ReturnStatement, Statement, SwitchCase, SwitchStatement,
    VariableDeclaration, VariableKind, WhileStatement,
};
use crate::error::CompileError;
use crate::value::{Constant, Nbt};

impl Compiler {
    /// Compile a statement
    pub(super) fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Expression(expr_stmt) => {
                self.compile_expression(&expr_stmt.expression)?;
                Ok(())
            }

            Statement::VariableDeclaration(decl) => self.compile_variable_declaration(decl),

            Statement::FunctionDeclaration(func) => self.compile_function_declaration(func),

            Statement::ClassDeclaration(class) => {
                self.compile_class(
                    Some(&class.id),
                    class.super_class.as_deref(),
                    &class.body,
                    true,
                    class.span,
                )?;
                Ok(())
            }

            Statement::Block(block) => {
                self.with_block_scope(|c| c.compile_statements(&block.body))
            }

            Statement::If(if_stmt) => self.compile_if(if_stmt),

            Statement::While(while_stmt) => self.compile_while(while_stmt),

            Statement::DoWhile(do_while) => self.compile_do_while(do_while),

            Statement::For(for_stmt) => self.compile_for(for_stmt),

            Statement::ForOf(for_of) => self.compile_for_of(for_of),

            Statement::Switch(switch_stmt) => self.compile_switch(switch_stmt),

            Statement::Return(return_stmt) => self.compile_return(return_stmt),

            Statement::Break(break_stmt) => self.compile_break(break_stmt),

            Statement::Unsupported(stmt) => {
                Err(CompileError::unsupported(stmt.construct, stmt.span))
            }

            Statement::Empty(_) => Ok(()),
        }
    }

    pub(super) fn compile_statements(&mut self, body: &[Statement]) -> Result<(), CompileError> {
        self.hoist_lexical_declarations(body);
        for stmt in hoisted_order(body) {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile the body of a child unit; its scope is already open, so a block
    /// body does not open another one
    fn compile_unit_body(&mut self, body: &Statement) -> Result<(), CompileError> {
        match body {
            Statement::Block(block) => self.compile_statements(&block.body),
            other => self.compile_statement(other),
        }
    }

    // ============ DECLARATIONS ============

    pub(super) fn compile_variable_declaration(
        &mut self,
        decl: &VariableDeclaration,
    ) -> Result<(), CompileError> {
        let kind = binding_kind(decl.kind);

        for declarator in &decl.declarations {
            let Pattern::Identifier(id) = &declarator.id else {
                return Err(CompileError::unsupported(
                    "destructuring declaration",
                    declarator.span,
                ));
            };

            if kind == BindingKind::Const && declarator.init.is_none() {
                return Err(CompileError::syntax(
                    "Missing initializer in const declaration",
                    declarator.span,
                ));
            }

            // Declared first so closures in the initializer can refer to the binding
            let slot = self.declare(&id.name, kind, id.span)?;

            match &declarator.init {
                Some(init) => {
                    let value = self.compile_expression(init)?;
                    self.assign(slot, &value);
                }
                // `var x;` keeps the hoisted value
                None if kind != BindingKind::Var => {
                    self.assign(slot, &Value::Constant(Constant::Undefined));
                }
                None => {}
            }
        }
        Ok(())
    }

    // ============ CONDITIONALS ============

    fn compile_if(&mut self, if_stmt: &IfStatement) -> Result<(), CompileError> {
        let test = self.compile_expression(&if_stmt.test)?;

        match self.truthiness(&test) {
            Truth::Known(true) => self.compile_branch(&if_stmt.consequent, Guard::always()),
            Truth::Known(false) => match &if_stmt.alternate {
                Some(alternate) => self.compile_branch(alternate, Guard::always()),
                None => Ok(()),
            },
            Truth::Runtime(flag) => {
                self.compile_branch(&if_stmt.consequent, is_true(flag))?;
                if let Some(alternate) = &if_stmt.alternate {
                    self.compile_branch(alternate, is_false(flag))?;
                }
                Ok(())
            }
        }
    }

    fn compile_branch(&mut self, body: &Statement, guard: Guard) -> Result<(), CompileError> {
        let unit = self.in_child(UnitKind::Block, true, |c| c.compile_unit_body(body))?;
        self.invoke_wrapped(guard, Target::Unit(unit), None, false);
        Ok(())
    }

    fn compile_switch(&mut self, switch: &SwitchStatement) -> Result<(), CompileError> {
        let discriminant = self.compile_expression(&switch.discriminant)?;
        let discriminant = self.materialize(discriminant);
        let matched = self.fresh_slot(Constant::Boolean(false));

        self.ctx.breakables += 1;
        let result = self.compile_switch_cases(discriminant, matched, &switch.cases);
        self.ctx.breakables -= 1;
        result
    }

    /// Cases run in isolation: the first matching case runs, then the switch ends.
    /// The default case runs when no case matched.
    fn compile_switch_cases(
        &mut self,
        discriminant: super::SlotId,
        matched: super::SlotId,
        cases: &[SwitchCase],
    ) -> Result<(), CompileError> {
        let mut default = None;

        for case in cases {
            let Some(test) = &case.test else {
                default = Some(case);
                continue;
            };

            if !case.consequent.is_empty() && !ends_abruptly(&case.consequent) {
                warn!(
                    line = case.span.line,
                    "switch case without break does not fall through"
                );
            }

            let test = self.compile_expression(test)?;
            let test = self.materialize(test);
            let equal = self.names.slot();
            self.call_library(
                Primitive::Equals,
                vec![
                    ("left", Operand::slot_address(discriminant)),
                    ("right", Operand::slot_address(test)),
                    ("result", Operand::slot_address(equal)),
                    ("operation", Operand::string("===")),
                ],
            );

            let hit = self.fresh_slot(Constant::Boolean(false));
            let first_match = is_true(equal).and(
                Place::slot_field(matched, "value"),
                Nbt::Bool(false),
            );
            self.current.set_guarded(
                first_match,
                Place::slot_field(hit, "value"),
                Operand::Literal(Nbt::Bool(true)),
            );
            self.current.set_guarded(
                is_true(hit),
                Place::slot_field(matched, "value"),
                Operand::Literal(Nbt::Bool(true)),
            );

            let unit = self.in_child(UnitKind::Case, true, |c| {
                c.compile_statements(&case.consequent)
            })?;
            self.invoke_wrapped(is_true(hit), Target::Unit(unit), None, true);
        }

        if let Some(case) = default {
            let unit = self.in_child(UnitKind::Case, true, |c| {
                c.compile_statements(&case.consequent)
            })?;
            self.invoke_wrapped(is_false(matched), Target::Unit(unit), None, true);
        }
        Ok(())
    }

    // ============ LOOPS ============

    fn compile_while(&mut self, while_stmt: &WhileStatement) -> Result<(), CompileError> {
        self.compile_loop(Some(&while_stmt.test), &while_stmt.body, None)
    }

    fn compile_for(&mut self, for_stmt: &ForStatement) -> Result<(), CompileError> {
        self.ctx.loops += 1;
        let result = self.with_block_scope(|c| {
            match &for_stmt.init {
                Some(ForInit::Variable(decl)) => c.compile_variable_declaration(decl)?,
                Some(ForInit::Expression(expr)) => {
                    c.compile_expression(expr)?;
                }
                None => {}
            }
            c.compile_loop(
                for_stmt.test.as_ref(),
                &for_stmt.body,
                for_stmt.update.as_ref(),
            )
        });
        self.ctx.loops -= 1;
        result
    }

    /// A self-invoking loop unit: test, body, update, then the next iteration.
    /// The call site consumes `break`.
    fn compile_loop(
        &mut self,
        test: Option<&crate::ast::Expression>,
        body: &Statement,
        update: Option<&crate::ast::Expression>,
    ) -> Result<(), CompileError> {
        let unit = self.in_child(UnitKind::Loop, true, |c| {
            c.ctx.breakables += 1;
            c.ctx.loops += 1;
            let result = c.compile_loop_iteration(test, body, update);
            c.ctx.loops -= 1;
            c.ctx.breakables -= 1;
            result
        })?;
        self.invoke_wrapped(Guard::always(), Target::Unit(unit), None, true);
        Ok(())
    }

    fn compile_loop_iteration(
        &mut self,
        test: Option<&crate::ast::Expression>,
        body: &Statement,
        update: Option<&crate::ast::Expression>,
    ) -> Result<(), CompileError> {
        let this_unit = self.current.name.clone();

        if let Some(test) = test {
            let test = self.compile_expression(test)?;
            match self.truthiness(&test) {
                Truth::Known(false) => {
                    self.current.emit_return(NORMAL);
                    return Ok(());
                }
                Truth::Known(true) => {}
                Truth::Runtime(flag) => self.current.return_if(is_false(flag), NORMAL),
            }
        }

        self.compile_unit_body(body)?;
        if let Some(update) = update {
            self.compile_expression(update)?;
        }
        self.invoke_wrapped(Guard::always(), Target::Unit(this_unit), None, false);
        Ok(())
    }

    fn compile_do_while(&mut self, do_while: &DoWhileStatement) -> Result<(), CompileError> {
        let unit = self.in_child(UnitKind::Loop, true, |c| {
            c.ctx.breakables += 1;
            c.ctx.loops += 1;
            let result = c.compile_do_while_iteration(do_while);
            c.ctx.loops -= 1;
            c.ctx.breakables -= 1;
            result
        })?;
        self.invoke_wrapped(Guard::always(), Target::Unit(unit), None, true);
        Ok(())
    }

    fn compile_do_while_iteration(
        &mut self,
        do_while: &DoWhileStatement,
    ) -> Result<(), CompileError> {
        let this_unit = self.current.name.clone();
        self.compile_unit_body(&do_while.body)?;

        let test = self.compile_expression(&do_while.test)?;
        let guard = match self.truthiness(&test) {
            Truth::Known(false) => return Ok(()),
            Truth::Known(true) => Guard::always(),
            Truth::Runtime(flag) => is_true(flag),
        };
        self.invoke_wrapped(guard, Target::Unit(this_unit), None, false);
        Ok(())
    }

    /// The body becomes a unit the `looparray` primitive invokes once per element
    fn compile_for_of(&mut self, for_of: &ForOfStatement) -> Result<(), CompileError> {
        let (declaration, id) = match &for_of.left {
            ForInOfLeft::Variable(kind, Pattern::Identifier(id)) => (Some(*kind), id),
            ForInOfLeft::Pattern(Pattern::Identifier(id)) => (None, id),
            _ => {
                return Err(CompileError::unsupported(
                    "destructuring in for...of",
                    for_of.span,
                ));
            }
        };

        let iterable = self.compile_expression(&for_of.right)?;
        let iterable = self.materialize(iterable);

        let unit = self.in_child(UnitKind::Loop, true, |c| {
            c.ctx.breakables += 1;
            c.ctx.loops += 1;
            let result = c.compile_for_of_body(declaration, id, &for_of.body);
            c.ctx.loops -= 1;
            c.ctx.breakables -= 1;
            result
        })?;

        let body_channel = self.names.channel();
        let function = self.function_id(&unit);
        let channel = self.fill_channel(vec![
            ("array", Operand::slot_address(iterable)),
            ("function", Operand::string(function)),
            ("channel", Operand::string(body_channel.key())),
        ]);
        self.invoke_wrapped(
            Guard::always(),
            Target::Library(Primitive::LoopArray),
            Some(channel),
            true,
        );
        Ok(())
    }

    fn compile_for_of_body(
        &mut self,
        declaration: Option<VariableKind>,
        id: &crate::ast::Identifier,
        body: &Statement,
    ) -> Result<(), CompileError> {
        let slot = match declaration {
            Some(kind) => self.declare(&id.name, binding_kind(kind), id.span)?,
            None => self.assignable_binding(id)?,
        };
        self.current
            .set(Place::slot(slot), Operand::Param("arg0".to_string()));
        self.compile_unit_body(body)
    }

    // ============ JUMPS ============

    fn compile_return(&mut self, return_stmt: &ReturnStatement) -> Result<(), CompileError> {
        if self.ctx.kind == UnitKind::Script {
            return Err(CompileError::syntax(
                "Illegal return statement",
                return_stmt.span,
            ));
        }

        let value = match &return_stmt.argument {
            Some(argument) => self.compile_expression(argument)?,
            None => Value::Constant(Constant::Undefined),
        };
        self.emit_return(value);
        Ok(())
    }

    fn compile_break(&mut self, break_stmt: &BreakStatement) -> Result<(), CompileError> {
        if break_stmt.label.is_some() {
            return Err(CompileError::unsupported("labeled break", break_stmt.span));
        }
        if self.ctx.breakables == 0 {
            return Err(CompileError::syntax(
                "Illegal break statement",
                break_stmt.span,
            ));
        }
        self.current.emit_return(BREAK);
        Ok(())
    }
}

pub(super) fn binding_kind(kind: VariableKind) -> BindingKind {
    match kind {
        VariableKind::Let => BindingKind::Let,
        VariableKind::Const => BindingKind::Const,
        VariableKind::Var => BindingKind::Var,
    }
}

/// Whether a case body always leaves through `break` or `return`
fn ends_abruptly(body: &[Statement]) -> bool {
    matches!(
        body.last(),
        Some(Statement::Break(_) | Statement::Return(_))
    ) || matches!(body.last(), Some(Statement::Block(block)) if ends_abruptly(&block.body))
}
