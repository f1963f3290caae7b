//! Declaration hoisting
//!
//! Bindings are resolved at compile time, so a function body can only refer to
//! names that already exist when it is compiled. Before compiling a statement
//! list, the names it declares are bound up front: `var` names for the whole
//! function (descending into nested blocks, not nested functions), and
//! `let`/`const`/class/function names for the list's own scope.

use super::{BindingKind, Compiler, Value};
use super::compile_stmt::binding_kind;
use crate::ast::{ForInOfLeft, ForInit, Pattern, Statement, VariableDeclaration, VariableKind};
use crate::lexer::Span;
use crate::value::Constant;

impl Compiler {
    /// Hoist `var` and lexical declarations at the start of a function body or script
    pub(super) fn hoist_function_scope(&mut self, statements: &[Statement]) {
        let mut var_names = Vec::new();
        collect_hoisted_vars(statements, &mut var_names);

        if let Some(scope) = self.current.innermost_scope() {
            for (name, span) in var_names {
                if self.scopes.resolve(&[scope], &name).is_some() {
                    continue;
                }
                if let Ok(slot) = self.declare_in(scope, &name, BindingKind::Var, span) {
                    self.assign(slot, &Value::Constant(Constant::Undefined));
                }
            }
        }

        self.hoist_lexical_declarations(statements);
    }

    /// Bind the lexical names a statement list declares in the innermost scope.
    /// The declaration itself later claims the binding instead of adding a new one.
    pub(super) fn hoist_lexical_declarations(&mut self, statements: &[Statement]) {
        let Some(scope) = self.current.innermost_scope() else {
            return;
        };

        for stmt in statements {
            let (name, kind, span) = match stmt {
                Statement::FunctionDeclaration(func) => {
                    (&func.id.name, BindingKind::Function, func.id.span)
                }
                Statement::ClassDeclaration(class) => {
                    (&class.id.name, BindingKind::Class, class.id.span)
                }
                Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                    for declarator in &decl.declarations {
                        if let Pattern::Identifier(id) = &declarator.id {
                            self.hoist_one(scope, &id.name, binding_kind(decl.kind), id.span);
                        }
                    }
                    continue;
                }
                _ => continue,
            };
            self.hoist_one(scope, name, kind, span);
        }
    }

    fn hoist_one(&mut self, scope: super::ScopeId, name: &str, kind: BindingKind, span: Span) {
        // A clash is reported when the declaration itself is compiled
        if self.scopes.resolve(&[scope], name).is_some() {
            return;
        }
        if self.declare_in(scope, name, kind, span).is_ok() {
            self.hoisted.insert((scope, name.to_string()));
        }
    }
}

/// Function declarations first, then everything else in source order
pub(super) fn hoisted_order(statements: &[Statement]) -> impl Iterator<Item = &Statement> {
    let is_function = |stmt: &&Statement| matches!(stmt, Statement::FunctionDeclaration(_));
    statements
        .iter()
        .filter(is_function)
        .chain(statements.iter().filter(move |stmt| !is_function(stmt)))
}

/// Collect `var` names, descending into blocks but not into function bodies
fn collect_hoisted_vars(statements: &[Statement], names: &mut Vec<(String, Span)>) {
    for stmt in statements {
        collect_hoisted_vars_stmt(stmt, names);
    }
}

fn collect_hoisted_vars_stmt(stmt: &Statement, names: &mut Vec<(String, Span)>) {
    match stmt {
        Statement::VariableDeclaration(decl) => {
            if decl.kind == VariableKind::Var {
                collect_hoisted_vars_decl(decl, names);
            }
        }

        Statement::Block(block) => collect_hoisted_vars(&block.body, names),

        Statement::If(if_stmt) => {
            collect_hoisted_vars_stmt(&if_stmt.consequent, names);
            if let Some(alt) = &if_stmt.alternate {
                collect_hoisted_vars_stmt(alt, names);
            }
        }

        Statement::While(while_stmt) => collect_hoisted_vars_stmt(&while_stmt.body, names),

        Statement::DoWhile(do_while) => collect_hoisted_vars_stmt(&do_while.body, names),

        Statement::For(for_stmt) => {
            if let Some(ForInit::Variable(decl)) = &for_stmt.init
                && decl.kind == VariableKind::Var
            {
                collect_hoisted_vars_decl(decl, names);
            }
            collect_hoisted_vars_stmt(&for_stmt.body, names);
        }

        Statement::ForOf(for_of) => {
            if let ForInOfLeft::Variable(VariableKind::Var, Pattern::Identifier(id)) = &for_of.left {
                names.push((id.name.clone(), id.span));
            }
            collect_hoisted_vars_stmt(&for_of.body, names);
        }

        Statement::Switch(switch_stmt) => {
            for case in &switch_stmt.cases {
                collect_hoisted_vars(&case.consequent, names);
            }
        }

        Statement::FunctionDeclaration(_)
        | Statement::ClassDeclaration(_)
        | Statement::Expression(_)
        | Statement::Return(_)
        | Statement::Break(_)
        | Statement::Unsupported(_)
        | Statement::Empty(_) => {}
    }
}

fn collect_hoisted_vars_decl(decl: &VariableDeclaration, names: &mut Vec<(String, Span)>) {
    for declarator in &decl.declarations {
        if let Pattern::Identifier(id) = &declarator.id {
            names.push((id.name.clone(), id.span));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[allow(clippy::expect_used)]
    fn parsed(source: &str) -> crate::ast::Program {
        parse(source).expect("parse failed")
    }

    fn var_names(source: &str) -> Vec<String> {
        let program = parsed(source);
        let mut names = Vec::new();
        collect_hoisted_vars(&program.body, &mut names);
        names.into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_vars_hoist_out_of_blocks() {
        let names = var_names(
            "var a = 1; if (a) { var b = 2; } for (var i = 0; i < 1; i++) { var c; } let d = 4;",
        );
        assert_eq!(names, vec!["a", "b", "i", "c"]);
    }

    #[test]
    fn test_vars_in_functions_stay_local() {
        let names = var_names("function f() { var inner = 1; } var outer = 2;");
        assert_eq!(names, vec!["outer"]);
    }

    #[test]
    fn test_function_declarations_come_first() {
        let program = parsed("let a = 1; function f() {} a = 2; function g() {}");
        let order: Vec<bool> = hoisted_order(&program.body)
            .map(|s| matches!(s, Statement::FunctionDeclaration(_)))
            .collect();
        assert_eq!(order, vec![true, true, false, false]);
    }
}
