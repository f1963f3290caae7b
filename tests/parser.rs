//! Tests for the parser
//!
//! These tests verify that source text becomes the expected syntax tree, including the
//! constructs the compiler later rejects.

use datajs::CompileError;
use datajs::ast::*;
use datajs::parser::parse;

#[allow(clippy::expect_used)]
fn parse_ok(source: &str) -> Program {
    parse(source).expect("source should parse")
}

/// The single expression of a one-statement program
fn expr(source: &str) -> Expression {
    let program = parse_ok(source);
    match program.body.into_iter().next() {
        Some(Statement::Expression(stmt)) => stmt.expression,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_variable_kinds() {
    let program = parse_ok("let a = 1; const b = 2; var c;");
    let kinds: Vec<_> = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::VariableDeclaration(decl) => Some(decl.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![VariableKind::Let, VariableKind::Const, VariableKind::Var]
    );
}

#[test]
fn test_multiple_declarators() {
    let program = parse_ok("let a = 1, b, c = a;");
    let Some(Statement::VariableDeclaration(decl)) = program.body.first() else {
        panic!("Expected VariableDeclaration");
    };
    assert_eq!(decl.declarations.len(), 3);
    assert!(decl.declarations.get(1).is_some_and(|d| d.init.is_none()));
}

#[test]
fn test_binary_precedence() {
    let Expression::Binary(add) = expr("1 + 2 * 3;") else {
        panic!("Expected Binary");
    };
    assert_eq!(add.operator, BinaryOp::Add);
    assert!(matches!(*add.right, Expression::Binary(ref mul) if mul.operator == BinaryOp::Mul));
}

#[test]
fn test_exponent_is_right_associative() {
    let Expression::Binary(outer) = expr("2 ** 3 ** 2;") else {
        panic!("Expected Binary");
    };
    assert_eq!(outer.operator, BinaryOp::Exp);
    assert!(matches!(*outer.left, Expression::Literal(_)));
    assert!(matches!(*outer.right, Expression::Binary(_)));
}

#[test]
fn test_logical_operators() {
    let Expression::Logical(or) = expr("a && b || c;") else {
        panic!("Expected Logical");
    };
    assert_eq!(or.operator, LogicalOp::Or);
    assert!(matches!(*or.left, Expression::Logical(ref and) if and.operator == LogicalOp::And));

    let Expression::Logical(nullish) = expr("a ?? b;") else {
        panic!("Expected Logical");
    };
    assert_eq!(nullish.operator, LogicalOp::NullishCoalescing);
}

#[test]
fn test_conditional_expression() {
    assert!(matches!(expr("a ? b : c;"), Expression::Conditional(_)));
}

#[test]
fn test_compound_assignment() {
    let Expression::Assignment(assign) = expr("total += 5;") else {
        panic!("Expected Assignment");
    };
    assert_eq!(assign.operator, AssignmentOp::AddAssign);
    assert!(matches!(assign.left, AssignmentTarget::Identifier(ref id) if id.name == "total"));
}

#[test]
fn test_member_assignment() {
    let Expression::Assignment(assign) = expr("obj.inner[key] = 1;") else {
        panic!("Expected Assignment");
    };
    let AssignmentTarget::Member(member) = assign.left else {
        panic!("Expected member target");
    };
    assert!(matches!(member.property, MemberProperty::Expression(_)));
    assert!(matches!(*member.object, Expression::Member(_)));
}

#[test]
fn test_update_expressions() {
    let Expression::Update(post) = expr("i++;") else {
        panic!("Expected Update");
    };
    assert!(!post.prefix);
    assert_eq!(post.operator, UpdateOp::Increment);

    let Expression::Update(pre) = expr("--i;") else {
        panic!("Expected Update");
    };
    assert!(pre.prefix);
    assert_eq!(pre.operator, UpdateOp::Decrement);
}

#[test]
fn test_call_with_arguments() {
    let Expression::Call(call) = expr("console.log(1, 'two', x);") else {
        panic!("Expected Call");
    };
    assert_eq!(call.arguments.len(), 3);
    assert!(matches!(*call.callee, Expression::Member(_)));
}

#[test]
fn test_new_expression() {
    let Expression::New(new) = expr("new Point(1, 2);") else {
        panic!("Expected New");
    };
    assert!(matches!(*new.callee, Expression::Identifier(ref id) if id.name == "Point"));
    assert_eq!(new.arguments.len(), 2);
}

#[test]
fn test_object_literal_forms() {
    let Expression::Object(object) = expr("({ a: 1, 'b c': 2, [k]: 3, d, m() { return 1; } });")
    else {
        panic!("Expected Object");
    };
    assert_eq!(object.properties.len(), 5);
    let keys: Vec<_> = object
        .properties
        .iter()
        .filter_map(|prop| match prop {
            ObjectProperty::Property(p) => Some(&p.key),
            ObjectProperty::Spread(_) => None,
        })
        .collect();
    assert!(matches!(keys.first(), Some(ObjectPropertyKey::Identifier(_))));
    assert!(matches!(keys.get(1), Some(ObjectPropertyKey::String(s, _)) if s == "b c"));
    assert!(matches!(keys.get(2), Some(ObjectPropertyKey::Computed(_))));
    assert!(matches!(
        object.properties.get(3),
        Some(ObjectProperty::Property(Property { shorthand: true, .. }))
    ));
    assert!(matches!(
        object.properties.get(4),
        Some(ObjectProperty::Property(Property { method: true, .. }))
    ));
}

#[test]
fn test_array_literal() {
    let Expression::Array(array) = expr("[1, 'a', [2]];") else {
        panic!("Expected Array");
    };
    assert_eq!(array.elements.len(), 3);
}

#[test]
fn test_arrow_functions() {
    let program = parse_ok("const f = x => x * 2; const g = async (a, b) => { return a; };");
    let inits: Vec<_> = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::VariableDeclaration(decl) => decl.declarations.first()?.init.as_ref(),
            _ => None,
        })
        .collect();
    assert!(matches!(
        inits.first(),
        Some(Expression::ArrowFunction(ArrowFunctionExpression {
            body: ArrowFunctionBody::Expression(_),
            async_: false,
            ..
        }))
    ));
    assert!(matches!(
        inits.get(1),
        Some(Expression::ArrowFunction(ArrowFunctionExpression {
            body: ArrowFunctionBody::Block(_),
            async_: true,
            ..
        }))
    ));
}

#[test]
fn test_async_function_declaration() {
    let program = parse_ok("async function load(id) { const v = await fetch(id); return v; }");
    let Some(Statement::FunctionDeclaration(func)) = program.body.first() else {
        panic!("Expected FunctionDeclaration");
    };
    assert!(func.async_);
    assert_eq!(func.id.name, "load");
    assert_eq!(func.params.len(), 1);
    assert_eq!(func.body.body.len(), 2);
}

#[test]
fn test_if_else_chain() {
    let program = parse_ok("if (a) { x(); } else if (b) { y(); } else z();");
    let Some(Statement::If(stmt)) = program.body.first() else {
        panic!("Expected If");
    };
    assert!(matches!(stmt.alternate.as_deref(), Some(Statement::If(_))));
}

#[test]
fn test_loops() {
    let program = parse_ok(
        "for (let i = 0; i < 3; i++) {} for (const x of xs) {} while (go) {} do { } while (go);",
    );
    assert!(matches!(program.body.first(), Some(Statement::For(_))));
    assert!(matches!(program.body.get(1), Some(Statement::ForOf(_))));
    assert!(matches!(program.body.get(2), Some(Statement::While(_))));
    assert!(matches!(program.body.get(3), Some(Statement::DoWhile(_))));
}

#[test]
fn test_empty_for_clauses() {
    let program = parse_ok("for (;;) { break; }");
    let Some(Statement::For(stmt)) = program.body.first() else {
        panic!("Expected For");
    };
    assert!(stmt.init.is_none());
    assert!(stmt.test.is_none());
    assert!(stmt.update.is_none());
}

#[test]
fn test_switch_cases() {
    let program = parse_ok("switch (v) { case 1: a(); break; case 2: b(); break; default: c(); }");
    let Some(Statement::Switch(stmt)) = program.body.first() else {
        panic!("Expected Switch");
    };
    assert_eq!(stmt.cases.len(), 3);
    assert!(stmt.cases.get(2).is_some_and(|c| c.test.is_none()));
}

#[test]
fn test_class_with_extends_and_members() {
    let program = parse_ok(
        "class Dog extends Animal { constructor(name) { super(name); } speak() { return 1; } static create() {} }",
    );
    let Some(Statement::ClassDeclaration(class)) = program.body.first() else {
        panic!("Expected ClassDeclaration");
    };
    assert_eq!(class.id.name, "Dog");
    assert!(class.super_class.is_some());
    assert!(matches!(class.body.members.first(), Some(ClassMember::Constructor(_))));
    assert!(matches!(
        class.body.members.get(2),
        Some(ClassMember::Method(ClassMethod { static_: true, .. }))
    ));
}

#[test]
fn test_class_expression() {
    let program = parse_ok("const A = class { m() {} };");
    let Some(Statement::VariableDeclaration(decl)) = program.body.first() else {
        panic!("Expected VariableDeclaration");
    };
    assert!(matches!(
        decl.declarations.first().and_then(|d| d.init.as_ref()),
        Some(Expression::Class(_))
    ));
}

#[test]
fn test_template_literal() {
    let Expression::Template(template) = expr("`value: ${x}`;") else {
        panic!("Expected Template");
    };
    assert_eq!(template.quasis, vec!["value: ", ""]);
    assert_eq!(template.expressions.len(), 1);
}

#[test]
fn test_rejected_constructs_still_parse() {
    // the compiler reports these, the parser accepts them
    let program = parse_ok("try { a(); } catch (e) { b(); } throw x; const { p } = o; f(...args);");
    let constructs: Vec<_> = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::Unsupported(unsupported) => Some(unsupported.construct),
            _ => None,
        })
        .collect();
    assert_eq!(constructs, vec!["try statement", "throw statement"]);
}

#[test]
fn test_type_annotations_are_skipped() {
    let program = parse_ok(
        "function add(a: number, b: number): number { return a + b; }\nlet s: string = 'x';",
    );
    let Some(Statement::FunctionDeclaration(func)) = program.body.first() else {
        panic!("Expected FunctionDeclaration");
    };
    assert_eq!(func.params.len(), 2);
}

#[test]
fn test_automatic_semicolon_insertion() {
    let program = parse_ok("let a = 1\nlet b = 2\na = b");
    assert_eq!(program.body.len(), 3);
}

#[test]
fn test_syntax_errors() {
    for source in ["let = 1;", "if (a {", "function () {}", "1 +;", "({a: });"] {
        assert!(
            matches!(parse(source), Err(CompileError::Syntax { .. })),
            "expected syntax error for {:?}",
            source
        );
    }
}

#[test]
fn test_error_location() {
    let Err(err) = parse("let a = 1;\nlet b = ;") else {
        panic!("Expected error");
    };
    assert_eq!(err.location().line, 2);
}
