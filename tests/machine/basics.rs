//! Operators on runtime values, variables and typeof

use super::{global, output};
use datajs::Constant;

#[test]
fn test_arithmetic() {
    let source = "let a = 6; let b = a * 7; let c = a - 1; let d = a / 4; let e = a % 4; let f = 2 ** a;";
    assert_eq!(global(source, "b"), Constant::Number(42.0));
    assert_eq!(global(source, "c"), Constant::Number(5.0));
    assert_eq!(global(source, "d"), Constant::Number(1.5));
    assert_eq!(global(source, "e"), Constant::Number(2.0));
    assert_eq!(global(source, "f"), Constant::Number(64.0));
}

#[test]
fn test_addition_concatenates_strings() {
    let source = "let n = 1; let s = 'n=' + n; let t = n + 1;";
    assert_eq!(global(source, "s"), Constant::from("n=1"));
    assert_eq!(global(source, "t"), Constant::Number(2.0));
}

#[test]
fn test_comparison() {
    let source = "let a = 3; let lt = a < 5; let ge = a >= 5; let eq = a === 3; let ne = a !== 3; let loose = a == '3';";
    assert_eq!(global(source, "lt"), Constant::Boolean(true));
    assert_eq!(global(source, "ge"), Constant::Boolean(false));
    assert_eq!(global(source, "eq"), Constant::Boolean(true));
    assert_eq!(global(source, "ne"), Constant::Boolean(false));
    assert_eq!(global(source, "loose"), Constant::Boolean(true));
}

#[test]
fn test_unary_operators() {
    let source = "let s = '4'; let n = +s; let m = -n; let not = !s; let empty = ''; let t = !empty;";
    assert_eq!(global(source, "n"), Constant::Number(4.0));
    assert_eq!(global(source, "m"), Constant::Number(-4.0));
    assert_eq!(global(source, "not"), Constant::Boolean(false));
    assert_eq!(global(source, "t"), Constant::Boolean(true));
}

#[test]
fn test_update_expressions() {
    let source = "let i = 1; let post = i++; let pre = ++i; i -= 1;";
    assert_eq!(global(source, "post"), Constant::Number(1.0));
    assert_eq!(global(source, "pre"), Constant::Number(3.0));
    assert_eq!(global(source, "i"), Constant::Number(2.0));
}

#[test]
fn test_logical_operators() {
    let source = "let zero = 0; let a = zero || 'fallback'; let b = zero && 'never'; let u = undefined; let n = zero; let c = n ?? 5; let d = u ?? 5;";
    assert_eq!(global(source, "a"), Constant::from("fallback"));
    assert_eq!(global(source, "b"), Constant::Number(0.0));
    assert_eq!(global(source, "c"), Constant::Number(0.0));
    assert_eq!(global(source, "d"), Constant::Number(5.0));
}

#[test]
fn test_conditional_expression() {
    let source = "let x = 4; let parity = x % 2 === 0 ? 'even' : 'odd';";
    assert_eq!(global(source, "parity"), Constant::from("even"));
}

#[test]
fn test_typeof_runtime_values() {
    let source = "let n = 1; let o = {}; let f = () => 1; let a = typeof n; let b = typeof o; let c = typeof f; let d = typeof 'x';";
    assert_eq!(global(source, "a"), Constant::from("number"));
    assert_eq!(global(source, "b"), Constant::from("object"));
    assert_eq!(global(source, "c"), Constant::from("function"));
    assert_eq!(global(source, "d"), Constant::from("string"));
}

#[test]
fn test_template_literal() {
    let source = "let name = 'world'; let count = 2; console.log(`hello ${name} x${count}`);";
    assert_eq!(output(source), vec!["hello world x2"]);
}

#[test]
fn test_console_log_numbers() {
    assert_eq!(output("let a = 20; console.log(a + 22);"), vec!["42"]);
}

#[test]
fn test_left_operand_read_before_right_side_effects() {
    let source = r#"
        let x = 1;
        function setX() { x = 10; return 1; }
        let y = x + setX();
        let z = 1;
        function setZ() { z = 10; return 1; }
        z += setZ();
    "#;
    assert_eq!(global(source, "y"), Constant::Number(2.0));
    assert_eq!(global(source, "z"), Constant::Number(2.0));
}

#[test]
fn test_arguments_read_in_order() {
    let source = r#"
        let k = 1;
        function bump() { k = 10; return 1; }
        function sum(a, b) { return a + b; }
        let m = sum(k, bump());
    "#;
    assert_eq!(global(source, "m"), Constant::Number(2.0));
}
