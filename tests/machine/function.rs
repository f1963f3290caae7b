//! Function declarations, closures, default parameters and host calls

use super::{global, output, run};
use datajs::{Constant, Machine, Options, compile};

#[test]
fn test_function_declaration() {
    let source = r#"
        function add(a, b) {
            return a + b;
        }
        console.log(add(2, 3));
    "#;
    assert_eq!(output(source), vec!["5"]);
}

#[test]
fn test_function_called_before_declaration() {
    let source = "let r = double(21); function double(x) { return x * 2; }";
    assert_eq!(global(source, "r"), Constant::Number(42.0));
}

#[test]
fn test_missing_return_is_undefined() {
    let source = "function nothing() {} let r = nothing();";
    assert_eq!(global(source, "r"), Constant::Undefined);
}

#[test]
fn test_default_parameters() {
    let source = r#"
        function greet(name = "stranger") {
            return "hi " + name;
        }
        console.log(greet());
        console.log(greet("Ann"));
    "#;
    assert_eq!(output(source), vec!["hi stranger", "hi Ann"]);
}

#[test]
fn test_arrow_functions() {
    let source = r#"
        const square = (x) => x * x;
        const shout = (text) => {
            return text + "!";
        };
        console.log(square(7));
        console.log(shout("hey"));
    "#;
    assert_eq!(output(source), vec!["49", "hey!"]);
}

#[test]
fn test_closure_keeps_captured_binding() {
    let source = r#"
        function makeCounter() {
            let count = 0;
            return () => {
                count++;
                return count;
            };
        }
        const next = makeCounter();
        next();
        next();
        console.log(next());
    "#;
    assert_eq!(output(source), vec!["3"]);
}

#[test]
fn test_closure_sees_later_assignment() {
    let source = r#"
        let label = "before";
        const show = () => label;
        label = "after";
        let seen = show();
    "#;
    assert_eq!(global(source, "seen"), Constant::from("after"));
}

#[test]
fn test_function_as_argument() {
    let source = r#"
        function apply(f, value) {
            return f(value);
        }
        console.log(apply((v) => v + 1, 41));
    "#;
    assert_eq!(output(source), vec!["42"]);
}

#[test]
fn test_early_return_from_branch() {
    let source = r#"
        function sign(n) {
            if (n < 0) {
                return "negative";
            }
            if (n === 0) {
                return "zero";
            }
            return "positive";
        }
        console.log(sign(-3));
        console.log(sign(0));
        console.log(sign(9));
    "#;
    assert_eq!(output(source), vec!["negative", "zero", "positive"]);
}

#[test]
fn test_host_call() {
    let compilation = compile(
        "function add(a, b) { return a + b; }",
        &Options::default().without_prelude(),
    );
    assert!(compilation.is_ok(), "{}", compilation.diagnostics);
    let mut machine = Machine::new(compilation.program);
    let result = machine
        .call("add", &[Constant::Number(2.0), Constant::from("x")])
        .map(|slot| machine.display(&slot));
    assert_eq!(result.ok().as_deref(), Some("2x"));
}

#[test]
fn test_host_call_unknown_function() {
    let mut machine = run("");
    assert!(machine.call("nope", &[]).is_err());
}
