//! if/else, loops, break and switch

use super::{global, output};
use datajs::Constant;

#[test]
fn test_if_else() {
    let source = r#"
        let x = 5;
        let size = "";
        if (x > 10) {
            size = "big";
        } else if (x > 3) {
            size = "medium";
        } else {
            size = "small";
        }
    "#;
    assert_eq!(global(source, "size"), Constant::from("medium"));
}

#[test]
fn test_while_loop() {
    let source = "let i = 0; let sum = 0; while (i < 5) { sum += i; i++; }";
    assert_eq!(global(source, "sum"), Constant::Number(10.0));
    assert_eq!(global(source, "i"), Constant::Number(5.0));
}

#[test]
fn test_for_loop() {
    let source = "let total = 0; for (let i = 1; i <= 4; i++) { total = total + i * i; }";
    assert_eq!(global(source, "total"), Constant::Number(30.0));
}

#[test]
fn test_do_while_runs_once() {
    let source = "let runs = 0; do { runs++; } while (runs > 10);";
    assert_eq!(global(source, "runs"), Constant::Number(1.0));
}

#[test]
fn test_break_leaves_loop() {
    let source = r#"
        let i = 0;
        while (true) {
            if (i === 3) {
                break;
            }
            i++;
        }
    "#;
    assert_eq!(global(source, "i"), Constant::Number(3.0));
}

#[test]
fn test_inner_break_keeps_outer_loop_running() {
    let source = r#"
        let c = 0;
        let rounds = 0;
        for (let i = 0; i < 3; i++) {
            for (let j = 0; j < 10; j++) {
                if (j === 1) {
                    break;
                }
                c++;
            }
            rounds++;
        }
    "#;
    assert_eq!(global(source, "c"), Constant::Number(3.0));
    assert_eq!(global(source, "rounds"), Constant::Number(3.0));
}

#[test]
fn test_for_of() {
    let source = r#"
        let sum = 0;
        for (const n of [1, 2, 3, 4]) {
            if (n > 3) {
                break;
            }
            sum += n;
        }
    "#;
    assert_eq!(global(source, "sum"), Constant::Number(6.0));
}

#[test]
fn test_switch() {
    let source = r#"
        function describe(n) {
            switch (n) {
                case 1:
                    return "one";
                case 2:
                    return "two";
                default:
                    return "many";
            }
        }
        console.log(describe(1));
        console.log(describe(2));
        console.log(describe(7));
    "#;
    assert_eq!(output(source), vec!["one", "two", "many"]);
}

#[test]
fn test_switch_break() {
    let source = r#"
        let key = "b";
        let picked = "";
        switch (key) {
            case "a":
                picked = "first";
                break;
            case "b":
                picked = "second";
                break;
        }
    "#;
    assert_eq!(global(source, "picked"), Constant::from("second"));
}

#[test]
fn test_return_from_inside_loop() {
    let source = r#"
        function firstOver(limit) {
            for (const n of [3, 8, 12, 20]) {
                if (n > limit) {
                    return n;
                }
            }
            return -1;
        }
        console.log(firstOver(10));
        console.log(firstOver(50));
    "#;
    assert_eq!(output(source), vec!["12", "-1"]);
}
