//! Object literals, members, methods and arrays

use super::{global, output};
use datajs::Constant;

#[test]
fn test_object_properties() {
    let source = r#"
        const point = { x: 1, y: 2 };
        point.x = 10;
        point["z"] = 3;
        let sum = point.x + point.y + point.z;
        let missing = point.w;
    "#;
    assert_eq!(global(source, "sum"), Constant::Number(15.0));
    assert_eq!(global(source, "missing"), Constant::Undefined);
}

#[test]
fn test_shorthand_and_nested_objects() {
    let source = r#"
        const name = "box";
        const item = { name, size: { w: 2, h: 3 } };
        let area = item.size.w * item.size.h;
        let label = item.name;
    "#;
    assert_eq!(global(source, "area"), Constant::Number(6.0));
    assert_eq!(global(source, "label"), Constant::from("box"));
}

#[test]
fn test_method_uses_this() {
    let source = r#"
        const point = {
            x: 1,
            y: 2,
            sum() {
                return this.x + this.y;
            },
        };
        point.x = 10;
        console.log(point.sum());
    "#;
    assert_eq!(output(source), vec!["12"]);
}

#[test]
fn test_computed_member_with_runtime_key() {
    let source = r#"
        const scores = { alice: 3, bob: 5 };
        let who = "bob";
        let score = scores[who];
    "#;
    assert_eq!(global(source, "score"), Constant::Number(5.0));
}

#[test]
fn test_arrays() {
    let source = r#"
        const items = [10, 20, 30];
        let length = items.length;
        let second = items[1];
        items[3] = 40;
        let grown = items.length;
        let joined = items + "";
    "#;
    assert_eq!(global(source, "length"), Constant::Number(3.0));
    assert_eq!(global(source, "second"), Constant::Number(20.0));
    assert_eq!(global(source, "grown"), Constant::Number(4.0));
    assert_eq!(global(source, "joined"), Constant::from("10,20,30,40"));
}

#[test]
fn test_string_members() {
    let source = "let word = 'hello'; let n = word.length; let first = word[0];";
    assert_eq!(global(source, "n"), Constant::Number(5.0));
    assert_eq!(global(source, "first"), Constant::from("h"));
}

#[test]
fn test_object_identity() {
    let source = "const a = {}; const b = a; const c = {}; let same = a === b; let other = a === c;";
    assert_eq!(global(source, "same"), Constant::Boolean(true));
    assert_eq!(global(source, "other"), Constant::Boolean(false));
}

#[test]
fn test_assignment_aliases_objects_not_primitives() {
    let source = r#"
        const a = { n: 1 };
        const b = a;
        b.n = 7;
        let r = a.n;
        let p = 1;
        let q = p;
        q = 5;
    "#;
    assert_eq!(global(source, "r"), Constant::Number(7.0));
    assert_eq!(global(source, "p"), Constant::Number(1.0));
    assert_eq!(global(source, "q"), Constant::Number(5.0));
}

#[test]
fn test_global_this_assignment() {
    let source = "globalThis.answer = 42; let read = answer;";
    assert_eq!(global(source, "read"), Constant::Number(42.0));
}
