//! Classes: constructors, methods, inheritance, fields and static members

use super::{global, output};
use datajs::Constant;

#[test]
fn test_constructor_and_method() {
    let source = r#"
        class Point {
            constructor(x, y) {
                this.x = x;
                this.y = y;
            }
            sum() {
                return this.x + this.y;
            }
        }
        const p = new Point(3, 4);
        console.log(p.sum());
    "#;
    assert_eq!(output(source), vec!["7"]);
}

#[test]
fn test_inheritance_and_super_method() {
    let source = r#"
        class Animal {
            constructor(name) {
                this.name = name;
            }
            speak() {
                return this.name + " makes a sound";
            }
        }
        class Dog extends Animal {
            speak() {
                return super.speak() + " (woof)";
            }
        }
        const d = new Dog("Rex");
        console.log(d.speak());
    "#;
    assert_eq!(output(source), vec!["Rex makes a sound (woof)"]);
}

#[test]
fn test_explicit_super_call() {
    let source = r#"
        class Shape {
            constructor(sides) {
                this.sides = sides;
            }
        }
        class Square extends Shape {
            constructor(size) {
                super(4);
                this.size = size;
            }
            perimeter() {
                return this.sides * this.size;
            }
        }
        let perimeter = new Square(5).perimeter();
    "#;
    assert_eq!(global(source, "perimeter"), Constant::Number(20.0));
}

#[test]
fn test_fields_and_static_methods() {
    let source = r#"
        class Counter {
            count = 10;
            static create() {
                return new Counter();
            }
            increment() {
                this.count++;
                return this.count;
            }
        }
        const c = Counter.create();
        c.increment();
        console.log(c.increment());
    "#;
    assert_eq!(output(source), vec!["12"]);
}

#[test]
fn test_instances_do_not_share_properties() {
    let source = r#"
        class Box {
            constructor(value) {
                this.value = value;
            }
        }
        const a = new Box(1);
        const b = new Box(2);
        let first = a.value;
        let second = b.value;
    "#;
    assert_eq!(global(source, "first"), Constant::Number(1.0));
    assert_eq!(global(source, "second"), Constant::Number(2.0));
}

#[test]
fn test_inherited_method_from_grandparent() {
    let source = r#"
        class A {
            hello() {
                return "hello from A";
            }
        }
        class B extends A {}
        class C extends B {}
        console.log(new C().hello());
    "#;
    assert_eq!(output(source), vec!["hello from A"]);
}

#[test]
fn test_constructor_returning_object_replaces_instance() {
    let source = r#"
        class Custom {
            constructor() {
                this.tag = "instance";
                return { tag: "custom" };
            }
        }
        class Plain {
            constructor() {
                this.tag = "plain";
                return 5;
            }
        }
        let a = new Custom().tag;
        let b = new Plain().tag;
    "#;
    assert_eq!(global(source, "a"), Constant::from("custom"));
    assert_eq!(global(source, "b"), Constant::from("plain"));
}
