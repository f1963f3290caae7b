//! Built-in globals: console, String, Object and raw commands

use super::{global, output, run};
use datajs::Constant;

#[test]
fn test_console_levels() {
    let source = r#"
        console.log("a");
        console.warn("b");
        console.error("c");
        console.info("d");
        console.debug("e");
    "#;
    assert_eq!(output(source), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_console_commands() {
    let machine = run("console.warn('careful');");
    assert_eq!(
        machine.commands(),
        [r#"tellraw @a {"text":"careful","color":"yellow"}"#]
    );
}

#[test]
fn test_console_log_converts_values() {
    let source = "let flag = true; console.log(flag); console.log({});";
    assert_eq!(output(source), vec!["true", "[object Object]"]);
}

#[test]
fn test_run_command() {
    let machine = run("__run('say hello');");
    assert_eq!(machine.output(), ["hello"]);
    assert_eq!(machine.commands(), ["say hello"]);
}

#[test]
fn test_run_runtime_command() {
    let machine = run("let target = '@p'; __run('kill ' + target);");
    assert_eq!(machine.commands(), ["kill @p"]);
    assert!(machine.output().is_empty());
}

#[test]
fn test_string_class() {
    let source = r#"
        const s = new String("ab");
        let repeated = s.repeat(3);
        let converted = String(5) + 1;
    "#;
    assert_eq!(global(source, "repeated"), Constant::from("ababab"));
    assert_eq!(global(source, "converted"), Constant::from("51"));
}

#[test]
fn test_object_to_string() {
    let source = "const o = {}; let text = o.toString();";
    assert_eq!(global(source, "text"), Constant::from("[object Object]"));
}
