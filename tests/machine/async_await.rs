//! Promises, async functions, await and timers

use super::{output, output_after_ticks, run};

#[test]
fn test_then_on_resolved_promise_runs_at_once() {
    let source = r#"
        const p = new Promise((resolve) => {
            resolve(5);
        });
        p.then((v) => {
            console.log(v);
        });
    "#;
    assert_eq!(output(source), vec!["5"]);
}

#[test]
fn test_then_waits_for_resolution() {
    let source = r#"
        let settle = null;
        const p = new Promise((resolve) => {
            settle = resolve;
        });
        p.then((v) => console.log("got " + v));
        console.log("registered");
        settle("it");
    "#;
    assert_eq!(output(source), vec!["registered", "got it"]);
}

#[test]
fn test_pending_promises_keep_their_own_resolver() {
    let source = r#"
        let r1 = null;
        let r2 = null;
        const p1 = new Promise((resolve) => {
            r1 = resolve;
        });
        const p2 = new Promise((resolve) => {
            r2 = resolve;
        });
        p1.then((v) => console.log("p1 " + v));
        p2.then((v) => console.log("p2 " + v));
        r1(5);
        r2(6);
    "#;
    assert_eq!(output(source), vec!["p1 5", "p2 6"]);
}

#[test]
fn test_async_function_result() {
    let source = r#"
        async function compute() {
            return 42;
        }
        compute().then((v) => console.log(v));
    "#;
    assert_eq!(output(source), vec!["42"]);
}

#[test]
fn test_await_async_function() {
    let source = r#"
        async function inner() {
            return 7;
        }
        async function outer() {
            const v = await inner();
            console.log(v);
        }
        outer();
    "#;
    assert_eq!(output(source), vec!["7"]);
}

#[test]
fn test_await_plain_value() {
    let source = r#"
        async function main() {
            const v = await 3;
            console.log(v + 1);
        }
        main();
    "#;
    assert_eq!(output(source), vec!["4"]);
}

#[test]
fn test_await_timer() {
    let source = r#"
        function sleep(ms) {
            return new Promise((resolve) => {
                setTimeout(resolve, ms);
            });
        }
        async function main() {
            console.log("before");
            await sleep(100);
            console.log("after");
        }
        main();
    "#;
    assert_eq!(output(source), vec!["before"]);
    assert_eq!(output_after_ticks(source, 1), vec!["before"]);
    assert_eq!(output_after_ticks(source, 2), vec!["before", "after"]);
}

#[test]
fn test_set_timeout_schedules() {
    let source = "setTimeout(() => console.log('later'), 150); console.log('now');";
    let mut machine = run(source);
    assert_eq!(machine.pending_tasks(), 1);
    assert!(machine.run_until_idle(10).is_ok());
    assert_eq!(machine.output(), ["now", "later"]);
    assert_eq!(machine.tick(), 3);
    assert_eq!(machine.pending_tasks(), 0);
}

#[test]
fn test_zero_timeout_waits_one_tick() {
    let source = "setTimeout(() => console.log('next tick'), 0);";
    assert!(output(source).is_empty());
    assert_eq!(output_after_ticks(source, 1), vec!["next tick"]);
}

#[test]
fn test_set_interval_repeats() {
    let source = "let n = 0; setInterval(() => { n++; console.log(n); }, 50);";
    assert_eq!(output_after_ticks(source, 3), vec!["1", "2", "3"]);
}
