//! Integration tests for the simulator, organized by feature
//!
//! Every program is compiled with the prelude and executed from its entry
//! unit. Assertions look at the `tellraw` output and at global bindings.

mod async_await;
mod basics;
mod class;
mod control_flow;
mod function;
mod object;
mod prelude;

use datajs::{Constant, Machine, Options, compile};

/// Compile `source` with the prelude and run its entry unit
pub fn run(source: &str) -> Machine {
    let compilation = compile(source, &Options::default());
    assert!(compilation.is_ok(), "{}", compilation.diagnostics);
    let mut machine = Machine::new(compilation.program);
    if let Err(error) = machine.run_entry() {
        panic!("entry unit failed: {}", error);
    }
    machine
}

/// Lines printed by the entry unit
pub fn output(source: &str) -> Vec<String> {
    run(source).output().to_vec()
}

/// Lines printed by the entry unit and the scheduled functions of the next `ticks` ticks
pub fn output_after_ticks(source: &str, ticks: u64) -> Vec<String> {
    let mut machine = run(source);
    if let Err(error) = machine.advance_ticks(ticks) {
        panic!("scheduled function failed: {}", error);
    }
    machine.output().to_vec()
}

/// Primitive value of a global after the entry unit ran
pub fn global(source: &str, name: &str) -> Constant {
    match run(source).global_constant(name) {
        Some(constant) => constant,
        None => panic!("global {} is missing or not a primitive", name),
    }
}
