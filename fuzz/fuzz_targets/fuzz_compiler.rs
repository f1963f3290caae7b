#![no_main]

use datajs::{Machine, Options, compile, dialect};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 10_000 {
        return;
    }

    let compilation = compile(source, &Options::default().without_prelude());
    let _ = dialect::render(&compilation.program);

    // Units that compiled cleanly must also run to completion or fail with a MachineError
    if compilation.is_ok() {
        let mut machine = Machine::new(compilation.program).with_max_depth(64);
        let _ = machine.run_entry();
        let _ = machine.run_until_idle(16);
    }
});
