//! Prelude compiled ahead of every program
//!
//! The built-in globals are ordinary source compiled through the same
//! compiler. They reach the target environment through the `__`-prefixed
//! intrinsics (see `compiler::intrinsics`).

/// Source of the built-in globals
pub const PRELUDE: &str = r#"
class Object {
    constructor() {
    }
    toString() {
        return "[object Object]";
    }
}

function convertToString(text) {
    if (typeof text === "string") {
        return text;
    }
    return text + "";
}

const console = {
    log: (text) => __run(__singleQuoteConcat(__singleQuoteConcat('tellraw @a "', convertToString(text)), '"')),
    warn: (text) => __run(__singleQuoteConcat(__singleQuoteConcat('tellraw @a {"text":"', convertToString(text)), '","color":"yellow"}')),
    error: (text) => __run(__singleQuoteConcat(__singleQuoteConcat('tellraw @a {"text":"', convertToString(text)), '","color":"red"}')),
    info: (text) => __run(__singleQuoteConcat(__singleQuoteConcat('tellraw @a {"text":"', convertToString(text)), '","color":"blue"}')),
    debug: (text) => __run(__singleQuoteConcat(__singleQuoteConcat('tellraw @a {"text":"', convertToString(text)), '","color":"aqua"}')),
};

class String {
    constructor(value) {
        if (new.target) {
            this._value = value + "";
        } else {
            return value + "";
        }
    }
    repeat(count) {
        let result = "";
        for (let i = 0; i < count; i++) {
            result += this._value;
        }
        return result;
    }
}

class Promise {
    constructor(executor) {
        __initPromise(this);
        executor(__bind(function (value) {
            __resolvePromise(this, value);
        }, this));
    }
    then(listener) {
        __thenPromise(this, listener);
    }
}

function setTimeout(handler, timeout) {
    __schedule(handler, timeout / 50);
}

function setInterval(handler, timeout) {
    __schedule(() => {
        handler();
        setInterval(handler, timeout);
    }, timeout / 50);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn test_prelude_parses() {
        let program = parser::parse(PRELUDE);
        assert!(program.is_ok(), "{:?}", program.err());
    }
}
