//! Compiler from a JavaScript subset to datapack function units
//!
//! The target environment can only read and write storage, call another
//! function with a storage compound as its arguments, and return an integer.
//! [`compile`] lowers source onto those operations, [`dialect`] renders the
//! result as `.mcfunction` files, and [`Machine`] runs it in a simulator.
//!
//! # Example
//!
//! ```
//! use datajs::{Machine, Options, compile};
//!
//! let compilation = compile("console.log(1 + 2);", &Options::default());
//! assert!(compilation.is_ok());
//!
//! let mut machine = Machine::new(compilation.program);
//! machine.run_entry().unwrap();
//! assert_eq!(machine.output(), ["3"]);
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod lexer;
pub mod machine;
pub mod parser;
pub mod stdlib;
pub mod value;

pub use compiler::{Compilation, Program, compile, compile_program};
pub use config::Options;
pub use error::{CompileError, Diagnostics, MachineError};
pub use machine::Machine;
pub use value::{Constant, Nbt};
