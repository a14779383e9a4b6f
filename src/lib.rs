/*!
Incremental pattern matching over streams of arbitrary tokens.

This crate compiles [patterns](pattern::Pattern) over any token type into
[programs](program::Program) for a small virtual machine, and then runs those
programs with a [Pike VM](vm::Machine) that is fed one input item at a time.
Unlike a typical regex engine, the input is never available all at once:
the machine keeps every viable match attempt alive between items, can report
which items it expects next, and supports timers so that a pattern can
require part of a match to complete within some number of seconds.

# Example

```
use token_automata::{pattern::Compiler, vm::Machine};

let program = Compiler::new().build("ab+c")?;
let mut machine = Machine::new(program)?;
for ch in "abb".chars() {
    machine.submit_input(ch)?;
}
assert!(!machine.is_match());
assert_eq!(vec![&'b', &'c'], machine.expected_inputs());

machine.submit_input('c')?;
assert!(machine.is_match());
assert!(machine.is_finished());

# Ok::<(), Box<dyn std::error::Error>>(())
```

# Crate features

* **std** - Enabled by default. Provides `std::error::Error` impls and
  [`vm::Machine::set_clock_now`]. Without it, the crate is `no_std` but still
  requires `alloc`.
* **syntax** - Enabled by default. Translates concrete regular expression
  syntax into character patterns via the `regex-syntax` crate.
* **logging** - Emits log messages via the `log` crate while compiling
  patterns and running machines.
*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use crate::error::BuildError;

#[macro_use]
mod macros;

mod error;
pub mod pattern;
pub mod program;
pub mod vm;
