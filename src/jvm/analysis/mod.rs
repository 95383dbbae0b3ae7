//! Fixed-point dataflow analysis of method bodies
//!
//! An [`Analyzer`] walks the control flow graph of a [`crate::jvm::code::Method`], executing
//! each instruction on a [`Frame`] of abstract values and merging frames where control flow
//! joins until nothing changes anymore. What the values are is up to the [`Interpreter`]:
//!
//!   - [`BasicInterpreter`] only tracks the kind of value (int, long, reference, ...)
//!   - [`BasicVerifier`] additionally checks that every instruction gets operands of the
//!     right kind
//!   - [`SimpleVerifier`] tracks reference types and checks assignability against a
//!     [`crate::jvm::class_graph::TypeHierarchy`]
//!   - [`SourceInterpreter`] tracks which instructions may have produced each value
//!
//! Subroutines (`jsr`/`ret`) are supported: locals a subroutine doesn't touch flow from each
//! call site straight through to the instruction after that call site.

mod analyzer;
mod frame;
mod interpreter;
mod interpreters;
mod stack_map;
mod subroutine;

pub use analyzer::{Analysis, Analyzer};
pub use frame::Frame;
pub use interpreter::{Insn, InsnRef, Interpreter, Value};
pub use interpreters::*;
pub use stack_map::{StackMapEntry, StackMapFrame, StackMapTable};
pub use subroutine::Subroutine;
