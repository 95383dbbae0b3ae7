//! Abstract interpretation of JVM method bodies
//!
//! The heart of this crate is [`jvm::analysis::Analyzer`], a fixed-point dataflow engine that
//! simulates a method over a pluggable value domain (an [`jvm::analysis::Interpreter`]) and
//! produces one [`jvm::analysis::Frame`] per instruction. The frames can then be used to verify
//! the method, to compute its `max_stack`/`max_locals`, or to rebuild a stack map table.
//!
//! ```
//! use jvmflow::jvm::analysis::{Analyzer, BasicInterpreter, BasicValue};
//! use jvmflow::jvm::code::{BranchInstruction::*, Instruction::*, MethodBuilder};
//! use jvmflow::jvm::*;
//!
//! # fn analyze() -> Result<(), AnalysisError> {
//! let mut code = MethodBuilder::new(
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     UnqualifiedName::from_str("twice").unwrap(),
//!     MethodDescriptor::parse("(J)J").unwrap(),
//! );
//! code.push_instruction(LLoad(0));
//! code.push_instruction(LLoad(0));
//! code.push_instruction(LAdd);
//! code.push_branch_instruction(LReturn);
//! let mut method = code.finish();
//!
//! let interpreter = BasicInterpreter;
//! let analysis = Analyzer::new(&interpreter).analyze_and_compute_maxs(&BinaryName::OBJECT, &mut method)?;
//! assert_eq!(method.max_stack, 4);
//! assert_eq!(method.max_locals, 2);
//! assert_eq!(analysis.frame(3).unwrap().stack().collect::<Vec<_>>(), vec![&BasicValue::Long]);
//! # Ok(())
//! # }
//! # analyze().unwrap();
//! ```

pub mod jvm;
pub mod settings;
pub mod util;
