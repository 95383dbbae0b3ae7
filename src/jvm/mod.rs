//! Model JVM methods and analyze them
//!
//! ### Simple example
//!
//! Consider the following method, which calls a method on its argument:
//!
//! ```java,ignore,no_run
//! static int length(String s) {
//!     return s.length();
//! }
//! ```
//!
//! Checking that its bytecode is type safe against a class graph is done as follows:
//!
//! ```
//! use jvmflow::jvm::analysis::{Analyzer, SimpleVerifier, VerificationType};
//! use jvmflow::jvm::class_graph::ClassGraph;
//! use jvmflow::jvm::code::{BranchInstruction::*, Instruction::*, InvokeType, MethodBuilder, MethodRef};
//! use jvmflow::jvm::*;
//!
//! # fn verify() -> Result<(), AnalysisError> {
//! // Setup the class graph, add in Java standard library types
//! let class_graph = ClassGraph::new();
//! class_graph.insert_java_library_types();
//!
//! // Build the method body
//! let mut code = MethodBuilder::new(
//!     MethodAccessFlags::STATIC,
//!     UnqualifiedName::from_str("length").unwrap(),
//!     MethodDescriptor::parse("(Ljava/lang/String;)I").unwrap(),
//! );
//! code.push_instruction(ALoad(0));
//! code.push_instruction(Invoke(
//!     InvokeType::Virtual,
//!     MethodRef {
//!         class: BinaryName::STRING,
//!         name: UnqualifiedName::from_str("length").unwrap(),
//!         descriptor: MethodDescriptor::parse("()I").unwrap(),
//!         is_interface: false,
//!     },
//! ));
//! code.push_branch_instruction(IReturn);
//! let mut method = code.finish();
//!
//! // Verify it
//! let verifier = SimpleVerifier::new(&class_graph);
//! let owner = BinaryName::from_str("me/alec/Strings").unwrap();
//! let analysis = Analyzer::new(&verifier).analyze_and_compute_maxs(&owner, &mut method)?;
//! assert_eq!(
//!     analysis.frame(1).unwrap().stack().collect::<Vec<_>>(),
//!     vec![&VerificationType::Object(RefType::Object(BinaryName::STRING))],
//! );
//! # Ok(())
//! # }
//! # verify().unwrap();
//! ```

mod access_flags;
pub mod analysis;
pub mod class_graph;
pub mod code;
mod descriptors;
mod errors;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
