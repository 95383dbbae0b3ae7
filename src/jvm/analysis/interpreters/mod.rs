mod basic;
mod basic_verifier;
mod simple_verifier;
mod source;

pub use basic::{BasicInterpreter, BasicValue};
pub use basic_verifier::BasicVerifier;
pub use simple_verifier::{SimpleVerifier, VerificationType};
pub use source::{SourceInterpreter, SourceValue};
