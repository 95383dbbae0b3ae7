use super::code::SynLabel;
use super::BinaryName;
use std::fmt;

/// Analysis of a method failed at a particular instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisError {
    /// Index (into the method's instruction list) of the instruction being processed
    pub instruction: usize,

    pub kind: AnalysisErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    /// Local variable index is outside of `max_locals`
    InvalidLocal { index: usize, max_locals: usize },

    /// Popping from an empty operand stack
    EmptyStack,

    /// Pushing would make the operand stack exceed `max_stack`
    StackOverflow { max_stack: usize },

    /// A stack manipulation instruction was used on a value of the wrong width
    InvalidWidth(usize),

    /// Two frames meeting at a control-flow join have different stack heights
    IncompatibleStackHeights { expected: usize, found: usize },

    /// `ret` reached without any `jsr` leading to it
    RetOutsideSubroutine,

    /// Execution can continue past the last instruction of the method
    FallOffEnd,

    /// A jump or exception handler refers to a label that was never placed
    UndefinedLabel(SynLabel),

    /// A label was placed more than once
    DuplicateLabel(SynLabel),

    /// Protected range of an exception handler ends before it starts
    InvalidHandlerRange,

    /// Interpreter hook called with an instruction that does not belong to it
    UnexpectedInstruction(String),

    /// Interpreter produced no value for an instruction that pushes one
    MissingValue,

    /// Returned value doesn't match the method's return type
    IncompatibleReturn { expected: String, found: String },

    /// Value found doesn't match the value expected
    ///
    /// `context` describes which operand was being checked (eg. `First argument`)
    Mismatch {
        context: Option<String>,
        expected: String,
        found: String,
    },

    /// Type hierarchy has no information about a class
    UnresolvedClass(BinaryName),

    /// Computed `max_stack` or `max_locals` is too large for a class file
    LimitTooLarge { limit: &'static str, value: usize },
}

impl AnalysisErrorKind {
    /// Locate this error at an instruction
    pub fn at(self, instruction: usize) -> AnalysisError {
        AnalysisError {
            instruction,
            kind: self,
        }
    }

    /// Mismatch between an expected and found value
    pub fn mismatch(
        context: Option<&str>,
        expected: &impl fmt::Display,
        found: &impl fmt::Display,
    ) -> AnalysisErrorKind {
        AnalysisErrorKind::Mismatch {
            context: context.map(String::from),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AnalysisErrorKind::*;

        match self {
            InvalidLocal { index, max_locals } => write!(
                f,
                "Local variable {} does not exist (max locals is {})",
                index, max_locals
            ),
            EmptyStack => f.write_str("Cannot pop operand off an empty stack"),
            StackOverflow { max_stack } => {
                write!(f, "Insufficient maximum stack size ({})", max_stack)
            }
            InvalidWidth(width) => {
                write!(f, "Illegal use of a value with width {}", width)
            }
            IncompatibleStackHeights { expected, found } => write!(
                f,
                "Incompatible stack heights (expected {}, found {})",
                expected, found
            ),
            RetOutsideSubroutine => f.write_str("RET instruction outside of a subroutine"),
            FallOffEnd => f.write_str("Execution can fall off the end of the code"),
            UndefinedLabel(label) => write!(f, "Label {:?} is never placed", label),
            DuplicateLabel(label) => write!(f, "Label {:?} is placed more than once", label),
            InvalidHandlerRange => f.write_str("Exception handler range ends before it starts"),
            UnexpectedInstruction(insn) => write!(f, "Unexpected instruction {}", insn),
            MissingValue => f.write_str("Instruction did not produce a value"),
            IncompatibleReturn { expected, found } => write!(
                f,
                "Incompatible return type: expected {}, but found {}",
                expected, found
            ),
            Mismatch {
                context: None,
                expected,
                found,
            } => write!(f, "Expected {}, but found {}", expected, found),
            Mismatch {
                context: Some(context),
                expected,
                found,
            } => write!(f, "{}: expected {}, but found {}", context, expected, found),
            UnresolvedClass(name) => write!(f, "Cannot resolve class {}", name),
            LimitTooLarge { limit, value } => write!(
                f,
                "Computed {} of {} exceeds the limit of {}",
                limit,
                value,
                u16::MAX
            ),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at instruction {}: {}", self.instruction, self.kind)
    }
}

impl std::error::Error for AnalysisErrorKind {}

impl std::error::Error for AnalysisError {}
