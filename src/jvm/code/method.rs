use super::{BranchInstruction, Instruction, SynLabel};
use crate::jvm::{
    AnalysisError, AnalysisErrorKind, BinaryName, MethodAccessFlags, MethodDescriptor,
    UnqualifiedName,
};
use std::collections::HashMap;

/// Entry in a method's instruction list
///
/// Labels and line numbers are pseudo-instructions: they occupy an index in the list (and so get
/// a frame of their own during analysis) but do nothing when executed.
#[derive(Clone, Debug, PartialEq)]
pub enum InsnNode {
    Label(SynLabel),
    LineNumber(u16),
    Instruction(Instruction),
    Branch(BranchInstruction<SynLabel>),
}

impl InsnNode {
    /// One past the last local variable slot this reads or writes
    pub fn locals_end(&self) -> Option<usize> {
        match self {
            InsnNode::Instruction(insn) => insn
                .local_access()
                .map(|(idx, width)| idx as usize + width),
            InsnNode::Branch(BranchInstruction::Ret(idx)) => Some(*idx as usize + 1),
            _ => None,
        }
    }
}

/// Protected range of instructions, along with the handler for exceptions thrown in the range
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start: SynLabel,

    /// End of the protected range (exclusive)
    pub end: SynLabel,

    /// Where to jump when an exception is caught
    pub handler: SynLabel,

    /// Class of exceptions caught (`None` catches everything, as for `finally`)
    pub catch_type: Option<BinaryName>,
}

/// A method, along with its code
#[derive(Clone, Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Instructions, in order
    pub instructions: Vec<InsnNode>,

    /// Exception handlers (earlier entries take priority)
    pub exception_handlers: Vec<ExceptionHandler>,

    /// Maximum height of the operand stack, in slots
    pub max_stack: u16,

    /// Number of local variable slots
    pub max_locals: u16,
}

impl Method {
    /// Method without any code (suitable for `abstract` and `native` methods)
    pub fn new(
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Method {
        Method {
            access_flags,
            name,
            descriptor,
            instructions: vec![],
            exception_handlers: vec![],
            max_stack: 0,
            max_locals: 0,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Map from every placed label to its index in the instruction list
    pub fn label_indices(&self) -> Result<HashMap<SynLabel, usize>, AnalysisError> {
        let mut indices = HashMap::new();
        for (index, insn) in self.instructions.iter().enumerate() {
            if let InsnNode::Label(label) = insn {
                if indices.insert(*label, index).is_some() {
                    return Err(AnalysisErrorKind::DuplicateLabel(*label).at(index));
                }
            }
        }
        Ok(indices)
    }

    /// Number of local variable slots the code actually needs
    ///
    /// This is at least enough to fit the parameters (and `this` for non-static methods), plus
    /// enough to fit every local accessed by a load, store, `iinc`, or `ret`.
    pub fn compute_max_locals(&self) -> usize {
        let parameters = self.descriptor.parameter_length(!self.is_static());
        self.instructions
            .iter()
            .filter_map(InsnNode::locals_end)
            .fold(parameters, usize::max)
    }
}
