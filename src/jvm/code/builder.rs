use super::{BranchInstruction, ExceptionHandler, InsnNode, Instruction, Method, SynLabel};
use crate::jvm::{BinaryName, MethodAccessFlags, MethodDescriptor, UnqualifiedName};

/// Incrementally build up the code of a method
///
/// Labels are handed out with [`MethodBuilder::fresh_label`] and can be referred to before they
/// are placed. Nothing here checks the code: that is what the analyzer is for.
pub struct MethodBuilder {
    method: Method,
    next_label: SynLabel,
}

impl MethodBuilder {
    pub fn new(
        access_flags: MethodAccessFlags,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> MethodBuilder {
        MethodBuilder {
            method: Method::new(access_flags, name, descriptor),
            next_label: SynLabel::START,
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        let label = self.next_label;
        self.next_label = label.next();
        label
    }

    /// Index the next pushed node will have
    pub fn next_index(&self) -> usize {
        self.method.instructions.len()
    }

    /// Place a label at the current position
    pub fn place_label(&mut self, label: SynLabel) -> &mut Self {
        self.method.instructions.push(InsnNode::Label(label));
        self
    }

    pub fn push_instruction(&mut self, insn: Instruction) -> &mut Self {
        self.method.instructions.push(InsnNode::Instruction(insn));
        self
    }

    pub fn push_branch_instruction(&mut self, insn: BranchInstruction<SynLabel>) -> &mut Self {
        self.method.instructions.push(InsnNode::Branch(insn));
        self
    }

    pub fn line_number(&mut self, line: u16) -> &mut Self {
        self.method.instructions.push(InsnNode::LineNumber(line));
        self
    }

    /// Protect the code between two labels with a handler
    pub fn add_exception_handler(
        &mut self,
        start: SynLabel,
        end: SynLabel,
        handler: SynLabel,
        catch_type: Option<BinaryName>,
    ) -> &mut Self {
        self.method.exception_handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
        });
        self
    }

    /// Declare the maximum stack and locals
    ///
    /// These are only needed when the method is analyzed without recomputing them.
    pub fn limits(&mut self, max_stack: u16, max_locals: u16) -> &mut Self {
        self.method.max_stack = max_stack;
        self.method.max_locals = max_locals;
        self
    }

    pub fn finish(self) -> Method {
        self.method
    }
}
