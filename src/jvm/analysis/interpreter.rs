use crate::jvm::code::{BranchInstruction, ExceptionHandler, Instruction, SynLabel};
use crate::jvm::{AnalysisErrorKind, BinaryName, FieldType};
use crate::util::Width;
use std::fmt::Debug;

/// Abstract value tracked in the locals and on the operand stack of a frame
///
/// Values are compared with `Eq` to detect when a merge changed a frame, so equality must be
/// structural and cheap enough to do often.
pub trait Value: Clone + Eq + Debug + Width {}

impl<V: Clone + Eq + Debug + Width> Value for V {}

/// Instruction being interpreted
#[derive(Copy, Clone, Debug)]
pub enum Insn<'a> {
    Instruction(&'a Instruction),
    Branch(&'a BranchInstruction<SynLabel>),
}

/// Instruction being interpreted, along with its index in the method's instruction list
#[derive(Copy, Clone, Debug)]
pub struct InsnRef<'a> {
    pub index: usize,
    pub insn: Insn<'a>,
}

impl<'a> InsnRef<'a> {
    /// Error for an interpreter hook that doesn't handle this instruction
    pub fn unexpected(&self) -> AnalysisErrorKind {
        AnalysisErrorKind::UnexpectedInstruction(format!("{:?}", self.insn))
    }
}

/// Semantic domain used by the analyzer
///
/// The frame takes care of moving values between the operand stack and the locals, while the
/// interpreter decides what the values are. Each `*_operation` hook gets called for the
/// instructions with the corresponding number of operands:
///
///   - `new_operation`: `aconst_null`, constants, `ldc`, `jsr`, `getstatic`, `new`
///   - `copy_operation`: loads, stores, `dup*`, `swap`
///   - `unary_operation`: negations, conversions, `iinc`, single operand branches, switches,
///     returns, `putstatic`, `getfield`, `newarray`, `anewarray`, `arraylength`, `athrow`,
///     `checkcast`, `instanceof`, monitors
///   - `binary_operation`: array loads, arithmetic, comparisons, two operand branches,
///     `putfield`
///   - `ternary_operation`: array stores
///   - `nary_operation`: invocations and `multianewarray`
///
/// Hooks return `Ok(None)` when the instruction doesn't push anything.
pub trait Interpreter {
    type Value: Value;

    /// Value for a given type (or for an uninitialized slot when `None`)
    fn new_value(&self, field_type: Option<&FieldType<BinaryName>>) -> Self::Value;

    /// Value of a parameter in the initial frame (`this` is local 0 of instance methods)
    fn new_parameter_value(
        &self,
        is_instance_method: bool,
        local: usize,
        field_type: &FieldType<BinaryName>,
    ) -> Self::Value {
        let _ = (is_instance_method, local);
        self.new_value(Some(field_type))
    }

    /// Value expected by return instructions (`None` for `void` methods)
    fn new_return_type_value(
        &self,
        return_type: Option<&FieldType<BinaryName>>,
    ) -> Option<Self::Value> {
        return_type.map(|return_type| self.new_value(Some(return_type)))
    }

    /// Value of a local that does not hold a parameter in the initial frame
    fn new_empty_value(&self, local: usize) -> Self::Value {
        let _ = local;
        self.new_value(None)
    }

    /// Value pushed onto the (otherwise empty) stack when entering an exception handler
    fn new_exception_value(
        &self,
        handler: &ExceptionHandler,
        exception_type: &BinaryName,
    ) -> Self::Value {
        let _ = handler;
        self.new_value(Some(&FieldType::object(exception_type.clone())))
    }

    fn new_operation(&self, insn: InsnRef<'_>) -> Result<Self::Value, AnalysisErrorKind>;

    fn copy_operation(
        &self,
        insn: InsnRef<'_>,
        value: &Self::Value,
    ) -> Result<Self::Value, AnalysisErrorKind>;

    fn unary_operation(
        &self,
        insn: InsnRef<'_>,
        value: &Self::Value,
    ) -> Result<Option<Self::Value>, AnalysisErrorKind>;

    fn binary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &Self::Value,
        value2: &Self::Value,
    ) -> Result<Option<Self::Value>, AnalysisErrorKind>;

    fn ternary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &Self::Value,
        value2: &Self::Value,
        value3: &Self::Value,
    ) -> Result<Option<Self::Value>, AnalysisErrorKind>;

    /// Operation on a variable number of operands (the receiver, if any, comes first)
    fn nary_operation(
        &self,
        insn: InsnRef<'_>,
        values: &[Self::Value],
    ) -> Result<Option<Self::Value>, AnalysisErrorKind>;

    /// Check a returned value against the value expected from the method's return type
    fn return_operation(
        &self,
        insn: InsnRef<'_>,
        value: &Self::Value,
        expected: &Self::Value,
    ) -> Result<(), AnalysisErrorKind>;

    /// Combine two values meeting at the same slot from different control flow paths
    ///
    /// This must be idempotent (`merge(v, v) = v`) and only move up a lattice of finite height,
    /// otherwise the analysis may not terminate.
    fn merge(
        &self,
        value1: &Self::Value,
        value2: &Self::Value,
    ) -> Result<Self::Value, AnalysisErrorKind>;
}
