use crate::jvm::analysis::{Insn, InsnRef, Interpreter};
use crate::jvm::code::{BranchInstruction, Constant, Instruction};
use crate::jvm::{AnalysisErrorKind, BaseType, BinaryName, FieldType, RefType};
use crate::util::Width;
use std::fmt;

/// Coarse kind of a value
///
/// This is enough to catch stack shape problems and to compute bounds, but not to check that
/// references have the right class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BasicValue {
    /// Unusable value: an unset local, the second slot of a `long` or `double`, or the result of
    /// merging two different kinds of value
    Uninitialized,
    Int,
    Float,
    Long,
    Double,
    Reference,
    ReturnAddress,
}

impl Width for BasicValue {
    fn width(&self) -> usize {
        match self {
            BasicValue::Long | BasicValue::Double => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for BasicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BasicValue::Uninitialized => ".",
            BasicValue::Int => "I",
            BasicValue::Float => "F",
            BasicValue::Long => "J",
            BasicValue::Double => "D",
            BasicValue::Reference => "R",
            BasicValue::ReturnAddress => "A",
        })
    }
}

/// Interpreter tracking only the kind of every value
#[derive(Copy, Clone, Debug, Default)]
pub struct BasicInterpreter;

/// How a value domain maps JVM types onto its values
///
/// Implementing this is enough to get the typing rules of every instruction through the
/// `*_operation` functions in this module.
pub(crate) trait ValueTypes {
    type Value: Clone + fmt::Debug + fmt::Display;

    /// Value of a given type (or an unusable value for `None`)
    fn typed_value(&self, field_type: Option<&FieldType<BinaryName>>) -> Self::Value;

    /// Value of `aconst_null`
    fn null_value(&self) -> Self::Value;

    /// Value pushed by `jsr`
    fn return_address_value(&self) -> Self::Value;

    /// Value of the elements of an array value (for `aaload`)
    fn element_value(&self, array: &Self::Value) -> Result<Self::Value, AnalysisErrorKind>;
}

impl ValueTypes for BasicInterpreter {
    type Value = BasicValue;

    fn typed_value(&self, field_type: Option<&FieldType<BinaryName>>) -> BasicValue {
        match field_type {
            None => BasicValue::Uninitialized,
            Some(FieldType::Base(base_type)) => match base_type {
                BaseType::Float => BasicValue::Float,
                BaseType::Long => BasicValue::Long,
                BaseType::Double => BasicValue::Double,
                BaseType::Int
                | BaseType::Char
                | BaseType::Short
                | BaseType::Byte
                | BaseType::Boolean => BasicValue::Int,
            },
            Some(FieldType::Ref(_)) => BasicValue::Reference,
        }
    }

    fn null_value(&self) -> BasicValue {
        BasicValue::Reference
    }

    fn return_address_value(&self) -> BasicValue {
        BasicValue::ReturnAddress
    }

    fn element_value(&self, _array: &BasicValue) -> Result<BasicValue, AnalysisErrorKind> {
        Ok(BasicValue::Reference)
    }
}

impl Interpreter for BasicInterpreter {
    type Value = BasicValue;

    fn new_value(&self, field_type: Option<&FieldType<BinaryName>>) -> BasicValue {
        self.typed_value(field_type)
    }

    fn new_operation(&self, insn: InsnRef<'_>) -> Result<BasicValue, AnalysisErrorKind> {
        new_operation(self, insn)
    }

    fn copy_operation(
        &self,
        _insn: InsnRef<'_>,
        value: &BasicValue,
    ) -> Result<BasicValue, AnalysisErrorKind> {
        Ok(*value)
    }

    fn unary_operation(
        &self,
        insn: InsnRef<'_>,
        value: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        unary_operation(self, insn, value)
    }

    fn binary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &BasicValue,
        value2: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        binary_operation(self, insn, value1, value2)
    }

    fn ternary_operation(
        &self,
        insn: InsnRef<'_>,
        _value1: &BasicValue,
        _value2: &BasicValue,
        _value3: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        ternary_operation(insn)
    }

    fn nary_operation(
        &self,
        insn: InsnRef<'_>,
        _values: &[BasicValue],
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        nary_operation(self, insn)
    }

    fn return_operation(
        &self,
        _insn: InsnRef<'_>,
        _value: &BasicValue,
        _expected: &BasicValue,
    ) -> Result<(), AnalysisErrorKind> {
        Ok(())
    }

    fn merge(
        &self,
        value1: &BasicValue,
        value2: &BasicValue,
    ) -> Result<BasicValue, AnalysisErrorKind> {
        if value1 == value2 {
            Ok(*value1)
        } else {
            Ok(BasicValue::Uninitialized)
        }
    }
}

fn typed<T: ValueTypes + ?Sized>(types: &T, field_type: FieldType<BinaryName>) -> T::Value {
    types.typed_value(Some(&field_type))
}

fn object<T: ValueTypes + ?Sized>(types: &T, class: BinaryName) -> T::Value {
    typed(types, FieldType::object(class))
}

fn constant_value<T: ValueTypes + ?Sized>(types: &T, constant: &Constant) -> T::Value {
    match constant {
        Constant::Integer(_) => typed(types, FieldType::int()),
        Constant::Float(_) => typed(types, FieldType::float()),
        Constant::Long(_) => typed(types, FieldType::long()),
        Constant::Double(_) => typed(types, FieldType::double()),
        Constant::String(_) => object(types, BinaryName::STRING),
        Constant::Class(_) => object(types, BinaryName::CLASS),
        Constant::MethodType(_) => object(types, BinaryName::METHODTYPE),
        Constant::MethodHandle(_) => object(types, BinaryName::METHODHANDLE),
    }
}

/// Value produced by an instruction that pushes without popping
pub(crate) fn new_operation<T: ValueTypes + ?Sized>(
    types: &T,
    insn: InsnRef<'_>,
) -> Result<T::Value, AnalysisErrorKind> {
    use Instruction::*;

    let instruction = match insn.insn {
        Insn::Instruction(instruction) => instruction,
        Insn::Branch(BranchInstruction::Jsr(_)) => return Ok(types.return_address_value()),
        Insn::Branch(_) => return Err(insn.unexpected()),
    };

    Ok(match instruction {
        AConstNull => types.null_value(),
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | BiPush(_)
        | SiPush(_) => typed(types, FieldType::int()),
        LConst0 | LConst1 => typed(types, FieldType::long()),
        FConst0 | FConst1 | FConst2 => typed(types, FieldType::float()),
        DConst0 | DConst1 => typed(types, FieldType::double()),
        Ldc(constant) | Ldc2(constant) => constant_value(types, constant),
        GetStatic(field) => types.typed_value(Some(&field.descriptor)),
        New(class) => object(types, class.clone()),
        _ => return Err(insn.unexpected()),
    })
}

/// Value produced by an instruction with one operand
pub(crate) fn unary_operation<T: ValueTypes + ?Sized>(
    types: &T,
    insn: InsnRef<'_>,
    _value: &T::Value,
) -> Result<Option<T::Value>, AnalysisErrorKind> {
    use Instruction::*;

    let instruction = match insn.insn {
        Insn::Instruction(instruction) => instruction,
        Insn::Branch(
            BranchInstruction::If(_, _)
            | BranchInstruction::IfNull(_, _)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn
            | BranchInstruction::LReturn
            | BranchInstruction::FReturn
            | BranchInstruction::DReturn
            | BranchInstruction::AReturn
            | BranchInstruction::AThrow,
        ) => return Ok(None),
        Insn::Branch(_) => return Err(insn.unexpected()),
    };

    Ok(Some(match instruction {
        INeg | IInc(_, _) | L2I | F2I | D2I | I2B | I2C | I2S | ArrayLength | InstanceOf(_) => {
            typed(types, FieldType::int())
        }
        FNeg | I2F | L2F | D2F => typed(types, FieldType::float()),
        LNeg | I2L | F2L | D2L => typed(types, FieldType::long()),
        DNeg | I2D | L2D | F2D => typed(types, FieldType::double()),
        GetField(field) => types.typed_value(Some(&field.descriptor)),
        NewArray(base_type) => typed(types, FieldType::array(FieldType::Base(*base_type))),
        ANewArray(element_type) => {
            typed(types, FieldType::array(FieldType::Ref(element_type.clone())))
        }
        CheckCast(ref_type) => typed(types, FieldType::Ref(ref_type.clone())),
        PutStatic(_) | MonitorEnter | MonitorExit => return Ok(None),
        _ => return Err(insn.unexpected()),
    }))
}

/// Value produced by an instruction with two operands
pub(crate) fn binary_operation<T: ValueTypes + ?Sized>(
    types: &T,
    insn: InsnRef<'_>,
    value1: &T::Value,
    _value2: &T::Value,
) -> Result<Option<T::Value>, AnalysisErrorKind> {
    use Instruction::*;

    let instruction = match insn.insn {
        Insn::Instruction(instruction) => instruction,
        Insn::Branch(BranchInstruction::IfICmp(_, _) | BranchInstruction::IfACmp(_, _)) => {
            return Ok(None)
        }
        Insn::Branch(_) => return Err(insn.unexpected()),
    };

    Ok(Some(match instruction {
        IALoad | BALoad | CALoad | SALoad | IAdd | ISub | IMul | IDiv | IRem | ISh(_) | IAnd
        | IOr | IXor | LCmp | FCmp(_) | DCmp(_) => typed(types, FieldType::int()),
        FALoad | FAdd | FSub | FMul | FDiv | FRem => typed(types, FieldType::float()),
        LALoad | LAdd | LSub | LMul | LDiv | LRem | LSh(_) | LAnd | LOr | LXor => {
            typed(types, FieldType::long())
        }
        DALoad | DAdd | DSub | DMul | DDiv | DRem => typed(types, FieldType::double()),
        AALoad => types.element_value(value1)?,
        PutField(_) => return Ok(None),
        _ => return Err(insn.unexpected()),
    }))
}

/// Array stores don't produce anything
pub(crate) fn ternary_operation<V>(insn: InsnRef<'_>) -> Result<Option<V>, AnalysisErrorKind> {
    use Instruction::*;

    match insn.insn {
        Insn::Instruction(
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore,
        ) => Ok(None),
        _ => Err(insn.unexpected()),
    }
}

/// Value produced by invocations and `multianewarray`
pub(crate) fn nary_operation<T: ValueTypes + ?Sized>(
    types: &T,
    insn: InsnRef<'_>,
) -> Result<Option<T::Value>, AnalysisErrorKind> {
    match insn.insn {
        Insn::Instruction(Instruction::Invoke(_, method)) => Ok(method
            .descriptor
            .return_type
            .as_ref()
            .map(|return_type| types.typed_value(Some(return_type)))),
        Insn::Instruction(Instruction::InvokeDynamic(call_site)) => Ok(call_site
            .descriptor
            .return_type
            .as_ref()
            .map(|return_type| types.typed_value(Some(return_type)))),
        Insn::Instruction(Instruction::MultiANewArray(array_type, _)) => {
            Ok(Some(typed(types, FieldType::Ref(array_type.clone()))))
        }
        _ => Err(insn.unexpected()),
    }
}

/// Field type of a one dimensional array of some primitive type
pub(crate) fn primitive_array(element_type: BaseType) -> FieldType<BinaryName> {
    FieldType::Ref(RefType::array(FieldType::Base(element_type)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{FieldRef, ShiftType};
    use crate::jvm::{Name, UnqualifiedName};

    fn insn_ref(instruction: &Instruction) -> InsnRef<'_> {
        InsnRef {
            index: 0,
            insn: Insn::Instruction(instruction),
        }
    }

    #[test]
    fn value_kinds() {
        let interpreter = BasicInterpreter;
        let cases = vec![
            (FieldType::boolean(), BasicValue::Int),
            (FieldType::char(), BasicValue::Int),
            (FieldType::long(), BasicValue::Long),
            (FieldType::double(), BasicValue::Double),
            (FieldType::object(BinaryName::STRING), BasicValue::Reference),
            (FieldType::array(FieldType::int()), BasicValue::Reference),
        ];
        for (field_type, expected) in cases {
            assert_eq!(
                interpreter.new_value(Some(&field_type)),
                expected,
                "value of {:?}",
                field_type
            );
        }
        assert_eq!(interpreter.new_value(None), BasicValue::Uninitialized);
    }

    #[test]
    fn operation_results() {
        use BasicValue::*;

        let field = FieldRef {
            class: BinaryName::from_str("Point").unwrap(),
            name: UnqualifiedName::from_str("x").unwrap(),
            descriptor: FieldType::double(),
        };
        let interpreter = BasicInterpreter;

        let unary = vec![
            (Instruction::I2L, Long),
            (Instruction::D2F, Float),
            (Instruction::ArrayLength, Int),
            (Instruction::GetField(field.clone()), Double),
            (Instruction::NewArray(BaseType::Byte), Reference),
        ];
        for (insn, expected) in unary {
            assert!(
                matches!(
                    interpreter.unary_operation(insn_ref(&insn), &Reference),
                    Ok(Some(v)) if v == expected
                ),
                "result of {:?}",
                insn
            );
        }

        let binary = vec![
            (Instruction::LSh(ShiftType::Left), Long),
            (Instruction::LCmp, Int),
            (Instruction::AALoad, Reference),
            (Instruction::DRem, Double),
        ];
        for (insn, expected) in binary {
            assert!(
                matches!(
                    interpreter.binary_operation(insn_ref(&insn), &Reference, &Int),
                    Ok(Some(v)) if v == expected
                ),
                "result of {:?}",
                insn
            );
        }

        assert_eq!(
            interpreter.binary_operation(insn_ref(&Instruction::PutField(field)), &Reference, &Double),
            Ok(None)
        );
        assert_eq!(
            interpreter.new_operation(insn_ref(&Instruction::Ldc(Constant::String(String::from("hi"))))),
            Ok(Reference)
        );
    }

    #[test]
    fn wrong_arity() {
        let interpreter = BasicInterpreter;
        let result = interpreter.unary_operation(insn_ref(&Instruction::IAdd), &BasicValue::Int);
        assert!(
            matches!(result, Err(AnalysisErrorKind::UnexpectedInstruction(_))),
            "{:?}",
            result
        );
    }

    #[test]
    fn merging() {
        let interpreter = BasicInterpreter;
        assert_eq!(
            interpreter.merge(&BasicValue::Int, &BasicValue::Int),
            Ok(BasicValue::Int)
        );
        assert_eq!(
            interpreter.merge(&BasicValue::Int, &BasicValue::Reference),
            Ok(BasicValue::Uninitialized)
        );
    }
}
