use super::basic::{self, primitive_array, BasicInterpreter, BasicValue, ValueTypes};
use crate::jvm::analysis::{Insn, InsnRef, Interpreter};
use crate::jvm::code::{BranchInstruction, Instruction};
use crate::jvm::{AnalysisErrorKind, BaseType, BinaryName, FieldType, RefType};
use log::error;
use std::fmt::Display;

/// Value domain whose values can be checked against expected types
pub(crate) trait VerifiedValues: ValueTypes {
    fn is_reference(&self, value: &Self::Value) -> bool;

    fn is_return_address(&self, value: &Self::Value) -> bool;

    fn is_array_value(&self, value: &Self::Value) -> bool;

    /// Is this an array whose elements are references (or `null`)?
    fn is_reference_array(&self, value: &Self::Value) -> bool;

    /// Can `value` be used where `expected` is required?
    fn is_subtype_of(
        &self,
        value: &Self::Value,
        expected: &Self::Value,
    ) -> Result<bool, AnalysisErrorKind>;

    /// Type of the values `aastore` may put into an array (`None` when the domain can't tell)
    fn stored_element(
        &self,
        array: &Self::Value,
    ) -> Result<Option<Self::Value>, AnalysisErrorKind>;
}

/// Interpreter tracking value kinds and checking that every instruction gets operands of the
/// kinds it expects
#[derive(Copy, Clone, Debug, Default)]
pub struct BasicVerifier;

impl ValueTypes for BasicVerifier {
    type Value = BasicValue;

    fn typed_value(&self, field_type: Option<&FieldType<BinaryName>>) -> BasicValue {
        BasicInterpreter.typed_value(field_type)
    }

    fn null_value(&self) -> BasicValue {
        BasicInterpreter.null_value()
    }

    fn return_address_value(&self) -> BasicValue {
        BasicInterpreter.return_address_value()
    }

    fn element_value(&self, array: &BasicValue) -> Result<BasicValue, AnalysisErrorKind> {
        BasicInterpreter.element_value(array)
    }
}

impl VerifiedValues for BasicVerifier {
    fn is_reference(&self, value: &BasicValue) -> bool {
        *value == BasicValue::Reference
    }

    fn is_return_address(&self, value: &BasicValue) -> bool {
        *value == BasicValue::ReturnAddress
    }

    fn is_array_value(&self, value: &BasicValue) -> bool {
        self.is_reference(value)
    }

    fn is_reference_array(&self, value: &BasicValue) -> bool {
        self.is_reference(value)
    }

    fn is_subtype_of(
        &self,
        value: &BasicValue,
        expected: &BasicValue,
    ) -> Result<bool, AnalysisErrorKind> {
        Ok(value == expected)
    }

    fn stored_element(
        &self,
        _array: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        Ok(None)
    }
}

impl Interpreter for BasicVerifier {
    type Value = BasicValue;

    fn new_value(&self, field_type: Option<&FieldType<BinaryName>>) -> BasicValue {
        self.typed_value(field_type)
    }

    fn new_operation(&self, insn: InsnRef<'_>) -> Result<BasicValue, AnalysisErrorKind> {
        basic::new_operation(self, insn)
    }

    fn copy_operation(
        &self,
        insn: InsnRef<'_>,
        value: &BasicValue,
    ) -> Result<BasicValue, AnalysisErrorKind> {
        check_copy(self, insn, value)?;
        Ok(*value)
    }

    fn unary_operation(
        &self,
        insn: InsnRef<'_>,
        value: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        check_unary(self, insn, value)?;
        basic::unary_operation(self, insn, value)
    }

    fn binary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &BasicValue,
        value2: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        check_binary(self, insn, value1, value2)?;
        basic::binary_operation(self, insn, value1, value2)
    }

    fn ternary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &BasicValue,
        value2: &BasicValue,
        value3: &BasicValue,
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        check_ternary(self, insn, value1, value2, value3)?;
        basic::ternary_operation(insn)
    }

    fn nary_operation(
        &self,
        insn: InsnRef<'_>,
        values: &[BasicValue],
    ) -> Result<Option<BasicValue>, AnalysisErrorKind> {
        check_nary(self, insn, values)?;
        basic::nary_operation(self, insn)
    }

    fn return_operation(
        &self,
        insn: InsnRef<'_>,
        value: &BasicValue,
        expected: &BasicValue,
    ) -> Result<(), AnalysisErrorKind> {
        check_return(self, insn, value, expected)
    }

    fn merge(
        &self,
        value1: &BasicValue,
        value2: &BasicValue,
    ) -> Result<BasicValue, AnalysisErrorKind> {
        BasicInterpreter.merge(value1, value2)
    }
}

/// Check that a value is a subtype of the expected value
fn expect<T>(
    types: &T,
    insn: InsnRef<'_>,
    context: Option<&str>,
    value: &T::Value,
    expected: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    if types.is_subtype_of(value, expected)? {
        Ok(())
    } else {
        error!(
            "Instruction {} ({:?}): expected {}, but found {}",
            insn.index, insn.insn, expected, value
        );
        Err(AnalysisErrorKind::mismatch(context, expected, value))
    }
}

/// Mismatch where the expectation is a description rather than a value
fn described_mismatch(
    insn: InsnRef<'_>,
    context: Option<&str>,
    description: &str,
    value: &impl Display,
) -> AnalysisErrorKind {
    error!(
        "Instruction {} ({:?}): expected {}, but found {}",
        insn.index, insn.insn, description, value
    );
    AnalysisErrorKind::Mismatch {
        context: context.map(String::from),
        expected: String::from(description),
        found: value.to_string(),
    }
}

fn expect_reference<T>(
    types: &T,
    insn: InsnRef<'_>,
    context: Option<&str>,
    value: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    if types.is_reference(value) {
        Ok(())
    } else {
        Err(described_mismatch(insn, context, "an object reference", value))
    }
}

fn expect_array<T>(
    types: &T,
    insn: InsnRef<'_>,
    context: Option<&str>,
    value: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    if types.is_array_value(value) {
        Ok(())
    } else {
        Err(described_mismatch(insn, context, "an array reference", value))
    }
}

fn typed<T: ValueTypes + ?Sized>(types: &T, field_type: FieldType<BinaryName>) -> T::Value {
    types.typed_value(Some(&field_type))
}

/// `[Z` or `[B`, whichever the array value is (`baload` and `bastore` work on both)
fn byte_or_boolean_array<T>(types: &T, array: &T::Value) -> Result<T::Value, AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    let boolean_array = typed(types, primitive_array(BaseType::Boolean));
    if types.is_subtype_of(array, &boolean_array)? {
        Ok(boolean_array)
    } else {
        Ok(typed(types, primitive_array(BaseType::Byte)))
    }
}

/// Check the operand of loads, stores, and stack shuffles
pub(crate) fn check_copy<T>(
    types: &T,
    insn: InsnRef<'_>,
    value: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    use Instruction::*;

    let expected = match insn.insn {
        Insn::Instruction(ILoad(_) | IStore(_)) => FieldType::int(),
        Insn::Instruction(FLoad(_) | FStore(_)) => FieldType::float(),
        Insn::Instruction(LLoad(_) | LStore(_)) => FieldType::long(),
        Insn::Instruction(DLoad(_) | DStore(_)) => FieldType::double(),
        Insn::Instruction(ALoad(_)) => return expect_reference(types, insn, None, value),
        Insn::Instruction(AStore(_)) => {
            return if types.is_reference(value) || types.is_return_address(value) {
                Ok(())
            } else {
                Err(described_mismatch(
                    insn,
                    None,
                    "an object reference or a return address",
                    value,
                ))
            }
        }
        _ => return Ok(()),
    };
    expect(types, insn, None, value, &typed(types, expected))
}

/// Check the operand of single operand instructions
pub(crate) fn check_unary<T>(
    types: &T,
    insn: InsnRef<'_>,
    value: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    use Instruction::*;

    let expected = match insn.insn {
        Insn::Instruction(instruction) => match instruction {
            INeg | IInc(_, _) | I2F | I2L | I2D | I2B | I2C | I2S | NewArray(_) | ANewArray(_) => {
                FieldType::int()
            }
            FNeg | F2I | F2L | F2D => FieldType::float(),
            LNeg | L2I | L2F | L2D => FieldType::long(),
            DNeg | D2I | D2F | D2L => FieldType::double(),
            GetField(field) => FieldType::object(field.class.clone()),
            PutStatic(field) => field.descriptor.clone(),
            ArrayLength => return expect_array(types, insn, None, value),
            CheckCast(_) | InstanceOf(_) | MonitorEnter | MonitorExit => {
                return expect_reference(types, insn, None, value)
            }
            _ => return Err(insn.unexpected()),
        },
        Insn::Branch(branch) => match branch {
            BranchInstruction::If(_, _)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn => FieldType::int(),
            BranchInstruction::FReturn => FieldType::float(),
            BranchInstruction::LReturn => FieldType::long(),
            BranchInstruction::DReturn => FieldType::double(),
            BranchInstruction::AReturn
            | BranchInstruction::AThrow
            | BranchInstruction::IfNull(_, _) => {
                return expect_reference(types, insn, None, value)
            }
            _ => return Err(insn.unexpected()),
        },
    };
    expect(types, insn, None, value, &typed(types, expected))
}

/// Check the operands of two operand instructions
pub(crate) fn check_binary<T>(
    types: &T,
    insn: InsnRef<'_>,
    value1: &T::Value,
    value2: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    use Instruction::*;

    let (expected1, expected2) = match insn.insn {
        Insn::Instruction(instruction) => match instruction {
            IALoad => (typed(types, primitive_array(BaseType::Int)), typed(types, FieldType::int())),
            BALoad => (byte_or_boolean_array(types, value1)?, typed(types, FieldType::int())),
            CALoad => (typed(types, primitive_array(BaseType::Char)), typed(types, FieldType::int())),
            SALoad => (typed(types, primitive_array(BaseType::Short)), typed(types, FieldType::int())),
            LALoad => (typed(types, primitive_array(BaseType::Long)), typed(types, FieldType::int())),
            FALoad => (typed(types, primitive_array(BaseType::Float)), typed(types, FieldType::int())),
            DALoad => (typed(types, primitive_array(BaseType::Double)), typed(types, FieldType::int())),
            AALoad => (
                typed(types, FieldType::Ref(RefType::array(FieldType::object(BinaryName::OBJECT)))),
                typed(types, FieldType::int()),
            ),
            IAdd | ISub | IMul | IDiv | IRem | ISh(_) | IAnd | IOr | IXor => {
                (typed(types, FieldType::int()), typed(types, FieldType::int()))
            }
            FAdd | FSub | FMul | FDiv | FRem | FCmp(_) => {
                (typed(types, FieldType::float()), typed(types, FieldType::float()))
            }
            LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor | LCmp => {
                (typed(types, FieldType::long()), typed(types, FieldType::long()))
            }
            LSh(_) => (typed(types, FieldType::long()), typed(types, FieldType::int())),
            DAdd | DSub | DMul | DDiv | DRem | DCmp(_) => {
                (typed(types, FieldType::double()), typed(types, FieldType::double()))
            }
            PutField(field) => (
                typed(types, FieldType::object(field.class.clone())),
                types.typed_value(Some(&field.descriptor)),
            ),
            _ => return Err(insn.unexpected()),
        },
        Insn::Branch(BranchInstruction::IfICmp(_, _)) => {
            (typed(types, FieldType::int()), typed(types, FieldType::int()))
        }
        Insn::Branch(BranchInstruction::IfACmp(_, _)) => {
            expect_reference(types, insn, Some("First argument"), value1)?;
            return expect_reference(types, insn, Some("Second argument"), value2);
        }
        Insn::Branch(_) => return Err(insn.unexpected()),
    };

    expect(types, insn, Some("First argument"), value1, &expected1)?;
    expect(types, insn, Some("Second argument"), value2, &expected2)
}

/// Check the operands of array stores
pub(crate) fn check_ternary<T>(
    types: &T,
    insn: InsnRef<'_>,
    value1: &T::Value,
    value2: &T::Value,
    value3: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    use Instruction::*;

    let int = typed(types, FieldType::int());
    let (expected1, expected3) = match insn.insn {
        Insn::Instruction(IAStore) => (typed(types, primitive_array(BaseType::Int)), int.clone()),
        Insn::Instruction(BAStore) => (byte_or_boolean_array(types, value1)?, int.clone()),
        Insn::Instruction(CAStore) => (typed(types, primitive_array(BaseType::Char)), int.clone()),
        Insn::Instruction(SAStore) => (typed(types, primitive_array(BaseType::Short)), int.clone()),
        Insn::Instruction(LAStore) => (
            typed(types, primitive_array(BaseType::Long)),
            typed(types, FieldType::long()),
        ),
        Insn::Instruction(FAStore) => (
            typed(types, primitive_array(BaseType::Float)),
            typed(types, FieldType::float()),
        ),
        Insn::Instruction(DAStore) => (
            typed(types, primitive_array(BaseType::Double)),
            typed(types, FieldType::double()),
        ),
        Insn::Instruction(AAStore) => {
            if !types.is_reference_array(value1) {
                return Err(described_mismatch(
                    insn,
                    Some("First argument"),
                    "an array of references",
                    value1,
                ));
            }
            expect(types, insn, Some("Second argument"), value2, &int)?;
            expect_reference(types, insn, Some("Third argument"), value3)?;
            return match types.stored_element(value1)? {
                Some(element) => expect(types, insn, Some("Third argument"), value3, &element),
                None => Ok(()),
            };
        }
        _ => return Err(insn.unexpected()),
    };

    expect(types, insn, Some("First argument"), value1, &expected1)?;
    expect(types, insn, Some("Second argument"), value2, &int)?;
    expect(types, insn, Some("Third argument"), value3, &expected3)
}

/// Check the receiver and arguments of invocations, and the dimensions of `multianewarray`
pub(crate) fn check_nary<T>(
    types: &T,
    insn: InsnRef<'_>,
    values: &[T::Value],
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    let (receiver, parameters) = match insn.insn {
        Insn::Instruction(Instruction::MultiANewArray(_, _)) => {
            let int = typed(types, FieldType::int());
            for value in values {
                expect(types, insn, None, value, &int)?;
            }
            return Ok(());
        }
        Insn::Instruction(Instruction::Invoke(invoke_type, method)) => {
            let receiver = if invoke_type.has_receiver() {
                Some(&method.class)
            } else {
                None
            };
            (receiver, &method.descriptor.parameters)
        }
        Insn::Instruction(Instruction::InvokeDynamic(call_site)) => {
            (None, &call_site.descriptor.parameters)
        }
        _ => return Err(insn.unexpected()),
    };

    let mut values = values.iter();
    if let Some(owner) = receiver {
        if let Some(value) = values.next() {
            let expected = typed(types, FieldType::object(owner.clone()));
            expect(types, insn, Some("Method owner"), value, &expected)?;
        }
    }
    for (argument, (value, parameter)) in values.zip(parameters).enumerate() {
        let context = format!("Argument {}", argument + 1);
        let expected = types.typed_value(Some(parameter));
        expect(types, insn, Some(context.as_str()), value, &expected)?;
    }
    Ok(())
}

pub(crate) fn check_return<T>(
    types: &T,
    insn: InsnRef<'_>,
    value: &T::Value,
    expected: &T::Value,
) -> Result<(), AnalysisErrorKind>
where
    T: VerifiedValues + ?Sized,
{
    expect(types, insn, Some("Incompatible return type"), value, expected)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{CompareMode, InvokeType, MethodRef, ShiftType};
    use crate::jvm::{MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

    fn insn_ref(instruction: &Instruction) -> InsnRef<'_> {
        InsnRef {
            index: 3,
            insn: Insn::Instruction(instruction),
        }
    }

    #[test]
    fn operand_kinds() {
        use BasicValue::*;

        let verifier = BasicVerifier;
        let accepted = vec![
            (Instruction::IAdd, Int, Int),
            (Instruction::LSh(ShiftType::Left), Long, Int),
            (Instruction::IALoad, Reference, Int),
            (Instruction::DCmp(CompareMode::G), Double, Double),
        ];
        for (insn, value1, value2) in accepted {
            assert!(
                verifier.binary_operation(insn_ref(&insn), &value1, &value2).is_ok(),
                "{:?} accepts {:?} and {:?}",
                insn,
                value1,
                value2
            );
        }

        let rejected = vec![
            (Instruction::IAdd, Int, Float),
            (Instruction::LSh(ShiftType::Left), Long, Long),
            (Instruction::IALoad, Int, Int),
        ];
        for (insn, value1, value2) in rejected {
            assert!(
                matches!(
                    verifier.binary_operation(insn_ref(&insn), &value1, &value2),
                    Err(AnalysisErrorKind::Mismatch { .. })
                ),
                "{:?} rejects {:?} and {:?}",
                insn,
                value1,
                value2
            );
        }
    }

    #[test]
    fn loads_and_stores() {
        use BasicValue::*;

        let verifier = BasicVerifier;
        assert!(verifier.copy_operation(insn_ref(&Instruction::ILoad(0)), &Int).is_ok());
        assert!(verifier
            .copy_operation(insn_ref(&Instruction::ILoad(0)), &Uninitialized)
            .is_err());
        assert!(verifier
            .copy_operation(insn_ref(&Instruction::AStore(1)), &ReturnAddress)
            .is_ok());
        assert_eq!(
            verifier.copy_operation(insn_ref(&Instruction::ALoad(1)), &ReturnAddress),
            Err(AnalysisErrorKind::Mismatch {
                context: None,
                expected: String::from("an object reference"),
                found: String::from("A"),
            })
        );
        assert!(verifier.copy_operation(insn_ref(&Instruction::Dup), &Long).is_ok());
    }

    #[test]
    fn invocation_arguments() {
        use BasicValue::*;

        let verifier = BasicVerifier;
        let method = MethodRef {
            class: BinaryName::STRING,
            name: UnqualifiedName::from_str("regionMatches").unwrap(),
            descriptor: MethodDescriptor::parse("(ILjava/lang/String;II)Z").unwrap(),
            is_interface: false,
        };
        let invoke = Instruction::Invoke(InvokeType::Virtual, method);

        assert_eq!(
            verifier.nary_operation(insn_ref(&invoke), &[Reference, Int, Reference, Int, Int]),
            Ok(Some(Int))
        );
        assert_eq!(
            verifier.nary_operation(insn_ref(&invoke), &[Int, Int, Reference, Int, Int]),
            Err(AnalysisErrorKind::mismatch(
                Some("Method owner"),
                &Reference,
                &Int
            ))
        );
        assert_eq!(
            verifier.nary_operation(insn_ref(&invoke), &[Reference, Int, Float, Int, Int]),
            Err(AnalysisErrorKind::mismatch(
                Some("Argument 2"),
                &Reference,
                &Float
            ))
        );
    }

    #[test]
    fn return_types() {
        let verifier = BasicVerifier;
        let ret = BranchInstruction::IReturn;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Branch(&ret),
        };
        assert!(verifier
            .return_operation(insn, &BasicValue::Int, &BasicValue::Int)
            .is_ok());
        assert_eq!(
            verifier.return_operation(insn, &BasicValue::Long, &BasicValue::Int),
            Err(AnalysisErrorKind::mismatch(
                Some("Incompatible return type"),
                &BasicValue::Int,
                &BasicValue::Long
            ))
        );
    }
}
