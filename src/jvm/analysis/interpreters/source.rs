use crate::jvm::analysis::{Insn, InsnRef, Interpreter};
use crate::jvm::code::{Constant, Instruction};
use crate::jvm::{AnalysisErrorKind, BinaryName, FieldType};
use crate::util::Width;
use std::collections::BTreeSet;
use std::fmt;

/// Which instructions may have produced a value
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceValue {
    /// Number of slots the value occupies
    pub size: usize,

    /// Indices of the instructions that may have produced the value (empty for parameters, the
    /// exception of a handler, and unset locals)
    pub insns: BTreeSet<usize>,
}

impl SourceValue {
    fn new(size: usize) -> SourceValue {
        SourceValue {
            size,
            insns: BTreeSet::new(),
        }
    }

    fn produced_by(size: usize, index: usize) -> SourceValue {
        SourceValue {
            size,
            insns: BTreeSet::from([index]),
        }
    }
}

impl Width for SourceValue {
    fn width(&self) -> usize {
        self.size
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, index) in self.insns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", index)?;
        }
        f.write_str("}")
    }
}

/// Interpreter tracking where values come from instead of what they are
///
/// Nothing is checked, so this accepts any method with consistent stack heights.
#[derive(Copy, Clone, Debug, Default)]
pub struct SourceInterpreter;

fn size_of(field_type: &FieldType<BinaryName>) -> usize {
    field_type.width()
}

impl Interpreter for SourceInterpreter {
    type Value = SourceValue;

    fn new_value(&self, field_type: Option<&FieldType<BinaryName>>) -> SourceValue {
        SourceValue::new(field_type.map_or(1, size_of))
    }

    fn new_operation(&self, insn: InsnRef<'_>) -> Result<SourceValue, AnalysisErrorKind> {
        let size = match insn.insn {
            Insn::Instruction(Instruction::LConst0 | Instruction::LConst1)
            | Insn::Instruction(Instruction::DConst0 | Instruction::DConst1) => 2,
            Insn::Instruction(Instruction::Ldc(constant) | Instruction::Ldc2(constant)) => {
                match constant {
                    Constant::Long(_) | Constant::Double(_) => 2,
                    _ => 1,
                }
            }
            Insn::Instruction(Instruction::GetStatic(field)) => size_of(&field.descriptor),
            _ => 1,
        };
        Ok(SourceValue::produced_by(size, insn.index))
    }

    fn copy_operation(
        &self,
        insn: InsnRef<'_>,
        value: &SourceValue,
    ) -> Result<SourceValue, AnalysisErrorKind> {
        Ok(SourceValue::produced_by(value.size, insn.index))
    }

    fn unary_operation(
        &self,
        insn: InsnRef<'_>,
        _value: &SourceValue,
    ) -> Result<Option<SourceValue>, AnalysisErrorKind> {
        use Instruction::*;

        let size = match insn.insn {
            Insn::Instruction(LNeg | DNeg | I2L | I2D | L2D | F2L | F2D | D2L) => 2,
            Insn::Instruction(GetField(field)) => size_of(&field.descriptor),
            _ => 1,
        };
        Ok(Some(SourceValue::produced_by(size, insn.index)))
    }

    fn binary_operation(
        &self,
        insn: InsnRef<'_>,
        _value1: &SourceValue,
        _value2: &SourceValue,
    ) -> Result<Option<SourceValue>, AnalysisErrorKind> {
        use Instruction::*;

        let size = match insn.insn {
            Insn::Instruction(
                LALoad | DALoad | LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv | DDiv | LRem
                | DRem | LSh(_) | LAnd | LOr | LXor,
            ) => 2,
            _ => 1,
        };
        Ok(Some(SourceValue::produced_by(size, insn.index)))
    }

    fn ternary_operation(
        &self,
        insn: InsnRef<'_>,
        _value1: &SourceValue,
        _value2: &SourceValue,
        _value3: &SourceValue,
    ) -> Result<Option<SourceValue>, AnalysisErrorKind> {
        Ok(Some(SourceValue::produced_by(1, insn.index)))
    }

    fn nary_operation(
        &self,
        insn: InsnRef<'_>,
        _values: &[SourceValue],
    ) -> Result<Option<SourceValue>, AnalysisErrorKind> {
        let return_type = match insn.insn {
            Insn::Instruction(Instruction::Invoke(_, method)) => {
                method.descriptor.return_type.as_ref()
            }
            Insn::Instruction(Instruction::InvokeDynamic(call_site)) => {
                call_site.descriptor.return_type.as_ref()
            }
            _ => return Ok(Some(SourceValue::produced_by(1, insn.index))),
        };
        Ok(return_type.map(|return_type| SourceValue::produced_by(size_of(return_type), insn.index)))
    }

    fn return_operation(
        &self,
        _insn: InsnRef<'_>,
        _value: &SourceValue,
        _expected: &SourceValue,
    ) -> Result<(), AnalysisErrorKind> {
        Ok(())
    }

    fn merge(
        &self,
        value1: &SourceValue,
        value2: &SourceValue,
    ) -> Result<SourceValue, AnalysisErrorKind> {
        if value1.size == value2.size && value1.insns.is_superset(&value2.insns) {
            return Ok(value1.clone());
        }
        Ok(SourceValue {
            size: value1.size.min(value2.size),
            insns: value1.insns.union(&value2.insns).copied().collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn source(size: usize, insns: &[usize]) -> SourceValue {
        SourceValue {
            size,
            insns: insns.iter().copied().collect(),
        }
    }

    #[test]
    fn operations_record_the_instruction() {
        let interpreter = SourceInterpreter;
        let insn = Instruction::L2D;
        let insn_ref = InsnRef {
            index: 7,
            insn: Insn::Instruction(&insn),
        };
        assert_eq!(
            interpreter.unary_operation(insn_ref, &source(2, &[1])),
            Ok(Some(source(2, &[7])))
        );

        let insn = Instruction::ILoad(0);
        let insn_ref = InsnRef {
            index: 3,
            insn: Insn::Instruction(&insn),
        };
        assert_eq!(
            interpreter.copy_operation(insn_ref, &source(1, &[])),
            Ok(source(1, &[3]))
        );
    }

    #[test]
    fn merging() {
        let interpreter = SourceInterpreter;
        assert_eq!(
            interpreter.merge(&source(1, &[2, 4]), &source(1, &[4])),
            Ok(source(1, &[2, 4]))
        );
        assert_eq!(
            interpreter.merge(&source(1, &[2]), &source(1, &[5])),
            Ok(source(1, &[2, 5]))
        );
        assert_eq!(
            interpreter.merge(&source(2, &[2]), &source(1, &[2])),
            Ok(source(1, &[2]))
        );

        let merged = interpreter.merge(&source(1, &[2]), &source(1, &[5])).unwrap();
        assert_eq!(interpreter.merge(&merged, &source(1, &[5])), Ok(merged));
    }
}
