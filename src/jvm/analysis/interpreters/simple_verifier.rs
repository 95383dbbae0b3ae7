use super::basic::{self, ValueTypes};
use super::basic_verifier::{
    check_binary, check_copy, check_nary, check_return, check_ternary, check_unary,
    VerifiedValues,
};
use crate::jvm::analysis::{InsnRef, Interpreter};
use crate::jvm::class_graph::TypeHierarchy;
use crate::jvm::{AnalysisErrorKind, BaseType, BinaryName, FieldType, RefType, RenderDescriptor};
use crate::util::Width;
use std::collections::HashSet;
use std::fmt;

/// Type of a value, as precise as the JVM verifier tracks it
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VerificationType {
    /// Unusable value (unset local, second slot of a wide value, or a merge of incompatible types)
    Top,
    Integer,
    Float,
    Long,
    Double,

    /// Type of `aconst_null`, a subtype of every reference type
    Null,
    ReturnAddress,
    Object(RefType<BinaryName>),
}

impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Long | VerificationType::Double => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("."),
            VerificationType::Integer => f.write_str("I"),
            VerificationType::Float => f.write_str("F"),
            VerificationType::Long => f.write_str("J"),
            VerificationType::Double => f.write_str("D"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::ReturnAddress => f.write_str("A"),
            VerificationType::Object(ref_type) => f.write_str(&ref_type.render()),
        }
    }
}

/// Verifier checking operands against their declared types, using a type hierarchy to decide
/// assignability and to merge reference types
///
/// Classes the hierarchy cannot resolve make the analysis fail with
/// [`AnalysisErrorKind::UnresolvedClass`].
pub struct SimpleVerifier<'h, H: ?Sized> {
    hierarchy: &'h H,
}

impl<'h, H: TypeHierarchy + ?Sized> SimpleVerifier<'h, H> {
    pub fn new(hierarchy: &'h H) -> SimpleVerifier<'h, H> {
        SimpleVerifier { hierarchy }
    }

    /// Can a value of the second type be stored in a location of the first?
    fn is_assignable_from(
        &self,
        expected: &RefType<BinaryName>,
        value: &RefType<BinaryName>,
    ) -> Result<bool, AnalysisErrorKind> {
        Ok(expected == value || self.hierarchy.is_assignable(value, expected)?)
    }

    /// Closest common supertype of two unrelated reference types
    ///
    /// Arrays of objects with the same number of dimensions merge element-wise. Everything else
    /// walks up the superclasses of the first type until one is found that the second type is
    /// assignable to.
    fn merge_references(
        &self,
        ref1: &RefType<BinaryName>,
        ref2: &RefType<BinaryName>,
    ) -> Result<RefType<BinaryName>, AnalysisErrorKind> {
        let (dimensions, mut candidate, other) = match (ref1, ref2) {
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
                if arr1.additional_dimensions == arr2.additional_dimensions =>
            {
                (
                    arr1.dimensions(),
                    RefType::Object(arr1.element_type.clone()),
                    RefType::Object(arr2.element_type.clone()),
                )
            }
            _ => (0, ref1.clone(), ref2.clone()),
        };

        // Cyclic hierarchies end at `java/lang/Object`
        let mut visited = HashSet::new();
        loop {
            let superclass = match &candidate {
                RefType::Object(class) => {
                    if !visited.insert(class.clone()) || self.hierarchy.is_interface(class)? {
                        None
                    } else {
                        self.hierarchy.superclass(class)?
                    }
                }
                _ => Some(BinaryName::OBJECT),
            };
            let superclass = match superclass {
                Some(superclass) => superclass,
                None => return Ok(RefType::object_array(dimensions, BinaryName::OBJECT)),
            };
            candidate = RefType::Object(superclass.clone());
            if self.is_assignable_from(&candidate, &other)? {
                return Ok(RefType::object_array(dimensions, superclass));
            }
        }
    }
}

impl<'h, H: TypeHierarchy + ?Sized> ValueTypes for SimpleVerifier<'h, H> {
    type Value = VerificationType;

    fn typed_value(&self, field_type: Option<&FieldType<BinaryName>>) -> VerificationType {
        match field_type {
            None => VerificationType::Top,
            Some(FieldType::Base(base_type)) => match base_type {
                BaseType::Float => VerificationType::Float,
                BaseType::Long => VerificationType::Long,
                BaseType::Double => VerificationType::Double,
                BaseType::Int
                | BaseType::Char
                | BaseType::Short
                | BaseType::Byte
                | BaseType::Boolean => VerificationType::Integer,
            },
            Some(FieldType::Ref(ref_type)) => VerificationType::Object(ref_type.clone()),
        }
    }

    fn null_value(&self) -> VerificationType {
        VerificationType::Null
    }

    fn return_address_value(&self) -> VerificationType {
        VerificationType::ReturnAddress
    }

    fn element_value(
        &self,
        array: &VerificationType,
    ) -> Result<VerificationType, AnalysisErrorKind> {
        match array {
            VerificationType::Null => return Ok(VerificationType::Null),
            VerificationType::Object(ref_type) => {
                if let Some(element_type) = ref_type.array_element_type() {
                    return Ok(self.typed_value(Some(&element_type)));
                }
            }
            _ => (),
        }
        Err(AnalysisErrorKind::Mismatch {
            context: Some(String::from("First argument")),
            expected: String::from("an array reference"),
            found: array.to_string(),
        })
    }
}

impl<'h, H: TypeHierarchy + ?Sized> VerifiedValues for SimpleVerifier<'h, H> {
    fn is_reference(&self, value: &VerificationType) -> bool {
        matches!(value, VerificationType::Null | VerificationType::Object(_))
    }

    fn is_return_address(&self, value: &VerificationType) -> bool {
        *value == VerificationType::ReturnAddress
    }

    fn is_array_value(&self, value: &VerificationType) -> bool {
        match value {
            VerificationType::Null => true,
            VerificationType::Object(ref_type) => ref_type.is_array(),
            _ => false,
        }
    }

    fn is_reference_array(&self, value: &VerificationType) -> bool {
        match value {
            VerificationType::Null => true,
            VerificationType::Object(ref_type) => {
                matches!(ref_type.array_element_type(), Some(FieldType::Ref(_)))
            }
            _ => false,
        }
    }

    fn is_subtype_of(
        &self,
        value: &VerificationType,
        expected: &VerificationType,
    ) -> Result<bool, AnalysisErrorKind> {
        if value == expected {
            return Ok(true);
        }
        match (value, expected) {
            (VerificationType::Null, VerificationType::Object(_)) => Ok(true),
            (VerificationType::Object(value), VerificationType::Object(expected)) => {
                if self.is_assignable_from(expected, value)? {
                    return Ok(true);
                }

                // Interfaces are checked at runtime
                match expected {
                    RefType::Object(class) => Ok(self.hierarchy.is_interface(class)?),
                    _ => Ok(false),
                }
            }
            _ => Ok(false),
        }
    }

    fn stored_element(
        &self,
        array: &VerificationType,
    ) -> Result<Option<VerificationType>, AnalysisErrorKind> {
        match array {
            // Storing into `null` throws before anything is stored
            VerificationType::Null => Ok(None),
            _ => self.element_value(array).map(Some),
        }
    }
}

impl<'h, H: TypeHierarchy + ?Sized> Interpreter for SimpleVerifier<'h, H> {
    type Value = VerificationType;

    fn new_value(&self, field_type: Option<&FieldType<BinaryName>>) -> VerificationType {
        self.typed_value(field_type)
    }

    fn new_operation(&self, insn: InsnRef<'_>) -> Result<VerificationType, AnalysisErrorKind> {
        basic::new_operation(self, insn)
    }

    fn copy_operation(
        &self,
        insn: InsnRef<'_>,
        value: &VerificationType,
    ) -> Result<VerificationType, AnalysisErrorKind> {
        check_copy(self, insn, value)?;
        Ok(value.clone())
    }

    fn unary_operation(
        &self,
        insn: InsnRef<'_>,
        value: &VerificationType,
    ) -> Result<Option<VerificationType>, AnalysisErrorKind> {
        check_unary(self, insn, value)?;
        basic::unary_operation(self, insn, value)
    }

    fn binary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &VerificationType,
        value2: &VerificationType,
    ) -> Result<Option<VerificationType>, AnalysisErrorKind> {
        check_binary(self, insn, value1, value2)?;
        basic::binary_operation(self, insn, value1, value2)
    }

    fn ternary_operation(
        &self,
        insn: InsnRef<'_>,
        value1: &VerificationType,
        value2: &VerificationType,
        value3: &VerificationType,
    ) -> Result<Option<VerificationType>, AnalysisErrorKind> {
        check_ternary(self, insn, value1, value2, value3)?;
        basic::ternary_operation(insn)
    }

    fn nary_operation(
        &self,
        insn: InsnRef<'_>,
        values: &[VerificationType],
    ) -> Result<Option<VerificationType>, AnalysisErrorKind> {
        check_nary(self, insn, values)?;
        basic::nary_operation(self, insn)
    }

    fn return_operation(
        &self,
        insn: InsnRef<'_>,
        value: &VerificationType,
        expected: &VerificationType,
    ) -> Result<(), AnalysisErrorKind> {
        check_return(self, insn, value, expected)
    }

    fn merge(
        &self,
        value1: &VerificationType,
        value2: &VerificationType,
    ) -> Result<VerificationType, AnalysisErrorKind> {
        if value1 == value2 {
            return Ok(value1.clone());
        }
        let (ref1, ref2) = match (value1, value2) {
            (VerificationType::Null, VerificationType::Object(_)) => return Ok(value2.clone()),
            (VerificationType::Object(_), VerificationType::Null) => return Ok(value1.clone()),
            (VerificationType::Object(ref1), VerificationType::Object(ref2)) => (ref1, ref2),
            _ => return Ok(VerificationType::Top),
        };

        if self.is_assignable_from(ref1, ref2)? {
            Ok(value1.clone())
        } else if self.is_assignable_from(ref2, ref1)? {
            Ok(value2.clone())
        } else {
            Ok(VerificationType::Object(self.merge_references(ref1, ref2)?))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::analysis::Insn;
    use crate::jvm::class_graph::{ClassData, ClassGraph};
    use crate::jvm::code::{Instruction, InvokeType, MethodRef};
    use crate::jvm::{MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

    fn object(class: BinaryName) -> VerificationType {
        VerificationType::Object(RefType::Object(class))
    }

    fn parse(descriptor: &str) -> VerificationType {
        VerificationType::Object(RefType::parse(descriptor).unwrap())
    }

    fn shapes() -> (ClassGraph, BinaryName, BinaryName, BinaryName) {
        let class_graph = ClassGraph::new();
        class_graph.insert_java_library_types();
        let shape = BinaryName::from_str("Shape").unwrap();
        let square = BinaryName::from_str("Square").unwrap();
        let circle = BinaryName::from_str("Circle").unwrap();
        class_graph.add_class(ClassData::new(shape.clone(), Some(BinaryName::OBJECT), false));
        class_graph.add_class(ClassData::new(square.clone(), Some(shape.clone()), false));
        class_graph.add_class(ClassData::new(circle.clone(), Some(shape.clone()), false));
        (class_graph, shape, square, circle)
    }

    #[test]
    fn merging_references() {
        let (class_graph, shape, square, circle) = shapes();
        let verifier = SimpleVerifier::new(&class_graph);

        let cases = vec![
            (object(square.clone()), object(circle.clone()), object(shape.clone())),
            (object(square.clone()), object(shape.clone()), object(shape.clone())),
            (VerificationType::Null, object(circle.clone()), object(circle.clone())),
            (parse("[LSquare;"), parse("[LCircle;"), parse("[LShape;")),
            (parse("[[LSquare;"), parse("[LCircle;"), object(BinaryName::OBJECT)),
            (parse("[I"), parse("[J"), object(BinaryName::OBJECT)),
            (object(BinaryName::STRING), object(BinaryName::CHARSEQUENCE), object(BinaryName::CHARSEQUENCE)),
            (object(BinaryName::INTEGER), object(BinaryName::LONG), object(BinaryName::NUMBER)),
            (VerificationType::Integer, VerificationType::Float, VerificationType::Top),
            (object(square), VerificationType::Integer, VerificationType::Top),
        ];
        for (value1, value2, expected) in cases {
            assert_eq!(
                verifier.merge(&value1, &value2),
                Ok(expected.clone()),
                "merging {} and {}",
                value1,
                value2
            );
            assert_eq!(
                verifier.merge(&value2, &value1),
                Ok(expected),
                "merging {} and {}",
                value2,
                value1
            );
        }
    }

    #[test]
    fn subtypes() {
        let (class_graph, shape, square, _) = shapes();
        let verifier = SimpleVerifier::new(&class_graph);

        assert_eq!(verifier.is_subtype_of(&object(square.clone()), &object(shape.clone())), Ok(true));
        assert_eq!(verifier.is_subtype_of(&object(shape), &object(square.clone())), Ok(false));
        assert_eq!(verifier.is_subtype_of(&VerificationType::Null, &parse("[I")), Ok(true));
        assert_eq!(
            verifier.is_subtype_of(&object(square), &object(BinaryName::COMPARABLE)),
            Ok(true),
            "interfaces are not checked statically"
        );
        assert_eq!(
            verifier.is_subtype_of(&VerificationType::Integer, &VerificationType::Float),
            Ok(false)
        );
    }

    #[test]
    fn unresolved_classes() {
        let (class_graph, shape, _, _) = shapes();
        let verifier = SimpleVerifier::new(&class_graph);
        let missing = BinaryName::from_str("Missing").unwrap();

        assert_eq!(
            verifier.merge(&object(shape), &object(missing.clone())),
            Err(AnalysisErrorKind::UnresolvedClass(missing))
        );
    }

    #[test]
    fn array_stores() {
        let (class_graph, shape, square, circle) = shapes();
        let verifier = SimpleVerifier::new(&class_graph);
        let aastore = Instruction::AAStore;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Instruction(&aastore),
        };
        let int = VerificationType::Integer;

        let accepted = vec![
            (parse("[LShape;"), object(square.clone())),
            (parse("[LShape;"), VerificationType::Null),
            (parse("[[I"), parse("[I")),
            (VerificationType::Null, object(circle.clone())),
            (parse("[Ljava/lang/Comparable;"), object(BinaryName::STRING)),
        ];
        for (array, value) in accepted {
            assert_eq!(
                verifier.ternary_operation(insn, &array, &int, &value),
                Ok(None),
                "storing {} into {}",
                value,
                array
            );
        }

        assert_eq!(
            verifier.ternary_operation(insn, &parse("[LSquare;"), &int, &object(circle.clone())),
            Err(AnalysisErrorKind::mismatch(
                Some("Third argument"),
                &object(square),
                &object(circle)
            ))
        );
        assert_eq!(
            verifier.ternary_operation(
                insn,
                &parse("[Ljava/lang/String;"),
                &int,
                &object(BinaryName::INTEGER)
            ),
            Err(AnalysisErrorKind::mismatch(
                Some("Third argument"),
                &object(BinaryName::STRING),
                &object(BinaryName::INTEGER)
            ))
        );
        assert_eq!(
            verifier.ternary_operation(insn, &parse("[I"), &int, &object(shape)),
            Err(AnalysisErrorKind::Mismatch {
                context: Some(String::from("First argument")),
                expected: String::from("an array of references"),
                found: String::from("[I"),
            })
        );
    }

    #[test]
    fn mismatches_render_descriptors() {
        let class_graph = ClassGraph::new();
        class_graph.insert_java_library_types();
        let verifier = SimpleVerifier::new(&class_graph);
        let ret = crate::jvm::code::BranchInstruction::AReturn;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Branch(&ret),
        };

        let error = verifier
            .return_operation(insn, &parse("[Ljava/lang/Object;"), &parse("[Ljava/lang/String;"))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Incompatible return type: expected [Ljava/lang/String;, but found [Ljava/lang/Object;"
        );
    }

    #[test]
    fn array_elements() {
        let class_graph = ClassGraph::new();
        class_graph.insert_java_library_types();
        let verifier = SimpleVerifier::new(&class_graph);
        let aaload = Instruction::AALoad;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Instruction(&aaload),
        };

        assert_eq!(
            verifier.binary_operation(insn, &parse("[[Ljava/lang/String;"), &VerificationType::Integer),
            Ok(Some(parse("[Ljava/lang/String;")))
        );
        assert_eq!(
            verifier.binary_operation(insn, &VerificationType::Null, &VerificationType::Integer),
            Ok(Some(VerificationType::Null))
        );
        assert!(verifier
            .binary_operation(insn, &parse("[I"), &VerificationType::Integer)
            .is_err());
    }

    #[test]
    fn invocation_receivers() {
        let class_graph = ClassGraph::new();
        class_graph.insert_java_library_types();
        let verifier = SimpleVerifier::new(&class_graph);
        let length = Instruction::Invoke(
            InvokeType::Interface,
            MethodRef {
                class: BinaryName::CHARSEQUENCE,
                name: UnqualifiedName::from_str("length").unwrap(),
                descriptor: MethodDescriptor::parse("()I").unwrap(),
                is_interface: true,
            },
        );
        let insn = InsnRef {
            index: 0,
            insn: Insn::Instruction(&length),
        };

        assert_eq!(
            verifier.nary_operation(insn, &[object(BinaryName::STRING)]),
            Ok(Some(VerificationType::Integer))
        );
        assert_eq!(
            verifier.nary_operation(insn, &[VerificationType::Integer]),
            Err(AnalysisErrorKind::mismatch(
                Some("Method owner"),
                &object(BinaryName::CHARSEQUENCE),
                &VerificationType::Integer
            ))
        );
    }
}
