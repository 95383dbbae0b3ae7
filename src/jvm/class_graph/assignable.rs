use super::Unresolved;
use crate::jvm::{BinaryName, RefType};
use std::cmp::Ordering;

/// Read-only view of the class hierarchy
///
/// Implementations must be safe to query from several analyses at once: queries only need a
/// shared reference. Any query can fail with [`Unresolved`] when the hierarchy has no information
/// about a class (which is not a bug, since the class may be defined outside of what was loaded).
pub trait TypeHierarchy {
    fn is_interface(&self, class: &BinaryName) -> Result<bool, Unresolved>;

    /// Superclass of a class (`None` only for `java/lang/Object`)
    ///
    /// Interfaces report `java/lang/Object` as their superclass.
    fn superclass(&self, class: &BinaryName) -> Result<Option<BinaryName>, Unresolved>;

    /// Is the first class the same as, a subclass of, or an implementor of the second?
    fn is_subclass(
        &self,
        sub_type: &BinaryName,
        super_type: &BinaryName,
    ) -> Result<bool, Unresolved>;

    /// Query if one type is assignable to another
    ///
    /// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)`
    /// in the JVM verifier specification.
    fn is_assignable(
        &self,
        sub_type: &RefType<BinaryName>,
        super_type: &RefType<BinaryName>,
    ) -> Result<bool, Unresolved> {
        match (sub_type, super_type) {
            // Special superclass and interfaces of all arrays
            (
                RefType::PrimitiveArray(_) | RefType::ObjectArray(_),
                RefType::Object(object_type),
            ) => Ok(is_array_type_assignable(object_type)),

            // Primitive arrays must match in dimension and type
            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => Ok(arr1 == arr2),

            // Higher dimensional primitive arrays can be subtypes of object arrays
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less | Ordering::Equal => Ok(false),
                    Ordering::Greater => Ok(is_array_type_assignable(&arr2.element_type)),
                }
            }

            // Cursed (unsound) covariance of arrays
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less => Ok(false),
                    Ordering::Equal => self.is_subclass(&arr1.element_type, &arr2.element_type),
                    Ordering::Greater => Ok(is_array_type_assignable(&arr2.element_type)),
                }
            }

            // Object-to-object assignability holds if there is a path through super type edges
            (RefType::Object(cls1), RefType::Object(cls2)) => self.is_subclass(cls1, cls2),

            _ => Ok(false),
        }
    }

    /// Closest common superclass of two classes
    ///
    /// Interfaces don't have a meaningful common superclass, so `java/lang/Object` is used
    /// whenever either side is an interface.
    fn common_superclass(
        &self,
        class1: &BinaryName,
        class2: &BinaryName,
    ) -> Result<BinaryName, Unresolved> {
        if self.is_subclass(class2, class1)? {
            return Ok(class1.clone());
        }
        if self.is_subclass(class1, class2)? {
            return Ok(class2.clone());
        }
        if self.is_interface(class1)? || self.is_interface(class2)? {
            return Ok(BinaryName::OBJECT);
        }
        let mut candidate = class1.clone();
        loop {
            match self.superclass(&candidate)? {
                None => return Ok(BinaryName::OBJECT),
                Some(superclass) => candidate = superclass,
            }
            if self.is_subclass(class2, &candidate)? {
                return Ok(candidate);
            }
        }
    }
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}
