use super::{AnalysisErrorKind, BinaryName};
use elsa::sync::FrozenMap;
use std::fmt;

mod assignable;

pub use assignable::*;

/// Tracks the relationships between classes and interfaces
///
/// The graph is append-only: classes can be added through a shared reference but never removed or
/// modified. This makes it safe to share one graph across threads analyzing different methods,
/// including while new classes are being added.
pub struct ClassGraph {
    classes: FrozenMap<BinaryName, Box<ClassData>>,
}

/// What the class graph knows about a class or interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassData {
    pub name: BinaryName,

    /// Superclass (only `java/lang/Object` has none)
    pub superclass: Option<BinaryName>,

    /// Direct superinterfaces
    pub interfaces: Vec<BinaryName>,

    pub is_interface: bool,
}

impl ClassData {
    pub fn new(name: BinaryName, superclass: Option<BinaryName>, is_interface: bool) -> ClassData {
        ClassData {
            name,
            superclass,
            interfaces: vec![],
            is_interface,
        }
    }

    pub fn add_interface(mut self, interface: BinaryName) -> ClassData {
        self.interfaces.push(interface);
        self
    }
}

impl ClassGraph {
    /// New empty graph
    pub fn new() -> ClassGraph {
        ClassGraph {
            classes: FrozenMap::new(),
        }
    }

    /// Add a new class to the class graph
    ///
    /// If a class with the same name is already in the graph, the existing entry is kept and
    /// returned.
    pub fn add_class(&self, data: ClassData) -> &ClassData {
        let name = data.name.clone();
        self.classes.insert(name, Box::new(data))
    }

    pub fn lookup_class(&self, name: &BinaryName) -> Option<&ClassData> {
        self.classes.get(name)
    }

    fn resolve(&self, name: &BinaryName) -> Result<&ClassData, Unresolved> {
        self.lookup_class(name)
            .ok_or_else(|| Unresolved(name.clone()))
    }

    /// Add standard types to the class graph
    pub fn insert_java_library_types(&self) {
        let object = Some(BinaryName::OBJECT);
        let class = |name: BinaryName, superclass: &Option<BinaryName>| {
            ClassData::new(name, superclass.clone(), false)
        };
        let interface = |name: BinaryName| ClassData::new(name, Some(BinaryName::OBJECT), true);

        // Interfaces
        self.add_class(interface(BinaryName::CHARSEQUENCE));
        self.add_class(interface(BinaryName::CLONEABLE));
        self.add_class(interface(BinaryName::COMPARABLE));
        self.add_class(interface(BinaryName::SERIALIZABLE));

        // Classes in `java.lang`
        self.add_class(class(BinaryName::OBJECT, &None));
        self.add_class(
            class(BinaryName::STRING, &object)
                .add_interface(BinaryName::CHARSEQUENCE)
                .add_interface(BinaryName::COMPARABLE)
                .add_interface(BinaryName::SERIALIZABLE),
        );
        self.add_class(class(BinaryName::CLASS, &object).add_interface(BinaryName::SERIALIZABLE));
        self.add_class(class(BinaryName::NUMBER, &object).add_interface(BinaryName::SERIALIZABLE));
        let number = Some(BinaryName::NUMBER);
        for boxed in [
            BinaryName::INTEGER,
            BinaryName::LONG,
            BinaryName::FLOAT,
            BinaryName::DOUBLE,
        ] {
            self.add_class(class(boxed, &number).add_interface(BinaryName::COMPARABLE));
        }

        // Exceptions
        self.add_class(
            class(BinaryName::THROWABLE, &object).add_interface(BinaryName::SERIALIZABLE),
        );
        let throwable = Some(BinaryName::THROWABLE);
        self.add_class(class(BinaryName::ERROR, &throwable));
        self.add_class(class(BinaryName::EXCEPTION, &throwable));
        self.add_class(class(
            BinaryName::RUNTIMEEXCEPTION,
            &Some(BinaryName::EXCEPTION),
        ));
        self.add_class(class(
            BinaryName::ARITHMETICEXCEPTION,
            &Some(BinaryName::RUNTIMEEXCEPTION),
        ));

        // Classes in `java.lang.invoke`
        self.add_class(class(BinaryName::METHODHANDLE, &object));
        self.add_class(
            class(BinaryName::METHODTYPE, &object).add_interface(BinaryName::SERIALIZABLE),
        );
    }
}

impl Default for ClassGraph {
    fn default() -> ClassGraph {
        ClassGraph::new()
    }
}

impl fmt::Debug for ClassGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassGraph").finish_non_exhaustive()
    }
}

/// The type hierarchy has no information about a class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved(pub BinaryName);

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot resolve class {}", self.0)
    }
}

impl std::error::Error for Unresolved {}

impl From<Unresolved> for AnalysisErrorKind {
    fn from(unresolved: Unresolved) -> AnalysisErrorKind {
        AnalysisErrorKind::UnresolvedClass(unresolved.0)
    }
}

impl TypeHierarchy for ClassGraph {
    fn is_interface(&self, class: &BinaryName) -> Result<bool, Unresolved> {
        self.resolve(class).map(|data| data.is_interface)
    }

    fn superclass(&self, class: &BinaryName) -> Result<Option<BinaryName>, Unresolved> {
        self.resolve(class).map(|data| data.superclass.clone())
    }

    /// This does a search up the superclasses and superinterfaces looking for the super type.
    fn is_subclass(
        &self,
        sub_type: &BinaryName,
        super_type: &BinaryName,
    ) -> Result<bool, Unresolved> {
        if sub_type == super_type {
            return Ok(true);
        }

        let mut supertypes_to_visit: Vec<&ClassData> = vec![self.resolve(sub_type)?];
        let mut dont_revisit: Vec<&BinaryName> = vec![sub_type];

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !self.is_interface(super_type)?;

        while let Some(class_data) = supertypes_to_visit.pop() {
            if &class_data.name == super_type {
                return Ok(true);
            }

            // Enqueue next types to visit
            let interfaces = if super_is_class {
                &[][..]
            } else {
                &class_data.interfaces[..]
            };
            for next in class_data.superclass.iter().chain(interfaces) {
                if !dont_revisit.contains(&next) {
                    dont_revisit.push(next);
                    supertypes_to_visit.push(self.resolve(next)?);
                }
            }
        }

        Ok(false)
    }
}
