use crate::machine::MachineType;

/// The name of a class as it appears in assembly text, for example
/// `[.library]System.Console` or `Outer/Inner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassName {
    /// The assembly the class is imported from, if it is not defined by the program.
    pub scope: Option<String>,

    /// The namespace of the class, if any. Nested classes never have one, they take
    /// the namespace of their outermost enclosing class.
    pub namespace: Option<String>,

    /// The simple name of the class.
    pub name: String,

    /// The enclosing class of a nested class.
    pub nested_in: Option<Box<ClassName>>,
}

impl ClassName {
    /// Create the name of a class defined by the program being compiled.
    #[must_use]
    pub fn local(namespace: Option<&str>, name: &str) -> Self {
        Self {
            scope: None,
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
            nested_in: None,
        }
    }

    /// Create the name of a class imported from the given assembly.
    #[must_use]
    pub fn imported(scope: &str, namespace: &str, name: &str) -> Self {
        Self {
            scope: Some(scope.to_owned()),
            namespace: Some(namespace.to_owned()),
            name: name.to_owned(),
            nested_in: None,
        }
    }

    /// Create the name of a system class living in the builtin library.
    #[must_use]
    pub fn system(name: &str) -> Self {
        Self::imported(crate::LIBRARY_SCOPE, "System", name)
    }

    /// Create the name of a class nested inside `parent`.
    #[must_use]
    pub fn nested(parent: ClassName, name: &str) -> Self {
        Self {
            scope: None,
            namespace: None,
            name: name.to_owned(),
            nested_in: Some(Box::new(parent)),
        }
    }

    /// Check if this is the given top-level class of the `System` namespace.
    #[must_use]
    pub fn is_system(&self, name: &str) -> bool {
        self.nested_in.is_none() && self.namespace.as_deref() == Some("System") && self.name == name
    }
}

impl std::fmt::Display for ClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.nested_in {
            Some(parent) => write!(f, "{parent}/{}", quote_identifier(&self.name)),
            None => {
                if let Some(scope) = &self.scope {
                    write!(f, "[{scope}]")?;
                }
                match &self.namespace {
                    Some(namespace) => write!(
                        f,
                        "{}.{}",
                        quote_identifier(namespace),
                        quote_identifier(&self.name)
                    ),
                    None => write!(f, "{}", quote_identifier(&self.name)),
                }
            }
        }
    }
}

/// The IL types the backend knows how to render and to map onto machine types. This is
/// the already-checked type of an AST node: the code generator never infers types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Boolean,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    NativeInt,
    NativeUInt,
    Float32,
    Float64,
    NativeFloat,
    String,
    Object,
    TypedRef,

    /// A reference type.
    Class(ClassName),

    /// A value type.
    ValueType(ClassName),

    /// An enumerated type, which behaves like its underlying integer type.
    Enum(ClassName, Box<Type>),

    /// An array type. The second element is the rank of the array, `1` for vectors.
    Array(Box<Type>, u32),

    /// A managed pointer (`T&`), as used by `ref` and `out` parameters.
    ByRef(Box<Type>),

    /// An unmanaged pointer (`T*`).
    Pointer(Box<Type>),

    /// A type that failed semantic analysis. Treated like `void`.
    Invalid,
}

impl Type {
    /// Create a vector type (single dimension, zero based) of the given element type.
    #[must_use]
    pub fn vector(element: Type) -> Self {
        Type::Array(Box::new(element), 1)
    }

    /// Check if the type is one of the primitive element types.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Type::Class(_)
                | Type::ValueType(_)
                | Type::Enum(..)
                | Type::Array(..)
                | Type::ByRef(_)
                | Type::Pointer(_)
                | Type::Invalid
        )
    }

    /// Get the class form of a primitive type, `System.Int32` for `int32` and so on.
    /// Array element types must use this form in `newarr` tokens.
    #[must_use]
    pub fn primitive_class(&self) -> Option<ClassName> {
        let name = match self {
            Type::Boolean => "Boolean",
            Type::Char => "Char",
            Type::Int8 => "SByte",
            Type::UInt8 => "Byte",
            Type::Int16 => "Int16",
            Type::UInt16 => "UInt16",
            Type::Int32 => "Int32",
            Type::UInt32 => "UInt32",
            Type::Int64 => "Int64",
            Type::UInt64 => "UInt64",
            Type::NativeInt => "IntPtr",
            Type::NativeUInt => "UIntPtr",
            Type::Float32 => "Single",
            Type::Float64 | Type::NativeFloat => "Double",
            Type::String => "String",
            Type::Object => "Object",
            Type::TypedRef => "TypedReference",
            _ => return None,
        };
        Some(ClassName::system(name))
    }

    /// Get the element type of an array, or `None` if the type is not an array.
    #[must_use]
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element, _) => Some(element),
            _ => None,
        }
    }

    /// Get the rank of an array type, or 0 if the type is not an array.
    #[must_use]
    pub fn rank(&self) -> u32 {
        match self {
            Type::Array(_, rank) => *rank,
            _ => 0,
        }
    }

    /// Get the innermost array of a jagged array type. For `int32[][,]` this is the
    /// `int32[,]` array, whose rank drives the parameter list of the array constructor.
    #[must_use]
    pub fn last_nested_array(&self) -> &Type {
        let mut ty = self;
        while let Some(element @ Type::Array(..)) = ty.element() {
            ty = element;
        }
        ty
    }

    /// Convert a type into the machine type that selects the load/store opcode family
    /// used to access values of that type.
    #[must_use]
    pub fn machine_type(&self) -> MachineType {
        match self {
            Type::Void | Type::Invalid => MachineType::Void,
            Type::Boolean => MachineType::Boolean,
            Type::Char => MachineType::Char,
            Type::Int8 => MachineType::Int8,
            Type::UInt8 => MachineType::UInt8,
            Type::Int16 => MachineType::Int16,
            Type::UInt16 => MachineType::UInt16,
            Type::Int32 => MachineType::Int32,
            Type::UInt32 => MachineType::UInt32,
            Type::Int64 => MachineType::Int64,
            Type::UInt64 => MachineType::UInt64,
            Type::NativeInt => MachineType::NativeInt,
            Type::NativeUInt => MachineType::NativeUInt,
            Type::Float32 => MachineType::Float32,
            Type::Float64 => MachineType::Float64,
            Type::NativeFloat => MachineType::NativeFloat,
            Type::TypedRef => MachineType::ManagedValue,
            Type::String => MachineType::String,
            Type::Object => MachineType::ObjectRef,
            Type::Enum(_, underlying) => underlying.machine_type(),
            Type::ValueType(class) if class.is_system("Decimal") => MachineType::Decimal,
            Type::ValueType(_) => MachineType::ManagedValue,
            Type::Class(class) if class.is_system("String") => MachineType::String,
            Type::Class(_) | Type::Array(..) => MachineType::ObjectRef,
            Type::Pointer(_) => MachineType::UnmanagedPtr,
            Type::ByRef(_) => MachineType::ManagedPtr,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void | Type::Invalid => write!(f, "void"),
            Type::Boolean => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Int8 => write!(f, "int8"),
            Type::UInt8 => write!(f, "unsigned int8"),
            Type::Int16 => write!(f, "int16"),
            Type::UInt16 => write!(f, "unsigned int16"),
            Type::Int32 => write!(f, "int32"),
            Type::UInt32 => write!(f, "unsigned int32"),
            Type::Int64 => write!(f, "int64"),
            Type::UInt64 => write!(f, "unsigned int64"),
            Type::NativeInt => write!(f, "native int"),
            Type::NativeUInt => write!(f, "native unsigned int"),
            Type::Float32 => write!(f, "float32"),
            Type::Float64 => write!(f, "float64"),
            Type::NativeFloat => write!(f, "native float"),
            Type::String => write!(f, "string"),
            Type::Object => write!(f, "object"),
            Type::TypedRef => write!(f, "typedref"),
            Type::Class(class) => write!(f, "class {class}"),
            Type::ValueType(class) | Type::Enum(class, _) => write!(f, "valuetype {class}"),
            Type::Array(element, rank) => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                write!(f, "{element}[{commas}]")
            }
            Type::ByRef(inner) => write!(f, "{inner}&"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
        }
    }
}

/// Quote an identifier for assembly output if it contains characters that the assembler
/// would not accept in a bare identifier, such as the angle brackets of `<Module>`.
#[must_use]
pub fn quote_identifier(name: &str) -> std::borrow::Cow<'_, str> {
    let bare = matches!(name, ".ctor" | ".cctor")
        || name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '@' | '`' | '?')
            });

    if bare {
        std::borrow::Cow::Borrowed(name)
    } else {
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        std::borrow::Cow::Owned(format!("'{escaped}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_types() {
        assert_eq!(Type::vector(Type::UInt8).to_string(), "unsigned int8[]");
        assert_eq!(Type::Array(Box::new(Type::Int32), 3).to_string(), "int32[,,]");
        assert_eq!(
            Type::Class(ClassName::system("Console")).to_string(),
            "class [.library]System.Console"
        );
        assert_eq!(Type::ByRef(Box::new(Type::Int64)).to_string(), "int64&");
    }

    #[test]
    fn render_nested_and_quoted_names() {
        let outer = ClassName::local(Some("Demo"), "Outer");
        assert_eq!(ClassName::nested(outer, "Inner").to_string(), "Demo.Outer/Inner");
        assert_eq!(ClassName::local(None, "<Module>").to_string(), "'<Module>'");
    }

    #[test]
    fn machine_types() {
        assert_eq!(Type::UInt8.machine_type(), MachineType::UInt8);
        assert_eq!(Type::Class(ClassName::system("String")).machine_type(), MachineType::String);
        assert_eq!(
            Type::ValueType(ClassName::system("Decimal")).machine_type(),
            MachineType::Decimal
        );
        assert_eq!(
            Type::Enum(ClassName::local(None, "Color"), Box::new(Type::Int16)).machine_type(),
            MachineType::Int16
        );
        assert_eq!(Type::vector(Type::Int32).machine_type(), MachineType::ObjectRef);
        assert_eq!(Type::Pointer(Box::new(Type::Void)).machine_type(), MachineType::UnmanagedPtr);
        assert_eq!(Type::Invalid.machine_type(), MachineType::Void);
    }

    #[test]
    fn primitive_classes() {
        assert_eq!(
            Type::UInt8.primitive_class().map(|c| c.to_string()).as_deref(),
            Some("[.library]System.Byte")
        );
        assert!(Type::Void.primitive_class().is_none());
        assert!(Type::vector(Type::Int32).primitive_class().is_none());
    }

    #[test]
    fn last_nested_array() {
        let inner = Type::Array(Box::new(Type::Int32), 2);
        let jagged = Type::vector(inner.clone());
        assert_eq!(jagged.last_nested_array(), &inner);
    }
}
