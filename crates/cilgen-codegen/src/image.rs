//! The metadata image: the program items (classes, methods, fields and the other class
//! members) that outlive the AST nodes declaring them. Items are addressed by small typed
//! handles and are never removed, so a handle stays valid for the whole compilation unit.
use ast::NodeId;
use lang::{ty::quote_identifier, ClassName, Type};

macro_rules! item_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u32);

            impl $name {
                /// Get the index of the item in its table.
                #[must_use]
                pub fn index(&self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

item_handle! {
    /// A handle to a class item.
    ClassId,
    /// A handle to a method item.
    MethodId,
    /// A handle to a field item.
    FieldId,
    /// A handle to an event, property or enumeration member item.
    MemberId,
}

/// A handle to any program item. Its equality is the identity of the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemId {
    Class(ClassId),
    Method(MethodId),
    Field(FieldId),
    Member(MemberId),
}

impl From<ClassId> for ItemId {
    fn from(id: ClassId) -> Self {
        ItemId::Class(id)
    }
}

impl From<MethodId> for ItemId {
    fn from(id: MethodId) -> Self {
        ItemId::Method(id)
    }
}

impl From<FieldId> for ItemId {
    fn from(id: FieldId) -> Self {
        ItemId::Field(id)
    }
}

impl From<MemberId> for ItemId {
    fn from(id: MemberId) -> Self {
        ItemId::Member(id)
    }
}

/// A class, defined by the program or imported from another assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub namespace: Option<String>,

    /// The assembly the class is imported from, `None` for classes of the program.
    pub scope: Option<String>,

    /// The enclosing class, for nested classes.
    pub nested_parent: Option<ClassId>,

    /// Whether the class is a value type rather than a reference type.
    pub value_type: bool,

    pub(crate) node: Option<NodeId>,
}

/// The signature of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub ret: Type,
    pub params: Vec<Type>,

    /// Whether the method receives an implicit `this` argument.
    pub has_this: bool,
}

impl MethodSig {
    /// Create the signature of a static method.
    #[must_use]
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self {
            ret,
            params,
            has_this: false,
        }
    }

    /// Create the signature of an instance method.
    #[must_use]
    pub fn instance(ret: Type, params: Vec<Type>) -> Self {
        Self {
            ret,
            params,
            has_this: true,
        }
    }
}

/// A method.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub owner: ClassId,
    pub name: String,
    pub sig: MethodSig,
    pub is_virtual: bool,
    pub is_static: bool,

    /// Whether the method is the entry point of the program.
    pub entry_point: bool,

    pub(crate) node: Option<NodeId>,
}

/// A field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub owner: ClassId,
    pub name: String,
    pub ty: Type,
    pub is_static: bool,

    /// Whether accesses to the field must be prefixed with `volatile.`.
    pub volatile: bool,
}

/// The kind of a class member that is neither a method nor a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Event,
    Property,
    EnumMember,
}

/// An event, a property or an enumeration member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub owner: ClassId,
    pub name: String,
    pub kind: MemberKind,
}

/// The tables of every program item of a compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Image {
    classes: Vec<Class>,
    methods: Vec<Method>,
    fields: Vec<Field>,
    members: Vec<Member>,
}

/// Convert a table length into the next handle value.
///
/// Handles are 32 bits wide. Every handle stands for a table entry of several dozen
/// bytes, so a table cannot reach `u32::MAX` entries before the allocator gives up, and
/// on 32-bit targets the length of a table never exceeds a `u32` anyway. Running out of
/// handles is therefore not reported as a [`GenError`](crate::GenError).
///
/// # Panics
/// Panics if the table already holds more than `u32::MAX` entries.
pub(crate) fn next_index(len: usize) -> u32 {
    u32::try_from(len).expect("handle space exhausted")
}

impl Image {
    /// Create an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class defined by the program.
    pub fn add_class(&mut self, namespace: Option<&str>, name: &str) -> ClassId {
        self.push_class(Class {
            name: name.to_owned(),
            namespace: namespace.map(str::to_owned),
            scope: None,
            nested_parent: None,
            value_type: false,
            node: None,
        })
    }

    /// Add a class nested inside another class of the program.
    pub fn add_nested_class(&mut self, parent: ClassId, name: &str) -> ClassId {
        self.push_class(Class {
            name: name.to_owned(),
            namespace: None,
            scope: None,
            nested_parent: Some(parent),
            value_type: false,
            node: None,
        })
    }

    /// Add a class imported from another assembly.
    pub fn import_class(&mut self, scope: &str, namespace: &str, name: &str) -> ClassId {
        self.push_class(Class {
            name: name.to_owned(),
            namespace: Some(namespace.to_owned()),
            scope: Some(scope.to_owned()),
            nested_parent: None,
            value_type: false,
            node: None,
        })
    }

    fn push_class(&mut self, class: Class) -> ClassId {
        let id = ClassId(next_index(self.classes.len()));
        self.classes.push(class);
        id
    }

    /// Add a method to a class. The method is neither virtual nor static; flags can be
    /// changed through [`Image::method_mut`].
    pub fn add_method(&mut self, owner: ClassId, name: &str, sig: MethodSig) -> MethodId {
        let id = MethodId(next_index(self.methods.len()));
        self.methods.push(Method {
            owner,
            name: name.to_owned(),
            is_static: !sig.has_this,
            sig,
            is_virtual: false,
            entry_point: false,
            node: None,
        });
        id
    }

    /// Add a field to a class.
    pub fn add_field(&mut self, owner: ClassId, name: &str, ty: Type) -> FieldId {
        let id = FieldId(next_index(self.fields.len()));
        self.fields.push(Field {
            owner,
            name: name.to_owned(),
            ty,
            is_static: false,
            volatile: false,
        });
        id
    }

    /// Add an event, a property or an enumeration member to a class.
    pub fn add_member(&mut self, owner: ClassId, name: &str, kind: MemberKind) -> MemberId {
        let id = MemberId(next_index(self.members.len()));
        self.members.push(Member {
            owner,
            name: name.to_owned(),
            kind,
        });
        id
    }

    #[must_use]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.index()]
    }

    #[must_use]
    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.index()]
    }

    #[must_use]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.index()]
    }

    #[must_use]
    pub fn member(&self, id: MemberId) -> &Member {
        &self.members[id.index()]
    }

    /// Get the class owning an item, or `None` if the item is a class itself.
    #[must_use]
    pub fn owner_of(&self, item: ItemId) -> Option<ClassId> {
        match item {
            ItemId::Class(_) => None,
            ItemId::Method(id) => Some(self.method(id).owner),
            ItemId::Field(id) => Some(self.field(id).owner),
            ItemId::Member(id) => Some(self.member(id).owner),
        }
    }

    /// Build the assembly name of a class, following its nesting chain.
    #[must_use]
    pub fn class_name(&self, id: ClassId) -> ClassName {
        let class = self.class(id);
        match class.nested_parent {
            Some(parent) => ClassName::nested(self.class_name(parent), &class.name),
            None => ClassName {
                scope: class.scope.clone(),
                namespace: class.namespace.clone(),
                name: class.name.clone(),
                nested_in: None,
            },
        }
    }

    /// Get the type of the values of a class.
    #[must_use]
    pub fn class_type(&self, id: ClassId) -> Type {
        let name = self.class_name(id);
        if self.class(id).value_type {
            Type::ValueType(name)
        } else {
            Type::Class(name)
        }
    }

    /// Render a method reference, `instance void Owner::Name(int32)`, using the given
    /// call-site signature instead of the declared one when present.
    #[must_use]
    pub fn method_ref(&self, id: MethodId, call_site: Option<&MethodSig>) -> String {
        let method = self.method(id);
        let sig = call_site.unwrap_or(&method.sig);
        let params = sig
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}{} {}::{}({params})",
            if sig.has_this { "instance " } else { "" },
            sig.ret,
            self.class_name(method.owner),
            quote_identifier(&method.name),
        )
    }

    /// Render a field reference, `int32 Owner::name`.
    #[must_use]
    pub fn field_ref(&self, id: FieldId) -> String {
        let field = self.field(id);
        format!(
            "{} {}::{}",
            field.ty,
            self.class_name(field.owner),
            quote_identifier(&field.name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_references() {
        let mut image = Image::new();
        let console = image.import_class(lang::LIBRARY_SCOPE, "System", "Console");
        let write = image.add_method(
            console,
            "Write",
            MethodSig::new(Type::Void, vec![Type::Char]),
        );
        assert_eq!(
            image.method_ref(write, None),
            "void [.library]System.Console::Write(char)"
        );

        let outer = image.add_class(Some("Demo"), "Outer");
        let inner = image.add_nested_class(outer, "Inner");
        let count = image.add_field(inner, "count", Type::Int32);
        assert_eq!(image.field_ref(count), "int32 Demo.Outer/Inner::count");

        let ctor = image.add_method(inner, ".ctor", MethodSig::instance(Type::Void, Vec::new()));
        assert_eq!(
            image.method_ref(ctor, None),
            "instance void Demo.Outer/Inner::.ctor()"
        );
        assert!(!image.method(ctor).is_static);
        assert_eq!(image.owner_of(count.into()), Some(inner));
        assert_eq!(image.owner_of(outer.into()), None);
    }

    #[test]
    fn handles_cover_the_whole_u32_range() {
        assert_eq!(next_index(0), 0);
        assert_eq!(next_index(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "handle space exhausted")]
    fn handles_past_u32_panic() {
        next_index(u32::MAX as usize + 1);
    }

    #[test]
    fn class_types() {
        let mut image = Image::new();
        let point = image.add_class(None, "Point");
        assert_eq!(image.class_type(point).to_string(), "class Point");
        image.class_mut(point).value_type = true;
        assert_eq!(image.class_type(point).to_string(), "valuetype Point");
    }
}
