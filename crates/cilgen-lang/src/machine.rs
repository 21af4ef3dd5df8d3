use crate::{
    opcode::Opcode,
    ty::{ClassName, Type},
};

/// The representation of a value on the evaluation stack and in storage slots. This is
/// distinct from the source type: two different source types (an enum and its underlying
/// integer, say) share a machine type, and the machine type alone decides which member of
/// an opcode family (`ldelem.u1` vs `ldelem.i`) must be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    Void,
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Char,
    Int32,
    UInt32,
    Int64,
    UInt64,
    NativeInt,
    NativeUInt,
    Float32,
    Float64,
    NativeFloat,
    Decimal,
    String,
    ObjectRef,
    UnmanagedPtr,
    ManagedPtr,
    TransientPtr,
    ManagedValue,
}

impl MachineType {
    /// Check if values of this machine type are unsigned integers.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            MachineType::UInt8
                | MachineType::UInt16
                | MachineType::Char
                | MachineType::UInt32
                | MachineType::UInt64
                | MachineType::NativeUInt
        )
    }

    /// Check if values of this machine type are stored inline as structures, so that
    /// they must be accessed through `ldobj`/`stobj` rather than a typed opcode.
    #[must_use]
    pub fn is_structure(&self) -> bool {
        matches!(self, MachineType::Decimal | MachineType::ManagedValue)
    }

    /// Get the `ldelem` opcode for array elements of this machine type. Returns `None`
    /// for structures (which are loaded through `ldelema` + `ldobj`) and for `void`.
    #[must_use]
    pub fn array_load_opcode(&self) -> Option<Opcode> {
        Some(match self {
            MachineType::Boolean | MachineType::Int8 => Opcode::LdelemI1,
            MachineType::UInt8 => Opcode::LdelemU1,
            MachineType::Int16 => Opcode::LdelemI2,
            MachineType::UInt16 | MachineType::Char => Opcode::LdelemU2,
            MachineType::Int32 => Opcode::LdelemI4,
            MachineType::UInt32 => Opcode::LdelemU4,
            MachineType::Int64 | MachineType::UInt64 => Opcode::LdelemI8,
            MachineType::NativeInt
            | MachineType::NativeUInt
            | MachineType::UnmanagedPtr
            | MachineType::ManagedPtr
            | MachineType::TransientPtr => Opcode::LdelemI,
            MachineType::Float32 => Opcode::LdelemR4,
            MachineType::Float64 | MachineType::NativeFloat => Opcode::LdelemR8,
            MachineType::String | MachineType::ObjectRef => Opcode::LdelemRef,
            MachineType::Void | MachineType::Decimal | MachineType::ManagedValue => return None,
        })
    }

    /// Get the `stelem` opcode for array elements of this machine type. Returns `None`
    /// for structures (which are stored through `ldelema` + `stobj`) and for `void`.
    #[must_use]
    pub fn array_store_opcode(&self) -> Option<Opcode> {
        Some(match self {
            MachineType::Boolean | MachineType::Int8 | MachineType::UInt8 => Opcode::StelemI1,
            MachineType::Int16 | MachineType::UInt16 | MachineType::Char => Opcode::StelemI2,
            MachineType::Int32 | MachineType::UInt32 => Opcode::StelemI4,
            MachineType::Int64 | MachineType::UInt64 => Opcode::StelemI8,
            MachineType::NativeInt
            | MachineType::NativeUInt
            | MachineType::UnmanagedPtr
            | MachineType::ManagedPtr
            | MachineType::TransientPtr => Opcode::StelemI,
            MachineType::Float32 => Opcode::StelemR4,
            MachineType::Float64 | MachineType::NativeFloat => Opcode::StelemR8,
            MachineType::String | MachineType::ObjectRef => Opcode::StelemRef,
            MachineType::Void | MachineType::Decimal | MachineType::ManagedValue => return None,
        })
    }

    /// Get the `ldind` opcode used to load a value of this machine type through a
    /// pointer. Returns `None` for structures and `void`.
    #[must_use]
    pub fn indirect_load_opcode(&self) -> Option<Opcode> {
        Some(match self {
            MachineType::Boolean | MachineType::Int8 => Opcode::LdindI1,
            MachineType::UInt8 => Opcode::LdindU1,
            MachineType::Int16 => Opcode::LdindI2,
            MachineType::UInt16 | MachineType::Char => Opcode::LdindU2,
            MachineType::Int32 => Opcode::LdindI4,
            MachineType::UInt32 => Opcode::LdindU4,
            MachineType::Int64 | MachineType::UInt64 => Opcode::LdindI8,
            MachineType::NativeInt
            | MachineType::NativeUInt
            | MachineType::UnmanagedPtr
            | MachineType::ManagedPtr
            | MachineType::TransientPtr => Opcode::LdindI,
            MachineType::Float32 => Opcode::LdindR4,
            MachineType::Float64 | MachineType::NativeFloat => Opcode::LdindR8,
            MachineType::String | MachineType::ObjectRef => Opcode::LdindRef,
            MachineType::Void | MachineType::Decimal | MachineType::ManagedValue => return None,
        })
    }

    /// Get the `stind` opcode used to store a value of this machine type through a
    /// pointer. Returns `None` for structures and `void`.
    #[must_use]
    pub fn indirect_store_opcode(&self) -> Option<Opcode> {
        Some(match self {
            MachineType::Boolean | MachineType::Int8 | MachineType::UInt8 => Opcode::StindI1,
            MachineType::Int16 | MachineType::UInt16 | MachineType::Char => Opcode::StindI2,
            MachineType::Int32 | MachineType::UInt32 => Opcode::StindI4,
            MachineType::Int64 | MachineType::UInt64 => Opcode::StindI8,
            MachineType::NativeInt
            | MachineType::NativeUInt
            | MachineType::UnmanagedPtr
            | MachineType::ManagedPtr
            | MachineType::TransientPtr => Opcode::StindI,
            MachineType::Float32 => Opcode::StindR4,
            MachineType::Float64 | MachineType::NativeFloat => Opcode::StindR8,
            MachineType::String | MachineType::ObjectRef => Opcode::StindRef,
            MachineType::Void | MachineType::Decimal | MachineType::ManagedValue => return None,
        })
    }

    /// Convert a machine type back into the canonical IL type with that representation.
    /// Pointers and opaque structures have no canonical type and map to
    /// [`Type::Invalid`].
    #[must_use]
    pub fn to_type(&self) -> Type {
        match self {
            MachineType::Boolean => Type::Boolean,
            MachineType::Int8 => Type::Int8,
            MachineType::UInt8 => Type::UInt8,
            MachineType::Int16 => Type::Int16,
            MachineType::UInt16 => Type::UInt16,
            MachineType::Char => Type::Char,
            MachineType::Int32 => Type::Int32,
            MachineType::UInt32 => Type::UInt32,
            MachineType::NativeInt => Type::NativeInt,
            MachineType::NativeUInt => Type::NativeUInt,
            MachineType::Int64 => Type::Int64,
            MachineType::UInt64 => Type::UInt64,
            MachineType::Float32 => Type::Float32,
            MachineType::Float64 => Type::Float64,
            MachineType::NativeFloat => Type::NativeFloat,
            MachineType::String => Type::String,
            MachineType::Decimal => Type::ValueType(ClassName::system("Decimal")),
            MachineType::ObjectRef => Type::Object,
            MachineType::Void
            | MachineType::UnmanagedPtr
            | MachineType::ManagedPtr
            | MachineType::TransientPtr
            | MachineType::ManagedValue => Type::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_families_follow_machine_type() {
        assert_eq!(MachineType::UInt8.array_load_opcode(), Some(Opcode::LdelemU1));
        assert_eq!(MachineType::NativeInt.array_load_opcode(), Some(Opcode::LdelemI));
        assert_eq!(MachineType::UInt8.array_store_opcode(), Some(Opcode::StelemI1));
        assert_eq!(MachineType::ObjectRef.indirect_store_opcode(), Some(Opcode::StindRef));
        assert_eq!(MachineType::ManagedValue.array_load_opcode(), None);
    }

    #[test]
    fn machine_type_round_trips_through_canonical_type() {
        for machine in [
            MachineType::Boolean,
            MachineType::UInt16,
            MachineType::Int64,
            MachineType::Float32,
            MachineType::String,
            MachineType::Decimal,
        ] {
            assert_eq!(machine.to_type().machine_type(), machine);
        }
        assert_eq!(MachineType::ManagedPtr.to_type(), Type::Invalid);
    }
}
