//! Storage slots of a method: its arguments, declared from the signature when the method
//! is opened, and its locals, allocated one after the other while its body is generated.
//! Slots are never reused within a method and all of them go away when it ends.
//!
//! The opcode used to access a slot, an array element or a pointer target is chosen from
//! the machine type of the value, not from its source type.
use crate::{
    context::CompilationContext,
    error::{GenError, Result, MAX_ARGUMENTS, MAX_LOCALS},
    image::MethodId,
};
use lang::{ty::quote_identifier, MachineType, Opcode, Type};

/// A local variable or argument slot of the current method.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSlot {
    pub index: u16,
    pub ty: Type,
    pub machine: MachineType,
}

impl VarSlot {
    fn new(index: usize, ty: Type) -> Self {
        Self {
            // Callers check the slot limits, which all fit in 16 bits.
            index: index as u16,
            machine: ty.machine_type(),
            ty,
        }
    }
}

/// The state of the method being generated.
#[derive(Debug, Clone)]
pub(crate) struct MethodFrame {
    method: MethodId,
    locals: Vec<VarSlot>,
    args: Vec<VarSlot>,

    /// The first line of the listing belonging to the method.
    start: usize,
}

/// An array store whose array and index operands have been pushed. The value to store
/// must be pushed next, then the store committed.
#[must_use = "an array store must be committed once its value is pushed"]
#[derive(Debug)]
pub struct PendingArrayStore {
    element: Type,
}

impl PendingArrayStore {
    /// Emit the store itself, now that the value is on the stack.
    ///
    /// # Panics
    /// Panics if the element type has no storage representation.
    pub fn commit(self, ctx: &mut CompilationContext) {
        match self.element.machine_type().array_store_opcode() {
            Some(opcode) => ctx.emit_simple(opcode),
            None => ctx.emit_type_token(Opcode::Stobj, &self.element),
        }
    }
}

impl CompilationContext {
    /// Open the body of a method: emit its header and declare its argument slots.
    ///
    /// # Errors
    /// Returns [`GenError::TooManyArguments`] if the signature has more arguments than
    /// can be addressed.
    ///
    /// # Panics
    /// Panics if another method is still open.
    pub fn begin_method(&mut self, method: MethodId) -> Result<()> {
        assert!(self.method.is_none(), "nested method bodies");
        let decl = self.image.method(method).clone();

        let mut arg_types = Vec::with_capacity(decl.sig.params.len() + 1);
        if decl.sig.has_this {
            arg_types.push(self.image.class_type(decl.owner));
        }
        arg_types.extend(decl.sig.params.iter().cloned());
        if arg_types.len() > MAX_ARGUMENTS {
            return Err(GenError::TooManyArguments {
                method: decl.name.clone(),
            });
        }

        let params = decl
            .sig
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let attributes = if decl.is_static {
            "static "
        } else if decl.is_virtual {
            "virtual "
        } else {
            ""
        };
        tracing::debug!(method = %decl.name, args = arg_types.len(), "begin method");
        self.emit_directive(format!(
            ".method public {attributes}hidebysig {} {}({params}) cil managed\n{{",
            decl.sig.ret,
            quote_identifier(&decl.name),
        ));
        if decl.entry_point {
            self.emit_directive("\t.entrypoint");
        }

        self.stack_height = 0;
        self.max_stack_height = 0;
        self.method = Some(MethodFrame {
            method,
            locals: Vec::new(),
            args: arg_types
                .into_iter()
                .enumerate()
                .map(|(index, ty)| VarSlot::new(index, ty))
                .collect(),
            start: self.output.len(),
        });
        Ok(())
    }

    /// Close the body of the current method. Pending `br.or.leave` jumps are resolved and
    /// the `.maxstack` directive is emitted.
    ///
    /// # Panics
    /// Panics if no method is open, or if a label is still unplaced.
    pub fn end_method(&mut self) {
        self.flush();
        let Some(frame) = self.method.take() else {
            panic!("no method to end");
        };
        let name = self.image.method(frame.method).name.clone();
        self.labels
            .assert_all_placed(&format!("method '{name}'"));
        let resolved = self
            .output
            .resolve_branch_or_leave(frame.start, self.labels.leave_targets());

        tracing::debug!(
            method = %name,
            locals = frame.locals.len(),
            max_stack = self.max_stack_height,
            resolved,
            "end method"
        );
        self.emit_directive(format!("\t.maxstack {}\n}}", self.max_stack_height));
    }

    fn frame(&self) -> &MethodFrame {
        match &self.method {
            Some(frame) => frame,
            None => panic!("slot access outside of a method"),
        }
    }

    /// Allocate a new local variable slot, declaring it in the listing.
    ///
    /// # Errors
    /// Returns [`GenError::TooManyLocals`] once the method has as many locals as can be
    /// addressed.
    ///
    /// # Panics
    /// Panics if no method is open.
    pub fn alloc_local(&mut self, ty: Type, name: Option<&str>) -> Result<VarSlot> {
        let frame = match self.method.as_mut() {
            Some(frame) => frame,
            None => panic!("local allocated outside of a method"),
        };
        if frame.locals.len() >= MAX_LOCALS {
            let method = self.image.method(frame.method).name.clone();
            return Err(GenError::TooManyLocals { method });
        }

        let slot = VarSlot::new(frame.locals.len(), ty);
        frame.locals.push(slot.clone());

        let name = name.map(|name| format!(" '{name}'")).unwrap_or_default();
        tracing::trace!(index = slot.index, ty = %slot.ty, "allocate local");
        self.emit_directive(format!("\t.locals init\t({}{name})", slot.ty));
        Ok(slot)
    }

    /// Get an argument slot of the current method. The implicit `this` of instance
    /// methods is argument 0.
    ///
    /// # Panics
    /// Panics if no method is open or the argument does not exist.
    #[must_use]
    pub fn arg(&self, index: usize) -> &VarSlot {
        &self.frame().args[index]
    }

    /// Get the number of argument slots of the current method.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.frame().args.len()
    }

    /// Get a local slot of the current method.
    ///
    /// # Panics
    /// Panics if no method is open or the local does not exist.
    #[must_use]
    pub fn local(&self, index: usize) -> &VarSlot {
        &self.frame().locals[index]
    }

    /// Get the number of local slots allocated so far in the current method.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.frame().locals.len()
    }

    /// Emit the shortest form of a slot access: one of the four implicit forms when the
    /// index allows it, then the one-byte form, then the two-byte form.
    fn emit_slot_access(
        &mut self,
        index: u16,
        implicit: Option<[Opcode; 4]>,
        short: Opcode,
        long: Opcode,
    ) {
        match (implicit, index) {
            (Some(forms), 0..=3) => self.emit_simple(forms[index as usize]),
            (_, 0..=255) => self.emit_word(short, u32::from(index)),
            _ => self.emit_short(long, u32::from(index)),
        }
    }

    pub fn load_local(&mut self, slot: &VarSlot) {
        let implicit = [Opcode::Ldloc0, Opcode::Ldloc1, Opcode::Ldloc2, Opcode::Ldloc3];
        self.emit_slot_access(slot.index, Some(implicit), Opcode::LdlocS, Opcode::Ldloc);
    }

    pub fn store_local(&mut self, slot: &VarSlot) {
        let implicit = [Opcode::Stloc0, Opcode::Stloc1, Opcode::Stloc2, Opcode::Stloc3];
        self.emit_slot_access(slot.index, Some(implicit), Opcode::StlocS, Opcode::Stloc);
    }

    pub fn load_local_addr(&mut self, slot: &VarSlot) {
        self.emit_slot_access(slot.index, None, Opcode::LdlocaS, Opcode::Ldloca);
    }

    pub fn load_arg(&mut self, slot: &VarSlot) {
        let implicit = [Opcode::Ldarg0, Opcode::Ldarg1, Opcode::Ldarg2, Opcode::Ldarg3];
        self.emit_slot_access(slot.index, Some(implicit), Opcode::LdargS, Opcode::Ldarg);
    }

    pub fn store_arg(&mut self, slot: &VarSlot) {
        self.emit_slot_access(slot.index, None, Opcode::StargS, Opcode::Starg);
    }

    pub fn load_arg_addr(&mut self, slot: &VarSlot) {
        self.emit_slot_access(slot.index, None, Opcode::LdargaS, Opcode::Ldarga);
    }

    /// Load an element of a vector whose array and index operands are on the stack.
    /// Structures are loaded through their address.
    ///
    /// # Panics
    /// Panics if the element type has no storage representation.
    pub fn load_array(&mut self, element: &Type) {
        let machine = element.machine_type();
        match machine.array_load_opcode() {
            Some(opcode) => self.emit_simple(opcode),
            None if machine.is_structure() => {
                self.emit_type_token(Opcode::Ldelema, element);
                self.emit_type_token(Opcode::Ldobj, element);
            }
            None => panic!("cannot load array elements of type {element}"),
        }
    }

    /// Start storing an element of a vector whose array and index operands are on the
    /// stack. Structures are stored through their address, which is taken now, before
    /// the value is pushed.
    ///
    /// # Panics
    /// Panics if the element type has no storage representation.
    pub fn prepare_store_array(&mut self, element: &Type) -> PendingArrayStore {
        let machine = element.machine_type();
        if machine.array_store_opcode().is_none() {
            assert!(
                machine.is_structure(),
                "cannot store array elements of type {element}"
            );
            self.emit_type_token(Opcode::Ldelema, element);
        }
        PendingArrayStore {
            element: element.clone(),
        }
    }

    /// Load a value through the pointer on the stack.
    ///
    /// # Panics
    /// Panics if the type has no storage representation.
    pub fn load_indirect(&mut self, ty: &Type) {
        let machine = ty.machine_type();
        match machine.indirect_load_opcode() {
            Some(opcode) => self.emit_simple(opcode),
            None if machine.is_structure() => self.emit_type_token(Opcode::Ldobj, ty),
            None => panic!("cannot load values of type {ty} indirectly"),
        }
    }

    /// Store the value on the stack through the pointer below it.
    ///
    /// # Panics
    /// Panics if the type has no storage representation.
    pub fn store_indirect(&mut self, ty: &Type) {
        let machine = ty.machine_type();
        match machine.indirect_store_opcode() {
            Some(opcode) => self.emit_simple(opcode),
            None if machine.is_structure() => self.emit_type_token(Opcode::Stobj, ty),
            None => panic!("cannot store values of type {ty} indirectly"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Options,
        image::MethodSig,
    };
    use lang::ClassName;

    fn open_method(params: Vec<Type>, has_this: bool) -> CompilationContext {
        let mut ctx = CompilationContext::new(Options {
            peephole: false,
            ..Options::default()
        });
        let class = ctx.image.add_class(None, "Program");
        let sig = MethodSig {
            ret: Type::Void,
            params,
            has_this,
        };
        let method = ctx.image.add_method(class, "Run", sig);
        ctx.begin_method(method).unwrap();
        ctx
    }

    fn opcodes(ctx: &mut CompilationContext) -> Vec<Opcode> {
        ctx.assembly().insns().map(|insn| insn.opcode).collect()
    }

    #[test]
    fn locals_are_numbered_monotonically() {
        let mut ctx = open_method(Vec::new(), false);
        let first = ctx.alloc_local(Type::Int32, Some("i")).unwrap();
        let second = ctx.alloc_local(Type::vector(Type::UInt8), None).unwrap();

        assert_eq!((first.index, second.index), (0, 1));
        assert_eq!(second.machine, MachineType::ObjectRef);
        assert_eq!(ctx.local_count(), 2);
        ctx.end_method();

        let text = ctx.finish().to_string();
        assert!(text.contains("\t.locals init\t(int32 'i')\n"));
        assert!(text.contains("\t.locals init\t(unsigned int8[])\n"));
        assert!(text.starts_with(".method public static hidebysig void Run() cil managed\n{\n"));
        assert!(text.ends_with("\t.maxstack 0\n}\n"));
    }

    #[test]
    fn shortest_slot_forms() {
        let mut ctx = open_method(Vec::new(), false);
        let mut slots = Vec::new();
        for _ in 0..300 {
            slots.push(ctx.alloc_local(Type::Int32, None).unwrap());
        }
        ctx.load_local(&slots[2]);
        ctx.load_local(&slots[4]);
        ctx.store_local(&slots[299]);
        ctx.load_local_addr(&slots[0]);
        assert_eq!(
            opcodes(&mut ctx),
            vec![Opcode::Ldloc2, Opcode::LdlocS, Opcode::Stloc, Opcode::LdlocaS]
        );
    }

    #[test]
    fn instance_methods_get_this() {
        let mut ctx = open_method(vec![Type::String], true);
        assert_eq!(ctx.arg_count(), 2);
        assert_eq!(ctx.arg(0).ty, Type::Class(ClassName::local(None, "Program")));
        assert_eq!(ctx.arg(1).machine, MachineType::String);

        let this = ctx.arg(0).clone();
        let text = ctx.arg(1).clone();
        ctx.load_arg(&this);
        ctx.store_arg(&text);
        ctx.load_arg_addr(&text);
        assert_eq!(
            opcodes(&mut ctx),
            vec![Opcode::Ldarg0, Opcode::StargS, Opcode::LdargaS]
        );
    }

    #[test]
    fn array_and_indirect_access() {
        let mut ctx = open_method(Vec::new(), false);
        let point = Type::ValueType(ClassName::local(None, "Point"));

        ctx.load_array(&Type::UInt8);
        let store = ctx.prepare_store_array(&Type::UInt8);
        ctx.emit_load_int32(1);
        store.commit(&mut ctx);

        ctx.load_array(&point);
        let store = ctx.prepare_store_array(&point);
        ctx.emit_simple(Opcode::Ldnull);
        store.commit(&mut ctx);

        ctx.load_indirect(&Type::NativeInt);
        ctx.store_indirect(&point);

        assert_eq!(
            opcodes(&mut ctx),
            vec![
                Opcode::LdelemU1,
                Opcode::LdcI41,
                Opcode::StelemI1,
                Opcode::Ldelema,
                Opcode::Ldobj,
                Opcode::Ldelema,
                Opcode::Ldnull,
                Opcode::Stobj,
                Opcode::LdindI,
                Opcode::Stobj,
            ]
        );
    }

    #[test]
    #[should_panic(expected = "outside of a method")]
    fn locals_need_a_method() {
        let mut ctx = CompilationContext::new(Options::default());
        let _ = ctx.alloc_local(Type::Int32, None);
    }
}
