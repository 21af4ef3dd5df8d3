//! Instruction emission. Every `emit_*` method appends one logical instruction to the
//! listing. Plain instructions go through the peephole queue; calls, metadata tokens and
//! directives are barriers and commit the queue before being appended.
//!
//! The emitter does not track the evaluation stack by itself: callers know the stack
//! effect of what they emit and report it with [`CompilationContext::adjust`], which
//! keeps the `.maxstack` value of the method up to date.
use crate::{
    asm::{Insn, Line, Operand},
    context::CompilationContext,
    image::{ClassId, FieldId, MethodId, MethodSig},
};
use lang::{ty::quote_identifier, ClassName, Opcode, Type};

/// The parameter list of the accessors of an array of the given rank.
fn rank_params(rank: u32) -> String {
    vec!["int32"; rank as usize].join(", ")
}

impl CompilationContext {
    /// Queue an instruction in the peephole window.
    pub(crate) fn queue(&mut self, insn: Insn) {
        self.peephole.push(insn, &mut self.output);
    }

    /// Commit the peephole window, then append an instruction.
    pub(crate) fn barrier(&mut self, insn: Insn) {
        self.flush();
        self.output.push(Line::Insn(insn));
    }

    /// Commit the peephole window, then append a directive.
    pub fn emit_directive(&mut self, text: impl Into<String>) {
        self.flush();
        self.output.push(Line::Directive(text.into()));
    }

    /// Commit every queued instruction to the listing. Instructions emitted before the
    /// flush can no longer be rewritten together with instructions emitted after it.
    pub fn flush(&mut self) {
        self.peephole.flush(&mut self.output);
    }

    /// Enable or disable the peephole rewrites for the rest of the unit.
    pub fn set_peephole(&mut self, enabled: bool) {
        self.peephole.set_enabled(enabled, &mut self.output);
    }

    /// Record the stack effect of the instructions just emitted.
    pub fn adjust(&mut self, delta: i32) {
        self.stack_height += delta;
        debug_assert!(self.stack_height >= 0, "evaluation stack underflow");
        self.max_stack_height = self.max_stack_height.max(self.stack_height.max(0) as u32);
    }

    /// Reserve `extra` stack slots above the current height without pushing anything,
    /// for instructions that temporarily need more room than they leave behind.
    pub fn extend(&mut self, extra: u32) {
        let needed = self.stack_height.max(0) as u32 + extra;
        self.max_stack_height = self.max_stack_height.max(needed);
    }

    /// Get the current height of the evaluation stack.
    #[must_use]
    pub fn stack_height(&self) -> i32 {
        self.stack_height
    }

    /// Get the maximum height reached by the evaluation stack in the current method.
    #[must_use]
    pub fn max_stack(&self) -> u32 {
        self.max_stack_height
    }

    pub fn emit_simple(&mut self, opcode: Opcode) {
        self.queue(Insn::simple(opcode));
    }

    /// Emit an instruction with a signed one-byte operand.
    pub fn emit_byte(&mut self, opcode: Opcode, arg: i32) {
        self.queue(Insn::new(opcode, Operand::Int(i64::from(arg))));
    }

    /// Emit an instruction with a 16-bit operand. Only the low 16 bits of `arg` are kept.
    pub fn emit_short(&mut self, opcode: Opcode, arg: u32) {
        self.queue(Insn::new(opcode, Operand::UInt(u64::from(arg & 0xFFFF))));
    }

    /// Emit an instruction with a 32-bit operand.
    pub fn emit_word(&mut self, opcode: Opcode, arg: u32) {
        self.queue(Insn::new(opcode, Operand::UInt(u64::from(arg))));
    }

    /// Emit an instruction with a 64-bit operand.
    pub fn emit_dword(&mut self, opcode: Opcode, arg: u64) {
        self.queue(Insn::new(opcode, Operand::Hex64(arg)));
    }

    /// Emit an arithmetic or conversion opcode, switching to its overflow-checked form
    /// when overflow checking is on.
    pub fn emit_arith(&mut self, opcode: Opcode, unsigned: bool) {
        let opcode = if self.overflow_insns {
            opcode.overflow_checked(unsigned)
        } else {
            opcode
        };
        self.emit_simple(opcode);
    }

    /// Load a 32-bit integer constant with the shortest `ldc.i4` form.
    pub fn emit_load_int32(&mut self, value: i32) {
        let opcode = match value {
            -1 => Opcode::LdcI4M1,
            0 => Opcode::LdcI40,
            1 => Opcode::LdcI41,
            2 => Opcode::LdcI42,
            3 => Opcode::LdcI43,
            4 => Opcode::LdcI44,
            5 => Opcode::LdcI45,
            6 => Opcode::LdcI46,
            7 => Opcode::LdcI47,
            8 => Opcode::LdcI48,
            -128..=127 => return self.emit_byte(Opcode::LdcI4S, value),
            _ => return self.queue(Insn::new(Opcode::LdcI4, Operand::Int(i64::from(value)))),
        };
        self.emit_simple(opcode);
    }

    /// Load a 64-bit integer constant. Values that fit in 32 bits are loaded as an
    /// `int32` and widened, which is shorter than `ldc.i8`.
    pub fn emit_load_int64(&mut self, value: i64) {
        match i32::try_from(value) {
            Ok(small) => {
                self.emit_load_int32(small);
                self.emit_simple(Opcode::ConvI8);
            }
            Err(_) => self.emit_dword(Opcode::LdcI8, value as u64),
        }
    }

    pub fn emit_load_float32(&mut self, value: f32) {
        self.queue(Insn::new(Opcode::LdcR4, Operand::Float32(value)));
    }

    /// Load a double precision constant, as a single precision one when the conversion
    /// is exact.
    pub fn emit_load_float64(&mut self, value: f64) {
        if f64::from(value as f32) == value {
            self.emit_load_float32(value as f32);
        } else {
            self.queue(Insn::new(Opcode::LdcR8, Operand::Float64(value)));
        }
    }

    pub fn emit_load_string(&mut self, text: &str) {
        self.queue(Insn::new(Opcode::Ldstr, Operand::Str(text.to_owned())));
    }

    /// Call a method given its already rendered reference.
    pub fn emit_call_by_name(&mut self, name: &str) {
        self.barrier(Insn::new(Opcode::Call, Operand::Token(name.to_owned())));
    }

    /// Call an instance method through its virtual slot, given its rendered reference.
    pub fn emit_call_virtual_by_name(&mut self, name: &str) {
        self.barrier(Insn::new(
            Opcode::Callvirt,
            Operand::Token(format!("instance {name}")),
        ));
    }

    pub fn emit_call_by_method(&mut self, method: MethodId) {
        self.emit_call_by_method_sig(method, None);
    }

    /// Call a method with a call-site signature, as needed for `vararg` calls.
    pub fn emit_call_by_method_sig(&mut self, method: MethodId, call_site: Option<&MethodSig>) {
        let token = self.image.method_ref(method, call_site);
        self.barrier(Insn::new(Opcode::Call, Operand::Token(token)));
    }

    pub fn emit_callvirt_by_method(&mut self, method: MethodId) {
        self.emit_callvirt_by_method_sig(method, None);
    }

    pub fn emit_callvirt_by_method_sig(
        &mut self,
        method: MethodId,
        call_site: Option<&MethodSig>,
    ) {
        let token = self.image.method_ref(method, call_site);
        self.barrier(Insn::new(Opcode::Callvirt, Operand::Token(token)));
    }

    /// Call a method the way its declaration requires: virtual methods of reference
    /// types go through `callvirt`, everything else through `call`.
    pub fn emit_call_method(&mut self, method: MethodId) {
        let decl = self.image.method(method);
        if decl.is_virtual && !self.image.class(decl.owner).value_type {
            self.emit_callvirt_by_method(method);
        } else {
            self.emit_call_by_method(method);
        }
    }

    /// Allocate an object with the given constructor.
    pub fn emit_ctor_by_method(&mut self, method: MethodId, call_site: Option<&MethodSig>) {
        let token = self.image.method_ref(method, call_site);
        self.barrier(Insn::new(Opcode::Newobj, Operand::Token(token)));
    }

    /// Allocate an object of a class given by name, with a constructor signature
    /// rendered as a parameter list, such as `(int32, string)`.
    pub fn emit_new_obj(&mut self, class_name: &str, signature: &str) {
        self.barrier(Insn::new(
            Opcode::Newobj,
            Operand::Token(format!("instance void {class_name}::.ctor{signature}")),
        ));
    }

    /// Allocate a delegate from an object and a function pointer.
    pub fn emit_new_delegate(&mut self, class: ClassId) {
        let name = self.image.class_name(class);
        self.barrier(Insn::new(
            Opcode::Newobj,
            Operand::Token(format!(
                "instance void {name}::.ctor(class [.library]System.Object, native int)"
            )),
        ));
    }

    /// Load a method pointer with `ldftn` or `ldvirtftn`.
    pub fn emit_load_method(&mut self, opcode: Opcode, method: MethodId) {
        let token = self.image.method_ref(method, None);
        self.barrier(Insn::new(opcode, Operand::Token(token)));
    }

    /// Access a field. Volatile fields get a `volatile.` prefix, except when the opcode
    /// only takes their address.
    pub fn emit_field_ref(&mut self, opcode: Opcode, field: FieldId) {
        let token = self.image.field_ref(field);
        let volatile = self.image.field(field).volatile
            && !matches!(opcode, Opcode::Ldflda | Opcode::Ldsflda);
        self.flush();
        if volatile {
            self.output.push(Line::Insn(Insn::simple(Opcode::Volatile)));
        }
        self.output.push(Line::Insn(Insn::new(opcode, Operand::Token(token))));
    }

    /// Emit an instruction taking a class token.
    pub fn emit_class_token(&mut self, opcode: Opcode, class: ClassId) {
        let name = self.image.class_name(class);
        self.emit_class_name(opcode, &name);
    }

    /// Emit an instruction taking a class token, given the class name.
    pub fn emit_class_name(&mut self, opcode: Opcode, name: &ClassName) {
        self.barrier(Insn::new(opcode, Operand::Token(name.to_string())));
    }

    /// Emit an instruction taking a type token. Classes and value types are rendered by
    /// name only, other types in full.
    pub fn emit_type_token(&mut self, opcode: Opcode, ty: &Type) {
        let token = match ty {
            Type::Class(name) | Type::ValueType(name) | Type::Enum(name, _) => name.to_string(),
            _ => ty.to_string(),
        };
        self.barrier(Insn::new(opcode, Operand::Token(token)));
    }

    /// Allocate a vector with `newarr`. Primitive element types are given in their class
    /// form.
    pub fn emit_array_new(&mut self, element: &Type) {
        match element.primitive_class() {
            Some(class) => self.emit_class_name(Opcode::Newarr, &class),
            None => self.emit_type_token(Opcode::Newarr, element),
        }
    }

    /// Allocate a multi-dimensional array, taking one `int32` length per dimension of its
    /// innermost array type.
    pub fn emit_array_ctor(&mut self, array: &Type) {
        let params = rank_params(array.last_nested_array().rank());
        self.barrier(Insn::new(
            Opcode::Newobj,
            Operand::Token(format!("instance void {array}::.ctor({params})")),
        ));
    }

    /// Read an element of a multi-dimensional array.
    ///
    /// # Panics
    /// Panics if the type is not an array.
    pub fn emit_array_get(&mut self, array: &Type) {
        let element = array.element().expect("element access on a non-array type");
        let params = rank_params(array.rank());
        self.barrier(Insn::new(
            Opcode::Call,
            Operand::Token(format!("instance {element} {array}::Get({params})")),
        ));
    }

    /// Write an element of a multi-dimensional array.
    ///
    /// # Panics
    /// Panics if the type is not an array.
    pub fn emit_array_set(&mut self, array: &Type) {
        let element = array.element().expect("element access on a non-array type");
        let indices = "int32, ".repeat(array.rank() as usize);
        self.barrier(Insn::new(
            Opcode::Call,
            Operand::Token(format!("instance void {array}::Set({indices}{element})")),
        ));
    }

    /// Emit the assembly and module declarations that open the listing.
    pub fn emit_modules_and_assemblies(&mut self) {
        let name = self.options.assembly_name.clone();
        let library = quote_identifier(lang::LIBRARY_SCOPE).into_owned();
        self.emit_directive(format!(".assembly extern {library}\n{{\n\t.ver 0:0:0:0\n}}"));
        self.emit_directive(format!(
            ".assembly {}\n{{\n\t.ver 0:0:0:0\n}}",
            quote_identifier(&name)
        ));
        self.emit_directive(format!(".module {}", quote_identifier(&format!("{name}.exe"))));
    }

    /// Open the definition of a class. Nested classes must be opened inside the
    /// definition of their parent.
    pub fn begin_class(&mut self, class: ClassId) {
        let decl = self.image.class(class);
        let (visibility, name) = match decl.nested_parent {
            Some(_) => ("nested public", quote_identifier(&decl.name).into_owned()),
            None => ("public", self.image.class_name(class).to_string()),
        };
        let (sealed, base) = if decl.value_type {
            ("sealed ", "[.library]System.ValueType")
        } else {
            ("", "[.library]System.Object")
        };
        tracing::debug!(class = %name, "begin class");
        self.emit_directive(format!(
            ".class {visibility} auto ansi {sealed}{name} extends {base}\n{{"
        ));
    }

    /// Close the definition opened by the last [`CompilationContext::begin_class`].
    pub fn end_class(&mut self) {
        self.emit_directive("}");
    }
}
