//! Lowering of a parsed Brainfuck program to CIL, through the code generation backend.
//!
//! The program becomes the static entry point `Main` of a `BrainfuckProgram` class. The
//! tape is a local `uint8[]` of [`TAPE_LENGTH`] cells and the data pointer a local
//! `int32` index into it. Characters go through `System.Console::Write(char)` and
//! `System.Console::Read()`.
//!
//! The lowering also builds a small AST for the program: one statement node per
//! command, in source order, gathered in the body of the `Main` declaration. Those
//! nodes give the diagnostics their location, and `Main` is lowered inside its own item
//! context, as any front end would do for a method.
use crate::parser::Command;
use ast::{Ast, ClassDefn, NodeId, NodeKind};
use codegen::{
    varusage::{DECLARED, MODIFIED, USED},
    CompilationContext, MethodId, MethodSig, VarSlot, VarUsageTable,
};
use lang::{Opcode, Type};
use span::{LineIndex, Location, Spanned};
use std::rc::Rc;

/// The number of cells of the tape.
pub const TAPE_LENGTH: i32 = 30_000;

/// The name of the class holding the program.
pub const PROGRAM_CLASS: &str = "BrainfuckProgram";

/// The slots tracked by the dataflow table. The tape and the data pointer are the two
/// locals of `Main`; the output is a pseudo-variable, modified by every `.` command.
const TAPE_SLOT: usize = 0;
const PTR_SLOT: usize = 1;
const OUTPUT_SLOT: usize = 2;

/// Compile a parsed program into the context, as a complete compilation unit: assembly
/// and module declarations, then the program class. Returns the AST built for the
/// program.
///
/// # Errors
/// Returns an error if the backend runs out of labels, which only a program with an
/// absurd number of loops can cause.
pub fn compile(
    ctx: &mut CompilationContext,
    filename: &str,
    source: &str,
    program: &[Spanned<Command>],
) -> codegen::Result<Ast> {
    let file: Rc<str> = Rc::from(filename);
    let index = LineIndex::new(source);
    let mut ast = Ast::new();

    let mut statements = Vec::new();
    declare_statements(&mut ast, &file, &index, program, &mut statements);
    let start = Location::new(Rc::clone(&file), 1);
    let body = ast.push(NodeKind::Block(statements.clone()), start.clone());
    let main_node = ast.push(
        NodeKind::MethodDeclaration {
            name: String::from("Main"),
            formals: None,
            body: Some(body),
        },
        start.clone(),
    );
    let class_node = ast.push(
        NodeKind::ClassDefn(ClassDefn {
            name: String::from(PROGRAM_CLASS),
            scope_change: None,
            type_formals: None,
            members: vec![main_node],
        }),
        start,
    );

    let console = ctx
        .image
        .import_class(lang::LIBRARY_SCOPE, "System", "Console");
    let write = ctx.image.add_method(
        console,
        "Write",
        MethodSig::new(Type::Void, vec![Type::Char]),
    );
    let read = ctx
        .image
        .add_method(console, "Read", MethodSig::new(Type::Int32, Vec::new()));

    let class = ctx.image.add_class(None, PROGRAM_CLASS);
    let main = ctx
        .image
        .add_method(class, "Main", MethodSig::new(Type::Void, Vec::new()));
    ctx.image.method_mut(main).entry_point = true;
    ctx.bind_item_to_node(class, class_node);
    ctx.bind_item_to_node(main, main_node);

    tracing::debug!(
        file = filename,
        statements = statements.len(),
        "lowering Brainfuck program"
    );
    ctx.emit_modules_and_assemblies();
    ctx.begin_class(class);
    {
        let Some(mut method) = ctx.enter_item_context(&ast, main) else {
            unreachable!("Main was bound to its declaration above");
        };
        let console = Console { write, read };
        lower_main(&mut method, &ast, &statements, console, main, main_node, program)?;
    }
    ctx.end_class();
    Ok(ast)
}

/// Push one statement node per command, in the order the lowering visits them: a loop
/// comes before the commands of its body.
fn declare_statements(
    ast: &mut Ast,
    file: &Rc<str>,
    index: &LineIndex,
    commands: &[Spanned<Command>],
    out: &mut Vec<NodeId>,
) {
    for command in commands {
        let location = index.locate(file, command.span());
        out.push(ast.push(
            NodeKind::Statement {
                description: command.describe(),
            },
            location,
        ));
        if let Command::Loop(body) = command.inner() {
            declare_statements(ast, file, index, body, out);
        }
    }
}

/// The imported console methods used for input and output.
#[derive(Debug, Clone, Copy)]
struct Console {
    write: MethodId,
    read: MethodId,
}

fn lower_main(
    ctx: &mut CompilationContext,
    ast: &Ast,
    statements: &[NodeId],
    console: Console,
    main: MethodId,
    main_node: NodeId,
    program: &[Spanned<Command>],
) -> codegen::Result<()> {
    ctx.begin_method(main)?;
    let tape = ctx.alloc_local(Type::vector(Type::UInt8), Some("tape"))?;
    let ptr = ctx.alloc_local(Type::Int32, Some("ptr"))?;

    let mut lowering = Lowering {
        ctx,
        ast,
        statements,
        next: 0,
        console,
        tape,
        ptr,
        usage: VarUsageTable::create(None),
        writes: 0,
    };
    lowering.usage.set_status(TAPE_SLOT, DECLARED);
    lowering.usage.set_status(PTR_SLOT, DECLARED);

    lowering.allocate_tape();
    lowering.commands(program)?;
    lowering.ctx.emit_simple(Opcode::Ret);
    lowering.ctx.end_method();
    lowering.check_output(main_node);
    Ok(())
}

struct Lowering<'a> {
    ctx: &'a mut CompilationContext,
    ast: &'a Ast,

    /// The statement nodes, in visiting order, and the index of the next one.
    statements: &'a [NodeId],
    next: usize,

    console: Console,
    tape: VarSlot,
    ptr: VarSlot,

    /// The definite-assignment state of the current control-flow path.
    usage: VarUsageTable,

    /// The number of `.` commands lowered so far.
    writes: usize,
}

impl Lowering<'_> {
    fn next_statement(&mut self) -> NodeId {
        let node = self.statements[self.next];
        self.next += 1;
        node
    }

    /// `tape = new uint8[TAPE_LENGTH]`. The data pointer starts at zero, as all the
    /// locals do.
    fn allocate_tape(&mut self) {
        self.ctx.emit_load_int32(TAPE_LENGTH);
        self.ctx.adjust(1);
        self.ctx.emit_array_new(&Type::UInt8);
        self.ctx.store_local(&self.tape);
        self.ctx.adjust(-1);
        self.usage.set_status(TAPE_SLOT, MODIFIED);
    }

    /// Push the operands of an access to the current cell: the tape and the pointer.
    fn cell_operands(&mut self) {
        self.ctx.load_local(&self.tape);
        self.ctx.load_local(&self.ptr);
        self.ctx.adjust(2);
        self.usage.set_status(TAPE_SLOT, USED);
        self.usage.set_status(PTR_SLOT, USED);
    }

    fn load_cell(&mut self) {
        self.cell_operands();
        self.ctx.load_array(&Type::UInt8);
        self.ctx.adjust(-1);
    }

    /// Start storing into the current cell. The value must be pushed before the store is
    /// committed with [`Lowering::end_store`].
    fn begin_store(&mut self) -> codegen::PendingArrayStore {
        self.cell_operands();
        self.ctx.prepare_store_array(&Type::UInt8)
    }

    fn end_store(&mut self, store: codegen::PendingArrayStore) {
        store.commit(self.ctx);
        self.ctx.adjust(-3);
    }

    fn commands(&mut self, commands: &[Spanned<Command>]) -> codegen::Result<()> {
        for command in commands {
            self.command(command)?;
        }
        Ok(())
    }

    fn command(&mut self, command: &Command) -> codegen::Result<()> {
        let node = self.next_statement();
        match command {
            Command::Add(0) | Command::Shift(0) => {}
            Command::Add(amount) => {
                let store = self.begin_store();
                self.load_cell();
                self.ctx.emit_load_int32(*amount);
                self.ctx.adjust(1);
                self.ctx.emit_arith(Opcode::Add, false);
                self.ctx.adjust(-1);
                self.ctx.emit_arith(Opcode::ConvU1, false);
                self.end_store(store);
            }
            Command::Shift(offset) => {
                self.ctx.load_local(&self.ptr);
                self.ctx.emit_load_int32(*offset);
                self.ctx.adjust(2);
                self.ctx.emit_simple(Opcode::Add);
                self.ctx.store_local(&self.ptr);
                self.ctx.adjust(-2);
                self.usage.set_status(PTR_SLOT, USED | MODIFIED);
            }
            Command::Output => {
                self.load_cell();
                self.ctx.emit_call_by_method(self.console.write);
                self.ctx.adjust(-1);
                self.usage.set_status(OUTPUT_SLOT, MODIFIED);
                self.writes += 1;
            }
            Command::Input => {
                let store = self.begin_store();
                self.ctx.emit_call_by_method(self.console.read);
                self.ctx.adjust(1);
                self.ctx.emit_simple(Opcode::ConvU1);
                self.end_store(store);
            }
            Command::Clear => {
                let store = self.begin_store();
                self.ctx.emit_load_int32(0);
                self.ctx.adjust(1);
                self.end_store(store);
            }
            Command::Loop(body) => self.lower_loop(node, body)?,
        }
        Ok(())
    }

    /// `while (tape[ptr] != 0) { body }`, with the test at the bottom. The body may not
    /// run at all, so the state after the loop is the merge of the state before it and
    /// the state at the end of the body.
    fn lower_loop(&mut self, node: NodeId, body: &[Spanned<Command>]) -> codegen::Result<()> {
        let test = self.ctx.new_label()?;
        let top = self.ctx.new_label()?;

        self.ctx.jump(Opcode::Br, &test);
        self.ctx.place(&top);
        let skipped = VarUsageTable::create(Some(&self.usage));
        self.commands(body)?;

        self.ctx.place(&test);
        self.load_cell();
        self.ctx.jump(Opcode::Brtrue, &top);
        self.ctx.adjust(-1);
        self.usage = VarUsageTable::merge(Some(&skipped), Some(&self.usage));

        if body.is_empty() {
            self.ctx
                .reporter
                .warning(&self.ast[node], "this loop never ends once entered");
        }
        Ok(())
    }

    /// Warn about programs that cannot write anything, and about programs that only
    /// write from loops whose body may be skipped.
    fn check_output(&mut self, main_node: NodeId) {
        let definite = self.usage.get_status(OUTPUT_SLOT) & MODIFIED != 0;
        tracing::debug!(
            writes = self.writes,
            definite,
            max_stack = self.ctx.max_stack(),
            "lowered Main"
        );
        let message = match (self.writes, definite) {
            (0, _) => "the program never writes any output",
            (_, false) => "output is only written inside loops that may never run",
            (_, true) => return,
        };
        self.ctx.reporter.warning(&self.ast[main_node], message);
    }
}
