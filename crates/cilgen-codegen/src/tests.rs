//! Scenario tests that go through several parts of the backend at once: branches and
//! labels in the listing, the ordering guarantees of the peephole queue, and context
//! switches across a small class hierarchy.
use crate::{
    asm::Line,
    image::{MemberKind, MethodSig},
    *,
};
use ast::{Ast, ClassDefn, NodeId, NodeKind};
use lang::{Opcode, Type};
use proptest::prelude::*;
use span::Location;

fn context(peephole: bool) -> CompilationContext {
    CompilationContext::new(Options {
        peephole,
        ..Options::default()
    })
}

/// Create a context with an open static method `Program::Main`.
fn in_method(peephole: bool) -> CompilationContext {
    let mut ctx = context(peephole);
    let class = ctx.image.add_class(None, "Program");
    let main = ctx
        .image
        .add_method(class, "Main", MethodSig::new(Type::Void, Vec::new()));
    ctx.begin_method(main).unwrap();
    ctx
}

#[test]
fn forward_labels_resolve_to_their_placement() {
    let mut ctx = in_method(true);
    let skip = ctx.new_label().unwrap();
    let end = ctx.new_label().unwrap();

    ctx.emit_load_int32(1);
    ctx.jump(Opcode::Brtrue, &skip);
    ctx.jump(Opcode::Br, &end);
    ctx.place(&skip);
    ctx.emit_simple(Opcode::Nop);
    ctx.place(&end);
    ctx.emit_simple(Opcode::Ret);
    ctx.end_method();

    let asm = ctx.finish();
    let positions = asm.label_positions();
    let targets = asm.branch_targets();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].1, skip.id());
    assert_eq!(targets[1].1, end.id());

    for (line, label) in targets {
        let placed = positions[&label];
        assert!(placed > line, "forward branch must target a later line");
        assert_eq!(asm.lines()[placed], Line::Label { id: label, leave: false });
    }
    assert!(asm.to_string().contains("\tbrtrue\t?L1\n\tbr\t?L2\n?L1:\n\tnop\n?L2:\n\tret\n"));
}

#[test]
fn backward_branches() {
    let mut ctx = in_method(false);
    let top = ctx.new_label().unwrap();
    ctx.place(&top);
    ctx.emit_simple(Opcode::Nop);
    ctx.jump(Opcode::BrS, &top);
    ctx.end_method();

    let asm = ctx.finish();
    let (line, label) = asm.branch_targets()[0];
    assert!(asm.label_positions()[&label] < line);
}

#[test]
fn flush_orders_queued_instructions_before_labels() {
    let mut ctx = in_method(true);
    let label = ctx.new_label().unwrap();

    ctx.emit_load_int32(2);
    ctx.emit_load_int32(3);
    ctx.emit_simple(Opcode::Add);
    ctx.flush();
    ctx.place(&label);
    ctx.emit_simple(Opcode::Pop);
    ctx.end_method();

    let listing = ctx.finish();
    let position = |wanted: &Line| listing.lines().iter().position(|line| line == wanted).unwrap();
    let add = position(&Line::Insn(asm::Insn::simple(Opcode::Add)));
    let placed = position(&Line::Label {
        id: label.id(),
        leave: false,
    });
    let pop = position(&Line::Insn(asm::Insn::simple(Opcode::Pop)));
    assert!(add < placed && placed < pop);
}

#[test]
fn labels_are_peephole_barriers() {
    let mut ctx = in_method(true);
    let label = ctx.new_label().unwrap();

    ctx.emit_simple(Opcode::Dup);
    ctx.place(&label);
    ctx.emit_simple(Opcode::Pop);
    ctx.end_method();

    let opcodes: Vec<_> = ctx.finish().insns().map(|insn| insn.opcode).collect();
    assert_eq!(opcodes, vec![Opcode::Dup, Opcode::Pop]);
}

#[test]
fn branch_or_leave_resolution() {
    let mut ctx = in_method(true);
    let exit = ctx.new_leave_label().unwrap();
    let local = ctx.new_leave_label().unwrap();

    ctx.jump(Opcode::Br, &exit);
    ctx.jump(Opcode::Brfalse, &exit);
    ctx.jump(Opcode::LeaveS, &local);
    ctx.place(&local);
    ctx.place_leave(&exit);
    ctx.end_method();

    let text = ctx.finish().to_string();
    assert!(text.contains("\tleave\t?L1\n\tbrfalse\t?L1\n\tbr\t?L2\n?L2:\n?L1:\n"));
    assert!(!text.contains("br.or.leave"));
}

#[test]
fn switch_tables() {
    let mut ctx = in_method(true);
    let cases = [ctx.new_label().unwrap(), ctx.new_label().unwrap()];

    ctx.emit_load_int32(0);
    ctx.switch_start();
    ctx.switch_ref(&cases[0], true);
    ctx.switch_ref(&cases[1], false);
    ctx.switch_end();
    for case in &cases {
        ctx.place(case);
    }
    ctx.end_method();

    let asm = ctx.finish();
    assert!(asm
        .to_string()
        .contains("\tldc.i4.0\n\tswitch (\n\t\t?L1,\n\t\t?L2\n\t)\n"));
    assert_eq!(asm.branch_targets().len(), 2);
}

#[test]
fn switch_commits_instructions_queued_while_open() {
    let mut ctx = in_method(true);
    let case = ctx.new_label().unwrap();

    ctx.switch_start();
    ctx.switch_ref(&case, true);
    ctx.emit_simple(Opcode::Nop);
    ctx.switch_end();
    ctx.place(&case);
    ctx.end_method();

    let text = ctx.finish().to_string();
    assert!(text.contains("\tnop\n\tswitch (\n\t\t?L1\n\t)\n?L1:\n"));
}

#[test]
#[should_panic(expected = "out of order")]
fn switch_first_reference_must_be_flagged() {
    let mut ctx = in_method(true);
    let case = ctx.new_label().unwrap();
    ctx.switch_start();
    ctx.switch_ref(&case, false);
}

#[test]
fn label_statistics() {
    let mut ctx = in_method(true);
    let first = ctx.new_label().unwrap();
    let _second = ctx.new_leave_label().unwrap();
    ctx.place(&first);

    let stats = ctx.label_stats();
    assert_eq!(stats, LabelStats { created: 2, placed: 1 });
}

#[test]
#[should_panic(expected = "placed twice")]
fn placing_twice_is_a_contract_violation() {
    let mut ctx = in_method(true);
    let label = ctx.new_label().unwrap();
    ctx.place(&label);
    ctx.place(&label);
}

#[test]
#[should_panic(expected = "never placed")]
fn unplaced_labels_are_detected_at_method_end() {
    let mut ctx = in_method(true);
    let label = ctx.new_label().unwrap();
    ctx.jump(Opcode::Br, &label);
    ctx.end_method();
}

#[test]
fn too_many_locals() {
    let mut ctx = in_method(false);
    for _ in 0..error::MAX_LOCALS {
        ctx.alloc_local(Type::Int32, None).unwrap();
    }
    let err = ctx.alloc_local(Type::Int32, None).unwrap_err();
    assert!(matches!(err, GenError::TooManyLocals { ref method } if method == "Main"));
}

/// A small program: `namespace Demo { class Outer<T> { int count; event Changed;
/// class Inner { void Map<U>(); } } }`, with every item bound to its node.
struct Fixture {
    ast: Ast,
    ctx: CompilationContext,
    namespace: NodeId,
    outer_node: NodeId,
    inner_node: NodeId,
    outer_formals: NodeId,
    map_formals: NodeId,
    outer_scope: ast::ScopeId,
    inner_scope: ast::ScopeId,
    outer: ClassId,
    inner: ClassId,
    count: FieldId,
    changed: MemberId,
    map: MethodId,
}

impl Fixture {
    fn new() -> Self {
        let mut ast = Ast::new();
        let mut ctx = context(true);
        let at = Location::unknown;

        let global = ctx.scopes.global();
        let demo_scope = ctx
            .scopes
            .create(global, scope::ScopeKind::Namespace("Demo".into()));
        let outer_scope = ctx.scopes.create(demo_scope, scope::ScopeKind::Class);
        let inner_scope = ctx.scopes.create(outer_scope, scope::ScopeKind::Class);

        let namespace = ast.push(NodeKind::Namespace { name: "Demo".into() }, at());
        let outer_change = ast.push(
            NodeKind::ScopeChange {
                scope: outer_scope,
                namespace: Some(namespace),
            },
            at(),
        );
        let inner_change = ast.push(
            NodeKind::ScopeChange {
                scope: inner_scope,
                namespace: Some(namespace),
            },
            at(),
        );
        let outer_formals = ast.push(NodeKind::TypeFormals(vec!["T".into()]), at());
        let map_formals = ast.push(NodeKind::MethodFormals(vec!["U".into()]), at());
        let map_node = ast.push(
            NodeKind::MethodDeclaration {
                name: "Map".into(),
                formals: Some(map_formals),
                body: None,
            },
            at(),
        );
        let count_node = ast.push(
            NodeKind::FieldDeclarator {
                name: "count".into(),
                ty: Type::Int32,
            },
            at(),
        );
        let changed_node = ast.push(
            NodeKind::EventDeclarator {
                name: "Changed".into(),
            },
            at(),
        );
        let inner_node = ast.push(
            NodeKind::ClassDefn(ClassDefn {
                name: "Inner".into(),
                scope_change: Some(inner_change),
                type_formals: None,
                members: vec![map_node],
            }),
            at(),
        );
        let outer_node = ast.push(
            NodeKind::ClassDefn(ClassDefn {
                name: "Outer".into(),
                scope_change: Some(outer_change),
                type_formals: Some(outer_formals),
                members: vec![count_node, changed_node, inner_node],
            }),
            at(),
        );

        let outer = ctx.image.add_class(Some("Demo"), "Outer");
        let inner = ctx.image.add_nested_class(outer, "Inner");
        let count = ctx.image.add_field(outer, "count", Type::Int32);
        let changed = ctx.image.add_member(outer, "Changed", MemberKind::Event);
        let map = ctx
            .image
            .add_method(inner, "Map", MethodSig::instance(Type::Void, Vec::new()));

        ctx.bind_item_to_node(outer, outer_node);
        ctx.bind_item_to_node(inner, inner_node);
        ctx.bind_item_to_node(count, count_node);
        ctx.bind_item_to_node(changed, changed_node);
        ctx.bind_item_to_node(map, map_node);

        Self {
            ast,
            ctx,
            namespace,
            outer_node,
            inner_node,
            outer_formals,
            map_formals,
            outer_scope,
            inner_scope,
            outer,
            inner,
            count,
            changed,
            map,
        }
    }

    fn items(&self) -> [ItemId; 5] {
        [
            self.outer.into(),
            self.inner.into(),
            self.count.into(),
            self.changed.into(),
            self.map.into(),
        ]
    }
}

#[test]
fn member_context_is_the_owning_class() {
    let mut fx = Fixture::new();
    let (ast, ctx) = (&fx.ast, &mut fx.ctx);
    let guard = ctx.enter_item_context(ast, fx.count).unwrap();

    assert_eq!(guard.current_class, Some(fx.outer_node));
    assert_eq!(guard.current_scope, fx.outer_scope);
    assert_eq!(guard.current_namespace, Some(fx.namespace));
    assert_eq!(guard.type_formals, Some(fx.outer_formals));
    assert_eq!(guard.method_formals, None);
}

#[test]
fn method_context_carries_its_formals() {
    let mut fx = Fixture::new();
    let (ast, ctx) = (&fx.ast, &mut fx.ctx);
    let guard = ctx.enter_item_context(ast, fx.map).unwrap();

    assert_eq!(guard.current_class, Some(fx.inner_node));
    assert_eq!(guard.current_scope, fx.inner_scope);
    assert_eq!(guard.type_formals, None);
    assert_eq!(guard.method_formals, Some(fx.map_formals));
}

#[test]
fn class_context_is_the_nested_parent() {
    let mut fx = Fixture::new();
    let (ast, ctx) = (&fx.ast, &mut fx.ctx);

    let guard = ctx.enter_item_context(ast, fx.inner).unwrap();
    assert_eq!(guard.current_class, Some(fx.outer_node));
    assert_eq!(guard.current_scope, fx.outer_scope);
    drop(guard);

    let guard = ctx.enter_item_context(ast, fx.outer).unwrap();
    assert_eq!(guard.current_class, None);
    assert_eq!(guard.current_scope, guard.scopes.global());
    assert_eq!(guard.current_namespace, None);
    assert_eq!(guard.type_formals, None);
}

#[test]
fn nested_context_switches_unwind_in_order() {
    let mut fx = Fixture::new();
    let (ast, ctx) = (&fx.ast, &mut fx.ctx);
    ctx.overflow_insns = true;
    let before = ctx.snapshot();

    let mut field = ctx.enter_item_context(ast, fx.count).unwrap();
    assert!(!field.overflow_insns);
    let in_field = field.snapshot();
    {
        let method = field.enter_item_context(ast, fx.map).unwrap();
        assert_eq!(method.current_class, Some(fx.inner_node));
    }
    assert_eq!(field.snapshot(), in_field);
    leave_item_context(field);
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn unbound_items_have_no_context() {
    let mut fx = Fixture::new();
    let stray = fx.ctx.image.add_field(fx.outer, "stray", Type::Boolean);
    let before = fx.ctx.snapshot();

    assert_eq!(fx.ctx.node_for_item(stray), None);
    assert!(fx.ctx.enter_item_context(&fx.ast, stray).is_none());
    assert_eq!(fx.ctx.snapshot(), before);
    assert_eq!(fx.ctx.bindings.len(), 2);
}

proptest! {
    #[test]
    fn context_switch_restores_everything(
        which in 0usize..5,
        insns in any::<bool>(),
        changed in any::<bool>(),
        class in prop::option::of(0usize..2),
    ) {
        let mut fx = Fixture::new();
        let item = fx.items()[which];
        fx.ctx.overflow_insns = insns;
        fx.ctx.overflow_changed = changed;
        fx.ctx.current_class = class.map(|idx| [fx.outer_node, fx.inner_node][idx]);
        fx.ctx.current_scope = fx.inner_scope;
        let before = fx.ctx.snapshot();

        let guard = fx.ctx.enter_item_context(&fx.ast, item);
        prop_assert!(guard.is_some());
        drop(guard);
        prop_assert_eq!(fx.ctx.snapshot(), before);
    }

    #[test]
    fn binder_round_trip(fields in 1usize..40, members in 0usize..40, extra in 0usize..80) {
        let mut ctx = context(true);
        let mut ast = Ast::new();
        let class = ctx.image.add_class(None, "Bag");

        let mut bound = Vec::new();
        for idx in 0..fields {
            let field = ctx.image.add_field(class, &format!("f{idx}"), Type::Int32);
            let node = ast.push(
                NodeKind::FieldDeclarator { name: format!("f{idx}"), ty: Type::Int32 },
                Location::unknown(),
            );
            ctx.bind_item_to_node(field, node);
            bound.push((ItemId::from(field), node));
        }
        for idx in 0..members {
            let member = ctx.image.add_member(class, &format!("p{idx}"), MemberKind::Property);
            let node = ast.push(
                NodeKind::PropertyDeclaration { name: format!("p{idx}") },
                Location::unknown(),
            );
            ctx.bind_item_to_node(member, node);
            bound.push((ItemId::from(member), node));
        }

        for (item, node) in &bound {
            prop_assert_eq!(ctx.node_for_item(*item), Some(*node));
        }

        let unbound = ctx.image.add_field(class, &format!("u{extra}"), Type::Int32);
        let size = ctx.bindings.len();
        prop_assert_eq!(ctx.node_for_item(unbound), None);
        prop_assert_eq!(ctx.bindings.len(), size);
        prop_assert_eq!(ctx.node_for_item(class), None);
    }
}
