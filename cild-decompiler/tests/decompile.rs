use cild_decompiler::{Diagnostic, MethodContext, decompile, decompile_with_diagnostics};
use cild_ir::instruction::Instruction;

fn ctx(name: &str, ret: &str, params: &[&str], locals: &[&str]) -> MethodContext {
    MethodContext::new(name, ret, params, locals)
}

// --- branch-free sequences ---

#[test]
fn straight_line_emits_one_statement_per_effect() {
    let listing = "IL_0000: ldc.i4.5\n\
                   IL_0001: stloc.0\n\
                   IL_0002: ldloc.0\n\
                   IL_0003: ldc.i4.1\n\
                   IL_0004: add\n\
                   IL_0005: stloc.1\n\
                   IL_0006: ret\n";
    let out = decompile(listing, &ctx("Bump", "void", &[], &["int", "int"]));
    assert_eq!(
        out,
        "void Bump() {\n    num0 = 5;\n    num1 = num0 + 1;\n    return;\n}\n"
    );
    assert!(!out.contains("goto"));
}

#[test]
fn add_of_two_args_renders_plain_return() {
    let listing = "IL_0000: ldarg.1\n\
                   IL_0001: ldarg.2\n\
                   IL_0002: add\n\
                   IL_0003: ret\n";
    let out = decompile(listing, &ctx("Add", "int", &["int", "int"], &[]));
    assert!(out.lines().any(|l| l == "    return arg0 + arg1;"));
}

#[test]
fn string_constant_return() {
    let listing = "IL_0000: ldstr \"a\"\n\
                   IL_0001: ret\n";
    let out = decompile(listing, &ctx("Name", "string", &[], &[]));
    assert!(out.lines().any(|l| l == "    return \"a\";"));
}

// --- loops ---

#[test]
fn counted_loop_renders_for_header_with_less_than() {
    let listing = "IL_0000: ldc.i4.0\n\
                   IL_0001: stloc.0\n\
                   IL_0002: ldloc.0\n\
                   IL_0003: ldc.i4.5\n\
                   IL_0004: blt IL_0002\n\
                   IL_0005: ret\n";
    let out = decompile(listing, &ctx("Count", "void", &[], &["int"]));
    assert!(out.contains("for (num0 = 0; num0 < 5; num0++) {"));
    assert!(!out.contains("goto"));
}

#[test]
fn top_tested_loop_renders_while() {
    let listing = "IL_0000: ldloc.0\n\
                   IL_0001: ldc.i4.10\n\
                   IL_0002: bge IL_0008\n\
                   IL_0003: ldloc.0\n\
                   IL_0004: ldc.i4.1\n\
                   IL_0005: add\n\
                   IL_0006: stloc.0\n\
                   IL_0007: br IL_0000\n\
                   IL_0008: ret\n";
    let out = decompile(listing, &ctx("Tick", "void", &[], &["int"]));
    assert_eq!(
        out,
        "void Tick() {\n    while (num0 < 10) {\n        num0 = num0 + 1;\n    }\n    return;\n}\n"
    );
}

#[test]
fn bottom_tested_loop_renders_do_while() {
    let listing = "IL_0000: br IL_0005\n\
                   IL_0001: ldloc.0\n\
                   IL_0002: ldc.i4.1\n\
                   IL_0003: add\n\
                   IL_0004: stloc.0\n\
                   IL_0005: ldloc.0\n\
                   IL_0006: ldc.i4.9\n\
                   IL_0007: blt IL_0001\n\
                   IL_0008: ret\n";
    let out = decompile(listing, &ctx("Pump", "void", &[], &["int"]));
    assert!(out.contains("    do {\n"));
    assert!(out.contains("    } while (num0 < 9);\n"));
    // The entry jump into the tail condition is implied by the rendering.
    assert!(!out.contains("goto"));
}

#[test]
fn unrecognized_loop_shape_renders_flat_goto() {
    let listing = "IL_0000: ldloc.0\n\
                   IL_0001: brtrue IL_0000\n\
                   IL_0002: ret\n";
    let out = decompile(listing, &ctx("Spin", "void", &[], &["int"]));
    assert!(out.contains("if (num0) goto IL_0000;"));
    assert!(!out.contains("while"));
}

// --- conditionals ---

#[test]
fn forward_branch_renders_guarded_block() {
    let listing = "IL_0000: ldarg.1\n\
                   IL_0001: ldc.i4.0\n\
                   IL_0002: ble IL_0005\n\
                   IL_0003: ldc.i4.1\n\
                   IL_0004: stloc.0\n\
                   IL_0005: ret\n";
    let out = decompile(listing, &ctx("Clamp01", "int", &["int"], &["int"]));
    assert_eq!(
        out,
        "int Clamp01(int arg0) {\n    if (arg0 > 0) {\n        num0 = 1;\n    }\n    return;\n}\n"
    );
}

// --- switches ---

#[test]
fn switch_renders_case_per_target_plus_default() {
    let listing = "IL_0000: ldloc.0\n\
                   IL_0001: switch (IL_0003, IL_0004, IL_0005)\n\
                   IL_0002: ret\n\
                   IL_0003: ret\n\
                   IL_0004: ret\n\
                   IL_0005: ret\n";
    let out = decompile(listing, &ctx("Pick", "void", &[], &["int"]));
    assert!(out.contains("switch (num0) {"));
    assert_eq!(out.matches("case ").count(), 3);
    assert!(out.contains("case 0:"));
    assert!(out.contains("case 2:"));
    assert_eq!(out.matches("default:").count(), 1);
    assert_eq!(out.matches("break;").count(), 4);
}

// --- try/finally ---

#[test]
fn leave_endfinally_pair_renders_try_finally() {
    let listing = "IL_0000: ldstr \"x\"\n\
                   IL_0001: stloc.0\n\
                   IL_0002: leave IL_0006\n\
                   IL_0003: ldc.i4.0\n\
                   IL_0004: stloc.1\n\
                   IL_0005: endfinally\n\
                   IL_0006: ret\n";
    let out = decompile(listing, &ctx("Guarded", "void", &[], &["string", "int"]));
    assert_eq!(
        out,
        "void Guarded() {\n    try {\n        str0 = \"x\";\n    } finally {\n        num0 = 0;\n    }\n    return;\n}\n"
    );
}

#[test]
fn sequential_try_regions_render_two_finallys() {
    let listing = "IL_0000: ldc.i4.1\n\
                   IL_0001: stloc.0\n\
                   IL_0002: leave IL_0004\n\
                   IL_0003: endfinally\n\
                   IL_0004: ldc.i4.2\n\
                   IL_0005: stloc.0\n\
                   IL_0006: leave IL_0008\n\
                   IL_0007: endfinally\n\
                   IL_0008: ret\n";
    let out = decompile(listing, &ctx("Twice", "void", &[], &["int"]));
    assert_eq!(out.matches("try {").count(), 2);
    assert_eq!(out.matches("} finally {").count(), 2);
    assert!(!out.contains("goto"));
}

// --- calls ---

#[test]
fn static_void_call_becomes_statement() {
    let listing = "IL_0000: ldstr \"hi\"\n\
                   IL_0001: call void Debug::Log(string)\n\
                   IL_0002: ret\n";
    let out = decompile(listing, &ctx("Say", "void", &[], &[]));
    assert!(out.lines().any(|l| l == "    Debug.Log(\"hi\");"));
}

#[test]
fn instance_field_read_through_receiver() {
    let listing = "IL_0000: ldarg.0\n\
                   IL_0001: ldfld int Foo::count\n\
                   IL_0002: ldc.i4.1\n\
                   IL_0003: add\n\
                   IL_0004: ret\n";
    let out = decompile(listing, &ctx("Next", "int", &[], &[]));
    assert!(out.lines().any(|l| l == "    return this.count + 1;"));
}

#[test]
fn constructor_store_renders_typed_declaration() {
    let listing = "IL_0000: newobj instance void System.Text.StringBuilder::.ctor()\n\
                   IL_0001: stloc.0\n\
                   IL_0002: ret\n";
    let out = decompile(
        listing,
        &ctx("Make", "void", &[], &["System.Text.StringBuilder"]),
    );
    assert!(
        out.lines()
            .any(|l| l == "    StringBuilder stringbuilder0 = new StringBuilder();")
    );
}

// --- degradation ---

#[test]
fn unrecognized_mnemonic_degrades_to_comment() {
    let listing = "IL_0000: foo\n\
                   IL_0001: ret\n";
    let result = decompile_with_diagnostics(listing, &ctx("M", "void", &[], &[]));
    assert!(result.source.lines().any(|l| l == "    // Unhandled: foo"));
    assert!(result.source.contains("return;"));
    assert_eq!(
        result.diagnostics,
        vec![Diagnostic::UnhandledOpcode {
            index: 0,
            mnemonic: "foo".to_owned()
        }]
    );
}

#[test]
fn diagnostics_do_not_change_default_output() {
    let listing = "not instruction text at all\n\
                   IL_0000: foo\n\
                   IL_0001: ret\n";
    let c = ctx("M", "void", &[], &[]);
    let plain = decompile(listing, &c);
    let with = decompile_with_diagnostics(listing, &c);
    assert_eq!(plain, with.source);
    assert_eq!(with.diagnostics.len(), 2);
    assert!(matches!(
        with.diagnostics[0],
        Diagnostic::SkippedLine { line: 1, .. }
    ));
}

#[test]
fn empty_listing_emits_empty_method() {
    let out = decompile("", &ctx("Nothing", "void", &[], &[]));
    assert_eq!(out, "void Nothing() {\n}\n");
}

// --- determinism & overloads ---

#[test]
fn identical_input_yields_identical_output() {
    let listing = "IL_0000: ldc.i4.0\n\
                   IL_0001: stloc.0\n\
                   IL_0002: ldloc.0\n\
                   IL_0003: ldc.i4.5\n\
                   IL_0004: blt IL_0002\n\
                   IL_0005: ret\n";
    let c = ctx("Count", "void", &[], &["int"]);
    let a = decompile(listing, &c);
    let b = decompile(listing, &c);
    assert_eq!(a, b);
}

#[test]
fn prebuilt_instruction_list_matches_text_parse() {
    let listing = "IL_0000: ldarg.1\n\
                   IL_0001: ldarg.2\n\
                   IL_0002: add\n\
                   IL_0003: ret\n";
    let c = ctx("Add", "int", &["int", "int"], &[]);
    let from_text = decompile(listing, &c);

    let insns = vec![
        Instruction::with_offset(0, "ldarg.1", None),
        Instruction::with_offset(1, "ldarg.2", None),
        Instruction::with_offset(2, "add", None),
        Instruction::with_offset(3, "ret", None),
    ];
    let from_list = cild_decompiler::decompile_instructions(insns, &c);
    assert_eq!(from_text, from_list);
}
