/// End-to-end tests: HLML source text in, emitted mlog text out.
///
/// These drive the whole pipeline through in-memory sources, so no files are
/// touched. The exact-output assertions pin the instruction layout the
/// builder promises: fused comparison jumps, compound assignments writing
/// straight to their targets, short-circuit shapes, and procedure blocks
/// after the entrypoint's `end`.

use pretty_assertions::assert_eq;

use hlml::diagnostics::{Diagnostic, DiagnosticKind};
use hlml::Loader;

fn compile_sources(sources: &[(&str, &str)], target: &str) -> Result<String, Diagnostic> {
    let mut loader = Loader::new(vec![]);
    for (name, text) in sources {
        loader.add_virtual(*name, *text);
    }
    hlml::compile(loader, None, target)
}

fn compile_one(text: &str) -> Result<String, Diagnostic> {
    compile_sources(&[("t", text)], "t")
}

// ---------------------------------------------------------------------------
// The canonical scenarios
// ---------------------------------------------------------------------------

#[test]
fn hello_world() {
    let output = compile_one(
        "link message1; entrypoint { mlog::print(\"Hello, Mindustry!\"); mlog::printflush(message1); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "print \"Hello, Mindustry!\"\nprintflush message1\nend\n"
    );
}

#[test]
fn constant_folding_reaches_the_output() {
    let output = compile_one(
        "link cell1; const answer = 40 + 2; const index = 0; entrypoint { mlog::write(answer, cell1, index); }",
    )
    .unwrap();
    assert_eq!(output, "write 42 cell1 0\nend\n");
}

#[test]
fn if_with_inner_declaration() {
    let output = compile_one(
        "link cell1; entrypoint { var v; mlog::read(v, cell1, 0); if v < 1000 { v *= 56; } else { v *= 4; } mlog::write(v, cell1, 1); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "read v cell1 0\n\
         jump 4 greaterThanEq v 1000\n\
         op mul v v 56\n\
         jump 5 always 0 0\n\
         op mul v v 4\n\
         write v cell1 1\n\
         end\n"
    );
}

#[test]
fn cyclic_constant_aborts_compilation() {
    let diagnostic = compile_one("const a = b; const b = a; entrypoint { }").unwrap_err();
    assert!(matches!(diagnostic.kind, DiagnosticKind::CyclicDefinition(_)));
}

#[test]
fn labeled_break_jumps_past_the_outer_loop() {
    let output = compile_one(
        "entrypoint { outer: while 1 { while 1 { break outer; } } }",
    )
    .unwrap();
    assert_eq!(
        output,
        "jump 3 always 0 0\n\
         jump 0 always 0 0\n\
         jump 0 always 0 0\n\
         end\n"
    );
}

#[test]
fn bitwise_not_of_negative_one_folds_away() {
    let output = compile_one("entrypoint { var x = ~(-1); }").unwrap();
    assert_eq!(output, "set x 0\nend\n");
}

// ---------------------------------------------------------------------------
// Statements and expressions
// ---------------------------------------------------------------------------

#[test]
fn global_initializers_come_first() {
    let output = compile_one("var g = 5; entrypoint { g += 1; }").unwrap();
    assert_eq!(output, "set t.g 5\nop add t.g t.g 1\nend\n");
}

#[test]
fn increment_and_decrement_are_single_ops() {
    let output = compile_one("entrypoint { var n = 9; n++; n--; }").unwrap();
    assert_eq!(output, "set n 9\nop add n n 1\nop sub n n 1\nend\n");
}

#[test]
fn while_with_interleaved_and_zero_branch() {
    let output = compile_one(
        "entrypoint { var total = 0; while var i = 0; i < 3; i++ { total += i; } else { total = 99; } }",
    )
    .unwrap();
    assert_eq!(
        output,
        "set total 0\n\
         set i 0\n\
         jump 7 greaterThanEq i 3\n\
         op add total total i\n\
         op add i i 1\n\
         jump 3 lessThan i 3\n\
         jump 8 always 0 0\n\
         set total 99\n\
         end\n"
    );
}

#[test]
fn short_circuit_shapes() {
    let output = compile_one("entrypoint { var a; var b; var c = a && b; var d = a || b; }").unwrap();
    assert_eq!(
        output,
        "set c a\n\
         jump 3 equal c 0\n\
         set c b\n\
         set d a\n\
         jump 7 notEqual d 0\n\
         set d b\n\
         jump 8 always 0 0\n\
         set d 1\n\
         end\n"
    );
}

#[test]
fn member_access_lowers_to_sensor() {
    let output =
        compile_one("link conveyor1; entrypoint { var h = conveyor1.health; mlog::print(h); }")
            .unwrap();
    assert_eq!(output, "sensor h conveyor1 @health\nprint h\nend\n");
}

#[test]
fn member_call_passes_the_receiver_first() {
    // Member calls resolve within the current source only, so the builtin
    // is aliased in first.
    let output = compile_one(
        "link message1; using mlog::printflush; entrypoint { mlog::print(\"hi\"); message1.printflush(); }",
    )
    .unwrap();
    assert_eq!(output, "print \"hi\"\nprintflush message1\nend\n");
}

#[test]
fn unqualified_builtins_do_not_resolve() {
    let diagnostic = compile_one("entrypoint { print(\"hi\"); }").unwrap_err();
    assert!(matches!(diagnostic.kind, DiagnosticKind::UnknownSymbol(name) if name == "print"));
}

#[test]
fn string_and_color_immediates() {
    let output = compile_one("entrypoint { var tint = 0pff8000; mlog::print(\"a b\"); }").unwrap();
    assert_eq!(output, "set tint %ff8000ff\nprint \"a b\"\nend\n");
}

#[test]
fn builtin_constants_emit_their_dashed_names() {
    let output = compile_one(
        "link sorter1; entrypoint { mlog::control_config(sorter1, mlog::phase_fabric); }",
    )
    .unwrap();
    assert_eq!(output, "control config sorter1 @phase-fabric 0 0 0\nend\n");
}

#[test]
fn strict_equal_condition_is_materialized() {
    let output = compile_one("entrypoint { var a; var b; if a === b { a = 1; } }").unwrap();
    assert_eq!(
        output,
        "op strictEqual _r0 a b\n\
         jump 3 equal _r0 0\n\
         set a 1\n\
         end\n"
    );
}

// ---------------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------------

#[test]
fn procedure_blocks_follow_the_entrypoint() {
    let output = compile_one(
        "proc double(v) { return v * 2; } entrypoint { var d = double(21); mlog::print(d); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "set v 21\n\
         op add _ra_double @counter 1\n\
         jump 6 always 0 0\n\
         set d _ret_double\n\
         print d\n\
         end\n\
         op mul _ret_double v 2\n\
         jump 9 always 0 0\n\
         set _ret_double null\n\
         set @counter _ra_double\n\
         end\n"
    );
}

#[test]
fn output_parameters_copy_back() {
    let output = compile_one(
        "proc bump(v&) { v += 1; } entrypoint { var x = 3; bump(x); mlog::print(x); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "set x 3\n\
         set v x\n\
         op add _ra_bump @counter 1\n\
         jump 8 always 0 0\n\
         set x v\n\
         set _r0 _ret_bump\n\
         print x\n\
         end\n\
         op add v v 1\n\
         set _ret_bump null\n\
         set @counter _ra_bump\n\
         end\n"
    );
}

#[test]
fn cross_source_procedure_call() {
    let output = compile_sources(
        &[
            ("lib", "*const step = 4; *proc scaled(v) { return v * step; }"),
            ("t", "entrypoint { var s = lib::scaled(10); mlog::print(s); }"),
        ],
        "t",
    )
    .unwrap();
    assert!(output.contains("op mul _ret_scaled v 4\n"), "{}", output);
    assert!(output.ends_with("end\n"));
}

// ---------------------------------------------------------------------------
// Builtin families
// ---------------------------------------------------------------------------

#[test]
fn radar_call_fills_unselected_filters_with_any() {
    let output = compile_one(
        "link turret1; entrypoint { var closest; mlog::radar_enemy_flying_distance(turret1, 1, closest); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "radar enemy flying any distance turret1 1 closest\nend\n"
    );
}

#[test]
fn uradar_call_has_the_dummy_building_slot() {
    let output = compile_one(
        "entrypoint { var closest; mlog::uradar_ally_health(1, closest); }",
    )
    .unwrap();
    assert_eq!(output, "uradar ally any any health 0 1 closest\nend\n");
}

#[test]
fn ulocate_building_injects_the_ore_dummy() {
    let output = compile_one(
        "entrypoint { var x; var y; var found; var core; mlog::ulocate_building_core(false, x, y, found, core); }",
    )
    .unwrap();
    assert_eq!(
        output,
        "ulocate building core false @copper x y found core\nend\n"
    );
}

#[test]
fn missing_trailing_arguments_emit_null() {
    let output = compile_one("entrypoint { var unit_x; mlog::ucontrol_move(unit_x); }").unwrap();
    assert_eq!(output, "ucontrol move unit_x null 0 0 0\nend\n");
}

// ---------------------------------------------------------------------------
// Diagnostics surface
// ---------------------------------------------------------------------------

#[test]
fn diagnostics_carry_path_line_and_column() {
    let diagnostic = compile_one("entrypoint { mlog::print(frob); }").unwrap_err();
    assert_eq!(
        diagnostic.to_string(),
        "t.hlml:1:26:1:30: error: 'frob' is not a known symbol"
    );
}

#[test]
fn missing_entrypoint_is_reported() {
    let diagnostic = compile_one("const only = 1;").unwrap_err();
    assert!(matches!(diagnostic.kind, DiagnosticKind::MissingEntrypoint(_)));
}

#[test]
fn missing_source_is_an_io_failure() {
    let diagnostic = compile_sources(&[("t", "entrypoint { var x = gone::y; }")], "t").unwrap_err();
    assert!(matches!(diagnostic.kind, DiagnosticKind::IoFailure { .. }));
}

// ---------------------------------------------------------------------------
// Emitted numbers re-lex to the same value
// ---------------------------------------------------------------------------

#[test]
fn formatted_numbers_relex_identically() {
    use hlml::mlog::format_number;
    use hlml::{Lexer, Source, Token};

    for value in [42.0_f64, 0.1, 3.14159, 1.0 / 3.0, 1e-7, 9007199254740991.0] {
        let text = format_number(value);
        let source = Source::new("n", "n.hlml", text.clone());
        let tokens = Lexer::new(source).tokenize().unwrap();
        assert_eq!(tokens.len(), 1, "{}", text);
        let Token::Number(lexed) = &tokens[0].0 else {
            panic!("expected a number for {}", text);
        };
        assert_eq!(*lexed, value, "{}", text);
    }
}
