//! End-to-end tests: compile small programs and execute the emitted assembly.
//!
//! Every test builds a syntax tree, runs the whole pipeline and checks the
//! value `main` leaves in `%eax` when run on the test machine.

mod common;

use common::{compile, compile_and_run, compile_and_run_with, run};
use minic::ast::{BinaryOperator::*, Expr, Function, Program, Stmt, Type};
use minic::x64::X86Reg;

fn int(v: i32) -> Expr {
    Expr::int(v)
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn bin(op: minic::ast::BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs)
}

#[test]
fn test_return_zero() {
    let program = Program::main(vec![Stmt::ret(int(0))]);
    let asm = compile(&program);
    assert!(asm.starts_with(".text\n"));
    assert!(asm.contains("  movl $0, "));
    assert!(!asm.contains("subq"));
    assert_eq!(run(&asm, "main"), Ok(0));
}

#[test]
fn test_linear_chain() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, int(2)),
        Stmt::declare("b", Type::Int, bin(Add, var("a"), int(3))),
        Stmt::ret(var("b")),
    ]);
    assert_eq!(compile_and_run(&program), 5);
}

#[test]
fn test_reassigned_chain() {
    let program = Program::main(vec![
        Stmt::declare("t", Type::Int, int(5)),
        Stmt::declare("x", Type::Int, bin(Sub, var("t"), int(4))),
        Stmt::declare("a", Type::Int, bin(Add, var("x"), var("x"))),
        Stmt::assign("t", bin(Add, var("t"), var("x"))),
        Stmt::declare("z", Type::Int, bin(Sub, var("t"), int(1))),
        Stmt::ret(var("z")),
    ]);
    assert_eq!(compile_and_run(&program), 5);
}

#[test]
fn test_if_without_else_taken() {
    // The copy into the merge phi before the conditional jump must be
    // overwritten by the copy at the end of the then block.
    let program = Program::main(vec![
        Stmt::declare("x", Type::Int, int(5)),
        Stmt::if_then(
            bin(Greater, var("x"), int(0)),
            Stmt::assign("x", bin(Add, var("x"), int(1))),
        ),
        Stmt::ret(var("x")),
    ]);
    assert_eq!(compile_and_run(&program), 6);
    assert_eq!(compile_and_run_with(&program, &[X86Reg::Rbx]), 6);
}

#[test]
fn test_if_else_merge() {
    let program = Program::main(vec![
        Stmt::declare("x", Type::Int, int(3)),
        Stmt::if_else(
            bin(Less, var("x"), int(5)),
            Stmt::assign("x", bin(Mul, var("x"), int(2))),
            Stmt::assign("x", int(0)),
        ),
        Stmt::ret(var("x")),
    ]);
    assert_eq!(compile_and_run(&program), 6);
}

#[test]
fn test_if_without_else() {
    let program = Program::main(vec![
        Stmt::declare("x", Type::Int, int(10)),
        Stmt::declare("y", Type::Int, int(1)),
        Stmt::if_then(
            bin(Greater, var("x"), int(20)),
            Stmt::assign("y", int(2)),
        ),
        Stmt::ret(bin(Add, var("x"), var("y"))),
    ]);
    assert_eq!(compile_and_run(&program), 11);
}

#[test]
fn test_declared_without_initializer() {
    let program = Program::main(vec![
        Stmt::Declare {
            name: "x".to_string(),
            ty: Type::Int,
            init: None,
        },
        Stmt::declare("c", Type::Int, int(4)),
        Stmt::if_else(
            bin(Equal, var("c"), int(4)),
            Stmt::assign("x", int(1)),
            Stmt::assign("x", int(2)),
        ),
        Stmt::ret(var("x")),
    ]);
    assert_eq!(compile_and_run(&program), 1);
}

fn sum_below(limit: i32) -> Program {
    Program::main(vec![
        Stmt::declare("sum", Type::Int, int(0)),
        Stmt::declare("i", Type::Int, int(0)),
        Stmt::while_loop(
            bin(Less, var("i"), int(limit)),
            Stmt::block(vec![
                Stmt::compound("sum", Add, var("i")),
                Stmt::compound("i", Add, int(1)),
            ]),
        ),
        Stmt::ret(var("sum")),
    ])
}

#[test]
fn test_while_sum() {
    assert_eq!(compile_and_run(&sum_below(10)), 45);
    assert_eq!(compile_and_run(&sum_below(0)), 0);
}

#[test]
fn test_swap_loop_phi_cycle() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, int(1)),
        Stmt::declare("b", Type::Int, int(2)),
        Stmt::declare("i", Type::Int, int(0)),
        Stmt::while_loop(
            bin(Less, var("i"), int(3)),
            Stmt::block(vec![
                Stmt::declare("t", Type::Int, var("a")),
                Stmt::assign("a", var("b")),
                Stmt::assign("b", var("t")),
                Stmt::compound("i", Add, int(1)),
            ]),
        ),
        Stmt::ret(bin(Add, bin(Mul, var("a"), int(10)), var("b"))),
    ]);
    assert_eq!(compile_and_run(&program), 21);
}

#[test]
fn test_nested_loops() {
    let program = Program::main(vec![
        Stmt::declare("count", Type::Int, int(0)),
        Stmt::declare("i", Type::Int, int(0)),
        Stmt::while_loop(
            bin(Less, var("i"), int(4)),
            Stmt::block(vec![
                Stmt::declare("j", Type::Int, int(0)),
                Stmt::while_loop(
                    bin(Less, var("j"), int(3)),
                    Stmt::block(vec![
                        Stmt::compound("count", Add, bin(Mul, var("i"), var("j"))),
                        Stmt::compound("j", Add, int(1)),
                    ]),
                ),
                Stmt::compound("i", Add, int(1)),
            ]),
        ),
        Stmt::ret(var("count")),
    ]);
    assert_eq!(compile_and_run(&program), 18);
}

#[test]
fn test_return_inside_loop() {
    let program = Program::main(vec![
        Stmt::declare("i", Type::Int, int(0)),
        Stmt::while_loop(
            bin(Less, var("i"), int(100)),
            Stmt::block(vec![
                Stmt::if_then(
                    bin(Equal, var("i"), int(7)),
                    Stmt::ret(bin(Mul, var("i"), int(3))),
                ),
                Stmt::compound("i", Add, int(1)),
            ]),
        ),
        Stmt::ret(int(0)),
    ]);
    assert_eq!(compile_and_run(&program), 21);
}

#[test]
fn test_division_and_modulo() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, int(17)),
        Stmt::declare("q", Type::Int, bin(Div, var("a"), int(5))),
        Stmt::declare("r", Type::Int, bin(Mod, var("a"), int(5))),
        Stmt::ret(bin(Add, bin(Mul, var("q"), int(10)), var("r"))),
    ]);
    assert_eq!(compile_and_run(&program), 32);
}

#[test]
fn test_signed_division_truncates() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, Expr::negate(int(17))),
        Stmt::declare("q", Type::Int, bin(Div, var("a"), int(5))),
        Stmt::declare("r", Type::Int, bin(Mod, var("a"), int(5))),
        Stmt::ret(bin(Add, bin(Mul, var("q"), int(10)), var("r"))),
    ]);
    assert_eq!(compile_and_run(&program), -32);
}

#[test]
fn test_ternary_with_logic_and() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, int(4)),
        Stmt::declare(
            "b",
            Type::Bool,
            bin(
                LogicAnd,
                bin(Greater, var("a"), int(2)),
                bin(Less, var("a"), int(10)),
            ),
        ),
        Stmt::ret(Expr::conditional(var("b"), int(10), int(20))),
    ]);
    assert_eq!(compile_and_run(&program), 10);
}

#[test]
fn test_logic_or_and_not() {
    let program = Program::main(vec![
        Stmt::declare(
            "b",
            Type::Bool,
            bin(LogicOr, bin(Greater, int(1), int(2)), bin(Greater, int(3), int(2))),
        ),
        Stmt::declare("n", Type::Bool, Expr::logic_not(var("b"))),
        Stmt::ret(bin(
            Add,
            Expr::conditional(var("b"), int(1), int(0)),
            Expr::conditional(var("n"), int(100), int(10)),
        )),
    ]);
    assert_eq!(compile_and_run(&program), 11);
}

#[test]
fn test_shifts() {
    let program = Program::main(vec![
        Stmt::declare("x", Type::Int, bin(Shl, int(1), int(4))),
        Stmt::ret(bin(Shr, var("x"), int(2))),
    ]);
    assert_eq!(compile_and_run(&program), 4);

    let arithmetic = Program::main(vec![Stmt::ret(bin(Shr, Expr::negate(int(16)), int(2)))]);
    assert_eq!(compile_and_run(&arithmetic), -4);
}

#[test]
fn test_negate_and_bit_not() {
    let program = Program::main(vec![
        Stmt::declare("x", Type::Int, int(5)),
        Stmt::ret(bin(Add, Expr::negate(var("x")), Expr::bit_not(var("x")))),
    ]);
    assert_eq!(compile_and_run(&program), -11);
}

#[test]
fn test_bitwise_operators() {
    let program = Program::main(vec![
        Stmt::declare("a", Type::Int, int(0b1100)),
        Stmt::declare("b", Type::Int, int(0b1010)),
        Stmt::ret(bin(
            Add,
            bin(Mul, bin(BitAnd, var("a"), var("b")), int(100)),
            bin(Add, bin(Mul, bin(BitOr, var("a"), var("b")), int(10)), bin(BitXor, var("a"), var("b"))),
        )),
    ]);
    assert_eq!(compile_and_run(&program), 8 * 100 + 14 * 10 + 6);
}

#[test]
fn test_statements_after_return_are_ignored() {
    let program = Program::main(vec![
        Stmt::ret(int(3)),
        Stmt::ret(int(4)),
    ]);
    let asm = compile(&program);
    assert!(!asm.contains("$4"));
    assert_eq!(run(&asm, "main"), Ok(3));
}

#[test]
fn test_multiple_functions() {
    let program = Program::new(vec![
        Function::new("main", vec![Stmt::ret(int(1))]),
        Function::new(
            "helper",
            vec![
                Stmt::declare("x", Type::Int, int(6)),
                Stmt::ret(bin(Mul, var("x"), int(7))),
            ],
        ),
    ]);
    let asm = compile(&program);
    assert_eq!(run(&asm, "main"), Ok(1));
    assert_eq!(run(&asm, "helper"), Ok(42));
    assert!(asm.contains("helper:\n  call _helper\n"));
}

#[test]
fn test_unused_loop_value_is_not_emitted() {
    let program = Program::main(vec![
        Stmt::declare("i", Type::Int, int(0)),
        Stmt::declare("dead", Type::Int, int(1)),
        Stmt::while_loop(
            bin(Less, var("i"), int(5)),
            Stmt::block(vec![
                Stmt::compound("dead", Mul, int(12345)),
                Stmt::compound("i", Add, int(1)),
            ]),
        ),
        Stmt::ret(var("i")),
    ]);
    let asm = compile(&program);
    assert!(!asm.contains("imull"));
    assert!(!asm.contains("$12345"));
    assert_eq!(run(&asm, "main"), Ok(5));
}

#[test]
fn test_block_labels_are_local_symbols() {
    let program = Program::new(vec![
        Function::new(
            "main",
            vec![
                Stmt::declare("i", Type::Int, int(0)),
                Stmt::while_loop(
                    bin(Less, var("i"), int(3)),
                    Stmt::compound("i", Add, int(1)),
                ),
                Stmt::ret(var("i")),
            ],
        ),
        Function::new("main_header", vec![Stmt::ret(int(7))]),
    ]);
    let asm = compile(&program);
    assert!(asm.contains("\n.Lmain_header:\n"));
    assert!(asm.contains("\nmain_header:\n  call _main_header\n"));
    assert_eq!(run(&asm, "main"), Ok(3));
    assert_eq!(run(&asm, "main_header"), Ok(7));
}
