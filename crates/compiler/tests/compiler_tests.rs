//! Integration tests for the compiler: emitted bytecode, resource tables,
//! and the error-substring contract.

use tally_common::{Account, Asset, Monetary, Opcode, Portion, Resource, Type, Value};
use tally_compiler::compile;

// ============================================================
// Helper functions
// ============================================================

fn op(opcode: Opcode) -> Vec<u8> {
    vec![opcode as u8]
}

fn ipush(n: u64) -> Vec<u8> {
    let mut bytes = vec![Opcode::IPush as u8];
    bytes.extend_from_slice(&n.to_le_bytes());
    bytes
}

fn apush(addr: u16) -> Vec<u8> {
    let mut bytes = vec![Opcode::APush as u8];
    bytes.extend_from_slice(&addr.to_le_bytes());
    bytes
}

fn join(parts: Vec<Vec<u8>>) -> Vec<u8> {
    parts.concat()
}

fn account(name: &str) -> Resource {
    Resource::Constant(Value::Account(Account(name.to_string())))
}

fn asset(code: &str) -> Resource {
    Resource::Constant(Value::Asset(Asset(code.to_string())))
}

fn monetary(code: &str, amount: u64) -> Resource {
    Resource::Constant(Value::Monetary(Monetary {
        asset: Asset(code.to_string()),
        amount,
    }))
}

fn string(s: &str) -> Resource {
    Resource::Constant(Value::String(s.to_string()))
}

fn portion(text: &str) -> Resource {
    Resource::Constant(Value::Portion(text.parse().unwrap()))
}

fn remaining() -> Resource {
    Resource::Constant(Value::Portion(Portion::Remaining))
}

/// Compile and expect an error whose message contains `needle`.
fn expect_error(script: &str, needle: &str) {
    let err = compile(script).unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains(needle),
        "expected error containing '{needle}', got '{message}'"
    );
}

// ============================================================
// Plain statements
// ============================================================

#[test]
fn simple_print() {
    let program = compile("print 1").unwrap();
    assert_eq!(program.instructions, join(vec![ipush(1), op(Opcode::Print)]));
    assert!(program.resources.is_empty());
}

#[test]
fn composite_expression() {
    let program = compile("print 29 + 15 - 2").unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            ipush(29),
            ipush(15),
            op(Opcode::IAdd),
            ipush(2),
            op(Opcode::ISub),
            op(Opcode::Print),
        ])
    );
    assert!(program.resources.is_empty());
}

#[test]
fn fail_statement() {
    let program = compile("fail").unwrap();
    assert_eq!(program.instructions, join(vec![op(Opcode::Fail)]));
    assert!(program.resources.is_empty());
}

#[test]
fn crlf_line_endings() {
    let program = compile("print @a\r\nprint @b").unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            apush(0),
            op(Opcode::Print),
            apush(1),
            op(Opcode::Print),
        ])
    );
    assert_eq!(program.resources, vec![account("a"), account("b")]);
}

#[test]
fn account_constant() {
    let program = compile("print @user:U001").unwrap();
    assert_eq!(
        program.instructions,
        join(vec![apush(0), op(Opcode::Print)])
    );
    assert_eq!(program.resources, vec![account("user:U001")]);
}

#[test]
fn constants_are_interned() {
    let program = compile("print @a\nprint @a").unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            apush(0),
            op(Opcode::Print),
            apush(0),
            op(Opcode::Print),
        ])
    );
    assert_eq!(program.resources.len(), 1);
}

#[test]
fn set_tx_meta() {
    let program = compile(r#"set_tx_meta("beneficiary", @platform)"#).unwrap();
    assert_eq!(
        program.instructions,
        join(vec![apush(0), apush(1), op(Opcode::TxMeta)])
    );
    assert_eq!(
        program.resources,
        vec![account("platform"), string("beneficiary")]
    );
}

#[test]
fn set_tx_meta_with_variable() {
    let program = compile(
        r#"
        vars {
            portion $commission
        }
        set_tx_meta("fee", $commission)
        "#,
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![apush(0), apush(1), op(Opcode::TxMeta)])
    );
    assert_eq!(
        program.resources,
        vec![
            Resource::Parameter {
                typ: Type::Portion,
                name: "commission".to_string()
            },
            string("fee"),
        ]
    );
    assert_eq!(program.var_decls.len(), 1);
    assert_eq!(program.var_decls[0].name, "commission");
}

#[test]
fn comments_are_skipped() {
    let program = compile(
        "
        /* This is a multi-line comment, it spans multiple lines
        and /* doesn't choke on nested comments */ ! */
        vars {
            account $a
        }
        // this is a single-line comment
        print $a
        ",
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![apush(0), op(Opcode::Print)])
    );
    assert_eq!(
        program.resources,
        vec![Resource::Parameter {
            typ: Type::Account,
            name: "a".to_string()
        }]
    );
}

// ============================================================
// Sends: emitted code
// ============================================================

#[test]
fn send_simple() {
    let program = compile(
        "send [EUR/2 99] (
            source = @alice
            destination = @bob
        )",
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            apush(1),              // @alice
            apush(0),              // @alice, [EUR/2 99]
            op(Opcode::Asset),     // @alice, EUR/2
            op(Opcode::TakeAll),   // [EUR/2 @alice <balance>]
            apush(0),              // ..., [EUR/2 99]
            op(Opcode::Take),      // remainder, taken
            ipush(1),
            op(Opcode::Bump),      // taken, remainder
            op(Opcode::Repay),     // taken
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(2),              // @bob
            op(Opcode::Send),
            op(Opcode::Repay),
        ])
    );
    assert_eq!(
        program.resources,
        vec![monetary("EUR/2", 99), account("alice"), account("bob")]
    );
}

#[test]
fn send_all() {
    let program = compile(
        "send [EUR/2 *] (
            source = @alice
            destination = @bob
        )",
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            apush(1),            // @alice
            apush(0),            // @alice, EUR/2
            op(Opcode::TakeAll), // the whole balance
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(2),            // @bob
            op(Opcode::Send),
            op(Opcode::Repay),
        ])
    );
    assert_eq!(
        program.resources,
        vec![asset("EUR/2"), account("alice"), account("bob")]
    );
}

#[test]
fn destination_allotment() {
    let program = compile(
        "send [EUR/2 43] (
            source = @foo
            destination = {
                1/8 to @bar
                7/8 to @baz
            }
        )",
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            // source
            apush(1),
            apush(0),
            op(Opcode::Asset),
            op(Opcode::TakeAll),
            apush(0),
            op(Opcode::Take),
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::Repay),
            // destination allotment
            op(Opcode::FundingSum),
            apush(2), // 7/8 (portions are pushed in reverse order)
            apush(3), // 1/8
            ipush(2),
            op(Opcode::MakeAllotment),
            op(Opcode::Alloc),
            ipush(2),
            op(Opcode::Bump),
            // first sub-destination: @bar
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::Take),
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(4),
            op(Opcode::Send),
            ipush(1),
            op(Opcode::Bump),
            ipush(2),
            op(Opcode::FundingAssemble),
            // second sub-destination: @baz
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::Take),
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(5),
            op(Opcode::Send),
            ipush(1),
            op(Opcode::Bump),
            ipush(2),
            op(Opcode::FundingAssemble),
            op(Opcode::Repay),
        ])
    );
    assert_eq!(
        program.resources,
        vec![
            monetary("EUR/2", 43),
            account("foo"),
            portion("7/8"),
            portion("1/8"),
            account("bar"),
            account("baz"),
        ]
    );
}

#[test]
fn destination_in_order() {
    let program = compile(
        "send [COIN 50] (
            source = @a
            destination = {
                max [COIN 10] to @b
                remaining to @c
            }
        )",
    )
    .unwrap();
    assert_eq!(
        program.instructions,
        join(vec![
            // source
            apush(1),
            apush(0),
            op(Opcode::Asset),
            op(Opcode::TakeAll),
            apush(0),
            op(Opcode::Take),
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::Repay),
            // ordered destination: accumulator, then the capped step
            op(Opcode::FundingSum),
            op(Opcode::Asset),
            ipush(0),
            op(Opcode::MonetaryNew),
            ipush(1),
            op(Opcode::Bump),
            apush(2), // [COIN 10]
            op(Opcode::TakeMax),
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(3), // @b
            op(Opcode::Send),
            op(Opcode::FundingSum),
            ipush(3),
            op(Opcode::Bump),
            op(Opcode::MonetaryAdd),
            ipush(1),
            op(Opcode::Bump),
            ipush(2),
            op(Opcode::Bump),
            ipush(2),
            op(Opcode::FundingAssemble),
            // the final `remaining` step
            op(Opcode::FundingReverse),
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::Take),
            op(Opcode::FundingReverse),
            ipush(1),
            op(Opcode::Bump),
            op(Opcode::FundingReverse),
            op(Opcode::FundingSum),
            op(Opcode::Take),
            apush(4), // @c
            op(Opcode::Send),
            ipush(1),
            op(Opcode::Bump),
            ipush(2),
            op(Opcode::FundingAssemble),
            op(Opcode::Repay),
        ])
    );
    assert_eq!(
        program.resources,
        vec![
            monetary("COIN", 50),
            account("a"),
            monetary("COIN", 10),
            account("b"),
            account("c"),
        ]
    );
}

#[test]
fn allocation_percentages_reduce_to_fractions() {
    let program = compile(
        "send [EUR/2 43] (
            source = @foo
            destination = {
                12.5% to @bar
                37.5% to @baz
                50% to @qux
            }
        )",
    )
    .unwrap();
    assert_eq!(
        program.resources,
        vec![
            monetary("EUR/2", 43),
            account("foo"),
            portion("1/2"),
            portion("3/8"),
            portion("1/8"),
            account("bar"),
            account("baz"),
            account("qux"),
        ]
    );
}

#[test]
fn metadata_variables() {
    let program = compile(
        r#"
        vars {
            account $sale
            account $seller = meta($sale, "seller")
            portion $commission = meta($seller, "commission")
        }
        send [EUR/2 53] (
            source = $sale
            destination = {
                $commission to @platform
                remaining to $seller
            }
        )"#,
    )
    .unwrap();
    assert_eq!(
        program.resources,
        vec![
            Resource::Parameter {
                typ: Type::Account,
                name: "sale".to_string()
            },
            Resource::Metadata {
                typ: Type::Account,
                source_account: 0,
                key: "seller".to_string()
            },
            Resource::Metadata {
                typ: Type::Portion,
                source_account: 1,
                key: "commission".to_string()
            },
            monetary("EUR/2", 53),
            remaining(),
            account("platform"),
        ]
    );
    // Only the caller-supplied parameter is a declared variable.
    assert_eq!(program.var_decls.len(), 1);
    assert_eq!(program.var_decls[0].name, "sale");
}

#[test]
fn needed_balances_are_recorded_per_account() {
    let program = compile(
        "send [GEM 15] (
            source = { @a @b }
            destination = @c
        )",
    )
    .unwrap();
    // @a and @b each need a balance in the send's asset; @c gets credits
    // only.
    assert_eq!(program.needed_balances.len(), 2);
    for assets in program.needed_balances.values() {
        assert_eq!(assets.len(), 1);
    }
}

// ============================================================
// Compile-time rejections
// ============================================================

#[test]
fn undeclared_variable() {
    expect_error("print $nope", "declared");
}

#[test]
fn duplicate_variable() {
    expect_error(
        "vars {
            account $a
            portion $a
        }
        print $a",
        "declared",
    );
}

#[test]
fn invalid_type_in_send_value() {
    expect_error(
        "send @a (
            source = {
                @a
                [GEM 2]
            }
            destination = @b
        )",
        "wrong type",
    );
}

#[test]
fn invalid_type_in_source() {
    expect_error(
        "send [USD/2 99] (
            source = {
                @a
                [GEM 2]
            }
            destination = @b
        )",
        "wrong type",
    );
}

#[test]
fn number_as_source() {
    expect_error(
        "send [EUR/2 200] (
            source = 200
            destination = @bob
        )",
        "expected",
    );
}

#[test]
fn syntax_error() {
    expect_error("print fail", "mismatched input");
}

#[test]
fn prevent_take_all_from_world() {
    expect_error(
        "send [GEM *] (
            source = @world
            destination = @foo
        )",
        "cannot",
    );
}

#[test]
fn prevent_add_to_bottomless_source() {
    expect_error(
        "send [GEM 1000] (
            source = {
                @a
                @world
                @c
            }
            destination = @out
        )",
        "world",
    );
}

#[test]
fn prevent_add_to_bottomless_source_nested() {
    expect_error(
        "send [GEM 1000] (
            source = {
                {
                    @a
                    @world
                }
                {
                    @b
                    @world
                }
            }
            destination = @out
        )",
        "world",
    );
}

#[test]
fn prevent_source_already_emptied() {
    expect_error(
        "send [GEM 1000] (
            source = {
                {
                    @a
                    @world
                }
                @a
            }
            destination = @out
        )",
        "@a",
    );
}

#[test]
fn prevent_take_all_from_allotment() {
    expect_error(
        "send [GEM *] (
            source = {
                50% from @a
                50% from @b
            }
            destination = @out
        )",
        "all",
    );
}

#[test]
fn overflowing_allocation() {
    // > 100%
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                2/3 to @a
                2/3 to @b
            }
        )",
        "100%",
    );

    // = 100% + remaining
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                1/2 to @a
                1/2 to @b
                remaining to @c
            }
        )",
        "100%",
    );

    // > 100% + remaining
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                2/3 to @a
                1/2 to @b
                remaining to @c
            }
        )",
        "100%",
    );

    // two `remaining`
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                2/3 to @a
                remaining to @b
                remaining to @c
            }
        )",
        "remaining in the same",
    );

    // variable + two `remaining`
    expect_error(
        "vars {
            portion $p
        }
        send [GEM 15] (
            source = @world
            destination = {
                $p to @a
                remaining to @b
                remaining to @c
            }
        )",
        "remaining in the same",
    );

    // > 100% with remaining and a variable
    expect_error(
        "vars {
            portion $prop
        }
        send [GEM 15] (
            source = @world
            destination = {
                1/2 to @a
                2/3 to @b
                remaining to @c
                $prop to @d
            }
        )",
        "100%",
    );

    // a variable with no remaining can never be proven to reach 100%
    expect_error(
        "vars {
            portion $prop
        }
        send [GEM 15] (
            source = @world
            destination = {
                2/3 to @a
                $prop to @b
            }
        )",
        "100%",
    );

    // below 100% with no remaining
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                1/3 to @a
                1/3 to @b
            }
        )",
        "100%",
    );
}

#[test]
fn allocation_wrong_destination() {
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = [GEM 10]
        )",
        "account",
    );
    expect_error(
        "send [GEM 15] (
            source = @world
            destination = {
                2/3 to @a
                1/3 to [GEM 10]
            }
        )",
        "account",
    );
}

#[test]
fn allocation_invalid_portion_variable() {
    let err = compile(
        "vars {
            account $p
        }
        send [GEM 15] (
            source = @world
            destination = {
                10% to @a
                $p to @b
            }
        )",
    )
    .unwrap_err()
    .to_string();
    assert!(err.contains("type"), "got '{err}'");
    assert!(!err.contains("wrong type"), "got '{err}'");
}

#[test]
fn source_allotment_splits_with_takes() {
    // A source allotment compiles: amount, portions (reversed), allotment,
    // per-share take with repay, and a final assemble.
    let program = compile(
        "send [GEM 10] (
            source = {
                3/5 from @a
                2/5 from @b
            }
            destination = @c
        )",
    )
    .unwrap();
    let code = program.instructions;
    let allotments = code
        .iter()
        .filter(|b| **b == Opcode::MakeAllotment as u8)
        .count();
    assert_eq!(allotments, 1);
    let assembles = code
        .iter()
        .filter(|b| **b == Opcode::FundingAssemble as u8)
        .count();
    assert_eq!(assembles, 1);
    assert_eq!(
        program.resources,
        vec![
            monetary("GEM", 10),
            portion("2/5"),
            portion("3/5"),
            account("a"),
            account("b"),
            account("c"),
        ]
    );
}

#[test]
fn nested_allotment_source_is_rejected() {
    expect_error(
        "send [GEM 10] (
            source = {
                @a
                { 1/2 from @b, 1/2 from @c }
            }
            destination = @d
        )",
        "allotment",
    );
}

#[test]
fn resource_table_overflow() {
    let mut script = String::new();
    for i in 0..70_000 {
        script.push_str(&format!("print @acc:{i}\n"));
    }
    expect_error(&script, "exceeded");
}
