//! Command implementations for the Tally CLI.

use std::collections::HashMap;
use std::fs;

use tally_common::Value;
use tally_vm::{ExitCode, Machine};

/// `tally compile <script>`: print the program listing.
pub fn compile(args: &[String]) -> Result<(), i32> {
    let path = args.first().ok_or_else(|| {
        eprintln!("error: compile requires a script path");
        1
    })?;
    let source = read_file(path)?;
    let program = tally_compiler::compile(&source).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    print!("{program}");
    Ok(())
}

/// `tally run <script> [--vars F] [--balances F] [--meta F]`.
pub fn run(args: &[String]) -> Result<(), i32> {
    let options = RunOptions::parse(args)?;
    let source = read_file(&options.script)?;
    let program = tally_compiler::compile(&source).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let mut machine = Machine::new(&program);
    let printer = machine.printer();

    if let Some(path) = &options.vars {
        let vars: HashMap<String, serde_json::Value> = read_json(path)?;
        machine.set_vars_from_json(vars).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
    }

    let meta: Metadata = match &options.meta {
        Some(path) => read_json(path)?,
        None => HashMap::new(),
    };
    let mut resources = machine.resolve_resources().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    loop {
        let request = match resources.next_request() {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                eprintln!("error: {e}");
                return Err(1);
            }
        };
        let json = meta
            .get(&request.account)
            .and_then(|keys| keys.get(&request.key))
            .ok_or_else(|| {
                eprintln!(
                    "error: no metadata for account {} key {}",
                    request.account, request.key
                );
                1
            })?;
        let value = Value::from_json(request.typ, json).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
        resources.respond(value).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
    }

    let balances: Balances = match &options.balances {
        Some(path) => read_json(path)?,
        None => HashMap::new(),
    };
    let mut resolver = machine.resolve_balances().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    loop {
        let request = match resolver.next_request() {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                eprintln!("error: {e}");
                return Err(1);
            }
        };
        let amount = balances
            .get(&request.account)
            .and_then(|assets| assets.get(&request.asset))
            .copied()
            .unwrap_or(0);
        resolver.respond(amount).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
    }

    let exit = machine.execute().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    if let Some(printer) = printer {
        for value in printer.try_iter() {
            println!("OUT: {value}");
        }
    }

    let postings: Vec<serde_json::Value> = machine
        .postings()
        .iter()
        .map(|p| {
            serde_json::json!({
                "source": p.source,
                "destination": p.destination,
                "asset": p.asset,
                "amount": p.amount,
            })
        })
        .collect();
    let tx_meta: serde_json::Map<String, serde_json::Value> = machine
        .tx_meta()
        .iter()
        .map(|(key, value)| {
            (
                key.clone(),
                serde_json::json!({
                    "type": value.type_tag().name(),
                    "value": value.to_json(),
                }),
            )
        })
        .collect();
    let output = serde_json::json!({
        "postings": postings,
        "tx_meta": tx_meta,
    });
    println!("{output:#}");

    match exit {
        ExitCode::Ok => Ok(()),
        code => Err(code as i32),
    }
}

type Metadata = HashMap<String, HashMap<String, serde_json::Value>>;
type Balances = HashMap<String, HashMap<String, u64>>;

struct RunOptions {
    script: String,
    vars: Option<String>,
    balances: Option<String>,
    meta: Option<String>,
}

impl RunOptions {
    fn parse(args: &[String]) -> Result<RunOptions, i32> {
        let mut script = None;
        let mut vars = None;
        let mut balances = None;
        let mut meta = None;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--vars" => vars = Some(expect_value(&mut iter, "--vars")?),
                "--balances" => balances = Some(expect_value(&mut iter, "--balances")?),
                "--meta" => meta = Some(expect_value(&mut iter, "--meta")?),
                flag if flag.starts_with("--") => {
                    eprintln!("error: unknown flag '{flag}'");
                    return Err(1);
                }
                path if script.is_none() => script = Some(path.to_string()),
                extra => {
                    eprintln!("error: unexpected argument '{extra}'");
                    return Err(1);
                }
            }
        }

        let script = script.ok_or_else(|| {
            eprintln!("error: run requires a script path");
            1
        })?;
        Ok(RunOptions {
            script,
            vars,
            balances,
            meta,
        })
    }
}

fn expect_value<'a>(
    iter: &mut std::slice::Iter<'a, String>,
    flag: &str,
) -> Result<String, i32> {
    iter.next().cloned().ok_or_else(|| {
        eprintln!("error: {flag} requires a file path");
        1
    })
}

fn read_file(path: &str) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read {path}: {e}");
        1
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, i32> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("error: cannot parse {path}: {e}");
        1
    })
}
