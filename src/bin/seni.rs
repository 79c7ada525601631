//! The reference CLI harness (§6 "CLI surface").
//!
//! Grounded on the teacher's `monty-cli/src/main.rs`: read the script off
//! disk, time the run, report success/failure with `eprintln!` rather than
//! a logging crate (the teacher's own CLI does the same — no `tracing`
//! subscriber wired up in its `main`).

use std::env;
use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use seni::Host;

struct Args {
    script_path: String,
    dump: bool,
    seed: Option<u64>,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut dump = false;
    let mut seed = None;
    let mut script_path = None;
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "-d" => dump = true,
            "-s" => {
                i += 1;
                let value = raw.get(i).ok_or("-s requires a seed argument")?;
                seed = Some(value.parse::<u64>().map_err(|_| format!("'{value}' is not a valid seed"))?);
            }
            other => script_path = Some(other.to_owned()),
        }
        i += 1;
    }
    Ok(Args { script_path: script_path.ok_or("usage: seni [-d] [-s <seed>] <script>")?, dump, seed })
}

fn read_script(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("error reading {path}: {err}"))
}

fn main() -> ExitCode {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let source = match read_script(&args.script_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut host = Host::systems_startup();

    if args.dump {
        return match host.compile_program(&source) {
            Ok(program) => {
                dump_program(&program);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let start = Instant::now();

    let program = match args.seed {
        Some(seed) => {
            let traits = match host.compile_trait_list(&source) {
                Ok(traits) => traits,
                Err(err) => {
                    eprintln!("error extracting traits: {err}");
                    return ExitCode::FAILURE;
                }
            };
            let genotype = match host.build_genotype(&traits, seed) {
                Ok(genotype) => genotype,
                Err(err) => {
                    eprintln!("error building genotype: {err}");
                    return ExitCode::FAILURE;
                }
            };
            host.compile_program_with_genotype(&source, &genotype)
        }
        None => host.compile_program(&source),
    };
    let program = match program {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error compiling {}: {err}", args.script_path);
            return ExitCode::FAILURE;
        }
    };

    let mut vm = host.allocate_vm();
    let result = host.run(&mut vm, &program);
    let elapsed = start.elapsed();

    match result {
        Ok(()) => {
            let packets = vm.render.packets();
            eprintln!(
                "success after {elapsed:?}: {} render packet(s), {} vertices",
                packets.len(),
                vm.render.total_vertices()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error after {elapsed:?}: {err}");
            eprintln!("({} render packet(s) retained before the failure)", vm.render.packets().len());
            ExitCode::FAILURE
        }
    }
}

fn dump_program(program: &seni::Program) {
    for (i, instr) in program.code.iter().enumerate() {
        println!("{i:>5}: {:<14} {:>8} {:>8}", instr.op.to_string(), instr.arg0, instr.arg1);
    }
}
