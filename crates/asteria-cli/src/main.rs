use std::io::IsTerminal;
use std::process::ExitCode;
use std::{env, io};

use asteria::{CompilerOptions, Runner, RunnerError, StderrHooks, Value};

fn main() -> ExitCode {
    let mut opts = CompilerOptions::default();
    let mut verbose = false;
    let mut script_path: Option<String> = None;
    let mut script_args: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--no-ptc" => opts.proper_tail_calls = false,
            "-O0" => opts.optimization_level = 0,
            "-O1" => opts.optimization_level = 1,
            "-O2" => opts.optimization_level = 2,
            "-O3" => opts.optimization_level = 3,
            "--" => {
                script_args.extend(args.by_ref());
                break;
            }
            _ if script_path.is_none() => script_path = Some(arg),
            _ => script_args.push(arg),
        }
    }

    let vals: Vec<Value> = script_args.into_iter().map(|s| Value::String(std::rc::Rc::from(s.as_bytes()))).collect();

    if verbose {
        run(script_path, vals, Runner::with_hooks(opts, StderrHooks::new()))
    } else {
        run(script_path, vals, Runner::with_hooks(opts, asteria::NoopHooks))
    }
}

fn run<H: asteria::Hooks>(script_path: Option<String>, args: Vec<Value>, mut runner: Runner<H>) -> ExitCode {
    let load_result = match &script_path {
        Some(path) => runner.reload_file(path),
        None => {
            if io::stdin().is_terminal() {
                eprintln!("error: no script path given and stdin is a terminal");
                return ExitCode::FAILURE;
            }
            runner.reload_stdin()
        }
    };

    if let Err(err) = load_result {
        report_load_error(&err);
        return ExitCode::FAILURE;
    }

    match runner.execute(args) {
        Ok(r) => match r.read() {
            Ok(value) => {
                println!("{value:?}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Err(exc) => {
            eprintln!("{exc}");
            ExitCode::FAILURE
        }
    }
}

fn report_load_error(err: &RunnerError) {
    eprintln!("error: {err}");
}
