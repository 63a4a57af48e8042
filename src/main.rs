// dynlisp REPL
//
// `dynlisp [--no-prelude] [-e EXPR]... [FILE]`. Files and expressions are
// evaluated in order; without either an interactive loop starts.

use dynlisp::context::InterpreterConfig;
use dynlisp::error::Error;
use dynlisp::eval::Interpreter;
use dynlisp::types::Value;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

const HISTORY_FILE: &str = ".dynlisp_history";

enum Task {
    File(String),
    Expr(String),
}

fn usage() -> ! {
    eprintln!("usage: dynlisp [--no-prelude] [-e EXPR]... [FILE]");
    std::process::exit(2);
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("DYNLISP_LOG", "warn")).init();

    let mut config = InterpreterConfig::default();
    let mut tasks = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-prelude" => config.load_prelude = false,
            "-e" => match args.next() {
                Some(expr) => tasks.push(Task::Expr(expr)),
                None => usage(),
            },
            "-h" | "--help" => usage(),
            _ if arg.starts_with('-') => usage(),
            _ => tasks.push(Task::File(arg)),
        }
    }

    let mut interp = Interpreter::new(config);

    if !tasks.is_empty() {
        for task in tasks {
            let result = match &task {
                Task::File(path) => interp.load_file(path),
                Task::Expr(expr) => interp.eval_str(expr),
            };
            match result {
                Ok(value) => {
                    if let Task::Expr(_) = task {
                        println!("{}", interp.print_value(&value, true));
                    }
                }
                Err(e) => {
                    eprintln!("{}", interp.describe_error(&e));
                    std::process::exit(1);
                }
            }
        }
        return Ok(());
    }

    repl(&mut interp)
}

fn repl(interp: &mut Interpreter) -> io::Result<()> {
    println!("dynlisp v{}", env!("CARGO_PKG_VERSION"));
    println!("Type (quit) or Ctrl-D to exit");
    println!();

    // *1* *2* *3* hold the last three results
    let history_vars = ["*1*", "*2*", "*3*"];
    for name in history_vars {
        if let Err(e) = interp.define_global(name, Value::Null) {
            log::warn!("cannot bind {name}: {e}");
        }
    }

    let mut rl = DefaultEditor::new().map_err(io::Error::other)?;
    if rl.load_history(HISTORY_FILE).is_err() {
        log::debug!("no previous history");
    }

    let mut code_buffer = String::new();
    loop {
        let prompt = if code_buffer.is_empty() {
            format!("{}> ", current_package_name(interp))
        } else {
            ".....> ".to_string()
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let trimmed = line.trim();
                if code_buffer.is_empty() && (trimmed == "(quit)" || trimmed == "(exit)") {
                    println!("Goodbye!");
                    break;
                }
                if trimmed.is_empty() && code_buffer.is_empty() {
                    continue;
                }
                code_buffer.push_str(&line);
                code_buffer.push('\n');

                // Keep reading while the buffer ends inside a datum
                match interp.read_str(&code_buffer) {
                    Err(Error::Syntax(e)) if e.is_eof() => continue,
                    Err(e) => {
                        println!("{}", interp.describe_error(&e));
                        code_buffer.clear();
                        continue;
                    }
                    Ok(_) => {}
                }

                match interp.eval_str(&code_buffer) {
                    Ok(value) => {
                        println!("{}", interp.print_value(&value, true));
                        shift_history(interp, &history_vars, value);
                    }
                    Err(e) => println!("{}", interp.describe_error(&e)),
                }
                code_buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                if code_buffer.is_empty() {
                    println!("CTRL-C");
                    break;
                }
                code_buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

fn current_package_name(interp: &Interpreter) -> String {
    interp
        .symbols
        .package_name(interp.current_package)
        .unwrap_or_else(|| "?".to_string())
}

fn shift_history(interp: &mut Interpreter, names: &[&str; 3], value: Value) {
    let older: Vec<Value> = names[..2]
        .iter()
        .map(|name| interp.global_value(name).unwrap_or_default())
        .collect();
    let updates = [(names[0], value), (names[1], older[0].clone()), (names[2], older[1].clone())];
    for (name, value) in updates {
        let _ = interp.define_global(name, value);
    }
}
