use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use std::process;
use stratus::execution::executor::Executor;
use stratus::parser;
use stratus::self_test;

fn main() {
    let mut args = std::env::args().skip(1);
    let env_dir = match (args.next(), args.next()) {
        (Some(dir), None) => PathBuf::from(dir),
        _ => {
            eprintln!("Usage: stratus dbenvpath");
            process::exit(1);
        }
    };

    if let Err(e) = fs::create_dir_all(&env_dir) {
        eprintln!("Error: cannot use environment {}: {}", env_dir.display(), e);
        process::exit(1);
    }

    let mut executor = match Executor::new(&env_dir) {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!(
        "(stratus: running with database environment at {})",
        env_dir.display()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    loop {
        let line = match rl.readline("SQL> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        rl.add_history_entry(input).ok();

        if input == "quit" {
            break;
        }
        if input == "test" {
            println!(
                "{}",
                if self_test::self_test(executor.env()) {
                    "ok"
                } else {
                    "failed"
                }
            );
            continue;
        }

        let statements = match parser::parse(input) {
            Ok(statements) => statements,
            Err(parser::ParseError::Sql(_)) => {
                println!("Invalid SQL: {}", input);
                continue;
            }
            Err(e) => {
                println!("Error: {}", e);
                continue;
            }
        };

        for statement in statements {
            println!("{}", statement);
            match executor.execute(&statement) {
                Ok(result) => println!("{}", result),
                Err(e) => println!("Error: {}", e),
            }
        }
    }
}
