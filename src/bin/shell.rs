use clap::Parser;
use relcore::config::EngineConfig;
use relcore::engine::Engine;
use relcore::exec::EvalTable;
use relcore::session::SessionState;
use relcore::{execute_embedded, EngineError};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "relcore-shell")]
#[command(about = "Interactive relcore SQL shell, embedded (no wire protocol round trip)")]
struct Cli {
    /// Path to a TOML properties file (spec §6). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Runs a single statement and exits instead of entering the REPL.
    #[arg(short, long)]
    execute: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config);
    let mut session = SessionState::new("public");

    if let Some(sql) = cli.execute {
        run_one(&engine, &mut session, &sql);
        return Ok(());
    }

    println!("relcore shell. Enter SQL, or .exit to quit.");
    loop {
        print!("relcore> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == ".exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }
        run_one(&engine, &mut session, input);
    }
    Ok(())
}

fn run_one(engine: &Engine, session: &mut SessionState, sql: &str) {
    match execute_embedded(engine, session, sql) {
        Ok(table) => print_table(&table),
        Err(e) => print_error(&e),
    }
}

fn print_table(table: &EvalTable) {
    if table.columns.is_empty() {
        return;
    }
    println!("{}", table.columns.join(" | "));
    println!("{}", table.columns.iter().map(|c| "-".repeat(c.len())).collect::<Vec<_>>().join("-+-"));
    for row in &table.rows {
        let cells: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
}

fn print_error(e: &EngineError) {
    eprintln!("Error [{}]: {}", e.sql_code(), e);
}
