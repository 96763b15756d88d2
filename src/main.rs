extern crate langc;
extern crate toml;
extern crate serde;
extern crate clap;

use std::env;
use std::fs::read_to_string;
use std::path::Path;
use std::process::exit;

use clap::{Arg, App};
use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use langc::ast::Statement;
use langc::diagnostic::Diagnostic;
use langc::error::{LexError, ParseError, SemaError};
use langc::lexer::lex;
use langc::parser::Parser;
use langc::sem::analyse;
use langc::source::Source;
use langc::ssa::generate;


const DEFAULT_CONFIG_PATH: &str = "langc.toml";

const EXIT_INVOCATION: i32 = 1;
const EXIT_SEMA: i32 = 2;
const EXIT_IR: i32 = 3;


#[derive(Deserialize)]
#[serde(default)]
struct DumpConfig {
    statements: bool,
    ir: bool,
    tokens: bool,
}

impl Default for DumpConfig {
    fn default() -> DumpConfig {
        DumpConfig { statements: true, ir: true, tokens: false }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Config {
    dump: DumpConfig,
}


fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(explicit: Option<&str>) -> Config {
    let path = match explicit {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => DEFAULT_CONFIG_PATH,
        None => return Config::default(),
    };

    let config_str = read_to_string(path).unwrap_or_else(|err| {
        eprintln!("could not read config file: {}", err);
        exit(EXIT_INVOCATION);
    });
    toml::from_str(&config_str).unwrap_or_else(|err| {
        eprintln!("incorrect configuration: {}", err);
        exit(EXIT_INVOCATION);
    })
}

fn lex_diagnostic(source: &Source, err: &LexError) -> Option<Diagnostic> {
    match err {
        LexError::UnknownCharacter { ch, pos } => {
            Some(Diagnostic::new(source, *pos, format!("unknown character {:?}", ch)))
        }
        _ => None,
    }
}

fn report_parse_error(source: &Source, err: &ParseError) {
    match err {
        ParseError::Syntax(e) => println!("{}", Diagnostic::new(source, e.pos, e.message.clone())),
        ParseError::Lex(e) => match lex_diagnostic(source, e) {
            Some(diag) => println!("{}", diag),
            None => eprintln!("{}", e),
        },
    }
}

fn dump_tokens(source: &Source) {
    match lex(source.text()) {
        Ok(tokens) => {
            for tok in tokens {
                println!("{:?} {:?} {}:{}", tok.class(), tok.text(), tok.pos().line(), tok.pos().column());
            }
        }
        Err(err) => {
            report_parse_error(source, &ParseError::Lex(err));
            exit(EXIT_INVOCATION);
        }
    }
}

fn parse_source(source: &Source, config: &Config) -> Vec<Statement> {
    let mut parser = Parser::new(source.text());
    let mut statements = Vec::new();
    loop {
        match parser.parse_statement() {
            Ok(Some(stat)) => {
                if config.dump.statements {
                    println!("{}", stat);
                }
                statements.push(stat);
            }
            Ok(None) => return statements,
            // Parsing stops at a syntax error; what came before it is kept.
            Err(err @ ParseError::Syntax(_)) => {
                report_parse_error(source, &err);
                return statements;
            }
            Err(err @ ParseError::Lex(_)) => {
                report_parse_error(source, &err);
                exit(EXIT_INVOCATION);
            }
        }
    }
}

fn main() {
    let arg_matches = App::new("langc")
        .about("Front end and IR generator for a small typed expression language")
        .arg(Arg::with_name("config")
             .short("-c")
             .value_name("FILE")
             .help("Compiler config TOML file")
             .takes_value(true))
        .arg(Arg::with_name("INPUT")
            .help("Source file")
            .required(true)
            .index(1))
        .arg(Arg::with_name("verbose")
             .short("-v")
             .help("Verbose output"))
        .get_matches();

    let verbose = arg_matches.occurrences_of("verbose") > 0;
    init_logging(verbose);

    let config = load_config(arg_matches.value_of("config"));

    let input_path = arg_matches.value_of("INPUT").unwrap_or_default();
    let source = Source::load(Path::new(input_path)).unwrap_or_else(|err| {
        eprintln!("{}", err);
        exit(EXIT_INVOCATION);
    });

    if config.dump.tokens {
        dump_tokens(&source);
    }

    let mut statements = parse_source(&source, &config);
    if statements.is_empty() || env::var_os("LANG_PARSE_ONLY").is_some() {
        exit(0);
    }

    let symbols = match analyse(&source, &mut statements) {
        Ok(symbols) => symbols,
        Err(SemaError::Failed { diagnostics }) => {
            for diag in &diagnostics {
                println!("{}", diag);
            }
            exit(EXIT_SEMA);
        }
        Err(err @ SemaError::Internal(_)) => {
            println!("Internal Error: {}", err);
            exit(EXIT_SEMA);
        }
    };
    if env::var_os("LANG_SEMA_ONLY").is_some() {
        exit(0);
    }

    match generate(&statements, &symbols) {
        Ok(unit) => {
            println!("IR Instructions = {}", unit.len());
            if config.dump.ir {
                print!("{}", unit);
            }
        }
        Err(err) => {
            println!("Internal Error: IR Generation failed");
            match err.pos() {
                Some(pos) => println!("{}", Diagnostic::new(&source, pos, err.to_string())),
                None => println!("{}", err),
            }
            exit(EXIT_IR);
        }
    }
}
