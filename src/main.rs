use clap::Parser;
use dirs::home_dir;
use gor::{
    cli::{Args, Commands},
    error::{module_error, Result},
    module::gor_path,
    parser::parse,
    pipeline::{run, RunOptions},
    repl::{REPLPrompt, REPLValidator, SyntaxHighlighter},
    runtime::Interpreter,
    tokenizer::tokenize,
};
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{
    fs,
    path::{Path, PathBuf},
};

fn source_path(file: PathBuf) -> Result<PathBuf> {
    match gor_path(file.clone()) {
        Some(path) => Ok(path),
        None => module_error(format!("file '{}' is not a .gor file", file.display())),
    }
}

fn run_file(file: PathBuf, options: RunOptions) -> Result<()> {
    let file = source_path(file)?;
    let source = fs::read_to_string(&file)?;

    run(&source, &file, &options)?;

    Ok(())
}

fn check_file(file: PathBuf) -> Result<()> {
    let file = source_path(file)?;
    let source = fs::read_to_string(&file)?;

    let tokens = tokenize(&source)?;
    let nodes = parse(&tokens)?;
    println!("{:#?}", nodes);

    Ok(())
}

fn run_entry(interpreter: &mut Interpreter, source: &str, options: &RunOptions) -> Result<()> {
    let tokens = tokenize(source)?;
    if options.print_tokens {
        tokens.iter().for_each(|token| println!("{}", token));
    }

    let nodes = parse(&tokens)?;
    if options.print_nodes {
        println!("{:#?}", nodes);
    }

    interpreter.execute(&nodes)?;
    if options.print_vars && !options.print_vars_each_cycle {
        println!("{}", interpreter.environment());
    }

    Ok(())
}

fn run_repl(options: RunOptions) -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".gor_history"))
        .and_then(|path| FileBackedHistory::with_file(100, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;
    let mut interpreter = Interpreter::new(Path::new("<repl>"), &options);

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                let snapshot = interpreter.environment().clone();

                if let Err(err) = run_entry(&mut interpreter, &buffer, &options) {
                    eprintln!("{}", err);
                    interpreter.restore(snapshot);
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Run { file, dumps } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);
            debug!("dumps: {:?}", dumps);

            run_file(file, dumps.into())
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file)
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
        Commands::Repl { dumps } => {
            info!("REPL MODE");

            run_repl(dumps.into())
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
    }
    Ok(())
}
