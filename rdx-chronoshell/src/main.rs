use anyhow::Result;
use chronostream::prelude::*;
use chronostream::{ENGINE_NAME, VERSION as LIB_VERSION};
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", rule.dimmed());
    println!("{}", format!("  {} shell", ENGINE_NAME).cyan().bold());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "  Distributed under the MIT OR Apache-2.0 license. Use at your own risk.".dimmed()
    );
    println!("{}", rule.dimmed());
}

fn print_help() {
    println!("Available commands:");
    println!("  add <FREQ>      - Starts a stream (second, minute, hour, day).");
    println!("  list            - Shows streams, buffer depth and last sequence.");
    println!("  drain <H>       - Prints and removes every buffered event of stream H.");
    println!("  remove <H>      - Stops stream H and closes its buffer.");
    println!("  exit            - Stops all streams and quits the shell.");
}

/// Maps the short numeric handles typed at the prompt to stream keys.
#[derive(Default)]
struct Handles {
    by_handle: BTreeMap<usize, StreamId>,
    next: usize,
}

impl Handles {
    fn insert(&mut self, id: StreamId) -> usize {
        let handle = self.next;
        self.by_handle.insert(handle, id);
        self.next += 1;
        handle
    }

    fn resolve(&self, arg: Option<&&str>) -> Result<(usize, StreamId), String> {
        let raw = arg.ok_or_else(|| "missing stream handle".to_string())?;
        let handle = raw
            .parse::<usize>()
            .map_err(|_| format!("handle must be a number, got '{}'", raw))?;
        self.by_handle
            .get(&handle)
            .map(|id| (handle, *id))
            .ok_or_else(|| format!("no stream with handle #{}. Use 'list'.", handle))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    let config = ProducerConfig::load(None)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting {} streams...", ENGINE_NAME.cyan());
    let mut producer = Producer::from_config(config, Arc::new(SystemTimeSource::new()))?;
    let mut handles = Handles::default();
    for status in producer.streams() {
        let handle = handles.insert(status.id);
        println!("--> Stream #{} running at {} frequency.", handle, status.frequency);
    }

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting chronoshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first() else {
            continue;
        };

        match *command {
            "add" => match args.get(1).map(|raw| raw.parse::<Frequency>()) {
                Some(Ok(frequency)) => match producer.add_stream(frequency) {
                    Ok(id) => {
                        let handle = handles.insert(id);
                        println!("--> Added {} stream with handle: #{}", frequency, handle);
                    }
                    Err(e) => println!("Error: {}", e),
                },
                Some(Err(e)) => println!("Error: {}", e),
                None => println!("Usage: add <FREQ>"),
            },
            "remove" => match handles.resolve(args.get(1)) {
                Ok((handle, id)) => {
                    handles.by_handle.remove(&handle);
                    if producer.remove_stream(id).await {
                        println!("--> Stream #{} stopped and its buffer closed.", handle);
                    } else {
                        println!("--> Error: stream #{} was not running.", handle);
                    }
                }
                Err(e) => println!("Error: {}", e),
            },
            "list" => {
                let statuses = producer.streams();
                println!("Active Streams:");
                for (handle, id) in &handles.by_handle {
                    if let Some(status) = statuses.iter().find(|s| s.id == *id) {
                        println!(
                            "  #{:<3} {:<7} buffered {}/{}  last sequence {}",
                            handle,
                            status.frequency,
                            status.len,
                            status.cap,
                            producer.last_sequence(status.frequency)
                        );
                    }
                }
            }
            "drain" => match handles.resolve(args.get(1)) {
                Ok((handle, id)) => {
                    let Some(events) = producer.events(id) else {
                        println!("--> Error: stream #{} was not running.", handle);
                        continue;
                    };
                    let mut drained = 0;
                    while let Some(event) = events.try_recv() {
                        println!(
                            "<-- [EVENT] {} at {} seq={} seed={}",
                            event.id,
                            event.occurred_at(),
                            event.sequence,
                            event.seed
                        );
                        drained += 1;
                    }
                    println!("--> Drained {} event(s) from stream #{}.", drained, handle);
                }
                Err(e) => println!("Error: {}", e),
            },
            "help" => print_help(),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
        }
    }

    producer.shutdown().await;
    Ok(())
}
