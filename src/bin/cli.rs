//! resplink CLI Client
//!
//! Sends one command to a RESP server and prints the reply.

use clap::Parser;
use resplink::protocol::{RawReply, ReplyRef};
use resplink::{Command, Config, Connection};
use tracing_subscriber::{fmt, EnvFilter};

/// resplink CLI
#[derive(Parser, Debug)]
#[command(name = "resplink-cli")]
#[command(about = "Send a command to a RESP server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Read timeout in milliseconds (0 = wait forever)
    #[arg(short, long, default_value = "0")]
    timeout_ms: u64,

    /// Send the command N times in one pipeline and print every reply
    #[arg(short, long)]
    pipeline: Option<usize>,

    /// Command name followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,resplink=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .addr(&args.server)
        .read_timeout_ms(args.timeout_ms)
        .build();

    let Some(command) = Command::from_args(&args.command) else {
        eprintln!("(error) no command given");
        std::process::exit(2);
    };

    let mut conn = match Connection::open(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Connected to {}", conn.peer_addr());

    let mut failed = false;
    match args.pipeline {
        Some(n) => {
            let mut pipeline = conn.pipeline();
            for _ in 0..n {
                if let Err(e) = pipeline.enqueue(&command) {
                    eprintln!("(error) {}", e);
                    failed = true;
                    break;
                }
            }
            for (i, result) in pipeline.drain().into_iter().enumerate() {
                match result {
                    Ok(reply) => println!("{}) {}", i + 1, render(reply.root(), 0)),
                    Err(e) => {
                        println!("{}) (error) {}", i + 1, e);
                        failed = true;
                    }
                }
            }
        }
        None => match conn.send(&command) {
            Ok(reply) => println!("{}", render(reply.root(), 0)),
            Err(e) => {
                eprintln!("(error) {}", e);
                failed = true;
            }
        },
    }

    if failed {
        std::process::exit(1);
    }
}

/// Format a reply the way redis-cli does
fn render(reply: ReplyRef<'_>, indent: usize) -> String {
    match reply.value() {
        RawReply::Status(s) => String::from_utf8_lossy(s).into_owned(),
        RawReply::Error(s) => format!("(error) {}", String::from_utf8_lossy(s)),
        RawReply::Integer(n) => format!("(integer) {}", n),
        RawReply::BulkString(Some(b)) => format!("{:?}", String::from_utf8_lossy(b)),
        RawReply::BulkString(None) | RawReply::Array(None) => "(nil)".to_string(),
        RawReply::Array(Some(elements)) if elements.is_empty() => "(empty array)".to_string(),
        RawReply::Array(Some(elements)) => {
            let pad = " ".repeat(indent);
            elements
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let prefix = if i == 0 { String::new() } else { pad.clone() };
                    format!("{}{}) {}", prefix, i + 1, render(e, indent + 3))
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}
