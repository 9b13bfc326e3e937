//! Interactive command-line client for a redlite server

use clap::Parser;
use redlite::{Client, Frame};
use std::io::{self, Write};

/// redlite interactive client
#[derive(Parser, Debug)]
#[command(name = "redlite-cli")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(default_value = "127.0.0.1:6379")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to redlite server at {}...", args.addr);
    let mut client = Client::connect(&args.addr).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("{}> ", args.addr);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => {
                print_help();
            }
            _ => {
                let parts: Vec<&str> = input.split_whitespace().collect();
                match client.send(parts).await {
                    Ok(reply) => print_reply(&reply, 0),
                    Err(e) => println!("Error: {}", e),
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

/// Render a reply the way redis-cli does
fn print_reply(frame: &Frame, indent: usize) {
    let pad = " ".repeat(indent);
    match frame {
        Frame::Simple(s) => println!("{}{}", pad, s),
        Frame::Error(e) => println!("{}(error) {}", pad, e),
        Frame::Integer(n) => println!("{}(integer) {}", pad, n),
        Frame::Bulk(data) => println!("{}\"{}\"", pad, String::from_utf8_lossy(data)),
        Frame::Null => println!("{}(nil)", pad),
        Frame::Array(items) if items.is_empty() => println!("{}(empty array)", pad),
        Frame::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                print!("{}{}) ", pad, i + 1);
                print_reply(item, 0);
            }
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  PING                         - Check the connection");
    println!("  ECHO <message>               - Echo a message back");
    println!("  SET <key> <value> [PX <ms>]  - Set a value, optionally expiring");
    println!("  GET <key>                    - Get value by key");
    println!("  CONFIG GET <dir|dbfilename>  - Read a config parameter");
    println!("  KEYS <pattern>               - List snapshot keys matching a glob");
    println!("  help                         - Show this help message");
    println!("  quit                         - Exit the client");
}
