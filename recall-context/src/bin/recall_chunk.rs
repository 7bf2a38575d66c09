use clap::Parser;
use recall_context::text::{ChunkConfig, DEFAULT_OVERLAP, DEFAULT_WINDOW, chunk_text};
use std::fs;
use std::io::{self, Read};
use std::process;

/// Print the chunks recall would index for a text file, as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum chunk length in characters.
    #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
    window: usize,

    /// Characters shared by consecutive chunks.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let content = match args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let config = ChunkConfig::new(args.window, args.overlap)?;
    let chunks = chunk_text(&content, config)?;
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
