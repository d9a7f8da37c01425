use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "balloon-edit-rust",
    version,
    about = "Replace words in manga speech balloons and redraw them with ruby"
)]
struct Cli {
    /// Image to edit; the result is written next to it as <stem>_edited.<ext>
    image: String,

    /// Free-form edit instruction (read from stdin when omitted)
    #[arg(short = 'i', long = "instruction")]
    instruction: Option<String>,

    /// Replacement pair FROM=TO (repeatable); skips the instruction parser
    #[arg(short = 'r', long = "replace")]
    replace: Vec<String>,

    /// Model used to parse the instruction
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key for the instruction parser (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// OCR engine: vision or tesseract
    #[arg(long = "ocr")]
    ocr: Option<String>,

    /// External ruby detector, run as `PROGRAM <image>` and printing JSON boxes
    #[arg(long = "detector-cmd")]
    detector_cmd: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    balloon_edit_rust::logging::init(cli.verbose)?;

    let needs_stdin = cli.replace.is_empty() && cli.instruction.is_none();
    let input = if needs_stdin && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = balloon_edit_rust::run(
        balloon_edit_rust::Config {
            image_path: cli.image,
            instruction: cli.instruction,
            replacements: cli.replace,
            model: cli.model,
            key: cli.key,
            ocr_engine: cli.ocr,
            detector_command: cli.detector_cmd,
            settings_path: cli.read_settings,
        },
        input,
    )
    .await?;

    println!("{}", output);
    Ok(())
}
