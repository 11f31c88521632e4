//! Command-line front end: XML to JSON, JSON to XML, and XML reformatting
//! through the value model.

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use xmlshape::parser::{parse_bytes_with_options, Mode, ParseOptions};
use xmlshape::serial::{stringify_with_options, StringifyOptions};
use xmlshape::Value;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlshape -- convert between XML documents and their JSON value shape.
#[derive(Parser, Debug)]
#[command(name = "xmlshape", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print debug logs (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print timing information for reading, parsing and writing.
    #[arg(long, global = true)]
    timing: bool,

    /// Write output to a file instead of stdout.
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<String>,

    /// JSON file with `parse` and `stringify` option objects. Flags given on
    /// the command line are applied on top.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse XML and print its value as JSON.
    Parse {
        /// XML file to read (use `-` for stdin).
        #[arg(default_value = "-")]
        file: String,

        #[command(flatten)]
        parse: ParseArgs,

        /// Print JSON on a single line.
        #[arg(long)]
        compact: bool,
    },
    /// Read a JSON value and print it as XML.
    Stringify {
        /// JSON file to read (use `-` for stdin).
        #[arg(default_value = "-")]
        file: String,

        #[command(flatten)]
        format: FormatArgs,
    },
    /// Parse XML and stringify it again.
    Format {
        /// XML file to read (use `-` for stdin).
        #[arg(default_value = "-")]
        file: String,

        #[command(flatten)]
        parse: ParseArgs,

        #[command(flatten)]
        format: FormatArgs,
    },
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
struct ParseArgs {
    /// Tolerate html-like markup (unquoted attributes, unclosed tags).
    #[arg(long)]
    html: bool,

    // -- Cleaning ----------------------------------------------------------
    /// Drop all attributes.
    #[arg(long)]
    clean_attributes: bool,

    /// Drop comments.
    #[arg(long)]
    clean_comments: bool,

    /// Drop the doctype.
    #[arg(long)]
    clean_doctype: bool,

    /// Drop processing instructions.
    #[arg(long)]
    clean_instructions: bool,

    // -- Flattening --------------------------------------------------------
    /// Flatten attribute-only nodes into plain objects.
    #[arg(long)]
    flatten_attributes: bool,

    /// Keep text-only nodes as objects.
    #[arg(long)]
    no_flatten_text: bool,

    /// Keep empty nodes instead of turning them into null.
    #[arg(long)]
    no_flatten_empty: bool,

    // -- Revival -----------------------------------------------------------
    /// Keep surrounding whitespace in values.
    #[arg(long)]
    no_trim: bool,

    /// Leave entity references undecoded.
    #[arg(long)]
    no_entities: bool,

    /// Turn `true` and `false` into booleans.
    #[arg(long)]
    booleans: bool,

    /// Turn numeric strings into numbers.
    #[arg(long)]
    numbers: bool,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Indentation unit; an empty string minifies.
    #[arg(long, value_name = "STRING")]
    indent: Option<String>,

    /// Move text longer than this to its own line.
    #[arg(long, value_name = "N")]
    breakline: Option<usize>,

    /// Escape all predefined entities.
    #[arg(long)]
    entities: bool,
}

/// Options loaded with `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    parse: ParseOptions,
    stringify: StringifyOptions,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_IO_ERROR: u8 = 2;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let code = match &cli.command {
        Command::Parse {
            file,
            parse,
            compact,
        } => run_parse(&cli, file, &parse.apply(config.parse), *compact),
        Command::Stringify { file, format } => {
            run_stringify(&cli, file, &format.apply(config.stringify))
        }
        Command::Format {
            file,
            parse,
            format,
        } => run_format(
            &cli,
            file,
            &parse.apply(config.parse),
            &format.apply(config.stringify),
        ),
    };
    ExitCode::from(code)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_config(path: Option<&str>) -> Result<Config, String> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("{path}: failed to read: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("{path}: invalid config: {e}"))
}

impl ParseArgs {
    /// Applies the flags on top of `options`.
    fn apply(&self, mut options: ParseOptions) -> ParseOptions {
        if self.html {
            options.mode = Mode::Html;
        }
        options.clean.attributes |= self.clean_attributes;
        options.clean.comments |= self.clean_comments;
        options.clean.doctype |= self.clean_doctype;
        options.clean.instructions |= self.clean_instructions;
        options.flatten.attributes |= self.flatten_attributes;
        options.flatten.text &= !self.no_flatten_text;
        options.flatten.empty &= !self.no_flatten_empty;
        options.revive.trim &= !self.no_trim;
        options.revive.entities &= !self.no_entities;
        options.revive.booleans |= self.booleans;
        options.revive.numbers |= self.numbers;
        options
    }
}

impl FormatArgs {
    /// Applies the flags on top of `options`.
    fn apply(&self, mut options: StringifyOptions) -> StringifyOptions {
        if let Some(indent) = &self.indent {
            options.format.indent.clone_from(indent);
        }
        if let Some(breakline) = self.breakline {
            options.format.breakline = breakline;
        }
        options.replace.entities |= self.entities;
        options
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_parse(cli: &Cli, file: &str, options: &ParseOptions, compact: bool) -> u8 {
    let Some(value) = read_xml(cli, file, options) else {
        return EXIT_PARSE_ERROR;
    };
    let json = if compact {
        serde_json::to_string(&value)
    } else {
        serde_json::to_string_pretty(&value)
    };
    match json {
        Ok(json) => write_output(cli, &json),
        Err(e) => {
            eprintln!("{file}: failed to write JSON: {e}");
            EXIT_IO_ERROR
        }
    }
}

fn run_stringify(cli: &Cli, file: &str, options: &StringifyOptions) -> u8 {
    let input = match read_input(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{file}: failed to read: {e}");
            return EXIT_IO_ERROR;
        }
    };
    let json: serde_json::Value = match serde_json::from_slice(&input) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("{file}: invalid JSON: {e}");
            return EXIT_PARSE_ERROR;
        }
    };
    write_xml(cli, file, &Value::from(json), options)
}

fn run_format(cli: &Cli, file: &str, parse: &ParseOptions, format: &StringifyOptions) -> u8 {
    match read_xml(cli, file, parse) {
        Some(value) => write_xml(cli, file, &value, format),
        None => EXIT_PARSE_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// Reads input from a file or stdin (when filename is `-`).
fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}

/// Reads and parses an XML file, reporting failures on stderr.
fn read_xml(cli: &Cli, file: &str, options: &ParseOptions) -> Option<Value> {
    let start_read = Instant::now();
    let input = match read_input(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{file}: failed to read: {e}");
            return None;
        }
    };
    if cli.timing {
        eprintln!("Reading file {file} took {:?}", start_read.elapsed());
    }

    let start_parse = Instant::now();
    let value = match parse_bytes_with_options(&input, options) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("{file}: {e}");
            return None;
        }
    };
    if cli.timing {
        eprintln!("Parsing took {:?}", start_parse.elapsed());
    }
    Some(value)
}

fn write_xml(cli: &Cli, file: &str, value: &Value, options: &StringifyOptions) -> u8 {
    let start_serial = Instant::now();
    let xml = match stringify_with_options(value, options) {
        Ok(xml) => xml,
        Err(e) => {
            eprintln!("{file}: {e}");
            return EXIT_PARSE_ERROR;
        }
    };
    if cli.timing {
        eprintln!("Serializing took {:?}", start_serial.elapsed());
    }
    write_output(cli, &xml)
}

fn write_output(cli: &Cli, content: &str) -> u8 {
    if let Some(ref output_file) = cli.output {
        if let Err(e) = fs::write(output_file, format!("{content}\n")) {
            eprintln!("{output_file}: failed to write: {e}");
            return EXIT_IO_ERROR;
        }
    } else {
        println!("{content}");
        // Flush stdout to ensure output is complete, especially when piped.
        let _ = io::stdout().flush();
    }
    EXIT_SUCCESS
}
