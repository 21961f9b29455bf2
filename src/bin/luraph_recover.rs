use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use luraph_recover::{deobfuscate, Options, ProgressEvent};

/// Recovers readable Lua or a loadable `.luac` image from a Luraph-obfuscated
/// source file.
#[derive(Parser, Debug)]
#[command(name = "luraph-recover", version, about)]
struct Args {
    /// Obfuscated Lua source file.
    input: PathBuf,

    /// Where to write the recovered `.luac` image. Defaults to `<input>.luac`.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also write a best-effort readable Lua rendering alongside the image.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Force a decryption method instead of auto-detecting one.
    #[arg(long, value_name = "xor_v1|xor_v2|aes_cbc|aes_cbc_v2|luraph_custom|auto")]
    method: Option<String>,

    /// Hex-encoded decryption key, overriding auto-detection.
    #[arg(long)]
    key: Option<String>,

    /// Luraph version, used to pick a default method when `--method` isn't set.
    #[arg(long, value_name = "11.5|11.6|11.7|11.8|11.8.1")]
    version: Option<String>,

    /// Print the recovered stats as JSON instead of a summary line.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_version(raw: &str) -> Option<luraph_recover::decrypt::LuraphVersion> {
    use luraph_recover::decrypt::LuraphVersion::*;
    match raw {
        "11.5" => Some(V11_5),
        "11.6" => Some(V11_6),
        "11.7" => Some(V11_7),
        "11.8" => Some(V11_8),
        "11.8.1" => Some(V11_8_1),
        _ => None,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "luraph_recover=info",
        1 => "luraph_recover=debug",
        _ => "luraph_recover=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let source = match fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: reading {}: {err}", args.input.display());
            return ExitCode::FAILURE;
        }
    };

    let method = args
        .method
        .as_deref()
        .and_then(luraph_recover::decrypt::Method::parse)
        .unwrap_or_default();
    let key = match args.key.as_deref().map(hex::decode) {
        Some(Ok(bytes)) => Some(bytes),
        Some(Err(err)) => {
            eprintln!("error: --key is not valid hex: {err}");
            return ExitCode::FAILURE;
        }
        None => None,
    };
    let version = match args.version.as_deref() {
        Some(raw) => match parse_version(raw) {
            Some(v) => Some(v),
            None => {
                eprintln!("error: unrecognized --version {raw}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let options = Options {
        method,
        key,
        iv: None,
        version,
        cancel: Some(Arc::new(AtomicBool::new(false))),
        emit_source: args.source.is_some(),
    };

    let result = deobfuscate(&source, options, |event: ProgressEvent| {
        tracing::info!(stage = event.step.name(), fraction = event.fraction, "progress");
    });

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| args.input.with_extension("luac"));
    if let Some(bytecode) = &output.bytecode {
        if let Err(err) = fs::write(&out_path, bytecode) {
            eprintln!("error: writing {}: {err}", out_path.display());
            return ExitCode::FAILURE;
        }
    }
    if let (Some(path), Some(source_code)) = (&args.source, &output.source_code) {
        if let Err(err) = fs::write(path, source_code) {
            eprintln!("error: writing {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    }

    if args.json {
        match serde_json::to_string_pretty(&output.stats) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: serializing stats: {err}"),
        }
    } else {
        println!(
            "recovered {} handlers, {} instructions, {} constants decrypted, {} warnings -> {}",
            output.stats.handlers_processed,
            output.stats.instructions_reconstructed,
            output.stats.constants_decrypted,
            output.stats.warnings.len(),
            out_path.display(),
        );
        for warning in &output.stats.warnings {
            eprintln!("warning: {warning}");
        }
    }

    ExitCode::SUCCESS
}
