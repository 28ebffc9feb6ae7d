//! playground-ctl — command-line client for the compile gateway.

mod cmd;

use anyhow::{Context, Result, anyhow};

use playground_core::{CompileRequest, RequestFormat, TargetVersion, ToolchainChannel};

const DEFAULT_GATEWAY: &str = "http://127.0.0.1:8787";

struct Options {
    gateway: String,
    version: TargetVersion,
    channel: ToolchainChannel,
    format: RequestFormat,
}

fn print_usage() {
    println!("Usage: playground-ctl [options] <command>");
    println!();
    println!("Commands:");
    println!("  run <file>    Compile a file through the gateway and run it headless");
    println!("  key <file>    Print the cache key a submission of <file> would use");
    println!("  health        Check that the gateway is up");
    println!("  cache         Show cache statistics");
    println!("  cache clear   Remove every cached compile");
    println!();
    println!("Options:");
    println!("  --gateway <url>     Gateway base URL (default: {})", DEFAULT_GATEWAY);
    println!("  --version <v>       Framework version: main, 0.14, 0.15, 0.16 (default: {})", TargetVersion::default());
    println!("  --channel <c>       Toolchain channel: stable, nightly (default: {})", ToolchainChannel::default());
    println!("  --json              Submit as a JSON envelope to /compile");
}

fn read_request(path: &str, options: &Options) -> Result<CompileRequest> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    Ok(CompileRequest::new(source, options.version, options.channel))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut options = Options {
        gateway: DEFAULT_GATEWAY.to_string(),
        version: TargetVersion::default(),
        channel: ToolchainChannel::default(),
        format: RequestFormat::Raw,
    };
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--gateway" => {
                i += 1;
                options.gateway = args.get(i).context("--gateway requires a value")?.clone();
            }
            "--version" => {
                i += 1;
                let value = args.get(i).context("--version requires a value")?;
                options.version = value.parse().map_err(|e| anyhow!("--version: {e}"))?;
            }
            "--channel" => {
                i += 1;
                let value = args.get(i).context("--channel requires a value")?;
                options.channel = value.parse().map_err(|e| anyhow!("--channel: {e}"))?;
            }
            "--json" => options.format = RequestFormat::Json,
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["run", file] => {
            let request = read_request(file, &options)?;
            cmd::run::cmd_run(&options.gateway, &request, options.format).await
        }
        ["key", file] => cmd::key::cmd_key(&read_request(file, &options)?),
        ["health"] | [] => cmd::cache::cmd_health(&options.gateway).await,
        ["cache"] => cmd::cache::cmd_cache(&options.gateway).await,
        ["cache", "clear"] => cmd::cache::cmd_cache_clear(&options.gateway).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
