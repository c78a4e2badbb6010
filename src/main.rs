mod debug_report;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use redlink::{
    DEFAULT_TTL_MS, DedupGuard, JsonFileStore, KvStore, MemoryStore, Options, Strategy, load_rules,
    resolve_verbose_with,
};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let store: Arc<dyn KvStore> = match &config.store_path {
        Some(path) => match JsonFileStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                eprintln!("error: failed to open store {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    if config.background {
        let dedup = DedupGuard::new(Arc::clone(&store));
        if dedup.is_duplicate(&config.link, config.ttl_ms) {
            println!("duplicate delivery within {}ms; dropped", config.ttl_ms);
            return;
        }

        let rules = load_rules(store.as_ref());
        let report = resolve_verbose_with(&config.link, &rules, &config.options());
        debug_report::print_run(&report, config.color);

        if report.url.is_some() {
            dedup.record_processed(&config.link);
        }
        return;
    }

    let rules = load_rules(store.as_ref());
    let report = resolve_verbose_with(&config.link, &rules, &config.options());
    debug_report::print_run(&report, config.color);
}

struct CliConfig {
    link: String,
    store_path: Option<PathBuf>,
    ttl_ms: i64,
    background: bool,
    first_match: bool,
    scheme: Option<String>,
    color: bool,
}

impl CliConfig {
    fn options(&self) -> Options {
        let mut options = Options::default();
        if self.first_match {
            options.strategy = Strategy::FirstMatch;
        }
        if let Some(scheme) = &self.scheme {
            options.scheme = scheme.clone();
        }
        options
    }
}

fn parse_args() -> Result<CliConfig, String> {
    let mut link: Option<String> = None;
    let mut store_path: Option<PathBuf> = None;
    let mut ttl_ms = DEFAULT_TTL_MS;
    let mut background = false;
    let mut first_match = false;
    let mut scheme: Option<String> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("redlink {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--background" => background = true,
            "--first-match" => first_match = true,
            "--store" | "-s" => {
                let value = args.next().ok_or_else(|| "error: --store expects a path".to_string())?;
                store_path = Some(PathBuf::from(value));
            }
            "--ttl" => {
                let value = args.next().ok_or_else(|| "error: --ttl expects a value".to_string())?;
                ttl_ms = parse_ttl(&value)?;
            }
            "--scheme" => {
                let value = args.next().ok_or_else(|| "error: --scheme expects a value".to_string())?;
                scheme = Some(value);
            }
            "--" => {
                if let Some(value) = args.next() {
                    if link.is_some() {
                        return Err("error: link provided multiple times".to_string());
                    }
                    link = Some(value);
                }
                break;
            }
            _ if arg.starts_with("--store=") => {
                store_path = Some(PathBuf::from(arg.trim_start_matches("--store=")));
            }
            _ if arg.starts_with("--ttl=") => {
                ttl_ms = parse_ttl(arg.trim_start_matches("--ttl="))?;
            }
            _ if arg.starts_with("--scheme=") => {
                scheme = Some(arg.trim_start_matches("--scheme=").to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if link.is_some() {
                    return Err("error: link provided multiple times".to_string());
                }
                link = Some(arg);
            }
        }
    }

    let link = link.ok_or_else(|| format!("error: no link provided\n\n{}", help_text()))?;
    if link.trim().is_empty() {
        return Err(format!("error: no link provided\n\n{}", help_text()));
    }

    Ok(CliConfig { link, store_path, ttl_ms, background, first_match, scheme, color })
}

fn parse_ttl(value: &str) -> Result<i64, String> {
    value.parse::<i64>().map_err(|_| format!("error: invalid --ttl '{value}' (expected milliseconds)"))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "redlink {version}

Deep-link redirect engine CLI.

Usage:
  redlink [OPTIONS] [--] <link>

Options:
  -s, --store <path>      JSON key-value store holding the rule list (and the
                          dedup record). Without it, an empty in-memory store
                          is used and nothing can match.
  --ttl <ms>              Duplicate window for --background mode.
                          Default: {default_ttl}
  --background            Run the background delivery path: check the dedup
                          record first and record the link after a match.
  --first-match           Use the degraded first-match strategy instead of
                          the strict gated resolution.
  --scheme <prefix>       Scheme prefix stripped for the tail retry.
                          Default: redlink://
  --color                 Force ANSI color output.
  --no-color              Disable ANSI color output.
  -h, --help              Show this help message.
  -V, --version           Print version information.

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments or missing link.
",
        version = env!("CARGO_PKG_VERSION"),
        default_ttl = DEFAULT_TTL_MS
    )
}
