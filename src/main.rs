//! seclang CLI tool.

use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use zentinel_seclang::engine::{Phase, Rule};
use zentinel_seclang::{Parser, Result, Transaction, Waf};

#[derive(ClapParser)]
#[command(name = "seclang")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check if rule files compile
    Check {
        /// Rule files, compiled in order into one rule set
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a request through the rules
    Test {
        /// Path to rules file
        rules: PathBuf,

        /// Request URI
        #[arg(short, long)]
        uri: String,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request headers (format: "Name: Value")
        #[arg(short = 'H', long)]
        header: Vec<String>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Print the audit log as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print compiled rules by phase
    Dump {
        /// Rule files, compiled in order into one rule set
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { files } => check_rules(&files),
        Commands::Test {
            rules,
            uri,
            method,
            header,
            body,
            json,
        } => test_request(&rules, &uri, &method, &header, body.as_deref(), json),
        Commands::Dump { files } => dump_rules(&files),
    }
}

fn compile(files: &[PathBuf]) -> Result<Waf> {
    let mut parser = Parser::new();
    for file in files {
        info!(path = %file.display(), "compiling rules");
        parser.parse_file(file)?;
    }
    parser.build()
}

fn check_rules(files: &[PathBuf]) -> Result<()> {
    let waf = compile(files)?;
    println!("Successfully compiled {} rules", waf.rule_count());
    Ok(())
}

fn test_request(
    rules_path: &Path,
    uri: &str,
    method: &str,
    headers: &[String],
    body: Option<&str>,
    json: bool,
) -> Result<()> {
    let waf = compile(&[rules_path.to_path_buf()])?;
    let mut tx = waf.new_transaction();

    tx.process_connection("127.0.0.1", 0, "127.0.0.1", 80);
    tx.process_uri(uri, method, "HTTP/1.1");
    for header in headers {
        if let Some((name, value)) = header.split_once(':') {
            tx.add_request_header(name.trim(), value.trim());
        }
    }
    tx.process_request_headers()?;

    if tx.interruption().is_none() {
        if let Some(body) = body {
            tx.write_request_body(body.as_bytes())?;
        }
        tx.process_request_body()?;
    }
    tx.process_logging()?;

    if json {
        let log = serde_json::to_string_pretty(&tx.audit_log()).map_err(|e| {
            zentinel_seclang::Error::AuditLog {
                message: e.to_string(),
            }
        })?;
        println!("{}", log);
    } else {
        print_outcome(&tx);
    }
    tx.close();
    Ok(())
}

fn print_outcome(tx: &Transaction) {
    match tx.interruption() {
        Some(interruption) => {
            println!("BLOCKED");
            println!("  Rule: {}", interruption.rule_id);
            println!("  Action: {}", interruption.action);
            println!("  Status: {}", interruption.status);
            if let Some(phase) = interruption.phase {
                println!("  Phase: {}", phase);
            }
        }
        None => println!("ALLOWED"),
    }
    for matched in tx.matched_rules() {
        println!("  Matched rule {}: {}", matched.id, matched.message);
    }
}

fn dump_rules(files: &[PathBuf]) -> Result<()> {
    let waf = compile(files)?;
    println!("Total rules: {}", waf.rule_count());

    for phase in Phase::ALL {
        let rules: Vec<&Rule> = waf.rules().rules_for_phase(phase).collect();
        if rules.is_empty() {
            continue;
        }
        println!("\n  Phase {} ({}):", phase.number(), phase.name());
        for rule in rules {
            for (depth, link) in rule.links().enumerate() {
                println!("    {}{}", "  ".repeat(depth), describe(link));
            }
        }
    }

    Ok(())
}

fn describe(rule: &Rule) -> String {
    let targets: Vec<String> = rule.targets.iter().map(ToString::to_string).collect();
    let operator = rule
        .operator
        .as_ref()
        .map_or_else(|| "SecAction".to_string(), ToString::to_string);
    let actions: Vec<&str> = rule.actions.iter().map(|a| a.name.as_str()).collect();
    let id = match rule.id() {
        0 => "chain".to_string(),
        id => id.to_string(),
    };
    format!(
        "[{}] {} {} ({})",
        id,
        targets.join("|"),
        operator,
        actions.join(",")
    )
}
