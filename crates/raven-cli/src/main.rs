//! The `raven` binary: a JSON-line driver over the operation registry.
//!
//! Each stdin line is `{"op": "<name>", "args": {...}}`; each response is one
//! line of JSON. The RPC transport proper (MCP framing, sessions, streaming)
//! lives outside this crate; this driver exists so the server core can be
//! exercised end to end from a shell.
//!
//! Usage:
//!   raven [--config <properties>] [--open <artifact>]   run the driver loop
//!   raven ops                                           list operations

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use raven_config::{ResponseFormat, ServerConfig};
use raven_ops::{OperationRegistry, ServerContext};

struct Args {
    config_path: Option<PathBuf>,
    open_path: Option<PathBuf>,
    list_ops: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config_path: None,
        open_path: None,
        list_ops: false,
    };
    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config" => {
                let value = argv.next().context("--config requires a path")?;
                args.config_path = Some(PathBuf::from(value));
            }
            "--open" => {
                let value = argv.next().context("--open requires a path")?;
                args.open_path = Some(PathBuf::from(value));
            }
            "ops" => args.list_ops = true,
            other => bail!("unknown argument {other}; expected --config, --open, or ops"),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = ServerConfig::load(args.config_path.as_deref()).context("loading config")?;
    let format = config.response_format;
    let ctx = ServerContext::new(config);
    let registry = OperationRegistry::with_builtin_operations();

    if args.list_ops {
        return list_ops(&registry);
    }

    if let Some(path) = &args.open_path {
        let response = registry.dispatch(
            &ctx,
            "workspace-open",
            &json!({ "path": path.display().to_string() }),
        );
        emit(&response, format)?;
        if response["ok"] != json!(true) {
            bail!("failed to open {}", path.display());
        }
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Ok(request) => {
                let op = request["op"].as_str().unwrap_or_default().to_string();
                let args = request.get("args").cloned().unwrap_or(Value::Null);
                registry.dispatch(&ctx, &op, &args)
            }
            Err(err) => json!({
                "ok": false,
                "error": { "kind": "bad-request", "message": format!("invalid request: {err}") },
            }),
        };
        emit(&response, format)?;
    }
    Ok(())
}

fn emit(response: &Value, format: ResponseFormat) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        ResponseFormat::TokenEfficient => serde_json::to_writer(&mut stdout, response)?,
        ResponseFormat::Json => serde_json::to_writer_pretty(&mut stdout, response)?,
    }
    stdout.write_all(b"\n")?;
    Ok(())
}

fn list_ops(registry: &OperationRegistry) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for descriptor in registry.descriptors() {
        writeln!(
            stdout,
            "{:<24} [{}] {}",
            descriptor.name, descriptor.category, descriptor.description
        )?;
        for param in &descriptor.params {
            let required = if param.required { "required" } else { "optional" };
            writeln!(
                stdout,
                "    {:<20} {:<12} {:<9} {}",
                param.name, param.kind, required, param.description
            )?;
        }
    }
    Ok(())
}
