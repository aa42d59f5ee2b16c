use std::{env, process::ExitCode, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use symphony_bridge::{
    init_tracing_subsystem, load_dotenv, resolve_base_url, BridgeConfig, BridgeEvent,
    FileTokenStorage, HostBridge,
};

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    init_tracing_subsystem();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("symphony-bridge: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config = BridgeConfig::from_env();
    if let Some(pos) = args.iter().position(|a| a == "--host-url") {
        let url = args
            .get(pos + 1)
            .cloned()
            .context("--host-url expects an origin such as http://127.0.0.1:48678")?;
        args.drain(pos..=pos + 1);
        config.base_url = resolve_base_url(Some(&url), None);
    }

    if args.is_empty() {
        print_usage();
        bail!("missing command");
    }
    let cmd = args.remove(0);
    if matches!(cmd.as_str(), "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let storage = Arc::new(FileTokenStorage::in_dir(&config.data_dir));
    let bridge = HostBridge::hosted(config, storage).context("failed to build hosted bridge")?;

    match cmd.as_str() {
        "invoke" => invoke_cmd(&bridge, &args).await,
        "listen" => listen_cmd(&bridge, &args).await,
        "token" => token_cmd(&bridge, &args),
        "verify" => verify_cmd(&bridge, &args).await,
        "version" => {
            println!("{}", bridge.get_version().await?);
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

async fn invoke_cmd(bridge: &HostBridge, args: &[String]) -> Result<()> {
    let command = args.first().context("invoke expects a command name")?;
    let payload = match args.get(1) {
        Some(raw) => serde_json::from_str::<Value>(raw)
            .with_context(|| format!("arguments for {command} are not valid JSON"))?,
        None => Value::Null,
    };
    let result = bridge
        .invoke(command, payload)
        .await
        .with_context(|| format!("{command} failed"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn listen_cmd(bridge: &HostBridge, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("listen expects at least one event name");
    }
    let mut handles = Vec::with_capacity(args.len());
    for name in args {
        let handle = bridge
            .listen(name, |message: &BridgeEvent| {
                match serde_json::to_string(message) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!("unprintable event: {err}"),
                }
            })
            .await
            .with_context(|| format!("failed to listen for {name}"))?;
        handles.push(handle);
    }
    tracing::info!("listening for {}; Ctrl-C to stop", args.join(", "));
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    for handle in handles {
        handle.unlisten();
    }
    Ok(())
}

fn token_cmd(bridge: &HostBridge, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("show") => {
            let reveal = args.get(1).is_some_and(|f| f == "--reveal");
            match bridge.get_token() {
                Some(token) if reveal => println!("{token}"),
                Some(token) => println!("token: set ({} chars)", token.chars().count()),
                None => println!("token: not set"),
            }
            Ok(())
        }
        Some("set") => {
            let token = args.get(1).context("token set expects a value")?;
            bridge.set_token(Some(token));
            if bridge.get_token().is_none() {
                bail!("token is blank");
            }
            println!("token stored");
            Ok(())
        }
        Some("clear") => {
            bridge.set_token(None);
            println!("token cleared");
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown token action '{other}'")),
        None => Err(anyhow!("token expects show, set or clear")),
    }
}

async fn verify_cmd(bridge: &HostBridge, args: &[String]) -> Result<()> {
    let candidate = match args.first() {
        Some(token) => token.clone(),
        None => bridge
            .get_token()
            .context("no token stored; pass one or run `token set` first")?,
    };
    if bridge.verify_token(&candidate).await {
        println!("token accepted");
        Ok(())
    } else {
        Err(anyhow!("token rejected by host"))
    }
}

fn print_usage() {
    tracing::warn!("Usage:");
    tracing::warn!("  symphony-bridge [--host-url URL] invoke COMMAND [JSON_ARGS]");
    tracing::warn!("  symphony-bridge [--host-url URL] listen EVENT [EVENT...]");
    tracing::warn!("  symphony-bridge token show [--reveal] | set TOKEN | clear");
    tracing::warn!("  symphony-bridge [--host-url URL] verify [TOKEN]");
    tracing::warn!("  symphony-bridge [--host-url URL] version");
    tracing::warn!("  symphony-bridge --help");
}
