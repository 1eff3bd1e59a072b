//! Command-line argument parsing for mrkit

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// mrkit - Merge-request workflow tools for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "mrkit")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true, env = "MRKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available tools
    List,

    /// Print the tool manifest as JSON
    Manifest,

    /// Run one tool and print its result
    Call {
        /// Tool name (e.g. getMRDiff)
        tool: String,

        /// Tool parameter as KEY=VALUE (repeatable)
        #[arg(short, long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        args: Vec<(String, String)>,

        /// Tool parameters as a JSON object
        #[arg(long, value_name = "JSON")]
        json: Option<String>,

        /// Print the command line instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Serve JSON-lines requests on stdin/stdout
    Serve,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}

/// Merge `--json` and `--arg` parameters; `--arg` wins on conflicts
pub fn collect_params(
    json: Option<&str>,
    args: &[(String, String)],
) -> Result<HashMap<String, Value>, String> {
    let mut params = match json {
        Some(text) => serde_json::from_str::<HashMap<String, Value>>(text)
            .map_err(|e| format!("--json must be a JSON object: {}", e))?,
        None => HashMap::new(),
    };

    for (key, value) in args {
        params.insert(key.clone(), Value::String(value.clone()));
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_list() {
        let args = Args::parse_from(["mrkit", "list"]);
        assert!(matches!(args.command, Commands::List));
        assert!(!args.debug);
    }

    #[test]
    fn test_args_call() {
        let args = Args::parse_from([
            "mrkit",
            "--debug",
            "call",
            "updateMR",
            "--arg",
            "summary=fix it = now",
            "-a",
            "title=t",
            "--dry-run",
        ]);
        assert!(args.debug);
        match args.command {
            Commands::Call {
                tool,
                args,
                json,
                dry_run,
            } => {
                assert_eq!(tool, "updateMR");
                assert_eq!(
                    args,
                    vec![
                        ("summary".to_string(), "fix it = now".to_string()),
                        ("title".to_string(), "t".to_string()),
                    ]
                );
                assert!(json.is_none());
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_global_config_after_subcommand() {
        let args = Args::parse_from(["mrkit", "serve", "--config", "/tmp/mrkit.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/mrkit.toml")));
    }

    #[test]
    fn test_args_bad_key_value() {
        let result = Args::try_parse_from(["mrkit", "call", "getDiff", "--arg", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_params() {
        let params = collect_params(
            Some(r#"{"summary": "from json", "title": "keep"}"#),
            &[("summary".to_string(), "from arg".to_string())],
        )
        .unwrap();
        assert_eq!(params["summary"], Value::String("from arg".into()));
        assert_eq!(params["title"], Value::String("keep".into()));
    }

    #[test]
    fn test_collect_params_rejects_non_object() {
        assert!(collect_params(Some("[1, 2]"), &[]).is_err());
    }
}
