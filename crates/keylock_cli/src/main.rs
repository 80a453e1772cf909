//! keylock CLI
//!
//! One-shot key-value commands and lock operations against a cluster, plus a
//! worker demo contending for a single lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod demo;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::bail;
use demo::{Worker, run_worker};
use keylock_client::ClusterClient;
use keylock_core::{ClientConfig, CommandOutcome, LockConfig, UnlockMode};
use keylock_lock::DistributedLock;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keylock")]
#[command(about = "keylock - distributed locks on a leader-based key-value cluster", long_about = None)]
struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ClusterArgs {
    /// Node addresses, comma separated
    #[arg(long, env = "NODES_ADDRESSES", value_delimiter = ',')]
    nodes_addresses: Vec<String>,
    /// Node ids, comma separated, parallel to the addresses
    #[arg(long, env = "NODES_IDS", value_delimiter = ',')]
    nodes_ids: Vec<String>,
    /// JSON client config; replaces the node lists
    #[arg(long)]
    config: Option<PathBuf>,
    /// Command status poll interval
    #[arg(long)]
    execution_timeout_ms: Option<u64>,
    /// Give up on a command after this long
    #[arg(long)]
    command_timeout_ms: Option<u64>,
}

impl ClusterArgs {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig {
                nodes_addresses: self.nodes_addresses.clone(),
                nodes_ids: self.nodes_ids.clone(),
                ..ClientConfig::default()
            },
        };
        if let Some(ms) = self.execution_timeout_ms {
            config.execution_timeout_ms = ms;
        }
        if let Some(ms) = self.command_timeout_ms {
            config.command_timeout_ms = Some(ms);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct LockArgs {
    /// Delay between acquisition attempts
    #[arg(long, default_value_t = 50)]
    retry_delay_ms: u64,
    /// Treat release by a non-owner as success
    #[arg(long)]
    lenient: bool,
}

impl LockArgs {
    fn lock_config(&self) -> LockConfig {
        let mode = if self.lenient {
            UnlockMode::Lenient
        } else {
            UnlockMode::Strict
        };
        LockConfig::default()
            .with_retry_delay_ms(self.retry_delay_ms)
            .with_unlock_mode(mode)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run workers that take turns holding one lock
    Demo {
        /// Lock name
        #[arg(long, default_value = "my-lock")]
        lock: String,
        /// Work duration per worker, comma separated
        #[arg(long, value_delimiter = ',', default_values_t = [5000, 4000, 3000])]
        work_ms: Vec<u64>,
        #[command(flatten)]
        lock_args: LockArgs,
    },
    /// Read a key
    Get {
        /// Key
        key: String,
    },
    /// Write a key
    Set {
        /// Key
        key: String,
        /// JSON value; anything else is stored as a string
        value: String,
    },
    /// Delete a key
    Delete {
        /// Key
        key: String,
    },
    /// Compare-and-set a key
    Cas {
        /// Key
        key: String,
        /// Expected JSON value, `null` for unset
        old: String,
        /// Replacement JSON value
        new: String,
    },
    /// Create a lock, resetting it to unlocked
    Create {
        /// Lock name, random when omitted
        name: Option<String>,
    },
    /// Acquire a lock
    Lock {
        /// Lock name
        name: String,
        /// Owner id
        client_id: String,
        /// Give up after this long
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[command(flatten)]
        lock_args: LockArgs,
    },
    /// Release a lock
    Unlock {
        /// Lock name
        name: String,
        /// Owner id
        client_id: String,
        #[command(flatten)]
        lock_args: LockArgs,
    },
    /// Show who holds a lock
    Holder {
        /// Lock name
        name: String,
    },
}

/// JSON if it parses, a plain string otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn report(outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Applied(value) => println!("{value}"),
        CommandOutcome::Rejected(message) => eprintln!("rejected: {message}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keylock=info")),
        )
        .init();

    let config = cli.cluster.client_config()?;
    let client = Arc::new(ClusterClient::new(&config)?);

    match cli.command {
        Commands::Demo {
            lock,
            work_ms,
            lock_args,
        } => demo(client, lock, &work_ms, lock_args.lock_config()).await,
        Commands::Get { key } => {
            report(client.get_key_value(&key).await?);
            Ok(())
        }
        Commands::Set { key, value } => {
            report(client.set_key_value(&key, parse_value(&value)).await?);
            Ok(())
        }
        Commands::Delete { key } => {
            report(client.delete_key_value(&key).await?);
            Ok(())
        }
        Commands::Cas { key, old, new } => {
            let swapped = client
                .compare_and_set_key_value(&key, parse_value(&old), parse_value(&new))
                .await?;
            println!("{swapped}");
            Ok(())
        }
        Commands::Create { name } => {
            let lock = DistributedLock::create(name, client, LockConfig::default()).await?;
            println!("{}", lock.name());
            Ok(())
        }
        Commands::Lock {
            name,
            client_id,
            timeout_ms,
            lock_args,
        } => {
            let lock = DistributedLock::open(name, client, lock_args.lock_config());
            match timeout_ms {
                Some(ms) => {
                    let deadline = Instant::now() + Duration::from_millis(ms);
                    lock.lock_until(&client_id, deadline).await?;
                }
                None => lock.lock(&client_id).await?,
            }
            println!("locked {} for {client_id}", lock.name());
            Ok(())
        }
        Commands::Unlock {
            name,
            client_id,
            lock_args,
        } => {
            let lock = DistributedLock::open(name, client, lock_args.lock_config());
            lock.unlock(&client_id).await?;
            println!("unlocked {}", lock.name());
            Ok(())
        }
        Commands::Holder { name } => {
            let lock = DistributedLock::open(name, client, LockConfig::default());
            match lock.holder().await? {
                Some(owner) => println!("{owner}"),
                None => println!("unlocked"),
            }
            Ok(())
        }
    }
}

async fn demo(
    client: Arc<ClusterClient>,
    name: String,
    work_ms: &[u64],
    config: LockConfig,
) -> Result<()> {
    let workers = Worker::from_durations(work_ms);
    if workers.is_empty() {
        bail!("demo needs at least one worker");
    }

    let retry = config.retry_delay();
    let lock = DistributedLock::create(Some(name), client, config).await?;

    let handles: Vec<_> = workers
        .into_iter()
        .map(|worker| tokio::spawn(run_worker(lock.clone(), worker, retry)))
        .collect();
    info!(lock = lock.name(), workers = handles.len(), "demo running, ctrl-c to stop");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("stopping demo");
            Ok(())
        }
        (finished, _, _) = futures::future::select_all(handles) => {
            if let Err(err) = &finished {
                error!(error = %err, "worker stopped");
            }
            Ok(finished?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_value_accepts_json_and_text() {
        assert_eq!(parse_value("42"), serde_json::json!(42));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value(r#"{"owner":"a"}"#), serde_json::json!({"owner": "a"}));
        assert_eq!(parse_value("hello"), Value::String("hello".into()));
    }

    #[test]
    fn test_node_lists_are_comma_separated() {
        let cli = parse(&[
            "keylock",
            "--nodes-addresses",
            "10.0.0.1:8080,10.0.0.2:8080",
            "--nodes-ids",
            "n1,n2",
            "get",
            "k",
        ]);
        let config = cli.cluster.client_config().unwrap();
        assert_eq!(config.nodes_ids, vec!["n1", "n2"]);
        assert_eq!(config.nodes_addresses[1], "10.0.0.2:8080");
        assert!(matches!(cli.command, Commands::Get { ref key } if key == "k"));
    }

    #[test]
    fn test_mismatched_node_lists_fail_validation() {
        let cli = parse(&[
            "keylock",
            "--nodes-addresses",
            "10.0.0.1:8080,10.0.0.2:8080",
            "--nodes-ids",
            "n1",
            "holder",
            "my-lock",
        ]);
        assert!(cli.cluster.client_config().is_err());
    }

    #[test]
    fn test_config_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes_addresses":["a:1"],"nodes_ids":["n1"],"execution_timeout_ms":25}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = parse(&[
            "keylock",
            "--config",
            path,
            "--command-timeout-ms",
            "900",
            "get",
            "k",
        ]);
        let config = cli.cluster.client_config().unwrap();
        assert_eq!(config.execution_timeout_ms, 25);
        assert_eq!(config.command_timeout_ms, Some(900));
    }

    #[test]
    fn test_demo_defaults() {
        let cli = parse(&["keylock", "--nodes-addresses", "a:1", "--nodes-ids", "n1", "demo"]);
        match cli.command {
            Commands::Demo {
                lock,
                work_ms,
                lock_args,
            } => {
                assert_eq!(lock, "my-lock");
                assert_eq!(work_ms, vec![5000, 4000, 3000]);
                assert_eq!(lock_args.lock_config(), LockConfig::default());
            }
            _ => panic!("expected demo"),
        }
    }

    #[test]
    fn test_lenient_flag_sets_unlock_mode() {
        let cli = parse(&[
            "keylock",
            "--nodes-addresses",
            "a:1",
            "--nodes-ids",
            "n1",
            "unlock",
            "L",
            "worker-1",
            "--lenient",
        ]);
        match cli.command {
            Commands::Unlock { lock_args, .. } => {
                assert_eq!(lock_args.lock_config().unlock_mode, UnlockMode::Lenient);
            }
            _ => panic!("expected unlock"),
        }
    }
}
