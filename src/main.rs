use chord_dht::{DhtNode, NodeConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port|port> [--join <addr:port>] [--restore <file>] [--dump <file>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:14025", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:14026 --join 127.0.0.1:14025 --dump node.bak",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind: Option<String> = None;
    let mut join: Option<String> = None;
    let mut restore: Option<String> = None;
    let mut dump: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--bind" => {
                bind = value;
                i += 2;
            }
            "--join" => {
                join = value;
                i += 2;
            }
            "--restore" => {
                restore = value;
                i += 2;
            }
            "--dump" => {
                dump = value;
                i += 2;
            }
            other => {
                tracing::warn!("Ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }

    let bind = bind.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    let config = NodeConfig::from_env();
    tracing::info!("Maintenance period: {:?}", config.maintain_period);

    // 1. Node and listener:
    let mut node = DhtNode::new(&bind, config)?;
    node.run().await?;
    tracing::info!("Node {} (id {})", node.address(), node.chord().id());

    // 2. Ring membership:
    match &join {
        Some(bootstrap) => {
            tracing::info!("Joining ring via {}", bootstrap);
            node.join(bootstrap).await?;
        }
        None => tracing::info!("Starting a new ring"),
    }

    // 3. Optional restore:
    if let Some(path) = &restore {
        let reader = BufReader::new(File::open(path)?);
        let applied = node.restore(reader).await?;
        tracing::info!("Restored {} records from {}", applied, path);
    }

    // 4. Spawn stats reporter:
    let stats_node = node.chord();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let snapshot = stats_node.snapshot().await;
            if !snapshot.listening {
                break;
            }
            tracing::info!(
                "Ring stats: {} keys, {} backup keys",
                snapshot.data.len(),
                snapshot.backup.len()
            );
            tracing::info!("  - predecessor {:?}", snapshot.predecessor);
            for (idx, successor) in snapshot.successors.iter().enumerate() {
                tracing::info!("  - successor[{}] {}", idx, successor);
            }
        }
    });

    // 5. Wait for shutdown:
    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    if let Some(path) = &dump {
        let mut sink = BufWriter::new(File::create(path)?);
        let written = node.dump(&mut sink).await?;
        tracing::info!("Dumped {} records to {}", written, path);
    }

    node.quit().await?;
    Ok(())
}
