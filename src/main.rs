use chordial::{ChordConfig, ChordNode, Key, LocalTransport, Value};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chordial")]
#[command(author, version, about = "Routing core of a Chord-style DHT", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an in-process ring, stabilize it, then store and look up a value
    Demo {
        /// Number of nodes in the ring
        #[arg(short, long, default_value_t = 4)]
        nodes: usize,
        /// Identifier-space width in bits
        #[arg(short, long, default_value_t = 160)]
        bits: u32,
        /// Stabilization rounds to run (default: three per node)
        #[arg(short, long)]
        rounds: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { nodes, bits, rounds } => {
            let nodes = nodes.max(1);
            demo(nodes, bits, rounds.unwrap_or(3 * nodes)).await
        }
    }
}

async fn demo(count: usize, bits: u32, rounds: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = ChordConfig {
        id_bits: bits,
        stabilize_interval: Duration::from_millis(200),
        fix_fingers_interval: Duration::from_millis(200),
        ..ChordConfig::default()
    };
    let transport = Arc::new(LocalTransport::new(config.rpc_timeout));

    let bootstrap = ChordNode::bootstrap("127.0.0.1:5000", config.clone(), transport.clone())?;
    transport.register(bootstrap.handle().clone()).await;
    info!(node = %bootstrap.node_ref(), "bootstrap node up");

    let entry = bootstrap.node_ref().clone();
    let mut ring = vec![bootstrap];
    for i in 1..count {
        let addr = format!("127.0.0.1:{}", 5000 + i);
        let node = ChordNode::join(addr, config.clone(), transport.clone(), &entry).await?;
        transport.register(node.handle().clone()).await;
        info!(node = %node.node_ref(), "joined ring");
        ring.push(node);
    }

    info!(rounds, "running stabilization");
    for _ in 0..rounds {
        for node in &ring {
            if let Err(e) = node.stabilize_once().await {
                error!(node = %node.node_ref(), error = %e, "stabilize round failed");
            }
        }
    }
    for node in &ring {
        node.fix_all_fingers().await?;
    }

    let key = Key(b"hello".to_vec());
    ring[0].store(key.clone(), Value(b"world".to_vec())).await?;
    info!("stored \"hello\" through {}", ring[0].node_ref());

    match ring[ring.len() - 1].lookup(key).await? {
        Some(value) => info!(
            "lookup through {} returned {:?}",
            ring[ring.len() - 1].node_ref(),
            String::from_utf8_lossy(&value.0)
        ),
        None => error!("lookup returned not-found for a key that was just stored"),
    }

    let mut summaries = Vec::with_capacity(ring.len());
    for node in &ring {
        summaries.push(node.summary().await?);
    }
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
