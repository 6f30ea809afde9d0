//! duorpc command-line entry point.
//!
//! ```bash
//! # Run the server
//! duorpc serve -b 0.0.0.0:2222 -w 4
//!
//! # Issue increments against it (one concurrent request per value)
//! duorpc call 127.0.0.1:2222 42 33 1
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;

use duorpc_client::CalculatorProxy;
use duorpc_server::{Server, SlowCalculator};

#[derive(FromArgs)]
/// duorpc - correlation-tagged RPC over one persistent connection
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available subcommands: run the server or issue calls against one.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Arguments for running the server dispatcher.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run the duorpc server
struct ServeArgs {
    /// address to bind to (e.g. "0.0.0.0:2222")
    #[argh(option, short = 'b', long = "bind", default = "\"0.0.0.0:2222\".into()")]
    bind: String,

    /// worker pool size per connection
    #[argh(option, short = 'w', long = "workers", default = "2")]
    workers: usize,

    /// artificial handler delay in milliseconds
    #[argh(option, long = "delay-ms", default = "2000")]
    delay_ms: u64,
}

/// Arguments for issuing increment requests.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// send increment requests to a server and print the results
struct CallArgs {
    /// address of the server (e.g. "127.0.0.1:2222")
    #[argh(positional)]
    server_address: String,

    /// values to increment; all requests are issued concurrently
    #[argh(positional)]
    values: Vec<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep `call` output clean for scripting; logs only for the server.
    if matches!(cli.command, Commands::Serve(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => {
            let calculator = Arc::new(SlowCalculator::new(Duration::from_millis(args.delay_ms)));
            let server = Server::bind(&args.bind, calculator, args.workers).await?;
            tracing::info!(
                addr = %server.local_addr()?,
                workers = args.workers,
                delay_ms = args.delay_ms,
                "duorpc server listening"
            );
            server.run().await?;
            Ok(())
        }
        Commands::Call(args) => {
            if args.values.is_empty() {
                anyhow::bail!("no values given; usage: duorpc call <addr> <n>...");
            }

            let proxy = CalculatorProxy::connect(&args.server_address).await?;
            let handles: Vec<_> = args
                .values
                .iter()
                .map(|&n| (n, proxy.increment(n)))
                .collect();

            let mut failed = false;
            for (n, handle) in handles {
                match handle.get().await {
                    Ok(value) => println!("{} -> {}", n, value),
                    Err(e) => {
                        eprintln!("{} -> error: {}", n, e);
                        failed = true;
                    }
                }
            }

            if failed {
                anyhow::bail!("one or more requests failed");
            }
            Ok(())
        }
    }
}
