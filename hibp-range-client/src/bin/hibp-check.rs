//! Checks passwords against the Pwned Passwords range API.
//!
//! Passwords come from the arguments, or one per line on stdin when there are
//! none. All checks run concurrently through one client, so passwords sharing
//! a hash prefix share a request.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hibp_range_client::{
    ClientConfig, Error, MemoryCache, NoCache, PwnedCache, PwnedClient, ReqwestTransport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hibp-check")]
#[command(about = "Check passwords against the Have I Been Pwned range API")]
struct Args {
    /// Passwords to check (read one per line from stdin if omitted)
    passwords: Vec<String>,

    /// User-Agent sent to the API (overrides HIBP_USER_AGENT)
    #[arg(long)]
    user_agent: Option<String>,

    /// Range endpoint base URL (overrides HIBP_RANGE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds (overrides HIBP_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Cache fetched ranges in memory for the duration of the run
    #[arg(long)]
    memory_cache: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(user_agent) = args.user_agent {
        config.user_agent = user_agent;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Some(Duration::from_secs(secs));
    }

    let passwords = if args.passwords.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("failed to read stdin: {e}")))?
    } else {
        args.passwords
    };

    let transport = ReqwestTransport::from_config(&config)
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
    let builder = PwnedClient::builder(transport).config(config);

    let (results, panicked) = if args.memory_cache {
        check_all(builder.cache(MemoryCache::new()).build(), passwords).await
    } else {
        check_all::<NoCache>(builder.build(), passwords).await
    };

    let mut any_pwned = false;
    let mut any_failed = panicked > 0;
    for (password, result) in results {
        match result {
            Ok(true) => {
                any_pwned = true;
                println!("PWNED\t{password}");
            }
            Ok(false) => println!("ok\t{password}"),
            Err(e) => {
                any_failed = true;
                eprintln!("error\t{password}: {e}");
            }
        }
    }

    Ok(match (any_failed, any_pwned) {
        (true, _) => ExitCode::from(2),
        (false, true) => ExitCode::from(1),
        (false, false) => ExitCode::SUCCESS,
    })
}

async fn check_all<C: PwnedCache>(
    client: PwnedClient<ReqwestTransport, C>,
    passwords: Vec<String>,
) -> (Vec<(String, Result<bool, Error>)>, usize) {
    let client = Arc::new(client);

    let handles: Vec<_> = passwords
        .into_iter()
        .map(|password| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let result = client.check(&password).await;
                (password, result)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    let mut panicked = 0;
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!("check task panicked: {e}");
                panicked += 1;
            }
        }
    }

    (results, panicked)
}
