use anyhow::{bail, Context};
use brain::kernel::cancel::CancellationToken;
use brain::kernel::config::read_json;
use brain::services::sync::HttpSynchronizer;
use brain::{Brain, BrainConfig, ClassifiedUtterance, ExecuteOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Executes one classified utterance read from a JSON file and prints the
/// channel events followed by the settled result.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let mut args = std::env::args().skip(1);
    let (Some(path), None) = (args.next(), args.next()) else {
        bail!("usage: brain <classified-utterance.json>");
    };
    let utterance: ClassifiedUtterance = read_json(&PathBuf::from(path)).await?;

    let config = BrainConfig::from_env()?;
    let sync_url = config.sync_url.clone();
    let (channel, mut events) = brain::kernel::event::PresentationChannel::new();

    let mut brain = Brain::new(config, channel).await?;
    if let Some(url) = sync_url {
        tracing::info!(%url, "Synchronization enabled");
        brain = brain.with_synchronizer(Arc::new(HttpSynchronizer::new(url)));
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("Cannot print {} event: {}", event.name(), e),
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling execution");
            on_interrupt.cancel();
        }
    });

    let options = ExecuteOptions {
        mute: false,
        cancel: Some(cancel),
    };
    let settled = brain.execute(utterance, options).await;

    // Closing the channel lets the printer drain and finish.
    drop(brain);
    printer.await.context("event printer stopped")?;

    match settled {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            std::process::exit(1);
        }
    }
}
