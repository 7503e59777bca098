use std::time::Duration;

use anyhow::{Context, Result};
use pilot::{Config, Pilot, TokioClock};
use pilot_runtime::{CdpClient, HostLauncher};
use tracing::info;

use crate::cli::{Cli, Commands, TabsAction};

type CliPilot = Pilot<CdpClient, HostLauncher, TokioClock>;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        verbose: _,
        port,
        app_urls,
        executable,
        command,
    } = cli;

    let mut config = Config {
        port,
        ..Config::default()
    };
    if !app_urls.is_empty() {
        config.primary_url_patterns = app_urls;
    }

    let client = CdpClient::new(port);
    let launcher = HostLauncher::new(executable, None);
    let mut pilot = Pilot::new(client, launcher, TokioClock, config);

    match command {
        Commands::Connect { target } => {
            pilot.connect(target.as_deref()).await?;
            print_json(&pilot.connection_state())?;
        }
        Commands::Ask { prompt, timeout } => {
            pilot.connect(None).await?;
            let status = pilot.ask(&prompt, Duration::from_secs(timeout)).await?;
            print_json(&status)?;
        }
        Commands::Status => {
            pilot.connect(None).await?;
            let status = pilot.status().await?;
            print_json(&status)?;
        }
        Commands::Wait { timeout } => {
            pilot.connect(None).await?;
            let status = pilot.wait(Duration::from_secs(timeout)).await;
            print_json(&status)?;
        }
        Commands::Stop => {
            pilot.connect(None).await?;
            let clicked = pilot.stop().await?;
            print_json(&serde_json::json!({ "stopped": clicked }))?;
        }
        Commands::Tabs { action } => {
            pilot.connect(None).await?;
            tabs(&mut pilot, action).await?;
        }
        Commands::Navigate { url } => {
            pilot.connect(None).await?;
            pilot.navigate(&url).await?;
            info!(target = "pilot", %url, "navigated");
        }
        Commands::Screenshot { output } => {
            pilot.connect(None).await?;
            let bytes = pilot.screenshot().await?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::Upload { selector, files } => {
            pilot.connect(None).await?;
            pilot.upload(&selector, &files).await?;
            info!(target = "pilot", count = files.len(), "files injected");
        }
    }

    Ok(())
}

async fn tabs(pilot: &mut CliPilot, action: TabsAction) -> Result<()> {
    match action {
        TabsAction::List => {
            let tabs = pilot.refresh_tabs().await?;
            print_json(&tabs)?;
        }
        TabsAction::Open { url } => {
            let tab = pilot.open_tab(&url).await?;
            print_json(&tab)?;
        }
        TabsAction::Close { id } => {
            pilot.close_tab(&id).await?;
            print_json(&serde_json::json!({ "closed": id }))?;
        }
        TabsAction::Purpose { id, purpose, task } => {
            pilot.set_tab_purpose(&id, purpose.into(), task).await?;
            let tab = pilot.registry().get(&id).cloned();
            print_json(&tab)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
