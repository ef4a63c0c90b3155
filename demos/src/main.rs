//! Drives `/bars` and `/bars-static` on a target service at 1, 50 and 200 virtual users.
//!
//! ```text
//! $ cargo run -p mock-service &
//! $ cargo run -p demos -- --duration 30s
//! ```
use anyhow::Result;
use bomber::prelude::*;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::BarsResponse;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
#[allow(unused)]
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version = "0.1")]
struct Cli {
    /// Base URL of the service under test.
    #[arg(short, long, env = "BOMBER_TARGET", default_value = "http://localhost:3000")]
    target: String,

    /// Length of every run.
    #[arg(short, long, default_value = "2m", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Virtual user counts to step through; each is run against both endpoints.
    #[arg(short, long, value_delimiter = ',', default_value = "1,50,200")]
    users: Vec<usize>,

    /// Pause between runs.
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    cool_down: Duration,

    /// Port for the Prometheus exporter; disabled when absent.
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Print each run's statistics as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

static CLIENT: OnceLock<Client> = OnceLock::new();

fn client() -> &'static Client {
    CLIENT.get_or_init(Client::new)
}

/// GET a bars endpoint and accept it only if the body parses.
async fn get_bars(url: &str) -> Result<u64> {
    let res = client().get(url).send().await?.error_for_status()?;
    let body = res.bytes().await?;
    let _: BarsResponse = serde_json::from_slice(&body)?;
    Ok(body.len() as u64)
}

fn bars_scenario(name: &str, url: String) -> Scenario {
    Scenario::new(name, move |_ctx| {
        let url = url.clone();
        async move {
            match get_bars(&url).await {
                Ok(bytes) => Response::ok_with_size(bytes),
                Err(_) => Response::fail(),
            }
        }
    })
}

fn plan(cli: &Cli) -> Vec<RunSpec> {
    let http = bars_scenario("scenario_http", format!("{}/bars", cli.target));
    let http_static = bars_scenario("scenario_http_static", format!("{}/bars-static", cli.target));

    cli.users
        .iter()
        .flat_map(|&users| {
            let profile = LoadProfile::keep_constant(users, cli.duration);
            [
                http.clone().with_profile(profile.clone()),
                http_static.clone().with_profile(profile),
            ]
        })
        .map(|spec| spec.cool_down(cli.cool_down))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bomber=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(port) = cli.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()?;
    }

    let coordinator = Coordinator::new();
    let handle = coordinator.cancel_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted; cancelling remaining runs.");
                handle.cancel();
            }
            Err(err) => error!("Unable to listen for Ctrl-C: {err}"),
        }
    });

    let specs = plan(&cli);
    info!("Running {} runs against {}.", specs.len(), cli.target);
    let results = coordinator.run_sequence(specs).await?;

    for stats in results {
        if cli.json {
            println!("{}", serde_json::to_string(&stats)?);
        } else {
            println!("{stats}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_is_six_runs() {
        let cli = Cli::parse_from(["bars-experiment"]);
        let specs = plan(&cli);
        assert_eq!(specs.len(), 6);

        let names: Vec<_> = specs.iter().map(|s| s.scenario_name()).collect();
        assert_eq!(
            names,
            [
                "scenario_http",
                "scenario_http_static",
                "scenario_http",
                "scenario_http_static",
                "scenario_http",
                "scenario_http_static"
            ]
        );

        let peaks: Vec<_> = specs.iter().map(|s| s.profile().peak()).collect();
        assert_eq!(peaks, [1, 1, 50, 50, 200, 200]);
        assert!(specs
            .iter()
            .all(|s| s.profile().total_duration() == Duration::from_secs(120)));
    }

    #[test]
    fn custom_users_and_duration() {
        let cli = Cli::parse_from(["bars-experiment", "-u", "5,10", "-d", "30s"]);
        let specs = plan(&cli);
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[2].profile().peak(), 10);
        assert_eq!(specs[0].run_options().cool_down, Duration::from_secs(5));
    }
}
