mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use bomber::prelude::*;
    use mock_service::BarsResponse;
    use reqwest::Client;
    use std::time::Duration;

    fn fetch_bars(client: Client, url: String, name: &str) -> Scenario {
        Scenario::new(name, move |_ctx| {
            let client = client.clone();
            let url = url.clone();
            async move {
                match get_bars(&client, &url).await {
                    Ok(bytes) => Response::ok_with_size(bytes),
                    Err(_) => Response::fail(),
                }
            }
        })
    }

    async fn get_bars(client: &Client, url: &str) -> anyhow::Result<u64> {
        let res = client.get(url).send().await?.error_for_status()?;
        let body = res.bytes().await?;
        let bars: BarsResponse = serde_json::from_slice(&body)?;
        anyhow::ensure!(!bars.bars.is_empty(), "no bars");
        Ok(body.len() as u64)
    }

    fn status_only(client: Client, url: String, name: &str) -> Scenario {
        Scenario::new(name, move |_ctx| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let res = client.get(&url).send().await.and_then(|r| r.error_for_status());
                Response::from(res.map(|_| ()))
            }
        })
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn bars_keep_constant() {
        init();
        let base = spawn_mock_service().await.unwrap();
        let scenario = fetch_bars(Client::new(), format!("{base}/bars"), "scenario_http");

        let stats = Coordinator::new()
            .run(scenario.with_profile(LoadProfile::keep_constant(4, Duration::from_secs(3))))
            .await
            .unwrap();

        assert_eq!(stats.status, RunStatus::Completed);
        assert!(stats.ok > 0);
        assert_eq!(stats.fail, 0);
        assert!(stats.payload_bytes > stats.ok);
        assert!(stats.rps() > 0.);
        assert_eq!(stats.peak_virtual_users, 4);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn flaky_endpoint_failure_rate() {
        init();
        let base = spawn_mock_service().await.unwrap();
        let scenario = status_only(Client::new(), format!("{base}/flaky/30"), "flaky");

        let stats = Coordinator::new()
            .run(scenario.with_profile(LoadProfile::keep_constant(8, Duration::from_secs(3))))
            .await
            .unwrap();

        assert_eq!(stats.status, RunStatus::Completed);
        assert!(stats.total > 100);
        assert_eq!(stats.ok + stats.fail, stats.total);
        assert!(
            (0.15..0.45).contains(&stats.failure_rate()),
            "failure rate {}",
            stats.failure_rate()
        );
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn dynamic_then_static_sequence() {
        init();
        let base = spawn_mock_service().await.unwrap();
        let client = Client::new();
        let profile = LoadProfile::keep_constant(2, Duration::from_secs(2));

        let results = Coordinator::new()
            .run_sequence(vec![
                fetch_bars(client.clone(), format!("{base}/bars"), "scenario_http")
                    .with_profile(profile.clone())
                    .cool_down(Duration::from_millis(200)),
                fetch_bars(client, format!("{base}/bars-static"), "scenario_http_static")
                    .with_profile(profile),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        for stats in &results {
            assert_eq!(stats.status, RunStatus::Completed);
            assert!(stats.ok > 0, "{stats}");
            assert_eq!(stats.fail, 0, "{stats}");
        }
        assert_eq!(results[1].scenario, "scenario_http_static");
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn cancel_slow_endpoint() {
        init();
        let base = spawn_mock_service().await.unwrap();
        let scenario = status_only(Client::new(), format!("{base}/delay/ms/500"), "slow");

        let coordinator = Coordinator::new();
        let handle = coordinator.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        let start = std::time::Instant::now();
        let stats = coordinator
            .run(scenario.with_profile(LoadProfile::keep_constant(4, Duration::from_secs(20))))
            .await
            .unwrap();

        assert_eq!(stats.status, RunStatus::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(stats.total <= 8);
        assert_eq!(coordinator.state(), RunState::Cancelled);
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn stats_serialize() {
        init();
        let base = spawn_mock_service().await.unwrap();
        let scenario = status_only(Client::new(), format!("{base}/delay/ms/5"), "serialized");

        let stats = Coordinator::new()
            .run(scenario.with_profile(LoadProfile::keep_constant(1, Duration::from_secs(1))))
            .await
            .unwrap();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["scenario"], "serialized");
        assert_eq!(json["total"], stats.total);
    }
}
