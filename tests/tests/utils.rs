use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("bomber=debug,mock_service=info,axum::rejection=trace")
            .try_init();
    });
}

/// Start a mock service on an ephemeral port owned by the calling test's runtime.
#[allow(unused)]
pub async fn spawn_mock_service() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = mock_service::serve(listener).await {
            error!("Mock service exited: {err}");
        }
    });
    Ok(format!("http://{addr}"))
}
