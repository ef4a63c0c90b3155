use bomber::prelude::*;
use std::time::Duration;

#[scenario]
async fn sleepy_step(ctx: StepContext) -> Response {
    assert_eq!(ctx.scenario_name(), "sleepy_step");
    tokio::time::sleep(Duration::from_millis(10)).await;
    Response::ok()
}

#[scenario("renamed step")]
async fn renamed() -> Result<(), std::io::Error> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    Err(std::io::Error::other("always fails"))
}

#[test]
fn macro_names_scenarios() {
    assert_eq!(sleepy_step().name(), "sleepy_step");
    assert_eq!(renamed().name(), "renamed step");
}

#[tracing_test::traced_test]
#[tokio::test(start_paused = true)]
async fn macro_scenarios_run() {
    let profile = LoadProfile::keep_constant(2, Duration::from_millis(500));
    let results = Coordinator::new()
        .run_sequence(vec![
            sleepy_step().with_profile(profile.clone()),
            renamed().with_profile(profile),
        ])
        .await
        .unwrap();

    assert_eq!(results[0].scenario, "sleepy_step");
    assert!(results[0].ok > 0);
    assert_eq!(results[0].fail, 0);

    assert_eq!(results[1].scenario, "renamed step");
    assert_eq!(results[1].ok, 0);
    assert_eq!(results[1].fail, results[1].total);
}
