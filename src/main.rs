use rask_beacon::app;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
