#[tokio::main]
async fn main() -> anyhow::Result<()> {
    runway_cli::run().await
}
