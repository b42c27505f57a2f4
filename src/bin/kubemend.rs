#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kubemend::terminal::run().await
}
