#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roastify::app::run().await
}
