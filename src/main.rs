#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procure::start_server().await
}
