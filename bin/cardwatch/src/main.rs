#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    cardwatch::run().await
}
