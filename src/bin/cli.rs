use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    voltron::cli::run().await
}
