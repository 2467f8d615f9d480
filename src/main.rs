use dotenv::dotenv;
use slopify::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The environment may also come from the process, a missing file is fine.
    dotenv().ok();

    run().await
}
