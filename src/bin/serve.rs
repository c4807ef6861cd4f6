use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    quake_relay::start_server().await
}
