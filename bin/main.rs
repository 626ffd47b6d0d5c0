use mailsink::{logging, Config, SmtpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    let server = SmtpServer::from(config);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    server.stop().await;

    Ok(())
}
