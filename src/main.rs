use opizontas_directory::{Config, logging, server};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logging::init(&config.log)?;

    tracing::info!("Starting service directory...");
    server::start(config).await?;
    Ok(())
}
