use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configured = std::env::var("FHIR_MOCK_ADDR").ok();
    let addr = mock_server::listen_addr(configured.as_deref())?;
    let listener = TcpListener::bind(addr).await?;
    println!("FHIR base http://{addr}/fhir (capability statement at /fhir/metadata)");

    let log = mock_server::request_log();
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    mock_server::run_until(listener, log.clone(), shutdown).await?;

    let recorded = log.read().await;
    println!("served {} FHIR requests", recorded.len());
    Ok(())
}
