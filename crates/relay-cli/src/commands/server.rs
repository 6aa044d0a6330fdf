//! `relay server` - Start the Relay HTTP server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    platform_catalog: Option<String>,
) -> Result<(), String> {
    let config = relay_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        platform_catalog,
    };

    println!("Starting Relay server on {}:{}...", host, port);

    let addr = relay_server::start_server(config).await?;
    println!("Relay server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
