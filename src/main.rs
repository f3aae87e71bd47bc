use std::net::SocketAddr;

use clap::Parser;
use inkpost::cli::{
    Args, build_config, init_logging, load_secrets, open_database, validate_public_origin,
};
use inkpost::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some((access_secret, refresh_secret)) = load_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(public_origin) = validate_public_origin(&args.public_origin) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let Some(config) = build_config(&args, db, &public_origin, access_secret, refresh_secret)
    else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let app = create_app(&config);

    info!(
        address = %local_addr,
        rotation = ?config.session_policy.rotation(),
        secure_cookies = config.secure_cookies,
        "Listening"
    );

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
