use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

mod config;
mod controllers;
mod facilities;
mod gateway;
mod models;
mod utils;

use config::Config;
use facilities::Facilities;
use gateway::{EventBroadcaster, GatewayServer};

pub struct AppState {
    pub facilities: Arc<Facilities>,
    pub config: Config,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;
    let gateway_port = config.gateway_port;

    let events = Arc::new(EventBroadcaster::new());
    let facilities = Arc::new(Facilities::new(&config, events.clone()));

    if let Some(seed) = config.seed_endpoint() {
        let endpoint = facilities.endpoints.push(None, &seed);
        log::info!("Registered bot endpoint {} -> {}", endpoint.id, endpoint.bot_url);
    }

    // Push-only event stream for inspector clients
    let gateway_server = GatewayServer::new(events);
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], gateway_port));
        if let Err(e) = gateway_server.run(addr).await {
            log::error!("Gateway server failed: {}", e);
        }
    });

    log::info!("Emulator listening on port {}", port);
    log::info!("Gateway WebSocket server on port {}", gateway_port);
    log::info!("Service URL advertised to bots: {}", facilities.service_url);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                facilities: Arc::clone(&facilities),
                config: config.clone(),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::conversations::config)
            .configure(controllers::directline::config)
            .configure(controllers::attachments::config)
            .configure(controllers::botstate::config)
            .configure(controllers::usertoken::config)
            .configure(controllers::emulator::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
