use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;

use avoidable_ed::config::ServerConfig;
use avoidable_ed::handlers::{self, AppState};
use avoidable_ed::inference::{ModelCard, OnnxClassifier};
use avoidable_ed::Classifier;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;

    let card = match &config.model_card_path {
        Some(path) => ModelCard::load(path)?,
        None => ModelCard::for_variant(config.variant),
    };
    let unknown = card.unknown_columns(config.variant);
    if !unknown.is_empty() {
        log::warn!(
            "Model card lists columns the {} schema never produces: {:?}",
            config.variant,
            unknown
        );
    }

    let classifier = OnnxClassifier::load(&config.model_path, card)
        .with_context(|| format!("loading model from {}", config.model_path.display()))?;
    log::info!("Serving {} with the {} schema", classifier.describe(), config.variant);

    let state = web::Data::new(AppState::new(Arc::new(classifier), config.variant));

    log::info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
