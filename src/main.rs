use std::process;
use std::sync::Arc;

use pergamena::{
    application::{
        certificate::CertificateService, encode::PayloadEncoder, engine::PdfEngine,
        error::AppError, render::TemplateRenderer,
    },
    cache::{CacheConfig, LayoutStore},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        layouts::LayoutLibrary,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let store = Arc::new(LayoutStore::new(&CacheConfig::from(&settings.cache)));
    let library = Arc::new(LayoutLibrary::new(settings.templates.directory.clone()));
    let renderer = TemplateRenderer::new(store, library, settings.templates.delimiters.clone());
    let encoder = PayloadEncoder::new(settings.encoder.scale, settings.encoder.delivery);
    let engine = Arc::new(PdfEngine::new(settings.engine.clone()));

    if settings.engine.warm_on_startup
        && let Err(err) = engine.warm().await
    {
        warn!(
            target = "pergamena::server",
            error = %err,
            "Rendering engine warm start failed; retrying on first request"
        );
    }

    let certificates = Arc::new(CertificateService::new(
        encoder,
        renderer,
        engine,
        settings.templates.default_layout.clone(),
    ));
    let router = http::build_router(HttpState { certificates });

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pergamena::server",
        addr = %settings.server.public_addr,
        templates = %settings.templates.directory.display(),
        "Serving certificate API"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
