use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use axum::{
    body::Body,
    http::{Method, Request, header},
};
use http_body_util::BodyExt;
use tokio::sync::oneshot;
use tower::ServiceExt;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use trellis::{
    application::{
        error::AppError,
        failure::FailureReporter,
        render::RenderDriver,
        response::ResponseAssembler,
        ssr::ServerRenderer,
    },
    community, config,
    infra::{
        assets,
        error::InfraError,
        http::{self, HttpState, VIEWER_HEADER},
        telemetry, tracker,
    },
    presentation::views::HtmlShell,
};

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

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    let renderer = build_renderer(&settings)?;

    match command {
        config::Command::Serve(_) => run_serve(&settings, renderer).await,
        config::Command::Render(args) => run_render(renderer, args).await,
    }
}

fn build_renderer(settings: &config::Settings) -> Result<ServerRenderer, AppError> {
    let manifest = assets::load_manifest(&settings.assets)?;
    let tracker = tracker::build_tracker(&settings.error_tracking)?;

    let assembler = ResponseAssembler::new(Arc::new(HtmlShell::default()), Arc::new(manifest));
    let failures = FailureReporter::new(settings.runtime.mode, tracker);
    let driver = RenderDriver::new(settings.render.max_resolution_passes);

    Ok(community::renderer(driver, assembler, failures))
}

async fn run_serve(settings: &config::Settings, renderer: ServerRenderer) -> Result<(), AppError> {
    let router = http::build_router(HttpState { renderer });
    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "trellis::serve",
        addr = %settings.server.public_addr,
        mode = %settings.runtime.mode,
        max_resolution_passes = settings.render.max_resolution_passes.get(),
        "listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = stop_rx.await;
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "trellis::serve",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested; draining connections"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "trellis::serve",
                "graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_result(joined: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "trellis::serve",
            error = %err,
            "failed to listen for ctrl-c; shutting down"
        );
    }
}

async fn run_render(renderer: ServerRenderer, args: config::RenderArgs) -> Result<(), AppError> {
    let router = http::build_router(HttpState { renderer });

    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(args.path.as_str())
        .header(header::HOST, "localhost");
    if let Some(user) = args.user.as_deref() {
        builder = builder.header(VIEWER_HEADER, user);
    }
    let request = builder
        .body(Body::empty())
        .map_err(|err| AppError::validation(format!("invalid path `{}`: {err}", args.path)))?;

    let response = router
        .oneshot(request)
        .await
        .map_err(|err| AppError::unexpected(format!("render failed: {err}")))?;
    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|err| AppError::unexpected(format!("failed to read rendered body: {err}")))?
        .to_bytes();

    let mut stdout = io::stdout().lock();
    let mut write = || -> io::Result<()> {
        writeln!(stdout, "{:?} {}", parts.version, parts.status)?;
        for (name, value) in &parts.headers {
            writeln!(stdout, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        writeln!(stdout)?;
        stdout.write_all(&body)?;
        writeln!(stdout)?;
        stdout.flush()
    };
    write().map_err(|err| AppError::from(InfraError::from(err)))
}
