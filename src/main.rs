use spotlord::app::Supervisor;
use spotlord::config::Config;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!(
        version = %config.version,
        environment = %config.environment,
        symbol = %config.symbol,
        "spotlord starting"
    );

    let supervisor = Supervisor::new(config);
    let cancel = supervisor.cancel_handle();
    let mut run_handle = tokio::spawn(supervisor.run());

    let run_result = tokio::select! {
        result = &mut run_handle => result,
        _ = signal::ctrl_c() => {
            info!("shutdown signal received (SIGINT)");
            cancel.cancel();
            run_handle.await
        }
        () = wait_for_sigterm() => {
            info!("shutdown signal received (SIGTERM)");
            cancel.cancel();
            run_handle.await
        }
    };

    match run_result {
        Ok(Ok(fatal)) => {
            if fatal {
                error!("spotlord stopped after a fatal invariant violation");
                std::process::exit(1);
            }
            info!("spotlord stopped");
        }
        Ok(Err(err)) => {
            error!(error = %err, "spotlord failed to start");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "supervisor task panicked");
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
