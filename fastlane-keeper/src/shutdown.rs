use log::*;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;

pub struct Shutdown;
impl Shutdown {
    #[cfg(unix)]
    pub async fn wait() -> std::io::Result<()> {
        let mut terminate_signal =
            signal::unix::signal(SignalKind::terminate())?;
        tokio::select! {
            _ = terminate_signal.recv() => {
                info!("SIGTERM received, stopping keeper");
            },
            _ = signal::ctrl_c() => {
                info!("SIGINT received, stopping keeper");
            },
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn wait() -> std::io::Result<()> {
        signal::ctrl_c().await
    }
}
