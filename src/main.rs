#[tokio::main]
async fn main() {
    if let Err(e) = voicenav_lib::run().await {
        tracing::error!(error = %e, "voicenav exited with error");
        eprintln!("voicenav: {e}");
        std::process::exit(1);
    }
}
