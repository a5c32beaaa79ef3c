mod trans_server;

use log::error;
use trans_server::TransServer;
use xlayer::{FramingConfig, ListenTarget, Timeouts};

const DEFAULT_TARGET: &str = "tcp:0.0.0.0:1234";
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // tcp:ADDR, unix:PATH or vsock:CID:PORT
    let arg = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let target: ListenTarget = match arg.parse() {
        Ok(target) => target,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let framing = FramingConfig::new().with_max_frame_length(MAX_FRAME_LENGTH);
    let server = TransServer::new(target, Timeouts::default(), framing);
    if let Err(e) = server.run().await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
