mod trans_client;

use log::error;
use trans_client::TransClient;
use xlayer::{FramingConfig, ListenTarget};

const DATA_SIZE: usize = 1024 * 1024; // 1 MB
const ROUNDS: usize = 16;
const DEFAULT_TARGET: &str = "tcp:127.0.0.1:1234";
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() {
    env_logger::init();

    let arg = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let target: ListenTarget = match arg.parse() {
        Ok(target) => target,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let client = TransClient::new(
        target,
        FramingConfig::new().with_max_frame_length(MAX_FRAME_LENGTH),
    );
    let data = vec![0xAB; DATA_SIZE];
    if let Err(e) = client.send_message(&data, ROUNDS).await {
        error!("Client failed: {}", e);
        std::process::exit(1);
    }
}
