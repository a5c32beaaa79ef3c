use std::time::Instant;

use log::*;
use xlayer::{Error, FramedChannel, FramingConfig, ListenTarget, SocketStream};

pub struct TransClient {
    target: ListenTarget,
    framing: FramingConfig,
}

impl TransClient {
    pub fn new(target: ListenTarget, framing: FramingConfig) -> Self {
        Self { target, framing }
    }

    /// Sends `message` `rounds` times and checks each echo.
    pub async fn send_message(&self, message: &[u8], rounds: usize) -> xlayer::Result<()> {
        info!("Connecting to target: {}", self.target);
        let stream = SocketStream::connect(&self.target).await?;
        let mut channel = FramedChannel::new(stream, &self.framing);
        info!("Connected.");

        let start = Instant::now();
        for round in 0..rounds {
            channel.send(message.to_vec()).await?;
            let reply = channel
                .recv()
                .await?
                .ok_or_else(|| Error::invalid_operation("server closed the channel early"))?;
            if reply.as_ref() != message {
                return Err(Error::invalid_operation(format!(
                    "echo mismatch in round {}",
                    round
                )));
            }
            debug!("Round {} echoed {} bytes", round, reply.len());
        }
        channel.close().await?;

        let total = message.len() * rounds;
        let elapsed = start.elapsed();
        let speed = (total as f64 / 1024.0) / elapsed.as_secs_f64();
        info!("=== Round Trip Complete ===");
        info!("Total sent: {} KB", total / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);
        Ok(())
    }
}
