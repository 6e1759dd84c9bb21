use frame_flow::handshake::connect_async;
use log::*;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    match connect_async(addr).await {
        Ok(mut ws_connection) => {
            let mut ticker = interval(Duration::from_secs(5));

            // send a few messages against an echo server, then close
            for i in 0..3 {
                ticker.tick().await;
                let payload = format!("message number {}", i);
                if ws_connection.send_as_text(payload).await.is_err() {
                    error!("Failed to send message");
                    return;
                }
                match ws_connection.read_message().await {
                    Ok(message) => {
                        info!("Received message: {}", message.as_text().unwrap())
                    }
                    Err(err) => {
                        error!("Received error from the stream: {}", err);
                        return;
                    }
                }
            }

            if ws_connection.close_connection().await.is_err() {
                error!("Error occurred when closing connection");
            }
        }
        Err(err) => error!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("ws://127.0.0.1:9002").await;
}
