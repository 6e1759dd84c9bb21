use frame_flow::event::Event;
use frame_flow::server::start_server;
use futures::StreamExt;
use log::*;
use std::collections::HashMap;

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut event_stream = start_server(9004).await.expect("Can't start the server");
    info!("Listening on port 9004");

    let mut clients = HashMap::new();

    while let Some(event) = event_stream.next().await {
        match event {
            Event::NewClient(id, writer) => {
                info!("New client connected: {}", id);
                clients.insert(id, writer);
            }
            Event::NewMessage(id, message) => {
                // echo the message back to its sender
                if let Some(writer) = clients.get_mut(&id) {
                    if writer.send_message(message).await.is_err() {
                        error!("Failed to echo message to {}", id);
                    }
                }
            }
            Event::Disconnect(id) => {
                info!("Client {} disconnected", id);
                clients.remove(&id);
            }
            Event::Error(id, err) => {
                error!("Error from client {}: {}", id, err);
            }
        }
    }
}
