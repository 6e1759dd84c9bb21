use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::event::{generate_new_uuid, Event, EventStream};
use crate::handshake::accept_async_with_config;
use log::debug;
use std::io;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A ready to use websockets server
///
/// Spawns a websockets server with just several lines of code. Accepts as
/// argument the port where the server will be running, and returns an
/// `EventStream`, which implements the Stream trait, capable of processing a
/// stream of events sequentially, notifying the end-user about new client
/// connections, disconnections, messages and errors.
pub async fn start_server_with_config(
    port: u16,
    config: Option<WebSocketConfig>,
) -> Result<EventStream, io::Error> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let (tx, rx) = mpsc::channel(1000);

    // This spawned task processes new connections, messages, disconnections
    // and errors concurrently, while the end-user consumes the EventStream
    tokio::spawn(async move {
        loop {
            // UUIDs are more flexible and secure than incrementing IDs
            let uuid = generate_new_uuid();
            match listener.accept().await {
                Ok((stream, _)) => {
                    let ws_connection =
                        match accept_async_with_config(stream, config.clone()).await {
                            Ok(conn) => conn,
                            Err(err) => {
                                if tx.send(Event::Error(uuid, err)).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                    // splitting the connection, so incoming messages are
                    // monitored in a separate task while the writer is
                    // handed over to the end-user
                    let (mut ws_reader, ws_writer) = ws_connection.split();

                    if tx.send(Event::NewClient(uuid, ws_writer)).await.is_err() {
                        break;
                    }

                    let tx_task = tx.clone();
                    tokio::spawn(async move {
                        loop {
                            match ws_reader.read_message().await {
                                Ok(message) => {
                                    if tx_task
                                        .send(Event::NewMessage(uuid, message))
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                                // the peer finished the closing handshake
                                Err(Error::Closed) => break,
                                Err(err) => {
                                    let _ = tx_task.send(Event::Error(uuid, err)).await;
                                    break;
                                }
                            }
                        }

                        debug!("client {} disconnected", uuid);
                        let _ = tx_task.send(Event::Disconnect(uuid)).await;
                    });
                }
                Err(error) => {
                    if tx.send(Event::Error(uuid, error.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Deliver the EventStream to the end-user without blocking this function
    // call by the spawned task
    Ok(EventStream::new(rx))
}

pub async fn start_server(port: u16) -> Result<EventStream, io::Error> {
    start_server_with_config(port, None).await
}
