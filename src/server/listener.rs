//! TCP accept loop.
//!
//! The accept loop is single-threaded and deliberately cheap: it reads one
//! request's bytes from the connection, then hands both the bytes and the
//! connection to the worker pool as a task. All parsing, cache work, and
//! decoding happen on worker threads so slow downstream work cannot starve
//! the listener.
//!
//! Bind failures are fatal and handled by the caller; accept failures are
//! logged and the loop keeps accepting.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fetch::ImageFetcher;
use crate::pool::WorkerPool;

use super::dispatch::Dispatcher;

/// Upper bound on the bytes read from one request.
///
/// One read of the request head is all the wire contract needs; bodies and
/// chunked transfers are out of scope.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Accept connections until the worker pool shuts down.
///
/// Each accepted connection becomes one task: dispatch the request, write
/// the response, close the connection. The loop exits only when task
/// submission fails, which happens once the pool's queue is closed.
pub fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher<F>>, pool: &WorkerPool)
where
    F: ImageFetcher + 'static,
{
    for connection in listener.incoming() {
        let mut stream = match connection {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed; continuing");
                continue;
            }
        };

        let mut request = vec![0u8; MAX_REQUEST_BYTES];
        let read = match stream.read(&mut request) {
            Ok(0) => {
                debug!("connection closed before sending a request");
                continue;
            }
            Ok(read) => read,
            Err(e) => {
                warn!(error = %e, "failed to read request; dropping connection");
                continue;
            }
        };
        request.truncate(read);

        let dispatcher = Arc::clone(&dispatcher);
        let submitted = pool.submit(move || handle_connection(stream, &dispatcher, &request));

        if submitted.is_err() {
            info!("worker pool shut down; listener exiting");
            break;
        }
    }
}

/// Worker-side half of a connection: respond and close.
fn handle_connection<F: ImageFetcher>(
    mut stream: TcpStream,
    dispatcher: &Dispatcher<F>,
    request: &[u8],
) {
    let response = dispatcher.handle(request);

    if let Err(e) = stream.write_all(&response.to_bytes()) {
        warn!(error = %e, "failed to write response");
    }

    // Single-shot protocol: one response per connection.
    let _ = stream.shutdown(Shutdown::Both);
}
