use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::endpoints::Router;
use crate::app::error::AppError;
use crate::app::models::Message;

pub const CLOSE_SUBJECT: &str = "/close";

/// Accepts driver connections and serves each on its own thread. Every line is one JSON
/// `Message` and is answered with exactly one JSON line.
pub fn serve(listener: TcpListener, router: Arc<Router>) -> Result<(), AppError> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::system(format!("Failed to read listener address: {err}"), ""))?;
    info!(address = %local, "listening for driver connections");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let router = Arc::clone(&router);
        std::thread::spawn(move || {
            let peer = stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            info!(peer = %peer, "driver connected");
            if let Err(err) = serve_connection(stream, &router) {
                warn!(peer = %peer, error = %err, "connection closed with error");
            }
            info!(peer = %peer, "driver disconnected");
        });
    }
    Ok(())
}

fn serve_connection(stream: TcpStream, router: &Router) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match handle_line(&line, router) {
            LineOutcome::Reply(response) => write_message(&mut writer, &response)?,
            LineOutcome::Close => break,
        }
    }
    Ok(())
}

#[derive(Debug)]
enum LineOutcome {
    Reply(Message),
    Close,
}

fn handle_line(line: &str, router: &Router) -> LineOutcome {
    let trace_id = Uuid::new_v4().to_string();
    let request: Message = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "malformed request");
            return LineOutcome::Reply(Message::error(format!("Malformed request: {err}")));
        }
    };
    if request.subject == CLOSE_SUBJECT {
        debug!(trace_id = %trace_id, "close requested");
        return LineOutcome::Close;
    }
    match router.handle_with_trace(&request, &trace_id) {
        Ok(response) => LineOutcome::Reply(response),
        Err(err) => {
            // Unroutable subjects are driver bugs: drop the connection rather than answer.
            error!(trace_id = %trace_id, code = %err.code, error = %err.error, "closing connection");
            LineOutcome::Close
        }
    }
}

fn write_message(writer: &mut impl Write, message: &Message) -> std::io::Result<()> {
    let payload = serde_json::to_string(message)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    writer.write_all(payload.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::endpoints::PropertiesEndpoint;
    use std::fs;

    fn router(properties: &std::path::Path) -> Arc<Router> {
        Arc::new(Router::new().register(
            "/properties",
            Arc::new(PropertiesEndpoint::new(properties)),
        ))
    }

    #[test]
    fn malformed_line_gets_error_reply() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let router = router(&tmp.path().join("mate.properties"));
        match handle_line("{subject", &router) {
            LineOutcome::Reply(response) => {
                assert!(response.error_info().expect("info").starts_with("Malformed request"))
            }
            LineOutcome::Close => panic!("expected reply"),
        }
    }

    #[test]
    fn close_and_unroutable_subjects_end_the_connection() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let router = router(&tmp.path().join("mate.properties"));
        assert!(matches!(
            handle_line(r#"{"subject":"/close"}"#, &router),
            LineOutcome::Close
        ));
        assert!(matches!(
            handle_line(r#"{"subject":"/emulator/interaction"}"#, &router),
            LineOutcome::Close
        ));
    }

    #[test]
    fn serves_requests_over_tcp() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let path = tmp.path().join("mate.properties");
        fs::write(&path, "seed=7\n").expect("write");

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr");
        let router = router(&path);
        std::thread::spawn(move || serve(listener, router));

        let mut stream = TcpStream::connect(address).expect("connect");
        stream
            .write_all(b"{\"subject\":\"/properties/get_mate_properties\"}\n")
            .expect("write");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut line = String::new();
        reader.read_line(&mut line).expect("read");
        let response: Message = serde_json::from_str(&line).expect("json");
        assert_eq!(response.subject, "/properties");
        assert_eq!(response.parameter("seed"), Some("7"));

        stream.write_all(b"{\"subject\":\"/close\"}\n").expect("write");
        line.clear();
        assert_eq!(reader.read_line(&mut line).expect("eof"), 0);
    }
}
