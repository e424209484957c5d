//! Local HTTP stub for plugin tests.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

/// A complete HTTP/1.1 response with `body`.
pub fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Serve `responses` to consecutive connections, one each, then stop.
///
/// Returns the server's base URL and a channel yielding each request line.
pub fn serve(responses: Vec<Vec<u8>>) -> (String, mpsc::Receiver<String>) {
    let server = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let url = format!("http://{}", server.local_addr().expect("local addr"));
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for response in responses {
            let Ok((mut stream, _)) = server.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            let _ = reader.read_line(&mut request_line);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0; content_length];
            let _ = reader.read_exact(&mut body);

            let _ = stream.write_all(&response);
            let _ = tx.send(request_line.trim_end().to_string());
        }
    });

    (url, rx)
}
