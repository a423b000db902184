//! Minimal in-process HTTP server for exercising the blocking clients in
//! tests, one canned response per accepted connection.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Behavior {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl Behavior {
    pub(crate) fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TestServer {
    pub(crate) base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: mpsc::Sender<()>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    pub(crate) fn spawn(behaviors: Vec<Behavior>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
        listener.set_nonblocking(true).expect("set nonblocking");
        let addr = listener.local_addr().expect("local addr");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_clone = Arc::clone(&requests);
        let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let behavior = {
                            let mut queue = shared_behaviors.lock().expect("lock behaviors");
                            queue.pop_front().unwrap_or_else(|| Behavior::ok("default-ok"))
                        };
                        let raw = read_request(&mut stream).unwrap_or_default();
                        requests_clone
                            .lock()
                            .expect("lock requests")
                            .push(raw);
                        let _ = write_response(&mut stream, behavior.status, &behavior.body);
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            shutdown_tx,
            join_handle: Some(join_handle),
        }
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock requests").clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().expect("lock requests").len()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    stream.set_read_timeout(Some(Duration::from_millis(300)))?;
    let mut buf = [0_u8; 1024];
    let mut data = Vec::new();
    let mut body_expected: Option<usize> = None;
    loop {
        if let Some(total) = request_complete(&data, &mut body_expected) {
            if data.len() >= total {
                break;
            }
        }
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => data.extend_from_slice(&buf[..read]),
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// Returns the total expected request length once the header block is in.
fn request_complete(data: &[u8], body_expected: &mut Option<usize>) -> Option<usize> {
    let header_end = data
        .windows(4)
        .position(|window| window == b"\r\n\r\n")?
        + 4;
    if body_expected.is_none() {
        let headers = String::from_utf8_lossy(&data[..header_end]);
        let length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        *body_expected = Some(length);
    }
    Some(header_end + body_expected.unwrap_or(0))
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = reason_phrase(status);
    let payload = body.as_bytes();
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    )?;
    stream.write_all(payload)?;
    stream.flush()
}
