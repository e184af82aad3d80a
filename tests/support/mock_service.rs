use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use delay_dashboard::config::HttpTimeouts;
use delay_dashboard::service::HttpDelayService;
use url::Url;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Clone, Debug)]
struct CannedResponse {
    status: u16,
    body: String,
}

#[derive(Default)]
struct Script {
    /// Responses per `"METHOD /path"`; the last one repeats.
    routes: HashMap<String, VecDeque<CannedResponse>>,
    gates: HashMap<String, mpsc::Receiver<()>>,
    requests: Vec<RecordedRequest>,
}

/// A scripted HTTP stand-in for the delay service on `127.0.0.1:0`.
pub struct MockService {
    url: Url,
    script: Arc<Mutex<Script>>,
}

impl MockService {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock service");
        let addr = listener.local_addr().expect("mock service addr");
        let script = Arc::new(Mutex::new(Script::default()));
        let shared = Arc::clone(&script);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let script = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &script));
            }
        });
        Self {
            url: Url::parse(&format!("http://{addr}")).expect("mock service url"),
            script,
        }
    }

    pub fn client(&self) -> HttpDelayService {
        HttpDelayService::new(self.url.clone(), &HttpTimeouts::default())
    }

    /// Queue a response for `route`, e.g. `"GET /api/model/info"`.
    pub fn respond(&self, route: &str, status: u16, body: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .routes
            .entry(route.to_string())
            .or_default()
            .push_back(CannedResponse {
                status,
                body: body.to_string(),
            });
        self
    }

    /// Hold the next request to `route` until the returned sender fires.
    pub fn hold(&self, route: &str) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(route.to_string(), rx);
        tx
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.requests()
            .iter()
            .filter(|req| format!("{} {}", req.method, req.path) == route)
            .count()
    }
}

fn handle(mut stream: TcpStream, script: &Mutex<Script>) {
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let route = format!("{} {}", request.method, request.path);
    let gate = {
        let mut script = script.lock().unwrap();
        script.requests.push(request);
        script.gates.remove(&route)
    };
    if let Some(gate) = gate {
        let _ = gate.recv();
    }
    let response = {
        let mut script = script.lock().unwrap();
        match script.routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    }
    .unwrap_or(CannedResponse {
        status: 404,
        body: r#"{"detail": "Not Found"}"#.to_string(),
    });
    let reply = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(reply.as_bytes());
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let header_end = loop {
        let read = stream.read(&mut buf).ok()?;
        if read == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..read]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + 4 + content_length {
        let read = stream.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
    }
    let mut first_line = head.lines().next()?.split_whitespace();
    let method = first_line.next()?.to_string();
    let path = first_line.next()?.to_string();
    Some(RecordedRequest {
        method,
        path,
        body: String::from_utf8_lossy(&data[header_end + 4..]).into_owned(),
    })
}
