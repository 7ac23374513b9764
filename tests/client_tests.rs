//! Service client tests against a one-shot local HTTP stub.

#![cfg(feature = "client")]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use invoice_forge::client::{InvoiceServiceClient, ServiceConfig};
use invoice_forge::error::InvoiceError;
use invoice_forge::InvoiceRequest;

/// A request as seen by the stub.
#[derive(Debug)]
struct Captured {
    request_line: String,
    authorization: Option<String>,
    body: String,
}

/// Serve exactly one request with `status` and `body`, returning the base
/// URL and a receiver for the captured request.
fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        let mut authorization = None;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap(),
                    "authorization" => authorization = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).unwrap();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();

        tx.send(Captured {
            request_line: request_line.trim_end().to_string(),
            authorization,
            body: String::from_utf8(buf).unwrap(),
        })
        .unwrap();
    });

    (format!("http://{addr}"), rx)
}

fn client(base_url: &str) -> InvoiceServiceClient {
    InvoiceServiceClient::new(ServiceConfig::new(base_url, "secret-token")).unwrap()
}

fn request() -> InvoiceRequest {
    InvoiceRequest::from_json(include_str!("../samples/proforma_request.json")).unwrap()
}

#[test]
fn health_is_an_unauthenticated_get() {
    let (url, rx) = serve_once("200 OK", r#"{"status":"healthy"}"#);
    let body = client(&url).health().unwrap();
    assert_eq!(body["status"], "healthy");

    let seen = rx.recv().unwrap();
    assert!(seen.request_line.starts_with("GET /health "));
    assert!(seen.authorization.is_none());
}

#[test]
fn test_token_sends_bearer() {
    let (url, rx) = serve_once("200 OK", r#"{"valid":true}"#);
    client(&url).test_token().unwrap();

    let seen = rx.recv().unwrap();
    assert!(seen.request_line.starts_with("POST /test-token "));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer secret-token"));
}

#[test]
fn generate_invoice_posts_flattened_record() {
    let (url, rx) = serve_once("200 OK", r#"{"success":true}"#);
    client(&url).generate_invoice(&request()).unwrap();

    let seen = rx.recv().unwrap();
    assert!(seen.request_line.starts_with("POST /generate-invoice "));
    let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["invoice"]["number"], "00PI25-0001");
    assert_eq!(body["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["recipient_emails"][0], "test@example.com");
    assert!(body.get("record").is_none());
}

#[test]
fn proforma_returns_receipt() {
    let (url, rx) = serve_once(
        "200 OK",
        r#"{"success":true,"invoice_number":"00PI25-0001","pdf_filename":"00PI25-0001.pdf",
            "pdf_size_kb":48.2,"total_aed":"13,072.50","emails_sent_to":["test@example.com"]}"#,
    );
    let receipt = client(&url).generate_proforma_invoice(&request()).unwrap();
    assert_eq!(receipt.invoice_number, "00PI25-0001");
    assert_eq!(receipt.pdf_filename, "00PI25-0001.pdf");
    assert_eq!(receipt.total_aed, "13,072.50");
    assert_eq!(receipt.emails_sent_to, vec!["test@example.com".to_string()]);

    let seen = rx.recv().unwrap();
    assert!(seen.request_line.starts_with("POST /generate-proforma-invoice "));
}

#[test]
fn unauthorized_maps_to_auth_error() {
    let (url, _rx) = serve_once("401 Unauthorized", r#"{"detail":"Invalid token"}"#);
    match client(&url).test_token() {
        Err(InvoiceError::Auth(detail)) => assert_eq!(detail, "Invalid token"),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[test]
fn forbidden_maps_to_auth_error() {
    let (url, _rx) = serve_once("403 Forbidden", r#"{"detail":"Not allowed"}"#);
    assert!(matches!(
        client(&url).generate_invoice(&request()),
        Err(InvoiceError::Auth(_))
    ));
}

#[test]
fn server_error_carries_status_and_detail() {
    let (url, _rx) = serve_once("500 Internal Server Error", r#"{"detail":"SMTP unavailable"}"#);
    match client(&url).generate_proforma_invoice(&request()) {
        Err(InvoiceError::Service { status, detail }) => {
            assert_eq!(status, 500);
            assert_eq!(detail, "SMTP unavailable");
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[test]
fn connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let result = client(&format!("http://{addr}")).health();
    assert!(matches!(result, Err(InvoiceError::Transport(_))));
}
