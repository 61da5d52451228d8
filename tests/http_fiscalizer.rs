//! `HttpFiscalizer` against a throwaway local HTTP responder.
//!
//! The responder accepts a single connection, captures the request body and
//! writes back a canned response, which is enough to exercise the client's
//! status and body handling without a real service.

use fiscal_stamp::pipeline::extract::{extract_payload, PayloadDefaults};
use fiscal_stamp::{DocumentError, Fiscalizer, HttpFiscalizer, ReceiptPayload};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

const INVOICE: &str = "\
Fiscal Tax Invoice
Document No. INV-7
Date 01/02/2024
Description Qty Price VAT
Widget 2 5.00 15%
USD";

fn payload() -> ReceiptPayload {
    extract_payload(INVOICE, &PayloadDefaults::default()).unwrap()
}

/// Serve one request with `status` and `body`; resolves to the request body.
async fn respond_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/fiscalize", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length: usize = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}

#[tokio::test]
async fn success_returns_qr_url_and_sends_camel_case_json() {
    let (url, server) = respond_once(
        "200 OK",
        r#"{"success":true,"qr_url":"https://verify.example/qr/77"}"#,
    )
    .await;
    let client = HttpFiscalizer::new(url, Some(5)).unwrap();

    let qr = assert_ok!(client.submit(&payload()).await);
    assert_eq!(qr, "https://verify.example/qr/77");

    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["deviceID"], 19014);
    assert_eq!(sent["receiptType"], "FISCALINVOICE");
    assert_eq!(sent["receiptCurrency"], "USD");
    assert_eq!(sent["invoiceNo"], "INV-7");
    assert_eq!(sent["receiptDate"], "2024-02-01T00:00:00");
    assert!(sent["receiptCounter"].is_null());
    assert!(sent.get("creditDebitNote").is_none());
    assert_eq!(sent["receiptPayments"][0]["paymentAmount"], 10.0);
}

#[tokio::test]
async fn rejection_body_is_read_on_error_status() {
    let (url, _server) = respond_once(
        "400 Bad Request",
        r#"{"success":false,"error":"invalid device"}"#,
    )
    .await;
    let client = HttpFiscalizer::new(url, Some(5)).unwrap();

    let err = assert_err!(client.submit(&payload()).await);
    match err {
        DocumentError::Rejected { message } => assert_eq!(message, "invalid device"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unreadable_body_reports_status() {
    let (url, _server) = respond_once("502 Bad Gateway", "upstream down").await;
    let client = HttpFiscalizer::new(url, Some(5)).unwrap();

    let err = assert_err!(client.submit(&payload()).await);
    assert!(matches!(err, DocumentError::Transport { .. }));
    assert!(err.to_string().contains("502"), "{err}");
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/fiscalize", listener.local_addr().unwrap());
    drop(listener);

    let client = HttpFiscalizer::new(url, Some(5)).unwrap();
    let err = assert_err!(client.submit(&payload()).await);
    assert!(matches!(err, DocumentError::Transport { .. }));
}

#[tokio::test]
async fn configured_timeout_is_enforced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/fiscalize", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let client = HttpFiscalizer::new(url, Some(1)).unwrap();
    let err = assert_err!(client.submit(&payload()).await);
    assert!(err.to_string().contains("timed out"), "{err}");
}
