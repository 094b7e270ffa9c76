//! GeminiClient の結合テスト
//!
//! ローカルの使い捨てHTTPサーバーに向けて、リクエスト形式とレスポンス・エラーの扱いを検証する。
//! 実APIへのテストは GEMINI_API_KEY がある場合のみ実行。

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use upcycle_ai::config::Config;
use upcycle_ai::error::UpcycleError;
use upcycle_ai::gemini::GeminiClient;
use upcycle_ai::provider::{ChatBackend, IdeaGenerator, ImageRenderer};
use upcycle_ai_common::{ChatMessage, ChatRole, IdeaRequest, ImageInput, NegativeExample};

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("読み込み失敗");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    if key.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// 1回だけ応答するサーバーを立て、(base_url, 受信したリクエスト) を返す
async fn serve_once(
    status: &'static str,
    content_type: &'static str,
    body: String,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind失敗");
    let addr = listener.local_addr().expect("アドレス取得失敗");
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept失敗");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.expect("書き込み失敗");
        let _ = socket.shutdown().await;
        let _ = tx.send(request);
    });

    (format!("http://{}", addr), rx)
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new(&Config::default())
        .expect("クライアント作成失敗")
        .with_base_url(base_url)
}

fn idea_request() -> IdeaRequest {
    IdeaRequest {
        images: vec![ImageInput {
            file_name: "bottle.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: "aGVsbG8=".to_string(),
        }],
        negative_examples: vec![NegativeExample {
            name: "Bottle Vase".to_string(),
            description: "A vase".to_string(),
        }],
    }
}

#[tokio::test]
async fn test_generate_ideas_request_and_parse() {
    let ideas = json!({
        "identified_items": ["glass bottle"],
        "project_ideas": [{
            "project_name": "Bottle Lamp",
            "description": "A lamp",
            "materials_used": ["glass bottle", "LED string"],
            "difficulty": "beginner",
            "time_required": "1 hour",
            "step_by_step_guide": ["Clean", "Insert LEDs"],
            "ai_image_prompt": "a bottle lamp",
            "youtube_search_query": "bottle lamp diy"
        }]
    });
    let body = json!({
        "candidates": [{"content": {"parts": [{"text": ideas.to_string()}]}}]
    });
    let (base_url, request) = serve_once("200 OK", "application/json", body.to_string()).await;

    let response = client(&base_url)
        .generate_ideas("test-key", &idea_request())
        .await
        .unwrap();

    assert_eq!(response.identified_items, vec!["glass bottle".to_string()]);
    assert_eq!(response.project_ideas[0].project_name, "Bottle Lamp");
    assert!(response.project_ideas[0].variations_and_alternatives.is_empty());

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /gemini-2.5-pro:generateContent"));
    assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains("\"inline_data\""));
    assert!(request.contains("Bottle Vase"));
    assert!(request.contains("\"responseMimeType\":\"application/json\""));
}

#[tokio::test]
async fn test_generate_ideas_invalid_key() {
    let body = json!({
        "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
    });
    let (base_url, _) = serve_once("400 Bad Request", "application/json", body.to_string()).await;

    let err = client(&base_url)
        .generate_ideas("bad-key", &idea_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::InvalidApiKey));
}

#[tokio::test]
async fn test_generate_ideas_malformed_json_is_generator_failure() {
    let body = json!({
        "candidates": [{"content": {"parts": [{"text": "{\"identified_items\": [\"x\"]"}]}}]
    });
    let (base_url, _) = serve_once("200 OK", "application/json", body.to_string()).await;

    let err = client(&base_url)
        .generate_ideas("test-key", &idea_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::GeneratorFailure(_)));
}

#[tokio::test]
async fn test_generate_ideas_blocked() {
    let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
    let (base_url, _) = serve_once("200 OK", "application/json", body.to_string()).await;

    let err = client(&base_url)
        .generate_ideas("test-key", &idea_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::SafetyBlocked));
}

#[tokio::test]
async fn test_render_image_data_url() {
    let body = json!({
        "candidates": [{"content": {"parts": [
            {"text": "here you go"},
            {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
        ]}}]
    });
    let (base_url, request) = serve_once("200 OK", "application/json", body.to_string()).await;

    let image_ref = client(&base_url)
        .render_image(Some("test-key"), "a bottle lamp")
        .await
        .unwrap();
    assert_eq!(image_ref, "data:image/png;base64,iVBORw0KGgo=");

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /gemini-2.5-flash-image:generateContent"));
    assert!(request.contains("\"responseModalities\":[\"IMAGE\"]"));
}

#[tokio::test]
async fn test_render_image_quota() {
    let (base_url, _) = serve_once("429 Too Many Requests", "application/json", "{}".to_string()).await;

    let err = client(&base_url)
        .render_image(Some("test-key"), "a bottle lamp")
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::QuotaExceeded));
}

#[tokio::test]
async fn test_render_image_without_image_part() {
    let body = json!({"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]});
    let (base_url, _) = serve_once("200 OK", "application/json", body.to_string()).await;

    let err = client(&base_url)
        .render_image(Some("test-key"), "a bottle lamp")
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::RendererFailure(_)));
}

#[tokio::test]
async fn test_render_image_requires_credential() {
    let err = client("http://127.0.0.1:9")
        .render_image(None, "a bottle lamp")
        .await
        .unwrap_err();
    assert!(matches!(err, UpcycleError::MissingApiKey));
}

#[tokio::test]
async fn test_stream_reply_sse() {
    let chunk = |text: &str| json!({"candidates": [{"content": {"parts": [{"text": text}]}}]});
    let body = format!(
        "data: {}\r\n\r\ndata: {}\r\n\r\n",
        chunk("Hel"),
        chunk("lo")
    );
    let (base_url, request) = serve_once("200 OK", "text/event-stream", body).await;

    let history = vec![
        ChatMessage { role: ChatRole::User, text: "hi".to_string() },
        ChatMessage { role: ChatRole::Model, text: "hello!".to_string() },
    ];
    let (tx, mut rx) = mpsc::channel(16);
    let full = client(&base_url)
        .stream_reply("test-key", "be nice", &history, "again", tx)
        .await
        .unwrap();

    assert_eq!(full, "Hello");
    let mut deltas = Vec::new();
    while let Some(delta) = rx.recv().await {
        deltas.push(delta);
    }
    assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);

    let request = request.await.unwrap();
    assert!(request.contains(":streamGenerateContent?alt=sse"));
    assert!(request.contains("\"systemInstruction\""));
    assert!(request.contains("\"role\":\"model\""));
}

/// チャンク転送で本文を分割して返すサーバー
async fn serve_chunked(parts: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind失敗");
    let addr = listener.local_addr().expect("アドレス取得失敗");

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept失敗");
        let _ = read_request(&mut socket).await;
        let header = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
        socket.write_all(header.as_bytes()).await.expect("書き込み失敗");
        for part in parts {
            socket
                .write_all(format!("{:x}\r\n", part.len()).as_bytes())
                .await
                .expect("書き込み失敗");
            socket.write_all(&part).await.expect("書き込み失敗");
            socket.write_all(b"\r\n").await.expect("書き込み失敗");
            socket.flush().await.expect("flush失敗");
            // 別々のチャンクとして届くように間を空ける
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.expect("書き込み失敗");
        let _ = socket.shutdown().await;
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_stream_reply_multibyte_split_across_chunks() {
    let event = format!(
        "data: {}\r\n\r\n",
        json!({"candidates": [{"content": {"parts": [{"text": "日本"}]}}]})
    );
    let bytes = event.into_bytes();
    // 「日」の1バイト目の直後で分割する
    let split = bytes
        .windows("日".len())
        .position(|w| w == "日".as_bytes())
        .expect("文字が見つからない")
        + 1;
    let base_url = serve_chunked(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]).await;

    let (tx, mut rx) = mpsc::channel(16);
    let full = client(&base_url)
        .stream_reply("test-key", "be nice", &[], "こんにちは", tx)
        .await
        .unwrap();

    assert_eq!(full, "日本");
    assert_eq!(rx.recv().await.as_deref(), Some("日本"));
}

#[tokio::test]
async fn gemini_live_chat() {
    let api_key = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("GEMINI_API_KEY not set; skipping integration test");
            return;
        }
    };

    let client = GeminiClient::new(&Config::default()).expect("クライアント作成失敗");
    let (tx, mut rx) = mpsc::channel(64);
    let full = client
        .stream_reply(&api_key, "Answer in one word.", &[], "Say hello.", tx)
        .await
        .expect("request failed");

    assert!(!full.trim().is_empty());
    let mut streamed = String::new();
    while let Some(delta) = rx.recv().await {
        streamed.push_str(&delta);
    }
    assert_eq!(streamed, full);
}
