//! Client tests against a scripted local HTTP server

use std::sync::{Arc, Mutex};

use client::{ClientError, Conversation, DriveOutcome, GatewayClient};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

fn response_json(status: u16, body: serde_json::Value) -> ScriptedResponse {
    ScriptedResponse {
        status,
        content_type: "application/json",
        body: body.to_string().into_bytes(),
    }
}

fn response_sse(frames: &[&str]) -> ScriptedResponse {
    let body: String = frames
        .iter()
        .map(|frame| format!("data: {}\n\n", frame))
        .collect();
    ScriptedResponse {
        status: 200,
        content_type: "text/event-stream",
        body: body.into_bytes(),
    }
}

struct ScriptedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn({
            let requests = Arc::clone(&requests);
            async move {
                for script in scripts {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    let Ok(request) = read_request(&mut socket).await else {
                        break;
                    };
                    requests.lock().unwrap().push(request);
                    respond(&mut socket, script).await;
                }
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);

        let text = String::from_utf8_lossy(&request);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }

    Ok(String::from_utf8_lossy(&request).into_owned())
}

async fn respond(socket: &mut TcpStream, response: ScriptedResponse) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        status_reason(response.status),
        response.content_type,
        response.body.len(),
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&response.body).await;
    let _ = socket.shutdown().await;
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        409 => "Conflict",
        _ => "Unknown",
    }
}

fn session_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": "0b6a2f6e-8c3e-4d8a-9a43-0e2f1d1f5c11",
        "name": "New Session",
        "chat_history": [],
        "generated_code": null,
        "ui_editor_state": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn login_stores_token_for_later_calls() {
    let server = ScriptedServer::new(vec![
        response_json(
            200,
            json!({
                "success": true,
                "access_token": "tok-123",
                "expires_in": 604800,
                "user": {"id": "0b6a2f6e-8c3e-4d8a-9a43-0e2f1d1f5c11", "email": "ada@example.com"}
            }),
        ),
        response_json(200, json!([session_json("session_a")])),
    ])
    .await;

    let mut client = GatewayClient::new(&server.base_url).unwrap();
    let account = client.login("ada@example.com", "hunter2").await.unwrap();
    assert_eq!(account.email, "ada@example.com");
    assert_eq!(client.token(), Some("tok-123"));

    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "session_a");

    let requests = server.requests();
    assert!(requests[0].starts_with("POST /api/auth/login "));
    assert!(requests[0].contains(r#""email":"ada@example.com""#));
    assert!(requests[1].starts_with("GET /api/sessions "));
    assert!(requests[1].to_lowercase().contains("authorization: bearer tok-123"));

    server.shutdown();
}

#[tokio::test]
async fn register_conflict_surfaces_gateway_message() {
    let server = ScriptedServer::new(vec![response_json(
        409,
        json!({"success": false, "error": "User already exists"}),
    )])
    .await;

    let mut client = GatewayClient::new(&server.base_url).unwrap();
    let error = client.register("ada@example.com", "hunter2").await.unwrap_err();

    assert!(matches!(
        error,
        ClientError::Api { status: 409, ref message } if message == "User already exists"
    ));
    assert_eq!(client.token(), None);

    server.shutdown();
}

#[tokio::test]
async fn generate_streams_then_saves_session() {
    let server = ScriptedServer::new(vec![
        response_sse(&[
            r#"{"type":"chunk","content":"Here is "}"#,
            r#"{"type":"chunk","content":"```tsx\nconst X=1\n```"}"#,
            r#"{"type":"chunk","content":"\n```css\n.x{}\n```"}"#,
            r#"{"type":"complete","content":"Here is ```tsx\nconst X=1\n```\n```css\n.x{}\n```","code":{"tsx":"const X=1","css":".x{}"}}"#,
            "[DONE]",
        ]),
        response_json(200, session_json("s1")),
    ])
    .await;

    let client = GatewayClient::new(&server.base_url)
        .unwrap()
        .with_token("tok-123");
    let mut conversation = Conversation::new("s1");

    let outcome = client.generate(&mut conversation, " a button\n").await.unwrap();

    assert_eq!(outcome, DriveOutcome::Completed);
    assert_eq!(conversation.messages[0].content, "a button");
    assert_eq!(
        conversation.last_message(),
        Some("Here is ```tsx\nconst X=1\n```\n```css\n.x{}\n```")
    );
    let code = conversation.generated_code.clone().unwrap();
    assert_eq!(code.tsx, "const X=1");
    assert_eq!(code.css, ".x{}");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /api/ai/stream/s1?prompt=a+button&token=tok-123 "));
    assert!(requests[1].starts_with("PATCH /api/sessions/s1 "));
    assert!(requests[1].contains(r#""generated_code":{"tsx":"const X=1","css":".x{}"}"#));
    assert!(requests[1].contains(r#""chat_history":["#));

    server.shutdown();
}

#[tokio::test]
async fn generate_error_event_is_not_saved() {
    let server = ScriptedServer::new(vec![response_sse(&[
        r#"{"type":"error","error":"LLM API key not configured"}"#,
    ])])
    .await;

    let client = GatewayClient::new(&server.base_url)
        .unwrap()
        .with_token("tok-123");
    let mut conversation = Conversation::new("s1");

    let outcome = client.generate(&mut conversation, "a button").await.unwrap();

    assert_eq!(outcome, DriveOutcome::Failed);
    assert_eq!(
        conversation.last_message(),
        Some("Error: LLM API key not configured")
    );
    assert_eq!(server.requests().len(), 1);

    server.shutdown();
}

#[tokio::test]
async fn rejected_stream_marks_message_as_error() {
    let server = ScriptedServer::new(vec![response_json(
        401,
        json!({"success": false, "error": "Invalid or expired token"}),
    )])
    .await;

    let client = GatewayClient::new(&server.base_url)
        .unwrap()
        .with_token("expired");
    let mut conversation = Conversation::new("s1");

    let error = client
        .generate(&mut conversation, "a button")
        .await
        .unwrap_err();

    assert!(matches!(error, ClientError::Api { status: 401, .. }));
    assert!(!conversation.is_generating());
    assert_eq!(
        conversation.last_message(),
        Some("Failed to start generation: Invalid or expired token. Please try again.")
    );

    server.shutdown();
}
