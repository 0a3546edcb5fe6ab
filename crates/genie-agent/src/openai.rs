use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::runtime::AgentRuntime;
use crate::stream::DeltaStream;
use crate::types::AgentCall;
use crate::{AgentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ─── OpenAiRuntime ────────────────────────────────────────────────────────

/// Chat-completions runtime for OpenAI and compatible endpoints.
pub struct OpenAiRuntime {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiRuntime {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Read the key from `key_env`; a missing or blank key is a configuration error.
    pub fn from_env(base_url: impl Into<String>, key_env: &str, timeout: Duration) -> Result<Self> {
        let key = std::env::var(key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Configuration(format!("{key_env} is not set")))?;
        Ok(Self::new(base_url, key.trim(), timeout))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn body(call: &AgentCall, stream: bool) -> serde_json::Value {
        let messages: Vec<_> = call
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        let mut body = json!({
            "model": call.model,
            "messages": messages,
        });
        if call.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(&self, call: &AgentCall, stream: bool) -> Result<reqwest::Response> {
        tracing::debug!(agent = %call.agent, model = %call.model, stream, "chat completion request");
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&Self::body(call, stream))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[async_trait]
impl AgentRuntime for OpenAiRuntime {
    fn name(&self) -> &str {
        "open_ai"
    }

    async fn complete(&self, call: &AgentCall) -> Result<String> {
        let resp = self.post(call, false).await?;
        let raw = resp.text().await?;
        let parsed: Completion =
            serde_json::from_str(&raw).map_err(|source| AgentError::SchemaDecode {
                raw: raw.clone(),
                source,
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Upstream {
                status: 200,
                body: format!("completion had no message content: {raw}"),
            })
    }

    async fn stream(&self, call: &AgentCall) -> Result<DeltaStream> {
        let resp = self.post(call, true).await?;
        let (tx, stream) = DeltaStream::channel();

        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buffer = LineBuffer::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(AgentError::Http(e))).await;
                        return;
                    }
                };
                buffer.push(&chunk);

                while let Some(line) = buffer.next_line() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    };

                    match parse_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Done => return,
                        SseLine::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                // Dropping the response aborts the HTTP body.
                                return;
                            }
                        }
                        SseLine::Invalid(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(stream)
    }
}

// ─── SSE parsing ──────────────────────────────────────────────────────────

/// Raw body bytes waiting for a line break. Lines are decoded only once
/// complete, so a character split across chunks arrives intact.
#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line, trimmed. Invalid UTF-8 is an upstream error.
    fn next_line(&mut self) -> Option<Result<String>> {
        let end = self.bytes.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(
            String::from_utf8(line)
                .map(|l| l.trim().to_string())
                .map_err(|e| AgentError::Upstream {
                    status: 200,
                    body: format!("stream line is not valid UTF-8: {e}"),
                }),
        )
    }
}

enum SseLine {
    Skip,
    Done,
    Delta(String),
    Invalid(AgentError),
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<Chunk>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(text) if !text.is_empty() => SseLine::Delta(text),
            _ => SseLine::Skip,
        },
        Err(source) => SseLine::Invalid(AgentError::SchemaDecode {
            raw: data.to_string(),
            source,
        }),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentDefinition, ChatMessage};

    fn rt(url: &str) -> OpenAiRuntime {
        OpenAiRuntime::new(url, "sk-test", Duration::from_secs(5))
    }

    fn call(json_output: bool) -> AgentCall {
        let agent = if json_output {
            AgentDefinition::json("Judge", "grade", "o3-mini", "{}")
        } else {
            AgentDefinition::text("Writer", "write", "o3-mini")
        };
        AgentCall::new(&agent, &[ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "o3-mini",
                "response_format": { "type": "json_object" }
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#)
            .create_async()
            .await;

        let text = rt(&server.url()).complete(&call(true)).await.unwrap();
        assert_eq!(text, r#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        match rt(&server.url()).complete(&call(false)).await {
            Err(AgentError::Upstream { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_parses_sse_deltas_until_done() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({ "stream": true })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let text = rt(&server.url()).complete_streamed(&call(false)).await;
        assert_eq!(text.unwrap(), "Hello");
    }

    #[test]
    fn text_agents_do_not_request_json_format() {
        let body = OpenAiRuntime::body(&call(false), false);
        assert!(body.get("response_format").is_none());
        assert!(body.get("stream").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn sse_comment_and_blank_lines_are_skipped() {
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line("data: "), SseLine::Skip));
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line("data: {oops"), SseLine::Invalid(_)));
    }

    #[test]
    fn line_buffer_joins_characters_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}\n".as_bytes();
        // Cut inside the three bytes of the first character.
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        buffer.push(&line[..cut]);
        assert!(buffer.next_line().is_none());
        buffer.push(&line[cut..]);

        let text = buffer.next_line().unwrap().unwrap();
        match parse_sse_line(&text) {
            SseLine::Delta(d) => assert_eq!(d, "日本"),
            _ => panic!("expected a delta from {text}"),
        }
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn line_buffer_rejects_invalid_utf8() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"data: \xff\xfe\n");
        assert!(matches!(
            buffer.next_line(),
            Some(Err(AgentError::Upstream { status: 200, .. }))
        ));
    }

    #[tokio::test]
    async fn stream_keeps_multibyte_text_split_across_http_chunks() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let event = "data: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}\n\ndata: [DONE]\n\n"
                .as_bytes();
            let cut = event.iter().position(|b| *b >= 0x80).unwrap() + 1;
            sock.write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
            for part in [&event[..cut], &event[cut..]] {
                sock.write_all(format!("{:x}\r\n", part.len()).as_bytes()).await.unwrap();
                sock.write_all(part).await.unwrap();
                sock.write_all(b"\r\n").await.unwrap();
                sock.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            sock.write_all(b"0\r\n\r\n").await.unwrap();
        });

        let text = rt(&url).complete_streamed(&call(false)).await.unwrap();
        assert_eq!(text, "日本");
    }

    /// Headers received and `content-length` body bytes after them.
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= head_end + 4 + length
    }

    #[test]
    fn from_env_requires_key() {
        let err = OpenAiRuntime::from_env(
            DEFAULT_BASE_URL,
            "GENIE_TEST_KEY_THAT_IS_NEVER_SET",
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    impl OpenAiRuntime {
        async fn complete_streamed(&self, call: &AgentCall) -> Result<String> {
            crate::runner::concat(self.stream(call).await?).await
        }
    }
}
