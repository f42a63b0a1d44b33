//! Demo agents: an echo and a health endpoint over HTTP, an echo and a chat
//! agent over WebSocket.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use wrapnode_server::{
    CloseCode, Connection, HandlerError, Hooks, HttpHandler, HttpRoute, Method, Request, Response,
    ServiceConfig, StreamHandler, StreamRoute,
};

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP agents
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the request back with some metadata.
pub struct EchoHandler;

impl HttpHandler for EchoHandler {
    const HOOKS: Hooks = Hooks::NONE.with_startup().with_shutdown();

    async fn handle(&self, request: Request) -> Result<Response, HandlerError> {
        let body = request
            .json::<Value>()
            .unwrap_or_else(|_| json!({"message": "No JSON body provided"}));

        let headers: BTreeMap<&str, &str> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
            .collect();

        Ok(Response::json(&json!({
            "echo": body,
            "method": request.method().as_str(),
            "path": request.path(),
            "headers": headers,
            "query_params": query_params(request.query()),
        })))
    }

    async fn on_startup(&self) -> Result<(), HandlerError> {
        info!("EchoHandler started up");
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), HandlerError> {
        info!("EchoHandler shutting down");
        Ok(())
    }
}

fn query_params(query: Option<&str>) -> BTreeMap<&str, &str> {
    query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect()
}

/// Detailed status: uptime and request count.
pub struct HealthHandler {
    started: Instant,
    requests: AtomicU64,
}

impl HealthHandler {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
        }
    }
}

impl Default for HealthHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHandler for HealthHandler {
    async fn handle(&self, _request: Request) -> Result<Response, HandlerError> {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let uptime = (self.started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        Ok(Response::json(&json!({
            "status": "healthy",
            "uptime_seconds": uptime,
            "timestamp": now_secs(),
            "request_count": count,
            "process_id": std::process::id(),
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming agents
// ─────────────────────────────────────────────────────────────────────────────

/// Echoes every text frame back, wrapped in a JSON envelope.
pub struct EchoStreamHandler;

impl StreamHandler for EchoStreamHandler {
    const HOOKS: Hooks = Hooks::NONE.with_connect().with_disconnect();

    async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        conn.send_json(&json!({
            "type": "system",
            "message": "Echo WebSocket connected! Send me any message and I'll echo it back.",
            "timestamp": now_secs(),
        }))
        .await?;

        while let Some(text) = conn.receive_text().await {
            let original = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            conn.send_json(&json!({
                "type": "echo",
                "original": original,
                "timestamp": now_secs(),
            }))
            .await?;
        }
        Ok(())
    }

    async fn on_connect(&self, conn: &Connection) -> Result<bool, HandlerError> {
        info!(connection = %conn.id(), "Echo WebSocket connection requested");
        Ok(true)
    }

    async fn on_disconnect(&self, conn: &Connection, code: CloseCode) -> Result<(), HandlerError> {
        info!(connection = %conn.id(), "Echo WebSocket disconnected with code {code}");
        Ok(())
    }
}

const FALLBACK_REPLIES: [&str; 10] = [
    "That's a fascinating perspective! Tell me more about your thoughts on this.",
    "I understand what you're saying. Have you considered the implications of that approach?",
    "Your idea has merit. Let me think about how we could expand on that concept.",
    "That's an interesting point. How do you think this relates to current trends?",
    "I appreciate your insight. What led you to that conclusion?",
    "That's a creative way to look at it. What would be the next steps?",
    "I can see the potential in your thinking. What challenges might we face?",
    "Your approach is innovative. How would you measure success?",
    "That's a thoughtful analysis. What alternatives have you considered?",
    "I'm intrigued by your perspective. Can you elaborate on the key benefits?",
];

#[derive(Debug, Deserialize)]
struct ChatInput {
    #[serde(default)]
    message: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_category() -> String {
    "tech".to_string()
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub sender: &'static str,
    pub message: String,
    pub category: String,
}

/// Simulated conversation agent. Keeps a transcript per connection.
pub struct ChatStreamHandler {
    think_time: Duration,
    transcripts: DashMap<String, Vec<Turn>>,
    fallback: AtomicUsize,
}

impl ChatStreamHandler {
    pub fn new(think_time: Duration) -> Self {
        Self {
            think_time,
            transcripts: DashMap::new(),
            fallback: AtomicUsize::new(0),
        }
    }

    /// Number of connections with an open transcript.
    pub fn active_conversations(&self) -> usize {
        self.transcripts.len()
    }

    fn record(&self, conn: &Connection, sender: &'static str, message: &str, category: &str) {
        self.transcripts.entry(conn.id().to_string()).or_default().push(Turn {
            sender,
            message: message.to_string(),
            category: category.to_string(),
        });
    }

    fn reply_to(&self, message: &str, category: &str) -> String {
        let lower = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        let reply = if mentions(&["hello", "hi", "hey", "greetings"]) {
            "Hello! It's great to connect with you. What exciting ideas are you working on today?"
        } else if mentions(&["help", "assist", "support"]) {
            "I'm here to help! Whether you need brainstorming, problem-solving, or just want to explore ideas, I'm ready to collaborate. What specific area would you like to focus on?"
        } else if category == "tech" && mentions(&["ai", "artificial intelligence", "machine learning", "technology"]) {
            "AI and technology are fascinating fields! The rapid advancement in machine learning is opening up incredible possibilities. What specific aspect of AI interests you most?"
        } else if category == "creative" && mentions(&["art", "design", "creative", "innovation"]) {
            "Creativity is such a powerful force for innovation! What creative project or challenge are you working on?"
        } else if category == "business" && mentions(&["business", "startup", "entrepreneur", "market"]) {
            "The business world is full of exciting opportunities! What business challenge or opportunity are you most excited about right now?"
        } else {
            let idx = self.fallback.fetch_add(1, Ordering::Relaxed) % FALLBACK_REPLIES.len();
            FALLBACK_REPLIES[idx]
        };
        reply.to_string()
    }
}

impl StreamHandler for ChatStreamHandler {
    const HOOKS: Hooks = Hooks::NONE.with_connect().with_disconnect();

    async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        conn.send_json(&json!({
            "type": "agent",
            "message": "Hello! I'm your AI assistant. What's on your mind today?",
            "timestamp": now_secs(),
            "category": "tech",
        }))
        .await?;

        while let Some(text) = conn.receive_text().await {
            let input = serde_json::from_str::<ChatInput>(&text).unwrap_or_else(|_| ChatInput {
                message: text.clone(),
                category: default_category(),
            });
            if input.message.trim().is_empty() {
                continue;
            }
            self.record(conn, "user", &input.message, &input.category);

            conn.send_json(&json!({
                "type": "thinking",
                "message": "Agent is thinking...",
                "timestamp": now_secs(),
            }))
            .await?;
            if !self.think_time.is_zero() {
                tokio::time::sleep(self.think_time).await;
            }

            let reply = self.reply_to(&input.message, &input.category);
            self.record(conn, "agent", &reply, &input.category);
            conn.send_json(&json!({
                "type": "agent",
                "message": reply,
                "timestamp": now_secs(),
                "category": input.category,
            }))
            .await?;
        }
        Ok(())
    }

    async fn on_connect(&self, conn: &Connection) -> Result<bool, HandlerError> {
        info!(connection = %conn.id(), "Chat WebSocket connection requested");
        Ok(true)
    }

    async fn on_disconnect(&self, conn: &Connection, code: CloseCode) -> Result<(), HandlerError> {
        let turns = self
            .transcripts
            .remove(conn.id())
            .map(|(_, turns)| turns.len())
            .unwrap_or(0);
        info!(connection = %conn.id(), "Chat WebSocket disconnected with code {code}; conversation had {turns} messages");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub const DEMO_PORT: u16 = 9000;

/// The multi-agent demo service.
pub fn multi_agent_config(think_time: Duration) -> ServiceConfig {
    ServiceConfig::new()
        .title("Multi-Agent API Example")
        .description("Example application showcasing multiple HTTP and WebSocket agents")
        .port(DEMO_PORT)
        .http_route(
            HttpRoute::new("/api/echo", [Method::Post, Method::Get], EchoHandler)
                .with_tags(["utilities"])
                .with_summary("Echo endpoint")
                .with_description("Echoes back the request data with additional metadata"),
        )
        .http_route(
            HttpRoute::new("/api/health", [Method::Get], HealthHandler::new())
                .with_tags(["system"])
                .with_summary("Health check")
                .with_description("Returns health status, uptime and request count"),
        )
        .stream_route(StreamRoute::new("/ws/echo", EchoStreamHandler).with_name("echo_websocket"))
        .stream_route(StreamRoute::new("/ws/chat", ChatStreamHandler::new(think_time)).with_name("chat_websocket"))
}
