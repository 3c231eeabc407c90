//! MCP server implementation

use crate::protocol::*;
use crate::tools;
use anyhow::Result;
use metabo_core::ResearchPipeline;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const RESEARCH_PROMPT: &str = "research";

pub struct McpServer<'a> {
    pipeline: &'a ResearchPipeline,
}

impl<'a> McpServer<'a> {
    pub fn new(pipeline: &'a ResearchPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();

        let mut reader = BufReader::new(stdin);
        let mut writer = BufWriter::new(stdout);
        let mut line = String::new();

        tracing::info!("MCP server listening on stdio");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        &format!("Parse error: {}", e),
                    );
                    self.write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(&request).await {
                self.write_response(&mut writer, &response).await?;
            }
        }

        tracing::info!("MCP client closed stdin, shutting down");
        Ok(())
    }

    async fn write_response<W: AsyncWriteExt + Unpin>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Dispatch one request; notifications yield no response
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => JsonRpcResponse::success(request.id.clone(), serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(request),
            "prompts/list" => self.handle_prompts_list(request),
            "prompts/get" => self.handle_prompts_get(request),
            _ => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {},
                "resources": { "subscribe": false },
                "prompts": {}
            },
            "serverInfo": {
                "name": "metabo-research",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(request.id.clone(), result)
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = vec![
            tools::answer_tool_definition(),
            tools::search_literature_tool_definition(),
            tools::get_abstract_tool_definition(),
            tools::get_full_text_tool_definition(),
        ];

        JsonRpcResponse::success(request.id.clone(), serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let name = request
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        tracing::info!(tool = name, "Tool call");

        let result = match name {
            "answer" => tools::handle_answer(self.pipeline, arguments).await,
            "search_literature" => tools::handle_search_literature(self.pipeline, arguments).await,
            "get_abstract" => tools::handle_get_abstract(self.pipeline, arguments).await,
            "get_full_text" => tools::handle_get_full_text(self.pipeline, arguments).await,
            _ => Err(anyhow::anyhow!("Unknown tool: {}", name)),
        };

        let tool_result = result.unwrap_or_else(|e| {
            tracing::warn!(tool = name, "Tool call failed: {}", e);
            ToolResult::error(format!("Error: {}", e))
        });

        match serde_json::to_value(tool_result) {
            Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
            Err(e) => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                &format!("Failed to encode tool result: {}", e),
            ),
        }
    }

    fn handle_resources_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(request.id.clone(), serde_json::json!({ "resources": [] }))
    }

    fn handle_prompts_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let prompts = vec![serde_json::json!({
            "name": RESEARCH_PROMPT,
            "title": "Metabolite Research Guide",
            "description": "Ask one question linking a metabolite to a health condition; the answer cites PubMed records",
            "arguments": [{
                "name": "question",
                "description": "Question naming a metabolite and a health condition",
                "required": false
            }]
        })];
        JsonRpcResponse::success(
            request.id.clone(),
            serde_json::json!({ "prompts": prompts }),
        )
    }

    fn handle_prompts_get(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let name = request
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if name != RESEARCH_PROMPT {
            return JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                &format!("Unknown prompt: {}", name),
            );
        }

        let question = request
            .params
            .get("arguments")
            .and_then(|args| args.get("question"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let mut text = String::from(
            "Use the `answer` tool to research how a metabolite relates to a health condition. \
             Name both the metabolite and the condition in the question, and pass them as \
             `metabolite` and `condition` when they are known. Report the findings with the \
             PMIDs the tool cites, and say plainly when it finds no evidence.",
        );
        if let Some(question) = question {
            text.push_str("\n\nQuestion: ");
            text.push_str(question);
        }

        JsonRpcResponse::success(
            request.id.clone(),
            serde_json::json!({
                "description": "Research a metabolite/condition question in the PubMed literature",
                "messages": [{
                    "role": "user",
                    "content": { "type": "text", "text": text }
                }]
            }),
        )
    }
}

pub async fn start_server(pipeline: &ResearchPipeline) -> Result<()> {
    let server = McpServer::new(pipeline);
    server.run().await
}
