//! # MCP Handler Module
//!
//! Implements the Model Context Protocol surface of the chat server and
//! dispatches `tools/call` requests to the query engine and the AI session.
//!
//! ## Supported Tools
//!
//! - `query` - Answer an address, transaction hash, token or comparison query
//! - `chat` - One conversational turn; free text goes to the AI session
//! - `reset_conversation` - Clear the AI session's context
//! - `prepare_transaction` - Turn a command into an unsigned transaction
//! - `search_token` - Raw explorer token search

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    blockchain::models::Address,
    engine::{ClassifiedInput, ExecutionState, SessionError, SessionManager},
    mcp::protocol::{error_codes, tool_result, Request, Response, ToolCall},
    utils, AppState,
};

/// Per-connection MCP state: the shared app plus this client's conversation.
pub struct McpContext {
    pub state: AppState,
    pub session: Mutex<SessionManager>,
}

impl McpContext {
    pub fn new(state: AppState) -> Self {
        let session = Mutex::new(state.new_session_manager());
        Self { state, session }
    }
}

fn session_error(req_id: &Value, e: SessionError) -> Response {
    let code = match e {
        SessionError::NoSession => error_codes::NO_SESSION,
        SessionError::Unavailable(_) => error_codes::UPSTREAM_ERROR,
    };
    Response::error(req_id.clone(), code, e.to_string())
}

fn optional_address(args: &Value, key: &str, req_id: &Value) -> Result<Option<Address>, Response> {
    match utils::get_optional_str(args, key) {
        None => Ok(None),
        Some(raw) => Address::parse(raw).map(Some).ok_or_else(|| {
            Response::error(
                req_id.clone(),
                error_codes::INVALID_PARAMS,
                format!("'{}' must be 0x followed by 40 hex characters", key),
            )
        }),
    }
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, ctx: &McpContext) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, ctx).await,
        // Direct method calls are rewritten into tools/call
        "query" | "chat" | "reset_conversation" | "prepare_transaction" | "search_token" => {
            let name = req.method.clone();
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": name,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, ctx).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, ctx: &McpContext) -> Response {
    let call: ToolCall = match req.params.clone().map(serde_json::from_value) {
        Some(Ok(call)) => call,
        Some(Err(_)) => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let args = &call.arguments;
    let req_id = &req.id;
    let result = match call.name.as_str() {
        "query" => query_tool(ctx, args, req_id).await,
        "chat" => chat_tool(ctx, args, req_id).await,
        "reset_conversation" => reset_tool(ctx, req_id).await,
        "prepare_transaction" => prepare_transaction_tool(ctx, args, req_id).await,
        "search_token" => search_token_tool(ctx, args, req_id).await,
        other => Err(Response::error(
            req_id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("Tool not found: {}", other),
        )),
    };
    result.unwrap_or_else(|err_resp| err_resp)
}

async fn query_tool(ctx: &McpContext, args: &Value, req_id: &Value) -> Result<Response, Response> {
    let input = utils::get_required_arg::<String>(args, "input", req_id)?;
    let answer = ctx.state.engine.answer(&input).await;
    let payload = serde_json::to_value(&answer).unwrap_or(Value::Null);
    Ok(Response::success(req_id.clone(), tool_result(answer.text, payload)))
}

async fn chat_tool(ctx: &McpContext, args: &Value, req_id: &Value) -> Result<Response, Response> {
    let message = utils::get_required_arg::<String>(args, "message", req_id)?;
    let contract = optional_address(args, "contract_address", req_id)?;

    let classified = ctx.state.engine.classify(&message);
    let ClassifiedInput::FreeText(text) = &classified else {
        let answer = ctx.state.engine.answer_classified(&classified, &message).await;
        let payload = serde_json::to_value(&answer).unwrap_or(Value::Null);
        return Ok(Response::success(req_id.clone(), tool_result(answer.text, payload)));
    };

    let mut session = ctx.session.lock().await;
    let session_id = session
        .ensure_session()
        .await
        .map_err(|e| session_error(req_id, e))?;
    let reply = session
        .send_message(text, contract.as_ref())
        .await
        .map_err(|e| {
            error!("Chat turn failed: {}", e);
            session_error(req_id, e)
        })?;

    let text = reply.message.clone().unwrap_or_default();
    Ok(Response::success(
        req_id.clone(),
        tool_result(
            text,
            json!({
                "kind": classified.kind(),
                "session_id": session_id,
                "actions": reply.actions,
            }),
        ),
    ))
}

async fn reset_tool(ctx: &McpContext, req_id: &Value) -> Result<Response, Response> {
    let mut session = ctx.session.lock().await;
    session.clear().await.map_err(|e| session_error(req_id, e))?;
    Ok(Response::success(
        req_id.clone(),
        tool_result(
            "Conversation context cleared.".to_string(),
            json!({ "session_id": session.session_id() }),
        ),
    ))
}

async fn prepare_transaction_tool(ctx: &McpContext, args: &Value, req_id: &Value) -> Result<Response, Response> {
    let command = utils::get_required_arg::<String>(args, "command", req_id)?;
    let signer_address = optional_address(args, "signer_address", req_id)?.ok_or_else(|| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            "Missing or invalid required argument: 'signer_address'".into(),
        )
    })?;
    let contract = optional_address(args, "contract_address", req_id)?;

    let intent = {
        let mut session = ctx.session.lock().await;
        session
            .ensure_session()
            .await
            .map_err(|e| session_error(req_id, e))?;
        session
            .execution_intent(&command, signer_address, contract)
            .map_err(|e| session_error(req_id, e))?
    };

    let state = ctx.state.executor().prepare(&intent).await;
    let payload = serde_json::to_value(&state).unwrap_or(Value::Null);
    match &state {
        ExecutionState::Failed { failure } => {
            warn!(reason = ?failure.reason, "prepare_transaction produced no transaction");
            Err(Response::error_with_data(
                req_id.clone(),
                error_codes::UPSTREAM_ERROR,
                failure.message(),
                payload,
            ))
        }
        _ => Ok(Response::success(
            req_id.clone(),
            tool_result(state.status_message(), payload),
        )),
    }
}

async fn search_token_tool(ctx: &McpContext, args: &Value, req_id: &Value) -> Result<Response, Response> {
    let query = utils::get_required_arg::<String>(args, "query", req_id)?;
    let hits = ctx.state.explorer.search_token(&query).await.unwrap_or_default();

    let summary = if hits.is_empty() {
        format!("No tokens found for \"{}\".", query.trim())
    } else {
        let lines: Vec<String> = hits
            .iter()
            .map(|h| {
                format!(
                    "• {} ({}) {}",
                    h.name.as_deref().unwrap_or("Unknown"),
                    h.symbol.as_deref().unwrap_or("?"),
                    h.address.as_deref().unwrap_or("no address")
                )
            })
            .collect();
        format!("Found {} token(s):\n{}", hits.len(), lines.join("\n"))
    };
    Ok(Response::success(
        req_id.clone(),
        tool_result(summary, json!({ "tokens": hits })),
    ))
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "chiliz_chat",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions =
        "Chiliz Chain assistant: look up addresses, transactions and fan tokens, chat with the AI, and prepare transactions.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

/// Handles the 'tools/list' request by returning a JSON definition of all available tools.
fn handle_tools_list(req: &Request) -> Response {
    let tools = json!([
        {
            "name": "query",
            "description": "Look up a Chiliz Chain address, transaction hash, token symbol (e.g. '$PSG'), or 'compare PSG and BAR'.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "input": {"type": "string", "description": "Address, transaction hash, token reference or comparison."}
                },
                "required": ["input"]
            }
        },
        {
            "name": "chat",
            "description": "Send one message in the ongoing conversation. Structured inputs are answered directly, free text by the AI.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The user's message."},
                    "contract_address": {"type": "string", "description": "Optional 0x... contract to focus the AI on."}
                },
                "required": ["message"]
            }
        },
        {
            "name": "reset_conversation",
            "description": "Clear the AI conversation context while keeping the session.",
            "inputSchema": { "type": "object", "properties": {}, "additionalProperties": false }
        },
        {
            "name": "prepare_transaction",
            "description": "Turn a natural-language command (e.g. 'send 1 CHZ to 0x...') into an unsigned transaction for the signer's wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "What the transaction should do."},
                    "signer_address": {"type": "string", "description": "The 0x... address that will sign."},
                    "contract_address": {"type": "string", "description": "Optional 0x... contract the command refers to."}
                },
                "required": ["command", "signer_address"]
            }
        },
        {
            "name": "search_token",
            "description": "Search the Chiliz explorer for tokens by name or symbol. Results are unverified.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Token name or symbol."}
                },
                "required": ["query"]
            }
        }
    ]);

    Response::success(req.id.clone(), json!({ "tools": tools }))
}
