//! Request payloads for the agent server's HTTP API.

use serde::Serialize;
use weft_protocol::TurnRequest;

use crate::config::ClientConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBody {
    thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_bean_name: Option<String>,
}

pub fn turn_body(req: &TurnRequest, config: &ClientConfig) -> TurnBody {
    TurnBody {
        thread_id: req.thread_id.clone(),
        user_message: req.user_message.clone(),
        checkpoint_id: req.checkpoint_id.clone(),
        agent_bean_name: config.agent.clone(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadBody<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_bean_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameThreadBody<'a> {
    pub thread_id: &'a str,
    pub title: &'a str,
}
