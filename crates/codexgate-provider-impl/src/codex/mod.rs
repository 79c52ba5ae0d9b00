pub mod dispatch;
pub mod headers;
pub mod instructions;
pub mod oauth;
pub mod response;
pub mod url;

pub const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
pub const ACCOUNT_ID_HEADER: &str = "chatgpt-account-id";
pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
pub const OPENAI_BETA_RESPONSES: &str = "responses=experimental";
pub const ORIGINATOR_HEADER: &str = "originator";
pub const ORIGINATOR: &str = "codex_cli_rs";
pub const CONVERSATION_ID_HEADER: &str = "conversation_id";
pub const SESSION_ID_HEADER: &str = "session_id";
