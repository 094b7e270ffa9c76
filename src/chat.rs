//! チャット会話
//!
//! 一般相談と、企画ごとの相談（手順を前提知識として渡す）の2種類。
//! 返答はストリーミングで受け取り、成功した往復だけ履歴に残す。

use tokio::sync::mpsc;
use upcycle_ai_common::{
    build_project_chat_greeting, build_project_chat_instruction, ChatMessage, ChatRole,
    ProjectRecord, GENERAL_CHAT_GREETING, GENERAL_CHAT_INSTRUCTION,
};

use crate::error::{Result, UpcycleError};
use crate::provider::ChatBackend;

#[derive(Debug, Clone)]
pub struct Conversation {
    system_instruction: String,
    greeting: String,
    history: Vec<ChatMessage>,
}

impl Conversation {
    /// 一般相談
    pub fn general() -> Self {
        Self {
            system_instruction: GENERAL_CHAT_INSTRUCTION.to_string(),
            greeting: GENERAL_CHAT_GREETING.to_string(),
            history: Vec::new(),
        }
    }

    /// 企画についての相談
    pub fn for_project(project: &ProjectRecord) -> Self {
        Self {
            system_instruction: build_project_chat_instruction(project),
            greeting: build_project_chat_greeting(project),
            history: Vec::new(),
        }
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// メッセージを送り、差分が届くたびに on_update を呼ぶ
    ///
    /// 失敗した場合、履歴は送信前のまま変わらない。
    pub async fn send(
        &mut self,
        backend: &dyn ChatBackend,
        credential: Option<&str>,
        message: &str,
        mut on_update: impl FnMut(&str),
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(UpcycleError::NoInputSelected);
        }
        let credential = credential.ok_or(UpcycleError::MissingApiKey)?;

        let (tx, mut rx) = mpsc::channel::<String>(32);
        let request = backend.stream_reply(
            credential,
            &self.system_instruction,
            &self.history,
            message,
            tx,
        );
        let receive = async {
            while let Some(delta) = rx.recv().await {
                on_update(&delta);
            }
        };

        let (reply, ()) = tokio::join!(request, receive);
        let reply = reply?;

        self.history.push(ChatMessage {
            role: ChatRole::User,
            text: message.to_string(),
        });
        self.history.push(ChatMessage {
            role: ChatRole::Model,
            text: reply.clone(),
        });
        tracing::debug!(turns = self.history.len() / 2, "チャット返答を受信");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_conversation() {
        let conversation = Conversation::general();
        assert_eq!(conversation.greeting(), GENERAL_CHAT_GREETING);
        assert!(conversation.history().is_empty());
    }

    #[test]
    fn test_project_conversation_mentions_project() {
        let project = ProjectRecord {
            name: "ボトルランプ".into(),
            steps: vec!["洗う".into(), "穴を開ける".into()],
            ..Default::default()
        };
        let conversation = Conversation::for_project(&project);
        assert!(conversation.greeting().contains("ボトルランプ"));
        assert!(conversation.system_instruction().contains("穴を開ける"));
    }
}
