//! The plugin brain: classifies inbound messages and drives the image
//! flows against the Gemini client.
//!
//! Every error is converted into a user-facing text reply here; nothing
//! escapes to the host. A return of `None` means "not ours" and the host
//! passes the message through untouched.

use crate::message::{InboundContent, InboundMessage, Reply};
use crate::storage::ImageStorage;
use gemimg_api::{translate_refusal, Content, ImageApi, ImageResult, InlineImage, Part};
use gemimg_common::{Config, Error, Result};
use gemimg_core::{
    sniff_mime, validate_upload, CommandKind, ImageCache, Role, Route, Router, SessionContext,
    SessionMode, SessionStore, Turn,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const MSG_NO_API_KEY: &str = "请先在配置文件中设置Gemini API密钥";
const MSG_BAD_CONFIG: &str = "插件配置有误，请检查API密钥或代理设置";
const MSG_SESSION_ENDED: &str = "已结束图像生成对话，下次需要时请使用命令重新开始";
const MSG_NO_ACTIVE_SESSION: &str = "您当前没有活跃的图像生成对话";
const MSG_GENERATION_FAILED: &str = "图片生成失败，请稍后再试或修改提示词";
const MSG_EDIT_FAILED: &str = "图片编辑失败，请稍后再试或修改描述";
const MSG_MERGE_FAILED: &str = "图片融合失败，请稍后再试或修改描述";
const MSG_NO_LAST_IMAGE: &str = "未找到上一次生成的图片，请使用生成图片命令开始新的会话";
const MSG_BOGUS_UPLOAD: &str = "这不是可识别的图片格式，请重新发送";

const REVERSE_PROMPT: &str =
    "请详细描述这张图片，给出可直接用于AI绘画的英文提示词，只返回提示词本身。";
const DEFAULT_ANALYZE_PROMPT: &str = "请分析这张图片的内容，包括主体、风格、构图与色彩。";
const DEFAULT_MERGE_PROMPT: &str = "把这些图片自然地融合成一张图片";

/// The plugin handler. One instance per loaded plugin; all state
/// (sessions, cached uploads) lives inside and is injected nowhere else.
pub struct PluginHandler {
    config: Config,
    router: Router,
    sessions: SessionStore,
    image_cache: ImageCache,
    storage: ImageStorage,
    api: Arc<dyn ImageApi>,
}

impl PluginHandler {
    /// Build a handler from config and an API backend (usually a
    /// `ResilientApi` around a `GeminiClient`; tests pass mocks).
    pub fn new(config: Config, api: Arc<dyn ImageApi>) -> Result<Self> {
        config.validate()?;
        let router = Router::new(&config.commands);
        let sessions = SessionStore::new(
            Duration::from_secs(config.session_ttl_secs),
            config.max_history_turns,
        );
        let image_cache = ImageCache::new(Duration::from_secs(config.image_cache_ttl_secs));
        let storage = ImageStorage::new(&config.save_path)?;
        Ok(Self {
            config,
            router,
            sessions,
            image_cache,
            storage,
            api,
        })
    }

    /// Entry point called by the host for every message event.
    pub async fn handle(&self, message: InboundMessage) -> Option<Vec<Reply>> {
        if !self.config.enable {
            return None;
        }

        // Lazy expiry on read plus an explicit sweep per message keeps
        // memory bounded without a background task.
        self.sessions.sweep();
        self.image_cache.sweep();

        let sender = message.sender_id;
        match message.content {
            InboundContent::Image { bytes } => self.handle_image(&sender, bytes).await,
            InboundContent::Text { text } => self.handle_text(&sender, &text).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Image messages
    // ─────────────────────────────────────────────────────────────────────

    async fn handle_image(&self, sender: &str, bytes: Vec<u8>) -> Option<Vec<Reply>> {
        match self.sessions.get_or_none(sender).map(|s| s.mode) {
            Some(SessionMode::Merging) => self.collect_merge_image(sender, bytes).await,
            Some(SessionMode::AwaitingReferenceImage) => {
                Some(self.edit_awaited_image(sender, bytes).await)
            }
            Some(SessionMode::AwaitingAnalysisImage) => {
                Some(self.analyze_awaited_image(sender, bytes).await)
            }
            _ => {
                // Park the upload for a later command. Silent on success,
                // matching the host's expectations for unclaimed images.
                self.image_cache.put(sender, bytes);
                None
            }
        }
    }

    async fn collect_merge_image(&self, sender: &str, bytes: Vec<u8>) -> Option<Vec<Reply>> {
        if validate_upload(&bytes).is_none() {
            return Some(vec![Reply::text(MSG_BOGUS_UPLOAD)]);
        }

        let max = self.config.max_merge_images;
        let mut collected = 0;
        let updated = self.sessions.update(sender, |s| {
            if s.context.pending_images.len() < max {
                s.context.pending_images.push(bytes.clone());
            }
            collected = s.context.pending_images.len();
        });
        if updated.is_err() {
            // Session expired underneath; fall back to the plain cache.
            self.image_cache.put(sender, bytes);
            return None;
        }

        if collected >= max {
            return Some(self.run_compose(sender).await);
        }
        Some(vec![Reply::text(format!(
            "已收到第{collected}张图片，还可以继续发送（共{max}张），发送任意文字可提前开始融合"
        ))])
    }

    async fn edit_awaited_image(&self, sender: &str, bytes: Vec<u8>) -> Vec<Reply> {
        let Some(mime) = validate_upload(&bytes) else {
            return vec![Reply::text(MSG_BOGUS_UPLOAD)];
        };

        let prompt = self
            .sessions
            .get_or_none(sender)
            .and_then(|s| s.context.pending_prompt)
            .unwrap_or_default();
        if prompt.is_empty() {
            self.sessions.end(sender);
            self.image_cache.put(sender, bytes);
            return vec![Reply::text("已收到图片，请重新发送编辑命令")];
        }

        let image = InlineImage::new(bytes, mime);
        let history = self.build_history(sender);
        match self.api.edit(&prompt, &image, &history).await {
            Ok(result) => self.deliver(sender, &prompt, result, SessionMode::Editing, MSG_EDIT_FAILED),
            Err(e) => vec![self.error_reply(&e, MSG_EDIT_FAILED)],
        }
    }

    async fn analyze_awaited_image(&self, sender: &str, bytes: Vec<u8>) -> Vec<Reply> {
        let Some(mime) = validate_upload(&bytes) else {
            return vec![Reply::text(MSG_BOGUS_UPLOAD)];
        };

        let prompt = self
            .sessions
            .get_or_none(sender)
            .and_then(|s| s.context.pending_prompt)
            .unwrap_or_else(|| DEFAULT_ANALYZE_PROMPT.to_string());

        let image = InlineImage::new(bytes, mime);
        let replies = match self.api.describe(&prompt, Some(&image)).await {
            Ok(result) => vec![Reply::text(
                result
                    .text
                    .unwrap_or_else(|| "未能得到分析结果，请稍后再试".into()),
            )],
            Err(e) => vec![self.error_reply(&e, "图片分析失败，请稍后再试")],
        };
        // One-shot flow, finished either way.
        self.sessions.end(sender);
        replies
    }

    // ─────────────────────────────────────────────────────────────────────
    // Text messages
    // ─────────────────────────────────────────────────────────────────────

    async fn handle_text(&self, sender: &str, text: &str) -> Option<Vec<Reply>> {
        let active_mode = self.sessions.get_or_none(sender).map(|s| s.mode);
        match self.router.resolve(text, active_mode) {
            Route::Unhandled => None,
            Route::EndSession => Some(self.end_session(sender)),
            Route::Help => Some(vec![Reply::text(self.help_text())]),
            Route::Command {
                kind,
                matched,
                payload,
            } => Some(self.dispatch_command(sender, kind, &matched, &payload).await),
            Route::Continue { mode } => Some(self.continue_session(sender, mode, text.trim()).await),
        }
    }

    fn end_session(&self, sender: &str) -> Vec<Reply> {
        if self.sessions.get_or_none(sender).is_some() {
            self.sessions.end(sender);
            vec![Reply::text(MSG_SESSION_ENDED)]
        } else {
            vec![Reply::text(MSG_NO_ACTIVE_SESSION)]
        }
    }

    async fn dispatch_command(
        &self,
        sender: &str,
        kind: CommandKind,
        matched: &str,
        payload: &str,
    ) -> Vec<Reply> {
        if self.config.gemini_api_key.is_empty() {
            return vec![Reply::text(MSG_NO_API_KEY)];
        }
        tracing::info!(sender, command = kind.as_str(), "Dispatching command");

        match kind {
            CommandKind::Generate => self.cmd_generate(sender, matched, payload).await,
            CommandKind::Edit => self.cmd_edit(sender, matched, payload).await,
            CommandKind::Merge => self.cmd_merge(sender, payload),
            CommandKind::Reverse => self.cmd_describe_image(sender, REVERSE_PROMPT.into(), "请发送需要反推提示词的图片").await,
            CommandKind::Analyze => {
                let prompt = if payload.is_empty() {
                    DEFAULT_ANALYZE_PROMPT.to_string()
                } else {
                    payload.to_string()
                };
                self.cmd_describe_image(sender, prompt, "请发送需要分析的图片").await
            }
            CommandKind::Enhance => self.cmd_enhance(sender, matched, payload).await,
        }
    }

    async fn cmd_generate(&self, sender: &str, matched: &str, payload: &str) -> Vec<Reply> {
        if payload.is_empty() {
            return vec![Reply::text(format!("请提供描述内容，格式：{matched} [描述]"))];
        }

        let history = self.build_history(sender);
        match self.api.generate(payload, &history).await {
            Ok(result) => self.deliver(
                sender,
                payload,
                result,
                SessionMode::Generating,
                MSG_GENERATION_FAILED,
            ),
            Err(e) => vec![self.error_reply(&e, MSG_GENERATION_FAILED)],
        }
    }

    async fn cmd_edit(&self, sender: &str, matched: &str, payload: &str) -> Vec<Reply> {
        if payload.is_empty() {
            return vec![Reply::text(format!("请提供编辑描述，格式：{matched} [描述]"))];
        }

        match self.editable_image(sender) {
            Some(image) => {
                let history = self.build_history(sender);
                match self.api.edit(payload, &image, &history).await {
                    Ok(result) => {
                        self.deliver(sender, payload, result, SessionMode::Editing, MSG_EDIT_FAILED)
                    }
                    Err(e) => vec![self.error_reply(&e, MSG_EDIT_FAILED)],
                }
            }
            None => {
                // No usable image yet: wait for one with the prompt parked.
                self.sessions.end(sender);
                let context = SessionContext {
                    pending_prompt: Some(payload.to_string()),
                    ..SessionContext::default()
                };
                let _ = self
                    .sessions
                    .create(sender, SessionMode::AwaitingReferenceImage, context);
                vec![Reply::text("请发送需要编辑的图片")]
            }
        }
    }

    fn cmd_merge(&self, sender: &str, payload: &str) -> Vec<Reply> {
        self.sessions.end(sender);
        let mut context = SessionContext::default();
        if !payload.is_empty() {
            context.pending_prompt = Some(payload.to_string());
        }
        // A recent upload counts as the first slot.
        if let Some((bytes, _)) = self.image_cache.get(sender) {
            context.pending_images.push(bytes);
        }
        let seeded = context.pending_images.len();
        let _ = self.sessions.create(sender, SessionMode::Merging, context);

        let max = self.config.max_merge_images;
        if seeded > 0 {
            vec![Reply::text(format!(
                "已加入最近上传的图片，请继续发送图片（最多{max}张），发送任意文字可提前开始融合"
            ))]
        } else {
            vec![Reply::text(format!(
                "请发送需要融合的图片（最多{max}张），集齐后自动开始，也可发送任意文字提前开始"
            ))]
        }
    }

    async fn run_compose(&self, sender: &str) -> Vec<Reply> {
        let Some(session) = self.sessions.get_or_none(sender) else {
            return vec![Reply::text(MSG_NO_ACTIVE_SESSION)];
        };

        let images: Vec<InlineImage> = session
            .context
            .pending_images
            .iter()
            .map(|bytes| {
                InlineImage::new(bytes.clone(), sniff_mime(bytes).unwrap_or("image/png"))
            })
            .collect();
        if images.len() < 2 {
            return vec![Reply::text("融合至少需要两张图片，请继续发送图片")];
        }

        let prompt = session
            .context
            .pending_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_MERGE_PROMPT.to_string());
        match self.api.compose(&prompt, &images).await {
            Ok(result) => self.deliver(sender, &prompt, result, SessionMode::Merging, MSG_MERGE_FAILED),
            Err(e) => vec![self.error_reply(&e, MSG_MERGE_FAILED)],
        }
    }

    async fn cmd_describe_image(
        &self,
        sender: &str,
        prompt: String,
        ask_for_image: &str,
    ) -> Vec<Reply> {
        match self.editable_image(sender) {
            Some(image) => match self.api.describe(&prompt, Some(&image)).await {
                Ok(result) => vec![Reply::text(
                    result
                        .text
                        .unwrap_or_else(|| "未能得到结果，请稍后再试".into()),
                )],
                Err(e) => vec![self.error_reply(&e, "处理失败，请稍后再试")],
            },
            None => {
                self.sessions.end(sender);
                let context = SessionContext {
                    pending_prompt: Some(prompt),
                    ..SessionContext::default()
                };
                let _ = self
                    .sessions
                    .create(sender, SessionMode::AwaitingAnalysisImage, context);
                vec![Reply::text(ask_for_image.to_string())]
            }
        }
    }

    async fn cmd_enhance(&self, _sender: &str, matched: &str, payload: &str) -> Vec<Reply> {
        if payload.is_empty() {
            return vec![Reply::text(format!(
                "请提供需要扩写的提示词，格式：{matched} [提示词]"
            ))];
        }

        let prompt = format!(
            "请将以下AI绘画提示词扩写得更细致具体，补充画面细节、风格与光影，直接返回扩写后的提示词：{payload}"
        );
        match self.api.describe(&prompt, None).await {
            Ok(result) => vec![Reply::text(
                result
                    .text
                    .unwrap_or_else(|| "未能得到扩写结果，请稍后再试".into()),
            )],
            Err(e) => vec![self.error_reply(&e, "提示词扩写失败，请稍后再试")],
        }
    }

    async fn continue_session(&self, sender: &str, mode: SessionMode, text: &str) -> Vec<Reply> {
        match mode {
            SessionMode::AwaitingReferenceImage => {
                vec![Reply::text("请先发送图片，或发送结束命令退出")]
            }
            SessionMode::AwaitingAnalysisImage => {
                vec![Reply::text("请先发送需要分析的图片，或发送结束命令退出")]
            }
            SessionMode::Merging => {
                let session = self.sessions.get_or_none(sender);
                let pending_empty = session
                    .as_ref()
                    .map_or(true, |s| s.context.pending_images.is_empty());
                let has_merged = session
                    .as_ref()
                    .is_some_and(|s| s.context.last_image.is_some());
                if pending_empty && has_merged {
                    // The compose already ran; plain text now edits the
                    // merged result like any other follow-up.
                    self.continue_as_edit(sender, text, SessionMode::Editing)
                        .await
                } else {
                    // Any text starts the merge with whatever has arrived;
                    // the text doubles as the prompt when none was given.
                    let _ = self.sessions.update(sender, |s| {
                        if s.context.pending_prompt.is_none() {
                            s.context.pending_prompt = Some(text.to_string());
                        }
                    });
                    self.run_compose(sender).await
                }
            }
            SessionMode::Generating | SessionMode::Editing => {
                self.continue_as_edit(sender, text, mode).await
            }
        }
    }

    async fn continue_as_edit(&self, sender: &str, text: &str, mode: SessionMode) -> Vec<Reply> {
        if self.config.gemini_api_key.is_empty() {
            return vec![Reply::text(MSG_NO_API_KEY)];
        }
        match self.session_last_image(sender) {
            Some(image) => {
                let history = self.build_history(sender);
                match self.api.edit(text, &image, &history).await {
                    Ok(result) => self.deliver(sender, text, result, mode, MSG_EDIT_FAILED),
                    Err(e) => vec![self.error_reply(&e, MSG_EDIT_FAILED)],
                }
            }
            None => vec![Reply::text(MSG_NO_LAST_IMAGE)],
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// The image an edit-like command should work on: the freshest upload
    /// first, then the session's last produced image.
    fn editable_image(&self, sender: &str) -> Option<InlineImage> {
        if let Some((bytes, mime)) = self.image_cache.get(sender) {
            return Some(InlineImage::new(bytes, mime));
        }
        self.session_last_image(sender)
    }

    fn session_last_image(&self, sender: &str) -> Option<InlineImage> {
        let path = self.sessions.get_or_none(sender)?.context.last_image?;
        match ImageStorage::load(&path) {
            Ok(bytes) => {
                let mime = sniff_mime(&bytes).unwrap_or("image/png");
                Some(InlineImage::new(bytes, mime))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Last image unreadable");
                None
            }
        }
    }

    /// Convert session history into API contents, inlining stored images.
    /// Unreadable history images are skipped, not fatal.
    fn build_history(&self, sender: &str) -> Vec<Content> {
        let Some(session) = self.sessions.get_or_none(sender) else {
            return Vec::new();
        };

        let mut contents = Vec::with_capacity(session.context.history.len());
        for turn in &session.context.history {
            let mut parts = vec![Part::text(turn.text.as_str())];
            if let Some(path) = &turn.image_path {
                match ImageStorage::load(path) {
                    Ok(bytes) => {
                        let mime = sniff_mime(&bytes).unwrap_or("image/png");
                        parts.push(Part::inline_image(mime, &bytes));
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "History image unreadable, skipping");
                    }
                }
            }
            contents.push(match turn.role {
                Role::User => Content::user(parts),
                Role::Model => Content::model(parts),
            });
        }
        contents
    }

    /// Turn an API result into replies and record the exchange in the
    /// session (creating one if this was the opening turn).
    fn deliver(
        &self,
        sender: &str,
        prompt: &str,
        result: ImageResult,
        mode: SessionMode,
        failure_notice: &str,
    ) -> Vec<Reply> {
        let ImageResult { image, text } = result;
        match image {
            Some(bytes) => {
                let path = match self.storage.save(file_prefix(mode), &bytes) {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to save produced image");
                        return vec![Reply::text(failure_notice.to_string())];
                    }
                };

                let text = text.unwrap_or_else(|| success_text(mode).to_string());
                let is_new = self.record_exchange(sender, mode, prompt, &text, path);

                let mut reply_text = text;
                if is_new {
                    let exit = self
                        .config
                        .commands
                        .exit
                        .first()
                        .map(String::as_str)
                        .unwrap_or("#结束对话");
                    reply_text.push_str(&format!(
                        "（已开始图像对话，可以继续发送文字修改图片。需要结束时请发送\"{exit}\"）"
                    ));
                }
                vec![Reply::text(reply_text), Reply::image(bytes)]
            }
            // Text without an image is the model declining politely.
            None => match text {
                Some(text) => vec![Reply::text(translate_refusal(&text))],
                None => vec![Reply::text(failure_notice.to_string())],
            },
        }
    }

    /// Append the user/model turn pair and the produced image to the
    /// session, creating it when absent. Returns true if a session was
    /// opened by this exchange.
    fn record_exchange(
        &self,
        sender: &str,
        mode: SessionMode,
        prompt: &str,
        response_text: &str,
        image_path: PathBuf,
    ) -> bool {
        let user_turn = Turn::user(prompt);
        let model_turn = Turn::model(response_text, Some(image_path.clone()));

        let updated = self.sessions.update(sender, |s| {
            s.mode = mode;
            s.context.pending_prompt = None;
            s.context.pending_images.clear();
            s.context.history.push(user_turn.clone());
            s.context.history.push(model_turn.clone());
            s.context.last_image = Some(image_path.clone());
        });

        match updated {
            Ok(()) => false,
            Err(_) => {
                let context = SessionContext {
                    history: vec![user_turn, model_turn],
                    last_image: Some(image_path),
                    ..SessionContext::default()
                };
                // Cannot be AlreadyActive: update just reported the session
                // absent or expired and messages from one user arrive
                // serialized.
                let _ = self.sessions.create(sender, mode, context);
                true
            }
        }
    }

    fn error_reply(&self, err: &Error, failure_notice: &str) -> Reply {
        tracing::warn!(error = %err, "Command flow failed");
        match err {
            Error::Config(_) => Reply::text(MSG_BAD_CONFIG),
            Error::Refused(_) => Reply::text(translate_refusal("IMAGE_SAFETY")),
            Error::InvalidInput(_) => Reply::text("请求参数有误，请修改描述后重试"),
            _ => Reply::text(failure_notice),
        }
    }

    /// Usage summary assembled from the configured command lists.
    pub fn help_text(&self) -> String {
        let c = &self.config.commands;
        let first = |list: &[String]| list.first().cloned().unwrap_or_default();
        format!(
            "基于Google Gemini的图像助手\n\n\
             1. 生成图片：{} + 描述\n\
             2. 编辑图片：{} + 描述（可先发送图片）\n\
             3. 融合图片：{} + 描述，然后发送图片\n\
             4. 反推提示词：{}（可先发送图片）\n\
             5. 分析图片：{} + 问题（可先发送图片）\n\
             6. 扩写提示词：{} + 提示词\n\
             7. 结束对话：{}",
            first(&c.generate),
            first(&c.edit),
            first(&c.merge),
            first(&c.reverse),
            first(&c.analyze),
            first(&c.enhance),
            first(&c.exit),
        )
    }
}

const fn file_prefix(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Editing => "edited",
        SessionMode::Merging => "merged",
        _ => "gemini",
    }
}

const fn success_text(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Editing => "图片编辑成功！",
        SessionMode::Merging => "图片融合成功！",
        _ => "图片生成成功！",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Backend that always fails with a transport error; unit tests here
    /// only exercise paths that never reach the API.
    struct UnreachableApi;

    #[async_trait]
    impl ImageApi for UnreachableApi {
        async fn generate(&self, _: &str, _: &[Content]) -> gemimg_common::Result<ImageResult> {
            Err(Error::External("unreachable".into()))
        }
        async fn edit(
            &self,
            _: &str,
            _: &InlineImage,
            _: &[Content],
        ) -> gemimg_common::Result<ImageResult> {
            Err(Error::External("unreachable".into()))
        }
        async fn compose(&self, _: &str, _: &[InlineImage]) -> gemimg_common::Result<ImageResult> {
            Err(Error::External("unreachable".into()))
        }
        async fn describe(
            &self,
            _: &str,
            _: Option<&InlineImage>,
        ) -> gemimg_common::Result<ImageResult> {
            Err(Error::External("unreachable".into()))
        }
    }

    fn handler(tmp: &tempfile::TempDir, api_key: &str) -> PluginHandler {
        let mut config = Config::default();
        config.gemini_api_key = api_key.to_string();
        config.save_path = tmp.path().join("imgs").to_string_lossy().into_owned();
        PluginHandler::new(config, Arc::new(UnreachableApi)).unwrap()
    }

    #[tokio::test]
    async fn test_exit_without_session_notice() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "k");

        let replies = h
            .handle(InboundMessage::text("u1", "#结束对话"))
            .await
            .unwrap();
        assert_eq!(replies[0].as_text(), Some(MSG_NO_ACTIVE_SESSION));
    }

    #[tokio::test]
    async fn test_missing_api_key_notice() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "");

        let replies = h
            .handle(InboundMessage::text("u1", "#生成图片 a cat"))
            .await
            .unwrap();
        assert_eq!(replies[0].as_text(), Some(MSG_NO_API_KEY));
    }

    #[tokio::test]
    async fn test_empty_payload_usage_notice() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "k");

        let replies = h
            .handle(InboundMessage::text("u1", "#生成图片"))
            .await
            .unwrap();
        let text = replies[0].as_text().unwrap();
        assert!(text.contains("#生成图片"));
        assert!(text.contains("请提供描述内容"));
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "k");

        assert!(h.handle(InboundMessage::text("u1", "你好")).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_plugin_passes_everything_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.enable = false;
        config.gemini_api_key = "k".into();
        config.save_path = tmp.path().to_string_lossy().into_owned();
        let h = PluginHandler::new(config, Arc::new(UnreachableApi)).unwrap();

        assert!(h
            .handle(InboundMessage::text("u1", "#生成图片 a cat"))
            .await
            .is_none());
        assert!(h
            .handle(InboundMessage::text("u1", "#结束对话"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_api_failure_becomes_notice() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "k");

        let replies = h
            .handle(InboundMessage::text("u1", "#生成图片 a cat"))
            .await
            .unwrap();
        assert_eq!(replies[0].as_text(), Some(MSG_GENERATION_FAILED));
    }

    #[tokio::test]
    async fn test_help_lists_configured_commands() {
        let tmp = tempfile::TempDir::new().unwrap();
        let h = handler(&tmp, "k");

        let replies = h.handle(InboundMessage::text("u1", "#画图帮助")).await.unwrap();
        let text = replies[0].as_text().unwrap();
        assert!(text.contains("#生成图片"));
        assert!(text.contains("#结束对话"));
    }
}
