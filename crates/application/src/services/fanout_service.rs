//! 消息扇出引擎
//!
//! 收到一条入站消息后：确定原始语言、并发请求各目标语言译文、
//! 持久化，最后向房间广播消息并向所有连接广播聊天列表摘要。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::{
    detect_language, ConnectionInfo, ContentType, DomainError, InboundMessage, LanguageCode,
    MessageId, OutboundMessage, RoomKey, RoomKind, RoomSummary, SenderInfo, ServerEvent,
    Translations, UserId,
};
use futures::future::join_all;
use tracing::{debug, error, info, warn, Instrument};

use crate::{
    bot::{BotReply, BotRequest, BotService, BotServiceError},
    broadcaster::EventBroadcaster,
    clock::Clock,
    error::ApplicationError,
    language_cache::TargetLanguageCache,
    repository::{MessageStore, NewMessage, TranslationKind},
    translator::{TranslationError, Translator},
};

/// 机器人调用失败时代替回复发送的固定文本
pub const BOT_APOLOGY: &str = "Sorry, I couldn't process your message right now. Please try again.";

const MAX_CONTENT_CHARS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct FanoutConfig {
    pub fallback_language: LanguageCode,
    pub translation_timeout: Duration,
    pub bot_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            fallback_language: LanguageCode::fallback(),
            translation_timeout: Duration::from_secs(10),
            bot_timeout: Duration::from_secs(30),
        }
    }
}

pub struct MessageFanoutDependencies {
    pub store: Arc<dyn MessageStore>,
    pub translator: Arc<dyn Translator>,
    pub bot: Arc<dyn BotService>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub language_cache: Arc<TargetLanguageCache>,
    pub clock: Arc<dyn Clock>,
}

/// 一次处理的结果，便于调用方记录或测试断言
#[derive(Debug, Clone)]
pub enum FanoutOutcome {
    Delivered(OutboundMessage),
    BotTurn {
        user_message: OutboundMessage,
        reply: OutboundMessage,
        bot_answered: bool,
    },
}

pub struct MessageFanoutService {
    deps: MessageFanoutDependencies,
    config: FanoutConfig,
    /// 已确认存在的私聊房间
    materialized_rooms: Mutex<HashSet<RoomKey>>,
    /// 机器人房间 -> 上一轮会话标识
    bot_sessions: Mutex<HashMap<RoomKey, String>>,
}

impl MessageFanoutService {
    pub fn new(deps: MessageFanoutDependencies, config: FanoutConfig) -> Self {
        Self {
            deps,
            config,
            materialized_rooms: Mutex::new(HashSet::new()),
            bot_sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 处理一条入站消息。
    ///
    /// 只有私聊房间落库失败会让整个操作失败；翻译、持久化、广播的失败
    /// 都在调用点被吸收并记录日志。
    pub async fn handle_inbound(
        &self,
        connection: &ConnectionInfo,
        message: InboundMessage,
    ) -> Result<FanoutOutcome, ApplicationError> {
        let span = tracing::info_span!(
            "fanout",
            room = %message.room,
            connection_id = %connection.connection_id,
            user_id = %connection.user_id,
        );
        self.handle_inbound_inner(connection, message)
            .instrument(span)
            .await
    }

    async fn handle_inbound_inner(
        &self,
        connection: &ConnectionInfo,
        message: InboundMessage,
    ) -> Result<FanoutOutcome, ApplicationError> {
        Self::validate(&message)?;

        let declared = message
            .language
            .clone()
            .or_else(|| connection.language.clone())
            .unwrap_or_else(|| self.config.fallback_language.clone());
        let draft = Draft {
            text: message.effective_text().to_owned(),
            caption: message.caption_text().map(str::to_owned),
            room: message.room,
            sender: connection.sender(),
            origin: declared,
            content: message.content,
            content_type: message.content_type,
        };

        match draft.room.kind() {
            RoomKind::Bot => {
                let origin = self.bot_origin_language(&draft.text, draft.origin.clone());
                Ok(self.handle_bot_turn(Draft { origin, ..draft }).await)
            }
            RoomKind::Private { first, second } => {
                self.materialize_private_room(&draft.room, &first, &second)
                    .await?;
                let outbound = self.translate_and_build(draft).await;
                Ok(FanoutOutcome::Delivered(self.persist_and_deliver(outbound).await))
            }
            RoomKind::Ordinary => {
                let outbound = self.translate_and_build(draft).await;
                Ok(FanoutOutcome::Delivered(self.persist_and_deliver(outbound).await))
            }
        }
    }

    fn validate(message: &InboundMessage) -> Result<(), DomainError> {
        if message.content_type == ContentType::Text && message.effective_text().trim().is_empty() {
            return Err(DomainError::validation_error("content", "cannot be empty"));
        }
        let fields = [
            ("content", Some(message.content.as_str())),
            ("transcription", message.transcription.as_deref()),
            ("caption", message.caption.as_deref()),
        ];
        for (field, value) in fields {
            if value.is_some_and(|value| value.chars().count() > MAX_CONTENT_CHARS) {
                return Err(DomainError::validation_error(field, "too long"));
            }
        }
        Ok(())
    }

    /// 机器人房间：检测结果优先，检测不出（得到默认语言）时采用声明语言
    fn bot_origin_language(&self, text: &str, declared: LanguageCode) -> LanguageCode {
        let detected = detect_language(text, &self.config.fallback_language);
        if detected == self.config.fallback_language {
            declared
        } else {
            detected
        }
    }

    async fn materialize_private_room(
        &self,
        room: &RoomKey,
        first: &UserId,
        second: &UserId,
    ) -> Result<(), ApplicationError> {
        let known = self
            .materialized_rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(room);
        if known {
            return Ok(());
        }

        let private_room = self
            .deps
            .store
            .ensure_private_room(first, second)
            .await
            .map_err(|source| {
                error!(room = %room, error = %source, "私聊房间创建失败，放弃本条消息");
                ApplicationError::RoomMaterialization {
                    room: room.clone(),
                    source,
                }
            })?;

        debug!(room = %room, room_id = %private_room.id, "私聊房间已就绪");
        self.materialized_rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(room.clone());
        Ok(())
    }

    async fn translate_and_build(&self, draft: Draft) -> OutboundMessage {
        let targets = self.deps.language_cache.get().await;

        let caption_translations = async {
            match draft.caption.as_deref() {
                Some(caption) => Some(self.translate_all(caption, &draft.origin, &targets).await),
                None => None,
            }
        };
        let (translations, caption_translations) = futures::join!(
            self.translate_all(&draft.text, &draft.origin, &targets),
            caption_translations
        );

        OutboundMessage {
            id: MessageId::generate(),
            room: draft.room,
            sender: draft.sender,
            origin_language: draft.origin,
            content_type: draft.content_type,
            content: draft.content,
            translations,
            caption: draft.caption,
            caption_translations,
            created_at: self.deps.clock.now(),
        }
    }

    /// 原文加上每个目标语言的译文；失败的语言以原文代替，从不缺项
    async fn translate_all(
        &self,
        text: &str,
        origin: &LanguageCode,
        targets: &std::collections::BTreeSet<LanguageCode>,
    ) -> Translations {
        let mut translations = Translations::new();
        translations.insert(origin.clone(), text.to_owned());
        if text.trim().is_empty() {
            return translations;
        }

        let pending = targets
            .iter()
            .filter(|target| *target != origin)
            .map(|target| async move {
                let translated = self.translate_one(text, origin, target).await;
                (target.clone(), translated)
            });
        translations.extend(join_all(pending).await);
        translations
    }

    async fn translate_one(&self, text: &str, source: &LanguageCode, target: &LanguageCode) -> String {
        let result = tokio::time::timeout(
            self.config.translation_timeout,
            self.deps.translator.translate(text, source, target),
        )
        .await
        .unwrap_or(Err(TranslationError::Timeout))
        .and_then(|translated| {
            if translated.trim().is_empty() {
                Err(TranslationError::Malformed("empty translation".into()))
            } else {
                Ok(translated)
            }
        });

        match result {
            Ok(translated) => translated,
            Err(err) => {
                warn!(source = %source, target = %target, error = %err, "翻译失败，使用原文代替");
                text.to_owned()
            }
        }
    }

    async fn persist_and_deliver(&self, mut outbound: OutboundMessage) -> OutboundMessage {
        self.persist(&mut outbound).await;
        self.deliver(&outbound).await;
        self.publish_summary(&outbound).await;
        info!(
            message_id = %outbound.id,
            languages = outbound.translations.len(),
            "消息已投递"
        );
        outbound
    }

    /// 持久化失败只记录日志，消息仍然实时投递（但不会出现在历史记录中）
    async fn persist(&self, outbound: &mut OutboundMessage) {
        let row = NewMessage {
            id: outbound.id,
            room: outbound.room.clone(),
            sender: outbound.sender.clone(),
            content: outbound.content.clone(),
            caption: outbound.caption.clone(),
            content_type: outbound.content_type,
            origin_language: outbound.origin_language.clone(),
            created_at: outbound.created_at,
        };

        let stored = match self.deps.store.save_message(row).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(message_id = %outbound.id, error = %err, "消息持久化失败，仍然实时投递");
                return;
            }
        };
        outbound.id = stored.id;
        outbound.created_at = stored.created_at;

        let origin = &outbound.origin_language;
        let content_rows = outbound
            .translations
            .iter()
            .map(|(lang, text)| (TranslationKind::Content, lang, text));
        let caption_rows = outbound
            .caption_translations
            .iter()
            .flatten()
            .map(|(lang, text)| (TranslationKind::Caption, lang, text));

        // 原文已在消息行中；只有语音转写这类与正文不同的原文才另存一行
        let saves = content_rows
            .chain(caption_rows)
            .filter(|(kind, lang, text)| match kind {
                TranslationKind::Content => *lang != origin || text.as_str() != outbound.content,
                TranslationKind::Caption => *lang != origin,
            })
            .map(|(kind, lang, text)| {
                self.deps
                    .store
                    .save_translation(stored.id, kind, lang.clone(), text.clone())
            });

        for err in join_all(saves).await.into_iter().filter_map(Result::err) {
            warn!(message_id = %stored.id, error = %err, "译文持久化失败");
        }
    }

    async fn deliver(&self, outbound: &OutboundMessage) {
        match self
            .deps
            .broadcaster
            .broadcast_to_room(&outbound.room, ServerEvent::NewMessage(outbound.clone()))
            .await
        {
            Ok(recipients) => debug!(message_id = %outbound.id, recipients, "房间广播完成"),
            Err(err) => error!(message_id = %outbound.id, error = %err, "房间广播失败"),
        }
    }

    async fn publish_summary(&self, outbound: &OutboundMessage) {
        let summary = ServerEvent::RoomSummary(RoomSummary::from(outbound));
        if let Err(err) = self.deps.broadcaster.broadcast_all(summary).await {
            warn!(message_id = %outbound.id, error = %err, "聊天列表摘要广播失败");
        }
    }

    /// 机器人房间：不做翻译。用户消息先行广播，再等待机器人回复（或致歉消息）
    async fn handle_bot_turn(&self, draft: Draft) -> FanoutOutcome {
        let room = draft.room.clone();
        let origin = draft.origin.clone();
        let request = BotRequest {
            message: draft.text.clone(),
            user_id: draft.sender.id.clone(),
            room: room.clone(),
            language: origin.clone(),
            session_id: self
                .bot_sessions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&room)
                .cloned(),
        };

        let mut user_message = self.untranslated(draft);
        self.persist(&mut user_message).await;
        self.deliver(&user_message).await;

        let (reply, bot_answered) = match self.ask_bot(request).await {
            Ok(answer) => {
                self.bot_sessions
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(room.clone(), answer.session_id.clone());
                info!(latency_ms = answer.latency_ms, "机器人已回复");

                let mut reply = self.untranslated(Draft::bot_text(room, origin, answer.message));
                self.persist(&mut reply).await;
                (reply, true)
            }
            Err(err) => {
                warn!(error = %err, "机器人服务调用失败，发送致歉消息");
                let apology = self.untranslated(Draft::bot_text(room, origin, BOT_APOLOGY.to_owned()));
                (apology, false)
            }
        };

        self.deliver(&reply).await;
        self.publish_summary(&reply).await;

        FanoutOutcome::BotTurn {
            user_message,
            reply,
            bot_answered,
        }
    }

    async fn ask_bot(&self, request: BotRequest) -> Result<BotReply, BotServiceError> {
        let reply = tokio::time::timeout(self.config.bot_timeout, self.deps.bot.chat(request))
            .await
            .unwrap_or(Err(BotServiceError::Timeout))?;
        if reply.message.trim().is_empty() {
            return Err(BotServiceError::Malformed("empty reply".into()));
        }
        Ok(reply)
    }

    fn untranslated(&self, draft: Draft) -> OutboundMessage {
        let translations = Translations::from([(draft.origin.clone(), draft.text)]);
        OutboundMessage {
            id: MessageId::generate(),
            room: draft.room,
            sender: draft.sender,
            origin_language: draft.origin,
            content_type: draft.content_type,
            content: draft.content,
            translations,
            caption: draft.caption,
            caption_translations: None,
            created_at: self.deps.clock.now(),
        }
    }
}

/// 处理开始时捕获的消息内容，之后不再重新读取
struct Draft {
    room: RoomKey,
    sender: SenderInfo,
    origin: LanguageCode,
    /// 用于翻译的文本（转写优先）
    text: String,
    content: String,
    caption: Option<String>,
    content_type: ContentType,
}

impl Draft {
    fn bot_text(room: RoomKey, origin: LanguageCode, text: String) -> Self {
        Self {
            room,
            sender: SenderInfo::bot(),
            origin,
            content: text.clone(),
            text,
            caption: None,
            content_type: ContentType::Text,
        }
    }
}
