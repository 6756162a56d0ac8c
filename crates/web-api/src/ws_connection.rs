use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::ws::{Message as WsMessage, Utf8Bytes, WebSocket},
};
use domain::{ClientEvent, ConnectionInfo, InboundMessage, RoomRef, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use infrastructure::EventReceiver;
use tokio::sync::mpsc;

use crate::state::AppState;

/// 单个连接上排队等待扇出的消息上限，超出后暂停读取客户端帧
const MESSAGE_QUEUE_CAPACITY: usize = 32;

/// 单个 WebSocket 连接
///
/// 发送任务统一负责所有写操作（房间事件与心跳回应），接收任务解析客户端事件，
/// 扇出任务按到达顺序逐条处理本连接发出的消息。
/// 收发任一任务结束即视为连接断开，随后从房间注册表中清理该连接；
/// 扇出任务不会被中止，已排队的消息仍会处理完毕。
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    info: Arc<ConnectionInfo>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, info: ConnectionInfo) -> Self {
        Self {
            socket,
            state,
            info: Arc::new(info),
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            info,
        } = self;
        let connection_id = info.connection_id;

        let events = state.registry.connect((*info).clone()).await;
        tracing::info!(
            connection_id = %connection_id,
            user_id = %info.user_id,
            "WebSocket 连接已建立"
        );

        let language = info
            .language
            .clone()
            .unwrap_or_else(|| state.fallback_language().clone());
        if let Err(err) = state.store.record_presence(&info.sender(), &language).await {
            tracing::warn!(error = %err, user_id = %info.user_id, "记录在线状态失败");
        }

        let (sender, incoming) = socket.split();
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(32);
        let (queue_tx, queue_rx) = mpsc::channel::<InboundMessage>(MESSAGE_QUEUE_CAPACITY);

        tokio::spawn(Self::fanout_loop(queue_rx, state.clone(), info.clone()));
        let mut send_task = tokio::spawn(Self::send_loop(sender, cmd_rx, events));
        let mut recv_task = tokio::spawn(Self::recv_loop(
            incoming,
            cmd_tx,
            queue_tx,
            state.clone(),
            info.clone(),
        ));

        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!("WebSocket发送任务完成");
                recv_task.abort();
            }
            _ = &mut recv_task => {
                tracing::debug!("WebSocket接收任务完成");
                send_task.abort();
            }
        }

        state.registry.disconnect(connection_id).await;
        tracing::info!(connection_id = %connection_id, user_id = %info.user_id, "WebSocket连接已断开");
    }

    async fn send_loop(
        mut sender: futures_util::stream::SplitSink<WebSocket, WsMessage>,
        mut cmd_rx: mpsc::Receiver<WsCommand>,
        mut events: EventReceiver,
    ) {
        loop {
            let outgoing = tokio::select! {
                Some(cmd) = cmd_rx.recv() => match cmd {
                    WsCommand::SendPong(data) => WsMessage::Pong(data),
                },
                Some(event) = events.recv() => match serde_json::to_string(&event) {
                    Ok(json) => WsMessage::Text(Utf8Bytes::from(json)),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to serialize websocket payload");
                        continue;
                    }
                },
                else => break,
            };
            if sender.send(outgoing).await.is_err() {
                tracing::warn!("Failed to send websocket message");
                break;
            }
        }
    }

    async fn recv_loop(
        mut incoming: futures_util::stream::SplitStream<WebSocket>,
        cmd_tx: mpsc::Sender<WsCommand>,
        queue_tx: mpsc::Sender<InboundMessage>,
        state: AppState,
        info: Arc<ConnectionInfo>,
    ) {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Close(_) => {
                    tracing::debug!("WebSocket收到关闭消息");
                    break;
                }
                WsMessage::Ping(data) => {
                    if cmd_tx.send(WsCommand::SendPong(data)).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => {}
                WsMessage::Text(text) => {
                    Self::handle_text(text.as_str(), &queue_tx, &state, &info).await
                }
                WsMessage::Binary(_) => {
                    Self::notify(&state, &info, "UNSUPPORTED_FRAME", "binary frames are not supported")
                        .await;
                }
            }
        }
    }

    async fn handle_text(
        text: &str,
        queue_tx: &mpsc::Sender<InboundMessage>,
        state: &AppState,
        info: &ConnectionInfo,
    ) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(connection_id = %info.connection_id, error = %err, "无法解析客户端事件");
                Self::notify(state, info, "INVALID_EVENT", err.to_string()).await;
                return;
            }
        };

        match event {
            ClientEvent::JoinRoom(RoomRef { room }) => {
                state.registry.join(info.connection_id, &room).await;
                state
                    .registry
                    .send_to(info.connection_id, ServerEvent::JoinedRoom(RoomRef { room }))
                    .await;
            }
            ClientEvent::LeaveRoom(RoomRef { room }) => {
                state.registry.leave(info.connection_id, &room).await;
                state
                    .registry
                    .send_to(info.connection_id, ServerEvent::LeftRoom(RoomRef { room }))
                    .await;
            }
            ClientEvent::SendMessage(message) => {
                if queue_tx.send(message).await.is_err() {
                    tracing::warn!(connection_id = %info.connection_id, "扇出任务已退出，丢弃消息");
                }
            }
        }
    }

    async fn fanout_loop(
        mut queue_rx: mpsc::Receiver<InboundMessage>,
        state: AppState,
        info: Arc<ConnectionInfo>,
    ) {
        while let Some(message) = queue_rx.recv().await {
            if let Err(err) = state.fanout.handle_inbound(&info, message).await {
                tracing::warn!(connection_id = %info.connection_id, error = %err, "消息处理失败");
                Self::notify(&state, &info, err.code(), err.to_string()).await;
            }
        }
    }

    async fn notify(
        state: &AppState,
        info: &ConnectionInfo,
        code: &str,
        message: impl Into<String>,
    ) {
        state
            .registry
            .send_to(info.connection_id, ServerEvent::error(code, message))
            .await;
    }
}

/// 由接收任务转交给发送任务的写命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Bytes),
}
