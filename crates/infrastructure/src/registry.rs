//! 房间注册表
//!
//! 维护连接与房间的成员关系，并负责把出站事件投递到各连接的发送队列。
//! 连接表与房间表放在同一把读写锁下，保证两者始终一致。

use std::collections::{HashMap, HashSet};

use application::{BroadcastError, EventBroadcaster};
use async_trait::async_trait;
use domain::{ConnectionId, ConnectionInfo, RoomKey, ServerEvent};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// 每个连接的出站事件队列
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

struct ConnectionEntry {
    info: ConnectionInfo,
    sender: EventSender,
    rooms: HashSet<RoomKey>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn send(&self, id: &ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(id) {
            Some(entry) => entry.sender.send(event).is_ok(),
            None => false,
        }
    }
}

/// 内存中的房间注册表
#[derive(Default)]
pub struct InMemoryRoomRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接，返回其出站事件接收端
    pub async fn connect(&self, info: ConnectionInfo) -> EventReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = info.connection_id;
        let user_id = info.user_id.clone();

        let mut state = self.state.write().await;
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                info,
                sender,
                rooms: HashSet::new(),
            },
        );
        info!(connection_id = %connection_id, user_id = %user_id, total = state.connections.len(), "连接已注册");
        receiver
    }

    /// 加入房间，重复加入无副作用。返回是否新加入
    pub async fn join(&self, connection_id: ConnectionId, room: &RoomKey) -> bool {
        let mut state = self.state.write().await;
        let Some(entry) = state.connections.get_mut(&connection_id) else {
            warn!(connection_id = %connection_id, room = %room, "未知连接尝试加入房间");
            return false;
        };
        if !entry.rooms.insert(room.clone()) {
            return false;
        }
        state
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id);
        debug!(connection_id = %connection_id, room = %room, "已加入房间");
        true
    }

    /// 离开房间，未加入时无副作用。返回是否确实离开
    pub async fn leave(&self, connection_id: ConnectionId, room: &RoomKey) -> bool {
        let mut state = self.state.write().await;
        let left = state
            .connections
            .get_mut(&connection_id)
            .is_some_and(|entry| entry.rooms.remove(room));
        if left {
            remove_member(&mut state.rooms, room, &connection_id);
            debug!(connection_id = %connection_id, room = %room, "已离开房间");
        }
        left
    }

    /// 断开连接：移除其所有房间成员关系，之后的广播不会再投递到该连接
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        let Some(entry) = state.connections.remove(&connection_id) else {
            return;
        };
        for room in &entry.rooms {
            remove_member(&mut state.rooms, room, &connection_id);
        }
        info!(
            connection_id = %connection_id,
            user_id = %entry.info.user_id,
            rooms = entry.rooms.len(),
            "连接已注销"
        );
    }

    pub async fn room_members(&self, room: &RoomKey) -> Vec<ConnectionInfo> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|id| state.connections.get(id))
            .map(|entry| entry.info.clone())
            .collect()
    }

    pub async fn rooms_of(&self, connection_id: ConnectionId) -> HashSet<RoomKey> {
        let state = self.state.read().await;
        state
            .connections
            .get(&connection_id)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// 只投递给单个连接，用于错误通知与加入/离开确认
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.state.read().await.send(&connection_id, event)
    }
}

fn remove_member(
    rooms: &mut HashMap<RoomKey, HashSet<ConnectionId>>,
    room: &RoomKey,
    connection_id: &ConnectionId,
) {
    if let Some(members) = rooms.get_mut(room) {
        members.remove(connection_id);
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}

#[async_trait]
impl EventBroadcaster for InMemoryRoomRegistry {
    async fn broadcast_to_room(
        &self,
        room: &RoomKey,
        event: ServerEvent,
    ) -> Result<usize, BroadcastError> {
        let state = self.state.read().await;
        let delivered = state
            .rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter(|id| state.send(id, event.clone()))
            .count();
        Ok(delivered)
    }

    async fn broadcast_all(&self, event: ServerEvent) -> Result<usize, BroadcastError> {
        let state = self.state.read().await;
        let delivered = state
            .connections
            .values()
            .filter(|entry| entry.sender.send(event.clone()).is_ok())
            .count();
        Ok(delivered)
    }
}
