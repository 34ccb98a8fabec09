//! Room registry: maps room identifiers to their current member sockets.
//!
//! Rooms are created implicitly on first join and deleted when the last
//! member leaves; no orphan rooms persist. Membership is a set: joining a
//! room twice is a no-op.

use dashmap::DashMap;
use std::collections::HashMap;
use thiserror::Error;

use super::socket::{SocketHandle, SocketId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room `{0}` does not exist")]
    RoomNotFound(String),

    #[error("socket is not a member of room `{0}`")]
    NotAMember(String),
}

#[derive(Default)]
pub struct Broadcaster {
    rooms: DashMap<String, HashMap<SocketId, SocketHandle>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the socket to the room, creating the room if absent.
    /// Idempotent: re-joining an already-joined room changes nothing.
    pub fn join(&self, room: &str, member: SocketHandle) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(member.id(), member);
    }

    /// Removes the socket from the room; deletes the room once empty.
    pub fn leave(&self, room: &str, id: SocketId) -> Result<(), RoomError> {
        let removed = {
            let mut members = self
                .rooms
                .get_mut(room)
                .ok_or_else(|| RoomError::RoomNotFound(room.to_string()))?;
            members.remove(&id)
        };
        if removed.is_none() {
            return Err(RoomError::NotAMember(room.to_string()));
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
        Ok(())
    }

    /// Snapshot of the room's current members. Sockets joining after the
    /// snapshot is taken are not included in an in-flight broadcast.
    pub fn members(&self, room: &str) -> Vec<SocketHandle> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room: &str, id: SocketId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(&id))
    }

    pub fn room_exists(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::socket::test_support::loopback_handle;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn join_creates_room_and_leave_of_last_member_deletes_it() {
        let broadcaster = Broadcaster::new();
        let (handle, _rx) = loopback_handle();

        assert!(!broadcaster.room_exists("t1"));
        broadcaster.join("t1", handle.clone());
        assert!(broadcaster.room_exists("t1"));
        assert_eq!(broadcaster.members("t1").len(), 1);

        broadcaster.leave("t1", handle.id()).unwrap();
        assert!(!broadcaster.room_exists("t1"));
        assert_eq!(broadcaster.room_count(), 0);
    }

    #[test]
    fn join_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let (handle, _rx) = loopback_handle();

        broadcaster.join("t1", handle.clone());
        broadcaster.join("t1", handle.clone());
        assert_eq!(broadcaster.members("t1").len(), 1);

        broadcaster.leave("t1", handle.id()).unwrap();
        assert!(!broadcaster.room_exists("t1"));
    }

    #[test]
    fn leave_unknown_room_or_non_member_errors() {
        let broadcaster = Broadcaster::new();
        let (member, _rx1) = loopback_handle();
        let (stranger, _rx2) = loopback_handle();

        assert_eq!(
            broadcaster.leave("t1", member.id()),
            Err(RoomError::RoomNotFound("t1".to_string()))
        );

        broadcaster.join("t1", member.clone());
        assert_eq!(
            broadcaster.leave("t1", stranger.id()),
            Err(RoomError::NotAMember("t1".to_string()))
        );
        // The room is untouched by the failed leave.
        assert!(broadcaster.contains("t1", member.id()));
    }

    proptest! {
        /// Replays an arbitrary join/leave sequence against a model and
        /// checks the registry agrees with it, including room deletion.
        #[test]
        fn membership_matches_model(ops in proptest::collection::vec(
            (0usize..4, 0usize..3, proptest::bool::ANY),
            0..64,
        )) {
            let broadcaster = Broadcaster::new();
            let handles: Vec<_> = (0..4).map(|_| loopback_handle()).collect();
            let rooms = ["alpha", "beta", "gamma"];
            let mut model: HashSet<(usize, usize)> = HashSet::new();

            for (socket_ix, room_ix, is_join) in ops {
                let handle = &handles[socket_ix].0;
                if is_join {
                    broadcaster.join(rooms[room_ix], handle.clone());
                    model.insert((socket_ix, room_ix));
                } else {
                    let result = broadcaster.leave(rooms[room_ix], handle.id());
                    prop_assert_eq!(result.is_ok(), model.remove(&(socket_ix, room_ix)));
                }
            }

            for (room_ix, room) in rooms.iter().enumerate() {
                let member_ids: HashSet<_> =
                    broadcaster.members(room).iter().map(SocketHandle::id).collect();
                let expected: HashSet<_> = model
                    .iter()
                    .filter(|(_, r)| *r == room_ix)
                    .map(|(s, _)| handles[*s].0.id())
                    .collect();
                prop_assert_eq!(&member_ids, &expected);
                prop_assert_eq!(broadcaster.room_exists(room), !expected.is_empty());
            }
        }
    }
}
