//! Room key resolution.
//!
//! Maps a logical (kind, parameters) tuple to a canonical room key string.
//! Both participants of a direct conversation must derive the identical key
//! with no negotiation, so resolution is a pure function of its inputs:
//!
//! - group rooms: `group:<name>`, name defaulting to `"lobby"`;
//! - direct rooms: `dm:<a>:<b>` with the two usernames ordered
//!   lexicographically, making the key independent of which side asked.

use crate::error::HandlerError;

/// Room kind tag for group rooms.
pub const KIND_GROUP: &str = "group";
/// Room kind tag for direct rooms.
pub const KIND_DM: &str = "dm";

/// Default group room name when none is given.
pub const DEFAULT_GROUP: &str = "lobby";

/// Resolve a room request to its canonical key.
///
/// `user` and `target` are only consulted for direct rooms. Direct rooms
/// require two distinct, non-empty usernames; a request naming the same user
/// twice is rejected rather than silently creating a self-room.
pub fn room_key(
    room_type: &str,
    room_name: Option<&str>,
    user: Option<&str>,
    target: Option<&str>,
) -> Result<String, HandlerError> {
    match room_type {
        KIND_GROUP => {
            let name = room_name.filter(|n| !n.is_empty()).unwrap_or(DEFAULT_GROUP);
            Ok(format!("group:{name}"))
        }
        KIND_DM => {
            let user = user.filter(|u| !u.is_empty());
            let target = target.filter(|t| !t.is_empty());
            let (Some(user), Some(target)) = (user, target) else {
                return Err(HandlerError::InvalidRoomRequest(
                    "user and target required for direct messages".into(),
                ));
            };
            if user == target {
                return Err(HandlerError::InvalidRoomRequest(
                    "direct messages need two distinct users".into(),
                ));
            }
            let (first, second) = if user < target {
                (user, target)
            } else {
                (target, user)
            };
            Ok(format!("dm:{first}:{second}"))
        }
        other => Err(HandlerError::InvalidRoomRequest(format!(
            "unknown room type: {other}"
        ))),
    }
}
