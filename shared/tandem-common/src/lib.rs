//! Tandem Common Library
//!
//! Wire protocol frames, identifier types, and TURN configuration shared by
//! the coordinator and the client session engine.

pub mod frame;
pub mod ids;
pub mod turn;

pub use frame::{ClientFrame, FileMetadata, NcStatus, PeerInfo, ServerFrame, FILE_CHUNK_SIZE};
pub use ids::{ConnectionMode, InvalidRoomCode, PeerId, Role, RoomCode, SessionId};
pub use turn::{IceServer, TurnConfig};
