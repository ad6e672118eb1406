// [libs/infra/dataplane/src/lib.rs]

pub mod errors;
pub mod media_plane;
pub mod sfu;

pub use errors::DataplaneError;
pub use media_plane::{MediaPlaneClient, IngestStatus, IngestSession};
pub use sfu::{SfuClient, RoomJoinGrant, RtpIngestAllocation};
