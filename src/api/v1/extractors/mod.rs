pub mod body;
pub mod ctx;

pub use body::JsonOrForm;
pub use ctx::{AuthCtx, RoomCtx};
