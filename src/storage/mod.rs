pub mod account_store;
pub mod frame_store;
pub mod signing;

pub use account_store::{Account, AccountStore, Camera, CameraBinding, Face};
pub use frame_store::{FrameLink, FrameStore, LocalFrameStore, MemoryFrameStore};
pub use signing::{SignedUrl, UrlSigner};
