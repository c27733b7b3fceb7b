pub mod change_feed;

pub use change_feed::{ChangeBatch, ChangeFeed, DocChange};
