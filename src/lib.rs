mod env;
mod feed;
mod log;
mod serve;

pub use feed::{FeedClient, USGS_FEED_URL};
pub use serve::{start_server, ErrorEnvelope, RelayServer};
