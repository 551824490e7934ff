// Shared with the feed crate's own lifecycle tests.
#[path = "../../../sentinel-ws/tests/common/mock_feed.rs"]
pub mod mock_feed;
