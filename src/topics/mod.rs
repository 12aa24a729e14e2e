//! Last-known-value cache per topic
//!
//! Every inbound broker message overwrites the entry for its topic. The cache
//! answers the topic read endpoints and lets freshly loaded dashboards render
//! current values without waiting for the next broker message.

mod cache;

pub use cache::TopicCache;
