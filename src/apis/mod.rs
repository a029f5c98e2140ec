pub mod news_feed;

pub use news_feed::NewsFeedClient;
