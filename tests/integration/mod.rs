mod basic_integration;
mod live_feed;
mod persistence;
