pub mod web_browser;
