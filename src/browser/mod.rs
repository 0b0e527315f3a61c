pub mod connection;
pub mod headless;

pub use connection::{connect_to_browser_and_pages, origin_of};
pub use headless::launch_headless_browser;
