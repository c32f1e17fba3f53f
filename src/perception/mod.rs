pub mod html_page;
pub mod pipeline;
pub mod traits;
pub mod types;
