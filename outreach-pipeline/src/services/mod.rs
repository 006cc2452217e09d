//! External service clients
//!
//! One module per upstream: the video platform API, the text-generation
//! service (classifier and drafter sit on top of it), the render service,
//! audio extraction binaries, SMTP/relay email, and the video host.

pub mod audio;
pub mod classifier;
pub mod drafter;
pub mod email;
pub mod llm_client;
pub mod render_client;
pub mod upload_client;
pub mod youtube_client;
