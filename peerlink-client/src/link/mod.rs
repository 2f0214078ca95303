mod candidate_buffer;
mod peer_link;

pub use candidate_buffer::*;
pub use peer_link::*;
