// Sentry Cam - Library Entry Point
//
// Watches a frame stream for sustained motion and records bounded events:
// one snapshot plus one clip stitched from pre-roll, trigger, and
// post-roll frames. Capture never blocks on storage; encoding runs on a
// dedicated writer thread.

pub mod constants;
pub mod error;
pub mod tools;
pub mod config;
pub mod frame;
pub mod source;
pub mod detect;
pub mod buffer;
pub mod event;
pub mod record;
pub mod status;
pub mod pipeline;
