//! # Events Module
//!
//! Typed progress reporting for the pipeline.
//!
//! ## Design
//! The core emits events through a channel handed in by the caller instead
//! of writing to a global log, so the CLI renders a progress bar and tests
//! can assert on exactly what happened.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Compare(CompareEvent::Progress { compared }) = event {
//!             bar.inc(compared as u64);
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
