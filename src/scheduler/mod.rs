//! Bounded fan-out for the per-category product selection calls.
//!
//! ```text
//!   pairs: (r0,d0) (r0,d1) (r1,d0) (r1,d1) (r2,d0) ...
//!           └── wave 1 ──┘  └── wave 2 ──┘  └─ wave 3
//!                        delay          delay
//! ```
//!
//! At most `concurrency` calls are in flight, each wave is a barrier, and a
//! fixed delay separates waves.

pub mod waves;

pub use waves::{WaveConfig, WaveReport, WaveScheduler};
